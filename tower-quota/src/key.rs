/// Pulls the quota key out of a request.
///
/// Any `Fn(&Req) -> String` closure is a key extractor, so simple cases do
/// not need a dedicated type.
pub trait KeyExtractor<Req> {
    fn extract(&self, req: &Req) -> String;
}

impl<F, Req> KeyExtractor<Req> for F
where
    F: Fn(&Req) -> String,
{
    fn extract(&self, req: &Req) -> String {
        self(req)
    }
}

/// Keys requests by the connecting peer's IP address.
///
/// Reads the `ConnectInfo<SocketAddr>` that axum attaches when serving with
/// `into_make_service_with_connect_info::<SocketAddr>()`. Requests without
/// it share the [`ConnectInfoKey::UNKNOWN`] key.
#[cfg(feature = "axum")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectInfoKey;

#[cfg(feature = "axum")]
impl ConnectInfoKey {
    pub const UNKNOWN: &'static str = "unknown";
}

#[cfg(feature = "axum")]
impl<B> KeyExtractor<http::Request<B>> for ConnectInfoKey {
    fn extract(&self, req: &http::Request<B>) -> String {
        use axum::extract::ConnectInfo;
        use std::net::SocketAddr;

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| quota_bucket::client_key(&addr.to_string()))
            .unwrap_or_else(|| Self::UNKNOWN.to_owned())
    }
}
