use std::net::SocketAddr;

/// Derives a client key from a peer address.
///
/// The port is stripped so that every connection from one host shares a
/// quota. Anything that does not parse as `host:port` is used verbatim.
pub fn client_key(remote_addr: &str) -> String {
    if let Ok(addr) = remote_addr.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    // Bracketed hosts are split whatever the port looks like.
    if let Some(rest) = remote_addr.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((host, port)) if !host.contains(['[', ']']) && !port.contains(['[', ']']) => {
                host.to_owned()
            }
            _ => remote_addr.to_owned(),
        };
    }
    match remote_addr.rsplit_once(':') {
        // Named hosts; bare IPv6 literals have more than one colon.
        Some((host, port)) if !host.contains([':', '[', ']']) && !port.contains(['[', ']']) => {
            host.to_owned()
        }
        _ => remote_addr.to_owned(),
    }
}
