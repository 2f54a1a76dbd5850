use std::num::NonZeroUsize;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use quota_bucket::Admission;
use quota_bucket::Limiter;
use quota_bucket::Reason;
use quota_bucket::Strategy;
use quota_bucket::clock::Clock;
use quota_bucket::clock::Mock;
use tower::BoxError;
use tower::Layer;
use tower::Service;
use tower::ServiceBuilder;
use tower::ServiceExt;

use super::*;

use futures::future::Ready;
use futures::future::ready;

/// Requests carry their client key directly.
#[derive(Clone, Debug)]
struct Req(&'static str);

fn by_client(req: &Req) -> String {
    req.0.to_owned()
}

#[derive(Clone)]
struct MockService {
    pub count: Arc<AtomicUsize>,
}

impl Service<Req> for MockService {
    type Response = &'static str;
    type Error = BoxError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        self.count.fetch_add(1, Ordering::SeqCst);
        ready(Ok(req.0))
    }
}

#[derive(Clone)]
struct FailingService;

impl Service<Req> for FailingService {
    type Response = ();
    type Error = BoxError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Req) -> Self::Future {
        ready(Err("database unavailable".into()))
    }
}

// A mock strategy that rejects every key
#[derive(Debug)]
struct RejectAll;

impl Strategy for RejectAll {
    fn process(&self, _key: &str) -> ControlFlow<Reason> {
        ControlFlow::Break(Reason::QuotaExceeded {
            limit: 0,
            retry_after: Duration::ZERO,
        })
    }
}

fn admission(capacity: usize, refill_rate: usize) -> (Arc<Admission>, Arc<Mock>) {
    let (clock, mock) = Clock::mock();
    let limiter = Limiter::with_clock(NonZeroUsize::new(capacity).unwrap(), refill_rate, clock);
    (Arc::new(Admission::from(limiter)), mock)
}

async fn send<S>(svc: &mut S, key: &'static str) -> Result<S::Response, BoxError>
where
    S: Service<Req, Error = BoxError>,
{
    svc.ready().await?.call(Req(key)).await
}

fn mock_service() -> (MockService, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    (
        MockService {
            count: count.clone(),
        },
        count,
    )
}

#[tokio::test]
async fn test_admits_until_exhausted() {
    let (strategy, mock) = admission(5, 1);
    let (inner, count) = mock_service();
    let mut service = QuotaService::new(inner, strategy, by_client);

    for _ in 0..5 {
        let resp = send(&mut service, "10.0.0.1").await;
        assert_eq!(resp.unwrap(), "10.0.0.1");
    }

    let err = send(&mut service, "10.0.0.1")
        .await
        .expect_err("sixth request should be rejected");
    let quota_err = err.downcast_ref::<QuotaError>().expect("QuotaError");
    assert_eq!(
        *quota_err,
        QuotaError::QuotaExceeded {
            limit: 5,
            retry_after: Duration::from_secs(1),
        }
    );
    assert_eq!(quota_err.to_string(), "Too many requests..");

    // The inner service never saw the rejected request.
    assert_eq!(count.load(Ordering::SeqCst), 5);

    mock.increment(Duration::from_secs(1));
    send(&mut service, "10.0.0.1")
        .await
        .expect("refilled token should admit");
    assert_eq!(count.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_keys_are_isolated() {
    let (strategy, _mock) = admission(2, 1);
    let (inner, count) = mock_service();
    let mut service = QuotaService::new(inner, strategy, by_client);

    for key in ["a", "b", "c"] {
        for _ in 0..2 {
            send(&mut service, key).await.unwrap();
        }
        assert!(send(&mut service, key).await.is_err());
    }

    assert_eq!(count.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_layer_integration() {
    let (strategy, _mock) = admission(100, 10);

    let mut service = tower::ServiceBuilder::new()
        .layer(QuotaLayer::new(strategy, by_client))
        .service(mock_service().0);

    // Verify it handles a basic request
    send(&mut service, "k").await.unwrap();
}

#[tokio::test]
async fn test_shared_state_across_clones() {
    let (strategy, _mock) = admission(1, 1);
    let layer = QuotaLayer::new(strategy, by_client);

    let mut svc1 = layer.layer(mock_service().0);
    let mut svc2 = layer.layer(mock_service().0);

    send(&mut svc1, "k").await.unwrap();

    // svc2 should now be rejected because svc1 used the token
    let res = send(&mut svc2, "k").await;
    assert!(res.unwrap_err().is::<QuotaError>());
}

#[tokio::test]
async fn test_rejection_skips_inner_service() {
    let (inner, count) = mock_service();
    let mut service = QuotaService::new(inner, Arc::new(RejectAll), by_client);

    for _ in 0..3 {
        let res = send(&mut service, "k").await;
        assert!(res.is_err());
    }
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_inner_errors_pass_through() {
    let (strategy, _mock) = admission(1, 1);
    let mut service = QuotaService::new(FailingService, strategy, by_client);

    let err = send(&mut service, "k").await.unwrap_err();

    assert!(!err.is::<QuotaError>());
    assert_eq!(err.to_string(), "database unavailable");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_hammer() {
    let capacity = 100;
    let (strategy, _mock) = admission(capacity, 10);
    let (inner, count) = mock_service();
    let service = make_quota_svc(strategy, by_client, inner);

    let mut handles = vec![];
    for _ in 0..20 {
        let mut svc = service.clone();
        handles.push(tokio::spawn(async move {
            let mut admitted = 0;
            for _ in 0..10 {
                if send(&mut svc, "concurrent-key").await.is_ok() {
                    admitted += 1;
                }
            }
            admitted
        }));
    }

    let mut admitted = 0;
    for h in handles {
        admitted += h.await.expect("Task panicked");
    }

    // Exactly 'capacity' requests should have been allowed through
    assert_eq!(admitted, capacity);
    assert_eq!(
        count.load(Ordering::SeqCst),
        capacity,
        "Limiter allowed more/less than capacity under pressure"
    );
}

#[tokio::test]
async fn test_service_builder_ext() {
    let (strategy, _mock) = admission(1, 0);
    let (inner, count) = mock_service();

    let mut service = ServiceBuilder::new()
        .quota(strategy, by_client)
        .service(inner);

    assert!(send(&mut service, "k").await.is_ok());
    assert!(send(&mut service, "k").await.is_err());
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
