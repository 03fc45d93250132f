//! Interposition on the two client-side HTTP primitives.
//!
//! Both wrappers are decorators: they hold the original primitive, observe
//! failures, and never alter what the caller gets back. A request whose URL
//! contains the collector endpoint is passed through without observation,
//! so the monitor never reports on its own delivery traffic — without this,
//! every report would trigger a monitored request and recurse without
//! bound. The exclusion check is substring containment, which matches the
//! delivery URL wherever it appears; a legitimate target that embeds the
//! collector URL as a substring is excluded too.

use std::fmt;
use std::sync::Arc;

use faultline_types::{FaultEvent, FaultKind, Identity};

use crate::dispatch::ReportSink;

/// Request method for the monitored primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Awaited request/response primitive ───────────────────

/// A request for the awaited primitive.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Vec<u8>>,
}

impl ExchangeRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }
}

/// The response surface the wrapper inspects.
#[derive(Debug, Clone)]
pub struct ExchangeResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl ExchangeResponse {
    /// Whether the status falls in the success range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure of the awaited primitive.
#[derive(Debug, Clone)]
pub struct ExchangeError {
    pub url: String,
    pub message: String,
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.url)
    }
}

impl std::error::Error for ExchangeError {}

/// The awaited request/response primitive: one call, one settled outcome.
/// The host's HTTP stack implements this; faultline only decorates it.
pub trait HttpExchange: Send + Sync {
    fn execute(
        &self,
        request: ExchangeRequest,
    ) -> impl Future<Output = Result<ExchangeResponse, ExchangeError>> + Send;
}

/// Decorator around an [`HttpExchange`] that reports transport failures and
/// non-success statuses while returning the inner outcome unchanged.
pub struct MonitoredExchange<E> {
    inner: E,
    endpoint: String,
    identity: Arc<Identity>,
    sink: Arc<dyn ReportSink>,
}

impl<E: HttpExchange> MonitoredExchange<E> {
    pub fn new(
        inner: E,
        endpoint: impl Into<String>,
        identity: Arc<Identity>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            inner,
            endpoint: endpoint.into(),
            identity,
            sink,
        }
    }
}

impl<E: HttpExchange> HttpExchange for MonitoredExchange<E> {
    fn execute(
        &self,
        request: ExchangeRequest,
    ) -> impl Future<Output = Result<ExchangeResponse, ExchangeError>> + Send {
        async move {
            if request.url.contains(&self.endpoint) {
                return self.inner.execute(request).await;
            }

            let url = request.url.clone();
            match self.inner.execute(request).await {
                Ok(response) => {
                    if !response.is_success() {
                        self.sink.submit(FaultEvent::new(
                            FaultKind::Fetch,
                            format!(
                                "Network Error: {} {}",
                                response.status, response.status_text
                            ),
                            &self.identity,
                        ));
                    }
                    Ok(response)
                }
                Err(error) => {
                    self.sink.submit(FaultEvent::new(
                        FaultKind::Fetch,
                        format!("Fetch failed: {url}"),
                        &self.identity,
                    ));
                    Err(error)
                }
            }
        }
    }
}

// ── Callback-configured primitive ────────────────────────

/// Failure listener for the callback-configured primitive. A transport
/// failure fires each registered listener at most once.
pub type FailureListener = Box<dyn FnOnce() + Send>;

/// A request handle produced by [`EventedHttp::open`]. Listeners are
/// registered before the host starts the request; starting it and
/// signalling outcomes stays with the host.
pub trait EventedRequest {
    fn on_failure(&mut self, listener: FailureListener);
}

/// The callback-configured request primitive: failures surface through
/// registered listeners, not a return value.
pub trait EventedHttp: Send + Sync {
    type Request: EventedRequest;

    fn open(&self, method: Method, url: &str) -> Self::Request;
}

/// Decorator around an [`EventedHttp`] that attaches a failure listener to
/// every opened request. The inner open always runs, whether or not the
/// request ends up observed.
pub struct MonitoredEvented<C> {
    inner: C,
    endpoint: String,
    identity: Arc<Identity>,
    sink: Arc<dyn ReportSink>,
}

impl<C: EventedHttp> MonitoredEvented<C> {
    pub fn new(
        inner: C,
        endpoint: impl Into<String>,
        identity: Arc<Identity>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            inner,
            endpoint: endpoint.into(),
            identity,
            sink,
        }
    }
}

impl<C: EventedHttp> EventedHttp for MonitoredEvented<C> {
    type Request = C::Request;

    fn open(&self, method: Method, url: &str) -> C::Request {
        let mut request = self.inner.open(method, url);
        if url.contains(&self.endpoint) {
            return request;
        }

        let sink = Arc::clone(&self.sink);
        let identity = Arc::clone(&self.identity);
        let message = format!("Network Error: {method} {url}");
        request.on_failure(Box::new(move || {
            // The event is built when the failure fires, so the timestamp
            // is the observation instant, not the open instant.
            sink.submit(FaultEvent::new(FaultKind::Network, message, &identity));
        }));
        request
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use faultline_types::FaultKind;

    use crate::dispatch::ReportSink;
    use crate::testing::{RecordingSink, test_identity};

    use super::*;

    const COLLECTOR: &str = "http://collector.test/error-report";

    /// Awaited primitive returning a programmed outcome.
    struct StubExchange {
        outcome: Result<ExchangeResponse, ExchangeError>,
        calls: AtomicUsize,
    }

    impl StubExchange {
        fn respond(status: u16, status_text: &str) -> Self {
            Self {
                outcome: Ok(ExchangeResponse {
                    status,
                    status_text: status_text.to_owned(),
                    body: Vec::new(),
                }),
                calls: AtomicUsize::new(0),
            }
        }

        fn fail(url: &str, message: &str) -> Self {
            Self {
                outcome: Err(ExchangeError {
                    url: url.to_owned(),
                    message: message.to_owned(),
                }),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl HttpExchange for StubExchange {
        fn execute(
            &self,
            _request: ExchangeRequest,
        ) -> impl Future<Output = Result<ExchangeResponse, ExchangeError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcome.clone();
            async move { outcome }
        }
    }

    fn monitored(stub: StubExchange) -> (MonitoredExchange<StubExchange>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let wrapped = MonitoredExchange::new(
            stub,
            COLLECTOR,
            test_identity(),
            sink.clone() as Arc<dyn ReportSink>,
        );
        (wrapped, sink)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn non_success_status_is_reported_and_passed_through() {
        let (wrapped, sink) = monitored(StubExchange::respond(404, "Not Found"));

        let response = wrapped
            .execute(ExchangeRequest::new(Method::Get, "http://api.test/data"))
            .await
            .expect("the original response must reach the caller");

        assert_eq!(response.status, 404);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FaultKind::Fetch);
        assert!(events[0].message.contains("404"));
        assert!(events[0].message.contains("Not Found"));
        assert!(events[0].stack.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn success_status_produces_no_report() {
        let (wrapped, sink) = monitored(StubExchange::respond(204, "No Content"));

        let response = wrapped
            .execute(ExchangeRequest::new(Method::Get, "http://api.test/data"))
            .await
            .expect("success passes through");

        assert_eq!(response.status, 204);
        assert!(sink.events().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn transport_failure_is_reported_and_reraised() {
        let (wrapped, sink) = monitored(StubExchange::fail(
            "http://api.test/data",
            "connection refused",
        ));

        let error = wrapped
            .execute(ExchangeRequest::new(Method::Get, "http://api.test/data"))
            .await
            .expect_err("the original failure must reach the caller");

        assert_eq!(error.message, "connection refused");
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FaultKind::Fetch);
        assert!(events[0].message.contains("http://api.test/data"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn collector_traffic_is_excluded_but_still_executed() {
        let (wrapped, sink) = monitored(StubExchange::respond(500, "Internal Server Error"));

        let response = wrapped
            .execute(ExchangeRequest::new(Method::Post, COLLECTOR))
            .await
            .expect("delivery traffic passes through");

        assert_eq!(response.status, 500);
        assert_eq!(wrapped.inner.calls.load(Ordering::SeqCst), 1);
        assert!(
            sink.events().is_empty(),
            "collector traffic must never be reported"
        );
    }

    /// Callback-configured primitive recording opens and collecting
    /// listeners; the test plays the host and fires the failure.
    #[derive(Default)]
    struct StubEvented {
        opens: AtomicUsize,
    }

    #[derive(Default)]
    struct StubRequest {
        listeners: Vec<FailureListener>,
    }

    impl StubRequest {
        fn fail(mut self) {
            for listener in self.listeners.drain(..) {
                listener();
            }
        }
    }

    impl EventedRequest for StubRequest {
        fn on_failure(&mut self, listener: FailureListener) {
            self.listeners.push(listener);
        }
    }

    impl EventedHttp for StubEvented {
        type Request = StubRequest;

        fn open(&self, _method: Method, _url: &str) -> StubRequest {
            self.opens.fetch_add(1, Ordering::SeqCst);
            StubRequest::default()
        }
    }

    #[test]
    fn evented_failure_is_reported_with_method_and_url() {
        let sink = Arc::new(RecordingSink::default());
        let wrapped = MonitoredEvented::new(
            StubEvented::default(),
            COLLECTOR,
            test_identity(),
            sink.clone() as Arc<dyn ReportSink>,
        );

        let request = wrapped.open(Method::Get, "http://api.test/widgets");
        assert!(sink.events().is_empty(), "no report before the failure fires");
        request.fail();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FaultKind::Network);
        assert_eq!(events[0].message, "Network Error: GET http://api.test/widgets");
        assert!(events[0].stack.is_none());
    }

    #[test]
    fn evented_collector_traffic_is_excluded_but_still_opened() {
        let sink = Arc::new(RecordingSink::default());
        let wrapped = MonitoredEvented::new(
            StubEvented::default(),
            COLLECTOR,
            test_identity(),
            sink.clone() as Arc<dyn ReportSink>,
        );

        let request = wrapped.open(Method::Post, COLLECTOR);
        assert_eq!(wrapped.inner.opens.load(Ordering::SeqCst), 1);
        request.fail();

        assert!(
            sink.events().is_empty(),
            "collector traffic must never be reported"
        );
    }

    #[test]
    fn evented_success_never_fires_the_listener() {
        let sink = Arc::new(RecordingSink::default());
        let wrapped = MonitoredEvented::new(
            StubEvented::default(),
            COLLECTOR,
            test_identity(),
            sink.clone() as Arc<dyn ReportSink>,
        );

        let request = wrapped.open(Method::Get, "http://api.test/widgets");
        drop(request);

        assert!(sink.events().is_empty());
    }

    #[test]
    fn unrelated_url_sharing_a_path_fragment_is_still_observed() {
        let sink = Arc::new(RecordingSink::default());
        let wrapped = MonitoredEvented::new(
            StubEvented::default(),
            COLLECTOR,
            test_identity(),
            sink.clone() as Arc<dyn ReportSink>,
        );

        // Shares "/error-report" with the endpoint, but not the full URL.
        let request = wrapped.open(Method::Get, "http://api.test/error-report");
        request.fail();

        assert_eq!(sink.events().len(), 1);
    }
}
