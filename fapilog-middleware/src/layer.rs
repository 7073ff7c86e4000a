use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use fapilog_core::context::{bind_context, clear_context, with_fresh_context};
use fapilog_core::{ContextRecord, Event};
use http::{HeaderMap, HeaderValue, Request};
use http_body::Body;
use tower::{Layer, Service};

use crate::ids::{generate_span_id, generate_trace_id, round2};

pub type ExceptionHook = Arc<dyn Fn(Event) + Send + Sync>;

/// Tuning for the correlation middleware (§4.8).
#[derive(Clone)]
pub struct CorrelationConfig {
    pub trace_header_name: String,
    pub outbound_propagation_enabled: bool,
    /// Invoked with a `status_code=500` record on an unhandled downstream
    /// error, so the facade can route it through the full event pipeline
    /// instead of this crate depending on it directly.
    pub on_exception: Option<ExceptionHook>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            trace_header_name: "X-Request-ID".to_string(),
            outbound_propagation_enabled: false,
            on_exception: None,
        }
    }
}

/// `tower::Layer` that installs per-request context binding (§4.8).
/// Modeled on `r2e_observability::middleware::OtelTraceLayer`.
#[derive(Clone)]
pub struct CorrelationLayer {
    config: Arc<CorrelationConfig>,
}

impl CorrelationLayer {
    pub fn new(config: CorrelationConfig) -> Self {
        CorrelationLayer { config: Arc::new(config) }
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService { inner, config: self.config.clone() }
    }
}

/// `tower::Service` wrapper that binds, measures, and clears per-request
/// context. Unlike `OtelTraceService`'s hand-rolled poll future, the
/// response future here must wrap the entire downstream call in
/// `with_fresh_context` so the context store's `tokio::task_local` is live
/// across every poll of the inner service, not just the synchronous `call`
/// — so the future is boxed rather than pin-projected.
#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
    config: Arc<CorrelationConfig>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Body,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let config = self.config.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let header_trace_id = req
            .headers()
            .get(config.trace_header_name.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let trace_id = header_trace_id.unwrap_or_else(generate_trace_id);
        let span_id = generate_span_id();
        let req_bytes = content_length(req.headers());
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let client_ip = extract_client_ip(&req);
        let user_agent = req
            .headers()
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Box::pin(with_fresh_context(async move {
            bind_context(ContextRecord {
                trace_id: Some(trace_id.clone()),
                span_id: Some(span_id),
                method: Some(method),
                path: Some(path),
                client_ip,
                user_agent,
                req_bytes: Some(req_bytes),
                ..Default::default()
            });

            let start = Instant::now();
            let result = inner.call(req).await;
            let latency_ms = round2(start.elapsed().as_secs_f64() * 1000.0);

            let outcome = match result {
                Ok(mut response) => {
                    let status_code = response.status().as_u16();
                    let res_bytes = response.body().size_hint().exact().unwrap_or(0);
                    bind_context(ContextRecord {
                        latency_ms: Some(latency_ms),
                        status_code: Some(status_code),
                        res_bytes: Some(res_bytes),
                        ..Default::default()
                    });
                    if let Ok(value) = HeaderValue::from_str(&trace_id) {
                        response.headers_mut().insert("x-trace-id", value);
                    }
                    if let Ok(value) = HeaderValue::from_str(&latency_ms.to_string()) {
                        response.headers_mut().insert("x-response-time-ms", value);
                    }
                    Ok(response)
                }
                Err(err) => {
                    bind_context(ContextRecord {
                        latency_ms: Some(latency_ms),
                        status_code: Some(500),
                        ..Default::default()
                    });
                    let record = fapilog_core::context::get_context();
                    match &config.on_exception {
                        Some(hook) => hook(record),
                        None => tracing::error!(trace_id = %trace_id, "unhandled error in downstream handler"),
                    }
                    Err(err)
                }
            };

            clear_context();
            outcome
        }))
    }
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn extract_client_ip<B>(req: &Request<B>) -> Option<String> {
    if let Some(addr) = req.extensions().get::<SocketAddr>() {
        return Some(addr.ip().to_string());
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
}

/// Injects the current request scope's `trace_id` into `headers` under
/// `header_name`, for outbound HTTP client calls made inside a request
/// scope. Opt-in: the host application calls this explicitly (§4.8).
pub fn propagate_trace_header(headers: &mut HeaderMap, header_name: &str) {
    if let Some(trace_id) = fapilog_core::context::get_context().get_str(fapilog_core::event::KEY_TRACE_ID) {
        if let (Ok(name), Ok(value)) = (
            http::HeaderName::from_bytes(header_name.as_bytes()),
            HeaderValue::from_str(trace_id),
        ) {
            headers.insert(name, value);
        }
    }
}
