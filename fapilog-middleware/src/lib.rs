mod ids;
mod layer;

pub use ids::{generate_span_id, generate_trace_id, round2};
pub use layer::{propagate_trace_header, CorrelationConfig, CorrelationLayer, CorrelationService, ExceptionHook};

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, Response, StatusCode};
    use bytes::Bytes;
    use http_body_util::Full;
    use std::convert::Infallible;
    use tower::{service_fn, Layer, Service, ServiceExt};

    fn test_service() -> impl tower::Service<
        Request<Full<Bytes>>,
        Response = Response<Full<Bytes>>,
        Error = Infallible,
        Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send>>,
    > + Clone {
        service_fn(|_req: Request<Full<Bytes>>| {
            Box::pin(async move {
                Ok(Response::builder().status(StatusCode::OK).body(Full::new(Bytes::from_static(b"hi"))).unwrap())
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response<Full<Bytes>>, Infallible>> + Send>>
        })
    }

    #[tokio::test]
    async fn binds_trace_id_and_sets_response_headers() {
        let layer = CorrelationLayer::new(CorrelationConfig::default());
        let mut service = layer.layer(test_service());

        let req = Request::builder().uri("/widgets").method("GET").body(Full::new(Bytes::new())).unwrap();
        let response = service.ready().await.unwrap().call(req).await.unwrap();

        assert!(response.headers().contains_key("x-trace-id"));
        assert!(response.headers().contains_key("x-response-time-ms"));
    }

    #[tokio::test]
    async fn adopts_incoming_trace_header() {
        let layer = CorrelationLayer::new(CorrelationConfig::default());
        let mut service = layer.layer(test_service());

        let req = Request::builder()
            .uri("/widgets")
            .header("X-Request-ID", "incoming-trace")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = service.ready().await.unwrap().call(req).await.unwrap();

        assert_eq!(response.headers().get("x-trace-id").unwrap(), "incoming-trace");
    }
}
