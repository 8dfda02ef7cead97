use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Method, StatusCode},
    response::Response,
};
use tower::{Layer, Service};
use tusk_blob::protocol;

use crate::headers::{TUS_EXTENSION, TUS_MAX_SIZE, TUS_RESUMABLE, TUS_VERSION};

/// Middleware that stamps protocol negotiation headers on every response.
///
/// Also answers `OPTIONS` with `204 No Content`, including CORS preflights
/// produced by an inner `CorsLayer`.
#[derive(Clone)]
pub struct TusHeaders {
    max_size: u64,
}

impl TusHeaders {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }
}

impl<S> Layer<S> for TusHeaders {
    type Service = TusHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TusHeadersService {
            inner,
            max_size: HeaderValue::from(self.max_size),
        }
    }
}

#[derive(Clone)]
pub struct TusHeadersService<S> {
    inner: S,
    max_size: HeaderValue,
}

impl<S> Service<Request<Body>> for TusHeadersService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let max_size = self.max_size.clone();
        let is_options = req.method() == Method::OPTIONS;

        Box::pin(async move {
            let mut res = inner.call(req).await?;

            if is_options && res.status().is_success() {
                *res.status_mut() = StatusCode::NO_CONTENT;
            }

            let headers = res.headers_mut();
            headers.insert(TUS_RESUMABLE, HeaderValue::from_static(protocol::TUS_RESUMABLE));
            headers.insert(TUS_VERSION, HeaderValue::from_static(protocol::TUS_VERSION));
            headers.insert(TUS_EXTENSION, HeaderValue::from_static(protocol::TUS_EXTENSIONS));
            headers.insert(TUS_MAX_SIZE, max_size);
            Ok(res)
        })
    }
}
