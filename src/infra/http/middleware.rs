use std::time::Instant;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const METRIC_HTTP_ERRORS: &str = "folio_http_error_total";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tag the request with an id and run the rest of the stack inside a span carrying it.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: Uuid::new_v4().to_string(),
    };
    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).instrument(span).await;
    response.extensions_mut().insert(ctx);
    response
}

/// What gets logged for a 4xx or 5xx response.
struct FailedResponse {
    status: StatusCode,
    method: Method,
    uri: Uri,
    elapsed_ms: u128,
    request_id: String,
    report: Option<ErrorReport>,
}

impl FailedResponse {
    fn emit(self) {
        let (source, chain) = match self.report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = chain
            .first()
            .map(String::as_str)
            .unwrap_or("no diagnostic available");
        let class = if self.status.is_server_error() { "5xx" } else { "4xx" };
        counter!(METRIC_HTTP_ERRORS, "class" => class).increment(1);

        if self.status.is_server_error() {
            error!(
                target: "folio::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                path = %self.uri.path(),
                query = self.uri.query().unwrap_or(""),
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %self.request_id,
                "request failed",
            );
        } else {
            warn!(
                target: "folio::http::response",
                status = self.status.as_u16(),
                method = %self.method,
                path = %self.uri.path(),
                query = self.uri.query().unwrap_or(""),
                elapsed_ms = self.elapsed_ms,
                source,
                detail,
                chain = ?chain,
                request_id = %self.request_id,
                "request rejected",
            );
        }
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        FailedResponse {
            status,
            method,
            uri,
            elapsed_ms: start.elapsed().as_millis(),
            request_id,
            report: response.extensions_mut().remove::<ErrorReport>(),
        }
        .emit();
    }

    response
}
