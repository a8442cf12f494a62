//! HTTP front end for [`Gateway`].
//!
//! Parameters come from the query string; a form-encoded body adds any
//! parameter the query did not set, and any other non-empty body becomes the
//! `data` parameter. Store calls block, so each request is handed to the
//! blocking pool.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use super::{CORS_HEADERS, Envelope, Gateway, Params, RequestContext, RequestMethod, Response, render};
use crate::cloud_adapters::CloudSpreadsheetService;

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Accepts connections on `listener` until `shutdown` resolves.
pub async fn serve<S, F>(
    gateway: Arc<Gateway<S>>,
    listener: TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    S: CloudSpreadsheetService + Send + 'static,
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "Gateway listening");
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move {
                    let service = service_fn(move |req| handle(Arc::clone(&gateway), req));
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await
                    {
                        debug!(%peer, error = %e, "Connection closed with error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Gateway shutting down");
                return Ok(());
            }
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

async fn handle<S>(
    gateway: Arc<Gateway<S>>,
    req: Request<Incoming>,
) -> Result<hyper::Response<Full<Bytes>>, Infallible>
where
    S: CloudSpreadsheetService + Send + 'static,
{
    let method = match *req.method() {
        Method::OPTIONS => return Ok(to_http(StatusCode::OK, Response::preflight())),
        Method::GET => RequestMethod::Get,
        Method::POST => RequestMethod::Post,
        Method::DELETE => RequestMethod::Delete,
        ref other => {
            warn!(method = %other, "Unsupported method");
            let body = render(&Envelope::error("Method not allowed"), None);
            return Ok(to_http(StatusCode::METHOD_NOT_ALLOWED, body));
        }
    };

    let mut params = query_params(req.uri().query());
    let is_form = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE));
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            let callback = params.get("callback").map(String::as_str);
            let body = render(&Envelope::error("Request body could not be read"), callback);
            return Ok(to_http(StatusCode::OK, body));
        }
    };
    merge_body(&mut params, &body, is_form);

    let ctx = RequestContext::new(method);
    let response = tokio::task::spawn_blocking(move || gateway.handle(&ctx, &params))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "Request handler panicked");
            render(&Envelope::error("Internal server error"), None)
        });
    Ok(to_http(StatusCode::OK, response))
}

fn query_params(query: Option<&str>) -> Params {
    form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .into_owned()
        .collect()
}

fn merge_body(params: &mut Params, body: &[u8], is_form: bool) {
    if body.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    if is_form {
        for (key, value) in form_urlencoded::parse(body) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
    } else {
        params
            .entry("data".to_string())
            .or_insert_with(|| String::from_utf8_lossy(body).into_owned());
    }
}

fn to_http(status: StatusCode, response: Response) -> hyper::Response<Full<Bytes>> {
    let mut http = hyper::Response::new(Full::new(Bytes::from(response.body)));
    *http.status_mut() = status;
    let headers = http.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if let Some(content_type) = response.content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    http
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_is_decoded() {
        let params = query_params(Some("action=get&sheet=Income&callback=cb%5F1"));
        assert_eq!(params.get("sheet").map(String::as_str), Some("Income"));
        assert_eq!(params.get("callback").map(String::as_str), Some("cb_1"));
        assert!(query_params(None).is_empty());
    }

    #[test]
    fn form_body_does_not_override_query() {
        let mut params = query_params(Some("sheet=Income"));
        merge_body(&mut params, b"sheet=Expenses&data=%7B%7D", true);
        assert_eq!(params.get("sheet").map(String::as_str), Some("Income"));
        assert_eq!(params.get("data").map(String::as_str), Some("{}"));
    }

    #[test]
    fn raw_body_becomes_data() {
        let mut params = Params::new();
        merge_body(&mut params, br#"{"Amount":"5"}"#, false);
        assert_eq!(params.get("data").map(String::as_str), Some(r#"{"Amount":"5"}"#));

        let mut params = Params::new();
        merge_body(&mut params, b"  \n", false);
        assert!(params.is_empty());
    }

    #[test]
    fn every_response_carries_cors_headers() {
        let http = to_http(StatusCode::OK, Response::preflight());
        assert_eq!(http.headers()["access-control-allow-origin"], "*");
        assert_eq!(http.headers()["access-control-max-age"], "86400");
        assert!(http.headers().get(CONTENT_TYPE).is_none());
    }
}
