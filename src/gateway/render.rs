// src/gateway/render.rs
//! Template-to-PDF rendering
//!
//! The request/response sibling of connection forwarding: the gateway
//! renders a handlebars template with the caller's data, loads the result
//! in a short-lived browser context on an acquired instance, prints it to
//! PDF, and explicitly ends the job, since there is no browser navigation signal
//! to wait for on this path.
//!
//! Body parsing and template rendering happen before any instance is
//! acquired, so malformed requests are rejected without touching the pool.

use crate::browser::cdp::CdpClient;
use crate::browser::factory::{BrowserFactory, BrowserHandle};
use crate::pool::instance::BrowserInstance;
use crate::pool::scheduler::BrowserPool;
use crate::utils::errors::{PoolError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use handlebars::Handlebars;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::{header, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long the rendered page gets to finish loading.
const LOAD_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    /// Handlebars template source.
    pub template: String,
    /// Data the template is rendered with.
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub options: RenderOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            landscape: false,
            print_background: true,
            scale: 1.0,
        }
    }
}

/// Stateless template renderer shared across requests.
pub struct PdfRenderer {
    templates: Handlebars<'static>,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self {
            templates: Handlebars::new(),
        }
    }

    pub fn render_html(&self, request: &RenderRequest) -> Result<String> {
        self.templates
            .render_template(&request.template, &request.data)
            .map_err(|e| PoolError::InvalidRequest(format!("template: {e}")))
    }
}

pub fn parse_request(body: &[u8]) -> Result<RenderRequest> {
    serde_json::from_slice(body).map_err(|e| PoolError::InvalidRequest(format!("body: {e}")))
}

/// Serve one `POST /render` request.
pub async fn handle<F, B>(
    pool: &Arc<BrowserPool<F>>,
    renderer: &PdfRenderer,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>>
where
    F: BrowserFactory,
    B: Body + Send + 'static,
    B::Error: std::fmt::Display,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| PoolError::InvalidRequest(format!("reading body: {e}")))?
        .to_bytes();
    let request = parse_request(&body)?;
    let html = renderer.render_html(&request)?;

    // Only a well-formed, renderable request gets a browser.
    let instance = pool.acquire().await?;
    let result = print_to_pdf(&instance, &html, &request.options).await;
    instance.finish_job();
    let pdf = result?;

    debug!(bytes = pdf.len(), "rendered pdf");
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .body(Full::new(pdf))
        .map_err(|e| PoolError::RenderFailed(format!("building response: {e}")))
}

/// Drive the instance through a render: isolated context, data-URL page,
/// print, teardown.
async fn print_to_pdf<H: BrowserHandle>(
    instance: &Arc<BrowserInstance<H>>,
    html: &str,
    options: &RenderOptions,
) -> Result<Bytes> {
    let endpoint = instance.control_endpoint().ok_or_else(|| {
        PoolError::ControlChannel("acquired instance has no control endpoint".into())
    })?;
    let cdp = CdpClient::connect(&endpoint).await?;

    let context = cdp.call("Target.createBrowserContext", json!({})).await?;
    let context_id = required_str(&context, "browserContextId")?;
    let target = cdp
        .call(
            "Target.createTarget",
            json!({ "url": "about:blank", "browserContextId": context_id }),
        )
        .await?;
    let target_id = required_str(&target, "targetId")?;
    let attached = cdp
        .call(
            "Target.attachToTarget",
            json!({ "targetId": target_id, "flatten": true }),
        )
        .await?;
    let session = required_str(&attached, "sessionId")?;

    let mut events = cdp.subscribe();
    cdp.call_on(&session, "Page.enable", json!({})).await?;
    let page_url = format!("data:text/html;base64,{}", BASE64.encode(html.as_bytes()));
    cdp.call_on(&session, "Page.navigate", json!({ "url": page_url }))
        .await?;
    cdp.wait_event(&mut events, Some(&session), "Page.loadEventFired", LOAD_TIMEOUT)
        .await?;

    let printed = cdp
        .call_on(
            &session,
            "Page.printToPDF",
            json!({
                "landscape": options.landscape,
                "printBackground": options.print_background,
                "scale": options.scale,
            }),
        )
        .await?;
    let encoded = required_str(&printed, "data")?;
    let pdf = BASE64
        .decode(encoded)
        .map_err(|e| PoolError::RenderFailed(format!("pdf payload: {e}")))?;

    let _ = cdp
        .call("Target.closeTarget", json!({ "targetId": target_id }))
        .await;
    let _ = cdp
        .call(
            "Target.disposeBrowserContext",
            json!({ "browserContextId": context_id }),
        )
        .await;

    Ok(Bytes::from(pdf))
}

fn required_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| PoolError::ControlChannel(format!("response missing {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_malformed_body() {
        assert!(parse_request(b"not json").is_err());
        assert!(parse_request(b"{}").is_err()); // template is required
        assert!(parse_request(br#"{"template": 3}"#).is_err());
    }

    #[test]
    fn test_parse_defaults() {
        let request = parse_request(br#"{"template": "<p>hi</p>"}"#).unwrap();
        assert_eq!(request.template, "<p>hi</p>");
        assert!(request.data.is_null());
        assert!(!request.options.landscape);
        assert!(request.options.print_background);
        assert_eq!(request.options.scale, 1.0);
    }

    #[test]
    fn test_parse_options() {
        let request = parse_request(
            br#"{"template": "x", "data": {"n": 1}, "options": {"landscape": true, "scale": 0.5}}"#,
        )
        .unwrap();
        assert!(request.options.landscape);
        assert_eq!(request.options.scale, 0.5);
        assert!(request.options.print_background);
    }

    #[test]
    fn test_render_template_with_data() {
        let renderer = PdfRenderer::new();
        let request = parse_request(
            br#"{"template": "<h1>{{title}}</h1>", "data": {"title": "Invoice 7"}}"#,
        )
        .unwrap();
        assert_eq!(renderer.render_html(&request).unwrap(), "<h1>Invoice 7</h1>");
    }

    #[test]
    fn test_render_bad_template_is_client_error() {
        let renderer = PdfRenderer::new();
        let request = parse_request(br#"{"template": "{{#if}}broken"}"#).unwrap();
        let err = renderer.render_html(&request).unwrap_err();
        assert!(matches!(err, PoolError::InvalidRequest(_)));
    }
}
