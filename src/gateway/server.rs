// src/gateway/server.rs
//! Gateway HTTP server
//!
//! Accepts inbound connections and routes them:
//!
//! - requests carrying an `Upgrade` header are tunneled to an acquired
//!   instance's DevTools endpoint
//! - `POST /render` drives a template-to-PDF job
//! - `GET /status` reports pool counters
//!
//! Anything malformed is rejected before the pool is touched. Failures on
//! either work path surface as a 5xx to the caller; the gateway process
//! itself never goes down with a request.

use crate::browser::factory::BrowserFactory;
use crate::gateway::render::{self, PdfRenderer};
use crate::gateway::proxy;
use crate::pool::scheduler::BrowserPool;
use crate::utils::errors::PoolError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

pub struct GatewayServer<F: BrowserFactory> {
    pool: Arc<BrowserPool<F>>,
    renderer: PdfRenderer,
}

impl<F: BrowserFactory> GatewayServer<F> {
    pub fn new(pool: Arc<BrowserPool<F>>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            renderer: PdfRenderer::new(),
        })
    }

    /// Accept and serve connections until the task is dropped.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> crate::utils::errors::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "gateway listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let gateway = Arc::clone(&self);
                    tokio::spawn(async move {
                        debug!(%peer, "accepted connection");
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let gateway = Arc::clone(&gateway);
                            async move { Ok::<_, Infallible>(gateway.handle(req).await) }
                        });
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, service)
                            .with_upgrades()
                            .await
                        {
                            debug!(error = %e, "connection closed with error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "failed to accept connection"),
            }
        }
    }

    pub(crate) async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        if req.headers().contains_key(header::UPGRADE) {
            return match proxy::forward(&self.pool, req).await {
                Ok(response) => response,
                Err(e) => {
                    error!(error = %e, "connection forwarding failed");
                    error_response(&e)
                }
            };
        }

        match (req.method(), req.uri().path()) {
            (&Method::POST, "/render") => {
                match render::handle(&self.pool, &self.renderer, req).await {
                    Ok(response) => response,
                    Err(e) => {
                        if !matches!(e, PoolError::InvalidRequest(_)) {
                            error!(error = %e, "render failed");
                        }
                        error_response(&e)
                    }
                }
            }
            (&Method::GET, "/status") => self.status(),
            (_, "/render") | (_, "/status") => {
                plain_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
            }
            _ => plain_response(StatusCode::NOT_FOUND, "not found"),
        }
    }

    fn status(&self) -> Response<Full<Bytes>> {
        let stats = self.pool.stats();
        let body = serde_json::to_vec(&stats).unwrap_or_else(|_| b"{}".to_vec());
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|_| plain_response(StatusCode::INTERNAL_SERVER_ERROR, ""))
    }
}

fn error_response(error: &PoolError) -> Response<Full<Bytes>> {
    match error {
        PoolError::InvalidRequest(detail) => plain_response(
            StatusCode::BAD_REQUEST,
            &format!("invalid request: {detail}"),
        ),
        PoolError::PoolStopped => {
            plain_response(StatusCode::SERVICE_UNAVAILABLE, "service is shutting down")
        }
        _ => plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "issue communicating with browser instance",
        ),
    }
}

fn plain_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .expect("static response must build")
}
