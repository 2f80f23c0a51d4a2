// src/gateway/proxy.rs
//! Connection forwarding
//!
//! Tunnels an inbound upgrade request to an acquired instance's DevTools
//! endpoint: replay the handshake against the browser, mirror its 101 back
//! to the client, then splice the two upgraded streams together. The
//! tunnel is protocol-agnostic; it never inspects the bytes.

use crate::browser::factory::BrowserFactory;
use crate::pool::scheduler::BrowserPool;
use crate::utils::errors::{PoolError, Result};
use bytes::Bytes;
use http_body_util::{Empty, Full};
use hyper::body::Body;
use hyper::{header, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Forward an upgrade request to a pooled instance.
///
/// Returns the 101 response to relay to the client; the spliced tunnel runs
/// detached. The job on the acquired instance is NOT ended here: the
/// instance's own top-level-target tracking decides when the browser is
/// free again, independent of how long the tunnel stays open.
pub async fn forward<F, B>(
    pool: &Arc<BrowserPool<F>>,
    mut req: Request<B>,
) -> Result<Response<Full<Bytes>>>
where
    F: BrowserFactory,
    B: Body + Send + 'static,
{
    let instance = pool.acquire().await?;
    let endpoint = instance.control_endpoint().ok_or_else(|| {
        PoolError::ControlChannel("acquired instance has no control endpoint".into())
    })?;

    match tunnel(&endpoint, &mut req).await {
        Ok(response) => Ok(response),
        Err(e) => {
            // The handshake never reached the browser; release the
            // instance instead of letting the job run out its deadline.
            instance.finish_job();
            Err(e)
        }
    }
}

async fn tunnel<B>(endpoint: &str, req: &mut Request<B>) -> Result<Response<Full<Bytes>>>
where
    B: Body + Send + 'static,
{
    let (authority, path) = split_ws_endpoint(endpoint)?;

    let stream = TcpStream::connect(&authority).await?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) =
        hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(io)
            .await
            .map_err(|e| PoolError::ControlChannel(format!("backend handshake: {e}")))?;
    tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            debug!(error = %e, "backend connection ended");
        }
    });

    let mut backend_req = Request::builder().method(req.method().clone()).uri(path);
    for (name, value) in req.headers() {
        if name != header::HOST {
            backend_req = backend_req.header(name, value);
        }
    }
    backend_req = backend_req.header(header::HOST, &authority);
    let backend_req = backend_req
        .body(Empty::<Bytes>::new())
        .map_err(|e| PoolError::ControlChannel(format!("building backend request: {e}")))?;

    let mut backend_res = sender
        .send_request(backend_req)
        .await
        .map_err(|e| PoolError::ControlChannel(format!("forwarding handshake: {e}")))?;

    if backend_res.status() != StatusCode::SWITCHING_PROTOCOLS {
        return Err(PoolError::ControlChannel(format!(
            "browser refused upgrade with status {}",
            backend_res.status()
        )));
    }

    let client_upgrade = hyper::upgrade::on(req);
    let backend_upgrade = hyper::upgrade::on(&mut backend_res);
    tokio::spawn(async move {
        match tokio::try_join!(client_upgrade, backend_upgrade) {
            Ok((client_io, backend_io)) => {
                let mut client_io = TokioIo::new(client_io);
                let mut backend_io = TokioIo::new(backend_io);
                match tokio::io::copy_bidirectional(&mut client_io, &mut backend_io).await {
                    Ok((to_browser, to_client)) => {
                        debug!(to_browser, to_client, "tunnel closed")
                    }
                    Err(e) => debug!(error = %e, "tunnel ended with error"),
                }
            }
            Err(e) => warn!(error = %e, "upgrade failed on one side of the tunnel"),
        }
    });

    let mut response = Response::builder().status(StatusCode::SWITCHING_PROTOCOLS);
    for (name, value) in backend_res.headers() {
        response = response.header(name, value);
    }
    response
        .body(Full::new(Bytes::new()))
        .map_err(|e| PoolError::ControlChannel(format!("building upgrade response: {e}")))
}

/// Split `ws://host:port/path` into the TCP authority and the request path.
fn split_ws_endpoint(endpoint: &str) -> Result<(String, String)> {
    let rest = endpoint
        .strip_prefix("ws://")
        .ok_or_else(|| PoolError::ControlChannel(format!("unsupported endpoint: {endpoint}")))?;
    match rest.split_once('/') {
        Some((authority, path)) => Ok((authority.to_string(), format!("/{path}"))),
        None => Ok((rest.to_string(), "/".to_string())),
    }
}
