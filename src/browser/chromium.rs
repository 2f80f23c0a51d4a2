// src/browser/chromium.rs
//! Chromium launcher
//!
//! Spawns one headless Chromium subprocess per instance, discovers its
//! DevTools endpoint from stderr, and bridges DevTools target notifications
//! and process death into [`BrowserEvent`]s for the pool.

use crate::browser::cdp::CdpClient;
use crate::browser::factory::{
    BrowserEvent, BrowserFactory, BrowserHandle, TargetInfo, TargetKind,
};
use crate::utils::config::PoolConfig;
use crate::utils::errors::{PoolError, Result};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// How long Chromium gets to print its DevTools endpoint.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Binaries probed on PATH when no explicit executable is configured.
const EXECUTABLE_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

/// Launch flags for disposable, pool-managed instances.
const LAUNCH_FLAGS: &[&str] = &[
    "--headless",
    "--disable-gpu",
    "--disable-canvas-aa",
    "--disable-2d-canvas-clip-aa",
    "--disable-gl-drawing-for-tests",
    "--disable-dev-shm-usage",
    "--no-zygote",
    "--use-gl=swiftshader",
    "--enable-webgl",
    "--hide-scrollbars",
    "--mute-audio",
    "--no-first-run",
    "--disable-infobars",
    "--disable-breakpad",
    "--window-size=1280,1024",
    "--no-sandbox",
    "--disable-setuid-sandbox",
];

/// Factory producing Chromium-backed browser handles.
pub struct ChromiumFactory {
    executable: Option<String>,
}

impl ChromiumFactory {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            executable: config.chrome_path.clone(),
        }
    }

    fn resolve_executable(&self) -> Result<PathBuf> {
        if let Some(path) = &self.executable {
            return Ok(PathBuf::from(path));
        }
        for candidate in EXECUTABLE_CANDIDATES {
            if let Ok(path) = which::which(candidate) {
                return Ok(path);
            }
        }
        Err(PoolError::LaunchFailed(
            "no chromium executable found on PATH (set CHROME_PATH)".into(),
        ))
    }
}

impl BrowserFactory for ChromiumFactory {
    type Handle = ChromiumBrowser;

    async fn create_instance(&self) -> Result<ChromiumBrowser> {
        ChromiumBrowser::launch(self.resolve_executable()?).await
    }
}

/// Handle to one running Chromium process.
pub struct ChromiumBrowser {
    endpoint: String,
    pid: u32,
    events: Option<mpsc::UnboundedReceiver<BrowserEvent>>,
    cdp: CdpClient,
}

impl ChromiumBrowser {
    async fn launch(executable: PathBuf) -> Result<Self> {
        debug!(executable = %executable.display(), "spawning chromium");
        let mut child = Command::new(&executable)
            .args(LAUNCH_FLAGS)
            .arg("--remote-debugging-port=0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PoolError::LaunchFailed(format!("spawn {executable:?}: {e}")))?;

        let pid = child
            .id()
            .ok_or_else(|| PoolError::LaunchFailed("spawned process has no pid".into()))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PoolError::LaunchFailed("stderr not captured".into()))?;
        let mut stderr_lines = BufReader::new(stderr).lines();

        let endpoint = match tokio::time::timeout(
            LAUNCH_TIMEOUT,
            Self::read_endpoint(&mut stderr_lines),
        )
        .await
        {
            Ok(Ok(Some(endpoint))) => endpoint,
            Ok(Ok(None)) => {
                let _ = child.kill().await;
                return Err(PoolError::LaunchFailed(
                    "chromium exited before announcing its DevTools endpoint".into(),
                ));
            }
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(PoolError::LaunchFailed(format!("reading stderr: {e}")));
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(PoolError::LaunchFailed(
                    "timed out waiting for the DevTools endpoint".into(),
                ));
            }
        };

        // Keep draining stderr so the process never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = stderr_lines.next_line().await {
                trace!(pid, "{}", line);
            }
        });

        let cdp = CdpClient::connect(&endpoint).await?;
        cdp.call("Target.setDiscoverTargets", json!({ "discover": true }))
            .await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut protocol_events = cdp.subscribe();
        let mut closed = cdp.closed();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = protocol_events.recv() => match event {
                        Ok(event) => {
                            if let Some(mapped) = map_target_event(&event.method, &event.params) {
                                if events_tx.send(mapped).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(pid, missed, "target notifications dropped");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            let _ = events_tx.send(BrowserEvent::Disconnected);
                            return;
                        }
                    },
                    status = child.wait() => {
                        debug!(pid, status = ?status.ok(), "chromium exited");
                        let _ = events_tx.send(BrowserEvent::Disconnected);
                        return;
                    }
                    _ = closed.changed() => {
                        if *closed.borrow() {
                            let _ = events_tx.send(BrowserEvent::Disconnected);
                            return;
                        }
                    }
                }
            }
        });

        Ok(Self {
            endpoint,
            pid,
            events: Some(events_rx),
            cdp,
        })
    }

    async fn read_endpoint(
        lines: &mut tokio::io::Lines<BufReader<tokio::process::ChildStderr>>,
    ) -> std::io::Result<Option<String>> {
        while let Some(line) = lines.next_line().await? {
            trace!("{}", line);
            if let Some(index) = line.find("DevTools listening on ") {
                let endpoint = line[index + "DevTools listening on ".len()..].trim();
                return Ok(Some(endpoint.to_string()));
            }
        }
        Ok(None)
    }
}

impl BrowserHandle for ChromiumBrowser {
    fn control_endpoint(&self) -> &str {
        &self.endpoint
    }

    fn pid(&self) -> u32 {
        self.pid
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<BrowserEvent>> {
        self.events.take()
    }

    async fn reset(&self) -> Result<()> {
        let created = self
            .cdp
            .call("Target.createTarget", json!({ "url": "about:blank" }))
            .await?;
        let fresh = required_str(&created, "targetId")?;

        let targets = self.cdp.call("Target.getTargets", json!({})).await?;
        if let Some(infos) = targets.get("targetInfos").and_then(Value::as_array) {
            for info in infos {
                let id = info.get("targetId").and_then(Value::as_str).unwrap_or("");
                let kind = info.get("type").and_then(Value::as_str).unwrap_or("");
                if kind == "page" && id != fresh {
                    self.cdp
                        .call("Target.closeTarget", json!({ "targetId": id }))
                        .await?;
                }
            }
        }

        let attached = self
            .cdp
            .call(
                "Target.attachToTarget",
                json!({ "targetId": fresh, "flatten": true }),
            )
            .await?;
        let session = required_str(&attached, "sessionId")?;
        self.cdp
            .call_on(&session, "Network.clearBrowserCache", json!({}))
            .await?;
        self.cdp
            .call_on(&session, "Network.clearBrowserCookies", json!({}))
            .await?;
        let _ = self
            .cdp
            .call("Target.detachFromTarget", json!({ "sessionId": session }))
            .await;

        let contexts = self
            .cdp
            .call("Target.getBrowserContexts", json!({}))
            .await?;
        if let Some(ids) = contexts.get("browserContextIds").and_then(Value::as_array) {
            for id in ids.iter().filter_map(Value::as_str) {
                self.cdp
                    .call(
                        "Target.disposeBrowserContext",
                        json!({ "browserContextId": id }),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn terminate(&self) {
        debug!(pid = self.pid, "killing chromium process");
        self.cdp.shutdown();
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        if let Err(e) = kill(Pid::from_raw(self.pid as i32), Signal::SIGKILL) {
            debug!(pid = self.pid, error = %e, "process already gone");
        }
    }
}

fn map_target_event(method: &str, params: &Value) -> Option<BrowserEvent> {
    match method {
        "Target.targetCreated" => Some(BrowserEvent::TargetCreated(parse_target_info(
            params.get("targetInfo")?,
        )?)),
        "Target.targetInfoChanged" => Some(BrowserEvent::TargetChanged(parse_target_info(
            params.get("targetInfo")?,
        )?)),
        "Target.targetDestroyed" => Some(BrowserEvent::TargetDestroyed {
            target_id: params.get("targetId")?.as_str()?.to_string(),
        }),
        _ => None,
    }
}

fn parse_target_info(info: &Value) -> Option<TargetInfo> {
    Some(TargetInfo {
        target_id: info.get("targetId")?.as_str()?.to_string(),
        kind: match info.get("type")?.as_str()? {
            "page" => TargetKind::Page,
            "browser" => TargetKind::Browser,
            _ => TargetKind::Other,
        },
        url: info
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
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
    fn test_map_target_created() {
        let params = json!({
            "targetInfo": { "targetId": "T1", "type": "page", "url": "about:blank" }
        });
        match map_target_event("Target.targetCreated", &params) {
            Some(BrowserEvent::TargetCreated(info)) => {
                assert_eq!(info.target_id, "T1");
                assert_eq!(info.kind, TargetKind::Page);
                assert_eq!(info.url, "about:blank");
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_map_target_destroyed_carries_id_only() {
        let params = json!({ "targetId": "T9" });
        match map_target_event("Target.targetDestroyed", &params) {
            Some(BrowserEvent::TargetDestroyed { target_id }) => assert_eq!(target_id, "T9"),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_map_ignores_unrelated_methods() {
        assert!(map_target_event("Network.requestWillBeSent", &json!({})).is_none());
    }

    #[test]
    fn test_browser_target_kind() {
        let info = parse_target_info(&json!({
            "targetId": "B1", "type": "browser", "url": ""
        }))
        .unwrap();
        assert_eq!(info.kind, TargetKind::Browser);
    }
}
