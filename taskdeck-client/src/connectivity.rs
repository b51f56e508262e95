use crate::errors::ClientResult;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    pub platform_online: bool,
    pub server_reachable: bool,
}

impl ConnectivityStatus {
    /// Status before any probe ran: reachability is assumed to follow the
    /// platform flag.
    pub fn new(platform_online: bool) -> Self {
        Self {
            platform_online,
            server_reachable: platform_online,
        }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    pub fn is_online(&self) -> bool {
        self.platform_online && self.server_reachable
    }
}

/// Combines the platform network flag with an active reachability probe of
/// the API base URL.
pub struct ConnectivityMonitor;

impl ConnectivityMonitor {
    pub fn start(
        probe_url: impl Into<String>,
        probe_interval: Duration,
        request_timeout: Duration,
        platform_online: bool,
    ) -> ClientResult<ConnectivityHandle> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        let (status_tx, _) = watch::channel(ConnectivityStatus::new(platform_online));
        let (platform_tx, platform_rx) = watch::channel(platform_online);
        let handle = ConnectivityHandle {
            status_tx: Arc::new(status_tx),
            platform_tx: Arc::new(platform_tx),
            shutdown: CancellationToken::new(),
        };

        let probe_loop = ProbeLoop {
            http,
            url: probe_url.into(),
            interval: probe_interval,
            status_tx: handle.status_tx.clone(),
            platform_rx,
            shutdown: handle.shutdown.clone(),
        };
        tokio::spawn(probe_loop.run());

        Ok(handle)
    }
}

#[derive(Clone, Debug)]
pub struct ConnectivityHandle {
    status_tx: Arc<watch::Sender<ConnectivityStatus>>,
    platform_tx: Arc<watch::Sender<bool>>,
    shutdown: CancellationToken,
}

impl ConnectivityHandle {
    pub fn status(&self) -> ConnectivityStatus {
        *self.status_tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status_tx.subscribe()
    }

    /// Feeds a platform network event. Going offline marks the server
    /// unreachable at once; going online waits for the next probe.
    pub fn set_platform_online(&self, online: bool) {
        if self.shutdown.is_cancelled() {
            return;
        }

        self.status_tx.send_if_modified(|status| {
            let next = ConnectivityStatus {
                platform_online: online,
                server_reachable: online && status.server_reachable,
            };
            let changed = *status != next;
            *status = next;
            changed
        });
        self.platform_tx.send_replace(online);
    }

    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("PROBE: Stopping connectivity monitor");
            self.shutdown.cancel();
        }
    }
}

struct ProbeLoop {
    http: reqwest::Client,
    url: String,
    interval: Duration,
    status_tx: Arc<watch::Sender<ConnectivityStatus>>,
    platform_rx: watch::Receiver<bool>,
    shutdown: CancellationToken,
}

impl ProbeLoop {
    async fn run(mut self) {
        loop {
            let platform_online = *self.platform_rx.borrow_and_update();

            if platform_online {
                let reachable = tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    reachable = probe(&self.http, &self.url) => reachable,
                };
                self.record(reachable);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = self.platform_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.interval), if platform_online => {}
            }
        }
        debug!("PROBE: Loop exited");
    }

    fn record(&self, reachable: bool) {
        if self.shutdown.is_cancelled() {
            return;
        }

        self.status_tx.send_if_modified(|status| {
            // A platform-offline event may have landed while the probe ran.
            if !status.platform_online || status.server_reachable == reachable {
                return false;
            }
            if reachable {
                info!("PROBE: Server reachable");
            } else {
                warn!("PROBE: Server unreachable");
            }
            status.server_reachable = reachable;
            true
        });
    }
}

/// Any HTTP response means the server answered; only transport failures
/// count as unreachable.
pub async fn probe(http: &reqwest::Client, url: &str) -> bool {
    let result = http
        .get(url)
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache")
        .send()
        .await;

    match result {
        Ok(response) => {
            debug!("PROBE: {} answered {}", url, response.status());
            true
        }
        Err(e) => {
            debug!("PROBE: {} failed: {}", url, e);
            false
        }
    }
}
