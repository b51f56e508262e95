use crate::api::RemoteCollectionClient;
use crate::cache::LocalCache;
use crate::config::ClientConfig;
use crate::connectivity::{ConnectivityHandle, ConnectivityMonitor};
use crate::errors::ClientResult;
use crate::live::LiveUpdateChannel;
use crate::manager::{TaskManager, TaskManagerHandle};
use crate::session::SessionToken;
use taskdeck_core::PendingOperation;
use tokio::sync::mpsc;
use tracing::{debug, info};

const LIVE_EVENT_BUFFER: usize = 32;

/// Wires the cache, the API client, connectivity, the live channel and the
/// task manager together.
pub struct TaskClient {
    config: ClientConfig,
    session: SessionToken,
    cache: LocalCache,
    connectivity: ConnectivityHandle,
    tasks: TaskManagerHandle,
    live: Option<LiveUpdateChannel>,
}

impl TaskClient {
    pub async fn start(config: ClientConfig, session: SessionToken) -> ClientResult<Self> {
        let cache = LocalCache::open(&config.database_url).await?;
        let api = RemoteCollectionClient::new(
            config.api_url.clone(),
            session.clone(),
            config.request_timeout,
        )?;

        let connectivity = ConnectivityMonitor::start(
            config.api_url.clone(),
            config.probe_interval,
            config.request_timeout,
            true,
        )?;

        let tasks = TaskManager::spawn(
            api,
            cache.clone(),
            connectivity.subscribe(),
            config.page_size,
        );

        let live = config.ws_url.as_ref().map(|url| {
            let (events_tx, mut events_rx) = mpsc::channel(LIVE_EVENT_BUFFER);
            let channel = LiveUpdateChannel::spawn(
                url.clone(),
                session.clone(),
                events_tx,
                config.live_reconnect_delay,
            );

            let tasks = tasks.clone();
            tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    debug!("LIVE: {} received, refreshing", event.event);
                    if tasks.refresh().await.is_err() {
                        break;
                    }
                }
            });
            channel
        });

        info!("MANAGER: Task client started against {}", config.api_url);
        Ok(Self {
            config,
            session,
            cache,
            connectivity,
            tasks,
            live,
        })
    }

    pub fn tasks(&self) -> &TaskManagerHandle {
        &self.tasks
    }

    pub fn connectivity(&self) -> &ConnectivityHandle {
        &self.connectivity
    }

    pub fn session(&self) -> &SessionToken {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Operations still waiting to reach the server, in replay order.
    pub async fn pending_operations(&self) -> Vec<PendingOperation> {
        self.cache.load_pending_ops().await
    }

    pub fn shutdown(&self) {
        if let Some(live) = &self.live {
            live.close();
        }
        self.tasks.shutdown();
        self.connectivity.shutdown();
    }

    /// Stops everything, then forgets the cached page, the pending queue and
    /// the session token.
    pub async fn sign_out(self) {
        self.shutdown();
        self.cache.clear().await;
        self.session.clear();
        info!("MANAGER: Signed out, local data cleared");
    }
}

impl Drop for TaskClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
