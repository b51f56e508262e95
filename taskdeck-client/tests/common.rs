#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;
use taskdeck_client::{
    ConnectivityStatus, LocalCache, RemoteCollectionClient, SessionToken, TaskManager,
    TaskManagerHandle, TaskState,
};
use tokio::sync::watch;
use wiremock::MockServer;

pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn task_json(id: &str, text: &str) -> Value {
    json!({"_id": id, "text": text})
}

/// A URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api", addr)
}

pub fn api_url(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

pub fn make_api(base_url: &str) -> RemoteCollectionClient {
    RemoteCollectionClient::new(base_url, SessionToken::anonymous(), Duration::from_secs(2))
        .unwrap()
}

pub struct TestManager {
    pub handle: TaskManagerHandle,
    pub cache: LocalCache,
    pub connectivity: watch::Sender<ConnectivityStatus>,
}

impl TestManager {
    pub fn set_online(&self, online: bool) {
        self.connectivity.send_replace(ConnectivityStatus::new(online));
    }

    pub async fn wait_for(&self, predicate: impl FnMut(&TaskState) -> bool) -> TaskState {
        let mut rx = self.handle.subscribe();
        let state = tokio::time::timeout(WAIT_LIMIT, rx.wait_for(predicate))
            .await
            .expect("timed out waiting for task state")
            .expect("manager stopped")
            .clone();
        state
    }

    /// Waits for the first fetch outcome after startup.
    pub async fn wait_until_settled(&self) -> TaskState {
        self.wait_for(|s| !s.is_fetching() && (s.loaded || s.fetch_error.is_some()))
            .await
    }
}

impl Drop for TestManager {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

pub async fn start_manager(base_url: &str, cache: LocalCache, online: bool) -> TestManager {
    start_manager_with_page_size(base_url, cache, online, 7).await
}

pub async fn start_manager_with_page_size(
    base_url: &str,
    cache: LocalCache,
    online: bool,
    page_size: usize,
) -> TestManager {
    let (connectivity, connectivity_rx) = watch::channel(ConnectivityStatus::new(online));
    let handle = TaskManager::spawn(make_api(base_url), cache.clone(), connectivity_rx, page_size);
    TestManager {
        handle,
        cache,
        connectivity,
    }
}

pub async fn count_requests(server: &MockServer, method: &str, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == method && request.url.path() == path)
        .count()
}

/// Polls the mock server until `expected` matching requests were received.
pub async fn wait_for_requests(server: &MockServer, method: &str, path: &str, expected: usize) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    loop {
        let seen = count_requests(server, method, path).await;
        if seen >= expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {} {} {} requests, saw {}",
            expected,
            method,
            path,
            seen
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
