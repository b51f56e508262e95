pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod errors;
pub mod live;
pub mod manager;
pub mod queries;
pub mod session;
pub mod state;

pub use api::RemoteCollectionClient;
pub use cache::LocalCache;
pub use client::TaskClient;
pub use config::ClientConfig;
pub use connectivity::{ConnectivityHandle, ConnectivityMonitor, ConnectivityStatus};
pub use errors::{ClientError, ClientResult};
pub use live::LiveUpdateChannel;
pub use manager::{TaskManager, TaskManagerHandle};
pub use session::SessionToken;
pub use state::{Action, FetchStatus, FetchedPage, ReplayOutcome, SaveStatus, TaskState};
