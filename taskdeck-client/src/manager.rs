use crate::api::RemoteCollectionClient;
use crate::cache::LocalCache;
use crate::connectivity::ConnectivityStatus;
use crate::errors::{ClientError, ClientResult};
use crate::state::{Action, FetchedPage, ReplayOutcome, TaskState};
use taskdeck_core::{is_local_id, Page, PendingOperation, Task, TaskDraft};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug)]
enum Command {
    RequestPage(usize),
    LoadNextPage,
    LoadPreviousPage,
    Refresh,
    AddTask(TaskDraft),
    UpdateTask(Task),
    RemoveTask(String),
    Shutdown,
}

/// Results of network work spawned by the actor, applied in arrival order.
#[derive(Debug)]
enum Completion {
    Fetched {
        seq: u64,
        offset: usize,
        result: ClientResult<Page>,
    },
    Added {
        draft: TaskDraft,
        result: ClientResult<Task>,
    },
    Updated {
        task: Task,
        result: ClientResult<Task>,
    },
    Removed {
        id: String,
        result: ClientResult<()>,
    },
    Replayed {
        remaining: usize,
    },
    ReplayFinished {
        completed: usize,
    },
}

/// Cloneable handle used by the UI and background triggers to drive the
/// task list.
#[derive(Clone, Debug)]
pub struct TaskManagerHandle {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<TaskState>,
    shutdown: CancellationToken,
}

impl TaskManagerHandle {
    async fn send(&self, command: Command) -> ClientResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// Loads the page starting at `offset`, superseding any fetch in flight.
    pub async fn request_page(&self, offset: usize) -> ClientResult<()> {
        self.send(Command::RequestPage(offset)).await
    }

    pub async fn load_next_page(&self) -> ClientResult<()> {
        self.send(Command::LoadNextPage).await
    }

    pub async fn load_previous_page(&self) -> ClientResult<()> {
        self.send(Command::LoadPreviousPage).await
    }

    /// Reloads the page currently shown.
    pub async fn refresh(&self) -> ClientResult<()> {
        self.send(Command::Refresh).await
    }

    pub async fn add_task(&self, draft: TaskDraft) -> ClientResult<()> {
        self.send(Command::AddTask(draft)).await
    }

    pub async fn update_task(&self, task: Task) -> ClientResult<()> {
        self.send(Command::UpdateTask(task)).await
    }

    pub async fn remove_task(&self, id: impl Into<String>) -> ClientResult<()> {
        self.send(Command::RemoveTask(id.into())).await
    }

    pub fn state(&self) -> TaskState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        let _ = self.commands.try_send(Command::Shutdown);
    }
}

/// Actor owning the task list state, the page cache and the pending queue.
pub struct TaskManager {
    api: RemoteCollectionClient,
    cache: LocalCache,
    state: TaskState,
    state_tx: watch::Sender<TaskState>,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions: mpsc::UnboundedReceiver<Completion>,
    connectivity: watch::Receiver<ConnectivityStatus>,
    was_online: bool,
    fetch_seq: u64,
    fetch_cancel: Option<CancellationToken>,
    replay_running: bool,
    replay_requested: bool,
    shutdown: CancellationToken,
}

impl TaskManager {
    pub fn spawn(
        api: RemoteCollectionClient,
        cache: LocalCache,
        connectivity: watch::Receiver<ConnectivityStatus>,
        page_size: usize,
    ) -> TaskManagerHandle {
        let state = TaskState::new(page_size);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let manager = Self {
            api,
            cache,
            state,
            state_tx,
            commands,
            completions_tx,
            completions,
            connectivity,
            was_online: false,
            fetch_seq: 0,
            fetch_cancel: None,
            replay_running: false,
            replay_requested: false,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(manager.run());

        TaskManagerHandle {
            commands: commands_tx,
            state_rx,
            shutdown,
        }
    }

    async fn run(mut self) {
        self.hydrate().await;
        self.request_page(0).await;

        self.was_online = self.connectivity.borrow_and_update().is_online();
        if self.was_online {
            self.start_replay().await;
        }

        let mut connectivity_open = true;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion).await;
                }
                changed = self.connectivity.changed(), if connectivity_open => {
                    if changed.is_err() {
                        debug!("MANAGER: Connectivity source dropped");
                        connectivity_open = false;
                    } else {
                        self.on_connectivity_changed().await;
                    }
                }
            }
        }

        if let Some(cancel) = self.fetch_cancel.take() {
            cancel.cancel();
        }
        self.shutdown.cancel();
        info!("MANAGER: Stopped");
    }

    /// Shows the last cached page before the first network round trip.
    async fn hydrate(&mut self) {
        let cached = self.cache.load_page().await;
        if !cached.is_empty() {
            info!(
                "MANAGER: Hydrating {} cached tasks at offset {}",
                cached.tasks.len(),
                cached.offset
            );
            self.state.apply(Action::FetchSucceeded(FetchedPage::from(cached)));
        }

        let pending = self.cache.load_pending_ops().await.len();
        self.state.apply(Action::PendingChanged(pending));
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    /// Applies one action, mirrors a changed page to the cache and publishes
    /// the new snapshot.
    async fn dispatch(&mut self, action: Action) {
        let before = self.state.cached_page();
        self.state.apply(action);

        let after = self.state.cached_page();
        if before != after {
            self.cache.save_page(&after).await;
        }
        self.publish();
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::RequestPage(offset) => self.request_page(offset).await,
            Command::LoadNextPage => {
                if self.state.is_fetching() {
                    return;
                }
                if let Some(offset) = self.state.window.next_offset() {
                    self.request_page(offset).await;
                }
            }
            Command::LoadPreviousPage => {
                if self.state.is_fetching() {
                    return;
                }
                if let Some(offset) = self.state.window.previous_offset() {
                    self.request_page(offset).await;
                }
            }
            Command::Refresh => self.request_page(self.state.offset()).await,
            Command::AddTask(draft) => self.add_task(draft).await,
            Command::UpdateTask(task) => self.update_task(task).await,
            Command::RemoveTask(id) => self.remove_task(id).await,
            Command::Shutdown => {}
        }
    }

    async fn request_page(&mut self, offset: usize) {
        if let Some(previous) = self.fetch_cancel.take() {
            previous.cancel();
        }
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let cancel = self.shutdown.child_token();
        self.fetch_cancel = Some(cancel.clone());

        self.dispatch(Action::FetchStarted).await;

        let api = self.api.clone();
        let limit = self.state.window.page_size;
        let tx = self.completions_tx.clone();
        debug!("MANAGER: Requesting page at offset {} (#{})", offset, seq);
        tokio::spawn(async move {
            let result = api.list(limit, offset, &cancel).await;
            let _ = tx.send(Completion::Fetched {
                seq,
                offset,
                result,
            });
        });
    }

    async fn add_task(&mut self, draft: TaskDraft) {
        self.dispatch(Action::SaveStarted).await;

        let api = self.api.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = api.create(&draft).await;
            let _ = tx.send(Completion::Added { draft, result });
        });
    }

    async fn update_task(&mut self, task: Task) {
        self.dispatch(Action::SaveStarted).await;

        let api = self.api.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = api.update(&task).await;
            let _ = tx.send(Completion::Updated { task, result });
        });
    }

    async fn remove_task(&mut self, id: String) {
        if id.is_empty() {
            return;
        }
        self.dispatch(Action::RemoveStarted).await;

        let api = self.api.clone();
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = api.remove(&id).await;
            let _ = tx.send(Completion::Removed { id, result });
        });
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched {
                seq,
                offset,
                result,
            } => self.on_fetched(seq, offset, result).await,
            Completion::Added { draft, result } => match result {
                Ok(task) => {
                    self.dispatch(Action::SaveSucceeded(task)).await;
                    self.request_page(self.state.offset()).await;
                }
                Err(e) => {
                    warn!("MANAGER: Create failed, keeping task locally: {}", e);
                    let local = Task::local_from_draft(draft);
                    self.dispatch(Action::SaveSucceeded(local.clone())).await;
                    self.enqueue(PendingOperation::Create { task: local }).await;
                    self.dispatch(Action::SaveFailed(e.into())).await;
                }
            },
            Completion::Updated { task, result } => match result {
                Ok(task) => {
                    self.dispatch(Action::SaveSucceeded(task)).await;
                    self.request_page(self.state.offset()).await;
                }
                Err(e) => {
                    warn!("MANAGER: Update of {:?} failed, queueing: {}", task.id, e);
                    let pending = task.with_pending_update();
                    self.dispatch(Action::SaveSucceeded(pending.clone())).await;
                    self.enqueue(PendingOperation::Update { task: pending }).await;
                    self.dispatch(Action::SaveFailed(e.into())).await;
                }
            },
            Completion::Removed { id, result } => match result {
                Ok(()) => {
                    self.dispatch(Action::RemoveSucceeded(id)).await;
                    self.request_page(self.state.offset()).await;
                }
                Err(e) => {
                    warn!("MANAGER: Delete of {} failed, queueing: {}", id, e);
                    self.dispatch(Action::RemoveSucceeded(id.clone())).await;
                    self.enqueue(PendingOperation::Delete { id }).await;
                    self.dispatch(Action::RemoveFailed(e.into())).await;
                }
            },
            Completion::Replayed { remaining } => {
                self.dispatch(Action::PendingChanged(remaining)).await;
            }
            Completion::ReplayFinished { completed } => {
                self.replay_running = false;
                let remaining = self.cache.load_pending_ops().await.len();
                info!(
                    "MANAGER: Replay finished, {} completed, {} remaining",
                    completed, remaining
                );
                self.dispatch(Action::ReplayFinished(ReplayOutcome {
                    completed,
                    remaining,
                }))
                .await;

                if completed > 0 {
                    self.request_page(self.state.offset()).await;
                }
                if std::mem::take(&mut self.replay_requested) && self.was_online {
                    self.start_replay().await;
                }
            }
        }
    }

    async fn on_fetched(&mut self, seq: u64, offset: usize, result: ClientResult<Page>) {
        if seq != self.fetch_seq {
            debug!("MANAGER: Dropping stale page #{} (current #{})", seq, self.fetch_seq);
            return;
        }

        match result {
            Ok(page) => {
                self.fetch_cancel = None;
                self.dispatch(Action::FetchSucceeded(FetchedPage::from(page)))
                    .await;
            }
            Err(e) if e.is_cancelled() => {
                debug!("MANAGER: Page #{} cancelled", seq);
            }
            Err(e) => {
                self.fetch_cancel = None;
                let cached = self.cache.load_page().await;
                if cached.offset == offset && !cached.is_empty() {
                    warn!(
                        "MANAGER: Fetch at offset {} failed, serving cached page: {}",
                        offset, e
                    );
                    self.dispatch(Action::FetchSucceeded(FetchedPage::from(cached)))
                        .await;
                } else {
                    warn!("MANAGER: Fetch at offset {} failed: {}", offset, e);
                    self.dispatch(Action::FetchFailed(e.into())).await;
                }
            }
        }
    }

    async fn enqueue(&mut self, op: PendingOperation) {
        let len = self.cache.enqueue(op).await;
        self.dispatch(Action::PendingChanged(len)).await;
    }

    async fn on_connectivity_changed(&mut self) {
        let online = self.connectivity.borrow_and_update().is_online();
        let came_online = online && !self.was_online;
        self.was_online = online;

        if came_online {
            info!("MANAGER: Back online");
            self.start_replay().await;
        } else if !online {
            debug!("MANAGER: Offline");
        }
    }

    async fn start_replay(&mut self) {
        if self.replay_running {
            self.replay_requested = true;
            return;
        }

        let ops = self.cache.load_pending_ops().await;
        if ops.is_empty() {
            return;
        }

        info!("MANAGER: Replaying {} pending operations", ops.len());
        self.replay_running = true;
        self.dispatch(Action::ReplayStarted).await;

        let replay = Replay {
            api: self.api.clone(),
            cache: self.cache.clone(),
            connectivity: self.connectivity.clone(),
            shutdown: self.shutdown.clone(),
            tx: self.completions_tx.clone(),
        };
        tokio::spawn(replay.run(ops));
    }
}

/// Sequential pass over a snapshot of the pending queue. Each success drops
/// the queue head straight away, even when the manager is already gone.
struct Replay {
    api: RemoteCollectionClient,
    cache: LocalCache,
    connectivity: watch::Receiver<ConnectivityStatus>,
    shutdown: CancellationToken,
    tx: mpsc::UnboundedSender<Completion>,
}

impl Replay {
    async fn run(self, ops: Vec<PendingOperation>) {
        let mut completed = 0;

        for op in ops {
            if self.shutdown.is_cancelled() {
                debug!("MANAGER: Replay interrupted by shutdown");
                break;
            }
            if !self.connectivity.borrow().is_online() {
                debug!("MANAGER: Replay interrupted, went offline");
                break;
            }

            match self.replay_one(&op).await {
                Ok(()) => {
                    completed += 1;
                    let remaining = self.cache.pop_front().await;
                    if self.tx.send(Completion::Replayed { remaining }).is_err() {
                        debug!("MANAGER: Manager stopped during replay");
                        return;
                    }
                }
                Err(e) => {
                    warn!(
                        "MANAGER: Replay stopped at {} {:?}: {}",
                        op.action(),
                        op.task_id(),
                        e
                    );
                    break;
                }
            }
        }

        let _ = self.tx.send(Completion::ReplayFinished { completed });
    }

    async fn replay_one(&self, op: &PendingOperation) -> ClientResult<()> {
        match op {
            PendingOperation::Create { task } => {
                self.api.create(&task.draft()).await?;
            }
            PendingOperation::Update { task } if task.has_server_id() => {
                self.api.update(task).await?;
            }
            PendingOperation::Update { task } => {
                self.api.create(&task.draft()).await?;
            }
            PendingOperation::Delete { id } if id.is_empty() || is_local_id(id) => {
                debug!("MANAGER: Skipping delete of unsaved task {:?}", id);
            }
            PendingOperation::Delete { id } => {
                self.api.remove(id).await?;
            }
        }
        Ok(())
    }
}
