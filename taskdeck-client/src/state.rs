use taskdeck_core::{compute_has_more, CachedPage, Page, PageWindow, Task, TaskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
}

/// Result of one pass over the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub completed: usize,
    pub remaining: usize,
}

/// A page as observed by the manager, either fetched or read back from the
/// cache. Absent fields keep the current window values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPage {
    pub tasks: Vec<Task>,
    pub offset: Option<usize>,
    pub total: Option<usize>,
    pub limit: Option<usize>,
}

impl From<Page> for FetchedPage {
    fn from(page: Page) -> Self {
        Self {
            tasks: page.items,
            offset: Some(page.offset),
            total: page.total,
            limit: Some(page.limit),
        }
    }
}

impl From<CachedPage> for FetchedPage {
    fn from(page: CachedPage) -> Self {
        Self {
            tasks: page.tasks,
            offset: Some(page.offset),
            total: page.total,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchStarted,
    FetchSucceeded(FetchedPage),
    FetchFailed(TaskError),
    SaveStarted,
    SaveSucceeded(Task),
    SaveFailed(TaskError),
    RemoveStarted,
    RemoveSucceeded(String),
    RemoveFailed(TaskError),
    PendingChanged(usize),
    ReplayStarted,
    ReplayFinished(ReplayOutcome),
}

/// Everything the UI renders about the task list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    /// Set once any page, fetched or cached, has been observed.
    pub loaded: bool,
    pub fetching: FetchStatus,
    pub fetch_error: Option<TaskError>,
    pub saving: SaveStatus,
    pub save_error: Option<TaskError>,
    pub window: PageWindow,
    pub pending_operations: usize,
    pub replaying: bool,
    pub last_replay: Option<ReplayOutcome>,
}

impl TaskState {
    pub fn new(page_size: usize) -> Self {
        Self {
            window: PageWindow::new(page_size),
            ..Default::default()
        }
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching == FetchStatus::Loading
    }

    pub fn is_saving(&self) -> bool {
        self.saving == SaveStatus::Saving
    }

    pub fn has_more(&self) -> bool {
        self.window.has_more
    }

    pub fn offset(&self) -> usize {
        self.window.offset
    }

    pub fn cached_page(&self) -> CachedPage {
        CachedPage {
            tasks: self.tasks.clone(),
            offset: self.window.offset,
            total: self.window.total,
        }
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::FetchStarted => {
                self.fetching = FetchStatus::Loading;
                self.fetch_error = None;
            }
            Action::FetchSucceeded(page) => {
                let window = &mut self.window;
                window.offset = page.offset.unwrap_or(window.offset);
                window.total = page.total;
                if let Some(limit) = page.limit.filter(|limit| *limit > 0) {
                    window.page_size = limit;
                }
                window.has_more = compute_has_more(
                    window.offset,
                    page.tasks.len(),
                    window.total,
                    window.page_size,
                );

                self.tasks = page.tasks;
                self.fetching = FetchStatus::Idle;
                self.fetch_error = None;
                self.loaded = true;
            }
            Action::FetchFailed(error) => {
                self.fetching = FetchStatus::Idle;
                self.fetch_error = Some(error);
            }
            Action::SaveStarted | Action::RemoveStarted => {
                self.saving = SaveStatus::Saving;
                self.save_error = None;
            }
            Action::SaveSucceeded(task) => {
                self.merge(task);
                self.saving = SaveStatus::Idle;
            }
            Action::RemoveSucceeded(id) => {
                self.tasks.retain(|task| task.id.as_deref() != Some(id.as_str()));
                self.saving = SaveStatus::Idle;
            }
            Action::SaveFailed(error) | Action::RemoveFailed(error) => {
                self.saving = SaveStatus::Idle;
                self.save_error = Some(error);
            }
            Action::PendingChanged(len) => {
                self.pending_operations = len;
            }
            Action::ReplayStarted => {
                self.replaying = true;
            }
            Action::ReplayFinished(outcome) => {
                self.replaying = false;
                self.pending_operations = outcome.remaining;
                self.last_replay = Some(outcome);
            }
        }
    }

    /// Replaces the task with the same id in place, otherwise prepends it.
    fn merge(&mut self, task: Task) {
        let existing = task.id.as_deref().and_then(|id| {
            self.tasks
                .iter()
                .position(|candidate| candidate.id.as_deref() == Some(id))
        });

        match existing {
            Some(index) => self.tasks[index] = task,
            None => self.tasks.insert(0, task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_core::{PendingAction, TaskDraft};

    fn tasks(ids: &[&str]) -> Vec<Task> {
        ids.iter().map(|id| Task::new(*id, format!("Task {}", id))).collect()
    }

    fn ids(state: &TaskState) -> Vec<String> {
        state
            .tasks
            .iter()
            .map(|task| task.id.clone().unwrap_or_default())
            .collect()
    }

    fn loaded(ids: &[&str], offset: usize, total: Option<usize>) -> TaskState {
        let mut state = TaskState::new(7);
        state.apply(Action::FetchSucceeded(FetchedPage {
            tasks: tasks(ids),
            offset: Some(offset),
            total,
            limit: None,
        }));
        state
    }

    #[test]
    fn test_fetch_lifecycle() {
        let mut state = TaskState::new(7);
        assert!(!state.loaded);

        state.apply(Action::FetchStarted);
        assert!(state.is_fetching());

        state.apply(Action::FetchFailed(TaskError::Network("offline".into())));
        assert!(!state.is_fetching());
        assert_eq!(state.fetch_error, Some(TaskError::Network("offline".into())));
        assert!(!state.loaded);

        state.apply(Action::FetchStarted);
        assert_eq!(state.fetch_error, None);
    }

    #[test]
    fn test_envelope_page_sets_window() {
        let mut state = TaskState::new(7);
        state.apply(Action::FetchStarted);
        state.apply(Action::FetchSucceeded(FetchedPage::from(Page {
            items: tasks(&["t1", "t2"]),
            offset: 0,
            total: Some(10),
            limit: 2,
        })));

        assert!(state.loaded);
        assert!(!state.is_fetching());
        assert_eq!(ids(&state), vec!["t1", "t2"]);
        assert_eq!(state.window.page_size, 2);
        assert_eq!(state.window.total, Some(10));
        assert!(state.has_more());
    }

    #[test]
    fn test_known_total_last_page() {
        let state = loaded(&["a", "b", "c"], 7, Some(10));
        assert!(!state.has_more());
    }

    #[test]
    fn test_unknown_total_uses_page_length() {
        let full = loaded(&["1", "2", "3", "4", "5", "6", "7"], 0, None);
        assert!(full.has_more());

        let short = loaded(&["1", "2"], 7, None);
        assert!(!short.has_more());
    }

    #[test]
    fn test_fetch_replaces_total() {
        let mut state = loaded(&["a"], 0, Some(10));
        state.apply(Action::FetchSucceeded(FetchedPage {
            tasks: tasks(&["b"]),
            offset: None,
            total: None,
            limit: None,
        }));

        assert_eq!(state.window.total, None);
        assert_eq!(state.offset(), 0);
    }

    #[test]
    fn test_save_merges_by_id() {
        let mut state = loaded(&["a", "b"], 0, Some(2));

        state.apply(Action::SaveStarted);
        assert!(state.is_saving());
        state.apply(Action::SaveSucceeded(Task::new("b", "renamed")));
        assert_eq!(ids(&state), vec!["a", "b"]);
        assert_eq!(state.tasks[1].text, "renamed");
        assert!(!state.is_saving());

        state.apply(Action::SaveSucceeded(Task::new("c", "new")));
        assert_eq!(ids(&state), vec!["c", "a", "b"]);

        state.apply(Action::SaveSucceeded(Task::from(TaskDraft::new("no id"))));
        assert_eq!(state.tasks.len(), 4);
        assert_eq!(state.tasks[0].id, None);
    }

    #[test]
    fn test_failed_save_keeps_local_task() {
        let mut state = loaded(&["a"], 0, Some(1));
        let local = Task::local_from_draft(TaskDraft::new("offline"));

        state.apply(Action::SaveStarted);
        state.apply(Action::SaveSucceeded(local.clone()));
        state.apply(Action::SaveFailed(TaskError::Network("down".into())));

        assert_eq!(state.tasks[0], local);
        assert_eq!(state.tasks[0].pending_action, Some(PendingAction::Create));
        assert_eq!(state.save_error, Some(TaskError::Network("down".into())));
        assert!(!state.is_saving());
    }

    #[test]
    fn test_remove_filters_by_id() {
        let mut state = loaded(&["a", "srv-1", "b"], 0, Some(3));

        state.apply(Action::RemoveStarted);
        assert!(state.is_saving());
        state.apply(Action::RemoveSucceeded("srv-1".into()));
        assert_eq!(ids(&state), vec!["a", "b"]);

        state.apply(Action::RemoveSucceeded("missing".into()));
        assert_eq!(ids(&state), vec!["a", "b"]);

        state.apply(Action::RemoveFailed(TaskError::Network("down".into())));
        assert!(state.save_error.is_some());
        assert!(!state.is_saving());
    }

    #[test]
    fn test_replay_bookkeeping() {
        let mut state = TaskState::new(7);
        state.apply(Action::PendingChanged(3));
        state.apply(Action::ReplayStarted);
        assert!(state.replaying);

        let outcome = ReplayOutcome {
            completed: 2,
            remaining: 1,
        };
        state.apply(Action::ReplayFinished(outcome));
        assert!(!state.replaying);
        assert_eq!(state.pending_operations, 1);
        assert_eq!(state.last_replay, Some(outcome));
    }

    #[test]
    fn test_cached_page_mirrors_window() {
        let state = loaded(&["a", "b"], 14, Some(16));
        let page = state.cached_page();
        assert_eq!(page.offset, 14);
        assert_eq!(page.total, Some(16));
        assert_eq!(page.tasks.len(), 2);

        let mut restored = TaskState::new(7);
        restored.apply(Action::FetchSucceeded(FetchedPage::from(page)));
        assert_eq!(restored.tasks, state.tasks);
        assert_eq!(restored.window, state.window);
    }
}
