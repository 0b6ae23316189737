//! The live filtered view: the current query and the tasks it selects.
//!
//! Re-derived from the store after every change, so readers never see a
//! view older than the last committed mutation they observed.

use docket_tasks::{Task, TaskQuery, TaskStore};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct ViewState {
    query: TaskQuery,
    tasks: Vec<Task>,
    revision: u64,
}

/// Current query plus its filtered, sorted result.
#[derive(Debug, Default)]
pub struct LiveView {
    state: RwLock<ViewState>,
}

impl LiveView {
    /// Empty view with an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the query and re-derive.
    pub fn set_query(&self, query: TaskQuery, store: &TaskStore) {
        let mut state = self.state.write();
        state.query = query;
        Self::derive(&mut state, store);
    }

    /// Re-derive with the current query.
    pub fn refresh(&self, store: &TaskStore) {
        let mut state = self.state.write();
        Self::derive(&mut state, store);
    }

    /// Tasks selected by the current query, in display order.
    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().tasks.clone()
    }

    /// The current query.
    pub fn query(&self) -> TaskQuery {
        self.state.read().query.clone()
    }

    /// Bumped on every re-derivation.
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    fn derive(state: &mut ViewState, store: &TaskStore) {
        state.tasks = store.query(&state.query);
        state.revision += 1;
        debug!(
            revision = state.revision,
            visible = state.tasks.len(),
            "view re-derived"
        );
    }
}
