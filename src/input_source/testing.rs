//! In-memory input source directory for tests

use std::sync::{Arc, Mutex};

use super::{InputSourceDirectory, InputSourceError};

#[derive(Default)]
struct FakeState {
    installed: Vec<String>,
    current: Option<String>,
    selections: Vec<String>,
}

/// A directory whose installed sources and active source tests control
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDirectory {
    pub fn new(installed: &[&str]) -> Self {
        let directory = Self::default();
        directory.state.lock().unwrap().installed =
            installed.iter().map(|id| id.to_string()).collect();
        directory
    }

    pub fn set_current(&self, id: &str) {
        self.state.lock().unwrap().current = Some(id.to_string());
    }

    pub fn current(&self) -> Option<String> {
        self.state.lock().unwrap().current.clone()
    }

    /// Remove a source after handles to it may have been cached
    pub fn uninstall(&self, id: &str) {
        self.state.lock().unwrap().installed.retain(|source| source != id);
    }

    /// Every successful select, in order
    pub fn selections(&self) -> Vec<String> {
        self.state.lock().unwrap().selections.clone()
    }
}

impl InputSourceDirectory for FakeDirectory {
    type Source = String;

    fn sources(&self) -> Vec<String> {
        self.state.lock().unwrap().installed.clone()
    }

    fn current_id(&self) -> Option<String> {
        self.current()
    }

    fn select(&self, source: &String) -> Result<(), InputSourceError> {
        let mut state = self.state.lock().unwrap();
        if !state.installed.contains(source) {
            return Err(InputSourceError::SelectFailed {
                id: source.clone(),
                status: -50,
            });
        }
        state.current = Some(source.clone());
        state.selections.push(source.clone());
        Ok(())
    }
}
