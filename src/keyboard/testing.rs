//! In-memory event source for tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::event::{Disposition, KeyEvent};
use super::tap::{deliver, EventSource, SharedProcessor, TapError, TapHandle, TapRequest};

#[derive(Default)]
struct FakeTaps {
    installed: HashMap<&'static str, (TapRequest, SharedProcessor)>,
    denied: HashSet<&'static str>,
    installs: usize,
    removals: usize,
    reenables: usize,
}

/// Records installed taps and lets tests push events through them
#[derive(Clone, Default)]
pub struct FakeEventSource {
    taps: Arc<Mutex<FakeTaps>>,
}

impl FakeEventSource {
    /// Make installs of the named tap fail like a denied permission
    pub fn deny(&self, name: &'static str) {
        self.taps.lock().unwrap().denied.insert(name);
    }

    pub fn allow(&self, name: &'static str) {
        self.taps.lock().unwrap().denied.remove(name);
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.taps.lock().unwrap().installed.contains_key(name)
    }

    pub fn request(&self, name: &str) -> Option<TapRequest> {
        self.taps
            .lock()
            .unwrap()
            .installed
            .get(name)
            .map(|(request, _)| *request)
    }

    /// Deliver an event to the named tap, if it is installed
    pub fn send(&self, name: &str, event: KeyEvent) -> Option<Disposition> {
        let processor = self
            .taps
            .lock()
            .unwrap()
            .installed
            .get(name)
            .map(|(_, processor)| Arc::clone(processor))?;
        let taps = Arc::clone(&self.taps);
        Some(deliver(name, &processor, &event, move || {
            taps.lock().unwrap().reenables += 1;
        }))
    }

    /// How many times a disabled tap was switched back on
    pub fn reenables(&self) -> usize {
        self.taps.lock().unwrap().reenables
    }

    pub fn installs(&self) -> usize {
        self.taps.lock().unwrap().installs
    }

    pub fn removals(&self) -> usize {
        self.taps.lock().unwrap().removals
    }
}

impl EventSource for FakeEventSource {
    fn install(
        &self,
        request: TapRequest,
        processor: SharedProcessor,
    ) -> Result<Box<dyn TapHandle>, TapError> {
        let mut taps = self.taps.lock().unwrap();
        if taps.denied.contains(request.name) {
            return Err(TapError::PermissionDenied {
                listener: request.name,
            });
        }
        taps.installed.insert(request.name, (request, processor));
        taps.installs += 1;
        Ok(Box::new(FakeTap {
            name: request.name,
            taps: Arc::clone(&self.taps),
            removed: false,
        }))
    }
}

struct FakeTap {
    name: &'static str,
    taps: Arc<Mutex<FakeTaps>>,
    removed: bool,
}

impl TapHandle for FakeTap {
    fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        let mut taps = self.taps.lock().unwrap();
        taps.installed.remove(self.name);
        taps.removals += 1;
    }
}

impl Drop for FakeTap {
    fn drop(&mut self) {
        self.remove();
    }
}
