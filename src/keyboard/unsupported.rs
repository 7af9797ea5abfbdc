//! Event source for platforms without keyboard taps
//!
//! Every install fails with [`TapError::Unsupported`], which leaves the
//! listeners in their degraded "unavailable" state.

use super::tap::{EventSource, SharedProcessor, TapError, TapHandle, TapRequest};

#[derive(Debug, Default)]
pub struct UnsupportedEventSource;

impl UnsupportedEventSource {
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for UnsupportedEventSource {
    fn install(
        &self,
        _request: TapRequest,
        _processor: SharedProcessor,
    ) -> Result<Box<dyn TapHandle>, TapError> {
        Err(TapError::Unsupported)
    }
}
