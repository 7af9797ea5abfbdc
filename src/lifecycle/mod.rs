//! Process lifecycle helpers

mod main_loop;
mod shutdown;

pub use main_loop::{MainLoop, MAIN_LOOP_SLICE};
pub use shutdown::ShutdownSignal;
