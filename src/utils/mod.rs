//! Utility module - terminal styling, progress bars and logging setup

mod logging;
mod progress;
mod styling;

pub use logging::*;
pub use progress::*;
pub use styling::*;
