//! Pipeline module - loading, preprocessing and splitting

pub mod dataset;
pub mod encoding;
pub mod error;
pub mod features;
pub mod frame;
pub mod loader;
pub mod missing;
pub mod preprocess;
pub mod scaling;
pub mod split;
pub mod target;

pub use dataset::*;
pub use encoding::*;
pub use error::BenchError;
pub use features::*;
pub use loader::*;
pub use missing::*;
pub use preprocess::*;
pub use scaling::*;
pub use split::*;
pub use target::*;
