//! The room engine: tracks, the playback clock and timer scheduling.
//!
//! Nothing in here performs I/O, the collab crate drives it.

mod config;
mod playback;
mod scheduler;
mod track;
mod util;

pub use config::*;
pub use playback::*;
pub use scheduler::*;
pub use track::*;
pub use util::*;
