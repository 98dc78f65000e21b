//! Plie dance event discovery
//!
//! Facade over the workspace crates: device storage, the event model and
//! favourites repository, and the screen state that consumes them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod logging;

pub use app_core;
pub use app_state;
pub use storage;
