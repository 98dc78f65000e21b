//! Application state management for Plie
//!
//! This crate owns the process-wide context and the screen state that
//! consumes favourites, kept in sync through the repository's change channel.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod screens;

pub use context::{AppConfig, AppContext, ContextError};
pub use screens::{EventListScreen, FavouritesScreen, FavouritesView, Mounted, ProfileScreen};
