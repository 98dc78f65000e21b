//! Core application logic for Plie
//!
//! This crate contains the dance event model and the favourites repository
//! shared by the events, favourites and profile screens.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod events;
pub mod favourites;

pub use events::{Event, EventKey, Location};
pub use favourites::{
    FavouritesChange, FavouritesCollection, FavouritesConfig, FavouritesRepository, Outcome,
    PersistenceCondition, Toggled,
};
