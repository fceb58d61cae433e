#![warn(clippy::all, missing_docs)]

//! Core logic for the Zwift world selector.
//!
//! This crate hosts the world vocabulary, configuration handling,
//! discovery and atomic updating of Zwift's `prefs.xml`, and the
//! scraper that resolves today's guest world rotation. Front ends
//! drive everything through [`WorldSelector`].

pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod pointer;
pub mod prefs;
pub mod schedule;

pub use app::WorldSelector;
pub use config::AppConfig;
pub use error::{FailureKind, PrefsError, ScheduleError};
pub use models::{World, WorldId, WorldVocabulary};
pub use pointer::FallbackPointer;
pub use prefs::PreferencesStore;
pub use schedule::{Rotation, ScheduleResolver};
