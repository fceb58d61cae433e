//! Discovery and safe mutation of Zwift's `prefs.xml`.

/// Preferences store with location discovery and atomic writes.
pub mod store;
/// Event-stream access to the world element.
pub mod xml;

pub use store::PreferencesStore;
pub use xml::DocumentError;
