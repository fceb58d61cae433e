//! Front-end facing operations.
//!
//! A UI holds one [`WorldSelector`], calls these methods and renders either
//! the value or `err.kind().user_message()`. Causes are already logged.

use std::path::Path;

use anyhow::Result;

use crate::{
    config::AppConfig,
    error::{PrefsError, ScheduleError},
    models::{World, WorldId, WorldVocabulary},
    prefs::PreferencesStore,
    schedule::{HtmlLines, HttpFetcher, Rotation, ScheduleResolver},
};

/// Preferences store and schedule resolver behind one handle.
pub struct WorldSelector {
    store: PreferencesStore,
    resolver: ScheduleResolver,
}

impl WorldSelector {
    /// Assemble a selector from its parts.
    pub fn new(store: PreferencesStore, resolver: ScheduleResolver) -> Self {
        Self { store, resolver }
    }

    /// Build the default store, HTTP fetcher and HTML line extractor.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let vocabulary = WorldVocabulary::default();
        let fetcher = HttpFetcher::new(config.fetch_timeout(), &config.user_agent)?;
        let resolver = ScheduleResolver::new(
            config.schedule_url.clone(),
            Box::new(fetcher),
            Box::new(HtmlLines),
            &vocabulary,
        );
        let store = PreferencesStore::from_config(config, vocabulary);
        Ok(Self::new(store, resolver))
    }

    /// Known worlds in display order.
    pub fn vocabulary(&self) -> &WorldVocabulary {
        self.store.vocabulary()
    }

    /// Resolved `prefs.xml`, if any.
    pub fn location(&self) -> Option<&Path> {
        self.store.location()
    }

    /// Re-run discovery of `prefs.xml`.
    pub fn locate(&mut self) -> Option<&Path> {
        self.store.relocate()
    }

    /// Use a manually chosen `prefs.xml` from now on.
    pub fn select_explicit(&mut self, path: impl AsRef<Path>) -> &Path {
        self.store.select_explicit(path)
    }

    /// World currently configured; unknown ids are named by their number.
    pub fn current_world(&self) -> Result<World, PrefsError> {
        let id = self.store.current_world()?;
        Ok(World {
            name: self.vocabulary().display_name(id),
            id,
        })
    }

    /// Switch to the world with identifier `id`.
    pub fn set_world(&self, id: WorldId) -> Result<World, PrefsError> {
        self.store.set_world(id)?;
        Ok(World {
            name: self.vocabulary().display_name(id),
            id,
        })
    }

    /// Switch to a world given by name or numeric id.
    pub fn set_world_by_input(&self, input: &str) -> Result<World, PrefsError> {
        let input = input.trim();
        let id = match input.parse::<WorldId>() {
            Ok(id) => id,
            Err(_) => self
                .vocabulary()
                .id_of(input)
                .ok_or_else(|| PrefsError::UnknownName(input.to_string()))?,
        };
        self.set_world(id)
    }

    /// Guest worlds on today's schedule.
    pub fn today_rotation(&self) -> Result<Rotation, ScheduleError> {
        self.resolver.resolve_today()
    }

    /// Guest worlds for an explicit day-of-month token.
    pub fn rotation_for_day(&self, token: &str) -> Result<Rotation, ScheduleError> {
        self.resolver.resolve_for_day(token)
    }
}
