use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    error::PrefsError,
    models::{WorldId, WorldVocabulary},
    pointer::FallbackPointer,
};

use super::xml::{self, DocumentError};

/// Owns discovery, reading and atomic rewriting of Zwift's `prefs.xml`.
pub struct PreferencesStore {
    candidates: Vec<PathBuf>,
    pointer: FallbackPointer,
    element: String,
    vocabulary: WorldVocabulary,
    location: Option<PathBuf>,
}

impl PreferencesStore {
    /// Build a store and resolve its location immediately.
    pub fn new(
        candidates: Vec<PathBuf>,
        pointer: FallbackPointer,
        element: impl Into<String>,
        vocabulary: WorldVocabulary,
    ) -> Self {
        let mut store = Self {
            candidates,
            pointer,
            element: element.into(),
            vocabulary,
            location: None,
        };
        store.location = store.locate();
        store
    }

    /// Build a store from configuration.
    pub fn from_config(config: &AppConfig, vocabulary: WorldVocabulary) -> Self {
        Self::new(
            config.prefs_candidates.clone(),
            FallbackPointer::new(&config.pointer_path),
            config.world_element.clone(),
            vocabulary,
        )
    }

    /// Probe the default candidates in order, then the remembered path.
    ///
    /// Does not change the store's current location.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(found) = self.candidates.iter().find(|path| path.is_file()) {
            debug!(path = %found.display(), "Found prefs.xml at default location");
            return Some(found.clone());
        }

        match self.pointer.load() {
            Ok(Some(remembered)) if remembered.is_file() => {
                debug!(path = %remembered.display(), "Using remembered prefs.xml");
                return Some(remembered);
            }
            Ok(Some(remembered)) => {
                warn!(path = %remembered.display(), "Remembered prefs.xml no longer exists");
            }
            Ok(None) => {}
            Err(err) => warn!(?err, "Failed to read remembered prefs.xml path"),
        }

        warn!(
            candidates = self.candidates.len(),
            "prefs.xml not found in any known location"
        );
        None
    }

    /// Re-run discovery and adopt its result.
    pub fn relocate(&mut self) -> Option<&Path> {
        self.location = self.locate();
        self.location.as_deref()
    }

    /// Currently resolved preferences file.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// World names and ids accepted by [`set_world`](Self::set_world).
    pub fn vocabulary(&self) -> &WorldVocabulary {
        &self.vocabulary
    }

    /// Adopt a user-chosen file and remember it for future runs.
    ///
    /// A failure to write the pointer is logged; the selection still applies
    /// to this session.
    pub fn select_explicit(&mut self, path: impl AsRef<Path>) -> &Path {
        let path = path.as_ref();
        let resolved = fs::canonicalize(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "Could not canonicalise selected path");
            absolutize(path)
        });

        if let Err(err) = self.pointer.persist(&resolved) {
            error!(?err, pointer = %self.pointer.path().display(), "Failed to remember prefs.xml path");
        }
        info!(path = %resolved.display(), "prefs.xml selected");
        self.location.insert(resolved)
    }

    /// World id currently stored in the preferences file.
    pub fn current_world(&self) -> Result<WorldId, PrefsError> {
        self.read_world().map_err(|err| {
            warn!(path = ?self.location, %err, "Failed to read current world");
            err
        })
    }

    /// Store `id` as the current world using a temp-file-then-rename commit.
    pub fn set_world(&self, id: WorldId) -> Result<(), PrefsError> {
        self.set_world_with(id, replace_atomically)
    }

    fn set_world_with<F>(&self, id: WorldId, replace: F) -> Result<(), PrefsError>
    where
        F: FnOnce(NamedTempFile, &Path) -> io::Result<()>,
    {
        let result = self.write_world(id, replace);
        match &result {
            Ok(()) => info!(
                world = %self.vocabulary.display_name(id),
                path = ?self.location,
                "World updated"
            ),
            Err(err) => error!(world = id, path = ?self.location, %err, "Failed to update world"),
        }
        result
    }

    fn read_world(&self) -> Result<WorldId, PrefsError> {
        let path = self.location.as_deref().ok_or(PrefsError::Unresolved)?;
        let doc = read_document(path)?;
        let text = xml::read_element(&doc, &self.element)
            .map_err(|err| parse_error(path, err))?
            .ok_or_else(|| PrefsError::MissingElement {
                path: path.to_path_buf(),
                element: self.element.clone(),
            })?;
        text.trim()
            .parse::<WorldId>()
            .map_err(|_| PrefsError::InvalidValue {
                path: path.to_path_buf(),
                element: self.element.clone(),
                value: text.clone(),
            })
    }

    fn write_world<F>(&self, id: WorldId, replace: F) -> Result<(), PrefsError>
    where
        F: FnOnce(NamedTempFile, &Path) -> io::Result<()>,
    {
        let path = self.location.as_deref().ok_or(PrefsError::Unresolved)?;
        if !self.vocabulary.contains(id) {
            return Err(PrefsError::UnknownWorld(id));
        }

        let doc = read_document(path)?;
        let updated = xml::replace_element_text(&doc, &self.element, &id.to_string())
            .map_err(|err| parse_error(path, err))?
            .ok_or_else(|| PrefsError::MissingElement {
                path: path.to_path_buf(),
                element: self.element.clone(),
            })?;

        commit(path, &updated, replace).map_err(|source| PrefsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn read_document(path: &Path) -> Result<String, PrefsError> {
    fs::read_to_string(path).map_err(|source| PrefsError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_error(path: &Path, err: DocumentError) -> PrefsError {
    PrefsError::Parse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Write `contents` to a sibling temp file, then hand it to `replace`.
///
/// The temp file is removed if anything fails before it is persisted.
fn commit<F>(path: &Path, contents: &[u8], replace: F) -> io::Result<()>
where
    F: FnOnce(NamedTempFile, &Path) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".prefs.")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }
    replace(temp, path)
}

fn replace_atomically(temp: NamedTempFile, path: &Path) -> io::Result<()> {
    temp.persist(path).map(|_| ()).map_err(|err| err.error)
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    const PREFS: &str = "<?xml version='1.0' encoding='utf-8'?>\n<ZWIFT><SOUND>1</SOUND><WORLD>2</WORLD></ZWIFT>";

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            Ok(Self { dir: tempdir()? })
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn write_prefs(&self, name: &str, contents: &str) -> Result<PathBuf> {
            let path = self.path(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents)?;
            Ok(path)
        }

        fn store(&self, candidates: Vec<PathBuf>) -> PreferencesStore {
            PreferencesStore::new(
                candidates,
                FallbackPointer::new(self.path("state/last_prefs_path")),
                "WORLD",
                WorldVocabulary::default(),
            )
        }
    }

    #[test]
    fn reads_world_from_selected_file() -> Result<()> {
        let fixture = Fixture::new()?;
        let prefs = fixture.write_prefs("prefs.xml", PREFS)?;
        let mut store = fixture.store(Vec::new());
        assert!(store.location().is_none());

        store.select_explicit(&prefs);
        assert_eq!(store.current_world()?, 2);
        Ok(())
    }

    #[test]
    fn set_then_get_round_trips_every_world() -> Result<()> {
        let fixture = Fixture::new()?;
        let prefs = fixture.write_prefs("prefs.xml", PREFS)?;
        let store = fixture.store(vec![prefs.clone()]);

        let ids: Vec<WorldId> = store.vocabulary().iter().map(|world| world.id).collect();
        for id in ids {
            store.set_world(id)?;
            assert_eq!(store.current_world()?, id);
        }
        let contents = fs::read_to_string(&prefs)?;
        assert!(contents.contains("<SOUND>1</SOUND>"));
        Ok(())
    }

    #[test]
    fn unknown_world_is_rejected_without_touching_file() -> Result<()> {
        let fixture = Fixture::new()?;
        let prefs = fixture.write_prefs("prefs.xml", PREFS)?;
        let store = fixture.store(vec![prefs.clone()]);

        let err = store.set_world(6).unwrap_err();
        assert_eq!(err.kind(), FailureKind::ValidationFailure);
        assert_eq!(fs::read_to_string(&prefs)?, PREFS);
        assert_eq!(store.current_world()?, 2);
        Ok(())
    }

    #[test]
    fn failed_replace_leaves_original_intact() -> Result<()> {
        let fixture = Fixture::new()?;
        let prefs = fixture.write_prefs("prefs.xml", PREFS)?;
        let store = fixture.store(vec![prefs.clone()]);
        let before = fs::read(&prefs)?;

        let err = store
            .set_world_with(5, |temp, _| {
                assert!(temp.path().is_file());
                Err(io::Error::new(io::ErrorKind::Other, "simulated crash"))
            })
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::WriteFailure);
        assert_eq!(fs::read(&prefs)?, before);
        let leftovers: Vec<_> = fs::read_dir(fixture.dir.path())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    fn unresolved_location_fails_soft() -> Result<()> {
        let fixture = Fixture::new()?;
        let store = fixture.store(vec![fixture.path("missing/prefs.xml")]);
        assert!(store.location().is_none());
        assert_eq!(
            store.current_world().unwrap_err().kind(),
            FailureKind::UnresolvedLocation
        );
        assert_eq!(
            store.set_world(1).unwrap_err().kind(),
            FailureKind::UnresolvedLocation
        );
        Ok(())
    }

    #[test]
    fn malformed_or_incomplete_documents_fail_soft() -> Result<()> {
        let fixture = Fixture::new()?;
        let broken = fixture.write_prefs("broken.xml", "<ZWIFT><WORLD>2</ZWIFT>")?;
        let missing = fixture.write_prefs("missing.xml", "<ZWIFT><SOUND>1</SOUND></ZWIFT>")?;
        let garbage = fixture.write_prefs("garbage.xml", "<ZWIFT><WORLD>soon</WORLD></ZWIFT>")?;
        let trailing = fixture.write_prefs(
            "trailing.xml",
            "<ZWIFT><WORLD>2</WORLD></ZWIFT>this is not xml",
        )?;
        let two_roots = fixture.write_prefs(
            "roots.xml",
            "<ZWIFT><WORLD>2</WORLD></ZWIFT><ZWIFT><WORLD>3</WORLD></ZWIFT>",
        )?;
        let entity = fixture.write_prefs(
            "entity.xml",
            "<ZWIFT><NAME>&bogus;</NAME><WORLD>2</WORLD></ZWIFT>",
        )?;

        for path in [&broken, &missing, &garbage, &trailing, &two_roots, &entity] {
            let mut store = fixture.store(Vec::new());
            store.select_explicit(path);
            let before = fs::read(path)?;
            assert_eq!(
                store.current_world().unwrap_err().kind(),
                FailureKind::ParseFailure
            );
            if path != &garbage {
                assert!(store.set_world(3).is_err());
                assert_eq!(fs::read(path)?, before);
            }
        }
        Ok(())
    }

    #[test]
    fn unwritable_pointer_still_selects_for_session() -> Result<()> {
        let fixture = Fixture::new()?;
        let prefs = fixture.write_prefs("prefs.xml", PREFS)?;
        fs::write(fixture.path("state"), "not a directory")?;

        let mut store = fixture.store(Vec::new());
        let selected = store.select_explicit(&prefs).to_path_buf();
        assert_eq!(selected, fs::canonicalize(&prefs)?);
        assert_eq!(store.location(), Some(selected.as_path()));
        assert_eq!(store.current_world()?, 2);

        let restarted = fixture.store(Vec::new());
        assert_eq!(restarted.location(), None);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn replacement_keeps_file_mode() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new()?;
        let prefs = fixture.write_prefs("prefs.xml", PREFS)?;
        fs::set_permissions(&prefs, fs::Permissions::from_mode(0o600))?;
        let store = fixture.store(vec![prefs.clone()]);

        store.set_world(5)?;
        assert_eq!(store.current_world()?, 5);
        assert_eq!(fs::metadata(&prefs)?.permissions().mode() & 0o777, 0o600);

        fs::set_permissions(&prefs, fs::Permissions::from_mode(0o644))?;
        store.set_world(4)?;
        assert_eq!(fs::metadata(&prefs)?.permissions().mode() & 0o777, 0o644);
        Ok(())
    }

    #[test]
    fn default_candidate_beats_remembered_path() -> Result<()> {
        let fixture = Fixture::new()?;
        let default = fixture.write_prefs("default/prefs.xml", PREFS)?;
        let chosen = fixture.write_prefs("chosen/prefs.xml", PREFS)?;

        let mut store = fixture.store(Vec::new());
        store.select_explicit(&chosen);

        let store = fixture.store(vec![fixture.path("absent/prefs.xml"), default.clone()]);
        assert_eq!(store.location(), Some(default.as_path()));
        Ok(())
    }

    #[test]
    fn explicit_selection_survives_restart() -> Result<()> {
        let fixture = Fixture::new()?;
        let chosen = fixture.write_prefs("chosen/prefs.xml", PREFS)?;

        let mut store = fixture.store(vec![fixture.path("absent/prefs.xml")]);
        let selected = store.select_explicit(&chosen).to_path_buf();
        drop(store);

        let store = fixture.store(vec![fixture.path("absent/prefs.xml")]);
        assert_eq!(store.locate(), Some(selected.clone()));
        assert_eq!(store.location(), Some(selected.as_path()));
        assert_eq!(fs::canonicalize(&chosen)?, selected);
        Ok(())
    }

    #[test]
    fn remembered_path_to_deleted_file_is_ignored() -> Result<()> {
        let fixture = Fixture::new()?;
        let chosen = fixture.write_prefs("chosen/prefs.xml", PREFS)?;
        let mut store = fixture.store(Vec::new());
        store.select_explicit(&chosen);
        fs::remove_file(&chosen)?;

        let store = fixture.store(Vec::new());
        assert_eq!(store.location(), None);
        Ok(())
    }
}
