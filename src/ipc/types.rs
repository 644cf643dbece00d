use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::PortalConfig;
use crate::error::PortalError;
use crate::guard::Session;
use crate::snapshot::{self, Backend, MemorySnapshot, SnapshotStore};
use crate::store::{self, Collection, Store};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Store,
    pub snapshot: Box<dyn SnapshotStore>,
    pub session: Option<Session>,
    pub backend: Backend,
    pub seed_demo: bool,
}

impl AppState {
    pub fn new(config: &PortalConfig) -> anyhow::Result<Self> {
        let mut state = AppState {
            workspace: None,
            store: Store::default(),
            snapshot: Box::new(MemorySnapshot),
            session: None,
            backend: config.backend,
            seed_demo: config.seed_demo,
        };
        match &config.workspace {
            Some(ws) => state.select_workspace(ws, config.backend)?,
            None => state.seed_if_empty()?,
        }
        Ok(state)
    }

    /// Switches to the persisted store under `path`, loading it in full.
    /// Any login belongs to the previous store and is dropped.
    pub fn select_workspace(&mut self, path: &Path, backend: Backend) -> anyhow::Result<()> {
        let snap = snapshot::open(backend, path)?;
        self.switch_to(path, backend, snap)
    }

    /// Loads (and if needed seeds) `snap` before touching any field, so a
    /// failure leaves the previous workspace and session in place.
    fn switch_to(
        &mut self,
        path: &Path,
        backend: Backend,
        snap: Box<dyn SnapshotStore>,
    ) -> anyhow::Result<()> {
        let mut loaded = snap.load()?;
        if self.wants_seed(&loaded) {
            loaded = seeded(loaded, snap.as_ref())?;
        }
        self.snapshot = snap;
        self.store = loaded;
        self.workspace = Some(path.to_path_buf());
        self.backend = backend;
        self.session = None;
        tracing::info!(
            workspace = %path.display(),
            backend = %backend,
            users = self.store.users.len(),
            "workspace selected"
        );
        Ok(())
    }

    fn wants_seed(&self, store: &Store) -> bool {
        self.seed_demo && store.users.is_empty()
    }

    fn seed_if_empty(&mut self) -> anyhow::Result<()> {
        if self.wants_seed(&self.store) {
            self.store = seeded(self.store.clone(), self.snapshot.as_ref())?;
        }
        Ok(())
    }

    /// Runs one mutation against the store and persists the collection it
    /// touches. If the write fails the collection is put back as it was.
    pub fn mutate<T>(
        &mut self,
        collection: Collection,
        op: impl FnOnce(&mut Store) -> Result<T, PortalError>,
    ) -> Result<T, PortalError> {
        let before = self.store.clone();
        let out = op(&mut self.store)?;
        if let Err(e) = self.snapshot.persist(&self.store, collection) {
            store::restore(&mut self.store, &before, collection);
            tracing::error!(collection = collection.as_str(), error = %format!("{e:#}"), "persist failed");
            return Err(PortalError::Storage(e));
        }
        Ok(out)
    }
}

fn seeded(mut store: Store, snap: &dyn SnapshotStore) -> anyhow::Result<Store> {
    store.seed_demo();
    snap.persist_all(&store)?;
    tracing::info!("seeded demo accounts");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;

    /// Loads an empty store and refuses every write.
    struct ReadOnlySnapshot;

    impl SnapshotStore for ReadOnlySnapshot {
        fn backend(&self) -> &'static str {
            "read-only"
        }

        fn load(&self) -> anyhow::Result<Store> {
            Ok(Store::default())
        }

        fn persist(&self, _store: &Store, collection: Collection) -> anyhow::Result<()> {
            anyhow::bail!("disk full while writing {}", collection.as_str())
        }
    }

    fn demo_state() -> AppState {
        AppState::new(&PortalConfig::default()).expect("in-memory state")
    }

    fn subject_of(store: &Store, teacher: &str) -> String {
        store
            .subjects
            .values()
            .find(|s| s.teacher_id == teacher)
            .map(|s| s.id.clone())
            .expect("subject")
    }

    #[test]
    fn failed_persist_rolls_back_every_collection() {
        let mut state = demo_state();
        let t1 = Session::new(state.store.users["t1"].clone());
        let maths = subject_of(&state.store, "t1");
        state.snapshot = Box::new(ReadOnlySnapshot);

        for collection in Collection::ALL {
            let before = state.store.clone();
            let res = match collection {
                Collection::Users => state
                    .mutate(collection, |s| s.create_user("s9", "pw", "New", "student").map(|_| ())),
                Collection::Subjects => state
                    .mutate(collection, |s| s.create_subject("Art", "t2"))
                    .map(|_| ()),
                Collection::Marks => state
                    .mutate(collection, |s| s.record_mark(&t1, "s1", &maths, "77"))
                    .map(|_| ()),
                Collection::Config => state
                    .mutate(collection, |s| Ok(s.toggle_publication()))
                    .map(|_| ()),
            };
            let e = res.expect_err("persist must fail");
            assert_eq!(e.code(), "storage_failed", "{}", collection.as_str());
            assert_eq!(state.store, before, "{} not restored", collection.as_str());
        }
    }

    #[test]
    fn failed_seed_keeps_previous_workspace() {
        let mut state = demo_state();
        let admin = state.store.users["admin"].clone();
        state.session = Some(Session::new(admin));
        let before = state.store.clone();

        let dir = std::env::temp_dir().join("resultsd-unwritable-ws");
        state
            .switch_to(&dir, Backend::Csv, Box::new(ReadOnlySnapshot))
            .expect_err("seed persist fails");

        assert!(state.workspace.is_none());
        assert_eq!(state.store, before);
        assert_eq!(state.snapshot.backend(), "memory");
        assert_eq!(
            state.session.as_ref().map(|s| s.role()),
            Some(Role::Admin)
        );
    }

    #[test]
    fn switch_seeds_empty_workspace() {
        let mut state = demo_state();
        let dir = std::env::temp_dir().join("resultsd-memory-ws");
        state
            .switch_to(&dir, Backend::Csv, Box::new(MemorySnapshot))
            .expect("switch");
        assert_eq!(state.workspace.as_deref(), Some(dir.as_path()));
        assert_eq!(state.store.users.len(), 5);
        assert!(state.session.is_none());
    }
}
