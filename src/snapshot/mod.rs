//! Load-everything-at-start, rewrite-a-collection-per-mutation persistence.

pub mod csv_files;
mod sqlite;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::{Collection, Store};

pub use csv_files::CsvSnapshot;
pub use sqlite::SqliteSnapshot;

pub const PUBLISHED_KEY: &str = "results_published";

pub trait SnapshotStore {
    fn backend(&self) -> &'static str;

    fn load(&self) -> anyhow::Result<Store>;

    /// Rewrites one collection in full from `store`.
    fn persist(&self, store: &Store, collection: Collection) -> anyhow::Result<()>;

    fn persist_all(&self, store: &Store) -> anyhow::Result<()> {
        for c in Collection::ALL {
            self.persist(store, c)?;
        }
        Ok(())
    }
}

/// No durability: the store lives and dies with the process.
#[derive(Debug, Default)]
pub struct MemorySnapshot;

impl SnapshotStore for MemorySnapshot {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> anyhow::Result<Store> {
        Ok(Store::default())
    }

    fn persist(&self, _store: &Store, _collection: Collection) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Csv,
    Sqlite,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Csv => "csv",
            Backend::Sqlite => "sqlite",
        })
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Backend::Csv),
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(anyhow::anyhow!("unknown backend: {other}")),
        }
    }
}

pub fn open(backend: Backend, workspace: &Path) -> anyhow::Result<Box<dyn SnapshotStore>> {
    Ok(match backend {
        Backend::Csv => Box::new(CsvSnapshot::open(workspace)?),
        Backend::Sqlite => Box::new(SqliteSnapshot::open(workspace)?),
    })
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(anyhow::anyhow!("invalid boolean for {PUBLISHED_KEY}: {other}")),
    }
}

fn check_mark(student_id: &str, subject_id: &str, marks: i64) -> anyhow::Result<u8> {
    match u8::try_from(marks) {
        Ok(v) if v <= crate::store::MAX_MARK => Ok(v),
        _ => Err(anyhow::anyhow!(
            "mark out of range for {student_id}/{subject_id}: {marks}"
        )),
    }
}
