use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{check_mark, parse_flag, SnapshotStore, PUBLISHED_KEY};
use crate::store::{Collection, MarkBook, Store, Subject, User};

pub const USERS_FILE: &str = "users.csv";
pub const SUBJECTS_FILE: &str = "subjects.csv";
pub const MARKS_FILE: &str = "marks.csv";
pub const CONFIG_FILE: &str = "config.csv";

const USERS_HEADER: [&str; 4] = ["username", "password", "role", "name"];
const SUBJECTS_HEADER: [&str; 3] = ["id", "name", "teacher_id"];
const MARKS_HEADER: [&str; 3] = ["student_id", "subject_id", "marks"];
const CONFIG_HEADER: [&str; 2] = ["key", "value"];

#[derive(Debug, Serialize, Deserialize)]
struct MarkRow {
    student_id: String,
    subject_id: String,
    marks: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigRow {
    key: String,
    value: String,
}

/// Flat tabular files in a workspace directory, one per collection.
#[derive(Debug, Clone)]
pub struct CsvSnapshot {
    dir: PathBuf,
}

impl CsvSnapshot {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace).with_context(|| {
            format!("failed to create workspace {}", workspace.to_string_lossy())
        })?;
        Ok(Self {
            dir: workspace.to_path_buf(),
        })
    }

    pub fn file_for(collection: Collection) -> &'static str {
        match collection {
            Collection::Users => USERS_FILE,
            Collection::Subjects => SUBJECTS_FILE,
            Collection::Marks => MARKS_FILE,
            Collection::Config => CONFIG_FILE,
        }
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(Self::file_for(collection))
    }
}

impl SnapshotStore for CsvSnapshot {
    fn backend(&self) -> &'static str {
        "csv"
    }

    fn load(&self) -> anyhow::Result<Store> {
        let mut store = Store::default();
        for c in Collection::ALL {
            let path = self.path(c);
            if !path.is_file() {
                continue;
            }
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
            decode_into(&mut store, c, &bytes)
                .with_context(|| format!("malformed rows in {}", path.to_string_lossy()))?;
        }
        tracing::debug!(dir = %self.dir.display(), users = store.users.len(), "loaded csv snapshot");
        Ok(store)
    }

    fn persist(&self, store: &Store, collection: Collection) -> anyhow::Result<()> {
        let bytes = encode(store, collection)?;
        let path = self.path(collection);
        write_atomic(&path, &bytes)?;
        tracing::debug!(file = %path.display(), "rewrote collection");
        Ok(())
    }
}

/// Renders one collection as CSV with its fixed header row.
pub fn encode(store: &Store, collection: Collection) -> anyhow::Result<Vec<u8>> {
    match collection {
        Collection::Users => write_rows(&USERS_HEADER, store.users.values()),
        Collection::Subjects => write_rows(&SUBJECTS_HEADER, store.subjects.values()),
        Collection::Marks => {
            let rows = store.marks.iter().flat_map(|(student, scores)| {
                scores.iter().map(move |(subject, &marks)| MarkRow {
                    student_id: student.clone(),
                    subject_id: subject.clone(),
                    marks: i64::from(marks),
                })
            });
            write_rows(&MARKS_HEADER, rows)
        }
        Collection::Config => write_rows(
            &CONFIG_HEADER,
            std::iter::once(ConfigRow {
                key: PUBLISHED_KEY.to_string(),
                value: store.results_published.to_string(),
            }),
        ),
    }
}

fn write_rows<T: Serialize>(
    header: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> anyhow::Result<Vec<u8>> {
    let mut w = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    w.write_record(header).context("failed to write header")?;
    for row in rows {
        w.serialize(row).context("failed to write row")?;
    }
    w.into_inner().context("failed to flush csv")
}

fn read_rows<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<Vec<T>> {
    let mut r = csv::Reader::from_reader(bytes);
    Ok(r.deserialize().collect::<Result<Vec<T>, _>>()?)
}

/// Replaces one collection of `store` with the rows in `bytes`.
pub fn decode_into(store: &mut Store, collection: Collection, bytes: &[u8]) -> anyhow::Result<()> {
    match collection {
        Collection::Users => {
            let rows: Vec<User> = read_rows(bytes)?;
            store.users = keyed(rows, "username", |u| u.username.as_str())?;
        }
        Collection::Subjects => {
            let rows: Vec<Subject> = read_rows(bytes)?;
            store.subjects = keyed(rows, "subject id", |s| s.id.as_str())?;
        }
        Collection::Marks => {
            let mut book = MarkBook::new();
            for m in read_rows::<MarkRow>(bytes)? {
                let v = check_mark(&m.student_id, &m.subject_id, m.marks)?;
                let previous = book
                    .entry(m.student_id.clone())
                    .or_insert_with(BTreeMap::new)
                    .insert(m.subject_id.clone(), v);
                if previous.is_some() {
                    anyhow::bail!(
                        "duplicate mark for student {:?} in subject {:?}",
                        m.student_id,
                        m.subject_id
                    );
                }
            }
            store.marks = book;
        }
        Collection::Config => {
            store.results_published = false;
            for c in read_rows::<ConfigRow>(bytes)? {
                if c.key == PUBLISHED_KEY {
                    store.results_published = parse_flag(&c.value)?;
                }
            }
        }
    }
    Ok(())
}

/// Indexes rows by `key`. A repeated key is an error, never last-row-wins.
fn keyed<T>(
    rows: Vec<T>,
    what: &str,
    key: impl Fn(&T) -> &str,
) -> anyhow::Result<BTreeMap<String, T>> {
    let mut out = BTreeMap::new();
    for row in rows {
        let k = key(&row).to_string();
        if out.contains_key(&k) {
            anyhow::bail!("duplicate {what} {k:?}");
        }
        out.insert(k, row);
    }
    Ok(out)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let tmp = path.with_extension("csv.tmp");
    let mut f = File::create(&tmp)
        .with_context(|| format!("failed to create {}", tmp.to_string_lossy()))?;
    f.write_all(bytes)
        .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
    f.flush()?;
    drop(f);
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.to_string_lossy()))?;
    Ok(())
}
