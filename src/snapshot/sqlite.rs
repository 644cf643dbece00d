use std::path::Path;

use anyhow::Context;
use rusqlite::Connection;

use super::{check_mark, parse_flag, SnapshotStore, PUBLISHED_KEY};
use crate::db;
use crate::store::{Collection, Role, Store, Subject, User};

/// The same four collections kept as tables of one SQLite file.
pub struct SqliteSnapshot {
    conn: Connection,
}

impl SqliteSnapshot {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace).with_context(|| {
            format!("failed to open database in {}", workspace.to_string_lossy())
        })?;
        Ok(Self { conn })
    }
}

impl SnapshotStore for SqliteSnapshot {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn load(&self) -> anyhow::Result<Store> {
        let mut store = Store::default();

        let mut stmt = self
            .conn
            .prepare("SELECT username, password, role, name FROM users ORDER BY username")?;
        let users = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (username, password, role, name) in users {
            let role: Role = role
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("bad role for user {username}"))?;
            store.users.insert(
                username.clone(),
                User {
                    username,
                    password,
                    role,
                    name,
                },
            );
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, name, teacher_id FROM subjects ORDER BY id")?;
        let subjects = stmt
            .query_map([], |row| {
                Ok(Subject {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    teacher_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for s in subjects {
            store.subjects.insert(s.id.clone(), s);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT student_id, subject_id, marks FROM marks")?;
        let marks = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (student_id, subject_id, marks) in marks {
            let v = check_mark(&student_id, &subject_id, marks)?;
            store
                .marks
                .entry(student_id)
                .or_default()
                .insert(subject_id, v);
        }

        if let Some(raw) = db::settings_get(&self.conn, PUBLISHED_KEY)? {
            store.results_published = parse_flag(&raw)?;
        }

        tracing::debug!(users = store.users.len(), "loaded sqlite snapshot");
        Ok(store)
    }

    fn persist(&self, store: &Store, collection: Collection) -> anyhow::Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to begin transaction")?;
        match collection {
            Collection::Users => {
                tx.execute("DELETE FROM users", [])?;
                for u in store.users.values() {
                    tx.execute(
                        "INSERT INTO users(username, password, role, name) VALUES(?, ?, ?, ?)",
                        (&u.username, &u.password, u.role.as_str(), &u.name),
                    )?;
                }
            }
            Collection::Subjects => {
                tx.execute("DELETE FROM subjects", [])?;
                for s in store.subjects.values() {
                    tx.execute(
                        "INSERT INTO subjects(id, name, teacher_id) VALUES(?, ?, ?)",
                        (&s.id, &s.name, &s.teacher_id),
                    )?;
                }
            }
            Collection::Marks => {
                tx.execute("DELETE FROM marks", [])?;
                for (student_id, scores) in &store.marks {
                    for (subject_id, &marks) in scores {
                        tx.execute(
                            "INSERT INTO marks(student_id, subject_id, marks) VALUES(?, ?, ?)",
                            (student_id, subject_id, i64::from(marks)),
                        )?;
                    }
                }
            }
            Collection::Config => {
                db::settings_set(&tx, PUBLISHED_KEY, &store.results_published.to_string())?;
            }
        }
        tx.commit()
            .with_context(|| format!("failed to commit {}", collection.as_str()))?;
        tracing::debug!(table = collection.as_str(), "rewrote collection");
        Ok(())
    }
}
