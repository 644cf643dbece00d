use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PortalError;
use crate::guard::{self, Session};

pub const MAX_MARK: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Method a caller with this role lands on.
    pub fn landing(self) -> &'static str {
        match self {
            Role::Admin => "admin.dashboard",
            Role::Teacher => "teacher.dashboard",
            Role::Student => "student.dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub teacher_id: String,
}

/// One persisted collection; a mutation rewrites exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Subjects,
    Marks,
    Config,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Subjects,
        Collection::Marks,
        Collection::Config,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Subjects => "subjects",
            Collection::Marks => "marks",
            Collection::Config => "config",
        }
    }
}

/// `student_username -> subject_id -> score`.
pub type MarkBook = BTreeMap<String, BTreeMap<String, u8>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    pub users: BTreeMap<String, User>,
    pub subjects: BTreeMap<String, Subject>,
    pub marks: MarkBook,
    pub results_published: bool,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub subject: Subject,
    /// Set when the teacher reference does not resolve to a teacher account.
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMark {
    pub student_name: String,
    pub subject_name: String,
    pub marks: u8,
}

/// Restores one collection from an earlier copy of the store.
pub fn restore(store: &mut Store, from: &Store, collection: Collection) {
    match collection {
        Collection::Users => store.users = from.users.clone(),
        Collection::Subjects => store.subjects = from.subjects.clone(),
        Collection::Marks => store.marks = from.marks.clone(),
        Collection::Config => store.results_published = from.results_published,
    }
}

impl Store {
    pub fn count_role(&self, role: Role) -> usize {
        self.users.values().filter(|u| u.role == role).count()
    }

    pub fn students(&self) -> impl Iterator<Item = &User> {
        self.users.values().filter(|u| u.role == Role::Student)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, PortalError> {
        match self.users.get(username) {
            Some(user) if user.password == password => Ok(user.clone()),
            _ => Err(PortalError::authorization(
                "Invalid username or password.",
                "auth.login",
            )),
        }
    }

    /// Admin-path user creation. Only students and teachers may be created.
    pub fn create_user(
        &mut self,
        username: &str,
        password: &str,
        name: &str,
        role: &str,
    ) -> Result<&User, PortalError> {
        const BACK: &str = "admin.dashboard";
        if self.users.contains_key(username) {
            return Err(PortalError::conflict("Username already exists.", BACK));
        }
        let role = match role.parse::<Role>() {
            Ok(r @ (Role::Student | Role::Teacher)) => r,
            _ => return Err(PortalError::validation("Invalid user data.", BACK)),
        };
        if !valid_username(username) || password.is_empty() {
            return Err(PortalError::validation("Invalid user data.", BACK));
        }
        Ok(self.insert_user(username, password, name, role))
    }

    /// Self-service registration; always produces a student account.
    pub fn signup(
        &mut self,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<&User, PortalError> {
        const BACK: &str = "auth.signup";
        if self.users.contains_key(username) {
            return Err(PortalError::conflict("Username already exists.", BACK));
        }
        if !valid_username(username) || password.is_empty() {
            return Err(PortalError::validation("Invalid user data.", BACK));
        }
        Ok(self.insert_user(username, password, name, Role::Student))
    }

    fn insert_user(&mut self, username: &str, password: &str, name: &str, role: Role) -> &User {
        let user = User {
            username: username.to_string(),
            password: password.to_string(),
            role,
            name: name.trim().to_string(),
        };
        self.users.entry(user.username.clone()).or_insert(user)
    }

    /// Inserts a subject under a fresh id. The teacher reference is only
    /// required to be present; a dangling one is reported, not rejected.
    pub fn create_subject(&mut self, name: &str, teacher_id: &str) -> Result<NewSubject, PortalError> {
        let name = name.trim();
        let teacher_id = teacher_id.trim();
        if name.is_empty() || teacher_id.is_empty() {
            return Err(PortalError::validation(
                "Missing info for creating subject.",
                "admin.dashboard",
            ));
        }

        let warning = match self.users.get(teacher_id) {
            Some(u) if u.role == Role::Teacher => None,
            Some(_) => Some(format!("'{teacher_id}' is not a teacher account.")),
            None => Some(format!("Teacher '{teacher_id}' does not exist.")),
        };

        let id = self.fresh_subject_id();
        let subject = Subject {
            id: id.clone(),
            name: name.to_string(),
            teacher_id: teacher_id.to_string(),
        };
        self.subjects.insert(id, subject.clone());
        Ok(NewSubject { subject, warning })
    }

    fn fresh_subject_id(&self) -> String {
        loop {
            let id = short_id();
            if !self.subjects.contains_key(&id) {
                return id;
            }
        }
    }

    /// Upserts one (student, subject) score on behalf of the session's teacher.
    ///
    /// Checks run in order: grading capability, score range, student lookup.
    /// Any failure leaves the mark book untouched.
    pub fn record_mark(
        &mut self,
        session: &Session,
        student_id: &str,
        subject_id: &str,
        raw_marks: &str,
    ) -> Result<RecordedMark, PortalError> {
        const BACK: &str = "teacher.dashboard";
        let subject = match self.subjects.get(subject_id) {
            Some(s) if guard::may_grade(session, s) => s,
            _ => {
                return Err(PortalError::authorization(
                    "You are not authorized to grade this subject.",
                    BACK,
                ))
            }
        };

        let Some(marks) = parse_marks(raw_marks) else {
            return Err(PortalError::validation(
                "Marks must be a number between 0 and 100.",
                BACK,
            ));
        };

        let student = match self.users.get(student_id) {
            Some(u) if u.role == Role::Student => u,
            _ => return Err(PortalError::not_found("Student not found.", BACK)),
        };

        let recorded = RecordedMark {
            student_name: student.name.clone(),
            subject_name: subject.name.clone(),
            marks,
        };
        self.marks
            .entry(student_id.to_string())
            .or_default()
            .insert(subject_id.to_string(), marks);
        Ok(recorded)
    }

    /// Flips the publication flag and returns the new value.
    pub fn toggle_publication(&mut self) -> bool {
        self.results_published = !self.results_published;
        self.results_published
    }

    /// The default accounts and subjects a fresh portal starts with.
    pub fn seed_demo(&mut self) {
        let accounts = [
            ("admin", Role::Admin, "System Administrator"),
            ("t1", Role::Teacher, "Alice Teacher"),
            ("t2", Role::Teacher, "Bob Teacher"),
            ("s1", Role::Student, "John Student"),
            ("s2", Role::Student, "Jane Student"),
        ];
        for (username, role, name) in accounts {
            self.insert_user(username, "123", name, role);
        }
        for (name, teacher) in [("Mathematics", "t1"), ("Science", "t2")] {
            let id = self.fresh_subject_id();
            self.subjects.insert(
                id.clone(),
                Subject {
                    id,
                    name: name.to_string(),
                    teacher_id: teacher.to_string(),
                },
            );
        }
    }
}

/// Usernames are matched exactly, so surrounding whitespace would create a
/// lookalike account.
fn valid_username(username: &str) -> bool {
    !username.is_empty() && username.trim() == username
}

/// Integer parse with the usual tolerance for surrounding whitespace and a
/// leading sign, then a range check.
pub fn parse_marks(raw: &str) -> Option<u8> {
    let v: i64 = raw.trim().parse().ok()?;
    if (0..=i64::from(MAX_MARK)).contains(&v) {
        u8::try_from(v).ok()
    } else {
        None
    }
}

fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
