//! Read-only projections of the store, one per role.

use serde::Serialize;

use crate::grade::{self, Letter, Status};
use crate::guard::Session;
use crate::store::{Role, Store, Subject, User};

/// A user as shown to other users: never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub username: String,
    pub role: Role,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.clone(),
            role: u.role,
            name: u.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub teachers: usize,
    pub students: usize,
    pub subjects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub student: String,
    pub subject: String,
    pub marks: u8,
    pub grade: Letter,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub stats: Stats,
    pub all_results: Vec<ResultRow>,
    pub users: Vec<UserSummary>,
    pub subjects: Vec<Subject>,
    pub results_published: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherView {
    pub subjects: Vec<Subject>,
    pub students: Vec<UserSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub subject: String,
    pub score: u8,
    pub grade: Letter,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub report_card: Vec<ReportRow>,
    pub total_marks: u32,
    pub max_marks: u32,
    pub percentage: f64,
    pub final_grade: Letter,
    pub final_status: Status,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StudentView {
    Unpublished,
    Published(ReportCard),
}

impl Serialize for StudentView {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a> {
            published: bool,
            #[serde(flatten)]
            card: Option<&'a ReportCard>,
        }
        let tagged = match self {
            StudentView::Unpublished => Tagged {
                published: false,
                card: None,
            },
            StudentView::Published(card) => Tagged {
                published: true,
                card: Some(card),
            },
        };
        tagged.serialize(serializer)
    }
}

pub fn admin_view(store: &Store) -> AdminView {
    let stats = Stats {
        teachers: store.count_role(Role::Teacher),
        students: store.count_role(Role::Student),
        subjects: store.subjects.len(),
    };

    let mut all_results = Vec::new();
    for (student_id, scores) in &store.marks {
        let Some(student) = store.users.get(student_id) else {
            continue;
        };
        for (subject_id, &marks) in scores {
            let Some(subject) = store.subjects.get(subject_id) else {
                continue;
            };
            let g = grade::grade_mark(marks);
            all_results.push(ResultRow {
                student: student.name.clone(),
                subject: subject.name.clone(),
                marks,
                grade: g.letter,
                status: g.status,
            });
        }
    }

    AdminView {
        stats,
        all_results,
        users: store.users.values().map(UserSummary::from).collect(),
        subjects: subjects_by_name(store.subjects.values()),
        results_published: store.results_published,
    }
}

pub fn teacher_view(store: &Store, session: &Session) -> TeacherView {
    let mine = store
        .subjects
        .values()
        .filter(|s| s.teacher_id == session.username());
    TeacherView {
        subjects: subjects_by_name(mine),
        students: store.students().map(UserSummary::from).collect(),
    }
}

pub fn student_view(store: &Store, session: &Session) -> StudentView {
    if !store.results_published {
        return StudentView::Unpublished;
    }
    StudentView::Published(report_card(store, session.username()))
}

/// Aggregates every graded subject of one student. Ungraded subjects and
/// marks against deleted subjects are left out.
pub fn report_card(store: &Store, student_id: &str) -> ReportCard {
    let mut rows = Vec::new();
    let mut total_marks = 0u32;
    let mut max_marks = 0u32;

    if let Some(scores) = store.marks.get(student_id) {
        for (subject_id, &score) in scores {
            let Some(subject) = store.subjects.get(subject_id) else {
                continue;
            };
            let g = grade::grade_mark(score);
            rows.push(ReportRow {
                subject: subject.name.clone(),
                score,
                grade: g.letter,
                status: g.status,
            });
            total_marks += u32::from(score);
            max_marks += u32::from(crate::store::MAX_MARK);
        }
    }

    let percentage = grade::percentage(total_marks, max_marks);
    let overall = grade::grade(percentage);
    ReportCard {
        report_card: rows,
        total_marks,
        max_marks,
        percentage,
        final_grade: overall.letter,
        final_status: overall.status,
    }
}

fn subjects_by_name<'a>(it: impl Iterator<Item = &'a Subject>) -> Vec<Subject> {
    let mut out: Vec<Subject> = it.cloned().collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    out
}
