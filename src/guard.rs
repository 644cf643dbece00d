use crate::error::PortalError;
use crate::store::{Role, Subject, User};

/// The authenticated user for the lifetime of a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn username(&self) -> &str {
        &self.user.username
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

pub fn require_login(session: Option<&Session>) -> Result<&Session, PortalError> {
    session.ok_or(PortalError::Unauthenticated)
}

/// Exact role match. A mismatch sends the caller back to their own landing
/// page, or the generic dashboard when nobody is logged in.
pub fn require_role(session: Option<&Session>, role: Role) -> Result<&Session, PortalError> {
    match session {
        Some(s) if s.role() == role => Ok(s),
        Some(s) => Err(PortalError::authorization(
            "Unauthorized access.",
            s.role().landing(),
        )),
        None => Err(PortalError::authorization("Unauthorized access.", "dashboard")),
    }
}

/// Whether the caller may write scores for `subject`.
pub fn may_grade(session: &Session, subject: &Subject) -> bool {
    session.role() == Role::Teacher && subject.teacher_id == session.username()
}
