//! Artifact namespaces

use std::fmt;
use uuid::Uuid;

/// Which directory a request's artifacts live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The workspace root, shared by every client
    Shared,
    /// `sessions/<id>` under the workspace root
    Session(Uuid),
}

impl Scope {
    /// Scope for an explicit `?session=` parameter, shared otherwise
    pub fn from_query(session: Option<Uuid>) -> Self {
        session.map(Scope::Session).unwrap_or(Scope::Shared)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Scope::Shared => None,
            Scope::Session(id) => Some(*id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Shared => f.write_str("shared"),
            Scope::Session(id) => write!(f, "session {}", id),
        }
    }
}
