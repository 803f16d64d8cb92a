//! Database access for lingo-api
//!
//! One module per aggregate. Functions take the pool explicitly and return
//! typed rows from `lingo_common::db::models`.

pub mod billing;
pub mod classrooms;
pub mod content;
pub mod decks;
pub mod membership;
pub mod organizations;
pub mod profiles;
pub mod progress;
pub mod stats;
pub mod usage;

/// New random text id for teachers, students, classrooms and organizations
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// True when a sqlx error is a UNIQUE or PRIMARY KEY violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
