//! HTTP API handlers for lingo-api

pub mod audio;
pub mod billing;
pub mod content;
pub mod decks;
pub mod health;
pub mod organization;
pub mod profile;
pub mod progress;
pub mod stats;
pub mod student;
pub mod teacher;

pub use audio::audio_routes;
pub use billing::billing_routes;
pub use content::content_routes;
pub use decks::deck_routes;
pub use health::health_routes;
pub use organization::organization_routes;
pub use profile::profile_routes;
pub use progress::progress_routes;
pub use stats::stats_routes;
pub use student::student_routes;
pub use teacher::teacher_routes;
