//! lingo-gen library - content generation queue
//!
//! `fill` fans the configured languages, levels, subjects and content types
//! out into pending jobs; `work` drains them through a [`ContentGenerator`]
//! into the object store and the news/stories tables.

pub mod generator;
pub mod queue;
pub mod worker;

pub use generator::{
    ContentGenerator, GeneratedArticle, GeneratedContent, GeneratedStory, GeneratorError,
    HttpContentGenerator,
};
pub use queue::{fan_out, JobSpec};
pub use worker::{BatchReport, Worker, WorkerSettings};
