//! Domain model (ids, platforms, posts, jobs, outcomes, ...).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod job;
pub mod meme;
pub mod outcome;
pub mod platform;
pub mod post;

pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{ErrorKind, JobError};
pub use ids::{JobId, MemeId, PostId};
pub use job::{JobClass, JobPayload, PublishJob};
pub use meme::Meme;
pub use outcome::{DispatchFailure, DispatchOutcome, FailureKind};
pub use platform::Platform;
pub use post::{Completion, Post, PostStatus};
