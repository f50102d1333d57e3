//! Ports - the seams to external systems.
//!
//! Each trait hides one collaborator (meme storage, post persistence,
//! platform adapters, time, id generation). The job queue port lives in
//! `crate::queue` next to its in-memory implementation.

pub mod clock;
pub mod id_generator;
pub mod meme_source;
pub mod post_store;
pub mod publisher;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::meme_source::MemeSource;
pub use self::post_store::{Claim, PostStore, Transition};
pub use self::publisher::{PublishContent, PublishResult, Publisher};
