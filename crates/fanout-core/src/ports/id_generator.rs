//! IdGenerator port - ID generation behind a trait.
//!
//! # Implementations
//! - **UlidGenerator**: ULIDs stamped with the injected clock

use crate::domain::{JobId, PostId};
use crate::ports::Clock;
use ulid::Ulid;

/// Generates ids that sort by creation time and need no coordination.
pub trait IdGenerator: Send + Sync {
    fn generate_post_id(&self) -> PostId;

    fn generate_job_id(&self) -> JobId;
}

/// ULID generator whose timestamp part comes from `C`.
///
/// With a `FixedClock` the timestamp is deterministic; the random part still
/// keeps ids unique.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_post_id(&self) -> PostId {
        PostId::from(self.next_ulid())
    }

    fn generate_job_id(&self) -> JobId {
        JobId::from(self.next_ulid())
    }
}
