//! App layer: combines the ports into the publishing flow and the job runtime.
//!
//! - **AppBuilder**: wiring and startup validation
//! - **Orchestrator**: fan-out entry point and the single-destination dispatch
//! - **JobScheduler**: enqueue surface and per-class worker groups
//! - **PublishJobHandler**: runs deferred dispatches for the publishing class

pub mod builder;
pub mod orchestrator;
pub mod publish_handler;
pub mod publishers;
pub mod scheduler;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::orchestrator::{
    CancelOutcome, DispatchMode, DispatchParams, Orchestrator, PublishOptions, ReconcileReport,
};
pub use self::publish_handler::PublishJobHandler;
pub use self::publishers::PublisherSet;
pub use self::scheduler::JobScheduler;
