//! fanout-core
//!
//! Publishing orchestration: one meme, many platforms, each tracked on its
//! own Post, dispatched now or through a job queue with per-class workers.
//!
//! # Modules
//! - **domain**: ids, platforms, memes, posts, jobs, outcomes, retry decisions
//! - **ports**: traits for external collaborators (MemeSource, PostStore, Publisher, Clock, IdGenerator)
//! - **queue**: JobQueue/JobLease traits and the in-memory queue
//! - **app**: AppBuilder, Orchestrator, JobScheduler, PublishJobHandler
//! - **impls**: in-memory stores and the loopback publisher
//! - **runtime** / **worker**: handler registry and per-class worker groups

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod runtime;
pub mod worker;

pub use app::{App, AppBuilder, Orchestrator, PublishOptions};
pub use config::FanoutConfig;
pub use error::{AdapterError, FanoutError};
