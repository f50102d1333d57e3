//! Impls - in-process implementations of the ports.
//!
//! Production deployments put their database-backed stores and real platform
//! adapters behind the same traits.

pub mod inmem_memes;
pub mod inmem_posts;
pub mod loopback;

pub use self::inmem_memes::InMemoryMemeStore;
pub use self::inmem_posts::InMemoryPostStore;
pub use self::loopback::LoopbackPublisher;
