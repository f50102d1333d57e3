//! MemeSource port - read access to memes produced by the generation pipeline.

use async_trait::async_trait;

use crate::domain::{Meme, MemeId};
use crate::error::FanoutError;

#[async_trait]
pub trait MemeSource: Send + Sync {
    /// Fails with `FanoutError::NotFound` when the meme does not exist.
    async fn get_meme(&self, id: MemeId) -> Result<Meme, FanoutError>;
}
