//! InMemoryMemeStore - meme lookup for development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Meme, MemeId};
use crate::error::FanoutError;
use crate::ports::MemeSource;

#[derive(Default, Clone)]
pub struct InMemoryMemeStore {
    memes: Arc<RwLock<HashMap<MemeId, Meme>>>,
}

impl InMemoryMemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a meme.
    pub async fn insert(&self, meme: Meme) {
        self.memes.write().await.insert(meme.id, meme);
    }
}

#[async_trait]
impl MemeSource for InMemoryMemeStore {
    async fn get_meme(&self, id: MemeId) -> Result<Meme, FanoutError> {
        self.memes
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| FanoutError::not_found("meme", id))
    }
}
