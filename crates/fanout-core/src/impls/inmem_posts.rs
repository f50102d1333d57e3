//! InMemoryPostStore - the post table for development and tests.
//!
//! One mutex over the whole map: every check-and-write below runs under it,
//! which is what makes `claim` and `complete` atomic per post.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::{Completion, JobId, Post, PostId, PostStatus};
use crate::error::FanoutError;
use crate::ports::{Claim, PostStore, Transition};

#[derive(Default, Clone)]
pub struct InMemoryPostStore {
    posts: Arc<Mutex<HashMap<PostId, Post>>>,
}

impl InMemoryPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.posts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.lock().await.is_empty()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn create(&self, post: Post) -> Result<Post, FanoutError> {
        let mut posts = self.posts.lock().await;
        if posts.contains_key(&post.id) {
            return Err(FanoutError::Store(format!("post {} already exists", post.id)));
        }
        posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get(&self, id: PostId) -> Result<Post, FanoutError> {
        self.posts
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| FanoutError::not_found("post", id))
    }

    async fn claim(&self, id: PostId, now: DateTime<Utc>, ttl: Duration) -> Result<Claim, FanoutError> {
        let mut posts = self.posts.lock().await;
        let post = posts.get_mut(&id).ok_or_else(|| FanoutError::not_found("post", id))?;

        if post.is_terminal() {
            return Ok(Claim::Terminal(post.clone()));
        }
        if post.try_claim(now, ttl) {
            Ok(Claim::Acquired(post.clone()))
        } else {
            Ok(Claim::Busy(post.clone()))
        }
    }

    async fn release(&self, id: PostId, now: DateTime<Utc>) -> Result<(), FanoutError> {
        let mut posts = self.posts.lock().await;
        let post = posts.get_mut(&id).ok_or_else(|| FanoutError::not_found("post", id))?;
        post.release_claim(now);
        Ok(())
    }

    async fn complete(
        &self,
        id: PostId,
        completion: Completion,
        now: DateTime<Utc>,
    ) -> Result<Transition, FanoutError> {
        let mut posts = self.posts.lock().await;
        let post = posts.get_mut(&id).ok_or_else(|| FanoutError::not_found("post", id))?;

        match post.complete(completion, now) {
            Ok(()) => Ok(Transition::Applied(post.clone())),
            Err(FanoutError::InvalidTransition { .. }) => Ok(Transition::AlreadyTerminal(post.clone())),
            Err(e) => Err(e),
        }
    }

    async fn attach_job(&self, id: PostId, job_id: JobId, now: DateTime<Utc>) -> Result<Post, FanoutError> {
        let mut posts = self.posts.lock().await;
        let post = posts.get_mut(&id).ok_or_else(|| FanoutError::not_found("post", id))?;
        post.job_id = Some(job_id);
        post.updated_at = now;
        Ok(post.clone())
    }

    async fn list_by_status(&self, status: PostStatus) -> Result<Vec<Post>, FanoutError> {
        let posts = self.posts.lock().await;
        let mut matching: Vec<Post> = posts.values().filter(|p| p.status == status).cloned().collect();
        matching.sort_by_key(|p| p.id);
        Ok(matching)
    }
}
