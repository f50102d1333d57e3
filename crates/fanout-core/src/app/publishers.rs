//! One publisher slot per platform.
//!
//! Lookup is an exhaustive match on `Platform`, so a new platform variant
//! does not compile until it has a slot here.

use std::sync::Arc;

use crate::domain::Platform;
use crate::ports::Publisher;

#[derive(Default, Clone)]
pub struct PublisherSet {
    twitter: Option<Arc<dyn Publisher>>,
    reddit: Option<Arc<dyn Publisher>>,
    instagram: Option<Arc<dyn Publisher>>,
    tiktok: Option<Arc<dyn Publisher>>,
}

impl PublisherSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_mut(&mut self, platform: Platform) -> &mut Option<Arc<dyn Publisher>> {
        match platform {
            Platform::Twitter => &mut self.twitter,
            Platform::Reddit => &mut self.reddit,
            Platform::Instagram => &mut self.instagram,
            Platform::Tiktok => &mut self.tiktok,
        }
    }

    /// Install `publisher` under its own platform. Returns the publisher it
    /// replaced, if any.
    pub fn insert(&mut self, publisher: Arc<dyn Publisher>) -> Option<Arc<dyn Publisher>> {
        self.slot_mut(publisher.platform()).replace(publisher)
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn Publisher>> {
        match platform {
            Platform::Twitter => self.twitter.as_ref(),
            Platform::Reddit => self.reddit.as_ref(),
            Platform::Instagram => self.instagram.as_ref(),
            Platform::Tiktok => self.tiktok.as_ref(),
        }
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.get(platform).is_some()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL.into_iter().filter(|p| self.contains(*p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::LoopbackPublisher;

    #[test]
    fn publishers_are_keyed_by_their_platform() {
        let mut set = PublisherSet::new();
        assert!(set.insert(Arc::new(LoopbackPublisher::new(Platform::Reddit))).is_none());
        assert!(set.insert(Arc::new(LoopbackPublisher::new(Platform::Tiktok))).is_none());

        assert!(set.contains(Platform::Reddit));
        assert!(!set.contains(Platform::Twitter));
        assert_eq!(set.platforms(), vec![Platform::Reddit, Platform::Tiktok]);

        let replaced = set.insert(Arc::new(LoopbackPublisher::new(Platform::Reddit)));
        assert!(replaced.is_some());
    }
}
