//! The content artifact being published. Owned by the generation pipeline;
//! this crate only reads it.

use serde::{Deserialize, Serialize};

use super::ids::MemeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meme {
    pub id: MemeId,
    pub image_url: String,
    pub caption: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Meme {
    pub fn new(id: MemeId, image_url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            id,
            image_url: image_url.into(),
            caption: caption.into(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Caption to publish: a non-empty override wins, otherwise the meme's own.
    pub fn caption_for(&self, caption_override: Option<&str>) -> String {
        caption_override
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.caption)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_override_falls_back_when_absent_or_empty() {
        let meme = Meme::new(MemeId::generate(), "https://img/1.png", "original");
        assert_eq!(meme.caption_for(None), "original");
        assert_eq!(meme.caption_for(Some("")), "original");
        assert_eq!(meme.caption_for(Some("override")), "override");
    }
}
