//! Supported publishing destinations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FanoutError;

/// Closed set of destinations. Adding a variant forces every `match` on it
/// (publisher selection included) to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Twitter,
    Reddit,
    Instagram,
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Reddit,
        Platform::Instagram,
        Platform::Tiktok,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitter => "TWITTER",
            Platform::Reddit => "REDDIT",
            Platform::Instagram => "INSTAGRAM",
            Platform::Tiktok => "TIKTOK",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = FanoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FanoutError::UnsupportedPlatform(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::upper("TWITTER", Platform::Twitter)]
    #[case::lower("reddit", Platform::Reddit)]
    #[case::mixed("InstaGram", Platform::Instagram)]
    #[case::padded(" TIKTOK ", Platform::Tiktok)]
    fn parses_known_platforms(#[case] raw: &str, #[case] expected: Platform) {
        assert_eq!(raw.parse::<Platform>().unwrap(), expected);
    }

    #[rstest]
    #[case::unknown("FACEBOOK")]
    #[case::empty("")]
    fn rejects_unknown_platforms(#[case] raw: &str) {
        let err = raw.parse::<Platform>().unwrap_err();
        assert!(matches!(err, FanoutError::UnsupportedPlatform(ref p) if p == raw));
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let s = serde_json::to_string(&Platform::Tiktok).unwrap();
        assert_eq!(s, "\"TIKTOK\"");
    }
}
