//! Villager mood, used to colour conversation prompts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current emotional state of a villager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    /// Cheerful and chatty
    Happy,
    /// Calm, satisfied
    Content,
    /// Default state
    #[default]
    Neutral,
    /// Short-tempered, curt answers
    Grumpy,
    Sad,
    Angry,
    /// Nervous, wants to leave
    Fearful,
}

impl Mood {
    pub fn all() -> &'static [Mood] {
        &[
            Mood::Happy,
            Mood::Content,
            Mood::Neutral,
            Mood::Grumpy,
            Mood::Sad,
            Mood::Angry,
            Mood::Fearful,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mood::Happy => "Happy",
            Mood::Content => "Content",
            Mood::Neutral => "Neutral",
            Mood::Grumpy => "Grumpy",
            Mood::Sad => "Sad",
            Mood::Angry => "Angry",
            Mood::Fearful => "Fearful",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "happy" => Ok(Mood::Happy),
            "content" => Ok(Mood::Content),
            "neutral" => Ok(Mood::Neutral),
            "grumpy" => Ok(Mood::Grumpy),
            "sad" => Ok(Mood::Sad),
            "angry" => Ok(Mood::Angry),
            "fearful" | "afraid" => Ok(Mood::Fearful),
            _ => Err(format!("Unknown mood: {}", s)),
        }
    }
}
