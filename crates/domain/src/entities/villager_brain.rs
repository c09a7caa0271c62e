//! Conversational state of a single villager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use villagemind_domain::{EntityId, Mood};

/// Oldest interactions are forgotten beyond this many.
pub const MAX_REMEMBERED_INTERACTIONS: usize = 32;

/// One remembered exchange with another entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub initiator_id: EntityId,
    pub initiator_name: String,
    pub message: String,
    pub reply: String,
    pub at: DateTime<Utc>,
}

/// Personality, mood and conversation memory of a villager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VillagerBrain {
    id: EntityId,
    name: String,
    profession: String,
    personality: String,
    mood: Mood,
    memory: Vec<Interaction>,
}

impl VillagerBrain {
    pub fn new(id: EntityId, name: impl Into<String>, profession: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            profession: profession.into(),
            personality: "friendly and helpful".to_string(),
            mood: Mood::default(),
            memory: Vec::new(),
        }
    }

    pub fn with_personality(mut self, description: impl Into<String>) -> Self {
        self.personality = description.into();
        self
    }

    pub fn with_mood(mut self, mood: Mood) -> Self {
        self.mood = mood;
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profession(&self) -> &str {
        &self.profession
    }

    /// Short free-text description of the villager's personality.
    pub fn personality_summary(&self) -> &str {
        &self.personality
    }

    pub fn current_mood(&self) -> Mood {
        self.mood
    }

    pub fn set_mood(&mut self, mood: Mood) {
        self.mood = mood;
    }

    /// Remember an exchange, forgetting the oldest once memory is full.
    pub fn add_interaction(
        &mut self,
        initiator_id: EntityId,
        initiator_name: impl Into<String>,
        message: impl Into<String>,
        reply: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.memory.push(Interaction {
            initiator_id,
            initiator_name: initiator_name.into(),
            message: message.into(),
            reply: reply.into(),
            at,
        });
        if self.memory.len() > MAX_REMEMBERED_INTERACTIONS {
            let overflow = self.memory.len() - MAX_REMEMBERED_INTERACTIONS;
            self.memory.drain(..overflow);
        }
    }

    /// All remembered interactions, oldest first.
    pub fn memory(&self) -> &[Interaction] {
        &self.memory
    }

    /// The `count` most recent interactions, oldest first.
    pub fn recent_interactions(&self, count: usize) -> &[Interaction] {
        let start = self.memory.len().saturating_sub(count);
        &self.memory[start..]
    }
}
