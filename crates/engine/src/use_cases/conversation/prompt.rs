//! Dialogue prompt construction.

use villagemind_domain::VillagerBrain;

use crate::infrastructure::ports::Initiator;

/// Token budget for a single villager reply.
pub const CONVERSATION_MAX_TOKENS: u32 = 150;
pub const CONVERSATION_TEMPERATURE: f32 = 0.8;
/// How many past exchanges are quoted back to the model.
const RECENT_INTERACTIONS: usize = 3;

/// Build the prompt asking `brain`'s villager to answer `text` from `initiator`.
pub fn build_prompt(brain: &VillagerBrain, initiator: &Initiator, text: &str) -> String {
    let mut prompt = format!(
        "You are {name}, a {profession} villager in a small village.\n\
         Personality: {personality}\n\
         Current mood: {mood}\n",
        name = brain.name(),
        profession = brain.profession(),
        personality = brain.personality_summary(),
        mood = brain.current_mood().display_name(),
    );

    let recent = brain.recent_interactions(RECENT_INTERACTIONS);
    if !recent.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for interaction in recent {
            prompt.push_str(&format!(
                "- {}: \"{}\" / You: \"{}\"\n",
                interaction.initiator_name, interaction.message, interaction.reply
            ));
        }
    }

    prompt.push_str(
        "\nGuidelines:\n\
         - Stay in character and let your mood show\n\
         - Reply in 1-2 short sentences\n\
         - Do not mention being an AI\n\n",
    );
    prompt.push_str(&format!("Player {} says: \"{}\"\n", initiator.name, text));
    prompt.push_str("Your reply:");
    prompt
}

/// Chat line shown to the player.
pub fn format_reply(villager_name: &str, reply: &str) -> String {
    format!("[{}] {}", villager_name, reply)
}
