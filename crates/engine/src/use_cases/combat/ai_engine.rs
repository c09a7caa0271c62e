//! AI-augmented combat decisions with a rule-based safety net.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use villagemind_domain::{
    CombatAction, CombatDecision, CombatDecisionEngine, CombatPersonalityTraits, CombatSituation,
    RelationshipData, ThreatAssessment, ThreatLevel,
};

use super::parser::parse_decision;
use crate::infrastructure::ports::{LlmPort, ProviderProfile};

/// How long a validated AI decision is reused for an identical situation.
pub const DECISION_CACHE_TTL: Duration = Duration::from_secs(2);
/// Cache size past which expired decisions are swept out.
pub const MAX_CACHED_DECISIONS: usize = 50;
const COMBAT_MAX_TOKENS: u32 = 100;
const COMBAT_TEMPERATURE: f32 = 0.7;

struct CachedDecision {
    decision: CombatDecision,
    cached_at: Instant,
}

pub struct AiCombatEngine {
    llm: Arc<dyn LlmPort>,
    profile: ProviderProfile,
    ai_timeout: Duration,
    baseline: CombatDecisionEngine,
    cache: DashMap<String, CachedDecision>,
}

impl AiCombatEngine {
    pub fn new(llm: Arc<dyn LlmPort>, profile: ProviderProfile, ai_timeout: Duration) -> Self {
        Self {
            llm,
            profile,
            ai_timeout,
            baseline: CombatDecisionEngine::new(),
            cache: DashMap::new(),
        }
    }

    pub fn baseline(&self) -> &CombatDecisionEngine {
        &self.baseline
    }

    /// Pick an action for `situation`.
    ///
    /// Simple fights go straight to the rule engine. Anything more involved
    /// is put to the model, bounded by the configured combat timeout.
    pub async fn decide(
        &self,
        situation: &CombatSituation,
        traits: &CombatPersonalityTraits,
        relationships: &RelationshipData,
    ) -> CombatDecision {
        if !self.should_use_ai(situation) {
            return self.baseline.decide(situation, traits, relationships);
        }
        let threat = self
            .baseline
            .assess_threats(&situation.enemies, situation.is_ambush);
        self.analyze_and_decide(situation, traits, &threat, relationships, self.ai_timeout)
            .await
    }

    /// Whether a situation is complex enough to be worth a model call.
    pub fn should_use_ai(&self, situation: &CombatSituation) -> bool {
        let enemies = situation.living_enemies().count();
        let allies = situation.allies.len();
        let threat = situation.threat_level;

        if enemies <= 1 && allies == 0 && threat <= ThreatLevel::Low {
            return false;
        }
        if enemies > 3 || threat >= ThreatLevel::High || allies > 2 {
            return true;
        }
        enemies > 1 && threat != ThreatLevel::None
    }

    /// Ask the model for a decision, bounded by `timeout`.
    ///
    /// Always returns a decision. Timeouts, transport failures, unparseable
    /// or invalid answers all yield [`Self::fallback_decision`]. A timed-out
    /// call keeps running in the background and its answer is discarded.
    pub async fn analyze_and_decide(
        &self,
        situation: &CombatSituation,
        traits: &CombatPersonalityTraits,
        threat: &ThreatAssessment,
        relationships: &RelationshipData,
        timeout: Duration,
    ) -> CombatDecision {
        let key = cache_key(situation, traits, threat);
        if let Some(decision) = self.cached(&key) {
            tracing::debug!("Using cached AI combat decision");
            return decision;
        }

        let request = match self
            .profile
            .request(build_combat_prompt(situation, traits, threat, relationships))
            .max_tokens(COMBAT_MAX_TOKENS)
            .temperature(COMBAT_TEMPERATURE)
            .timeout(timeout)
            .build()
        {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Could not build combat request, using rule-based decision");
                return self.fallback_decision(situation, traits, relationships);
            }
        };

        let llm = Arc::clone(&self.llm);
        let call = tokio::spawn(async move { llm.generate(request).await });
        let response = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Combat decision task failed");
                return self.fallback_decision(situation, traits, relationships);
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "AI combat decision timed out, using rule-based decision"
                );
                return self.fallback_decision(situation, traits, relationships);
            }
        };

        let Some(reply) = response.usable_text() else {
            if let Some(error) = response.failure() {
                tracing::warn!(error = %error, "AI combat decision failed");
            }
            return self.fallback_decision(situation, traits, relationships);
        };

        let Some(decision) = parse_decision(reply, situation) else {
            tracing::warn!(reply = %reply, "Unparseable AI combat reply");
            return self.fallback_decision(situation, traits, relationships);
        };

        if !self.validate_ai_decision(&decision, situation) {
            tracing::warn!(action = %decision.action, "Invalid AI combat decision");
            return self.fallback_decision(situation, traits, relationships);
        }

        let confidence = ai_confidence(&decision, situation, threat);
        let decision = decision.with_confidence(confidence);
        self.remember(key, decision.clone());
        decision
    }

    /// Reject decisions that cannot be carried out in `situation`.
    ///
    /// An attack needs at least one target and may only target enemies.
    /// Negotiation needs someone to negotiate with.
    pub fn validate_ai_decision(&self, decision: &CombatDecision, situation: &CombatSituation) -> bool {
        if !decision.is_valid() {
            return false;
        }
        match decision.action {
            CombatAction::Attack => decision.target_ids.iter().all(|id| situation.is_enemy(*id)),
            CombatAction::Negotiate => !situation.enemies.is_empty(),
            CombatAction::Flee | CombatAction::Defend => true,
        }
    }

    /// The rule engine's decision, flagged as a substitute.
    pub fn fallback_decision(
        &self,
        situation: &CombatSituation,
        traits: &CombatPersonalityTraits,
        relationships: &RelationshipData,
    ) -> CombatDecision {
        self.baseline
            .decide(situation, traits, relationships)
            .into_fallback()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn remember(&self, key: String, decision: CombatDecision) {
        self.cache.insert(
            key,
            CachedDecision {
                decision,
                cached_at: Instant::now(),
            },
        );
        if self.cache.len() <= MAX_CACHED_DECISIONS {
            return;
        }

        self.cache
            .retain(|_, entry| entry.cached_at.elapsed() < DECISION_CACHE_TTL);
        if self.cache.len() > MAX_CACHED_DECISIONS {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.cached_at)
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                self.cache.remove(&oldest);
            }
        }
        tracing::debug!(entries = self.cache.len(), "Pruned AI combat decision cache");
    }

    fn cached(&self, key: &str) -> Option<CombatDecision> {
        let entry = self.cache.get(key)?;
        if entry.cached_at.elapsed() < DECISION_CACHE_TTL {
            return Some(entry.decision.clone());
        }
        drop(entry);
        self.cache.remove(key);
        None
    }
}

fn ai_confidence(decision: &CombatDecision, situation: &CombatSituation, threat: &ThreatAssessment) -> f32 {
    let mut confidence = 0.5;
    let rationale = decision.rationale.to_lowercase();
    if rationale.contains("tactic") || rationale.contains("strateg") {
        confidence += 0.1;
    }
    match decision.action {
        CombatAction::Flee if threat.level == ThreatLevel::Extreme => confidence += 0.2,
        CombatAction::Attack => {
            if !situation.enemies.is_empty() {
                confidence += 0.1;
            }
            if !decision.target_ids.is_empty() {
                confidence += 0.1;
            }
        }
        _ => {}
    }
    confidence
}

fn cache_key(situation: &CombatSituation, traits: &CombatPersonalityTraits, threat: &ThreatAssessment) -> String {
    let mut key = format!(
        "{}:{}:{}:{}:{:.1}:{:.1}:{:.1}:{:.1}:{:.1}",
        situation.allies.len(),
        threat.level.name(),
        situation.threat_level.name(),
        situation.is_ambush,
        traits.courage(),
        traits.aggression(),
        traits.self_preservation(),
        traits.loyalty(),
        traits.vengefulness(),
    );
    for enemy in situation.living_enemies() {
        let _ = write!(key, ":{}", enemy.id.prefix(8));
    }
    key
}

fn build_combat_prompt(
    situation: &CombatSituation,
    traits: &CombatPersonalityTraits,
    threat: &ThreatAssessment,
    relationships: &RelationshipData,
) -> String {
    let mut prompt = String::from("You are a villager facing a combat situation. Analyze and decide.\n\n");

    let _ = writeln!(prompt, "Personality:");
    let _ = writeln!(prompt, "- Aggression: {:.1}", traits.aggression());
    let _ = writeln!(prompt, "- Courage: {:.1}", traits.courage());
    let _ = writeln!(prompt, "- Self-Preservation: {:.1}", traits.self_preservation());
    let _ = writeln!(prompt, "- Loyalty: {:.1}\n", traits.loyalty());

    let _ = writeln!(prompt, "Current Threat: {}", threat.level.name());
    let _ = writeln!(prompt, "Threat Score: {:.2}", threat.score);
    if situation.is_ambush {
        let _ = writeln!(prompt, "You have been ambushed!");
    }

    let enemies: Vec<String> = situation
        .living_enemies()
        .map(|enemy| {
            format!(
                "{} (health {:.0}, damage {:.0}, {:.0} blocks)",
                enemy.id.prefix(8),
                enemy.health,
                enemy.attack_damage,
                enemy.distance
            )
        })
        .collect();
    let _ = writeln!(
        prompt,
        "\nEnemies: {}",
        if enemies.is_empty() { "None".to_string() } else { enemies.join(", ") }
    );

    let friends = situation
        .allies
        .iter()
        .filter(|ally| relationships.is_friend(ally.id))
        .count();
    if situation.allies.is_empty() {
        let _ = writeln!(prompt, "Allies Present: None");
    } else {
        let _ = writeln!(
            prompt,
            "Allies Present: {} nearby ({} friends)",
            situation.allies.len(),
            friends
        );
    }

    let weapons: Vec<&str> = situation.weapons.iter().map(|w| w.kind.name()).collect();
    let _ = writeln!(
        prompt,
        "Available Weapons: {}\n",
        if weapons.is_empty() { "none".to_string() } else { weapons.join(", ") }
    );

    prompt.push_str("Answer on one line as ACTION|TARGET_IDS|WEAPON|REASON\n");
    prompt.push_str("ACTION is one of ATTACK, DEFEND, FLEE, NEGOTIATE. TARGET_IDS are comma-separated enemy ids in priority order.\n");
    prompt.push_str("Keep the reason brief.");
    prompt
}
