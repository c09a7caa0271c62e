//! Rule-based combat decisions.
//!
//! Every operation is a pure function of its inputs, so the engine can be
//! called from any context and always answers immediately.

use villagemind_domain::{CombatPersonalityTraits, RelationshipData};

use super::decision::{CombatAction, CombatDecision, RULE_BASED_CONFIDENCE, RULE_BASED_RATIONALE};
use super::equipment::{Armor, ArmorSlot, Weapon, WeaponKind};
use super::situation::{CombatSituation, Combatant, ThreatAssessment, ThreatLevel};

// Normalisation ceilings for threat scoring
const MAX_HEALTH: f32 = 20.0;
const MAX_DAMAGE: f32 = 10.0;
const MAX_RANGE: f32 = 20.0;

const HEALTH_WEIGHT: f32 = 0.3;
const DAMAGE_WEIGHT: f32 = 0.5;
const PROXIMITY_WEIGHT: f32 = 0.2;

/// Two scores closer than this are a tie, broken by proximity.
const SCORE_EPSILON: f32 = 1e-6;

/// Villagers this brave never run.
const FEARLESS_COURAGE: f32 = 0.8;

/// Enemies at or above this count raise the threat level by one band.
const OUTNUMBERED_AT: usize = 3;

/// Deterministic baseline decision maker.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatDecisionEngine;

impl CombatDecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Weighted health, damage and proximity, in `[0.0, 1.0]`. Dead combatants score 0.
    pub fn calculate_threat_score(&self, combatant: &Combatant) -> f32 {
        if !combatant.is_alive() {
            return 0.0;
        }
        let health = combatant.health / MAX_HEALTH;
        let damage = combatant.attack_damage / MAX_DAMAGE;
        let proximity = (1.0 - combatant.distance / MAX_RANGE).max(0.1);

        (health * HEALTH_WEIGHT + damage * DAMAGE_WEIGHT + proximity * PROXIMITY_WEIGHT)
            .clamp(0.0, 1.0)
    }

    /// The living enemy with the highest threat score; ties go to the closer one.
    pub fn select_target<'a>(&self, enemies: &'a [Combatant]) -> Option<&'a Combatant> {
        self.pick_most_threatening(enemies.iter())
    }

    /// Living enemies that are not friends of the deciding villager.
    pub fn valid_targets<'a>(
        &self,
        enemies: &'a [Combatant],
        relationships: &RelationshipData,
    ) -> Vec<&'a Combatant> {
        enemies
            .iter()
            .filter(|enemy| enemy.is_alive() && !relationships.is_friend(enemy.id))
            .collect()
    }

    /// Like [`select_target`](Self::select_target), but never picks a friend.
    pub fn select_target_with_relationships<'a>(
        &self,
        enemies: &'a [Combatant],
        relationships: &RelationshipData,
    ) -> Option<&'a Combatant> {
        self.pick_most_threatening(self.valid_targets(enemies, relationships).into_iter())
    }

    /// Weigh all enemies. Ambushes and being outnumbered each raise the level one band.
    pub fn assess_threats(&self, enemies: &[Combatant], is_ambush: bool) -> ThreatAssessment {
        let Some(primary) = self.select_target(enemies) else {
            return ThreatAssessment::none();
        };
        let score = self.calculate_threat_score(primary);

        let mut level = ThreatLevel::from_score(score);
        if is_ambush {
            level = level.escalate();
        }
        if enemies.iter().filter(|e| e.is_alive()).count() >= OUTNUMBERED_AT {
            level = level.escalate();
        }

        ThreatAssessment {
            level,
            primary_threat: Some(primary.id),
            score,
        }
    }

    /// Attack when willingness to fight beats the threat by a margin that
    /// widens with self-preservation.
    pub fn should_attack(&self, threat_score: f32, traits: &CombatPersonalityTraits) -> bool {
        let willingness = 0.5 * traits.aggression()
            + 0.35 * traits.courage()
            + 0.15 * (1.0 - traits.self_preservation());
        let margin = 0.2 * traits.self_preservation() - 0.3;

        willingness - threat_score > margin
    }

    /// Flee only from extreme threats, and only when self-preservation
    /// outweighs courage.
    pub fn should_flee(&self, threat_score: f32, traits: &CombatPersonalityTraits) -> bool {
        if traits.courage() > FEARLESS_COURAGE {
            return false;
        }
        let fear = (traits.self_preservation() - 0.8 * traits.courage()).max(0.1);
        let extreme = 0.7 + 0.3 * fear;

        threat_score > extreme && traits.self_preservation() > traits.courage()
    }

    pub fn should_defend(
        &self,
        ally: &Combatant,
        relationships: &RelationshipData,
        traits: &CombatPersonalityTraits,
    ) -> bool {
        ally.under_attack
            && ally.is_alive()
            && traits.loyalty() > relationships.level_of(ally.id).defend_threshold()
    }

    /// Damage plus a personality bonus: melee suits the bold, ranged suits the careful.
    pub fn weapon_score(&self, weapon: &Weapon, traits: &CombatPersonalityTraits) -> f32 {
        let bonus = match weapon.kind {
            WeaponKind::Sword => 0.3 * traits.aggression() + 0.2 * traits.courage(),
            WeaponKind::Axe => 0.4 * traits.aggression() + 0.2 * traits.vengefulness(),
            WeaponKind::Bow => 0.4 * traits.self_preservation() - 0.1 * traits.aggression(),
            WeaponKind::Crossbow => 0.3 * traits.self_preservation(),
        };
        (weapon.damage / MAX_DAMAGE + bonus).clamp(0.0, 1.0)
    }

    pub fn select_best_weapon<'a>(
        &self,
        weapons: &'a [Weapon],
        traits: &CombatPersonalityTraits,
    ) -> Option<&'a Weapon> {
        let mut best: Option<(&Weapon, f32)> = None;
        for weapon in weapons {
            let score = self.weapon_score(weapon, traits);
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((weapon, score)),
            }
        }
        best.map(|(weapon, _)| weapon)
    }

    /// Highest defense value for the slot.
    pub fn select_best_armor<'a>(&self, armor: &'a [Armor], slot: ArmorSlot) -> Option<&'a Armor> {
        armor
            .iter()
            .filter(|piece| piece.slot == slot)
            .fold(None, |best: Option<&Armor>, piece| match best {
                Some(current) if current.defense >= piece.defense => Some(current),
                _ => Some(piece),
            })
    }

    /// Rule-based decision: flee, else attack the best valid target, else defend.
    pub fn decide(
        &self,
        situation: &CombatSituation,
        traits: &CombatPersonalityTraits,
        relationships: &RelationshipData,
    ) -> CombatDecision {
        let assessment = self.assess_threats(&situation.enemies, situation.is_ambush);

        if self.should_flee(assessment.score, traits) {
            return rule_based(CombatAction::Flee);
        }

        let target = self.select_target_with_relationships(&situation.enemies, relationships);
        if let Some(target) = target {
            if self.should_attack(self.calculate_threat_score(target), traits) {
                let mut decision = rule_based(CombatAction::Attack).with_targets(vec![target.id]);
                if let Some(weapon) = self.select_best_weapon(&situation.weapons, traits) {
                    decision = decision.with_item_hint(weapon.kind.name());
                }
                return decision;
            }
        }

        let ally = situation
            .allies
            .iter()
            .filter(|ally| self.should_defend(ally, relationships, traits))
            .min_by(|a, b| a.distance.total_cmp(&b.distance));

        match ally {
            Some(ally) => rule_based(CombatAction::Defend).with_targets(vec![ally.id]),
            None => rule_based(CombatAction::Defend),
        }
    }

    fn pick_most_threatening<'a>(
        &self,
        candidates: impl Iterator<Item = &'a Combatant>,
    ) -> Option<&'a Combatant> {
        let mut best: Option<(&Combatant, f32)> = None;
        for candidate in candidates.filter(|c| c.is_alive()) {
            let score = self.calculate_threat_score(candidate);
            best = match best {
                None => Some((candidate, score)),
                Some((current, current_score)) => {
                    let wins = score > current_score + SCORE_EPSILON
                        || ((score - current_score).abs() <= SCORE_EPSILON
                            && candidate.distance < current.distance);
                    if wins {
                        Some((candidate, score))
                    } else {
                        Some((current, current_score))
                    }
                }
            };
        }
        best.map(|(combatant, _)| combatant)
    }
}

fn rule_based(action: CombatAction) -> CombatDecision {
    CombatDecision::new(action)
        .with_rationale(RULE_BASED_RATIONALE)
        .with_confidence(RULE_BASED_CONFIDENCE)
}
