//! Parsing of model replies into combat decisions.
//!
//! Two reply shapes are understood. The compact one is a single line
//! `ACTION|target-prefix,target-prefix|item|rationale`. The labelled one
//! carries `Decide:`, `Target Priority:`, `Weapon Choice:` and
//! `Tactical Notes:` lines.

use std::sync::LazyLock;

use regex_lite::Regex;
use villagemind_domain::{CombatAction, CombatDecision, CombatSituation, EntityId};

/// Shortest id prefix accepted as a target reference.
const MIN_TARGET_PREFIX: usize = 4;

static DECIDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)decide:\s*(ATTACK|DEFEND|FLEE|RETREAT|NEGOTIATE)").expect("valid regex")
});
static TARGETS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)target priority:\s*\[?([^\]\n]*)\]?").expect("valid regex")
});
static WEAPON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)weapon choice:\s*(\w+)").expect("valid regex"));
static NOTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tactical notes:\s*(.+)").expect("valid regex"));

/// Parse `reply` against `situation`. `None` when neither shape matches.
///
/// Target prefixes that match no enemy are dropped; the caller validates
/// the result.
pub fn parse_decision(reply: &str, situation: &CombatSituation) -> Option<CombatDecision> {
    parse_compact(reply, situation).or_else(|| parse_labelled(reply, situation))
}

fn parse_compact(reply: &str, situation: &CombatSituation) -> Option<CombatDecision> {
    reply.lines().find_map(|line| {
        let mut parts = line.trim().trim_matches('`').splitn(4, '|');
        let action: CombatAction = parts.next()?.parse().ok()?;
        let targets = parts.next()?;
        let item = parts.next().unwrap_or_default();
        let rationale = parts.next().unwrap_or_default();

        Some(build(
            action,
            resolve_targets(targets.split(','), situation),
            item,
            rationale,
        ))
    })
}

fn parse_labelled(reply: &str, situation: &CombatSituation) -> Option<CombatDecision> {
    let action: CombatAction = DECIDE_RE.captures(reply)?.get(1)?.as_str().parse().ok()?;

    let targets = TARGETS_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| resolve_targets(m.as_str().split(','), situation))
        .unwrap_or_default();
    let item = WEAPON_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or_default();
    let rationale = NOTES_RE
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or_default();

    Some(build(action, targets, item, rationale))
}

fn build(action: CombatAction, targets: Vec<EntityId>, item: &str, rationale: &str) -> CombatDecision {
    let mut decision = CombatDecision::new(action)
        .with_targets(targets)
        .with_rationale(rationale.trim());
    let item = item.trim();
    if !is_blank(item) {
        decision = decision.with_item_hint(item.to_lowercase());
    }
    decision
}

/// Map id prefixes onto enemies, keeping order and dropping duplicates.
fn resolve_targets<'a>(
    prefixes: impl Iterator<Item = &'a str>,
    situation: &CombatSituation,
) -> Vec<EntityId> {
    let mut resolved = Vec::new();
    for prefix in prefixes {
        let prefix = prefix.trim().trim_matches(|c: char| c == '(' || c == ')').to_lowercase();
        if prefix.len() < MIN_TARGET_PREFIX || is_blank(&prefix) {
            continue;
        }
        let found = situation
            .enemies
            .iter()
            .find(|enemy| enemy.id.to_string().starts_with(&prefix));
        if let Some(enemy) = found {
            if !resolved.contains(&enemy.id) {
                resolved.push(enemy.id);
            }
        }
    }
    resolved
}

fn is_blank(value: &str) -> bool {
    value.is_empty() || value == "-" || value.eq_ignore_ascii_case("none")
}

#[cfg(test)]
mod tests {
    use super::*;
    use villagemind_domain::{Combatant, ThreatLevel};

    fn situation() -> (CombatSituation, EntityId, EntityId) {
        let zombie = Combatant::new(EntityId::new(), 20.0, 3.0, 4.0);
        let skeleton = Combatant::new(EntityId::new(), 20.0, 4.0, 10.0);
        let ids = (zombie.id, skeleton.id);
        (
            CombatSituation::new(vec![zombie, skeleton], vec![], ThreatLevel::Moderate),
            ids.0,
            ids.1,
        )
    }

    #[test]
    fn compact_reply_is_parsed() {
        let (situation, zombie, skeleton) = situation();
        let reply = format!(
            "ATTACK|{},{}|sword|Zombie is closest, a sound tactic",
            zombie.prefix(8),
            skeleton.prefix(8)
        );

        let decision = parse_decision(&reply, &situation).expect("parsed");

        assert_eq!(decision.action, CombatAction::Attack);
        assert_eq!(decision.target_ids, vec![zombie, skeleton]);
        assert_eq!(decision.item_hint.as_deref(), Some("sword"));
        assert_eq!(decision.rationale, "Zombie is closest, a sound tactic");
    }

    #[test]
    fn compact_reply_may_follow_chatter() {
        let (situation, _, _) = situation();

        let decision = parse_decision("Thinking...\nFLEE|none|-|Too many of them", &situation)
            .expect("parsed");

        assert_eq!(decision.action, CombatAction::Flee);
        assert!(decision.target_ids.is_empty());
        assert_eq!(decision.item_hint, None);
    }

    #[test]
    fn labelled_reply_is_parsed() {
        let (situation, zombie, _) = situation();
        let reply = format!(
            "Decide: attack\nTarget Priority: [{}]\nWeapon Choice: Axe\nTactical Notes: hit hard first",
            zombie.prefix(8)
        );

        let decision = parse_decision(&reply, &situation).expect("parsed");

        assert_eq!(decision.action, CombatAction::Attack);
        assert_eq!(decision.target_ids, vec![zombie]);
        assert_eq!(decision.item_hint.as_deref(), Some("axe"));
        assert_eq!(decision.rationale, "hit hard first");
    }

    #[test]
    fn unknown_prefixes_are_dropped() {
        let (situation, _, _) = situation();

        let decision = parse_decision("ATTACK|zzzzzzzz|bow|", &situation).expect("parsed");

        assert!(decision.target_ids.is_empty());
    }

    #[test]
    fn too_short_prefix_is_ignored() {
        let (situation, zombie, _) = situation();
        let reply = format!("ATTACK|{}|sword|", zombie.prefix(2));

        let decision = parse_decision(&reply, &situation).expect("parsed");

        assert!(decision.target_ids.is_empty());
    }

    #[test]
    fn prose_is_not_a_decision() {
        let (situation, _, _) = situation();

        assert_eq!(parse_decision("I think we should probably run away.", &situation), None);
        assert_eq!(parse_decision("", &situation), None);
        assert_eq!(parse_decision("DANCE|x|y|z", &situation), None);
    }
}
