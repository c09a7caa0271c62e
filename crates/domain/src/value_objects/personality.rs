//! Combat and trade personality traits.

use serde::{Deserialize, Serialize};

/// Five bounded personality traits, each in `[0.0, 1.0]`.
///
/// The same traits drive both combat (fight/flee/defend) and trade
/// (stubbornness, acceptance thresholds) behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatPersonalityTraits {
    courage: f32,
    aggression: f32,
    self_preservation: f32,
    loyalty: f32,
    vengefulness: f32,
}

impl CombatPersonalityTraits {
    /// Create traits, clamping every value into `[0.0, 1.0]`.
    pub fn new(
        courage: f32,
        aggression: f32,
        self_preservation: f32,
        loyalty: f32,
        vengefulness: f32,
    ) -> Self {
        Self {
            courage: unit(courage),
            aggression: unit(aggression),
            self_preservation: unit(self_preservation),
            loyalty: unit(loyalty),
            vengefulness: unit(vengefulness),
        }
    }

    /// Bold and quick to anger.
    pub fn aggressive() -> Self {
        Self::new(0.9, 0.8, 0.3, 0.6, 0.7)
    }

    /// Avoids danger at almost any cost.
    pub fn timid() -> Self {
        Self::new(0.2, 0.1, 0.9, 0.7, 0.2)
    }

    /// Stands by friends and family.
    pub fn loyal() -> Self {
        Self::new(0.6, 0.4, 0.5, 0.9, 0.6)
    }

    pub fn courage(&self) -> f32 {
        self.courage
    }

    pub fn aggression(&self) -> f32 {
        self.aggression
    }

    pub fn self_preservation(&self) -> f32 {
        self.self_preservation
    }

    pub fn loyalty(&self) -> f32 {
        self.loyalty
    }

    pub fn vengefulness(&self) -> f32 {
        self.vengefulness
    }

    /// How hard a trader holds out: high aggression and low self-preservation.
    pub fn stubbornness(&self) -> f32 {
        (self.aggression + (1.0 - self.self_preservation)) / 2.0
    }
}

impl Default for CombatPersonalityTraits {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.5, 0.7, 0.5)
    }
}

fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_out_of_range_values() {
        let traits = CombatPersonalityTraits::new(1.5, -0.2, f32::NAN, 0.4, 2.0);
        assert_eq!(traits.courage(), 1.0);
        assert_eq!(traits.aggression(), 0.0);
        assert_eq!(traits.self_preservation(), 0.0);
        assert_eq!(traits.loyalty(), 0.4);
        assert_eq!(traits.vengefulness(), 1.0);
    }

    #[test]
    fn aggressive_traders_are_more_stubborn_than_timid_ones() {
        assert!(
            CombatPersonalityTraits::aggressive().stubbornness()
                > CombatPersonalityTraits::timid().stubbornness()
        );
    }

    #[test]
    fn serializes_with_field_names() {
        let json = serde_json::to_value(CombatPersonalityTraits::default()).expect("serialize");
        let loyalty = json["loyalty"].as_f64().expect("loyalty is a number");
        assert!((loyalty - 0.7).abs() < 1e-6);
    }
}
