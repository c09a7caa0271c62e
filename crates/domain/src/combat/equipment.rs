use serde::{Deserialize, Serialize};
use std::fmt;

/// Weapon families a villager may pick up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Sword,
    Axe,
    Bow,
    Crossbow,
}

impl WeaponKind {
    pub fn is_ranged(&self) -> bool {
        matches!(self, WeaponKind::Bow | WeaponKind::Crossbow)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WeaponKind::Sword => "sword",
            WeaponKind::Axe => "axe",
            WeaponKind::Bow => "bow",
            WeaponKind::Crossbow => "crossbow",
        }
    }
}

impl fmt::Display for WeaponKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for WeaponKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sword" => Ok(WeaponKind::Sword),
            "axe" => Ok(WeaponKind::Axe),
            "bow" => Ok(WeaponKind::Bow),
            "crossbow" => Ok(WeaponKind::Crossbow),
            _ => Err(format!("Unknown weapon: {}", s)),
        }
    }
}

/// A carried weapon and its base damage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub damage: f32,
}

impl Weapon {
    pub fn new(kind: WeaponKind, damage: f32) -> Self {
        Self { kind, damage }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmorSlot {
    Head,
    Chest,
    Legs,
    Feet,
}

/// A piece of armor with its defense value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    pub slot: ArmorSlot,
    pub defense: u32,
}

impl Armor {
    pub fn new(name: impl Into<String>, slot: ArmorSlot, defense: u32) -> Self {
        Self {
            name: name.into(),
            slot,
            defense,
        }
    }
}
