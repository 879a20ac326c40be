use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique card identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Card rarity tiers.
///
/// Each tier carries a drop chance (percent, summing to 100 across tiers) and
/// a power range. Rarity rolls themselves happen in the collaborator that
/// deals hands; the tiers are shared vocabulary on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl CardRarity {
    /// Drop chance in percent.
    pub fn drop_chance(&self) -> u8 {
        match self {
            CardRarity::Common => 60,
            CardRarity::Uncommon => 25,
            CardRarity::Rare => 10,
            CardRarity::Epic => 4,
            CardRarity::Legendary => 1,
        }
    }

    /// Inclusive power range for cards of this rarity.
    pub fn power_range(&self) -> (u16, u16) {
        match self {
            CardRarity::Common => (10, 29),
            CardRarity::Uncommon => (30, 49),
            CardRarity::Rare => (50, 69),
            CardRarity::Epic => (70, 89),
            CardRarity::Legendary => (90, 100),
        }
    }

    /// Map a roll in `0..100` to a rarity tier, rarest first.
    pub fn from_roll(roll: u8) -> Self {
        let mut cumulative = 0u8;
        for rarity in [
            CardRarity::Legendary,
            CardRarity::Epic,
            CardRarity::Rare,
            CardRarity::Uncommon,
            CardRarity::Common,
        ] {
            cumulative = cumulative.saturating_add(rarity.drop_chance());
            if roll < cumulative {
                return rarity;
            }
        }
        CardRarity::Common
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardRarity::Common => "COMMON",
            CardRarity::Uncommon => "UNCOMMON",
            CardRarity::Rare => "RARE",
            CardRarity::Epic => "EPIC",
            CardRarity::Legendary => "LEGENDARY",
        }
    }
}

/// An owned card, as dealt into a player's hand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    pub power: u16,
    pub rarity: CardRarity,
}

impl Card {
    pub fn new(name: String, power: u16, rarity: CardRarity) -> Self {
        Self {
            id: CardId::generate(),
            name,
            power,
            rarity,
        }
    }
}
