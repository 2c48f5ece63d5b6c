//! Entity identifiers and the persisted progression record.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::formula::Xp;

/// Opaque identifier of a progressing entity (player, pet, guild, ...).
///
/// The core never allocates identifiers; hosts hand them in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generates a fresh random identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    #[inline]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for EntityId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated form, 36 chars; matches the `entity_id` column width.
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// XP held by a single entity.
///
/// `xp` is never negative: every write path clamps at zero. The level is not
/// stored here; it is always derived from `xp` by the active formula.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressionRecord {
    entity_id: EntityId,
    xp: Xp,
}

impl ProgressionRecord {
    /// Fresh record with zero XP.
    pub fn new(entity_id: EntityId) -> Self {
        Self { entity_id, xp: 0 }
    }

    /// Record with the given XP, clamped at zero.
    pub fn with_xp(entity_id: EntityId, xp: Xp) -> Self {
        Self {
            entity_id,
            xp: xp.max(0),
        }
    }

    #[inline]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    #[inline]
    pub fn xp(&self) -> Xp {
        self.xp
    }

    /// Overwrites the XP; negative input clamps to zero.
    pub fn set_xp(&mut self, xp: Xp) {
        self.xp = xp.max(0);
    }
}
