//! Storage tiers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Storage tier an event currently lives in.
///
/// Tiers only ever advance (`Hot` → `Warm` → `Cold`); expiry deletes the
/// record instead of assigning a further tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StorageTier {
    /// Fast storage, fully queryable.
    Hot,
    /// Compressed storage, range queries only.
    Warm,
    /// Archival; retrieval requires an explicit restore.
    Cold,
}

impl StorageTier {
    /// The tier that follows this one, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Hot => Some(Self::Warm),
            Self::Warm => Some(Self::Cold),
            Self::Cold => None,
        }
    }

    /// Whether records in this tier are served by the query API.
    pub fn is_queryable(&self) -> bool {
        !matches!(self, Self::Cold)
    }
}

impl Default for StorageTier {
    fn default() -> Self {
        Self::Hot
    }
}
