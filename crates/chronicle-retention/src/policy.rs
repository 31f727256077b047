//! Per-category retention policy table.

use crate::RetentionError;
use chronicle_types::{EventCategory, StorageTier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tier transition thresholds for one event category, in days of age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierWindows {
    /// Age at which a hot record becomes warm.
    pub hot_days: u32,
    /// Age at which a warm record becomes cold.
    pub warm_days: u32,
    /// Age at which a record is permanently deleted.
    pub expire_days: u32,
}

impl TierWindows {
    /// Construct a window set.
    pub const fn new(hot_days: u32, warm_days: u32, expire_days: u32) -> Self {
        Self {
            hot_days,
            warm_days,
            expire_days,
        }
    }

    /// Validate threshold ordering.
    pub fn validate(&self) -> Result<(), RetentionError> {
        if self.hot_days == 0 {
            return Err(RetentionError::InvalidPolicy("hot_days must be > 0".into()));
        }
        if self.hot_days >= self.warm_days {
            return Err(RetentionError::InvalidPolicy(
                "hot_days must be < warm_days".into(),
            ));
        }
        if self.warm_days >= self.expire_days {
            return Err(RetentionError::InvalidPolicy(
                "warm_days must be < expire_days".into(),
            ));
        }
        Ok(())
    }
}

/// What the lifecycle manager should do with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierDecision {
    /// Leave it where it is.
    Keep,
    /// Advance it to the next tier.
    Advance,
    /// Permanently delete it.
    Delete,
}

/// Retention windows per event category.
///
/// Security, compliance, and auth events carry the longest windows;
/// performance and debug events the shortest. A producer-supplied
/// `retention_days` overrides the expiry horizon for that one event but
/// never the tier transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTable {
    default: TierWindows,
    per_category: HashMap<EventCategory, TierWindows>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let extended = TierWindows::new(90, 365, 2_555);
        let standard = TierWindows::new(30, 90, 365);
        let short = TierWindows::new(7, 30, 90);

        let mut per_category = HashMap::new();
        for category in EventCategory::all() {
            let windows = if category.requires_extended_retention() {
                extended
            } else {
                match category {
                    EventCategory::Performance | EventCategory::Debug => short,
                    _ => standard,
                }
            };
            per_category.insert(category, windows);
        }

        Self {
            default: standard,
            per_category,
        }
    }
}

impl PolicyTable {
    /// Windows for a category, falling back to the default.
    pub fn windows(&self, category: EventCategory) -> TierWindows {
        self.per_category
            .get(&category)
            .copied()
            .unwrap_or(self.default)
    }

    /// Override the windows for one category.
    pub fn set_windows(&mut self, category: EventCategory, windows: TierWindows) {
        self.per_category.insert(category, windows);
    }

    /// Effective expiry horizon for a record, honoring its override.
    pub fn effective_expire_days(
        &self,
        category: EventCategory,
        retention_override: Option<u32>,
    ) -> u32 {
        retention_override.unwrap_or_else(|| self.windows(category).expire_days)
    }

    /// Decide the fate of a record of `age_days` sitting in `tier`.
    ///
    /// Expiry wins over advancement, so a short `retention_days` override
    /// can delete straight out of any tier.
    pub fn decide(
        &self,
        tier: StorageTier,
        category: EventCategory,
        age_days: u32,
        retention_override: Option<u32>,
    ) -> TierDecision {
        if age_days >= self.effective_expire_days(category, retention_override) {
            return TierDecision::Delete;
        }
        let windows = self.windows(category);
        let threshold = match tier {
            StorageTier::Hot => windows.hot_days,
            StorageTier::Warm => windows.warm_days,
            StorageTier::Cold => return TierDecision::Keep,
        };
        if age_days >= threshold {
            TierDecision::Advance
        } else {
            TierDecision::Keep
        }
    }

    /// Validate every configured window set.
    pub fn validate(&self) -> Result<(), RetentionError> {
        self.default.validate()?;
        for windows in self.per_category.values() {
            windows.validate()?;
        }
        Ok(())
    }
}
