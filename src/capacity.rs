//! Per-ticket capacity configuration and the snapshot math shared by the
//! admission strategies.
//!
//! A [`CapacityModel`] is rebuilt from the live ledger for every decision and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{RegistrationStats, Role, RoleStats};
use crate::probability::waiting_probability;
use crate::strategy::Strategy;

/// Invalid ticket configuration. Never clamped, always surfaced.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("ratio must be a finite number >= 1.0, got {0}")]
    InvalidRatio(f64),

    #[error("admission threshold must be within (0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("expected {0} count {1} exceeds capacity {2}")]
    ExpectedExceedsCapacity(Role, u32, u32),
}

/// Static configuration of a capacity-limited ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketConfig {
    /// Individual-registrant capacity; a couple takes two units.
    pub max_available: u32,
    /// Maximum tolerated imbalance between leaders and followers.
    pub ratio: f64,
    /// Accepted registrants admitted before the ratio is enforced.
    /// Defaults to `max_available`.
    #[serde(default)]
    pub allow_first: Option<u32>,
    /// Forecast of how many leaders the ticket will end up with.
    /// Defaults to half the capacity.
    #[serde(default)]
    pub expected_leads: Option<u32>,
    /// Forecast of how many followers the ticket will end up with.
    /// Defaults to half the capacity.
    #[serde(default)]
    pub expected_follows: Option<u32>,
    #[serde(default)]
    pub strategy: Strategy,
}

impl TicketConfig {
    pub fn new(max_available: u32, ratio: f64) -> Self {
        Self {
            max_available,
            ratio,
            allow_first: None,
            expected_leads: None,
            expected_follows: None,
            strategy: Strategy::default(),
        }
    }

    pub fn with_allow_first(mut self, allow_first: u32) -> Self {
        self.allow_first = Some(allow_first);
        self
    }

    pub fn with_expected(mut self, leads: u32, follows: u32) -> Self {
        self.expected_leads = Some(leads);
        self.expected_follows = Some(follows);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ratio.is_finite() || self.ratio < 1.0 {
            return Err(ConfigError::InvalidRatio(self.ratio));
        }

        if let Strategy::Probabilistic { threshold } = self.strategy {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(ConfigError::InvalidThreshold(threshold));
            }
        }

        for (role, expected) in [
            (Role::Leader, self.expected_leads),
            (Role::Follower, self.expected_follows),
        ] {
            if let Some(expected) = expected.filter(|e| *e > self.max_available) {
                return Err(ConfigError::ExpectedExceedsCapacity(
                    role,
                    expected,
                    self.max_available,
                ));
            }
        }

        Ok(())
    }
}

/// Capacity configuration plus the current stats of every role.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityModel {
    max_available: u32,
    ratio: f64,
    allow_first: u32,
    expected_leads: u32,
    expected_follows: u32,
    stats: RoleStats,
}

impl CapacityModel {
    pub fn new(config: &TicketConfig, stats: RoleStats) -> Result<Self, ConfigError> {
        config.validate()?;

        let half = config.max_available / 2;
        Ok(Self {
            max_available: config.max_available,
            ratio: config.ratio,
            allow_first: config.allow_first.unwrap_or(config.max_available),
            expected_leads: config.expected_leads.unwrap_or(half),
            expected_follows: config.expected_follows.unwrap_or(half),
            stats,
        })
    }

    pub fn max_available(&self) -> u32 {
        self.max_available
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn allow_first(&self) -> u32 {
        self.allow_first
    }

    pub fn stats(&self) -> &RoleStats {
        &self.stats
    }

    pub fn stats_for(&self, role: Role) -> RegistrationStats {
        self.stats.get(role)
    }

    /// Expected final count of a solo role; zero for `Couple`.
    pub fn expected_for(&self, role: Role) -> u32 {
        match role {
            Role::Leader => self.expected_leads,
            Role::Follower => self.expected_follows,
            Role::Couple => 0,
        }
    }

    /// Accepted leaders plus accepted followers. Couples are already counted
    /// through their two members.
    pub fn total_accepted(&self) -> u32 {
        self.stats.leader.accepted + self.stats.follower.accepted
    }

    /// Free capacity units, zero when already over capacity.
    pub fn remaining(&self) -> u32 {
        self.max_available.saturating_sub(self.total_accepted())
    }

    pub fn has_waiting_list(&self) -> bool {
        self.stats.leader.waiting > 0 || self.stats.follower.waiting > 0
    }

    /// Current imbalance between accepted leaders and followers, `None` while
    /// either side has nobody accepted.
    pub fn current_ratio(&self) -> Option<f64> {
        let leaders = self.stats.leader.accepted;
        let followers = self.stats.follower.accepted;
        if leaders == 0 || followers == 0 {
            return None;
        }

        let (leaders, followers) = (f64::from(leaders), f64::from(followers));
        Some((leaders / followers).max(followers / leaders))
    }

    /// Estimated chance that one more registrant of `role` is eventually
    /// admitted.
    pub fn probability_for(&self, role: Role) -> f64 {
        let total = u64::from(self.total_accepted());
        let max_available = u64::from(self.max_available);

        let Some(other_role) = role.complement() else {
            return if total + 2 <= max_available { 1.0 } else { 0.0 };
        };

        if total + 1 > max_available {
            return 0.0;
        }

        let mine = self.stats.get(role);
        let this = mine.accepted + mine.waiting + 1;
        let other = self.stats.get(other_role).accepted;
        let p_other = f64::from(self.expected_for(other_role)) / f64::from(self.max_available);

        waiting_probability(self.max_available, self.ratio, this, other, p_other)
    }
}
