//! Admission strategies.
//!
//! A ticket picks one [`Strategy`] at configuration time. Both variants answer
//! the same two questions over a [`CapacityModel`] snapshot:
//! - can one more registrant of a role be admitted right now?
//! - what admission estimate should a waiting registrant be shown?

use serde::{Deserialize, Serialize};

use crate::capacity::CapacityModel;
use crate::model::Role;

/// Default cutoff of the probabilistic strategy.
pub const DEFAULT_THRESHOLD: f64 = 0.96;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Strategy {
    /// Hard ratio cutoff with a grace window for the first registrants.
    #[default]
    Threshold,
    /// Admit while eventual admission is at least `threshold` likely.
    Probabilistic { threshold: f64 },
}

impl Strategy {
    pub fn probabilistic() -> Self {
        Strategy::Probabilistic {
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Whether one more registrant of `role` fits.
    ///
    /// With `consider_waiting`, a role with anyone already waiting is refused
    /// so newcomers cannot jump the queue.
    pub fn can_add(&self, model: &CapacityModel, role: Role, consider_waiting: bool) -> bool {
        if consider_waiting && model.stats_for(role).waiting > 0 {
            return false;
        }

        match self {
            Strategy::Threshold => threshold_can_add(model, role),
            Strategy::Probabilistic { threshold } => model.probability_for(role) >= *threshold,
        }
    }

    /// Admission estimate to show for `role`, `None` when not wait-listed.
    pub fn waiting_display(&self, model: &CapacityModel, role: Role) -> Option<f64> {
        match self {
            // already waiting counts as not addable
            Strategy::Threshold => {
                (!self.can_add(model, role, true)).then(|| model.probability_for(role))
            }
            Strategy::Probabilistic { threshold } => {
                let probability = model.probability_for(role);
                (probability < *threshold).then_some(probability)
            }
        }
    }
}

fn threshold_can_add(model: &CapacityModel, role: Role) -> bool {
    let total = u64::from(model.total_accepted());
    let max_available = u64::from(model.max_available());

    let Some(other_role) = role.complement() else {
        return total + 2 <= max_available;
    };

    if total + 1 > max_available {
        return false;
    }
    if total < u64::from(model.allow_first()) {
        return true;
    }

    // past the grace window a role cannot run away unopposed
    let other_total = model.stats_for(other_role).total();
    if other_total == 0 {
        return false;
    }

    let accepted = model.stats_for(role).accepted;
    f64::from(accepted + 1) / f64::from(other_total) <= model.ratio()
}

/// A capacity snapshot bound to the ticket's strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitingList {
    model: CapacityModel,
    strategy: Strategy,
}

impl WaitingList {
    pub fn new(model: CapacityModel, strategy: Strategy) -> Self {
        Self { model, strategy }
    }

    pub fn model(&self) -> &CapacityModel {
        &self.model
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Whether a new registrant of `role` is accepted, respecting the queue.
    pub fn can_add(&self, role: Role) -> bool {
        self.strategy.can_add(&self.model, role, true)
    }

    /// Whether one more `role` fits, regardless of who is already waiting.
    pub fn can_add_ignoring_queue(&self, role: Role) -> bool {
        self.strategy.can_add(&self.model, role, false)
    }

    pub fn waiting_display(&self, role: Role) -> Option<f64> {
        self.strategy.waiting_display(&self.model, role)
    }

    /// Display values of all three roles.
    pub fn waiting_stats(&self) -> [(Role, Option<f64>); 3] {
        Role::ALL.map(|role| (role, self.waiting_display(role)))
    }

    /// Someone of `role` is waiting and one more of `role` would fit.
    pub fn needs_balancing(&self, role: Role) -> bool {
        self.model.stats_for(role).waiting > 0 && self.can_add_ignoring_queue(role)
    }

    pub fn needs_any_balancing(&self) -> bool {
        Role::ALL.into_iter().any(|role| self.needs_balancing(role))
    }
}
