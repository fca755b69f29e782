//! A single ticket: its configuration plus its registration ledger.
//!
//! Every decision rebuilds a [`WaitingList`] from the ledger, so nothing here
//! caches stats between calls.

use tracing::{debug, warn};

use crate::capacity::{CapacityModel, ConfigError, TicketConfig};
use crate::model::{Registration, RegistrationId, Role, Submission, TicketKey};
use crate::strategy::WaitingList;

use super::ledger::Ledger;
use super::{EngineError, RegistrationError};

/// Admission decision for a new submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    /// Ids of the stored records, the couple twin second.
    pub ids: Vec<RegistrationId>,
    pub waiting: bool,
    /// Estimated chance of eventual admission, only while waiting.
    pub probability: Option<f64>,
}

impl Admission {
    pub fn accepted(&self) -> bool {
        !self.waiting
    }
}

/// Two solo registrations linked into a couple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub registration: RegistrationId,
    pub partner: RegistrationId,
}

/// Per-role numbers of a ticket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleNumbers {
    pub role: Role,
    pub accepted: u32,
    pub waiting: u32,
    /// A new registrant of this role would be put on the waiting list.
    pub wait_listed: bool,
    pub waiting_probability: Option<f64>,
}

/// Summary of a ticket for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketNumbers {
    /// Active registrations holding a place.
    pub accepted: u32,
    pub remaining: u32,
    pub roles: [RoleNumbers; 3],
}

impl TicketNumbers {
    pub fn role(&self, role: Role) -> &RoleNumbers {
        match role {
            Role::Leader => &self.roles[0],
            Role::Follower => &self.roles[1],
            Role::Couple => &self.roles[2],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketBook {
    key: TicketKey,
    config: TicketConfig,
    ledger: Ledger,
}

/// Public API
impl TicketBook {
    pub fn new(key: impl Into<TicketKey>, config: TicketConfig) -> Result<Self, ConfigError> {
        Self::with_ledger(key, config, Ledger::new())
    }

    /// Load a ticket whose registrations are already on file.
    pub fn with_ledger(
        key: impl Into<TicketKey>,
        config: TicketConfig,
        ledger: Ledger,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let key = key.into();
        for id in ledger.split_couples() {
            warn!(ticket = %key, id, "couple member waiting while its twin is accepted");
        }
        Ok(Self {
            key,
            config,
            ledger,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &TicketConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn get(&self, id: RegistrationId) -> Option<&Registration> {
        self.ledger.get(id)
    }

    /// Replace the configuration, keeping every registration.
    pub fn reconfigure(&mut self, config: TicketConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Snapshot of the ticket's current capacity under its strategy.
    pub fn waiting_list(&self) -> Result<WaitingList, ConfigError> {
        let model = CapacityModel::new(&self.config, self.ledger.stats())?;
        Ok(WaitingList::new(model, self.config.strategy))
    }

    /// Store a new submission and decide whether it waits.
    ///
    /// The decision is taken on the ledger as it was before the submission;
    /// the new records are inactive until [`confirm`](Self::confirm).
    pub fn register(&mut self, submission: Submission) -> Result<Admission, EngineError> {
        let records = match submission {
            Submission::Solo { id, role } => {
                if !role.is_solo() {
                    return Err(RegistrationError::CoupleRole(id).into());
                }
                vec![Registration::new(id, Some(role))]
            }
            Submission::Couple { id, partner, role } => {
                let Some(twin_role) = role.complement() else {
                    return Err(RegistrationError::CoupleRole(id).into());
                };
                if id == partner {
                    return Err(RegistrationError::SelfPartner(id).into());
                }
                vec![
                    Registration::new(id, Some(role)).with_partner(partner),
                    Registration::new(partner, Some(twin_role)).with_partner(id),
                ]
            }
        };

        let role = submission.admission_role();
        let list = self.waiting_list()?;
        let waiting = !list.can_add(role);
        let probability = waiting.then(|| list.model().probability_for(role));

        let ids = records.iter().map(|r| r.id).collect();
        self.ledger
            .insert_all(records.into_iter().map(|r| r.with_waiting(waiting)).collect())?;

        Ok(Admission {
            ids,
            waiting,
            probability,
        })
    }

    /// Register and confirm in one step, for flows without a payment stage.
    pub fn admit(
        &mut self,
        submission: Submission,
    ) -> Result<(Admission, Vec<RegistrationId>), EngineError> {
        let admission = self.register(submission)?;
        let promoted = self.confirm(submission.id())?;
        Ok((admission, promoted))
    }

    /// Payment confirmed: the registration and its twin start counting.
    /// Runs a balancing pass and returns the promoted ids.
    ///
    /// An acceptance given at registration is provisional: a record that
    /// starts counting now goes to the waiting list if the places it was
    /// promised have been taken in the meantime.
    pub fn confirm(&mut self, id: RegistrationId) -> Result<Vec<RegistrationId>, EngineError> {
        let record = self
            .ledger
            .get(id)
            .ok_or(RegistrationError::NotFound(id))?;
        if !record.active && !record.waiting {
            let role = if record.is_paired() {
                Some(Role::Couple)
            } else {
                record.role
            };
            if let Some(role) = role {
                if !self.waiting_list()?.can_add(role) {
                    debug!(ticket = %self.key, id, "places taken before confirmation");
                    self.set_waiting(id, true);
                }
            }
        }

        self.set_active(id, true)?;
        Ok(self.balance()?)
    }

    /// The registration and its twin stop counting. Runs a balancing pass
    /// and returns the promoted ids.
    pub fn cancel(&mut self, id: RegistrationId) -> Result<Vec<RegistrationId>, EngineError> {
        self.set_active(id, false)?;
        Ok(self.balance()?)
    }

    /// Promote waiting registrations until nothing more fits.
    ///
    /// Couples go first, then the oldest leader, then the oldest follower;
    /// stats are rebuilt after every single promotion.
    pub fn balance(&mut self) -> Result<Vec<RegistrationId>, ConfigError> {
        let mut promoted = Vec::new();

        loop {
            let list = self.waiting_list()?;
            let before = promoted.len();

            if list.needs_balancing(Role::Couple) {
                if let Some((id, partner)) = self.ledger.first_waiting_couple() {
                    self.promote(id, &mut promoted);
                    match partner {
                        Some(partner) => self.promote(partner, &mut promoted),
                        None => warn!(
                            ticket = %self.key,
                            id,
                            "couple promoted without a waiting partner"
                        ),
                    }
                }
            }

            if promoted.len() == before {
                for role in Role::SOLO {
                    if !list.needs_balancing(role) {
                        continue;
                    }
                    // waiting couple members only move together
                    if let Some(id) = self.ledger.first_waiting_solo(role) {
                        self.promote(id, &mut promoted);
                        break;
                    }
                }
            }

            if promoted.len() == before {
                return Ok(promoted);
            }
        }
    }

    /// Pair `id` with the first eligible registration among `candidates`.
    ///
    /// Eligible means active, unpaired and holding the complementary role.
    /// A successful pairing accepts both records regardless of the queue.
    /// `Ok(None)` when `id` is not active, the couple does not fit or no
    /// candidate qualifies.
    pub fn pair(
        &mut self,
        id: RegistrationId,
        candidates: &[RegistrationId],
    ) -> Result<Option<Pairing>, EngineError> {
        let record = self
            .ledger
            .get(id)
            .ok_or(RegistrationError::NotFound(id))?;
        if let Some(partner) = record.paired_with {
            return Err(RegistrationError::AlreadyPaired(id, partner).into());
        }
        let wanted = record
            .role
            .and_then(Role::complement)
            .ok_or(RegistrationError::NoRole(id))?;

        if !record.active || !self.waiting_list()?.can_add(Role::Couple) {
            return Ok(None);
        }

        let partner = candidates.iter().copied().find(|candidate| {
            *candidate != id
                && self.ledger.get(*candidate).is_some_and(|r| {
                    r.active && !r.is_paired() && r.role == Some(wanted)
                })
        });
        let Some(partner) = partner else {
            return Ok(None);
        };

        for (this, other) in [(id, partner), (partner, id)] {
            if let Some(record) = self.ledger.get_mut(this) {
                record.paired_with = Some(other);
                record.waiting = false;
            }
        }

        Ok(Some(Pairing {
            registration: id,
            partner,
        }))
    }

    /// Accepted/waiting numbers and the estimate shown for every role.
    pub fn numbers(&self) -> Result<TicketNumbers, ConfigError> {
        let list = self.waiting_list()?;
        let accepted = self.ledger.accepted();

        let roles = Role::ALL.map(|role| {
            let stats = list.model().stats_for(role);
            RoleNumbers {
                role,
                accepted: stats.accepted,
                waiting: stats.waiting,
                wait_listed: !list.can_add(role),
                waiting_probability: list.waiting_display(role),
            }
        });

        Ok(TicketNumbers {
            accepted,
            remaining: self.config.max_available.saturating_sub(accepted),
            roles,
        })
    }
}

/// Private API
impl TicketBook {
    fn promote(&mut self, id: RegistrationId, promoted: &mut Vec<RegistrationId>) {
        if let Some(record) = self.ledger.get_mut(id) {
            record.waiting = false;
            debug!(ticket = %self.key, id, role = ?record.role, "promoted");
            promoted.push(id);
        }
    }

    /// Set `waiting` on a record and its couple twin.
    fn set_waiting(&mut self, id: RegistrationId, waiting: bool) {
        let Some(record) = self.ledger.get_mut(id) else {
            return;
        };
        record.waiting = waiting;

        if let Some(twin) = record.paired_with.and_then(|p| self.ledger.get_mut(p)) {
            twin.waiting = waiting;
        }
    }

    /// Flip `active` on a record and its couple twin.
    fn set_active(&mut self, id: RegistrationId, active: bool) -> Result<(), RegistrationError> {
        let record = self
            .ledger
            .get_mut(id)
            .ok_or(RegistrationError::NotFound(id))?;
        record.active = active;

        if let Some(twin) = record.paired_with.and_then(|p| self.ledger.get_mut(p)) {
            twin.active = active;
        }
        Ok(())
    }
}
