//! Core domain types for the waiting-list engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capacity::TicketConfig;

/// Registration identifier, unique within a ticket.
pub type RegistrationId = u32;

/// Ticket identifier.
pub type TicketKey = String;

/// Registrant role.
///
/// `Couple` is virtual: it is used for capacity bookkeeping of paired
/// registrations and is never stored on an individual record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    Follower,
    Couple,
}

impl Role {
    /// The two roles a single registrant can hold, in balancing order.
    pub const SOLO: [Role; 2] = [Role::Leader, Role::Follower];

    pub const ALL: [Role; 3] = [Role::Leader, Role::Follower, Role::Couple];

    /// The complementary solo role, `None` for `Couple`.
    pub fn complement(self) -> Option<Role> {
        match self {
            Role::Leader => Some(Role::Follower),
            Role::Follower => Some(Role::Leader),
            Role::Couple => None,
        }
    }

    pub fn is_solo(self) -> bool {
        !matches!(self, Role::Couple)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Leader => "leader",
            Role::Follower => "follower",
            Role::Couple => "couple",
        };
        f.write_str(name)
    }
}

/// A single registration for a ticket.
///
/// A couple is two records pointing at each other through `paired_with`.
/// Records start inactive and only count towards capacity once the external
/// payment flow has confirmed them.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub id: RegistrationId,
    pub role: Option<Role>,
    pub paired_with: Option<RegistrationId>,
    pub waiting: bool,
    pub active: bool,
}

impl Registration {
    /// Create an inactive, accepted registration.
    pub fn new(id: RegistrationId, role: Option<Role>) -> Self {
        Self {
            id,
            role,
            paired_with: None,
            waiting: false,
            active: false,
        }
    }

    pub fn with_partner(mut self, partner: RegistrationId) -> Self {
        self.paired_with = Some(partner);
        self
    }

    pub fn with_waiting(mut self, waiting: bool) -> Self {
        self.waiting = waiting;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_paired(&self) -> bool {
        self.paired_with.is_some()
    }
}

/// A new registration handed over by the intake layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// One registrant taking a solo role.
    Solo { id: RegistrationId, role: Role },
    /// Two registrants signing up together; `partner` takes the complement
    /// of `role`.
    Couple {
        id: RegistrationId,
        partner: RegistrationId,
        role: Role,
    },
}

impl Submission {
    /// The role the admission decision is taken for.
    pub fn admission_role(&self) -> Role {
        match self {
            Submission::Solo { role, .. } => *role,
            Submission::Couple { .. } => Role::Couple,
        }
    }

    pub fn id(&self) -> RegistrationId {
        match self {
            Submission::Solo { id, .. } | Submission::Couple { id, .. } => *id,
        }
    }
}

/// A command representing the possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Create a ticket, or replace its configuration and keep its ledger.
    Configure {
        ticket: TicketKey,
        config: TicketConfig,
    },
    /// Record a submission and decide whether it waits.
    Register {
        ticket: TicketKey,
        submission: Submission,
    },
    /// Register and confirm in one step.
    Admit {
        ticket: TicketKey,
        submission: Submission,
    },
    /// Payment confirmed; the registration (and its twin) starts counting.
    Confirm { ticket: TicketKey, id: RegistrationId },
    /// The registration (and its twin) stops counting.
    Cancel { ticket: TicketKey, id: RegistrationId },
    /// Pair `id` with the first eligible registration among `candidates`.
    Pair {
        ticket: TicketKey,
        id: RegistrationId,
        candidates: Vec<RegistrationId>,
    },
    /// Promote everyone who fits now.
    Balance { ticket: TicketKey },
}

impl Command {
    pub fn ticket(&self) -> &str {
        match self {
            Command::Configure { ticket, .. }
            | Command::Register { ticket, .. }
            | Command::Admit { ticket, .. }
            | Command::Confirm { ticket, .. }
            | Command::Cancel { ticket, .. }
            | Command::Pair { ticket, .. }
            | Command::Balance { ticket } => ticket,
        }
    }
}

/// Accepted/waiting counts for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrationStats {
    pub accepted: u32,
    pub waiting: u32,
}

impl RegistrationStats {
    pub fn new(accepted: u32, waiting: u32) -> Self {
        Self { accepted, waiting }
    }

    pub fn total(&self) -> u32 {
        self.accepted + self.waiting
    }
}

/// Stats for all three roles. Absent roles are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleStats {
    pub leader: RegistrationStats,
    pub follower: RegistrationStats,
    pub couple: RegistrationStats,
}

impl RoleStats {
    pub fn get(&self, role: Role) -> RegistrationStats {
        match role {
            Role::Leader => self.leader,
            Role::Follower => self.follower,
            Role::Couple => self.couple,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut RegistrationStats {
        match role {
            Role::Leader => &mut self.leader,
            Role::Follower => &mut self.follower,
            Role::Couple => &mut self.couple,
        }
    }
}
