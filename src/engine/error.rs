//! Error types for ticket operations.

use thiserror::Error;

use crate::capacity::ConfigError;
use crate::model::{RegistrationId, TicketKey};

/// Top-level error returned by [`Engine`](super::Engine) operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ticket '{0}' is not configured")]
    UnknownTicket(TicketKey),

    #[error("invalid ticket configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Registration(#[from] RegistrationError),
}

/// Caller mistakes against a ticket's ledger.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("duplicate registration id {0}")]
    DuplicateId(RegistrationId),

    #[error("registration {0} not found")]
    NotFound(RegistrationId),

    #[error("registration {0} cannot hold the couple role")]
    CoupleRole(RegistrationId),

    #[error("couple registration {0} cannot be its own partner")]
    SelfPartner(RegistrationId),

    #[error("registration {0} is already paired with {1}")]
    AlreadyPaired(RegistrationId, RegistrationId),

    #[error("registration {0} has no role to pair on")]
    NoRole(RegistrationId),
}
