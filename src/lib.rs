pub mod capacity;
pub mod csv;
pub mod engine;
pub mod model;
pub mod probability;
pub mod strategy;

pub use capacity::{CapacityModel, ConfigError, TicketConfig};
pub use engine::{Engine, EngineError, Outcome, TicketBook};
pub use model::{Command, Registration, RegistrationId, Role, Submission, TicketKey};
pub use strategy::{Strategy, WaitingList};
