//! Waiting-list engine.
//!
//! The engine keeps one [`TicketBook`] per ticket and serializes every
//! decision on a ticket behind that ticket's own lock. Distinct tickets never
//! contend with each other. Also supports an async stream of commands.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::capacity::TicketConfig;
use crate::model::{Command, RegistrationId, Submission, TicketKey};

mod error;
pub use error::{EngineError, RegistrationError};

mod ledger;
pub use ledger::Ledger;

mod ticket;
pub use ticket::{Admission, Pairing, RoleNumbers, TicketBook, TicketNumbers};

/// Result of an applied [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Configured,
    Admitted {
        admission: Admission,
        promoted: Vec<RegistrationId>,
    },
    Promoted(Vec<RegistrationId>),
    Paired(Option<Pairing>),
}

/// The waiting-list engine.
///
/// Every method takes `&self`; wrap the engine in an `Arc` to share it
/// between tasks.
#[derive(Default)]
pub struct Engine {
    /// Ticket registry; only held long enough to look a ticket up
    tickets: Mutex<BTreeMap<TicketKey, Arc<Mutex<TicketBook>>>>,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the engine with the given command stream
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a failed command never stops the engine, it is logged by `apply`
            let _ = self.apply(command).await;
        }
    }

    /// Apply a single command on top of the current engine state
    pub async fn apply(&self, command: Command) -> Result<Outcome, EngineError> {
        match command {
            Command::Configure { ticket, config } => {
                let result = self.configure(&ticket, config).await.map(|()| Outcome::Configured);
                Self::log_result("configure", &ticket, None, &result);
                result
            }
            Command::Register { ticket, submission } => {
                let result = self
                    .register(&ticket, submission)
                    .await
                    .map(|admission| Outcome::Admitted {
                        admission,
                        promoted: Vec::new(),
                    });
                Self::log_result("register", &ticket, Some(submission.id()), &result);
                result
            }
            Command::Admit { ticket, submission } => {
                let result = self
                    .admit(&ticket, submission)
                    .await
                    .map(|(admission, promoted)| Outcome::Admitted {
                        admission,
                        promoted,
                    });
                Self::log_result("admit", &ticket, Some(submission.id()), &result);
                result
            }
            Command::Confirm { ticket, id } => {
                let result = self.confirm(&ticket, id).await.map(Outcome::Promoted);
                Self::log_result("confirm", &ticket, Some(id), &result);
                result
            }
            Command::Cancel { ticket, id } => {
                let result = self.cancel(&ticket, id).await.map(Outcome::Promoted);
                Self::log_result("cancel", &ticket, Some(id), &result);
                result
            }
            Command::Pair {
                ticket,
                id,
                candidates,
            } => {
                let result = self.pair(&ticket, id, &candidates).await.map(Outcome::Paired);
                Self::log_result("pair", &ticket, Some(id), &result);
                result
            }
            Command::Balance { ticket } => {
                let result = self.rebalance(&ticket).await.map(Outcome::Promoted);
                Self::log_result("balance", &ticket, None, &result);
                result
            }
        }
    }

    /// Create a ticket, or replace the configuration of an existing one
    /// while keeping its registrations.
    pub async fn configure(&self, ticket: &str, config: TicketConfig) -> Result<(), EngineError> {
        let existing = {
            let mut tickets = self.tickets.lock().await;
            match tickets.get(ticket) {
                Some(book) => Arc::clone(book),
                None => {
                    let book = TicketBook::new(ticket, config)?;
                    tickets.insert(ticket.to_string(), Arc::new(Mutex::new(book)));
                    return Ok(());
                }
            }
        };

        existing.lock().await.reconfigure(config)?;
        Ok(())
    }

    /// Decide on a new submission and store it, inactive.
    pub async fn register(
        &self,
        ticket: &str,
        submission: Submission,
    ) -> Result<Admission, EngineError> {
        let book = self.book(ticket).await?;
        let mut book = book.lock().await;
        book.register(submission)
    }

    /// Register and confirm in one step.
    pub async fn admit(
        &self,
        ticket: &str,
        submission: Submission,
    ) -> Result<(Admission, Vec<RegistrationId>), EngineError> {
        let book = self.book(ticket).await?;
        let mut book = book.lock().await;
        book.admit(submission)
    }

    pub async fn confirm(
        &self,
        ticket: &str,
        id: RegistrationId,
    ) -> Result<Vec<RegistrationId>, EngineError> {
        let book = self.book(ticket).await?;
        let mut book = book.lock().await;
        book.confirm(id)
    }

    pub async fn cancel(
        &self,
        ticket: &str,
        id: RegistrationId,
    ) -> Result<Vec<RegistrationId>, EngineError> {
        let book = self.book(ticket).await?;
        let mut book = book.lock().await;
        book.cancel(id)
    }

    pub async fn pair(
        &self,
        ticket: &str,
        id: RegistrationId,
        candidates: &[RegistrationId],
    ) -> Result<Option<Pairing>, EngineError> {
        let book = self.book(ticket).await?;
        let mut book = book.lock().await;
        book.pair(id, candidates)
    }

    /// Run one balancing pass on a ticket.
    pub async fn rebalance(&self, ticket: &str) -> Result<Vec<RegistrationId>, EngineError> {
        let book = self.book(ticket).await?;
        let mut book = book.lock().await;
        Ok(book.balance()?)
    }

    /// Balance every ticket with a waiting list, in ticket order.
    /// Only tickets with promotions are returned.
    pub async fn rebalance_all(&self) -> Result<Vec<(TicketKey, Vec<RegistrationId>)>, EngineError> {
        let mut all = Vec::new();

        for (key, book) in self.books().await {
            let mut book = book.lock().await;
            if !book.waiting_list()?.model().has_waiting_list() {
                continue;
            }
            let promoted = book.balance()?;
            if !promoted.is_empty() {
                info!(ticket = %key, promoted = promoted.len(), "ticket rebalanced");
                all.push((key, promoted));
            }
        }

        Ok(all)
    }

    /// Numbers of one ticket.
    pub async fn ticket_numbers(&self, ticket: &str) -> Result<TicketNumbers, EngineError> {
        let book = self.book(ticket).await?;
        let book = book.lock().await;
        Ok(book.numbers()?)
    }

    /// Numbers of every ticket, in ticket order.
    pub async fn numbers(&self) -> Result<Vec<(TicketKey, TicketNumbers)>, EngineError> {
        let mut all = Vec::new();
        for (key, book) in self.books().await {
            let numbers = book.lock().await.numbers()?;
            all.push((key, numbers));
        }
        Ok(all)
    }

    /// Clone of one ticket's current state.
    pub async fn snapshot(&self, ticket: &str) -> Result<TicketBook, EngineError> {
        let book = self.book(ticket).await?;
        let book = book.lock().await;
        Ok(book.clone())
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result<T>(
        command: &str,
        ticket: &str,
        id: Option<RegistrationId>,
        result: &Result<T, EngineError>,
    ) {
        match (result, id) {
            (Ok(_), Some(id)) => info!(ticket, id, "{command} applied"),
            (Ok(_), None) => info!(ticket, "{command} applied"),
            (Err(e), Some(id)) => info!(ticket, id, reason = %e, "{command} skipped"),
            (Err(e), None) => info!(ticket, reason = %e, "{command} skipped"),
        }
    }

    /// Look a ticket up; the registry lock is released before the caller
    /// takes the ticket lock.
    async fn book(&self, ticket: &str) -> Result<Arc<Mutex<TicketBook>>, EngineError> {
        let tickets = self.tickets.lock().await;
        tickets
            .get(ticket)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTicket(ticket.to_string()))
    }

    async fn books(&self) -> Vec<(TicketKey, Arc<Mutex<TicketBook>>)> {
        let tickets = self.tickets.lock().await;
        tickets
            .iter()
            .map(|(key, book)| (key.clone(), Arc::clone(book)))
            .collect()
    }
}
