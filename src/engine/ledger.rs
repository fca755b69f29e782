use std::collections::HashMap;

use crate::model::{Registration, RegistrationId, RegistrationStats, Role, RoleStats};

use super::RegistrationError;

/// Registrations of one ticket in insertion order.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    records: Vec<Registration>,
    /// Position of each id in `records`
    positions: HashMap<RegistrationId, usize>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from records already on file, oldest first.
    pub fn from_records(
        records: impl IntoIterator<Item = Registration>,
    ) -> Result<Self, RegistrationError> {
        let mut ledger = Self::new();
        for record in records {
            ledger.insert_all(vec![record])?;
        }
        Ok(ledger)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> + '_ {
        self.records.iter()
    }

    pub fn get(&self, id: RegistrationId) -> Option<&Registration> {
        self.positions.get(&id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: RegistrationId) -> bool {
        self.positions.contains_key(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RegistrationId) -> Option<&mut Registration> {
        self.positions.get(&id).map(|&pos| &mut self.records[pos])
    }

    /// Append records atomically: either all of them are stored or none.
    pub(crate) fn insert_all(&mut self, records: Vec<Registration>) -> Result<(), RegistrationError> {
        for (idx, record) in records.iter().enumerate() {
            if record.role == Some(Role::Couple) {
                return Err(RegistrationError::CoupleRole(record.id));
            }
            let repeated = records[..idx].iter().any(|r| r.id == record.id);
            if repeated || self.contains(record.id) {
                return Err(RegistrationError::DuplicateId(record.id));
            }
        }

        for record in records {
            self.positions.insert(record.id, self.records.len());
            self.records.push(record);
        }
        Ok(())
    }

    /// Derive role stats from active records.
    ///
    /// A couple counts once, at its earlier record; a paired record whose
    /// twin is missing or inactive still counts as one couple.
    pub fn stats(&self) -> RoleStats {
        let mut stats = RoleStats::default();

        for (pos, record) in self.records.iter().enumerate() {
            if !record.active {
                continue;
            }

            if let Some(role) = record.role {
                count(stats.get_mut(role), record.waiting);
            }

            if let Some(partner) = record.paired_with {
                let counted_by_partner = self
                    .positions
                    .get(&partner)
                    .is_some_and(|&p| p < pos && self.records[p].active);
                if !counted_by_partner {
                    count(stats.get_mut(Role::Couple), record.waiting);
                }
            }
        }

        stats
    }

    /// Active records currently holding a place.
    pub fn accepted(&self) -> u32 {
        self.records
            .iter()
            .filter(|r| r.active && !r.waiting)
            .count() as u32
    }

    /// Earliest waiting paired record, with its twin if that twin is active
    /// and waiting too.
    pub fn first_waiting_couple(&self) -> Option<(RegistrationId, Option<RegistrationId>)> {
        self.records
            .iter()
            .find(|r| r.active && r.waiting && r.is_paired())
            .map(|record| {
                let partner = record
                    .paired_with
                    .and_then(|p| self.get(p))
                    .filter(|p| p.active && p.waiting)
                    .map(|p| p.id);
                (record.id, partner)
            })
    }

    /// Waiting records whose active twin already holds a place.
    ///
    /// Such a couple counts as accepted and neither promotion path picks the
    /// waiting half up again.
    pub fn split_couples(&self) -> Vec<RegistrationId> {
        self.records
            .iter()
            .filter(|r| r.active && r.waiting)
            .filter(|r| {
                r.paired_with
                    .and_then(|p| self.get(p))
                    .is_some_and(|twin| twin.active && !twin.waiting)
            })
            .map(|r| r.id)
            .collect()
    }

    /// Earliest waiting unpaired record of `role`.
    pub fn first_waiting_solo(&self, role: Role) -> Option<RegistrationId> {
        self.records
            .iter()
            .find(|r| r.active && r.waiting && !r.is_paired() && r.role == Some(role))
            .map(|r| r.id)
    }
}

fn count(stats: &mut RegistrationStats, waiting: bool) {
    if waiting {
        stats.waiting += 1;
    } else {
        stats.accepted += 1;
    }
}
