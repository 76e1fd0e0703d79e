use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{compute_breakdown, Amount, Denomination, NoteCounts};

pub type DispenserId = i64;

/// A cash machine with a bounded number of notes per denomination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispenser {
    pub id: DispenserId,
    pub location: String,
    pub notes: NoteCounts,
    pub created_at: DateTime<Utc>,
}

impl Dispenser {
    /// A new dispenser has a cassette for every denomination, all empty.
    pub fn new(id: DispenserId, location: impl Into<String>) -> Self {
        Self {
            id,
            location: location.into(),
            notes: NoteCounts::empty_cassettes(),
            created_at: Utc::now(),
        }
    }

    pub fn with_notes(mut self, notes: &NoteCounts) -> Self {
        self.restock(notes);
        self
    }

    pub fn total_cash(&self) -> Amount {
        self.notes.total_value()
    }

    pub fn can_supply(&self, amount: Amount) -> bool {
        self.breakdown(amount).is_some()
    }

    pub fn breakdown(&self, amount: Amount) -> Option<NoteCounts> {
        compute_breakdown(amount, &self.notes)
    }

    /// Hand out the notes of a breakdown. Availability is checked for every
    /// denomination before any count changes.
    pub fn withdraw_notes(&mut self, breakdown: &NoteCounts) -> Result<(), InventoryError> {
        for (denomination, requested) in breakdown.iter() {
            let available = self.notes.get(denomination);
            if requested > available {
                return Err(InventoryError::InsufficientNotes {
                    denomination,
                    requested,
                    available,
                });
            }
        }

        for (denomination, requested) in breakdown.iter() {
            let available = self.notes.get(denomination);
            self.notes.set(denomination, available - requested);
        }
        Ok(())
    }

    /// Take in deposited notes. Refused only when a cassette count would
    /// overflow, in which case no count changes.
    pub fn deposit_notes(&mut self, notes: &NoteCounts) -> Result<(), InventoryError> {
        let mut updated = self.notes.clone();
        for (denomination, count) in notes.iter() {
            updated
                .checked_add(denomination, count)
                .ok_or(InventoryError::CassetteOverflow {
                    denomination,
                    held: self.notes.get(denomination),
                    added: count,
                })?;
        }
        self.notes = updated;
        Ok(())
    }

    /// Replace the counts of the given denominations; others keep their stock.
    pub fn restock(&mut self, notes: &NoteCounts) {
        for (denomination, count) in notes.iter() {
            self.notes.set(denomination, count);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    InsufficientNotes {
        denomination: Denomination,
        requested: u32,
        available: u32,
    },
    CassetteOverflow {
        denomination: Denomination,
        held: u32,
        added: u32,
    },
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryError::InsufficientNotes {
                denomination,
                requested,
                available,
            } => write!(
                f,
                "{} {} notes requested but only {} in stock",
                requested, denomination, available
            ),
            InventoryError::CassetteOverflow {
                denomination,
                held,
                added,
            } => write!(
                f,
                "cannot add {} {} notes to the {} already held",
                added, denomination, held
            ),
        }
    }
}

impl std::error::Error for InventoryError {}
