use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, CustomerId, Movement, MovementKind};

pub type AccountNumber = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub number: AccountNumber,
    pub customer_id: CustomerId,
    pub balance: Amount,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// A new account starts empty; opening balances go through `credit`
    /// so that the movement log accounts for every unit.
    pub fn new(number: impl Into<AccountNumber>, customer_id: CustomerId) -> Self {
        Self {
            number: number.into(),
            customer_id,
            balance: 0,
            created_at: Utc::now(),
        }
    }

    /// Account number handed out when a customer enrolls at a terminal.
    pub fn default_number(customer_id: CustomerId) -> AccountNumber {
        format!("CTA-{:04}", customer_id)
    }

    /// Add `amount` to the balance and return the movement recording it.
    pub fn credit(&mut self, amount: Amount, kind: MovementKind) -> Result<Movement, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow {
                balance: self.balance,
                amount,
            })?;
        Ok(Movement::new(self.number.clone(), kind, amount))
    }

    /// Remove `amount` from the balance and return the movement recording it.
    /// The balance never goes below zero.
    pub fn debit(&mut self, amount: Amount, kind: MovementKind) -> Result<Movement, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                balance: self.balance,
                required: amount,
            });
        }
        self.balance -= amount;
        Ok(Movement::new(self.number.clone(), kind, -amount))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    NonPositiveAmount(Amount),
    InsufficientFunds { balance: Amount, required: Amount },
    BalanceOverflow { balance: Amount, amount: Amount },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::NonPositiveAmount(amount) => {
                write!(f, "Amount must be positive, got {}", amount)
            }
            LedgerError::InsufficientFunds { balance, required } => {
                write!(f, "Balance {} does not cover {}", balance, required)
            }
            LedgerError::BalanceOverflow { balance, amount } => {
                write!(f, "Balance {} cannot take {} more", balance, amount)
            }
        }
    }
}

impl std::error::Error for LedgerError {}
