use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountNumber, Amount};

pub type MovementId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Withdrawal,
    Deposit,
    Transfer,
    BillPayment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Withdrawal => "WITHDRAWAL",
            MovementKind::Deposit => "DEPOSIT",
            MovementKind::Transfer => "TRANSFER",
            MovementKind::BillPayment => "BILL_PAYMENT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "WITHDRAWAL" => Some(MovementKind::Withdrawal),
            "DEPOSIT" => Some(MovementKind::Deposit),
            "TRANSFER" => Some(MovementKind::Transfer),
            "BILL_PAYMENT" => Some(MovementKind::BillPayment),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A movement is one balance-affecting event on a single account.
/// Movements are append-only: once recorded they are never changed or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    /// Monotonically increasing sequence number, assigned by the repository
    pub sequence: i64,
    pub account: AccountNumber,
    pub kind: MovementKind,
    /// Signed amount: negative leaves the account, positive enters it
    pub amount: Amount,
    /// The other side of a transfer
    pub counterparty: Option<AccountNumber>,
    /// Service label of a bill payment
    pub service: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Movement {
    /// Create a new movement. Sequence number must be assigned by the repository.
    pub fn new(account: AccountNumber, kind: MovementKind, amount: Amount) -> Self {
        assert!(amount != 0, "Movement amount must be non-zero");
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            account,
            kind,
            amount,
            counterparty: None,
            service: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<AccountNumber>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn is_outflow(&self) -> bool {
        self.amount < 0
    }

    /// Short human-readable detail for history listings.
    pub fn detail(&self) -> String {
        match (self.kind, &self.counterparty, &self.service) {
            (MovementKind::Transfer, Some(other), _) if self.is_outflow() => format!("To: {}", other),
            (MovementKind::Transfer, Some(other), _) => format!("From: {}", other),
            (MovementKind::BillPayment, _, Some(service)) => service.clone(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_kind_roundtrip() {
        for kind in [
            MovementKind::Withdrawal,
            MovementKind::Deposit,
            MovementKind::Transfer,
            MovementKind::BillPayment,
        ] {
            assert_eq!(MovementKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::from_str("refund"), None);
    }

    #[test]
    fn test_transfer_detail_depends_on_direction() {
        let outgoing = Movement::new("001-123456".into(), MovementKind::Transfer, -500)
            .with_counterparty("001-654321");
        let incoming = Movement::new("001-654321".into(), MovementKind::Transfer, 500)
            .with_counterparty("001-123456");

        assert_eq!(outgoing.detail(), "To: 001-654321");
        assert_eq!(incoming.detail(), "From: 001-123456");
    }

    #[test]
    fn test_bill_payment_detail_is_service() {
        let movement = Movement::new("001-123456".into(), MovementKind::BillPayment, -200)
            .with_service("Water");
        assert_eq!(movement.detail(), "Water");
        assert!(movement.is_outflow());
    }

    #[test]
    #[should_panic(expected = "Movement amount must be non-zero")]
    fn test_movement_requires_non_zero_amount() {
        Movement::new("001-123456".into(), MovementKind::Deposit, 0);
    }
}
