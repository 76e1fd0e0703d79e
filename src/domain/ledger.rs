use std::collections::HashMap;

use serde::Serialize;

use super::{Account, AccountNumber, Amount, Dispenser, DispenserId, Movement};

/// Compute the balance of an account from its movements.
/// Balance = sum of signed movement amounts.
pub fn compute_balance(movements: &[Movement]) -> Amount {
    movements.iter().map(|m| m.amount).sum()
}

/// Compute balances for all accounts appearing in a list of movements.
pub fn compute_all_balances(movements: &[Movement]) -> HashMap<AccountNumber, Amount> {
    let mut balances: HashMap<AccountNumber, Amount> = HashMap::new();

    for movement in movements {
        *balances.entry(movement.account.clone()).or_insert(0) += movement.amount;
    }

    balances
}

/// An account whose stored balance disagrees with its movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub account: AccountNumber,
    pub stored: Amount,
    pub computed: Amount,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispenserCash {
    pub dispenser: DispenserId,
    pub location: String,
    pub total_cash: Amount,
}

/// Result of verifying the ledger invariants.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub customer_count: usize,
    pub account_count: usize,
    pub movement_count: usize,
    pub dispenser_count: usize,
    pub mismatches: Vec<BalanceMismatch>,
    pub negative_balances: Vec<AccountNumber>,
    /// Transfer movements whose counterparty is not a known account
    pub dangling_counterparties: usize,
    pub dispensers: Vec<DispenserCash>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.mismatches.is_empty()
            && self.negative_balances.is_empty()
            && self.dangling_counterparties == 0
    }
}

pub fn build_integrity_report(
    customer_count: usize,
    accounts: &[Account],
    movements: &[Movement],
    dispensers: &[Dispenser],
) -> IntegrityReport {
    let computed = compute_all_balances(movements);

    let mismatches = accounts
        .iter()
        .filter_map(|account| {
            let from_log = computed.get(&account.number).copied().unwrap_or(0);
            (from_log != account.balance).then(|| BalanceMismatch {
                account: account.number.clone(),
                stored: account.balance,
                computed: from_log,
            })
        })
        .collect();

    let negative_balances = accounts
        .iter()
        .filter(|a| a.balance < 0)
        .map(|a| a.number.clone())
        .collect();

    let dangling_counterparties = movements
        .iter()
        .filter_map(|m| m.counterparty.as_ref())
        .filter(|other| !accounts.iter().any(|a| &a.number == *other))
        .count();

    let dispensers: Vec<DispenserCash> = dispensers
        .iter()
        .map(|d| DispenserCash {
            dispenser: d.id,
            location: d.location.clone(),
            total_cash: d.total_cash(),
        })
        .collect();

    IntegrityReport {
        customer_count,
        account_count: accounts.len(),
        movement_count: movements.len(),
        dispenser_count: dispensers.len(),
        mismatches,
        negative_balances,
        dangling_counterparties,
        dispensers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MovementKind;

    fn movement(account: &str, kind: MovementKind, amount: Amount) -> Movement {
        Movement::new(account.to_string(), kind, amount)
    }

    #[test]
    fn test_compute_balance_empty() {
        assert_eq!(compute_balance(&[]), 0);
    }

    #[test]
    fn test_compute_balance_mixed() {
        let movements = vec![
            movement("A", MovementKind::Deposit, 5000),
            movement("A", MovementKind::Withdrawal, -300),
            movement("A", MovementKind::BillPayment, -200),
        ];
        assert_eq!(compute_balance(&movements), 4500);
    }

    #[test]
    fn test_transfers_conserve_total() {
        let movements = vec![
            movement("A", MovementKind::Deposit, 5000),
            movement("B", MovementKind::Deposit, 3000),
            movement("A", MovementKind::Transfer, -500).with_counterparty("B"),
            movement("B", MovementKind::Transfer, 500).with_counterparty("A"),
        ];

        let balances = compute_all_balances(&movements);
        assert_eq!(balances.get("A"), Some(&4500));
        assert_eq!(balances.get("B"), Some(&3500));
        assert_eq!(balances.values().sum::<Amount>(), 8000);
    }

    #[test]
    fn test_report_flags_mismatch() {
        let mut good = Account::new("A", 1);
        let opening = good.credit(100, MovementKind::Deposit).unwrap();
        let mut bad = Account::new("B", 2);
        bad.balance = 50;

        let report = build_integrity_report(2, &[good, bad], &[opening], &[]);

        assert!(!report.is_healthy());
        assert_eq!(
            report.mismatches,
            vec![BalanceMismatch {
                account: "B".into(),
                stored: 50,
                computed: 0
            }]
        );
        assert_eq!(report.movement_count, 1);
    }

    #[test]
    fn test_report_flags_dangling_counterparty() {
        let mut account = Account::new("A", 1);
        let opening = account.credit(100, MovementKind::Deposit).unwrap();
        let out = account.debit(40, MovementKind::Transfer).unwrap().with_counterparty("ZZZ");

        let report = build_integrity_report(1, &[account], &[opening, out], &[]);

        assert_eq!(report.dangling_counterparties, 1);
        assert!(report.mismatches.is_empty());
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_report_lists_dispenser_cash() {
        let dispenser = Dispenser::new(1, "Central Branch");
        let report = build_integrity_report(0, &[], &[], &[dispenser]);

        assert!(report.is_healthy());
        assert_eq!(report.dispenser_count, 1);
        assert_eq!(report.dispensers[0].total_cash, 0);
    }
}
