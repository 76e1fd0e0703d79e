use anyhow::Context;
use log::{info, warn};
use sqlx::sqlite::SqliteConnection;

use crate::domain::{
    build_integrity_report, payment_reference, Account, AccountNumber, Amount, BillService,
    Customer, CustomerId, Dispenser, DispenserId, IntegrityReport, InventoryError, LedgerError,
    Movement, MovementKind, NoteCounts,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing the operations of the ATM network.
/// This is the primary interface for any client (console session, tests, etc.).
pub struct BankService {
    repo: Repository,
}

/// A customer who passed the credential check, with the account they operate.
#[derive(Debug)]
pub struct Authenticated {
    pub customer: Customer,
    pub account: Account,
}

/// Result of a cash withdrawal
#[derive(Debug)]
pub struct WithdrawalResult {
    pub movement: Movement,
    /// Notes handed out, per denomination
    pub breakdown: NoteCounts,
    pub balance: Amount,
}

/// Result of a cash deposit
#[derive(Debug)]
pub struct DepositResult {
    pub movement: Movement,
    pub total: Amount,
    pub balance: Amount,
}

/// Result of a transfer between accounts
#[derive(Debug)]
pub struct TransferResult {
    pub outgoing: Movement,
    pub incoming: Movement,
    pub recipient_name: String,
    pub balance: Amount,
}

/// Result of a bill payment
#[derive(Debug)]
pub struct BillPaymentResult {
    pub movement: Movement,
    pub service: BillService,
    /// Receipt reference shown to the customer; not stored
    pub reference: String,
    pub balance: Amount,
}

impl BankService {
    /// Create a new bank service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Start an empty bank backed by a fresh in-memory store.
    pub async fn init() -> Result<Self, AppError> {
        let repo = Repository::init().await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Registration
    // ========================

    pub async fn register_customer(
        &self,
        id: CustomerId,
        name: String,
        credential: String,
    ) -> Result<Customer, AppError> {
        let mut tx = self.repo.begin().await?;
        let customer = self.insert_customer(&mut tx, id, name, credential).await?;
        tx.commit().await.context("Failed to commit customer")?;

        info!("registered customer {} ({})", customer.id, customer.name);
        Ok(customer)
    }

    /// Open the account of a customer. A positive opening balance is
    /// recorded as a deposit so the movement log covers the whole balance.
    pub async fn register_account(
        &self,
        number: AccountNumber,
        customer_id: CustomerId,
        opening_balance: Amount,
    ) -> Result<Account, AppError> {
        check_opening_balance(opening_balance)?;

        let mut tx = self.repo.begin().await?;
        if self.repo.get_customer(&mut tx, customer_id).await?.is_none() {
            return Err(AppError::CustomerNotFound(customer_id));
        }
        let account = self
            .open_account(&mut tx, number, customer_id, opening_balance)
            .await?;
        tx.commit().await.context("Failed to commit account")?;

        info!(
            "opened account {} for customer {} with {}",
            account.number, customer_id, opening_balance
        );
        Ok(account)
    }

    /// Register a customer together with their account. Either both are
    /// stored or neither is.
    pub async fn enroll_customer(
        &self,
        id: CustomerId,
        name: String,
        credential: String,
        number: AccountNumber,
        opening_balance: Amount,
    ) -> Result<(Customer, Account), AppError> {
        check_opening_balance(opening_balance)?;

        let mut tx = self.repo.begin().await?;
        let customer = self.insert_customer(&mut tx, id, name, credential).await?;
        let account = self
            .open_account(&mut tx, number, id, opening_balance)
            .await?;
        tx.commit().await.context("Failed to commit enrollment")?;

        info!(
            "enrolled customer {} ({}) with account {} holding {}",
            customer.id, customer.name, account.number, opening_balance
        );
        Ok((customer, account))
    }

    async fn insert_customer(
        &self,
        conn: &mut SqliteConnection,
        id: CustomerId,
        name: String,
        credential: String,
    ) -> Result<Customer, AppError> {
        if self.repo.get_customer(conn, id).await?.is_some() {
            return Err(AppError::CustomerAlreadyExists(id));
        }

        let customer = Customer::new(id, name, credential);
        self.repo.save_customer(conn, &customer).await?;
        Ok(customer)
    }

    /// Store an account for an existing customer, crediting the opening balance.
    async fn open_account(
        &self,
        conn: &mut SqliteConnection,
        number: AccountNumber,
        customer_id: CustomerId,
        opening_balance: Amount,
    ) -> Result<Account, AppError> {
        if let Some(existing) = self.repo.get_account_by_customer(conn, customer_id).await? {
            return Err(AppError::CustomerHasAccount {
                customer_id,
                account: existing.number,
            });
        }
        if self.repo.get_account(conn, &number).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(number));
        }

        let mut account = Account::new(number, customer_id);
        self.repo.save_account(conn, &account).await?;

        if opening_balance > 0 {
            let mut movement = account
                .credit(opening_balance, MovementKind::Deposit)
                .map_err(|e| ledger_error(&account, e))?;
            self.repo.update_balance(conn, &account).await?;
            self.repo.append_movement(conn, &mut movement).await?;
        }

        Ok(account)
    }

    pub async fn register_dispenser(
        &self,
        id: DispenserId,
        location: String,
        notes: &NoteCounts,
    ) -> Result<Dispenser, AppError> {
        let mut tx = self.repo.begin().await?;

        if self.repo.get_dispenser(&mut tx, id).await?.is_some() {
            return Err(AppError::DispenserAlreadyExists(id));
        }

        let dispenser = Dispenser::new(id, location).with_notes(notes);
        self.repo.save_dispenser(&mut tx, &dispenser).await?;
        tx.commit().await.context("Failed to commit dispenser")?;

        info!(
            "registered dispenser {} at {} holding {}",
            dispenser.id,
            dispenser.location,
            dispenser.total_cash()
        );
        Ok(dispenser)
    }

    /// Set the note counts of the given denominations, as an operator does
    /// when refilling cassettes.
    pub async fn restock_dispenser(
        &self,
        id: DispenserId,
        notes: &NoteCounts,
    ) -> Result<Dispenser, AppError> {
        let mut tx = self.repo.begin().await?;

        let mut dispenser = self
            .repo
            .get_dispenser(&mut tx, id)
            .await?
            .ok_or(AppError::DispenserNotFound(id))?;

        dispenser.restock(notes);
        self.repo.save_notes(&mut tx, id, &dispenser.notes).await?;
        tx.commit().await.context("Failed to commit restock")?;

        info!("restocked dispenser {}: {}", id, dispenser.notes);
        Ok(dispenser)
    }

    /// Check a customer's credential and return the account they operate.
    pub async fn authenticate(
        &self,
        customer_id: CustomerId,
        credential: &str,
    ) -> Result<Authenticated, AppError> {
        let mut conn = self.repo.acquire().await?;

        let customer = match self.repo.get_customer(&mut conn, customer_id).await? {
            Some(customer) if customer.verify_credential(credential) => customer,
            _ => {
                warn!("failed login for customer {}", customer_id);
                return Err(AppError::AuthenticationFailed);
            }
        };

        let account = self
            .repo
            .get_account_by_customer(&mut conn, customer_id)
            .await?
            .ok_or(AppError::AuthenticationFailed)?;

        Ok(Authenticated { customer, account })
    }

    // ========================
    // Queries
    // ========================

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, AppError> {
        let mut conn = self.repo.acquire().await?;
        self.repo
            .get_customer(&mut conn, id)
            .await?
            .ok_or(AppError::CustomerNotFound(id))
    }

    /// All customers, ordered by id.
    pub async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(self.repo.list_customers(&mut conn).await?)
    }

    pub async fn get_account(&self, number: &str) -> Result<Account, AppError> {
        let mut conn = self.repo.acquire().await?;
        self.repo
            .get_account(&mut conn, number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(number.to_string()))
    }

    /// The account held by a customer, if they have one.
    pub async fn account_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<Account>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(self
            .repo
            .get_account_by_customer(&mut conn, customer_id)
            .await?)
    }

    pub async fn balance(&self, number: &str) -> Result<Amount, AppError> {
        Ok(self.get_account(number).await?.balance)
    }

    /// Movements of an account in chronological order.
    pub async fn history(&self, number: &str) -> Result<Vec<Movement>, AppError> {
        let mut conn = self.repo.acquire().await?;
        if self.repo.get_account(&mut conn, number).await?.is_none() {
            return Err(AppError::AccountNotFound(number.to_string()));
        }
        Ok(self
            .repo
            .list_movements_for_account(&mut conn, number)
            .await?)
    }

    pub async fn get_dispenser(&self, id: DispenserId) -> Result<Dispenser, AppError> {
        let mut conn = self.repo.acquire().await?;
        self.repo
            .get_dispenser(&mut conn, id)
            .await?
            .ok_or(AppError::DispenserNotFound(id))
    }

    /// All dispensers, ordered by id.
    pub async fn list_dispensers(&self) -> Result<Vec<Dispenser>, AppError> {
        let mut conn = self.repo.acquire().await?;
        Ok(self.repo.list_dispensers(&mut conn).await?)
    }

    pub async fn total_cash(&self, id: DispenserId) -> Result<Amount, AppError> {
        Ok(self.get_dispenser(id).await?.total_cash())
    }

    pub async fn inventory(&self, id: DispenserId) -> Result<NoteCounts, AppError> {
        Ok(self.get_dispenser(id).await?.notes)
    }

    // ========================
    // Transactions
    // ========================

    /// Withdraw cash. Returns the notes handed out.
    pub async fn withdraw(
        &self,
        number: &str,
        amount: Amount,
        dispenser_id: DispenserId,
    ) -> Result<WithdrawalResult, AppError> {
        self.try_withdraw(number, amount, dispenser_id)
            .await
            .inspect_err(|e| warn!("withdrawal of {} from {} rejected: {}", amount, number, e))
    }

    async fn try_withdraw(
        &self,
        number: &str,
        amount: Amount,
        dispenser_id: DispenserId,
    ) -> Result<WithdrawalResult, AppError> {
        if amount < 1 {
            return Err(AppError::InvalidAmount(
                "Withdrawal must be at least 1".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;

        let mut account = self
            .repo
            .get_account(&mut tx, number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(number.to_string()))?;
        let mut dispenser = self
            .repo
            .get_dispenser(&mut tx, dispenser_id)
            .await?
            .ok_or(AppError::DispenserNotFound(dispenser_id))?;

        if amount > account.balance {
            return Err(AppError::InsufficientFunds {
                account: account.number,
                balance: account.balance,
                required: amount,
            });
        }
        if amount > dispenser.total_cash() {
            return Err(AppError::InsufficientCash {
                dispenser: dispenser.id,
                available: dispenser.total_cash(),
                requested: amount,
            });
        }

        let breakdown = dispenser
            .breakdown(amount)
            .ok_or(AppError::UnbreakableAmount {
                dispenser: dispenser.id,
                amount,
            })?;

        dispenser
            .withdraw_notes(&breakdown)
            .map_err(|e| inventory_error(dispenser_id, e))?;
        let mut movement = account
            .debit(amount, MovementKind::Withdrawal)
            .map_err(|e| ledger_error(&account, e))?;

        self.repo.update_balance(&mut tx, &account).await?;
        self.repo
            .save_notes(&mut tx, dispenser.id, &dispenser.notes)
            .await?;
        self.repo.append_movement(&mut tx, &mut movement).await?;
        tx.commit().await.context("Failed to commit withdrawal")?;

        info!(
            "withdrew {} from {} at dispenser {}: {}",
            amount, account.number, dispenser.id, breakdown
        );
        Ok(WithdrawalResult {
            movement,
            breakdown,
            balance: account.balance,
        })
    }

    /// Deposit notes into an account through a dispenser.
    pub async fn deposit(
        &self,
        number: &str,
        notes: &NoteCounts,
        dispenser_id: DispenserId,
    ) -> Result<DepositResult, AppError> {
        self.try_deposit(number, notes, dispenser_id)
            .await
            .inspect_err(|e| warn!("deposit of {} into {} rejected: {}", notes, number, e))
    }

    async fn try_deposit(
        &self,
        number: &str,
        notes: &NoteCounts,
        dispenser_id: DispenserId,
    ) -> Result<DepositResult, AppError> {
        let total = notes.total_value();
        if total <= 0 {
            return Err(AppError::EmptyDeposit);
        }

        let mut tx = self.repo.begin().await?;

        let mut account = self
            .repo
            .get_account(&mut tx, number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(number.to_string()))?;
        let mut dispenser = self
            .repo
            .get_dispenser(&mut tx, dispenser_id)
            .await?
            .ok_or(AppError::DispenserNotFound(dispenser_id))?;

        let mut movement = account
            .credit(total, MovementKind::Deposit)
            .map_err(|e| ledger_error(&account, e))?;
        dispenser
            .deposit_notes(notes)
            .map_err(|e| inventory_error(dispenser_id, e))?;

        self.repo.update_balance(&mut tx, &account).await?;
        self.repo
            .save_notes(&mut tx, dispenser.id, &dispenser.notes)
            .await?;
        self.repo.append_movement(&mut tx, &mut movement).await?;
        tx.commit().await.context("Failed to commit deposit")?;

        info!(
            "deposited {} into {} at dispenser {}",
            total, account.number, dispenser.id
        );
        Ok(DepositResult {
            movement,
            total,
            balance: account.balance,
        })
    }

    /// Move money between two accounts. Both sides are recorded or neither is.
    pub async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<TransferResult, AppError> {
        self.try_transfer(from, to, amount)
            .await
            .inspect_err(|e| warn!("transfer of {} from {} to {} rejected: {}", amount, from, to, e))
    }

    async fn try_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<TransferResult, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;

        let mut source = self
            .repo
            .get_account(&mut tx, from)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(from.to_string()))?;
        if from == to {
            return Err(AppError::SelfTransfer(source.number));
        }
        let mut destination = self
            .repo
            .get_account(&mut tx, to)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(to.to_string()))?;

        let mut outgoing = source
            .debit(amount, MovementKind::Transfer)
            .map_err(|e| ledger_error(&source, e))?
            .with_counterparty(destination.number.clone());
        let mut incoming = destination
            .credit(amount, MovementKind::Transfer)
            .map_err(|e| ledger_error(&destination, e))?
            .with_counterparty(source.number.clone());

        self.repo.update_balance(&mut tx, &source).await?;
        self.repo.update_balance(&mut tx, &destination).await?;
        self.repo.append_movement(&mut tx, &mut outgoing).await?;
        self.repo.append_movement(&mut tx, &mut incoming).await?;

        let recipient_name = self
            .repo
            .get_customer(&mut tx, destination.customer_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default();

        tx.commit().await.context("Failed to commit transfer")?;

        info!(
            "transferred {} from {} to {}",
            amount, source.number, destination.number
        );
        Ok(TransferResult {
            outgoing,
            incoming,
            recipient_name,
            balance: source.balance,
        })
    }

    /// Pay a utility bill. The amount due is decided by the caller.
    pub async fn pay_bill(
        &self,
        number: &str,
        service: BillService,
        amount: Amount,
    ) -> Result<BillPaymentResult, AppError> {
        self.try_pay_bill(number, service, amount)
            .await
            .inspect_err(|e| warn!("{} payment of {} from {} rejected: {}", service, amount, number, e))
    }

    async fn try_pay_bill(
        &self,
        number: &str,
        service: BillService,
        amount: Amount,
    ) -> Result<BillPaymentResult, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;

        let mut account = self
            .repo
            .get_account(&mut tx, number)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(number.to_string()))?;

        let mut movement = account
            .debit(amount, MovementKind::BillPayment)
            .map_err(|e| ledger_error(&account, e))?
            .with_service(service.label());

        self.repo.update_balance(&mut tx, &account).await?;
        self.repo.append_movement(&mut tx, &mut movement).await?;
        tx.commit().await.context("Failed to commit bill payment")?;

        let reference = payment_reference(&mut rand::thread_rng());

        info!(
            "paid {} bill of {} from {} ({})",
            service, amount, account.number, reference
        );
        Ok(BillPaymentResult {
            movement,
            service,
            reference,
            balance: account.balance,
        })
    }

    // ========================
    // Integrity operations
    // ========================

    /// Check ledger integrity and return a report.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let mut conn = self.repo.acquire().await?;

        let customers = self.repo.list_customers(&mut conn).await?;
        let accounts = self.repo.list_accounts(&mut conn).await?;
        let movements = self.repo.list_movements(&mut conn).await?;
        let dispensers = self.repo.list_dispensers(&mut conn).await?;

        Ok(build_integrity_report(
            customers.len(),
            &accounts,
            &movements,
            &dispensers,
        ))
    }
}

fn check_opening_balance(opening_balance: Amount) -> Result<(), AppError> {
    if opening_balance < 0 {
        return Err(AppError::InvalidAmount(
            "Opening balance cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn ledger_error(account: &Account, error: LedgerError) -> AppError {
    match error {
        LedgerError::NonPositiveAmount(amount) => {
            AppError::InvalidAmount(format!("Amount must be positive, got {}", amount))
        }
        LedgerError::InsufficientFunds { balance, required } => AppError::InsufficientFunds {
            account: account.number.clone(),
            balance,
            required,
        },
        LedgerError::BalanceOverflow { .. } => AppError::InvalidAmount(format!(
            "{} for account {}",
            error, account.number
        )),
    }
}

fn inventory_error(dispenser: DispenserId, error: InventoryError) -> AppError {
    match error {
        InventoryError::InsufficientNotes {
            denomination,
            requested,
            available,
        } => AppError::InsufficientInventory {
            dispenser,
            denomination,
            requested,
            available,
        },
        InventoryError::CassetteOverflow { .. } => {
            AppError::InvalidAmount(format!("Dispenser {} {}", dispenser, error))
        }
    }
}
