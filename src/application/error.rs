use thiserror::Error;

use crate::domain::{AccountNumber, Amount, CustomerId, Denomination, DispenserId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    #[error("Customer already exists: {0}")]
    CustomerAlreadyExists(CustomerId),

    #[error("Customer {customer_id} already holds account {account}")]
    CustomerHasAccount {
        customer_id: CustomerId,
        account: AccountNumber,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountNumber),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(AccountNumber),

    #[error("Dispenser not found: {0}")]
    DispenserNotFound(DispenserId),

    #[error("Dispenser already exists: {0}")]
    DispenserAlreadyExists(DispenserId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds in account {account}: balance {balance}, required {required}")]
    InsufficientFunds {
        account: AccountNumber,
        balance: Amount,
        required: Amount,
    },

    #[error("Dispenser {dispenser} holds {available} in cash, {requested} requested")]
    InsufficientCash {
        dispenser: DispenserId,
        available: Amount,
        requested: Amount,
    },

    #[error("Dispenser {dispenser} cannot make up {amount} with the notes in stock")]
    UnbreakableAmount { dispenser: DispenserId, amount: Amount },

    #[error(
        "Dispenser {dispenser} is short of {denomination} notes: {requested} requested, {available} available"
    )]
    InsufficientInventory {
        dispenser: DispenserId,
        denomination: Denomination,
        requested: u32,
        available: u32,
    },

    #[error("Deposit contains no notes")]
    EmptyDeposit,

    #[error("Cannot transfer from account {0} to itself")]
    SelfTransfer(AccountNumber),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
