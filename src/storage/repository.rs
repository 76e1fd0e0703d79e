use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use crate::domain::{
    Account, Customer, CustomerId, Denomination, Dispenser, DispenserId, Movement, MovementKind,
    NoteCounts,
};

use super::MIGRATION_001_INITIAL;

/// Repository for customers, accounts, movements and dispensers.
///
/// The database lives in memory for the lifetime of the pool. The pool holds
/// exactly one connection, so transactions never interleave: whoever holds a
/// transaction has exclusive access to every account and dispenser until it
/// commits or is dropped.
///
/// Query methods take the connection explicitly so callers can group several
/// of them into one transaction.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a fresh in-memory database.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database options")?
            .foreign_keys(true);

        // Closing the only connection would drop the database, so it is kept
        // open for as long as the pool lives.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(Option::<Duration>::None)
            .max_lifetime(Option::<Duration>::None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        log::debug!("opened in-memory database");
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init() -> Result<Self> {
        let repo = Self::connect_in_memory().await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Start a transaction. Dropping it without commit rolls everything back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .context("Failed to begin transaction")
    }

    /// Check out the connection for read-only work.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire connection")
    }

    // ========================
    // Customer operations
    // ========================

    pub async fn save_customer(&self, conn: &mut SqliteConnection, customer: &Customer) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, credential, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.credential)
        .bind(customer.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to save customer")?;
        Ok(())
    }

    pub async fn get_customer(
        &self,
        conn: &mut SqliteConnection,
        id: CustomerId,
    ) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, name, credential, created_at FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch customer")?;

        row.as_ref().map(Self::row_to_customer).transpose()
    }

    /// List customers ordered by id.
    pub async fn list_customers(&self, conn: &mut SqliteConnection) -> Result<Vec<Customer>> {
        let rows = sqlx::query("SELECT id, name, credential, created_at FROM customers ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list customers")?;

        rows.iter().map(Self::row_to_customer).collect()
    }

    fn row_to_customer(row: &SqliteRow) -> Result<Customer> {
        let created_at: String = row.get("created_at");
        Ok(Customer {
            id: row.get("id"),
            name: row.get("name"),
            credential: row.get("credential"),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================
    // Account operations
    // ========================

    pub async fn save_account(&self, conn: &mut SqliteConnection, account: &Account) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (number, customer_id, balance, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&account.number)
        .bind(account.customer_id)
        .bind(account.balance)
        .bind(account.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to save account")?;
        Ok(())
    }

    pub async fn get_account(
        &self,
        conn: &mut SqliteConnection,
        number: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT number, customer_id, balance, created_at FROM accounts WHERE number = ?",
        )
        .bind(number)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn get_account_by_customer(
        &self,
        conn: &mut SqliteConnection,
        customer_id: CustomerId,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT number, customer_id, balance, created_at FROM accounts WHERE customer_id = ?",
        )
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch account by customer")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    pub async fn list_accounts(&self, conn: &mut SqliteConnection) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            "SELECT number, customer_id, balance, created_at FROM accounts ORDER BY customer_id",
        )
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Store the balance carried by `account`.
    pub async fn update_balance(&self, conn: &mut SqliteConnection, account: &Account) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET balance = ? WHERE number = ?")
            .bind(account.balance)
            .bind(&account.number)
            .execute(&mut *conn)
            .await
            .context("Failed to update balance")?;

        if result.rows_affected() != 1 {
            anyhow::bail!("Account {} vanished during update", account.number);
        }
        Ok(())
    }

    fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let created_at: String = row.get("created_at");
        Ok(Account {
            number: row.get("number"),
            customer_id: row.get("customer_id"),
            balance: row.get("balance"),
            created_at: parse_timestamp(&created_at)?,
        })
    }

    // ========================
    // Movement operations
    // ========================

    /// Append a movement to the log, assigning its sequence number.
    pub async fn append_movement(
        &self,
        conn: &mut SqliteConnection,
        movement: &mut Movement,
    ) -> Result<()> {
        let row = sqlx::query(
            r#"
            INSERT INTO movements (id, account_number, kind, amount, counterparty, service, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING sequence
            "#,
        )
        .bind(movement.id.to_string())
        .bind(&movement.account)
        .bind(movement.kind.as_str())
        .bind(movement.amount)
        .bind(&movement.counterparty)
        .bind(&movement.service)
        .bind(movement.timestamp.to_rfc3339())
        .fetch_one(&mut *conn)
        .await
        .context("Failed to append movement")?;

        movement.sequence = row.get("sequence");
        Ok(())
    }

    /// Movements of one account in the order they were recorded.
    pub async fn list_movements_for_account(
        &self,
        conn: &mut SqliteConnection,
        number: &str,
    ) -> Result<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, account_number, kind, amount, counterparty, service, timestamp
            FROM movements
            WHERE account_number = ?
            ORDER BY sequence
            "#,
        )
        .bind(number)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list movements for account")?;

        rows.iter().map(Self::row_to_movement).collect()
    }

    pub async fn list_movements(&self, conn: &mut SqliteConnection) -> Result<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT sequence, id, account_number, kind, amount, counterparty, service, timestamp
            FROM movements
            ORDER BY sequence
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list movements")?;

        rows.iter().map(Self::row_to_movement).collect()
    }

    fn row_to_movement(row: &SqliteRow) -> Result<Movement> {
        let id_str: String = row.get("id");
        let kind_str: String = row.get("kind");
        let timestamp_str: String = row.get("timestamp");

        Ok(Movement {
            id: Uuid::parse_str(&id_str).context("Invalid movement ID")?,
            sequence: row.get("sequence"),
            account: row.get("account_number"),
            kind: MovementKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid movement kind: {}", kind_str))?,
            amount: row.get("amount"),
            counterparty: row.get("counterparty"),
            service: row.get("service"),
            timestamp: parse_timestamp(&timestamp_str)?,
        })
    }

    // ========================
    // Dispenser operations
    // ========================

    /// Save a new dispenser together with its note counts.
    pub async fn save_dispenser(&self, conn: &mut SqliteConnection, dispenser: &Dispenser) -> Result<()> {
        sqlx::query("INSERT INTO dispensers (id, location, created_at) VALUES (?, ?, ?)")
            .bind(dispenser.id)
            .bind(&dispenser.location)
            .bind(dispenser.created_at.to_rfc3339())
            .execute(&mut *conn)
            .await
            .context("Failed to save dispenser")?;

        self.save_notes(conn, dispenser.id, &dispenser.notes).await
    }

    /// Write the given note counts, replacing stored counts per denomination.
    pub async fn save_notes(
        &self,
        conn: &mut SqliteConnection,
        dispenser_id: DispenserId,
        notes: &NoteCounts,
    ) -> Result<()> {
        for (denomination, count) in notes.iter() {
            sqlx::query(
                r#"
                INSERT INTO dispenser_notes (dispenser_id, denomination, note_count)
                VALUES (?, ?, ?)
                ON CONFLICT (dispenser_id, denomination)
                DO UPDATE SET note_count = excluded.note_count
                "#,
            )
            .bind(dispenser_id)
            .bind(i64::from(denomination.value()))
            .bind(i64::from(count))
            .execute(&mut *conn)
            .await
            .context("Failed to save note counts")?;
        }
        Ok(())
    }

    pub async fn get_dispenser(
        &self,
        conn: &mut SqliteConnection,
        id: DispenserId,
    ) -> Result<Option<Dispenser>> {
        let row = sqlx::query("SELECT id, location, created_at FROM dispensers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to fetch dispenser")?;

        match row {
            Some(row) => {
                let notes = self.load_notes(conn, id).await?;
                Ok(Some(Self::row_to_dispenser(&row, notes)?))
            }
            None => Ok(None),
        }
    }

    /// List dispensers ordered by id.
    pub async fn list_dispensers(&self, conn: &mut SqliteConnection) -> Result<Vec<Dispenser>> {
        let rows = sqlx::query("SELECT id, location, created_at FROM dispensers ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list dispensers")?;

        let mut dispensers = Vec::with_capacity(rows.len());
        for row in &rows {
            let notes = self.load_notes(conn, row.get("id")).await?;
            dispensers.push(Self::row_to_dispenser(row, notes)?);
        }
        Ok(dispensers)
    }

    async fn load_notes(&self, conn: &mut SqliteConnection, id: DispenserId) -> Result<NoteCounts> {
        let rows = sqlx::query(
            "SELECT denomination, note_count FROM dispenser_notes WHERE dispenser_id = ?",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to load note counts")?;

        rows.iter()
            .map(|row| -> Result<(Denomination, u32)> {
                let value: i64 = row.get("denomination");
                let count: i64 = row.get("note_count");
                let denomination = u32::try_from(value)
                    .ok()
                    .and_then(Denomination::from_value)
                    .ok_or_else(|| anyhow::anyhow!("Invalid denomination: {}", value))?;
                let count = u32::try_from(count).context("Invalid note count")?;
                Ok((denomination, count))
            })
            .collect()
    }

    fn row_to_dispenser(row: &SqliteRow, notes: NoteCounts) -> Result<Dispenser> {
        let created_at: String = row.get("created_at");
        Ok(Dispenser {
            id: row.get("id"),
            location: row.get("location"),
            notes,
            created_at: parse_timestamp(&created_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}
