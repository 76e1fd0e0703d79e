use std::io::Write;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::application::BankService;
use crate::domain::{
    compute_balance, format_amount, parse_amount, parse_notes, Account, AccountNumber, Amount,
    BillService, CustomerId, DispenserId,
};

/// One line typed at the terminal.
#[derive(Parser, Debug)]
#[command(name = "cashpoint", no_binary_name = true, disable_version_flag = true)]
pub struct SessionLine {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Log in as a customer
    Login {
        /// Customer ID
        customer: CustomerId,

        /// Customer credential
        credential: String,
    },

    /// End the customer session
    Logout,

    /// Show the balance of the current account
    Balance,

    /// Show the movements of the current account
    History,

    /// Withdraw cash from the current dispenser
    Withdraw {
        /// Amount in whole units (e.g. "300")
        amount: String,
    },

    /// Deposit notes, given as DENOMINATIONxCOUNT (e.g. "100x2 20x1")
    Deposit {
        #[arg(required = true)]
        notes: Vec<String>,
    },

    /// Transfer money to another account
    Transfer {
        /// Amount in whole units
        amount: String,

        /// Destination account number
        #[arg(long)]
        to: String,
    },

    /// Pay a utility bill: electricity, water, gas, internet
    Pay {
        /// Service to pay
        service: String,

        /// Amount due (a quote within the service's usual range if omitted)
        #[arg(short, long)]
        amount: Option<String>,
    },

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Dispenser management commands
    #[command(subcommand)]
    Dispenser(DispenserCommands),

    /// Verify ledger integrity
    Check,

    /// Leave the terminal
    #[command(alias = "exit")]
    Quit,
}

#[derive(Subcommand, Debug)]
pub enum CustomerCommands {
    /// Register a customer and open their account
    Add {
        /// Customer ID (must be unique)
        id: CustomerId,

        /// Full name
        name: String,

        /// Credential used to log in
        credential: String,

        /// Opening balance
        #[arg(short, long, default_value = "0")]
        balance: String,
    },

    /// List customers by id
    List,
}

#[derive(Subcommand, Debug)]
pub enum DispenserCommands {
    /// Register a dispenser, optionally with initial notes
    Add {
        /// Dispenser ID (must be unique)
        id: DispenserId,

        /// Location label
        location: String,

        /// Initial notes as DENOMINATIONxCOUNT
        notes: Vec<String>,
    },

    /// List dispensers by id
    List,

    /// Set note counts of a dispenser
    Restock {
        /// Dispenser ID
        id: DispenserId,

        /// New counts as DENOMINATIONxCOUNT
        #[arg(required = true)]
        notes: Vec<String>,
    },

    /// Route cash operations through a dispenser
    Use {
        /// Dispenser ID
        id: DispenserId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

struct LoggedIn {
    customer_name: String,
    account: AccountNumber,
}

/// Interactive terminal state: who is logged in and which dispenser serves them.
pub struct Session<'a> {
    service: &'a BankService,
    current: Option<LoggedIn>,
    dispenser: Option<DispenserId>,
    json: bool,
}

impl<'a> Session<'a> {
    pub fn new(service: &'a BankService, json: bool) -> Self {
        Self {
            service,
            current: None,
            dispenser: None,
            json,
        }
    }

    pub fn use_dispenser(&mut self, id: DispenserId) {
        self.dispenser = Some(id);
    }

    /// Account number of the logged-in customer.
    pub fn current_account(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.account.as_str())
    }

    /// Execute commands line by line until input ends or `quit`.
    /// Failed commands are reported and the session carries on.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, reader: R, prompt: bool) -> Result<()> {
        let mut lines = reader.lines();

        loop {
            if prompt {
                print!("{}> ", self.prompt_label());
                std::io::stdout().flush()?;
            }

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match self.execute(&line).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => println!("Error: {:#}", e),
            }
        }

        println!("Goodbye.");
        Ok(())
    }

    fn prompt_label(&self) -> String {
        match &self.current {
            Some(current) => current.customer_name.clone(),
            None => "cashpoint".to_string(),
        }
    }

    /// Parse and run a single line. Blank lines and `#` comments are skipped.
    pub async fn execute(&mut self, line: &str) -> Result<Flow> {
        let tokens = split_line(line)?;
        if tokens.is_empty() || tokens[0].starts_with('#') {
            return Ok(Flow::Continue);
        }

        let parsed = match SessionLine::try_parse_from(tokens) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Help and usage errors are rendered by clap.
                println!("{}", e);
                return Ok(Flow::Continue);
            }
        };

        match parsed.command {
            SessionCommand::Login {
                customer,
                credential,
            } => {
                let auth = self.service.authenticate(customer, &credential).await?;
                println!(
                    "Welcome, {}. Account {}",
                    auth.customer.name, auth.account.number
                );
                self.current = Some(LoggedIn {
                    customer_name: auth.customer.name,
                    account: auth.account.number,
                });
            }

            SessionCommand::Logout => {
                if self.current.take().is_some() {
                    println!("Logged out.");
                }
            }

            SessionCommand::Balance => {
                let account = self.require_account()?;
                let balance = self.service.balance(&account).await?;
                if self.json {
                    println!("{}", serde_json::json!({ "account": account, "balance": balance }));
                } else {
                    println!("Current balance: {}", format_amount(balance));
                }
            }

            SessionCommand::History => {
                let account = self.require_account()?;
                let movements = self.service.history(&account).await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&movements)?);
                } else if movements.is_empty() {
                    println!("No movements recorded.");
                } else {
                    println!(
                        "{:<17} {:<13} {:>10}  {}",
                        "DATE", "TYPE", "AMOUNT", "DETAIL"
                    );
                    println!("{}", "-".repeat(60));
                    for m in &movements {
                        println!(
                            "{:<17} {:<13} {:>10}  {}",
                            m.timestamp.format("%d/%m/%Y %H:%M"),
                            m.kind,
                            format_amount(m.amount),
                            m.detail()
                        );
                    }
                    println!("{}", "-".repeat(60));
                    println!("{:<31} {:>10}", "NET", format_amount(compute_balance(&movements)));
                }
            }

            SessionCommand::Withdraw { amount } => {
                let account = self.require_account()?;
                let amount = read_amount(&amount)?;
                let dispenser = self.current_dispenser().await?;

                let result = self.service.withdraw(&account, amount, dispenser).await?;
                println!("Withdrawal complete. Notes dispensed:");
                for (denomination, count) in result.breakdown.nonzero_descending() {
                    println!("  {:>5} x {}", denomination.to_string(), count);
                }
                println!("New balance: {}", format_amount(result.balance));
            }

            SessionCommand::Deposit { notes } => {
                let account = self.require_account()?;
                let notes = parse_notes(&notes)?;
                let dispenser = self.current_dispenser().await?;

                let result = self.service.deposit(&account, &notes, dispenser).await?;
                println!("Deposited {}", format_amount(result.total));
                println!("New balance: {}", format_amount(result.balance));
            }

            SessionCommand::Transfer { amount, to } => {
                let account = self.require_account()?;
                let amount = read_amount(&amount)?;

                let result = self.service.transfer(&account, &to, amount).await?;
                println!(
                    "Transferred {} to {} ({})",
                    format_amount(amount),
                    result.recipient_name,
                    to
                );
                println!("New balance: {}", format_amount(result.balance));
            }

            SessionCommand::Pay { service, amount } => {
                let account = self.require_account()?;
                let service = BillService::from_str(&service).ok_or_else(|| {
                    anyhow!(
                        "Unknown service '{}'. Valid services: electricity, water, gas, internet",
                        service
                    )
                })?;
                let amount = match amount {
                    Some(amount) => read_amount(&amount)?,
                    None => {
                        let quote = service.quote(&mut rand::thread_rng());
                        println!("Amount due for {}: {}", service, format_amount(quote));
                        quote
                    }
                };

                let result = self.service.pay_bill(&account, service, amount).await?;
                println!("Paid {} {}", result.service, format_amount(amount));
                println!("Reference: {}", result.reference);
                println!("New balance: {}", format_amount(result.balance));
            }

            SessionCommand::Customer(command) => self.run_customer_command(command).await?,

            SessionCommand::Dispenser(command) => self.run_dispenser_command(command).await?,

            SessionCommand::Check => {
                let report = self.service.check_integrity().await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    println!("Customers:  {}", report.customer_count);
                    println!("Accounts:   {}", report.account_count);
                    println!("Movements:  {}", report.movement_count);
                    println!("Dispensers: {}", report.dispenser_count);
                    for mismatch in &report.mismatches {
                        println!(
                            "  MISMATCH {}: stored {}, movements sum to {}",
                            mismatch.account,
                            format_amount(mismatch.stored),
                            format_amount(mismatch.computed)
                        );
                    }
                    for account in &report.negative_balances {
                        println!("  NEGATIVE {}", account);
                    }
                    if report.dangling_counterparties > 0 {
                        println!(
                            "  {} transfer(s) reference unknown accounts",
                            report.dangling_counterparties
                        );
                    }
                    for cash in &report.dispensers {
                        println!(
                            "  Dispenser {} ({}): {}",
                            cash.dispenser,
                            cash.location,
                            format_amount(cash.total_cash)
                        );
                    }
                    println!(
                        "Ledger {}",
                        if report.is_healthy() { "OK" } else { "INCONSISTENT" }
                    );
                }
            }

            SessionCommand::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    async fn run_customer_command(&mut self, command: CustomerCommands) -> Result<()> {
        match command {
            CustomerCommands::Add {
                id,
                name,
                credential,
                balance,
            } => {
                let opening = read_amount(&balance)?;
                let (customer, account) = self
                    .service
                    .enroll_customer(id, name, credential, Account::default_number(id), opening)
                    .await?;
                println!("Registered customer {} ({})", customer.id, customer.name);
                println!("Assigned account: {}", account.number);
            }

            CustomerCommands::List => {
                let customers = self.service.list_customers().await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&customers)?);
                } else if customers.is_empty() {
                    println!("No customers registered.");
                } else {
                    println!("{:<8} {:<25} {:<12}", "ID", "NAME", "ACCOUNT");
                    println!("{}", "-".repeat(47));
                    for customer in customers {
                        let account = self
                            .service
                            .account_for_customer(customer.id)
                            .await?
                            .map(|a| a.number)
                            .unwrap_or_else(|| "-".to_string());
                        println!("{:<8} {:<25} {:<12}", customer.id, customer.name, account);
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_dispenser_command(&mut self, command: DispenserCommands) -> Result<()> {
        match command {
            DispenserCommands::Add {
                id,
                location,
                notes,
            } => {
                let notes = parse_notes(&notes)?;
                let dispenser = self
                    .service
                    .register_dispenser(id, location, &notes)
                    .await?;
                println!(
                    "Registered dispenser {} at {} holding {}",
                    dispenser.id,
                    dispenser.location,
                    format_amount(dispenser.total_cash())
                );
            }

            DispenserCommands::List => {
                let dispensers = self.service.list_dispensers().await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&dispensers)?);
                } else if dispensers.is_empty() {
                    println!("No dispensers registered.");
                } else {
                    println!("{:<6} {:<20} {:>9}  {}", "ID", "LOCATION", "CASH", "NOTES");
                    println!("{}", "-".repeat(70));
                    for d in dispensers {
                        println!(
                            "{:<6} {:<20} {:>9}  {}",
                            d.id,
                            d.location,
                            format_amount(d.total_cash()),
                            d.notes
                        );
                    }
                }
            }

            DispenserCommands::Restock { id, notes } => {
                let notes = parse_notes(&notes)?;
                let dispenser = self.service.restock_dispenser(id, &notes).await?;
                println!("Dispenser {} now holds {}", dispenser.id, dispenser.notes);
            }

            DispenserCommands::Use { id } => {
                let dispenser = self.service.get_dispenser(id).await?;
                self.dispenser = Some(dispenser.id);
                println!("Using dispenser {} ({})", dispenser.id, dispenser.location);
            }
        }
        Ok(())
    }

    fn require_account(&self) -> Result<AccountNumber> {
        self.current
            .as_ref()
            .map(|c| c.account.clone())
            .ok_or_else(|| anyhow!("Log in first: login <customer-id> <credential>"))
    }

    /// The selected dispenser, or the lowest-id one when none was chosen.
    async fn current_dispenser(&self) -> Result<DispenserId> {
        if let Some(id) = self.dispenser {
            return Ok(id);
        }
        self.service
            .list_dispensers()
            .await?
            .first()
            .map(|d| d.id)
            .ok_or_else(|| anyhow!("No dispensers available"))
    }
}

fn read_amount(input: &str) -> Result<Amount> {
    parse_amount(input).with_context(|| format!("Invalid amount '{}'. Use whole units like '300'", input))
}

/// Split a command line into words. Double quotes enclose a whole word,
/// which may then contain spaces; a quote inside a word is rejected.
pub fn split_line(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(first) = chars.next() else {
            break;
        };

        let mut word = String::new();
        if first == '"' {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some(c) => word.push(c),
                    None => bail!("Unterminated quote in: {}", line),
                }
            }
            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                bail!("Closing quote must end the word in: {}", line);
            }
        } else {
            word.push(first);
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '"' {
                    bail!("Quotes must enclose a whole word in: {}", line);
                }
                word.push(c);
            }
        }
        words.push(word);
    }

    Ok(words)
}
