mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;

use crate::application::BankService;
use crate::domain::{Denomination, DispenserId, NoteCounts};

pub use session::{
    split_line, CustomerCommands, DispenserCommands, Flow, Session, SessionCommand, SessionLine,
};

/// Cashpoint - ATM network simulator
#[derive(Parser, Debug)]
#[command(name = "cashpoint")]
#[command(about = "An in-memory ATM network: customers, accounts and cash dispensers")]
#[command(version)]
pub struct Cli {
    /// Start with an empty bank instead of the demo customers and dispensers
    #[arg(long)]
    pub no_demo: bool,

    /// Read session commands from a file instead of standard input
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Dispenser used for cash operations (defaults to the lowest id)
    #[arg(short, long)]
    pub dispenser: Option<DispenserId>,

    /// Print query results as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Default log filter, overridden by `RUST_LOG`.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "warn" }
    }

    pub async fn run(self) -> Result<()> {
        let service = BankService::init().await?;

        if !self.no_demo {
            seed_demo(&service).await?;
        }

        let mut session = Session::new(&service, self.json);
        if let Some(id) = self.dispenser {
            service.get_dispenser(id).await?;
            session.use_dispenser(id);
        }

        match &self.script {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Cannot open script {}", path.display()))?;
                session.run(BufReader::new(file), false).await
            }
            None => {
                println!("Cashpoint ready. Type 'help' for commands, 'quit' to leave.");
                session.run(BufReader::new(tokio::io::stdin()), true).await
            }
        }
    }
}

/// Populate a bank with the demo customers, accounts and dispensers.
pub async fn seed_demo(service: &BankService) -> Result<()> {
    let customers = [
        (1, "Luis Sanchez", "1234", "001-123456", 5000),
        (2, "Paola Olivos", "5678", "001-654321", 3000),
        (3, "Luis Salazar", "9012", "001-987654", 7000),
    ];
    for (id, name, credential, number, balance) in customers {
        service
            .enroll_customer(
                id,
                name.to_string(),
                credential.to_string(),
                number.to_string(),
                balance,
            )
            .await?;
    }

    service
        .register_dispenser(1, "Central Branch".to_string(), &stock(10, 20, 30, 40))
        .await?;
    service
        .register_dispenser(2, "North Branch".to_string(), &stock(5, 15, 25, 35))
        .await?;

    log::debug!("seeded demo bank");
    Ok(())
}

fn stock(two_hundreds: u32, hundreds: u32, fifties: u32, twenties: u32) -> NoteCounts {
    NoteCounts::new()
        .with(Denomination::TwoHundred, two_hundreds)
        .with(Denomination::Hundred, hundreds)
        .with(Denomination::Fifty, fifties)
        .with(Denomination::Twenty, twenties)
}
