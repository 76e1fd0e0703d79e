// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use cashpoint::application::BankService;
use cashpoint::domain::{Denomination, NoteCounts};

/// Helper to create a test service backed by a fresh in-memory database
pub async fn test_service() -> Result<BankService> {
    Ok(BankService::init().await?)
}

/// Build a note inventory from (face value, count) pairs
pub fn notes(pairs: &[(u32, u32)]) -> NoteCounts {
    pairs
        .iter()
        .map(|&(value, count)| {
            let denomination = Denomination::from_value(value).unwrap();
            (denomination, count)
        })
        .collect()
}

/// Test fixture: Standard bank setup
pub struct StandardBank;

impl StandardBank {
    pub const LUIS: &'static str = "001-123456";
    pub const PAOLA: &'static str = "001-654321";
    pub const SALAZAR: &'static str = "001-987654";

    /// Three customers with 5000, 3000 and 7000, and no dispensers
    pub async fn create_customers(service: &BankService) -> Result<()> {
        let customers = [
            (1, "Luis Sanchez", "1234", Self::LUIS, 5000),
            (2, "Paola Olivos", "5678", Self::PAOLA, 3000),
            (3, "Luis Salazar", "9012", Self::SALAZAR, 7000),
        ];
        for (id, name, credential, number, balance) in customers {
            service
                .register_customer(id, name.into(), credential.into())
                .await?;
            service.register_account(number.into(), id, balance).await?;
        }
        Ok(())
    }

    /// Customers plus dispenser 1 holding {200:10, 100:20, 50:30, 20:40}
    pub async fn create(service: &BankService) -> Result<()> {
        Self::create_customers(service).await?;
        service
            .register_dispenser(
                1,
                "Central Branch".into(),
                &notes(&[(200, 10), (100, 20), (50, 30), (20, 40)]),
            )
            .await?;
        Ok(())
    }
}
