use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Amount;

/// Utility services that can be paid at a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillService {
    Electricity,
    Water,
    Gas,
    Internet,
}

impl BillService {
    pub const ALL: [BillService; 4] = [
        BillService::Electricity,
        BillService::Water,
        BillService::Gas,
        BillService::Internet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillService::Electricity => "electricity",
            BillService::Water => "water",
            BillService::Gas => "gas",
            BillService::Internet => "internet",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "electricity" | "power" => Some(BillService::Electricity),
            "water" => Some(BillService::Water),
            "gas" => Some(BillService::Gas),
            "internet" => Some(BillService::Internet),
            _ => None,
        }
    }

    /// Label stored on the payment movement.
    pub fn label(&self) -> &'static str {
        match self {
            BillService::Electricity => "Electricity",
            BillService::Water => "Water",
            BillService::Gas => "Gas",
            BillService::Internet => "Internet",
        }
    }

    /// Inclusive range a monthly bill for this service falls in.
    pub fn bounds(&self) -> (Amount, Amount) {
        match self {
            BillService::Electricity => (180, 350),
            BillService::Water => (80, 200),
            BillService::Gas => (120, 300),
            BillService::Internet => (250, 500),
        }
    }

    /// Draw the amount due for this service.
    pub fn quote<R: Rng>(&self, rng: &mut R) -> Amount {
        let (min, max) = self.bounds();
        rng.gen_range(min..=max)
    }
}

impl std::fmt::Display for BillService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Generate the reference handed to the customer after a bill payment.
pub fn payment_reference<R: Rng>(rng: &mut R) -> String {
    format!("REF-{}", rng.gen_range(100_000..=999_999))
}
