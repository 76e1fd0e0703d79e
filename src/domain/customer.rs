use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CustomerId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// Opaque secret compared verbatim at login. Never written to output.
    #[serde(skip_serializing, default)]
    pub credential: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            credential: credential.into(),
            created_at: Utc::now(),
        }
    }

    pub fn verify_credential(&self, candidate: &str) -> bool {
        self.credential == candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_credential() {
        let customer = Customer::new(1, "Luis Sanchez", "1234");
        assert!(customer.verify_credential("1234"));
        assert!(!customer.verify_credential("4321"));
        assert!(!customer.verify_credential(""));
    }

    #[test]
    fn test_credential_is_not_serialized() {
        let customer = Customer::new(2, "Paola Olivos", "5678");
        let json = serde_json::to_string(&customer).unwrap();
        assert!(json.contains("Paola Olivos"));
        assert!(!json.contains("5678"));
    }
}
