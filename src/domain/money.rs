use std::fmt;

/// Money is represented as whole currency units. The machines only handle
/// banknotes, so there is no fractional part anywhere in the ledger.
pub type Amount = i64;

/// Format an amount as a human-readable currency string.
/// Example: 5000 -> "$5000", -300 -> "-$300"
pub fn format_amount(amount: Amount) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}${}", sign, amount.unsigned_abs())
}

/// Parse a whole-unit amount, with or without a leading `$`.
/// Example: "300" -> 300, "$1500" -> 1500
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    let digits = input.strip_prefix('$').unwrap_or(input);

    if digits.is_empty() {
        return Err(ParseAmountError::Empty);
    }
    if digits.contains('.') || digits.contains(',') {
        return Err(ParseAmountError::Fractional);
    }

    digits
        .parse::<Amount>()
        .map_err(|_| ParseAmountError::InvalidFormat)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    Fractional,
    InvalidFormat,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "amount is empty"),
            ParseAmountError::Fractional => write!(f, "amounts must be whole units"),
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
        }
    }
}

impl std::error::Error for ParseAmountError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(5000), "$5000");
        assert_eq!(format_amount(0), "$0");
        assert_eq!(format_amount(-300), "-$300");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("300"), Ok(300));
        assert_eq!(parse_amount("$1500"), Ok(1500));
        assert_eq!(parse_amount("  20 "), Ok(20));
        assert_eq!(parse_amount("-50"), Ok(-50));
    }

    #[test]
    fn test_parse_amount_invalid() {
        assert_eq!(parse_amount(""), Err(ParseAmountError::Empty));
        assert_eq!(parse_amount("$"), Err(ParseAmountError::Empty));
        assert_eq!(parse_amount("12.50"), Err(ParseAmountError::Fractional));
        assert_eq!(parse_amount("abc"), Err(ParseAmountError::InvalidFormat));
    }
}
