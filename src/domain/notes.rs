use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Amount;

/// Face value of a banknote the machines accept and dispense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Denomination {
    Twenty,
    Fifty,
    Hundred,
    TwoHundred,
}

impl Denomination {
    /// Every denomination, largest first.
    pub const ALL: [Denomination; 4] = [
        Denomination::TwoHundred,
        Denomination::Hundred,
        Denomination::Fifty,
        Denomination::Twenty,
    ];

    pub fn value(&self) -> u32 {
        match self {
            Denomination::Twenty => 20,
            Denomination::Fifty => 50,
            Denomination::Hundred => 100,
            Denomination::TwoHundred => 200,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            20 => Some(Denomination::Twenty),
            50 => Some(Denomination::Fifty),
            100 => Some(Denomination::Hundred),
            200 => Some(Denomination::TwoHundred),
            _ => None,
        }
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.value())
    }
}

impl From<Denomination> for u32 {
    fn from(denomination: Denomination) -> Self {
        denomination.value()
    }
}

impl TryFrom<u32> for Denomination {
    type Error = ParseNotesError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Denomination::from_value(value).ok_or(ParseNotesError::UnknownDenomination(value))
    }
}

impl std::str::FromStr for Denomination {
    type Err = ParseNotesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix('$').unwrap_or(s);
        let value: u32 = digits
            .parse()
            .map_err(|_| ParseNotesError::InvalidFormat(s.to_string()))?;
        Denomination::try_from(value)
    }
}

/// Number of notes held (or requested) per denomination.
///
/// Used both for a dispenser's inventory and for a breakdown of an amount
/// into notes. Iteration is in ascending face value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteCounts(BTreeMap<Denomination, u32>);

impl NoteCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// All denominations present, each with zero notes.
    pub fn empty_cassettes() -> Self {
        Denomination::ALL.iter().map(|d| (*d, 0)).collect()
    }

    pub fn with(mut self, denomination: Denomination, count: u32) -> Self {
        self.0.insert(denomination, count);
        self
    }

    pub fn get(&self, denomination: Denomination) -> u32 {
        self.0.get(&denomination).copied().unwrap_or(0)
    }

    pub fn set(&mut self, denomination: Denomination, count: u32) {
        self.0.insert(denomination, count);
    }

    /// Add notes to a denomination and return the new count. Returns `None`,
    /// leaving the count as it was, when the count would exceed `u32::MAX`.
    pub fn checked_add(&mut self, denomination: Denomination, count: u32) -> Option<u32> {
        let total = self.get(denomination).checked_add(count)?;
        self.0.insert(denomination, total);
        Some(total)
    }

    pub fn contains(&self, denomination: Denomination) -> bool {
        self.0.contains_key(&denomination)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Denomination, u32)> + '_ {
        self.0.iter().map(|(d, count)| (*d, *count))
    }

    /// Denominations with at least one note, largest first.
    pub fn nonzero_descending(&self) -> impl Iterator<Item = (Denomination, u32)> + '_ {
        self.iter().rev().filter(|(_, count)| *count > 0)
    }

    /// Sum of face value times count.
    pub fn total_value(&self) -> Amount {
        self.iter()
            .map(|(d, count)| Amount::from(d.value()) * Amount::from(count))
            .sum()
    }

    pub fn note_count(&self) -> u64 {
        self.iter().map(|(_, count)| u64::from(count)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.note_count() == 0
    }
}

/// A later pair for the same denomination replaces the earlier one.
impl FromIterator<(Denomination, u32)> for NoteCounts {
    fn from_iter<I: IntoIterator<Item = (Denomination, u32)>>(iter: I) -> Self {
        NoteCounts(iter.into_iter().collect())
    }
}

impl fmt::Display for NoteCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .rev()
            .map(|(d, count)| format!("{}:{}", d, count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Parse notes given of the form `DENOMINATIONxCOUNT`, e.g. `100x2`.
/// Repeated denominations accumulate.
pub fn parse_notes<S: AsRef<str>>(entries: &[S]) -> Result<NoteCounts, ParseNotesError> {
    let mut notes = NoteCounts::new();

    for entry in entries {
        let entry = entry.as_ref();
        let (denomination, count) = entry
            .split_once(['x', 'X', ':'])
            .ok_or_else(|| ParseNotesError::InvalidFormat(entry.to_string()))?;
        let denomination: Denomination = denomination.parse()?;
        let count: u32 = count
            .trim()
            .parse()
            .map_err(|_| ParseNotesError::InvalidFormat(entry.to_string()))?;
        notes
            .checked_add(denomination, count)
            .ok_or(ParseNotesError::TooManyNotes(denomination))?;
    }

    Ok(notes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNotesError {
    UnknownDenomination(u32),
    InvalidFormat(String),
    TooManyNotes(Denomination),
}

impl fmt::Display for ParseNotesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseNotesError::UnknownDenomination(value) => write!(
                f,
                "unknown denomination {} (accepted: 200, 100, 50, 20)",
                value
            ),
            ParseNotesError::InvalidFormat(entry) => {
                write!(f, "invalid note '{}', expected e.g. 100x2", entry)
            }
            ParseNotesError::TooManyNotes(denomination) => {
                write!(f, "too many {} notes", denomination)
            }
        }
    }
}

impl std::error::Error for ParseNotesError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denomination_roundtrip() {
        for d in Denomination::ALL {
            assert_eq!(Denomination::from_value(d.value()), Some(d));
        }
        assert_eq!(Denomination::from_value(10), None);
    }

    #[test]
    fn test_all_is_descending() {
        let values: Vec<u32> = Denomination::ALL.iter().map(|d| d.value()).collect();
        assert_eq!(values, vec![200, 100, 50, 20]);
    }

    #[test]
    fn test_total_value() {
        let notes = NoteCounts::new()
            .with(Denomination::TwoHundred, 10)
            .with(Denomination::Hundred, 20)
            .with(Denomination::Fifty, 30)
            .with(Denomination::Twenty, 40);

        assert_eq!(notes.total_value(), 2000 + 2000 + 1500 + 800);
        assert_eq!(notes.note_count(), 100);
    }

    #[test]
    fn test_zero_counts_are_empty() {
        assert!(NoteCounts::empty_cassettes().is_empty());
        assert_eq!(NoteCounts::empty_cassettes().total_value(), 0);
        assert!(!NoteCounts::new().with(Denomination::Twenty, 1).is_empty());
    }

    #[test]
    fn test_parse_notes() {
        let notes = parse_notes(&["100x2", "$20x1", "200:0"]).unwrap();
        assert_eq!(notes.get(Denomination::Hundred), 2);
        assert_eq!(notes.get(Denomination::Twenty), 1);
        assert_eq!(notes.get(Denomination::TwoHundred), 0);
        assert_eq!(notes.total_value(), 220);
    }

    #[test]
    fn test_parse_notes_accumulates_repeats() {
        let notes = parse_notes(&["50x1", "50x2"]).unwrap();
        assert_eq!(notes.get(Denomination::Fifty), 3);
    }

    #[test]
    fn test_parse_notes_rejects_count_overflow() {
        assert_eq!(
            parse_notes(&["20x4294967295", "20x1"]),
            Err(ParseNotesError::TooManyNotes(Denomination::Twenty))
        );
        assert!(parse_notes(&["20x4294967296"]).is_err());

        let notes = parse_notes(&["20x4294967294", "20x1"]).unwrap();
        assert_eq!(notes.get(Denomination::Twenty), u32::MAX);
    }

    #[test]
    fn test_checked_add_leaves_count_on_overflow() {
        let mut notes = NoteCounts::new().with(Denomination::Fifty, u32::MAX - 1);

        assert_eq!(notes.checked_add(Denomination::Fifty, 1), Some(u32::MAX));
        assert_eq!(notes.checked_add(Denomination::Fifty, 1), None);
        assert_eq!(notes.get(Denomination::Fifty), u32::MAX);
        assert_eq!(notes.checked_add(Denomination::Hundred, 3), Some(3));
    }

    #[test]
    fn test_parse_notes_invalid() {
        assert_eq!(
            parse_notes(&["10x3"]),
            Err(ParseNotesError::UnknownDenomination(10))
        );
        assert!(matches!(
            parse_notes(&["100"]),
            Err(ParseNotesError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_notes(&["100x-1"]),
            Err(ParseNotesError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_display_is_largest_first() {
        let notes = NoteCounts::new()
            .with(Denomination::Twenty, 1)
            .with(Denomination::TwoHundred, 1);
        assert_eq!(notes.to_string(), "$200:1, $20:1");
    }

    #[test]
    fn test_json_uses_face_values() {
        let notes = NoteCounts::new().with(Denomination::Fifty, 3);
        let json = serde_json::to_string(&notes).unwrap();
        assert_eq!(json, r#"{"50":3}"#);
    }
}
