use super::{Amount, NoteCounts};

/// Split `amount` into banknotes drawn from `inventory`.
///
/// Greedy, largest denomination first: each denomination contributes as many
/// notes as fit in what remains, capped by the notes in stock. There is no
/// backtracking, so an amount can be rejected even though some other mix of
/// notes would cover it (e.g. 60 with only 50s and 20s stocked). Returns `None`
/// when the pass leaves a remainder; the partial result is discarded.
pub fn compute_breakdown(amount: Amount, inventory: &NoteCounts) -> Option<NoteCounts> {
    let mut breakdown = NoteCounts::new();
    let mut remaining = amount;

    for (denomination, available) in inventory.iter().rev() {
        if remaining <= 0 {
            break;
        }

        let face = Amount::from(denomination.value());
        if face <= remaining && available > 0 {
            let count = (remaining / face).min(Amount::from(available));
            breakdown.set(denomination, count as u32);
            remaining -= face * count;
        }
    }

    if remaining == 0 {
        log::debug!("breakdown of {}: {}", amount, breakdown);
        Some(breakdown)
    } else {
        log::debug!("no breakdown of {}: {} left over", amount, remaining);
        None
    }
}
