mod account;
mod bill;
mod breakdown;
mod customer;
mod dispenser;
mod ledger;
mod money;
mod movement;
mod notes;

pub use account::*;
pub use bill::*;
pub use breakdown::*;
pub use customer::*;
pub use dispenser::*;
pub use ledger::*;
pub use money::*;
pub use movement::*;
pub use notes::*;
