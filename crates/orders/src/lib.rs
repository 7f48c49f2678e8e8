//! `stockline-orders` — order entity and status lifecycle.
//!
//! The transition table lives here as a pure function on [`OrderStatus`],
//! independently of any storage, so it can be tested exhaustively.

pub mod order;
pub mod status;

pub use order::{DeleteOutcome, NewOrder, Order};
pub use status::OrderStatus;
