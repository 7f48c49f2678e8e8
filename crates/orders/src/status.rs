use std::fmt;

use serde::{Deserialize, Serialize};

use stockline_core::{EngineError, EngineResult};

/// Order lifecycle status.
///
/// Serialized in upper case (`"PENDING"` etc.) both over the wire and in
/// storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Canceled,
    ];

    /// Statuses reachable from `self`:
    ///
    /// | from     | allowed           |
    /// |----------|-------------------|
    /// | PENDING  | PAID, CANCELED    |
    /// | PAID     | SHIPPED, CANCELED |
    /// | SHIPPED  | (none)            |
    /// | CANCELED | (none)            |
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Paid, OrderStatus::Canceled],
            OrderStatus::Paid => &[OrderStatus::Shipped, OrderStatus::Canceled],
            OrderStatus::Shipped | OrderStatus::Canceled => &[],
        }
    }

    /// Whether `self -> next` is a legal edge. Same-status repeats are not
    /// edges; the engine absorbs them as no-ops before consulting the table.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Validate an edge, producing the error carried to callers.
    pub fn check_transition(self, next: OrderStatus) -> EngineResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(EngineError::invalid_transition(
                self.as_str(),
                next.as_str(),
            ))
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    /// Parse the storage/wire representation. Returns `None` for anything
    /// that is not one of the four canonical upper-case names.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "PAID" => Some(OrderStatus::Paid),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "CANCELED" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn transition_table_is_exact() {
        use OrderStatus::*;
        // Every (from, to) pair, including self-edges, which the table
        // itself rejects (the engine absorbs them earlier as no-ops).
        let expected: [(OrderStatus, OrderStatus, bool); 16] = [
            (Pending, Pending, false),
            (Pending, Paid, true),
            (Pending, Shipped, false),
            (Pending, Canceled, true),
            (Paid, Pending, false),
            (Paid, Paid, false),
            (Paid, Shipped, true),
            (Paid, Canceled, true),
            (Shipped, Pending, false),
            (Shipped, Paid, false),
            (Shipped, Shipped, false),
            (Shipped, Canceled, false),
            (Canceled, Pending, false),
            (Canceled, Paid, false),
            (Canceled, Shipped, false),
            (Canceled, Canceled, false),
        ];
        for (from, to, allowed) in expected {
            assert_eq!(
                from.can_transition_to(to),
                allowed,
                "{from} -> {to} should be {allowed}"
            );
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(OrderStatus::Shipped.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
    }

    #[test]
    fn check_transition_reports_both_endpoints() {
        let err = OrderStatus::Shipped
            .check_transition(OrderStatus::Canceled)
            .unwrap_err();
        assert_eq!(
            err,
            stockline_core::EngineError::InvalidTransition {
                from: "SHIPPED".to_string(),
                to: "CANCELED".to_string(),
            }
        );
    }

    #[test]
    fn parse_round_trips_canonical_names() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("pending"), None);
        assert_eq!(OrderStatus::parse("REFUNDED"), None);
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    proptest! {
        /// Walking any sequence of requested statuses through the engine's
        /// rule (same-status no-op, table-checked otherwise) cancels at most
        /// once and never leaves a terminal state.
        #[test]
        fn lifecycle_cancels_at_most_once(targets in prop::collection::vec(any_status(), 0..12)) {
            let mut current = OrderStatus::Pending;
            let mut cancellations = 0usize;
            for target in targets {
                if target == current {
                    continue;
                }
                if current.can_transition_to(target) {
                    if target == OrderStatus::Canceled {
                        cancellations += 1;
                    }
                    prop_assert!(!current.is_terminal());
                    current = target;
                }
            }
            prop_assert!(cancellations <= 1);
        }
    }
}
