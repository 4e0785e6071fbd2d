//! # Transfer State Machine
//!
//! Pure rules for the request → approve → receive workflow.
//!
//! ## Transfer Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Transfer Lifecycle                                │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── Transfer { status: Pending }      no stock moves               │
//! │                                                                         │
//! │  2. APPROVE (Pending only)                                             │
//! │     └── Transfer { status: InTransit }    approved_quantity set        │
//! │                                           no stock moves               │
//! │                                                                         │
//! │  3. RECEIVE (InTransit only)                                           │
//! │     └── Transfer { status: Received }     received_quantity set        │
//! │                                           source −n, destination +n    │
//! │                                           (one transaction)            │
//! │                                                                         │
//! │  X. CANCEL (Pending only)                                              │
//! │     └── Transfer { status: Cancelled }    no stock moves               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{ItemQuantity, StockKey, StockTransferItem, TransferStatus};
use crate::validation::ValidationResult;

// =============================================================================
// Transitions
// =============================================================================

/// An operation that moves a transfer between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    Approve,
    Receive,
    Cancel,
}

impl TransferAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferAction::Approve => "approve",
            TransferAction::Receive => "receive",
            TransferAction::Cancel => "cancel",
        }
    }

    /// The only state this action may start from.
    pub fn required_status(&self) -> TransferStatus {
        match self {
            TransferAction::Approve | TransferAction::Cancel => TransferStatus::Pending,
            TransferAction::Receive => TransferStatus::InTransit,
        }
    }
}

impl TransferStatus {
    /// Returns the state reached by applying `action`, if the move is legal.
    pub fn apply(self, action: TransferAction) -> Option<TransferStatus> {
        match (self, action) {
            (TransferStatus::Pending, TransferAction::Approve) => Some(TransferStatus::InTransit),
            (TransferStatus::Pending, TransferAction::Cancel) => Some(TransferStatus::Cancelled),
            (TransferStatus::InTransit, TransferAction::Receive) => Some(TransferStatus::Received),
            _ => None,
        }
    }

    /// Like [`TransferStatus::apply`], but reports illegal moves as
    /// [`CoreError::InvalidState`].
    pub fn transition(self, transfer_id: &str, action: TransferAction) -> CoreResult<TransferStatus> {
        self.apply(action).ok_or_else(|| {
            CoreError::invalid_state("Transfer", transfer_id, self.as_str(), action.as_str())
        })
    }
}

// =============================================================================
// Quantity Resolution
// =============================================================================

/// The quantity settled for one transfer item by approve or receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuantity {
    pub item_id: String,
    pub key: StockKey,
    pub quantity: i64,
}

/// Indexes overrides by stock key, rejecting duplicates and unknown items.
fn index_overrides<'a>(
    items: &[StockTransferItem],
    overrides: &'a [ItemQuantity],
) -> ValidationResult<HashMap<StockKey, &'a ItemQuantity>> {
    let known: HashSet<StockKey> = items.iter().map(StockTransferItem::key).collect();
    let mut indexed = HashMap::with_capacity(overrides.len());

    for entry in overrides {
        let key = entry.key();
        if !known.contains(&key) {
            return Err(ValidationError::rule(
                "items",
                format!("{} is not part of this transfer", key),
            ));
        }
        if indexed.insert(key.clone(), entry).is_some() {
            return Err(ValidationError::Duplicate {
                field: "item".to_string(),
                value: key.to_string(),
            });
        }
    }

    Ok(indexed)
}

fn check_ceiling(field: &str, key: &StockKey, quantity: i64, ceiling: i64) -> ValidationResult<()> {
    if quantity < 0 || quantity > ceiling {
        return Err(ValidationError::OutOfRange {
            field: format!("{} for {}", field, key),
            min: 0,
            max: ceiling,
        });
    }
    Ok(())
}

/// Settles `approved_quantity` for every item.
///
/// An override replaces the requested quantity and must satisfy
/// `0 ≤ approved ≤ requested`; items without an override are approved in
/// full.
pub fn resolve_approved(
    items: &[StockTransferItem],
    overrides: Option<&[ItemQuantity]>,
) -> ValidationResult<Vec<ResolvedQuantity>> {
    let overrides = index_overrides(items, overrides.unwrap_or_default())?;

    items
        .iter()
        .map(|item| {
            let key = item.key();
            let quantity = match overrides.get(&key) {
                Some(entry) => {
                    check_ceiling("approved_quantity", &key, entry.quantity, item.requested_quantity)?;
                    entry.quantity
                }
                None => item.requested_quantity,
            };
            Ok(ResolvedQuantity {
                item_id: item.id.clone(),
                key,
                quantity,
            })
        })
        .collect()
}

/// Settles `received_quantity` for every item.
///
/// Priority: explicit override, then `approved_quantity`, then
/// `requested_quantity`. Overrides must satisfy `0 ≤ received ≤ approved`.
pub fn resolve_received(
    items: &[StockTransferItem],
    overrides: Option<&[ItemQuantity]>,
) -> ValidationResult<Vec<ResolvedQuantity>> {
    let overrides = index_overrides(items, overrides.unwrap_or_default())?;

    items
        .iter()
        .map(|item| {
            let key = item.key();
            let ceiling = item.shippable_quantity();
            let quantity = match overrides.get(&key) {
                Some(entry) => {
                    check_ceiling("received_quantity", &key, entry.quantity, ceiling)?;
                    entry.quantity
                }
                None => ceiling,
            };
            Ok(ResolvedQuantity {
                item_id: item.id.clone(),
                key,
                quantity,
            })
        })
        .collect()
}

// =============================================================================
// Transfer Numbers
// =============================================================================

/// The per-day prefix shared by every transfer number issued on `date`.
pub fn transfer_number_day_prefix(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}-", prefix, date.format("%Y%m%d"))
}

/// Formats a transfer number: `PREFIX-YYYYMMDD-NNNN`.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use depot_core::transfer::format_transfer_number;
///
/// let date = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
/// assert_eq!(format_transfer_number("TRF", date, 7), "TRF-20260131-0007");
/// ```
pub fn format_transfer_number(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{}{:04}", transfer_number_day_prefix(prefix, date), sequence)
}

/// Extracts the daily sequence from a transfer number issued with `prefix`.
pub fn parse_transfer_sequence(prefix: &str, date: NaiveDate, number: &str) -> Option<u32> {
    number
        .strip_prefix(&transfer_number_day_prefix(prefix, date))
        .and_then(|seq| seq.parse().ok())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(product: &str, requested: i64, approved: Option<i64>) -> StockTransferItem {
        StockTransferItem {
            id: format!("item-{}", product),
            transfer_id: "t-1".to_string(),
            product_id: product.to_string(),
            variant_id: None,
            requested_quantity: requested,
            approved_quantity: approved,
            received_quantity: None,
        }
    }

    #[test]
    fn test_legal_transitions() {
        assert_eq!(
            TransferStatus::Pending.apply(TransferAction::Approve),
            Some(TransferStatus::InTransit)
        );
        assert_eq!(
            TransferStatus::Pending.apply(TransferAction::Cancel),
            Some(TransferStatus::Cancelled)
        );
        assert_eq!(
            TransferStatus::InTransit.apply(TransferAction::Receive),
            Some(TransferStatus::Received)
        );
    }

    #[test]
    fn test_illegal_transitions() {
        let actions = [
            TransferAction::Approve,
            TransferAction::Receive,
            TransferAction::Cancel,
        ];
        let statuses = [
            TransferStatus::Pending,
            TransferStatus::InTransit,
            TransferStatus::Received,
            TransferStatus::Cancelled,
        ];

        for status in statuses {
            for action in actions {
                let legal = status == action.required_status();
                assert_eq!(status.apply(action).is_some(), legal, "{status} {action:?}");
            }
        }

        let err = TransferStatus::InTransit
            .transition("t-9", TransferAction::Cancel)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState { .. }));
    }

    #[test]
    fn test_resolve_approved_defaults_to_requested() {
        let items = vec![item("p1", 10, None), item("p2", 4, None)];
        let resolved = resolve_approved(&items, None).unwrap();
        assert_eq!(resolved[0].quantity, 10);
        assert_eq!(resolved[1].quantity, 4);
    }

    #[test]
    fn test_resolve_approved_override() {
        let items = vec![item("p1", 10, None), item("p2", 4, None)];
        let overrides = vec![ItemQuantity::new("p1", 6)];
        let resolved = resolve_approved(&items, Some(overrides.as_slice())).unwrap();
        assert_eq!(resolved[0].quantity, 6);
        assert_eq!(resolved[1].quantity, 4);
    }

    #[test]
    fn test_resolve_approved_rejects_increase() {
        let items = vec![item("p1", 10, None)];
        let overrides = vec![ItemQuantity::new("p1", 11)];
        assert!(resolve_approved(&items, Some(overrides.as_slice())).is_err());
    }

    #[test]
    fn test_resolve_rejects_unknown_and_duplicate_overrides() {
        let items = vec![item("p1", 10, Some(10))];

        let unknown = vec![ItemQuantity::new("p9", 1)];
        assert!(resolve_received(&items, Some(unknown.as_slice())).is_err());

        let duplicate = vec![ItemQuantity::new("p1", 1), ItemQuantity::new("p1", 2)];
        assert!(resolve_received(&items, Some(duplicate.as_slice())).is_err());
    }

    #[test]
    fn test_resolve_received_fallbacks() {
        let items = vec![item("p1", 10, Some(7)), item("p2", 5, None)];
        let resolved = resolve_received(&items, None).unwrap();
        assert_eq!(resolved[0].quantity, 7);
        assert_eq!(resolved[1].quantity, 5);

        let partial = vec![ItemQuantity::new("p1", 8)];
        assert!(resolve_received(&items, Some(partial.as_slice())).is_err());
    }

    #[test]
    fn test_transfer_number_round_trip() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let number = format_transfer_number("TRF", date, 42);
        assert_eq!(number, "TRF-20260309-0042");
        assert_eq!(parse_transfer_sequence("TRF", date, &number), Some(42));
        assert_eq!(parse_transfer_sequence("XFR", date, &number), None);
    }

    proptest! {
        #[test]
        fn prop_resolved_quantities_never_grow(
            requested in 1i64..1000,
            approve_ratio in 0u32..=100,
            receive_ratio in 0u32..=100,
        ) {
            let approved = requested * approve_ratio as i64 / 100;
            let received = approved * receive_ratio as i64 / 100;

            let mut line = item("p1", requested, None);
            let approve_with = [ItemQuantity::new("p1", approved)];
            let approval = resolve_approved(std::slice::from_ref(&line), Some(&approve_with[..])).unwrap();
            prop_assert!(approval[0].quantity <= requested);

            line.approved_quantity = Some(approval[0].quantity);
            let receive_with = [ItemQuantity::new("p1", received)];
            let receipt = resolve_received(std::slice::from_ref(&line), Some(&receive_with[..])).unwrap();
            prop_assert!(receipt[0].quantity <= approval[0].quantity);
            prop_assert!(receipt[0].quantity >= 0);
        }
    }
}
