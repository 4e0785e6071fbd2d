//! # Transfer Repository
//!
//! Runs the transfer workflow against the database. The rules (legal
//! transitions, quantity resolution, numbering) live in
//! `depot_core::transfer`; this module applies them inside transactions.
//!
//! ## Transaction Per Transition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receive(transfer_id)                                                  │
//! │       │                                                                 │
//! │  BEGIN                                                                 │
//! │       ├── load header + items                                          │
//! │       ├── InTransit → Received?        else InvalidState               │
//! │       ├── resolve received quantities  else Validation                 │
//! │       ├── UPDATE status WHERE status = 'in_transit'                    │
//! │       ├── for each item with n > 0:                                    │
//! │       │     ledger: transfer −n at source   (may fail: Insufficient)   │
//! │       │     ledger: transfer +n at destination                         │
//! │       └── UPDATE items SET received_quantity                           │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Any `?` before COMMIT drops the transaction: nothing was received.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::{ensure_item_in_tx, location_in_tx};
use super::ledger::record_in_tx;
use crate::error::{DbError, DbResult};
use depot_core::transfer::{
    format_transfer_number, parse_transfer_sequence, resolve_approved, resolve_received,
    transfer_number_day_prefix, ResolvedQuantity, TransferAction,
};
use depot_core::validation::{validate_id, validate_new_transfer};
use depot_core::{
    ItemQuantity, MovementType, NewMovement, NewTransfer, Page, Pagination, ReferenceType,
    StockTransfer, StockTransferItem, TransferDetail, TransferFilter, TransferStatus,
    ValidationError,
};

const TRANSFER_COLUMNS: &str = "id, from_location_id, to_location_id, transfer_number, status, \
     requested_by, approved_by, received_by, cancelled_by, \
     request_date, approval_date, receive_date, cancel_date, notes";

const ITEM_COLUMNS: &str =
    "id, transfer_id, product_id, variant_id, requested_quantity, approved_quantity, received_quantity";

/// Shared WHERE clause for transfer listings. Parameters ?1..?7.
const TRANSFER_FILTER: &str = r#"
    (?1 IS NULL OR status = ?1)
    AND (?2 IS NULL OR from_location_id = ?2 OR to_location_id = ?2)
    AND (?3 IS NULL OR from_location_id = ?3)
    AND (?4 IS NULL OR to_location_id = ?4)
    AND (?5 IS NULL OR requested_by = ?5)
    AND (?6 IS NULL OR request_date >= ?6)
    AND (?7 IS NULL OR request_date < ?7)
"#;

/// Repository for stock transfers.
#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
    prefix: String,
}

impl TransferRepository {
    /// Creates a new TransferRepository issuing numbers with `prefix`.
    pub fn new(pool: SqlitePool, prefix: impl Into<String>) -> Self {
        TransferRepository {
            pool,
            prefix: prefix.into(),
        }
    }

    /// Creates a pending transfer. No stock moves.
    ///
    /// ## Errors
    /// - `Validation` - same source and destination, empty or duplicate
    ///   items, non-positive quantities, inactive location
    /// - `NotFound` - unknown location, product or variant
    pub async fn create(&self, request: &NewTransfer) -> DbResult<TransferDetail> {
        validate_new_transfer(request)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for location_id in [&request.from_location_id, &request.to_location_id] {
            let location = location_in_tx(&mut tx, location_id).await?;
            if !location.is_active {
                return Err(DbError::Validation(ValidationError::rule(
                    "location_id",
                    format!("location {} is inactive", location.code),
                )));
            }
        }

        for item in &request.items {
            ensure_item_in_tx(&mut tx, &item.product_id, item.variant_id.as_deref()).await?;
        }

        let transfer_number = next_transfer_number_in_tx(&mut tx, &self.prefix, now).await?;

        let transfer = StockTransfer {
            id: Uuid::new_v4().to_string(),
            from_location_id: request.from_location_id.clone(),
            to_location_id: request.to_location_id.clone(),
            transfer_number,
            status: TransferStatus::Pending,
            requested_by: request.requested_by.clone(),
            approved_by: None,
            received_by: None,
            cancelled_by: None,
            request_date: now,
            approval_date: None,
            receive_date: None,
            cancel_date: None,
            notes: request.notes.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO stock_transfers (
                id, from_location_id, to_location_id, transfer_number, status,
                requested_by, request_date, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.from_location_id)
        .bind(&transfer.to_location_id)
        .bind(&transfer.transfer_number)
        .bind(transfer.status)
        .bind(&transfer.requested_by)
        .bind(transfer.request_date)
        .bind(&transfer.notes)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let item = StockTransferItem {
                id: Uuid::new_v4().to_string(),
                transfer_id: transfer.id.clone(),
                product_id: line.product_id.clone(),
                variant_id: line.variant_id.clone(),
                requested_quantity: line.requested_quantity,
                approved_quantity: None,
                received_quantity: None,
            };

            sqlx::query(
                r#"
                INSERT INTO stock_transfer_items (
                    id, transfer_id, product_id, variant_id, requested_quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&item.id)
            .bind(&item.transfer_id)
            .bind(&item.product_id)
            .bind(&item.variant_id)
            .bind(item.requested_quantity)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        info!(
            id = %transfer.id,
            transfer_number = %transfer.transfer_number,
            from = %transfer.from_location_id,
            to = %transfer.to_location_id,
            items = items.len(),
            "Transfer created"
        );

        Ok(TransferDetail { transfer, items })
    }

    /// Approves a pending transfer, settling `approved_quantity` per item.
    ///
    /// Items without an override are approved in full. Availability at the
    /// source is not enforced here (stock can still arrive before shipping);
    /// a shortfall is logged and enforced at receive.
    pub async fn approve(
        &self,
        transfer_id: &str,
        approved_by: &str,
        overrides: Option<&[ItemQuantity]>,
    ) -> DbResult<TransferDetail> {
        validate_id("approved_by", approved_by)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let transfer = transfer_in_tx(&mut tx, transfer_id).await?;
        transfer.status.transition(transfer_id, TransferAction::Approve)?;

        let items = items_in_tx(&mut tx, transfer_id).await?;
        let approved = resolve_approved(&items, overrides)?;

        for line in &approved {
            warn_if_short(&mut tx, &transfer, line).await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE stock_transfers SET
                status = ?2,
                approved_by = ?3,
                approval_date = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(transfer_id)
        .bind(TransferStatus::InTransit)
        .bind(approved_by)
        .bind(now)
        .bind(TransferStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(stale_status_in_tx(&mut tx, transfer_id, TransferAction::Approve).await);
        }

        for line in &approved {
            sqlx::query("UPDATE stock_transfer_items SET approved_quantity = ?2 WHERE id = ?1")
                .bind(&line.item_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }

        let detail = detail_in_tx(&mut tx, transfer_id).await?;
        tx.commit().await?;

        info!(
            id = %transfer_id,
            transfer_number = %detail.transfer.transfer_number,
            approved_by,
            "Transfer approved"
        );

        Ok(detail)
    }

    /// Receives an in-transit transfer and moves the stock.
    ///
    /// All-or-nothing: if any item would take the source below zero (where
    /// the source forbids it), no item is received and the status stays
    /// `in_transit`.
    pub async fn receive(
        &self,
        transfer_id: &str,
        received_by: &str,
        overrides: Option<&[ItemQuantity]>,
    ) -> DbResult<TransferDetail> {
        validate_id("received_by", received_by)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let transfer = transfer_in_tx(&mut tx, transfer_id).await?;
        transfer.status.transition(transfer_id, TransferAction::Receive)?;

        let items = items_in_tx(&mut tx, transfer_id).await?;
        let received = resolve_received(&items, overrides)?;

        let updated = sqlx::query(
            r#"
            UPDATE stock_transfers SET
                status = ?2,
                received_by = ?3,
                receive_date = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(transfer_id)
        .bind(TransferStatus::Received)
        .bind(received_by)
        .bind(now)
        .bind(TransferStatus::InTransit)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(stale_status_in_tx(&mut tx, transfer_id, TransferAction::Receive).await);
        }

        for line in &received {
            if line.quantity > 0 {
                move_line_in_tx(&mut tx, &transfer, line, received_by, now).await?;
            }

            sqlx::query("UPDATE stock_transfer_items SET received_quantity = ?2 WHERE id = ?1")
                .bind(&line.item_id)
                .bind(line.quantity)
                .execute(&mut *tx)
                .await?;
        }

        let detail = detail_in_tx(&mut tx, transfer_id).await?;
        tx.commit().await?;

        info!(
            id = %transfer_id,
            transfer_number = %detail.transfer.transfer_number,
            received_by,
            units = received.iter().map(|l| l.quantity).sum::<i64>(),
            "Transfer received"
        );

        Ok(detail)
    }

    /// Cancels a pending transfer. No stock moves.
    pub async fn cancel(
        &self,
        transfer_id: &str,
        cancelled_by: Option<&str>,
    ) -> DbResult<TransferDetail> {
        if let Some(actor) = cancelled_by {
            validate_id("cancelled_by", actor)?;
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let transfer = transfer_in_tx(&mut tx, transfer_id).await?;
        transfer.status.transition(transfer_id, TransferAction::Cancel)?;

        let updated = sqlx::query(
            r#"
            UPDATE stock_transfers SET
                status = ?2,
                cancelled_by = ?3,
                cancel_date = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(transfer_id)
        .bind(TransferStatus::Cancelled)
        .bind(cancelled_by)
        .bind(now)
        .bind(TransferStatus::Pending)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(stale_status_in_tx(&mut tx, transfer_id, TransferAction::Cancel).await);
        }

        let detail = detail_in_tx(&mut tx, transfer_id).await?;
        tx.commit().await?;

        info!(id = %transfer_id, ?cancelled_by, "Transfer cancelled");
        Ok(detail)
    }

    /// Gets a transfer with its items.
    pub async fn get(&self, transfer_id: &str) -> DbResult<TransferDetail> {
        let mut conn = self.pool.acquire().await?;
        detail_in_tx(&mut conn, transfer_id).await
    }

    /// Gets the items of a transfer.
    pub async fn items(&self, transfer_id: &str) -> DbResult<Vec<StockTransferItem>> {
        let mut conn = self.pool.acquire().await?;
        transfer_in_tx(&mut conn, transfer_id).await?;
        items_in_tx(&mut conn, transfer_id).await
    }

    /// Lists transfer headers, newest request first.
    pub async fn list(
        &self,
        filter: &TransferFilter,
        pagination: Pagination,
    ) -> DbResult<Page<StockTransfer>> {
        let pagination = pagination.normalized();

        debug!(?filter, limit = pagination.limit, offset = pagination.offset, "Listing transfers");

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM stock_transfers WHERE {}",
            TRANSFER_FILTER
        ))
        .bind(filter.status)
        .bind(filter.location_id.as_deref())
        .bind(filter.from_location_id.as_deref())
        .bind(filter.to_location_id.as_deref())
        .bind(filter.requested_by.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, StockTransfer>(&format!(
            "SELECT {} FROM stock_transfers WHERE {} \
             ORDER BY request_date DESC, transfer_number DESC LIMIT ?8 OFFSET ?9",
            TRANSFER_COLUMNS, TRANSFER_FILTER
        ))
        .bind(filter.status)
        .bind(filter.location_id.as_deref())
        .bind(filter.from_location_id.as_deref())
        .bind(filter.to_location_id.as_deref())
        .bind(filter.requested_by.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn transfer_in_tx(conn: &mut SqliteConnection, transfer_id: &str) -> DbResult<StockTransfer> {
    sqlx::query_as::<_, StockTransfer>(&format!(
        "SELECT {} FROM stock_transfers WHERE id = ?1",
        TRANSFER_COLUMNS
    ))
    .bind(transfer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Transfer", transfer_id))
}

async fn items_in_tx(
    conn: &mut SqliteConnection,
    transfer_id: &str,
) -> DbResult<Vec<StockTransferItem>> {
    let items = sqlx::query_as::<_, StockTransferItem>(&format!(
        "SELECT {} FROM stock_transfer_items WHERE transfer_id = ?1 ORDER BY rowid",
        ITEM_COLUMNS
    ))
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn detail_in_tx(conn: &mut SqliteConnection, transfer_id: &str) -> DbResult<TransferDetail> {
    let transfer = transfer_in_tx(conn, transfer_id).await?;
    let items = items_in_tx(conn, transfer_id).await?;
    Ok(TransferDetail { transfer, items })
}

/// Builds the InvalidState error after a guarded status update matched
/// nothing, reporting the status that is actually stored.
async fn stale_status_in_tx(
    conn: &mut SqliteConnection,
    transfer_id: &str,
    action: TransferAction,
) -> DbError {
    match transfer_in_tx(conn, transfer_id).await {
        Ok(current) => {
            warn!(id = %transfer_id, status = %current.status, action = action.as_str(), "Stale transfer status");
            DbError::InvalidState {
                entity: "Transfer".to_string(),
                id: transfer_id.to_string(),
                current: current.status.to_string(),
                action: action.as_str().to_string(),
            }
        }
        Err(err) => err,
    }
}

/// Next `PREFIX-YYYYMMDD-NNNN` for the day of `now`.
///
/// Longer numbers sort first so the sequence keeps counting past 9999.
/// Runs inside the create transaction; the UNIQUE index on
/// `transfer_number` rejects a concurrent duplicate.
async fn next_transfer_number_in_tx(
    conn: &mut SqliteConnection,
    prefix: &str,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let date = now.date_naive();
    let day_prefix = transfer_number_day_prefix(prefix, date);

    let last: Option<String> = sqlx::query_scalar(
        r#"
        SELECT transfer_number FROM stock_transfers
        WHERE substr(transfer_number, 1, length(?1)) = ?1
        ORDER BY length(transfer_number) DESC, transfer_number DESC
        LIMIT 1
        "#,
    )
    .bind(&day_prefix)
    .fetch_optional(&mut *conn)
    .await?;

    let next = last
        .as_deref()
        .and_then(|number| parse_transfer_sequence(prefix, date, number))
        .unwrap_or(0)
        + 1;

    Ok(format_transfer_number(prefix, date, next))
}

/// Logs when the source holds less than what was just approved.
async fn warn_if_short(
    conn: &mut SqliteConnection,
    transfer: &StockTransfer,
    line: &ResolvedQuantity,
) -> DbResult<()> {
    let on_hand: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT quantity - reserved_quantity FROM location_stock
        WHERE location_id = ?1 AND product_id = ?2 AND variant_id IS ?3
        "#,
    )
    .bind(&transfer.from_location_id)
    .bind(&line.key.product_id)
    .bind(line.key.variant_id.as_deref())
    .fetch_optional(&mut *conn)
    .await?;

    let available = on_hand.unwrap_or(0);
    if available < line.quantity {
        warn!(
            transfer_number = %transfer.transfer_number,
            item = %line.key,
            available,
            approved = line.quantity,
            "Approved quantity exceeds available stock at source"
        );
    }

    Ok(())
}

/// Writes the matched pair of transfer movements for one line.
async fn move_line_in_tx(
    conn: &mut SqliteConnection,
    transfer: &StockTransfer,
    line: &ResolvedQuantity,
    actor_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let leg = |location_id: &str, quantity: i64| {
        NewMovement::new(line.key.product_id.clone(), MovementType::Transfer, quantity, actor_id)
            .for_variant(line.key.variant_id.clone())
            .at_location(location_id)
            .with_reference(ReferenceType::Transfer, transfer.id.clone())
            .with_notes(transfer.transfer_number.clone())
    };

    record_in_tx(conn, &leg(&transfer.from_location_id, -line.quantity), now).await?;
    record_in_tx(conn, &leg(&transfer.to_location_id, line.quantity), now).await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
