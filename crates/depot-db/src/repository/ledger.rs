//! # Ledger Repository
//!
//! Append-only stock movements and the only code path that changes
//! `location_stock.quantity`.
//!
//! ## Recording A Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  record_in_tx(conn, movement)                           │
//! │                                                                         │
//! │  1. validate shape, compute signed effect       (depot-core)           │
//! │  2. resolve location (default when absent)                             │
//! │  3. product / variant exist?                                           │
//! │  4. get_or_init registry row                                           │
//! │  5. quantity + effect < 0 and policy forbids?  → InsufficientStock     │
//! │  6. UPDATE location_stock (guarded)                                    │
//! │  7. INSERT stock_movements                                             │
//! │                                                                         │
//! │  All on the caller's transaction: any failure rolls back both halves.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reading
//! Movements are returned newest first (`created_at DESC`, insertion order
//! breaking ties). [`LedgerRepository::query`] returns one offset page with
//! a total; [`MovementPager`] walks the whole result lazily with a keyset
//! cursor, so rows appended while it runs never shift its pages.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::{ensure_item_in_tx, resolve_location_in_tx};
use super::stock::get_or_init_in_tx;
use crate::error::{DbError, DbResult};
use depot_core::validation::validate_new_movement;
use depot_core::{
    MovementFilter, MovementType, NewMovement, Page, Pagination, Reconciliation, ReferenceType,
    StockMovement, ValidationError,
};

const MOVEMENT_COLUMNS: &str = "id, product_id, variant_id, location_id, movement_type, quantity, \
     reference_type, reference_id, notes, actor_id, created_at";

/// Shared WHERE clause for movement filters. Parameters ?1..?8.
const MOVEMENT_FILTER: &str = r#"
    (?1 IS NULL OR product_id = ?1)
    AND (?2 IS NULL OR variant_id = ?2)
    AND (?3 IS NULL OR location_id = ?3)
    AND (?4 IS NULL OR movement_type = ?4)
    AND (?5 IS NULL OR reference_type = ?5)
    AND (?6 IS NULL OR reference_id = ?6)
    AND (?7 IS NULL OR created_at >= ?7)
    AND (?8 IS NULL OR created_at < ?8)
"#;

/// Binds a [`MovementFilter`] to parameters ?1..?8 of [`MOVEMENT_FILTER`].
macro_rules! bind_movement_filter {
    ($query:expr, $filter:expr) => {
        $query
            .bind($filter.product_id.as_deref())
            .bind($filter.variant_id.as_deref())
            .bind($filter.location_id.as_deref())
            .bind($filter.movement_type)
            .bind($filter.reference_type)
            .bind($filter.reference_id.as_deref())
            .bind($filter.from)
            .bind($filter.to)
    };
}

/// A committed movement plus the location's quantity after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReceipt {
    pub movement: StockMovement,
    pub balance: i64,
}

/// Repository for the stock ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records a movement and applies it to the registry atomically.
    ///
    /// `transfer` movements are rejected here: they only exist as matched
    /// pairs written by the transfer workflow.
    ///
    /// ## Errors
    /// - `Validation` - zero/negative magnitude, bad ids, no default location
    /// - `NotFound` - unknown location, product or variant
    /// - `InsufficientStock` - the location would go negative and forbids it
    pub async fn record_movement(&self, movement: &NewMovement) -> DbResult<StockMovement> {
        if movement.movement_type == MovementType::Transfer {
            return Err(DbError::Validation(ValidationError::rule(
                "movement_type",
                "transfer movements are recorded by the transfer workflow",
            )));
        }

        let mut tx = self.pool.begin().await?;
        let receipt = record_in_tx(&mut tx, movement, Utc::now()).await?;
        tx.commit().await?;

        Ok(receipt.movement)
    }

    /// Gets a movement by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockMovement>> {
        let movement = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE id = ?1",
            MOVEMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(movement)
    }

    /// Returns one page of movements matching `filter`, newest first.
    pub async fn query(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> DbResult<Page<StockMovement>> {
        let pagination = pagination.normalized();

        debug!(?filter, limit = pagination.limit, offset = pagination.offset, "Querying movements");

        let count_sql = format!("SELECT COUNT(*) FROM stock_movements WHERE {}", MOVEMENT_FILTER);
        let total: i64 = bind_movement_filter!(sqlx::query_scalar(&count_sql), filter)
            .fetch_one(&self.pool)
            .await?;

        let page_sql = format!(
            "SELECT {} FROM stock_movements WHERE {} \
             ORDER BY created_at DESC, rowid DESC LIMIT ?9 OFFSET ?10",
            MOVEMENT_COLUMNS, MOVEMENT_FILTER
        );
        let items = bind_movement_filter!(sqlx::query_as::<_, StockMovement>(&page_sql), filter)
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

    /// Returns a lazy, restartable walk over every matching movement.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut pager = db.ledger().pager(filter, 100);
    /// while let Some(batch) = pager.next_page().await? {
    ///     export(batch);
    /// }
    /// ```
    pub fn pager(&self, filter: MovementFilter, page_size: u32) -> MovementPager {
        MovementPager {
            pool: self.pool.clone(),
            filter,
            page_size: Pagination::new(page_size, 0).normalized().limit,
            cursor: None,
            exhausted: false,
        }
    }

    /// All movements written for one business reference, oldest first.
    pub async fn by_reference(
        &self,
        reference_type: ReferenceType,
        reference_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements \
             WHERE reference_type = ?1 AND reference_id = ?2 \
             ORDER BY created_at, rowid",
            MOVEMENT_COLUMNS
        ))
        .bind(reference_type)
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Compares the registry quantity with the ledger sum for one tuple.
    pub async fn reconcile(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<Reconciliation> {
        let registry: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity FROM location_stock
            WHERE location_id = ?1 AND product_id = ?2 AND variant_id IS ?3
            "#,
        )
        .bind(location_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        let ledger: i64 = sqlx::query_scalar(
            r#"
            SELECT IFNULL(SUM(quantity), 0) FROM stock_movements
            WHERE location_id = ?1 AND product_id = ?2 AND variant_id IS ?3
            "#,
        )
        .bind(location_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Reconciliation {
            location_id: location_id.to_string(),
            product_id: product_id.to_string(),
            variant_id: variant_id.map(str::to_string),
            registry_quantity: registry.unwrap_or(0),
            ledger_quantity: ledger,
        })
    }

    /// Reconciles every registry row. An empty result means nothing drifted.
    pub async fn unbalanced(&self) -> DbResult<Vec<Reconciliation>> {
        let rows = sqlx::query_as::<_, Reconciliation>(
            r#"
            SELECT
                ls.location_id,
                ls.product_id,
                ls.variant_id,
                ls.quantity AS registry_quantity,
                IFNULL((
                    SELECT SUM(m.quantity) FROM stock_movements m
                    WHERE m.location_id = ls.location_id
                      AND m.product_id = ls.product_id
                      AND m.variant_id IS ls.variant_id
                ), 0) AS ledger_quantity
            FROM location_stock ls
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let drifted: Vec<Reconciliation> = rows.into_iter().filter(|r| !r.is_balanced()).collect();
        if !drifted.is_empty() {
            warn!(count = drifted.len(), "Registry and ledger disagree");
        }

        Ok(drifted)
    }
}

// =============================================================================
// Movement Pager
// =============================================================================

#[derive(sqlx::FromRow)]
struct CursorRow {
    seq: i64,
    cursor_ts: String,
    #[sqlx(flatten)]
    movement: StockMovement,
}

/// Lazy, finite walk over the ledger, newest first.
///
/// Each call to [`MovementPager::next_page`] fetches one batch after the
/// last row seen. [`MovementPager::restart`] rewinds to the newest row.
#[derive(Debug, Clone)]
pub struct MovementPager {
    pool: SqlitePool,
    filter: MovementFilter,
    page_size: u32,
    /// (created_at text, rowid) of the last row returned.
    cursor: Option<(String, i64)>,
    exhausted: bool,
}

impl MovementPager {
    /// Fetches the next batch, or `None` once the walk is finished.
    pub async fn next_page(&mut self) -> DbResult<Option<Vec<StockMovement>>> {
        if self.exhausted {
            return Ok(None);
        }

        let (cursor_ts, cursor_seq) = match &self.cursor {
            Some((ts, seq)) => (Some(ts.clone()), Some(*seq)),
            None => (None, None),
        };

        let sql = format!(
            "SELECT rowid AS seq, created_at AS cursor_ts, {} FROM stock_movements WHERE {} \
             AND (?9 IS NULL OR created_at < ?9 OR (created_at = ?9 AND rowid < ?10)) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?11",
            MOVEMENT_COLUMNS, MOVEMENT_FILTER
        );

        let rows = bind_movement_filter!(sqlx::query_as::<_, CursorRow>(&sql), self.filter)
            .bind(cursor_ts)
            .bind(cursor_seq)
            .bind(self.page_size as i64)
            .fetch_all(&self.pool)
            .await?;

        if (rows.len() as u32) < self.page_size {
            self.exhausted = true;
        }

        let Some(last) = rows.last() else {
            return Ok(None);
        };
        self.cursor = Some((last.cursor_ts.clone(), last.seq));

        Ok(Some(rows.into_iter().map(|row| row.movement).collect()))
    }

    /// Rewinds to the newest movement.
    pub fn restart(&mut self) {
        self.cursor = None;
        self.exhausted = false;
    }

    /// Drains the remaining pages into one vector.
    pub async fn collect_remaining(&mut self) -> DbResult<Vec<StockMovement>> {
        let mut all = Vec::new();
        while let Some(batch) = self.next_page().await? {
            all.extend(batch);
        }
        Ok(all)
    }
}

// =============================================================================
// Transaction Building Block
// =============================================================================

/// Writes one movement and its registry effect on an open transaction.
///
/// The caller owns the transaction: nothing is visible until it commits,
/// and dropping it undoes both the movement and the quantity change.
pub(crate) async fn record_in_tx(
    conn: &mut SqliteConnection,
    input: &NewMovement,
    now: DateTime<Utc>,
) -> DbResult<MovementReceipt> {
    let effect = validate_new_movement(input)?;
    let variant_id = input.variant_id.as_deref();

    let location = resolve_location_in_tx(conn, input.location_id.as_deref()).await?;
    ensure_item_in_tx(conn, &input.product_id, variant_id).await?;

    let current = get_or_init_in_tx(conn, &location.id, &input.product_id, variant_id, now).await?;
    let balance = current.quantity + effect;

    // Increases are always accepted, even into a location that is already
    // negative from before its policy changed.
    if effect < 0 && balance < 0 && !location.allow_negative_stock {
        warn!(
            location_id = %location.id,
            product_id = %input.product_id,
            on_hand = current.quantity,
            effect,
            "Movement rejected: insufficient stock"
        );
        return Err(DbError::InsufficientStock {
            location_id: location.id,
            product_id: input.product_id.clone(),
            variant_id: input.variant_id.clone(),
            available: current.quantity,
            requested: -effect,
        });
    }

    let updated = sqlx::query(
        r#"
        UPDATE location_stock SET
            quantity = quantity + ?1,
            last_updated = ?2
        WHERE location_id = ?3 AND product_id = ?4 AND variant_id IS ?5
          AND (?6 OR ?1 > 0 OR quantity + ?1 >= 0)
        "#,
    )
    .bind(effect)
    .bind(now)
    .bind(&location.id)
    .bind(&input.product_id)
    .bind(variant_id)
    .bind(location.allow_negative_stock)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(DbError::ConcurrencyConflict(format!(
            "stock for {} at {} changed during the movement",
            input.product_id, location.id
        )));
    }

    let (reference_type, reference_id) = match &input.reference {
        Some(reference) => (Some(reference.reference_type), reference.reference_id.clone()),
        None => (None, None),
    };

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        product_id: input.product_id.clone(),
        variant_id: input.variant_id.clone(),
        location_id: Some(location.id.clone()),
        movement_type: input.movement_type,
        quantity: effect,
        reference_type,
        reference_id,
        notes: input.notes.clone(),
        actor_id: input.actor_id.clone(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, variant_id, location_id, movement_type, quantity,
            reference_type, reference_id, notes, actor_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(&movement.variant_id)
    .bind(&movement.location_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(movement.reference_type)
    .bind(&movement.reference_id)
    .bind(&movement.notes)
    .bind(&movement.actor_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    info!(
        id = %movement.id,
        movement_type = %movement.movement_type,
        location_id = %location.id,
        product_id = %movement.product_id,
        quantity = movement.quantity,
        balance,
        "Movement recorded"
    );

    Ok(MovementReceipt { movement, balance })
}

// =============================================================================
// Unit Tests
// =============================================================================
