//! # Stock Repository
//!
//! The per-location quantity registry.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (location, product, variant?)                                         │
//! │       │                                                                 │
//! │       ├── first touch ──► INSERT OR IGNORE zero row                    │
//! │       │                                                                 │
//! │       ├── quantity        ◄── ledger only (adjust writes a movement)   │
//! │       ├── reserved        ◄── reserve / release                        │
//! │       └── min / max       ◄── set_thresholds                           │
//! │                                                                         │
//! │  Rows are never deleted, only zeroed.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::catalog::{ensure_item_in_tx, location_in_tx};
use super::ledger::record_in_tx;
use super::like_pattern;
use crate::error::{DbError, DbResult};
use depot_core::validation::{validate_delta, validate_id, validate_positive_quantity, validate_thresholds};
use depot_core::{
    LocationStock, LocationStockListing, MovementType, NewMovement, Page, Pagination,
    ReferenceType, StockListFilter, ValidationError,
};

const STOCK_COLUMNS: &str = "location_id, product_id, variant_id, quantity, reserved_quantity, \
     min_stock, max_stock, last_updated";

/// Shared FROM/WHERE for listings. Parameters ?1..?5.
const LISTING_FROM: &str = r#"
    FROM location_stock ls
    JOIN products p ON p.id = ls.product_id
    LEFT JOIN product_variants v ON v.id = ls.variant_id
    WHERE ls.location_id = ?1
      AND (?2 IS NULL OR ls.product_id = ?2)
      AND (?3 IS NULL
           OR p.sku LIKE ?3 ESCAPE '\' OR p.name LIKE ?3 ESCAPE '\'
           OR v.sku LIKE ?3 ESCAPE '\' OR v.name LIKE ?3 ESCAPE '\')
      AND (?4 = 0 OR ls.quantity <= ls.min_stock)
      AND (?5 = 0 OR ls.quantity <> 0)
"#;

/// Repository for the location stock registry.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Returns the registry row, materializing a zero row if absent.
    ///
    /// Idempotent. Fails with NotFound for an unknown location, product or
    /// variant.
    pub async fn get_or_init(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<LocationStock> {
        let mut tx = self.pool.begin().await?;

        location_in_tx(&mut tx, location_id).await?;
        ensure_item_in_tx(&mut tx, product_id, variant_id).await?;
        let stock = get_or_init_in_tx(&mut tx, location_id, product_id, variant_id, Utc::now()).await?;

        tx.commit().await?;
        Ok(stock)
    }

    /// Returns the registry row without creating it.
    pub async fn get(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<Option<LocationStock>> {
        let stock = sqlx::query_as::<_, LocationStock>(&format!(
            "SELECT {} FROM location_stock \
             WHERE location_id = ?1 AND product_id = ?2 AND variant_id IS ?3",
            STOCK_COLUMNS
        ))
        .bind(location_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    /// Applies a signed correction and returns the new quantity.
    ///
    /// Goes through the ledger as an `adjustment` movement, so the registry
    /// and the audit trail never diverge.
    ///
    /// ## Errors
    /// - `Validation` - zero delta, bad ids
    /// - `NotFound` - unknown location, product or variant
    /// - `InsufficientStock` - negative result where the location forbids it
    pub async fn adjust(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        delta: i64,
        actor_id: &str,
        notes: Option<&str>,
    ) -> DbResult<i64> {
        validate_id("location_id", location_id)?;
        validate_delta(delta)?;

        debug!(location_id, product_id, delta, "Adjusting stock");

        let mut movement = NewMovement::new(product_id, MovementType::Adjustment, delta, actor_id)
            .at_location(location_id)
            .for_variant(variant_id.map(str::to_string));
        movement.reference = Some(depot_core::MovementReference {
            reference_type: ReferenceType::Adjustment,
            reference_id: None,
        });
        movement.notes = notes.map(str::to_string);

        let mut tx = self.pool.begin().await?;
        let receipt = record_in_tx(&mut tx, &movement, Utc::now()).await?;
        tx.commit().await?;

        Ok(receipt.balance)
    }

    /// Lists a location's stock joined with catalog names.
    pub async fn list(
        &self,
        location_id: &str,
        filter: &StockListFilter,
        pagination: Pagination,
    ) -> DbResult<Page<LocationStockListing>> {
        let pagination = pagination.normalized();

        let mut conn = self.pool.acquire().await?;
        location_in_tx(&mut conn, location_id).await?;

        let search = filter
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let count_sql = format!("SELECT COUNT(*) {}", LISTING_FROM);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(location_id)
            .bind(filter.product_id.as_deref())
            .bind(search.as_deref())
            .bind(filter.low_stock_only)
            .bind(filter.non_zero_only)
            .fetch_one(&mut *conn)
            .await?;

        let page_sql = format!(
            r#"
            SELECT
                ls.location_id, ls.product_id, ls.variant_id,
                p.sku, p.name AS product_name,
                v.sku AS variant_sku, v.name AS variant_name,
                ls.quantity, ls.reserved_quantity, ls.min_stock, ls.max_stock,
                ls.last_updated
            {}
            ORDER BY p.sku, v.sku
            LIMIT ?6 OFFSET ?7
            "#,
            LISTING_FROM
        );
        let items = sqlx::query_as::<_, LocationStockListing>(&page_sql)
            .bind(location_id)
            .bind(filter.product_id.as_deref())
            .bind(search.as_deref())
            .bind(filter.low_stock_only)
            .bind(filter.non_zero_only)
            .bind(pagination.limit as i64)
            .bind(pagination.offset as i64)
            .fetch_all(&mut *conn)
            .await?;

        Ok(Page {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        })
    }

    /// Rows at or below their reorder threshold.
    pub async fn low_stock(&self, location_id: &str) -> DbResult<Vec<LocationStock>> {
        let rows = sqlx::query_as::<_, LocationStock>(&format!(
            "SELECT {} FROM location_stock \
             WHERE location_id = ?1 AND quantity <= min_stock \
             ORDER BY quantity - min_stock, product_id",
            STOCK_COLUMNS
        ))
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sets reorder thresholds, creating the row if needed.
    pub async fn set_thresholds(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        min_stock: i64,
        max_stock: Option<i64>,
    ) -> DbResult<LocationStock> {
        validate_thresholds(min_stock, max_stock)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        location_in_tx(&mut tx, location_id).await?;
        ensure_item_in_tx(&mut tx, product_id, variant_id).await?;
        get_or_init_in_tx(&mut tx, location_id, product_id, variant_id, now).await?;

        sqlx::query(
            r#"
            UPDATE location_stock SET min_stock = ?4, max_stock = ?5, last_updated = ?6
            WHERE location_id = ?1 AND product_id = ?2 AND variant_id IS ?3
            "#,
        )
        .bind(location_id)
        .bind(product_id)
        .bind(variant_id)
        .bind(min_stock)
        .bind(max_stock)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let stock = fetch_in_tx(&mut tx, location_id, product_id, variant_id).await?;
        tx.commit().await?;

        info!(location_id, product_id, min_stock, ?max_stock, "Thresholds updated");
        Ok(stock)
    }

    /// Holds `quantity` units for a pending order.
    ///
    /// Reservations never exceed on-hand stock unless the location allows
    /// negative stock.
    pub async fn reserve(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> DbResult<LocationStock> {
        validate_positive_quantity("quantity", quantity)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let location = location_in_tx(&mut tx, location_id).await?;
        ensure_item_in_tx(&mut tx, product_id, variant_id).await?;
        let stock = get_or_init_in_tx(&mut tx, location_id, product_id, variant_id, now).await?;

        if !location.allow_negative_stock && stock.available() < quantity {
            warn!(location_id, product_id, available = stock.available(), quantity, "Reservation rejected");
            return Err(DbError::InsufficientStock {
                location_id: location_id.to_string(),
                product_id: product_id.to_string(),
                variant_id: variant_id.map(str::to_string),
                available: stock.available(),
                requested: quantity,
            });
        }

        let stock = shift_reserved_in_tx(&mut tx, &stock, quantity, now).await?;
        tx.commit().await?;

        debug!(location_id, product_id, reserved = stock.reserved_quantity, "Stock reserved");
        Ok(stock)
    }

    /// Returns previously reserved units to available stock.
    pub async fn release(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> DbResult<LocationStock> {
        validate_positive_quantity("quantity", quantity)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let stock = fetch_in_tx(&mut tx, location_id, product_id, variant_id)
            .await
            .map_err(|e| match e {
                DbError::NotFound { .. } => DbError::not_found("LocationStock", location_id),
                other => other,
            })?;

        if quantity > stock.reserved_quantity {
            return Err(DbError::Validation(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: stock.reserved_quantity,
            }));
        }

        let stock = shift_reserved_in_tx(&mut tx, &stock, -quantity, now).await?;
        tx.commit().await?;

        debug!(location_id, product_id, reserved = stock.reserved_quantity, "Reservation released");
        Ok(stock)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Materializes the registry row inside an open transaction.
///
/// Callers are responsible for having checked that the location and item
/// exist; the foreign keys catch anything they miss.
pub(crate) async fn get_or_init_in_tx(
    conn: &mut SqliteConnection,
    location_id: &str,
    product_id: &str,
    variant_id: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<LocationStock> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO location_stock (
            location_id, product_id, variant_id,
            quantity, reserved_quantity, min_stock, max_stock, last_updated
        ) VALUES (?1, ?2, ?3, 0, 0, 0, NULL, ?4)
        "#,
    )
    .bind(location_id)
    .bind(product_id)
    .bind(variant_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    fetch_in_tx(conn, location_id, product_id, variant_id).await
}

async fn fetch_in_tx(
    conn: &mut SqliteConnection,
    location_id: &str,
    product_id: &str,
    variant_id: Option<&str>,
) -> DbResult<LocationStock> {
    sqlx::query_as::<_, LocationStock>(&format!(
        "SELECT {} FROM location_stock \
         WHERE location_id = ?1 AND product_id = ?2 AND variant_id IS ?3",
        STOCK_COLUMNS
    ))
    .bind(location_id)
    .bind(product_id)
    .bind(variant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("LocationStock", format!("{}/{}", location_id, product_id)))
}

async fn shift_reserved_in_tx(
    conn: &mut SqliteConnection,
    stock: &LocationStock,
    delta: i64,
    now: DateTime<Utc>,
) -> DbResult<LocationStock> {
    sqlx::query(
        r#"
        UPDATE location_stock SET
            reserved_quantity = reserved_quantity + ?4,
            last_updated = ?5
        WHERE location_id = ?1 AND product_id = ?2 AND variant_id IS ?3
        "#,
    )
    .bind(&stock.location_id)
    .bind(&stock.product_id)
    .bind(&stock.variant_id)
    .bind(delta)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    fetch_in_tx(
        conn,
        &stock.location_id,
        &stock.product_id,
        stock.variant_id.as_deref(),
    )
    .await
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use depot_core::{NewLocation, NewProduct, NewVariant};

    struct Fixture {
        db: Database,
        location: String,
        product: String,
        variant: String,
    }

    async fn setup() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let location = catalog
            .create_location(&NewLocation::new("WH-01", "Warehouse"))
            .await
            .unwrap();
        let product = catalog
            .create_product(&NewProduct {
                sku: "TEE".to_string(),
                name: "Plain Tee".to_string(),
            })
            .await
            .unwrap();
        let variant = catalog
            .create_variant(&NewVariant {
                product_id: product.id.clone(),
                sku: "TEE-L".to_string(),
                name: "Large".to_string(),
            })
            .await
            .unwrap();

        Fixture {
            db,
            location: location.id,
            product: product.id,
            variant: variant.id,
        }
    }

    #[tokio::test]
    async fn test_get_or_init_is_idempotent() {
        let f = setup().await;
        let stock = f.db.stock();

        let first = stock.get_or_init(&f.location, &f.product, None).await.unwrap();
        let second = stock.get_or_init(&f.location, &f.product, None).await.unwrap();

        assert_eq!(first.quantity, 0);
        assert_eq!(first.location_id, second.location_id);

        let variant = stock
            .get_or_init(&f.location, &f.product, Some(f.variant.as_str()))
            .await
            .unwrap();
        assert_eq!(variant.variant_id.as_deref(), Some(f.variant.as_str()));
    }

    #[tokio::test]
    async fn test_get_or_init_unknown_location() {
        let f = setup().await;
        let err = f.db.stock().get_or_init("nowhere", &f.product, None).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_adjust_writes_adjustment_movement() {
        let f = setup().await;

        let balance = f
            .db
            .stock()
            .adjust(&f.location, &f.product, None, 12, "user-1", Some("cycle count"))
            .await
            .unwrap();
        assert_eq!(balance, 12);

        let movements = f
            .db
            .ledger()
            .query(&Default::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(movements.total, 1);
        assert_eq!(movements.items[0].movement_type, MovementType::Adjustment);
        assert_eq!(movements.items[0].notes.as_deref(), Some("cycle count"));
    }

    #[tokio::test]
    async fn test_negative_guard_follows_location_policy() {
        let f = setup().await;
        let stock = f.db.stock();

        let err = stock
            .adjust(&f.location, &f.product, None, -1, "u", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { .. }));

        f.db.catalog().set_allow_negative_stock(&f.location, true).await.unwrap();
        let balance = stock
            .adjust(&f.location, &f.product, None, -1, "u", None)
            .await
            .unwrap();
        assert_eq!(balance, -1);

        // Turning the policy back off still lets stock flow in.
        f.db.catalog().set_allow_negative_stock(&f.location, false).await.unwrap();
        let balance = stock
            .adjust(&f.location, &f.product, None, 3, "u", None)
            .await
            .unwrap();
        assert_eq!(balance, 2);
    }

    #[tokio::test]
    async fn test_extreme_delta_is_validation_error() {
        let f = setup().await;

        let err = f
            .db
            .stock()
            .adjust(&f.location, &f.product, None, i64::MIN, "u", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::OutOfRange { .. })));

        let err = f
            .db
            .ledger()
            .record_movement(
                &NewMovement::new(&f.product, MovementType::Adjustment, i64::MIN, "u")
                    .at_location(&f.location),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(ValidationError::OutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let f = setup().await;
        let stock = f.db.stock();

        stock.adjust(&f.location, &f.product, None, 5, "u", None).await.unwrap();

        let row = stock.reserve(&f.location, &f.product, None, 3).await.unwrap();
        assert_eq!(row.reserved_quantity, 3);
        assert_eq!(row.available(), 2);

        let err = stock.reserve(&f.location, &f.product, None, 3).await.unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { available: 2, .. }));

        let err = stock.release(&f.location, &f.product, None, 4).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let row = stock.release(&f.location, &f.product, None, 3).await.unwrap();
        assert_eq!(row.reserved_quantity, 0);
        assert_eq!(row.quantity, 5);
    }

    #[tokio::test]
    async fn test_thresholds_and_low_stock() {
        let f = setup().await;
        let stock = f.db.stock();

        let err = stock
            .set_thresholds(&f.location, &f.product, None, 10, Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        stock
            .set_thresholds(&f.location, &f.product, None, 10, Some(50))
            .await
            .unwrap();
        stock.adjust(&f.location, &f.product, None, 4, "u", None).await.unwrap();

        let low = stock.low_stock(&f.location).await.unwrap();
        assert_eq!(low.len(), 1);
        assert!(low[0].is_low_stock());
    }

    #[tokio::test]
    async fn test_list_joins_catalog_and_filters() {
        let f = setup().await;
        let stock = f.db.stock();

        stock.adjust(&f.location, &f.product, None, 7, "u", None).await.unwrap();
        stock.get_or_init(&f.location, &f.product, Some(f.variant.as_str())).await.unwrap();

        let all = stock
            .list(&f.location, &StockListFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].product_name, "Plain Tee");

        let non_zero = StockListFilter {
            non_zero_only: true,
            ..Default::default()
        };
        let page = stock.list(&f.location, &non_zero, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].quantity, 7);

        let search = StockListFilter {
            search: Some("large".to_string()),
            ..Default::default()
        };
        let page = stock.list(&f.location, &search, Pagination::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].variant_name.as_deref(), Some("Large"));
    }
}
