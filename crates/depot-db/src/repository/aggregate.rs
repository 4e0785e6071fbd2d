//! # Aggregate Repository
//!
//! Cross-location totals derived from `location_stock` on every read.
//! There is no product-level counter to drift out of sync.

use sqlx::SqlitePool;
use tracing::debug;

use super::catalog::ensure_item_in_tx;
use crate::error::{DbError, DbResult};
use depot_core::{AggregateFilter, AggregateStock, LocationQuantity, Page, Pagination};

/// Repository for aggregate stock projections.
#[derive(Debug, Clone)]
pub struct AggregateRepository {
    pool: SqlitePool,
}

impl AggregateRepository {
    /// Creates a new AggregateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AggregateRepository { pool }
    }

    /// Total for one product/variant across every location.
    ///
    /// `variant_id = None` means the product-level row only; use
    /// [`AggregateRepository::product_total_all_variants`] to fold variants in.
    pub async fn product_total(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<AggregateStock> {
        self.ensure_item(product_id, variant_id).await?;

        let (quantity, reserved_quantity, location_count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                IFNULL(SUM(quantity), 0),
                IFNULL(SUM(reserved_quantity), 0),
                COUNT(*)
            FROM location_stock
            WHERE product_id = ?1 AND variant_id IS ?2
            "#,
        )
        .bind(product_id)
        .bind(variant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(AggregateStock {
            product_id: product_id.to_string(),
            variant_id: variant_id.map(str::to_string),
            quantity,
            reserved_quantity,
            location_count,
        })
    }

    /// Total for a product including all of its variants.
    pub async fn product_total_all_variants(&self, product_id: &str) -> DbResult<AggregateStock> {
        self.ensure_item(product_id, None).await?;

        let (quantity, reserved_quantity, location_count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                IFNULL(SUM(quantity), 0),
                IFNULL(SUM(reserved_quantity), 0),
                COUNT(DISTINCT location_id)
            FROM location_stock
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(AggregateStock {
            product_id: product_id.to_string(),
            variant_id: None,
            quantity,
            reserved_quantity,
            location_count,
        })
    }

    /// Quantity of one product/variant at one location (0 if never touched).
    pub async fn location_total(
        &self,
        location_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<i64> {
        let quantity: Option<i64> = sqlx::query_scalar(
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

        Ok(quantity.unwrap_or(0))
    }

    /// Per-location split of a product/variant, by location code.
    pub async fn breakdown(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
    ) -> DbResult<Vec<LocationQuantity>> {
        self.ensure_item(product_id, variant_id).await?;

        let rows = sqlx::query_as::<_, LocationQuantity>(
            r#"
            SELECT
                ls.location_id,
                l.name AS location_name,
                ls.quantity,
                ls.reserved_quantity
            FROM location_stock ls
            JOIN locations l ON l.id = ls.location_id
            WHERE ls.product_id = ?1 AND ls.variant_id IS ?2
            ORDER BY l.code
            "#,
        )
        .bind(product_id)
        .bind(variant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Totals per product/variant, ordered by product then variant.
    pub async fn totals(
        &self,
        filter: &AggregateFilter,
        pagination: Pagination,
    ) -> DbResult<Page<AggregateStock>> {
        let pagination = pagination.normalized();

        debug!(?filter, limit = pagination.limit, "Projecting aggregate totals");

        const GROUPED: &str = r#"
            SELECT
                product_id,
                variant_id,
                SUM(quantity) AS quantity,
                SUM(reserved_quantity) AS reserved_quantity,
                COUNT(*) AS location_count
            FROM location_stock
            WHERE (?1 IS NULL OR product_id = ?1)
              AND (?2 IS NULL OR location_id = ?2)
            GROUP BY product_id, variant_id
            HAVING (?3 = 0 OR SUM(quantity) <> 0)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM ({})", GROUPED))
            .bind(filter.product_id.as_deref())
            .bind(filter.location_id.as_deref())
            .bind(filter.non_zero_only)
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, AggregateStock>(&format!(
            "{} ORDER BY product_id, IFNULL(variant_id, '') LIMIT ?4 OFFSET ?5",
            GROUPED
        ))
        .bind(filter.product_id.as_deref())
        .bind(filter.location_id.as_deref())
        .bind(filter.non_zero_only)
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

    async fn ensure_item(&self, product_id: &str, variant_id: Option<&str>) -> DbResult<()> {
        let mut conn = self.pool.acquire().await.map_err(DbError::from)?;
        ensure_item_in_tx(&mut conn, product_id, variant_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use depot_core::{AggregateFilter, NewLocation, NewProduct, NewVariant, Pagination};

    #[tokio::test]
    async fn test_totals_sum_across_locations() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let a = catalog.create_location(&NewLocation::new("A", "Store A")).await.unwrap();
        let b = catalog.create_location(&NewLocation::new("B", "Store B")).await.unwrap();
        let product = catalog
            .create_product(&NewProduct {
                sku: "JEANS".to_string(),
                name: "Jeans".to_string(),
            })
            .await
            .unwrap();
        let variant = catalog
            .create_variant(&NewVariant {
                product_id: product.id.clone(),
                sku: "JEANS-32".to_string(),
                name: "32".to_string(),
            })
            .await
            .unwrap();

        let stock = db.stock();
        stock.adjust(&a.id, &product.id, None, 10, "u", None).await.unwrap();
        stock.adjust(&b.id, &product.id, None, 5, "u", None).await.unwrap();
        stock.adjust(&b.id, &product.id, Some(variant.id.as_str()), 3, "u", None).await.unwrap();
        stock.reserve(&a.id, &product.id, None, 2).await.unwrap();

        let aggregates = db.aggregates();

        let total = aggregates.product_total(&product.id, None).await.unwrap();
        assert_eq!(total.quantity, 15);
        assert_eq!(total.reserved_quantity, 2);
        assert_eq!(total.available(), 13);
        assert_eq!(total.location_count, 2);

        let all = aggregates.product_total_all_variants(&product.id).await.unwrap();
        assert_eq!(all.quantity, 18);
        assert_eq!(all.location_count, 2);

        assert_eq!(aggregates.location_total(&b.id, &product.id, None).await.unwrap(), 5);
        assert_eq!(aggregates.location_total(&a.id, &product.id, Some(variant.id.as_str())).await.unwrap(), 0);

        let split = aggregates.breakdown(&product.id, None).await.unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].location_name, "Store A");
        assert_eq!(split[0].quantity, 10);

        let page = aggregates
            .totals(&AggregateFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].variant_id, None);
        assert_eq!(page.items[1].quantity, 3);

        let only_b = AggregateFilter {
            location_id: Some(b.id.clone()),
            ..Default::default()
        };
        let page = aggregates.totals(&only_b, Pagination::default()).await.unwrap();
        assert_eq!(page.items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.aggregates().product_total("ghost", None).await.is_err());
    }
}
