//! # Catalog Repository
//!
//! Locations, products and variants: the collaborators the ledger checks
//! against before it moves anything.
//!
//! ## What The Ledger Needs From Here
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_movement(product, variant?, location?, ...)                    │
//! │       │                                                                 │
//! │       ├── location? ── None ──► default location (is_default = 1)      │
//! │       │                 Some ──► location by id                        │
//! │       │                          └── allow_negative_stock policy       │
//! │       │                                                                 │
//! │       └── product exists?  variant exists AND belongs to product?      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use depot_core::validation::{validate_new_location, validate_new_product, validate_new_variant};
use depot_core::{Location, NewLocation, NewProduct, NewVariant, Product, ProductVariant, ValidationError};

const LOCATION_COLUMNS: &str =
    "id, code, name, allow_negative_stock, is_default, is_active, created_at";

/// Repository for the location directory and the product catalog.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Locations
    // =========================================================================

    /// Registers a location.
    ///
    /// A new default location takes the flag from the previous one.
    pub async fn create_location(&self, input: &NewLocation) -> DbResult<Location> {
        validate_new_location(input)?;

        let location = Location {
            id: Uuid::new_v4().to_string(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            allow_negative_stock: input.allow_negative_stock,
            is_default: input.is_default,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %location.id, code = %location.code, "Creating location");

        let mut tx = self.pool.begin().await?;

        if location.is_default {
            sqlx::query("UPDATE locations SET is_default = 0 WHERE is_default = 1")
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO locations (
                id, code, name, allow_negative_stock, is_default, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(location.allow_negative_stock)
        .bind(location.is_default)
        .bind(location.is_active)
        .bind(location.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &location.code),
            other => other,
        })?;

        tx.commit().await?;

        info!(id = %location.id, code = %location.code, "Location created");
        Ok(location)
    }

    /// Gets a location by ID.
    pub async fn get_location(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(&format!(
            "SELECT {} FROM locations WHERE id = ?1",
            LOCATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    /// Gets the location that receives movements recorded without one.
    pub async fn get_default_location(&self) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>(&format!(
            "SELECT {} FROM locations WHERE is_default = 1 LIMIT 1",
            LOCATION_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    /// Lists locations ordered by code.
    pub async fn list_locations(&self, include_inactive: bool) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(&format!(
            "SELECT {} FROM locations WHERE (?1 OR is_active = 1) ORDER BY code",
            LOCATION_COLUMNS
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    /// Changes whether a location may hold negative stock.
    pub async fn set_allow_negative_stock(&self, id: &str, allow: bool) -> DbResult<Location> {
        let result = sqlx::query("UPDATE locations SET allow_negative_stock = ?2 WHERE id = ?1")
            .bind(id)
            .bind(allow)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        info!(id = %id, allow, "Negative stock policy changed");

        self.get_location(id)
            .await?
            .ok_or_else(|| DbError::not_found("Location", id))
    }

    /// Activates or deactivates a location. Inactive locations cannot take
    /// part in new transfers.
    pub async fn set_location_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE locations SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        Ok(())
    }

    // =========================================================================
    // Products & Variants
    // =========================================================================

    /// Registers a product.
    pub async fn create_product(&self, input: &NewProduct) -> DbResult<Product> {
        validate_new_product(input)?;

        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %product.id, sku = %product.sku, "Creating product");

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("sku", &product.sku),
            other => other,
        })?;

        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, sku, name, is_active, created_at FROM products WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Counts products (used by the seed tool).
    pub async fn count_products(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Registers a variant under an existing product.
    pub async fn create_variant(&self, input: &NewVariant) -> DbResult<ProductVariant> {
        validate_new_variant(input)?;

        if self.get_product(&input.product_id).await?.is_none() {
            return Err(DbError::not_found("Product", &input.product_id));
        }

        let variant = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: input.product_id.clone(),
            sku: input.sku.trim().to_string(),
            name: input.name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, sku, name, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("sku", &variant.sku),
            other => other,
        })?;

        Ok(variant)
    }

    /// Lists the variants of a product.
    pub async fn list_variants(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let variants = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, sku, name, is_active, created_at
            FROM product_variants
            WHERE product_id = ?1
            ORDER BY sku
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================
// These run on an open transaction's connection so callers can check
// existence and write in one atomic unit.

/// Loads a location or fails with NotFound.
pub(crate) async fn location_in_tx(conn: &mut SqliteConnection, id: &str) -> DbResult<Location> {
    sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE id = ?1",
        LOCATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Location", id))
}

/// Resolves an optional location id, falling back to the default location.
pub(crate) async fn resolve_location_in_tx(
    conn: &mut SqliteConnection,
    id: Option<&str>,
) -> DbResult<Location> {
    if let Some(id) = id {
        return location_in_tx(conn, id).await;
    }

    sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE is_default = 1 LIMIT 1",
        LOCATION_COLUMNS
    ))
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| {
        DbError::Validation(ValidationError::rule(
            "location_id",
            "no location given and no default location is configured",
        ))
    })
}

/// Checks that the product exists and, when given, that the variant
/// belongs to it.
pub(crate) async fn ensure_item_in_tx(
    conn: &mut SqliteConnection,
    product_id: &str,
    variant_id: Option<&str>,
) -> DbResult<()> {
    let product: Option<String> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    if product.is_none() {
        return Err(DbError::not_found("Product", product_id));
    }

    if let Some(variant_id) = variant_id {
        let variant: Option<String> = sqlx::query_scalar(
            "SELECT id FROM product_variants WHERE id = ?1 AND product_id = ?2",
        )
        .bind(variant_id)
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        if variant.is_none() {
            return Err(DbError::not_found("ProductVariant", variant_id));
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
