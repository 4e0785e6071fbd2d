//! # Seed Data Generator
//!
//! Populates the database with locations, products and opening stock for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p depot-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p depot-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p depot-db --bin seed -- --db ./data/depot.db
//! ```
//!
//! ## Generated Data
//! - Three locations: a default warehouse and two stores
//! - Products across categories, apparel with size variants
//! - Opening stock recorded as `in` movements at the warehouse, so the
//!   ledger reconciles from the first run
//! - One pending transfer per store

use std::env;

use depot_core::{
    MovementType, NewLocation, NewMovement, NewProduct, NewTransfer, NewTransferItem, NewVariant,
    ReferenceType,
};
use depot_db::{Database, DbConfig};

const SEED_ACTOR: &str = "seed";

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "BEV",
        &[
            "Coca-Cola 330ml",
            "Sprite 330ml",
            "Mineral Water 1.5L",
            "Orange Juice 1L",
            "Iced Tea 500ml",
            "Energy Drink 250ml",
        ],
    ),
    (
        "SNK",
        &[
            "Potato Chips",
            "Chocolate Bar",
            "Salted Peanuts",
            "Oat Cookies",
            "Gummy Bears",
        ],
    ),
    (
        "HOM",
        &[
            "Dish Soap",
            "Paper Towels",
            "Laundry Detergent",
            "Trash Bags",
        ],
    ),
];

/// Apparel gets one variant per size.
const APPAREL: &[&str] = &["Basic T-Shirt", "Hoodie", "Denim Jeans"];
const SIZES: &[&str] = &["S", "M", "L", "XL"];

const LOCATIONS: &[(&str, &str, bool)] = &[
    ("WH", "Central Warehouse", true),
    ("ST-01", "Downtown Store", false),
    ("ST-02", "Airport Store", false),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./depot_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Depot Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./depot_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Depot Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Locations
    let catalog = db.catalog();
    let mut location_ids = Vec::with_capacity(LOCATIONS.len());
    for (code, name, is_default) in LOCATIONS {
        let location = catalog
            .create_location(&NewLocation {
                is_default: *is_default,
                ..NewLocation::new(*code, *name)
            })
            .await?;
        location_ids.push(location.id);
    }
    let warehouse = location_ids[0].clone();
    println!("✓ Created {} locations", location_ids.len());

    println!();
    println!("Generating products...");

    let ledger = db.ledger();
    let start = std::time::Instant::now();
    let mut generated = 0usize;
    let mut movements = 0usize;
    let mut sample = Vec::new();

    'outer: for round in 0.. {
        for (category, names) in CATEGORIES {
            for name in names.iter() {
                if generated >= count {
                    break 'outer;
                }

                let seed = generated;
                let product = catalog
                    .create_product(&NewProduct {
                        sku: format!("{}-{:04}", category, seed),
                        name: if round == 0 {
                            name.to_string()
                        } else {
                            format!("{} #{}", name, round + 1)
                        },
                    })
                    .await?;

                let opening = opening_stock(seed);
                if opening > 0 {
                    ledger
                        .record_movement(&opening_movement(&product.id, None, opening, &warehouse))
                        .await?;
                    movements += 1;
                }

                if sample.len() < 3 {
                    sample.push(product.id.clone());
                }

                generated += 1;
                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }

        for name in APPAREL {
            if generated >= count {
                break 'outer;
            }

            let seed = generated;
            let product = catalog
                .create_product(&NewProduct {
                    sku: format!("APP-{:04}", seed),
                    name: name.to_string(),
                })
                .await?;

            for size in SIZES {
                let variant = catalog
                    .create_variant(&NewVariant {
                        product_id: product.id.clone(),
                        sku: format!("APP-{:04}-{}", seed, size),
                        name: size.to_string(),
                    })
                    .await?;

                let opening = opening_stock(seed + variant.sku.len());
                if opening > 0 {
                    ledger
                        .record_movement(&opening_movement(
                            &product.id,
                            Some(variant.id),
                            opening,
                            &warehouse,
                        ))
                        .await?;
                    movements += 1;
                }
            }

            generated += 1;
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);
    println!("  Opening movements: {}", movements);
    println!(
        "  Rate: {:.0} products/second",
        generated as f64 / elapsed.as_secs_f64()
    );

    // Pending transfers from the warehouse to each store
    if !sample.is_empty() {
        println!();
        println!("Creating sample transfers...");
        for store in &location_ids[1..] {
            let detail = db
                .transfers()
                .create(&NewTransfer {
                    from_location_id: warehouse.clone(),
                    to_location_id: store.clone(),
                    items: sample
                        .iter()
                        .map(|product_id| NewTransferItem::new(product_id.as_str(), 5))
                        .collect(),
                    requested_by: SEED_ACTOR.to_string(),
                    notes: Some("Initial store allocation".to_string()),
                })
                .await?;
            println!("  {} ({} items)", detail.transfer.transfer_number, detail.items.len());
        }
    }

    // Verify the ledger
    println!();
    println!("Verifying ledger...");
    let unbalanced = db.ledger().unbalanced().await?;
    println!("  Unbalanced registry rows: {}", unbalanced.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Deterministic opening quantity in 0..=120.
fn opening_stock(seed: usize) -> i64 {
    ((seed * 37) % 121) as i64
}

fn opening_movement(
    product_id: &str,
    variant_id: Option<String>,
    quantity: i64,
    location_id: &str,
) -> NewMovement {
    NewMovement::new(product_id, MovementType::In, quantity, SEED_ACTOR)
        .for_variant(variant_id)
        .at_location(location_id)
        .with_reference(ReferenceType::Purchase, "opening-balance")
        .with_notes("Opening balance")
}
