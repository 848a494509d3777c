//! # Seed Data Generator
//!
//! Populates the database with locations, products and stock for development.
//!
//! ## Usage
//! ```bash
//! # Seed using DATABASE_URL
//! cargo run -p orderdesk-db --bin seed
//!
//! # Explicit URL, more locations
//! cargo run -p orderdesk-db --bin seed -- --db-url postgres://localhost/orderdesk --locations 5
//! ```
//!
//! ## Generated Data
//! - Locations `POS1..POSn`
//! - One product per catalog entry, barcode `460{:010}`
//! - A Stock row for every (location, product) pair, 10 - 100 units,
//!   every fourth row switched off for sale

use chrono::Utc;
use orderdesk_core::{Location, Money, Product, Stock};
use orderdesk_db::{Database, DbConfig, Store};
use std::env;

/// Catalog entries: (name, price in cents)
const CATALOG: &[(&str, i64)] = &[
    ("Espresso", 150),
    ("Americano", 180),
    ("Cappuccino", 250),
    ("Latte", 270),
    ("Flat White", 290),
    ("Black Tea", 120),
    ("Green Tea", 130),
    ("Hot Chocolate", 260),
    ("Orange Juice", 320),
    ("Still Water", 90),
    ("Croissant", 210),
    ("Cinnamon Bun", 240),
    ("Blueberry Muffin", 230),
    ("Cheesecake", 390),
    ("Chocolate Cookie", 110),
    ("Ham Sandwich", 450),
    ("Chicken Wrap", 520),
    ("Caesar Salad", 610),
    ("Tomato Soup", 380),
    ("Granola Bar", 140),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut locations: usize = 3;
    let mut db_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| String::from("postgres://localhost/orderdesk"));

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--locations" | "-l" => {
                if i + 1 < args.len() {
                    locations = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db-url" | "-d" => {
                if i + 1 < args.len() {
                    db_url = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("OrderDesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -l, --locations <N>  Number of locations to create (default: 3)");
                println!("  -d, --db-url <URL>   PostgreSQL URL (default: $DATABASE_URL)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("OrderDesk Seed Data Generator");
    println!("=============================");
    println!("Locations: {}", locations);
    println!("Products:  {}", CATALOG.len());
    println!();

    let db = Database::new(DbConfig::new(&db_url)).await?;
    let store = db.store();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if store.location_by_code("POS1").await?.is_some() {
        println!("⚠ Location POS1 already exists");
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let now = Utc::now();

    let mut products = Vec::with_capacity(CATALOG.len());
    for (idx, (name, price_cents)) in CATALOG.iter().enumerate() {
        let product = Product::new(
            format!("460{:010}", idx + 1),
            *name,
            Money::from_cents(*price_cents),
            now,
        );
        store.insert_product(&product).await?;
        products.push(product);
    }
    println!("✓ Inserted {} products", products.len());

    let mut stock_rows = 0;
    for n in 1..=locations {
        let location = Location::new(format!("POS{n}"), format!("Point of sale #{n}"), now);
        store.insert_location(&location).await?;

        for (idx, product) in products.iter().enumerate() {
            let seed = n * 31 + idx * 17;
            store
                .put_stock(&Stock {
                    location_id: location.id.clone(),
                    product_id: product.id.clone(),
                    quantity: 10 + (seed % 91) as i64,
                    available_for_sale: seed % 4 != 0,
                    updated_at: now,
                })
                .await?;
            stock_rows += 1;
        }
    }
    println!("✓ Inserted {} locations, {} stock rows", locations, stock_rows);

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
