//! # Seed Data Generator
//!
//! Populates the database with a small GST-priced catalog for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p settle-db --bin seed
//!
//! # Specify database path
//! cargo run -p settle-db --bin seed -- --db ./data/settle.db
//!
//! # Give every tracked product the same starting stock
//! cargo run -p settle-db --bin seed -- --stock 25
//! ```
//!
//! Prices are GST-inclusive shelf prices split into ex-GST and GST parts
//! (GST = 1/11 of the inclusive price, rounded to the cent), which is the
//! split the settlement core takes as given.

use chrono::Utc;
use settle_core::{Money, Product};
use settle_db::{Database, DbConfig};
use std::env;
use uuid::Uuid;

/// (SKU, name, GST-inclusive price in cents, tracked, low stock threshold)
const CATALOG: &[(&str, &str, i64, bool, i64)] = &[
    ("BEV-FW", "Flat White", 550, false, 0),
    ("BEV-LAT", "Latte", 550, false, 0),
    ("BEV-CB", "Cold Brew 330ml", 650, true, 6),
    ("BEV-OJ", "Orange Juice 300ml", 450, true, 6),
    ("BEV-H2O", "Spring Water 600ml", 300, true, 12),
    ("FOD-CRO", "Butter Croissant", 500, true, 4),
    ("FOD-BAN", "Banana Bread", 600, true, 4),
    ("FOD-TOA", "Ham & Cheese Toastie", 1000, true, 3),
    ("FOD-SAL", "Garden Salad", 1450, true, 3),
    ("RET-BEA", "Coffee Beans 1kg", 4400, true, 2),
    ("RET-CUP", "Reusable Cup", 2200, true, 2),
    ("SVC-DEL", "Delivery Fee", 500, false, 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./settle_dev.db");
    let mut stock: i64 = 40;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().unwrap_or(40);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Settlement Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: ./settle_dev.db)");
                println!("  -s, --stock <N>     Starting stock for tracked products (default: 40)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Settlement Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let mut inserted = 0;
    for (sku, name, inc_gst, tracked, threshold) in CATALOG {
        let product = catalog_product(sku, name, *inc_gst, *tracked, *threshold, stock);

        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", sku, e);
            continue;
        }

        println!(
            "  {:<8} {:<22} {} (ex {} + GST {}){}",
            product.sku,
            product.name,
            product.price_inc_gst(),
            product.price_ex_gst,
            product.gst_amount,
            if product.track_inventory {
                format!(", stock {}", product.stock_quantity)
            } else {
                String::new()
            }
        );
        inserted += 1;
    }

    println!();
    println!("✓ Seeded {} products", inserted);

    Ok(())
}

/// Builds a product from a GST-inclusive price.
fn catalog_product(
    sku: &str,
    name: &str,
    inc_gst_cents: i64,
    tracked: bool,
    low_stock_threshold: i64,
    stock: i64,
) -> Product {
    let now = Utc::now();
    let gst = (inc_gst_cents + 5) / 11;
    let stock = if tracked { stock } else { 0 };

    Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: name.to_string(),
        price_ex_gst: Money::from_cents(inc_gst_cents - gst),
        gst_amount: Money::from_cents(gst),
        stock_quantity: stock,
        initial_stock: stock,
        track_inventory: tracked,
        low_stock_threshold,
        created_at: now,
        updated_at: now,
    }
}
