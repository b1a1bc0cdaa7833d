//! # Seed Data Generator
//!
//! Populates the database with pharmacy products and batches for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p rx-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p rx-db --bin seed -- --count 1000
//!
//! # Specify database path and branch
//! cargo run -p rx-db --bin seed -- --db ./data/rxpos.db --branch branch-2
//! ```
//!
//! ## Generated Products
//! Each product gets one to three batches through the batch ledger, with
//! expiries spread from already expired to two years out, so every stock
//! status and expiry bucket shows up on the storefront.

use chrono::{Duration, Local};
use rx_core::receiving::{NewProduct, StockReceipt};
use rx_db::{Database, DbConfig};
use std::env;

/// (category, [(name, unit, unit price in kyat)])
const CATALOG: &[(&str, &[(&str, &str, i64)])] = &[
    (
        "Analgesic",
        &[
            ("Paracetamol 500mg", "strip", 500),
            ("Ibuprofen 400mg", "strip", 800),
            ("Aspirin 81mg", "strip", 600),
            ("Diclofenac Gel", "tube", 3500),
        ],
    ),
    (
        "Antibiotic",
        &[
            ("Amoxicillin 250mg", "strip", 1200),
            ("Azithromycin 500mg", "strip", 4500),
            ("Ciprofloxacin 500mg", "strip", 2000),
            ("Doxycycline 100mg", "strip", 1800),
        ],
    ),
    (
        "Antihistamine",
        &[
            ("Cetirizine 10mg", "strip", 300),
            ("Loratadine 10mg", "strip", 400),
            ("Chlorphenamine 4mg", "strip", 250),
        ],
    ),
    (
        "Gastro",
        &[
            ("Omeprazole 20mg", "strip", 900),
            ("ORS Sachet", "sachet", 150),
            ("Antacid Suspension", "bottle", 2200),
            ("Loperamide 2mg", "strip", 500),
        ],
    ),
    (
        "Chronic",
        &[
            ("Metformin 500mg", "strip", 700),
            ("Amlodipine 5mg", "strip", 650),
            ("Salbutamol Inhaler", "unit", 4500),
            ("Insulin Pen", "unit", 15000),
        ],
    ),
    (
        "Supplement",
        &[
            ("Vitamin C 1000mg", "bottle", 6000),
            ("Vitamin D3 1000IU", "bottle", 7000),
            ("Zinc Syrup", "bottle", 2500),
            ("Multivitamin", "bottle", 9000),
        ],
    ),
];

/// Days from today to each generated batch expiry.
const EXPIRY_OFFSETS: &[i64] = &[-15, 20, 45, 80, 150, 240, 400, 720];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./rxpos_dev.db");
    let mut branch_id = String::from("branch-1");

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
            "--branch" | "-b" => {
                if i + 1 < args.len() {
                    branch_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("RxPOS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>     Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>     Database file path (default: ./rxpos_dev.db)");
                println!("  -b, --branch <ID>   Branch the products belong to (default: branch-1)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 RxPOS Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Branch:   {}", branch_id);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let today = Local::now().date_naive();
    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut batches = 0;

    let items: Vec<(&str, &str, &str, i64)> = CATALOG
        .iter()
        .flat_map(|(category, products)| {
            products
                .iter()
                .map(move |(name, unit, price)| (*category, *name, *unit, *price))
        })
        .collect();

    for seed in 0..count {
        let (category, name, unit, price) = items[seed % items.len()];
        let round = seed / items.len();
        let name_en = if round == 0 {
            name.to_string()
        } else {
            format!("{} ({})", name, round + 1)
        };

        let product = db
            .products()
            .insert(&NewProduct {
                branch_id: branch_id.clone(),
                name_en,
                name_mm: None,
                category: category.to_string(),
                unit_price: price,
                unit: Some(unit.to_string()),
                min_stock_level: Some(5 + (seed % 4) as i64 * 5),
            })
            .await?;

        // 0 to 2 extra batches; every seventh product stays empty.
        let batch_count = if seed % 7 == 6 { 0 } else { 1 + seed % 3 };
        for b in 0..batch_count {
            let offset = EXPIRY_OFFSETS[(seed * 3 + b) % EXPIRY_OFFSETS.len()];
            let receipt = StockReceipt::existing(product.id.clone(), 1 + ((seed * 13 + b * 7) % 40) as i64)
                .with_batch(format!("LOT-{:04}-{}", seed, b + 1))
                .with_expiry(today + Duration::days(offset))
                .with_cost(price * 6 / 10)
                .with_location(format!("Shelf {}{}", (b'A' + (seed % 6) as u8) as char, 1 + seed % 4));

            if let Err(e) = db.batches().receive_stock(&receipt, today).await {
                eprintln!("Failed to receive stock for {}: {}", product.name_en, e);
                continue;
            }
            batches += 1;
        }

        generated += 1;
        if generated % 50 == 0 {
            println!("  Generated {} products...", generated);
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products and {} batches in {:?}", generated, batches, elapsed);

    let expiring = db
        .products()
        .list_with_batches(Some(&branch_id))
        .await?
        .iter()
        .filter(|p| p.batches.iter().any(|b| b.days_until_expiry(today) <= 90))
        .count();
    println!("  Products with a batch expiring within 90 days: {}", expiring);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
