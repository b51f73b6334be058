//! # Seed Data Generator
//!
//! Populates a development database with a warehouse catalog.
//!
//! ## Usage
//! ```bash
//! # Seed the database named by kanvas.toml / KANVAS_DB_PATH
//! cargo run -p kanvas-db --bin seed
//!
//! # Specify database path and config file
//! cargo run -p kanvas-db --bin seed -- --db ./data/kanvas.db --config ./kanvas.toml
//! ```
//!
//! ## Generated Products
//! Every catalog entry is seeded in each package size it ships in
//! (6, 12, 24 or 40 per dus), with opening stock and a daily cap on the
//! fast movers.

use std::env;
use std::path::PathBuf;

use kanvas_db::{Database, EngineConfig, NewProduct};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (code, name, package sizes, package price, daily cap in packages)
const CATALOG: &[(&str, &str, &[i64], i64, i64)] = &[
    ("SUSU", "Susu UHT 1L", &[12, 24], 192_000, 10),
    ("TEH", "Teh Botol 350ml", &[24], 96_000, 20),
    ("KOPI", "Kopi Sachet", &[40], 60_000, 0),
    ("MIE", "Mie Instan Goreng", &[40], 118_000, 25),
    ("GULA", "Gula Pasir 1kg", &[12], 174_000, 0),
    ("MINYAK", "Minyak Goreng 2L", &[6, 12], 210_000, 8),
    ("BERAS", "Beras Premium 5kg", &[6], 420_000, 0),
    ("SABUN", "Sabun Mandi", &[24, 40], 86_000, 0),
    ("AIR", "Air Mineral 600ml", &[24], 52_000, 30),
    ("KECAP", "Kecap Manis 600ml", &[12], 230_000, 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kanvas=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kanvas Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    info!(path = %config.database.path.display(), "Seeding database");
    let db = Database::open(config).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    for (index, (code, name, sizes, package_price, cap_packages)) in CATALOG.iter().enumerate() {
        for per_package in sizes.iter().copied() {
            let product = NewProduct::new(
                format!("{code}-{per_package}"),
                format!("{name} (isi {per_package})"),
                per_package,
            )
            // Between 20 and 60 packages on hand.
            .on_hand(per_package * (20 + (index as i64 * 7) % 41))
            .daily_cap(per_package * cap_packages)
            .package_price(package_price * per_package / sizes[0]);

            match db.products().insert(product).await {
                Ok(p) => {
                    generated += 1;
                    info!(code = %p.code, on_hand = p.on_hand_units, cap = p.daily_cap_units, "Product seeded");
                }
                Err(e) => warn!(code = %code, error = %e, "Failed to insert product"),
            }
        }
    }

    info!(generated, elapsed = ?start.elapsed(), "Seed complete");
    db.close().await;

    Ok(())
}
