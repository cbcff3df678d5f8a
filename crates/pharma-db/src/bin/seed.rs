//! # Seed Data Generator
//!
//! Populates the database with demo medicines for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 medicines (default) at the configured database path
//! cargo run -p pharma-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p pharma-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p pharma-db --bin seed -- --db ./data/pharmacy.db
//! ```
//!
//! ## Generated Medicines
//! Each medicine has:
//! - A realistic name and composition across common categories
//! - 10 or 15 tablets per strip (syrups and injectables sell as 1)
//! - One to three batches with staggered expiries and prices, so FEFO
//!   pricing is visible at checkout
//! - Every fifth medicine stays in legacy (batch-less) mode

use chrono::{Duration, Utc};
use pharma_core::{Batch, Medicine, Money};
use pharma_db::{Database, PharmaConfig};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category, shelf prefix, strip size, [(name, composition)])
const CATALOG: &[(&str, &str, i64, &[(&str, &str)])] = &[
    (
        "Analgesic",
        "A",
        15,
        &[
            ("Dolo 650", "Paracetamol 650mg"),
            ("Calpol 500", "Paracetamol 500mg"),
            ("Brufen 400", "Ibuprofen 400mg"),
            ("Combiflam", "Ibuprofen 400mg + Paracetamol 325mg"),
            ("Zerodol SP", "Aceclofenac + Paracetamol + Serratiopeptidase"),
        ],
    ),
    (
        "Antibiotic",
        "B",
        10,
        &[
            ("Azithral 500", "Azithromycin 500mg"),
            ("Augmentin 625", "Amoxicillin 500mg + Clavulanic Acid 125mg"),
            ("Taxim-O 200", "Cefixime 200mg"),
            ("Ciplox 500", "Ciprofloxacin 500mg"),
            ("Mox 500", "Amoxicillin 500mg"),
        ],
    ),
    (
        "Antacid",
        "C",
        15,
        &[
            ("Pan 40", "Pantoprazole 40mg"),
            ("Omez 20", "Omeprazole 20mg"),
            ("Rantac 150", "Ranitidine 150mg"),
            ("Pan-D", "Pantoprazole 40mg + Domperidone 30mg"),
        ],
    ),
    (
        "Antihistamine",
        "D",
        10,
        &[
            ("Cetzine", "Cetirizine 10mg"),
            ("Allegra 120", "Fexofenadine 120mg"),
            ("Montair LC", "Montelukast 10mg + Levocetirizine 5mg"),
        ],
    ),
    (
        "Syrup",
        "E",
        1,
        &[
            ("Benadryl Cough Syrup", "Diphenhydramine"),
            ("Ascoril LS", "Ambroxol + Levosalbutamol + Guaifenesin"),
            ("Electral ORS", "Oral Rehydration Salts"),
        ],
    ),
];

const PACK_VARIANTS: &[&str] = &["", " (Strip)", " Forte", " MR", " DT"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pharma=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path: Option<PathBuf> = None;

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
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pharmacy POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of medicines to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: from pharma.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = PharmaConfig::load_or_default(None);
    if let Some(path) = db_path {
        config.database.path = path;
    }
    if let Some(parent) = config.database.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(
        store = %config.store.name,
        path = %config.database.path.display(),
        count,
        "Seeding database"
    );

    let db = Database::new(config.db_config()).await?;

    let existing = db.medicines().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has medicines, skipping seed (delete the file to regenerate)");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (variant_idx, variant) in PACK_VARIANTS.iter().enumerate() {
        for (category_idx, (category, shelf, per_strip, items)) in CATALOG.iter().enumerate() {
            for (item_idx, (name, composition)) in items.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = variant_idx * 100 + category_idx * 10 + item_idx;
                let medicine = generate_medicine(
                    &format!("{}{}", name, variant),
                    composition,
                    category,
                    &format!("{}{}", shelf, item_idx + 1),
                    *per_strip,
                    seed,
                );

                if let Err(e) = db.medicines().add(medicine).await {
                    warn!(name = %name, error = %e, "Failed to insert medicine");
                    continue;
                }

                generated += 1;
                if generated % 50 == 0 {
                    info!(generated, "Progress");
                }
            }
        }
    }

    let elapsed = start.elapsed();
    info!(
        generated,
        elapsed_ms = elapsed.as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

/// Generates one medicine with deterministic pseudo-random batches.
fn generate_medicine(
    name: &str,
    composition: &str,
    category: &str,
    location: &str,
    tablets_per_strip: i64,
    seed: usize,
) -> Medicine {
    // Strip price: 15.00 - 214.00
    let base_price = 1500 + ((seed * 37) % 200) as i64 * 100;
    let mut medicine = Medicine::new(name, tablets_per_strip, Money::from_cents(base_price));
    medicine.composition = Some(composition.to_string());
    medicine.category = Some(category.to_string());
    medicine.location = Some(location.to_string());

    let today = Utc::now().date_naive();

    if seed % 5 == 0 {
        medicine.quantity = ((seed % 30) as i64 + 1) * tablets_per_strip;
        medicine.expiry_date = Some(today + Duration::days(200 + (seed % 300) as i64));
        medicine.batch_number = format!("L{:05}", seed);
        return medicine;
    }

    let batch_count = 1 + seed % 3;
    for b in 0..batch_count {
        let strips = 2 + ((seed + b * 7) % 20) as i64;
        // Newer lots cost a little more
        let price = Money::from_cents(base_price + b as i64 * 150);
        let expiry = today + Duration::days(90 + (b as i64) * 180 + (seed % 60) as i64);
        medicine.batches.push(Batch::new(
            format!("B{:04}-{}", seed, b + 1),
            expiry,
            strips * tablets_per_strip,
            price,
        ));
    }

    medicine
}
