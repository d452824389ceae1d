//! seed-currencies - currency reference data seeding tool
//!
//! Upserts the supported ISO 4217 currency set into the configured
//! database. Safe to re-run; existing rows are updated in place.
//! Exits 1 on failure.
//!
//! Usage: seed-currencies [config.yml]

use std::path::Path;

use atrium::config::Config;
use atrium::db::repositories::{CurrencyRepository, SqlxCurrencyRepository};
use atrium::db::{self, migrations};
use atrium::models::Currency;

/// The currency set shipped with Atrium
const CURRENCIES: &[(&str, &str, &str, i32)] = &[
    ("AUD", "Australian Dollar", "A$", 2),
    ("BRL", "Brazilian Real", "R$", 2),
    ("CAD", "Canadian Dollar", "C$", 2),
    ("CHF", "Swiss Franc", "CHF", 2),
    ("CNY", "Chinese Yuan", "¥", 2),
    ("DKK", "Danish Krone", "kr", 2),
    ("EUR", "Euro", "€", 2),
    ("GBP", "Pound Sterling", "£", 2),
    ("INR", "Indian Rupee", "₹", 2),
    ("JPY", "Japanese Yen", "¥", 0),
    ("KRW", "South Korean Won", "₩", 0),
    ("MXN", "Mexican Peso", "Mex$", 2),
    ("NOK", "Norwegian Krone", "kr", 2),
    ("NZD", "New Zealand Dollar", "NZ$", 2),
    ("PLN", "Polish Zloty", "zł", 2),
    ("SEK", "Swedish Krona", "kr", 2),
    ("SGD", "Singapore Dollar", "S$", 2),
    ("USD", "US Dollar", "$", 2),
    ("ZAR", "South African Rand", "R", 2),
];

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("seed-currencies failed: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;

    let pool = db::create_pool(&config.database).await?;
    migrations::run_migrations(&pool).await?;

    let repo = SqlxCurrencyRepository::new(pool);

    for (code, name, symbol, decimal_places) in CURRENCIES {
        repo.upsert(&Currency {
            code: code.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimal_places: *decimal_places,
        })
        .await?;
    }

    let total = repo.count().await?;
    println!("Seeded {} currencies ({} in table)", CURRENCIES.len(), total);

    Ok(())
}
