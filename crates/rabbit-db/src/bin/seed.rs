//! # Seed Data Generator
//!
//! Populates the database with demo tabs for development.
//!
//! ## Usage
//! ```bash
//! # Generate 3 tabs (default)
//! cargo run -p rabbit-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p rabbit-db --bin seed -- --count 20
//!
//! # Specify database path
//! cargo run -p rabbit-db --bin seed -- --db ./data/rabbit.db
//! ```
//!
//! Each tab gets a handful of menu items, two to five rabbits with distinct
//! colours, a deterministic spread of assignments, and a linked owner
//! profile.

use std::env;

use rabbit_core::{Assignment, Item, Profile, Rabbit, RabbitColor, Tab};
use rabbit_db::{Database, DbConfig};
use uuid::Uuid;

/// Menus for realistic test data: (venue, [(dish, price_cents)])
const MENUS: &[(&str, &[(&str, i64)])] = &[
    (
        "Diner",
        &[
            ("Burger", 1000),
            ("Fries", 400),
            ("Milkshake", 650),
            ("Club Sandwich", 1150),
            ("Onion Rings", 475),
        ],
    ),
    (
        "Ramen Bar",
        &[
            ("Tonkotsu Ramen", 1600),
            ("Gyoza", 800),
            ("Edamame", 500),
            ("Karaage", 950),
        ],
    ),
    (
        "Pizzeria",
        &[
            ("Margherita", 1400),
            ("Diavola", 1650),
            ("Caesar Salad", 1100),
            ("Tiramisu", 750),
            ("House Red", 3200),
        ],
    ),
];

const NAMES: &[&str] = &["Ada", "Bo", "Cleo", "Dev", "Eli", "Fen"];

/// (tax_percent, tip_percent)
const RATES: &[(f64, f64)] = &[(8.0, 20.0), (8.875, 18.0), (0.0, 15.0), (10.0, 0.0)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 3;
    let mut db_path = String::from("./rabbit_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(3);
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
                println!("Rabbit Tab Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of tabs to generate (default: 3)");
                println!("  -d, --db <PATH>    Database file path (default: ./rabbit_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🐇 Rabbit Tab Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!("Tabs:     {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let owner_id = Uuid::new_v4().to_string();
    let owner = Profile {
        display_name: Some("Demo Owner".to_string()),
        venmo_username: Some("demo-owner".to_string()),
        cashapp_cashtag: Some("$demoowner".to_string()),
        paypal_username: None,
        currency_code: "USD".to_string(),
    };
    db.profiles().upsert(&owner_id, &owner).await?;

    for seed in 0..count {
        let (tab, items, rabbits, edges) = generate_tab(seed);

        db.tabs().create(&tab, Some(&owner_id)).await?;
        db.items().insert_many(&items).await?;
        db.rabbits().insert_many(&rabbits).await?;
        db.assignments().insert_many(&edges).await?;

        println!(
            "  ✓ {} ({} items, {} rabbits, {} assignments) id={}",
            tab.name,
            items.len(),
            rabbits.len(),
            edges.len(),
            tab.id
        );
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single tab with deterministic contents.
fn generate_tab(seed: usize) -> (Tab, Vec<Item>, Vec<Rabbit>, Vec<Assignment>) {
    let (venue, menu) = MENUS[seed % MENUS.len()];
    let (tax, tip) = RATES[seed % RATES.len()];

    let mut tab = Tab::new(format!("{} #{}", venue, seed + 1), "USD");
    tab.tax_percent = tax;
    tab.tip_percent = tip;

    let items: Vec<Item> = menu
        .iter()
        .map(|(dish, price)| Item::new(&tab.id, *dish, *price))
        .collect();

    let rabbit_count = 2 + seed % 4;
    let mut used = Vec::new();
    let rabbits: Vec<Rabbit> = NAMES
        .iter()
        .take(rabbit_count)
        .map(|name| {
            let color = RabbitColor::next_available(&used);
            used.push(color);
            Rabbit::new(&tab.id, *name, color)
        })
        .collect();

    // Every item goes to one rabbit; every third item is shared with the next.
    let mut edges = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let owner = &rabbits[(i + seed) % rabbits.len()];
        edges.push(Assignment::new(&item.id, &owner.id));
        if i % 3 == 0 {
            let other = &rabbits[(i + seed + 1) % rabbits.len()];
            edges.push(Assignment::new(&item.id, &other.id));
        }
    }

    (tab, items, rabbits, edges)
}
