//! Command handlers. Each one is a short walk through the library crates.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rabbit_core::currency::{format_amount, parse_amount};
use rabbit_core::receipt::{parse_scan_response, ScanOutcome, ScannedReceipt};
use rabbit_core::validation;
use rabbit_core::{
    calculate_split, Assignment, Item, Profile, Rabbit, SharedTabData, Tab, TabPatch, TabSnapshot,
};
use rabbit_db::Database;
use rabbit_sync::{
    MemoryStore, RabbitConfig, RemoteStore, ShareMode, ShareService, TabAgent, TabAgentHandle,
};
use tracing::info;

// =============================================================================
// Tabs
// =============================================================================

pub async fn new_tab(db: &Database, name: &str, currency: &str, tax: f64, tip: f64) -> Result<()> {
    let mut tab = Tab::new(name, currency.to_uppercase());
    tab.tax_percent = tax;
    tab.tip_percent = tip;
    validation::validate_tab_name(&tab.name)?;
    validation::validate_currency_code(&tab.currency_code)?;
    validation::validate_percent("tax_percent", tax)?;
    validation::validate_percent("tip_percent", tip)?;

    db.tabs().create(&tab, None).await?;
    info!(tab_id = %tab.id, "Tab created");
    println!("{}", tab.id);
    Ok(())
}

pub async fn list(db: &Database, limit: u32) -> Result<()> {
    let tabs = db.tabs().list(limit).await?;
    if tabs.is_empty() {
        println!("No tabs yet. Create one with `rabbit new <name>`.");
        return Ok(());
    }
    for tab in tabs {
        println!(
            "{}  {:<24} {}  tax {}%  tip {}%",
            tab.id, tab.name, tab.currency_code, tab.tax_percent, tab.tip_percent
        );
    }
    Ok(())
}

pub async fn show(db: &Database, tab_id: &str) -> Result<()> {
    let snapshot = load_snapshot(db, tab_id).await?;
    let owner = db.tabs().owner_profile(tab_id).await?;
    print_bill(&snapshot.to_shared(owner));
    Ok(())
}

// =============================================================================
// Edits (through an edit session)
// =============================================================================

pub async fn add_item(
    db: &Database,
    config: &RabbitConfig,
    tab_id: &str,
    description: &str,
    price: &str,
) -> Result<()> {
    let handle = open_session(db, config, tab_id).await?;
    let currency = handle.snapshot().await?.tab.currency_code;
    let Some(price_cents) = parse_amount(price, &currency) else {
        handle.close().await?;
        bail!("'{}' is not an amount", price);
    };

    let item = handle.add_item(description, price_cents).await?;
    finish(handle).await?;
    println!("{}  {}  {}", item.id, item.description, format_amount(item.price_cents, &currency));
    Ok(())
}

pub async fn add_rabbit(
    db: &Database,
    config: &RabbitConfig,
    tab_id: &str,
    name: &str,
    color: Option<rabbit_core::RabbitColor>,
) -> Result<()> {
    let handle = open_session(db, config, tab_id).await?;
    let rabbit = handle.add_rabbit(name, color).await?;
    finish(handle).await?;
    println!("{}  {} ({})", rabbit.id, rabbit.name, rabbit.color);
    Ok(())
}

pub async fn assign(
    db: &Database,
    config: &RabbitConfig,
    tab_id: &str,
    item_id: &str,
    rabbit_id: &str,
) -> Result<()> {
    let handle = open_session(db, config, tab_id).await?;
    let assigned = handle.toggle_assignment(item_id, rabbit_id).await?;
    finish(handle).await?;
    println!("{}", if assigned { "assigned" } else { "unassigned" });
    Ok(())
}

pub async fn rates(
    db: &Database,
    config: &RabbitConfig,
    tab_id: &str,
    tax: Option<f64>,
    tip: Option<f64>,
) -> Result<()> {
    if tax.is_none() && tip.is_none() {
        bail!("nothing to change; pass --tax and/or --tip");
    }
    let handle = open_session(db, config, tab_id).await?;
    handle
        .update_tab(TabPatch {
            tax_percent: tax,
            tip_percent: tip,
            ..Default::default()
        })
        .await?;
    let tab = handle.snapshot().await?.tab;
    finish(handle).await?;
    println!("tax {}%  tip {}%", tab.tax_percent, tab.tip_percent);
    Ok(())
}

pub async fn scan(
    db: &Database,
    config: &RabbitConfig,
    file: &Path,
    tab_id: Option<&str>,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let handle = match tab_id {
        Some(tab_id) => Some(open_session(db, config, tab_id).await?),
        None => None,
    };
    let fallback_currency = match &handle {
        Some(handle) => handle.snapshot().await?.tab.currency_code,
        None => "USD".to_string(),
    };

    let receipt = match parse_scan_response(&raw, &fallback_currency) {
        ScanOutcome::Found(receipt) => receipt,
        ScanOutcome::NoItems => {
            if let Some(handle) = handle {
                handle.close().await?;
            }
            bail!("no items found on this receipt");
        }
    };

    let currency = receipt.currency_code.clone();
    for item in &receipt.items {
        println!("{:<32} {}", item.description, format_amount(item.price_cents, &currency));
    }
    if let Some(tax) = receipt.tax_percent {
        println!("tax {}%", tax);
    }
    if let Some(tip) = receipt.tip_percent {
        println!("tip {}%", tip);
    }

    let Some(handle) = handle else {
        return Ok(());
    };
    // Whatever was added before a failure is still saved.
    let applied = apply_receipt(&handle, &receipt).await;
    let saved = finish(handle).await;
    let added = applied?;
    saved?;
    println!("added {} items", added);
    Ok(())
}

/// Adds the scanned items and rates. Returns how many items were added.
async fn apply_receipt(handle: &TabAgentHandle, receipt: &ScannedReceipt) -> Result<usize> {
    for (added, item) in receipt.items.iter().enumerate() {
        handle
            .add_item(&item.description, item.price_cents)
            .await
            .with_context(|| format!("adding {:?} after {} items", item.description, added))?;
    }
    handle
        .update_tab(TabPatch {
            tax_percent: receipt.tax_percent,
            tip_percent: receipt.tip_percent,
            currency_code: Some(receipt.currency_code.clone()),
            ..Default::default()
        })
        .await?;
    Ok(receipt.items.len())
}

// =============================================================================
// Sharing
// =============================================================================

pub async fn share(db: &Database, shares: &ShareService, tab_id: &str, remote: bool) -> Result<()> {
    let snapshot = load_snapshot(db, tab_id).await?;
    let owner = db.tabs().owner_profile(tab_id).await?;
    let mode = if remote { ShareMode::Remote } else { shares.default_mode() };

    let link = shares.create_link(&snapshot.to_shared(owner), mode).await?;
    println!("{}", link.url);
    Ok(())
}

pub async fn open(shares: &ShareService, link: &str, json: bool) -> Result<()> {
    let token = if link.contains("://") {
        ShareService::token_from_url(link)?
    } else {
        link.to_string()
    };

    let Some(data) = shares.resolve(&token).await else {
        bail!("bill not found");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print_bill(&data);
    }
    Ok(())
}

// =============================================================================
// Demo
// =============================================================================

/// Walks an edit session against an in-memory store with a little latency,
/// then shares and re-opens the bill.
pub async fn demo(config: &RabbitConfig) -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.set_latency(Duration::from_millis(50)).await;

    let mut tab = Tab::new("Demo Diner", "USD");
    tab.tax_percent = 8.0;
    tab.tip_percent = 20.0;
    store.insert_tab(TabSnapshot::empty(tab.clone())).await;
    store
        .set_owner_profile(
            &tab.id,
            Profile {
                display_name: Some("Sam".into()),
                venmo_username: Some("sam-pays".into()),
                currency_code: "USD".into(),
                ..Default::default()
            },
        )
        .await;

    let remote: Arc<dyn RemoteStore> = store.clone();
    let handle = TabAgent::open(remote, &tab.id, config.session.clone()).await?;

    let burger = handle.add_item("Burger", 1000).await?;
    let fries = handle.add_item("Fries", 400).await?;
    let typo = handle.add_item("Frise", 400).await?;
    handle.delete_item(&typo.id).await?;

    let ana = handle.add_rabbit("Ana", None).await?;
    let bo = handle.add_rabbit("Bo", None).await?;
    handle.toggle_assignment(&burger.id, &ana.id).await?;
    handle.toggle_assignment(&fries.id, &ana.id).await?;
    handle.toggle_assignment(&fries.id, &bo.id).await?;

    println!("pending before save: {} operations", handle.pending().await?.operation_count());
    handle.save().await?;
    println!("remote calls made: {}", store.operations().await.len());

    let data = handle.shared_data().await?;
    handle.close().await?;

    let shares = ShareService::new(&config.share, None)?;
    let link = shares.create_link(&data, ShareMode::Compact).await?;
    println!("{}\n", link.url);

    let Some(opened) = shares.resolve(&link.token).await else {
        bail!("demo link did not resolve");
    };
    print_bill(&opened);
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

async fn load_snapshot(db: &Database, tab_id: &str) -> Result<TabSnapshot> {
    db.tabs()
        .load_snapshot(tab_id)
        .await?
        .with_context(|| format!("tab {} not found", tab_id))
}

async fn open_session(db: &Database, config: &RabbitConfig, tab_id: &str) -> Result<TabAgentHandle> {
    let store: Arc<dyn RemoteStore> = Arc::new(db.clone());
    let handle = TabAgent::open(store, tab_id, config.session.clone()).await?;
    Ok(handle)
}

/// Saves pending edits and closes the session.
async fn finish(handle: TabAgentHandle) -> Result<()> {
    handle.save().await.context("saving changes")?;
    handle.close().await?;
    Ok(())
}

fn print_bill(data: &SharedTabData) {
    let SharedTabData {
        tab,
        items,
        rabbits,
        assignments,
        owner_profile,
    } = data;
    let code = tab.currency_code.as_str();
    let split = calculate_split(items, rabbits, assignments, tab.tax_percent, tab.tip_percent);

    println!("{} ({})", tab.name, code);
    for item in items {
        let holders = holder_names(item, rabbits, assignments);
        println!(
            "  {:<28} {:>12}  {}",
            item.description,
            format_amount(item.price_cents, code),
            holders
        );
    }
    println!();
    println!("  {:<28} {:>12}", "Subtotal", format_amount(split.items_subtotal.units(), code));
    println!(
        "  {:<28} {:>12}",
        format!("Tax {}%", tab.tax_percent),
        format_amount(split.tax_amount.units(), code)
    );
    println!(
        "  {:<28} {:>12}",
        format!("Tip {}%", tab.tip_percent),
        format_amount(split.tip_amount.units(), code)
    );
    println!("  {:<28} {:>12}", "Total", format_amount(split.grand_total.units(), code));
    println!();

    for breakdown in &split.rabbits {
        let name = rabbits
            .iter()
            .find(|r| r.id == breakdown.rabbit_id)
            .map(|r| r.name.as_str())
            .unwrap_or("?");
        println!("  {:<28} {:>12}", name, format_amount(breakdown.total.units(), code));
    }
    if split.unassigned_item_count > 0 {
        println!("  ({} items not assigned to anyone)", split.unassigned_item_count);
    }
    if !split.rounding_drift().is_zero() {
        println!(
            "  (per-person totals differ from the bill by {})",
            format_amount(split.rounding_drift().units(), code)
        );
    }

    if let Some(owner) = owner_profile {
        let handles: Vec<String> = [
            owner.venmo_username.as_ref().map(|v| format!("Venmo @{}", v)),
            owner.cashapp_cashtag.as_ref().map(|c| format!("Cash App ${}", c)),
            owner.paypal_username.as_ref().map(|p| format!("PayPal {}", p)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !handles.is_empty() {
            let who = owner.display_name.as_deref().unwrap_or("the owner");
            println!("\nPay {}: {}", who, handles.join(", "));
        }
    }
}

fn holder_names(item: &Item, rabbits: &[Rabbit], assignments: &[Assignment]) -> String {
    rabbits
        .iter()
        .filter(|r| {
            assignments
                .iter()
                .any(|a| a.item_id == item.id && a.rabbit_id == r.id)
        })
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabbit_core::RabbitColor;

    #[test]
    fn test_holder_names_in_rabbit_order() {
        let fries = Item::new("t", "Fries", 400);
        let a = Rabbit::new("t", "Ana", RabbitColor::Red);
        let b = Rabbit::new("t", "Bo", RabbitColor::Blue);
        let edges = vec![
            Assignment::new(&fries.id, &b.id),
            Assignment::new(&fries.id, &a.id),
        ];
        assert_eq!(holder_names(&fries, &[a, b], &edges), "Ana, Bo");
    }

    #[tokio::test]
    async fn test_edits_through_session_reach_sqlite() {
        let db = Database::new(rabbit_db::DbConfig::in_memory()).await.unwrap();
        let tab = Tab::new("Dinner", "USD");
        db.tabs().create(&tab, None).await.unwrap();

        let config = RabbitConfig::default();
        add_item(&db, &config, &tab.id, "Burger", "$10").await.unwrap();
        rates(&db, &config, &tab.id, Some(8.0), None).await.unwrap();

        let snapshot = load_snapshot(&db, &tab.id).await.unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].price_cents, 1000);
        assert_eq!(snapshot.tab.tax_percent, 8.0);
    }

    #[tokio::test]
    async fn test_scan_adds_every_priced_line() {
        let db = Database::new(rabbit_db::DbConfig::in_memory()).await.unwrap();
        let tab = Tab::new("Dinner", "USD");
        db.tabs().create(&tab, None).await.unwrap();

        let long = "y".repeat(validation::MAX_TEXT_LEN + 10);
        let file = std::env::temp_dir().join(format!("scan-{}.json", tab.id));
        std::fs::write(
            &file,
            format!(
                r#"{{"items":[{{"description":"Soup","price":5}},{{"description":"","price":2}},{{"description":"{long}","price":3}}],"tax":8,"tax_unit":"percent"}}"#
            ),
        )
        .unwrap();

        let result = scan(&db, &RabbitConfig::default(), &file, Some(&tab.id)).await;
        let _ = std::fs::remove_file(&file);
        result.unwrap();

        let snapshot = load_snapshot(&db, &tab.id).await.unwrap();
        assert_eq!(snapshot.items.len(), 3);
        assert!(snapshot.items.iter().any(|i| i.description == "Item 2"));
        assert_eq!(snapshot.tab.tax_percent, 8.0);
    }

    #[tokio::test]
    async fn test_bad_amount_is_rejected() {
        let db = Database::new(rabbit_db::DbConfig::in_memory()).await.unwrap();
        let tab = Tab::new("Dinner", "USD");
        db.tabs().create(&tab, None).await.unwrap();

        let result = add_item(&db, &RabbitConfig::default(), &tab.id, "Burger", "free").await;
        assert!(result.is_err());
        assert!(load_snapshot(&db, &tab.id).await.unwrap().items.is_empty());
    }
}
