//! # settle: Operator CLI
//!
//! Back-office commands against the settlement database.
//!
//! ## Usage
//! ```bash
//! settle migrate
//! settle open-shift <CASHIER_ID> <STARTING_CASH> [--store <STORE_ID>]
//! settle close-shift <SHIFT_ID> <COUNTED_CASH>
//! settle shift-summary <SHIFT_ID>
//! settle stock-audit [PRODUCT_ID]
//! settle low-stock
//!
//! # Any command, different config file
//! settle --config ./settle.toml low-stock
//! ```
//!
//! Amounts are dollars with up to two decimals (`200`, `200.5`, `200.50`).

use anyhow::{bail, Context, Result};
use settle_core::Money;
use settle_engine::{init_tracing, EngineConfig, SettlementEngine};
use std::env;
use std::path::PathBuf;
use tracing::info;

const USAGE: &str = "\
Settlement operator CLI

Usage: settle [--config <PATH>] <COMMAND> [ARGS]

Commands:
  migrate                                   Apply pending migrations
  open-shift <CASHIER> <CASH> [--store ID]  Open a shift with a cash float
  close-shift <SHIFT> <CASH>                Close a shift against counted cash
  shift-summary <SHIFT>                     Print the shift reconciliation
  stock-audit [PRODUCT]                     Check stock against the inventory log
  low-stock                                 List products at or below threshold

Options:
  -c, --config <PATH>   Config file (default: platform config dir/settle.toml)
  -h, --help            Show this help message";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut config_path: Option<PathBuf> = None;
    let mut store_override: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = Some(PathBuf::from(args.next().context("--config needs a path")?));
            }
            "--store" | "-s" => {
                store_override = Some(args.next().context("--store needs an id")?);
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                return Ok(());
            }
            _ => positional.push(arg),
        }
    }

    let Some((command, rest)) = positional.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = EngineConfig::load(config_path).context("loading configuration")?;
    let engine = SettlementEngine::from_config(&config)
        .await
        .with_context(|| format!("opening {}", config.database.path.display()))?;
    info!(db = %config.database.path.display(), "Connected");

    match (command.as_str(), rest) {
        ("migrate", []) => {
            engine.database().run_migrations().await?;
            let status = engine.database().migration_status().await?;
            println!("✓ Migrations: {}", status);
        }

        ("open-shift", [cashier, cash]) => {
            let store = store_override.as_deref().unwrap_or(config.store_id());
            let shift = engine
                .shifts()
                .open_shift(cashier, store, parse_amount(cash)?)
                .await?;
            println!("✓ Opened shift {} for {} (float {})", shift.id, shift.cashier_id, shift.starting_cash);
        }

        ("close-shift", [shift_id, cash]) => {
            let summary = engine.shifts().close_shift(shift_id, parse_amount(cash)?).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if let Some(diff) = summary.cash_difference {
                if diff.is_zero() {
                    println!("✓ Drawer balances");
                } else {
                    println!("⚠ Drawer is off by {}", diff);
                }
            }
        }

        ("shift-summary", [shift_id]) => {
            let summary = engine.shifts().summarize(shift_id).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        ("stock-audit", [product_id]) => {
            let audit = engine.verify_stock_conservation(product_id).await?;
            println!("{}", serde_json::to_string_pretty(&audit)?);
            if !audit.consistent {
                bail!("stock for {} does not match its inventory log", product_id);
            }
        }

        ("stock-audit", []) => {
            let mut mismatched = 0;
            for product in engine.database().products().list().await? {
                if !product.track_inventory {
                    continue;
                }
                let audit = engine.verify_stock_conservation(&product.id).await?;
                let mark = if audit.consistent { "✓" } else { "✗" };
                println!(
                    "{} {:<10} initial {:>5}  Δ {:>6}  on hand {:>5}",
                    mark, product.sku, audit.initial_stock, audit.net_delta, audit.stock_quantity
                );
                if !audit.consistent {
                    mismatched += 1;
                }
            }
            if mismatched > 0 {
                bail!("{} product(s) do not match their inventory log", mismatched);
            }
        }

        ("low-stock", []) => {
            let products = engine.low_stock().await?;
            if products.is_empty() {
                println!("✓ No products at or below their threshold");
            }
            for p in products {
                println!(
                    "⚠ {:<10} {:<24} on hand {:>4} (threshold {})",
                    p.sku, p.name, p.stock_quantity, p.low_stock_threshold
                );
            }
        }

        (other, args) => {
            bail!("unknown command or wrong arguments: {} {:?}\n\n{}", other, args, USAGE);
        }
    }

    engine.database().close().await;
    Ok(())
}

/// Parses `12`, `12.5` or `12.50` into cents. No negatives.
fn parse_amount(input: &str) -> Result<Money> {
    let trimmed = input.trim().trim_start_matches('$');
    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));

    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() || frac.len() > 2 || !digits(whole) || !digits(frac) {
        bail!("invalid amount: {}", input);
    }

    let dollars: i64 = whole
        .parse()
        .with_context(|| format!("invalid amount: {}", input))?;
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>()? * 10,
        _ => frac.parse::<i64>()?,
    };

    let total = dollars
        .checked_mul(100)
        .and_then(|c| c.checked_add(cents))
        .with_context(|| format!("amount out of range: {}", input))?;

    Ok(Money::from_cents(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("200").unwrap().cents(), 20_000);
        assert_eq!(parse_amount("200.5").unwrap().cents(), 20_050);
        assert_eq!(parse_amount("$0.07").unwrap().cents(), 7);
        assert!(parse_amount("1.234").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount(".50").is_err());
    }
}
