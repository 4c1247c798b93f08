//! # Fare Core Demo
//!
//! Boots a [`FareSystem`] over the default metro catalog, issues the sample cards, replays a
//! few gate taps and prints the dashboard's trip and transaction listings as JSON.
//!
//! ```bash
//! RUST_LOG=info cargo run --bin fare-core -- --config fare.toml
//! ```

use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use fare_core::api::GateEventRequest;
use fare_core::config::FareConfig;
use fare_core::lifecycle::{setup_tracing, FareSystem};
use fare_core::model::{CardIssue, CardTypeId, FareKey, StationId};
use fare_core::Money;
use std::path::PathBuf;
use tracing::{info, warn, Instrument};

#[derive(Debug, Parser)]
#[command(name = "fare-core", about = "Fare-card transaction and trip-lifecycle demo")]
struct Args {
    /// TOML file with fare policy settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    setup_tracing();

    let config = match &args.config {
        Some(path) => FareConfig::load(path).map_err(|e| e.to_string())?,
        None => FareConfig::default(),
    };
    info!(?config, "Starting fare core");

    let mut system = FareSystem::in_memory(config);
    system.start_sweeper();

    for (start, end, cents) in [(1, 2, 250), (1, 3, 375), (2, 4, 300), (3, 5, 425)] {
        let key = FareKey::Route {
            start: StationId(start),
            end: StationId(end),
        };
        system
            .fares()
            .insert(key, Money::from_cents(cents))
            .map_err(|e| e.to_string())?;
    }

    let issued = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid issue date")?;
    for (number, card_type, cents) in [("CARD001", 1, 10000), ("CARD002", 2, 5000), ("CARD003", 4, 20000)] {
        let issue = CardIssue::new(number, CardTypeId(card_type), Money::from_cents(cents), issued);
        system.issue_card(issue).await.map_err(|e| e.to_string())?;
    }

    let start = Utc::now() - Duration::minutes(30);
    let taps = [
        ("CARD001", 1, start),
        ("CARD002", 2, start + Duration::minutes(2)),
        ("CARD003", 1, start + Duration::minutes(4)),
        ("CARD001", 3, start + Duration::minutes(25)),
        ("CARD002", 4, start + Duration::minutes(20)),
    ];

    let api = system.api();
    let span = tracing::info_span!("gate_replay");
    async {
        for (card, station, at) in taps {
            let request = GateEventRequest {
                card_number: card.to_string(),
                station_id: station,
                timestamp: at,
            };
            match api.post_gate_event(request).await {
                Ok(response) => info!(card, ?response, "Gate event accepted"),
                Err(e) => warn!(card, code = ?e.code, message = %e.message, "Gate event rejected"),
            }
        }
    }
    .instrument(span)
    .await;

    let trips = api.get_trips().await.map_err(|e| e.message)?;
    let transactions = api.get_transactions().await.map_err(|e| e.message)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&trips).map_err(|e| e.to_string())?
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&transactions).map_err(|e| e.to_string())?
    );

    system.shutdown().await?;
    info!("Demo completed");
    Ok(())
}
