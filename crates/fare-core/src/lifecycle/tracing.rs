//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a `tracing-subscriber` formatter filtered by `RUST_LOG`.
//!
//! ## What Gets Traced
//!
//! - **Actor lifecycle**: one line when a card actor starts, and one when it shuts down with
//!   the number of messages it handled
//! - **Card operations**: trip started/completed/abandoned, credits, debits, blocks, with
//!   `card`, `trip`, `station` and `amount` as structured fields
//! - **Rejections**: every refused tap with its error kind
//! - **Configuration defects**: a trip no fare rule covers is logged at `error`
//!
//! ## Usage Examples
//!
//! ```bash
//! # Trip and ledger events
//! RUST_LOG=info cargo run --bin fare-core
//!
//! # Include commits, fare lookups and every action payload
//! RUST_LOG=debug cargo run --bin fare-core
//!
//! # Only the actor runtime
//! RUST_LOG=fare_actor=debug cargo run --bin fare-core
//! ```
//!
//! ## Example Output
//!
//! ```text
//! INFO handle_tap{card=CARD001 station=station_1}: Trip started card=CARD001 trip=trip_1 station=station_1
//! INFO handle_tap{card=CARD001 station=station_3}: Trip completed card=CARD001 trip=trip_1 station=station_3 amount=25.00 balance=75.00
//! WARN handle_tap{card=CARD002 station=station_2}: Tap rejected error=Card CARD002 is Blocked, recharge required kind=InvalidState
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Keep lines short; structured fields carry the context
        .compact()
        .init();
}
