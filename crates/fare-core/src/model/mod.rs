//! # Domain Model
//!
//! Plain data structures shared by every layer: cards, catalog records, fare rules, trips
//! and transactions, plus their type-safe identifiers.

pub mod card;
pub mod fare_rule;
pub mod ids;
pub mod station;
pub mod transaction;
pub mod trip;

pub use card::*;
pub use fare_rule::*;
pub use ids::*;
pub use station::*;
pub use transaction::*;
pub use trip::*;
