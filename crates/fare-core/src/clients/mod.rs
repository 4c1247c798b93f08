//! Typed clients over the generic actor runtime.

pub mod card_client;

pub use card_client::CardClient;
