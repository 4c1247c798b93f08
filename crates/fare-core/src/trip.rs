//! # Trip State Machine
//!
//! Decides what a tap means for a card given its current trip:
//!
//! ```text
//! NoTrip --tap--> Ongoing --tap--> Completed
//!                    |
//!                    +---sweep---> Abandoned
//! ```
//!
//! The decision is pure. Pricing, debiting and committing the outcome belong to the card
//! actor (see [`crate::card_actor`]).

use crate::model::{StationId, Trip, TripExit, TripId};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapIntent {
    /// Open a new trip at the tapped station.
    Entry,
    /// Close the ongoing trip. `same_station` marks an exit at the entry station.
    Exit { trip: TripId, same_station: bool },
    /// The tap is stamped before the ongoing trip began.
    ExitBeforeEntry { trip: TripId },
    /// A second exit tap at the station the card just left.
    DuplicateExit,
}

/// Classifies a tap at `station` at time `at`.
///
/// With a trip ongoing every tap is an exit, including one at the entry station. Without a
/// trip, a tap at the station of the last exit within `window` of that exit (before or after
/// it) is treated as a repeated exit rather than a new entry.
pub fn interpret(
    open: Option<&Trip>,
    last_exit: Option<&TripExit>,
    station: StationId,
    at: DateTime<Utc>,
    window: Duration,
) -> TapIntent {
    match open {
        Some(trip) if at < trip.entry_time => TapIntent::ExitBeforeEntry { trip: trip.id },
        Some(trip) => TapIntent::Exit {
            trip: trip.id,
            same_station: trip.entry_station == station,
        },
        None => match last_exit {
            Some(exit) if exit.station == station && gap(exit.at, at) <= window => {
                TapIntent::DuplicateExit
            }
            _ => TapIntent::Entry,
        },
    }
}

// Gates may report out of order, so the window applies on both sides of the exit.
fn gap(a: DateTime<Utc>, b: DateTime<Utc>) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Whether an ongoing trip has outlived `max_duration` at `now`.
pub fn is_overdue(entry_time: DateTime<Utc>, now: DateTime<Utc>, max_duration: Duration) -> bool {
    now - entry_time > max_duration
}
