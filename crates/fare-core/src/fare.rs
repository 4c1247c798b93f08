//! # Fare Rule Table
//!
//! Prices a trip from its entry and exit stations and the card's type.
//!
//! ## Lookup precedence
//!
//! 1. A route rule for `(entry, exit)`.
//! 2. A route rule for `(exit, entry)`, only under [`RoutePolicy::Symmetric`].
//! 3. A flat rule keyed by the card type's name.
//!
//! If none matches the trip has no price and the lookup fails; it never falls back to zero.
//! The matched amount is scaled by the card type's multiplier and rounded half-up to the cent.
//!
//! ## Snapshots
//!
//! Readers clone an `Arc` to the current rule set and price against that. Writers build a new
//! set and swap it in, so a fare computed mid-update sees either the old rules or the new ones.

use crate::catalog::Catalog;
use crate::model::{CardType, FareKey, FareRule, FareRuleId, RoutePolicy, StationId};
use crate::money::Money;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FareError {
    #[error("No fare rule for {card_type} from {entry} to {exit}")]
    NoFareRule {
        card_type: String,
        entry: StationId,
        exit: StationId,
    },
    #[error("A fare rule already exists for {0}")]
    DuplicateRule(FareKey),
    #[error("Fare rule not found: {0}")]
    UnknownRule(FareRuleId),
    #[error("Station not found: {0}")]
    UnknownStation(StationId),
    #[error("Fare amount must not be negative, got {0}")]
    InvalidAmount(Money),
}

#[derive(Debug, Clone, Default)]
struct RuleSet {
    by_id: BTreeMap<FareRuleId, FareRule>,
    by_key: HashMap<FareKey, FareRuleId>,
}

impl RuleSet {
    fn find(&self, key: &FareKey) -> Option<&FareRule> {
        self.by_key.get(key).and_then(|id| self.by_id.get(id))
    }
}

pub struct FareRuleTable {
    rules: RwLock<Arc<RuleSet>>,
    policy: RoutePolicy,
    catalog: Arc<dyn Catalog>,
    next_id: AtomicU32,
}

impl FareRuleTable {
    pub fn new(policy: RoutePolicy, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            rules: RwLock::new(Arc::new(RuleSet::default())),
            policy,
            catalog,
            next_id: AtomicU32::new(1),
        }
    }

    pub fn policy(&self) -> RoutePolicy {
        self.policy
    }

    fn snapshot(&self) -> Arc<RuleSet> {
        match self.rules.read() {
            Ok(rules) => rules.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Builds a new rule set from the current one and swaps it in.
    fn swap<R>(
        &self,
        edit: impl FnOnce(&mut RuleSet) -> Result<R, FareError>,
    ) -> Result<R, FareError> {
        let mut guard = match self.rules.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = RuleSet::clone(&guard);
        let result = edit(&mut next)?;
        *guard = Arc::new(next);
        Ok(result)
    }

    pub fn compute_fare(
        &self,
        card_type: &CardType,
        entry: StationId,
        exit: StationId,
    ) -> Result<Money, FareError> {
        let rules = self.snapshot();
        let forward = FareKey::Route {
            start: entry,
            end: exit,
        };
        let reverse = FareKey::Route {
            start: exit,
            end: entry,
        };

        let matched = rules
            .find(&forward)
            .or_else(|| match self.policy {
                RoutePolicy::Symmetric => rules.find(&reverse),
                RoutePolicy::Directed => None,
            })
            .or_else(|| rules.find(&FareKey::FareType(card_type.name.clone())));

        let Some(rule) = matched else {
            error!(
                card_type = %card_type.name,
                %entry,
                %exit,
                "No fare rule covers this trip; the rule table is incomplete"
            );
            return Err(FareError::NoFareRule {
                card_type: card_type.name.clone(),
                entry,
                exit,
            });
        };

        let fare = rule.amount.scale(card_type.fare_multiplier);
        debug!(rule = %rule.id, base = %rule.amount, %fare, "Fare computed");
        Ok(fare)
    }

    pub fn get(&self, id: FareRuleId) -> Result<FareRule, FareError> {
        self.snapshot()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(FareError::UnknownRule(id))
    }

    pub fn list(&self) -> Vec<FareRule> {
        self.snapshot().by_id.values().cloned().collect()
    }

    pub fn insert(&self, key: FareKey, amount: Money) -> Result<FareRule, FareError> {
        if amount.is_negative() {
            return Err(FareError::InvalidAmount(amount));
        }
        if let FareKey::Route { start, end } = &key {
            for station in [*start, *end] {
                self.catalog
                    .station(station)
                    .map_err(|_| FareError::UnknownStation(station))?;
            }
        }

        let rule = self.swap(|rules| {
            if rules.by_key.contains_key(&key) {
                return Err(FareError::DuplicateRule(key.clone()));
            }
            let id = FareRuleId(self.next_id.fetch_add(1, Ordering::Relaxed));
            let rule = FareRule {
                id,
                key: key.clone(),
                amount,
            };
            rules.by_key.insert(key.clone(), id);
            rules.by_id.insert(id, rule.clone());
            Ok(rule)
        })?;
        info!(rule = %rule.id, key = %rule.key, amount = %rule.amount, "Fare rule created");
        Ok(rule)
    }

    pub fn update_amount(&self, id: FareRuleId, amount: Money) -> Result<FareRule, FareError> {
        if amount.is_negative() {
            return Err(FareError::InvalidAmount(amount));
        }
        let rule = self.swap(|rules| {
            let rule = rules.by_id.get_mut(&id).ok_or(FareError::UnknownRule(id))?;
            rule.amount = amount;
            Ok(rule.clone())
        })?;
        info!(rule = %id, %amount, "Fare rule updated");
        Ok(rule)
    }

    pub fn remove(&self, id: FareRuleId) -> Result<FareRule, FareError> {
        let rule = self.swap(|rules| {
            let rule = rules.by_id.remove(&id).ok_or(FareError::UnknownRule(id))?;
            rules.by_key.remove(&rule.key);
            Ok(rule)
        })?;
        info!(rule = %id, "Fare rule removed");
        Ok(rule)
    }
}
