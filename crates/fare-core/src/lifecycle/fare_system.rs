use crate::api::DashboardApi;
use crate::card_actor::{self, CardAccount, CardContext};
use crate::catalog::{Catalog, MemoryCatalog};
use crate::clients::CardClient;
use crate::config::FareConfig;
use crate::error::CoreError;
use crate::fare::FareRuleTable;
use crate::intake::GateIntake;
use crate::model::{Card, CardIssue, NewTransaction, TransactionType, Trip};
use crate::store::{CardRecord, LedgerStore, MemoryStore};
use crate::sweep::AbandonedTripSweeper;
use crate::txlog::TransactionLog;
use chrono::{NaiveTime, TimeZone, Utc};
use fare_actor::ActorRegistry;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The runtime orchestrator for the fare core.
///
/// `FareSystem` is responsible for:
/// - **Wiring**: one shared [`CardContext`] (store, catalog, fare rules, configuration) handed
///   to every card actor
/// - **Issuance**: writing new cards and their opening balance into the store
/// - **Background work**: the abandoned-trip sweeper
/// - **Shutdown**: stopping the sweeper and draining every card actor
///
/// # Example
///
/// ```ignore
/// let mut system = FareSystem::in_memory(FareConfig::default());
/// system.start_sweeper();
///
/// system.issue_card(issue).await?;
/// let result = system.intake().handle_tap(card, station, at).await?;
///
/// system.shutdown().await?;
/// ```
pub struct FareSystem {
    config: Arc<FareConfig>,
    catalog: Arc<dyn Catalog>,
    fares: Arc<FareRuleTable>,
    store: Arc<dyn LedgerStore>,
    registry: Arc<ActorRegistry<CardAccount>>,
    cards: CardClient,
    intake: GateIntake,
    log: TransactionLog,
    sweeper: Arc<AbandonedTripSweeper>,
    sweeper_task: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl FareSystem {
    pub fn new(config: FareConfig, catalog: Arc<dyn Catalog>, store: Arc<dyn LedgerStore>) -> Self {
        let config = Arc::new(config);
        let fares = Arc::new(FareRuleTable::new(config.route_policy, catalog.clone()));

        let context = CardContext {
            store: store.clone(),
            catalog: catalog.clone(),
            fares: fares.clone(),
            config: config.clone(),
        };
        let (registry, client) = card_actor::new(context, &config);
        let cards = CardClient::new(client);

        let intake = GateIntake::new(catalog.clone(), cards.clone());
        let log = TransactionLog::new(store.clone());
        let sweeper = Arc::new(AbandonedTripSweeper::new(
            store.clone(),
            cards.clone(),
            config.clone(),
        ));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            catalog,
            fares,
            store,
            registry,
            cards,
            intake,
            log,
            sweeper,
            sweeper_task: None,
            shutdown,
        }
    }

    /// A system over the default metro catalog and an empty in-memory store.
    pub fn in_memory(config: FareConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryCatalog::metro_defaults()),
            Arc::new(MemoryStore::new()),
        )
    }

    /// Starts the periodic abandoned-trip sweep. Calling it again has no effect.
    pub fn start_sweeper(&mut self) {
        if self.sweeper_task.is_some() {
            return;
        }
        let interval = self.config.sweep_interval();
        info!(interval_secs = interval.as_secs(), "Starting abandoned-trip sweeper");
        let task = self.sweeper.clone().spawn(interval, self.shutdown.subscribe());
        self.sweeper_task = Some(task);
    }

    /// Stores a new card. A positive opening balance is recorded as an initial-load
    /// transaction in the same write.
    pub async fn issue_card(&self, issue: CardIssue) -> Result<Card, CoreError> {
        self.catalog.card_type(issue.card_type)?;
        if issue.opening_balance.is_negative() {
            return Err(CoreError::InvalidAmount(issue.opening_balance));
        }

        let card = issue.into_card();
        let issued_at = Utc.from_utc_datetime(&card.issued_on.and_time(NaiveTime::MIN));
        let opening = card.balance.is_positive().then(|| {
            NewTransaction::credit(
                card.number.clone(),
                card.balance,
                TransactionType::InitialLoad,
                issued_at,
                "Initial load",
            )
        });
        self.store
            .insert_card(CardRecord::new(card.clone()), opening)
            .await?;

        info!(card = %card.number, card_type = %card.card_type, balance = %card.balance, "Card issued");
        Ok(card)
    }

    pub async fn list_cards(&self) -> Result<Vec<Card>, CoreError> {
        Ok(self.store.list_cards().await?)
    }

    /// Every trip, most recent entry first.
    pub async fn trips(&self) -> Result<Vec<Trip>, CoreError> {
        let mut trips = self.store.all_trips().await?;
        trips.sort_by(|a, b| b.entry_time.cmp(&a.entry_time).then(b.id.cmp(&a.id)));
        Ok(trips)
    }

    pub fn config(&self) -> &FareConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn fares(&self) -> &FareRuleTable {
        &self.fares
    }

    pub fn cards(&self) -> &CardClient {
        &self.cards
    }

    pub fn intake(&self) -> &GateIntake {
        &self.intake
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.log
    }

    pub fn sweeper(&self) -> &AbandonedTripSweeper {
        &self.sweeper
    }

    /// Number of card actors currently holding a card in memory.
    pub fn live_cards(&self) -> usize {
        self.registry.live_actors()
    }

    pub fn api(&self) -> DashboardApi<'_> {
        DashboardApi::new(self)
    }

    /// Gracefully shuts down the system.
    ///
    /// Stops the sweeper first so no new sweep actions are sent, then closes every card
    /// mailbox and waits for queued actions to finish.
    pub async fn shutdown(mut self) -> Result<(), String> {
        info!("Initiating graceful shutdown");
        let _ = self.shutdown.send(true);
        if let Some(task) = self.sweeper_task.take() {
            if let Err(e) = task.await {
                error!(error = ?e, "Sweeper task failed");
            }
        }
        self.registry.shutdown().await?;
        info!("Shutdown complete");
        Ok(())
    }
}
