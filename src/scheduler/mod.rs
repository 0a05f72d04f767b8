//! Periodic refresh of one exchange/symbol book.
//!
//! A single worker task owns the cycle state. Commands come in on an mpsc
//! channel, fetch results on a second one, and the refresh timer is a plain
//! deadline. Finished books are published through a `watch` channel as a
//! whole `Arc`, so readers never see a half-built book.

pub mod cycle;

pub use cycle::{Arrival, CycleMachine, CycleState, NextStep, RefreshAction};

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::Config;
use crate::depth::{self, AggregationCache, BucketSelector};
use crate::errors::{EngineError, ExchangeError};
use crate::exchanges::{DepthFeed, FeedDepth};
use crate::models::{Grouping, LevelSelected, OrderBookSnapshot, Side};
use crate::orderbook::BookStore;
use crate::orderbook::store::validate_level;

const SELECTION_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub symbol: String,
    pub grouping: Grouping,
    pub fetch_depth: usize,
    pub refresh_interval: Duration,
    pub auto_refresh: bool,
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            symbol: config.symbol.clone(),
            grouping: config.grouping,
            fetch_depth: config.fetch_depth,
            refresh_interval: config.refresh_interval,
            auto_refresh: config.auto_refresh,
        }
    }
}

/// What consumers receive. Marking a book stale publishes a new
/// `PublishedBook` around the same snapshot.
#[derive(Debug, Clone)]
pub struct PublishedBook {
    /// Sequence number of the fetch the raw data came from.
    pub sequence: u64,
    pub snapshot: Arc<OrderBookSnapshot>,
    /// The latest fetch failed; this is the last good book.
    pub stale: bool,
    pub last_error: Option<String>,
    /// Suggested bucket sizes for the current price magnitude.
    pub bucket_options: Vec<f64>,
}

#[derive(Debug)]
enum Command {
    Start,
    Refresh,
    SetGrouping(Grouping),
    SetAutoRefresh(bool),
    ApplyDelta { side: Side, price: f64, quantity: f64 },
    Shutdown,
}

struct FetchDone {
    sequence: u64,
    result: Result<FeedDepth, ExchangeError>,
}

pub struct RefreshScheduler {
    feed: Arc<dyn DepthFeed>,
    store: BookStore,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    pub fn new(feed: Arc<dyn DepthFeed>, store: BookStore, config: SchedulerConfig) -> Self {
        Self {
            feed,
            store,
            config,
        }
    }

    /// Spawns the worker task. It stays `Idle` until [`SchedulerHandle::start`]
    /// or a manual refresh, and stops on [`SchedulerHandle::shutdown`] or once
    /// every handle is dropped.
    pub fn spawn(self) -> SchedulerHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let (book_tx, book_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(CycleState::Idle);
        let (grouping_tx, grouping_rx) = watch::channel(self.config.grouping);
        let (selection_tx, _) = broadcast::channel(SELECTION_CAPACITY);

        let worker = Worker {
            exchange: self.feed.name(),
            feed: self.feed,
            store: self.store,
            symbol: self.config.symbol,
            grouping: self.config.grouping,
            fetch_depth: self.config.fetch_depth,
            interval: self.config.refresh_interval,
            machine: CycleMachine::new(self.config.auto_refresh),
            cache: AggregationCache::default(),
            selector: BucketSelector::new(),
            deadline: None,
            in_flight: None,
            commands: command_rx,
            results_tx,
            results: results_rx,
            book_tx,
            state_tx,
            grouping_tx,
        };
        tokio::spawn(worker.run());

        SchedulerHandle {
            commands: command_tx,
            books: book_rx,
            states: state_rx,
            grouping: grouping_rx,
            selections: selection_tx,
        }
    }
}

/// Cheap to clone; every clone talks to the same worker.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    books: watch::Receiver<Option<Arc<PublishedBook>>>,
    states: watch::Receiver<CycleState>,
    grouping: watch::Receiver<Grouping>,
    selections: broadcast::Sender<LevelSelected>,
}

impl SchedulerHandle {
    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::SchedulerStopped)
    }

    pub fn start(&self) -> Result<(), EngineError> {
        self.send(Command::Start)
    }

    /// Fetches now, cancelling a pending timer or in-flight fetch.
    pub fn refresh(&self) -> Result<(), EngineError> {
        self.send(Command::Refresh)
    }

    /// Re-aggregates the last raw book with a new grouping; no fetch.
    /// Invalid values are rejected here and the current book stays as is.
    pub fn set_grouping(&self, bucket_size: f64, depth: usize) -> Result<Grouping, EngineError> {
        let grouping = Grouping::new(bucket_size, depth)?;
        self.send(Command::SetGrouping(grouping))?;
        Ok(grouping)
    }

    pub fn set_auto_refresh(&self, enabled: bool) -> Result<(), EngineError> {
        self.send(Command::SetAutoRefresh(enabled))
    }

    /// Applies a single level change from a delta feed and re-aggregates.
    pub fn apply_delta(&self, side: Side, price: f64, quantity: f64) -> Result<(), EngineError> {
        validate_level(price, quantity)?;
        self.send(Command::ApplyDelta {
            side,
            price,
            quantity,
        })
    }

    /// Emits a [`LevelSelected`] event for order-entry consumers.
    pub fn select_level(&self, side: Side, price: f64) -> Result<(), EngineError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(EngineError::InvalidLevel(format!(
                "price must be positive, got {price}"
            )));
        }
        // no subscribers is fine
        let _ = self.selections.send(LevelSelected { side, price });
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    pub fn current(&self) -> Option<Arc<PublishedBook>> {
        self.books.borrow().clone()
    }

    pub fn state(&self) -> CycleState {
        *self.states.borrow()
    }

    pub fn grouping(&self) -> Grouping {
        *self.grouping.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedBook>>> {
        self.books.clone()
    }

    pub fn subscribe_states(&self) -> watch::Receiver<CycleState> {
        self.states.clone()
    }

    pub fn subscribe_selections(&self) -> broadcast::Receiver<LevelSelected> {
        self.selections.subscribe()
    }
}

/// Hands every level selection to `on_select` until the scheduler is gone.
/// A consumer that falls behind skips what it missed and keeps going.
pub async fn consume_selections(
    mut selections: broadcast::Receiver<LevelSelected>,
    mut on_select: impl FnMut(LevelSelected),
) {
    loop {
        match selections.recv().await {
            Ok(selected) => on_select(selected),
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("order entry fell behind, {missed} selections dropped")
            }
            Err(RecvError::Closed) => break,
        }
    }
}

struct Worker {
    exchange: &'static str,
    feed: Arc<dyn DepthFeed>,
    store: BookStore,
    symbol: String,
    grouping: Grouping,
    fetch_depth: usize,
    interval: Duration,
    machine: CycleMachine,
    cache: AggregationCache,
    selector: BucketSelector,
    deadline: Option<Instant>,
    in_flight: Option<JoinHandle<()>>,
    commands: mpsc::UnboundedReceiver<Command>,
    results_tx: mpsc::UnboundedSender<FetchDone>,
    results: mpsc::UnboundedReceiver<FetchDone>,
    book_tx: watch::Sender<Option<Arc<PublishedBook>>>,
    state_tx: watch::Sender<CycleState>,
    grouping_tx: watch::Sender<Grouping>,
}

impl Worker {
    async fn run(mut self) {
        let name = self.exchange;
        tracing::info!(
            "[{name}] {} refresh scheduler ready (interval {:?}, auto-refresh {})",
            self.symbol,
            self.interval,
            self.machine.auto_refresh()
        );

        loop {
            let deadline = self.deadline;
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(done) = self.results.recv() => self.on_fetch_done(done),
                _ = wait_until(deadline) => self.on_tick(),
            }
            self.state_tx.send_replace(self.machine.state());
        }

        self.teardown();
    }

    fn on_command(&mut self, command: Command) {
        let name = self.exchange;
        match command {
            Command::Start => {
                if self.machine.start() {
                    tracing::info!("[{name}] {} refresh started", self.symbol);
                    self.deadline = Some(Instant::now());
                }
            }
            Command::Refresh => match self.machine.manual_refresh() {
                RefreshAction::Fetch {
                    sequence,
                    cancelled,
                } => {
                    if let Some(cancelled) = cancelled {
                        tracing::debug!("[{name}] {} cancelling fetch #{cancelled}", self.symbol);
                    }
                    self.deadline = None;
                    self.spawn_fetch(sequence);
                }
                RefreshAction::Queued => {
                    tracing::debug!("[{name}] {} refresh queued behind current cycle", self.symbol);
                }
            },
            Command::SetGrouping(grouping) => {
                tracing::info!(
                    "[{name}] {} grouping -> bucket {} depth {}",
                    self.symbol,
                    grouping.bucket_size(),
                    grouping.depth()
                );
                self.grouping = grouping;
                self.grouping_tx.send_replace(grouping);
                self.republish();
            }
            Command::SetAutoRefresh(enabled) => {
                tracing::info!("[{name}] {} auto-refresh {}", self.symbol, enabled);
                if let Some(step) = self.machine.set_auto_refresh(enabled) {
                    self.apply(step);
                }
            }
            Command::ApplyDelta {
                side,
                price,
                quantity,
            } => match self
                .store
                .upsert(self.exchange, &self.symbol, side, price, quantity, now_ms())
            {
                Ok(()) => self.republish(),
                Err(e) => tracing::warn!("[{name}] {} rejected delta: {e}", self.symbol),
            },
            Command::Shutdown => {}
        }
    }

    fn on_tick(&mut self) {
        self.deadline = None;
        if let Some(sequence) = self.machine.tick() {
            self.spawn_fetch(sequence);
        }
    }

    fn spawn_fetch(&mut self, sequence: u64) {
        if let Some(previous) = self.in_flight.take() {
            previous.abort();
        }

        tracing::debug!("[{}] {} fetch #{sequence} started", self.exchange, self.symbol);

        let feed = Arc::clone(&self.feed);
        let symbol = self.symbol.clone();
        let limit = self.fetch_depth;
        let results = self.results_tx.clone();

        self.in_flight = Some(tokio::spawn(async move {
            let result = feed.fetch_depth(&symbol, limit).await;
            // the worker may already be gone
            let _ = results.send(FetchDone { sequence, result });
        }));
    }

    fn on_fetch_done(&mut self, done: FetchDone) {
        let name = self.exchange;
        let sequence = done.sequence;

        let depth = match done.result {
            Ok(depth) => depth,
            Err(e) => {
                self.on_fetch_failed(sequence, EngineError::from(e));
                return;
            }
        };

        match self.machine.data_arrived(sequence) {
            Arrival::Stale => {
                metrics::counter!("depth_cycles_discarded_total").increment(1);
                tracing::debug!(
                    "[{name}] {} discarding fetch #{sequence}, #{} already published",
                    self.symbol,
                    self.machine.last_published().unwrap_or_default()
                );
            }
            Arrival::Superseded => {
                if self.ingest_and_publish(sequence, depth) {
                    self.machine.record_published(sequence);
                }
            }
            Arrival::Current => {
                self.in_flight = None;
                let published = self.ingest_and_publish(sequence, depth);
                let step = self.machine.finish_cycle(sequence, published);
                self.apply(step);
            }
        }
    }

    fn on_fetch_failed(&mut self, sequence: u64, error: EngineError) {
        let name = self.exchange;
        metrics::counter!("depth_feed_failures_total").increment(1);
        tracing::warn!("[{name}] {} fetch #{sequence} failed: {error}", self.symbol);

        let Some(step) = self.machine.fetch_failed(sequence) else {
            return;
        };
        self.in_flight = None;

        let current = self.book_tx.borrow().clone();
        if let Some(current) = current {
            self.book_tx.send_replace(Some(Arc::new(PublishedBook {
                stale: true,
                last_error: Some(error.to_string()),
                ..(*current).clone()
            })));
        }

        self.apply(step);
    }

    /// Aggregating: swap the raw book in, build and publish. Returns whether
    /// a new book went out.
    fn ingest_and_publish(&mut self, sequence: u64, depth: FeedDepth) -> bool {
        let updated_ms = if depth.event_ms > 0 { depth.event_ms } else { now_ms() };
        self.store
            .ingest_snapshot(self.exchange, &self.symbol, Side::Bid, &depth.bids, updated_ms);
        self.store
            .ingest_snapshot(self.exchange, &self.symbol, Side::Ask, &depth.asks, updated_ms);

        self.publish(sequence, None)
    }

    /// Rebuilds from the raw book already in the store, keeping the current
    /// sequence number since no new data was fetched.
    fn republish(&mut self) {
        let current = self.book_tx.borrow().clone();
        if current.is_none() && self.store.get(self.exchange, &self.symbol).is_none() {
            return;
        }
        let sequence = current.as_ref().map_or(0, |c| c.sequence);
        self.publish(sequence, current.as_deref());
    }

    /// `carry` keeps the stale flag of the book being re-rendered.
    fn publish(&mut self, sequence: u64, carry: Option<&PublishedBook>) -> bool {
        let name = self.exchange;
        let Some(book) = self.store.get(self.exchange, &self.symbol) else {
            return false;
        };

        let snapshot = match depth::build_snapshot(&book, self.grouping, &mut self.cache, book.updated_ms) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("[{name}] {} aggregation failed: {e}", self.symbol);
                return false;
            }
        };

        if let Some(price) = snapshot.reference_price() {
            if let Some(options) = self.selector.observe(price) {
                tracing::info!("[{name}] {} bucket options now {:?}", self.symbol, options);
            }
        }

        if let Some(pct) = snapshot.spread_percentage {
            metrics::gauge!("depth_spread_percentage").set(pct);
        }
        metrics::counter!("depth_cycles_published_total").increment(1);

        tracing::debug!(
            "[{name}] {} published #{sequence}: {} bids, {} asks, spread {:?}",
            self.symbol,
            snapshot.bids.len(),
            snapshot.asks.len(),
            snapshot.spread
        );

        self.book_tx.send_replace(Some(Arc::new(PublishedBook {
            sequence,
            snapshot: Arc::new(snapshot),
            stale: carry.is_some_and(|c| c.stale),
            last_error: carry.and_then(|c| c.last_error.clone()),
            bucket_options: self.selector.sizes().to_vec(),
        })));
        true
    }

    fn apply(&mut self, step: NextStep) {
        match step {
            NextStep::Arm => self.deadline = Some(Instant::now() + self.interval),
            NextStep::Fetch(sequence) => {
                self.deadline = None;
                self.spawn_fetch(sequence);
            }
            NextStep::Idle => self.deadline = None,
        }
    }

    fn teardown(&mut self) {
        self.machine.stop();
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.deadline = None;
        self.state_tx.send_replace(CycleState::Idle);
        tracing::info!("[{}] {} refresh scheduler stopped", self.exchange, self.symbol);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
