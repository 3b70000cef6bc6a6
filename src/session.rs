use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, FixedOffset, Utc};
use tokio::{
    sync::watch,
    task::{JoinHandle, JoinSet},
    time::{Instant, MissedTickBehavior},
};

use crate::{
    cache::SnapshotCache,
    clock::Clock,
    config::{BoardConfig, Theme},
    error::FetchError,
    fetcher::{FetchOutcome, SnapshotFetcher},
    http::HttpClient,
    model::{ArrivalSnapshot, StopIdentity},
    projector::{self, ProjectedItem, ReferenceClock},
    schedule,
    store::KeyValueStore,
};

const TICK: Duration = Duration::from_secs(1);

/// The capabilities a board runs against.
#[derive(Clone)]
pub struct BoardDeps {
    pub http: Arc<dyn HttpClient>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

/// One rendering of the board: the countdown list as of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardFrame {
    pub identity: StopIdentity,
    pub stop_name: Option<String>,
    pub stop_city: Option<String>,
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
    pub items: Vec<ProjectedItem>,
    pub error: Option<String>,
    pub has_snapshot: bool,
}

struct SessionState {
    snapshot: Option<Arc<ArrivalSnapshot>>,
    reference: ReferenceClock,
    error: Option<String>,
    /// Sequence stamp of the newest attempt applied, successful or not.
    applied_attempt: u64,
    closed: bool,
}

struct Shared {
    identity: StopIdentity,
    offset: FixedOffset,
    state: Mutex<SessionState>,
    frames: watch::Sender<BoardFrame>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn frame(&self, state: &SessionState) -> BoardFrame {
        let items = match &state.snapshot {
            Some(snapshot) => projector::project(&snapshot.items, &state.reference, self.offset),
            None => vec![],
        };
        let stop = state.snapshot.as_ref().map(|snapshot| &snapshot.stop);
        BoardFrame {
            identity: self.identity.clone(),
            stop_name: stop.and_then(|stop| stop.name.clone()),
            stop_city: stop.and_then(|stop| stop.city.clone()),
            now: state.reference.now(),
            offset: self.offset,
            items,
            error: state.error.clone(),
            has_snapshot: state.snapshot.is_some(),
        }
    }

    /// Publishes under the state lock, so nothing is sent once `closed` is set.
    fn publish(&self, state: &SessionState) {
        if !state.closed {
            self.frames.send_replace(self.frame(state));
        }
    }

    fn tick(&self) {
        let mut state = self.lock();
        state.reference.tick();
        self.publish(&state);
    }

    fn bootstrap(&self, snapshot: ArrivalSnapshot) {
        let mut state = self.lock();
        if state.snapshot.is_none() {
            state.snapshot = Some(Arc::new(snapshot));
            self.publish(&state);
        }
    }

    fn begin_attempt(&self) {
        let mut state = self.lock();
        if state.error.take().is_some() {
            self.publish(&state);
        }
    }

    /// Applies a finished attempt unless a later-started one was already
    /// applied; a failure counts as applied too, so an older success arriving
    /// after it is dropped. Returns the snapshot to cache, if it was shown.
    fn complete_attempt(
        &self,
        attempt: u64,
        result: Result<FetchOutcome, FetchError>,
    ) -> Option<Arc<ArrivalSnapshot>> {
        let mut state = self.lock();
        if attempt < state.applied_attempt {
            log::debug!(
                "Discarding fetch #{} for {}:{}, #{} is already applied",
                attempt,
                self.identity.city,
                self.identity.stop_id,
                state.applied_attempt
            );
            return None;
        }
        state.applied_attempt = attempt;
        match result {
            Ok(outcome) => {
                let snapshot = Arc::new(outcome.snapshot);
                state.snapshot = Some(snapshot.clone());
                state.reference.reset(outcome.server_now);
                state.error = None;
                self.publish(&state);
                (!state.closed).then_some(snapshot)
            }
            Err(err) => {
                log::warn!(
                    "Fetching arrivals for {}:{} failed: {}",
                    self.identity.city,
                    self.identity.stop_id,
                    err
                );
                state.error = Some(err.to_string());
                self.publish(&state);
                None
            }
        }
    }

    /// Returns whether this call was the one that closed the session.
    fn close(&self) -> bool {
        let mut state = self.lock();
        !std::mem::replace(&mut state.closed, true)
    }
}

/// A running board for one configuration: the cache bootstrap, the jittered
/// fetch timer and the one-second tick timer. Dropping it stops all of them.
pub struct BoardSession {
    shared: Arc<Shared>,
    fetch_task: JoinHandle<()>,
    tick_task: JoinHandle<()>,
}

impl BoardSession {
    /// Must be called from within a tokio runtime.
    pub fn start(config: &BoardConfig, deps: &BoardDeps) -> Self {
        let identity = config.identity.clone();
        let offset = deps.clock.local_offset();
        let reference = ReferenceClock::new(deps.clock.now());
        let initial = BoardFrame {
            identity: identity.clone(),
            stop_name: None,
            stop_city: None,
            now: reference.now(),
            offset,
            items: vec![],
            error: None,
            has_snapshot: false,
        };
        let (frames, _) = watch::channel(initial);
        let shared = Arc::new(Shared {
            identity: identity.clone(),
            offset,
            state: Mutex::new(SessionState {
                snapshot: None,
                reference,
                error: None,
                applied_attempt: 0,
                closed: false,
            }),
            frames,
        });

        let fetcher = Arc::new(SnapshotFetcher::new(
            identity,
            &config.api_base,
            deps.http.clone(),
            deps.clock.clone(),
        ));
        let cache = SnapshotCache::new(deps.store.clone());
        let delay = schedule::fetch_delay(config.refresh, &mut rand::rng());
        log::info!(
            "Starting board for {}:{} ({}), polling every {:?}",
            config.identity.city,
            config.identity.stop_id,
            if fetcher.is_demo() { "demo" } else { config.api_base.as_str() },
            delay
        );

        let fetch_task = tokio::spawn(run_fetch_loop(shared.clone(), fetcher, cache, delay));
        let tick_task = tokio::spawn(run_tick_loop(shared.clone()));
        BoardSession {
            shared,
            fetch_task,
            tick_task,
        }
    }

    pub fn identity(&self) -> &StopIdentity {
        &self.shared.identity
    }

    pub fn frames(&self) -> watch::Receiver<BoardFrame> {
        self.shared.frames.subscribe()
    }

    pub fn current(&self) -> BoardFrame {
        self.shared.frames.borrow().clone()
    }

    /// Cancels both timers and any fetch in flight. Idempotent.
    pub fn stop(&self) {
        if self.shared.close() {
            log::debug!(
                "Stopped board for {}:{}",
                self.shared.identity.city,
                self.shared.identity.stop_id
            );
        }
        self.fetch_task.abort();
        self.tick_task.abort();
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_fetch_loop(
    shared: Arc<Shared>,
    fetcher: Arc<SnapshotFetcher>,
    cache: SnapshotCache,
    delay: Duration,
) {
    if let Some(snapshot) = cache.load(fetcher.identity()).await {
        log::info!(
            "Showing cached arrivals for {}:{}",
            shared.identity.city,
            shared.identity.stop_id
        );
        shared.bootstrap(snapshot);
    }

    // The first tick fires immediately.
    let mut interval = tokio::time::interval(delay);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Dropping the set aborts attempts still in flight.
    let mut in_flight = JoinSet::new();
    let mut attempts = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                attempts += 1;
                let attempt = attempts;
                shared.begin_attempt();
                let fetcher = fetcher.clone();
                in_flight.spawn(async move { (attempt, fetcher.fetch().await) });
            }
            Some(joined) = in_flight.join_next() => {
                let (attempt, result) = match joined {
                    Ok(finished) => finished,
                    Err(err) => {
                        log::warn!("Fetch task failed: {}", err);
                        continue;
                    }
                };
                if let Some(snapshot) = shared.complete_attempt(attempt, result) {
                    if let Err(err) = cache.save(&shared.identity, &snapshot).await {
                        log::warn!("Writing arrivals cache failed: {}", err);
                    }
                }
            }
        }
    }
}

async fn run_tick_loop(shared: Arc<Shared>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
    loop {
        ticker.tick().await;
        shared.tick();
    }
}

/// Owns the running session and swaps it when the configuration changes.
pub struct Board {
    config: BoardConfig,
    deps: BoardDeps,
    session: BoardSession,
}

impl Board {
    pub fn start(config: BoardConfig, deps: BoardDeps) -> Self {
        let session = BoardSession::start(&config, &deps);
        Board {
            config,
            deps,
            session,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn frames(&self) -> watch::Receiver<BoardFrame> {
        self.session.frames()
    }

    pub fn current(&self) -> BoardFrame {
        self.session.current()
    }

    /// Applies a new configuration. Returns `true` when the session was
    /// restarted; receivers from [`Board::frames`] must then be replaced.
    pub fn reconfigure(&mut self, config: BoardConfig) -> bool {
        let restart = self.config.needs_restart(&config);
        if restart {
            // The old session is stopped before the new one starts.
            self.session.stop();
            self.session = BoardSession::start(&config, &self.deps);
        }
        self.config = config;
        restart
    }

    pub fn cycle_theme(&mut self) -> Theme {
        self.config.theme = self.config.theme.next();
        self.config.theme
    }
}
