//! The concurrent aggregation engine.
//!
//! One run fetches the facility listing, then fans out one task per facility
//! through a semaphore admission gate. Each task fetches the facility's
//! detail attributes and, when a stay window was requested, its capacity
//! records. Results are merged into pre-allocated slots that preserve the
//! listing order regardless of completion order. The only shared mutable
//! state is the slot vector and the invalidation flag, both touched under a
//! short critical section that is never held across network I/O.

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::availability;
use crate::client::{ApiError, ReservationApi};
use crate::config::AggregatorConfig;
use crate::errors::AggregateError;
use crate::metrics_defs;
use crate::protocol::{self, AttrMap, StayWindow};

/// Receiver for the "credentials are no longer valid" signal.
///
/// Invoked at most once per aggregation run, no matter how many concurrent
/// tasks observe an authentication rejection.
pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self);
}

/// Caller-supplied parameters for one aggregation run.
#[derive(Clone, Debug, Default)]
pub struct AggregateQuery {
    /// Exact match against the facility's country attribute.
    /// `None` or an empty string keeps every facility.
    pub country_filter: Option<String>,

    /// When present, every surviving facility's entry gets an
    /// `isAvailable` verdict for this window.
    pub window: Option<StayWindow>,
}

/// Shared state of one run. Tasks merge into `slots` under the mutex;
/// `invalidated` is the check-and-set guard in front of the sink.
struct RunState {
    slots: Mutex<Vec<AttrMap>>,
    invalidated: AtomicBool,
    sink: Arc<dyn InvalidationSink>,
}

impl RunState {
    fn signal_invalidation(&self) {
        if !self.invalidated.swap(true, Ordering::SeqCst) {
            metrics::counter!(metrics_defs::SESSION_INVALIDATIONS.name).increment(1);
            self.sink.invalidate();
        }
    }
}

pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Runs one full aggregation: listing fetch, fan-out, merge.
    ///
    /// A listing fetch or decode failure is fatal to the whole call. A
    /// listing-level authentication rejection additionally fires the
    /// invalidation sink. Per-facility failures never surface here; they
    /// degrade only the affected entry.
    pub async fn aggregate<A>(
        &self,
        api: Arc<A>,
        query: &AggregateQuery,
        sink: Arc<dyn InvalidationSink>,
    ) -> Result<Vec<AttrMap>, AggregateError>
    where
        A: ReservationApi + 'static,
    {
        let listing = match api.list_facilities().await {
            Ok(listing) => listing,
            Err(ApiError::AuthRejected) => {
                metrics::counter!(metrics_defs::SESSION_INVALIDATIONS.name).increment(1);
                sink.invalidate();
                return Err(AggregateError::Unauthorized);
            }
            Err(err) => return Err(AggregateError::Listing(err)),
        };

        Ok(self.aggregate_facilities(api, listing, query, sink).await)
    }

    /// Fan-out over an already-fetched listing.
    ///
    /// Returns one entry per facility that matches the country filter and
    /// carries a usable id, in listing order. The call completes only after
    /// every dispatched task has finished; there is no early return and no
    /// cross-task cancellation.
    pub async fn aggregate_facilities<A>(
        &self,
        api: Arc<A>,
        listing: Vec<AttrMap>,
        query: &AggregateQuery,
        sink: Arc<dyn InvalidationSink>,
    ) -> Vec<AttrMap>
    where
        A: ReservationApi + 'static,
    {
        let started = Instant::now();
        let survivors = filter_listing(listing, query.country_filter.as_deref());

        // With a window requested every entry carries a verdict; it starts out
        // unavailable and only a successful evaluation flips it.
        let mut slots: Vec<AttrMap> = survivors.iter().map(|(_, attrs)| attrs.clone()).collect();
        if query.window.is_some() {
            for slot in &mut slots {
                slot.insert(protocol::AVAILABLE_KEY.to_string(), JsonValue::Bool(false));
            }
        }

        let state = Arc::new(RunState {
            slots: Mutex::new(slots),
            invalidated: AtomicBool::new(false),
            sink,
        });

        let gate = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let task_timeout = Duration::from_secs(self.config.task_timeout_secs);
        let mut join_set = JoinSet::new();

        for (index, (id, _)) in survivors.iter().enumerate() {
            let api = api.clone();
            let gate = gate.clone();
            let state = state.clone();
            let id = id.clone();
            let window = query.window;

            join_set.spawn(async move {
                let Ok(_permit) = gate.acquire_owned().await else {
                    return;
                };

                let task = fetch_and_merge(api.as_ref(), &id, index, window.as_ref(), &state);
                if tokio::time::timeout(task_timeout, task).await.is_err() {
                    metrics::counter!(metrics_defs::TASK_TIMEOUTS.name).increment(1);
                    tracing::warn!(facility = %id, "per-facility fetch timed out");
                }
            });
        }

        // Completion barrier: every task finishes, success or failure.
        while join_set.join_next().await.is_some() {}

        metrics::histogram!(metrics_defs::AGGREGATE_DURATION.name)
            .record(started.elapsed().as_secs_f64());

        match Arc::try_unwrap(state) {
            Ok(state) => state.slots.into_inner(),
            Err(state) => state.slots.lock().clone(),
        }
    }
}

/// Applies the country filter and drops facilities without a usable id.
fn filter_listing(listing: Vec<AttrMap>, country: Option<&str>) -> Vec<(String, AttrMap)> {
    let mut survivors = Vec::with_capacity(listing.len());
    for attrs in listing {
        if let Some(country) = country
            && !country.is_empty()
            && protocol::facility_country(&attrs) != Some(country)
        {
            continue;
        }
        let Some(id) = protocol::facility_id(&attrs) else {
            tracing::debug!("skipping facility without a usable id");
            continue;
        };
        survivors.push((id, attrs));
    }
    survivors
}

/// One facility's work: detail fetch, optional availability check, merge.
async fn fetch_and_merge<A>(
    api: &A,
    id: &str,
    index: usize,
    window: Option<&StayWindow>,
    state: &RunState,
) where
    A: ReservationApi + ?Sized,
{
    let detail = match api.fetch_detail(id).await {
        Ok(detail) => detail,
        Err(ApiError::AuthRejected) => {
            state.signal_invalidation();
            return;
        }
        Err(ApiError::Decode(reason)) => {
            // The upstream sometimes returns a decodable listing entry whose
            // detail payload is junk; keep the listing attributes and still
            // attempt the availability check.
            tracing::warn!(facility = %id, %reason, "undecodable facility detail");
            AttrMap::new()
        }
        Err(err) => {
            metrics::counter!(metrics_defs::DETAIL_FETCH_FAILURES.name).increment(1);
            tracing::warn!(facility = %id, error = %err, "facility detail fetch failed");
            return;
        }
    };

    let is_available = match window {
        Some(window) => Some(check_window(api, id, window, state).await),
        None => None,
    };

    let mut slots = state.slots.lock();
    let slot = &mut slots[index];
    for (key, value) in detail {
        slot.insert(key, value);
    }
    if let Some(verdict) = is_available {
        slot.insert(protocol::AVAILABLE_KEY.to_string(), JsonValue::Bool(verdict));
    }
}

/// Fetches capacity records and evaluates the window; any failure reads as
/// "not available" for this facility only.
async fn check_window<A>(api: &A, id: &str, window: &StayWindow, state: &RunState) -> bool
where
    A: ReservationApi + ?Sized,
{
    let err = match api.fetch_availability(id).await {
        Ok(records) => return availability::is_available(&records, window),
        Err(err) => err,
    };

    if matches!(err, ApiError::AuthRejected) {
        state.signal_invalidation();
    } else {
        metrics::counter!(metrics_defs::AVAILABILITY_FETCH_FAILURES.name).increment(1);
    }
    tracing::warn!(facility = %id, error = %err, "availability fetch failed");
    false
}
