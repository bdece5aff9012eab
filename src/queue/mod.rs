//! Lane scheduler in front of the single shared connection.
//!
//! At most one lane is current. A serial lane runs one call at a time; a
//! parallel lane runs up to `parallel_concurrency`. When the required lane
//! kind changes, the new lane is created paused and only receives permits
//! once every call admitted to its predecessor has finished.

mod registry;

pub use registry::Operation;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use tokio::sync::{Notify, Semaphore};

use crate::error::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaneKind {
    Serial,
    Parallel,
}

impl LaneKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            LaneKind::Serial => "serial",
            LaneKind::Parallel => "parallel",
        }
    }
}

/// Handle to the shared connection. Each `call` is one blocking step run on
/// the blocking pool; the connection is `None` once the store has closed.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Database {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("database connection mutex poisoned"))?;
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }

    /// Removes the connection from the handle. Later calls fail with
    /// [`StoreError::Closed`].
    pub fn take(&self) -> Result<Option<Connection>> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))?;
        Ok(guard.take())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Counter updates never panic while held, so a poisoned guard is still
    // consistent.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct LaneCounters {
    admitted: usize,
    opened: bool,
    sealed: bool,
    successor: Option<Arc<Lane>>,
}

struct Lane {
    kind: LaneKind,
    capacity: usize,
    semaphore: Semaphore,
    counters: Mutex<LaneCounters>,
}

impl Lane {
    fn new(kind: LaneKind, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            kind,
            capacity,
            semaphore: Semaphore::new(0),
            counters: Mutex::new(LaneCounters::default()),
        })
    }

    fn admit(&self) {
        lock(&self.counters).admitted += 1;
    }

    /// Seals the lane and records the lane that runs after it. If nothing is
    /// left to drain the successor opens right away.
    fn seal(&self, successor: Arc<Lane>) {
        let ready = {
            let mut counters = lock(&self.counters);
            counters.sealed = true;
            if counters.opened && counters.admitted == 0 {
                Some(successor)
            } else {
                counters.successor = Some(successor);
                None
            }
        };
        if let Some(next) = ready {
            next.open();
        }
    }

    fn release(&self) {
        let next = {
            let mut counters = lock(&self.counters);
            counters.admitted = counters.admitted.saturating_sub(1);
            if counters.opened && counters.sealed && counters.admitted == 0 {
                counters.successor.take()
            } else {
                None
            }
        };
        if let Some(next) = next {
            next.open();
        }
    }

    /// Hands the lane its permits. A lane that was sealed while paused and
    /// whose calls were all abandoned passes straight through to its own
    /// successor.
    fn open(self: &Arc<Self>) {
        let mut lane = Arc::clone(self);
        loop {
            let next = {
                let mut counters = lock(&lane.counters);
                if counters.opened {
                    return;
                }
                counters.opened = true;
                lane.semaphore.add_permits(lane.capacity);
                if counters.sealed && counters.admitted == 0 {
                    counters.successor.take()
                } else {
                    None
                }
            };
            tracing::trace!(lane = lane.kind.as_str(), "lane opened");
            match next {
                Some(next) => lane = next,
                None => return,
            }
        }
    }
}

struct Admission {
    lane: Arc<Lane>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        self.lane.release();
    }
}

struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
}

impl<'a> InFlightGuard<'a> {
    fn enter(in_flight: &'a InFlight) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}

pub struct QueryQueue {
    db: Database,
    parallel_concurrency: usize,
    current: Mutex<Option<Arc<Lane>>>,
    in_flight: InFlight,
}

impl QueryQueue {
    pub fn new(db: Database, parallel_concurrency: usize) -> Self {
        Self {
            db,
            parallel_concurrency: parallel_concurrency.max(1),
            current: Mutex::new(None),
            in_flight: InFlight {
                count: AtomicUsize::new(0),
                idle: Notify::new(),
            },
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn capacity(&self, kind: LaneKind) -> usize {
        match kind {
            LaneKind::Serial => 1,
            LaneKind::Parallel => self.parallel_concurrency,
        }
    }

    /// Picks the lane for a new call and admits the call to it.
    fn admit(&self, kind: LaneKind) -> Admission {
        let mut current = lock(&self.current);
        if let Some(lane) = current.as_ref().filter(|lane| lane.kind == kind) {
            let lane = Arc::clone(lane);
            lane.admit();
            return Admission { lane };
        }

        let next = Lane::new(kind, self.capacity(kind));
        next.admit();
        match current.replace(Arc::clone(&next)) {
            Some(previous) => {
                tracing::debug!(
                    from = previous.kind.as_str(),
                    to = kind.as_str(),
                    "switching query lane"
                );
                previous.seal(Arc::clone(&next));
            }
            None => next.open(),
        }
        Admission { lane: next }
    }

    /// Runs `f` in a lane of the given kind once the lane has room. Errors
    /// from `f` go back to the caller only; the next queued call still runs.
    pub async fn enqueue<T, F, Fut>(&self, kind: LaneKind, f: F) -> Result<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _in_flight = InFlightGuard::enter(&self.in_flight);
        let admission = self.admit(kind);
        let _permit = admission
            .lane
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow!("query lane closed"))?;
        f(self.db.clone()).await
    }

    pub fn pending(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Resolves once no call is queued or running.
    pub async fn drain(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            if self.pending() == 0 {
                return;
            }
            idle.await;
        }
    }
}
