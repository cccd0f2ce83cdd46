//! Time source for age derivation and poll delays.
//!
//! The workflow never reads the wall clock directly. Production code uses
//! [`SystemClock`]; tests use [`FixedClock`], which pins "today" and records
//! every requested sleep instead of waiting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;

/// Source of the current date and of delays.
pub trait Clock: Send + Sync {
    /// Today's date in the operator's local calendar.
    fn today(&self) -> NaiveDate;

    /// Suspend for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// The local wall clock and tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// A clock pinned to one date whose sleeps return immediately.
///
/// Clones share the sleep log, so a test can keep one clone and hand the
/// other to the code under test.
#[derive(Debug, Clone)]
pub struct FixedClock {
    today: NaiveDate,
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl FixedClock {
    /// A clock whose `today()` is always `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            slept: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }

    /// Sum of all requested sleeps.
    pub fn elapsed(&self) -> Duration {
        self.slept.lock().iter().sum()
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.slept.lock().push(duration);
        tokio::task::yield_now()
    }
}
