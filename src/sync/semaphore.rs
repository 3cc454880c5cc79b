//! Counting semaphores and bounded waits.
//!
//! Blocking calls in this driver never sleep on an OS primitive. They poll a
//! condition under a short critical section and back off through an
//! [`embedded_hal::delay::DelayNs`] between attempts, so the same code runs
//! bare-metal, under an RTOS delay, or in host tests with a mock delay.

use embedded_hal::delay::DelayNs;

use super::primitives::CriticalSectionCell;
use crate::driver::error::{IoError, IoResult};
use crate::internal::constants::WAIT_POLL_INTERVAL_US;

// =============================================================================
// Timeout
// =============================================================================

/// How long a blocking call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Check once and fail with [`IoError::Timeout`] if not ready
    NoWait,
    /// Wait until the condition holds
    #[default]
    Forever,
    /// Wait at most this many microseconds
    Micros(u32),
}

impl Timeout {
    /// Wait at most `ms` milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u32) -> Self {
        Timeout::Micros(ms.saturating_mul(1000))
    }
}

/// Poll `ready` until it yields a value or `timeout` expires.
///
/// `ready` runs with no lock held by this function; it is expected to take
/// its own short critical section. On expiry nothing has been consumed.
pub(crate) fn poll_until<T, D, F>(timeout: Timeout, delay: &mut D, mut ready: F) -> IoResult<T>
where
    D: DelayNs,
    F: FnMut() -> Option<T>,
{
    let mut remaining = match timeout {
        Timeout::NoWait => Some(0),
        Timeout::Forever => None,
        Timeout::Micros(us) => Some(us),
    };

    loop {
        if let Some(value) = ready() {
            return Ok(value);
        }
        let step = match remaining {
            Some(0) => return Err(IoError::Timeout),
            Some(us) => {
                let step = us.min(WAIT_POLL_INTERVAL_US);
                remaining = Some(us - step);
                step
            }
            None => WAIT_POLL_INTERVAL_US,
        };
        delay.delay_us(step);
    }
}

// =============================================================================
// Counting Semaphore
// =============================================================================

struct Counter {
    count: usize,
    max: usize,
}

/// Interrupt-safe counting semaphore.
///
/// `give` may be called from the interrupt handler; `take` polls from task
/// context. A semaphore created with [`binary`](Self::binary) saturates at
/// one, which collapses repeated events into a single pending signal.
pub struct CountingSemaphore {
    counter: CriticalSectionCell<Counter>,
}

impl CountingSemaphore {
    /// Create a semaphore holding `initial` units, saturating at `max`.
    pub const fn new(initial: usize, max: usize) -> Self {
        Self {
            counter: CriticalSectionCell::new(Counter {
                count: initial,
                max,
            }),
        }
    }

    /// Create an empty semaphore with no practical upper bound.
    pub const fn unbounded() -> Self {
        Self::new(0, usize::MAX)
    }

    /// Create an empty semaphore that saturates at one unit.
    pub const fn binary() -> Self {
        Self::new(0, 1)
    }

    /// Units currently available.
    pub fn count(&self) -> usize {
        self.counter.with_ref(|c| c.count)
    }

    /// Return one unit. ISR-safe.
    #[inline]
    pub fn give(&self) {
        self.give_n(1);
    }

    /// Return `n` units at once. ISR-safe.
    pub fn give_n(&self, n: usize) {
        self.counter.with(|c| c.count = c.count.saturating_add(n).min(c.max));
    }

    /// Take one unit if available, without waiting.
    pub fn try_take(&self) -> bool {
        self.counter.with(|c| {
            if c.count == 0 {
                false
            } else {
                c.count -= 1;
                true
            }
        })
    }

    /// Take one unit, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// [`IoError::Timeout`] if no unit became available in time.
    pub fn take<D: DelayNs>(&self, timeout: Timeout, delay: &mut D) -> IoResult<()> {
        poll_until(timeout, delay, || self.try_take().then_some(()))
    }

    /// Reset to `count` units with a new ceiling.
    pub fn reset(&self, count: usize, max: usize) {
        self.counter.with(|c| {
            c.max = max;
            c.count = count.min(max);
        });
    }
}

// =============================================================================
// Tests
// =============================================================================
