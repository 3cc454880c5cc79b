//! Synchronization and Concurrency Support
//!
//! This module provides the primitives every other part of the driver
//! builds on:
//!
//! - **Primitives** (`primitives`): Low-level synchronization types
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!   - [`AtomicWaker`] - Async waker storage for interrupts
//!
//! - **Semaphores** (`semaphore`): Bounded waits
//!   - [`CountingSemaphore`] - ISR-safe give, polling take
//!   - [`Timeout`] - How long a blocking call may wait
//!
//! - **Async Support** (`asynch`): Futures for receive, send completion and
//!   host interrupts, woken by the driver's interrupt handler
//!
//! # Feature Flags
//!
//! - `async`: Enables the `asynch` module and [`AtomicWaker`]

mod primitives;
mod semaphore;

#[cfg(feature = "async")]
pub use primitives::AtomicWaker;
pub use primitives::CriticalSectionCell;

pub(crate) use semaphore::poll_until;
pub use semaphore::{CountingSemaphore, Timeout};

#[cfg(feature = "async")]
pub mod asynch;

#[cfg(feature = "async")]
pub use asynch::{FinishedFuture, HostIntFuture, RecvFuture, SlaveWakers};
