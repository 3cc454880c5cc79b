//! Synchronization primitives for ISR-safe access.
//!
//! Low-level primitives shared by the send/receive engines and the SLC
//! interrupt handler. Every lock in the driver is a [`CriticalSectionCell`]:
//! the same cell is taken from task context and from the interrupt, and no
//! cell is ever held across a wait.

use core::cell::RefCell;
#[cfg(feature = "async")]
use core::task::Waker;
use critical_section::Mutex;

/// Cell providing interior mutability with critical section protection.
///
/// Combines `critical_section::Mutex` with `RefCell` for safe mutable access
/// from both normal code and interrupt handlers.
pub struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    /// Create a new cell (const, suitable for static initialization).
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Execute a closure with exclusive mutable access.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            let mut value = self.inner.borrow_ref_mut(cs);
            f(&mut value)
        })
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow_mut()
                .ok()
                .map(|mut value| f(&mut value))
        })
    }

    /// Execute a closure with immutable access.
    #[inline]
    pub fn with_ref<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        critical_section::with(|cs| {
            let value = self.inner.borrow_ref(cs);
            f(&value)
        })
    }
}

impl<T: Copy> CriticalSectionCell<T> {
    /// Copy the current value out.
    #[inline]
    pub fn get(&self) -> T {
        self.with_ref(|value| *value)
    }

    /// Overwrite the current value.
    #[inline]
    pub fn set(&self, value: T) {
        self.with(|slot| *slot = value);
    }
}

// SAFETY: CriticalSectionCell uses critical sections to protect all access.
unsafe impl<T> Sync for CriticalSectionCell<T> {}

/// Interrupt-safe waker storage for async I/O.
///
/// Register a waker from async poll, wake from the SLC interrupt handler.
#[cfg(feature = "async")]
pub struct AtomicWaker {
    waker: CriticalSectionCell<Option<Waker>>,
}

#[cfg(feature = "async")]
impl AtomicWaker {
    /// Create a new empty waker (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            waker: CriticalSectionCell::new(None),
        }
    }

    /// Register a waker to be woken later.
    pub fn register(&self, waker: &Waker) {
        self.waker.with(|slot| match slot {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        });
    }

    /// Wake the registered waker, if any (clears the stored waker).
    #[inline]
    pub fn wake(&self) {
        // Wake outside the critical section
        if let Some(w) = self.waker.with(Option::take) {
            w.wake();
        }
    }

    /// Check if a waker is currently registered.
    pub fn is_registered(&self) -> bool {
        self.waker.with_ref(Option::is_some)
    }
}

#[cfg(feature = "async")]
impl Default for AtomicWaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    use super::*;

    #[test]
    fn cell_get_and_set() {
        let cell = CriticalSectionCell::new(7u32);
        assert_eq!(cell.get(), 7);
        cell.set(9);
        assert_eq!(cell.get(), 9);
    }

    #[test]
    fn cell_with_returns_closure_value() {
        let cell = CriticalSectionCell::new(21u32);
        let doubled = cell.with(|v| {
            *v *= 2;
            *v
        });
        assert_eq!(doubled, 42);
        assert_eq!(cell.with_ref(|v| *v), 42);
    }

    #[test]
    fn cell_try_with_fails_while_borrowed() {
        let cell = CriticalSectionCell::new(0u32);
        let nested = cell.with(|_| cell.try_with(|v| *v));
        assert_eq!(nested, None);
        assert_eq!(cell.try_with(|v| *v), Some(0));
    }

    #[test]
    fn cell_usable_as_static() {
        static CELL: CriticalSectionCell<u32> = CriticalSectionCell::new(0);
        CELL.with(|v| *v = 100);
        assert_eq!(CELL.get(), 100);
    }

    #[cfg(feature = "async")]
    mod waker {
        extern crate std;

        use super::super::AtomicWaker;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::task::{Wake, Waker};

        struct CountingWake(AtomicUsize);

        impl Wake for CountingWake {
            fn wake(self: Arc<Self>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn counting_waker() -> (Arc<CountingWake>, Waker) {
            let counter = Arc::new(CountingWake(AtomicUsize::new(0)));
            let waker = Waker::from(counter.clone());
            (counter, waker)
        }

        #[test]
        fn starts_empty() {
            assert!(!AtomicWaker::new().is_registered());
            assert!(!AtomicWaker::default().is_registered());
        }

        #[test]
        fn wake_fires_once_and_clears() {
            let slot = AtomicWaker::new();
            let (counter, waker) = counting_waker();
            slot.register(&waker);
            assert!(slot.is_registered());

            slot.wake();
            slot.wake();
            assert_eq!(counter.0.load(Ordering::SeqCst), 1);
            assert!(!slot.is_registered());
        }

        #[test]
        fn register_replaces_previous_waker() {
            let slot = AtomicWaker::new();
            let (first, first_waker) = counting_waker();
            let (second, second_waker) = counting_waker();
            slot.register(&first_waker);
            slot.register(&second_waker);
            slot.wake();
            assert_eq!(first.0.load(Ordering::SeqCst), 0);
            assert_eq!(second.0.load(Ordering::SeqCst), 1);
        }
    }
}
