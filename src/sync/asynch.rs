//! Async/await support for SDIO slave operations.
//!
//! Provides futures and per-driver wakers. The wakers are woken by
//! [`SdioSlave::handle_interrupt`], so no extra interrupt handler is needed:
//! the same ISR serves blocking and async callers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        User Code                            │
//! │   let done = SLAVE.recv_async().await?;                     │
//! │   let token = SLAVE.get_finished_async().await?;            │
//! └─────────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          RecvFuture / FinishedFuture / HostIntFuture        │
//! │   - Try the non-blocking operation                          │
//! │   - Register the waker, then try again                      │
//! └─────────────────────────────────────────────────────────────┘
//!                             │
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SdioSlave::handle_interrupt                 │
//! │   - send group  -> wakers.send                              │
//! │   - recv group  -> wakers.recv                              │
//! │   - host bit n  -> wakers.host[n]                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use super::primitives::AtomicWaker;
use crate::driver::config::State;
use crate::driver::error::{ConfigError, Error, IoError, Result};
use crate::driver::interrupt::InterruptStatus;
use crate::driver::slave::SdioSlave;
use crate::hal::SlaveHal;
use crate::internal::constants::HOST_INT_BITS;
use crate::internal::dma::RecvCompletion;

/// Wakers owned by one driver instance.
pub struct SlaveWakers {
    /// Send run finished
    pub send: AtomicWaker,
    /// Receive buffer filled
    pub recv: AtomicWaker,
    /// Host to slave interrupt `n`
    pub host: [AtomicWaker; HOST_INT_BITS],
}

impl SlaveWakers {
    /// Create empty wakers (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            send: AtomicWaker::new(),
            recv: AtomicWaker::new(),
            host: [const { AtomicWaker::new() }; HOST_INT_BITS],
        }
    }

    /// Wake whatever a dispatched status has work for.
    pub fn wake_for(&self, status: InterruptStatus) {
        if status.send() {
            self.send.wake();
        }
        if status.recv_done {
            self.recv.wake();
        }
        for pos in status.host_interrupts() {
            self.host[usize::from(pos)].wake();
        }
    }

    /// Wake everything, so pending futures observe a state change.
    pub fn wake_all(&self) {
        self.send.wake();
        self.recv.wake();
        for waker in &self.host {
            waker.wake();
        }
    }
}

impl Default for SlaveWakers {
    fn default() -> Self {
        Self::new()
    }
}

fn closed<H: SlaveHal, const S: usize, const R: usize>(slave: &SdioSlave<H, S, R>) -> bool {
    slave.state() == State::Uninitialized
}

/// Future for [`SdioSlave::recv_async`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct RecvFuture<'a, H: SlaveHal, const S: usize, const R: usize> {
    slave: &'a SdioSlave<H, S, R>,
}

impl<H: SlaveHal, const S: usize, const R: usize> Future for RecvFuture<'_, H, S, R> {
    type Output = Result<RecvCompletion>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let slave = self.slave;
        if closed(slave) {
            return Poll::Ready(Err(ConfigError::NotInitialized.into()));
        }
        if let Some(done) = slave.try_recv() {
            return Poll::Ready(Ok(done));
        }
        slave.wakers.recv.register(cx.waker());
        match slave.try_recv() {
            Some(done) => Poll::Ready(Ok(done)),
            None => Poll::Pending,
        }
    }
}

/// Future for [`SdioSlave::get_finished_async`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct FinishedFuture<'a, H: SlaveHal, const S: usize, const R: usize> {
    slave: &'a SdioSlave<H, S, R>,
}

impl<H: SlaveHal, const S: usize, const R: usize> Future for FinishedFuture<'_, H, S, R> {
    type Output = Result<usize>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let slave = self.slave;
        if closed(slave) {
            return Poll::Ready(Err(ConfigError::NotInitialized.into()));
        }
        if let Some(token) = slave.try_get_finished() {
            return Poll::Ready(Ok(token));
        }
        slave.wakers.send.register(cx.waker());
        match slave.try_get_finished() {
            Some(token) => Poll::Ready(Ok(token)),
            None => Poll::Pending,
        }
    }
}

/// Future for [`SdioSlave::wait_int_async`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct HostIntFuture<'a, H: SlaveHal, const S: usize, const R: usize> {
    slave: &'a SdioSlave<H, S, R>,
    pos: u8,
}

impl<H: SlaveHal, const S: usize, const R: usize> Future for HostIntFuture<'_, H, S, R> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let (slave, pos) = (self.slave, self.pos);
        if closed(slave) {
            return Poll::Ready(Err(ConfigError::NotInitialized.into()));
        }
        let Some(waker) = slave.wakers.host.get(usize::from(pos)) else {
            return Poll::Ready(Err(Error::Io(IoError::InvalidInterrupt)));
        };
        if slave.try_take_host_event(pos)? {
            return Poll::Ready(Ok(()));
        }
        waker.register(cx.waker());
        if slave.try_take_host_event(pos)? {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }
}

impl<H: SlaveHal, const S: usize, const R: usize> SdioSlave<H, S, R> {
    /// Wait for the host to fill the oldest loaded buffer.
    ///
    /// Resolves with `NotInitialized` if the driver is deinitialized while
    /// waiting.
    pub fn recv_async(&self) -> RecvFuture<'_, H, S, R> {
        RecvFuture { slave: self }
    }

    /// Wait for the token of the next buffer the host has read.
    pub fn get_finished_async(&self) -> FinishedFuture<'_, H, S, R> {
        FinishedFuture { slave: self }
    }

    /// Wait for the host to raise general purpose interrupt `pos` (0-7).
    pub fn wait_int_async(&self, pos: u8) -> HostIntFuture<'_, H, S, R> {
        HostIntFuture { slave: self, pos }
    }
}

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    extern crate std;

    use super::*;
    use crate::driver::config::SlaveConfig;
    use crate::driver::interrupt::RECV_DONE;
    use crate::sync::Timeout;
    use crate::testing::{MockDelay, MockInterruptController, MockSlaveHal, dma_buffer};
    use core::pin::pin;
    use core::task::Waker;
    use std::boxed::Box;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;

    struct WakeCounter {
        count: AtomicUsize,
    }

    impl WakeCounter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                count: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    impl Wake for WakeCounter {
        fn wake(self: Arc<Self>) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    type TestSlave = SdioSlave<MockSlaveHal, 5, 4>;

    fn noop_isr() {}

    fn running() -> (&'static TestSlave, MockInterruptController) {
        let slave: &'static TestSlave = Box::leak(Box::new(SdioSlave::new(MockSlaveHal::new())));
        let mut intc = MockInterruptController::new();
        slave.initialize(SlaveConfig::new(), &mut intc, noop_isr).unwrap();
        slave.start().unwrap();
        slave.handle_interrupt();
        (slave, intc)
    }

    #[test]
    fn wake_for_targets_groups() {
        let wakers = SlaveWakers::new();
        let (send, recv, host3) = (WakeCounter::new(), WakeCounter::new(), WakeCounter::new());
        wakers.send.register(&Waker::from(send.clone()));
        wakers.recv.register(&Waker::from(recv.clone()));
        wakers.host[3].register(&Waker::from(host3.clone()));

        wakers.wake_for(InterruptStatus::from_raw(RECV_DONE | 1 << 3));
        assert_eq!((send.count(), recv.count(), host3.count()), (0, 1, 1));

        wakers.send.register(&Waker::from(send.clone()));
        wakers.wake_all();
        assert_eq!(send.count(), 1);
        assert!(!wakers.host[3].is_registered());
    }

    #[test]
    fn recv_future_wakes_on_completion() {
        let (slave, _intc) = running();
        let handle = slave.register_buffer(dma_buffer(512)).unwrap();
        slave.load_buffer(handle).unwrap();

        let counter = WakeCounter::new();
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);
        let mut fut = pin!(slave.recv_async());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        assert!(slave.simulate_host_write(64));
        slave.handle_interrupt();
        assert_eq!(counter.count(), 1);

        let Poll::Ready(Ok(done)) = fut.as_mut().poll(&mut cx) else {
            panic!("receive future did not resolve");
        };
        assert_eq!(done.handle, handle);
        assert_eq!(done.len, 64);
    }

    #[test]
    fn finished_future_yields_token() {
        let (slave, _intc) = running();
        let data: &'static [u8] = dma_buffer(8);
        slave.enqueue(data, 42, Timeout::NoWait, &mut MockDelay::new()).unwrap();
        slave.handle_interrupt();

        let counter = WakeCounter::new();
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);
        let mut fut = pin!(slave.get_finished_async());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        assert!(slave.simulate_send_done());
        slave.handle_interrupt();
        assert_eq!(counter.count(), 1);
        assert!(matches!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(42))));
    }

    #[test]
    fn reset_wakes_pending_finished_future() {
        let (slave, _intc) = running();
        let data: &'static [u8] = dma_buffer(8);
        slave.enqueue(data, 42, Timeout::NoWait, &mut MockDelay::new()).unwrap();
        slave.handle_interrupt();

        let counter = WakeCounter::new();
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);
        let mut fut = pin!(slave.get_finished_async());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        slave.stop().unwrap();
        slave.reset().unwrap();
        assert_eq!(counter.count(), 1);
        assert!(matches!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(42))));
    }

    #[test]
    fn restart_wakes_recv_future_for_missed_completion() {
        let (slave, _intc) = running();
        let handle = slave.register_buffer(dma_buffer(512)).unwrap();
        slave.load_buffer(handle).unwrap();

        let counter = WakeCounter::new();
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);
        let mut fut = pin!(slave.recv_async());
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        assert!(slave.simulate_host_write(24));
        slave.stop().unwrap();
        slave.start().unwrap();
        assert_eq!(counter.count(), 1);

        let Poll::Ready(Ok(done)) = fut.as_mut().poll(&mut cx) else {
            panic!("receive future did not resolve");
        };
        assert_eq!((done.handle, done.len), (handle, 24));
    }

    #[test]
    fn host_int_future_and_deinit() {
        let (slave, mut intc) = running();
        let counter = WakeCounter::new();
        let waker = Waker::from(counter.clone());
        let mut cx = Context::from_waker(&waker);

        let mut bad = pin!(slave.wait_int_async(9));
        assert!(matches!(
            bad.as_mut().poll(&mut cx),
            Poll::Ready(Err(Error::Io(IoError::InvalidInterrupt)))
        ));

        let mut fut = pin!(slave.wait_int_async(2));
        assert!(fut.as_mut().poll(&mut cx).is_pending());
        slave.hal().raise(1 << 2);
        slave.handle_interrupt();
        assert_eq!(counter.count(), 1);
        assert!(matches!(fut.as_mut().poll(&mut cx), Poll::Ready(Ok(()))));

        let mut fut = pin!(slave.wait_int_async(2));
        assert!(fut.as_mut().poll(&mut cx).is_pending());
        slave.deinitialize(&mut intc).unwrap();
        assert_eq!(counter.count(), 2);
        assert!(matches!(
            fut.as_mut().poll(&mut cx),
            Poll::Ready(Err(Error::Config(ConfigError::NotInitialized)))
        ));
    }
}
