//! Send (slave to host) engine.
//!
//! Buffers are committed into a [`RingBuffer`] of descriptor slots whose
//! link words form a permanent circle. A run handed to the DMA engine is a
//! contiguous range of that circle, cut loose by nulling the link word of
//! its last slot. When the run completes the cut is repaired, the slots are
//! released and the run's tokens are queued for [`SendEngine::get_finished`].
//!
//! ```text
//!        +----+   +----+   +----+   +----+
//!   +--> | s0 |-->| s1 |-->| s2 |-x | s3 |--+     run = s0..=s2
//!   |    +----+   +----+   +----+   +----+  |     detached_next = s3
//!   +---------------------------------------+
//! ```

use embedded_hal::delay::DelayNs;
use heapless::Deque;

use super::descriptor::{DmaDescriptor, VolatileCell};
use super::ring::{RingBuffer, SlotRange};
use crate::driver::config::SendingMode;
use crate::driver::error::{ConfigError, DmaError, IoError, IoResult, Result};
use crate::driver::interrupt::{InterruptStatus, SEND_INTERRUPTS, SEND_INVOKE};
use crate::hal::SlaveHal;
use crate::internal::constants::{DMA_ALIGNMENT, MAX_BUFFER_LEN, SEND_LENGTH_MASK};
use crate::sync::{CountingSemaphore, CriticalSectionCell, Timeout, poll_until};

// =============================================================================
// Send Slot
// =============================================================================

/// One ring slot: the hardware descriptor plus the bookkeeping the hardware
/// never reads.
#[repr(C)]
pub(crate) struct SendSlot {
    desc: DmaDescriptor,
    token: VolatileCell<usize>,
    cumulative_len: VolatileCell<u32>,
}

impl SendSlot {
    pub(crate) const fn new() -> Self {
        Self {
            desc: DmaDescriptor::new(),
            token: VolatileCell::new(0),
            cumulative_len: VolatileCell::new(0),
        }
    }

    pub(crate) fn descriptor(&self) -> &DmaDescriptor {
        &self.desc
    }

    pub(crate) fn cumulative_len(&self) -> u32 {
        self.cumulative_len.get()
    }
}

// =============================================================================
// State Machine
// =============================================================================

/// Send engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendState {
    /// DMA stopped, interrupts disarmed
    Idle,
    /// Armed; the next queued buffers start a run
    WaitingForRun,
    /// One run is owned by the DMA engine
    Sending,
}

struct RunState {
    state: SendState,
    mode: SendingMode,
    /// Slots handed to hardware, also the ring's outstanding drain
    in_flight: Option<SlotRange>,
    /// Slot the run's tail linked to before it was cut
    detached_next: Option<usize>,
}

/// Interrupt-driven send engine over `N` slots.
pub struct SendEngine<const N: usize> {
    ring: RingBuffer<SendSlot, N>,
    run: CriticalSectionCell<RunState>,
    finished: CriticalSectionCell<Deque<usize, N>>,
    /// Tokens the application may still have outstanding (queued, in flight,
    /// or waiting in `finished`). Keeps the completion queue from overflowing.
    credits: CountingSemaphore,
}

impl<const N: usize> SendEngine<N> {
    /// Create an idle, uninitialized engine.
    pub const fn new() -> Self {
        Self {
            ring: RingBuffer::from_array([const { SendSlot::new() }; N]),
            run: CriticalSectionCell::new(RunState {
                state: SendState::Idle,
                mode: SendingMode::Stream,
                in_flight: None,
                detached_next: None,
            }),
            finished: CriticalSectionCell::new(Deque::new()),
            credits: CountingSemaphore::new(0, 0),
        }
    }

    /// Prepare `depth` usable slots and close them into a circle.
    ///
    /// The engine must already sit at its final address: slots link to each
    /// other by address.
    pub fn init(&self, mode: SendingMode, depth: usize) -> Result<()> {
        self.ring.init(depth)?;

        let count = self.ring.slot_count();
        for index in 0..count {
            let slot = self.ring.slot(index);
            slot.desc.reset();
            slot.token.set(0);
            slot.cumulative_len.set(0);
            slot.desc.link_to(&self.ring.slot((index + 1) % count).desc);
        }

        self.run.with(|r| {
            r.state = SendState::Idle;
            r.mode = mode;
            r.in_flight = None;
            r.detached_next = None;
        });
        self.finished.with(Deque::clear);
        self.credits.reset(depth, depth);
        Ok(())
    }

    /// Release the ring. The engine must be idle.
    pub fn deinit(&self) {
        self.run.with(|r| {
            r.state = SendState::Idle;
            r.in_flight = None;
            r.detached_next = None;
        });
        self.finished.with(Deque::clear);
        self.credits.reset(0, 0);
        self.ring.deinit();
    }

    /// Current state.
    pub fn state(&self) -> SendState {
        self.run.with_ref(|r| r.state)
    }

    /// Configured sending mode.
    pub fn mode(&self) -> SendingMode {
        self.run.with_ref(|r| r.mode)
    }

    // -------------------------------------------------------------------------
    // Task side
    // -------------------------------------------------------------------------

    /// Queue `len` bytes at `buffer` for the host.
    ///
    /// `token` comes back from [`get_finished`](Self::get_finished) once the
    /// buffer has been read by the host. The buffer must stay untouched
    /// until then.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before [`init`](Self::init)
    /// - `InvalidLength` for an empty buffer or one over 4092 bytes
    /// - `InvalidBuffer` for a misaligned or non-DMA-capable buffer
    /// - `Timeout` if no slot freed up in time; nothing was queued
    pub fn enqueue<H, D>(
        &self,
        hal: &H,
        buffer: *const u8,
        len: usize,
        token: usize,
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<()>
    where
        H: SlaveHal,
        D: DelayNs,
    {
        if !self.ring.is_initialized() {
            return Err(ConfigError::NotInitialized.into());
        }
        if len == 0 || len > MAX_BUFFER_LEN {
            return Err(DmaError::InvalidLength.into());
        }
        let addr = buffer as usize;
        if addr % DMA_ALIGNMENT != 0 || !hal.is_dma_capable(addr) {
            return Err(DmaError::InvalidBuffer.into());
        }

        // A credit bounds outstanding tokens to the ring depth, so a slot
        // is always free once one is held.
        self.credits.take(timeout, delay)?;
        let permit = match self.ring.reserve(Timeout::NoWait, delay) {
            Ok(permit) => permit,
            Err(e) => {
                self.credits.give();
                return Err(e.into());
            }
        };

        let eof = self.mode() == SendingMode::Packet;
        self.ring.commit(permit, |slot, tail| {
            let cumulative = tail.cumulative_len.get().wrapping_add(len as u32);
            slot.cumulative_len.set(cumulative);
            slot.token.set(token);
            slot.desc.prepare(buffer, len, len, eof);
            slot.desc.set_owned();
        });

        hal.force_interrupt(SEND_INVOKE);
        Ok(())
    }

    /// Wait for the next finished token, in enqueue order.
    pub fn get_finished<D: DelayNs>(&self, timeout: Timeout, delay: &mut D) -> IoResult<usize> {
        poll_until(timeout, delay, || self.try_get_finished())
    }

    /// Pop the next finished token without waiting.
    pub fn try_get_finished(&self) -> Option<usize> {
        let token = self.finished.with(Deque::pop_front)?;
        self.credits.give();
        Some(token)
    }

    /// Arm the engine. Requires [`SendState::Idle`].
    ///
    /// A run left in flight by [`stop`](Self::stop) is handed to the DMA
    /// engine again, unless its completion is already latched.
    pub fn start<H: SlaveHal>(&self, hal: &H) -> IoResult<()> {
        self.run.with(|r| {
            if r.state != SendState::Idle {
                return Err(IoError::InvalidState);
            }
            r.state = SendState::WaitingForRun;
            Ok(())
        })?;

        hal.clear_interrupts(SEND_INVOKE);
        hal.enable_interrupts(SEND_INTERRUPTS);
        hal.force_interrupt(SEND_INVOKE);
        Ok(())
    }

    /// Disarm the engine and stop the DMA link. Queued data is kept.
    pub fn stop<H: SlaveHal>(&self, hal: &H) {
        hal.disable_interrupts(SEND_INTERRUPTS);
        hal.send_dma_stop();
        self.run.with(|r| r.state = SendState::Idle);
    }

    /// Finish everything in flight or queued without sending it.
    ///
    /// Every token goes to the completion queue in order. Hardware byte
    /// counters are untouched.
    pub fn flush(&self) -> IoResult<()> {
        let cut = self.run.with(|r| {
            if r.state != SendState::Idle {
                return Err(IoError::InvalidState);
            }
            Ok(r.in_flight.take().map(|range| (range, r.detached_next.take())))
        })?;

        if let Some((range, next)) = cut {
            self.retire(range, next);
        }
        while let Some(range) = self.ring.drain_all() {
            self.retire(range, None);
        }
        Ok(())
    }

    /// Restart the host-visible byte counter from zero.
    ///
    /// Everything still outstanding is renumbered from zero in commit order
    /// so the counter stays consistent with the data. Requires
    /// [`SendState::Idle`].
    pub fn reset_counters<H: SlaveHal>(&self, hal: &H) -> IoResult<()> {
        if self.state() != SendState::Idle {
            return Err(IoError::InvalidState);
        }

        hal.send_set_length(0);
        let mut total = 0u32;
        let (visited, back) = self.ring.for_each_outstanding(|slot| {
            total = total.wrapping_add(slot.desc.length() as u32);
            slot.cumulative_len.set(total);
        });
        if visited == 0 {
            back.cumulative_len.set(0);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Interrupt side
    // -------------------------------------------------------------------------

    /// Send sub-handler; `status` is what the dispatcher read and cleared.
    pub fn on_interrupt<H: SlaveHal>(&self, hal: &H, status: InterruptStatus) {
        if status.send_done {
            self.on_run_complete();
        }
        self.on_maybe_start(hal);
    }

    fn on_run_complete(&self) {
        let cut = self.run.with(|r| {
            let range = r.in_flight.take()?;
            let next = r.detached_next.take();
            if r.state == SendState::Sending {
                r.state = SendState::WaitingForRun;
            }
            Some((range, next))
        });

        if let Some((range, next)) = cut {
            self.retire(range, next);
        }
    }

    fn on_maybe_start<H: SlaveHal>(&self, hal: &H) {
        let run = self.run.with(|r| {
            if r.state != SendState::WaitingForRun {
                return None;
            }
            let range = match r.in_flight {
                // Left over from a stop; hand it out again
                Some(range) => range,
                None => {
                    let range = match r.mode {
                        SendingMode::Packet => self.ring.drain_one(),
                        SendingMode::Stream => self.ring.drain_all(),
                    }?;
                    let tail = self.ring.slot(range.last());
                    tail.desc.set_eof(true);
                    r.detached_next = (tail.desc.next_addr() != 0).then(|| range.end());
                    tail.desc.unlink();
                    r.in_flight = Some(range);
                    range
                }
            };
            r.state = SendState::Sending;
            Some(range)
        });

        if let Some(range) = run {
            let head = self.ring.slot(range.first());
            let tail = self.ring.slot(range.last());
            #[cfg(feature = "defmt")]
            defmt::trace!("send run: {} slots", range.len());
            hal.send_dma_stop();
            hal.send_set_length(tail.cumulative_len.get() & SEND_LENGTH_MASK);
            hal.send_dma_start(head.desc.addr());
        }
    }

    /// Push a run's tokens, repair the circle, give the slots back.
    fn retire(&self, range: SlotRange, detached_next: Option<usize>) {
        self.finished.with(|queue| {
            for index in range.indices() {
                let token = self.ring.slot(index).token.get();
                assert!(queue.push_back(token).is_ok(), "completion queue overflow");
            }
        });

        if let Some(next) = detached_next {
            let tail = self.ring.slot(range.last());
            tail.desc.link_to(&self.ring.slot(next).desc);
        }
        self.ring.release(range);
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Slots currently handed to the DMA engine.
    pub fn in_flight(&self) -> Option<SlotRange> {
        self.run.with_ref(|r| r.in_flight)
    }

    /// Slot at `index`.
    pub(crate) fn slot(&self, index: usize) -> &SendSlot {
        self.ring.slot(index)
    }

    /// Slots a producer could reserve right now.
    pub fn free_slots(&self) -> usize {
        self.ring.available()
    }

    /// Tokens waiting in the completion queue.
    pub fn finished_len(&self) -> usize {
        self.finished.with_ref(Deque::len)
    }
}

impl<const N: usize> Default for SendEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
