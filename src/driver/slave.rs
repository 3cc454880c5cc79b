//! SDIO slave driver.
//!
//! [`SdioSlave`] ties the send and receive engines to one peripheral and one
//! interrupt line. Every method takes `&self`: the driver is meant to live
//! in a `static` (see [`sdio_slave_static!`](crate::sdio_slave_static)) and
//! be reached from tasks and from the interrupt handler at the same time.
//! Each piece of shared state sits behind its own critical-section cell and
//! no cell is held across a wait.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize--> Initialized --start--> Running
//!       ^                            |                  |   ^
//!       +-------deinitialize---------+                stop  start
//!                                                       v   |
//!                                                     Stopped  (reset)
//! ```

use embedded_hal::delay::DelayNs;

use crate::driver::config::{EventCallback, SlaveConfig, State};
use crate::driver::error::{ConfigError, IoError, IoResult, Result};
use crate::driver::interrupt::{HOST_INTERRUPTS, HostInterrupt, InterruptStatus};
use crate::hal::{InterruptController, IntrHandle, SlaveHal};
use crate::internal::constants::{
    DEFAULT_RECV_BUFFERS, DEFAULT_SEND_SLOTS, HOST_INT_BITS, SHARED_REG_COUNT,
    SHARED_REG_RESERVED_END, SHARED_REG_RESERVED_START,
};
use crate::internal::dma::{RecvCompletion, RecvEngine, RecvHandle, SendEngine, SendState};
use crate::sync::{CountingSemaphore, CriticalSectionCell, Timeout};

#[cfg(feature = "async")]
use crate::sync::asynch::SlaveWakers;

struct Control {
    state: State,
    config: SlaveConfig,
    intr: Option<IntrHandle>,
}

/// ESP32 SDIO slave driver.
///
/// # Type Parameters
///
/// * `H` - Peripheral adapter
/// * `SEND_SLOTS` - Send ring slots; at least `send_queue_depth + 1`
/// * `RECV_BUFS` - Receive buffers that can be registered at once
///
/// # Memory
///
/// Descriptors link to each other by address. The driver must be at its
/// final location before [`initialize`](Self::initialize) and must not move
/// afterwards; place it in a `static`.
pub struct SdioSlave<H: SlaveHal, const SEND_SLOTS: usize, const RECV_BUFS: usize> {
    hal: H,
    control: CriticalSectionCell<Control>,
    send: SendEngine<SEND_SLOTS>,
    recv: CriticalSectionCell<RecvEngine<RECV_BUFS>>,
    /// One unit per receive completion not yet claimed by `recv`
    recv_ready: CountingSemaphore,
    /// One binary semaphore per host to slave interrupt bit
    host_events: [CountingSemaphore; HOST_INT_BITS],
    #[cfg(feature = "async")]
    pub(crate) wakers: SlaveWakers,
}

/// Driver with the default ring and receive pool sizes.
pub type SdioSlaveDefault<H> = SdioSlave<H, DEFAULT_SEND_SLOTS, DEFAULT_RECV_BUFFERS>;

impl<H: SlaveHal, const SEND_SLOTS: usize, const RECV_BUFS: usize> SdioSlave<H, SEND_SLOTS, RECV_BUFS> {
    /// Create an uninitialized driver around a peripheral adapter.
    pub const fn new(hal: H) -> Self {
        Self {
            hal,
            control: CriticalSectionCell::new(Control {
                state: State::Uninitialized,
                config: SlaveConfig::new(),
                intr: None,
            }),
            send: SendEngine::new(),
            recv: CriticalSectionCell::new(RecvEngine::new()),
            recv_ready: CountingSemaphore::unbounded(),
            host_events: [const { CountingSemaphore::binary() }; HOST_INT_BITS],
            #[cfg(feature = "async")]
            wakers: SlaveWakers::new(),
        }
    }

    /// Peripheral adapter.
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Current driver state.
    pub fn state(&self) -> State {
        self.control.with_ref(|c| c.state)
    }

    /// Active configuration.
    pub fn config(&self) -> SlaveConfig {
        self.control.with_ref(|c| c.config)
    }

    fn require_initialized(&self) -> Result<State> {
        match self.state() {
            State::Uninitialized => Err(ConfigError::NotInitialized.into()),
            state => Ok(state),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bring up the peripheral and both engines, then allocate the
    /// interrupt line for `handler`.
    ///
    /// `handler` must end up calling [`handle_interrupt`](Self::handle_interrupt).
    /// On error everything done so far is undone.
    ///
    /// # Errors
    ///
    /// - `AlreadyInitialized` if called twice
    /// - `InvalidConfig` if [`SlaveConfig::validate`] fails
    /// - `OutOfDescriptors` if `SEND_SLOTS` cannot hold the queue depth
    /// - `InterruptAllocFailed` from the interrupt controller
    pub fn initialize<I: InterruptController>(
        &self,
        config: SlaveConfig,
        intc: &mut I,
        handler: I::Handler,
    ) -> Result<()> {
        if self.state() != State::Uninitialized {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        config.validate()?;

        self.hal.init_hardware(&config);
        if let Err(e) = self.send.init(config.sending_mode, config.send_queue_depth) {
            self.hal.deinit_hardware();
            return Err(e);
        }
        if let Err(e) = self.recv.with(|r| r.init(config.recv_buffer_size)) {
            self.send.deinit();
            self.hal.deinit_hardware();
            return Err(e);
        }
        self.recv_ready.reset(0, usize::MAX);
        for event in &self.host_events {
            event.reset(0, 1);
        }

        let intr = match intc.allocate(handler) {
            Ok(intr) => intr,
            Err(e) => {
                self.recv.with(RecvEngine::deinit);
                self.send.deinit();
                self.hal.deinit_hardware();
                return Err(e.into());
            }
        };

        self.hal.clear_interrupts(HOST_INTERRUPTS);
        self.hal.enable_interrupts(HOST_INTERRUPTS);

        self.control.with(|c| {
            c.state = State::Initialized;
            c.config = config;
            c.intr = Some(intr);
        });

        #[cfg(feature = "defmt")]
        defmt::info!(
            "SDIO slave initialized: mode={}, queue={}, recv_size={}",
            config.sending_mode,
            config.send_queue_depth,
            config.recv_buffer_size
        );
        Ok(())
    }

    /// Stop everything, free the interrupt line and forget all buffers.
    ///
    /// Receive handles become stale. Tokens still queued for sending are
    /// dropped without being reported.
    pub fn deinitialize<I: InterruptController>(&self, intc: &mut I) -> Result<()> {
        if self.require_initialized()? == State::Running {
            self.stop()?;
        }

        self.hal.deinit_hardware();
        if let Some(intr) = self.control.with(|c| c.intr.take()) {
            intc.free(intr);
        }
        self.send.deinit();
        self.recv.with(RecvEngine::deinit);
        self.recv_ready.reset(0, usize::MAX);
        for event in &self.host_events {
            event.reset(0, 1);
        }
        self.control.with(|c| c.state = State::Uninitialized);

        #[cfg(feature = "async")]
        self.wakers.wake_all();

        #[cfg(feature = "defmt")]
        defmt::info!("SDIO slave deinitialized");
        Ok(())
    }

    /// Arm both directions.
    ///
    /// Receive completions that landed while stopped are signalled here.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `InvalidState` if already running.
    pub fn start(&self) -> Result<()> {
        if self.require_initialized()? == State::Running {
            return Err(IoError::InvalidState.into());
        }

        self.send.start(&self.hal)?;
        let completed = self.recv.with(|r| r.start(&self.hal));
        if completed > 0 {
            self.recv_ready.give_n(completed);
            #[cfg(feature = "async")]
            self.wakers.recv.wake();
        }
        self.control.with(|c| c.state = State::Running);

        #[cfg(feature = "defmt")]
        defmt::info!("SDIO slave started");
        Ok(())
    }

    /// Disarm both directions. Queued and loaded buffers are kept.
    pub fn stop(&self) -> Result<()> {
        if self.require_initialized()? != State::Running {
            return Ok(());
        }

        self.send.stop(&self.hal);
        self.recv.with(|r| r.stop(&self.hal));
        self.control.with(|c| c.state = State::Stopped);

        #[cfg(feature = "defmt")]
        defmt::info!("SDIO slave stopped");
        Ok(())
    }

    /// Discard pending data and restart the host-visible counters.
    ///
    /// Every queued send token is reported through
    /// [`get_finished`](Self::get_finished). Completed but unclaimed receive
    /// buffers go back to the idle pool. Buffers still loaded stay loaded and
    /// are announced to the host again.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, or `InvalidState` while running.
    pub fn reset(&self) -> Result<()> {
        if self.require_initialized()? == State::Running {
            return Err(IoError::InvalidState.into());
        }

        self.send.flush()?;
        self.send.reset_counters(&self.hal)?;

        while self.recv_ready.try_take() {
            self.recv.with(|r| r.recycle_completed(&self.hal));
        }
        self.recv.with(|r| r.reset_counters(&self.hal));

        #[cfg(feature = "async")]
        self.wakers.wake_all();

        #[cfg(feature = "defmt")]
        defmt::debug!("SDIO slave counters reset");
        Ok(())
    }

    // =========================================================================
    // Send
    // =========================================================================

    /// Queue a buffer for the host without waiting for it to be read.
    ///
    /// `token` comes back from [`get_finished`](Self::get_finished) once the
    /// host has read the buffer. Tokens come back in enqueue order.
    ///
    /// # Errors
    ///
    /// - `InvalidLength` / `InvalidBuffer` for a buffer the DMA engine
    ///   cannot send
    /// - `Timeout` when the queue stayed full; nothing was queued
    pub fn enqueue<D: DelayNs>(
        &self,
        data: &'static [u8],
        token: usize,
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<()> {
        self.send
            .enqueue(&self.hal, data.as_ptr(), data.len(), token, timeout, delay)
    }

    /// Wait for the token of the next buffer the host has read.
    pub fn get_finished<D: DelayNs>(&self, timeout: Timeout, delay: &mut D) -> IoResult<usize> {
        self.send.get_finished(timeout, delay)
    }

    /// Send a buffer and wait until the host has read it.
    ///
    /// Must not be mixed with [`enqueue`](Self::enqueue) from other tasks:
    /// the finished token is asserted to be this buffer's.
    pub fn transmit<D: DelayNs>(&self, data: &[u8], delay: &mut D) -> Result<()> {
        let token = data.as_ptr() as usize;
        self.send.enqueue(
            &self.hal,
            data.as_ptr(),
            data.len(),
            token,
            Timeout::Forever,
            delay,
        )?;
        let finished = self.send.get_finished(Timeout::Forever, delay)?;
        assert_eq!(finished, token, "transmit mixed with enqueue");
        Ok(())
    }

    /// Send engine state.
    pub fn send_state(&self) -> SendState {
        self.send.state()
    }

    // =========================================================================
    // Receive
    // =========================================================================

    /// Add a buffer to the receive pool.
    ///
    /// The buffer must be word aligned, DMA capable and at least
    /// `recv_buffer_size` long.
    pub fn register_buffer(&self, buffer: &'static mut [u8]) -> Result<RecvHandle> {
        self.require_initialized()?;
        let handle = self
            .recv
            .with(|r| r.register(&self.hal, buffer.as_mut_ptr(), buffer.len()))?;
        Ok(handle)
    }

    /// Remove an idle buffer from the receive pool.
    ///
    /// # Errors
    ///
    /// `BufferInUse` while the buffer is loaded, `InvalidHandle` if stale.
    pub fn unregister_buffer(&self, handle: RecvHandle) -> Result<()> {
        self.recv.with(|r| r.unregister(handle))?;
        Ok(())
    }

    /// Hand a registered buffer to the host.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the buffer is already loaded or unknown.
    pub fn load_buffer(&self, handle: RecvHandle) -> Result<()> {
        self.require_initialized()?;
        self.recv.with(|r| r.load(&self.hal, handle))
    }

    /// Wait for the host to fill the oldest loaded buffer.
    ///
    /// Buffers come back in load order. The returned handle is registered
    /// again and may be loaded right away.
    pub fn recv<D: DelayNs>(&self, timeout: Timeout, delay: &mut D) -> IoResult<RecvCompletion> {
        self.recv_ready.take(timeout, delay)?;
        Ok(self.recv.with(RecvEngine::take_completed))
    }

    /// Take a completed buffer if one is waiting.
    pub fn try_recv(&self) -> Option<RecvCompletion> {
        self.recv_ready
            .try_take()
            .then(|| self.recv.with(RecvEngine::take_completed))
    }

    /// Buffer address and the length the host last wrote into it.
    pub fn get_buffer(&self, handle: RecvHandle) -> Result<(*mut u8, usize)> {
        Ok(self.recv.with_ref(|r| r.get_buffer(handle))?)
    }

    /// Buffers currently registered, loaded or not.
    pub fn recv_buffer_count(&self) -> usize {
        self.recv
            .with_ref(|r| r.registered_len() + r.active_len())
    }

    // =========================================================================
    // Shared Registers
    // =========================================================================

    fn shared_position(pos: usize) -> IoResult<(usize, u32)> {
        if pos >= SHARED_REG_COUNT
            || (SHARED_REG_RESERVED_START..=SHARED_REG_RESERVED_END).contains(&pos)
        {
            return Err(IoError::InvalidRegister);
        }
        Ok((pos / 4, (pos % 4) as u32 * 8))
    }

    /// Read byte register `pos` (0-63, 28-31 reserved) shared with the host.
    pub fn read_reg(&self, pos: usize) -> IoResult<u8> {
        let (word, shift) = Self::shared_position(pos)?;
        Ok((self.hal.read_shared_word(word) >> shift) as u8)
    }

    /// Write byte register `pos` (0-63, 28-31 reserved) shared with the host.
    pub fn write_reg(&self, pos: usize, value: u8) -> IoResult<()> {
        let (word, shift) = Self::shared_position(pos)?;
        critical_section::with(|_| {
            let old = self.hal.read_shared_word(word);
            let new = (old & !(0xFF << shift)) | (u32::from(value) << shift);
            self.hal.write_shared_word(word, new);
        });
        Ok(())
    }

    // =========================================================================
    // Host Interrupts
    // =========================================================================

    /// Raise general purpose interrupt `pos` (0-7) towards the host.
    pub fn send_host_int(&self, pos: u8) -> IoResult<()> {
        if usize::from(pos) >= HOST_INT_BITS {
            return Err(IoError::InvalidInterrupt);
        }
        self.hal.raise_host_interrupt(pos);
        Ok(())
    }

    /// Clear pending slave to host interrupts.
    pub fn clear_host_int(&self, mask: HostInterrupt) {
        self.hal.clear_host_interrupt(mask.bits());
    }

    /// Slave to host interrupts the host is allowed to see.
    pub fn get_host_intena(&self) -> HostInterrupt {
        HostInterrupt(self.hal.host_interrupt_enable())
    }

    /// Choose which slave to host interrupts the host may see.
    pub fn set_host_intena(&self, mask: HostInterrupt) {
        self.hal.set_host_interrupt_enable(mask.bits());
    }

    /// Wait for the host to raise general purpose interrupt `pos` (0-7).
    ///
    /// Repeated interrupts before the wait collapse into one.
    pub fn wait_int<D: DelayNs>(&self, pos: u8, timeout: Timeout, delay: &mut D) -> IoResult<()> {
        let event = self
            .host_events
            .get(usize::from(pos))
            .ok_or(IoError::InvalidInterrupt)?;
        event.take(timeout, delay)
    }

    pub(crate) fn try_take_host_event(&self, pos: u8) -> IoResult<bool> {
        let event = self
            .host_events
            .get(usize::from(pos))
            .ok_or(IoError::InvalidInterrupt)?;
        Ok(event.try_take())
    }

    pub(crate) fn try_get_finished(&self) -> Option<usize> {
        self.send.try_get_finished()
    }

    /// Act as the hardware: finish the send run in flight, if any, and
    /// latch its completion.
    #[cfg(test)]
    pub(crate) fn simulate_send_done(&self) -> bool {
        let Some(range) = self.send.in_flight() else {
            return false;
        };
        for index in range.indices() {
            self.send.slot(index).descriptor().clear_owned();
        }
        self.hal.force_interrupt(crate::driver::interrupt::SEND_DONE);
        true
    }

    /// Act as the hardware: fill the next loaded buffer and latch the
    /// receive interrupt.
    #[cfg(test)]
    pub(crate) fn simulate_host_write(&self, len: usize) -> bool {
        let written = self.recv.with_ref(|r| r.simulate_host_write(len));
        if written {
            self.hal.force_interrupt(crate::driver::interrupt::RECV_DONE);
        }
        written
    }

    // =========================================================================
    // Interrupt Handling
    // =========================================================================

    /// Service the SLC interrupt. Call this from the interrupt handler.
    ///
    /// Reads and acknowledges the pending status, then runs the send,
    /// receive and host sub-handlers for the groups that fired. The event
    /// callback runs here, once per host interrupt bit.
    pub fn handle_interrupt(&self) -> InterruptStatus {
        let status = InterruptStatus::from_raw(self.hal.interrupt_status());
        self.hal.clear_interrupts(status.to_raw());

        if status.send() {
            self.send.on_interrupt(&self.hal, status);
        }

        if status.recv_done {
            let completed = self.recv.with(RecvEngine::on_transfer_progress);
            if completed > 0 {
                self.recv_ready.give_n(completed);
            }
        }

        if status.host_bits != 0 {
            let callback: Option<EventCallback> = self.control.with_ref(|c| c.config.event_callback);
            for pos in status.host_interrupts() {
                if let Some(callback) = callback {
                    callback(pos);
                }
                self.host_events[usize::from(pos)].give();
            }
        }

        #[cfg(feature = "async")]
        self.wakers.wake_for(status);
        status
    }
}

// =============================================================================
// Tests
// =============================================================================
