//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the SDIO slave
//! driver on the host without hardware access.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::{Cell, RefCell};
use std::boxed::Box;
use std::vec;
use std::vec::Vec;

use crate::driver::config::SlaveConfig;
use crate::driver::error::{ConfigError, ConfigResult};
use crate::hal::{InterruptController, IntrHandle, SlaveHal};
use crate::internal::constants::HOST_INT_BITS;

// =============================================================================
// Mock Slave HAL
// =============================================================================

/// Mock SDIO slave peripheral.
///
/// Models the pieces of the SLC block the engines observe: a raw interrupt
/// register masked by an enable register, the two DMA links, the host
/// counters and the shared words.
///
/// # Example
///
/// ```ignore
/// let hal = MockSlaveHal::new();
/// hal.enable_interrupts(SEND_DONE);
/// hal.raise(SEND_DONE);
/// assert_eq!(hal.interrupt_status(), SEND_DONE);
/// ```
#[derive(Debug)]
pub struct MockSlaveHal {
    raw: Cell<u32>,
    enabled: Cell<u32>,
    initialized: Cell<bool>,
    last_config: Cell<Option<SlaveConfig>>,
    send_head: Cell<Option<u32>>,
    send_running: Cell<bool>,
    send_length: Cell<u32>,
    send_starts: Cell<usize>,
    recv_head: Cell<Option<u32>>,
    recv_running: Cell<bool>,
    recv_restarts: Cell<usize>,
    recv_tokens: Cell<u32>,
    shared: RefCell<[u32; 16]>,
    host_raised: RefCell<Vec<u8>>,
    host_pending: Cell<u32>,
    host_enable: Cell<u32>,
    dma_capable: Cell<bool>,
}

impl Default for MockSlaveHal {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSlaveHal {
    /// Create a mock with every register zeroed and all memory DMA capable
    pub fn new() -> Self {
        Self {
            raw: Cell::new(0),
            enabled: Cell::new(0),
            initialized: Cell::new(false),
            last_config: Cell::new(None),
            send_head: Cell::new(None),
            send_running: Cell::new(false),
            send_length: Cell::new(0),
            send_starts: Cell::new(0),
            recv_head: Cell::new(None),
            recv_running: Cell::new(false),
            recv_restarts: Cell::new(0),
            recv_tokens: Cell::new(0),
            shared: RefCell::new([0; 16]),
            host_raised: RefCell::new(Vec::new()),
            host_pending: Cell::new(0),
            host_enable: Cell::new(0),
            dma_capable: Cell::new(true),
        }
    }

    /// Latch interrupt bits as hardware would
    pub fn raise(&self, bits: u32) {
        self.raw.set(self.raw.get() | bits);
    }

    /// Read and acknowledge everything pending and enabled, like the
    /// interrupt dispatcher does
    pub fn take_pending(&self) -> u32 {
        let pending = self.interrupt_status();
        self.clear_interrupts(pending);
        pending
    }

    pub fn raw_interrupts(&self) -> u32 {
        self.raw.get()
    }

    pub fn enabled_interrupts(&self) -> u32 {
        self.enabled.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn last_config(&self) -> Option<SlaveConfig> {
        self.last_config.get()
    }

    pub fn send_head(&self) -> Option<u32> {
        self.send_head.get()
    }

    pub fn send_running(&self) -> bool {
        self.send_running.get()
    }

    pub fn send_length(&self) -> u32 {
        self.send_length.get()
    }

    pub fn send_starts(&self) -> usize {
        self.send_starts.get()
    }

    pub fn recv_head(&self) -> Option<u32> {
        self.recv_head.get()
    }

    pub fn recv_running(&self) -> bool {
        self.recv_running.get()
    }

    pub fn recv_restarts(&self) -> usize {
        self.recv_restarts.get()
    }

    pub fn recv_tokens(&self) -> u32 {
        self.recv_tokens.get()
    }

    pub fn shared_words(&self) -> [u32; 16] {
        *self.shared.borrow()
    }

    /// Host interrupt bits raised so far, in order
    pub fn host_raised(&self) -> Vec<u8> {
        self.host_raised.borrow().clone()
    }

    /// Slave to host bits that were raised and not yet cleared
    pub fn host_pending(&self) -> u32 {
        self.host_pending.get()
    }

    pub fn set_dma_capable(&self, capable: bool) {
        self.dma_capable.set(capable);
    }
}

impl SlaveHal for MockSlaveHal {
    fn init_hardware(&self, config: &SlaveConfig) {
        self.initialized.set(true);
        self.last_config.set(Some(*config));
        self.raw.set(0);
        self.enabled.set(0);
    }

    fn deinit_hardware(&self) {
        self.initialized.set(false);
        self.send_running.set(false);
        self.recv_running.set(false);
        self.enabled.set(0);
        self.raw.set(0);
    }

    fn interrupt_status(&self) -> u32 {
        self.raw.get() & self.enabled.get()
    }

    fn clear_interrupts(&self, mask: u32) {
        self.raw.set(self.raw.get() & !mask);
    }

    fn enable_interrupts(&self, mask: u32) {
        self.enabled.set(self.enabled.get() | mask);
    }

    fn disable_interrupts(&self, mask: u32) {
        self.enabled.set(self.enabled.get() & !mask);
    }

    fn force_interrupt(&self, mask: u32) {
        self.raise(mask);
    }

    fn send_dma_start(&self, head: u32) {
        self.send_head.set(Some(head));
        self.send_running.set(true);
        self.send_starts.set(self.send_starts.get() + 1);
    }

    fn send_dma_stop(&self) {
        self.send_running.set(false);
    }

    fn send_set_length(&self, len: u32) {
        self.send_length.set(len);
    }

    fn recv_dma_start(&self, head: u32) {
        self.recv_head.set(Some(head));
        self.recv_running.set(true);
    }

    fn recv_dma_restart(&self) {
        self.recv_restarts.set(self.recv_restarts.get() + 1);
    }

    fn recv_dma_stop(&self) {
        self.recv_running.set(false);
    }

    fn recv_token_reset(&self) {
        self.recv_tokens.set(0);
    }

    fn recv_token_increment(&self, count: u32) {
        self.recv_tokens.set(self.recv_tokens.get() + count);
    }

    fn read_shared_word(&self, word: usize) -> u32 {
        self.shared.borrow()[word]
    }

    fn write_shared_word(&self, word: usize, value: u32) {
        self.shared.borrow_mut()[word] = value;
    }

    fn raise_host_interrupt(&self, bit: u8) {
        assert!((bit as usize) < HOST_INT_BITS);
        self.host_raised.borrow_mut().push(bit);
        self.host_pending.set(self.host_pending.get() | (1 << bit));
    }

    fn clear_host_interrupt(&self, mask: u32) {
        self.host_pending.set(self.host_pending.get() & !mask);
    }

    fn host_interrupt_enable(&self) -> u32 {
        self.host_enable.get()
    }

    fn set_host_interrupt_enable(&self, mask: u32) {
        self.host_enable.set(mask);
    }

    fn is_dma_capable(&self, _addr: usize) -> bool {
        self.dma_capable.get()
    }
}

// =============================================================================
// Mock Interrupt Controller
// =============================================================================

/// Mock interrupt controller with a fixed number of free lines
#[derive(Debug)]
pub struct MockInterruptController {
    free_lines: u32,
    next: u32,
    allocated: Vec<IntrHandle>,
    handler: Option<fn()>,
}

impl MockInterruptController {
    pub fn new() -> Self {
        Self::with_lines(1)
    }

    pub fn with_lines(free_lines: u32) -> Self {
        Self {
            free_lines,
            next: 1,
            allocated: Vec::new(),
            handler: None,
        }
    }

    pub fn allocated(&self) -> &[IntrHandle] {
        &self.allocated
    }

    /// Run the bound handler, as the CPU would on an interrupt
    pub fn fire(&self) {
        if let Some(handler) = self.handler {
            handler();
        }
    }
}

impl Default for MockInterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptController for MockInterruptController {
    type Handler = fn();

    fn allocate(&mut self, handler: fn()) -> ConfigResult<IntrHandle> {
        if self.free_lines == 0 {
            return Err(ConfigError::InterruptAllocFailed);
        }
        self.free_lines -= 1;
        let handle = IntrHandle(self.next);
        self.next += 1;
        self.allocated.push(handle);
        self.handler = Some(handler);
        Ok(handle)
    }

    fn free(&mut self, handle: IntrHandle) {
        let before = self.allocated.len();
        self.allocated.retain(|h| *h != handle);
        assert_eq!(before, self.allocated.len() + 1, "freed unknown interrupt");
        self.free_lines += 1;
        self.handler = None;
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay for testing without actual timing
///
/// Records delays for verification without actually waiting.
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Total nanoseconds delayed
    total_ns: RefCell<u64>,
}

impl MockDelay {
    /// Create a new mock delay
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total nanoseconds that were "delayed"
    pub fn total_ns(&self) -> u64 {
        *self.total_ns.borrow()
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.total_ns.borrow_mut() += ns as u64;
    }
}

/// Delay that runs a closure on every wait step.
///
/// Stands in for "the interrupt fired while the task was sleeping": a
/// blocking call polls, sleeps through this delay, and the closure plays
/// the hardware and the ISR.
pub struct HookDelay<F: FnMut()> {
    hook: F,
    steps: usize,
}

impl<F: FnMut()> HookDelay<F> {
    pub fn new(hook: F) -> Self {
        Self { hook, steps: 0 }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl<F: FnMut()> embedded_hal::delay::DelayNs for HookDelay<F> {
    fn delay_ns(&mut self, _ns: u32) {
        self.steps += 1;
        (self.hook)();
    }
}

// =============================================================================
// Buffers
// =============================================================================

/// Leak a zeroed, word-aligned buffer of `len` bytes.
pub fn dma_buffer(len: usize) -> &'static mut [u8] {
    let words: &'static mut [u32] = Box::leak(vec![0u32; len.div_ceil(4).max(1)].into_boxed_slice());
    // SAFETY: the words are leaked, so the bytes live forever and nothing
    // else refers to them.
    unsafe { core::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<u8>(), len) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::delay::DelayNs;

    #[test]
    fn mock_status_is_masked_by_enable() {
        let hal = MockSlaveHal::new();
        hal.raise(0b11);
        assert_eq!(hal.interrupt_status(), 0);
        hal.enable_interrupts(0b10);
        assert_eq!(hal.take_pending(), 0b10);
        assert_eq!(hal.raw_interrupts(), 0b01);
    }

    #[test]
    fn dma_buffer_is_aligned() {
        let buf = dma_buffer(10);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.as_ptr() as usize % 4, 0);
    }

    #[test]
    fn mock_delay_accumulates() {
        let mut delay = MockDelay::new();
        delay.delay_us(3);
        delay.delay_ns(500);
        assert_eq!(delay.total_ns(), 3_500);
    }

    #[test]
    fn interrupt_controller_runs_out_of_lines() {
        let mut intc = MockInterruptController::with_lines(1);
        let handle = intc.allocate(|| {}).unwrap();
        assert_eq!(intc.allocate(|| {}), Err(ConfigError::InterruptAllocFailed));
        intc.free(handle);
        assert!(intc.allocated().is_empty());
    }
}
