//! Hardware Abstraction Layer
//!
//! The engines never touch registers directly. Everything they need from the
//! SDIO slave peripheral goes through [`SlaveHal`], and interrupt line setup
//! goes through [`InterruptController`]. The crate ships a register-backed
//! implementation for the ESP32 ([`Esp32Sdio`]); host tests use a mock.
//!
//! # Direction naming
//!
//! The SLC block names its DMA channels from its own point of view, which is
//! the reverse of the driver's: *sending* (slave to host) runs on the SLC0
//! RX link, *receiving* (host to slave) on the SLC0 TX link. The trait uses
//! the driver's names.
//!
//! # Delay Integration
//!
//! Blocking driver calls take any `embedded_hal::delay::DelayNs`. Pass the
//! delay from your HAL (e.g., `esp_hal::delay::Delay`).

#[cfg(feature = "esp32")]
pub mod esp32;

#[cfg(feature = "esp32")]
pub use esp32::Esp32Sdio;

use crate::driver::config::SlaveConfig;
use crate::driver::error::ConfigResult;

// =============================================================================
// Peripheral Adapter
// =============================================================================

/// Register-level operations on the SDIO slave peripheral.
///
/// All methods take `&self`: an implementation is a thin view over memory
/// mapped registers, and the driver calls it from task and interrupt context
/// alike. Each call is expected to complete in bounded time.
///
/// Interrupt masks are raw SLC0 interrupt bits; see
/// [`InterruptStatus`](crate::InterruptStatus) for the groups the driver
/// uses.
pub trait SlaveHal {
    /// Reset the SLC block and apply bus timing and pad flags.
    fn init_hardware(&self, config: &SlaveConfig);

    /// Stop both links and mask every interrupt.
    fn deinit_hardware(&self);

    // -------------------------------------------------------------------------
    // Interrupts
    // -------------------------------------------------------------------------

    /// Pending interrupts, already masked by the enable register.
    fn interrupt_status(&self) -> u32;

    /// Acknowledge the given interrupt bits.
    fn clear_interrupts(&self, mask: u32);

    /// Unmask the given interrupt bits.
    fn enable_interrupts(&self, mask: u32);

    /// Mask the given interrupt bits.
    fn disable_interrupts(&self, mask: u32);

    /// Latch the given bits in the raw status register so the interrupt
    /// handler runs even without hardware activity.
    fn force_interrupt(&self, mask: u32);

    // -------------------------------------------------------------------------
    // Send link (slave to host)
    // -------------------------------------------------------------------------

    /// Point the send link at `head` and start it.
    fn send_dma_start(&self, head: u32);

    /// Stop the send link.
    fn send_dma_stop(&self);

    /// Publish the cumulative byte count the host may read.
    fn send_set_length(&self, len: u32);

    // -------------------------------------------------------------------------
    // Receive link (host to slave)
    // -------------------------------------------------------------------------

    /// Point the receive link at `head` and start it.
    fn recv_dma_start(&self, head: u32);

    /// Make the receive link re-read the link word it stopped at.
    fn recv_dma_restart(&self);

    /// Stop the receive link.
    fn recv_dma_stop(&self);

    /// Zero the buffer counter the host reads.
    fn recv_token_reset(&self);

    /// Add `count` to the buffer counter the host reads.
    fn recv_token_increment(&self, count: u32);

    // -------------------------------------------------------------------------
    // Host interface
    // -------------------------------------------------------------------------

    /// Read one of the 16 host-visible shared words.
    fn read_shared_word(&self, word: usize) -> u32;

    /// Write one of the 16 host-visible shared words.
    fn write_shared_word(&self, word: usize, value: u32);

    /// Raise general purpose slave to host interrupt `bit` (0-7).
    fn raise_host_interrupt(&self, bit: u8);

    /// Clear pending slave to host interrupts.
    fn clear_host_interrupt(&self, mask: u32);

    /// Slave to host interrupts the host is allowed to see.
    fn host_interrupt_enable(&self) -> u32;

    /// Set which slave to host interrupts the host may see.
    fn set_host_interrupt_enable(&self, mask: u32);

    // -------------------------------------------------------------------------
    // Memory
    // -------------------------------------------------------------------------

    /// Whether the DMA engine can reach `addr`.
    fn is_dma_capable(&self, addr: usize) -> bool;
}

// =============================================================================
// Interrupt Controller Adapter
// =============================================================================

/// Token for an allocated interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IntrHandle(pub u32);

/// Allocates and frees the SLC interrupt line.
pub trait InterruptController {
    /// Whatever the platform binds to an interrupt line; a plain `fn()` on
    /// bare metal, a prioritized handler under esp-hal.
    type Handler;

    /// Route the SLC interrupt to `handler` and enable it.
    ///
    /// # Errors
    ///
    /// `InterruptAllocFailed` if no line is available.
    fn allocate(&mut self, handler: Self::Handler) -> ConfigResult<IntrHandle>;

    /// Disable and release a line returned by [`allocate`](Self::allocate).
    fn free(&mut self, handle: IntrHandle);
}
