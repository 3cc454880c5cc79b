//! ESP32 SDIO Slave Driver
//!
//! A `no_std`, `no_alloc` Rust implementation of the ESP32 SDIO slave
//! data path: the SLC DMA engine that moves data between the SDIO host and
//! application buffers, plus the host-visible shared registers and
//! interrupts.
//!
//! # Architecture
//!
//! The driver is organized into three layers:
//!
//! 1. **Driver Layer** ([`driver`]): [`SdioSlave`] lifecycle, send and
//!    receive APIs, and the interrupt dispatcher
//! 2. **Engine Layer** (internal): the descriptor ring behind the send
//!    engine and the registered/active lists behind the receive engine
//! 3. **HAL Layer** ([`hal`]): [`SlaveHal`] and [`InterruptController`],
//!    with a register-backed ESP32 implementation ([`Esp32Sdio`])
//!
//! ## Directions
//!
//! - **Send** (slave to host): buffers are queued with a token; the token
//!   comes back from [`SdioSlave::get_finished`] once the host has read the
//!   buffer. In [`SendingMode::Stream`] everything queued is sent as one
//!   run; in [`SendingMode::Packet`] each buffer is its own run.
//! - **Receive** (host to slave): buffers are registered once, loaded for
//!   the host, and come back from [`SdioSlave::recv`] in load order.
//!
//! This release targets ESP32 only.
//!
//! # Features
//!
//! - `esp32` (default): Target the original ESP32
//! - `defmt`: Enable defmt formatting and driver logging
//! - `async`: Enable async/await support with wakers
//! - `esp-hal`: Enable esp-hal interrupt integration
//!
//! # Example
//!
//! ```ignore
//! use ph_esp32_sdio_slave::{sdio_slave_static, SlaveConfig, Timeout};
//!
//! sdio_slave_static!(SLAVE);
//!
//! fn slave_isr() {
//!     SLAVE.handle_interrupt();
//! }
//!
//! SLAVE.initialize(SlaveConfig::new(), &mut intc, slave_isr).unwrap();
//! SLAVE.start().unwrap();
//!
//! // Send a buffer and wait for the host to read it
//! static HELLO: [u8; 8] = *b"hello!!\n";
//! SLAVE.enqueue(&HELLO, 1, Timeout::Forever, &mut delay).unwrap();
//! assert_eq!(SLAVE.get_finished(Timeout::Forever, &mut delay), Ok(1));
//!
//! // Hand a buffer to the host and wait for it to be filled
//! let handle = SLAVE.register_buffer(rx_buf).unwrap();
//! SLAVE.load_buffer(handle).unwrap();
//! let done = SLAVE.recv(Timeout::Forever, &mut delay).unwrap();
//! SLAVE.load_buffer(done.handle).unwrap();
//! ```
//!
//! # Memory Requirements
//!
//! Send descriptors live inside the driver, so the driver itself must sit
//! in DMA-capable SRAM (see [`sdio_slave_static!`]). Send and receive
//! buffers must be word aligned and DMA capable as well.

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in clippy.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements,
    clippy::let_underscore_future
)]

#[cfg(not(feature = "esp32"))]
compile_error!("Feature 'esp32' must be enabled. It is on by default.");

// =============================================================================
// Modules
// =============================================================================

pub mod driver;
pub mod hal;
pub mod sync;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "esp-hal")]
#[cfg_attr(docsrs, doc(cfg(feature = "esp-hal")))]
pub mod integration;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use driver::config::{EventCallback, SdioTiming, SendingMode, SlaveConfig, SlaveFlags, State};
pub use driver::error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, ErrorKind, IoError, IoResult, Result,
};
pub use driver::interrupt::{HostInterrupt, InterruptStatus};
pub use driver::slave::{SdioSlave, SdioSlaveDefault};
pub use hal::{InterruptController, IntrHandle, SlaveHal};
pub use internal::dma::{RecvCompletion, RecvHandle, SendState};
pub use sync::Timeout;

#[cfg(feature = "esp32")]
pub use hal::Esp32Sdio;

/// Low-level register accessors for advanced use.
///
/// These are intentionally separated from the primary facade. Most users should
/// prefer the safe driver APIs instead of touching registers directly.
///
/// # Safety
///
/// Direct register access bypasses driver invariants. Use only if you fully
/// understand the ESP32 SLC hardware and accept responsibility for correct
/// sequencing and synchronization.
pub mod unsafe_registers {
    pub use crate::internal::register::host::HostRegs;
    pub use crate::internal::register::slc::SlcRegs;
}

// esp-hal facade re-export (for ergonomic access)
#[cfg(feature = "esp-hal")]
pub mod esp_hal {
    //! esp-hal integration facade.
    //!
    //! This module re-exports esp-hal integration helpers for ergonomic access.

    #![cfg_attr(docsrs, doc(cfg(feature = "esp-hal")))]

    pub use crate::integration::esp_hal::{
        Delay, EspHalInterruptController, Interrupt, InterruptHandler, Priority,
        SDIO_SLAVE_INTERRUPT,
    };
    pub use crate::sdio_slave_isr;
}

// Re-export async types when async feature is enabled
#[cfg(feature = "async")]
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
pub use sync::asynch::{FinishedFuture, HostIntFuture, RecvFuture};

/// Shared driver constants.
///
/// These are grouped into a dedicated module to keep the top-level facade
/// focused on driver types and integration points.
pub mod constants {
    pub use crate::internal::constants::{
        // Buffer limits
        DMA_ALIGNMENT,
        MAX_BUFFER_LEN,
        // Defaults
        DEFAULT_RECV_BUFFERS,
        DEFAULT_RECV_BUFFER_SIZE,
        DEFAULT_SEND_QUEUE_DEPTH,
        DEFAULT_SEND_SLOTS,
        // Host interface
        HOST_INT_BITS,
        SHARED_REG_COUNT,
        SHARED_REG_RESERVED_END,
        SHARED_REG_RESERVED_START,
        // Timing
        WAIT_POLL_INTERVAL_US,
    };
}

// =============================================================================
// Macro Helpers
// =============================================================================

/// Declare a static SDIO slave driver on the ESP32 peripheral.
///
/// The static is placed in DMA-capable memory on ESP32: the send
/// descriptors live inside the driver.
///
/// # Examples
///
/// ```ignore
/// ph_esp32_sdio_slave::sdio_slave_static!(SLAVE);
/// // or with explicit storage: 8 queued sends (9 slots), 16 receive buffers
/// ph_esp32_sdio_slave::sdio_slave_static!(BIG_SLAVE, 9, 16);
///
/// SLAVE.initialize(SlaveConfig::new(), &mut intc, handler).unwrap();
/// ```
#[macro_export]
macro_rules! sdio_slave_static {
    ($name:ident) => {
        $crate::sdio_slave_static!(
            $name,
            $crate::constants::DEFAULT_SEND_SLOTS,
            $crate::constants::DEFAULT_RECV_BUFFERS
        );
    };
    ($name:ident, $send:expr, $recv:expr) => {
        #[cfg_attr(target_arch = "xtensa", unsafe(link_section = ".dram1"))]
        static $name: $crate::SdioSlave<$crate::Esp32Sdio, { $send }, { $recv }> =
            $crate::SdioSlave::new($crate::Esp32Sdio::new());
    };
}
