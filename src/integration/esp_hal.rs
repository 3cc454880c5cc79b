//! esp-hal Integration Module
//!
//! This module provides integration with `esp-hal` when the `esp-hal` feature
//! is enabled. It offers:
//!
//! - [`EspHalInterruptController`]: binds the SLC0 interrupt through esp-hal
//! - [`sdio_slave_isr!`]: Macro for defining the slave interrupt handler
//! - Re-exports of the esp-hal types these need
//!
//! # Usage
//!
//! ```ignore
//! use ph_esp32_sdio_slave::{sdio_slave_static, SlaveConfig, Timeout};
//! use ph_esp32_sdio_slave::esp_hal::{sdio_slave_isr, Delay, EspHalInterruptController, Priority};
//!
//! sdio_slave_static!(SLAVE);
//!
//! sdio_slave_isr!(SLAVE_IRQ, Priority::Priority1, {
//!     SLAVE.handle_interrupt();
//! });
//!
//! fn main() {
//!     let mut intc = EspHalInterruptController::new();
//!     SLAVE.initialize(SlaveConfig::new(), &mut intc, SLAVE_IRQ).unwrap();
//!     SLAVE.start().unwrap();
//!
//!     let mut delay = Delay::new();
//!     let done = SLAVE.recv(Timeout::Forever, &mut delay).unwrap();
//! }
//! ```

pub use esp_hal::delay::Delay;
pub use esp_hal::interrupt::{self, InterruptHandler, Priority};
pub use esp_hal::peripherals::Interrupt;

use crate::driver::error::{ConfigError, ConfigResult};
use crate::hal::{InterruptController, IntrHandle};

/// The SDIO slave interrupt source.
///
/// Send, receive and host events all arrive on this one line. Use
/// [`InterruptStatus`] (returned by `handle_interrupt`) to see which fired.
///
/// [`InterruptStatus`]: crate::InterruptStatus
pub const SDIO_SLAVE_INTERRUPT: Interrupt = Interrupt::SLC0;

/// [`InterruptController`] backed by the esp-hal interrupt API.
///
/// `allocate` binds the handler to [`SDIO_SLAVE_INTERRUPT`] and enables it
/// on the current core at the handler's priority. `free` disables it again.
#[derive(Debug, Default)]
pub struct EspHalInterruptController {
    bound: bool,
}

impl EspHalInterruptController {
    /// Create a controller with nothing bound.
    pub const fn new() -> Self {
        Self { bound: false }
    }
}

impl InterruptController for EspHalInterruptController {
    type Handler = InterruptHandler;

    fn allocate(&mut self, handler: InterruptHandler) -> ConfigResult<IntrHandle> {
        if self.bound {
            return Err(ConfigError::InterruptAllocFailed);
        }

        #[cfg(multi_core)]
        for core in esp_hal::system::Cpu::other() {
            esp_hal::interrupt::disable(core, SDIO_SLAVE_INTERRUPT);
        }

        // SAFETY: the driver owns the SLC0 line while this binding is live
        unsafe {
            esp_hal::interrupt::bind_interrupt(SDIO_SLAVE_INTERRUPT, handler.handler());
        }
        esp_hal::interrupt::enable(SDIO_SLAVE_INTERRUPT, handler.priority())
            .map_err(|_| ConfigError::InterruptAllocFailed)?;

        self.bound = true;
        Ok(IntrHandle(SDIO_SLAVE_INTERRUPT as u32))
    }

    fn free(&mut self, _handle: IntrHandle) {
        esp_hal::interrupt::disable(esp_hal::system::Cpu::current(), SDIO_SLAVE_INTERRUPT);
        self.bound = false;
    }
}

/// Macro for defining the SDIO slave interrupt handler with esp-hal
/// semantics.
///
/// # Parameters
///
/// - `$name`: The name for the handler constant (e.g., `SLAVE_IRQ`)
/// - `$priority`: The interrupt priority (e.g., `Priority::Priority1`)
/// - `$body`: The handler body; it must call `handle_interrupt`
///
/// # Example
///
/// ```ignore
/// sdio_slave_isr!(SLAVE_IRQ, Priority::Priority1, {
///     SLAVE.handle_interrupt();
/// });
/// ```
///
/// # Equivalent Code
///
/// ```ignore
/// #[esp_hal::handler(priority = $priority)]
/// fn __sdio_slave_isr_internal() {
///     $body
/// }
/// const $name: InterruptHandler = __sdio_slave_isr_internal;
/// ```
#[macro_export]
macro_rules! sdio_slave_isr {
    ($name:ident, $priority:expr, $body:block) => {
        #[allow(non_upper_case_globals)]
        const $name: $crate::esp_hal::InterruptHandler = {
            #[esp_hal::handler(priority = $priority)]
            fn __sdio_slave_isr_internal() {
                $body
            }
            __sdio_slave_isr_internal
        };
    };
}
