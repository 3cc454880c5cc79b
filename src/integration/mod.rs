//! External Stack Integrations
//!
//! - **esp-hal** (`esp_hal`): Integration with the esp-hal hardware abstraction layer
//!   - Interrupt binding through [`InterruptController`](crate::InterruptController)
//!   - Handler definition macro
//!   - Requires `esp-hal` feature
//!
//! # Example
//!
//! ```ignore
//! use ph_esp32_sdio_slave::integration::esp_hal::{EspHalInterruptController, Priority};
//! let mut intc = EspHalInterruptController::new();
//! SLAVE.initialize(config, &mut intc, SLAVE_IRQ)?;
//! ```

#[cfg(feature = "esp-hal")]
pub mod esp_hal;

#[cfg(feature = "esp-hal")]
pub use esp_hal::{EspHalInterruptController, SDIO_SLAVE_INTERRUPT};
