//! Core driver components for the ESP32 SDIO slave.
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`error`] - Error types and result aliases
//! - [`interrupt`] - Interrupt status groups and host interrupt masks
//! - [`slave`] - The SDIO slave driver
//!
//! # Example
//!
//! ```ignore
//! use ph_esp32_sdio_slave::driver::{SendingMode, SlaveConfig};
//!
//! let config = SlaveConfig::new()
//!     .with_sending_mode(SendingMode::Packet)
//!     .with_send_queue_depth(8);
//! ```

pub mod config;
pub mod error;
pub mod interrupt;
pub mod slave;

pub use config::{EventCallback, SdioTiming, SendingMode, SlaveConfig, SlaveFlags, State};
pub use error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, ErrorKind, IoError, IoResult, Result,
};
pub use interrupt::{HostInterrupt, InterruptStatus};
pub use slave::{SdioSlave, SdioSlaveDefault};
