//! Error types for the ESP32 SDIO slave driver
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: Initialization and configuration failures
//! - [`DmaError`]: Buffer and descriptor issues
//! - [`IoError`]: Runtime send/receive and register failures
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by most driver methods. [`Error::kind`] folds every variant into the
//! four caller-facing categories of [`ErrorKind`].
//!
//! Broken descriptor lifecycle contracts (a ring release that does not match
//! the last drain, a completion count that disagrees with the active list)
//! are not errors: they panic.

// =============================================================================
// Error Kinds
// =============================================================================

/// Caller-facing error category.
///
/// `Timeout` is routine back-pressure. `InvalidArg` and `InvalidState` are
/// programming errors to fix at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// A blocking operation exceeded its deadline
    Timeout,
    /// Malformed length, buffer, handle or register position
    InvalidArg,
    /// Operation not allowed in the current driver or buffer state
    InvalidState,
    /// No descriptor (or interrupt) left to allocate
    OutOfMemory,
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and initialization errors
///
/// These errors occur during driver setup or teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Driver already initialized
    AlreadyInitialized,
    /// Driver not initialized yet
    NotInitialized,
    /// Invalid configuration parameter
    InvalidConfig,
    /// The interrupt controller could not allocate the SLC interrupt
    InterruptAllocFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::AlreadyInitialized => "already initialized",
            ConfigError::NotInitialized => "not initialized",
            ConfigError::InvalidConfig => "invalid configuration",
            ConfigError::InterruptAllocFailed => "interrupt allocation failed",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// Buffer and descriptor errors
///
/// These errors relate to the buffers handed to the SLC DMA engine and
/// the descriptors describing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// Buffer is not DMA-capable, not word aligned, or too small
    InvalidBuffer,
    /// Invalid transfer length (zero or exceeds descriptor maximum)
    InvalidLength,
    /// Handle does not name a registered buffer
    InvalidHandle,
    /// Buffer is loaded and owned by the DMA engine
    BufferInUse,
    /// No free descriptors left
    OutOfDescriptors,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::InvalidBuffer => "buffer not DMA-capable",
            DmaError::InvalidLength => "invalid transfer length",
            DmaError::InvalidHandle => "unknown buffer handle",
            DmaError::BufferInUse => "buffer in use by DMA",
            DmaError::OutOfDescriptors => "no descriptors available",
        }
    }
}

// =============================================================================
// I/O Errors
// =============================================================================

/// Runtime send/receive errors
///
/// These errors occur while the driver is moving data or touching the
/// host-visible registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoError {
    /// Operation timed out
    Timeout,
    /// Invalid state for operation (e.g., running, or buffer already loaded)
    InvalidState,
    /// Shared register position out of range or reserved
    InvalidRegister,
    /// Host interrupt bit out of range
    InvalidInterrupt,
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IoError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            IoError::Timeout => "operation timed out",
            IoError::InvalidState => "invalid state for operation",
            IoError::InvalidRegister => "invalid shared register",
            IoError::InvalidInterrupt => "invalid host interrupt",
        }
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::NotInitialized)) => { /* ... */ }
///     Err(Error::Dma(DmaError::BufferInUse)) => { /* ... */ }
///     Err(Error::Io(IoError::Timeout)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA error
    Dma(DmaError),
    /// I/O error
    Io(IoError),
}

impl Error {
    /// Fold the domain error into its caller-facing category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(IoError::Timeout) => ErrorKind::Timeout,
            Error::Config(ConfigError::InvalidConfig)
            | Error::Dma(
                DmaError::InvalidBuffer
                | DmaError::InvalidLength
                | DmaError::InvalidHandle
                | DmaError::BufferInUse,
            )
            | Error::Io(IoError::InvalidRegister | IoError::InvalidInterrupt) => {
                ErrorKind::InvalidArg
            }
            Error::Config(ConfigError::AlreadyInitialized | ConfigError::NotInitialized)
            | Error::Io(IoError::InvalidState) => ErrorKind::InvalidState,
            Error::Config(ConfigError::InterruptAllocFailed)
            | Error::Dma(DmaError::OutOfDescriptors) => ErrorKind::OutOfMemory,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Dma(e) => write!(f, "dma: {}", e.as_str()),
            Error::Io(e) => write!(f, "io: {}", e.as_str()),
        }
    }
}

// From impls for automatic conversion
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}

/// Result type alias for SDIO slave operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for DMA operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type alias for I/O operations
pub type IoResult<T> = core::result::Result<T, IoError>;

// =============================================================================
// Unit Tests
// =============================================================================
