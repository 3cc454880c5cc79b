//! Centralized Constants
//!
//! This module provides a single source of truth for the magic numbers and
//! configuration defaults used throughout the SDIO slave driver.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Buffer limits**: descriptor field widths and DMA alignment
//! - **Default configuration**: queue depth, receive buffer size
//! - **Timing**: polling interval for bounded waits
//! - **Host interface**: shared register and host interrupt geometry
//!
//! # Note
//!
//! Hardware register bit definitions remain in their respective modules
//! (`register/slc.rs`, `register/host.rs`) as they are specific to those
//! hardware blocks.

// =============================================================================
// Buffer Limits
// =============================================================================

/// Largest value the 12-bit descriptor size/length fields can hold
pub const DESC_FIELD_MAX: usize = 0xFFF;

/// Largest buffer accepted for a single descriptor (word aligned)
pub const MAX_BUFFER_LEN: usize = 4092;

/// Required alignment of every DMA buffer in bytes
pub const DMA_ALIGNMENT: usize = 4;

/// Width mask of the hardware send length counter (20 bits)
pub const SEND_LENGTH_MASK: u32 = 0x000F_FFFF;

// =============================================================================
// Default Configuration
// =============================================================================

/// Default number of buffers that may be queued for sending
pub const DEFAULT_SEND_QUEUE_DEPTH: usize = 4;

/// Default receive buffer size announced to the DMA engine
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 512;

/// Default ring slot count (queue depth plus the sentinel slot)
pub const DEFAULT_SEND_SLOTS: usize = DEFAULT_SEND_QUEUE_DEPTH + 1;

/// Default number of receive descriptors
pub const DEFAULT_RECV_BUFFERS: usize = 8;

// =============================================================================
// Timing Constants
// =============================================================================

/// Poll interval of bounded waits in microseconds
pub const WAIT_POLL_INTERVAL_US: u32 = 10;

// =============================================================================
// Host Interface
// =============================================================================

/// Number of byte-wide shared registers visible to the host
pub const SHARED_REG_COUNT: usize = 64;

/// First reserved shared register position
pub const SHARED_REG_RESERVED_START: usize = 28;

/// Last reserved shared register position (inclusive)
pub const SHARED_REG_RESERVED_END: usize = 31;

/// Number of general purpose interrupt bits in each direction
pub const HOST_INT_BITS: usize = 8;
