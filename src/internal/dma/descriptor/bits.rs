//! DMA descriptor bit field constants.
//!
//! Based on the ESP32 TRM linked-list descriptor (`lldesc`) layout shared by
//! the SLC, I2S and SPI DMA engines.

#![allow(dead_code)]

// =============================================================================
// Word 0 - Control and Status
// =============================================================================

/// Descriptor word 0 bit field constants
pub mod ctrl {
    /// Buffer size field shift (bits 0-11)
    pub const SIZE_SHIFT: u32 = 0;
    /// Buffer size field mask - capacity of the attached buffer
    pub const SIZE_MASK: u32 = 0xFFF << SIZE_SHIFT;
    /// Length field shift (bits 12-23)
    pub const LENGTH_SHIFT: u32 = 12;
    /// Length field mask - valid bytes in the attached buffer
    pub const LENGTH_MASK: u32 = 0xFFF << LENGTH_SHIFT;
    /// Offset field shift (bits 24-28)
    pub const OFFSET_SHIFT: u32 = 24;
    /// Offset field mask
    pub const OFFSET_MASK: u32 = 0x1F << OFFSET_SHIFT;
    /// Start of sub-frame
    pub const SOSF: u32 = 1 << 29;
    /// End of frame - the DMA engine finishes the run after this descriptor
    pub const EOF: u32 = 1 << 30;
    /// Owner - 1 = DMA engine, 0 = CPU
    pub const OWNER: u32 = 1 << 31;
}

// =============================================================================
// Word 2 - Link
// =============================================================================

/// Value of the link word that terminates a hardware-walked list
pub const LINK_END: u32 = 0;
