//! SLCHOST Register Definitions
//!
//! The SLCHOST block is the part of the SDIO slave the host can address
//! directly: the shared configuration words, the slave→host interrupt
//! status and the bus timing configuration.

use super::{SLCHOST_BASE, read_reg, reg_rw, write_reg};

// =============================================================================
// Register Offsets
// =============================================================================

/// SLC0 host interrupt raw register offset
pub const SLC0HOST_INT_RAW_OFFSET: usize = 0x50;
/// SLC0 host interrupt status register offset
pub const SLC0HOST_INT_ST_OFFSET: usize = 0x58;
/// SLC0 host interrupt clear register offset
pub const SLC0HOST_INT_CLR_OFFSET: usize = 0xD4;
/// SLC0 host function 1 interrupt enable register offset
pub const SLC0HOST_FUNC1_INT_ENA_OFFSET: usize = 0xDC;
/// SLC0 host interrupt enable register offset
pub const SLC0HOST_INT_ENA_OFFSET: usize = 0xEC;
/// Host interface configuration register offset
pub const SLCHOST_CONF_OFFSET: usize = 0x1F0;

/// Offsets of the 16 shared configuration words (`CONF_W0`..`CONF_W15`).
///
/// The block interleaves other registers (`WIN_CMD`, `PKT_LEN0..2`) between
/// them, so the words are not contiguous.
pub const SHARED_WORD_OFFSETS: [usize; 16] = [
    0x6C, 0x70, 0x74, 0x78, 0x7C, 0x80, // CONF_W0..W5
    0x88, 0x8C, // CONF_W6..W7
    0x9C, 0xA0, 0xA4, 0xA8, 0xAC, 0xB0, 0xB4, 0xB8, // CONF_W8..W15
];

// =============================================================================
// SLC0 Host Interrupt Bits (RAW / ST / CLR / ENA share the layout)
// =============================================================================

/// Slave→host general purpose interrupt bits 0-7
pub const SLC0_TOHOST_BITS: u32 = 0xFF;
/// Receive underflow on the host side
pub const SLC0_RX_UDF: u32 = 1 << 16;
/// Transmit overflow on the host side
pub const SLC0_TX_OVF: u32 = 1 << 17;
/// Packet length valid
pub const SLC0_RX_PF_VALID: u32 = 1 << 18;
/// A new slave→host packet is available
pub const SLC0_RX_NEW_PACKET: u32 = 1 << 23;
/// The host retried a read
pub const SLC0_HOST_RD_RETRY: u32 = 1 << 24;

// =============================================================================
// Host Configuration Register (SLCHOST_CONF) Fields
// =============================================================================

/// Force SDIO 1.1 (negative edge) output timing, 5-bit field
pub const CONF_FRC_SDIO11_SHIFT: u32 = 0;
/// Force SDIO 2.0 (positive edge) output timing, 5-bit field
pub const CONF_FRC_SDIO20_SHIFT: u32 = 5;
/// Force negative edge sampling, 5-bit field
pub const CONF_FRC_NEG_SAMP_SHIFT: u32 = 10;
/// Force positive edge sampling, 5-bit field
pub const CONF_FRC_POS_SAMP_SHIFT: u32 = 15;
/// Width mask of each timing field
pub const CONF_FRC_FIELD: u32 = 0x1F;
/// Mask covering all four timing fields
pub const CONF_TIMING_MASK: u32 = (CONF_FRC_FIELD << CONF_FRC_SDIO11_SHIFT)
    | (CONF_FRC_FIELD << CONF_FRC_SDIO20_SHIFT)
    | (CONF_FRC_FIELD << CONF_FRC_NEG_SAMP_SHIFT)
    | (CONF_FRC_FIELD << CONF_FRC_POS_SAMP_SHIFT);
/// Enable the pad pull-ups of the SDIO lines
pub const CONF_SDIO_PAD_PULLUP: u32 = 1 << 26;
/// Accept the high speed mode switch
pub const CONF_HSPEED_CON_EN: u32 = 1 << 27;

// =============================================================================
// SLCHOST Register Access
// =============================================================================

/// SLCHOST register block accessor.
pub struct HostRegs;

impl HostRegs {
    reg_rw!(conf, set_conf, SLCHOST_BASE, SLCHOST_CONF_OFFSET, "Host interface configuration register");
    reg_rw!(func1_int_enable, set_func1_int_enable, SLCHOST_BASE, SLC0HOST_FUNC1_INT_ENA_OFFSET,
            "SLC0 host function 1 interrupt enable register");

    /// Read shared configuration word `word` (0..16)
    #[inline(always)]
    pub fn shared_word(word: usize) -> u32 {
        unsafe { read_reg(SLCHOST_BASE + SHARED_WORD_OFFSETS[word]) }
    }

    /// Write shared configuration word `word` (0..16)
    #[inline(always)]
    pub fn set_shared_word(word: usize, value: u32) {
        unsafe { write_reg(SLCHOST_BASE + SHARED_WORD_OFFSETS[word], value) }
    }

    /// Clear slave→host interrupt bits (write-1-to-clear)
    #[inline(always)]
    pub fn clear_interrupts(mask: u32) {
        unsafe { write_reg(SLCHOST_BASE + SLC0HOST_INT_CLR_OFFSET, mask) }
    }
}
