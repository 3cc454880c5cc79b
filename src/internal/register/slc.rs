//! SLC Controller Register Definitions
//!
//! The SLC block owns the two descriptor-walking DMA channels of SDIO
//! function 1. Naming follows the hardware's point of view, which is the
//! opposite of the driver's: the SLC0 **RX** link carries slave→host data
//! (the driver's send path) and the SLC0 **TX** link carries host→slave
//! data (the driver's receive path).

use super::{SLC_BASE, reg_bit_ops, reg_ro, reg_rw, write_reg};

// =============================================================================
// Register Offsets
// =============================================================================

/// Configuration 0 register offset
pub const SLC_CONF0_OFFSET: usize = 0x00;
/// SLC0 raw interrupt register offset
pub const SLC_0INT_RAW_OFFSET: usize = 0x04;
/// SLC0 masked interrupt status register offset
pub const SLC_0INT_ST_OFFSET: usize = 0x08;
/// SLC0 interrupt enable register offset
pub const SLC_0INT_ENA_OFFSET: usize = 0x0C;
/// SLC0 interrupt clear register offset
pub const SLC_0INT_CLR_OFFSET: usize = 0x10;
/// SLC0 RX link (slave→host) register offset
pub const SLC_0RX_LINK_OFFSET: usize = 0x3C;
/// SLC0 TX link (host→slave) register offset
pub const SLC_0TX_LINK_OFFSET: usize = 0x40;
/// Interrupt vector towards the host register offset
pub const SLC_INTVEC_TOHOST_OFFSET: usize = 0x4C;
/// SLC0 token 1 (receive buffer count) register offset
pub const SLC_0TOKEN1_OFFSET: usize = 0x54;
/// SLC0 length configuration register offset
pub const SLC_0_LEN_CONF_OFFSET: usize = 0xE4;
/// SLC0 length register offset (read-only)
pub const SLC_0_LENGTH_OFFSET: usize = 0xE8;

// =============================================================================
// Configuration 0 Register (SLC_CONF0) Bits
// =============================================================================

/// SLC0 TX (host→slave) channel reset
pub const SLC0_TX_RST: u32 = 1 << 0;
/// SLC0 RX (slave→host) channel reset
pub const SLC0_RX_RST: u32 = 1 << 1;
/// AHB master FIFO reset
pub const SLC_AHBM_FIFO_RST: u32 = 1 << 2;
/// AHB master reset
pub const SLC_AHBM_RST: u32 = 1 << 3;
/// SLC0 TX loopback test mode
pub const SLC0_TX_LOOP_TEST: u32 = 1 << 4;
/// SLC0 RX loopback test mode
pub const SLC0_RX_LOOP_TEST: u32 = 1 << 5;
/// Write descriptors back after the RX channel consumed them
pub const SLC0_RX_AUTO_WRBACK: u32 = 1 << 6;
/// Automatically clear the token when the host reads it
pub const SLC0_TOKEN_AUTO_CLR: u32 = 1 << 14;

// =============================================================================
// SLC0 Interrupt Bits (RAW / ST / ENA / CLR share the layout)
// =============================================================================

/// Host→slave general purpose interrupt bits 0-7
pub const SLC0_FRHOST_BITS: u32 = 0xFF;
/// RX link start (written to RAW to force the send handler)
pub const SLC0_RX_START: u32 = 1 << 8;
/// TX link start
pub const SLC0_TX_START: u32 = 1 << 9;
/// A TX (host→slave) descriptor finished
pub const SLC0_TX_DONE: u32 = 1 << 14;
/// The TX link reached a descriptor with EOF set
pub const SLC0_TX_SUC_EOF: u32 = 1 << 15;
/// An RX (slave→host) descriptor finished
pub const SLC0_RX_DONE: u32 = 1 << 16;
/// The RX link finished a descriptor with EOF set
pub const SLC0_RX_EOF: u32 = 1 << 17;
/// Interrupt raised towards the host
pub const SLC0_TOHOST: u32 = 1 << 18;
/// The TX link ran out of descriptors
pub const SLC0_TX_DSCR_EMPTY: u32 = 1 << 21;

// =============================================================================
// Link Registers (SLC_0RX_LINK / SLC_0TX_LINK) Bits
// =============================================================================

/// Descriptor address field (low 20 bits of the DRAM address)
pub const LINK_ADDR_MASK: u32 = 0x000F_FFFF;
/// Stop walking the list
pub const LINK_STOP: u32 = 1 << 28;
/// Start walking the list at the programmed address
pub const LINK_START: u32 = 1 << 29;
/// Re-read the `next` field of the last descriptor and continue
pub const LINK_RESTART: u32 = 1 << 30;

// =============================================================================
// Token 1 Register (SLC_0TOKEN1) Bits
// =============================================================================

/// Token write data field
pub const TOKEN1_WDATA_MASK: u32 = 0x0000_0FFF;
/// Overwrite the token with WDATA
pub const TOKEN1_WR: u32 = 1 << 12;
/// Increase the token by one
pub const TOKEN1_INC: u32 = 1 << 13;
/// Increase the token by WDATA
pub const TOKEN1_INC_MORE: u32 = 1 << 14;

// =============================================================================
// Length Configuration Register (SLC_0_LEN_CONF) Bits
// =============================================================================

/// Length write data field (20 bits)
pub const LEN_WDATA_MASK: u32 = 0x000F_FFFF;
/// Overwrite the length with WDATA
pub const LEN_WR: u32 = 1 << 20;
/// Increase the length by one
pub const LEN_INC: u32 = 1 << 21;
/// Increase the length by WDATA
pub const LEN_INC_MORE: u32 = 1 << 22;

// =============================================================================
// SLC Register Access
// =============================================================================

/// SLC register block accessor.
pub struct SlcRegs;

impl SlcRegs {
    // -------------------------------------------------------------------------
    // Register accessors (generated by macros)
    // -------------------------------------------------------------------------

    reg_rw!(conf0, set_conf0, SLC_BASE, SLC_CONF0_OFFSET, "Configuration 0 register");
    reg_rw!(int_raw, set_int_raw, SLC_BASE, SLC_0INT_RAW_OFFSET, "SLC0 raw interrupt register");
    reg_ro!(int_status, SLC_BASE, SLC_0INT_ST_OFFSET, "SLC0 masked interrupt status");
    reg_rw!(int_enable, set_int_enable, SLC_BASE, SLC_0INT_ENA_OFFSET, "SLC0 interrupt enable register");
    reg_rw!(rx_link, set_rx_link, SLC_BASE, SLC_0RX_LINK_OFFSET, "SLC0 RX link register");
    reg_rw!(tx_link, set_tx_link, SLC_BASE, SLC_0TX_LINK_OFFSET, "SLC0 TX link register");
    reg_ro!(length, SLC_BASE, SLC_0_LENGTH_OFFSET, "SLC0 length register");

    // -------------------------------------------------------------------------
    // Bit operations (generated by macros)
    // -------------------------------------------------------------------------

    reg_bit_ops!(assert_rx_reset, release_rx_reset, SLC_BASE, SLC_CONF0_OFFSET, SLC0_RX_RST,
                 "SLC0 RX channel reset", "Assert", "Release");
    reg_bit_ops!(assert_tx_reset, release_tx_reset, SLC_BASE, SLC_CONF0_OFFSET, SLC0_TX_RST,
                 "SLC0 TX channel reset", "Assert", "Release");

    // -------------------------------------------------------------------------
    // Special operations (cannot be generated by simple macros)
    // -------------------------------------------------------------------------

    /// Clear interrupt bits (write-1-to-clear)
    #[inline(always)]
    pub fn clear_interrupts(mask: u32) {
        unsafe { write_reg(SLC_BASE + SLC_0INT_CLR_OFFSET, mask) }
    }

    /// Start the RX (slave→host) link at the given descriptor
    #[inline(always)]
    pub fn start_rx_link(desc_addr: u32) {
        let value = Self::rx_link() & !(LINK_ADDR_MASK | LINK_STOP | LINK_RESTART);
        Self::set_rx_link(value | (desc_addr & LINK_ADDR_MASK) | LINK_START);
    }

    /// Stop the RX (slave→host) link
    #[inline(always)]
    pub fn stop_rx_link() {
        Self::set_rx_link(Self::rx_link() | LINK_STOP);
    }

    /// Start the TX (host→slave) link at the given descriptor
    #[inline(always)]
    pub fn start_tx_link(desc_addr: u32) {
        let value = Self::tx_link() & !(LINK_ADDR_MASK | LINK_STOP | LINK_RESTART);
        Self::set_tx_link(value | (desc_addr & LINK_ADDR_MASK) | LINK_START);
    }

    /// Restart the TX (host→slave) link after its tail was extended
    #[inline(always)]
    pub fn restart_tx_link() {
        Self::set_tx_link(Self::tx_link() | LINK_RESTART);
    }

    /// Stop the TX (host→slave) link
    #[inline(always)]
    pub fn stop_tx_link() {
        Self::set_tx_link(Self::tx_link() | LINK_STOP);
    }

    /// Raise general purpose interrupt bits towards the host
    #[inline(always)]
    pub fn set_tohost_intvec(bits: u8) {
        unsafe { write_reg(SLC_BASE + SLC_INTVEC_TOHOST_OFFSET, bits as u32) }
    }

    /// Overwrite the receive buffer token with `value`
    #[inline(always)]
    pub fn write_token1(value: u32) {
        unsafe {
            write_reg(
                SLC_BASE + SLC_0TOKEN1_OFFSET,
                (value & TOKEN1_WDATA_MASK) | TOKEN1_WR,
            )
        }
    }

    /// Increase the receive buffer token by `count`
    #[inline(always)]
    pub fn increase_token1(count: u32) {
        unsafe {
            write_reg(
                SLC_BASE + SLC_0TOKEN1_OFFSET,
                (count & TOKEN1_WDATA_MASK) | TOKEN1_INC_MORE,
            )
        }
    }

    /// Overwrite the send length counter the host polls
    #[inline(always)]
    pub fn write_length(value: u32) {
        unsafe {
            write_reg(
                SLC_BASE + SLC_0_LEN_CONF_OFFSET,
                (value & LEN_WDATA_MASK) | LEN_WR,
            )
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_groups_do_not_overlap() {
        let send = SLC0_RX_EOF | SLC0_RX_START;
        assert_eq!(send & SLC0_TX_DONE, 0);
        assert_eq!(send & SLC0_FRHOST_BITS, 0);
        assert_eq!(SLC0_TX_DONE & SLC0_FRHOST_BITS, 0);
    }

    #[test]
    fn link_control_bits_outside_address_field() {
        for bit in [LINK_STOP, LINK_START, LINK_RESTART] {
            assert_eq!(bit & LINK_ADDR_MASK, 0);
        }
    }

    #[test]
    fn length_field_is_twenty_bits() {
        assert_eq!(LEN_WDATA_MASK, (1 << 20) - 1);
        assert_eq!(LEN_WR, LEN_WDATA_MASK + 1);
    }
}
