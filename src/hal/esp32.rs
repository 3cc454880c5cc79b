//! ESP32 SDIO slave adapter
//!
//! Implements [`SlaveHal`] on the SLC and SLCHOST register blocks. Pin
//! muxing and the SDIO function enable are left to the board bring-up code.

use super::SlaveHal;
use crate::driver::config::{SdioTiming, SlaveConfig};
use crate::internal::register::host::{
    CONF_FRC_FIELD, CONF_FRC_NEG_SAMP_SHIFT, CONF_FRC_POS_SAMP_SHIFT, CONF_FRC_SDIO11_SHIFT,
    CONF_FRC_SDIO20_SHIFT, CONF_HSPEED_CON_EN, CONF_SDIO_PAD_PULLUP, CONF_TIMING_MASK, HostRegs,
};
use crate::internal::register::slc::{
    SLC_AHBM_FIFO_RST, SLC_AHBM_RST, SLC0_RX_AUTO_WRBACK, SLC0_RX_LOOP_TEST,
    SLC0_TOKEN_AUTO_CLR, SLC0_TX_LOOP_TEST, SlcRegs,
};

/// Start of internal SRAM the SLC DMA engine can reach
pub const DMA_CAPABLE_START: usize = 0x3FFA_E000;
/// End (exclusive) of DMA-capable internal SRAM
pub const DMA_CAPABLE_END: usize = 0x4000_0000;

/// Register-backed SDIO slave peripheral.
#[derive(Debug, Default, Clone, Copy)]
pub struct Esp32Sdio;

impl Esp32Sdio {
    /// Create the adapter. Zero-sized; the registers are global.
    pub const fn new() -> Self {
        Self
    }
}

/// SLCHOST_CONF sampling and drive-edge fields for a timing mode.
pub(crate) const fn timing_bits(timing: SdioTiming) -> u32 {
    const ON: u32 = CONF_FRC_FIELD;
    let (sdio20, sdio11, pos_samp, neg_samp) = match timing {
        SdioTiming::PsendPsample => (ON, 0, ON, 0),
        SdioTiming::NsendPsample => (0, ON, ON, 0),
        SdioTiming::PsendNsample => (ON, 0, 0, ON),
        SdioTiming::NsendNsample => (0, ON, 0, ON),
    };
    (sdio20 << CONF_FRC_SDIO20_SHIFT)
        | (sdio11 << CONF_FRC_SDIO11_SHIFT)
        | (pos_samp << CONF_FRC_POS_SAMP_SHIFT)
        | (neg_samp << CONF_FRC_NEG_SAMP_SHIFT)
}

impl SlaveHal for Esp32Sdio {
    fn init_hardware(&self, config: &SlaveConfig) {
        SlcRegs::assert_rx_reset();
        SlcRegs::assert_tx_reset();
        SlcRegs::set_conf0(SlcRegs::conf0() | SLC_AHBM_RST | SLC_AHBM_FIFO_RST);
        SlcRegs::release_rx_reset();
        SlcRegs::release_tx_reset();
        SlcRegs::set_conf0(SlcRegs::conf0() & !(SLC_AHBM_RST | SLC_AHBM_FIFO_RST));

        let conf0 = SlcRegs::conf0() & !(SLC0_TX_LOOP_TEST | SLC0_RX_LOOP_TEST);
        SlcRegs::set_conf0(conf0 | SLC0_RX_AUTO_WRBACK | SLC0_TOKEN_AUTO_CLR);

        SlcRegs::set_int_enable(0);
        SlcRegs::clear_interrupts(u32::MAX);

        let mut conf = HostRegs::conf() & !(CONF_TIMING_MASK | CONF_SDIO_PAD_PULLUP);
        conf |= timing_bits(config.timing);
        if config.flags.internal_pullup {
            conf |= CONF_SDIO_PAD_PULLUP;
        }
        if config.flags.default_speed {
            conf &= !CONF_HSPEED_CON_EN;
        } else if config.flags.high_speed {
            conf |= CONF_HSPEED_CON_EN;
        }
        HostRegs::set_conf(conf);
    }

    fn deinit_hardware(&self) {
        SlcRegs::stop_rx_link();
        SlcRegs::stop_tx_link();
        SlcRegs::set_int_enable(0);
        SlcRegs::clear_interrupts(u32::MAX);
        HostRegs::set_func1_int_enable(0);
    }

    fn interrupt_status(&self) -> u32 {
        SlcRegs::int_status()
    }

    fn clear_interrupts(&self, mask: u32) {
        SlcRegs::clear_interrupts(mask);
    }

    fn enable_interrupts(&self, mask: u32) {
        SlcRegs::set_int_enable(SlcRegs::int_enable() | mask);
    }

    fn disable_interrupts(&self, mask: u32) {
        SlcRegs::set_int_enable(SlcRegs::int_enable() & !mask);
    }

    fn force_interrupt(&self, mask: u32) {
        SlcRegs::set_int_raw(SlcRegs::int_raw() | mask);
    }

    fn send_dma_start(&self, head: u32) {
        SlcRegs::start_rx_link(head);
    }

    fn send_dma_stop(&self) {
        SlcRegs::stop_rx_link();
    }

    fn send_set_length(&self, len: u32) {
        SlcRegs::write_length(len);
    }

    fn recv_dma_start(&self, head: u32) {
        SlcRegs::start_tx_link(head);
    }

    fn recv_dma_restart(&self) {
        SlcRegs::restart_tx_link();
    }

    fn recv_dma_stop(&self) {
        SlcRegs::stop_tx_link();
    }

    fn recv_token_reset(&self) {
        SlcRegs::write_token1(0);
    }

    fn recv_token_increment(&self, count: u32) {
        SlcRegs::increase_token1(count);
    }

    fn read_shared_word(&self, word: usize) -> u32 {
        HostRegs::shared_word(word)
    }

    fn write_shared_word(&self, word: usize, value: u32) {
        HostRegs::set_shared_word(word, value);
    }

    fn raise_host_interrupt(&self, bit: u8) {
        SlcRegs::set_tohost_intvec(1 << (bit & 0x7));
    }

    fn clear_host_interrupt(&self, mask: u32) {
        HostRegs::clear_interrupts(mask);
    }

    fn host_interrupt_enable(&self) -> u32 {
        HostRegs::func1_int_enable()
    }

    fn set_host_interrupt_enable(&self, mask: u32) {
        HostRegs::set_func1_int_enable(mask);
    }

    fn is_dma_capable(&self, addr: usize) -> bool {
        (DMA_CAPABLE_START..DMA_CAPABLE_END).contains(&addr)
    }
}
