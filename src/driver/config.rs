//! Configuration types for the SDIO slave driver.

use crate::driver::error::{ConfigError, ConfigResult};
use crate::internal::constants::{
    DEFAULT_RECV_BUFFER_SIZE, DEFAULT_SEND_QUEUE_DEPTH, DMA_ALIGNMENT, MAX_BUFFER_LEN,
};

/// How queued send buffers are grouped into DMA runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendingMode {
    /// Each buffer is its own run; the host reads one packet per buffer
    Packet,
    /// Everything queued since the last run is sent as one run
    #[default]
    Stream,
}

/// SDIO bus timing: which clock edge the slave drives data on and which
/// edge it samples host data on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdioTiming {
    /// Send on the positive edge, sample on the positive edge
    #[default]
    PsendPsample,
    /// Send on the negative edge, sample on the positive edge
    NsendPsample,
    /// Send on the positive edge, sample on the negative edge
    PsendNsample,
    /// Send on the negative edge, sample on the negative edge
    NsendNsample,
}

/// Bus and pad options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveFlags {
    /// DAT2 is not wired; the host must not use 4-bit mode
    pub dat2_disabled: bool,
    /// DAT1 is not used as the interrupt line; the host polls
    pub host_intr_disabled: bool,
    /// Enable the internal pull-ups on the SDIO pads
    pub internal_pullup: bool,
    /// Stay at default speed
    pub default_speed: bool,
    /// Allow high speed
    pub high_speed: bool,
}

/// Callback run from the interrupt handler once per host interrupt bit (0-7).
///
/// Runs with interrupts enabled but in interrupt context: it must not block.
pub type EventCallback = fn(u8);

/// SDIO slave driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Send run grouping
    pub sending_mode: SendingMode,
    /// Buffers that may be queued for sending at once
    pub send_queue_depth: usize,
    /// Size of every receive buffer (word aligned, at most 4092)
    pub recv_buffer_size: usize,
    /// Host interrupt callback
    pub event_callback: Option<EventCallback>,
    /// Bus timing
    pub timing: SdioTiming,
    /// Bus and pad options
    pub flags: SlaveFlags,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SlaveConfig {
    /// Create a configuration with default values
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sending_mode: SendingMode::Stream,
            send_queue_depth: DEFAULT_SEND_QUEUE_DEPTH,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            event_callback: None,
            timing: SdioTiming::PsendPsample,
            flags: SlaveFlags {
                dat2_disabled: false,
                host_intr_disabled: false,
                internal_pullup: false,
                default_speed: false,
                high_speed: false,
            },
        }
    }

    /// Set the sending mode
    #[must_use]
    pub const fn with_sending_mode(mut self, mode: SendingMode) -> Self {
        self.sending_mode = mode;
        self
    }

    /// Set the send queue depth
    #[must_use]
    pub const fn with_send_queue_depth(mut self, depth: usize) -> Self {
        self.send_queue_depth = depth;
        self
    }

    /// Set the receive buffer size
    #[must_use]
    pub const fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set the host interrupt callback
    #[must_use]
    pub const fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    /// Set the bus timing
    #[must_use]
    pub const fn with_timing(mut self, timing: SdioTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Set bus and pad options
    #[must_use]
    pub const fn with_flags(mut self, flags: SlaveFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check the configuration for values the hardware cannot take.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero queue depth or a receive buffer size that
    /// is zero, not word aligned, or above 4092 bytes.
    pub const fn validate(&self) -> ConfigResult<()> {
        if self.send_queue_depth == 0
            || self.recv_buffer_size == 0
            || self.recv_buffer_size % DMA_ALIGNMENT != 0
            || self.recv_buffer_size > MAX_BUFFER_LEN
        {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(())
    }
}

/// SDIO slave driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Not initialized
    #[default]
    Uninitialized,
    /// Initialized but not started
    Initialized,
    /// Running (both directions armed)
    Running,
    /// Stopped (disarmed but still initialized)
    Stopped,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: u8) {}

    #[test]
    fn config_default_values() {
        let config = SlaveConfig::new();
        assert_eq!(config.sending_mode, SendingMode::Stream);
        assert_eq!(config.send_queue_depth, DEFAULT_SEND_QUEUE_DEPTH);
        assert_eq!(config.recv_buffer_size, DEFAULT_RECV_BUFFER_SIZE);
        assert!(config.event_callback.is_none());
        assert_eq!(config.timing, SdioTiming::PsendPsample);
        assert_eq!(config.flags, SlaveFlags::default());
        assert_eq!(config, SlaveConfig::default());
    }

    #[test]
    fn config_builder_chain() {
        let config = SlaveConfig::new()
            .with_sending_mode(SendingMode::Packet)
            .with_send_queue_depth(8)
            .with_recv_buffer_size(1024)
            .with_event_callback(noop)
            .with_timing(SdioTiming::NsendNsample)
            .with_flags(SlaveFlags {
                internal_pullup: true,
                ..SlaveFlags::default()
            });

        assert_eq!(config.sending_mode, SendingMode::Packet);
        assert_eq!(config.send_queue_depth, 8);
        assert_eq!(config.recv_buffer_size, 1024);
        assert!(config.event_callback.is_some());
        assert_eq!(config.timing, SdioTiming::NsendNsample);
        assert!(config.flags.internal_pullup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_sizes() {
        let bad = [
            SlaveConfig::new().with_send_queue_depth(0),
            SlaveConfig::new().with_recv_buffer_size(0),
            SlaveConfig::new().with_recv_buffer_size(510),
            SlaveConfig::new().with_recv_buffer_size(4096),
        ];
        for config in bad {
            assert_eq!(config.validate(), Err(ConfigError::InvalidConfig));
        }
        assert!(SlaveConfig::new().with_recv_buffer_size(4092).validate().is_ok());
    }

    #[test]
    fn state_default_is_uninitialized() {
        assert_eq!(State::default(), State::Uninitialized);
    }
}
