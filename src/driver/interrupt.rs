//! Interrupt status handling for the ESP32 SDIO slave.
//!
//! One SLC interrupt line carries three logical sources. The dispatcher
//! masks the status register against three fixed bit groups:
//!
//! | Group | Bits | Sub-handler |
//! |-------|------|-------------|
//! | send  | `SLC0_RX_EOF`, `SLC0_RX_START` | run completion / run start |
//! | recv  | `SLC0_TX_DONE` | receive progress |
//! | host  | `SLC0_FRHOST_BIT0..7` | host to slave general interrupts |
//!
//! [`HostInterrupt`] covers the other direction: interrupts the slave
//! raises towards the host.

use crate::internal::register::host::{
    SLC0_RX_NEW_PACKET, SLC0_RX_UDF, SLC0_TOHOST_BITS, SLC0_TX_OVF,
};
use crate::internal::register::slc::{SLC0_FRHOST_BITS, SLC0_RX_EOF, SLC0_RX_START, SLC0_TX_DONE};

// =============================================================================
// Interrupt Groups
// =============================================================================

/// A send run reached its `eof` descriptor
pub const SEND_DONE: u32 = SLC0_RX_EOF;
/// Software-forced "re-evaluate the send queue" request
pub const SEND_INVOKE: u32 = SLC0_RX_START;
/// Every bit handled by the send sub-handler
pub const SEND_INTERRUPTS: u32 = SEND_DONE | SEND_INVOKE;
/// The receive link finished a descriptor
pub const RECV_DONE: u32 = SLC0_TX_DONE;
/// Every bit handled by the receive sub-handler
pub const RECV_INTERRUPTS: u32 = RECV_DONE;
/// General purpose host to slave interrupts 0-7
pub const HOST_INTERRUPTS: u32 = SLC0_FRHOST_BITS;

// =============================================================================
// Interrupt Status
// =============================================================================

/// Interrupt status split into the driver's sub-handler groups.
///
/// # Example
///
/// ```ignore
/// let status = slave.handle_interrupt();
/// if status.recv_done {
///     // a receive task will wake up
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptStatus {
    /// Send run complete
    pub send_done: bool,
    /// Send queue re-evaluation requested
    pub send_invoke: bool,
    /// Receive descriptor complete
    pub recv_done: bool,
    /// Host to slave general purpose bits, bit `n` = interrupt `n`
    pub host_bits: u8,
}

impl InterruptStatus {
    /// Create from the masked SLC0 interrupt status
    #[inline]
    pub fn from_raw(status: u32) -> Self {
        Self {
            send_done: (status & SEND_DONE) != 0,
            send_invoke: (status & SEND_INVOKE) != 0,
            recv_done: (status & RECV_DONE) != 0,
            host_bits: (status & HOST_INTERRUPTS) as u8,
        }
    }

    /// Convert to raw value for clearing (write-1-to-clear)
    #[inline]
    pub fn to_raw(&self) -> u32 {
        let mut val = u32::from(self.host_bits);
        if self.send_done {
            val |= SEND_DONE;
        }
        if self.send_invoke {
            val |= SEND_INVOKE;
        }
        if self.recv_done {
            val |= RECV_DONE;
        }
        val
    }

    /// Whether the send sub-handler has work
    #[inline]
    pub fn send(&self) -> bool {
        self.send_done || self.send_invoke
    }

    /// Check if any interrupt occurred
    #[inline]
    pub fn any(&self) -> bool {
        self.send() || self.recv_done || self.host_bits != 0
    }

    /// Asserted host interrupt numbers, lowest first
    pub fn host_interrupts(&self) -> impl Iterator<Item = u8> + use<> {
        let bits = self.host_bits;
        (0..8u8).filter(move |i| bits & (1 << i) != 0)
    }
}

// =============================================================================
// Slave to Host Interrupts
// =============================================================================

/// Set of slave to host interrupt sources, as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HostInterrupt(pub u32);

impl HostInterrupt {
    /// No interrupt
    pub const NONE: Self = Self(0);
    /// General purpose interrupt 0
    pub const GENERAL_0: Self = Self(1 << 0);
    /// General purpose interrupt 1
    pub const GENERAL_1: Self = Self(1 << 1);
    /// General purpose interrupt 2
    pub const GENERAL_2: Self = Self(1 << 2);
    /// General purpose interrupt 3
    pub const GENERAL_3: Self = Self(1 << 3);
    /// General purpose interrupt 4
    pub const GENERAL_4: Self = Self(1 << 4);
    /// General purpose interrupt 5
    pub const GENERAL_5: Self = Self(1 << 5);
    /// General purpose interrupt 6
    pub const GENERAL_6: Self = Self(1 << 6);
    /// General purpose interrupt 7
    pub const GENERAL_7: Self = Self(1 << 7);
    /// All general purpose interrupts
    pub const GENERAL_ALL: Self = Self(SLC0_TOHOST_BITS);
    /// Host read past the end of the send data
    pub const RX_UNDERFLOW: Self = Self(SLC0_RX_UDF);
    /// Host wrote past the loaded receive buffers
    pub const TX_OVERFLOW: Self = Self(SLC0_TX_OVF);
    /// A new send run is available to the host
    pub const NEW_PACKET: Self = Self(SLC0_RX_NEW_PACKET);

    /// General purpose interrupt `pos` (0-7)
    pub const fn general(pos: u8) -> Option<Self> {
        if pos < 8 { Some(Self(1 << pos)) } else { None }
    }

    /// Raw register bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every source in `other` is in `self`
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for HostInterrupt {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for HostInterrupt {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_status_from_raw_zero() {
        let status = InterruptStatus::from_raw(0);
        assert!(!status.any());
        assert_eq!(status, InterruptStatus::default());
    }

    #[test]
    fn interrupt_status_groups() {
        let status = InterruptStatus::from_raw(SEND_DONE | RECV_DONE | 0b1010_0001);
        assert!(status.send_done);
        assert!(!status.send_invoke);
        assert!(status.send());
        assert!(status.recv_done);
        assert_eq!(status.host_bits, 0b1010_0001);
    }

    #[test]
    fn interrupt_status_ignores_unrelated_bits() {
        let status = InterruptStatus::from_raw(1 << 31);
        assert!(!status.any());
    }

    #[test]
    fn interrupt_status_roundtrip() {
        let raw = SEND_INVOKE | 0x0F;
        assert_eq!(InterruptStatus::from_raw(raw).to_raw(), raw);
    }

    #[test]
    fn host_interrupts_iterate_in_bit_order() {
        let status = InterruptStatus::from_raw(0b1000_0101);
        let bits: [u8; 3] = core::array::from_fn({
            let mut it = status.host_interrupts();
            move |_| it.next().unwrap()
        });
        assert_eq!(bits, [0, 2, 7]);
    }

    #[test]
    fn groups_are_disjoint() {
        assert_eq!(SEND_INTERRUPTS & RECV_INTERRUPTS, 0);
        assert_eq!(SEND_INTERRUPTS & HOST_INTERRUPTS, 0);
        assert_eq!(RECV_INTERRUPTS & HOST_INTERRUPTS, 0);
    }

    #[test]
    fn host_interrupt_set_ops() {
        let set = HostInterrupt::GENERAL_0 | HostInterrupt::NEW_PACKET;
        assert!(set.contains(HostInterrupt::GENERAL_0));
        assert!(!set.contains(HostInterrupt::GENERAL_1));
        assert_eq!(HostInterrupt::general(3), Some(HostInterrupt::GENERAL_3));
        assert_eq!(HostInterrupt::general(8), None);
        assert_eq!(HostInterrupt::GENERAL_ALL.bits(), 0xFF);
    }
}
