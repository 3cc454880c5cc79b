//! SLC DMA descriptor structure.
//!
//! Each descriptor points to a data buffer and carries the ownership and
//! end-of-frame bits the CPU and the DMA engine use to hand buffers back
//! and forth. Descriptors are chained through their link word; the engine
//! follows the chain until it reaches a descriptor whose link is zero.

pub mod bits;

use bits::{LINK_END, ctrl};

/// Volatile cell wrapper for descriptor fields
///
/// Ensures all accesses are volatile to prevent compiler optimization
/// from reordering or caching descriptor field accesses.
#[repr(transparent)]
pub(crate) struct VolatileCell<T: Copy> {
    value: core::cell::UnsafeCell<T>,
}

// Safety: VolatileCell is safe to share between threads because all access
// is through volatile operations which are atomic for u32 on ESP32.
unsafe impl<T: Copy> Sync for VolatileCell<T> {}

impl<T: Copy> VolatileCell<T> {
    /// Create a new volatile cell with the given initial value
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self {
            value: core::cell::UnsafeCell::new(value),
        }
    }

    /// Read the value (volatile read)
    #[inline(always)]
    pub fn get(&self) -> T {
        unsafe { core::ptr::read_volatile(self.value.get()) }
    }

    /// Write a value (volatile write)
    #[inline(always)]
    pub fn set(&self, value: T) {
        unsafe { core::ptr::write_volatile(self.value.get(), value) }
    }

    /// Update the value using a function (read-modify-write)
    #[inline(always)]
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(T) -> T,
    {
        let old = self.get();
        self.set(f(old));
    }
}

impl<T: Copy + Default> Default for VolatileCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// =============================================================================
// DMA Descriptor
// =============================================================================

/// SLC linked-list DMA descriptor (12 bytes).
#[repr(C, align(4))]
pub struct DmaDescriptor {
    /// Word 0: size, length, offset, sosf, eof, owner
    ctrl: VolatileCell<u32>,
    /// Word 1: buffer address
    buffer: VolatileCell<u32>,
    /// Word 2: next descriptor address (0 terminates the list)
    next: VolatileCell<u32>,
}

impl DmaDescriptor {
    /// Size of the descriptor in bytes
    pub const SIZE: usize = 12;

    /// Create a new zeroed descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ctrl: VolatileCell::new(0),
            buffer: VolatileCell::new(0),
            next: VolatileCell::new(LINK_END),
        }
    }

    /// Address of this descriptor as the DMA engine sees it.
    #[inline(always)]
    #[must_use]
    pub fn addr(&self) -> u32 {
        self as *const Self as u32
    }

    /// Describe a buffer without touching the link word.
    ///
    /// Ownership is left with the CPU; hand the descriptor over with
    /// [`set_owned`](Self::set_owned) once it is linked where it belongs.
    pub fn prepare(&self, buffer: *const u8, size: usize, length: usize, eof: bool) {
        self.buffer.set(buffer as u32);
        let mut word = ((size as u32) << ctrl::SIZE_SHIFT) & ctrl::SIZE_MASK;
        word |= ((length as u32) << ctrl::LENGTH_SHIFT) & ctrl::LENGTH_MASK;
        if eof {
            word |= ctrl::EOF;
        }
        self.ctrl.set(word);
    }

    /// Check if descriptor is owned by the DMA engine.
    #[inline(always)]
    #[must_use]
    pub fn is_owned(&self) -> bool {
        (self.ctrl.get() & ctrl::OWNER) != 0
    }

    /// Give ownership to the DMA engine.
    #[inline(always)]
    pub fn set_owned(&self) {
        self.ctrl.update(|v| v | ctrl::OWNER);
    }

    /// Take ownership from the DMA engine for CPU use.
    #[inline(always)]
    pub fn clear_owned(&self) {
        self.ctrl.update(|v| v & !ctrl::OWNER);
    }

    /// Check if the descriptor ends a run.
    #[inline(always)]
    #[must_use]
    pub fn is_eof(&self) -> bool {
        (self.ctrl.get() & ctrl::EOF) != 0
    }

    /// Set or clear the end-of-frame bit.
    #[inline(always)]
    pub fn set_eof(&self, eof: bool) {
        self.ctrl
            .update(|v| if eof { v | ctrl::EOF } else { v & !ctrl::EOF });
    }

    /// Check the start-of-sub-frame bit.
    #[inline(always)]
    #[must_use]
    pub fn is_start_of_subframe(&self) -> bool {
        (self.ctrl.get() & ctrl::SOSF) != 0
    }

    /// Buffer capacity in bytes.
    #[inline(always)]
    #[must_use]
    pub fn size(&self) -> usize {
        ((self.ctrl.get() & ctrl::SIZE_MASK) >> ctrl::SIZE_SHIFT) as usize
    }

    /// Valid bytes in the buffer.
    #[inline(always)]
    #[must_use]
    pub fn length(&self) -> usize {
        ((self.ctrl.get() & ctrl::LENGTH_MASK) >> ctrl::LENGTH_SHIFT) as usize
    }

    /// Get buffer address.
    #[inline(always)]
    #[must_use]
    pub fn buffer_addr(&self) -> u32 {
        self.buffer.get()
    }

    /// Get next descriptor address (0 at the end of a list).
    #[inline(always)]
    #[must_use]
    pub fn next_addr(&self) -> u32 {
        self.next.get()
    }

    /// Link this descriptor to `next`.
    #[inline(always)]
    pub fn link_to(&self, next: &DmaDescriptor) {
        self.next.set(next.addr());
    }

    /// Terminate the list at this descriptor.
    #[inline(always)]
    pub fn unlink(&self) {
        self.next.set(LINK_END);
    }

    /// Reset control and buffer words, keeping the link.
    pub fn reset(&self) {
        self.ctrl.set(0);
        self.buffer.set(0);
    }

    /// Simulate the DMA engine finishing this descriptor.
    #[cfg(test)]
    pub fn complete(&self, length: usize) {
        self.ctrl.update(|v| {
            let v = (v & !ctrl::LENGTH_MASK)
                | (((length as u32) << ctrl::LENGTH_SHIFT) & ctrl::LENGTH_MASK);
            (v | ctrl::EOF) & !ctrl::OWNER
        });
    }
}

impl Default for DmaDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_layout_matches_hardware() {
        assert_eq!(core::mem::size_of::<DmaDescriptor>(), DmaDescriptor::SIZE);
        assert_eq!(core::mem::align_of::<DmaDescriptor>(), 4);
    }

    #[test]
    fn new_descriptor_is_cpu_owned_and_unlinked() {
        let desc = DmaDescriptor::new();
        assert!(!desc.is_owned());
        assert!(!desc.is_eof());
        assert_eq!(desc.next_addr(), LINK_END);
    }

    #[test]
    fn prepare_packs_size_and_length() {
        let desc = DmaDescriptor::new();
        desc.prepare(core::ptr::null(), 512, 100, true);
        assert_eq!(desc.size(), 512);
        assert_eq!(desc.length(), 100);
        assert!(desc.is_eof());
        assert!(!desc.is_owned());
        assert!(!desc.is_start_of_subframe());
    }

    #[test]
    fn prepare_keeps_link() {
        let a = DmaDescriptor::new();
        let b = DmaDescriptor::new();
        a.link_to(&b);
        a.prepare(core::ptr::null(), 4, 4, false);
        assert_eq!(a.next_addr(), b.addr());
    }

    #[test]
    fn ownership_round_trip() {
        let desc = DmaDescriptor::new();
        desc.prepare(core::ptr::null(), 64, 0, false);
        desc.set_owned();
        assert!(desc.is_owned());
        assert_eq!(desc.size(), 64);
        desc.clear_owned();
        assert!(!desc.is_owned());
    }

    #[test]
    fn eof_toggle_preserves_other_bits() {
        let desc = DmaDescriptor::new();
        desc.prepare(core::ptr::null(), 32, 16, false);
        desc.set_owned();
        desc.set_eof(true);
        assert!(desc.is_eof());
        assert!(desc.is_owned());
        desc.set_eof(false);
        assert!(!desc.is_eof());
        assert_eq!(desc.length(), 16);
    }

    #[test]
    fn complete_hands_back_to_cpu() {
        let desc = DmaDescriptor::new();
        desc.prepare(core::ptr::null(), 128, 0, false);
        desc.set_owned();
        desc.complete(77);
        assert!(!desc.is_owned());
        assert!(desc.is_eof());
        assert_eq!(desc.length(), 77);
        assert_eq!(desc.size(), 128);
    }

    #[test]
    fn unlink_terminates_list() {
        let a = DmaDescriptor::new();
        let b = DmaDescriptor::new();
        a.link_to(&b);
        a.unlink();
        assert_eq!(a.next_addr(), LINK_END);
    }
}
