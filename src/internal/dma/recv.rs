//! Receive (host to slave) engine.
//!
//! Every registered buffer owns one descriptor slot. A slot sits in exactly
//! one of two lists:
//!
//! - `registered`: idle, invisible to hardware
//! - `active`: loaded, linked into the hardware-walked chain in load order
//!
//! The interrupt handler walks `next_completion` forward through `active`
//! while the DMA engine hands descriptors back, signalling one completion
//! per step. [`RecvEngine::take_completed`] then pops the head of `active`.
//! The engine itself is not synchronized; the driver keeps it inside one
//! critical-section cell so every list move is atomic with respect to the
//! interrupt.

use super::descriptor::DmaDescriptor;
use crate::driver::error::{ConfigError, DmaError, DmaResult, IoError, Result};
use crate::driver::interrupt::RECV_INTERRUPTS;
use crate::hal::SlaveHal;
use crate::internal::constants::DMA_ALIGNMENT;

// =============================================================================
// Handles
// =============================================================================

/// Handle to a registered receive buffer.
///
/// Handles are invalidated by [`unregister`](RecvEngine::unregister); a
/// stale handle is rejected even if its slot was reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecvHandle {
    index: u16,
    generation: u16,
}

impl RecvHandle {
    /// Slot index behind this handle.
    pub const fn index(&self) -> usize {
        self.index as usize
    }
}

/// A buffer the host has written, handed back by the receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvCompletion {
    /// Handle to load again (or unregister)
    pub handle: RecvHandle,
    /// Start of the buffer
    pub buffer: *mut u8,
    /// Bytes written by the host
    pub len: usize,
}

// =============================================================================
// Slots and Lists
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Free,
    Registered,
    Active,
}

struct RecvSlot {
    desc: DmaDescriptor,
    buffer: *mut u8,
    membership: Membership,
    prev: Option<u16>,
    next: Option<u16>,
    generation: u16,
}

impl RecvSlot {
    const fn new() -> Self {
        Self {
            desc: DmaDescriptor::new(),
            buffer: core::ptr::null_mut(),
            membership: Membership::Free,
            prev: None,
            next: None,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct List {
    head: Option<u16>,
    tail: Option<u16>,
    len: usize,
}

impl List {
    const EMPTY: Self = Self {
        head: None,
        tail: None,
        len: 0,
    };
}

// =============================================================================
// Receive Engine
// =============================================================================

/// Receive engine over `N` descriptor slots.
pub struct RecvEngine<const N: usize> {
    slots: [RecvSlot; N],
    registered: List,
    active: List,
    next_completion: Option<u16>,
    buffer_size: usize,
    armed: bool,
}

impl<const N: usize> RecvEngine<N> {
    /// Create an uninitialized engine.
    pub const fn new() -> Self {
        Self {
            slots: [const { RecvSlot::new() }; N],
            registered: List::EMPTY,
            active: List::EMPTY,
            next_completion: None,
            buffer_size: 0,
            armed: false,
        }
    }

    /// Set the per-buffer size the hardware is told to expect.
    pub fn init(&mut self, buffer_size: usize) -> Result<()> {
        if self.buffer_size != 0 {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        if buffer_size == 0 {
            return Err(ConfigError::InvalidConfig.into());
        }
        self.buffer_size = buffer_size;
        Ok(())
    }

    /// Forget every buffer. All outstanding handles become stale.
    pub fn deinit(&mut self) {
        for slot in &mut self.slots {
            if slot.membership != Membership::Free {
                slot.generation = slot.generation.wrapping_add(1);
            }
            *slot = RecvSlot {
                generation: slot.generation,
                ..RecvSlot::new()
            };
        }
        self.registered = List::EMPTY;
        self.active = List::EMPTY;
        self.next_completion = None;
        self.buffer_size = 0;
        self.armed = false;
    }

    /// Per-buffer size, zero before init.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Buffers in the idle pool.
    pub fn registered_len(&self) -> usize {
        self.registered.len
    }

    /// Buffers loaded for the host, completed or not.
    pub fn active_len(&self) -> usize {
        self.active.len
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Add a buffer of `len` bytes to the idle pool.
    ///
    /// The same memory may be registered more than once; each call yields a
    /// distinct handle.
    pub fn register<H: SlaveHal>(&mut self, hal: &H, buffer: *mut u8, len: usize) -> DmaResult<RecvHandle> {
        let addr = buffer as usize;
        if buffer.is_null()
            || addr % DMA_ALIGNMENT != 0
            || !hal.is_dma_capable(addr)
            || len < self.buffer_size
        {
            return Err(DmaError::InvalidBuffer);
        }

        let index = self
            .slots
            .iter()
            .position(|slot| slot.membership == Membership::Free)
            .ok_or(DmaError::OutOfDescriptors)? as u16;

        let size = self.buffer_size;
        let slot = &mut self.slots[index as usize];
        slot.buffer = buffer;
        slot.desc.reset();
        slot.desc.unlink();
        slot.desc.prepare(buffer, size, 0, false);
        slot.membership = Membership::Registered;
        let handle = RecvHandle {
            index,
            generation: slot.generation,
        };
        self.push_back(ListId::Registered, index);
        Ok(handle)
    }

    /// Remove an idle buffer from the pool.
    ///
    /// # Errors
    ///
    /// - `InvalidHandle` for an unknown or stale handle
    /// - `BufferInUse` while the buffer is loaded
    pub fn unregister(&mut self, handle: RecvHandle) -> DmaResult<()> {
        match self.membership(handle) {
            None => Err(DmaError::InvalidHandle),
            Some(Membership::Active) => Err(DmaError::BufferInUse),
            Some(_) => {
                self.unlink(ListId::Registered, handle.index);
                let slot = &mut self.slots[handle.index()];
                slot.desc.reset();
                slot.desc.unlink();
                slot.buffer = core::ptr::null_mut();
                slot.membership = Membership::Free;
                slot.generation = slot.generation.wrapping_add(1);
                Ok(())
            }
        }
    }

    /// Buffer address and the length last written by the host.
    pub fn get_buffer(&self, handle: RecvHandle) -> DmaResult<(*mut u8, usize)> {
        self.membership(handle).ok_or(DmaError::InvalidHandle)?;
        let slot = &self.slots[handle.index()];
        Ok((slot.buffer, slot.desc.length()))
    }

    // -------------------------------------------------------------------------
    // Loading
    // -------------------------------------------------------------------------

    /// Hand an idle buffer to the host.
    ///
    /// The descriptor is appended to the hardware chain. An empty chain is
    /// started from this descriptor; a non-empty one is restarted so the DMA
    /// engine re-reads the link it stopped at. Either way the host's
    /// buffer counter goes up by one.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the handle names a registered, unloaded buffer.
    pub fn load<H: SlaveHal>(&mut self, hal: &H, handle: RecvHandle) -> Result<()> {
        if self.membership(handle) != Some(Membership::Registered) {
            return Err(IoError::InvalidState.into());
        }
        let index = handle.index;
        self.unlink(ListId::Registered, index);

        let slot = &mut self.slots[index as usize];
        slot.desc.prepare(slot.buffer, self.buffer_size, 0, false);
        slot.desc.unlink();
        slot.desc.set_owned();
        slot.membership = Membership::Active;

        let was_empty = self.active.len == 0;
        if let Some(tail) = self.active.tail {
            self.slots[tail as usize]
                .desc
                .link_to(&self.slots[index as usize].desc);
        }
        self.push_back(ListId::Active, index);
        if self.next_completion.is_none() {
            self.next_completion = Some(index);
        }

        if self.armed {
            if was_empty {
                hal.recv_dma_start(self.slots[index as usize].desc.addr());
            } else {
                hal.recv_dma_restart();
            }
        }
        hal.recv_token_increment(1);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Completion
    // -------------------------------------------------------------------------

    /// Advance the completion cursor past every descriptor the DMA engine
    /// has handed back. Returns how many completions to signal.
    pub fn on_transfer_progress(&mut self) -> usize {
        let mut completed = 0;
        while let Some(index) = self.next_completion {
            let slot = &self.slots[index as usize];
            if slot.desc.is_owned() {
                break;
            }
            self.next_completion = slot.next;
            completed += 1;
        }
        completed
    }

    /// Pop the oldest completed buffer back into the idle pool.
    ///
    /// Callers hold one completion unit; an empty or still-owned head means
    /// the accounting broke.
    pub fn take_completed(&mut self) -> RecvCompletion {
        let Some(index) = self.active.head else {
            panic!("completion signalled with no active buffer");
        };
        let slot = &self.slots[index as usize];
        assert!(!slot.desc.is_owned(), "completion signalled for a DMA-owned buffer");
        assert_ne!(self.next_completion, Some(index), "completion cursor behind head");

        self.unlink(ListId::Active, index);
        let slot = &mut self.slots[index as usize];
        slot.desc.unlink();
        slot.membership = Membership::Registered;
        let completion = RecvCompletion {
            handle: RecvHandle {
                index,
                generation: slot.generation,
            },
            buffer: slot.buffer,
            len: slot.desc.length(),
        };
        self.push_back(ListId::Registered, index);
        completion
    }

    /// Discard one completed buffer: back to the idle pool, and the host's
    /// counter moves on as if it had been loaded again.
    pub fn recycle_completed<H: SlaveHal>(&mut self, hal: &H) {
        let _ = self.take_completed();
        hal.recv_token_increment(1);
    }

    // -------------------------------------------------------------------------
    // Control
    // -------------------------------------------------------------------------

    /// Arm the engine, pointing the DMA engine at the first descriptor it
    /// still owns (if any).
    ///
    /// Buffers handed back while the interrupt was masked are collected
    /// before the latch is cleared. Returns how many completions to signal.
    pub fn start<H: SlaveHal>(&mut self, hal: &H) -> usize {
        let completed = self.on_transfer_progress();
        self.armed = true;
        if let Some(index) = self.next_completion {
            hal.recv_dma_start(self.slots[index as usize].desc.addr());
        }
        hal.clear_interrupts(RECV_INTERRUPTS);
        hal.enable_interrupts(RECV_INTERRUPTS);
        completed
    }

    /// Disarm the engine and stop the DMA link. Loaded buffers stay loaded.
    pub fn stop<H: SlaveHal>(&mut self, hal: &H) {
        hal.disable_interrupts(RECV_INTERRUPTS);
        hal.recv_dma_stop();
        self.armed = false;
    }

    /// Re-announce every loaded buffer to a freshly zeroed host counter.
    pub fn reset_counters<H: SlaveHal>(&mut self, hal: &H) {
        hal.recv_token_reset();
        if self.active.len > 0 {
            hal.recv_token_increment(self.active.len as u32);
        }
    }

    // -------------------------------------------------------------------------
    // List plumbing
    // -------------------------------------------------------------------------

    fn membership(&self, handle: RecvHandle) -> Option<Membership> {
        let slot = self.slots.get(handle.index())?;
        (slot.generation == handle.generation && slot.membership != Membership::Free)
            .then_some(slot.membership)
    }

    fn list_mut(&mut self, id: ListId) -> &mut List {
        match id {
            ListId::Registered => &mut self.registered,
            ListId::Active => &mut self.active,
        }
    }

    fn push_back(&mut self, id: ListId, index: u16) {
        let tail = self.list_mut(id).tail;
        {
            let slot = &mut self.slots[index as usize];
            slot.prev = tail;
            slot.next = None;
        }
        match tail {
            Some(t) => self.slots[t as usize].next = Some(index),
            None => self.list_mut(id).head = Some(index),
        }
        let list = self.list_mut(id);
        list.tail = Some(index);
        list.len += 1;
    }

    fn unlink(&mut self, id: ListId, index: u16) {
        let (prev, next) = {
            let slot = &mut self.slots[index as usize];
            (slot.prev.take(), slot.next.take())
        };
        match prev {
            Some(p) => self.slots[p as usize].next = next,
            None => self.list_mut(id).head = next,
        }
        match next {
            Some(n) => self.slots[n as usize].prev = prev,
            None => self.list_mut(id).tail = prev,
        }
        self.list_mut(id).len -= 1;
    }

    /// Act as the DMA engine: fill the next buffer the host may write.
    #[cfg(test)]
    pub fn simulate_host_write(&self, len: usize) -> bool {
        let mut cursor = self.active.head;
        while let Some(index) = cursor {
            let slot = &self.slots[index as usize];
            if slot.desc.is_owned() {
                slot.desc.complete(len);
                return true;
            }
            cursor = slot.next;
        }
        false
    }
}

impl<const N: usize> Default for RecvEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum ListId {
    Registered,
    Active,
}

// =============================================================================
// Tests
// =============================================================================
