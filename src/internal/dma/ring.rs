//! Fixed-capacity slot ring for send descriptors.
//!
//! The ring hands descriptor slots to producers without copying buffers and
//! lets the interrupt handler take them back in commit order. Storage is a
//! const-sized array; [`RingBuffer::init`] picks how many of those slots are
//! live (`capacity + 1`, the extra slot telling full from empty).
//!
//! Three cursors walk the live slots, always in this cyclic order:
//!
//! ```text
//!   free ........ read ........ write
//!    |  drained    |   queued    |  empty
//! ```
//!
//! - `[free, read)`: drained by the consumer, not yet released
//! - `[read, write)`: committed by producers, not yet drained
//!
//! Producers serialize on the producer cell. The consumer cursors are only
//! moved by the interrupt handler (or by task code while it is disarmed).

use embedded_hal::delay::DelayNs;

use crate::driver::error::{ConfigError, DmaError, IoResult, Result};
use crate::sync::{CountingSemaphore, CriticalSectionCell, Timeout};

// =============================================================================
// Slot Permit / Slot Range
// =============================================================================

/// Right to commit one slot, obtained from [`RingBuffer::reserve`].
#[must_use = "a reserved slot is lost unless it is committed"]
#[derive(Debug)]
pub struct SlotPermit {
    _private: (),
}

/// A contiguous (cyclic) run of slots drained from the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    start: usize,
    len: usize,
    slot_count: usize,
}

impl SlotRange {
    /// Index of the first slot.
    #[inline(always)]
    pub fn first(&self) -> usize {
        self.start
    }

    /// Index of the last slot.
    #[inline(always)]
    pub fn last(&self) -> usize {
        (self.start + self.len - 1) % self.slot_count
    }

    /// Index of the slot after the range.
    #[inline(always)]
    pub fn end(&self) -> usize {
        (self.start + self.len) % self.slot_count
    }

    /// Number of slots in the range.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Ranges are never empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot indices in ring order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + use<> {
        let (start, count) = (self.start, self.slot_count);
        (0..self.len).map(move |i| (start + i) % count)
    }
}

// =============================================================================
// Slot Ring
// =============================================================================

struct Producer {
    write: usize,
    slot_count: usize,
}

struct Consumer {
    read: usize,
    free: usize,
    slot_count: usize,
    drained: Option<SlotRange>,
}

/// Circular slot allocator over `N` statically allocated slots.
pub struct RingBuffer<D, const N: usize> {
    slots: [D; N],
    producer: CriticalSectionCell<Producer>,
    consumer: CriticalSectionCell<Consumer>,
    available: CountingSemaphore,
}

impl<D, const N: usize> RingBuffer<D, N> {
    /// Create an uninitialized ring from an existing array.
    pub const fn from_array(slots: [D; N]) -> Self {
        Self {
            slots,
            producer: CriticalSectionCell::new(Producer {
                write: 0,
                slot_count: 0,
            }),
            consumer: CriticalSectionCell::new(Consumer {
                read: 0,
                free: 0,
                slot_count: 0,
                drained: None,
            }),
            available: CountingSemaphore::new(0, 0),
        }
    }

    /// Make `capacity` slots usable.
    ///
    /// # Errors
    ///
    /// - `AlreadyInitialized` if the ring is live
    /// - `InvalidConfig` for a zero capacity
    /// - `OutOfDescriptors` if `capacity + 1` exceeds the storage
    pub fn init(&self, capacity: usize) -> Result<()> {
        if self.is_initialized() {
            return Err(ConfigError::AlreadyInitialized.into());
        }
        if capacity == 0 {
            return Err(ConfigError::InvalidConfig.into());
        }
        let slot_count = capacity + 1;
        if slot_count > N {
            return Err(DmaError::OutOfDescriptors.into());
        }

        self.producer.with(|p| {
            p.write = 0;
            p.slot_count = slot_count;
        });
        self.consumer.with(|c| {
            c.read = 0;
            c.free = 0;
            c.slot_count = slot_count;
            c.drained = None;
        });
        self.available.reset(capacity, capacity);
        Ok(())
    }

    /// Tear the ring down; every cursor returns to the origin.
    pub fn deinit(&self) {
        self.producer.with(|p| {
            p.write = 0;
            p.slot_count = 0;
        });
        self.consumer.with(|c| {
            c.read = 0;
            c.free = 0;
            c.slot_count = 0;
            c.drained = None;
        });
        self.available.reset(0, 0);
    }

    /// Whether [`init`](Self::init) has run.
    pub fn is_initialized(&self) -> bool {
        self.producer.with_ref(|p| p.slot_count != 0)
    }

    /// Number of live slots (`capacity + 1`), zero before init.
    pub fn slot_count(&self) -> usize {
        self.producer.with_ref(|p| p.slot_count)
    }

    /// Number of slots that can be reserved without waiting.
    pub fn available(&self) -> usize {
        self.available.count()
    }

    /// Slot at `index`.
    #[inline(always)]
    pub fn slot(&self, index: usize) -> &D {
        &self.slots[index]
    }

    // -------------------------------------------------------------------------
    // Producer side
    // -------------------------------------------------------------------------

    /// Reserve a slot if one is free.
    pub fn try_reserve(&self) -> Option<SlotPermit> {
        self.available
            .try_take()
            .then_some(SlotPermit { _private: () })
    }

    /// Reserve a slot, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// [`IoError::Timeout`](crate::IoError::Timeout) if every slot stayed
    /// checked out; nothing is reserved in that case.
    pub fn reserve<W: DelayNs>(&self, timeout: Timeout, delay: &mut W) -> IoResult<SlotPermit> {
        self.available.take(timeout, delay)?;
        Ok(SlotPermit { _private: () })
    }

    /// Fill the slot at the write cursor and publish it.
    ///
    /// `populate` receives the slot being committed and the previously
    /// committed one. Producers serialize here, so the slot is chosen at
    /// commit time rather than at reserve time.
    pub fn commit<F>(&self, permit: SlotPermit, populate: F)
    where
        F: FnOnce(&D, &D),
    {
        let SlotPermit { .. } = permit;
        self.producer.with(|p| {
            assert!(p.slot_count != 0, "commit on an uninitialized ring");
            let index = p.write;
            let prev = (index + p.slot_count - 1) % p.slot_count;
            populate(&self.slots[index], &self.slots[prev]);
            p.write = (index + 1) % p.slot_count;
        });
    }

    /// Slot most recently committed (just before the write cursor).
    pub fn peek_back(&self) -> &D {
        let index = self.producer.with_ref(|p| {
            let count = p.slot_count.max(1);
            (p.write + count - 1) % count
        });
        &self.slots[index]
    }

    /// Visit every committed, unreleased slot in commit order while producers
    /// are held off: drained slots first, then queued ones.
    ///
    /// Returns how many slots were visited and the most recently committed
    /// slot, which the next commit will read as its predecessor.
    pub fn for_each_outstanding<F>(&self, mut visit: F) -> (usize, &D)
    where
        F: FnMut(&D),
    {
        self.producer.with(|p| {
            let free = self.consumer.with_ref(|c| c.free);
            let visited = match Self::span(free, p.write, p.slot_count) {
                Some(range) => {
                    range.indices().for_each(|i| visit(&self.slots[i]));
                    range.len()
                }
                None => 0,
            };
            let count = p.slot_count.max(1);
            (visited, &self.slots[(p.write + count - 1) % count])
        })
    }

    // -------------------------------------------------------------------------
    // Consumer side
    // -------------------------------------------------------------------------

    /// Oldest queued slot, if any.
    pub fn peek_front(&self) -> Option<&D> {
        let write = self.producer.with_ref(|p| p.write);
        let read = self.consumer.with_ref(|c| c.read);
        (read != write).then(|| &self.slots[read])
    }

    /// Queued slots, without draining them.
    pub fn queued(&self) -> Option<SlotRange> {
        let write = self.producer.with_ref(|p| p.write);
        self.consumer
            .with_ref(|c| Self::span(c.read, write, c.slot_count))
    }

    /// Drain the oldest queued slot.
    pub fn drain_one(&self) -> Option<SlotRange> {
        self.drain(true)
    }

    /// Drain every slot queued at this instant.
    pub fn drain_all(&self) -> Option<SlotRange> {
        self.drain(false)
    }

    fn drain(&self, one: bool) -> Option<SlotRange> {
        // Snapshot the write cursor; later commits wait for the next drain.
        let write = self.producer.with_ref(|p| p.write);
        self.consumer.with(|c| {
            assert!(
                c.drained.is_none(),
                "drain while a drained range is outstanding"
            );
            let mut range = Self::span(c.read, write, c.slot_count)?;
            if one {
                range.len = 1;
            }
            c.read = range.end();
            c.drained = Some(range);
            Some(range)
        })
    }

    /// Return a drained range to the producers.
    ///
    /// The range must be exactly the one returned by the last drain.
    pub fn release(&self, range: SlotRange) {
        self.consumer.with(|c| {
            assert_eq!(
                c.drained,
                Some(range),
                "release does not match the last drain"
            );
            assert_eq!(c.free, range.first(), "release out of order");
            c.free = range.end();
            c.drained = None;
        });
        self.available.give_n(range.len());
    }

    fn span(from: usize, to: usize, slot_count: usize) -> Option<SlotRange> {
        if slot_count == 0 || from == to {
            return None;
        }
        Some(SlotRange {
            start: from,
            len: (to + slot_count - from) % slot_count,
            slot_count,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]
mod tests {
    extern crate std;

    use super::*;
    use crate::driver::error::{Error, IoError};
    use crate::internal::dma::descriptor::VolatileCell;
    use crate::testing::MockDelay;

    struct TestSlot {
        value: VolatileCell<u32>,
    }

    fn ring<const N: usize>(capacity: usize) -> RingBuffer<TestSlot, N> {
        let ring = RingBuffer::from_array(core::array::from_fn(|_| TestSlot {
            value: VolatileCell::new(0),
        }));
        ring.init(capacity).unwrap();
        ring
    }

    fn push<const N: usize>(ring: &RingBuffer<TestSlot, N>, value: u32) {
        let permit = ring.try_reserve().expect("slot available");
        ring.commit(permit, |slot, _| slot.value.set(value));
    }

    fn values<const N: usize>(ring: &RingBuffer<TestSlot, N>, range: SlotRange) -> std::vec::Vec<u32> {
        range.indices().map(|i| ring.slot(i).value.get()).collect()
    }

    #[test]
    fn init_validates_capacity() {
        let ring: RingBuffer<TestSlot, 4> = RingBuffer::from_array(core::array::from_fn(|_| TestSlot {
            value: VolatileCell::new(0),
        }));
        assert_eq!(ring.init(0), Err(Error::Config(ConfigError::InvalidConfig)));
        assert_eq!(ring.init(4), Err(Error::Dma(DmaError::OutOfDescriptors)));
        assert_eq!(ring.init(3), Ok(()));
        assert_eq!(ring.init(3), Err(Error::Config(ConfigError::AlreadyInitialized)));
        assert_eq!(ring.slot_count(), 4);
        assert_eq!(ring.available(), 3);
    }

    #[test]
    fn deinit_allows_reinit() {
        let ring = ring::<4>(3);
        push(&ring, 1);
        ring.deinit();
        assert!(!ring.is_initialized());
        assert_eq!(ring.init(2), Ok(()));
        assert_eq!(ring.available(), 2);
        assert!(ring.peek_front().is_none());
    }

    #[test]
    fn empty_ring_drains_nothing() {
        let ring = ring::<4>(3);
        assert!(ring.drain_one().is_none());
        assert!(ring.drain_all().is_none());
        assert!(ring.peek_front().is_none());
        assert!(ring.queued().is_none());
    }

    #[test]
    fn drain_one_takes_oldest() {
        let ring = ring::<4>(3);
        push(&ring, 10);
        push(&ring, 20);

        let range = ring.drain_one().unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(values(&ring, range), [10]);
        ring.release(range);

        let range = ring.drain_one().unwrap();
        assert_eq!(values(&ring, range), [20]);
        ring.release(range);
        assert_eq!(ring.available(), 3);
    }

    #[test]
    fn drain_all_snapshots_write_cursor() {
        let ring = ring::<8>(4);
        push(&ring, 1);
        push(&ring, 2);
        let range = ring.drain_all().unwrap();
        push(&ring, 3);

        assert_eq!(values(&ring, range), [1, 2]);
        ring.release(range);

        let range = ring.drain_all().unwrap();
        assert_eq!(values(&ring, range), [3]);
        ring.release(range);
    }

    #[test]
    fn ranges_wrap_around_the_end() {
        let ring = ring::<4>(3);
        for round in 0..5u32 {
            push(&ring, round * 10);
            push(&ring, round * 10 + 1);
            let range = ring.drain_all().unwrap();
            assert_eq!(values(&ring, range), [round * 10, round * 10 + 1]);
            ring.release(range);
        }
        assert_eq!(ring.available(), 3);
    }

    #[test]
    fn commit_sees_previous_slot() {
        let ring = ring::<4>(3);
        push(&ring, 5);
        let permit = ring.try_reserve().unwrap();
        ring.commit(permit, |slot, prev| slot.value.set(prev.value.get() + 1));
        assert_eq!(ring.peek_back().value.get(), 6);
        assert_eq!(ring.peek_front().unwrap().value.get(), 5);
    }

    #[test]
    fn checked_out_slots_never_exceed_capacity() {
        let ring = ring::<4>(3);
        push(&ring, 1);
        push(&ring, 2);
        push(&ring, 3);
        assert!(ring.try_reserve().is_none());

        let range = ring.drain_one().unwrap();
        // Drained but unreleased slots stay checked out.
        assert!(ring.try_reserve().is_none());
        ring.release(range);
        assert!(ring.try_reserve().is_some());
    }

    #[test]
    fn reserve_times_out_with_zero_wait() {
        let ring = ring::<2>(1);
        let mut delay = MockDelay::new();
        let permit = ring.reserve(Timeout::NoWait, &mut delay).unwrap();
        ring.commit(permit, |slot, _| slot.value.set(1));

        let err = ring.reserve(Timeout::NoWait, &mut delay).unwrap_err();
        assert_eq!(err, IoError::Timeout);
        assert_eq!(delay.total_ns(), 0);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn outstanding_covers_drained_and_queued() {
        let ring = ring::<4>(3);
        push(&ring, 1);
        push(&ring, 2);
        let range = ring.drain_one().unwrap();
        push(&ring, 3);

        let mut seen = std::vec::Vec::new();
        let (visited, back) = ring.for_each_outstanding(|slot| seen.push(slot.value.get()));
        assert_eq!(visited, 3);
        assert_eq!(seen, [1, 2, 3]);
        assert_eq!(back.value.get(), 3);

        ring.release(range);
        let (visited, _) = ring.for_each_outstanding(|_| {});
        assert_eq!(visited, 2);
    }

    #[test]
    #[should_panic(expected = "outstanding")]
    fn drain_twice_without_release_panics() {
        let ring = ring::<4>(3);
        push(&ring, 1);
        push(&ring, 2);
        let _first = ring.drain_one();
        let _second = ring.drain_one();
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn release_of_foreign_range_panics() {
        let ring = ring::<4>(3);
        push(&ring, 1);
        push(&ring, 2);
        let range = ring.drain_all().unwrap();
        ring.release(range);
        ring.release(range);
    }
}
