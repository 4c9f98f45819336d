//! Lock-free bounded double-ended queue
//!
//! A fixed ring of slots plus a single 64-bit cursor word packing
//! `(head, len)`: head in the low 32 bits, len in the high 32 bits. Every
//! push or pop first reserves a slot by moving the cursor with a CAS loop,
//! then hands the value through that slot's state word:
//!
//! ```text
//! EMPTY --push--> WRITING --> FULL --pop--> READING --> EMPTY
//! ```
//!
//! A reservation can overtake the matching hand-off (a pop reserves a slot
//! whose push has not finished writing yet); the slot state makes the late
//! side wait with `Backoff`. Nothing ever blocks on a lock or in the kernel.
//! Under heavy contention on both ends, two values that race for the same
//! wrapped slot may be handed off in either order; no value is lost or
//! duplicated.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::backoff::Backoff;
use crate::error::PushError;

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const FULL: u8 = 2;
const READING: u8 = 3;

#[inline]
fn pack(head: u32, len: u32) -> u64 {
    ((len as u64) << 32) | head as u64
}

#[inline]
fn unpack(cursor: u64) -> (u32, u32) {
    (cursor as u32, (cursor >> 32) as u32)
}

struct Slot<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

pub struct LockFreeDeque<T> {
    cursor: AtomicU64,
    slots: Box<[Slot<T>]>,
    capacity: u32,
}

// Safety: values move between threads through the slot hand-off protocol;
// a slot's value is only touched by the thread that won its state CAS.
unsafe impl<T: Send> Send for LockFreeDeque<T> {}
unsafe impl<T: Send> Sync for LockFreeDeque<T> {}

impl<T> LockFreeDeque<T> {
    /// Create a deque holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// If `capacity` is zero or does not fit in 32 bits.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity <= u32::MAX as usize,
            "LockFreeDeque capacity must be in 1..=u32::MAX, got {}",
            capacity
        );

        let slots = (0..capacity)
            .map(|_| Slot {
                state: AtomicU8::new(EMPTY),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            cursor: AtomicU64::new(pack(0, 0)),
            slots,
            capacity: capacity as u32,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Reserved element count. Snapshot only.
    #[inline]
    pub fn len(&self) -> usize {
        unpack(self.cursor.load(Ordering::Acquire)).1 as usize
    }

    /// Snapshot only.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_back(&self, value: T) -> Result<(), PushError<T>> {
        let cap = self.capacity as u64;
        let reserved = self.reserve(|head, len| {
            if len == self.capacity {
                return None;
            }
            let slot = ((head as u64 + len as u64) % cap) as u32;
            Some((pack(head, len + 1), slot))
        });

        match reserved {
            Some(slot) => {
                self.write(slot, value);
                Ok(())
            }
            None => Err(PushError(value)),
        }
    }

    pub fn push_front(&self, value: T) -> Result<(), PushError<T>> {
        let reserved = self.reserve(|head, len| {
            if len == self.capacity {
                return None;
            }
            let new_head = if head == 0 { self.capacity - 1 } else { head - 1 };
            Some((pack(new_head, len + 1), new_head))
        });

        match reserved {
            Some(slot) => {
                self.write(slot, value);
                Ok(())
            }
            None => Err(PushError(value)),
        }
    }

    pub fn pop_front(&self) -> Option<T> {
        let slot = self.reserve(|head, len| {
            if len == 0 {
                return None;
            }
            let new_head = if head + 1 == self.capacity { 0 } else { head + 1 };
            Some((pack(new_head, len - 1), head))
        })?;
        Some(self.read(slot))
    }

    pub fn pop_back(&self) -> Option<T> {
        let cap = self.capacity as u64;
        let slot = self.reserve(|head, len| {
            if len == 0 {
                return None;
            }
            let slot = ((head as u64 + len as u64 - 1) % cap) as u32;
            Some((pack(head, len - 1), slot))
        })?;
        Some(self.read(slot))
    }

    /// Move the cursor with a CAS loop. `step` maps `(head, len)` to the new
    /// cursor and the reserved slot, or `None` when the deque is full/empty.
    #[inline]
    fn reserve(&self, step: impl Fn(u32, u32) -> Option<(u64, u32)>) -> Option<u32> {
        let mut backoff = Backoff::new();
        let mut current = self.cursor.load(Ordering::Acquire);
        loop {
            let (head, len) = unpack(current);
            let (next, slot) = step(head, len)?;
            match self.cursor.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(slot),
                Err(actual) => {
                    current = actual;
                    backoff.pause();
                }
            }
        }
    }

    fn write(&self, slot: u32, value: T) {
        let slot = &self.slots[slot as usize];
        let mut backoff = Backoff::new();
        // The previous occupant may still be in the middle of being read
        while slot
            .state
            .compare_exchange_weak(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.pause();
        }
        // Safety: WRITING grants exclusive access to the value cell
        unsafe { (*slot.value.get()).write(value) };
        slot.state.store(FULL, Ordering::Release);
    }

    fn read(&self, slot: u32) -> T {
        let slot = &self.slots[slot as usize];
        let mut backoff = Backoff::new();
        // The reserving push may not have finished writing yet
        while slot
            .state
            .compare_exchange_weak(FULL, READING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.pause();
        }
        // Safety: READING grants exclusive access; FULL guaranteed init
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.state.store(EMPTY, Ordering::Release);
        value
    }
}

impl<T> Drop for LockFreeDeque<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if *slot.state.get_mut() == FULL {
                // Safety: FULL slots hold an initialized value nobody else owns
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}

impl<T> std::fmt::Debug for LockFreeDeque<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFreeDeque")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
