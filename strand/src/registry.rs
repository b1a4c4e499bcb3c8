//! A generation-tagged, reference-counted handle registry.
//!
//! Every slot carries a 64 bit tag combining the generation of the slot (high half) with the reference count of the
//! value it holds (low half).
//! Reference counting and handle validation are lock-free compare-exchange loops on that tag.
//! The value itself sits behind a [`RwLock`] which is only written while minting and freeing a slot.
//!
//! Lifetime of a slot:
//! 1. [`Registry::mint`] takes a slot from the free list and stores a value with one reference.
//! 2. [`Registry::retain`] and [`Registry::release`] move the count up and down.
//! 3. Once [`Registry::release`] drops the count to zero the value is dying: it no longer resolves and can not be
//!    retained, but stays in the slot until the last holder calls [`Registry::free`].
//! 4. [`Registry::free`] empties the slot, bumps its generation and returns it to the free list.
//!    Handles minted for the previous generation never resolve again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::handle::ThreadHandle;

const COUNT_MASK: u64 = u32::MAX as u64;

/// Largest supported capacity, slot indices have to stay below `u32::MAX` to fit into a handle.
pub(crate) const MAX_CAPACITY: usize = u32::MAX as usize - 1;

/// Outcome of [`Registry::release`].
#[derive(Debug)]
pub(crate) enum Released<T> {
    /// The handle did not refer to a live value.
    Invalid,
    /// Other references remain.
    Retained,
    /// The last reference was dropped, the caller is responsible for calling [`Registry::free`].
    Last(Arc<T>),
}

#[derive(Debug)]
struct Slot<T> {
    tag: AtomicU64,
    value: RwLock<Option<Arc<T>>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            tag: AtomicU64::new(tag(1, 0)),
            value: RwLock::new(None),
        }
    }

    fn value(&self) -> Option<Arc<T>> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

const fn tag(generation: u32, count: u32) -> u64 {
    ((generation as u64) << 32) | count as u64
}

const fn generation(tag: u64) -> u32 {
    (tag >> 32) as u32
}

const fn count(tag: u64) -> u32 {
    (tag & COUNT_MASK) as u32
}

/// Fixed capacity registry mapping [`ThreadHandle`]s to shared values.
#[derive(Debug)]
pub(crate) struct Registry<T> {
    slots: Box<[Slot<T>]>,
    free: Mutex<Vec<u32>>,
}

impl<T> Registry<T> {
    /// Creates a registry with room for `capacity` live values.
    ///
    /// The capacity is clamped to [`MAX_CAPACITY`].
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_CAPACITY);
        let slots = (0..capacity).map(|_| Slot::new()).collect();
        // Popping from the back hands out the lowest indices first.
        let free = (0..capacity)
            .rev()
            .filter_map(|index| u32::try_from(index).ok())
            .collect();
        Self {
            slots,
            free: Mutex::new(free),
        }
    }

    /// Number of slots.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Stores the value built by `make` with a reference count of one.
    ///
    /// `make` receives the handle the value will be reachable under.
    /// Returns `None` if every slot is in use.
    pub(crate) fn mint(
        &self,
        make: impl FnOnce(ThreadHandle) -> T,
    ) -> Option<(ThreadHandle, Arc<T>)> {
        let index = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()?;
        let slot = &self.slots[index as usize];

        // A slot on the free list has no references and nobody else writes its tag.
        let generation = generation(slot.tag.load(Ordering::Acquire));
        let handle = ThreadHandle::from_parts(index, generation);
        let value = Arc::new(make(handle));

        *slot.value.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&value));
        slot.tag.store(tag(generation, 1), Ordering::Release);

        Some((handle, value))
    }

    fn slot(&self, handle: ThreadHandle) -> Option<&Slot<T>> {
        self.slots.get(handle.index()? as usize)
    }

    /// Returns the value of a live handle without changing its reference count.
    pub(crate) fn resolve(&self, handle: ThreadHandle) -> Option<Arc<T>> {
        let slot = self.slot(handle)?;
        let is_live = |tag: u64| generation(tag) == handle.generation() && count(tag) != 0;

        if !is_live(slot.tag.load(Ordering::Acquire)) {
            return None;
        }
        let value = slot.value()?;
        // The slot may have been freed and reminted between the check and the read.
        is_live(slot.tag.load(Ordering::Acquire)).then_some(value)
    }

    /// Adds a reference to a live handle.
    ///
    /// Fails once the count has dropped to zero, a dying value is never resurrected.
    pub(crate) fn retain(&self, handle: ThreadHandle) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };

        slot.tag
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (generation(current) == handle.generation()
                    && count(current) != 0
                    && count(current) != u32::MAX)
                    .then_some(current + 1)
            })
            .is_ok()
    }

    /// Drops a reference of a live handle.
    pub(crate) fn release(&self, handle: ThreadHandle) -> Released<T> {
        let Some(slot) = self.slot(handle) else {
            return Released::Invalid;
        };

        let previous = slot
            .tag
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (generation(current) == handle.generation() && count(current) != 0)
                    .then_some(current - 1)
            });

        match previous.map(count) {
            Err(_) => Released::Invalid,
            Ok(1) => slot.value().map_or(Released::Invalid, Released::Last),
            Ok(_) => Released::Retained,
        }
    }

    /// Drops all references of a live handle at once.
    ///
    /// Returns the value if this call committed its destruction, the caller is then responsible for calling
    /// [`Registry::free`].
    pub(crate) fn revoke(&self, handle: ThreadHandle) -> Option<Arc<T>> {
        let slot = self.slot(handle)?;

        slot.tag
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (generation(current) == handle.generation() && count(current) != 0)
                    .then_some(tag(generation(current), 0))
            })
            .ok()?;
        slot.value()
    }

    /// Empties the slot of a dying handle and makes it available for minting again.
    ///
    /// Returns `false` if the handle is not dying, i.e. still referenced or already freed.
    pub(crate) fn free(&self, handle: ThreadHandle) -> bool {
        let Some(slot) = self.slot(handle) else {
            return false;
        };

        // Generation zero is skipped so that no handle of a slot ever encodes to a generation of zero.
        let next = match handle.generation().wrapping_add(1) {
            0 => 1,
            next => next,
        };
        // Bumping the generation first makes the slot unreachable for every other handle before it is emptied.
        if slot
            .tag
            .compare_exchange(
                tag(handle.generation(), 0),
                tag(next, 0),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        slot.value
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(index) = handle.index() {
            self.free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(index);
        }
        true
    }

    /// Handles of all values with at least one reference.
    pub(crate) fn live_handles(&self) -> Vec<ThreadHandle> {
        self.slots
            .iter()
            .zip(0u32..)
            .filter_map(|(slot, index)| {
                let tag = slot.tag.load(Ordering::Acquire);
                (count(tag) != 0).then(|| ThreadHandle::from_parts(index, generation(tag)))
            })
            .collect()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Barrier;

    use super::*;

    fn released_last<T>(released: Released<T>) -> Arc<T> {
        let Released::Last(value) = released else {
            panic!("expected the last reference to be released");
        };
        value
    }

    #[test]
    fn mint_resolves_to_value() {
        let registry = Registry::new(4);
        let (handle, value) = registry.mint(|handle| (handle, "first")).unwrap();

        assert_eq!(value.0, handle);
        let resolved = registry.resolve(handle).unwrap();
        assert!(Arc::ptr_eq(&resolved, &value));
    }

    #[test]
    fn exhausted_registry_refuses_to_mint() {
        let registry = Registry::new(2);
        assert!(registry.mint(|_| ()).is_some());
        assert!(registry.mint(|_| ()).is_some());
        assert!(registry.mint(|_| ()).is_none());
        assert_eq!(registry.capacity(), 2);
    }

    #[test]
    fn empty_registry_never_mints() {
        let registry = Registry::<()>::new(0);
        assert!(registry.mint(|_| ()).is_none());
        assert!(registry.resolve(ThreadHandle::from_parts(0, 1)).is_none());
    }

    #[test]
    fn null_handle_is_never_resolved() {
        let registry = Registry::new(1);
        registry.mint(|_| ()).unwrap();
        assert!(registry.resolve(ThreadHandle::NULL).is_none());
        assert!(!registry.retain(ThreadHandle::NULL));
        assert!(matches!(
            registry.release(ThreadHandle::NULL),
            Released::Invalid
        ));
    }

    #[test]
    fn release_reports_last_reference() {
        let registry = Registry::new(1);
        let (handle, _) = registry.mint(|_| 7).unwrap();
        assert!(registry.retain(handle));

        assert!(matches!(registry.release(handle), Released::Retained));
        assert_eq!(*released_last(registry.release(handle)), 7);
        assert!(matches!(registry.release(handle), Released::Invalid));
    }

    #[test]
    fn dying_value_is_neither_resolved_nor_retained() {
        let registry = Registry::new(1);
        let (handle, _) = registry.mint(|_| ()).unwrap();
        released_last(registry.release(handle));

        assert!(registry.resolve(handle).is_none());
        assert!(!registry.retain(handle));
        assert!(registry.live_handles().is_empty());
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let registry = Registry::new(1);
        let (stale, _) = registry.mint(|_| "old").unwrap();
        released_last(registry.release(stale));
        assert!(registry.free(stale));
        assert!(!registry.free(stale));

        let (fresh, value) = registry.mint(|_| "new").unwrap();
        assert_eq!(fresh.index(), stale.index());
        assert_ne!(fresh, stale);
        assert!(registry.resolve(stale).is_none());
        assert!(!registry.retain(stale));
        assert!(matches!(registry.release(stale), Released::Invalid));
        assert_eq!(*value, "new");
    }

    #[test]
    fn referenced_value_is_not_freed() {
        let registry = Registry::new(1);
        let (handle, _) = registry.mint(|_| ()).unwrap();
        assert!(!registry.free(handle));
        assert!(registry.resolve(handle).is_some());
    }

    #[test]
    fn revoke_drops_every_reference() {
        let registry = Registry::new(2);
        let (handle, _) = registry.mint(|_| ()).unwrap();
        assert!(registry.retain(handle));
        assert!(registry.retain(handle));

        assert!(registry.revoke(handle).is_some());
        assert!(registry.revoke(handle).is_none());
        assert!(matches!(registry.release(handle), Released::Invalid));
        assert!(registry.free(handle));
    }

    #[test]
    fn live_handles_lists_referenced_slots() {
        let registry = Registry::new(3);
        let (first, _) = registry.mint(|_| ()).unwrap();
        let (second, _) = registry.mint(|_| ()).unwrap();
        released_last(registry.release(first));

        assert_eq!(registry.live_handles(), vec![second]);
    }

    #[test]
    fn concurrent_releases_hand_out_one_last_reference() {
        const HOLDERS: usize = 16;

        let registry = Registry::new(1);
        let (handle, _) = registry.mint(|_| ()).unwrap();
        for _ in 1..HOLDERS {
            assert!(registry.retain(handle));
        }

        let barrier = Barrier::new(HOLDERS);
        let last = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..HOLDERS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        matches!(registry.release(handle), Released::Last(_))
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().unwrap())
                .filter(|&last| last)
                .count()
        });

        assert_eq!(last, 1);
        assert!(registry.free(handle));
    }

    #[test]
    fn retain_racing_release_never_resurrects() {
        let registry = Registry::new(1);
        for _ in 0..100 {
            let (handle, _) = registry.mint(|_| ()).unwrap();
            let (retained, last) = std::thread::scope(|scope| {
                let retainer = scope.spawn(|| registry.retain(handle));
                let releaser =
                    scope.spawn(|| matches!(registry.release(handle), Released::Last(_)));
                (retainer.join().unwrap(), releaser.join().unwrap())
            });

            if retained {
                // The retain won, so the release only dropped one of two references.
                assert!(!last);
                assert!(matches!(registry.release(handle), Released::Last(_)));
            } else {
                assert!(last);
            }
            assert!(registry.resolve(handle).is_none());
            assert!(registry.free(handle));
        }
    }
}
