//! Lock-free dirty-bit table connecting parameter writes to the audio thread.

/*
Cross-Thread Parameter Handoff
==============================

The UI (or any control thread) writes parameter values; the audio thread
must apply them to every voice without locks and without running the
voice updates on the UI thread. The handoff is a bitmask:

  1. The writer stores the new value in the parameter's atomic.
  2. The writer sets the parameter's bit in the dirty mask (fetch_or).
  3. Once per block the audio thread swaps each mask word with 0 and runs
     the callback bound to every set bit, in ascending slot order.

Vocabulary
----------

  slot          Index 0..128 handed out at registration. Word = slot / 32,
                bit = slot % 32.

  proxy         A parameter's handle on its slot: `mark_dirty` sets the bit.

  coalescing    Ten writes between two blocks set the same bit ten times.
                The audio thread sees one bit and runs the callback once,
                reading the latest value.

Ordering
--------

Value stores happen before the Release `fetch_or`. The audio thread's
AcqRel `swap` synchronises with it, so a callback that fires always sees
the value that caused it (or a newer one). A write that lands after the
swap simply sets the bit again for the next block.

Callbacks themselves live audio-side in a `CallbackTable<C>`: plain
function pointers taking the audio-owned context. The shared table only
carries bits.
*/

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

pub const NUM_CALLBACKS: usize = 128;
const BITS_PER_WORD: usize = 32;
const NUM_WORDS: usize = NUM_CALLBACKS / BITS_PER_WORD;

pub type Callback<C> = fn(&mut C);

/// Shared dirty mask plus the slot counter used during registration.
#[derive(Debug, Default)]
pub struct ThreadSafeCallback {
    words: [AtomicU32; NUM_WORDS],
    next_slot: AtomicUsize,
}

impl ThreadSafeCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next slot.
    ///
    /// # Panics
    /// When more than [`NUM_CALLBACKS`] proxies are registered. The table is
    /// sized once for the fixed parameter set, so this is a build-time bug.
    pub fn new_proxy(self: &Arc<Self>) -> CallbackProxy {
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        assert!(
            slot < NUM_CALLBACKS,
            "callback table full: slot {} of {}",
            slot,
            NUM_CALLBACKS
        );
        CallbackProxy {
            table: Arc::clone(self),
            slot,
        }
    }

    /// Number of registered proxies.
    pub fn proxy_count(&self) -> usize {
        self.next_slot.load(Ordering::Relaxed).min(NUM_CALLBACKS)
    }

    #[inline]
    pub fn mark_dirty(&self, slot: usize) {
        debug_assert!(slot < NUM_CALLBACKS);
        let word = slot / BITS_PER_WORD;
        let bit = 1u32 << (slot % BITS_PER_WORD);
        self.words[word].fetch_or(bit, Ordering::Release);
    }

    /// Mark every registered slot. Used once at startup to push initial values.
    pub fn mark_all(&self) {
        for slot in 0..self.proxy_count() {
            self.mark_dirty(slot);
        }
    }

    pub fn is_dirty(&self, slot: usize) -> bool {
        let word = slot / BITS_PER_WORD;
        let bit = 1u32 << (slot % BITS_PER_WORD);
        self.words[word].load(Ordering::Acquire) & bit != 0
    }

    /// Atomically take the whole mask, leaving it clear.
    pub fn take_dirty(&self) -> [u32; NUM_WORDS] {
        let mut taken = [0u32; NUM_WORDS];
        for (dst, word) in taken.iter_mut().zip(self.words.iter()) {
            *dst = word.swap(0, Ordering::AcqRel);
        }
        taken
    }

    /// Run the bound callback of every dirty slot, ascending. Returns how many fired.
    ///
    /// Each dirty slot fires at most once per call, no matter how many
    /// writes marked it.
    pub fn handle_dirty_callbacks<C>(&self, table: &CallbackTable<C>, ctx: &mut C) -> usize {
        let mut fired = 0;
        for (word_index, mut bits) in self.take_dirty().into_iter().enumerate() {
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                if let Some(callback) = table.get(word_index * BITS_PER_WORD + bit) {
                    callback(ctx);
                    fired += 1;
                }
            }
        }
        fired
    }
}

/// A parameter's handle on its dirty bit.
#[derive(Debug, Clone)]
pub struct CallbackProxy {
    table: Arc<ThreadSafeCallback>,
    slot: usize,
}

impl CallbackProxy {
    #[inline]
    pub fn mark_dirty(&self) {
        self.table.mark_dirty(self.slot);
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Mask word holding this slot
    pub fn group(&self) -> usize {
        self.slot / BITS_PER_WORD
    }

    pub fn bit(&self) -> usize {
        self.slot % BITS_PER_WORD
    }
}

/// Audio-side slot → callback bindings.
pub struct CallbackTable<C> {
    slots: [Option<Callback<C>>; NUM_CALLBACKS],
}

impl<C> CallbackTable<C> {
    pub fn new() -> Self {
        Self {
            slots: [None; NUM_CALLBACKS],
        }
    }

    pub fn bind(&mut self, slot: usize, callback: Callback<C>) {
        self.slots[slot] = Some(callback);
    }

    pub fn get(&self, slot: usize) -> Option<Callback<C>> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn is_bound(&self, slot: usize) -> bool {
        self.get(slot).is_some()
    }

    pub fn bound_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl<C> Default for CallbackTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Default)]
    struct Log {
        fired: Vec<usize>,
    }

    fn record_3(log: &mut Log) {
        log.fired.push(3);
    }
    fn record_40(log: &mut Log) {
        log.fired.push(40);
    }
    fn record_127(log: &mut Log) {
        log.fired.push(127);
    }

    fn table_with_slots(count: usize) -> Arc<ThreadSafeCallback> {
        let shared = Arc::new(ThreadSafeCallback::new());
        for _ in 0..count {
            shared.new_proxy();
        }
        shared
    }

    #[test]
    fn proxies_map_to_group_and_bit() {
        let shared = Arc::new(ThreadSafeCallback::new());
        let proxies: Vec<CallbackProxy> = (0..40).map(|_| shared.new_proxy()).collect();
        assert_eq!(proxies[0].group(), 0);
        assert_eq!(proxies[31].bit(), 31);
        assert_eq!(proxies[33].group(), 1);
        assert_eq!(proxies[33].bit(), 1);
        assert_eq!(shared.proxy_count(), 40);
    }

    #[test]
    fn fires_in_ascending_order_once() {
        let shared = table_with_slots(128);
        let mut table: CallbackTable<Log> = CallbackTable::new();
        table.bind(3, record_3);
        table.bind(40, record_40);
        table.bind(127, record_127);

        shared.mark_dirty(127);
        shared.mark_dirty(3);
        shared.mark_dirty(40);
        shared.mark_dirty(3);

        let mut log = Log::default();
        assert_eq!(shared.handle_dirty_callbacks(&table, &mut log), 3);
        assert_eq!(log.fired, vec![3, 40, 127]);

        assert_eq!(shared.handle_dirty_callbacks(&table, &mut log), 0);
        assert_eq!(log.fired.len(), 3);
    }

    #[test]
    fn unbound_slots_are_skipped_but_cleared() {
        let shared = table_with_slots(8);
        let table: CallbackTable<Log> = CallbackTable::new();
        shared.mark_dirty(5);
        let mut log = Log::default();
        assert_eq!(shared.handle_dirty_callbacks(&table, &mut log), 0);
        assert!(!shared.is_dirty(5));
    }

    #[test]
    fn mark_all_covers_registered_slots_only() {
        let shared = table_with_slots(35);
        shared.mark_all();
        assert!(shared.is_dirty(0));
        assert!(shared.is_dirty(34));
        assert!(!shared.is_dirty(35));
    }

    #[test]
    fn concurrent_marks_coalesce_to_one_fire() {
        let shared = table_with_slots(64);
        let mut table: CallbackTable<Log> = CallbackTable::new();
        table.bind(40, record_40);

        let writers: Vec<_> = (0..2)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        shared.mark_dirty(40);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let mut log = Log::default();
        shared.handle_dirty_callbacks(&table, &mut log);
        assert_eq!(log.fired, vec![40]);
    }

    #[test]
    #[should_panic(expected = "callback table full")]
    fn registering_past_capacity_panics() {
        table_with_slots(NUM_CALLBACKS + 1);
    }
}
