//! Multi-subscriber notifications.
//!
//! A [`Signal`] is how the engine and its host tell each other that
//! something happened: widgets expose `realized`, `unrealized` and
//! `destroyed` signals the animation tracker subscribes to, and remote
//! image loaders expose `completed`.
//!
//! Slots run synchronously on the emitting thread. Emission works on a
//! snapshot of the connection table, so a slot may connect or disconnect
//! slots of the same signal, itself included.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use stockicon_core::Signal;
//!
//! let realized = Signal::<()>::new();
//! let visible = Arc::new(AtomicBool::new(false));
//!
//! let flag = visible.clone();
//! let id = realized.connect(move |_| flag.store(true, Ordering::SeqCst));
//! realized.emit(());
//! assert!(visible.load(Ordering::SeqCst));
//! assert!(realized.disconnect(id));
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::logging::targets;

new_key_type! {
    /// Handle for one connected slot, used to disconnect it.
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A list of slots called in connection order on [`emit`](Self::emit).
pub struct Signal<Args> {
    slots: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Add a slot.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.slots.lock().insert(Arc::new(slot))
    }

    /// Remove a slot. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.slots.lock().remove(id).is_some()
    }

    pub fn disconnect_all(&self) {
        self.slots.lock().clear();
    }

    pub fn connection_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Call every connected slot with `args`.
    ///
    /// A slot disconnected by an earlier slot of the same emission is not
    /// called. Slots connected during emission wait for the next one.
    pub fn emit(&self, args: Args) {
        let snapshot: Vec<(ConnectionId, Slot<Args>)> = self
            .slots
            .lock()
            .iter()
            .map(|(id, slot)| (id, Arc::clone(slot)))
            .collect();
        tracing::trace!(target: targets::SIGNAL, slots = snapshot.len(), "emit");

        for (id, slot) in snapshot {
            if self.slots.lock().contains_key(id) {
                slot(&args);
            }
        }
    }
}

impl<Args> fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Signal<u32>, Arc<Mutex<Vec<u32>>>) {
        let signal = Signal::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        signal.connect(move |&n| sink.lock().push(n));
        (signal, seen)
    }

    #[test]
    fn test_emit_reaches_slots_in_order() {
        let (signal, seen) = recorder();
        let sink = seen.clone();
        signal.connect(move |&n| sink.lock().push(n * 10));

        signal.emit(1);
        signal.emit(2);
        assert_eq!(*seen.lock(), vec![1, 10, 2, 20]);
    }

    #[test]
    fn test_disconnect() {
        let signal = Signal::<u32>::new();
        let id = signal.connect(|_| {});
        assert_eq!(signal.connection_count(), 1);
        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        assert_eq!(signal.connection_count(), 0);

        for _ in 0..3 {
            signal.connect(|_| {});
        }
        signal.disconnect_all();
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_slot_disconnects_itself() {
        let signal = Arc::new(Signal::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&signal);
        let counter = calls.clone();
        let slot_id = own_id.clone();
        let id = signal.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let (Some(signal), Some(id)) = (weak.upgrade(), *slot_id.lock()) {
                signal.disconnect(id);
            }
        });
        *own_id.lock() = Some(id);

        signal.emit(());
        signal.emit(());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn test_slot_removed_mid_emit_is_skipped() {
        let signal = Arc::new(Signal::<()>::new());
        let victim = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&signal);
        let target = victim.clone();
        signal.connect(move |_| {
            if let (Some(signal), Some(id)) = (weak.upgrade(), *target.lock()) {
                signal.disconnect(id);
            }
        });
        let counter = calls.clone();
        *victim.lock() = Some(signal.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        signal.emit(());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_slot_connected_mid_emit_waits() {
        let signal = Arc::new(Signal::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&signal);
        let counter = calls.clone();
        signal.connect(move |_| {
            if let Some(signal) = weak.upgrade()
                && signal.connection_count() == 1
            {
                let counter = counter.clone();
                signal.connect(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        signal.emit(());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        signal.emit(());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_from_another_thread() {
        let (signal, seen) = recorder();
        let signal = Arc::new(signal);

        let remote = signal.clone();
        std::thread::spawn(move || remote.emit(7)).join().unwrap();
        assert_eq!(*seen.lock(), vec![7]);
    }
}
