//! Binding animations to widgets.
//!
//! A binding moves through three states:
//!
//! ```text
//! bind ──► Paused ──realized──► Playing
//!            ▲                     │
//!            └─────unrealized──────┘
//!   destroyed (from either) ──► Unbound
//! ```
//!
//! The tracker never owns a widget. Bindings refer to their widget weakly,
//! and the widget's own lifecycle signals hold the only references back into
//! the binding. A widget dropped without emitting `destroyed` is noticed and
//! its binding torn down the next time the tracker is used.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use stockicon_core::logging::targets;
use stockicon_core::{ConnectionId, Signal};

use crate::animation::{AnimatedIcon, PlaybackHandle};
use crate::cache::ResolvedImage;

/// A toolkit widget that can show an animation.
///
/// Implementations emit `realized` when the widget becomes visible,
/// `unrealized` when it is hidden, and `destroyed` when it is torn down.
/// [`set_image`](Self::set_image) is called with no tracker lock held, so it
/// may emit lifecycle signals. It must not bind or unbind animations.
pub trait AnimatedWidget: Send + Sync {
    /// Whether the widget is currently visible.
    fn is_realized(&self) -> bool;

    /// Emitted when the widget becomes visible.
    fn realized(&self) -> &Signal<()>;

    /// Emitted when the widget is hidden.
    fn unrealized(&self) -> &Signal<()>;

    /// Emitted once when the widget is torn down.
    fn destroyed(&self) -> &Signal<()>;

    /// Show `image`.
    fn set_image(&self, image: &ResolvedImage);
}

/// Where a widget's binding is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// No binding.
    Unbound,
    /// Bound; the widget is hidden so no frames are delivered.
    Paused,
    /// Bound and delivering frames.
    Playing,
}

type WidgetKey = usize;
type BindingMap = Mutex<HashMap<WidgetKey, Arc<Binding>>>;

fn widget_key<W: ?Sized>(widget: &Arc<W>) -> WidgetKey {
    Arc::as_ptr(widget).cast::<()>() as usize
}

struct Connections {
    realized: ConnectionId,
    unrealized: ConnectionId,
    destroyed: ConnectionId,
}

struct Binding {
    widget: Weak<dyn AnimatedWidget>,
    animation: Arc<AnimatedIcon>,
    playback: Mutex<Option<PlaybackHandle>>,
    // Frame produced by the playback handle, shown once `playback` is unlocked.
    pending: Arc<Mutex<Option<ResolvedImage>>>,
    connections: Mutex<Option<Connections>>,
}

impl Binding {
    fn is_alive(&self) -> bool {
        self.widget.strong_count() > 0
    }

    fn is_playing(&self) -> bool {
        self.playback.lock().is_some()
    }

    fn start(&self) {
        if self.is_playing() {
            return;
        }
        let pending = Arc::clone(&self.pending);
        let handle = self.animation.start_animation(move |frame| {
            *pending.lock() = Some(frame.clone());
        });
        tracing::trace!(target: targets::ANIMATION, spec = self.animation.spec(), "playback started");
        *self.playback.lock() = Some(handle);
        self.show_pending();
    }

    fn show_pending(&self) {
        let frame = self.pending.lock().take();
        if let (Some(frame), Some(widget)) = (frame, self.widget.upgrade()) {
            widget.set_image(&frame);
        }
    }

    fn pause(&self) {
        // Dropped outside the lock so the handle's own teardown never nests.
        let handle = self.playback.lock().take();
        drop(handle);
    }

    fn tick(&self, delta: Duration) -> bool {
        let advanced = match self.playback.lock().as_mut() {
            Some(handle) => handle.advance(delta),
            None => false,
        };
        if advanced {
            self.show_pending();
        }
        advanced
    }

    /// Stop playback and detach from the widget's signals.
    fn teardown(&self) {
        self.pause();
        let connections = self.connections.lock().take();
        if let (Some(c), Some(widget)) = (connections, self.widget.upgrade()) {
            widget.realized().disconnect(c.realized);
            widget.unrealized().disconnect(c.unrealized);
            widget.destroyed().disconnect(c.destroyed);
        }
    }
}

/// Tracks which widgets are showing which animations.
///
/// Cloning shares the same bookkeeping.
#[derive(Clone, Default)]
pub struct AnimationTracker {
    bindings: Arc<BindingMap>,
}

impl AnimationTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `widget` to `animation`.
    ///
    /// Binding the same widget to an animation with the same spec again is a
    /// no-op and returns `false`. A binding to a different animation is torn
    /// down first. The widget shows the poster frame until it is realized.
    pub fn bind<W>(&self, widget: &Arc<W>, animation: Arc<AnimatedIcon>) -> bool
    where
        W: AnimatedWidget + 'static,
    {
        let dyn_widget: Arc<dyn AnimatedWidget> = widget.clone();
        self.bind_dyn(&dyn_widget, animation)
    }

    /// [`bind`](Self::bind) for an already type-erased widget.
    pub fn bind_dyn(&self, widget: &Arc<dyn AnimatedWidget>, animation: Arc<AnimatedIcon>) -> bool {
        self.prune();
        let key = widget_key(widget);

        let replaced = {
            let mut bindings = self.bindings.lock();
            match bindings.get(&key) {
                Some(existing) if existing.animation.spec() == animation.spec() => return false,
                Some(_) => bindings.remove(&key),
                None => None,
            }
        };
        if let Some(old) = replaced {
            tracing::debug!(
                target: targets::ANIMATION,
                old = old.animation.spec(),
                new = animation.spec(),
                "replacing animation binding"
            );
            old.teardown();
        }

        let binding = Arc::new(Binding {
            widget: Arc::downgrade(widget),
            animation,
            playback: Mutex::new(None),
            pending: Arc::new(Mutex::new(None)),
            connections: Mutex::new(None),
        });

        let weak = Arc::downgrade(&binding);
        let realized = widget.realized().connect(move |_| {
            if let Some(binding) = weak.upgrade() {
                binding.start();
            }
        });
        let weak = Arc::downgrade(&binding);
        let unrealized = widget.unrealized().connect(move |_| {
            if let Some(binding) = weak.upgrade() {
                binding.pause();
            }
        });
        let weak = Arc::downgrade(&binding);
        let map = Arc::downgrade(&self.bindings);
        let destroyed = widget.destroyed().connect(move |_| {
            let Some(binding) = weak.upgrade() else {
                return;
            };
            if let Some(map) = map.upgrade() {
                let mut bindings = map.lock();
                if bindings.get(&key).is_some_and(|b| Arc::ptr_eq(b, &binding)) {
                    bindings.remove(&key);
                }
            }
            binding.teardown();
            tracing::trace!(target: targets::ANIMATION, spec = binding.animation.spec(), "widget destroyed, binding removed");
        });
        *binding.connections.lock() = Some(Connections {
            realized,
            unrealized,
            destroyed,
        });

        widget.set_image(binding.animation.first_frame());
        if widget.is_realized() {
            binding.start();
        }

        tracing::debug!(target: targets::ANIMATION, spec = binding.animation.spec(), playing = binding.is_playing(), "bound animation");
        self.bindings.lock().insert(key, binding);
        true
    }

    /// Remove the binding for `widget`, stopping playback.
    ///
    /// Returns `false` if the widget was not bound.
    pub fn unbind<W>(&self, widget: &Arc<W>) -> bool
    where
        W: AnimatedWidget + ?Sized,
    {
        self.prune();
        let removed = self.bindings.lock().remove(&widget_key(widget));
        match removed {
            Some(binding) => {
                binding.teardown();
                true
            }
            None => false,
        }
    }

    /// The binding state of `widget`.
    pub fn state<W>(&self, widget: &Arc<W>) -> BindingState
    where
        W: AnimatedWidget + ?Sized,
    {
        self.prune();
        match self.bindings.lock().get(&widget_key(widget)) {
            Some(binding) if binding.is_playing() => BindingState::Playing,
            Some(_) => BindingState::Paused,
            None => BindingState::Unbound,
        }
    }

    /// The animation bound to `widget`.
    pub fn animation_for<W>(&self, widget: &Arc<W>) -> Option<Arc<AnimatedIcon>>
    where
        W: AnimatedWidget + ?Sized,
    {
        self.prune();
        self.bindings
            .lock()
            .get(&widget_key(widget))
            .map(|b| Arc::clone(&b.animation))
    }

    /// Advance every playing binding by `delta`.
    ///
    /// Hosts call this from their frame timer. Returns the number of frames
    /// delivered.
    pub fn tick(&self, delta: Duration) -> usize {
        self.prune();
        let bindings: Vec<Arc<Binding>> = self.bindings.lock().values().cloned().collect();
        bindings.iter().filter(|b| b.tick(delta)).count()
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.prune();
        self.bindings.lock().len()
    }

    /// Whether no widget is bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down bindings whose widget no longer exists.
    fn prune(&self) {
        let dead: Vec<Arc<Binding>> = {
            let mut bindings = self.bindings.lock();
            let keys: Vec<WidgetKey> = bindings
                .iter()
                .filter(|(_, b)| !b.is_alive())
                .map(|(k, _)| *k)
                .collect();
            keys.iter().filter_map(|k| bindings.remove(k)).collect()
        };
        for binding in dead {
            tracing::trace!(target: targets::ANIMATION, spec = binding.animation.spec(), "pruned binding of dropped widget");
            binding.teardown();
        }
    }
}

impl fmt::Debug for AnimationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationTracker")
            .field("bindings", &self.bindings.lock().len())
            .finish()
    }
}
