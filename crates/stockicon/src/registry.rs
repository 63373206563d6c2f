//! Stock icon definitions and the pending-definition registry.
//!
//! Addins contribute [`StockIconDefinition`]s at the
//! [`STOCK_ICONS_EXTENSION_PATH`] extension point. The engine keeps them in a
//! [`StockRegistry`] until the icon id is first requested, then materializes
//! every size variant at once and drops the definitions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use stockicon_core::logging::targets;
use stockicon_core::{ConnectionId, Signal};

use crate::addin::Addin;
use crate::size::IconSize;

/// Extension point under which stock icons are contributed.
pub const STOCK_ICONS_EXTENSION_PATH: &str = "/Stockicon/Core/StockIcons";

/// Where a definition's pixels come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// An embedded resource of the owning addin.
    Resource(String),
    /// A file relative to the owning addin.
    File(String),
    /// Another icon spec, resolved in the owning addin's context.
    IconRef(String),
    /// An animation descriptor resource of the owning addin.
    Animation(String),
}

impl IconSource {
    /// The resource name, path or spec this source points at.
    pub fn target(&self) -> &str {
        match self {
            IconSource::Resource(s)
            | IconSource::File(s)
            | IconSource::IconRef(s)
            | IconSource::Animation(s) => s,
        }
    }
}

/// One icon contribution from an addin.
#[derive(Clone)]
pub struct StockIconDefinition {
    addin: Arc<dyn Addin>,
    icon_id: String,
    size: IconSize,
    source: IconSource,
}

impl StockIconDefinition {
    /// Create a definition.
    pub fn new(
        addin: Arc<dyn Addin>,
        icon_id: impl Into<String>,
        size: IconSize,
        source: IconSource,
    ) -> Self {
        Self {
            addin,
            icon_id: icon_id.into(),
            size,
            source,
        }
    }

    /// A definition backed by an embedded resource.
    pub fn resource(
        addin: Arc<dyn Addin>,
        icon_id: impl Into<String>,
        size: IconSize,
        resource: impl Into<String>,
    ) -> Self {
        Self::new(addin, icon_id, size, IconSource::Resource(resource.into()))
    }

    /// A definition backed by a file.
    pub fn file(
        addin: Arc<dyn Addin>,
        icon_id: impl Into<String>,
        size: IconSize,
        path: impl Into<String>,
    ) -> Self {
        Self::new(addin, icon_id, size, IconSource::File(path.into()))
    }

    /// A definition aliasing another icon spec.
    pub fn icon_ref(
        addin: Arc<dyn Addin>,
        icon_id: impl Into<String>,
        size: IconSize,
        spec: impl Into<String>,
    ) -> Self {
        Self::new(addin, icon_id, size, IconSource::IconRef(spec.into()))
    }

    /// A definition backed by an animation descriptor.
    pub fn animation(
        addin: Arc<dyn Addin>,
        icon_id: impl Into<String>,
        size: IconSize,
        descriptor: impl Into<String>,
    ) -> Self {
        Self::new(addin, icon_id, size, IconSource::Animation(descriptor.into()))
    }

    /// The contributing addin.
    pub fn addin(&self) -> &Arc<dyn Addin> {
        &self.addin
    }

    /// The logical icon id.
    pub fn icon_id(&self) -> &str {
        &self.icon_id
    }

    /// The size class this definition provides.
    pub fn size(&self) -> IconSize {
        self.size
    }

    /// The pixel source.
    pub fn source(&self) -> &IconSource {
        &self.source
    }

    /// Whether two definitions describe the same contribution.
    pub fn same_contribution(&self, other: &StockIconDefinition) -> bool {
        self.addin.id() == other.addin.id()
            && self.icon_id == other.icon_id
            && self.size == other.size
            && self.source == other.source
    }
}

impl fmt::Debug for StockIconDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StockIconDefinition")
            .field("addin", &self.addin.id())
            .field("icon_id", &self.icon_id)
            .field("size", &self.size)
            .field("source", &self.source)
            .finish()
    }
}

/// A change at an extension point.
#[derive(Debug, Clone)]
pub enum ExtensionChange {
    /// A definition was contributed.
    Added(StockIconDefinition),
    /// A previously contributed definition was withdrawn.
    Removed(StockIconDefinition),
}

/// Pending definitions keyed by icon id.
///
/// Only definitions that have not been materialized yet live here; the
/// entry for an id is removed as soon as [`take`](Self::take) hands it out.
#[derive(Default)]
pub struct StockRegistry {
    pending: HashMap<String, Vec<StockIconDefinition>>,
}

impl StockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a definition.
    pub fn add(&mut self, definition: StockIconDefinition) {
        tracing::trace!(
            target: targets::REGISTRY,
            icon_id = definition.icon_id(),
            size = %definition.size(),
            addin = definition.addin().id(),
            "queued stock icon definition"
        );
        self.pending
            .entry(definition.icon_id.clone())
            .or_default()
            .push(definition);
    }

    /// Drop a queued definition. Returns `false` if it was not pending.
    pub fn remove(&mut self, definition: &StockIconDefinition) -> bool {
        let Some(list) = self.pending.get_mut(definition.icon_id()) else {
            return false;
        };
        let before = list.len();
        list.retain(|d| !d.same_contribution(definition));
        let removed = list.len() != before;
        if list.is_empty() {
            self.pending.remove(definition.icon_id());
        }
        removed
    }

    /// Apply an extension change.
    pub fn apply(&mut self, change: &ExtensionChange) {
        match change {
            ExtensionChange::Added(definition) => self.add(definition.clone()),
            ExtensionChange::Removed(definition) => {
                if !self.remove(definition) {
                    tracing::debug!(
                        target: targets::REGISTRY,
                        icon_id = definition.icon_id(),
                        "removed definition was not pending"
                    );
                }
            }
        }
    }

    /// Take all pending definitions for `icon_id`, in contribution order.
    pub fn take(&mut self, icon_id: &str) -> Option<Vec<StockIconDefinition>> {
        self.pending.remove(icon_id)
    }

    /// Whether `icon_id` has pending definitions.
    pub fn is_pending(&self, icon_id: &str) -> bool {
        self.pending.contains_key(icon_id)
    }

    /// Number of pending definitions for `icon_id`.
    pub fn pending_count(&self, icon_id: &str) -> usize {
        self.pending.get(icon_id).map_or(0, Vec::len)
    }

    /// Pending icon ids, in no particular order.
    pub fn pending_ids(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    /// Number of icon ids with pending definitions.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl fmt::Debug for StockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StockRegistry")
            .field("pending_ids", &self.pending.len())
            .finish()
    }
}

/// The host's plugin registry, seen from the icon engine.
pub trait ExtensionRegistry: Send + Sync {
    /// Definitions currently contributed at `path`.
    fn definitions(&self, path: &str) -> Vec<StockIconDefinition>;

    /// Subscribe to future changes at `path`.
    ///
    /// Definitions present before the call are not replayed.
    fn subscribe(
        &self,
        path: &str,
        handler: Box<dyn Fn(&ExtensionChange) + Send + Sync>,
    ) -> ConnectionId;

    /// Remove a subscription made with [`subscribe`](Self::subscribe).
    fn unsubscribe(&self, path: &str, id: ConnectionId) -> bool;
}

#[derive(Default)]
struct ExtensionPoint {
    definitions: Mutex<Vec<StockIconDefinition>>,
    changed: Signal<ExtensionChange>,
}

/// A process-local [`ExtensionRegistry`].
///
/// Suitable for hosts that register icons programmatically, and for tests.
#[derive(Default)]
pub struct InMemoryExtensionRegistry {
    points: Mutex<HashMap<String, Arc<ExtensionPoint>>>,
}

impl InMemoryExtensionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn point(&self, path: &str) -> Arc<ExtensionPoint> {
        Arc::clone(self.points.lock().entry(path.to_string()).or_default())
    }

    /// Contribute a definition and notify subscribers.
    pub fn add(&self, path: &str, definition: StockIconDefinition) {
        let point = self.point(path);
        point.definitions.lock().push(definition.clone());
        point.changed.emit(ExtensionChange::Added(definition));
    }

    /// Withdraw a definition and notify subscribers.
    pub fn remove(&self, path: &str, definition: &StockIconDefinition) -> bool {
        let point = self.point(path);
        let removed = {
            let mut defs = point.definitions.lock();
            let before = defs.len();
            defs.retain(|d| !d.same_contribution(definition));
            defs.len() != before
        };
        if removed {
            point.changed.emit(ExtensionChange::Removed(definition.clone()));
        }
        removed
    }
}

impl ExtensionRegistry for InMemoryExtensionRegistry {
    fn definitions(&self, path: &str) -> Vec<StockIconDefinition> {
        self.point(path).definitions.lock().clone()
    }

    fn subscribe(
        &self,
        path: &str,
        handler: Box<dyn Fn(&ExtensionChange) + Send + Sync>,
    ) -> ConnectionId {
        self.point(path).changed.connect(handler)
    }

    fn unsubscribe(&self, path: &str, id: ConnectionId) -> bool {
        self.point(path).changed.disconnect(id)
    }
}

impl fmt::Debug for InMemoryExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryExtensionRegistry")
            .field("points", &self.points.lock().len())
            .finish()
    }
}
