//! The icon service: one owned context for every cache in the engine.
//!
//! # Example
//!
//! ```
//! use stockicon::{IconService, IconServiceConfig, IconSize};
//!
//! let service = IconService::new(IconServiceConfig::default());
//!
//! let red = service.get_icon("#ff0000");
//! assert!(red.ptr_eq(&service.get_icon("#FF0000")));
//!
//! let image = service.get_icon_sized("#00ff00", IconSize::Menu);
//! assert_eq!(image.size().max_side(), 16);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use stockicon_core::logging::{span_names, targets};
use stockicon_core::{ConnectionId, PerfSpan};
use stockicon_render::{Color, ImageBuffer};

use crate::addin::Addin;
use crate::animation::{AnimatedIcon, AnimationRegistry};
use crate::cache::{Icon, IconCache, ResolvedImage};
use crate::composer::{self, Composer};
use crate::config::IconServiceConfig;
use crate::error::{IconError, Result};
use crate::loader;
use crate::registry::{
    ExtensionChange, ExtensionRegistry, IconSource, StockIconDefinition, StockRegistry,
};
use crate::remote::{RemoteImageCache, RemoteImageLoader};
use crate::size::IconSize;
use crate::spec::{IconSpec, classify};
use crate::theme::{NativeIconTheme, NoIconTheme};
use crate::tracker::{AnimatedWidget, AnimationTracker};

/// Side of a color block when neither the configuration nor the request
/// names a concrete size.
const FALLBACK_BLOCK_PIXELS: u32 = 16;

/// Id the warning placeholder is cached under.
const EMPTY_NAME_ID: &str = "";

#[derive(Default)]
struct ServiceState {
    registry: StockRegistry,
    cache: IconCache,
    animations: AnimationRegistry,
    composer: Composer,
    addins: HashMap<String, Arc<dyn Addin>>,
    /// Addin-owned specs handed out by [`IconService::stock_id`], by canonical id.
    specs: HashMap<String, IconSpec>,
}

struct Subscription {
    registry: Arc<dyn ExtensionRegistry>,
    path: String,
    id: ConnectionId,
}

/// What one definition produced.
struct Loaded {
    image: ResolvedImage,
    animation: Option<Arc<AnimatedIcon>>,
}

/// Resolves icon names to images.
///
/// Holds the pending stock registry, the icon cache, the animation registry,
/// the composite memo, the widget animation tracker and the remote image
/// cache. Lookups never fail: empty names yield the warning placeholder and
/// unresolvable names the error placeholder.
///
/// The service is meant to be driven from the UI thread. Its state is behind
/// a lock so it can be shared, but no lock is held while images load.
pub struct IconService {
    config: IconServiceConfig,
    theme: Arc<dyn NativeIconTheme>,
    state: Mutex<ServiceState>,
    tracker: AnimationTracker,
    remote: OnceLock<RemoteImageCache>,
    subscription: Mutex<Option<Subscription>>,
}

impl IconService {
    /// Create a service with no native theme.
    pub fn new(config: IconServiceConfig) -> Self {
        Self {
            config,
            theme: Arc::new(NoIconTheme),
            state: Mutex::new(ServiceState::default()),
            tracker: AnimationTracker::new(),
            remote: OnceLock::new(),
            subscription: Mutex::new(None),
        }
    }

    /// Use `theme` for names no addin registered.
    pub fn with_theme(mut self, theme: Arc<dyn NativeIconTheme>) -> Self {
        self.theme = theme;
        self
    }

    /// Use a pre-built remote image cache instead of one built from the
    /// configuration on first use.
    ///
    /// Replaces any cache already created by [`remote_cache`](Self::remote_cache).
    pub fn with_remote_cache(mut self, remote: RemoteImageCache) -> Self {
        if let Some(previous) = self.remote.take() {
            tracing::debug!(target: targets::SERVICE, ?previous, "replacing remote image cache");
        }
        self.remote = OnceLock::from(remote);
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &IconServiceConfig {
        &self.config
    }

    /// The widget animation tracker.
    pub fn tracker(&self) -> &AnimationTracker {
        &self.tracker
    }

    // -------------------------------------------------------------------------
    // Extension registry
    // -------------------------------------------------------------------------

    /// Pull current stock icon definitions from `registry`, subscribe to
    /// later changes, and pre-load every icon contributed by `own_addin`.
    ///
    /// Calling this again replaces the previous subscription.
    pub fn initialize(self: &Arc<Self>, registry: Arc<dyn ExtensionRegistry>, own_addin: &str) {
        let path = self.config.extension_path.clone();
        let definitions = registry.definitions(&path);
        tracing::info!(
            target: targets::SERVICE,
            path,
            definitions = definitions.len(),
            "initializing icon service"
        );

        let own_ids: Vec<String> = definitions
            .iter()
            .filter(|d| d.addin().id() == own_addin)
            .map(|d| d.icon_id().to_string())
            .collect();
        for definition in definitions {
            self.register_definition(definition);
        }

        let weak = Arc::downgrade(self);
        let id = registry.subscribe(
            &path,
            Box::new(move |change| {
                if let Some(service) = weak.upgrade() {
                    service.apply_extension_change(change);
                }
            }),
        );
        let previous = self.subscription.lock().replace(Subscription {
            registry: Arc::clone(&registry),
            path,
            id,
        });
        if let Some(previous) = previous {
            previous.registry.unsubscribe(&previous.path, previous.id);
        }

        if self.config.prewarm_own_addin {
            let _span = PerfSpan::with_subject(span_names::ENSURE_LOADED, own_addin);
            let mut warmed = 0;
            for id in &own_ids {
                if self.ensure_loaded(id) {
                    warmed += 1;
                }
            }
            tracing::debug!(target: targets::SERVICE, addin = own_addin, warmed, "pre-warmed own icons");
        }
    }

    /// React to a change at the stock icon extension point.
    pub fn apply_extension_change(&self, change: &ExtensionChange) {
        let definition = match change {
            ExtensionChange::Added(d) | ExtensionChange::Removed(d) => d,
        };
        let mut state = self.state.lock();
        state
            .addins
            .entry(definition.addin().id().to_string())
            .or_insert_with(|| Arc::clone(definition.addin()));
        state.registry.apply(change);
    }

    /// Queue a definition as if it had been contributed at the extension point.
    pub fn register_definition(&self, definition: StockIconDefinition) {
        self.apply_extension_change(&ExtensionChange::Added(definition));
    }

    /// Make `addin` known so that its `resource:` and `animation:` specs resolve.
    pub fn register_addin(&self, addin: Arc<dyn Addin>) {
        self.state.lock().addins.insert(addin.id().to_string(), addin);
    }

    /// Whether `icon_id` still has definitions waiting to be loaded.
    pub fn is_pending(&self, icon_id: &str) -> bool {
        self.state.lock().registry.is_pending(icon_id)
    }

    // -------------------------------------------------------------------------
    // Materialization
    // -------------------------------------------------------------------------

    /// Load every pending definition of `icon_id` into the cache.
    ///
    /// Idempotent: once an id is processed its definitions are gone, and
    /// later calls return `false` without doing anything. Definitions that fail
    /// to load are logged and skipped; the others still register.
    pub fn ensure_loaded(&self, icon_id: &str) -> bool {
        let Some(definitions) = self.state.lock().registry.take(icon_id) else {
            return false;
        };
        let _span = PerfSpan::with_subject(span_names::ENSURE_LOADED, icon_id);

        let mut loaded: Vec<(IconSize, ResolvedImage)> = Vec::with_capacity(definitions.len());
        let mut animation = None;
        for definition in &definitions {
            match self.load_definition(definition) {
                Ok(result) => {
                    if result.animation.is_some() {
                        animation = result.animation;
                    }
                    loaded.push((definition.size(), result.image));
                }
                Err(e) => {
                    tracing::warn!(
                        target: targets::LOADER,
                        icon_id,
                        size = %definition.size(),
                        addin = definition.addin().id(),
                        source = definition.source().target(),
                        error = %e,
                        "skipping stock icon definition"
                    );
                }
            }
        }

        let mut state = self.state.lock();
        let had_wildcard = state
            .cache
            .get(icon_id)
            .is_some_and(|icon| icon.wildcard().is_some());
        let has_wildcard = had_wildcard || loaded.iter().any(|(size, _)| size.is_wildcard());

        for (size, image) in &loaded {
            state.cache.register(icon_id, *size, image.clone());
        }
        if !has_wildcard && let Some(largest) = largest_image(&loaded) {
            tracing::trace!(target: targets::REGISTRY, icon_id, size = %largest.size(), "synthesized wildcard variant");
            state.cache.register(icon_id, IconSize::Wildcard, largest.clone());
        }
        if let Some(animation) = animation {
            state.animations.register(icon_id, animation);
        }

        tracing::debug!(
            target: targets::REGISTRY,
            icon_id,
            definitions = definitions.len(),
            loaded = loaded.len(),
            "materialized stock icon"
        );
        true
    }

    fn load_definition(&self, definition: &StockIconDefinition) -> Result<Loaded> {
        let addin = definition.addin();
        match definition.source() {
            IconSource::Resource(resource) => Ok(Loaded {
                image: loader::load_resource(addin.as_ref(), resource)?,
                animation: None,
            }),
            IconSource::File(relative) => Ok(Loaded {
                image: loader::load_file(&addin.file_path(relative))?,
                animation: None,
            }),
            IconSource::Animation(descriptor) => {
                let animation = Arc::new(AnimatedIcon::load(addin.as_ref(), descriptor)?);
                let id = format!("anim:{}:{}", addin.id(), descriptor);
                {
                    let mut state = self.state.lock();
                    state.animations.register(&id, Arc::clone(&animation));
                    state
                        .cache
                        .register(&id, IconSize::Wildcard, animation.first_frame().clone());
                }
                Ok(Loaded {
                    image: animation.first_frame().clone(),
                    animation: Some(animation),
                })
            }
            IconSource::IconRef(target) => {
                let spec = self.classify_in(target, addin);
                let icon = self
                    .resolve(&spec, target)
                    .ok_or_else(|| IconError::UnknownIcon(target.clone()))?;
                let animation = self.state.lock().animations.get(&spec.canonical_id());
                Ok(Loaded {
                    image: icon.with_size(definition.size()),
                    animation,
                })
            }
        }
    }

    /// Classify `name` in `addin`'s context and remember the addin.
    fn classify_in(&self, name: &str, addin: &Arc<dyn Addin>) -> IconSpec {
        let spec = classify(name, Some(addin.id()));
        let mut state = self.state.lock();
        state
            .addins
            .entry(addin.id().to_string())
            .or_insert_with(|| Arc::clone(addin));
        remember_specs(&mut state.specs, &spec);
        spec
    }

    /// Resolve `spec` to a cached icon, loading it if needed. No placeholders.
    fn resolve(&self, spec: &IconSpec, name: &str) -> Option<Icon> {
        let id = spec.canonical_id();
        if let Some(icon) = self.state.lock().cache.get(&id) {
            return Some(icon);
        }

        match spec {
            IconSpec::Color(color) => Some(self.color_block(&id, *color, IconSize::Wildcard)),
            IconSpec::Composite(parts) => self.compose(parts, IconSize::Wildcard),
            IconSpec::ResourceRef { addin, path } => self.load_resource_ref(&id, addin, path),
            IconSpec::AnimationRef { addin, path } => self.load_animation_ref(&id, addin, path),
            IconSpec::Plain(plain) => {
                let remembered = self.state.lock().specs.get(plain).cloned();
                if let Some(remembered) = remembered
                    && !matches!(remembered, IconSpec::Plain(_))
                {
                    return self.resolve(&remembered, name);
                }
                self.ensure_loaded(plain);
                let cached = self.state.lock().cache.get(plain);
                cached.or_else(|| self.load_from_theme(plain))
            }
        }
    }

    fn load_resource_ref(&self, id: &str, addin_id: &str, path: &str) -> Option<Icon> {
        let addin = self.addin(addin_id)?;
        match loader::load_resource(addin.as_ref(), path) {
            Ok(image) => Some(self.state.lock().cache.register(id, IconSize::Wildcard, image)),
            Err(e) => {
                tracing::warn!(target: targets::LOADER, id, error = %e, "cannot load resource icon");
                None
            }
        }
    }

    fn load_animation_ref(&self, id: &str, addin_id: &str, path: &str) -> Option<Icon> {
        let addin = self.addin(addin_id)?;
        match AnimatedIcon::load(addin.as_ref(), path) {
            Ok(animation) => {
                let animation = Arc::new(animation);
                let mut state = self.state.lock();
                state.animations.register(id, Arc::clone(&animation));
                Some(
                    state
                        .cache
                        .register(id, IconSize::Wildcard, animation.first_frame().clone()),
                )
            }
            Err(e) => {
                tracing::warn!(target: targets::ANIMATION, id, error = %e, "cannot load animation");
                None
            }
        }
    }

    fn addin(&self, addin_id: &str) -> Option<Arc<dyn Addin>> {
        let addin = self.state.lock().addins.get(addin_id).cloned();
        if addin.is_none() {
            tracing::warn!(target: targets::SERVICE, addin = addin_id, "unknown addin");
        }
        addin
    }

    fn load_from_theme(&self, name: &str) -> Option<Icon> {
        if !self.theme.has_icon(name) {
            return None;
        }
        let images: Vec<(IconSize, ImageBuffer)> = IconSize::CONCRETE
            .iter()
            .filter_map(|size| {
                let pixels = size.pixels()?;
                self.theme.load_icon(name, pixels).map(|image| (*size, image))
            })
            .collect();
        if images.is_empty() {
            return None;
        }

        tracing::debug!(target: targets::SERVICE, name, sizes = images.len(), "using native theme icon");
        let mut state = self.state.lock();
        let mut icon = None;
        for (size, image) in images {
            icon = Some(state.cache.register(name, size, ResolvedImage::new(image)));
        }
        icon
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Look up `name`, falling back to a placeholder.
    ///
    /// An empty name yields the warning placeholder, which is cached. A name
    /// that resolves to nothing yields the error placeholder, which is not, so
    /// a later registration under that name still takes effect.
    pub fn get_icon(&self, name: &str) -> Icon {
        if name.is_empty() {
            return self.warning_placeholder();
        }
        self.get_icon_opt(name).unwrap_or_else(|| {
            tracing::warn!(target: targets::SERVICE, name, "unknown icon, using error placeholder");
            self.error_placeholder(name)
        })
    }

    /// Look up `name` without placeholders.
    pub fn get_icon_opt(&self, name: &str) -> Option<Icon> {
        if name.is_empty() {
            return None;
        }
        let spec = classify(name, None);
        self.resolve(&spec, name)
    }

    /// The image to draw for `name` at `size`.
    pub fn get_icon_sized(&self, name: &str, size: IconSize) -> ResolvedImage {
        if !size.is_wildcard() && !name.is_empty() {
            match classify(name, None) {
                IconSpec::Color(color) if self.config.color_block_size.is_wildcard() => {
                    let id = color.to_hex();
                    return self.color_block(&id, color, size).with_size(size);
                }
                // Blocks keep the configured size whatever size was requested.
                IconSpec::Color(color) => {
                    let id = color.to_hex();
                    return self
                        .color_block(&id, color, IconSize::Wildcard)
                        .default_image()
                        .clone();
                }
                IconSpec::Composite(parts) => {
                    if let Some(icon) = self.compose(&parts, size) {
                        return icon.with_size(size);
                    }
                }
                _ => {}
            }
        }
        self.get_icon(name).with_size(size)
    }

    /// Whether `name` resolves to an animation.
    pub fn is_animation(&self, name: &str) -> bool {
        self.get_animated_icon(name).is_some()
    }

    /// The animation `name` resolves to, if any.
    pub fn get_animated_icon(&self, name: &str) -> Option<Arc<AnimatedIcon>> {
        let spec = classify(name, None);
        if !spec.may_animate() {
            return None;
        }
        self.resolve(&spec, name)?;
        let id = match &spec {
            IconSpec::Plain(plain) => self
                .state
                .lock()
                .specs
                .get(plain)
                .map_or_else(|| plain.clone(), IconSpec::canonical_id),
            other => other.canonical_id(),
        };
        self.state.lock().animations.get(&id)
    }

    /// The cache id for `spec` owned by `addin`.
    ///
    /// `resource:` and `animation:` specs only resolve in an addin's context;
    /// the returned id can later be passed to [`get_icon`](Self::get_icon)
    /// without one.
    pub fn stock_id(&self, addin: &Arc<dyn Addin>, spec: &str) -> String {
        self.classify_in(spec, addin).canonical_id()
    }

    /// Number of cached icons.
    pub fn cached_icon_count(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Whether an icon is cached under `id`.
    pub fn is_cached(&self, id: &str) -> bool {
        self.state.lock().cache.contains(id)
    }

    // -------------------------------------------------------------------------
    // Composition
    // -------------------------------------------------------------------------

    /// Compose `parts` bottom to top and cache the result under the
    /// composite id.
    ///
    /// With [`IconSize::Wildcard`] every size class is built, each from the
    /// parts' matching variants. Each size class is attempted once; one that
    /// fails because a part is missing leaves the others intact.
    pub fn compose(&self, parts: &[IconSpec], size: IconSize) -> Option<Icon> {
        let id = IconSpec::Composite(parts.to_vec()).canonical_id();
        let _span = PerfSpan::with_subject(span_names::COMPOSE, &id);

        let sizes: Vec<IconSize> = if size.is_wildcard() {
            std::iter::once(IconSize::Wildcard)
                .chain(IconSize::CONCRETE)
                .collect()
        } else {
            vec![size]
        };

        let mut icons = Vec::with_capacity(parts.len());
        for part in parts {
            let name = part.canonical_id();
            match self.resolve(part, &name) {
                Some(icon) => icons.push(Some(icon)),
                None => {
                    tracing::warn!(target: targets::COMPOSER, id, part = name, "composite part missing");
                    icons.push(None);
                }
            }
        }

        for size in sizes {
            if !self.state.lock().composer.begin(&id, size) {
                continue;
            }
            let Some(images) = icons
                .iter()
                .map(|icon| icon.as_ref().map(|i| part_image(i, size)))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            if let Some(composed) = composer::layer(&images) {
                self.state.lock().cache.register(&id, size, composed);
            }
        }

        self.state.lock().cache.get(&id)
    }

    // -------------------------------------------------------------------------
    // Animation binding
    // -------------------------------------------------------------------------

    /// Show `name` in `widget`.
    ///
    /// Animations are bound to the widget and play while it is realized.
    /// Static icons are set directly and replace any bound animation.
    pub fn load_icon_into<W>(&self, widget: &Arc<W>, name: &str, size: IconSize)
    where
        W: AnimatedWidget + 'static,
    {
        match self.get_animated_icon(name) {
            Some(animation) => {
                self.tracker.bind(widget, animation);
            }
            None => {
                self.tracker.unbind(widget);
                widget.set_image(&self.get_icon_sized(name, size));
            }
        }
    }

    /// Advance all playing animations. Returns the number of frames delivered.
    pub fn tick(&self, delta: Duration) -> usize {
        self.tracker.tick(delta)
    }

    // -------------------------------------------------------------------------
    // Remote images
    // -------------------------------------------------------------------------

    /// The remote image cache, created from the configuration on first use.
    pub fn remote_cache(&self) -> Result<&RemoteImageCache> {
        if let Some(remote) = self.remote.get() {
            return Ok(remote);
        }
        let remote = RemoteImageCache::new(self.config.remote.clone())?;
        Ok(self.remote.get_or_init(|| remote))
    }

    /// The avatar for `identity` at `size` logical pixels and `scale`.
    pub fn get_remote_image(&self, identity: &str, size: u32, scale: u32) -> Result<Arc<RemoteImageLoader>> {
        Ok(self.remote_cache()?.get_remote_image(identity, size, scale))
    }

    /// Apply finished remote fetches. Call from the UI thread.
    pub fn process_remote_completions(&self) -> usize {
        self.remote.get().map_or(0, RemoteImageCache::process_completed)
    }

    // -------------------------------------------------------------------------
    // Placeholders and color blocks
    // -------------------------------------------------------------------------

    fn block_pixels(&self, requested: IconSize) -> u32 {
        self.config
            .color_block_size
            .pixels()
            .or(requested.pixels())
            .unwrap_or(FALLBACK_BLOCK_PIXELS)
    }

    fn color_block(&self, id: &str, color: Color, size: IconSize) -> Icon {
        let mut state = self.state.lock();
        if let Some(icon) = state.cache.get(id) {
            let wanted = if self.config.color_block_size.is_wildcard() {
                size
            } else {
                IconSize::Wildcard
            };
            if icon.variant(wanted).is_some() {
                return icon;
            }
        }
        let pixels = self.block_pixels(size);
        let image = ResolvedImage::new(ImageBuffer::from_color(pixels, pixels, color));
        let register_as = if self.config.color_block_size.is_wildcard() {
            size
        } else {
            IconSize::Wildcard
        };
        tracing::trace!(target: targets::SERVICE, id, pixels, "synthesized color block");
        state.cache.register(id, register_as, image)
    }

    fn warning_placeholder(&self) -> Icon {
        self.color_block(EMPTY_NAME_ID, self.config.warning_color, IconSize::Wildcard)
    }

    fn error_placeholder(&self, name: &str) -> Icon {
        let pixels = self.block_pixels(IconSize::Wildcard);
        Icon::new(
            name,
            IconSize::Wildcard,
            ResolvedImage::new(ImageBuffer::from_color(pixels, pixels, self.config.error_color)),
        )
    }
}

impl Drop for IconService {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription
                .registry
                .unsubscribe(&subscription.path, subscription.id);
        }
    }
}

impl fmt::Debug for IconService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("IconService")
            .field("pending", &state.registry.len())
            .field("cached", &state.cache.len())
            .field("animations", &state.animations.len())
            .field("tracker", &self.tracker)
            .finish()
    }
}

/// The image with the largest side; the first one wins ties.
fn largest_image(loaded: &[(IconSize, ResolvedImage)]) -> Option<&ResolvedImage> {
    let mut best: Option<&ResolvedImage> = None;
    for (_, image) in loaded {
        if best.is_none_or(|b| image.size().max_side() > b.size().max_side()) {
            best = Some(image);
        }
    }
    best
}

fn part_image(icon: &Icon, size: IconSize) -> ResolvedImage {
    if size.is_wildcard() {
        icon.default_image().clone()
    } else {
        icon.with_size(size)
    }
}

fn remember_specs(specs: &mut HashMap<String, IconSpec>, spec: &IconSpec) {
    match spec {
        IconSpec::ResourceRef { .. } | IconSpec::AnimationRef { .. } => {
            specs.insert(spec.canonical_id(), spec.clone());
        }
        IconSpec::Composite(parts) => {
            for part in parts {
                remember_specs(specs, part);
            }
        }
        IconSpec::Plain(_) | IconSpec::Color(_) => {}
    }
}
