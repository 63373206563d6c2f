//! Stockicon - icon resolution and caching for desktop application shells.
//!
//! Turns symbolic icon names into images. Names form a small spec language
//! (see [`spec`]): plain stock ids contributed by addins, `#RRGGBB[AA]`
//! colors, addin-owned `resource:` and `animation:` specs, and `a|b`
//! composites layered left to right.
//!
//! Everything lives in one [`IconService`]; there is no global state.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stockicon::{
//!     Addin, EmbeddedAddin, IconService, IconServiceConfig, IconSize, StockIconDefinition,
//! };
//!
//! # let png = stockicon::render::ImageBuffer::from_color(16, 16, stockicon::render::Color::BLUE)
//! #     .to_png()
//! #     .unwrap();
//! let addin: Arc<dyn Addin> = Arc::new(EmbeddedAddin::new("core").with_resource("save.png", png));
//!
//! let service = IconService::new(IconServiceConfig::default());
//! service.register_definition(StockIconDefinition::resource(
//!     addin,
//!     "doc-save",
//!     IconSize::Menu,
//!     "save.png",
//! ));
//!
//! let icon = service.get_icon("doc-save");
//! assert!(icon.variant(IconSize::Menu).is_some());
//! assert!(icon.wildcard().is_some());
//! ```

pub mod addin;
pub mod animation;
pub mod cache;
pub mod composer;
pub mod config;
mod error;
pub mod loader;
pub mod registry;
pub mod remote;
pub mod service;
pub mod size;
pub mod spec;
pub mod theme;
pub mod tracker;

pub use addin::{Addin, EmbeddedAddin};
pub use animation::{AnimatedIcon, AnimationRegistry, PlaybackHandle};
pub use cache::{Icon, IconCache, ResolvedImage};
pub use config::{IconServiceConfig, RemoteImageConfig};
pub use error::{IconError, Result};
pub use registry::{
    ExtensionChange, ExtensionRegistry, IconSource, InMemoryExtensionRegistry,
    STOCK_ICONS_EXTENSION_PATH, StockIconDefinition, StockRegistry,
};
pub use remote::{HttpFetcher, RemoteFetcher, RemoteImageCache, RemoteImageLoader};
pub use service::IconService;
pub use size::IconSize;
pub use spec::{IconSpec, classify};
pub use theme::{DirectoryIconTheme, NativeIconTheme, NoIconTheme};
pub use tracker::{AnimatedWidget, AnimationTracker, BindingState};

pub use stockicon_core::{ConnectionId, Signal};

/// Image buffers and colors.
pub mod render {
    pub use stockicon_render::*;
}
