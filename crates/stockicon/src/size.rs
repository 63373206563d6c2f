//! Nominal icon size classes.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use stockicon_render::Size;

/// A nominal icon size class.
///
/// Definitions are registered per size class; [`IconSize::Wildcard`] marks a
/// size-independent variant that can be scaled to any request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IconSize {
    /// Size-independent.
    #[default]
    Wildcard,
    /// Menu items.
    Menu,
    /// Small toolbar buttons.
    SmallToolbar,
    /// Large toolbar buttons.
    LargeToolbar,
    /// Push buttons.
    Button,
    /// Drag and drop.
    Dnd,
    /// Dialog artwork.
    Dialog,
}

impl IconSize {
    /// Every concrete size class, in declaration order.
    pub const CONCRETE: [IconSize; 6] = [
        IconSize::Menu,
        IconSize::SmallToolbar,
        IconSize::LargeToolbar,
        IconSize::Button,
        IconSize::Dnd,
        IconSize::Dialog,
    ];

    /// Nominal edge length in pixels, or `None` for the wildcard.
    pub const fn pixels(self) -> Option<u32> {
        match self {
            IconSize::Wildcard => None,
            IconSize::Menu => Some(16),
            IconSize::SmallToolbar => Some(16),
            IconSize::LargeToolbar => Some(24),
            IconSize::Button => Some(16),
            IconSize::Dnd => Some(32),
            IconSize::Dialog => Some(48),
        }
    }

    /// Nominal square pixel size, or `None` for the wildcard.
    pub fn dimensions(self) -> Option<Size> {
        self.pixels().map(Size::square)
    }

    /// Whether this is the size-independent class.
    #[inline]
    pub const fn is_wildcard(self) -> bool {
        matches!(self, IconSize::Wildcard)
    }

    /// The canonical lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            IconSize::Wildcard => "wildcard",
            IconSize::Menu => "menu",
            IconSize::SmallToolbar => "small-toolbar",
            IconSize::LargeToolbar => "large-toolbar",
            IconSize::Button => "button",
            IconSize::Dnd => "dnd",
            IconSize::Dialog => "dialog",
        }
    }
}

impl fmt::Display for IconSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IconSize {
    type Err = String;

    /// Accepts canonical names, `"*"`/`"invalid"` for the wildcard, and the
    /// `gtk-`-prefixed spellings found in older icon manifests.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let name = name.strip_prefix("gtk-").unwrap_or(name.as_str());
        match name {
            "" | "*" | "wildcard" | "invalid" => Ok(IconSize::Wildcard),
            "menu" => Ok(IconSize::Menu),
            "small-toolbar" | "smalltoolbar" => Ok(IconSize::SmallToolbar),
            "large-toolbar" | "largetoolbar" => Ok(IconSize::LargeToolbar),
            "button" => Ok(IconSize::Button),
            "dnd" => Ok(IconSize::Dnd),
            "dialog" => Ok(IconSize::Dialog),
            other => Err(format!("unknown icon size '{other}'")),
        }
    }
}
