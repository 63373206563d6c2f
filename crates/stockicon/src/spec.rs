//! Icon name classification.
//!
//! An icon name is a small spec language:
//!
//! | Form              | Meaning                                     |
//! |-------------------|---------------------------------------------|
//! | `#RRGGBB[AA]`     | solid color block                           |
//! | `resource:<path>` | image embedded in the owning addin          |
//! | `animation:<path>`| animation descriptor in the owning addin    |
//! | `a\|b\|c`         | composite, layered left to right            |
//! | anything else     | logical stock id or native theme name       |
//!
//! Classification never fails. Malformed colors and prefixed specs without an
//! owning addin fall back to [`IconSpec::Plain`].

use std::fmt;

use stockicon_render::Color;

/// Prefix for embedded-resource specs.
pub const RESOURCE_PREFIX: &str = "resource:";

/// Prefix for animation specs.
pub const ANIMATION_PREFIX: &str = "animation:";

/// Separator between composite parts.
pub const COMPOSITE_SEPARATOR: char = '|';

/// A classified icon name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSpec {
    /// A logical stock id or native theme name.
    Plain(String),
    /// A literal color.
    Color(Color),
    /// An image resource owned by an addin.
    ResourceRef { addin: String, path: String },
    /// An animation descriptor owned by an addin.
    AnimationRef { addin: String, path: String },
    /// Two or more parts layered in order.
    Composite(Vec<IconSpec>),
}

/// Classify `name`, resolving prefixed specs against `addin` when given.
pub fn classify(name: &str, addin: Option<&str>) -> IconSpec {
    if name.contains(COMPOSITE_SEPARATOR) {
        let parts: Vec<IconSpec> = name
            .split(COMPOSITE_SEPARATOR)
            .map(|part| classify_part(part, addin))
            .collect();
        // `contains` guarantees at least two parts.
        return IconSpec::Composite(parts);
    }
    classify_part(name, addin)
}

fn classify_part(name: &str, addin: Option<&str>) -> IconSpec {
    if name.starts_with('#')
        && let Some(color) = Color::from_hex(name)
    {
        return IconSpec::Color(color);
    }

    if let Some(addin) = addin {
        if let Some(path) = name.strip_prefix(RESOURCE_PREFIX) {
            return IconSpec::ResourceRef {
                addin: addin.to_string(),
                path: path.to_string(),
            };
        }
        if let Some(path) = name.strip_prefix(ANIMATION_PREFIX) {
            return IconSpec::AnimationRef {
                addin: addin.to_string(),
                path: path.to_string(),
            };
        }
    }

    IconSpec::Plain(name.to_string())
}

impl IconSpec {
    /// Classify `name` without an owning addin.
    pub fn parse(name: &str) -> Self {
        classify(name, None)
    }

    /// The cache key for this spec.
    ///
    /// Equivalent spellings share one key: colors are normalized to
    /// lower-case `#rrggbbaa`, addin-owned specs are qualified by the addin id,
    /// and composites join their parts' keys with `|`.
    pub fn canonical_id(&self) -> String {
        match self {
            IconSpec::Plain(name) => name.clone(),
            IconSpec::Color(color) => color.to_hex(),
            IconSpec::ResourceRef { addin, path } => format!("res:{addin}:{path}"),
            IconSpec::AnimationRef { addin, path } => format!("anim:{addin}:{path}"),
            IconSpec::Composite(parts) => {
                let ids: Vec<String> = parts.iter().map(IconSpec::canonical_id).collect();
                ids.join("|")
            }
        }
    }

    /// Short classification name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            IconSpec::Plain(_) => "plain",
            IconSpec::Color(_) => "color",
            IconSpec::ResourceRef { .. } => "resource",
            IconSpec::AnimationRef { .. } => "animation",
            IconSpec::Composite(_) => "composite",
        }
    }

    /// Whether this spec may resolve to an animation.
    pub fn may_animate(&self) -> bool {
        matches!(self, IconSpec::Plain(_) | IconSpec::AnimationRef { .. })
    }
}

impl fmt::Display for IconSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain() {
        assert_eq!(classify("md-save", None), IconSpec::Plain("md-save".into()));
        assert_eq!(classify("", None), IconSpec::Plain(String::new()));
    }

    #[test]
    fn test_color() {
        assert_eq!(classify("#FF0000", None), IconSpec::Color(Color::RED));
        assert_eq!(
            classify("#00ff0080", None),
            IconSpec::Color(Color::from_rgba8(0, 255, 0, 0x80))
        );
    }

    #[test]
    fn test_malformed_color_is_plain() {
        for name in ["#", "#FF00", "#FF00000", "#GG0000", "#ff0000ff00"] {
            assert_eq!(classify(name, None), IconSpec::Plain(name.into()), "{name}");
        }
    }

    #[test]
    fn test_prefixes_need_addin() {
        assert_eq!(
            classify("resource:icons/save.png", None),
            IconSpec::Plain("resource:icons/save.png".into())
        );
        assert_eq!(
            classify("resource:icons/save.png", Some("core")),
            IconSpec::ResourceRef {
                addin: "core".into(),
                path: "icons/save.png".into()
            }
        );
        assert_eq!(
            classify("animation:spinner.anim", Some("core")),
            IconSpec::AnimationRef {
                addin: "core".into(),
                path: "spinner.anim".into()
            }
        );
    }

    #[test]
    fn test_composite() {
        let spec = classify("md-file|#ff0000|resource:overlay.png", Some("core"));
        assert_eq!(
            spec,
            IconSpec::Composite(vec![
                IconSpec::Plain("md-file".into()),
                IconSpec::Color(Color::RED),
                IconSpec::ResourceRef {
                    addin: "core".into(),
                    path: "overlay.png".into()
                },
            ])
        );
        assert_eq!(spec.kind(), "composite");
    }

    #[test]
    fn test_canonical_ids() {
        assert_eq!(classify("#FF0000", None).canonical_id(), "#ff0000ff");
        assert_eq!(
            classify("#ff0000", None).canonical_id(),
            classify("#FF0000FF", None).canonical_id()
        );
        assert_eq!(
            classify("resource:a.png", Some("core")).canonical_id(),
            "res:core:a.png"
        );
        assert_eq!(
            classify("a|#F00000|b", None).canonical_id(),
            "a|#f00000ff|b"
        );
    }

    #[test]
    fn test_composite_order_matters() {
        let ab = classify("a|b", None).canonical_id();
        let ba = classify("b|a", None).canonical_id();
        assert_ne!(ab, ba);
        assert_eq!(ab, classify("a|b", None).canonical_id());
    }
}
