//! Style lookup tables and inline style strings.

use std::fmt;

use super::model::CtaStyle;
use crate::sanitize;

/// Keyframes used by the entrance animations. Emitted once per page.
pub const KEYFRAMES: &str = "<style>\
@keyframes forgeFadeIn { from { opacity: 0; } to { opacity: 1; } }\n\
@keyframes forgeSlideUp { from { opacity: 0; transform: translateY(20px); } to { opacity: 1; transform: translateY(0); } }\n\
@keyframes forgeSlideDown { from { opacity: 0; transform: translateY(-20px); } to { opacity: 1; transform: translateY(0); } }\n\
@keyframes forgeScale { from { opacity: 0; transform: scale(0.95); } to { opacity: 1; transform: scale(1); } }\
</style>";

/// An ordered list of CSS declarations.
///
/// Setting a property that is already present replaces its value in place.
/// Empty values are dropped when rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleList {
    decls: Vec<(&'static str, String)>,
}

impl StyleList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Self::set`].
    #[must_use]
    pub fn with(mut self, property: &'static str, value: impl Into<String>) -> Self {
        self.set(property, value);
        self
    }

    pub fn set(&mut self, property: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.decls.iter_mut().find(|(p, _)| *p == property) {
            Some((_, existing)) => *existing = value,
            None => self.decls.push((property, value)),
        }
    }

    /// Append every declaration of `other`.
    pub fn extend(&mut self, other: &Self) {
        for (property, value) in &other.decls {
            self.set(property, value.clone());
        }
    }

    /// The declarations escaped for a `style="..."` attribute.
    #[must_use]
    pub fn to_attr(&self) -> String {
        sanitize::esc_attr(&self.to_string())
    }
}

impl fmt::Display for StyleList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (property, value) in self.decls.iter().filter(|(_, v)| !v.is_empty()) {
            if !first {
                f.write_str(";")?;
            }
            write!(f, "{property}:{value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Format a number the way CSS authors write it: `8`, `1.5`, `0.1`.
#[must_use]
pub fn num(value: f64) -> String {
    if value.abs() < f64::EPSILON {
        return "0".to_owned();
    }
    value.to_string()
}

/// `value` pixels.
#[must_use]
pub fn px(value: f64) -> String {
    format!("{}px", num(value))
}

/// Named font size. Unknown names fall back to `base`.
#[must_use]
pub fn font_size(name: &str) -> &'static str {
    match name {
        "xs" => "12px",
        "sm" => "14px",
        "lg" => "18px",
        "xl" => "20px",
        "2xl" => "24px",
        "3xl" => "30px",
        _ => "16px",
    }
}

/// Named font weight. Unknown names fall back to `semibold`.
#[must_use]
pub fn font_weight(name: &str) -> &'static str {
    match name {
        "normal" => "400",
        "medium" => "500",
        "bold" => "700",
        _ => "600",
    }
}

/// How a CTA's box shadow is specified.
#[derive(Debug, Clone, PartialEq)]
pub enum ShadowSpec {
    None,
    /// Explicit offsets, blur and colour. Missing parts take the editor's
    /// defaults.
    Custom {
        x: f64,
        y: f64,
        blur: f64,
        color: String,
    },
    /// One of the named presets.
    Preset(&'static str),
}

impl ShadowSpec {
    /// `none` disables the shadow. Any custom field being set wins over the
    /// preset name.
    #[must_use]
    pub fn from_style(style: &CtaStyle) -> Self {
        if style.shadow == "none" {
            return Self::None;
        }
        let custom = style.shadow_offset_x.is_some()
            || style.shadow_offset_y.is_some()
            || style.shadow_blur.is_some()
            || style.shadow_color.is_some();
        if custom {
            return Self::Custom {
                x: style.shadow_offset_x.unwrap_or(0.0),
                y: style.shadow_offset_y.unwrap_or(4.0),
                blur: style.shadow_blur.unwrap_or(12.0),
                color: style
                    .shadow_color
                    .clone()
                    .unwrap_or_else(|| "rgba(0, 0, 0, 0.15)".to_owned()),
            };
        }
        Self::Preset(Self::preset(&style.shadow))
    }

    /// Preset shadow by name. Unknown names fall back to `md`.
    #[must_use]
    pub fn preset(name: &str) -> &'static str {
        match name {
            "sm" => "0 1px 2px 0 rgba(0, 0, 0, 0.05)",
            "lg" => "0 10px 15px -3px rgba(0, 0, 0, 0.1), 0 4px 6px -4px rgba(0, 0, 0, 0.1)",
            "xl" => "0 20px 25px -5px rgba(0, 0, 0, 0.1), 0 8px 10px -6px rgba(0, 0, 0, 0.1)",
            _ => "0 4px 6px -1px rgba(0, 0, 0, 0.1), 0 2px 4px -2px rgba(0, 0, 0, 0.1)",
        }
    }

    /// The `box-shadow` value, if any.
    #[must_use]
    pub fn css(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Custom { x, y, blur, color } => Some(format!(
                "{}px {}px {}px {color}",
                num(*x),
                num(*y),
                num(*blur)
            )),
            Self::Preset(value) => Some((*value).to_owned()),
        }
    }
}

/// Entrance animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Animation {
    Fade,
    SlideUp,
    SlideDown,
    Scale,
}

impl Animation {
    /// `None` for `none` and unknown names.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "fade" => Some(Self::Fade),
            "slide-up" => Some(Self::SlideUp),
            "slide-down" => Some(Self::SlideDown),
            "scale" => Some(Self::Scale),
            _ => None,
        }
    }

    /// The `animation` shorthand. The keyframes live in [`KEYFRAMES`].
    #[must_use]
    pub fn css(self) -> &'static str {
        match self {
            Self::Fade => "forgeFadeIn 0.3s ease-out",
            Self::SlideUp => "forgeSlideUp 0.3s ease-out",
            Self::SlideDown => "forgeSlideDown 0.3s ease-out",
            Self::Scale => "forgeScale 0.3s ease-out",
        }
    }
}

/// Background pattern declarations, or `None` for no (or an unknown) pattern.
#[must_use]
pub fn background_pattern(style: &CtaStyle) -> Option<StyleList> {
    let color = apply_opacity_to_color(&style.bg_pattern_color, style.bg_pattern_opacity / 100.0);
    let (image, size) = match style.bg_pattern.as_str() {
        "dots" => (
            format!("radial-gradient({color} 1px, transparent 1px)"),
            "20px 20px",
        ),
        "grid" => (
            format!(
                "linear-gradient({color} 1px, transparent 1px), \
                 linear-gradient(90deg, {color} 1px, transparent 1px)"
            ),
            "20px 20px, 20px 20px",
        ),
        "diagonal-lines" => (
            format!(
                "repeating-linear-gradient(45deg, transparent, transparent 10px, \
                 {color} 10px, {color} 11px)"
            ),
            "auto",
        ),
        _ => return None,
    };
    Some(
        StyleList::new()
            .with("background-image", image)
            .with("background-size", size),
    )
}

/// Value of the hex digits in `s`, ignoring anything else.
fn hex_value(s: &str) -> u32 {
    s.chars()
        .filter_map(|c| c.to_digit(16))
        .fold(0, |acc, d| acc * 16 + d)
}

/// Give `color` the alpha `opacity`.
///
/// Hex colours (3 or 6 digits) become `rgba(r,g,b,o)`, `rgba(...)` has its
/// alpha replaced, `rgb(...)` gains one. Anything else is returned as is.
#[must_use]
pub fn apply_opacity_to_color(color: &str, opacity: f64) -> String {
    let alpha = num(opacity);

    if let Some(hex) = color.strip_prefix('#') {
        let hex = hex.trim_start_matches('#');
        let digits: Vec<char> = if hex.chars().count() == 3 {
            hex.chars().flat_map(|c| [c, c]).collect()
        } else {
            hex.chars().collect()
        };
        let channel = |i: usize| {
            let pair: String = digits.iter().skip(i * 2).take(2).collect();
            hex_value(&pair)
        };
        return format!("rgba({},{},{},{alpha})", channel(0), channel(1), channel(2));
    }

    if color.starts_with("rgba") {
        let Some(inner) = color.strip_suffix(')') else {
            return color.to_owned();
        };
        let keep = inner.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
        if keep.len() == inner.len() {
            return color.to_owned();
        }
        return format!("{keep}{alpha})");
    }

    if color.starts_with("rgb(") {
        return color
            .replace(')', &format!(",{alpha})"))
            .replace("rgb(", "rgba(");
    }

    color.to_owned()
}
