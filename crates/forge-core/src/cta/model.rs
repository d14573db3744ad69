//! CTA records as delivered by Forge.
//!
//! Forge sends loosely typed JSON: numbers may arrive as strings, text as
//! numbers, and any field may be missing or `null`. Everything here
//! deserializes leniently and fills in the editor's defaults, so the
//! renderer never has to second-guess a field.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::content::{is_truthy, scalar_text};

/// The widget kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum CtaType {
    /// Inline block placed by a shortcode.
    #[default]
    Banner,
    /// Bar fixed to the top or bottom of the viewport.
    FloatingBar,
    /// Centered dialog over a backdrop.
    Popup,
    /// Anything else. Renders no markup.
    Other(String),
}

impl CtaType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Banner => "banner",
            Self::FloatingBar => "floating-bar",
            Self::Popup => "popup",
            Self::Other(other) => other,
        }
    }
}

impl From<Option<String>> for CtaType {
    fn from(value: Option<String>) -> Self {
        match value.as_deref() {
            None | Some("banner") => Self::Banner,
            Some("floating-bar") => Self::FloatingBar,
            Some("popup") => Self::Popup,
            Some(_) => Self::Other(value.unwrap_or_default()),
        }
    }
}

impl From<CtaType> for String {
    fn from(value: CtaType) -> Self {
        value.as_str().to_owned()
    }
}

/// A call-to-action widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cta {
    #[serde(default, deserialize_with = "text")]
    pub id: String,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub slug: String,
    #[serde(rename = "type", default)]
    pub kind: CtaType,
    #[serde(default = "active", deserialize_with = "flag")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub content: CtaContent,
    #[serde(default, deserialize_with = "or_default")]
    pub style: CtaStyle,
}

fn active() -> bool {
    true
}

/// Text, links and media of a CTA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtaContent {
    #[serde(deserialize_with = "text")]
    pub headline: String,
    #[serde(deserialize_with = "text")]
    pub text: String,
    #[serde(deserialize_with = "text")]
    pub eyebrow_text: String,
    #[serde(deserialize_with = "text")]
    pub button_text: String,
    #[serde(deserialize_with = "text")]
    pub button_url: String,
    /// `solid`, `outline` or `ghost`.
    #[serde(deserialize_with = "text")]
    pub button_style: String,
    #[serde(deserialize_with = "text")]
    pub button_icon: String,
    #[serde(deserialize_with = "text")]
    pub button_icon_position: String,
    #[serde(deserialize_with = "text")]
    pub secondary_button_text: String,
    #[serde(deserialize_with = "text")]
    pub secondary_button_url: String,
    #[serde(deserialize_with = "text")]
    pub secondary_button_style: String,
    #[serde(deserialize_with = "flag")]
    pub show_close_button: bool,
    #[serde(deserialize_with = "text")]
    pub fine_print: String,
    #[serde(deserialize_with = "text")]
    pub phone: String,
    #[serde(deserialize_with = "flag")]
    pub show_phone_icon: bool,
    #[serde(deserialize_with = "text")]
    pub image_url: String,
    /// `top`, `left`, `right` or `background`.
    #[serde(deserialize_with = "text")]
    pub image_position: String,
    #[serde(deserialize_with = "text")]
    pub image_alt: String,
    /// Percent.
    #[serde(deserialize_with = "number")]
    pub image_scale: f64,
    #[serde(deserialize_with = "text")]
    pub image_fit: String,
    #[serde(deserialize_with = "flag")]
    pub is_lead_magnet: bool,
    #[serde(deserialize_with = "text")]
    pub lead_magnet_title: String,
}

impl Default for CtaContent {
    fn default() -> Self {
        Self {
            headline: String::new(),
            text: String::new(),
            eyebrow_text: String::new(),
            button_text: String::new(),
            button_url: "#".to_owned(),
            button_style: "solid".to_owned(),
            button_icon: String::new(),
            button_icon_position: "left".to_owned(),
            secondary_button_text: String::new(),
            secondary_button_url: "#".to_owned(),
            secondary_button_style: "outline".to_owned(),
            show_close_button: false,
            fine_print: String::new(),
            phone: String::new(),
            show_phone_icon: true,
            image_url: String::new(),
            image_position: "top".to_owned(),
            image_alt: String::new(),
            image_scale: 100.0,
            image_fit: "cover".to_owned(),
            is_lead_magnet: false,
            lead_magnet_title: String::new(),
        }
    }
}

/// Colours, sizes and layout of a CTA. Lengths are in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CtaStyle {
    #[serde(deserialize_with = "text")]
    pub background: String,
    #[serde(deserialize_with = "text")]
    pub text_color: String,
    #[serde(deserialize_with = "text")]
    pub headline_color: String,
    #[serde(deserialize_with = "text")]
    pub headline_size: String,
    #[serde(deserialize_with = "text")]
    pub headline_weight: String,
    #[serde(deserialize_with = "text")]
    pub text_size: String,
    #[serde(deserialize_with = "text")]
    pub text_align: String,
    #[serde(deserialize_with = "text")]
    pub button_bg: String,
    #[serde(deserialize_with = "text")]
    pub button_text_color: String,
    #[serde(deserialize_with = "text")]
    pub button_hover_bg: String,
    #[serde(deserialize_with = "number")]
    pub button_radius: f64,
    /// Falls back to `button_bg` when empty.
    #[serde(deserialize_with = "text")]
    pub button_border_color: String,
    #[serde(deserialize_with = "text")]
    pub secondary_button_bg: String,
    #[serde(deserialize_with = "text")]
    pub secondary_button_text_color: String,
    #[serde(deserialize_with = "text")]
    pub secondary_button_border_color: String,
    #[serde(deserialize_with = "text")]
    pub border_color: String,
    #[serde(deserialize_with = "number")]
    pub border_width: f64,
    #[serde(deserialize_with = "number")]
    pub border_radius: f64,
    #[serde(deserialize_with = "number")]
    pub padding: f64,
    /// Horizontal padding; `padding` when unset.
    #[serde(deserialize_with = "optional_number")]
    pub padding_x: Option<f64>,
    /// Vertical padding; `padding` when unset.
    #[serde(deserialize_with = "optional_number")]
    pub padding_y: Option<f64>,
    #[serde(deserialize_with = "number")]
    pub gap: f64,
    /// `none`, or a preset name: `sm`, `md`, `lg`, `xl`.
    #[serde(deserialize_with = "text")]
    pub shadow: String,
    #[serde(deserialize_with = "optional_number")]
    pub shadow_offset_x: Option<f64>,
    #[serde(deserialize_with = "optional_number")]
    pub shadow_offset_y: Option<f64>,
    #[serde(deserialize_with = "optional_number")]
    pub shadow_blur: Option<f64>,
    #[serde(deserialize_with = "optional_text")]
    pub shadow_color: Option<String>,
    /// `horizontal` or `vertical`.
    #[serde(deserialize_with = "text")]
    pub layout: String,
    #[serde(deserialize_with = "text")]
    pub animation: String,
    #[serde(deserialize_with = "text")]
    pub custom_css: String,
    /// `none`, `dots`, `grid` or `diagonal-lines`.
    #[serde(deserialize_with = "text")]
    pub bg_pattern: String,
    /// Percent.
    #[serde(deserialize_with = "number")]
    pub bg_pattern_opacity: f64,
    #[serde(deserialize_with = "text")]
    pub bg_pattern_color: String,
    /// Edge a floating bar sticks to: `top` or `bottom`.
    #[serde(deserialize_with = "text")]
    pub position: String,
}

impl Default for CtaStyle {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_owned(),
            text_color: "#374151".to_owned(),
            headline_color: "#111827".to_owned(),
            headline_size: "lg".to_owned(),
            headline_weight: "semibold".to_owned(),
            text_size: "sm".to_owned(),
            text_align: "left".to_owned(),
            button_bg: "#2563eb".to_owned(),
            button_text_color: "#ffffff".to_owned(),
            button_hover_bg: "#1d4ed8".to_owned(),
            button_radius: 6.0,
            button_border_color: String::new(),
            secondary_button_bg: "transparent".to_owned(),
            secondary_button_text_color: "#2563eb".to_owned(),
            secondary_button_border_color: "#2563eb".to_owned(),
            border_color: "#e5e7eb".to_owned(),
            border_width: 0.0,
            border_radius: 8.0,
            padding: 24.0,
            padding_x: None,
            padding_y: None,
            gap: 12.0,
            shadow: "md".to_owned(),
            shadow_offset_x: Some(0.0),
            shadow_offset_y: Some(4.0),
            shadow_blur: Some(12.0),
            shadow_color: Some("rgba(0, 0, 0, 0.15)".to_owned()),
            layout: "horizontal".to_owned(),
            animation: "none".to_owned(),
            custom_css: String::new(),
            bg_pattern: "none".to_owned(),
            bg_pattern_opacity: 10.0,
            bg_pattern_color: "#000000".to_owned(),
            position: "bottom".to_owned(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(scalar_text(&Value::deserialize(d)?))
}

fn optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        other => Some(scalar_text(&other)),
    })
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(is_truthy(&Value::deserialize(d)?))
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

/// A number or numeric string. Anything else reads as 0.
fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(parse_number(&Value::deserialize(d)?).unwrap_or(0.0))
}

/// Like [`number`], with `null` and non-numeric values read as unset.
fn optional_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(parse_number(&Value::deserialize(d)?))
}

/// `null` reads as the default.
fn or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
