//! Call-to-action widgets.
//!
//! CTAs are authored in Forge and fetched as JSON. [`model`] decodes them with
//! the editor's defaults filled in, [`render`] turns one into a self-contained
//! HTML fragment with inline styles, and [`placement`] handles the per-page
//! concerns (shortcode expansion, site-wide CTAs, keyframes emitted once).
//! [`source`] abstracts where CTAs come from and caches lookups.

pub mod model;
pub mod placement;
pub mod render;
pub mod source;
pub mod style;

pub use model::{Cta, CtaContent, CtaStyle, CtaType};
pub use placement::{
    CtaPage, ShortcodeAttrs, TrackerConfig, render_shortcode, render_site_ctas, restore_loaded,
    shortcode, tracker_script,
};
pub use render::{RenderedCta, render_cta};
pub use source::{CachedCtaSource, CtaCredentials, CtaSource, DEFAULT_CACHE_TTL};
pub use style::{Animation, KEYFRAMES};
