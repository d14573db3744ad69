//! Putting CTAs on a page: the `[forge_cta]` shortcode and site-wide CTAs.
//!
//! A [`CtaPage`] tracks what one page has already rendered, so a CTA placed
//! by shortcode is not repeated by the site-wide footer and the animation
//! keyframes are emitted only once.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::model::Cta;
use super::render::render_cta;
use super::source::{CtaCredentials, CtaSource};
use super::style::KEYFRAMES;
use crate::connection::ConnectionSettings;
use crate::error::CtaError;
use crate::sanitize::{esc_html, esc_url};

/// Attributes of a `[forge_cta]` shortcode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShortcodeAttrs {
    pub id: String,
    pub debug: String,
}

impl ShortcodeAttrs {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            debug: String::new(),
        }
    }

    /// Any value other than empty or `"0"` turns debug output on.
    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        !self.debug.is_empty() && self.debug != "0"
    }
}

/// The shortcode text that places the CTA with `slug`.
#[must_use]
pub fn shortcode(slug: &str) -> String {
    format!("[forge_cta id=\"{slug}\"]")
}

/// Per-page render state.
#[derive(Debug, Default)]
pub struct CtaPage {
    seen: HashSet<String>,
    loaded: Vec<Cta>,
    keyframes_emitted: bool,
}

impl CtaPage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `id` as already on the page without having its data.
    pub fn mark_rendered(&mut self, id: impl Into<String>) {
        self.seen.insert(id.into());
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// CTAs rendered on this page, in render order.
    #[must_use]
    pub fn loaded(&self) -> &[Cta] {
        &self.loaded
    }

    #[must_use]
    pub fn keyframes_emitted(&self) -> bool {
        self.keyframes_emitted
    }

    /// Record `cta` as loaded. Returns `false` if its id was already seen.
    pub fn record(&mut self, cta: &Cta) -> bool {
        if !self.seen.insert(cta.id.clone()) {
            return false;
        }
        self.loaded.push(cta.clone());
        true
    }

    /// Render `cta` and record it. The keyframes block precedes the first
    /// animated CTA on the page.
    pub fn render(&mut self, cta: &Cta) -> String {
        let rendered = render_cta(cta);
        self.record(cta);
        if rendered.animation.is_some() && !self.keyframes_emitted {
            self.keyframes_emitted = true;
            return format!("{KEYFRAMES}{}", rendered.html);
        }
        rendered.html
    }

    /// `<script>` exposing the loaded CTAs to client-side code.
    #[must_use]
    pub fn loaded_script(&self) -> String {
        let json = serde_json::to_string(&self.loaded).unwrap_or_else(|_| "[]".to_owned());
        // `</script>` inside a string must not close the element.
        let json = json.replace('<', "\\u003c");
        format!("<script>window.forgeCTAsLoaded = {json};</script>")
    }
}

fn log_lookup_failure(slug: &str, err: &CtaError) {
    if !matches!(err, CtaError::NotFound { .. }) {
        warn!(slug, error = %err, "CTA lookup failed");
    }
}

fn connection_debug_box(settings: &ConnectionSettings) -> String {
    let site_id = settings.forge_site_id.as_deref().unwrap_or("(not set)");
    let key = if settings.connection_key.is_empty() {
        "(not set)"
    } else {
        "(set)"
    };
    format!(
        "<div style=\"padding:20px;background:#fee;border:1px solid #c00;margin:10px 0;font-size:12px;\">\
         <strong>Forge CTA Debug:</strong> Connection issue<br>\
         connected: {}<br>\
         forge_site_id: {}<br>\
         connection_key: {key}<br>\
         <br><strong>Fix:</strong> Try disconnecting and reconnecting in the Forge Connector settings.\
         </div>",
        settings.connected,
        esc_html(site_id),
    )
}

/// Expand a `[forge_cta]` shortcode.
///
/// Never fails: problems become HTML comments, or a visible debug box when
/// `attrs.debug` or `global_debug` is set.
pub async fn render_shortcode(
    page: &mut CtaPage,
    attrs: &ShortcodeAttrs,
    settings: &ConnectionSettings,
    source: &dyn CtaSource,
    global_debug: bool,
) -> String {
    let debug = attrs.debug_enabled() || global_debug;

    if attrs.id.is_empty() {
        return "<!-- Forge CTA: No ID specified -->".to_owned();
    }

    let Some(creds) = CtaCredentials::from_settings(settings) else {
        if debug {
            return connection_debug_box(settings);
        }
        return "<!-- Forge CTA: Not connected to Forge -->".to_owned();
    };

    let mut out = String::new();
    if debug {
        let _ = write!(
            out,
            "<div style=\"padding:20px;background:#eff;border:1px solid #09c;margin:10px 0;font-size:12px;\">\
             <strong>Forge CTA Debug:</strong><br>Slug: {}<br>Site ID: {}<br>",
            esc_html(&attrs.id),
            esc_html(creds.site_id),
        );
    }

    let cta = match source.fetch_by_slug(creds, &attrs.id).await {
        Ok(cta) => cta,
        Err(err) => {
            log_lookup_failure(&attrs.id, &err);
            if debug {
                let _ = write!(
                    out,
                    "Status: <span style=\"color:red;\">CTA not found</span><br>API URL: {}<br></div>",
                    esc_html(&source.lookup_url(&attrs.id)),
                );
                return out;
            }
            return format!(
                "<!-- Forge CTA: CTA not found for slug: {} -->",
                esc_html(&attrs.id)
            );
        }
    };

    if debug {
        let _ = write!(
            out,
            "Status: <span style=\"color:green;\">Found</span><br>\
             CTA ID: {}<br>Type: {}<br>Headline: {}<br>Button: {}<br></div>",
            esc_html(&cta.id),
            esc_html(cta.kind.as_str()),
            esc_html(&cta.content.headline),
            esc_html(&cta.content.button_text),
        );
    }

    out.push_str(&page.render(&cta));
    out
}

/// Render the site-wide CTAs not already on `page`, followed by the loaded
/// CTA script. Empty when the site is not connected or has none.
pub async fn render_site_ctas(
    page: &mut CtaPage,
    settings: &ConnectionSettings,
    source: &dyn CtaSource,
) -> String {
    let Some(creds) = CtaCredentials::from_settings(settings) else {
        return String::new();
    };

    let ctas = match source.fetch_site_ctas(creds).await {
        Ok(ctas) => ctas,
        Err(err) => {
            warn!(error = %err, "site-wide CTA lookup failed");
            return String::new();
        }
    };
    if ctas.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    for cta in &ctas {
        if !page.contains(&cta.id) {
            out.push_str(&page.render(cta));
        }
    }
    out.push_str(&page.loaded_script());
    out
}

/// Where the click and impression tracker lives and where it reports to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Forge API base URL the tracker posts events to.
    pub api_url: String,
    /// Public URL of the tracker script.
    pub script_url: String,
    pub debug: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrackerGlobals<'a> {
    api_url: &'a str,
    site_id: &'a str,
    debug: bool,
}

/// The `window.forgeCTA` globals and the tracker `<script>` tag.
///
/// Empty unless the site is connected and has a Forge site id.
#[must_use]
pub fn tracker_script(settings: &ConnectionSettings, tracker: &TrackerConfig) -> String {
    let Some(creds) = CtaCredentials::from_settings(settings) else {
        return String::new();
    };
    let globals = TrackerGlobals {
        api_url: &tracker.api_url,
        site_id: creds.site_id,
        debug: tracker.debug,
    };
    let json = serde_json::to_string(&globals)
        .unwrap_or_else(|_| "{}".to_owned())
        .replace('<', "\\u003c");
    format!(
        "<script>window.forgeCTA = {json};</script><script src=\"{}\" defer></script>",
        esc_url(&tracker.script_url)
    )
}

/// Put the CTAs a page already placed by shortcode back on `page`.
///
/// Each slug is looked up so the loaded script carries its data. A slug that
/// cannot be looked up still counts as rendered.
pub async fn restore_loaded<'s, I>(
    page: &mut CtaPage,
    slugs: I,
    settings: &ConnectionSettings,
    source: &dyn CtaSource,
) where
    I: IntoIterator<Item = &'s str>,
{
    let creds = CtaCredentials::from_settings(settings);
    for slug in slugs {
        if let Some(creds) = creds {
            match source.fetch_by_slug(creds, slug).await {
                Ok(cta) => {
                    page.record(&cta);
                }
                Err(err) => {
                    debug!(slug, error = %err, "placed CTA could not be restored");
                }
            }
        }
        page.mark_rendered(slug);
    }
}
