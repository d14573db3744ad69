//! CTA to HTML.
//!
//! Output must match the Forge editor preview. Every container resets
//! inherited theme styles with `all:initial`, and every style is inline so
//! the markup can be dropped into any page.

use super::model::{Cta, CtaContent, CtaStyle, CtaType};
use super::style::{self, Animation, ShadowSpec, StyleList, num, px};
use crate::sanitize::{esc_attr, esc_html, esc_url};

const FONT_STACK: &str =
    "-apple-system, BlinkMacSystemFont, \"Segoe UI\", Roboto, \"Helvetica Neue\", Arial, sans-serif";

const DOWNLOAD_ICON_PATHS: &str = "<path d=\"M21 15v4a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2v-4\"></path>\
<polyline points=\"7 10 12 15 17 10\"></polyline><line x1=\"12\" y1=\"15\" x2=\"12\" y2=\"3\"></line>";

const PHONE_ICON_PATH: &str = "<path d=\"M22 16.92v3a2 2 0 0 1-2.18 2 19.79 19.79 0 0 1-8.63-3.07 \
19.5 19.5 0 0 1-6-6 19.79 19.79 0 0 1-3.07-8.67A2 2 0 0 1 4.11 2h3a2 2 0 0 1 2 1.72 12.84 12.84 0 0 0 \
.7 2.81 2 2 0 0 1-.45 2.11L8.09 9.91a16 16 0 0 0 6 6l1.27-1.27a2 2 0 0 1 2.11-.45 12.84 12.84 0 0 0 \
2.81.7A2 2 0 0 1 22 16.92z\"></path>";

/// Output of [`render_cta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCta {
    pub html: String,
    /// Set when the markup references the animation keyframes.
    pub animation: Option<Animation>,
}

/// Render `cta` to self-contained HTML.
#[must_use]
pub fn render_cta(cta: &Cta) -> RenderedCta {
    let shadow = ShadowSpec::from_style(&cta.style).css();
    let animation = Animation::parse(&cta.style.animation);
    let ctx = Frame {
        id: &cta.id,
        content: &cta.content,
        style: &cta.style,
        shadow: shadow.as_deref(),
        animation,
    };

    let mut html = match cta.kind {
        CtaType::Banner => ctx.banner(),
        CtaType::FloatingBar => ctx.floating_bar(),
        CtaType::Popup => ctx.popup(),
        CtaType::Other(_) => String::new(),
    };

    if !cta.style.custom_css.is_empty() {
        html.push_str(&format!(
            "<style>.forge-cta[data-cta-id=\"{}\"] {{ {} }}</style>",
            esc_attr(&cta.id),
            esc_html(&cta.style.custom_css)
        ));
    }

    RenderedCta { html, animation }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonRole {
    Primary,
    Secondary,
}

impl ButtonRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Everything a layout needs, resolved once.
struct Frame<'a> {
    id: &'a str,
    content: &'a CtaContent,
    style: &'a CtaStyle,
    shadow: Option<&'a str>,
    animation: Option<Animation>,
}

impl Frame<'_> {
    /// Reset and typography shared by every container.
    fn isolated() -> StyleList {
        StyleList::new()
            .with("all", "initial")
            .with("box-sizing", "border-box")
            .with("font-family", FONT_STACK)
            .with("font-size", "16px")
            .with("line-height", "1.5")
    }

    fn decorate(&self, container: &mut StyleList) {
        if let Some(shadow) = self.shadow {
            container.set("box-shadow", shadow);
        }
        if let Some(animation) = self.animation {
            container.set("animation", animation.css());
        }
    }

    fn open_container(&self, kind: &str, container: &StyleList) -> String {
        format!(
            "<div class=\"forge-cta forge-cta-{kind}\" data-cta-id=\"{}\" data-cta-type=\"{kind}\" style=\"{}\">",
            esc_attr(self.id),
            container.to_attr()
        )
    }

    fn banner(&self) -> String {
        let (content, style) = (self.content, self.style);
        let horizontal = style.layout == "horizontal";
        let has_image = !content.image_url.is_empty();
        let image_position = content.image_position.as_str();
        let padding_y = style.padding_y.unwrap_or(style.padding);
        let padding_x = style.padding_x.unwrap_or(style.padding);

        let mut container = StyleList::new()
            .with("all", "initial")
            .with("display", "block")
            .with("box-sizing", "border-box")
            .with("font-family", FONT_STACK)
            .with("font-size", "16px")
            .with("line-height", "1.5")
            .with("background-color", style.background.as_str())
            .with("color", style.text_color.as_str())
            .with("border-radius", px(style.border_radius))
            .with("padding", format!("{} {}", px(padding_y), px(padding_x)))
            .with("width", "100%")
            .with("max-width", "100%")
            .with("position", "relative")
            .with("overflow", "hidden")
            .with("margin", "1em 0");
        if style.border_width > 0.0 {
            container.set(
                "border",
                format!("{} solid {}", px(style.border_width), style.border_color),
            );
        }
        self.decorate(&mut container);

        let mut html = self.open_container("banner", &container);

        if let Some(pattern) = style::background_pattern(style) {
            let mut overlay = StyleList::new()
                .with("position", "absolute")
                .with("inset", "0")
                .with("pointer-events", "none");
            overlay.extend(&pattern);
            html.push_str(&format!("<div style=\"{}\"></div>", overlay.to_attr()));
        }

        if has_image && image_position == "background" {
            let mut img = StyleList::new()
                .with("position", "absolute")
                .with("top", "0")
                .with("left", "0")
                .with("width", "100%")
                .with("height", "100%")
                .with("object-fit", content.image_fit.as_str())
                .with("z-index", "0");
            if let Some(scale) = self.image_scale() {
                img.set("transform", scale);
            }
            html.push_str(&self.img_tag(&img));
            html.push_str(
                "<div style=\"position:absolute;inset:0;background:rgba(0,0,0,0.4);z-index:1;\"></div>",
            );
        }

        let wrapper = StyleList::new()
            .with("position", "relative")
            .with("z-index", "10");

        if has_image && image_position == "top" {
            html.push_str(&format!("<div style=\"{}\">", wrapper.to_attr()));
            html.push_str(&self.image("top"));
            html.push_str("<div style=\"margin-top:16px;\">");
            html.push_str(&self.banner_content(false));
            html.push_str("</div></div>");
        } else if has_image && matches!(image_position, "left" | "right") {
            let direction = if image_position == "right" { "row-reverse" } else { "row" };
            let mut row = StyleList::new()
                .with("display", "flex")
                .with("gap", "24px")
                .with("align-items", "center")
                .with("flex-direction", direction);
            row.extend(&wrapper);
            html.push_str(&format!("<div style=\"{}\">", row.to_attr()));
            html.push_str(&self.image(image_position));
            html.push_str("<div style=\"flex:1;\">");
            html.push_str(&self.banner_content(horizontal));
            html.push_str("</div></div>");
        } else {
            html.push_str(&format!("<div style=\"{}\">", wrapper.to_attr()));
            html.push_str(&self.banner_content(horizontal));
            html.push_str("</div>");
        }

        if !content.fine_print.is_empty() {
            html.push_str(
                "<p style=\"font-size:10px;opacity:0.5;margin:12px 0 0 0;position:relative;z-index:10;\">",
            );
            html.push_str(&esc_html(&content.fine_print));
            html.push_str("</p>");
        }

        html.push_str("</div>");
        html
    }

    /// `scale(...)` when the image is zoomed.
    fn image_scale(&self) -> Option<String> {
        let scale = self.content.image_scale;
        let unscaled = scale.abs() < f64::EPSILON || (scale - 100.0).abs() < f64::EPSILON;
        (!unscaled).then(|| format!("scale({})", num(scale / 100.0)))
    }

    fn img_tag(&self, styles: &StyleList) -> String {
        format!(
            "<img src=\"{}\" alt=\"{}\" style=\"{}\" />",
            esc_url(&self.content.image_url),
            esc_attr(&self.content.image_alt),
            styles.to_attr()
        )
    }

    fn image(&self, position: &str) -> String {
        if self.content.image_url.is_empty() {
            return String::new();
        }
        let mut img = StyleList::new()
            .with("display", "block")
            .with("object-fit", self.content.image_fit.as_str());
        match position {
            "top" => {
                img.set("width", "100%");
                img.set("max-height", "200px");
                img.set("border-radius", "8px");
            }
            "left" | "right" => {
                img.set("width", "128px");
                img.set("height", "128px");
                img.set("border-radius", "8px");
                img.set("flex-shrink", "0");
            }
            _ => {}
        }
        if let Some(scale) = self.image_scale() {
            img.set("transform", scale);
        }
        self.img_tag(&img)
    }

    /// Eyebrow, headline and text beside (or above) the buttons.
    fn banner_content(&self, horizontal: bool) -> String {
        let (content, style) = (self.content, self.style);

        let mut flex = StyleList::new()
            .with("display", "flex")
            .with("gap", px(style.gap));
        if horizontal {
            flex.set("align-items", "center");
            flex.set("justify-content", "space-between");
            flex.set("flex-wrap", "wrap");
        } else {
            flex.set("flex-direction", "column");
            flex.set("text-align", "center");
            flex.set("align-items", "center");
        }

        let mut html = format!("<div style=\"{}\">", flex.to_attr());
        html.push_str(if horizontal {
            "<div style=\"\">"
        } else {
            "<div style=\"text-align:center;\">"
        });

        if !content.eyebrow_text.is_empty() {
            html.push_str(
                "<span style=\"display:block;font-size:12px;font-weight:500;text-transform:uppercase;\
                 letter-spacing:0.05em;opacity:0.7;margin-bottom:4px;\">",
            );
            html.push_str(&esc_html(&content.eyebrow_text));
            html.push_str("</span>");
        }

        if !content.headline.is_empty() {
            let color = if style.headline_color.is_empty() {
                &style.text_color
            } else {
                &style.headline_color
            };
            let headline = StyleList::new()
                .with("color", color.as_str())
                .with("margin", "0")
                .with("font-size", style::font_size(&style.headline_size))
                .with("font-weight", style::font_weight(&style.headline_weight))
                .with("line-height", "1.3");
            html.push_str(&format!(
                "<h3 style=\"{}\">{}</h3>",
                headline.to_attr(),
                esc_html(&content.headline)
            ));
        }

        if !content.text.is_empty() {
            let text = StyleList::new()
                .with("margin", "4px 0 0 0")
                .with("font-size", style::font_size(&style.text_size))
                .with("opacity", "0.9")
                .with("color", style.text_color.as_str());
            html.push_str(&format!(
                "<p style=\"{}\">{}</p>",
                text.to_attr(),
                esc_html(&content.text)
            ));
        }
        html.push_str("</div>");

        let mut buttons = StyleList::new()
            .with("display", "flex")
            .with("gap", px(style.gap))
            .with("align-items", "center")
            .with("flex-shrink", "0");
        if !horizontal {
            buttons.set("flex-direction", "column");
            buttons.set("width", "100%");
            buttons.set("margin-top", "16px");
        }
        html.push_str(&format!("<div style=\"{}\">", buttons.to_attr()));

        if !content.phone.is_empty() {
            let phone = StyleList::new()
                .with("display", "flex")
                .with("align-items", "center")
                .with("gap", "8px")
                .with("font-weight", "500")
                .with("white-space", "nowrap")
                .with("color", style.button_bg.as_str())
                .with("text-decoration", "none");
            let digits: String = content.phone.chars().filter(char::is_ascii_digit).collect();
            html.push_str(&format!(
                "<a href=\"tel:{}\" style=\"{}\">",
                esc_attr(&digits),
                phone.to_attr()
            ));
            if content.show_phone_icon {
                html.push_str(&phone_icon(&style.button_bg));
            }
            html.push_str(&esc_html(&content.phone));
            html.push_str("</a>");
        }

        if !content.button_text.is_empty() {
            html.push_str(&self.button(
                &content.button_text,
                &content.button_url,
                ButtonRole::Primary,
                &content.button_style,
                content.is_lead_magnet,
            ));
        }
        if !content.secondary_button_text.is_empty() {
            html.push_str(&self.button(
                &content.secondary_button_text,
                &content.secondary_button_url,
                ButtonRole::Secondary,
                &content.secondary_button_style,
                false,
            ));
        }

        html.push_str("</div></div>");
        html
    }

    fn floating_bar(&self) -> String {
        let (content, style) = (self.content, self.style);
        let edge = if style.position == "top" { "top" } else { "bottom" };

        let mut container = Self::isolated()
            .with("position", "fixed")
            .with("left", "0")
            .with("right", "0")
            .with(edge, "0")
            .with("z-index", "999999")
            .with("background-color", style.background.as_str())
            .with("color", style.text_color.as_str())
            .with("padding", "16px 24px")
            .with("display", "flex")
            .with("align-items", "center")
            .with("justify-content", "center")
            .with("gap", "16px")
            .with("flex-wrap", "wrap");
        self.decorate(&mut container);

        let mut html = self.open_container("floating-bar", &container);

        if !content.headline.is_empty() || !content.text.is_empty() {
            html.push_str("<div style=\"text-align:center;\">");
            if !content.headline.is_empty() {
                html.push_str(&format!(
                    "<strong style=\"color:{};\">{}</strong>",
                    esc_attr(&style.headline_color),
                    esc_html(&content.headline)
                ));
            }
            if !content.text.is_empty() {
                html.push_str(&format!(
                    "<span style=\"margin-left:8px;opacity:0.9;\">{}</span>",
                    esc_html(&content.text)
                ));
            }
            html.push_str("</div>");
        }

        if !content.button_text.is_empty() {
            html.push_str(&self.button(
                &content.button_text,
                &content.button_url,
                ButtonRole::Primary,
                "solid",
                content.is_lead_magnet,
            ));
        }

        if content.show_close_button {
            html.push_str(&format!(
                "<button class=\"forge-cta-close\" style=\"position:absolute;right:16px;top:50%;\
                 transform:translateY(-50%);background:none;border:none;font-size:20px;cursor:pointer;\
                 color:{};opacity:0.5;\" data-cta-close>&times;</button>",
                esc_attr(&style.text_color)
            ));
        }

        html.push_str("</div>");
        html
    }

    fn popup(&self) -> String {
        let (content, style) = (self.content, self.style);

        let mut html = String::from(
            "<div class=\"forge-cta-backdrop\" style=\"all:initial;position:fixed;top:0;left:0;\
             right:0;bottom:0;background:rgba(0,0,0,0.5);z-index:999999;\" data-cta-backdrop></div>",
        );

        let mut container = Self::isolated()
            .with("position", "fixed")
            .with("top", "50%")
            .with("left", "50%")
            .with("transform", "translate(-50%, -50%)")
            .with("z-index", "1000000")
            .with("max-width", "500px")
            .with("width", "90%")
            .with("background-color", style.background.as_str())
            .with("color", style.text_color.as_str())
            .with("border-radius", px(style.border_radius))
            .with("padding", px(style.padding));
        self.decorate(&mut container);

        html.push_str(&self.open_container("popup", &container));
        html.push_str(&format!(
            "<button class=\"forge-cta-close\" style=\"position:absolute;top:12px;right:12px;\
             background:none;border:none;font-size:24px;cursor:pointer;color:{};opacity:0.5;\" \
             data-cta-close>&times;</button>",
            esc_attr(&style.text_color)
        ));

        html.push_str("<div style=\"text-align:center;\">");
        if !content.headline.is_empty() {
            html.push_str(&format!(
                "<h3 style=\"color:{};margin:0 0 8px;font-size:{};font-weight:600;\">{}</h3>",
                esc_attr(&style.headline_color),
                style::font_size(&style.headline_size),
                esc_html(&content.headline)
            ));
        }
        if !content.text.is_empty() {
            html.push_str(&format!(
                "<p style=\"margin:0 0 16px;opacity:0.9;\">{}</p>",
                esc_html(&content.text)
            ));
        }

        html.push_str("<div style=\"display:flex;flex-direction:column;gap:12px;align-items:center;\">");
        if !content.button_text.is_empty() {
            html.push_str(&self.button(
                &content.button_text,
                &content.button_url,
                ButtonRole::Primary,
                "solid",
                content.is_lead_magnet,
            ));
        }
        if !content.secondary_button_text.is_empty() {
            html.push_str(&self.button(
                &content.secondary_button_text,
                &content.secondary_button_url,
                ButtonRole::Secondary,
                "outline",
                false,
            ));
        }
        html.push_str("</div></div></div>");
        html
    }

    /// A link styled as a button. `variant` is `solid`, `outline` or
    /// anything else for ghost; empty picks the role's default.
    fn button(
        &self,
        text: &str,
        url: &str,
        role: ButtonRole,
        variant: &str,
        download_icon: bool,
    ) -> String {
        if text.is_empty() {
            return String::new();
        }
        let style = self.style;
        let (bg, text_color, border_color) = match role {
            ButtonRole::Primary => (
                style.button_bg.as_str(),
                style.button_text_color.as_str(),
                if style.button_border_color.is_empty() {
                    style.button_bg.as_str()
                } else {
                    style.button_border_color.as_str()
                },
            ),
            ButtonRole::Secondary => (
                style.secondary_button_bg.as_str(),
                style.secondary_button_text_color.as_str(),
                style.secondary_button_border_color.as_str(),
            ),
        };
        let variant = match (variant, role) {
            ("", ButtonRole::Primary) => "solid",
            ("", ButtonRole::Secondary) => "outline",
            (other, _) => other,
        };

        let mut css = StyleList::new()
            .with("display", "inline-flex")
            .with("align-items", "center")
            .with("gap", "8px")
            .with("font-weight", "500")
            .with("text-decoration", "none")
            .with("white-space", "nowrap")
            .with("cursor", "pointer")
            .with("border-radius", px(style.button_radius))
            .with("padding", "10px 20px")
            .with("font-size", "14px")
            .with("line-height", "1.5")
            .with("text-align", "center")
            .with("transition", "all 0.2s ease")
            .with("font-family", "inherit");
        match variant {
            "solid" => {
                css.set("background-color", bg);
                css.set("color", text_color);
                css.set("border", format!("2px solid {border_color}"));
            }
            "outline" => {
                css.set("background-color", "transparent");
                css.set("color", border_color);
                css.set("border", format!("2px solid {border_color}"));
            }
            _ => {
                css.set("background-color", "transparent");
                css.set("color", border_color);
                css.set("border", "none");
            }
        }

        let role = role.as_str();
        let mut html = format!(
            "<a href=\"{}\" class=\"forge-cta-button forge-cta-button-{role}\" \
             data-cta-button=\"{role}\" style=\"{}\">",
            esc_url(url),
            css.to_attr()
        );
        if download_icon {
            html.push_str(&download_icon_svg(text_color));
        }
        html.push_str(&esc_html(text));
        html.push_str("</a>");
        html
    }
}

fn svg_icon(color: &str, body: &str) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"16\" height=\"16\" viewBox=\"0 0 24 24\" \
         fill=\"none\" stroke=\"{}\" stroke-width=\"2\" stroke-linecap=\"round\" \
         stroke-linejoin=\"round\" style=\"flex-shrink:0;\">{body}</svg>",
        esc_attr(color)
    )
}

fn download_icon_svg(color: &str) -> String {
    svg_icon(color, DOWNLOAD_ICON_PATHS)
}

fn phone_icon(color: &str) -> String {
    let mut icon = svg_icon(color, PHONE_ICON_PATH);
    icon.push(' ');
    icon
}
