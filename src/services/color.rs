//! Team colour resolution.
//!
//! Upstream places a rider's display colour in different spots depending on
//! the season: an explicit field, a nested team object, inline style markup,
//! or just a hex literal somewhere in the payload. The resolver tries them in
//! a fixed order and always returns a printable colour token.

use std::sync::LazyLock;

use regex::Regex;

use crate::services::motogp::ColorHint;

/// Neutral gray used when no colour can be found.
pub const DEFAULT_COLOR: &str = "#ddd";

static BORDER_LEFT_HEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"border-left\s*:\s*\d+px\s+solid\s+(#[0-9A-Fa-f]{6})").expect("valid regex")
});

static BORDER_LEFT_RGB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)border-left\s*:\s*\d+px\s+solid\s+rgb\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\)",
    )
    .expect("valid regex")
});

static BACKGROUND_HEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"background-color\s*:\s*(#[0-9A-Fa-f]{6})").expect("valid regex")
});

static BACKGROUND_RGB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)background-color\s*:\s*rgb\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\)")
        .expect("valid regex")
});

static HEX_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[0-9A-Fa-f]{6}").expect("valid regex"));

/// First `#RRGGBB` capture, else the first `rgb(r,g,b)` capture normalised
/// to `rgb(r,g,b)` without spaces.
fn match_hex_or_rgb(hex: &Regex, rgb: &Regex, style: &str) -> Option<String> {
    if let Some(caps) = hex.captures(style) {
        return Some(caps[1].to_string());
    }
    let caps = rgb.captures(style)?;
    let r: u32 = caps[1].parse().ok()?;
    let g: u32 = caps[2].parse().ok()?;
    let b: u32 = caps[3].parse().ok()?;
    Some(format!("rgb({},{},{})", r, g, b))
}

/// Colour of a `border-left: <n>px solid <colour>` declaration.
pub fn extract_border_left(style: &str) -> Option<String> {
    match_hex_or_rgb(&BORDER_LEFT_HEX, &BORDER_LEFT_RGB, style)
}

/// Colour of a `background-color: <colour>` declaration.
pub fn extract_background_color(style: &str) -> Option<String> {
    match_hex_or_rgb(&BACKGROUND_HEX, &BACKGROUND_RGB, style)
}

/// First bare `#RRGGBB` literal anywhere in the text.
pub fn extract_hex_anywhere(text: &str) -> Option<String> {
    HEX_ANYWHERE.find(text).map(|m| m.as_str().to_string())
}

/// Resolve the display colour for one classification entry.
///
/// Order: explicit colour fields, `border-left` in the style markup,
/// `background-color` in the style markup, any hex literal in the entry,
/// then [`DEFAULT_COLOR`].
pub fn resolve_color(hint: &ColorHint) -> String {
    let explicit = [&hint.team_color, &hint.rider_color, &hint.nested_team_color]
        .into_iter()
        .flatten()
        .find(|c| !c.trim().is_empty());
    if let Some(color) = explicit {
        return color.clone();
    }

    if let Some(style) = hint.style.as_deref().filter(|s| !s.is_empty()) {
        if let Some(color) = extract_border_left(style) {
            return color;
        }
        if let Some(color) = extract_background_color(style) {
            return color;
        }
    }

    extract_hex_anywhere(&hint.raw_text).unwrap_or_else(|| DEFAULT_COLOR.to_string())
}
