//! # Palette
//!
//! Maps piece roles to terminal styles. Every colour is either a point in
//! the 6x6x6 colour cube or one of the 16 basic colours, so the client
//! looks the same on any 256-colour terminal.
//!
//! Two tables exist: one for the compact feed row, one for the detail
//! panel. Both start from built-in defaults and take per-role overrides
//! from the `[colors]` config section.

use std::collections::HashMap;

use log::warn;
use ratatui::style::{Color, Modifier, Style};

use crate::core::config::{ColorSpec, ColorsConfig, StyleSpec};
use crate::core::images::{ImageSummary, Rgb};
use crate::core::pieces::{Glyph, PieceRole};

/// Colour cube entry; each channel 0..=5.
pub fn cube(r: u8, g: u8, b: u8) -> Color {
    Color::Indexed(16 + 36 * r.min(5) + 6 * g.min(5) + b.min(5))
}

/// Basic colour from red/green/blue bits plus the bright bit.
pub fn basic(r: u8, g: u8, b: u8, bright: u8) -> Color {
    Color::Indexed((r & 1) + 2 * (g & 1) + 4 * (b & 1) + 8 * (bright & 1))
}

/// HSV (all components 0..=1) snapped to the colour cube.
pub fn hsv(h: f32, s: f32, v: f32) -> Color {
    let channel = |offset: f32, sign: f32, bias: f32| {
        let f = (sign * (h * 6.0 - offset).abs() + bias).clamp(0.0, 1.0);
        (((f - 1.0) * s + 1.0) * v * 5.0).round() as u8
    };
    cube(
        channel(3.0, 1.0, -1.0),
        channel(2.0, -1.0, 2.0),
        channel(4.0, -1.0, 2.0),
    )
}

/// Cube colour closest to an avatar colour, lifted so it never goes black.
pub fn avatar_color(rgb: Rgb) -> Color {
    let level = |c: u8| (((c as f32 / 255.0) * 0.89 + 0.11) * 5.0).round() as u8;
    cube(level(rgb[0]), level(rgb[1]), level(rgb[2]))
}

/// Username colour when no avatar summary is cached.
pub const FALLBACK_USERNAME: Color = Color::Indexed(8);

/// Dim grey used for chrome (markers, labels).
pub const CHROME: Color = Color::Indexed(8);

/// Style of cell `index` of a username, tinted by its author's avatar.
pub fn username_style(summary: Option<&ImageSummary>, index: usize, modifiers: Modifier) -> Style {
    let fg = summary.map_or(FALLBACK_USERNAME, |s| avatar_color(s.color_at(index)));
    Style::default().fg(fg).add_modifier(modifiers)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleStyle {
    /// Not drawn at all
    Hidden,
    /// Per-cell avatar tint plus the given attributes
    Username(Modifier),
    /// A row break in the detail panel; drawn with the style in the feed
    Whitespace(Style),
    Plain(Style),
}

/// Config key for a role.
pub fn role_name(role: PieceRole) -> &'static str {
    match role {
        PieceRole::MentionUsername => "mention_username",
        PieceRole::Hashtag => "hashtag",
        PieceRole::LinkDomain => "link_domain",
        PieceRole::LinkRoute => "link_route",
        PieceRole::Media => "media",
        PieceRole::RepostMarker => "retweet_marker",
        PieceRole::RepostUsername => "retweet_username",
        PieceRole::TextNormal => "text_normal",
        PieceRole::TextMention => "text_mention",
        PieceRole::TextOwnPost => "text_own_tweet",
        PieceRole::TextRepost => "text_retweet",
        PieceRole::Whitespace(_) => "whitespace",
        PieceRole::Placeholder => "placeholder",
    }
}

const ROLES: [PieceRole; 13] = [
    PieceRole::MentionUsername,
    PieceRole::Hashtag,
    PieceRole::LinkDomain,
    PieceRole::LinkRoute,
    PieceRole::Media,
    PieceRole::RepostMarker,
    PieceRole::RepostUsername,
    PieceRole::TextNormal,
    PieceRole::TextMention,
    PieceRole::TextOwnPost,
    PieceRole::TextRepost,
    PieceRole::Whitespace(Glyph::Newline),
    PieceRole::Placeholder,
];

fn plain(fg: Color) -> RoleStyle {
    RoleStyle::Plain(Style::default().fg(fg))
}

fn default_style(role: PieceRole) -> RoleStyle {
    match role {
        PieceRole::Hashtag => plain(cube(3, 3, 5)),
        PieceRole::LinkDomain => plain(basic(1, 1, 1, 0)),
        PieceRole::LinkRoute => plain(basic(0, 0, 0, 1)),
        PieceRole::Media => plain(basic(1, 1, 1, 0)),
        PieceRole::MentionUsername | PieceRole::RepostUsername => {
            RoleStyle::Username(Modifier::empty())
        }
        PieceRole::RepostMarker => plain(cube(0, 5, 0)),
        PieceRole::TextMention => plain(cube(5, 4, 3)),
        PieceRole::TextNormal => plain(basic(1, 1, 1, 1)),
        PieceRole::TextOwnPost => plain(cube(3, 5, 5)),
        PieceRole::TextRepost => plain(cube(3, 5, 3)),
        PieceRole::Whitespace(_) | PieceRole::Placeholder => plain(basic(0, 0, 0, 1)),
    }
}

fn default_detail_style(role: PieceRole) -> RoleStyle {
    let white = basic(1, 1, 1, 1);
    let underlined = |fg: Color| {
        RoleStyle::Plain(
            Style::default()
                .fg(fg)
                .add_modifier(Modifier::UNDERLINED),
        )
    };
    match role {
        PieceRole::Hashtag => underlined(cube(3, 3, 5)),
        PieceRole::LinkDomain | PieceRole::LinkRoute => underlined(white),
        PieceRole::MentionUsername => RoleStyle::Username(Modifier::UNDERLINED),
        PieceRole::RepostMarker | PieceRole::RepostUsername => RoleStyle::Hidden,
        PieceRole::TextMention
        | PieceRole::TextNormal
        | PieceRole::TextOwnPost
        | PieceRole::TextRepost => plain(white),
        PieceRole::Whitespace(_) => {
            RoleStyle::Whitespace(Style::default().fg(basic(0, 0, 0, 1)))
        }
        other => default_style(other),
    }
}

fn modifiers(spec: &StyleSpec) -> Modifier {
    let mut m = Modifier::empty();
    if spec.bold {
        m |= Modifier::BOLD;
    }
    if spec.underline {
        m |= Modifier::UNDERLINED;
    }
    if spec.reverse {
        m |= Modifier::REVERSED;
    }
    m
}

fn from_spec(spec: &ColorSpec, fallback: RoleStyle) -> Option<RoleStyle> {
    match spec {
        ColorSpec::Keyword(word) => match word.as_str() {
            "none" => Some(RoleStyle::Hidden),
            "username" => Some(RoleStyle::Username(Modifier::empty())),
            "whitespace" => Some(RoleStyle::Whitespace(match fallback {
                RoleStyle::Plain(s) | RoleStyle::Whitespace(s) => s,
                _ => Style::default(),
            })),
            _ => None,
        },
        ColorSpec::Style(style) => {
            let fg = match (style.cube, style.basic) {
                (Some([r, g, b]), _) => Some(cube(r, g, b)),
                (None, Some(n)) => Some(Color::Indexed(n.min(15))),
                (None, None) => None,
            };
            let mut out = Style::default().add_modifier(modifiers(style));
            if let Some(fg) = fg {
                out = out.fg(fg);
            }
            Some(RoleStyle::Plain(out))
        }
    }
}

#[derive(Debug, Clone)]
pub struct Palette {
    column: HashMap<&'static str, RoleStyle>,
    detail: HashMap<&'static str, RoleStyle>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_config(&ColorsConfig::default())
    }
}

impl Palette {
    pub fn from_config(config: &ColorsConfig) -> Self {
        let mut column = HashMap::new();
        let mut detail = HashMap::new();
        for role in ROLES {
            let name = role_name(role);
            let base = default_style(role);
            let base_detail = default_detail_style(role);
            column.insert(name, resolve(&config.column, name, base));
            detail.insert(name, resolve(&config.detail, name, base_detail));
        }
        Self { column, detail }
    }

    /// Style for a piece in a feed row.
    pub fn column(&self, role: PieceRole) -> RoleStyle {
        self.column
            .get(role_name(role))
            .copied()
            .unwrap_or_else(|| default_style(role))
    }

    /// Style for a piece in the detail panel.
    pub fn detail(&self, role: PieceRole) -> RoleStyle {
        self.detail
            .get(role_name(role))
            .copied()
            .unwrap_or_else(|| default_detail_style(role))
    }
}

fn resolve(
    overrides: &std::collections::BTreeMap<String, ColorSpec>,
    name: &str,
    fallback: RoleStyle,
) -> RoleStyle {
    match overrides.get(name) {
        Some(spec) => from_spec(spec, fallback).unwrap_or_else(|| {
            warn!("Unknown colour keyword for {name}: {spec:?}");
            fallback
        }),
        None => fallback,
    }
}
