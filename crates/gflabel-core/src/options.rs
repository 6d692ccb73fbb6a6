#![forbid(unsafe_code)]

//! Render configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How label contents are formed relative to the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStyle {
    /// Contents stand proud of the label surface.
    #[default]
    Embossed,
    /// Contents are cut into the label surface.
    Debossed,
}

impl fmt::Display for LabelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embossed => write!(f, "embossed"),
            Self::Debossed => write!(f, "debossed"),
        }
    }
}

impl FromStr for LabelStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "embossed" => Ok(Self::Embossed),
            "debossed" => Ok(Self::Debossed),
            other => Err(format!(
                "unknown label style '{other}' (expected embossed or debossed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
    Italic,
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::Bold => write!(f, "bold"),
            Self::Italic => write!(f, "italic"),
        }
    }
}

impl FromStr for FontStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "bold" => Ok(Self::Bold),
            "italic" => Ok(Self::Italic),
            other => Err(format!(
                "unknown font style '{other}' (expected regular, bold or italic)"
            )),
        }
    }
}

/// How the content size of a line is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "mm", rename_all = "lowercase")]
pub enum FontSizing {
    /// Largest size that fits the line box.
    #[default]
    Auto,
    /// Exactly this size in mm. Skips fitting and may overflow.
    Fixed(f64),
    /// Largest size that fits, but never above this many mm.
    Maximum(f64),
}

impl FontSizing {
    /// Upper bound imposed on the line size, if any.
    pub fn ceiling(&self) -> Option<f64> {
        match *self {
            Self::Auto => None,
            Self::Fixed(mm) | Self::Maximum(mm) => Some(mm),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontOptions {
    /// Font family name.
    pub family: String,
    pub style: FontStyle,
    /// Explicit font file, overriding family lookup.
    pub path: Option<PathBuf>,
    pub sizing: FontSizing,
}

impl FontOptions {
    /// Family used when nothing else is configured.
    pub const DEFAULT_FAMILY: &'static str = "Open Sans";

    /// Size in mm a fragment given `available` mm of height should use for text.
    pub fn allowed_height(&self, available: f64) -> f64 {
        match self.sizing {
            FontSizing::Auto => available,
            FontSizing::Fixed(mm) => mm,
            FontSizing::Maximum(mm) => available.min(mm),
        }
    }
}

impl Default for FontOptions {
    fn default() -> Self {
        Self {
            family: Self::DEFAULT_FAMILY.to_string(),
            style: FontStyle::Regular,
            path: None,
            sizing: FontSizing::Auto,
        }
    }
}

/// Options that drive a single label render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// Vertical gap between lines inside a column.
    pub line_spacing_mm: f64,
    /// Margin left around the label contents on every side.
    pub margin_mm: f64,
    /// Horizontal gap between columns.
    pub column_gap_mm: f64,
    pub font: FontOptions,
    /// Pre-shrink siblings of overheight fragments on the same line.
    pub allow_overheight: bool,
    pub style: LabelStyle,
    /// Extrusion depth of the label contents.
    pub depth_mm: f64,
}

impl RenderOptions {
    /// Z offset of content placements for the configured style.
    pub fn content_z(&self) -> f64 {
        match self.style {
            LabelStyle::Embossed => 0.0,
            LabelStyle::Debossed => -self.depth_mm,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            line_spacing_mm: 0.1,
            margin_mm: 0.4,
            column_gap_mm: 0.4,
            font: FontOptions::default(),
            allow_overheight: true,
            style: LabelStyle::Embossed,
            depth_mm: 0.4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_height_follows_sizing() {
        let mut font = FontOptions::default();
        assert_eq!(font.allowed_height(8.0), 8.0);
        font.sizing = FontSizing::Maximum(5.0);
        assert_eq!(font.allowed_height(8.0), 5.0);
        assert_eq!(font.allowed_height(3.0), 3.0);
        font.sizing = FontSizing::Fixed(12.0);
        assert_eq!(font.allowed_height(3.0), 12.0);
    }

    #[test]
    fn styles_parse_case_insensitively() {
        assert_eq!("DEBOSSED".parse::<LabelStyle>(), Ok(LabelStyle::Debossed));
        assert_eq!("Bold".parse::<FontStyle>(), Ok(FontStyle::Bold));
        assert!("shiny".parse::<LabelStyle>().is_err());
    }

    #[test]
    fn content_z_depends_on_style() {
        let mut options = RenderOptions::default();
        assert_eq!(options.content_z(), 0.0);
        options.style = LabelStyle::Debossed;
        assert_eq!(options.content_z(), -0.4);
    }

    #[test]
    fn sizing_serializes_with_mode_tag() {
        let json = serde_json::to_string(&FontSizing::Maximum(4.5)).unwrap();
        assert_eq!(json, r#"{"mode":"maximum","mm":4.5}"#);
        let auto = serde_json::to_string(&FontSizing::Auto).unwrap();
        assert_eq!(auto, r#"{"mode":"auto"}"#);
    }
}
