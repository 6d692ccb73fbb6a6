#![forbid(unsafe_code)]

//! Screw drive and bolt feature vocabularies.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// A screw drive recess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Drive {
    Phillips,
    Pozidrive,
    Slot,
    Hex,
    Cross,
    Square,
    Triangle,
    Torx,
    /// Security pin, drawn as a boss rather than a cut.
    Security,
    PhillipsSlot,
}

impl Drive {
    pub const ALL: [Drive; 10] = [
        Drive::Phillips,
        Drive::Pozidrive,
        Drive::Slot,
        Drive::Hex,
        Drive::Cross,
        Drive::Square,
        Drive::Triangle,
        Drive::Torx,
        Drive::Security,
        Drive::PhillipsSlot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phillips => "phillips",
            Self::Pozidrive => "pozidrive",
            Self::Slot => "slot",
            Self::Hex => "hex",
            Self::Cross => "cross",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Torx => "torx",
            Self::Security => "security",
            Self::PhillipsSlot => "phillipsslot",
        }
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Drive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let canonical = match lowered.as_str() {
            "+" => "phillips",
            "posidrive" | "posi" | "pozi" => "pozidrive",
            "-" => "slot",
            "tri" => "triangle",
            other => other,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|drive| drive.as_str() == canonical)
            .ok_or_else(|| format!("unknown drive '{}'", s.trim()))
    }
}

/// Parse a list of drive names, keeping first-seen order and dropping
/// repeats.
pub fn parse_drives<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Vec<Drive>, String> {
    let mut drives = Vec::new();
    for name in names {
        let drive = name.parse::<Drive>()?;
        if !drives.contains(&drive) {
            drives.push(drive);
        }
    }
    Ok(drives)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadShape {
    Countersunk,
    #[default]
    Pan,
    Round,
    Socket,
}

impl HeadShape {
    fn from_feature(feature: &str) -> Option<Self> {
        match feature {
            "countersunk" | "countersink" => Some(Self::Countersunk),
            "pan" => Some(Self::Pan),
            "round" => Some(Self::Round),
            "socket" | "square" => Some(Self::Socket),
            _ => None,
        }
    }
}

/// Resolved bolt description shared by `bolt` and `webbolt`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BoltSpec {
    /// Shaft length in mm. `webbolt` is drawn at a fixed length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_mm: Option<f64>,
    pub head: HeadShape,
    pub drives: Vec<Drive>,
    pub tapping: bool,
    pub flip: bool,
    pub partial: bool,
    pub slotted: bool,
    pub flanged: bool,
}

impl BoltSpec {
    /// Sort free-form features into head shape, modifiers and drives.
    ///
    /// `allow_body_features` enables `slotted` and `flanged`, which only the
    /// side-profile bolt draws.
    pub fn from_features<'a>(
        features: impl IntoIterator<Item = &'a str>,
        allow_body_features: bool,
    ) -> Result<Self, String> {
        let mut spec = BoltSpec::default();
        let mut head = None;
        let mut drive_names = Vec::new();

        for raw in features {
            let feature = raw.trim().to_ascii_lowercase();
            if let Some(shape) = HeadShape::from_feature(&feature) {
                match head {
                    Some(existing) if existing != shape => {
                        return Err("more than one head shape specified".to_string());
                    }
                    _ => head = Some(shape),
                }
                continue;
            }
            match feature.as_str() {
                "tapping" | "tap" | "tapped" => spec.tapping = true,
                "flip" | "flipped" => spec.flip = true,
                "partial" => spec.partial = true,
                "slotted" | "slot" if allow_body_features => spec.slotted = true,
                "flanged" | "flange" if allow_body_features => spec.flanged = true,
                _ => drive_names.push(raw),
            }
        }

        spec.head = head.unwrap_or_default();
        spec.drives = parse_drives(drive_names)?;
        Ok(spec)
    }
}
