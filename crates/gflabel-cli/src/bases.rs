#![forbid(unsafe_code)]

//! Base shapes and the label area each one leaves for content.
//!
//! Widths may be given in gridfinity units (`u`) or lengths (`mm`, `cm`,
//! `in`). A bare number takes the base's default unit.

use std::fmt;
use std::str::FromStr;

use gflabel_core::Size;
use serde::Serialize;

use crate::error::{CliError, Result};

/// Bin pitch of one gridfinity unit.
const GRIDFINITY_PITCH_MM: f64 = 42.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseKind {
    Pred,
    PredBox,
    Tailor,
    Plain,
    None,
    Cullenect,
    Modern,
}

const BASE_NAMES: &[(&str, BaseKind)] = &[
    ("pred", BaseKind::Pred),
    ("predbox", BaseKind::PredBox),
    ("tailor", BaseKind::Tailor),
    ("plain", BaseKind::Plain),
    ("none", BaseKind::None),
    ("cullenect", BaseKind::Cullenect),
    ("webb", BaseKind::Cullenect),
    ("modern", BaseKind::Modern),
];

impl BaseKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pred => "pred",
            Self::PredBox => "predbox",
            Self::Tailor => "tailor",
            Self::Plain => "plain",
            Self::None => "none",
            Self::Cullenect => "cullenect",
            Self::Modern => "modern",
        }
    }

    /// Unit a bare width number is read in.
    fn default_width_unit(&self) -> Unit {
        match self {
            Self::Plain | Self::None => Unit::Millimetre,
            _ => Unit::Gridfinity,
        }
    }

    /// Margin the base asks for when none is given on the command line.
    pub fn default_margin_mm(&self) -> Option<f64> {
        match self {
            Self::PredBox | Self::Tailor => Some(3.0),
            Self::Cullenect => Some(0.0),
            _ => None,
        }
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BaseKind {
    type Err = String;

    /// Exact names first, then any unambiguous prefix.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        if let Some((_, kind)) = BASE_NAMES.iter().find(|(name, _)| *name == wanted) {
            return Ok(*kind);
        }

        let mut matches: Vec<BaseKind> = Vec::new();
        for (name, kind) in BASE_NAMES {
            if !wanted.is_empty() && name.starts_with(&wanted) && !matches.contains(kind) {
                matches.push(*kind);
            }
        }
        match matches.as_slice() {
            [kind] => Ok(*kind),
            [] => Err(format!(
                "unknown base '{s}' (expected one of: {})",
                base_names().join(", ")
            )),
            several => Err(format!(
                "base '{s}' is ambiguous; could be: {}",
                several.iter().map(BaseKind::name).collect::<Vec<_>>().join(", ")
            )),
        }
    }
}

fn base_names() -> Vec<&'static str> {
    BASE_NAMES.iter().map(|(name, _)| *name).collect()
}

// =========================================================================
// Lengths
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[serde(rename = "u")]
    Gridfinity,
    #[serde(rename = "mm")]
    Millimetre,
    #[serde(rename = "cm")]
    Centimetre,
    #[serde(rename = "in")]
    Inch,
}

impl Unit {
    /// Millimetres per unit, for physical lengths.
    fn millimetres(&self) -> Option<f64> {
        match self {
            Self::Gridfinity => None,
            Self::Millimetre => Some(1.0),
            Self::Centimetre => Some(10.0),
            Self::Inch => Some(25.4),
        }
    }
}

/// A number with an optional unit suffix, as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Length {
    pub value: f64,
    pub unit: Option<Unit>,
}

impl Length {
    pub const fn new(value: f64, unit: Option<Unit>) -> Self {
        Self { value, unit }
    }

    fn unit_or(&self, default: Unit) -> Unit {
        self.unit.unwrap_or(default)
    }

    /// Value in millimetres, or `None` for gridfinity units.
    fn to_mm(self, default: Unit) -> Option<f64> {
        self.unit_or(default)
            .millimetres()
            .map(|per_unit| self.value * per_unit)
    }

    /// Whole number of gridfinity units, if the length is one.
    fn whole_units(&self, default: Unit) -> Option<u32> {
        if self.unit_or(default) != Unit::Gridfinity {
            return None;
        }
        whole(self.value)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.unit {
            None => "",
            Some(Unit::Gridfinity) => "u",
            Some(Unit::Millimetre) => "mm",
            Some(Unit::Centimetre) => "cm",
            Some(Unit::Inch) => "in",
        };
        write!(f, "{}{suffix}", self.value)
    }
}

impl FromStr for Length {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let text = s.trim();
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(text.len());
        let (number, suffix) = text.split_at(split);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("'{s}' is not a length (try 2u, 30mm, 4cm or 1.5in)"))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(format!("length '{s}' must be positive"));
        }
        let unit = match suffix.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "u" => Some(Unit::Gridfinity),
            "mm" => Some(Unit::Millimetre),
            "cm" => Some(Unit::Centimetre),
            "in" | "inch" | "\"" => Some(Unit::Inch),
            other => return Err(format!("unknown unit '{other}' in '{s}'")),
        };
        Ok(Self { value, unit })
    }
}

// =========================================================================
// Area providers
// =========================================================================

/// Base settings gathered from the command line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseRequest {
    pub kind: BaseKind,
    pub width: Option<Length>,
    pub height: Option<Length>,
    /// Cullenect revision.
    pub version: Option<String>,
    /// Depth of a modern label body.
    pub label_depth_mm: Option<f64>,
}

impl BaseRequest {
    pub fn new(kind: BaseKind) -> Self {
        Self {
            kind,
            width: None,
            height: None,
            version: None,
            label_depth_mm: None,
        }
    }

    #[must_use]
    pub fn width(mut self, width: Length) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn height(mut self, height: Length) -> Self {
        self.height = Some(height);
        self
    }
}

/// Content bounds of one physical label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BaseArea {
    pub kind: BaseKind,
    /// Width of the printed body, before subtracting the rim.
    pub body_width_mm: f64,
    /// Area available to the label contents, before margins.
    pub area: Size,
    pub default_margin_mm: Option<f64>,
}

/// Area a base of the requested size leaves for content.
pub fn base_area(request: &BaseRequest) -> Result<BaseArea> {
    let kind = request.kind;
    let (body_width_mm, area) = match kind {
        BaseKind::Pred => {
            let width = gridfinity_width(request, Some(1.0), |u| {
                Some(u * GRIDFINITY_PITCH_MM - 4.2)
            })?;
            let height = height_mm(request, 11.5)?;
            (width, Size::new(width - 5.5, height - 1.0))
        }
        BaseKind::PredBox => {
            let width = gridfinity_width(request, None, |u| match whole(u)? {
                4 => Some(25.5),
                5 => Some(67.5),
                6 | 7 => Some(82.0),
                _ => None,
            })?;
            let height = height_mm(request, 24.5)?;
            (width, Size::new(width - 0.4, height - 0.4))
        }
        BaseKind::Tailor => {
            let width = gridfinity_width(request, None, |u| (whole(u)? == 5).then_some(96.75))?;
            let height = height_mm(request, 24.8)?;
            (width, Size::new(width - 0.4, height - 0.4))
        }
        BaseKind::Plain => {
            let width = physical_width(request)?;
            let Some(height) = request.height else {
                return Err(CliError::invalid("plain labels need --height"));
            };
            (width, Size::new(width, length_mm(height, "height")?))
        }
        BaseKind::None => {
            let width = physical_width(request)?;
            let height = height_mm(request, 15.0)?;
            (width, Size::new(width, height))
        }
        BaseKind::Cullenect => cullenect_area(request)?,
        BaseKind::Modern => modern_area(request)?,
    };

    if area.width <= 0.0 || area.height <= 0.0 {
        return Err(CliError::invalid(format!(
            "{kind} base leaves no room for content ({:.2} x {:.2} mm)",
            area.width, area.height
        )));
    }
    tracing::debug!(
        base = %kind,
        body_width_mm,
        width_mm = area.width,
        height_mm = area.height,
        "resolved base area"
    );
    Ok(BaseArea {
        kind,
        body_width_mm,
        area,
        default_margin_mm: kind.default_margin_mm(),
    })
}

/// Width for bases sized in gridfinity units, with `units` mapping a
/// number of units to millimetres.
fn gridfinity_width(
    request: &BaseRequest,
    default: Option<f64>,
    units: impl Fn(f64) -> Option<f64>,
) -> Result<f64> {
    let kind = request.kind;
    let width = match (request.width, default) {
        (Some(width), _) => width,
        (None, Some(value)) => Length::new(value, Some(Unit::Gridfinity)),
        (None, None) => {
            return Err(CliError::invalid(format!("{kind} labels need --width")));
        }
    };
    if let Some(mm) = width.to_mm(kind.default_width_unit()) {
        return Ok(mm);
    }
    units(width.value).ok_or_else(|| {
        CliError::invalid(format!(
            "{kind} label dimensions are not known for {width} bins; give the width in mm"
        ))
    })
}

fn whole(units: f64) -> Option<u32> {
    (units.fract() == 0.0 && units > 0.0).then_some(units as u32)
}

fn physical_width(request: &BaseRequest) -> Result<f64> {
    let kind = request.kind;
    let Some(width) = request.width else {
        return Err(CliError::invalid(format!("{kind} labels need --width")));
    };
    width.to_mm(kind.default_width_unit()).ok_or_else(|| {
        CliError::invalid(format!(
            "{kind} labels cannot be sized in gridfinity units; try 30mm"
        ))
    })
}

fn height_mm(request: &BaseRequest, default: f64) -> Result<f64> {
    request
        .height
        .map_or(Ok(default), |height| length_mm(height, "height"))
}

fn length_mm(length: Length, what: &str) -> Result<f64> {
    length.to_mm(Unit::Millimetre).ok_or_else(|| {
        CliError::invalid(format!("{what} must be a length, not gridfinity units"))
    })
}

fn cullenect_area(request: &BaseRequest) -> Result<(f64, Size)> {
    let version = match request.version.as_deref() {
        None | Some("latest") => "v2.0.0",
        Some(version) => version,
    };
    let height = height_mm(request, 11.0)?;
    match version {
        "v1.1" => {
            let unit = Unit::Gridfinity;
            let single = request
                .width
                .is_none_or(|width| width.whole_units(unit) == Some(1));
            if !single {
                return Err(CliError::invalid(
                    "cullenect v1.1 only makes width 1u labels",
                ));
            }
            Ok((36.4, Size::new(36.4, height)))
        }
        "v2.0.0" | "v2+" => {
            let width = request.width.unwrap_or(Length::new(1.0, None));
            let width_mm = width
                .to_mm(Unit::Gridfinity)
                .unwrap_or(width.value * GRIDFINITY_PITCH_MM - 6.0);
            Ok((width_mm, Size::new(width_mm, height)))
        }
        other => Err(CliError::invalid(format!(
            "unknown cullenect version '{other}' (expected latest, v1.1, v2.0.0 or v2+)"
        ))),
    }
}

fn modern_area(request: &BaseRequest) -> Result<(f64, Size)> {
    const BODY_TOLERANCE_MM: f64 = 0.317;

    let unit = Unit::Gridfinity;
    let Some(width) = request.width else {
        return Err(CliError::invalid("modern labels need --width"));
    };
    let width_mm = match width.to_mm(unit) {
        Some(mm) => mm,
        None => {
            let known = width.whole_units(unit).and_then(|whole| match whole {
                3 => Some(31.8),
                4 => Some(50.8),
                5 => Some(75.8),
                6 => Some(115.8),
                7 | 8 => Some(140.8),
                _ => None,
            });
            let Some(mm) = known else {
                return Err(CliError::invalid(
                    "modern label widths are only known for 3u-8u boxes; give the width in mm",
                ));
            };
            mm - BODY_TOLERANCE_MM
        }
    };
    let height = height_mm(request, 22.117157)?;
    let depth = request.label_depth_mm.unwrap_or(2.2);
    if depth >= height / 2.0 || depth >= width_mm / 2.0 {
        return Err(CliError::invalid(format!(
            "label depth ({depth:.1} mm) must be less than half the width ({:.1} mm) and height ({:.1} mm)",
            width_mm / 2.0,
            height / 2.0
        )));
    }
    Ok((width_mm, Size::new(width_mm, height)))
}
