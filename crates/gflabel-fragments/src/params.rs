#![forbid(unsafe_code)]

//! Binding directive arguments to typed fragment parameters.

use std::fmt;

use gflabel_core::{LabelError, Result};
use serde::Serialize;

use crate::drives::{BoltSpec, Drive, parse_drives};
use crate::registry::FragmentKind;
use crate::symbols::SymbolMatcher;

/// One argument of a fragment directive, as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Arg {
    Positional(String),
    Keyed { key: String, value: String },
}

impl Arg {
    pub fn positional(value: impl Into<String>) -> Self {
        Self::Positional(value.into())
    }

    pub fn keyed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Keyed {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional(value) => f.write_str(value),
            Self::Keyed { key, value } => write!(f, "{key}={value}"),
        }
    }
}

/// Resolved symbol reference carried into placements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolRef {
    pub id: String,
    pub category: String,
    pub standard: String,
    pub filename: String,
    pub aspect: f64,
}

/// Typed parameters of a bound fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FragmentParams {
    None,
    Drives { drives: Vec<Drive> },
    Bolt(BoltSpec),
    Box { width_mm: f64, height_mm: Option<f64> },
    Symbol(SymbolRef),
}

impl FragmentParams {
    pub fn drives(&self) -> &[Drive] {
        match self {
            Self::Drives { drives } => drives,
            Self::Bolt(spec) => &spec.drives,
            _ => &[],
        }
    }
}

fn positional<'a>(kind: FragmentKind, args: &'a [Arg]) -> Result<Vec<&'a str>> {
    args.iter()
        .map(|arg| match arg {
            Arg::Positional(value) => Ok(value.as_str()),
            Arg::Keyed { key, .. } => Err(LabelError::arguments(
                kind.name(),
                format!("unexpected keyword argument '{key}'"),
            )),
        })
        .collect()
}

fn number(kind: FragmentKind, what: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        LabelError::arguments(kind.name(), format!("{what} must be a number, got '{raw}'"))
    })?;
    if !value.is_finite() || value <= 0.0 {
        return Err(LabelError::arguments(
            kind.name(),
            format!("{what} must be positive, got '{raw}'"),
        ));
    }
    Ok(value)
}

fn no_arguments(kind: FragmentKind, args: &[Arg]) -> Result<FragmentParams> {
    if args.is_empty() {
        Ok(FragmentParams::None)
    } else {
        Err(LabelError::arguments(kind.name(), "takes no arguments"))
    }
}

fn bind_box(args: &[Arg]) -> Result<FragmentParams> {
    let kind = FragmentKind::Box;
    let mut width = None;
    let mut height = None;
    let mut next_positional = 0usize;
    for arg in args {
        match arg {
            Arg::Keyed { key, value } => match key.as_str() {
                "width" | "w" => width = Some(value.as_str()),
                "height" | "h" => height = Some(value.as_str()),
                other => {
                    return Err(LabelError::arguments(
                        kind.name(),
                        format!("unexpected keyword argument '{other}'"),
                    ));
                }
            },
            Arg::Positional(value) => {
                match next_positional {
                    0 => width = Some(value.as_str()),
                    1 => height = Some(value.as_str()),
                    _ => {
                        return Err(LabelError::arguments(
                            kind.name(),
                            "takes at most two arguments",
                        ));
                    }
                }
                next_positional += 1;
            }
        }
    }
    let width = width.ok_or_else(|| LabelError::arguments(kind.name(), "width is required"))?;
    Ok(FragmentParams::Box {
        width_mm: number(kind, "width", width)?,
        height_mm: height.map(|raw| number(kind, "height", raw)).transpose()?,
    })
}

fn bind_bolt(args: &[Arg]) -> Result<FragmentParams> {
    let kind = FragmentKind::Bolt;
    let mut length = None;
    let mut features = Vec::new();
    for arg in args {
        match arg {
            Arg::Keyed { key, value } if key == "length" => length = Some(value.as_str()),
            Arg::Keyed { key, .. } => {
                return Err(LabelError::arguments(
                    kind.name(),
                    format!("unexpected keyword argument '{key}'"),
                ));
            }
            Arg::Positional(value) if length.is_none() => length = Some(value.as_str()),
            Arg::Positional(value) => features.push(value.as_str()),
        }
    }
    let length = length.ok_or_else(|| LabelError::arguments(kind.name(), "length is required"))?;
    let mut spec = BoltSpec::from_features(features, true)
        .map_err(|message| LabelError::arguments(kind.name(), message))?;
    spec.length_mm = Some(number(kind, "length", length)?);
    Ok(FragmentParams::Bolt(spec))
}

fn bind_symbol(args: &[Arg]) -> Result<FragmentParams> {
    let selectors = positional(FragmentKind::Symbol, args)?;
    if selectors.is_empty() {
        return Err(LabelError::arguments(
            FragmentKind::Symbol.name(),
            "at least one selector is required",
        ));
    }
    let entry = SymbolMatcher::builtin().resolve(selectors.as_slice())?;
    Ok(FragmentParams::Symbol(SymbolRef {
        id: entry.id.clone(),
        category: entry.category.clone(),
        standard: entry.standard.clone(),
        filename: entry.filename.clone(),
        aspect: entry.aspect,
    }))
}

/// Validate and type the arguments of one directive.
///
/// Errors carry a default span; the parser attaches the directive's
/// location.
pub fn bind(kind: FragmentKind, args: &[Arg]) -> Result<FragmentParams> {
    match kind {
        FragmentKind::HexHead => {
            let names = positional(kind, args)?;
            let drives =
                parse_drives(names).map_err(|message| LabelError::arguments(kind.name(), message))?;
            Ok(FragmentParams::Drives { drives })
        }
        FragmentKind::Head => {
            let names = positional(kind, args)?;
            let drives =
                parse_drives(names).map_err(|message| LabelError::arguments(kind.name(), message))?;
            if drives.is_empty() {
                return Err(LabelError::arguments(
                    kind.name(),
                    "at least one drive is required",
                ));
            }
            Ok(FragmentParams::Drives { drives })
        }
        FragmentKind::Bolt => bind_bolt(args),
        FragmentKind::WebBolt => {
            let features = positional(kind, args)?;
            let spec = BoltSpec::from_features(features, false)
                .map_err(|message| LabelError::arguments(kind.name(), message))?;
            Ok(FragmentParams::Bolt(spec))
        }
        FragmentKind::Box => bind_box(args),
        FragmentKind::Symbol => bind_symbol(args),
        FragmentKind::Expand
        | FragmentKind::ThreadedInsert
        | FragmentKind::HexNut
        | FragmentKind::Washer
        | FragmentKind::LockWasher
        | FragmentKind::Circle
        | FragmentKind::Magnet
        | FragmentKind::VariableResistor
        | FragmentKind::Measure
        | FragmentKind::Splitter
        | FragmentKind::Align => no_arguments(kind, args),
    }
}
