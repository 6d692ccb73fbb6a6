#![forbid(unsafe_code)]

//! Fragment extents in millimetres.
//!
//! Every extent is a function of the line size `size` (the height ordinary
//! text would be drawn at). Fixed kinds are affine in `size`: an extent at
//! `size = 0` is the part that does not scale, such as a box's explicit
//! width. Variable-width kinds also take the width offered to them.

use gflabel_core::Size;
use serde::Serialize;

use crate::params::FragmentParams;
use crate::registry::FragmentKind;

/// Width of the bolt shaft relative to the line size.
const BOLT_LINE_RATIO: f64 = 1.0 / 2.25;
/// Half width of the break drawn in a shortened bolt.
const BOLT_HALF_SPLIT: f64 = 0.75;
/// Smallest width a dimension line is drawn at.
const MEASURE_MIN_WIDTH: f64 = 1.0;
/// Webbolt drawing width over height.
const WEBBOLT_ASPECT: f64 = 1.456;
/// Variable resistor drawing width over height.
const RESISTOR_ASPECT: f64 = 1.88;
/// Magnet drawing, a horseshoe of 2/3 the line size rotated 45 degrees.
const MAGNET_RATIO: f64 = 2.0 / 3.0 * std::f64::consts::SQRT_2;

/// Size of a variable-width fragment after allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub size: Size,
    /// A bolt longer than its offer is drawn with a broken shaft.
    pub broken: bool,
}

impl Extent {
    fn whole(size: Size) -> Self {
        Self {
            size,
            broken: false,
        }
    }
}

/// Extent of a fixed-width fragment at line size `size`.
///
/// Overheight kinds come out taller than `size` by their factor.
/// Variable-width and structural kinds have no intrinsic extent.
pub fn intrinsic_size(kind: FragmentKind, params: &FragmentParams, size: f64) -> Size {
    let size = size.max(0.0);
    match kind {
        FragmentKind::HexHead | FragmentKind::HexNut => {
            Size::new(size, size * 3f64.sqrt() / 2.0)
        }
        FragmentKind::Head
        | FragmentKind::ThreadedInsert
        | FragmentKind::Washer
        | FragmentKind::LockWasher
        | FragmentKind::Circle => Size::new(size, size),
        FragmentKind::Magnet => Size::new(size * MAGNET_RATIO, size * MAGNET_RATIO),
        FragmentKind::WebBolt => {
            let height = 1.6 * size;
            Size::new(WEBBOLT_ASPECT * height, height)
        }
        FragmentKind::VariableResistor => {
            let height = 1.5 * size;
            Size::new(RESISTOR_ASPECT * height, height)
        }
        FragmentKind::Box => match params {
            FragmentParams::Box {
                width_mm,
                height_mm,
            } => Size::new(*width_mm, height_mm.unwrap_or(size)),
            _ => Size::new(0.0, size),
        },
        FragmentKind::Symbol => match params {
            FragmentParams::Symbol(symbol) => Size::new(symbol.aspect * size, size),
            _ => Size::new(size, size),
        },
        FragmentKind::Expand
        | FragmentKind::Bolt
        | FragmentKind::Measure
        | FragmentKind::Splitter
        | FragmentKind::Align => Size::new(0.0, 0.0),
    }
}

/// Narrowest width a variable-width fragment accepts at `size`.
///
/// For a bolt this is the width `offered_extent` returns for the smallest
/// offer, so fitting at this width never underestimates the line.
pub fn min_width(kind: FragmentKind, params: &FragmentParams, size: f64) -> f64 {
    let size = size.max(0.0);
    match kind {
        FragmentKind::Bolt => {
            let natural = bolt_natural_width(bolt_length(params), size);
            natural.min(size.max(bolt_break_floor(size)))
        }
        FragmentKind::Measure => MEASURE_MIN_WIDTH,
        _ => 0.0,
    }
}

/// Width a bolt would use if nothing constrained it.
pub fn bolt_natural_width(length_mm: f64, size: f64) -> f64 {
    length_mm + size * BOLT_LINE_RATIO
}

/// Narrowest broken bolt: two shaft ends either side of the split.
fn bolt_break_floor(size: f64) -> f64 {
    size * BOLT_LINE_RATIO * 2.0 + BOLT_HALF_SPLIT * 2.0 + 0.1
}

fn bolt_length(params: &FragmentParams) -> f64 {
    match params {
        FragmentParams::Bolt(spec) => spec.length_mm.unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Extent of a variable-width fragment offered `offered` mm.
///
/// Expanding blanks and dimension lines take the whole offer. A bolt takes
/// its natural width when that fits and is broken to the offer otherwise.
pub fn offered_extent(
    kind: FragmentKind,
    params: &FragmentParams,
    size: f64,
    offered: f64,
) -> Extent {
    let size = size.max(0.0);
    let offered = offered.max(min_width(kind, params, size));
    match kind {
        FragmentKind::Bolt => {
            let room = offered.max(bolt_break_floor(size));
            let natural = bolt_natural_width(bolt_length(params), size);
            if natural > room {
                Extent {
                    size: Size::new(room, size),
                    broken: true,
                }
            } else {
                Extent::whole(Size::new(natural, size))
            }
        }
        FragmentKind::Expand | FragmentKind::Measure => Extent::whole(Size::new(offered, size)),
        _ => Extent::whole(intrinsic_size(kind, params, size)),
    }
}
