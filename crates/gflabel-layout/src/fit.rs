#![forbid(unsafe_code)]

//! Bounded fit search.
//!
//! Finds the largest line size whose measured extent fits a box. The
//! measurement is a caller-supplied closure so the resolver knows nothing
//! about text or fragments; it only assumes extents grow with size.

use gflabel_core::{OverflowAxis, Size};
use serde::Serialize;
use smallvec::SmallVec;

/// Content exceeds its box along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitOverflow {
    pub axis: OverflowAxis,
    pub required_mm: f64,
    pub available_mm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    /// Chosen line size in mm.
    pub size: f64,
    /// Bisection steps taken; 0 when no search ran.
    pub iterations: u32,
    /// Whether a search was attempted at all.
    pub searched: bool,
    /// Extent at `size`.
    pub extent: Size,
    pub overflow: SmallVec<[FitOverflow; 2]>,
}

/// What to fit and how.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequest {
    /// Largest size considered. With fixed sizing, the size used.
    pub upper: f64,
    /// Box the content must fit.
    pub available: Size,
    /// Use `upper` as-is, overflowing if need be.
    pub fixed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResolver {
    pub max_iterations: u32,
    /// Search stops once the bracket is narrower than this, in mm.
    pub window: f64,
    /// Slack allowed when comparing an extent to the box, in mm.
    pub tolerance: f64,
}

impl Default for FitResolver {
    fn default() -> Self {
        Self {
            max_iterations: 64,
            window: 1e-4,
            tolerance: 1e-6,
        }
    }
}

impl FitResolver {
    fn fits(&self, extent: Size, available: Size) -> bool {
        extent.width <= available.width + self.tolerance
            && extent.height <= available.height + self.tolerance
    }

    /// Overflow of a placed width, if it exceeds `available` beyond tolerance.
    pub fn width_overflow(&self, width: f64, available: f64) -> Option<FitOverflow> {
        (width > available + self.tolerance).then_some(FitOverflow {
            axis: OverflowAxis::Width,
            required_mm: width,
            available_mm: available,
        })
    }

    fn overflow(&self, extent: Size, available: Size) -> SmallVec<[FitOverflow; 2]> {
        let mut overflow: SmallVec<[FitOverflow; 2]> =
            self.width_overflow(extent.width, available.width).into_iter().collect();
        if extent.height > available.height + self.tolerance {
            overflow.push(FitOverflow {
                axis: OverflowAxis::Height,
                required_mm: extent.height,
                available_mm: available.height,
            });
        }
        overflow
    }

    /// Resolve the line size for `request`, measuring with `measure`.
    ///
    /// Fixed sizes are used directly. Otherwise the upper bound is taken
    /// when it fits, and a bisection over `[0, upper]` finds the largest
    /// fitting size when it does not. Content whose size-independent part
    /// already overflows is left at `upper` and reported.
    pub fn resolve(&self, request: FitRequest, mut measure: impl FnMut(f64) -> Size) -> FitOutcome {
        let upper = request.upper.max(0.0);
        let at_upper = measure(upper);

        if request.fixed || self.fits(at_upper, request.available) {
            return FitOutcome {
                size: upper,
                iterations: 0,
                searched: false,
                extent: at_upper,
                overflow: self.overflow(at_upper, request.available),
            };
        }

        if !self.fits(measure(0.0), request.available) {
            tracing::trace!(upper, "content overflows at every size");
            return FitOutcome {
                size: upper,
                iterations: 0,
                searched: true,
                extent: at_upper,
                overflow: self.overflow(at_upper, request.available),
            };
        }

        let mut lo = 0.0;
        let mut hi = upper;
        let mut iterations = 0;
        while iterations < self.max_iterations && hi - lo > self.window {
            let mid = lo + (hi - lo) / 2.0;
            if self.fits(measure(mid), request.available) {
                lo = mid;
            } else {
                hi = mid;
            }
            iterations += 1;
        }

        let extent = measure(lo);
        tracing::trace!(size = lo, iterations, "fit converged");
        FitOutcome {
            size: lo,
            iterations,
            searched: true,
            extent,
            overflow: self.overflow(extent, request.available),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn request(upper: f64, width: f64, height: f64) -> FitRequest {
        FitRequest {
            upper,
            available: Size::new(width, height),
            fixed: false,
        }
    }

    /// Text-like extent: `advance` mm wide per mm of size plus a fixed part.
    fn linear(advance: f64, fixed: f64) -> impl FnMut(f64) -> Size {
        move |size| Size::new(fixed + advance * size, size)
    }

    #[test]
    fn upper_bound_taken_when_it_fits() {
        let outcome = FitResolver::default().resolve(request(5.0, 100.0, 5.0), linear(2.0, 0.0));
        assert_eq!(outcome.size, 5.0);
        assert!(!outcome.searched);
        assert!(outcome.overflow.is_empty());
    }

    #[test]
    fn search_finds_the_width_limit() {
        let resolver = FitResolver::default();
        let outcome = resolver.resolve(request(10.0, 12.0, 10.0), linear(3.0, 0.0));
        assert!(outcome.searched);
        assert!(outcome.size <= 4.0 + 1e-6);
        assert!(4.0 - outcome.size <= resolver.window);
        assert!(outcome.iterations <= resolver.max_iterations);
        assert!(outcome.overflow.is_empty());
    }

    #[test]
    fn fixed_size_skips_search_and_overflows() {
        let outcome = FitResolver::default().resolve(
            FitRequest {
                upper: 20.0,
                available: Size::new(10.0, 8.0),
                fixed: true,
            },
            linear(1.0, 0.0),
        );
        assert_eq!(outcome.size, 20.0);
        assert_eq!(outcome.iterations, 0);
        let axes: Vec<OverflowAxis> = outcome.overflow.iter().map(|o| o.axis).collect();
        assert_eq!(axes, vec![OverflowAxis::Width, OverflowAxis::Height]);
    }

    #[test]
    fn unfittable_fixed_part_stays_natural() {
        let outcome = FitResolver::default().resolve(request(4.0, 10.0, 4.0), linear(1.0, 15.0));
        assert_eq!(outcome.size, 4.0);
        assert_eq!(outcome.overflow.len(), 1);
        assert_eq!(outcome.overflow[0].required_mm, 19.0);
    }

    #[test]
    fn width_overflow_respects_tolerance() {
        let resolver = FitResolver::default();
        assert_eq!(resolver.width_overflow(14.0 + 1e-7, 14.0), None);
        let overflow = resolver.width_overflow(15.5, 14.0).unwrap();
        assert_eq!(overflow.axis, OverflowAxis::Width);
        assert_eq!(overflow.required_mm, 15.5);
        assert_eq!(overflow.available_mm, 14.0);
    }

    #[test]
    fn zero_upper_bound() {
        let outcome = FitResolver::default().resolve(request(0.0, 1.0, 1.0), linear(1.0, 0.0));
        assert_eq!(outcome.size, 0.0);
        assert!(!outcome.searched);
    }

    proptest! {
        #[test]
        fn resolved_size_is_largest_fit(
            upper in 0.5f64..40.0,
            width in 0.5f64..120.0,
            advance in 0.1f64..8.0,
            fixed in 0.0f64..0.4,
        ) {
            let resolver = FitResolver::default();
            let outcome = resolver.resolve(request(upper, width, upper), linear(advance, fixed));
            prop_assert!(outcome.size <= upper);
            prop_assert!(outcome.overflow.is_empty());
            prop_assert!(outcome.iterations <= resolver.max_iterations);
            let exact = ((width - fixed) / advance).min(upper);
            prop_assert!(outcome.size <= exact + resolver.tolerance / advance + 1e-9);
            prop_assert!(exact - outcome.size <= resolver.window + 1e-9);
        }
    }
}
