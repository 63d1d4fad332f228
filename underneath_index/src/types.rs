// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types and helpers.

use core::cmp::Ordering;
use core::fmt::Debug;

/// Axis-aligned bounding box in 2D.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Aabb2D<T> {
    /// Minimum x (left)
    pub min_x: T,
    /// Minimum y (top)
    pub min_y: T,
    /// Maximum x (right)
    pub max_x: T,
    /// Maximum y (bottom)
    pub max_y: T,
}

impl<T> Aabb2D<T> {
    /// Create a new AABB from min/max corners.
    #[inline(always)]
    pub const fn new(min_x: T, min_y: T, max_x: T, max_y: T) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

impl<T: Copy> Aabb2D<T> {
    /// Create the degenerate AABB of a single point (`min == max` on both axes).
    ///
    /// Point features are indexed this way; they have no area but still
    /// [`overlap`][Self::overlaps] any box that contains them, edges included.
    #[inline]
    pub const fn point(x: T, y: T) -> Self {
        Self::new(x, y, x, y)
    }
}

impl<T: Copy + PartialOrd> Aabb2D<T> {
    /// Determines whether this AABB overlaps with another in any way.
    ///
    /// Note that the edge of the AABB is considered to be part of itself, meaning
    /// that two AABBs that share an edge are considered to overlap. This also holds
    /// for degenerate (point) boxes lying on the edge of the other box.
    ///
    /// # Examples
    ///
    /// ```
    /// use underneath_index::Aabb2D;
    ///
    /// let aabb1 = Aabb2D::new(0.0, 0.0, 10.0, 10.0);
    /// let aabb2 = Aabb2D::new(10.0, 0.0, 20.0, 10.0);
    /// assert!(aabb1.overlaps(&aabb2));
    ///
    /// // A point on the boundary is inside.
    /// assert!(aabb1.overlaps(&Aabb2D::point(10.0, 5.0)));
    /// assert!(!aabb1.overlaps(&Aabb2D::point(10.5, 5.0)));
    /// ```
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Whether every coordinate compares with the others; `false` when any is NaN.
    ///
    /// Such a box overlaps nothing, and backends do not store it.
    ///
    /// ```
    /// use underneath_index::Aabb2D;
    ///
    /// assert!(Aabb2D::point(1.0, 2.0).is_comparable());
    /// assert!(!Aabb2D::point(f64::NAN, 2.0).is_comparable());
    /// ```
    #[inline]
    pub fn is_comparable(&self) -> bool {
        self.min_x.partial_cmp(&self.max_x).is_some()
            && self.min_y.partial_cmp(&self.max_y).is_some()
    }

    /// The smallest AABB enclosing two AABBs. A box with NaN coordinates is ignored.
    #[inline]
    pub(crate) fn union(&self, other: Self) -> Self {
        if !other.is_comparable() {
            return *self;
        }
        if !self.is_comparable() {
            return other;
        }
        Self {
            min_x: min_t(self.min_x, other.min_x),
            min_y: min_t(self.min_y, other.min_y),
            max_x: max_t(self.max_x, other.max_x),
            max_y: max_t(self.max_y, other.max_y),
        }
    }

    /// Return true if the AABB is empty or inverted (no area). Assumes no NaN.
    ///
    /// Point boxes are empty in this sense even though they are valid index entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }
}

impl<T: Scalar> Aabb2D<T> {
    /// Compute the area of an AABB using the scalar's widened accumulator type.
    #[inline]
    pub fn area(&self) -> T::Acc {
        let w = T::max(T::sub(self.max_x, self.min_x), T::zero());
        let h = T::max(T::sub(self.max_y, self.min_y), T::zero());
        T::widen(w) * T::widen(h)
    }

    /// Center of the box along x.
    #[inline]
    pub(crate) fn center_x(&self) -> T {
        T::mid(self.min_x, self.max_x)
    }

    /// Center of the box along y.
    #[inline]
    pub(crate) fn center_y(&self) -> T {
        T::mid(self.min_y, self.max_y)
    }
}

/// Numeric scalar abstraction for 2D AABBs used by backends.
///
/// This trait provides the small set of operations required for the R-tree split
/// metric and centroid ordering, and an associated widened accumulator type for area
/// (`f64`→`f64`, `i64`→`i128`).
pub trait Scalar: Copy + PartialOrd + Debug {
    /// Widened accumulator type suitable for area/cost computations.
    type Acc: Copy
        + PartialOrd
        + core::ops::Add<Output = Self::Acc>
        + core::ops::Sub<Output = Self::Acc>
        + core::ops::Mul<Output = Self::Acc>
        + Debug;

    /// Subtract two scalar values: a - b.
    fn sub(a: Self, b: Self) -> Self;

    /// Zero value for the scalar type.
    fn zero() -> Self;

    /// Max of the two scalar values.
    fn max(a: Self, b: Self) -> Self;

    /// Midpoint between a and b (used for centroid ordering).
    fn mid(a: Self, b: Self) -> Self;

    /// Convert a scalar to the accumulator type.
    fn widen(v: Self) -> Self::Acc;

    /// Convert a `usize` to the accumulator type (for split weighting).
    fn acc_from_usize(n: usize) -> Self::Acc;
}

impl Scalar for f64 {
    type Acc = Self;

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn max(a: Self, b: Self) -> Self {
        Self::max(a, b)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        0.5 * (a + b)
    }

    #[inline(always)]
    fn widen(v: Self) -> Self::Acc {
        v
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "Entry counts far below 2^52 are represented exactly."
    )]
    #[inline]
    fn acc_from_usize(n: usize) -> Self::Acc {
        n as Self::Acc
    }
}

impl Scalar for i64 {
    type Acc = i128;

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a.saturating_sub(b)
    }

    #[inline(always)]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn max(a: Self, b: Self) -> Self {
        core::cmp::max(a, b)
    }

    #[inline]
    fn mid(a: Self, b: Self) -> Self {
        // Average without overflow: (a & b) + ((a ^ b) >> 1)
        (a & b) + ((a ^ b) >> 1)
    }

    #[inline]
    fn widen(v: Self) -> Self::Acc {
        v as i128
    }

    #[inline]
    fn acc_from_usize(n: usize) -> Self::Acc {
        n as i128
    }
}

/// Helper alias for the widened accumulator type `Scalar::Acc` associated with a `T: Scalar`.
pub type ScalarAcc<T> = <T as Scalar>::Acc;

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

/// Order two scalars, treating incomparable values as equal.
pub(crate) fn cmp_t<T: PartialOrd>(a: &T, b: &T) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}
