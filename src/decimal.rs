//! A 64-bit packed decimal with totalized arithmetic.
//!
//! The packed word holds sign, a precision-loss flag, a 5-bit exponent in
//! `-16..=15` and a 57-bit mantissa. Negative values store the negated
//! magnitude, so every integer in `-2^57+1..=2^57-1` encodes as itself;
//! raw `<`/`>` is only meaningful among those plain-integer encodings, and
//! ordering in general goes through [`Decimal::compare`]. Values are kept
//! normalized, which gives every representable number a single bit pattern:
//! `==`, `!=` and hashing work directly on the wrapper.

use core::cmp::Ordering;
use core::fmt;
use core::iter::{Product, Sum};
use core::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign};
use core::str::FromStr;

use crate::text::{self, StrBuf};
use crate::tuple::{from_float_parts, Tuple, E_ABOVE, E_BELOW, LOSS, SIGN, TEN_POW};
use crate::{DecimalError, Result};

/// Number of decimal places kept by [`Decimal::div`] when a division does
/// not come out exactly.
pub const DIVISION_PRECISION: i32 = 16;

const MIN_E: i64 = -16;
const MAX_E: i64 = 15;
const BIT_E: u32 = 57;
const E_MASK: u64 = 0x3e00_0000_0000_0000;

/// Packed 64-bit decimal floating point value.
///
/// The default value is [`Decimal::NULL`], distinct from [`Decimal::ZERO`]:
/// a field left uninitialized can be told apart from one explicitly set to
/// zero, while both behave as zero in arithmetic.
///
/// Every operation is total. Results that leave the representable range
/// become [`Decimal::INFINITY`] or a near-zero, invalid combinations become
/// [`Decimal::NAN`], and any rounding along the way sets a sticky loss flag
/// that makes the value print with a `~` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Decimal(i64);

impl Decimal {
    /// The unset value, encoded as all zero bits. Behaves as zero in every
    /// operation but compares unequal to [`Decimal::ZERO`].
    pub const NULL: Decimal = Decimal(0);

    /// Exact zero.
    pub const ZERO: Decimal = Decimal(i64::MIN);

    /// A value too close to zero to represent, of unknown sign.
    pub const NEAR_ZERO: Decimal = Decimal(i64::MIN | LOSS as i64);

    /// A positive value too close to zero to represent.
    pub const NEAR_POSITIVE_ZERO: Decimal = Decimal(0x6000_0000_0000_0000);

    /// A negative value too close to zero to represent.
    pub const NEAR_NEGATIVE_ZERO: Decimal = Decimal(-0x6000_0000_0000_0000);

    /// A value too large to represent.
    pub const INFINITY: Decimal = Decimal(0x5e00_0000_0000_0000);

    /// A value too large in magnitude to represent, negative.
    pub const NEG_INFINITY: Decimal = Decimal(-0x5e00_0000_0000_0000);

    /// Not a number. NaN has several internal encodings, so never compare
    /// against this constant with `==`; use [`Decimal::is_nan`].
    pub const NAN: Decimal = Decimal(0x4200_0000_0000_0000);

    /// Largest mantissa, and largest integer that still encodes with
    /// exponent zero. Doubles as the mantissa extraction mask.
    pub const MAX_MANTISSA: i64 = 0x01ff_ffff_ffff_ffff;

    const MAX_M: u64 = Self::MAX_MANTISSA as u64;
}

// ============================================================================
// Packing
// ============================================================================

impl Decimal {
    /// Reinterprets a raw packed word.
    #[inline(always)]
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Decimal(raw)
    }

    /// Returns the raw packed word.
    #[inline(always)]
    #[must_use]
    pub const fn to_raw(self) -> i64 {
        self.0
    }

    #[inline(always)]
    fn magnitude(self) -> u64 {
        self.0.unsigned_abs()
    }

    /// Decodes into sign/loss, mantissa and exponent, widening the exponent
    /// range edges of magic values to the engine's sentinels.
    pub(crate) fn unpack(self) -> Tuple {
        let u = self.magnitude();

        let v = if self.0 < 0 { (u & LOSS) | SIGN } else { u & LOSS };

        let mut e = (((u & E_MASK) << 2) as i64) >> (2 + BIT_E);
        let m = u & Self::MAX_M;

        if m == 0 {
            if e == MIN_E {
                e = E_BELOW;
            } else if e == MAX_E {
                e = E_ABOVE;
            }
        }

        Tuple::new(v, m, e)
    }

    /// Normalizes and packs a tuple. An exact zero tuple packs to null when
    /// its flags are fully clear and to zero otherwise.
    pub(crate) fn pack(t: Tuple) -> Self {
        if t.m == 0 && t.v & LOSS == 0 {
            if t.v == 0 && t.e == 0 {
                return Decimal::NULL;
            }
            return Decimal::ZERO;
        }

        let t = t.normalize(Self::MAX_M, MIN_E, MAX_E);
        let u = t.v | t.m | (((t.e << BIT_E) as u64) & E_MASK);

        if u & SIGN != 0 {
            Decimal(((u ^ SIGN) as i64).wrapping_neg())
        } else {
            Decimal(u as i64)
        }
    }

    /// Raw two's-complement negation, used internally where the zero and
    /// near-zero identities of [`Neg`] must not apply.
    #[inline(always)]
    fn neg_raw(self) -> Self {
        Decimal(self.0.wrapping_neg())
    }
}

// ============================================================================
// Construction
// ============================================================================

impl Decimal {
    /// Builds `value * 10^exp`.
    #[must_use]
    pub fn new(value: i64, exp: i32) -> Self {
        if value == 0 {
            return Decimal::ZERO;
        }

        let v = if value < 0 { SIGN } else { 0 };

        Self::pack(Tuple::new(v, value.unsigned_abs(), exp as i64))
    }

    /// Converts an `f64`, marking the result inexact when `exact` is false
    /// or digits are lost along the way.
    #[must_use]
    pub fn from_f64_exact(value: f64, exact: bool) -> Self {
        let b = value.to_bits();
        let e = ((b >> 52) & 0x7ff) as i64;
        let mut v = b & SIGN;

        if !exact {
            v |= LOSS;
        }

        match e {
            2047 => {
                // infinities and NaNs
                if (b << 12) == 0 {
                    if b & SIGN != 0 {
                        Decimal::NEG_INFINITY
                    } else {
                        Decimal::INFINITY
                    }
                } else {
                    Decimal::NAN
                }
            }
            // subnormals and signed zeros
            0 => Self::pack(from_float_parts(v, (b << 11) & !SIGN, -1022)),
            _ => Self::pack(from_float_parts(v, (b << 11) | SIGN, e - 1023)),
        }
    }

    /// Converts an `f64`.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Self::from_f64_exact(value, true)
    }

    /// Converts an `f32`.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        let b = value.to_bits() as u64;
        let e = ((b >> 23) & 0xff) as i64;

        match e {
            255 => {
                if (b << 41) == 0 {
                    if (b << 32) & SIGN != 0 {
                        Decimal::NEG_INFINITY
                    } else {
                        Decimal::INFINITY
                    }
                } else {
                    Decimal::NAN
                }
            }
            0 => Self::pack(from_float_parts((b << 32) & SIGN, (b << 40) & !SIGN, -126)),
            _ => Self::pack(from_float_parts((b << 32) & SIGN, (b << 40) | SIGN, e - 127)),
        }
    }

    /// Parses a decimal from bytes, accepting the same syntax as
    /// [`FromStr`].
    pub fn parse_bytes(b: &[u8]) -> Result<Self> {
        let (v, m, e) = text::parse_tuple(b, &[])?;

        Ok(Self::pack(Tuple::new(v, m, e)))
    }

    /// Parses a decimal from a pre-validated literal.
    ///
    /// # Panics
    ///
    /// Panics if `s` is not a valid decimal literal. Use [`FromStr`] for
    /// untrusted input.
    pub fn require_from_str(s: &str) -> Self {
        match Self::parse_bytes(s.as_bytes()) {
            Ok(d) => d,
            Err(err) => panic!("invalid decimal literal {s:?}: {err}"),
        }
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        if value == 0 {
            Decimal::ZERO
        } else if (-Self::MAX_MANTISSA..=Self::MAX_MANTISSA).contains(&value) {
            // integers in mantissa range encode as themselves
            Decimal(value)
        } else {
            let v = if value < 0 { SIGN } else { 0 };

            Self::pack(Tuple::new(v, value.unsigned_abs(), 0))
        }
    }
}

impl From<u64> for Decimal {
    fn from(value: u64) -> Self {
        if value == 0 {
            Decimal::ZERO
        } else if value <= Self::MAX_M {
            Decimal(value as i64)
        } else {
            Self::pack(Tuple::new(0, value, 0))
        }
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        if value == 0 {
            Decimal::ZERO
        } else {
            // an i32 always fits the mantissa
            Decimal(value as i64)
        }
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Self::from(value as i64)
    }
}

impl From<i16> for Decimal {
    fn from(value: i16) -> Self {
        Self::from(value as i32)
    }
}

impl From<u16> for Decimal {
    fn from(value: u16) -> Self {
        Self::from(value as i64)
    }
}

impl From<i8> for Decimal {
    fn from(value: i8) -> Self {
        Self::from(value as i32)
    }
}

impl From<u8> for Decimal {
    fn from(value: u8) -> Self {
        Self::from(value as i64)
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_bytes(s.as_bytes())
    }
}

// ============================================================================
// Components
// ============================================================================

impl Decimal {
    /// Returns the mantissa.
    #[inline(always)]
    #[must_use]
    pub fn mantissa(self) -> i64 {
        (self.magnitude() as i64) & Self::MAX_MANTISSA
    }

    /// Returns the exponent. Magic values at the range edges report
    /// `i32::MIN` (near-zeros) or `i32::MAX` (infinities).
    #[must_use]
    pub fn exponent(self) -> i32 {
        let u = self.magnitude();

        let e = (((u & E_MASK) << 2) as i64) >> (2 + BIT_E);

        if u & Self::MAX_M == 0 {
            if e == MIN_E {
                return i32::MIN;
            } else if e == MAX_E {
                return i32::MAX;
            }
        }

        e as i32
    }
}

// ============================================================================
// Predicates
// ============================================================================

impl Decimal {
    /// Whether this is the unset value.
    #[inline(always)]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Whether this is any value at all, including zero.
    #[inline(always)]
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }

    /// Returns `default` when null, `self` otherwise.
    #[must_use]
    pub fn if_null(self, default: Decimal) -> Decimal {
        if self.is_null() {
            default
        } else {
            self
        }
    }

    /// Whether this is null or the exact zero; near-zeros do not count.
    #[inline(always)]
    #[must_use]
    pub const fn is_exactly_zero(self) -> bool {
        !SIGN & (self.0 as u64) == 0
    }

    /// Whether this is null, zero, or any of the near-zero values.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.is_exactly_zero()
            || self == Decimal::NEAR_ZERO
            || self == Decimal::NEAR_ZERO.neg_raw()
            || self == Decimal::NEAR_POSITIVE_ZERO
            || self == Decimal::NEAR_NEGATIVE_ZERO
    }

    /// Whether no precision was lost producing this value.
    #[inline(always)]
    #[must_use]
    pub fn is_exact(self) -> bool {
        self.magnitude() & LOSS == 0
    }

    /// Whether the value is an integer that fits an `i64` as-is.
    #[inline(always)]
    #[must_use]
    pub fn is_integer(self) -> bool {
        !(SIGN | Self::MAX_M) & self.magnitude() == 0
    }

    /// Whether the value is strictly positive; near-positive-zero counts,
    /// NaN does not.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > 0 && !self.is_nan()
    }

    /// Whether the value is strictly negative; near-negative-zero counts.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self != Decimal::ZERO && self != Decimal::NEAR_ZERO && self.0 < 0
    }

    /// Whether the value is one of the two infinities.
    #[inline(always)]
    #[must_use]
    pub fn is_infinite(self) -> bool {
        self.magnitude() == Decimal::INFINITY.0 as u64
    }

    /// Whether the value is not a number.
    #[must_use]
    pub fn is_nan(self) -> bool {
        let u = self.magnitude();

        if u & Self::MAX_M == 0 {
            // with mantissa 0, the top byte alone classifies the state:
            //   0x40 near zero, 0x5e infinity, 0x60 near positive zero
            //   0x42..0x5c and 0x62..=0x7e are the NaN boxings
            let top = u >> 56;

            return (0x42..0x5c).contains(&top) || (0x62..=0x7e).contains(&top);
        }

        false
    }

    /// Returns 0 for null, zero and the unsigned near-zero, 1 for positive
    /// values, -1 for negative ones.
    #[must_use]
    pub fn sign(self) -> i32 {
        if self.is_exactly_zero() || self == Decimal::NEAR_ZERO {
            0
        } else {
            1 - ((((self.0 as u64) >> 63) as i32) << 1)
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

impl Decimal {
    /// Returns the absolute value.
    #[inline(always)]
    #[must_use]
    pub fn abs(self) -> Self {
        if self.0 < 0 {
            self.neg_raw()
        } else {
            self
        }
    }

    /// Division with remainder: returns `(q, r)` with
    /// `self = rhs * q + r`, `q` an integer multiple of `10^-precision`
    /// and `|r| < |rhs| * 10^-precision`, `r` signed like `self`.
    ///
    /// A negative `precision` is allowed and rounds the quotient to a
    /// multiple of a positive power of ten.
    #[must_use]
    pub fn quo_rem(self, rhs: Self, precision: i32) -> (Self, Self) {
        let (q, r, re) = self.unpack().div_rem(rhs.unpack(), precision);

        (Self::pack(q), Self::pack(Tuple::new(q.v, r, re)))
    }

    /// Rounds to `places` decimal places, ties toward positive infinity.
    /// Negative `places` rounds the integer part to a power of ten.
    #[must_use]
    pub fn round(self, places: i32) -> Self {
        Self::pack(self.unpack().round(places))
    }

    /// Rounds to `places` decimal places, ties to even.
    #[must_use]
    pub fn round_bank(self, places: i32) -> Self {
        Self::pack(self.unpack().round_bank(places))
    }

    /// Rounds to `places` decimal places toward positive infinity.
    #[must_use]
    pub fn round_ceil(self, places: i32) -> Self {
        Self::pack(self.unpack().round_ceil(places))
    }

    /// Rounds to `places` decimal places toward negative infinity.
    #[must_use]
    pub fn round_floor(self, places: i32) -> Self {
        Self::pack(self.unpack().round_floor(places))
    }

    /// Returns the smallest integer greater than or equal to `self`.
    #[must_use]
    pub fn ceil(self) -> Self {
        self.round_ceil(0)
    }

    /// Returns the largest integer less than or equal to `self`.
    #[must_use]
    pub fn floor(self) -> Self {
        self.round_floor(0)
    }
}

impl Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Self) -> Self {
        Self::pack(self.unpack().add(rhs.unpack()))
    }
}

impl Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Self) -> Self {
        // raw negation keeps the near-zero encodings intact
        self + rhs.neg_raw()
    }
}

impl Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Self) -> Self {
        Self::pack(self.unpack().mul(rhs.unpack()))
    }
}

impl Div for Decimal {
    type Output = Decimal;

    /// Division at [`DIVISION_PRECISION`] decimal places; an inexact
    /// quotient is rounded to nearest and flagged lossy.
    fn div(self, rhs: Self) -> Self {
        let m2 = rhs.unpack().m;
        let (mut q, r, _) = self.unpack().div_rem(rhs.unpack(), DIVISION_PRECISION);

        if r != 0 {
            q.v |= LOSS;

            if (r << 1) >= m2 {
                q.m += 1;
            }
        }

        Self::pack(q)
    }
}

impl Rem for Decimal {
    type Output = Decimal;

    fn rem(self, rhs: Self) -> Self {
        self.quo_rem(rhs, 0).1
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Self {
        // zero and the unsigned near-zero have no negative
        if self.is_exactly_zero() || self == Decimal::NEAR_ZERO {
            self
        } else {
            self.neg_raw()
        }
    }
}

impl AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Decimal {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for Decimal {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl DivAssign for Decimal {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl RemAssign for Decimal {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Product for Decimal {
    fn product<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::from(1i64), Mul::mul)
    }
}

impl<'a> Product<&'a Decimal> for Decimal {
    fn product<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.copied().product()
    }
}

// ============================================================================
// Comparison
// ============================================================================

impl Decimal {
    /// Numeric equality: ignores the loss flag and treats null, zero and
    /// every near-zero as equal. Use `==` for bit-pattern identity.
    #[must_use]
    pub fn equal(self, rhs: Self) -> bool {
        (self - rhs).is_zero()
    }

    /// Numeric comparison, derived from the sign of the difference. No
    /// `Ord` impl is provided: NaN and the null/zero split make numeric
    /// order inconsistent with the bitwise `Eq`.
    #[must_use]
    pub fn compare(self, rhs: Self) -> Ordering {
        let d = self - rhs;

        if d.is_zero() {
            Ordering::Equal
        } else if d.is_positive() {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }

    /// `self > rhs` numerically.
    #[must_use]
    pub fn greater_than(self, rhs: Self) -> bool {
        (self - rhs).is_positive()
    }

    /// `self >= rhs` numerically.
    #[must_use]
    pub fn greater_than_or_equal(self, rhs: Self) -> bool {
        let d = self - rhs;

        d.is_positive() || d.is_zero()
    }

    /// `self < rhs` numerically.
    #[must_use]
    pub fn less_than(self, rhs: Self) -> bool {
        rhs.greater_than(self)
    }

    /// `self <= rhs` numerically.
    #[must_use]
    pub fn less_than_or_equal(self, rhs: Self) -> bool {
        rhs.greater_than_or_equal(self)
    }

    /// The numerically smaller of the two.
    #[must_use]
    pub fn min(self, rhs: Self) -> Self {
        if self.greater_than_or_equal(rhs) {
            rhs
        } else {
            self
        }
    }

    /// The numerically larger of the two.
    #[must_use]
    pub fn max(self, rhs: Self) -> Self {
        if rhs.greater_than_or_equal(self) {
            rhs
        } else {
            self
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

impl Decimal {
    /// Sums with the Kahan-Babuska-Neumaier compensation, recovering
    /// low-order digits that a plain running sum would lose.
    #[must_use]
    pub fn sum_exact<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let mut iter = values.into_iter();

        let mut sum = match iter.next() {
            Some(first) => first,
            None => return Decimal::ZERO,
        };
        let mut c = Decimal::ZERO;

        for item in iter {
            let t = sum + item;

            if sum.abs().greater_than_or_equal(item.abs()) {
                c = c + ((sum - t) + item);
            } else {
                c = c + ((item - t) + sum);
            }

            sum = t;
        }

        sum + c
    }

    /// Average over the values, via [`Decimal::sum_exact`]. Null when the
    /// input is empty.
    #[must_use]
    pub fn avg<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Decimal>,
    {
        let mut n: i64 = 0;
        let sum = Self::sum_exact(values.into_iter().inspect(|_| n += 1));

        if n == 0 {
            return Decimal::NULL;
        }

        sum / Decimal::from(n)
    }
}

// ============================================================================
// Integer and float conversion
// ============================================================================

impl Decimal {
    fn int_part_impl(self) -> (i64, bool) {
        if self.is_integer() {
            if self == Decimal::ZERO {
                return (0, true);
            }
            return (self.0, true);
        }

        let Tuple { v, mut m, e } = self.unpack();

        if v & LOSS != 0 && m == 0 {
            if e == E_ABOVE {
                if self.0 < 0 {
                    return (i64::MIN, false);
                }
                return (i64::MAX, false);
            }
            return (0, false);
        }

        if e == 0 {
            // unreachable for normalized values, kept for symmetry
            (if self.0 < 0 { -(m as i64) } else { m as i64 }, true)
        } else if e > 0 {
            let p = (m as u128) * (TEN_POW[e as usize] as u128);

            // bounded by the mantissa cap, not i64::MAX: a rebased value
            // beyond the cap could never have been a plain-integer encoding
            if (p >> 64) == 0 && (p as u64) <= Self::MAX_M {
                let i = p as i64;

                (if self.0 < 0 { -i } else { i }, true)
            } else if self.0 < 0 {
                (i64::MIN, false)
            } else {
                (i64::MAX, false)
            }
        } else {
            m /= TEN_POW[-e as usize];

            (if self.0 < 0 { -(m as i64) } else { m as i64 }, true)
        }
    }

    /// Truncated integer part, or [`DecimalError::OutOfRange`] when it
    /// does not fit an `i64` or the value is not finite.
    pub fn to_i64(self) -> Result<i64> {
        match self.int_part_impl() {
            (i, true) => Ok(i),
            (_, false) => Err(DecimalError::OutOfRange),
        }
    }

    /// Truncated integer part, saturating out-of-range values.
    #[must_use]
    pub fn int_part(self) -> i64 {
        self.int_part_impl().0
    }

    /// Nearest `f64`, with a flag telling whether the conversion (and the
    /// value itself) is exact.
    #[must_use]
    pub fn to_f64(self) -> (f64, bool) {
        let Tuple { v, m, mut e } = self.unpack();

        let mut exact = v & LOSS == 0;

        if m == 0 {
            let mut f = 0.0;

            if v & LOSS != 0 {
                if e == E_ABOVE {
                    f = if v & SIGN != 0 { f64::NEG_INFINITY } else { f64::INFINITY };
                } else if e != 0 && e != E_BELOW {
                    f = f64::NAN;
                }
            }

            return (f, exact);
        }

        let mut f = m as f64;
        let big = TEN_POW[TEN_POW.len() - 1];

        if e == 0 {
            if m >= (1 << 54) {
                exact = false;
            }
        } else if e > 0 {
            while e >= TEN_POW.len() as i64 {
                f *= big as f64;
                e -= TEN_POW.len() as i64 - 1;
                exact = false;
            }
            f *= TEN_POW[e as usize] as f64;
            if f > (1u64 << 54) as f64 {
                exact = false;
            }
        } else {
            while e <= -(TEN_POW.len() as i64) {
                f /= big as f64;
                e += TEN_POW.len() as i64 - 1;
                exact = false;
            }
            f /= TEN_POW[-e as usize] as f64;
        }

        if v & SIGN != 0 {
            f = -f;
        }

        (f, exact)
    }

    /// Nearest `f64`, discarding the exactness flag.
    #[must_use]
    pub fn inexact_f64(self) -> f64 {
        self.to_f64().0
    }
}

// ============================================================================
// Float-backed math
// ============================================================================

impl Decimal {
    /// Natural logarithm, rounded to `precision` decimal places.
    #[must_use]
    pub fn ln(self, precision: i32) -> Self {
        let (f, exact) = self.to_f64();

        Self::from_f64_exact(f.ln(), exact).round(precision)
    }

    /// Square root. Negative values yield NaN.
    #[must_use]
    pub fn sqrt(self) -> Self {
        let (f, exact) = self.to_f64();

        Self::from_f64_exact(f.sqrt(), exact)
    }

    /// `self` raised to `rhs`.
    #[must_use]
    pub fn pow(self, rhs: Self) -> Self {
        let (f1, x1) = self.to_f64();
        let (f2, x2) = rhs.to_f64();

        Self::from_f64_exact(f1.powf(f2), x1 && x2)
    }

    /// Arctangent of `self`, in radians.
    #[must_use]
    pub fn atan(self) -> Self {
        let (f, exact) = self.to_f64();

        Self::from_f64_exact(f.atan(), exact)
    }

    /// Cosine of `self` radians.
    #[must_use]
    pub fn cos(self) -> Self {
        let (f, exact) = self.to_f64();

        Self::from_f64_exact(f.cos(), exact)
    }

    /// Sine of `self` radians.
    #[must_use]
    pub fn sin(self) -> Self {
        let (f, exact) = self.to_f64();

        Self::from_f64_exact(f.sin(), exact)
    }

    /// Tangent of `self` radians.
    #[must_use]
    pub fn tan(self) -> Self {
        let (f, exact) = self.to_f64();

        Self::from_f64_exact(f.tan(), exact)
    }
}

// ============================================================================
// Text
// ============================================================================

impl Decimal {
    /// Plain string form for machine consumers: no loss marker, the
    /// near-zeros become `0`, NaN and the infinities become `null`.
    #[must_use]
    pub fn to_plain_string(self) -> String {
        let Tuple { v, m, e } = self.unpack();

        let mut out = StrBuf::new();
        text::write_tuple(&mut out, v, m, e, "", false);

        out.as_str().to_owned()
    }
}

impl fmt::Display for Decimal {
    /// Extended form accepted back by the parser: `~` marks loss, magic
    /// values print as `~0`, `+~0`, `-~0`, `+Inf`, `-Inf` and `NaN`.
    /// Null displays as `0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0");
        }

        let Tuple { v, m, e } = self.unpack();

        let mut out = StrBuf::new();
        text::write_tuple(&mut out, v, m, e, "", true);

        f.write_str(out.as_str())
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Decimal(null)");
        }

        write!(f, "Decimal({self})")
    }
}

// ============================================================================
// Binary codec
// ============================================================================

impl Decimal {
    /// Compact binary form, 1 to 10 bytes. The first byte carries the
    /// sign, loss and exponent bits; bit 0 flags a varint-encoded mantissa
    /// following it. Zero is `[0x80]`, null `[0x00]`.
    #[must_use]
    pub fn to_binary(self) -> Vec<u8> {
        let mag = self.magnitude();

        let x = if self.0 < 0 {
            ((mag | SIGN) >> (BIT_E - 1)) as u8
        } else {
            (mag >> (BIT_E - 1)) as u8
        };

        let mut m = mag & Self::MAX_M;

        if m == 0 {
            // bit 0 is clear exactly when the mantissa is zero
            return vec![x];
        }

        let mut data = Vec::with_capacity(10);
        data.push(x | 1);

        while m >= 0x80 {
            data.push(m as u8 | 0x80);
            m >>= 7;
        }
        data.push(m as u8);

        data
    }

    /// Decodes the [`Decimal::to_binary`] form.
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        let first = *data.first().ok_or(DecimalError::Format)?;

        let mut u = (first as u64) << (BIT_E - 1);

        if first & 1 != 0 {
            u ^= 1 << (BIT_E - 1);
            u |= uvarint(&data[1..])?;
        }

        if u & SIGN != 0 && Decimal(u as i64) != Decimal::ZERO {
            Ok(Decimal(((u ^ SIGN) as i64).wrapping_neg()))
        } else {
            Ok(Decimal(u as i64))
        }
    }
}

fn uvarint(data: &[u8]) -> Result<u64> {
    let mut x: u64 = 0;
    let mut shift = 0u32;

    for &b in data {
        // the tenth byte contributes a single bit; anything above it would
        // shift past position 63 and silently vanish
        if shift >= 64 || shift == 63 && b > 1 {
            return Err(DecimalError::Format);
        }

        x |= ((b & 0x7f) as u64) << shift;

        if b & 0x80 == 0 {
            return Ok(x);
        }

        shift += 7;
    }

    Err(DecimalError::Format)
}

// ============================================================================
// Serde
// ============================================================================

#[cfg(feature = "serde")]
impl serde::Serialize for Decimal {
    /// Human-readable formats get the extended string form; binary formats
    /// get the raw packed `i64`.
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            let mut out = StrBuf::new();

            if self.is_null() {
                return serializer.serialize_str("0");
            }

            let Tuple { v, m, e } = self.unpack();
            text::write_tuple(&mut out, v, m, e, "", true);

            serializer.serialize_str(out.as_str())
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        struct DecimalVisitor;

        impl serde::de::Visitor<'_> for DecimalVisitor {
            type Value = Decimal;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal string or number")
            }

            fn visit_str<E: Error>(self, s: &str) -> core::result::Result<Decimal, E> {
                s.parse().map_err(E::custom)
            }

            fn visit_i64<E: Error>(self, i: i64) -> core::result::Result<Decimal, E> {
                Ok(Decimal::from(i))
            }

            fn visit_u64<E: Error>(self, u: u64) -> core::result::Result<Decimal, E> {
                Ok(Decimal::from(u))
            }

            fn visit_f64<E: Error>(self, f: f64) -> core::result::Result<Decimal, E> {
                Ok(Decimal::from_f64(f))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_any(DecimalVisitor)
        } else {
            Ok(Decimal(i64::deserialize(deserializer)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().expect(s)
    }

    #[test]
    fn constants_are_distinct() {
        let all = [
            Decimal::NULL,
            Decimal::ZERO,
            Decimal::NEAR_ZERO,
            Decimal::NEAR_POSITIVE_ZERO,
            Decimal::NEAR_NEGATIVE_ZERO,
            Decimal::INFINITY,
            Decimal::NEG_INFINITY,
            Decimal::NAN,
        ];

        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn integers_encode_as_themselves() {
        for i in [1i64, -1, 42, -320, 1_000_000, Decimal::MAX_MANTISSA, -Decimal::MAX_MANTISSA] {
            assert_eq!(Decimal::from(i).to_raw(), i);
        }
        assert_eq!(Decimal::from(0i64), Decimal::ZERO);
    }

    #[test]
    fn parse_is_canonical() {
        assert_eq!(d("6.000000"), Decimal::from(6i64));
        assert_eq!(d("1.47000"), d("1.47"));
        assert_eq!(d("3.14e2"), Decimal::from(314i64));
        assert_eq!(d(".0001"), Decimal::new(1, -4));
    }

    #[test]
    fn parse_zeros() {
        for s in ["0", "0.00", "-0", "+0", "0e5", "no", "No", "NO", "off", "OFF", "-0.0000"] {
            assert_eq!(d(s), Decimal::ZERO, "{s}");
        }
        for s in ["1", "on", "ON", "yes", "YES"] {
            assert_eq!(d(s), Decimal::from(1i64), "{s}");
        }
    }

    #[test]
    fn parse_near_zeros_and_magic() {
        assert_eq!(d("~0"), Decimal::NEAR_ZERO);
        assert_eq!(d("~+0"), Decimal::NEAR_POSITIVE_ZERO);
        assert_eq!(d("~-0"), Decimal::NEAR_NEGATIVE_ZERO);
        assert_eq!(d(""), Decimal::NULL);
        assert_eq!(d("null"), Decimal::NULL);
        assert_eq!(d("nil"), Decimal::NULL);
        assert_eq!(d("inf"), Decimal::INFINITY);
        assert_eq!(d("-inf"), Decimal::NEG_INFINITY);
        assert!(d("nan").is_nan());
        // an exponent far out of range degrades, it does not error
        assert_eq!(d("1E1000"), Decimal::INFINITY);
        assert_eq!(d("-1.234E+500"), Decimal::NEG_INFINITY);
        assert_eq!(d("1.234e-40"), Decimal::NEAR_POSITIVE_ZERO);
    }

    #[test]
    fn parse_errors() {
        for s in ["0.a", ".123e--19", "azerty", "-mCF", "-+23"] {
            assert!(s.parse::<Decimal>().is_err(), "{s}");
        }
    }

    #[test]
    fn display_round_trips() {
        for s in ["0", "1", "-1", "12.345", "-0.001", "123000000000000000", "~0", "+~0", "-~0", "+Inf", "-Inf", "NaN"] {
            assert_eq!(d(s).to_string(), s, "{s}");
        }
        assert_eq!(Decimal::NULL.to_string(), "0");
        assert_eq!(Decimal::new(-12_345, -3).to_string(), "-12.345");
    }

    #[test]
    fn plain_string_folds_magic() {
        assert_eq!(Decimal::NEAR_ZERO.to_plain_string(), "0");
        assert_eq!(Decimal::NEAR_NEGATIVE_ZERO.to_plain_string(), "0");
        assert_eq!(Decimal::INFINITY.to_plain_string(), "null");
        assert_eq!(Decimal::NAN.to_plain_string(), "null");
        assert_eq!(d("~1.5").to_plain_string(), "1.5");
    }

    #[test]
    fn add_exact() {
        assert_eq!(d("123.456") + d("0.544"), Decimal::from(124i64));
        assert_eq!(d("0.1") + d("0.2"), d("0.3"));
        assert_eq!(Decimal::from(1i64) + Decimal::from(-1i64), Decimal::ZERO);
        // null behaves as zero
        assert_eq!(Decimal::NULL + d("5"), d("5"));
    }

    #[test]
    fn mul_exact() {
        assert_eq!(d("0.001") * Decimal::from(1000i64), Decimal::from(1i64));
        assert_eq!(d("11") * d("11"), d("121"));
    }

    #[test]
    fn big_number_chain() {
        let a = Decimal::from(123_456_789_012_345_678i64);
        let b = Decimal::from(6_543_210_987_654_321i64);

        let s = a + b;
        assert_eq!(s.to_string(), "129999999999999999");

        let s = s + Decimal::from(1i64);
        assert_eq!(s.to_string(), "130000000000000000");

        let s = s + Decimal::from(1i64);
        assert_eq!(s.to_string(), "130000000000000001");

        let p = s * Decimal::from(111_111_111i64);
        assert_eq!(p.to_string(), "~14444444430000000000000000");
        assert!(!p.is_exact());
    }

    #[test]
    fn add_survives_aligned_mantissa_overflow() {
        // aligning 1844674407370955e4 against an exponent-0 operand scales
        // its mantissa to within 2000 of 2^64, so the raw sum no longer
        // fits 64 bits and must shed a digit instead of wrapping
        let a = Decimal::new(1_844_674_407_370_955, 4);
        let s = a + Decimal::from(2000i64);
        assert_eq!(s, Decimal::new(18_446_744_073_709_552, 3));
        assert!(s.is_exact());

        // a nonzero dropped digit marks the reduced sum
        let t = a + Decimal::from(2005i64);
        assert!(!t.is_exact());
        assert!(t.equal(Decimal::new(18_446_744_073_709_552, 3)));
    }

    #[test]
    fn require_from_str_parses_valid_literals() {
        assert_eq!(Decimal::require_from_str("-12.5"), Decimal::new(-125, -1));
    }

    #[test]
    #[should_panic(expected = "invalid decimal literal")]
    fn require_from_str_panics_on_garbage() {
        Decimal::require_from_str("12..5");
    }

    #[test]
    fn mul_overflows_to_infinity() {
        let max = Decimal::new(Decimal::MAX_MANTISSA, 2);
        assert_eq!(max * max, Decimal::INFINITY);
    }

    #[test]
    fn div_chain() {
        // (((-1001/1000) - 1) * 14000 + 14) / -28 == 1000
        let x = d("-1001") / d("1000");
        let x = x - Decimal::from(1i64);
        let x = x * d("14000") + d("14");
        assert_eq!(x / d("-28"), Decimal::from(1000i64));
    }

    #[test]
    fn div_by_magic() {
        assert_eq!(d("2") / Decimal::INFINITY, Decimal::NEAR_POSITIVE_ZERO);
        assert_eq!(d("2") / Decimal::NEG_INFINITY, Decimal::NEAR_NEGATIVE_ZERO);
        assert_eq!(d("2") / Decimal::NEAR_POSITIVE_ZERO, Decimal::INFINITY);
        assert_eq!(d("2") / Decimal::NEAR_NEGATIVE_ZERO, Decimal::NEG_INFINITY);
        assert!((Decimal::ZERO / Decimal::NEAR_NEGATIVE_ZERO).is_nan());
        assert!((d("1") / Decimal::ZERO).is_nan());
        assert!((d("1") / Decimal::NULL).is_nan());
    }

    #[test]
    fn quo_rem() {
        let (q, r) = d("4").quo_rem(d("3"), 3);
        assert_eq!(q, d("1.333"));
        assert_eq!(r, d("0.001"));

        let (q, r) = d("42.35").quo_rem(d("5.5"), 1);
        assert_eq!(q, d("7.7"));
        assert_eq!(r, Decimal::ZERO);

        let (q, r) = d("42.35").quo_rem(d("5.5"), 0);
        assert_eq!(q, d("7"));
        assert_eq!(r, d("3.85"));
    }

    #[test]
    fn rem_operator() {
        assert_eq!(d("7") % d("3"), d("1"));
        assert_eq!(d("-7") % d("3"), d("-1"));
        assert_eq!(d("7.5") % d("2"), d("1.5"));
    }

    #[test]
    fn cumulative_cents() {
        let cent = d("0.01");
        let mut total = Decimal::ZERO;

        for _ in 0..100_000 {
            total += cent;
        }

        assert_eq!(total, Decimal::from(1000i64));
        assert!(total.is_exact());
    }

    #[test]
    fn round_half_up() {
        assert_eq!(d("5.45").round(1), d("5.5"));
        assert_eq!(d("545").round(-1), d("550"));
        assert_eq!(d("5.44").round(1), d("5.4"));
        assert_eq!(d("-5.45").round(1), d("-5.4"));
    }

    #[test]
    fn round_bank() {
        assert_eq!(d("5.45").round_bank(1), d("5.4"));
        assert_eq!(d("545").round_bank(-1), d("540"));
        assert_eq!(d("5.46").round_bank(1), d("5.5"));
        assert_eq!(d("546").round_bank(-1), d("550"));
        assert_eq!(d("5.55").round_bank(1), d("5.6"));
        assert_eq!(d("555").round_bank(-1), d("560"));
    }

    #[test]
    fn round_directed() {
        assert_eq!(d("-1.454").round_ceil(1), d("-1.4"));
        assert_eq!(d("-1.454").round_floor(1), d("-1.5"));
        assert_eq!(d("1.454").round_ceil(1), d("1.5"));
        assert_eq!(d("1.454").round_floor(1), d("1.4"));
        assert_eq!(d("545").round_floor(-2), d("500"));
        assert_eq!(d("-500").round_floor(-2), d("-500"));
        assert_eq!(d("1.1001").round_floor(2), d("1.1"));
        assert_eq!(d("0.001").ceil(), d("1"));
        assert_eq!(d("-0.001").floor(), d("-1"));
    }

    #[test]
    fn round_magic_pass_through() {
        assert_eq!(Decimal::NEAR_ZERO.round(2), Decimal::ZERO);
        assert_eq!(Decimal::NEAR_NEGATIVE_ZERO.round_floor(2), Decimal::ZERO);
        assert_eq!(Decimal::INFINITY.round(2), Decimal::INFINITY);
        assert!(Decimal::NAN.round(2).is_nan());
    }

    #[test]
    fn round_clears_loss() {
        let x = d("1") / d("3");
        assert!(!x.is_exact());
        assert!(x.round(2).is_exact());
        assert_eq!(x.round(2), d("0.33"));
    }

    #[test]
    fn predicates() {
        assert!(Decimal::NULL.is_null());
        assert!(!Decimal::ZERO.is_null());
        assert!(Decimal::ZERO.is_set());
        assert!(Decimal::NULL.is_exactly_zero());
        assert!(Decimal::ZERO.is_exactly_zero());
        assert!(!Decimal::NEAR_ZERO.is_exactly_zero());
        assert!(Decimal::NEAR_ZERO.is_zero());
        assert!(Decimal::NEAR_POSITIVE_ZERO.is_zero());
        assert!(Decimal::NEAR_NEGATIVE_ZERO.is_zero());
        assert!(!d("0.001").is_zero());

        assert!(d("1").is_positive());
        assert!(Decimal::NEAR_POSITIVE_ZERO.is_positive());
        assert!(!Decimal::NAN.is_positive());
        assert!(d("-1").is_negative());
        assert!(Decimal::NEAR_NEGATIVE_ZERO.is_negative());
        assert!(!Decimal::ZERO.is_negative());

        assert!(Decimal::INFINITY.is_infinite());
        assert!(Decimal::NEG_INFINITY.is_infinite());
        assert!(!Decimal::NAN.is_infinite());
        assert!(Decimal::NAN.is_nan());
        assert!(!Decimal::INFINITY.is_nan());
        assert!(!Decimal::NEAR_POSITIVE_ZERO.is_nan());
        assert!(!Decimal::NEAR_ZERO.is_nan());
        assert!(!Decimal::ZERO.is_nan());

        assert!(d("42").is_integer());
        assert!(Decimal::ZERO.is_integer());
        assert!(!d("4.2").is_integer());

        assert!(d("42").is_exact());
        assert!(!(d("1") / d("3")).is_exact());
    }

    #[test]
    fn sign_and_neg() {
        assert_eq!(Decimal::NULL.sign(), 0);
        assert_eq!(Decimal::ZERO.sign(), 0);
        assert_eq!(Decimal::NEAR_ZERO.sign(), 0);
        assert_eq!(d("0.5").sign(), 1);
        assert_eq!(d("-0.5").sign(), -1);
        assert_eq!(Decimal::NEAR_POSITIVE_ZERO.sign(), 1);
        assert_eq!(Decimal::NEAR_NEGATIVE_ZERO.sign(), -1);

        assert_eq!(-Decimal::ZERO, Decimal::ZERO);
        assert_eq!(-Decimal::NEAR_ZERO, Decimal::NEAR_ZERO);
        assert_eq!(-Decimal::NEAR_POSITIVE_ZERO, Decimal::NEAR_NEGATIVE_ZERO);
        assert_eq!(-Decimal::INFINITY, Decimal::NEG_INFINITY);
        assert_eq!(-d("1.5"), d("-1.5"));
        assert_eq!(d("-1.5").abs(), d("1.5"));
    }

    #[test]
    fn if_null() {
        assert_eq!(Decimal::NULL.if_null(d("7")), d("7"));
        assert_eq!(Decimal::ZERO.if_null(d("7")), Decimal::ZERO);
        assert_eq!(d("3").if_null(d("7")), d("3"));
    }

    #[test]
    fn numeric_comparison() {
        assert!(d("1").greater_than(d("0.5")));
        assert!(d("-2").less_than(d("-1")));
        assert_eq!(d("1.50").compare(d("1.5")), Ordering::Equal);
        // numeric equality crosses the zero family
        assert!(Decimal::NULL.equal(Decimal::ZERO));
        assert!(Decimal::NEAR_ZERO.equal(Decimal::ZERO));
        assert!(Decimal::NEAR_POSITIVE_ZERO.equal(Decimal::NEAR_NEGATIVE_ZERO));
        assert!(!d("0.001").equal(Decimal::ZERO));
        // but bitwise equality does not
        assert_ne!(Decimal::NULL, Decimal::ZERO);

        assert_eq!(d("3").min(d("5")), d("3"));
        assert_eq!(d("3").max(d("5")), d("5"));
        assert_eq!(d("-3").min(d("-5")), d("-5"));
    }

    #[test]
    fn comparison_orders_mixed_exponents() {
        // raw-word `<`/`>` is not a numeric order once exponents differ
        // (the two's-complement exponent bits dominate the word), so the
        // derived comparisons are the only valid order here
        let sorted = ["-1000", "-1.5", "-0.001", "0.001", "1.5", "1000"].map(d);

        for w in sorted.windows(2) {
            assert!(w[0].less_than(w[1]));
            assert!(w[1].greater_than(w[0]));
        }

        // among nonzero plain-integer encodings the raw word is the value
        // itself, so there the native order does hold
        let ints = [-1000i64, -2, 1, 7, 1000].map(Decimal::from);
        for w in ints.windows(2) {
            assert!(w[0].to_raw() < w[1].to_raw());
        }
    }

    #[test]
    fn int_conversion() {
        assert_eq!(d("12.7").to_i64().unwrap(), 12);
        assert_eq!(d("-12.7").to_i64().unwrap(), -12);
        assert_eq!(Decimal::ZERO.to_i64().unwrap(), 0);
        assert_eq!(Decimal::NULL.to_i64().unwrap(), 0);
        assert_eq!(d("123e15").to_i64().unwrap(), 123_000_000_000_000_000);

        // beyond the mantissa cap the integer part is out of range even
        // though it would still fit an i64
        assert!(d("9e17").to_i64().is_err());
        assert_eq!(d("9e17").int_part(), i64::MAX);
        assert_eq!(d("-9e17").int_part(), i64::MIN);

        assert!(Decimal::INFINITY.to_i64().is_err());
        assert_eq!(Decimal::INFINITY.int_part(), i64::MAX);
        assert_eq!(Decimal::NEG_INFINITY.int_part(), i64::MIN);
        assert!(Decimal::NAN.to_i64().is_err());
        assert_eq!(Decimal::NAN.int_part(), 0);
        assert_eq!(Decimal::NEAR_POSITIVE_ZERO.int_part(), 0);
    }

    #[test]
    fn float_conversion() {
        assert_eq!(Decimal::from_f64(-14.999), Decimal::new(-14_999, -3));
        assert_eq!(Decimal::from_f64(0.01), Decimal::new(1, -2));
        assert_eq!(Decimal::from_f64(1.5), d("1.5"));
        assert_eq!(Decimal::from_f64(1024.0), d("1024"));
        assert!(Decimal::from_f64(1.123e-10).equal(Decimal::new(1123, -13)));
        assert_eq!(Decimal::from_f64(0.0), Decimal::ZERO);
        assert_eq!(Decimal::from_f64(f64::INFINITY), Decimal::INFINITY);
        assert_eq!(Decimal::from_f64(f64::NEG_INFINITY), Decimal::NEG_INFINITY);
        assert!(Decimal::from_f64(f64::NAN).is_nan());
        assert_eq!(Decimal::from_f64(1.1e-70), Decimal::NEAR_POSITIVE_ZERO);

        assert_eq!(Decimal::from_f32(1.5f32), d("1.5"));
        assert_eq!(Decimal::from_f32(0.0f32), Decimal::ZERO);

        let (f, exact) = d("1.5").to_f64();
        assert_eq!(f, 1.5);
        assert!(exact);

        assert_eq!(Decimal::INFINITY.inexact_f64(), f64::INFINITY);
        assert!(Decimal::NAN.inexact_f64().is_nan());
        assert_eq!(Decimal::NEAR_ZERO.inexact_f64(), 0.0);
    }

    #[test]
    fn float_backed_math() {
        let two = d("2");
        let r = two.sqrt();
        assert_eq!((r * r).round(15), two);

        assert_eq!(d("1").ln(6), Decimal::ZERO);
        assert_eq!(d("2").pow(d("10")), d("1024"));
        assert_eq!(Decimal::ZERO.cos(), d("1"));
        assert_eq!(Decimal::ZERO.sin(), Decimal::ZERO);
        assert!(d("-1").sqrt().is_nan());
        assert_eq!(Decimal::INFINITY.sqrt(), Decimal::INFINITY);
    }

    #[test]
    fn kahan_sum() {
        let values = [d("1"), d("1e30"), d("1"), d("-1e30")];

        let sum = Decimal::sum_exact(values);
        assert!(sum.equal(d("2")));

        let avg = Decimal::avg(values);
        assert!(avg.equal(d("0.5")));

        assert_eq!(Decimal::sum_exact([]), Decimal::ZERO);
        assert_eq!(Decimal::avg([]), Decimal::NULL);
    }

    #[test]
    fn iterator_sum_product() {
        let xs = [d("1.5"), d("2.5"), d("-1")];
        assert_eq!(xs.iter().sum::<Decimal>(), d("3"));
        assert_eq!(xs.iter().product::<Decimal>(), d("-3.75"));
        assert_eq!(core::iter::empty::<Decimal>().sum::<Decimal>(), Decimal::ZERO);
    }

    #[test]
    fn binary_codec_vectors() {
        let cases: [(&str, &[u8]); 8] = [
            ("0", &[0x80]),
            ("", &[0x00]),
            ("100", &[0x01, 0x64]),
            ("~0", &[0xc0]),
            ("+~0", &[0x60]),
            ("-~0", &[0xe0]),
            ("-320", &[0x81, 0xc0, 0x02]),
            ("1.01", &[0x3d, 0x65]),
        ];

        for (s, bytes) in cases {
            let v = d(s);
            assert_eq!(v.to_binary(), bytes, "{s}");
            assert_eq!(Decimal::from_binary(bytes).unwrap(), v, "{s}");
        }
    }

    #[test]
    fn binary_codec_rejects_bad_input() {
        assert!(Decimal::from_binary(&[]).is_err());
        // continuation bit set but no varint bytes follow
        assert!(Decimal::from_binary(&[0x01]).is_err());
        assert!(Decimal::from_binary(&[0x01, 0x80]).is_err());

        // a ten-byte varint may only contribute one bit in its last byte;
        // anything larger would shift past position 63
        let overlong = [0x01, 0x81, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x02];
        assert!(Decimal::from_binary(&overlong).is_err());
        // eleven varint bytes are over the wire limit outright
        let eleven = [0x01, 0x81, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert!(Decimal::from_binary(&eleven).is_err());
    }

    #[test]
    fn exponent_and_mantissa() {
        assert_eq!(d("12.345").mantissa(), 12_345);
        assert_eq!(d("12.345").exponent(), -3);
        assert_eq!(d("-12.345").mantissa(), 12_345);
        assert_eq!(d("100").mantissa(), 100);
        assert_eq!(d("100").exponent(), 0);
        assert_eq!(Decimal::NEAR_POSITIVE_ZERO.exponent(), i32::MIN);
        assert_eq!(Decimal::INFINITY.exponent(), i32::MAX);
    }

    #[test]
    fn loss_is_sticky_through_add() {
        let lossy = d("~1");
        assert!(!(lossy + d("1")).is_exact());
        assert_eq!((lossy + d("1")).to_string(), "~2");
    }

    #[test]
    fn near_zero_add_reconciliation() {
        // matching signs keep the direction, conflicting ones erase it
        assert_eq!(
            Decimal::NEAR_POSITIVE_ZERO + Decimal::NEAR_POSITIVE_ZERO,
            Decimal::NEAR_POSITIVE_ZERO
        );
        assert_eq!(
            Decimal::NEAR_POSITIVE_ZERO + Decimal::NEAR_NEGATIVE_ZERO,
            Decimal::NEAR_ZERO
        );
        assert_eq!(Decimal::NEAR_ZERO + Decimal::NEAR_ZERO, Decimal::NEAR_ZERO);
        // infinities
        assert_eq!(Decimal::INFINITY + Decimal::INFINITY, Decimal::INFINITY);
        assert!((Decimal::INFINITY + Decimal::NEG_INFINITY).is_nan());
        assert_eq!(Decimal::INFINITY + d("5"), Decimal::INFINITY);
        assert_eq!(Decimal::INFINITY + Decimal::NEAR_ZERO, Decimal::INFINITY);
        // near-zero against ordinary values marks loss
        let x = Decimal::NEAR_ZERO + d("5");
        assert!(x.equal(d("5")));
        assert!(!x.is_exact());
        // near-zero against exact zero keeps the near-zero
        assert_eq!(Decimal::NEAR_ZERO + Decimal::ZERO, Decimal::NEAR_ZERO);
    }

    /// The eight reserved states, paired with their display names for
    /// failure messages in the truth-table sweeps.
    const MAGIC: [(Decimal, &str); 8] = [
        (Decimal::NULL, "null"),
        (Decimal::ZERO, "0"),
        (Decimal::NEAR_ZERO, "~0"),
        (Decimal::NEAR_POSITIVE_ZERO, "+~0"),
        (Decimal::NEAR_NEGATIVE_ZERO, "-~0"),
        (Decimal::INFINITY, "+Inf"),
        (Decimal::NEG_INFINITY, "-Inf"),
        (Decimal::NAN, "NaN"),
    ];

    #[test]
    fn magic_add_truth_table() {
        // exact zeros absorb into the right operand bitwise (so 0 + null is
        // null), near-zeros dominate zeros, conflicting near-zero signs
        // erase to ~0, infinities of opposite sign are NaN, NaN is sticky
        #[rustfmt::skip]
        let expected: [[usize; 8]; 8] = [
            [0, 1, 2, 3, 4, 5, 6, 7], // null
            [0, 1, 2, 3, 4, 5, 6, 7], // 0
            [2, 2, 2, 2, 2, 5, 6, 7], // ~0
            [3, 3, 2, 3, 2, 5, 6, 7], // +~0
            [4, 4, 2, 2, 4, 5, 6, 7], // -~0
            [5, 5, 5, 5, 5, 5, 7, 7], // +Inf
            [6, 6, 6, 6, 6, 7, 6, 7], // -Inf
            [7, 7, 7, 7, 7, 7, 7, 7], // NaN
        ];

        for (i, &(a, an)) in MAGIC.iter().enumerate() {
            for (j, &(b, bn)) in MAGIC.iter().enumerate() {
                let got = a + b;
                let (want, wn) = MAGIC[expected[i][j]];
                assert_eq!(got, want, "{an} + {bn} should be {wn}, got {got:?}");
            }
        }
    }

    #[test]
    fn magic_mul_truth_table() {
        // a left-hand exact zero (or null) short-circuits to zero before the
        // right operand is examined, so 0 * +Inf is 0 while +Inf * 0 is NaN;
        // the multiplication table is deliberately asymmetric there
        #[rustfmt::skip]
        let expected: [[usize; 8]; 8] = [
            [1, 1, 1, 1, 1, 1, 1, 1], // null
            [1, 1, 1, 1, 1, 1, 1, 1], // 0
            [1, 1, 2, 2, 2, 7, 7, 7], // ~0
            [1, 1, 2, 3, 4, 7, 7, 7], // +~0
            [1, 1, 2, 4, 3, 7, 7, 7], // -~0
            [7, 7, 7, 7, 7, 5, 6, 7], // +Inf
            [7, 7, 7, 7, 7, 6, 5, 7], // -Inf
            [7, 7, 7, 7, 7, 7, 7, 7], // NaN
        ];

        for (i, &(a, an)) in MAGIC.iter().enumerate() {
            for (j, &(b, bn)) in MAGIC.iter().enumerate() {
                let got = a * b;
                let (want, wn) = MAGIC[expected[i][j]];
                assert_eq!(got, want, "{an} * {bn} should be {wn}, got {got:?}");
            }
        }

        // ordinary operands against the magic states
        assert_eq!(Decimal::NEAR_ZERO * d("5"), Decimal::NEAR_ZERO);
        assert_eq!(Decimal::NEAR_POSITIVE_ZERO * d("-5"), Decimal::NEAR_NEGATIVE_ZERO);
        assert_eq!(Decimal::INFINITY * d("-1"), Decimal::NEG_INFINITY);
        assert!((Decimal::NAN * d("5")).is_nan());
        assert_eq!(d("5") * Decimal::ZERO, Decimal::ZERO);
        assert_eq!(d("5") * Decimal::NULL, Decimal::ZERO);
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", d("1.5")), "Decimal(1.5)");
        assert_eq!(format!("{:?}", Decimal::NULL), "Decimal(null)");
        assert_eq!(format!("{:?}", Decimal::NAN), "Decimal(NaN)");
    }
}
