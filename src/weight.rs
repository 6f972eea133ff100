//! Unit-tagged weight quantities.
//!
//! A [`Weight`] packs the same sign, loss, exponent and mantissa fields as
//! [`Decimal`] into an `i64`, but reserves bits 53..57 for one of 14 mass
//! units. The mantissa is 53 bits instead of 57. Arithmetic converts the
//! right operand into the left operand's unit, so `123.45kg + 550g` is
//! `~124kg` while `550g + 123.45kg` is `~124000g`.

use core::fmt;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use core::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::text::{self, token_hash, StrBuf};
use crate::tuple::{Tuple, E_ABOVE, E_BELOW, LOSS, SIGN};
use crate::{Decimal, Result, DIVISION_PRECISION};

const MIN_E: i64 = -16;
const MAX_E: i64 = 15;
const BIT_E: u32 = 57;
const E_MASK: u64 = 0x3e00_0000_0000_0000;
const BIT_TAG: u32 = 53;
const TAG_MASK: u64 = 0x01e0_0000_0000_0000;

/// How a unit relates to the kilogram base unit.
#[derive(Clone, Copy)]
enum Conv {
    /// Power-of-ten multiple: the value scales by `10^shift` kilograms.
    Shift(i64),
    /// Exact decimal ratio, for the avoirdupois and troy units.
    Ratio(Decimal),
}

/// A recognized mass unit: its display name, the tag bits it packs into a
/// weight word, and its conversion to kilograms. Unit suffixes are matched
/// by case- and whitespace-insensitive hash, memoized on first use.
pub(crate) struct Unit {
    pub name: &'static str,
    pub tag: u64,
    conv: Conv,
    hash: AtomicU64,
}

impl Unit {
    const fn shift(name: &'static str, tag: u64, exp: i64) -> Self {
        Unit { name, tag, conv: Conv::Shift(exp), hash: AtomicU64::new(0) }
    }

    const fn ratio(name: &'static str, tag: u64, m: i64, e: i64) -> Self {
        let raw = m | ((((e as u64) & 0x1f) << BIT_E) as i64);

        Unit { name, tag, conv: Conv::Ratio(Decimal::from_raw(raw)), hash: AtomicU64::new(0) }
    }

    const fn reserved() -> Self {
        Unit { name: "", tag: 0, conv: Conv::Shift(0), hash: AtomicU64::new(0) }
    }

    pub(crate) fn hash(&self) -> u64 {
        let h = self.hash.load(Ordering::Relaxed);
        if h != 0 {
            return h;
        }

        let h = token_hash(self.name);
        self.hash.store(h, Ordering::Relaxed);

        h
    }
}

/// Unit table, indexed by tag. Entries past tag 15 are parse-only aliases
/// resolving to an earlier tag.
pub(crate) static UNITS: [Unit; 19] = [
    // metric, kilogram based
    Unit::shift("kg", 0, 0),
    Unit::shift("t", 1 << BIT_TAG, 3),
    Unit::shift("kt", 2 << BIT_TAG, 6),
    Unit::shift("Mt", 3 << BIT_TAG, 9),
    Unit::shift("Gt", 4 << BIT_TAG, 12),
    Unit::shift("g", 5 << BIT_TAG, -3),
    Unit::shift("mg", 6 << BIT_TAG, -6),
    Unit::shift("µg", 7 << BIT_TAG, -9),
    Unit::shift("ng", 8 << BIT_TAG, -12),
    Unit::shift("pg", 9 << BIT_TAG, -15),
    // tags 10 and 11 are reserved
    Unit::reserved(),
    Unit::reserved(),
    // international avoirdupois and troy
    Unit::ratio("lb", 12 << BIT_TAG, 45_359_237, -8),
    Unit::ratio("oz", 13 << BIT_TAG, 28_349_523_125, -12),
    Unit::ratio(" lb t", 14 << BIT_TAG, 3_732_417_216, -10),
    Unit::ratio(" oz t", 15 << BIT_TAG, 311_034_768, -10),
    // aliases
    Unit::shift("mcg", 7 << BIT_TAG, -9),
    Unit::ratio(" lb av", 12 << BIT_TAG, 45_359_237, -8),
    Unit::ratio(" oz av", 13 << BIT_TAG, 28_349_523_125, -12),
];

/// Packed 64-bit weight: a decimal value tagged with a mass unit.
///
/// The default value is [`Weight::NULL`]. Integers up to
/// [`Weight::MAX_MANTISSA`] encode as themselves with the `kg` unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Weight(i64);

impl Weight {
    /// The unset value; behaves as zero kilograms in arithmetic.
    pub const NULL: Weight = Weight(0);

    /// Exact zero kilograms.
    pub const ZERO: Weight = Weight(i64::MIN);

    /// Largest mantissa, and largest integer that still encodes with
    /// exponent zero. Doubles as the mantissa extraction mask.
    pub const MAX_MANTISSA: i64 = 0x001f_ffff_ffff_ffff;

    const MAX_M: u64 = Self::MAX_MANTISSA as u64;
}

// ============================================================================
// Packing
// ============================================================================

impl Weight {
    /// Reinterprets a raw packed word.
    #[inline(always)]
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Weight(raw)
    }

    /// Returns the raw packed word.
    #[inline(always)]
    #[must_use]
    pub const fn to_raw(self) -> i64 {
        self.0
    }

    /// Decodes into a tuple whose flag word keeps the unit tag bits, plus
    /// the matching unit table entry.
    fn unpack(self) -> (Tuple, &'static Unit) {
        let u = self.0.unsigned_abs();

        let mut v = if self.0 < 0 { (u & LOSS) | SIGN } else { u & LOSS };

        let mut e = (((u & E_MASK) << 2) as i64) >> (2 + BIT_E);
        let m = u & Self::MAX_M;

        let unit = &UNITS[((u & TAG_MASK) >> BIT_TAG) as usize];
        v |= u & TAG_MASK;

        if m == 0 {
            if e == MIN_E {
                e = E_BELOW;
            } else if e == MAX_E {
                e = E_ABOVE;
            }
        }

        (Tuple::new(v, m, e), unit)
    }

    /// Normalizes and packs a tuple, keeping the unit tag bits carried in
    /// its flag word. An exact zero packs to null only when every flag is
    /// clear; a tagged zero keeps its unit.
    fn pack(t: Tuple) -> Self {
        if t.m == 0 && t.v & LOSS == 0 {
            if t.v == 0 && t.e == 0 {
                return Weight::NULL;
            }
            if t.v & TAG_MASK == 0 {
                return Weight::ZERO;
            }
            return Weight((t.v & TAG_MASK) as i64);
        }

        // normalization never tries to switch to a better-fitting unit
        let t = t.normalize(Self::MAX_M, MIN_E, MAX_E);
        let u = t.v | t.m | (((t.e << BIT_E) as u64) & E_MASK);

        if u & SIGN != 0 {
            Weight(((u ^ SIGN) as i64).wrapping_neg())
        } else {
            Weight(u as i64)
        }
    }
}

// ============================================================================
// Construction
// ============================================================================

impl Weight {
    /// Builds `value * 10^exp` tagged with `unit`, which may also be a
    /// magic word. `Err` on an unrecognized unit.
    pub fn new(value: i64, exp: i32, unit: &str) -> Result<Self> {
        let (v, m, e) = if value <= 0 {
            (SIGN, value.unsigned_abs(), exp as i64)
        } else {
            (0, value as u64, exp as i64)
        };

        let (v, m, e) = text::unit_or_magic(unit.as_bytes(), v, m, e, &UNITS)?;

        Ok(Weight::pack(Tuple::new(v, m, e)))
    }

    /// Tags a decimal value with `unit`.
    pub fn from_decimal(value: Decimal, unit: &str) -> Result<Self> {
        let t = value.unpack();

        let (v, m, e) = text::unit_or_magic(unit.as_bytes(), t.v, t.m, t.e, &UNITS)?;

        Ok(Weight::pack(Tuple::new(v, m, e)))
    }

    /// Parses a weight literal. Without a unit suffix `kg` is assumed.
    pub fn parse_bytes(b: &[u8]) -> Result<Self> {
        let (v, m, e) = text::parse_tuple(b, &UNITS)?;

        Ok(Weight::pack(Tuple::new(v, m, e)))
    }

    /// The display name of this weight's unit.
    #[must_use]
    pub fn unit(self) -> &'static str {
        let u = self.0.unsigned_abs();

        UNITS[((u & TAG_MASK) >> BIT_TAG) as usize].name
    }
}

impl From<i64> for Weight {
    /// An integer weight in kilograms.
    fn from(value: i64) -> Self {
        let (v, m) = if value <= 0 {
            (SIGN, value.unsigned_abs())
        } else {
            (0, value as u64)
        };

        Weight::pack(Tuple::new(v, m, 0))
    }
}

impl FromStr for Weight {
    type Err = crate::DecimalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_bytes(s.as_bytes())
    }
}

// ============================================================================
// Predicates
// ============================================================================

impl Weight {
    /// True only for [`Weight::NULL`].
    #[must_use]
    pub fn is_null(self) -> bool {
        self == Weight::NULL
    }

    /// True for anything but [`Weight::NULL`].
    #[must_use]
    pub fn is_set(self) -> bool {
        self != Weight::NULL
    }

    /// Substitutes `default` for null.
    #[must_use]
    pub fn if_null(self, default: Weight) -> Weight {
        if self == Weight::NULL {
            default
        } else {
            self
        }
    }

    /// True for null and the exact zero of any unit, false for near-zeros.
    #[must_use]
    pub fn is_exactly_zero(self) -> bool {
        (self.0 as u64) & !(SIGN | TAG_MASK) == 0
    }

    /// True for null, exact zeros and the untagged unsigned near-zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.is_exactly_zero() || (self.0 as u64) & !(SIGN | TAG_MASK) == LOSS
    }

    /// True when no precision was lost producing this weight.
    #[must_use]
    pub fn is_exact(self) -> bool {
        (self.0 as u64) & LOSS == 0
    }

    /// True for values strictly above zero; NaN is not positive.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > 0 && !self.is_nan()
    }

    /// True for values strictly below zero.
    #[must_use]
    pub fn is_negative(self) -> bool {
        !self.is_zero() && self.0 < 0
    }

    /// True for the infinities of either sign.
    #[must_use]
    pub fn is_infinite(self) -> bool {
        let (t, _) = self.unpack();

        t.e == E_ABOVE
    }

    /// True for every NaN boxing.
    #[must_use]
    pub fn is_nan(self) -> bool {
        let (t, _) = self.unpack();

        t.m == 0 && t.v & LOSS != 0 && t.e != 0 && t.e != E_BELOW && t.e != E_ABOVE
    }

    /// `0` for zeros and null, `1` for positive values, `-1` for negative
    /// ones. NaN yields an arbitrary nonzero sign.
    #[must_use]
    pub fn sign(self) -> i32 {
        if self.is_zero() {
            0
        } else {
            1 - ((((self.0 as u64) >> 63) as i32) << 1)
        }
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

/// Re-expresses a tuple in another unit: first into kilograms through the
/// source conversion, then out through the destination one. Ratio divisions
/// run at [`DIVISION_PRECISION`] and round the quotient half up, flagging
/// loss on any remainder.
fn convert(mut t: Tuple, from: &Unit, to: &Unit) -> Tuple {
    match from.conv {
        Conv::Shift(s) => t.e = t.e.wrapping_add(s),
        Conv::Ratio(c) => t = t.mul(c.unpack()),
    }

    match to.conv {
        Conv::Shift(s) => t.e = t.e.wrapping_sub(s),
        Conv::Ratio(c) => {
            let r = c.unpack();
            let (q, rem, _) = t.div_rem(r, DIVISION_PRECISION);

            t = q;
            if rem != 0 {
                t.v |= LOSS;

                if rem << 1 >= r.m {
                    t.m += 1;
                }
            }
        }
    }

    t
}

impl Add for Weight {
    type Output = Weight;

    /// Sum expressed in the left operand's unit.
    fn add(self, rhs: Weight) -> Weight {
        let (t1, u1) = self.unpack();
        let (t2, u2) = rhs.unpack();

        Weight::pack(t1.add(convert(t2, u2, u1)))
    }
}

impl Sub for Weight {
    type Output = Weight;

    /// Difference expressed in the left operand's unit.
    fn sub(self, rhs: Weight) -> Weight {
        self + -rhs
    }
}

impl Mul<Decimal> for Weight {
    type Output = Weight;

    /// Scales a weight by a unitless factor, keeping the unit.
    fn mul(self, rhs: Decimal) -> Weight {
        let (t, _) = self.unpack();

        Weight::pack(t.mul(rhs.unpack()))
    }
}

impl Neg for Weight {
    type Output = Weight;

    /// Flips the stored sign; null and the zeros are their own negation.
    fn neg(self) -> Weight {
        Weight(self.0.wrapping_neg())
    }
}

impl AddAssign for Weight {
    fn add_assign(&mut self, rhs: Weight) {
        *self = *self + rhs;
    }
}

impl SubAssign for Weight {
    fn sub_assign(&mut self, rhs: Weight) {
        *self = *self - rhs;
    }
}

impl MulAssign<Decimal> for Weight {
    fn mul_assign(&mut self, rhs: Decimal) {
        *self = *self * rhs;
    }
}

// ============================================================================
// Comparison
// ============================================================================

impl Weight {
    /// Numeric comparison across units, ignoring lost precision: `1kg`
    /// equals `1000g`.
    #[must_use]
    pub fn compare(self, rhs: Weight) -> core::cmp::Ordering {
        let w = self - rhs;

        if w.is_zero() {
            core::cmp::Ordering::Equal
        } else if w.is_positive() {
            core::cmp::Ordering::Greater
        } else {
            core::cmp::Ordering::Less
        }
    }

    /// True when the values are numerically equal, whatever the units.
    #[must_use]
    pub fn equal(self, rhs: Weight) -> bool {
        (self - rhs).is_zero()
    }

    #[must_use]
    pub fn greater_than(self, rhs: Weight) -> bool {
        (self - rhs).is_positive()
    }

    #[must_use]
    pub fn greater_than_or_equal(self, rhs: Weight) -> bool {
        let w = self - rhs;

        w.is_positive() || w.is_zero()
    }

    #[must_use]
    pub fn less_than(self, rhs: Weight) -> bool {
        rhs.greater_than(self)
    }

    #[must_use]
    pub fn less_than_or_equal(self, rhs: Weight) -> bool {
        rhs.greater_than_or_equal(self)
    }
}

// ============================================================================
// Text
// ============================================================================

impl Weight {
    /// Plain string form for machine consumers: no loss marker, near-zeros
    /// become `0`, NaN and the infinities become `null`, all suffixed with
    /// the unit name.
    #[must_use]
    pub fn to_plain_string(self) -> String {
        let (t, unit) = self.unpack();

        let mut out = StrBuf::new();
        text::write_tuple(&mut out, t.v, t.m, t.e, unit.name, false);

        out.as_str().to_owned()
    }
}

impl fmt::Display for Weight {
    /// Extended form accepted back by the parser, suffixed with the unit
    /// name. Null displays as `0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0");
        }

        let (t, unit) = self.unpack();

        let mut out = StrBuf::new();
        text::write_tuple(&mut out, t.v, t.m, t.e, unit.name, true);

        f.write_str(out.as_str())
    }
}

impl fmt::Debug for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("Weight(null)");
        }

        write!(f, "Weight({self})")
    }
}

// ============================================================================
// Serde
// ============================================================================

#[cfg(feature = "serde")]
impl serde::Serialize for Weight {
    /// Human-readable formats get the extended string form with the unit
    /// suffix; binary formats get the raw packed `i64`.
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            if self.is_null() {
                return serializer.serialize_str("0");
            }

            let (t, unit) = self.unpack();

            let mut out = StrBuf::new();
            text::write_tuple(&mut out, t.v, t.m, t.e, unit.name, true);

            serializer.serialize_str(out.as_str())
        } else {
            serializer.serialize_i64(self.0)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Weight {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        struct WeightVisitor;

        impl serde::de::Visitor<'_> for WeightVisitor {
            type Value = Weight;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a weight string or number")
            }

            fn visit_str<E: Error>(self, s: &str) -> core::result::Result<Weight, E> {
                s.parse().map_err(E::custom)
            }

            fn visit_i64<E: Error>(self, i: i64) -> core::result::Result<Weight, E> {
                Ok(Weight::from(i))
            }

            fn visit_u64<E: Error>(self, u: u64) -> core::result::Result<Weight, E> {
                i64::try_from(u).map(Weight::from).map_err(E::custom)
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_any(WeightVisitor)
        } else {
            Ok(Weight(i64::deserialize(deserializer)?))
        }
    }
}
