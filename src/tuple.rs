//! Decomposed form of a packed decimal and the arithmetic engine over it.
//!
//! Every public operation on `Decimal` and `Weight` decodes its operands to
//! a [`Tuple`], computes with checked 64×64→128-bit primitives, and
//! re-encodes through [`Tuple::normalize`]. Arithmetic here is total: a
//! result that cannot be represented degrades to the nearest magic state
//! (near-zero, infinity, NaN) with the loss flag set, never an error.

/// Sign bit of the `v` flag word (and of a packed magnitude).
pub(crate) const SIGN: u64 = 0x8000_0000_0000_0000;

/// Loss bit: set when the stored value is not the exact mathematical result.
pub(crate) const LOSS: u64 = 0x4000_0000_0000_0000;

/// Exponent sentinel for a magic value below the representable range.
pub(crate) const E_BELOW: i64 = i64::MIN;

/// Exponent sentinel for a magic value above the representable range.
pub(crate) const E_ABOVE: i64 = i64::MAX;

/// Powers of ten that fit in a u64.
pub(crate) const TEN_POW: [u64; 20] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
    10_000_000_000_000_000_000,
];

/// Decomposed (sign/loss/tag, mantissa, exponent) form of a packed value.
///
/// `v` carries the sign and loss bits, plus the unit tag bits for weights.
/// When `m == 0` the tuple is magic: `e` is then either a small in-range
/// exponent, [`E_BELOW`], [`E_ABOVE`], or (with the loss bit) a NaN boxing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Tuple {
    pub v: u64,
    pub m: u64,
    pub e: i64,
}

impl Tuple {
    /// Canonical exact zero.
    pub(crate) const ZERO: Tuple = Tuple { v: SIGN, m: 0, e: 0 };

    /// Unsigned near-zero.
    pub(crate) const NEAR_ZERO: Tuple = Tuple { v: SIGN | LOSS, m: 0, e: 0 };

    /// One of the NaN boxings; any nonzero in-range exponent works.
    pub(crate) const NAN: Tuple = Tuple { v: LOSS, m: 0, e: 1 };

    pub(crate) const fn new(v: u64, m: u64, e: i64) -> Self {
        Tuple { v, m, e }
    }
}

// ============================================================================
// Normalization
// ============================================================================

impl Tuple {
    /// Forces the tuple into canonical form for the given mantissa cap and
    /// exponent range.
    ///
    /// The canonical form holds an integer value at exponent 0 whenever
    /// possible; otherwise the mantissa is stripped of trailing zero digits
    /// until it is no longer divisible by ten (unless the exponent runs out
    /// of room). This is what makes equal values share one bit pattern, so
    /// `==`, `!=` and hashing work directly on the packed word.
    ///
    /// Normalization never fails: precision that does not fit is rounded
    /// away with the loss flag set, and values outside the exponent range
    /// collapse to near-zero or infinity.
    pub(crate) fn normalize(self, max_m: u64, min_e: i64, max_e: i64) -> Tuple {
        let Tuple { mut v, mut m, mut e } = self;

        if m == 0 {
            return normalize_magic(v, e, min_e, max_e);
        }

        // Try exact re-basing to exponent 0 first, so that integer values in
        // range always compare equal to their plain integer encoding.
        if v & LOSS == 0 {
            if e == 0 {
                if m <= max_m {
                    return Tuple::new(v, m, 0);
                }
            } else if e > 0 {
                if e < TEN_POW.len() as i64 {
                    let p = (m as u128) * (TEN_POW[e as usize] as u128);

                    if (p >> 64) == 0 && (p as u64) <= max_m {
                        return Tuple::new(v, p as u64, 0);
                    }
                }
            } else if m & 1 == 0 && e > -(TEN_POW.len() as i64) {
                let p = TEN_POW[-e as usize];
                let (q, r) = (m / p, m % p);

                if r == 0 && q <= max_m {
                    return Tuple::new(v, q, 0);
                }
            }
        }

        // Strip trailing zero digits while the mantissa exceeds the cap or
        // remains divisible by ten with exponent room.
        while m > max_m || (e <= max_e && m > 9 && m & 1 == 0) {
            let mut q = m / 10;
            let r = m % 10;

            if r != 0 {
                if m <= max_m {
                    break;
                }

                v |= LOSS;

                // round to nearest, ties to even
                if r > 5 || (r == 5 && q & 1 == 1) {
                    q += 1;
                }
            }

            m = q;
            e += 1;
        }

        normalize_exponent(v, m, e, max_m, min_e, max_e)
    }
}

/// Clamps the exponent into range, moving precision into or out of the
/// mantissa and degrading to near-zero / infinity when it does not fit.
fn normalize_exponent(mut v: u64, mut m: u64, mut e: i64, max_m: u64, min_e: i64, max_e: i64) -> Tuple {
    if e < min_e {
        if min_e - e < TEN_POW.len() as i64 {
            let p = TEN_POW[(min_e - e) as usize];
            let r = m % p;
            m /= p;

            if r != 0 {
                v |= LOSS;

                // round to nearest, half up
                if (r << 1) >= p {
                    m += 1;
                }
            }
        } else {
            v |= LOSS;
            m = 0;
        }

        e = min_e;
    }

    if e > max_e {
        let mut overflowed = true;

        if e - max_e < TEN_POW.len() as i64 {
            let p = (m as u128) * (TEN_POW[(e - max_e) as usize] as u128);

            if (p >> 64) == 0 && (p as u64) <= max_m {
                m = p as u64;
                overflowed = false;
            }
        }

        if overflowed {
            v |= LOSS;

            // infinity is mantissa 0 at the maximal exponent
            m = 0;
        }

        e = max_e;
    }

    Tuple::new(v, m, e)
}

/// Normalizes a tuple with mantissa 0: exact zeros collapse to the unique
/// canonical zero, magic states get their exponent clamped into range.
fn normalize_magic(mut v: u64, mut e: i64, min_e: i64, max_e: i64) -> Tuple {
    if v & LOSS == 0 {
        return Tuple::new(v, 0, 0);
    }

    if e < min_e {
        e = min_e;
    } else if e > max_e {
        e = max_e;
    } else if e == 0 {
        v |= SIGN;
    }

    Tuple::new(v, 0, e)
}

// ============================================================================
// Addition
// ============================================================================

impl Tuple {
    /// Adds two tuples, dispatching magic operands through the documented
    /// truth table and aligning ordinary exponents via a 128-bit scale.
    pub(crate) fn add(self, rhs: Tuple) -> Tuple {
        let Tuple { v: mut v1, m: mut m1, e: mut e1 } = self;
        let Tuple { v: mut v2, m: mut m2, e: mut e2 } = rhs;

        // the result keeps the left operand's unit bits
        let mut v = v1 & !(SIGN | LOSS);

        // order operands so that e1 <= e2
        if e1 > e2 {
            core::mem::swap(&mut v1, &mut v2);
            core::mem::swap(&mut m1, &mut m2);
            core::mem::swap(&mut e1, &mut e2);
        }

        if m1 == 0 {
            v |= v2 & (SIGN | LOSS);
            if v1 & LOSS != 0 {
                return add_magic(v1, e1, Tuple::new(v, m2, e2));
            }
            // exact zero absorbs into the other operand
            return Tuple::new(v, m2, e2);
        }

        if m2 == 0 {
            v |= v1 & (SIGN | LOSS);
            if v2 & LOSS != 0 {
                return add_magic(v2, e2, Tuple::new(v, m1, e1));
            }
            return Tuple::new(v, m1, e1);
        }

        let mut e = e1;

        if e1 < e2 {
            if e2 - e1 < TEN_POW.len() as i64 {
                let p2 = (m2 as u128) * (TEN_POW[(e2 - e1) as usize] as u128);

                if (p2 >> 64) != 0 {
                    // the scaled mantissa no longer fits in 64 bits: divide
                    // both operands by the smallest sufficient power of ten
                    let h2 = (p2 >> 64) as u64;
                    let k = TEN_POW.partition_point(|&p| p <= h2);
                    let p = TEN_POW[k] as u128;

                    let (q2, r2) = ((p2 / p) as u64, (p2 % p) as u64);
                    let (q1, r1) = (m1 / p as u64, m1 % p as u64);

                    if r2 != 0 || r1 != 0 {
                        v |= LOSS;
                    }

                    m2 = q2;
                    m1 = q1;
                    e += k as i64;
                } else {
                    m2 = p2 as u64;
                }
            } else {
                // the left operand is negligible against the right one
                return Tuple::new(v2 | LOSS, m2, e2);
            }
        }

        let mut m;
        if SIGN & (v1 ^ v2) == 0 {
            v |= v1 & SIGN;

            let s = (m1 as u128) + (m2 as u128);
            if (s >> 64) != 0 {
                // the aligned mantissas can each sit near 2^64; when their
                // sum no longer fits, drop one decimal digit, rounding half
                // up and raising loss on a nonzero remainder
                m = (s / 10) as u64;
                if s % 10 != 0 {
                    v |= LOSS;
                    if s % 10 >= 5 {
                        m += 1;
                    }
                }
                e += 1;
            } else {
                m = s as u64;
            }
        } else {
            // opposite signs: the result takes the larger mantissa's sign
            if m1 < m2 {
                v |= v2 & SIGN;
                m = m2 - m1;
            } else {
                v |= v1 & SIGN;
                m = m1 - m2;
            }
        }

        v |= LOSS & (v1 | v2);

        if m == 0 {
            v |= SIGN;
            e = 0;
        }

        Tuple::new(v, m, e)
    }
}

/// Truth table for adding a magic left operand (mantissa 0, loss set) to an
/// arbitrary right operand whose flag word already carries the merged unit
/// bits. The near-zero sign-reconciliation here is deliberately asymmetric
/// with multiplication; both tables are covered by tests.
fn add_magic(v1: u64, e1: i64, rhs: Tuple) -> Tuple {
    match e1 {
        // lhs is ~0, +~0 or -~0
        0 | E_BELOW => {
            if rhs.m == 0 && rhs.v & LOSS != 0 {
                if rhs.v == SIGN | LOSS && rhs.e == 0 {
                    // ~0 + ~0
                    rhs
                } else if rhs.e == E_BELOW {
                    // signed near-zeros agree on sign or fall back to ~0
                    if (v1 ^ rhs.v) & SIGN == 0 {
                        rhs
                    } else {
                        Tuple::NEAR_ZERO
                    }
                } else {
                    // NaN or an infinity wins
                    rhs
                }
            } else if rhs.v | SIGN == SIGN && rhs.m == 0 && rhs.e == 0 {
                // near-zero + exact zero keeps the near-zero
                Tuple::new(v1, 0, e1)
            } else {
                // near-zero absorbs into an ordinary operand, marking loss
                Tuple::new(rhs.v | LOSS, rhs.m, rhs.e)
            }
        }
        // lhs is an infinity
        E_ABOVE => {
            if rhs.m == 0 && rhs.v & LOSS != 0 {
                if rhs.e == E_ABOVE {
                    if SIGN & (v1 ^ rhs.v) == 0 {
                        // same-signed infinities absorb
                        rhs
                    } else {
                        Tuple::NAN
                    }
                } else if rhs.e == E_BELOW {
                    Tuple::new(v1, 0, e1)
                } else {
                    // NaN
                    rhs
                }
            } else {
                Tuple::new(v1, 0, e1)
            }
        }
        // lhs is NaN
        _ => Tuple::new(v1, 0, e1),
    }
}

// ============================================================================
// Multiplication
// ============================================================================

impl Tuple {
    /// Multiplies two tuples through a 128-bit mantissa product.
    pub(crate) fn mul(self, rhs: Tuple) -> Tuple {
        let Tuple { v: v1, m: m1, e: e1 } = self;
        let Tuple { v: v2, m: m2, e: e2 } = rhs;

        if m1 == 0 {
            if v1 & LOSS != 0 {
                return mul_magic(v1, e1, rhs);
            }
            return Tuple::ZERO;
        }

        if m2 == 0 {
            if v2 & LOSS != 0 {
                return mul_magic(v2, e2, self);
            }
            return Tuple::ZERO;
        }

        let v = (v1 & !(SIGN | LOSS)) | ((v1 | v2) & LOSS) | ((v1 ^ v2) & SIGN);
        let e = e1.wrapping_add(e2);

        // exponent overflow collapses straight to the range edges
        if e < e1 && e2 > 0 {
            return Tuple::new(v | LOSS, 0, E_ABOVE);
        } else if e > e1 && e2 < 0 {
            return Tuple::new(v | LOSS, 0, E_BELOW);
        }

        reduce(v, (m1 as u128) * (m2 as u128), e)
    }
}

/// Truth table for multiplying by a magic left operand.
fn mul_magic(v1: u64, e1: i64, rhs: Tuple) -> Tuple {
    match e1 {
        // lhs is ~0
        0 => {
            if rhs.m == 0 {
                if rhs.v & LOSS != 0 {
                    if rhs.e != 0 && rhs.e != E_BELOW {
                        // ~0 times NaN or an infinity
                        return Tuple::NAN;
                    }
                } else {
                    return Tuple::ZERO;
                }
            }

            Tuple::NEAR_ZERO
        }
        // lhs is +~0 or -~0
        E_BELOW => {
            if rhs.m == 0 {
                if rhs.v & LOSS != 0 {
                    if rhs.e != 0 && rhs.e != E_BELOW {
                        return Tuple::NAN;
                    }

                    // the unsigned near-zero erases the sign
                    if rhs.e == 0 {
                        return Tuple::NEAR_ZERO;
                    }
                } else {
                    return Tuple::ZERO;
                }
            }

            Tuple::new(((v1 ^ rhs.v) & SIGN) | LOSS, 0, E_BELOW)
        }
        // lhs is an infinity
        E_ABOVE => {
            if rhs.m == 0 {
                if rhs.v & LOSS != 0 {
                    if rhs.e == 0 || rhs.e != E_ABOVE {
                        // infinity times anything near zero
                        return Tuple::NAN;
                    }
                } else {
                    // 0 times infinity
                    return Tuple::NAN;
                }
            }

            Tuple::new(((v1 ^ rhs.v) & SIGN) | LOSS, 0, E_ABOVE)
        }
        // lhs is NaN
        _ => Tuple::NAN,
    }
}

/// Reduces a 128-bit mantissa product back into 64 bits by dividing by the
/// smallest sufficient power of ten, rounding half up and raising loss on
/// any nonzero remainder.
fn reduce(mut v: u64, product: u128, mut e: i64) -> Tuple {
    let mut hi = (product >> 64) as u64;
    let mut m = product as u64;

    if hi > 0 {
        let i = TEN_POW.partition_point(|&p| p <= hi);

        if i < TEN_POW.len() {
            let p = TEN_POW[i] as u128;
            let mut q = (product / p) as u64;
            let r = (product % p) as u64;

            if r != 0 {
                v |= LOSS;

                if (r << 1) as u128 >= p {
                    q += 1;
                }
            }

            hi = 0;
            m = q;
            e += i as i64;
        }
    }

    // Rare case where the high word is at least 10^19: one extra division
    // by ten makes it fit, since (2^63-1)^2 / 10^19 / 10 < 2^63-1. Not
    // reachable from Decimal, whose mantissa only uses 57 bits.
    if hi > 0 {
        let x = ((hi as u128) << 64) | (m as u128);
        let mut qm = x / 10;

        if x % 10 != 0 {
            v |= LOSS;

            if x % 10 >= 5 {
                qm += 1;
            }
        }

        let i = TEN_POW.len() - 1;
        let p = TEN_POW[i] as u128;

        if qm % p != 0 {
            v |= LOSS;
        }
        m = (qm / p) as u64;

        e += 1 + i as i64;
    }

    Tuple::new(v, m, e)
}

// ============================================================================
// Division with remainder
// ============================================================================

impl Tuple {
    /// Divides `self` by `rhs`, producing a quotient at the given decimal
    /// precision and an exact remainder `(mantissa, exponent)` such that
    /// `self = rhs * quotient + remainder`. The remainder carries the sign
    /// of `self` and its magnitude is below `|rhs| * 10^-precision`.
    pub(crate) fn div_rem(self, rhs: Tuple, precision: i32) -> (Tuple, u64, i64) {
        let Tuple { v: v1, m: m1, e: e1 } = self;
        let Tuple { v: v2, m: m2, e: e2 } = rhs;

        if m2 == 0 {
            if v2 & LOSS != 0 {
                return div_rem_magic_rhs(self, v2, e2);
            }
            // division by exact zero (or null)
            return (Tuple::NAN, 0, 0);
        }

        if m1 == 0 {
            if v1 & LOSS != 0 {
                // magic numerator over an ordinary denominator keeps its
                // state, re-signed by the denominator
                return (Tuple::new(LOSS | ((v1 ^ v2) & SIGN), 0, e1), 0, 0);
            }
            return (Tuple::ZERO, 0, 0);
        }

        let mut v = ((v1 | v2) & LOSS) | ((v1 ^ v2) & SIGN);
        let mut e = e1 - e2;

        let mut re = -(precision as i64);
        let mut scale = e + precision as i64;
        if scale < 0 {
            re += scale;
            scale = 0;
        }
        if scale >= TEN_POW.len() as i64 {
            scale = TEN_POW.len() as i64 - 1;
        }
        e -= scale;

        let mut x = (m1 as u128) * (TEN_POW[scale as usize] as u128);

        // keep the 128/64 division's quotient within 64 bits
        let h1 = (x >> 64) as u64;
        if m2 <= h1 {
            let i = TEN_POW.partition_point(|&p| p <= h1);

            if i < TEN_POW.len() {
                let p = TEN_POW[i] as u128;

                if x % p != 0 {
                    v |= LOSS;
                }
                x /= p;
                e += i as i64;
            }
        }

        let mut m = (x / m2 as u128) as u64;
        let mut r = (x % m2 as u128) as u64;

        // precision forced a negative power-of-ten index: fold the excess
        // quotient digits back into the remainder
        if re < -(precision as i64) {
            let p = TEN_POW[(-(precision as i64) - re) as usize];
            let xr = m % p;
            m -= xr;
            r = r.wrapping_add(xr.wrapping_mul(m2));
        }
        re += e2;

        (Tuple::new(v, m, e), r, re)
    }
}

/// Truth table for division by a magic denominator.
fn div_rem_magic_rhs(lhs: Tuple, v2: u64, e2: i64) -> (Tuple, u64, i64) {
    let Tuple { v: v1, m: m1, e: e1 } = lhs;

    match e2 {
        // rhs is ~0: the quotient's magnitude is unknowable
        0 => (Tuple::NAN, 0, 0),
        // rhs is +~0 or -~0
        E_BELOW => {
            if m1 == 0 {
                if v1 & LOSS != 0 {
                    if e1 == E_ABOVE {
                        return (Tuple::new(LOSS | ((v1 ^ v2) & SIGN), 0, E_ABOVE), 0, 0);
                    }
                    // near-zero over near-zero
                    return (Tuple::NAN, 0, 0);
                }
                // zero over near-zero
                return (Tuple::NAN, 0, 0);
            }

            (Tuple::new(LOSS | ((v1 ^ v2) & SIGN), 0, E_ABOVE), 0, 0)
        }
        // rhs is an infinity
        E_ABOVE => {
            if m1 == 0 {
                if v1 & LOSS != 0 {
                    if e1 == 0 {
                        return (Tuple::NEAR_ZERO, 0, 0);
                    } else if e1 == E_BELOW {
                        return (Tuple::new(LOSS | ((v1 & v2) & SIGN), 0, E_BELOW), 0, 0);
                    } else if e1 == E_ABOVE {
                        return (Tuple::NAN, 0, 0);
                    }
                    // NaN falls through below
                } else {
                    return (Tuple::NEAR_ZERO, 0, 0);
                }

                return (Tuple::NAN, 0, 0);
            }

            (Tuple::new(LOSS | ((v1 ^ v2) & SIGN), 0, E_BELOW), 0, 0)
        }
        // rhs is NaN
        _ => (Tuple::NAN, 0, 0),
    }
}

// ============================================================================
// Rounding
// ============================================================================

impl Tuple {
    /// Rounds to `places` decimal places, ties toward positive infinity.
    ///
    /// Rounding erases nearness: every near-zero variant collapses to the
    /// canonical zero, while NaN and the infinities pass through unchanged.
    /// The loss flag is cleared, a rounded value is exact by definition.
    pub(crate) fn round(self, places: i32) -> Tuple {
        let Tuple { mut v, mut m, mut e } = self;

        if m == 0 {
            if e == 0 || e == E_BELOW {
                return Tuple::ZERO;
            }
            return self;
        }

        v &= !LOSS;

        let i = e + places as i64;
        if i < 0 {
            if -i >= TEN_POW.len() as i64 {
                return Tuple::ZERO;
            }

            let p = TEN_POW[-i as usize];

            if (m << 1) < p {
                return Tuple::ZERO;
            }

            let (q, r) = (m / p, m % p);

            m = q;
            if (r << 1) > p || ((r << 1) == p && v & SIGN == 0) {
                m += 1;
            }

            e = -(places as i64);
        }

        Tuple::new(v, m, e)
    }

    /// Rounds to `places` decimal places, ties to even.
    pub(crate) fn round_bank(self, places: i32) -> Tuple {
        let Tuple { mut v, mut m, mut e } = self;

        if m == 0 {
            if e == 0 || e == E_BELOW {
                return Tuple::ZERO;
            }
            return self;
        }

        v &= !LOSS;

        let i = e + places as i64;
        if i < 0 {
            if -i >= TEN_POW.len() as i64 {
                return Tuple::ZERO;
            }

            let p = TEN_POW[-i as usize];

            if (m << 1) < p {
                return Tuple::ZERO;
            }

            let (q, r) = (m / p, m % p);

            m = q;
            if (r << 1) > p || ((r << 1) == p && m & 1 == 1) {
                m += 1;
            }

            e = -(places as i64);
        }

        Tuple::new(v, m, e)
    }

    /// Rounds to `places` decimal places toward positive infinity.
    pub(crate) fn round_ceil(self, places: i32) -> Tuple {
        let Tuple { mut v, mut m, mut e } = self;

        if m == 0 {
            if e == 0 || e == E_BELOW {
                return Tuple::ZERO;
            }
            return self;
        }

        v &= !LOSS;

        let i = e + places as i64;
        if i < 0 {
            if -i >= TEN_POW.len() as i64 {
                return Tuple::ZERO;
            }

            let p = TEN_POW[-i as usize];

            if (m << 1) < p {
                if v & SIGN == 0 {
                    // first representable value above zero
                    return Tuple::new(0, 1, -(places as i64));
                }
                return Tuple::ZERO;
            }

            let (q, r) = (m / p, m % p);

            m = q;
            if r > 0 && v & SIGN == 0 {
                m += 1;
            }

            e = -(places as i64);
        }

        Tuple::new(v, m, e)
    }

    /// Rounds to `places` decimal places toward negative infinity.
    pub(crate) fn round_floor(self, places: i32) -> Tuple {
        let Tuple { mut v, mut m, mut e } = self;

        if m == 0 {
            if e == 0 || e == E_BELOW {
                return Tuple::ZERO;
            }
            return self;
        }

        v &= !LOSS;

        let i = e + places as i64;
        if i < 0 {
            if -i >= TEN_POW.len() as i64 {
                return Tuple::ZERO;
            }

            let p = TEN_POW[-i as usize];

            if (m << 1) < p {
                if v & SIGN != 0 {
                    // first representable value below zero
                    return Tuple::new(SIGN, 1, -(places as i64));
                }
                return Tuple::ZERO;
            }

            let (q, r) = (m / p, m % p);

            m = q;
            if r > 0 && v & SIGN != 0 {
                m += 1;
            }

            e = -(places as i64);

            if m == 0 && e == 0 {
                v = SIGN;
            }
        }

        Tuple::new(v, m, e)
    }
}

// ============================================================================
// Float decomposition
// ============================================================================

/// Converts a binary mantissa/exponent pair (as extracted from an IEEE-754
/// word, fraction form with the implicit bit materialized at bit 63) into a
/// decimal tuple. `v` already carries the sign and a possible loss bit.
pub(crate) fn from_float_parts(mut v: u64, mut m2: u64, mut e2: i64) -> Tuple {
    let z = m2.trailing_zeros() as i64;
    if z == 64 {
        if v != 0 {
            return Tuple::new(SIGN | LOSS, 0, E_BELOW);
        }
        return Tuple::ZERO;
    }

    // re-base the fraction mantissa as an integer mantissa
    m2 >>= z;
    e2 += z - 63;

    if fix_float_mantissa(&mut m2) {
        v |= LOSS;
    }

    // An IEEE-754 double carries at most 53 significant bits. Values with a
    // short odd mantissa (powers of two, exact halves) are padded back up to
    // that width so the negative-exponent scaling below keeps them exact;
    // full mantissas pass through unchanged.
    if e2 < 0 && m2 < (1 << 52) {
        let s = m2.leading_zeros() - 11;
        m2 <<= s;
        e2 -= s as i64;
    }

    let mut e: i64 = 0;
    let big = TEN_POW[TEN_POW.len() - 1];

    // scale a negative binary exponent away 64 bits at a time
    while e2 < 0 {
        let p = (m2 as u128) * (big as u128);
        e -= TEN_POW.len() as i64 - 1;

        let mut hi = (p >> 64) as u64;
        if (p as u64) & SIGN != 0 {
            hi += 1;
        }
        m2 = hi;
        e2 += 64;
    }

    // likewise for a large positive binary exponent
    while e2 >= 64 {
        let x = (m2 as u128) << 64;
        let mut q = x / big as u128;
        let r = x % big as u128;
        e += TEN_POW.len() as i64 - 1;

        if r >= (big >> 1) as u128 {
            q += 1;
        }
        if (q >> 64) != 0 {
            // one more decimal digit puts the quotient back into 64 bits
            q /= 10;
            e += 1;
            v |= LOSS;
        }
        m2 = q as u64;
        e2 -= 64;
    }

    let m;
    if e2 > 0 {
        let hi = m2 >> (64 - e2);
        let x = (m2 as u128) << e2;

        let i = TEN_POW.partition_point(|&p| p <= hi);
        let p = TEN_POW[i];

        let mut q = (x / p as u128) as u64;
        let r = (x % p as u128) as u64;
        e += i as i64;

        if r > 0 && r >= (p >> 1) {
            q += 1;
        }
        if r != 0 {
            v |= LOSS;
        }
        m = q;
    } else {
        m = m2;
    }

    Tuple::new(v, m, e)
}

/// Heuristic cleanup of conversion dust in a float64 mantissa: a run of set
/// or clear bits right at the 32-bit boundary is rounded away so short
/// decimal literals survive the round-trip through f64.
fn fix_float_mantissa(m: &mut u64) -> bool {
    // the high-half check keeps genuinely tiny mantissas (1, 3) intact
    if *m & 0xffff_ffff_0000_0000 != 0 && *m & 0xffff_fffc == 0 && *m & 0xffff_ffff != 0 {
        *m &= 0xffff_ffff_0000_0000;

        return true;
    }

    if *m | 0x3 == 0xffff_ffff {
        *m = (*m | 0x3) + 1;

        return true;
    }

    false
}
