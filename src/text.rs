//! Text codec shared by `Decimal` and `Weight`: a byte-level parser for
//! decimal literals with optional loss marker, exponent, unit suffix and
//! magic words, and a formatter writing into a fixed stack buffer.

use crate::tuple::{E_ABOVE, E_BELOW, LOSS, SIGN, TEN_POW};
use crate::weight::Unit;
use crate::{DecimalError, Result};

// first primes above u8 and above the largest unicode scalar
const PRIME_BYTE: u64 = 257;
const PRIME_UNICODE: u64 = 1_114_111;

// token_hash values of the recognized magic words
const HASH_ON: u64 = 28_637;
const HASH_YES: u64 = 8_018_001;
const HASH_NO: u64 = 28_381;
const HASH_OFF: u64 = 7_357_755;
const HASH_NAN: u64 = 7_290_429;
const HASH_NIL: u64 = 7_292_483;
const HASH_NULL: u64 = 1_874_960_827;
const HASH_INF: u64 = 6_963_517;

/// Case- and whitespace-insensitive hash of a token, used for unit and
/// magic-word matching. Folds each lowercased scalar into a 64-bit state
/// through a full 128-bit multiply, so hashes are well mixed while the
/// empty token stays 0.
pub(crate) fn token_hash(s: &str) -> u64 {
    let mut h: u64 = 0;

    for c in s.chars() {
        if c.is_whitespace() {
            continue;
        }

        for lc in c.to_lowercase() {
            let k = if (lc as u32) >= 256 { PRIME_UNICODE } else { PRIME_BYTE };

            let p = (h as u128) * (k as u128);
            h = ((p >> 64) as u64)
                .wrapping_add(p as u64)
                .wrapping_add(lc as u64);
        }
    }

    h
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a decimal literal into an unnormalized `(v, m, e)` tuple.
///
/// Accepts surrounding whitespace and a matching pair of single or double
/// quotes, a `~` loss marker before or after the sign, an optional `e`/`E`
/// exponent, and a trailing unit or magic word (`on`, `off`, `nan`, `null`,
/// `inf`, ...) matched against `units` by hash. The empty input is null.
pub(crate) fn parse_tuple(b: &[u8], units: &[Unit]) -> Result<(u64, u64, i64)> {
    let b = trim_ascii_and_quotes(b);

    if b.is_empty() {
        return Ok((0, 0, 0));
    }

    let mut v: u64 = 0;
    let mut m: u64 = 0;
    let mut e: i64 = 0;

    let mut i = 0;
    let j = b.len() - 1;

    // a loss marker may precede the sign
    if b[i] == b'~' {
        v |= LOSS;

        i += 1;
        if i > j {
            return Err(DecimalError::Syntax);
        }
    }

    let mut parsed_sign = false;
    let mut parsed_digit = false;

    match b[i] {
        b'+' => {
            parsed_sign = true;

            i += 1;
            if i > j {
                return Err(DecimalError::Syntax);
            }
        }
        b'-' => {
            v |= SIGN;
            parsed_sign = true;

            i += 1;
            if i > j {
                return Err(DecimalError::Syntax);
            }
        }
        _ => {}
    }

    // or follow it
    if b[i] == b'~' {
        v |= LOSS;

        i += 1;
        if i > j {
            return Err(DecimalError::Syntax);
        }
    }

    let mut dot = false;

    while i <= j {
        match b[i] {
            b'0'..=b'9' => {
                parsed_digit = true;

                let p = (m as u128) * 10;

                if (p >> 64) == 0 {
                    m = (p as u64) + (b[i] - b'0') as u64;

                    if dot && e <= 0 {
                        e -= 1;
                    } else if !dot && e > 0 {
                        e += 1;
                    }
                } else {
                    // the mantissa is full: extra fractional digits are
                    // dropped, extra integer digits become exponent
                    if e >= 0 && b[i] != b'0' {
                        v |= LOSS;
                    }
                    if !dot {
                        e += 1;
                    }
                }

                i += 1;
            }
            b'.' => {
                if dot {
                    return Err(DecimalError::Syntax);
                }
                dot = true;

                i += 1;
            }
            c if c | 0x20 == b'e' => {
                // only an exponent if a sign or digit follows, otherwise
                // the token is left for the unit matcher
                if i < j && (b[i + 1] == b'-' || b[i + 1] == b'+' || b[i + 1].is_ascii_digit()) {
                    let mut neg_e = false;

                    i += 1;
                    match b[i] {
                        b'+' => i += 1,
                        b'-' => {
                            neg_e = true;
                            i += 1;
                        }
                        _ => {}
                    }

                    if i > j || !b[i].is_ascii_digit() {
                        return Err(DecimalError::Syntax);
                    }

                    let mut exp: i64 = 0;
                    while i <= j && b[i].is_ascii_digit() {
                        exp = exp.saturating_mul(10).saturating_add((b[i] - b'0') as i64);
                        i += 1;
                    }

                    if neg_e {
                        e = e.saturating_sub(exp);
                    } else {
                        e = e.saturating_add(exp);
                    }
                }

                break;
            }
            _ => break,
        }
    }

    // a zero mantissa re-interprets the flags: a signed lossy zero is a
    // directed near-zero, a plain one the unsigned near-zero, and an exact
    // parsed zero the canonical zero
    if m == 0 {
        if v & LOSS != 0 {
            if parsed_sign {
                e = E_BELOW;
            } else if parsed_digit {
                v |= SIGN;
                e = 0;
            }
        } else if parsed_digit {
            v = SIGN;
            e = 0;
        }
    }

    unit_or_magic(&b[i..], v, m, e, units)
}

/// Resolves a trailing token as a unit tag or a magic word.
pub(crate) fn unit_or_magic(
    b: &[u8],
    mut v: u64,
    m: u64,
    e: i64,
    units: &[Unit],
) -> Result<(u64, u64, i64)> {
    let h = token_hash(&String::from_utf8_lossy(b));
    if h == 0 {
        return Ok((v, m, e));
    }

    for u in units {
        if !u.name.is_empty() && h == u.hash() {
            v |= u.tag;

            return Ok((v, m, e));
        }
    }

    // magic words are only valid on their own, without digits before them
    if m == 0 {
        match h {
            HASH_ON | HASH_YES => return Ok((v, 1, 0)),
            HASH_NO | HASH_OFF => {
                if v & LOSS != 0 {
                    return Ok((v, 0, e));
                }
                return Ok((SIGN, 0, 0));
            }
            HASH_NAN => return Ok((LOSS, 0, 1)),
            HASH_NIL | HASH_NULL => return Ok((0, 0, 0)),
            HASH_INF => return Ok((v | LOSS, 0, E_ABOVE)),
            _ => {}
        }
    }

    Err(DecimalError::UnknownUnit)
}

fn trim_ascii_and_quotes(b: &[u8]) -> &[u8] {
    let b = b.trim_ascii();

    if b.len() >= 2 {
        let (first, last) = (b[0], b[b.len() - 1]);

        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &b[1..b.len() - 1];
        }
    }

    b
}

// ============================================================================
// Formatting
// ============================================================================

/// Stack buffer large enough for any formatted decimal or weight.
pub(crate) struct StrBuf {
    buf: [u8; 48],
    len: usize,
}

impl StrBuf {
    pub(crate) const fn new() -> Self {
        StrBuf { buf: [0; 48], len: 0 }
    }

    fn push(&mut self, b: u8) {
        self.buf[self.len] = b;
        self.len += 1;
    }

    fn extend(&mut self, s: &[u8]) {
        self.buf[self.len..self.len + s.len()].copy_from_slice(s);
        self.len += s.len();
    }

    pub(crate) fn as_str(&self) -> &str {
        // only ASCII and unit names (valid UTF-8) are ever written
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

/// Formats an unpacked tuple.
///
/// With `ext` set the output is the extended syntax the parser accepts back
/// (`~` for loss, `+Inf`/`-Inf`, `NaN`, `~0`); without it magic states fold
/// to the JSON-friendly `0` and `null`.
pub(crate) fn write_tuple(out: &mut StrBuf, v: u64, mut m: u64, mut e: i64, unit: &str, ext: bool) {
    if m > 0 {
        if ext && v & LOSS != 0 {
            out.push(b'~');
        }
        if v & SIGN != 0 {
            out.push(b'-');
        }

        let mut output = false;

        for i in (0..TEN_POW.len()).rev() {
            if i as i64 + e + 1 == 0 {
                if !output {
                    out.push(b'0');
                }
                out.push(b'.');

                output = true;
            }

            let q = m / TEN_POW[i];
            m %= TEN_POW[i];

            if output || q > 0 || i as i64 + e <= 0 {
                out.push(q as u8 + b'0');

                output = true;
            }
        }

        // trailing zeros of a large integer
        e -= 1;
        while e >= 0 {
            out.push(b'0');
            e -= 1;
        }
    } else if v & LOSS != 0 {
        write_magic(out, v, e, ext);
    } else {
        out.push(b'0');
    }

    out.extend(unit.as_bytes());
}

fn write_magic(out: &mut StrBuf, v: u64, e: i64, ext: bool) {
    if ext {
        if e == E_ABOVE {
            out.push(if v & SIGN != 0 { b'-' } else { b'+' });
            out.extend(b"Inf");
        } else if e == 0 {
            out.extend(b"~0");
        } else if e > E_BELOW {
            out.extend(b"NaN");
        } else {
            out.push(if v & SIGN != 0 { b'-' } else { b'+' });
            out.extend(b"~0");
        }
    } else if e == 0 || e == E_BELOW {
        out.push(b'0');
    } else {
        out.extend(b"null");
    }
}
