//! Packed 64-bit fixed-point decimal arithmetic for financial code.
//!
//! This library provides two decimal types that pack sign, an inexactness
//! ("loss") flag, a bounded base-ten exponent and a bounded mantissa into a
//! single 64-bit word:
//!
//! - **`Decimal`**: 57-bit mantissa, exponent −16..=15
//!   - ~17 significant digits, slightly more than `f64`
//!   - Integer values up to ±144,115,188,075,855,871 are their own encoding
//! - **`Weight`**: 53-bit mantissa plus a 4-bit unit tag (kg, g, lb, oz t, …)
//!   - Same exponent range, same arithmetic engine, unit-aware add/sub
//!
//! ## Features
//!
//! - **Total arithmetic**: operators never panic; results that cannot be
//!   represented degrade to signed infinities, NaN or near-zero states with
//!   the loss flag set, IEEE-float style
//! - **Bit-exact equality**: normalization is canonical, so equal values
//!   share one bit pattern and a `Decimal` works directly as a map key
//! - **Loss tracking**: every inexact step is recorded in a sticky flag,
//!   observable via [`Decimal::is_exact`] and the `~` prefix when formatting
//! - **Compact wire format**: 1–10 byte variable-length binary encoding
//! - **Serde support**: strings for human-readable formats, raw words for
//!   binary formats (behind the `serde` feature)
//!
//! ## Example
//!
//! ```rust
//! use packdec::Decimal;
//!
//! let price: Decimal = "123.456".parse().unwrap();
//! let total = price * Decimal::from(1000);
//! assert_eq!(total, Decimal::from(123456));
//!
//! let third = Decimal::from(1) / Decimal::from(3);
//! assert!(!third.is_exact());
//! ```

mod decimal;
mod text;
mod tuple;
mod weight;

pub use decimal::{Decimal, DIVISION_PRECISION};
pub use weight::Weight;

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecimalError {
    /// Malformed literal: bad digit, repeated decimal point, dangling
    /// exponent marker, and the like.
    #[error("invalid syntax")]
    Syntax,

    /// The trailing token of a literal is neither a known unit nor one of
    /// the recognized aliases.
    #[error("unknown unit or alias suffix")]
    UnknownUnit,

    /// Integer conversion requested for a value whose magnitude, infinite
    /// or NaN state cannot be represented in the target type.
    #[error("out of range")]
    OutOfRange,

    /// Malformed binary encoding: empty input or a truncated varint.
    #[error("invalid binary format")]
    Format,
}

pub type Result<T> = core::result::Result<T, DecimalError>;
