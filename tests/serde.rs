use packdec::{Decimal, Weight};
use serde_test::{assert_tokens, Configure, Token};

fn d(s: &str) -> Decimal {
    s.parse().expect(s)
}

fn w(s: &str) -> Weight {
    s.parse().expect(s)
}

#[test]
fn decimal_json_round_trip() {
    for s in ["0", "1.5", "-12.345", "123000000000000000", "~1.5", "0.0001"] {
        let v = d(s);
        let json = serde_json::to_string(&v).unwrap();

        assert_eq!(json, format!("\"{s}\""));
        assert_eq!(serde_json::from_str::<Decimal>(&json).unwrap(), v);
    }
}

#[test]
fn decimal_json_magic_values() {
    assert_eq!(serde_json::to_string(&Decimal::NULL).unwrap(), "\"0\"");
    assert_eq!(serde_json::to_string(&Decimal::ZERO).unwrap(), "\"0\"");
    assert_eq!(serde_json::to_string(&Decimal::NEAR_ZERO).unwrap(), "\"~0\"");
    assert_eq!(
        serde_json::to_string(&Decimal::NEAR_POSITIVE_ZERO).unwrap(),
        "\"+~0\""
    );
    assert_eq!(serde_json::to_string(&Decimal::INFINITY).unwrap(), "\"+Inf\"");
    assert_eq!(
        serde_json::to_string(&Decimal::NEG_INFINITY).unwrap(),
        "\"-Inf\""
    );
    assert_eq!(serde_json::to_string(&Decimal::NAN).unwrap(), "\"NaN\"");

    assert_eq!(
        serde_json::from_str::<Decimal>("\"+Inf\"").unwrap(),
        Decimal::INFINITY
    );
    assert!(serde_json::from_str::<Decimal>("\"NaN\"").unwrap().is_nan());
    assert_eq!(
        serde_json::from_str::<Decimal>("\"~0\"").unwrap(),
        Decimal::NEAR_ZERO
    );
}

#[test]
fn decimal_json_accepts_bare_numbers() {
    assert_eq!(serde_json::from_str::<Decimal>("42").unwrap(), d("42"));
    assert_eq!(serde_json::from_str::<Decimal>("-7").unwrap(), d("-7"));
    assert_eq!(serde_json::from_str::<Decimal>("1.5").unwrap(), d("1.5"));
}

#[test]
fn decimal_compact_is_raw_word() {
    let v = d("1.5");

    assert_tokens(&v.compact(), &[Token::I64(v.to_raw())]);
    assert_tokens(&v.readable(), &[Token::Str("1.5")]);

    assert_tokens(&Decimal::NULL.compact(), &[Token::I64(0)]);
    assert_tokens(&Decimal::ZERO.compact(), &[Token::I64(i64::MIN)]);
}

#[test]
fn weight_json_round_trip() {
    for s in ["1.5kg", "550g", "~102.23g", "11lb", "1 oz t", "0g"] {
        let v = w(s);
        let json = serde_json::to_string(&v).unwrap();

        assert_eq!(json, format!("\"{s}\""));
        assert_eq!(serde_json::from_str::<Weight>(&json).unwrap(), v);
    }

    assert_eq!(serde_json::to_string(&Weight::NULL).unwrap(), "\"0\"");
}

#[test]
fn weight_json_accepts_bare_numbers() {
    let v = serde_json::from_str::<Weight>("101").unwrap();

    assert_eq!(v.unit(), "kg");
    assert_eq!(v, w("101kg"));
}

#[test]
fn weight_compact_is_raw_word() {
    let v = w("1.5kg");

    assert_tokens(&v.compact(), &[Token::I64(v.to_raw())]);
    assert_tokens(&v.readable(), &[Token::Str("1.5kg")]);
}
