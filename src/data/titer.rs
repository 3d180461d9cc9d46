use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Titer – one parsed measurement
// ---------------------------------------------------------------------------

/// A single hemagglutination-inhibition style measurement.
///
/// Censored values (`<10`, `>1280`) resolve to numbers with one fixed rule:
/// a `<` bound is halved, a `>` bound is doubled. Split readings (`20/40`)
/// resolve to the geometric mean of their halves.
#[derive(Debug, Clone, PartialEq)]
pub enum Titer {
    Exact(f64),
    /// Below the detection bound, `<b`.
    Below(f64),
    /// Above the detection bound, `>b`.
    Above(f64),
    /// Two readings for one cell, `a/b`. Halves are never split or missing.
    Split(Box<Titer>, Box<Titer>),
    /// Not measured (`*`, empty, or JSON null).
    Missing,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TiterParseError {
    #[error("titer `{0}` is not a number")]
    NotNumeric(String),
    #[error("titer `{0}` must be positive")]
    NonPositive(String),
    #[error("titer `{0}` is not a valid split reading")]
    MalformedSplit(String),
}

impl Titer {
    pub fn parse(token: &str) -> Result<Self, TiterParseError> {
        let token = token.trim();
        if token.is_empty() || token == "*" {
            return Ok(Titer::Missing);
        }
        if let Some((first, second)) = token.split_once('/') {
            if second.contains('/') {
                return Err(TiterParseError::MalformedSplit(token.to_string()));
            }
            let first = parse_single(first.trim())?;
            let second = parse_single(second.trim())?;
            return Ok(Titer::Split(Box::new(first), Box::new(second)));
        }
        parse_single(token)
    }

    /// The numeric value used in analysis, `None` when missing.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Titer::Exact(v) => Some(*v),
            Titer::Below(bound) => Some(bound / 2.0),
            Titer::Above(bound) => Some(bound * 2.0),
            Titer::Split(a, b) => Some((a.numeric()? * b.numeric()?).sqrt()),
            Titer::Missing => None,
        }
    }

    pub fn is_less_than(&self) -> bool {
        match self {
            Titer::Below(_) => true,
            Titer::Split(a, b) => a.is_less_than() || b.is_less_than(),
            _ => false,
        }
    }

    pub fn is_greater_than(&self) -> bool {
        match self {
            Titer::Above(_) => true,
            Titer::Split(a, b) => a.is_greater_than() || b.is_greater_than(),
            _ => false,
        }
    }

    pub fn is_censored(&self) -> bool {
        self.is_less_than() || self.is_greater_than()
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Titer::Missing)
    }
}

/// Canonical token form, e.g. `<10`, `40`, `<320/640`, `*`.
impl fmt::Display for Titer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Titer::Exact(v) => write!(f, "{}", format_number(*v)),
            Titer::Below(bound) => write!(f, "<{}", format_number(*bound)),
            Titer::Above(bound) => write!(f, ">{}", format_number(*bound)),
            Titer::Split(a, b) => write!(f, "{a}/{b}"),
            Titer::Missing => write!(f, "*"),
        }
    }
}

fn parse_single(token: &str) -> Result<Titer, TiterParseError> {
    if let Some(bound) = token.strip_prefix('<') {
        return parse_value(bound.trim_start(), token).map(Titer::Below);
    }
    if let Some(bound) = token.strip_prefix('>') {
        return parse_value(bound.trim_start(), token).map(Titer::Above);
    }
    parse_value(token, token).map(Titer::Exact)
}

fn parse_value(text: &str, token: &str) -> Result<f64, TiterParseError> {
    let value: f64 = text
        .parse()
        .map_err(|_| TiterParseError::NotNumeric(token.to_string()))?;
    if !value.is_finite() {
        return Err(TiterParseError::NotNumeric(token.to_string()));
    }
    if value <= 0.0 {
        return Err(TiterParseError::NonPositive(token.to_string()));
    }
    Ok(value)
}

/// Integral values print without a fractional part (`40`, not `40.0`).
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

// ---------------------------------------------------------------------------
// TiterToken – raw cell text as found in a results file
// ---------------------------------------------------------------------------

/// Raw cell content. Deserializes from a JSON string, number or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<TokenRepr>")]
pub struct TiterToken(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenRepr {
    Text(String),
    Number(f64),
}

impl From<Option<TokenRepr>> for TiterToken {
    fn from(value: Option<TokenRepr>) -> Self {
        match value {
            Some(TokenRepr::Text(s)) => TiterToken(s),
            Some(TokenRepr::Number(n)) => TiterToken(format_number(n)),
            None => TiterToken(String::new()),
        }
    }
}

impl From<&str> for TiterToken {
    fn from(value: &str) -> Self {
        TiterToken(value.to_string())
    }
}

impl TiterToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(&self) -> Result<Titer, TiterParseError> {
        Titer::parse(&self.0)
    }
}

/// A cell of a built matrix: the raw token and its parsed form.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub raw: String,
    pub titer: Titer,
}

impl Measurement {
    pub fn missing() -> Self {
        Measurement {
            raw: String::new(),
            titer: Titer::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(token: &str) -> f64 {
        Titer::parse(token).unwrap().numeric().unwrap()
    }

    #[test]
    fn converts_censored_and_split_tokens() {
        assert!((value("20/40") - 800f64.sqrt()).abs() < 1e-9);
        assert_eq!(value("<320/640"), 320.0);
        assert_eq!(value("640/>1280"), 1280.0);
        assert_eq!(value("<20"), 10.0);
        assert_eq!(value(">5120"), 10240.0);
        assert_eq!(value("320.0"), 320.0);
        assert!((value("80.0/160") - 12800f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn space_after_comparator() {
        assert_eq!(Titer::parse("< 10"), Ok(Titer::Below(10.0)));
        assert_eq!(Titer::parse("> 1280"), Ok(Titer::Above(1280.0)));
        assert_eq!(value("< 20/40"), 20.0);
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in [">>5120", "A", "<<40/80", "40/A", "10/20/40"] {
            assert!(Titer::parse(token).is_err(), "{token} should not parse");
        }
        assert_eq!(
            Titer::parse("<0"),
            Err(TiterParseError::NonPositive("<0".to_string()))
        );
    }

    #[test]
    fn missing_markers() {
        assert_eq!(Titer::parse("*"), Ok(Titer::Missing));
        assert_eq!(Titer::parse("  "), Ok(Titer::Missing));
        assert_eq!(Titer::Missing.numeric(), None);
    }

    #[test]
    fn censor_flags_look_inside_splits() {
        let t = Titer::parse("640/>1280").unwrap();
        assert!(t.is_greater_than());
        assert!(!t.is_less_than());
        assert_eq!(t.to_string(), "640/>1280");
        assert!(!Titer::parse("40").unwrap().is_censored());
    }

    #[test]
    fn tokens_deserialize_from_any_json_scalar() {
        let row: Vec<TiterToken> = serde_json::from_str(r#"["<10", 40, 80.5, null]"#).unwrap();
        let raw: Vec<&str> = row.iter().map(TiterToken::as_str).collect();
        assert_eq!(raw, vec!["<10", "40", "80.5", ""]);
    }
}
