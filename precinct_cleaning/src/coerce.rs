use log::debug;

use crate::config::{CleaningError, CleaningResult};
use crate::table::Value;

/// Converts raw vote counts to integers.
///
/// ```
/// use precinct_cleaning::coerce::ValueCoercer;
/// use precinct_cleaning::Value;
///
/// let coercer = ValueCoercer::new(&[" -   "]);
/// assert_eq!(coercer.coerce(&Value::text("1,234"))?, Value::Int(1234));
/// assert_eq!(coercer.coerce(&Value::text("12.0"))?, Value::Int(12));
/// assert_eq!(coercer.coerce(&Value::text(" -   "))?, Value::Null);
/// # Ok::<(), precinct_cleaning::CleaningError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCoercer {
    null_sentinels: Vec<String>,
    markers: Vec<char>,
}

impl Default for ValueCoercer {
    fn default() -> ValueCoercer {
        ValueCoercer::new(&[])
    }
}

impl ValueCoercer {
    /// The text that some readers leave behind for missing numbers.
    pub const NAN_TEXT: &'static str = "nan";
    /// Characters that some sources stick to the counts (for example `*12`).
    pub const DEFAULT_MARKERS: [char; 1] = ['*'];

    pub fn new(null_sentinels: &[&str]) -> ValueCoercer {
        ValueCoercer {
            null_sentinels: null_sentinels.iter().map(|s| s.to_string()).collect(),
            markers: ValueCoercer::DEFAULT_MARKERS.to_vec(),
        }
    }

    pub fn with_sentinels(mut self, null_sentinels: &[String]) -> ValueCoercer {
        self.null_sentinels.extend(null_sentinels.iter().cloned());
        self
    }

    pub fn null_sentinels(&self) -> &[String] {
        &self.null_sentinels
    }

    /// Returns either `Value::Null` or `Value::Int`.
    pub fn coerce(&self, value: &Value) -> CleaningResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(*i)),
            Value::Float(f) if f.is_nan() => Ok(Value::Null),
            Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
            Value::Text(s) => self.coerce_text(s),
            _ => Err(CleaningError::InvalidNumericValue {
                value: value.to_string(),
            }),
        }
    }

    fn coerce_text(&self, raw: &str) -> CleaningResult<Value> {
        if self.null_sentinels.iter().any(|s| s == raw) || raw == ValueCoercer::NAN_TEXT {
            return Ok(Value::Null);
        }
        let no_commas: String = raw.trim().chars().filter(|c| *c != ',').collect();
        let s = no_commas.trim_matches(|c: char| self.markers.contains(&c) || c.is_whitespace());
        if s.is_empty() {
            debug!("coerce_text: nulling {:?}", raw);
            return Ok(Value::Null);
        }
        let invalid = || CleaningError::InvalidNumericValue {
            value: raw.to_string(),
        };
        if s.contains('.') {
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                _ => Err(invalid()),
            }
        } else {
            s.parse::<i64>().map(Value::Int).map_err(|_| invalid())
        }
    }
}

/// Whether a cell can plausibly be turned into a number.
///
/// This is deliberately stricter than [ValueCoercer]: it flags anything that was
/// likely entered incorrectly, such as `12*` or `-`.
pub fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Null | Value::Int(_) | Value::Float(_) => true,
        Value::Text(s) => {
            let all_digits = |x: &str| !x.is_empty() && x.chars().all(|c| c.is_ascii_digit());
            all_digits(s) || all_digits(&s.replace(',', "")) || s.trim().parse::<f64>().is_ok()
        }
        Value::Bool(_) | Value::Date(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    #[test]
    fn numeric_forms_round_trip() {
        let c = ValueCoercer::default();
        for n in [0_i64, 1, 7, 42, 999, 1000, 1234, 65_536, 1_000_000, 123_456_789] {
            let grouped = {
                let digits = n.to_string();
                let mut out = String::new();
                for (i, ch) in digits.chars().enumerate() {
                    if i > 0 && (digits.len() - i) % 3 == 0 {
                        out.push(',');
                    }
                    out.push(ch);
                }
                out
            };
            assert_eq!(c.coerce(&t(&n.to_string())), Ok(Value::Int(n)));
            assert_eq!(c.coerce(&t(&grouped)), Ok(Value::Int(n)), "{}", grouped);
            assert_eq!(c.coerce(&t(&format!("{}.0", n))), Ok(Value::Int(n)));
            assert_eq!(c.coerce(&Value::Int(n)), Ok(Value::Int(n)));
        }
    }

    #[test]
    fn examples() {
        let c = ValueCoercer::default();
        assert_eq!(c.coerce(&t("1,234")), Ok(Value::Int(1234)));
        assert_eq!(c.coerce(&t("")), Ok(Value::Null));
        assert_eq!(c.coerce(&t("   ")), Ok(Value::Null));
        assert_eq!(c.coerce(&t("12.0")), Ok(Value::Int(12)));
        assert_eq!(c.coerce(&t("nan")), Ok(Value::Null));
        assert_eq!(c.coerce(&t(",")), Ok(Value::Null));
        assert_eq!(c.coerce(&t("-3")), Ok(Value::Int(-3)));
        assert_eq!(c.coerce(&Value::Float(7.9)), Ok(Value::Int(7)));
        assert_eq!(c.coerce(&Value::Float(f64::NAN)), Ok(Value::Null));
    }

    #[test]
    fn markers_are_stripped() {
        let c = ValueCoercer::default();
        assert_eq!(c.coerce(&t(" *12")), Ok(Value::Int(12)));
        assert_eq!(c.coerce(&t("12*")), Ok(Value::Int(12)));
        assert_eq!(c.coerce(&t("*")), Ok(Value::Null));
    }

    #[test]
    fn sentinels_never_raise() {
        let sentinels = ["X", "-", " -   ", "Write-ins", "#REF!", "o"];
        let c = ValueCoercer::new(&sentinels);
        for s in sentinels.iter() {
            assert_eq!(c.coerce(&t(s)), Ok(Value::Null), "{:?}", s);
        }
    }

    #[test]
    fn invalid_values_are_named() {
        let c = ValueCoercer::default();
        assert_eq!(
            c.coerce(&t("X")),
            Err(CleaningError::InvalidNumericValue {
                value: "X".to_string()
            })
        );
        assert_eq!(
            c.coerce(&t("1.2.3")),
            Err(CleaningError::InvalidNumericValue {
                value: "1.2.3".to_string()
            })
        );
        assert!(c.coerce(&Value::Bool(true)).is_err());
    }

    #[test]
    fn numeric_plausibility() {
        assert!(is_numeric(&t("12")));
        assert!(is_numeric(&t("1,234")));
        assert!(is_numeric(&t("12.5")));
        assert!(is_numeric(&Value::Null));
        assert!(is_numeric(&Value::Int(3)));
        assert!(!is_numeric(&t("X")));
        assert!(!is_numeric(&t("12*")));
        assert!(!is_numeric(&t("")));
        assert!(!is_numeric(&Value::Bool(false)));
    }
}
