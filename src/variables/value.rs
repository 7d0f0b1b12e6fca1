//! Typed variable values and their canonical string forms.

use std::fmt;

use crate::constants::FLOAT_PRECISION;

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    /// UTF-8 string.
    Str,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
}

impl VarType {
    /// Name used on the wire (`str`, `int`, `float`).
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
        }
    }

    /// Coerce a raw string into a value of this type.
    ///
    /// Surrounding whitespace is ignored for numeric types; strings are
    /// taken verbatim. Returns `None` when the text does not parse.
    pub fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Self::Str => Some(Value::Str(raw.to_string())),
            Self::Int => raw.trim().parse::<i64>().ok().map(Value::Int),
            Self::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A variable value tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
}

impl Value {
    /// Type tag of this value.
    pub fn var_type(&self) -> VarType {
        match self {
            Self::Str(_) => VarType::Str,
            Self::Int(_) => VarType::Int,
            Self::Float(_) => VarType::Float,
        }
    }

    /// Canonical string form.
    ///
    /// Integers render as plain decimal, floats with exactly six digits
    /// after the decimal point.
    pub fn canonical(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{:.*}", FLOAT_PRECISION, f),
        }
    }

    /// Integer view, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_canonical_has_six_digits() {
        assert_eq!(Value::Float(0.25).canonical(), "0.250000");
        assert_eq!(Value::Float(1.0).canonical(), "1.000000");
        assert_eq!(Value::Float(-2.5).canonical(), "-2.500000");
    }

    #[test]
    fn test_int_canonical_drops_leading_zeros() {
        let v = VarType::Int.coerce("007").unwrap();
        assert_eq!(v.canonical(), "7");
        assert_eq!(VarType::Int.coerce("-0").unwrap().canonical(), "0");
    }

    #[test]
    fn test_numeric_coercion_trims_whitespace() {
        assert_eq!(VarType::Int.coerce(" 42 "), Some(Value::Int(42)));
        assert_eq!(VarType::Float.coerce("0.5\n"), Some(Value::Float(0.5)));
    }

    #[test]
    fn test_bad_numeric_input_does_not_coerce() {
        assert_eq!(VarType::Int.coerce("4.5"), None);
        assert_eq!(VarType::Int.coerce("abc"), None);
        assert_eq!(VarType::Float.coerce(""), None);
        assert_eq!(VarType::Float.coerce("inf"), None);
    }

    #[test]
    fn test_string_coercion_is_verbatim() {
        assert_eq!(
            VarType::Str.coerce("  spaced  "),
            Some(Value::Str("  spaced  ".to_string()))
        );
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(VarType::Str.to_string(), "str");
        assert_eq!(VarType::Int.to_string(), "int");
        assert_eq!(VarType::Float.to_string(), "float");
    }
}
