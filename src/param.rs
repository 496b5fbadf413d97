use crate::error::ValueError;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// How a parameter is spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// A bare token in declared order.
    #[serde(alias = "argument")]
    Positional,
    /// A `--name value` pair, or a bare `--name` for booleans.
    Option,
}

/// Semantic type tag used for coercion and canonical formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    Enum,
    Path,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Enum => "enum",
            ValueType::Path => "path",
        };
        f.write_str(name)
    }
}

/// A parameter value, typed according to its [`ValueType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Enum(String),
    Path(PathBuf),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Str(_) => ValueType::String,
            Value::Int(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Boolean,
            Value::Enum(_) => ValueType::Enum,
            Value::Path(_) => ValueType::Path,
        }
    }

    /// Parse raw text (typically form input) as a value of `ty`.
    ///
    /// `choices` only matters for [`ValueType::Enum`]; an empty list accepts
    /// any literal.
    pub fn parse(raw: &str, ty: ValueType, choices: &[String]) -> Result<Value, ValueError> {
        let invalid = || ValueError::Invalid {
            expected: ty,
            raw: raw.to_string(),
        };
        match ty {
            ValueType::String => Ok(Value::Str(raw.to_string())),
            ValueType::Integer => raw.trim().parse().map(Value::Int).map_err(|_| invalid()),
            ValueType::Float => raw.trim().parse().map(Value::Float).map_err(|_| invalid()),
            ValueType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            ValueType::Enum => {
                if choices.is_empty() || choices.iter().any(|c| c == raw) {
                    Ok(Value::Enum(raw.to_string()))
                } else {
                    Err(ValueError::NotAChoice {
                        raw: raw.to_string(),
                        choices: choices.to_vec(),
                    })
                }
            }
            ValueType::Path => Ok(Value::Path(PathBuf::from(raw))),
        }
    }

    /// Convert into a value of `ty`, going through the canonical string form
    /// when the variants differ.
    pub fn coerce(self, ty: ValueType, choices: &[String]) -> Result<Value, ValueError> {
        match (self, ty) {
            (Value::Enum(literal), ValueType::Enum) => Value::parse(&literal, ty, choices),
            (value, ty) if value.value_type() == ty => Ok(value),
            (value, ty) => Value::parse(&value.to_string(), ty, choices),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Canonical string form, as placed into an argument vector.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) | Value::Enum(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Path(p) => write!(f, "{}", p.to_string_lossy()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Value::Path(p)
    }
}

/// Immutable description of one command parameter.
///
/// `required` and `default` are mutually exclusive; the builder methods below
/// keep that invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub kind: ParamKind,
    pub value_type: ValueType,
    /// Declared literals of an enum parameter.
    pub choices: Vec<String>,
    pub default: Option<Value>,
    pub required: bool,
    pub help: Option<String>,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, kind: ParamKind, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind,
            value_type,
            choices: Vec::new(),
            default: None,
            required: false,
            help: None,
        }
    }

    /// A `--name value` option.
    pub fn option(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, ParamKind::Option, value_type)
    }

    /// A bare `--name` presence flag.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Option, ValueType::Boolean)
    }

    pub fn positional(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, ParamKind::Positional, value_type)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self.required = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.default = None;
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// The emitted flag, e.g. `db_url` becomes `--db-url`.
    pub fn flag_name(&self) -> String {
        format!("--{}", self.name.replace('_', "-"))
    }

    /// Whether this parameter renders as a bare presence flag.
    pub fn is_flag(&self) -> bool {
        self.kind == ParamKind::Option && self.value_type == ValueType::Boolean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_name_replaces_every_underscore() {
        let p = ParameterInfo::option("db_url", ValueType::String);
        assert_eq!(p.flag_name(), "--db-url");

        let p = ParameterInfo::option("__a_b__c", ValueType::String);
        assert_eq!(p.flag_name(), "----a-b--c");

        let p = ParameterInfo::option("plain.Name9", ValueType::String);
        assert_eq!(p.flag_name(), "--plain.Name9");
    }

    #[test]
    fn canonical_strings() {
        assert_eq!(Value::Int(-42).to_string(), "-42");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Enum("red".into()).to_string(), "red");
        assert_eq!(Value::Path(PathBuf::from("a/b.txt")).to_string(), "a/b.txt");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn parse_each_type() {
        assert_eq!(
            Value::parse(" 8080 ", ValueType::Integer, &[]),
            Ok(Value::Int(8080))
        );
        assert_eq!(
            Value::parse("0.5", ValueType::Float, &[]),
            Ok(Value::Float(0.5))
        );
        assert_eq!(
            Value::parse("Yes", ValueType::Boolean, &[]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            Value::parse("off", ValueType::Boolean, &[]),
            Ok(Value::Bool(false))
        );
        assert!(Value::parse("maybe", ValueType::Boolean, &[]).is_err());
        assert!(Value::parse("8080x", ValueType::Integer, &[]).is_err());
    }

    #[test]
    fn parse_enum_checks_choices() {
        let choices = vec!["red".to_string(), "green".to_string()];
        assert_eq!(
            Value::parse("green", ValueType::Enum, &choices),
            Ok(Value::Enum("green".into()))
        );
        let err = Value::parse("blue", ValueType::Enum, &choices).unwrap_err();
        assert_eq!(err.to_string(), "`blue` is not one of: red, green");
    }

    #[test]
    fn coerce_between_variants() {
        assert_eq!(
            Value::from("12").coerce(ValueType::Integer, &[]),
            Ok(Value::Int(12))
        );
        assert_eq!(
            Value::Int(3).coerce(ValueType::Float, &[]),
            Ok(Value::Float(3.0))
        );
        assert!(Value::Float(3.5).coerce(ValueType::Integer, &[]).is_err());
        assert_eq!(
            Value::from("out.txt").coerce(ValueType::Path, &[]),
            Ok(Value::Path(PathBuf::from("out.txt")))
        );
        assert_eq!(
            Value::Bool(true).coerce(ValueType::String, &[]),
            Ok(Value::Str("true".into()))
        );
    }

    #[test]
    fn required_and_default_are_exclusive() {
        let p = ParameterInfo::option("port", ValueType::Integer)
            .with_default(8080)
            .required();
        assert!(p.required);
        assert_eq!(p.default, None);

        let p = ParameterInfo::option("port", ValueType::Integer)
            .required()
            .with_default(8080);
        assert!(!p.required);
        assert_eq!(p.default, Some(Value::Int(8080)));
    }
}
