//! The host side of introspection: a narrow, read-only view of a command tree.

use crate::param::{ParamKind, Value};
use serde::Deserialize;
use std::path::Path;

/// One parameter as the host declares it, before any type resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    /// Free-form type hint, resolved through a [`TypeTable`](crate::TypeTable).
    pub type_hint: Option<String>,
    pub default: Option<Value>,
    pub required: bool,
    pub help: Option<String>,
    /// Source spellings such as `--formal` or `-r`.
    pub flags: Vec<String>,
    /// Kind stated explicitly by the host, if it states one.
    pub kind: Option<ParamKind>,
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, type_hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_hint: Some(type_hint.into()),
            ..Self::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn with_kind(mut self, kind: ParamKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Anything that can be walked as a command tree.
///
/// Implement this for whatever structure the host's CLI framework exposes.
pub trait HostCommand {
    /// Display name; `None` or empty means "unnamed".
    fn name(&self) -> Option<&str>;

    fn help(&self) -> Option<&str> {
        None
    }

    /// Invocation signature in declared order.
    fn signature(&self) -> Vec<ParamDecl>;

    /// Subcommands in declared order.
    fn children(&self) -> Vec<&dyn HostCommand>;
}

/// A command tree described as JSON.
///
/// ```json
/// {
///   "name": "mycli",
///   "commands": [
///     {"name": "greet", "params": [
///       {"name": "name", "type": "str", "help": "Name to greet"},
///       {"name": "formal", "type": "bool", "default": false, "flags": ["--formal"]}
///     ]}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaCommand {
    pub name: Option<String>,
    pub help: Option<String>,
    pub params: Vec<SchemaParam>,
    pub commands: Vec<SchemaCommand>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchemaParam {
    pub name: String,
    #[serde(rename = "type")]
    pub type_hint: Option<String>,
    pub default: Option<serde_json::Value>,
    pub required: Option<bool>,
    pub help: Option<String>,
    pub flags: Vec<String>,
    pub kind: Option<ParamKind>,
}

impl SchemaCommand {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("can't read command tree {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("can't parse command tree {}", path.display()))
    }
}

impl SchemaParam {
    fn to_decl(&self) -> ParamDecl {
        let default = self.default.as_ref().and_then(json_to_value);
        let positional = self.kind == Some(ParamKind::Positional)
            || (self.kind.is_none() && self.flags.is_empty() && default.is_none());
        ParamDecl {
            name: self.name.clone(),
            type_hint: self.type_hint.clone(),
            required: self
                .required
                .unwrap_or(positional && default.is_none()),
            default,
            help: self.help.clone(),
            flags: self.flags.clone(),
            kind: self.kind,
        }
    }
}

/// JSON `null` means "no default".
fn json_to_value(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => Some(match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        }),
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        other => Some(Value::Str(other.to_string())),
    }
}

impl HostCommand for SchemaCommand {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    fn signature(&self) -> Vec<ParamDecl> {
        self.params.iter().map(SchemaParam::to_decl).collect()
    }

    fn children(&self) -> Vec<&dyn HostCommand> {
        self.commands.iter().map(|c| c as &dyn HostCommand).collect()
    }
}
