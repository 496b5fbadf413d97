//! Type-descriptor table consulted by the introspector.
//!
//! Hosts declare parameter types as free-form hints (`int`, `Optional[str]`,
//! `Literal['a', 'b']`, a registered enum name, ...). The table maps a hint to
//! a [`ValueType`], so the way a signature is written stays separate from the
//! type tag that comes out of it.

use crate::param::ValueType;
use regex::Regex;
use std::collections::HashMap;

/// What a hint resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Scalar(ValueType),
    Enum(Vec<String>),
}

/// Outcome of resolving one hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    pub value_type: ValueType,
    pub choices: Vec<String>,
    /// The hint was missing or unsupported and `String` was assumed.
    pub guessed: bool,
}

impl ResolvedType {
    fn guess() -> Self {
        Self {
            value_type: ValueType::String,
            choices: Vec::new(),
            guessed: true,
        }
    }
}

impl From<TypeDescriptor> for ResolvedType {
    fn from(descriptor: TypeDescriptor) -> Self {
        match descriptor {
            TypeDescriptor::Scalar(value_type) => Self {
                value_type,
                choices: Vec::new(),
                guessed: false,
            },
            TypeDescriptor::Enum(choices) => Self {
                value_type: ValueType::Enum,
                choices,
                guessed: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeTable {
    entries: HashMap<String, TypeDescriptor>,
    optional: Regex,
    literal: Regex,
}

impl TypeTable {
    /// A table with no entries at all; every hint becomes a guess.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            optional: Regex::new(r"^(?:typing\.)?(?:Optional|Option)\s*[\[<]\s*(.+?)\s*[\]>]$")
                .expect("valid optional pattern"),
            literal: Regex::new(r"^(?:typing\.)?Literal\s*\[(.*)\]$").expect("valid literal pattern"),
        }
    }

    pub fn register(&mut self, hint: impl Into<String>, descriptor: TypeDescriptor) -> &mut Self {
        self.entries.insert(hint.into(), descriptor);
        self
    }

    /// Register a named enumeration, e.g. `Color` with `red`, `green`, `blue`.
    pub fn register_enum<I, S>(&mut self, hint: impl Into<String>, choices: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let choices = choices.into_iter().map(Into::into).collect();
        self.register(hint, TypeDescriptor::Enum(choices))
    }

    /// Resolve a declared hint. Never fails: anything unknown falls back to a
    /// guessed `String`.
    pub fn resolve(&self, hint: Option<&str>) -> ResolvedType {
        let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) else {
            return ResolvedType::guess();
        };
        let hint = self.unwrap_optional(hint);

        if let Some(descriptor) = self.entries.get(hint) {
            return descriptor.clone().into();
        }
        if let Some(caps) = self.literal.captures(hint) {
            let choices: Vec<String> = literal_items(&caps[1])
                .into_iter()
                .map(|c| c.trim().trim_matches(|q| q == '\'' || q == '"').to_string())
                .filter(|c| !c.is_empty())
                .collect();
            if !choices.is_empty() {
                return TypeDescriptor::Enum(choices).into();
            }
        }
        ResolvedType::guess()
    }

    /// Strip `Optional[X]`, `Option<X>` and `X | None` down to `X`.
    fn unwrap_optional<'a>(&self, hint: &'a str) -> &'a str {
        if let Some(inner) = self.optional.captures(hint).and_then(|c| c.get(1)) {
            return inner.as_str();
        }
        let mut parts = hint.split('|').map(str::trim).filter(|p| *p != "None");
        match (parts.next(), parts.next()) {
            (Some(only), None) if hint.contains('|') => only,
            _ => hint,
        }
    }
}

/// Split the inside of `Literal[...]` on commas outside quotes.
fn literal_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(open), _) if c == open => quote = None,
            (None, ',') => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);
    items
}

impl Default for TypeTable {
    fn default() -> Self {
        let mut table = Self::empty();
        let scalars: [(&[&str], ValueType); 5] = [
            (&["str", "string", "String", "&str"], ValueType::String),
            (
                &["int", "integer", "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64", "usize"],
                ValueType::Integer,
            ),
            (&["float", "f32", "f64", "number"], ValueType::Float),
            (&["bool", "boolean"], ValueType::Boolean),
            (&["Path", "PathBuf", "pathlib.Path", "path"], ValueType::Path),
        ];
        for (hints, value_type) in scalars {
            for hint in hints {
                table.register(*hint, TypeDescriptor::Scalar(value_type));
            }
        }
        table
    }
}
