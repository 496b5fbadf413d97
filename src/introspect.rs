//! Builds the command model from a host command tree.

use crate::error::IntrospectionError;
use crate::host::{HostCommand, ParamDecl};
use crate::node::{CommandNode, FALLBACK_NAME};
use crate::param::{ParamKind, ParameterInfo, ValueType};
use crate::types::TypeTable;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Something noteworthy about one node, reported next to the forest.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Path of the affected command.
    pub path: Vec<String>,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// The node and its subtree were dropped.
    Error(IntrospectionError),
    /// The parameter's type hint was missing or unsupported; it was treated
    /// as a string.
    TypeGuess {
        parameter: String,
        hint: Option<String>,
    },
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        matches!(self.kind, DiagnosticKind::Error(_))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path.join("/");
        match &self.kind {
            DiagnosticKind::Error(e) => write!(f, "{path}: {e}"),
            DiagnosticKind::TypeGuess {
                parameter,
                hint: Some(hint),
            } => write!(f, "{path}: unsupported type `{hint}` for `{parameter}`, treating it as a string"),
            DiagnosticKind::TypeGuess {
                parameter,
                hint: None,
            } => write!(f, "{path}: no type for `{parameter}`, treating it as a string"),
        }
    }
}

/// Result of walking a host tree: a possibly partial forest plus diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Introspection {
    pub commands: Vec<CommandNode>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Introspection {
    /// Look a command up by its `/`-separated path, e.g. `user/add`.
    ///
    /// An empty path selects a directly invocable root command.
    pub fn find(&self, path: &str) -> Option<&CommandNode> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.find_path(&segments)
    }

    pub fn find_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<&CommandNode> {
        match segments.split_first() {
            None => self.commands.iter().find(|c| c.root),
            Some((first, rest)) => self
                .commands
                .iter()
                .find(|c| !c.root && c.name == first.as_ref())
                .or_else(|| {
                    // A standalone root may still be addressed by its name.
                    self.commands
                        .iter()
                        .find(|c| c.root && c.name == first.as_ref())
                })
                .and_then(|c| c.find(rest)),
        }
    }

    /// Every command in the forest, depth first.
    pub fn walk(&self) -> impl Iterator<Item = &CommandNode> {
        self.commands.iter().flat_map(|c| c.walk())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

/// Walks host command trees into [`CommandNode`] forests.
#[derive(Debug, Clone, Default)]
pub struct Introspector {
    types: TypeTable,
}

impl Introspector {
    pub fn new(types: TypeTable) -> Self {
        Self { types }
    }

    /// Introspect a host tree.
    ///
    /// A root with subcommands yields one node per top-level command; a root
    /// without subcommands is itself the single, directly invocable command.
    /// Malformed nodes are dropped with their subtree and reported in
    /// [`Introspection::diagnostics`]; this never fails as a whole.
    pub fn introspect(&self, root: &dyn HostCommand) -> Introspection {
        let mut diagnostics = Vec::new();
        let children = root.children();
        let commands = if children.is_empty() {
            self.node(root, &[], &mut diagnostics)
                .map(|mut node| {
                    node.root = true;
                    node
                })
                .into_iter()
                .collect()
        } else {
            if !root.signature().is_empty() {
                debug!("ignoring parameters declared on the root of a command group");
            }
            self.children(&children, &[], &mut diagnostics)
                .into_values()
                .collect()
        };
        Introspection {
            commands,
            diagnostics,
        }
    }

    fn node(
        &self,
        host: &dyn HostCommand,
        ancestors: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<CommandNode> {
        let mut node = CommandNode::new(display_name(host.name()), ancestors);
        node.help = host.help().map(str::to_string);

        let mut guesses = Vec::new();
        match self.parameters(host.signature(), &mut guesses) {
            Ok(parameters) => node.parameters = parameters,
            Err(e) => {
                report(diagnostics, node.path, DiagnosticKind::Error(e));
                return None;
            }
        }
        for (parameter, hint) in guesses {
            report(
                diagnostics,
                node.path.clone(),
                DiagnosticKind::TypeGuess { parameter, hint },
            );
        }

        node.children = self.children(&host.children(), &node.path, diagnostics);
        Some(node)
    }

    fn children(
        &self,
        hosts: &[&dyn HostCommand],
        ancestors: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> IndexMap<String, CommandNode> {
        let mut children = IndexMap::new();
        for host in hosts {
            let Some(child) = self.node(*host, ancestors, diagnostics) else {
                continue;
            };
            if children.contains_key(&child.name) {
                let name = child.name.clone();
                report(
                    diagnostics,
                    child.path,
                    DiagnosticKind::Error(IntrospectionError::DuplicateCommand { name }),
                );
                continue;
            }
            children.insert(child.name.clone(), child);
        }
        children
    }

    fn parameters(
        &self,
        signature: Vec<ParamDecl>,
        guesses: &mut Vec<(String, Option<String>)>,
    ) -> Result<Vec<ParameterInfo>, IntrospectionError> {
        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(signature.len());

        for decl in signature {
            if decl.name.is_empty() {
                return Err(IntrospectionError::EmptyParameterName);
            }
            if !seen.insert(decl.name.clone()) {
                return Err(IntrospectionError::DuplicateParameter { name: decl.name });
            }
            if decl.required && decl.default.is_some() {
                return Err(IntrospectionError::RequiredWithDefault { name: decl.name });
            }

            let resolved = self.types.resolve(decl.type_hint.as_deref());
            if resolved.guessed {
                guesses.push((decl.name.clone(), decl.type_hint.clone()));
            }
            let default = match decl.default.clone() {
                Some(value) => Some(value.coerce(resolved.value_type, &resolved.choices).map_err(
                    |source| IntrospectionError::InvalidDefault {
                        name: decl.name.clone(),
                        source,
                    },
                )?),
                None => None,
            };

            parameters.push(ParameterInfo {
                kind: classify(&decl, resolved.value_type),
                name: decl.name,
                value_type: resolved.value_type,
                choices: resolved.choices,
                default,
                required: decl.required,
                help: decl.help,
            });
        }
        Ok(parameters)
    }
}

fn display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => FALLBACK_NAME.to_string(),
    }
}

/// Option or positional. The first matching rule wins:
///
/// 1. booleans are always options (presence flags);
/// 2. a declared spelling starting with `-` makes an option;
/// 3. a kind the host states explicitly is taken as is;
/// 4. a parameter with a default is an option;
/// 5. everything else is positional.
fn classify(decl: &ParamDecl, value_type: ValueType) -> ParamKind {
    if value_type == ValueType::Boolean || decl.flags.iter().any(|f| f.starts_with('-')) {
        return ParamKind::Option;
    }
    match decl.kind {
        Some(kind) => kind,
        None if decl.default.is_some() => ParamKind::Option,
        None => ParamKind::Positional,
    }
}

fn report(diagnostics: &mut Vec<Diagnostic>, path: Vec<String>, kind: DiagnosticKind) {
    let diagnostic = Diagnostic { path, kind };
    warn!("{diagnostic}");
    diagnostics.push(diagnostic);
}
