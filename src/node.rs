use crate::param::ParameterInfo;
use indexmap::IndexMap;

/// Name given to a command whose definition leaves its name unset.
pub const FALLBACK_NAME: &str = "main";

/// Immutable description of one command or command group.
///
/// Nodes are produced by the [`Introspector`](crate::Introspector) and never
/// mutated afterwards; re-introspecting a host tree builds a new forest.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandNode {
    pub name: String,
    /// Ancestor names followed by `name`.
    pub path: Vec<String>,
    pub help: Option<String>,
    /// Parameters in declared order.
    pub parameters: Vec<ParameterInfo>,
    /// Subcommands in declared order.
    pub children: IndexMap<String, CommandNode>,
    /// Set for a host root without subcommands. Such a command is invoked
    /// directly, so its name never appears in the argument vector.
    pub root: bool,
}

impl CommandNode {
    /// Create an empty node below `ancestors`.
    pub fn new(name: impl Into<String>, ancestors: &[String]) -> Self {
        let name = name.into();
        let mut path = ancestors.to_vec();
        path.push(name.clone());
        Self {
            name,
            path,
            help: None,
            parameters: Vec::new(),
            children: IndexMap::new(),
            root: false,
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterInfo) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_child(mut self, child: CommandNode) -> Self {
        self.children.insert(child.name.clone(), child);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterInfo> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&CommandNode> {
        self.children.get(name)
    }

    /// Descend through `segments`, starting below this node.
    pub fn find<S: AsRef<str>>(&self, segments: &[S]) -> Option<&CommandNode> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.child(segment.as_ref()))
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Names of the groups above this command.
    pub fn ancestors(&self) -> &[String] {
        &self.path[..self.path.len().saturating_sub(1)]
    }

    /// The `/`-separated path, e.g. `user/add`.
    pub fn display_path(&self) -> String {
        self.path.join("/")
    }

    /// This node and all of its descendants, depth first in declared order.
    pub fn walk(&self) -> impl Iterator<Item = &CommandNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.values().rev());
            Some(node)
        })
    }
}
