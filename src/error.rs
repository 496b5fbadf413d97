//! Error taxonomy shared by the introspection and execution layers.
//!
//! Each error is scoped to a single command or invocation; nothing here is
//! fatal to the hosting process. A non-zero child exit code is not an error at
//! all, it is reported through [`ExecutionState`](crate::ExecutionState).

use crate::param::ValueType;
use std::path::PathBuf;
use thiserror::Error;

/// A raw value that cannot be represented as the requested [`ValueType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("`{raw}` is not a valid {expected}")]
    Invalid { expected: ValueType, raw: String },

    #[error("`{raw}` is not one of: {}", choices.join(", "))]
    NotAChoice { raw: String, choices: Vec<String> },
}

/// Malformed command or parameter declaration found while walking a host tree.
///
/// Reported as a diagnostic next to the partial command forest; only the
/// offending subtree is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    #[error("parameter name must not be empty")]
    EmptyParameterName,

    #[error("parameter `{name}` is declared more than once")]
    DuplicateParameter { name: String },

    #[error("command `{name}` is declared more than once")]
    DuplicateCommand { name: String },

    #[error("required parameter `{name}` cannot also declare a default")]
    RequiredWithDefault { name: String },

    #[error("default of parameter `{name}` is unusable: {source}")]
    InvalidDefault {
        name: String,
        #[source]
        source: ValueError,
    },
}

/// Failure to turn parameter values into an argument vector.
///
/// Raised before anything is spawned; the caller can retry with corrected
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentBuildError {
    #[error("missing required parameter `{parameter}` for command `{}`", command_path.join(" "))]
    MissingRequired {
        parameter: String,
        command_path: Vec<String>,
    },

    #[error("invalid value for parameter `{parameter}`: {source}")]
    Uncoercible {
        parameter: String,
        #[source]
        source: ValueError,
    },

    #[error("no command at `{path}`")]
    UnknownCommand { path: String },

    #[error("`{path}` is a command group, pick one of its subcommands")]
    GroupNotRunnable { path: String },
}

/// The child process could not be launched.
#[derive(Debug, Error)]
pub enum ProcessStartError {
    #[error("runtime `{runtime}` was not found")]
    RuntimeNotFound { runtime: String },

    #[error("module `{}` does not exist", path.display())]
    ModuleNotFound { path: PathBuf },

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
