//! Rendering parameter values into an argument vector.
//!
//! Everything here is pure: identical inputs give byte-identical output, and
//! the iteration order of the value map never matters because parameters are
//! always rendered in the command's declared order.

use crate::error::ArgumentBuildError;
use crate::node::CommandNode;
use crate::param::{ParamKind, ParameterInfo, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Parameter values keyed by parameter name.
pub type ParamValues = HashMap<String, Value>;

/// A fully rendered process invocation:
/// `[runtime, module_path, ...args]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program that runs the module, e.g. `python3`.
    pub runtime: String,
    pub module_path: PathBuf,
    /// Command tokens followed by rendered parameters.
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(runtime: impl Into<String>, module_path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            runtime: runtime.into(),
            module_path: module_path.into(),
            args,
        }
    }

    /// The complete argument vector, runtime first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 2);
        argv.push(self.runtime.clone());
        argv.push(self.module_path.to_string_lossy().into_owned());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Builds invocations of one module through one runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgvBuilder {
    runtime: String,
    module_path: PathBuf,
}

impl ArgvBuilder {
    pub fn new(runtime: impl Into<String>, module_path: impl Into<PathBuf>) -> Self {
        Self {
            runtime: runtime.into(),
            module_path: module_path.into(),
        }
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    pub fn module_path(&self) -> &std::path::Path {
        &self.module_path
    }

    /// Render `command` below the groups named by `command_path`.
    ///
    /// The command's own name follows `command_path`, unless it is a
    /// directly invocable root. Fails without producing anything when a
    /// required parameter has neither a value nor a default.
    pub fn build<S: AsRef<str>>(
        &self,
        command_path: &[S],
        command: &CommandNode,
        values: &ParamValues,
    ) -> Result<Invocation, ArgumentBuildError> {
        let parameters = render_parameters(command, values)?;

        let mut args: Vec<String> = command_path.iter().map(|s| s.as_ref().to_string()).collect();
        if !command.root {
            args.push(command.name.clone());
        }
        args.extend(parameters);

        let invocation = Invocation::new(self.runtime.clone(), self.module_path.clone(), args);
        debug!(argv = ?invocation.argv(), "built invocation");
        Ok(invocation)
    }

    /// [`build`](Self::build) with the command's own ancestors as the path.
    pub fn build_node(
        &self,
        command: &CommandNode,
        values: &ParamValues,
    ) -> Result<Invocation, ArgumentBuildError> {
        self.build(command.ancestors(), command, values)
    }
}

/// Render the parameters of `command` in declared order.
pub fn render_parameters(
    command: &CommandNode,
    values: &ParamValues,
) -> Result<Vec<String>, ArgumentBuildError> {
    for name in values.keys() {
        if command.parameter(name).is_none() {
            warn!(command = %command.display_path(), "ignoring unknown parameter `{name}`");
        }
    }

    let mut argv = Vec::new();
    for parameter in &command.parameters {
        let value = match values.get(&parameter.name) {
            Some(value) => Some(coerce(parameter, value.clone())?),
            None => parameter.default.clone(),
        };

        if parameter.is_flag() {
            // Absent means "not passed", even with a `true` default.
            match values.get(&parameter.name).and(value) {
                Some(value) if value.as_bool() == Some(true) => argv.push(parameter.flag_name()),
                Some(_) => {}
                None if parameter.required => return Err(missing(parameter, command)),
                None => {}
            }
            continue;
        }

        let Some(value) = value else {
            if parameter.required {
                return Err(missing(parameter, command));
            }
            continue;
        };
        match parameter.kind {
            ParamKind::Option => {
                argv.push(parameter.flag_name());
                argv.push(value.to_string());
            }
            ParamKind::Positional => argv.push(value.to_string()),
        }
    }
    Ok(argv)
}

/// Coerce raw form input (`name -> text`) into typed values.
///
/// Empty text for a non-string parameter counts as "no value".
pub fn coerce_values<K, V, I>(command: &CommandNode, raw: I) -> Result<ParamValues, ArgumentBuildError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut values = ParamValues::new();
    for (name, text) in raw {
        let (name, text) = (name.as_ref(), text.as_ref());
        let Some(parameter) = command.parameter(name) else {
            warn!(command = %command.display_path(), "ignoring unknown parameter `{name}`");
            continue;
        };
        if text.is_empty() && parameter.value_type != crate::param::ValueType::String {
            continue;
        }
        let value = Value::parse(text, parameter.value_type, &parameter.choices).map_err(|source| {
            ArgumentBuildError::Uncoercible {
                parameter: parameter.name.clone(),
                source,
            }
        })?;
        values.insert(parameter.name.clone(), value);
    }
    Ok(values)
}

fn coerce(parameter: &ParameterInfo, value: Value) -> Result<Value, ArgumentBuildError> {
    value
        .coerce(parameter.value_type, &parameter.choices)
        .map_err(|source| ArgumentBuildError::Uncoercible {
            parameter: parameter.name.clone(),
            source,
        })
}

fn missing(parameter: &ParameterInfo, command: &CommandNode) -> ArgumentBuildError {
    ArgumentBuildError::MissingRequired {
        parameter: parameter.name.clone(),
        command_path: command.path.clone(),
    }
}
