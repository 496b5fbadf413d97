//! Run the commands of a scripting-language CLI as child processes.
//!
//! A host module's command tree is walked once into an immutable forest of
//! [`CommandNode`]s by the [`Introspector`]. Parameter values collected
//! elsewhere (a form, a console line) are rendered into an argument vector by
//! the [`ArgvBuilder`], and the [`Executor`] launches
//! `[runtime, module, ...args]`, streaming every output line to an
//! [`OutputSink`] until the process completes or is stopped.
//!
//! [`Runner`] ties the three together; [`Repl`](repl::Repl) is a small
//! console on top of it.

pub mod argv;
pub mod env;
pub mod error;
pub mod executor;
pub mod host;
pub mod introspect;
pub mod node;
pub mod param;
pub mod repl;
mod resolve;
pub mod runner;
pub mod types;

pub use argv::{ArgvBuilder, Invocation, ParamValues, coerce_values, render_parameters};
pub use env::Environment;
pub use error::{ArgumentBuildError, IntrospectionError, ProcessStartError, ValueError};
pub use executor::{
    ChannelSink, ConsoleSink, ExecutionHandle, ExecutionState, Executor, ExecutorConfig,
    OutputLine, OutputSink, StreamOrigin,
};
pub use host::{HostCommand, ParamDecl, SchemaCommand, SchemaParam};
pub use introspect::{Diagnostic, DiagnosticKind, Introspection, Introspector};
pub use node::CommandNode;
pub use param::{ParamKind, ParameterInfo, Value, ValueType};
pub use runner::Runner;
pub use types::{TypeDescriptor, TypeTable};
