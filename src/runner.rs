use crate::argv::{ArgvBuilder, Invocation, ParamValues, coerce_values};
use crate::error::ArgumentBuildError;
use crate::executor::{ExecutionHandle, Executor, OutputSink};
use crate::host::HostCommand;
use crate::introspect::{Diagnostic, Introspection, Introspector};
use crate::node::CommandNode;
use tracing::debug;

/// Introspected commands of one host module, ready to be launched.
///
/// Example
/// ```no_run
/// # async fn demo() -> anyhow::Result<()> {
/// use command_runner::{ArgvBuilder, ConsoleSink, ParamValues, Runner, SchemaCommand};
///
/// let tree = SchemaCommand::from_file("demos/mycli.json".as_ref())?;
/// let runner = Runner::new(&tree, ArgvBuilder::new("python3", "mycli.py"));
/// let handle = runner.run("greet", &ParamValues::new(), ConsoleSink).await?;
/// println!("{}", handle.wait().await);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Runner {
    introspection: Introspection,
    builder: ArgvBuilder,
    executor: Executor,
}

impl Runner {
    /// Introspect `host` with the default type table.
    pub fn new(host: &dyn HostCommand, builder: ArgvBuilder) -> Self {
        Self::from_introspection(Introspector::default().introspect(host), builder)
    }

    pub fn from_introspection(introspection: Introspection, builder: ArgvBuilder) -> Self {
        Self {
            introspection,
            builder,
            executor: Executor::default(),
        }
    }

    pub fn with_executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }

    pub fn introspection(&self) -> &Introspection {
        &self.introspection
    }

    pub fn commands(&self) -> &[CommandNode] {
        &self.introspection.commands
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.introspection.diagnostics
    }

    pub fn builder(&self) -> &ArgvBuilder {
        &self.builder
    }

    pub fn find(&self, path: &str) -> Option<&CommandNode> {
        self.introspection.find(path)
    }

    /// Resolve a runnable command: groups and unknown paths are rejected.
    pub fn command(&self, path: &str) -> Result<&CommandNode, ArgumentBuildError> {
        let node = self
            .find(path)
            .ok_or_else(|| ArgumentBuildError::UnknownCommand { path: path.into() })?;
        if node.is_group() {
            return Err(ArgumentBuildError::GroupNotRunnable { path: path.into() });
        }
        Ok(node)
    }

    /// Render the invocation of `path` without starting anything.
    pub fn invocation(
        &self,
        path: &str,
        values: &ParamValues,
    ) -> Result<Invocation, ArgumentBuildError> {
        let command = self.command(path)?;
        self.builder.build_node(command, values)
    }

    /// Build the invocation of `path` and start it.
    ///
    /// Argument errors are returned before anything is spawned. A failure to
    /// launch is not an error here; it shows up as
    /// [`ExecutionState::FailedToStart`](crate::ExecutionState::FailedToStart)
    /// on the returned handle.
    pub async fn run<S: OutputSink>(
        &self,
        path: &str,
        values: &ParamValues,
        sink: S,
    ) -> Result<ExecutionHandle, ArgumentBuildError> {
        let invocation = self.invocation(path, values)?;
        Ok(self.start(&invocation, sink).await)
    }

    /// Start an invocation rendered earlier by [`invocation`](Self::invocation).
    pub async fn start<S: OutputSink>(&self, invocation: &Invocation, sink: S) -> ExecutionHandle {
        self.executor.start(invocation, sink).await
    }

    /// Like [`run`](Self::run), with raw text values as a form would send them.
    pub async fn run_raw<K, V, I, S>(
        &self,
        path: &str,
        raw: I,
        sink: S,
    ) -> Result<ExecutionHandle, ArgumentBuildError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
        S: OutputSink,
    {
        let values = coerce_values(self.command(path)?, raw)?;
        debug!(path, ?values, "coerced raw values");
        self.run(path, &values, sink).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::executor::{ChannelSink, ExecutionState, OutputLine, StreamOrigin};
    use crate::host::SchemaCommand;
    use crate::param::Value;
    use tempfile::TempDir;

    const TREE: &str = r#"{
        "name": "tool",
        "commands": [
            {"name": "serve", "params": [
                {"name": "host", "type": "str", "default": "127.0.0.1"},
                {"name": "debug", "type": "bool", "default": false}
            ]},
            {"name": "user", "commands": [
                {"name": "add", "params": [
                    {"name": "username", "type": "str"},
                    {"name": "admin", "type": "bool", "default": false}
                ]}
            ]}
        ]
    }"#;

    fn runner(dir: &TempDir) -> Runner {
        let module = dir.path().join("tool.sh");
        std::fs::write(&module, "echo \"$*\"\n").unwrap();
        let tree = SchemaCommand::from_json(TREE).unwrap();
        Runner::new(&tree, ArgvBuilder::new("sh", module))
    }

    fn lines(rx: &mut tokio::sync::mpsc::UnboundedReceiver<OutputLine>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            assert_eq!(line.origin, StreamOrigin::Stdout);
            out.push(line.text);
        }
        out
    }

    #[test]
    fn exposes_the_forest() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let names: Vec<_> = runner.commands().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["serve", "user"]);
        assert!(runner.diagnostics().is_empty());
        assert_eq!(runner.find("user/add").unwrap().path, vec!["user", "add"]);
    }

    #[test]
    fn rejects_unknown_paths_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        assert_eq!(
            runner.invocation("user/delete", &ParamValues::new()),
            Err(ArgumentBuildError::UnknownCommand {
                path: "user/delete".into()
            })
        );
        assert_eq!(
            runner.invocation("user", &ParamValues::new()),
            Err(ArgumentBuildError::GroupNotRunnable {
                path: "user".into()
            })
        );
    }

    #[tokio::test]
    async fn runs_a_nested_command() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let (sink, mut rx) = ChannelSink::new();

        let values: ParamValues = [
            ("username".to_string(), Value::from("bob")),
            ("admin".to_string(), Value::Bool(true)),
        ]
        .into_iter()
        .collect();
        let handle = runner.run("user/add", &values, sink).await.unwrap();

        assert_eq!(&handle.argv()[2..], ["user", "add", "bob", "--admin"]);
        assert_eq!(handle.wait().await, ExecutionState::Completed { exit_code: 0 });
        assert_eq!(lines(&mut rx), vec!["user add bob --admin"]);
    }

    #[tokio::test]
    async fn run_raw_coerces_form_text() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let (sink, mut rx) = ChannelSink::new();

        let handle = runner
            .run_raw("serve", [("host", "0.0.0.0"), ("debug", "on")], sink)
            .await
            .unwrap();
        handle.wait().await;
        assert_eq!(lines(&mut rx), vec!["serve --host 0.0.0.0 --debug"]);

        let (sink, _rx) = ChannelSink::new();
        let err = runner
            .run_raw("serve", [("debug", "perhaps")], sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ArgumentBuildError::Uncoercible { parameter, .. } if parameter == "debug"));
    }

    #[tokio::test]
    async fn missing_required_value_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner(&dir);
        let (sink, mut rx) = ChannelSink::new();

        let err = runner
            .run("user/add", &ParamValues::new(), sink)
            .await
            .unwrap_err();
        assert!(matches!(err, ArgumentBuildError::MissingRequired { parameter, .. } if parameter == "username"));
        assert!(lines(&mut rx).is_empty());
    }
}
