//! Interactive console over a [`Runner`].

use crate::argv::coerce_values;
use crate::executor::{ConsoleSink, ExecutionState};
use crate::node::CommandNode;
use crate::param::{ParamKind, ParameterInfo, ValueType};
use crate::runner::Runner;
use anyhow::{Context, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fmt::Write as _;
use tokio::runtime::Runtime;
use tracing::debug;

const HELP: &str = "\
commands:
  list                         show every command
  show <command>               describe a command and its parameters
  run <command> [name=value | name]...
                               run a command; a bare name sets a flag
  help                         this text
  exit                         leave

commands are addressed by path, e.g. `user/add`; Ctrl-C stops a running command";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Empty,
    List,
    Show(String),
    /// `words` are the raw `name=value` or bare flag words.
    Run { path: String, words: Vec<String> },
    Help,
    Exit,
}

impl Line {
    /// Split `input` with shell quoting rules and recognize the command.
    pub fn parse(input: &str) -> anyhow::Result<Line> {
        let words = shell_words::split(input).context("unbalanced quotes")?;
        let Some((first, rest)) = words.split_first() else {
            return Ok(Line::Empty);
        };
        match (first.as_str(), rest) {
            ("list" | "ls", []) => Ok(Line::List),
            ("show", [path]) => Ok(Line::Show(path.clone())),
            ("run", [path, words @ ..]) => Ok(Line::Run {
                path: path.clone(),
                words: words.to_vec(),
            }),
            ("help" | "?", _) => Ok(Line::Help),
            ("exit" | "quit", _) => Ok(Line::Exit),
            ("show" | "run", _) => bail!("usage: {first} <command> ..."),
            (other, _) => bail!("unknown command `{other}`, try `help`"),
        }
    }
}

/// `name=value` words of `command` as pairs.
///
/// A bare `name` means `name=true` and is only accepted for a boolean
/// parameter.
pub fn assignments<S: AsRef<str>>(
    command: &CommandNode,
    words: &[S],
) -> anyhow::Result<Vec<(String, String)>> {
    words
        .iter()
        .map(|word| {
            let word = word.as_ref();
            if let Some((name, value)) = word.split_once('=') {
                return Ok((name.to_string(), value.to_string()));
            }
            match command.parameter(word) {
                Some(p) if p.value_type == ValueType::Boolean => {
                    Ok((word.to_string(), "true".to_string()))
                }
                Some(p) => bail!("`{word}` needs a value: {word}=<{}>", p.value_type),
                None => bail!(
                    "`{word}` is not a flag of `{}`; pass values as name=value",
                    command.display_path()
                ),
            }
        })
        .collect()
}

/// Read-eval-print loop; async work is driven on `runtime`.
pub struct Repl<'a> {
    runner: &'a Runner,
    runtime: &'a Runtime,
}

impl<'a> Repl<'a> {
    pub fn new(runner: &'a Runner, runtime: &'a Runtime) -> Self {
        Self { runner, runtime }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;
        for diagnostic in self.runner.diagnostics() {
            println!("warning: {diagnostic}");
        }
        println!("{}", listing(self.runner.commands()));

        loop {
            match rl.readline("> ") {
                Ok(input) => {
                    rl.add_history_entry(input.as_str())?;
                    match Line::parse(&input).and_then(|line| self.execute(line)) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => println!("error: {e:#}"),
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Returns `false` once the loop should end.
    fn execute(&self, line: Line) -> anyhow::Result<bool> {
        debug!(?line, "console line");
        match line {
            Line::Empty => {}
            Line::List => println!("{}", listing(self.runner.commands())),
            Line::Show(path) => {
                let node = self
                    .runner
                    .find(&path)
                    .with_context(|| format!("no command at `{path}`"))?;
                println!("{}", describe(node));
            }
            Line::Run { path, words } => {
                let state = self.launch(&path, &words)?;
                println!("[{state}]");
            }
            Line::Help => println!("{HELP}"),
            Line::Exit => return Ok(false),
        }
        Ok(true)
    }

    fn launch(&self, path: &str, words: &[String]) -> anyhow::Result<ExecutionState> {
        let command = self.runner.command(path)?;
        let values = coerce_values(command, assignments(command, words)?)?;
        let invocation = self.runner.invocation(path, &values)?;
        println!("$ {}", shell_words::join(invocation.argv()));

        self.runtime.block_on(async {
            let handle = self.runner.start(&invocation, ConsoleSink).await;
            if let Some(e) = handle.start_error() {
                bail!("{e}");
            }
            let state = tokio::select! {
                state = handle.wait() => state,
                _ = tokio::signal::ctrl_c() => {
                    println!("stopping...");
                    handle.stop().await
                }
            };
            Ok::<_, anyhow::Error>(state)
        })
    }
}

/// One line per command, indented by depth.
pub fn listing(commands: &[CommandNode]) -> String {
    let mut out = String::new();
    for node in commands.iter().flat_map(|c| c.walk()) {
        let depth = node.path.len().saturating_sub(1);
        let _ = write!(out, "{:indent$}{}", "", node.name, indent = depth * 2);
        if node.is_group() {
            out.push('/');
        }
        if let Some(help) = &node.help {
            let _ = write!(out, "  {help}");
        }
        out.push('\n');
    }
    out.pop();
    out
}

/// Usage line followed by one line per parameter.
pub fn describe(node: &CommandNode) -> String {
    let mut usage = node.path.clone();
    if node.root {
        usage.clear();
    }
    if node.is_group() {
        usage.push("<command>".into());
    }
    usage.extend(node.parameters.iter().map(usage_token));

    let mut out = format!("usage: {}", usage.join(" "));
    if let Some(help) = &node.help {
        let _ = write!(out, "\n\n{help}");
    }
    if !node.parameters.is_empty() {
        out.push('\n');
    }
    for p in &node.parameters {
        let _ = write!(out, "\n  {:<16}{}", p.name, p.value_type);
        if !p.choices.is_empty() {
            let _ = write!(out, " [{}]", p.choices.join("|"));
        }
        if p.required {
            out.push_str(", required");
        }
        if let Some(default) = &p.default {
            let _ = write!(out, ", default {default}");
        }
        if let Some(help) = &p.help {
            let _ = write!(out, "  {help}");
        }
    }
    out
}

fn usage_token(p: &ParameterInfo) -> String {
    let token = match p.kind {
        ParamKind::Positional => format!("<{}>", p.name),
        ParamKind::Option if p.is_flag() => p.flag_name(),
        ParamKind::Option => format!("{} <{}>", p.flag_name(), p.value_type),
    };
    if p.required { token } else { format!("[{token}]") }
}
