//! Locating the runtime program before a launch, the way a shell would.

use crate::env::Environment;
use std::path::{Path, PathBuf};

/// Resolve `program` to an existing file.
///
/// - absolute path: used as is if it exists;
/// - several components (`bin/python`, `./run`): resolved against the
///   environment's working directory;
/// - a bare name: every directory of the environment's `PATH` is searched.
pub fn find_program(env: &Environment, program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(_), None) if !path.is_absolute() && !program.starts_with("./") => {
            let search_paths = env.get_var("PATH")?;
            std::env::split_paths(search_paths)
                .map(|dir| env.resolve(&dir).join(path))
                .find(|candidate| is_program(candidate))
        }
        _ => Some(env.resolve(path)).filter(|candidate| is_program(candidate)),
    }
}

#[cfg(unix)]
fn is_program(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_program(path: &Path) -> bool {
    path.is_file()
}
