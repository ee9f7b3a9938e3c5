//! Typed argument contracts for external tools.
//!
//! Every subprocess the harness launches is described by a struct that
//! implements `ToolArgs`. The struct owns the flag names and their order;
//! the argument-contract tests pin them.

use std::path::Path;

/// Trait for typed tool arguments.
///
/// # Contract
///
/// - `program()`: executable to launch, a bare name resolved on `PATH` or a
///   path taken from the environment.
/// - `to_cli_args()`: arguments exactly as the tool expects them.
/// - `get_env_vars()`: extra environment for the child (inherits the rest).
/// - `tool_name()`: short label for logs and error messages.
pub trait ToolArgs {
    fn program(&self) -> &Path;

    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn tool_name(&self) -> &'static str;

    /// Program and arguments as one loggable line.
    fn command_line(&self) -> String {
        let mut parts = vec![self.program().display().to_string()];
        parts.extend(self.to_cli_args());
        parts.join(" ")
    }
}

/// Render a path argument.
pub(crate) fn path_arg(path: &Path) -> String {
    path.display().to_string()
}
