use std::process::Command;
use std::rc::Rc;

use log::debug;

use crate::error::{BridgeError, Result};

/// Runs Lua fragments in the remote interpreter.
pub trait CommandExecutor {
    /// Runs `fragment` and returns what the interpreter printed.
    fn run(&self, fragment: &str) -> Result<String>;

    /// Runs `fragment` when no result is wanted.
    fn run_detached(&self, fragment: &str) -> Result<()> {
        self.run(fragment).map(|_| ())
    }
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Rc<T> {
    fn run(&self, fragment: &str) -> Result<String> {
        (**self).run(fragment)
    }

    fn run_detached(&self, fragment: &str) -> Result<()> {
        (**self).run_detached(fragment)
    }
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Box<T> {
    fn run(&self, fragment: &str) -> Result<String> {
        (**self).run(fragment)
    }

    fn run_detached(&self, fragment: &str) -> Result<()> {
        (**self).run_detached(fragment)
    }
}

/// Spawns `program args... fragment` once per fragment and captures stdout.
///
/// With the default configuration this is `hs -c <fragment>`.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
}

impl ProcessExecutor {
    pub fn new<P: Into<String>>(program: P, args: Vec<String>) -> Self {
        ProcessExecutor {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl CommandExecutor for ProcessExecutor {
    fn run(&self, fragment: &str) -> Result<String> {
        debug!("spawning {} for {:?}", self.program, fragment);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(fragment)
            .output()
            .map_err(|e| BridgeError::RemoteExecution {
                fragment: fragment.to_string(),
                message: format!("could not run {}: {}", self.program, e),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match output.status.code() {
                Some(code) if stderr.trim().is_empty() => format!("exit code {}", code),
                Some(code) => format!("exit code {}: {}", code, stderr.trim()),
                None => "terminated by signal".to_string(),
            };
            return Err(BridgeError::RemoteExecution {
                fragment: fragment.to_string(),
                message,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
