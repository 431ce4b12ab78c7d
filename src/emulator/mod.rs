//! An in-process stand-in for the remote Lua interpreter.
//!
//! [`LuaEmulator`] understands the subset of Lua that the bridge emits, plus
//! a few standard library functions, and answers fragments the way
//! `hs -c` does: expression values are printed, tab separated, and globals
//! survive from one fragment to the next.

pub mod ast;
mod error;
mod interpreter;
mod operations;
mod parser;
mod stdlib;
#[cfg(test)]
mod unit_tests;
pub mod value;

use std::cell::RefCell;

use log::trace;

use crate::bridge::CommandExecutor;
use crate::error::{BridgeError, Result};

pub use error::LuaError;
pub use interpreter::Interpreter;
pub use parser::{parse_chunk, parse_expression_list};
pub use value::LuaValue;

pub struct LuaEmulator {
    interpreter: RefCell<Interpreter>,
    history: RefCell<Vec<String>>,
}

impl LuaEmulator {
    pub fn new() -> Self {
        LuaEmulator {
            interpreter: RefCell::new(Interpreter::new()),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Runs one fragment and returns what the remote CLI would print.
    ///
    /// The fragment is first read as an expression list. If that fails it is
    /// run as a chunk, in which case only `print` output and `return`ed
    /// values are shown.
    pub fn evaluate(&self, fragment: &str) -> std::result::Result<String, LuaError> {
        self.history.borrow_mut().push(fragment.to_string());
        trace!("emulating {:?}", fragment);
        let mut interpreter = self.interpreter.borrow_mut();
        let values = match parse_expression_list(fragment) {
            Ok(exprs) => interpreter.run_expressions(&exprs),
            Err(_) => {
                let block = parse_chunk(fragment)?;
                interpreter.run_chunk(&block)
            }
        };
        let mut lines = interpreter.take_output();
        let values = values?;
        if !values.is_empty() {
            lines.push(
                values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
        Ok(lines.join("\n"))
    }

    /// Every fragment received so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    pub fn clear_history(&self) {
        self.history.borrow_mut().clear();
    }

    pub fn get_global(&self, name: &str) -> LuaValue {
        self.interpreter.borrow().get_global(name)
    }

    pub fn set_global(&self, name: &str, value: LuaValue) {
        self.interpreter.borrow().set_global(name, value);
    }
}

impl Default for LuaEmulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for LuaEmulator {
    fn run(&self, fragment: &str) -> Result<String> {
        self.evaluate(fragment)
            .map_err(|e| BridgeError::RemoteExecution {
                fragment: fragment.to_string(),
                message: e.to_string(),
            })
    }
}
