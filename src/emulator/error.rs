use thiserror::Error;

/// Failure raised while parsing or running a fragment in the emulator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LuaError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl LuaError {
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        LuaError::Runtime(message.into())
    }

    pub fn syntax<S: Into<String>>(message: S) -> Self {
        LuaError::Syntax(message.into())
    }
}
