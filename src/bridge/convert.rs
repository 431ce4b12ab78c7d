//! Parsing of the text the remote interpreter prints back.

use pest::Parser;
use pest_derive::Parser;

use crate::error::{BridgeError, Result};

#[derive(Parser)]
#[grammar = "bridge/remote_text.pest"]
struct RemoteTextParser;

fn matched(rule: Rule, text: &str, expected: &'static str) -> Result<String> {
    let trimmed = text.trim();
    let conversion_error = || BridgeError::Conversion {
        text: text.to_string(),
        expected,
    };
    let mut pairs = RemoteTextParser::parse(rule, trimmed).map_err(|_| conversion_error())?;
    let value = pairs
        .next()
        .and_then(|entry| entry.into_inner().next())
        .ok_or_else(conversion_error)?;
    Ok(value.as_str().to_string())
}

pub fn parse_integer(text: &str) -> Result<i64> {
    let digits = matched(Rule::integer_text, text, "integer")?;
    digits.parse().map_err(|_| BridgeError::Conversion {
        text: text.to_string(),
        expected: "integer",
    })
}

/// Accepts Lua's integer and float renderings, including `inf` and `nan`.
pub fn parse_float(text: &str) -> Result<f64> {
    let number = matched(Rule::number_text, text, "float")?;
    let value = match number.trim_start_matches('-') {
        "inf" => f64::INFINITY,
        "nan" => f64::NAN,
        _ => {
            return number.parse().map_err(|_| BridgeError::Conversion {
                text: text.to_string(),
                expected: "float",
            })
        }
    };
    Ok(if number.starts_with('-') { -value } else { value })
}

pub fn parse_boolean(text: &str) -> Result<bool> {
    Ok(matched(Rule::boolean_text, text, "boolean")? == "true")
}
