//! Lua source forms for the literals and accessors the bridge emits.

use std::collections::HashSet;

use crate::error::{BridgeError, Result};

lazy_static! {
    static ref LUA_KEYWORDS: HashSet<&'static str> = [
        "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
        "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    ]
    .iter()
    .copied()
    .collect();
}

/// True when `name` can be written as a bare Lua name (`t.name`, `name = ...`).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !LUA_KEYWORDS.contains(name)
}

pub fn check_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(BridgeError::InvalidName(name.to_string()))
    }
}

pub fn integer_literal(value: i64) -> String {
    if value == i64::MIN {
        // the literal 9223372036854775808 would overflow into a float
        "math.mininteger".to_string()
    } else {
        value.to_string()
    }
}

pub fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "(0/0)".to_string()
    } else if value == f64::INFINITY {
        "math.huge".to_string()
    } else if value == f64::NEG_INFINITY {
        "-math.huge".to_string()
    } else {
        // `{:e}` gives the shortest digits that read back to the same value
        general_float_form(&format!("{:e}", value))
    }
}

/// Lays out Rust `{:e}` output the way Lua prints floats (C `%.14g`):
/// positional for decimal exponents in `-4..14`, `d.ddde±XX` otherwise.
/// Integral positional results keep a `.0` so they still read as floats.
pub(crate) fn general_float_form(scientific: &str) -> String {
    let (mantissa, exponent) = scientific.split_at(scientific.find('e').unwrap_or(scientific.len()));
    let exponent: i32 = exponent.trim_start_matches('e').parse().unwrap_or(0);
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.trim_end_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    if exponent < -4 || exponent >= 14 {
        let (lead, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{}", rest)
        };
        format!(
            "{}{}{}e{}{:02}",
            sign,
            lead,
            fraction,
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        )
    } else if exponent < 0 {
        format!("{}0.{}{}", sign, "0".repeat((-exponent - 1) as usize), digits)
    } else {
        let whole = exponent as usize + 1;
        if digits.len() > whole {
            format!("{}{}.{}", sign, &digits[..whole], &digits[whole..])
        } else {
            format!("{}{}{}.0", sign, digits, "0".repeat(whole - digits.len()))
        }
    }
}

pub fn boolean_literal(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Double quoted Lua string literal.
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\{:03}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `<accessor>.<name>`, or `<accessor>["<name>"]` when `name` is not a plain identifier.
pub fn field_access(accessor: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{}.{}", accessor, name)
    } else {
        format!("{}[{}]", accessor, string_literal(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("frontmostApplication"));
        assert!(is_identifier("_private1"));
        assert!(!is_identifier("1st"));
        assert!(!is_identifier("has space"));
        assert!(!is_identifier("end"));
        assert!(!is_identifier(""));
        assert!(check_identifier("function").is_err());
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(integer_literal(-17), "-17");
        assert_eq!(integer_literal(i64::MIN), "math.mininteger");
        assert_eq!(float_literal(2.0), "2.0");
        assert_eq!(float_literal(0.1), "0.1");
        assert_eq!(float_literal(1e100), "1e+100");
        assert_eq!(float_literal(-2.5e-7), "-2.5e-07");
        assert_eq!(float_literal(1e15), "1e+15");
        assert_eq!(float_literal(1.5e14), "1.5e+14");
        assert_eq!(float_literal(0.0001), "0.0001");
        assert_eq!(float_literal(-0.0), "-0.0");
        assert_eq!(float_literal(1234.5), "1234.5");
        assert_eq!(float_literal(f64::NEG_INFINITY), "-math.huge");
        assert_eq!(float_literal(f64::NAN), "(0/0)");
    }

    #[test]
    fn test_string_literal_escapes() {
        assert_eq!(string_literal("plain"), "\"plain\"");
        assert_eq!(string_literal("a\"b\\c"), r#""a\"b\\c""#);
        assert_eq!(string_literal("line\nnext\ttab"), r#""line\nnext\ttab""#);
        assert_eq!(string_literal("\u{1}9"), r#""\0019""#);
    }

    #[test]
    fn test_field_access() {
        assert_eq!(field_access("s[1]", "title"), "s[1].title");
        assert_eq!(field_access("s[1]", "not valid"), r#"s[1]["not valid"]"#);
        assert_eq!(field_access("s[1]", "end"), r#"s[1]["end"]"#);
    }
}
