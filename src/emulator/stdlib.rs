//! The small standard library available to emulated fragments.

use std::rc::Rc;

use super::error::LuaError;
use super::interpreter::Interpreter;
use super::operations;
use super::value::{float_to_integer, parse_number, LuaValue, NativeFn, TableRef};

/// Register the global functions and library tables.
pub fn install(globals: &TableRef) {
    let mut g = globals.borrow_mut();
    g.set_str("type", LuaValue::native("type", lua_type));
    g.set_str("tostring", LuaValue::native("tostring", lua_tostring));
    g.set_str("tonumber", LuaValue::native("tonumber", lua_tonumber));
    g.set_str("print", LuaValue::native("print", lua_print));
    g.set_str("math", math_library());
    g.set_str("string", string_library());
    g.set_str("table", table_library());
}

/// Largest string the library functions will build.
const MAX_STRING_SIZE: usize = i32::MAX as usize;

/// Width and precision in `string.format` take at most this many digits.
const MAX_FORMAT_DIGITS: usize = 2;

fn library(functions: &[(&'static str, NativeFn)]) -> LuaValue {
    let table = LuaValue::new_table();
    if let LuaValue::Table(t) = &table {
        let mut t = t.borrow_mut();
        for (name, func) in functions {
            t.set_str(name, LuaValue::native(*name, *func));
        }
    }
    table
}

fn math_library() -> LuaValue {
    let math = library(&[
        ("abs", math_abs as NativeFn),
        ("floor", math_floor as NativeFn),
        ("ceil", math_ceil as NativeFn),
        ("max", math_max as NativeFn),
        ("min", math_min as NativeFn),
        ("sqrt", math_sqrt as NativeFn),
    ]);
    if let LuaValue::Table(t) = &math {
        let mut t = t.borrow_mut();
        t.set_str("huge", LuaValue::Float(f64::INFINITY));
        t.set_str("pi", LuaValue::Float(std::f64::consts::PI));
        t.set_str("maxinteger", LuaValue::Integer(i64::MAX));
        t.set_str("mininteger", LuaValue::Integer(i64::MIN));
    }
    math
}

fn string_library() -> LuaValue {
    library(&[
        ("upper", string_upper as NativeFn),
        ("lower", string_lower as NativeFn),
        ("len", string_len as NativeFn),
        ("rep", string_rep as NativeFn),
        ("sub", string_sub as NativeFn),
        ("reverse", string_reverse as NativeFn),
        ("format", string_format as NativeFn),
    ])
}

fn table_library() -> LuaValue {
    library(&[("insert", table_insert as NativeFn), ("concat", table_concat as NativeFn)])
}

// Argument helpers

fn arg(args: &[LuaValue], i: usize) -> LuaValue {
    args.get(i).cloned().unwrap_or(LuaValue::Nil)
}

fn bad_argument(i: usize, function: &str, expected: &str, got: &LuaValue) -> LuaError {
    LuaError::Runtime(format!(
        "bad argument #{} to '{}' ({} expected, got {})",
        i + 1,
        function,
        expected,
        got.type_name()
    ))
}

fn check_number(args: &[LuaValue], i: usize, function: &str) -> Result<LuaValue, LuaError> {
    let value = arg(args, i);
    value
        .to_number()
        .ok_or_else(|| bad_argument(i, function, "number", &value))
}

fn check_integer(args: &[LuaValue], i: usize, function: &str) -> Result<i64, LuaError> {
    let value = arg(args, i);
    value
        .to_integer()
        .ok_or_else(|| bad_argument(i, function, "number", &value))
}

fn opt_integer(args: &[LuaValue], i: usize, function: &str, default: i64) -> Result<i64, LuaError> {
    match arg(args, i) {
        LuaValue::Nil => Ok(default),
        _ => check_integer(args, i, function),
    }
}

fn check_string(args: &[LuaValue], i: usize, function: &str) -> Result<Rc<str>, LuaError> {
    let value = arg(args, i);
    value
        .to_lua_string()
        .ok_or_else(|| bad_argument(i, function, "string", &value))
}

fn check_table(args: &[LuaValue], i: usize, function: &str) -> Result<TableRef, LuaError> {
    match arg(args, i) {
        LuaValue::Table(t) => Ok(t),
        other => Err(bad_argument(i, function, "table", &other)),
    }
}

fn one(value: LuaValue) -> Result<Vec<LuaValue>, LuaError> {
    Ok(vec![value])
}

// Globals

fn lua_type(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    match args.first() {
        Some(value) => one(LuaValue::string(value.type_name())),
        None => Err(LuaError::runtime(
            "bad argument #1 to 'type' (value expected)",
        )),
    }
}

fn lua_tostring(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(LuaValue::string(&arg(&args, 0).to_string()))
}

fn lua_tonumber(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(match arg(&args, 0) {
        LuaValue::String(s) => parse_number(&s).unwrap_or(LuaValue::Nil),
        value @ LuaValue::Integer(_) | value @ LuaValue::Float(_) => value,
        _ => LuaValue::Nil,
    })
}

fn lua_print(interpreter: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let line = args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\t");
    interpreter.print_line(line);
    Ok(vec![])
}

// math

fn math_abs(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(match check_number(&args, 0, "abs")? {
        LuaValue::Integer(i) => LuaValue::Integer(i.wrapping_abs()),
        LuaValue::Float(f) => LuaValue::Float(f.abs()),
        other => other,
    })
}

fn float_to_lua_integer(f: f64) -> LuaValue {
    match float_to_integer(f) {
        Some(i) => LuaValue::Integer(i),
        None => LuaValue::Float(f),
    }
}

fn math_floor(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(match check_number(&args, 0, "floor")? {
        LuaValue::Float(f) => float_to_lua_integer(f.floor()),
        other => other,
    })
}

fn math_ceil(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(match check_number(&args, 0, "ceil")? {
        LuaValue::Float(f) => float_to_lua_integer(f.ceil()),
        other => other,
    })
}

fn math_extreme(args: &[LuaValue], function: &str, pick_right: fn(std::cmp::Ordering) -> bool) -> Result<Vec<LuaValue>, LuaError> {
    let mut best = check_number(args, 0, function)?;
    for i in 1..args.len() {
        let candidate = check_number(args, i, function)?;
        if let Some(ordering) = operations::order(&candidate, &best)? {
            if pick_right(ordering) {
                best = candidate;
            }
        }
    }
    one(best)
}

fn math_max(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    math_extreme(&args, "max", |o| o == std::cmp::Ordering::Greater)
}

fn math_min(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    math_extreme(&args, "min", |o| o == std::cmp::Ordering::Less)
}

fn math_sqrt(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let value = check_number(&args, 0, "sqrt")?;
    one(LuaValue::Float(value.to_f64().unwrap_or(f64::NAN).sqrt()))
}

// string

fn string_upper(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(LuaValue::string(&check_string(&args, 0, "upper")?.to_uppercase()))
}

fn string_lower(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(LuaValue::string(&check_string(&args, 0, "lower")?.to_lowercase()))
}

fn string_len(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    one(LuaValue::Integer(check_string(&args, 0, "len")?.len() as i64))
}

fn string_rep(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let s = check_string(&args, 0, "rep")?;
    let n = check_integer(&args, 1, "rep")?;
    let sep = match arg(&args, 2) {
        LuaValue::Nil => Rc::from(""),
        _ => check_string(&args, 2, "rep")?,
    };
    if n <= 0 {
        return one(LuaValue::string(""));
    }
    let count = n as usize;
    let total = s
        .len()
        .checked_mul(count)
        .and_then(|body| sep.len().checked_mul(count - 1)?.checked_add(body))
        .filter(|total| *total <= MAX_STRING_SIZE)
        .ok_or_else(|| LuaError::runtime("resulting string too large"))?;
    let mut out = String::with_capacity(total);
    for i in 0..count {
        if i > 0 {
            out.push_str(&sep);
        }
        out.push_str(&s);
    }
    one(LuaValue::string(&out))
}

fn string_sub(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let s = check_string(&args, 0, "sub")?;
    let len = s.len() as i64;
    let i = opt_integer(&args, 1, "sub", 1)?;
    let j = opt_integer(&args, 2, "sub", -1)?;
    let start = if i < 0 { (len + i + 1).max(1) } else { i.max(1) };
    let end = if j < 0 { len + j + 1 } else { j.min(len) };
    if start > end {
        return one(LuaValue::string(""));
    }
    let bytes = &s.as_bytes()[(start - 1) as usize..end as usize];
    one(LuaValue::string(&String::from_utf8_lossy(bytes)))
}

fn string_reverse(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let s = check_string(&args, 0, "reverse")?;
    one(LuaValue::string(&s.chars().rev().collect::<String>()))
}

fn string_format(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let format = check_string(&args, 0, "format")?;
    let mut out = String::new();
    let mut next = 1;
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let mut left_align = false;
        if chars.peek() == Some(&'-') {
            left_align = true;
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            width.push(d);
            chars.next();
        }
        if width.len() > MAX_FORMAT_DIGITS {
            return Err(LuaError::runtime("invalid conversion (width too long) to 'format'"));
        }
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(&d) = chars.peek() {
                if !d.is_ascii_digit() {
                    break;
                }
                digits.push(d);
                chars.next();
            }
            if digits.len() > MAX_FORMAT_DIGITS {
                return Err(LuaError::runtime(
                    "invalid conversion (precision too long) to 'format'",
                ));
            }
            precision = Some(digits.parse().unwrap_or(0));
        }
        let conversion = chars
            .next()
            .ok_or_else(|| LuaError::runtime("invalid conversion '%' to 'format'"))?;
        let text = match conversion {
            'd' | 'i' => check_integer(&args, next, "format")?.to_string(),
            'x' => format!("{:x}", check_integer(&args, next, "format")?),
            'X' => format!("{:X}", check_integer(&args, next, "format")?),
            'f' => {
                let n = check_number(&args, next, "format")?.to_f64().unwrap_or(f64::NAN);
                format!("{:.*}", precision.unwrap_or(6), n)
            }
            's' => {
                let s = arg(&args, next).to_string();
                match precision {
                    Some(p) => s.chars().take(p).collect(),
                    None => s,
                }
            }
            other => {
                return Err(LuaError::Runtime(format!(
                    "invalid conversion '%{}' to 'format'",
                    other
                )))
            }
        };
        next += 1;
        let width: usize = width.parse().unwrap_or(0);
        let padding = width.saturating_sub(text.chars().count());
        if left_align {
            out.push_str(&text);
            out.push_str(&" ".repeat(padding));
        } else {
            out.push_str(&" ".repeat(padding));
            out.push_str(&text);
        }
    }
    one(LuaValue::string(&out))
}

// table

fn table_insert(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let table = check_table(&args, 0, "insert")?;
    let mut t = table.borrow_mut();
    let end = t.length() + 1;
    match args.len() {
        2 => t.set_index(end, arg(&args, 1)),
        3 => {
            let pos = check_integer(&args, 1, "insert")?;
            if pos < 1 || pos > end {
                return Err(LuaError::runtime(
                    "bad argument #2 to 'insert' (position out of bounds)",
                ));
            }
            let mut i = end;
            while i > pos {
                let moved = t.get_index(i - 1);
                t.set_index(i, moved);
                i -= 1;
            }
            t.set_index(pos, arg(&args, 2));
        }
        _ => return Err(LuaError::runtime("wrong number of arguments to 'insert'")),
    }
    Ok(vec![])
}

fn table_concat(_: &mut Interpreter, args: Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError> {
    let table = check_table(&args, 0, "concat")?;
    let sep = match arg(&args, 1) {
        LuaValue::Nil => Rc::from(""),
        _ => check_string(&args, 1, "concat")?,
    };
    let t = table.borrow();
    let first = opt_integer(&args, 2, "concat", 1)?;
    let last = opt_integer(&args, 3, "concat", t.length())?;
    let mut parts = vec![];
    for i in first..=last {
        let item = t.get_index(i);
        match item.to_lua_string() {
            Some(s) => parts.push(s.to_string()),
            None => {
                return Err(LuaError::Runtime(format!(
                    "invalid value (at index {}) in table for 'concat'",
                    i
                )))
            }
        }
    }
    one(LuaValue::string(&parts.join(&*sep)))
}
