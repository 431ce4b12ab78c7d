use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use super::ast::FunctionBody;
use super::error::LuaError;
use super::interpreter::{EnvRef, Interpreter};
use crate::bridge::lua_syntax::general_float_form;

pub type TableRef = Rc<RefCell<LuaTable>>;
pub type FunctionRef = Rc<LuaFunction>;

/// Signature of the standard library functions.
pub type NativeFn = fn(&mut Interpreter, Vec<LuaValue>) -> Result<Vec<LuaValue>, LuaError>;

pub enum LuaFunction {
    Closure { body: Rc<FunctionBody>, env: EnvRef },
    Native { name: &'static str, func: NativeFn },
}

#[derive(Clone)]
pub enum LuaValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Rc<str>),
    Table(TableRef),
    Function(FunctionRef),
}

impl LuaValue {
    pub fn string(s: &str) -> Self {
        LuaValue::String(Rc::from(s))
    }

    pub fn native(name: &'static str, func: NativeFn) -> Self {
        LuaValue::Function(Rc::new(LuaFunction::Native { name, func }))
    }

    pub fn new_table() -> Self {
        LuaValue::Table(Rc::new(RefCell::new(LuaTable::default())))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Integer(_) | LuaValue::Float(_) => "number",
            LuaValue::String(_) => "string",
            LuaValue::Table(_) => "table",
            LuaValue::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    /// Numeric view of the value, converting numeric strings.
    pub fn to_number(&self) -> Option<LuaValue> {
        match self {
            LuaValue::Integer(_) | LuaValue::Float(_) => Some(self.clone()),
            LuaValue::String(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self.to_number()? {
            LuaValue::Integer(i) => Some(i as f64),
            LuaValue::Float(f) => Some(f),
            _ => None,
        }
    }

    /// Integer view of the value; floats only convert when they have no fractional part.
    pub fn to_integer(&self) -> Option<i64> {
        match self.to_number()? {
            LuaValue::Integer(i) => Some(i),
            LuaValue::Float(f) => float_to_integer(f),
            _ => None,
        }
    }

    /// Strings and numbers, as accepted wherever Lua expects a string.
    pub fn to_lua_string(&self) -> Option<Rc<str>> {
        match self {
            LuaValue::String(s) => Some(Rc::clone(s)),
            LuaValue::Integer(_) | LuaValue::Float(_) => Some(Rc::from(self.to_string())),
            _ => None,
        }
    }

    pub fn raw_equals(&self, other: &LuaValue) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(i), LuaValue::Float(f)) | (LuaValue::Float(f), LuaValue::Integer(i)) => {
                float_to_integer(*f) == Some(*i)
            }
            (LuaValue::String(a), LuaValue::String(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Function(a), LuaValue::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for LuaValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "nil"),
            LuaValue::Boolean(b) => write!(f, "{}", b),
            LuaValue::Integer(i) => write!(f, "{}", i),
            LuaValue::Float(n) => write!(f, "{}", format_float(*n)),
            LuaValue::String(s) => write!(f, "{}", s),
            LuaValue::Table(t) => write!(f, "table: {:#016x}", Rc::as_ptr(t) as usize),
            LuaValue::Function(func) => match &**func {
                LuaFunction::Native { .. } => {
                    write!(f, "function: builtin: {:#016x}", Rc::as_ptr(func) as usize)
                }
                LuaFunction::Closure { .. } => {
                    write!(f, "function: {:#016x}", Rc::as_ptr(func) as usize)
                }
            },
        }
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "LuaValue::Nil"),
            LuaValue::Boolean(b) => write!(f, "LuaValue::Boolean({})", b),
            LuaValue::Integer(i) => write!(f, "LuaValue::Integer({})", i),
            LuaValue::Float(n) => write!(f, "LuaValue::Float({:?})", n),
            LuaValue::String(s) => write!(f, "LuaValue::String({:?})", s),
            LuaValue::Table(_) => write!(f, "LuaValue::Table(...)"),
            LuaValue::Function(func) => match &**func {
                LuaFunction::Native { name, .. } => write!(f, "LuaValue::Function({})", name),
                LuaFunction::Closure { .. } => write!(f, "LuaValue::Function(...)"),
            },
        }
    }
}

impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        self.raw_equals(other)
    }
}

pub fn float_to_integer(f: f64) -> Option<i64> {
    // 2^63 is the first float above i64::MAX
    if f.fract() == 0.0 && f >= -9.223_372_036_854_775_808e18 && f < 9.223_372_036_854_775_808e18 {
        Some(f as i64)
    } else {
        None
    }
}

/// Renders a float the way Lua's `%.14g` does, keeping a `.0` on integral values.
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    // round to 14 significant digits first; the layout depends on the rounded exponent
    general_float_form(&format!("{:.13e}", n))
}

/// Parses Lua numeric syntax, as used by literals and string coercion.
pub fn parse_number(text: &str) -> Option<LuaValue> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() {
        return None;
    }
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return None;
        }
        let mut n: i64 = 0;
        for c in hex.chars() {
            n = n.wrapping_mul(16).wrapping_add(c.to_digit(16)? as i64);
        }
        LuaValue::Integer(n)
    } else if digits.chars().all(|c| c.is_ascii_digit()) {
        match digits.parse::<i64>() {
            Ok(n) => LuaValue::Integer(n),
            Err(_) => LuaValue::Float(digits.parse::<f64>().ok()?),
        }
    } else {
        let numeric = digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
        if !numeric || !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return None;
        }
        LuaValue::Float(digits.parse::<f64>().ok()?)
    };
    Some(match (negative, value) {
        (true, LuaValue::Integer(i)) => LuaValue::Integer(i.wrapping_neg()),
        (true, LuaValue::Float(f)) => LuaValue::Float(-f),
        (_, value) => value,
    })
}

/// Normalized table key. Integral floats collapse onto integer keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Boolean(bool),
    Integer(i64),
    Float(u64),
    String(Rc<str>),
    Reference(usize),
}

impl TableKey {
    pub fn from_value(value: &LuaValue) -> Result<Option<TableKey>, LuaError> {
        Ok(Some(match value {
            LuaValue::Nil => return Ok(None),
            LuaValue::Boolean(b) => TableKey::Boolean(*b),
            LuaValue::Integer(i) => TableKey::Integer(*i),
            LuaValue::Float(f) if f.is_nan() => {
                return Err(LuaError::runtime("table index is NaN"))
            }
            LuaValue::Float(f) => match float_to_integer(*f) {
                Some(i) => TableKey::Integer(i),
                None => TableKey::Float(f.to_bits()),
            },
            LuaValue::String(s) => TableKey::String(Rc::clone(s)),
            LuaValue::Table(t) => TableKey::Reference(Rc::as_ptr(t) as usize),
            LuaValue::Function(f) => TableKey::Reference(Rc::as_ptr(f) as usize),
        }))
    }
}

/// A Lua table. Keys keep their original value alive so reference keys stay unique.
#[derive(Default)]
pub struct LuaTable {
    entries: HashMap<TableKey, (LuaValue, LuaValue)>,
}

impl LuaTable {
    pub fn get(&self, key: &LuaValue) -> LuaValue {
        match TableKey::from_value(key) {
            Ok(Some(k)) => self.get_key(&k),
            _ => LuaValue::Nil,
        }
    }

    pub fn get_str(&self, key: &str) -> LuaValue {
        self.get_key(&TableKey::String(Rc::from(key)))
    }

    pub fn get_index(&self, index: i64) -> LuaValue {
        self.get_key(&TableKey::Integer(index))
    }

    fn get_key(&self, key: &TableKey) -> LuaValue {
        self.entries
            .get(key)
            .map(|(_, v)| v.clone())
            .unwrap_or(LuaValue::Nil)
    }

    pub fn set(&mut self, key: LuaValue, value: LuaValue) -> Result<(), LuaError> {
        let normalized = match TableKey::from_value(&key)? {
            Some(k) => k,
            None => return Err(LuaError::runtime("table index is nil")),
        };
        if let LuaValue::Nil = value {
            self.entries.remove(&normalized);
        } else {
            self.entries.insert(normalized, (key, value));
        }
        Ok(())
    }

    pub fn set_str(&mut self, key: &str, value: LuaValue) {
        let key = LuaValue::string(key);
        // string keys are never nil or NaN
        let _ = self.set(key, value);
    }

    pub fn set_index(&mut self, index: i64, value: LuaValue) {
        let _ = self.set(LuaValue::Integer(index), value);
    }

    /// A border of the table: `t[n] ~= nil and t[n + 1] == nil`.
    pub fn length(&self) -> i64 {
        let mut n = 0;
        while self.entries.contains_key(&TableKey::Integer(n + 1)) {
            n += 1;
        }
        n
    }
}
