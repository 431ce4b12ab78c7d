//! Local values that can be sent to the remote interpreter.

use std::collections::{BTreeMap, HashMap};

use super::handle::{Handle, RemoteRef};
use super::lua_syntax;
use super::proxy::Proxy;
use crate::error::{BridgeError, Result};

/// A local value on its way to the remote side.
///
/// `Remote` refers to a value that already lives in a bridge's store and is
/// passed by reference; only that bridge accepts it. Mappings are representable locally but have no
/// remote form yet; marshaling one fails with
/// [`BridgeError::UnsupportedType`].
#[derive(Debug, Clone, PartialEq)]
pub enum LocalValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<LocalValue>),
    Mapping(Vec<(LocalValue, LocalValue)>),
    Remote(RemoteRef),
}

impl LocalValue {
    pub fn kind(&self) -> &'static str {
        match self {
            LocalValue::Nil => "nil",
            LocalValue::Boolean(_) => "boolean",
            LocalValue::Integer(_) => "integer",
            LocalValue::Float(_) => "float",
            LocalValue::String(_) => "string",
            LocalValue::Sequence(_) => "sequence",
            LocalValue::Mapping(_) => "mapping",
            LocalValue::Remote(_) => "remote reference",
        }
    }

    /// Lua literal for scalar values. `None` for sequences, mappings and remote references.
    pub fn literal(&self) -> Option<String> {
        match self {
            LocalValue::Nil => Some("nil".to_string()),
            LocalValue::Boolean(b) => Some(lua_syntax::boolean_literal(*b).to_string()),
            LocalValue::Integer(i) => Some(lua_syntax::integer_literal(*i)),
            LocalValue::Float(f) => Some(lua_syntax::float_literal(*f)),
            LocalValue::String(s) => Some(lua_syntax::string_literal(s)),
            _ => None,
        }
    }

    /// Fails if this value, or any value nested in it, has no remote form.
    pub fn validate(&self) -> Result<()> {
        match self {
            LocalValue::Mapping(_) => Err(BridgeError::UnsupportedType(format!(
                "{} (mappings cannot be sent to the remote interpreter)",
                self.kind()
            ))),
            LocalValue::Sequence(items) => items.iter().try_for_each(LocalValue::validate),
            _ => Ok(()),
        }
    }
}

impl From<bool> for LocalValue {
    fn from(b: bool) -> Self {
        LocalValue::Boolean(b)
    }
}

macro_rules! integer_from {
    ($($t:ty),*) => {
        $(impl From<$t> for LocalValue {
            fn from(i: $t) -> Self {
                LocalValue::Integer(i as i64)
            }
        })*
    };
}

integer_from!(i8, i16, i32, i64, u8, u16, u32, isize);

impl From<f32> for LocalValue {
    fn from(f: f32) -> Self {
        LocalValue::Float(f as f64)
    }
}

impl From<f64> for LocalValue {
    fn from(f: f64) -> Self {
        LocalValue::Float(f)
    }
}

impl From<&str> for LocalValue {
    fn from(s: &str) -> Self {
        LocalValue::String(s.to_string())
    }
}

impl From<String> for LocalValue {
    fn from(s: String) -> Self {
        LocalValue::String(s)
    }
}

impl From<()> for LocalValue {
    fn from(_: ()) -> Self {
        LocalValue::Nil
    }
}

impl<T: Into<LocalValue>> From<Option<T>> for LocalValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => LocalValue::Nil,
        }
    }
}

impl<T: Into<LocalValue>> From<Vec<T>> for LocalValue {
    fn from(items: Vec<T>) -> Self {
        LocalValue::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<LocalValue>, const N: usize> From<[T; N]> for LocalValue {
    fn from(items: [T; N]) -> Self {
        LocalValue::Sequence(IntoIterator::into_iter(items).map(Into::into).collect())
    }
}

impl<K: Into<LocalValue>, V: Into<LocalValue>, S> From<HashMap<K, V, S>> for LocalValue {
    fn from(map: HashMap<K, V, S>) -> Self {
        LocalValue::Mapping(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<LocalValue>, V: Into<LocalValue>> From<BTreeMap<K, V>> for LocalValue {
    fn from(map: BTreeMap<K, V>) -> Self {
        LocalValue::Mapping(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<&Handle<'_>> for LocalValue {
    fn from(handle: &Handle<'_>) -> Self {
        LocalValue::Remote(handle.remote_ref())
    }
}

impl From<&Proxy<'_>> for LocalValue {
    fn from(proxy: &Proxy<'_>) -> Self {
        LocalValue::Remote(proxy.handle().remote_ref())
    }
}

/// Builds a `Vec<LocalValue>` from anything convertible into [`LocalValue`].
///
/// ```
/// use lua_bridge::{args, LocalValue};
///
/// let values = args![1, "two", 3.5];
/// assert_eq!(values[1], LocalValue::String("two".to_string()));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::LocalValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::LocalValue::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(LocalValue::from(7u8), LocalValue::Integer(7));
        assert_eq!(LocalValue::from(Some("x")), LocalValue::String("x".to_string()));
        assert_eq!(LocalValue::from(None::<i32>), LocalValue::Nil);
        assert_eq!(
            LocalValue::from(vec![1, 2]),
            LocalValue::Sequence(vec![LocalValue::Integer(1), LocalValue::Integer(2)])
        );
        assert_eq!(
            LocalValue::from([true]),
            LocalValue::Sequence(vec![LocalValue::Boolean(true)])
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(LocalValue::Nil.literal().unwrap(), "nil");
        assert_eq!(LocalValue::from(false).literal().unwrap(), "false");
        assert_eq!(LocalValue::from(1.5).literal().unwrap(), "1.5");
        assert_eq!(LocalValue::from("q\"").literal().unwrap(), r#""q\"""#);
        assert!(LocalValue::from(vec![1]).literal().is_none());
    }

    #[test]
    fn test_nested_mappings_are_rejected() {
        let mut map = BTreeMap::new();
        map.insert("k", 1);
        let nested = LocalValue::Sequence(vec![LocalValue::Integer(1), LocalValue::from(map)]);
        assert!(matches!(nested.validate(), Err(BridgeError::UnsupportedType(_))));
        assert!(LocalValue::from(vec![vec![1], vec![2]]).validate().is_ok());
    }

    #[test]
    fn test_args_macro() {
        let values: Vec<LocalValue> = crate::args![1, "a", None::<bool>];
        assert_eq!(
            values,
            vec![
                LocalValue::Integer(1),
                LocalValue::String("a".to_string()),
                LocalValue::Nil
            ]
        );
        assert!(crate::args![].is_empty());
    }
}
