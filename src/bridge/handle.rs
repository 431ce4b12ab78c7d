use std::fmt;
use std::fmt::{Display, Formatter};

use super::convert;
use super::lua_syntax;
use super::marshal::LocalValue;
use super::Scope;
use crate::error::{BridgeError, Result};

pub type HandleId = u64;

/// A slot of one particular bridge's store.
///
/// This is what a handle leaves behind when it is turned into a
/// [`LocalValue`]; the owning bridge is checked again when it is marshaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemoteRef {
    bridge: u64,
    id: HandleId,
}

impl RemoteRef {
    pub(crate) fn new(bridge: u64, id: HandleId) -> Self {
        RemoteRef { bridge, id }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub(crate) fn bridge(&self) -> u64 {
        self.bridge
    }
}

/// A value living in the remote store.
///
/// A handle names one slot of the store and is valid until it is released,
/// either explicitly through [`Handle::release`] or when its [`Scope`] is
/// closed. Handles are not `Clone`; pass `&handle` wherever a
/// [`LocalValue`] is expected to reuse the remote value by reference.
pub struct Handle<'s> {
    id: HandleId,
    scope: &'s Scope<'s>,
    receiver: Option<HandleId>,
}

impl<'s> Handle<'s> {
    pub(crate) fn new(id: HandleId, scope: &'s Scope<'s>, receiver: Option<HandleId>) -> Self {
        Handle {
            id,
            scope,
            receiver,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The slot together with the bridge that owns it.
    pub fn remote_ref(&self) -> RemoteRef {
        RemoteRef::new(self.scope.bridge().instance(), self.id)
    }

    /// Id of the handle this one was read from with [`Handle::get_property`].
    pub fn receiver(&self) -> Option<HandleId> {
        self.receiver
    }

    pub fn scope(&self) -> &'s Scope<'s> {
        self.scope
    }

    /// `<store>[<id>]`, the Lua expression naming this value.
    pub fn accessor(&self) -> String {
        self.scope.bridge().accessor(self.id)
    }

    fn live_accessor(&self) -> Result<String> {
        self.scope.bridge().ensure_live(self.id)?;
        Ok(self.accessor())
    }

    /// `self.name`, remembering `self` as the receiver for [`Handle::call_method`].
    pub fn get_property(&self, name: &str) -> Result<Handle<'s>> {
        let fragment = lua_syntax::field_access(&self.live_accessor()?, name);
        self.scope.capture(&fragment, Some(self.id))
    }

    /// Calls the remote value as a function.
    pub fn call(&self, args: Vec<LocalValue>) -> Result<Handle<'s>> {
        let accessor = self.live_accessor()?;
        self.scope.with_marshaled(&args, |args| {
            self.scope
                .execute(&format!("{}({})", accessor, args.join(", ")))
        })
    }

    /// Calls the remote value with its receiver as the first argument, which
    /// is what `receiver:name(args)` does natively.
    pub fn call_method(&self, args: Vec<LocalValue>) -> Result<Handle<'s>> {
        let receiver = self.receiver.ok_or(BridgeError::NoReceiver(self.id))?;
        let accessor = self.live_accessor()?;
        self.scope.bridge().ensure_live(receiver)?;
        let receiver = self.scope.bridge().accessor(receiver);
        self.scope.with_marshaled(&args, |args| {
            let mut all = Vec::with_capacity(args.len() + 1);
            all.push(receiver.as_str());
            all.extend(args.iter().map(String::as_str));
            self.scope
                .execute(&format!("{}({})", accessor, all.join(", ")))
        })
    }

    /// Native method call `self:name(args)` in one round trip.
    pub fn invoke(&self, name: &str, args: Vec<LocalValue>) -> Result<Handle<'s>> {
        lua_syntax::check_identifier(name)?;
        let accessor = self.live_accessor()?;
        self.scope.with_marshaled(&args, |args| {
            self.scope
                .execute(&format!("{}:{}({})", accessor, name, args.join(", ")))
        })
    }

    /// `self[key]`
    pub fn index_get<K: Into<LocalValue>>(&self, key: K) -> Result<Handle<'s>> {
        let accessor = self.live_accessor()?;
        let key: LocalValue = key.into();
        self.scope.with_marshaled(&[key], |keys| {
            self.scope.execute(&format!("{}[{}]", accessor, keys[0]))
        })
    }

    /// `self[key] = value`
    pub fn index_set<K: Into<LocalValue>, V: Into<LocalValue>>(&self, key: K, value: V) -> Result<()> {
        let accessor = self.live_accessor()?;
        let operands: [LocalValue; 2] = [key.into(), value.into()];
        self.scope
            .with_marshaled(&operands, |operands| {
                self.scope
                    .execute_raw(&format!("{}[{}] = {}", accessor, operands[0], operands[1]))
            })
            .map(|_| ())
    }

    /// `#self`
    pub fn length(&self) -> Result<i64> {
        let text = self
            .scope
            .execute_raw(&format!("#{}", self.live_accessor()?))?;
        convert::parse_integer(&text)
    }

    /// The text the remote interpreter prints for this value.
    pub fn read_representation(&self) -> Result<String> {
        self.scope.execute_raw(&self.live_accessor()?)
    }

    /// Lua type name, such as `"table"` or `"number"`.
    pub fn type_name(&self) -> Result<String> {
        self.scope
            .execute_raw(&format!("type({})", self.live_accessor()?))
    }

    pub fn to_integer(&self) -> Result<i64> {
        convert::parse_integer(&self.read_representation()?)
    }

    pub fn to_float(&self) -> Result<f64> {
        convert::parse_float(&self.read_representation()?)
    }

    pub fn to_boolean(&self) -> Result<bool> {
        convert::parse_boolean(&self.read_representation()?)
    }

    /// Content of a remote string. Other types fail with
    /// [`BridgeError::Conversion`] carrying their type name, even when they
    /// print as text.
    pub fn to_string_value(&self) -> Result<String> {
        let type_name = self.type_name()?;
        if type_name != "string" {
            return Err(BridgeError::Conversion {
                text: type_name,
                expected: "string",
            });
        }
        self.read_representation()
    }

    /// Clears the slot now instead of when the scope closes.
    pub fn release(self) {
        self.scope.release_id(self.id);
    }

    pub(crate) fn describe(&self, f: &mut Formatter<'_>, tag: &str) -> fmt::Result {
        match self.read_representation() {
            Ok(repr) => write!(f, "<Lua object {}{}: {}>", self.id, tag, repr),
            Err(_) => write!(f, "<Lua object {}{}: <unavailable>>", self.id, tag),
        }
    }
}

impl Display for Handle<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.describe(f, "")
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("receiver", &self.receiver)
            .finish()
    }
}

impl PartialEq for Handle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.remote_ref() == other.remote_ref()
    }
}

impl Eq for Handle<'_> {}
