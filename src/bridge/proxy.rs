use std::fmt;
use std::fmt::{Display, Formatter};

use super::handle::Handle;
use super::marshal::LocalValue;
use super::Scope;
use crate::error::Result;

/// Thin wrapper over a [`Handle`] whose operations return proxies again, so
/// that remote expressions can be chained:
///
/// ```no_run
/// # use lua_bridge::{args, Bridge, BridgeConfig};
/// # fn main() -> lua_bridge::Result<()> {
/// let bridge = Bridge::from_config(&BridgeConfig::default())?;
/// bridge.scope(|scope| {
///     let app = scope.globals().path("hs.application.frontmostApplication")?;
///     let name = app.call(args![])?.get("name")?.call_method(args![])?;
///     println!("{}", name.repr()?);
///     Ok(())
/// })
/// # }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct Proxy<'s> {
    handle: Handle<'s>,
}

impl<'s> Proxy<'s> {
    pub fn new(handle: Handle<'s>) -> Self {
        Proxy { handle }
    }

    pub fn handle(&self) -> &Handle<'s> {
        &self.handle
    }

    pub fn into_handle(self) -> Handle<'s> {
        self.handle
    }

    pub fn get(&self, name: &str) -> Result<Proxy<'s>> {
        self.handle.get_property(name).map(Proxy::new)
    }

    /// Follows a dotted path such as `"window.frame"`, one property at a time.
    pub fn path(&self, path: &str) -> Result<Proxy<'s>> {
        let mut parts = path.split('.');
        let first = parts.next().unwrap_or_default();
        let mut current = self.get(first)?;
        for name in parts {
            current = current.get(name)?;
        }
        Ok(current)
    }

    pub fn index<K: Into<LocalValue>>(&self, key: K) -> Result<Proxy<'s>> {
        self.handle.index_get(key).map(Proxy::new)
    }

    pub fn set<K: Into<LocalValue>, V: Into<LocalValue>>(&self, key: K, value: V) -> Result<()> {
        self.handle.index_set(key, value)
    }

    pub fn call(&self, args: Vec<LocalValue>) -> Result<Proxy<'s>> {
        self.handle.call(args).map(Proxy::new)
    }

    pub fn call_method(&self, args: Vec<LocalValue>) -> Result<Proxy<'s>> {
        self.handle.call_method(args).map(Proxy::new)
    }

    pub fn invoke(&self, name: &str, args: Vec<LocalValue>) -> Result<Proxy<'s>> {
        self.handle.invoke(name, args).map(Proxy::new)
    }

    pub fn len(&self) -> Result<i64> {
        self.handle.length()
    }

    pub fn repr(&self) -> Result<String> {
        self.handle.read_representation()
    }

    pub fn release(self) {
        self.handle.release()
    }
}

impl<'s> From<Handle<'s>> for Proxy<'s> {
    fn from(handle: Handle<'s>) -> Self {
        Proxy::new(handle)
    }
}

impl<'s> AsRef<Handle<'s>> for Proxy<'s> {
    fn as_ref(&self) -> &Handle<'s> {
        &self.handle
    }
}

impl Display for Proxy<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.handle.describe(f, " [proxy]")
    }
}

/// Resolves bare global names of the remote environment.
#[derive(Clone, Copy)]
pub struct Globals<'s> {
    scope: &'s Scope<'s>,
}

impl<'s> Globals<'s> {
    pub(crate) fn new(scope: &'s Scope<'s>) -> Self {
        Globals { scope }
    }

    /// The global `name`, as a proxy.
    pub fn get(&self, name: &str) -> Result<Proxy<'s>> {
        super::lua_syntax::check_identifier(name)?;
        self.scope.execute(name).map(Proxy::new)
    }

    /// Resolves `"hs.application"` as `get("hs")` followed by `.get("application")`.
    pub fn path(&self, path: &str) -> Result<Proxy<'s>> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next().unwrap_or_default())?;
        for name in parts {
            current = current.get(name)?;
        }
        Ok(current)
    }
}
