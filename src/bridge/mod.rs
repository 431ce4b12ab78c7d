//! The bridge to a long-running remote Lua interpreter.
//!
//! Every remote value the bridge knows about lives in one global Lua table,
//! the *store*, under an integer id. A fragment is evaluated remotely with
//!
//! ```lua
//! <store>[<id>] = (function () return <fragment> end)()
//! ```
//!
//! and the caller gets back a [`Handle`] naming that slot. Operations on
//! handles build new fragments from the slot accessors, so intermediate
//! values never travel back as text unless
//! [`Handle::read_representation`] is asked for.
//!
//! Handles are owned by a [`Scope`]. Closing the scope clears every slot it
//! allocated, newest first.

mod config;
mod convert;
mod executor;
mod handle;
pub mod lua_syntax;
mod marshal;
mod proxy;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace, warn};

use crate::error::{BridgeError, Result};

pub use config::{BridgeConfig, ExecutorConfig, DEFAULT_STORE_NAME, HAMMERSPOON_CLI_PATH};
pub use convert::{parse_boolean, parse_float, parse_integer};
pub use executor::{CommandExecutor, ProcessExecutor};
pub use handle::{Handle, HandleId, RemoteRef};
pub use marshal::LocalValue;
pub use proxy::{Globals, Proxy};

static NEXT_BRIDGE: AtomicU64 = AtomicU64::new(1);

pub struct Bridge {
    instance: u64,
    executor: Box<dyn CommandExecutor>,
    store_name: String,
    next_id: AtomicU64,
    live: RefCell<BTreeSet<HandleId>>,
}

impl Bridge {
    /// Creates a bridge with the default configuration and initializes the store.
    pub fn new<E: CommandExecutor + 'static>(executor: E) -> Result<Bridge> {
        Self::with_config(executor, &BridgeConfig::default())
    }

    pub fn with_config<E: CommandExecutor + 'static>(
        executor: E,
        config: &BridgeConfig,
    ) -> Result<Bridge> {
        config.validate()?;
        let bridge = Bridge {
            instance: NEXT_BRIDGE.fetch_add(1, Ordering::Relaxed),
            executor: Box::new(executor),
            store_name: config.resolved_store_name(),
            next_id: AtomicU64::new(1),
            live: RefCell::new(BTreeSet::new()),
        };
        bridge.initialize()?;
        Ok(bridge)
    }

    /// Creates a bridge that spawns the configured program for every fragment.
    pub fn from_config(config: &BridgeConfig) -> Result<Bridge> {
        let executor = ProcessExecutor::new(
            config.executor.program.clone(),
            config.executor.args.clone(),
        );
        Self::with_config(executor, config)
    }

    /// (Re)creates the remote store as an empty table.
    ///
    /// Fails with [`BridgeError::StoreInUse`] while any handle is live, since
    /// their slots would be wiped.
    pub fn initialize(&self) -> Result<()> {
        let live = self.live_handles();
        if live > 0 {
            return Err(BridgeError::StoreInUse { live });
        }
        let command = format!("{} = {{}}", self.store_name);
        debug!("{}", command);
        self.executor.run_detached(&command)
    }

    /// Runs `fragment` as is and returns the printed result without trailing whitespace.
    pub fn execute_raw(&self, fragment: &str) -> Result<String> {
        debug!("{}", fragment);
        let output = self.executor.run(fragment)?;
        Ok(output.trim_end().to_string())
    }

    /// Evaluates `fragment` into a fresh store slot and returns its id.
    pub(crate) fn capture(&self, fragment: &str) -> Result<HandleId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let command = format!(
            "{} = (function () return {} end)()",
            self.accessor(id),
            fragment
        );
        debug!("{}", command);
        self.executor.run_detached(&command)?;
        self.live.borrow_mut().insert(id);
        trace!("allocated slot {}", id);
        Ok(id)
    }

    /// Clears a slot. Failures are logged and otherwise ignored.
    pub(crate) fn release_slot(&self, id: HandleId) {
        if !self.live.borrow_mut().remove(&id) {
            return;
        }
        let command = format!("{} = nil", self.accessor(id));
        debug!("{}", command);
        match self.executor.run_detached(&command) {
            Ok(()) => trace!("released slot {}", id),
            Err(e) => warn!("could not release slot {}: {}", id, e),
        }
    }

    pub(crate) fn ensure_live(&self, id: HandleId) -> Result<()> {
        if self.live.borrow().contains(&id) {
            Ok(())
        } else {
            Err(BridgeError::StaleHandle(id))
        }
    }

    /// Accessor of a referenced slot, which must be live and belong to this bridge.
    pub(crate) fn resolve(&self, remote: RemoteRef) -> Result<String> {
        if remote.bridge() != self.instance {
            return Err(BridgeError::ForeignHandle(remote.id()));
        }
        self.ensure_live(remote.id())?;
        Ok(self.accessor(remote.id()))
    }

    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    /// `<store>[<id>]`
    pub fn accessor(&self, id: HandleId) -> String {
        format!("{}[{}]", self.store_name, id)
    }

    /// Number of handles currently live across all scopes.
    pub fn live_handles(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Opens a scope that has to be [closed](Scope::close) explicitly.
    pub fn open_scope(&self) -> Scope<'_> {
        Scope {
            bridge: self,
            owned: RefCell::new(Vec::new()),
        }
    }

    /// Runs `f` with a fresh scope and closes the scope afterwards, whether
    /// `f` succeeded or not.
    pub fn scope<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Scope<'_>) -> Result<R>,
    {
        let scope = self.open_scope();
        let result = f(&scope);
        scope.close();
        result
    }
}

/// Owner of the handles allocated through it.
pub struct Scope<'b> {
    bridge: &'b Bridge,
    owned: RefCell<Vec<HandleId>>,
}

impl<'b> Scope<'b> {
    pub fn bridge(&self) -> &'b Bridge {
        self.bridge
    }

    /// Evaluates `fragment` remotely and returns a handle to the result.
    pub fn execute(&self, fragment: &str) -> Result<Handle<'_>> {
        self.capture(fragment, None)
    }

    pub(crate) fn capture(&self, fragment: &str, receiver: Option<HandleId>) -> Result<Handle<'_>> {
        let id = self.bridge.capture(fragment)?;
        self.owned.borrow_mut().push(id);
        Ok(Handle::new(id, self, receiver))
    }

    pub fn execute_raw(&self, fragment: &str) -> Result<String> {
        self.bridge.execute_raw(fragment)
    }

    /// Sends a local value to the remote side.
    ///
    /// A [`LocalValue::Remote`] gets a new slot holding the same remote value.
    pub fn value<V: Into<LocalValue>>(&self, value: V) -> Result<Handle<'_>> {
        let value = value.into();
        value.validate()?;
        self.check_references(&value)?;
        if let Some(literal) = value.literal() {
            return self.execute(&literal);
        }
        match value {
            LocalValue::Remote(remote) => self.execute(&self.bridge.resolve(remote)?),
            LocalValue::Sequence(items) => self.with_marshaled(&items, |elements| {
                self.execute(&table_constructor(elements))
            }),
            other => Err(BridgeError::UnsupportedType(other.kind().to_string())),
        }
    }

    /// Top-level access to remote globals.
    pub fn globals(&self) -> Globals<'_> {
        Globals::new(self)
    }

    /// Marshals `values`, runs `f` with their accessors, then releases every
    /// temporary slot that marshaling allocated.
    ///
    /// All values are checked before any remote command is issued.
    pub(crate) fn with_marshaled<R, F>(&self, values: &[LocalValue], f: F) -> Result<R>
    where
        F: FnOnce(&[String]) -> Result<R>,
    {
        for value in values {
            value.validate()?;
            self.check_references(value)?;
        }
        let mut temporaries = Vec::new();
        let mut accessors = Vec::with_capacity(values.len());
        let mut result = Ok(());
        for value in values {
            match self.marshal(value, &mut temporaries) {
                Ok(accessor) => accessors.push(accessor),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        let result = result.and_then(|_| f(&accessors));
        for id in temporaries.into_iter().rev() {
            self.release_id(id);
        }
        result
    }

    /// Fails if a referenced slot is stale or belongs to another bridge.
    fn check_references(&self, value: &LocalValue) -> Result<()> {
        match value {
            LocalValue::Remote(remote) => self.bridge.resolve(*remote).map(drop),
            LocalValue::Sequence(items) => items.iter().try_for_each(|item| self.check_references(item)),
            _ => Ok(()),
        }
    }

    fn marshal(&self, value: &LocalValue, temporaries: &mut Vec<HandleId>) -> Result<String> {
        if let Some(literal) = value.literal() {
            return self.marshal_fragment(&literal, temporaries);
        }
        match value {
            LocalValue::Remote(remote) => self.bridge.resolve(*remote),
            LocalValue::Sequence(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(self.marshal(item, temporaries)?);
                }
                self.marshal_fragment(&table_constructor(&elements), temporaries)
            }
            other => Err(BridgeError::UnsupportedType(other.kind().to_string())),
        }
    }

    fn marshal_fragment(&self, fragment: &str, temporaries: &mut Vec<HandleId>) -> Result<String> {
        let id = self.bridge.capture(fragment)?;
        self.owned.borrow_mut().push(id);
        temporaries.push(id);
        Ok(self.bridge.accessor(id))
    }

    pub(crate) fn release_id(&self, id: HandleId) {
        self.owned.borrow_mut().retain(|owned| *owned != id);
        self.bridge.release_slot(id);
    }

    /// Number of handles this scope still owns.
    pub fn owned(&self) -> usize {
        self.owned.borrow().len()
    }

    /// Releases every handle of the scope, newest first.
    pub fn close(self) {
        let owned = std::mem::take(&mut *self.owned.borrow_mut());
        trace!("closing scope with {} handle(s)", owned.len());
        for id in owned.into_iter().rev() {
            self.bridge.release_slot(id);
        }
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        let owned = self.owned.get_mut();
        if !owned.is_empty() {
            warn!(
                "scope dropped without close(); {} remote slot(s) stay allocated",
                owned.len()
            );
        }
    }
}

fn table_constructor(elements: &[String]) -> String {
    if elements.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", elements.join(", "))
    }
}
