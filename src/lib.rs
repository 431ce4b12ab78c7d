//! # lua-bridge - drive a remote Lua interpreter from Rust
//!
//! Manipulate live objects inside a separate, long-running Lua interpreter
//! (such as Hammerspoon, through its `hs -c` CLI) as if they were local:
//! - every remote value is kept in a remote store table and represented
//!   locally by a [`Handle`]
//! - property access, indexing and calls on handles are turned into Lua
//!   fragments, run remotely, and their results captured as new handles
//! - values only come back as text when asked for
//!
//! ## Quick Start
//!
//! ### Evaluating a fragment
//!
//! ```
//! use std::rc::Rc;
//! use lua_bridge::{Bridge, LuaEmulator};
//!
//! let bridge = Bridge::new(Rc::new(LuaEmulator::new())).unwrap();
//! let two = bridge
//!     .scope(|scope| scope.execute("1 + 1")?.read_representation())
//!     .unwrap();
//! assert_eq!(two, "2");
//! ```
//!
//! ### Chaining through proxies
//!
//! ```
//! use std::rc::Rc;
//! use lua_bridge::{args, Bridge, LuaEmulator};
//!
//! let emulator = Rc::new(LuaEmulator::new());
//! emulator
//!     .evaluate("point = { x = 3, scale = function (self, k) return self.x * k end }")
//!     .unwrap();
//!
//! let bridge = Bridge::new(Rc::clone(&emulator)).unwrap();
//! bridge
//!     .scope(|scope| {
//!         let point = scope.globals().get("point")?;
//!         assert_eq!(point.get("x")?.repr()?, "3");
//!         assert_eq!(point.get("scale")?.call_method(args![2])?.repr()?, "6");
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(bridge.live_handles(), 0);
//! ```
//!
//! ### Talking to Hammerspoon
//!
//! ```no_run
//! use lua_bridge::{Bridge, BridgeConfig};
//!
//! let config = BridgeConfig::load("lua-bridge.toml").unwrap_or_default();
//! let bridge = Bridge::from_config(&config).unwrap();
//! bridge
//!     .scope(|scope| {
//!         let hs = scope.globals().get("hs")?;
//!         println!("{}", hs.get("processInfo")?);
//!         Ok(())
//!     })
//!     .unwrap();
//! ```
//!
//! ## Handle lifetime
//!
//! Handles belong to a [`Scope`]. [`Bridge::scope`] closes the scope when
//! its closure returns, clearing every slot the scope allocated, newest
//! first. [`Handle::release`] clears one slot earlier. Handles borrow their
//! scope, so none of them can outlive it.
//!
//! ## Architecture
//!
//! - **[`bridge`]** - the bridge, scopes, handles, proxies and marshaling
//!   - **[`bridge::lua_syntax`]** - Lua literal and accessor forms
//! - **[`emulator`]** - an in-process Lua subset interpreter implementing
//!   [`CommandExecutor`], used for tests and offline experiments
//! - **[`error`]** - [`BridgeError`] and the crate [`Result`]

#[macro_use]
extern crate lazy_static;

pub mod bridge;
pub mod emulator;
pub mod error;

pub use bridge::{
    Bridge, BridgeConfig, CommandExecutor, ExecutorConfig, Globals, Handle, HandleId, LocalValue,
    ProcessExecutor, Proxy, RemoteRef, Scope,
};
pub use emulator::LuaEmulator;
pub use error::{BridgeError, Result};
