//! Proxy chaining and top-level global resolution.

extern crate lua_bridge;

use std::rc::Rc;

use lua_bridge::{args, Bridge, BridgeError, Handle, LuaEmulator, Proxy};

fn setup(prelude: &str) -> (Rc<LuaEmulator>, Bridge) {
    let emulator = Rc::new(LuaEmulator::new());
    emulator.evaluate(prelude).unwrap();
    let bridge = Bridge::new(Rc::clone(&emulator)).unwrap();
    (emulator, bridge)
}

const APP: &str = "
hs = {
  application = {
    frontmostApplication = function ()
      return {
        title = 'Terminal',
        windows = { 'main', 'settings' },
        name = function (self) return self.title end,
        rename = function (self, to) self.title = to return self end,
      }
    end,
  },
}
";

#[test]
fn test_property_chaining() {
    let (_, bridge) = setup("a = { b = { c = 'leaf' } }");
    bridge
        .scope(|scope| {
            let a = scope.globals().get("a")?;
            assert_eq!(a.get("b")?.get("c")?.repr()?, "leaf");
            assert_eq!(a.path("b.c")?.repr()?, "leaf");
            assert_eq!(scope.globals().path("a.b.c")?.repr()?, "leaf");
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_application_style_chain() {
    let (_, bridge) = setup(APP);
    bridge
        .scope(|scope| {
            let app = scope
                .globals()
                .path("hs.application.frontmostApplication")?
                .call(args![])?;
            assert_eq!(app.get("name")?.call_method(args![])?.repr()?, "Terminal");
            assert_eq!(app.invoke("name", args![])?.repr()?, "Terminal");
            assert_eq!(app.get("windows")?.len()?, 2);
            assert_eq!(app.get("windows")?.index(2)?.repr()?, "settings");

            app.get("rename")?.call_method(args!["iTerm"])?;
            assert_eq!(app.get("title")?.repr()?, "iTerm");
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_set_through_proxy() {
    let (emulator, bridge) = setup("config = {}");
    bridge
        .scope(|scope| {
            let config = scope.globals().get("config")?;
            config.set("volume", 0.5)?;
            config.set(1, vec!["x", "y"])?;
            assert_eq!(config.index("volume")?.repr()?, "0.5");
            assert_eq!(config.index(1)?.len()?, 2);
            Ok(())
        })
        .unwrap();
    assert_eq!(emulator.evaluate("config.volume").unwrap(), "0.5");
}

#[test]
fn test_proxies_pass_as_arguments() {
    let (_, bridge) = setup("function describe(t) return t.kind .. '!' end thing = { kind = 'widget' }");
    bridge
        .scope(|scope| {
            let thing = scope.globals().get("thing")?;
            let describe = scope.globals().get("describe")?;
            assert_eq!(describe.call(args![&thing])?.repr()?, "widget!");
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_proxy_wraps_a_handle() {
    let (_, bridge) = setup("");
    bridge
        .scope(|scope| {
            let handle = scope.execute("'wrapped'")?;
            let id = handle.id();
            let proxy = Proxy::from(handle);
            assert_eq!(proxy.as_ref().id(), id);
            assert_eq!(proxy.to_string(), format!("<Lua object {} [proxy]: wrapped>", id));

            let handle: Handle<'_> = proxy.into_handle();
            assert_eq!(handle.to_string(), format!("<Lua object {}: wrapped>", id));

            let proxy = Proxy::new(handle);
            proxy.release();
            assert_eq!(scope.execute_raw(&bridge.accessor(id))?, "nil");
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_globals_reject_non_names() {
    let (emulator, bridge) = setup("");
    emulator.clear_history();
    bridge
        .scope(|scope| {
            assert!(matches!(
                scope.globals().get("os.exit()"),
                Err(BridgeError::InvalidName(_))
            ));
            assert!(matches!(
                scope.globals().get("end"),
                Err(BridgeError::InvalidName(_))
            ));
            Ok(())
        })
        .unwrap();
    assert!(emulator.history().is_empty());
}

#[test]
fn test_missing_globals_are_nil() {
    let (_, bridge) = setup("");
    bridge
        .scope(|scope| {
            let missing = scope.globals().get("nothing_here")?;
            assert_eq!(missing.repr()?, "nil");
            assert!(matches!(
                missing.get("field"),
                Err(BridgeError::RemoteExecution { .. })
            ));
            Ok(())
        })
        .unwrap();
}
