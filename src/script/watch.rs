// src/script/watch.rs

//! `whet.plugin.watch{...}` and the delivery of watcher events to Lua.

use super::ScriptState;
use crate::core::discovery::expand_path;
use crate::system::watcher::{WatchEvent, WatchSpec};
use anyhow::Context;
use mlua::{Function, Table, Value};

const DEFAULT_DIR: &str = ".";

/// Parses the options table and starts a watcher.
///
/// ```lua
/// whet.plugin.watch{dir = "src", recursive = true, filter = "\\.rs$",
///                   exclude = {"target"}, callback = function(path, kind) end}
/// ```
pub(crate) fn start(state: &ScriptState, opts: Table) -> mlua::Result<usize> {
    let callback: Function = match opts.get::<Value>("callback")? {
        Value::Function(f) => f,
        _ => {
            return Err(mlua::Error::runtime(
                "whet.plugin.watch: 'callback' must be a function",
            ));
        }
    };
    let dir: Option<String> = opts.get("dir")?;
    let dir = expand_path(dir.as_deref().unwrap_or(DEFAULT_DIR)).map_err(mlua::Error::external)?;

    let mut spec = WatchSpec::new(dir);
    spec.recursive = opts.get::<Option<bool>>("recursive")?.unwrap_or(false);
    if let Some(pattern) = opts.get::<Option<String>>("filter")? {
        spec = spec.with_filter(&pattern).map_err(mlua::Error::external)?;
    }
    if let Some(exclude) = opts.get::<Option<Table>>("exclude")? {
        spec.exclude = exclude
            .sequence_values::<String>()
            .collect::<mlua::Result<Vec<_>>>()?;
    }

    let mut hub = state.hub.try_borrow_mut().map_err(|_| {
        mlua::Error::runtime("whet.plugin.watch: watchers can not be started from a watch callback")
    })?;
    let id = hub.watch(spec).map_err(mlua::Error::external)?;
    state.callbacks.borrow_mut().push(callback);
    Ok(id)
}

/// Blocks on the main thread, running callbacks for every event until the
/// cancellation token is set. Returns at once when nothing is watched.
pub(crate) fn run_callbacks(state: &ScriptState) -> anyhow::Result<()> {
    if !state.hub.borrow().is_armed() {
        return Ok(());
    }
    log::debug!("Waiting for watcher events");
    let mut hub = state.hub.borrow_mut();
    hub.run_until_cancelled(|event| deliver(state, event))
}

fn deliver(state: &ScriptState, event: WatchEvent) -> anyhow::Result<()> {
    let callback = state
        .callbacks
        .borrow()
        .get(event.watcher)
        .cloned()
        .with_context(|| format!("No callback for watcher {}", event.watcher))?;
    let path = event.path.to_string_lossy().to_string();
    let result = callback
        .call::<Value>((path.as_str(), WatchEvent::KIND))
        .with_context(|| format!("Watch callback failed for '{}'", path))?;
    if matches!(result, Value::Boolean(false)) {
        log::warn!("Watch callback aborted for '{}'", path);
    }
    Ok(())
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use crate::script::LuaRuntime;
    use crate::state::AppContext;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn load_with_dir(source: &str, dir: &std::path::Path) -> mlua::Result<LuaRuntime> {
        let runtime = LuaRuntime::load("", "test", &AppContext::default())
            .map(|(runtime, _)| runtime)
            .map_err(mlua::Error::external)?;
        runtime
            .lua()
            .globals()
            .set("dir", dir.to_string_lossy().to_string())?;
        runtime.lua().load(source).exec()?;
        Ok(runtime)
    }

    #[test]
    fn test_watch_arms_the_runtime() {
        let dir = tempdir().unwrap();
        let runtime = load_with_dir(
            r#"whet.plugin.watch{dir = dir, callback = function() end}"#,
            dir.path(),
        )
        .unwrap();
        assert!(runtime.has_watchers());
    }

    #[test]
    fn test_setup_failures_are_script_errors() {
        let dir = tempdir().unwrap();
        let missing_callback = load_with_dir(r#"whet.plugin.watch{dir = dir}"#, dir.path());
        assert!(missing_callback.is_err());

        let bad_filter = load_with_dir(
            r#"whet.plugin.watch{dir = dir, filter = "(", callback = print}"#,
            dir.path(),
        );
        assert!(bad_filter.is_err());

        let missing_dir = load_with_dir(
            r#"whet.plugin.watch{dir = dir .. "/nope", callback = print}"#,
            dir.path(),
        );
        assert!(missing_dir.is_err());
    }

    #[test]
    fn test_callbacks_run_until_cancelled() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::default();
        let (runtime, _) = LuaRuntime::load("", "test", &ctx).unwrap();
        let lua = runtime.lua();
        lua.globals()
            .set("dir", dir.path().to_string_lossy().to_string())
            .unwrap();
        lua.load(
            r#"
            seen = {}
            whet.plugin.watch{dir = dir, callback = function(path, kind)
              seen[#seen + 1] = kind
              return false
            end}
            "#,
        )
        .exec()
        .unwrap();

        std::fs::write(dir.path().join("new.txt"), "x").unwrap();
        let token = ctx.token.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(1500));
            token.store(true, Ordering::SeqCst);
        });
        runtime.wait_for_watchers().unwrap();
        stopper.join().unwrap();

        let kinds: mlua::Table = lua.globals().get("seen").unwrap();
        assert_eq!(kinds.get::<String>(1).unwrap(), "write");
    }
}
