// src/script/strings.rs

//! Extra functions on Lua's `string` table, so they also work as methods:
//! `("a,b"):split(",")`, `line:c(2)`, `out:trim()`.

use mlua::{Function, Lua, Table};
use std::cell::Cell;

const DEFAULT_CUTSET: &str = "\n ";

pub(crate) fn install(lua: &Lua) -> mlua::Result<()> {
    let string: Table = lua.globals().get("string")?;

    string.set(
        "split",
        lua.create_function(|lua, (s, sep, f): (String, String, Option<Function>)| {
            let parts = split(&s, &sep);
            if let Some(f) = f {
                for (index, part) in parts.iter().enumerate() {
                    f.call::<()>((part.as_str(), index + 1))?;
                }
            }
            let next = Cell::new(0_usize);
            lua.create_function(move |_, ()| {
                let index = next.get();
                next.set(index + 1);
                Ok(match parts.get(index) {
                    Some(part) => (Some(part.clone()), Some(index + 1)),
                    None => (None, None),
                })
            })
        })?,
    )?;

    string.set(
        "c",
        lua.create_function(|_, (s, index): (String, i64)| {
            field(&s, index).ok_or_else(|| {
                mlua::Error::runtime(format!("string.c: field index must be positive, got {}", index))
            })
        })?,
    )?;

    string.set(
        "trim",
        lua.create_function(|_, (s, cutset): (String, Option<String>)| {
            Ok(trim(&s, cutset.as_deref().unwrap_or(DEFAULT_CUTSET)).to_string())
        })?,
    )?;

    log::trace!("String helpers installed");
    Ok(())
}

/// An empty separator splits into single characters.
fn split(s: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return s.chars().map(String::from).collect();
    }
    s.split(sep).map(str::to_string).collect()
}

/// The `index`-th (1-based) whitespace-separated field, `""` when out of
/// range. `None` for a non-positive index.
fn field(s: &str, index: i64) -> Option<String> {
    let position = usize::try_from(index).ok()?.checked_sub(1)?;
    Some(
        s.split_whitespace()
            .nth(position)
            .unwrap_or_default()
            .to_string(),
    )
}

fn trim<'a>(s: &'a str, cutset: &str) -> &'a str {
    s.trim_matches(|c| cutset.contains(c))
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_strings(lua: &Lua, source: &str) -> mlua::Result<Vec<String>> {
        let table: Table = lua.load(source).eval()?;
        table.sequence_values::<String>().collect()
    }

    fn lua() -> Lua {
        let lua = Lua::new();
        install(&lua).unwrap();
        lua
    }

    #[test]
    fn test_split_iterates_with_one_based_index() {
        let lua = lua();
        let out = eval_strings(
            &lua,
            r#"
            local out = {}
            for part, i in ("a,b,,c"):split(",") do
              out[#out + 1] = i .. "=" .. part
            end
            return out
            "#,
        )
        .unwrap();
        assert_eq!(out, vec!["1=a", "2=b", "3=", "4=c"]);
    }

    #[test]
    fn test_split_calls_function_for_every_part_first() {
        let lua = lua();
        let out = eval_strings(
            &lua,
            r#"
            local out = {}
            local iter = string.split("x y", " ", function(part, i) out[#out + 1] = part .. i end)
            out[#out + 1] = "after"
            return out
            "#,
        )
        .unwrap();
        assert_eq!(out, vec!["x1", "y2", "after"]);
    }

    #[test]
    fn test_field_and_trim() {
        assert_eq!(field("  one two\tthree ", 2), Some("two".to_string()));
        assert_eq!(field("one", 5), Some(String::new()));
        assert_eq!(field("one", 0), None);
        assert_eq!(trim("\n  padded \n", DEFAULT_CUTSET), "padded");
        assert_eq!(trim("--x--", "-"), "x");

        let lua = lua();
        assert!(lua.load(r#"return ("a b"):c(0)"#).exec().is_err());
        let trimmed: String = lua.load(r#"return (" hi\n"):trim()"#).eval().unwrap();
        assert_eq!(trimmed, "hi");
    }

    #[test]
    fn test_split_with_empty_separator() {
        assert_eq!(split("abc", ""), vec!["a", "b", "c"]);
    }
}
