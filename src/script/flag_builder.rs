// src/script/flag_builder.rs

use crate::core::flags::{FlagDef, FlagKind, FlagSet};
use crate::models::FlagValue;
use mlua::{Function, UserData, UserDataMethods};

/// The object handed to a target's flag-setup function.
///
/// ```lua
/// whet.flag(target.deploy, function(flag)
///   flag:string("env", "staging", "Where to deploy", function() return "staging prod" end)
///   flag:bool("dry", false, "Only print what would happen")
///   flag:arg("host", "The host to deploy to")
/// end)
/// ```
#[derive(Debug)]
pub struct FlagBuilder {
    flag_set: FlagSet<Function>,
}

impl FlagBuilder {
    pub fn new(target: &str) -> Self {
        Self {
            flag_set: FlagSet::new(target),
        }
    }

    pub fn into_flag_set(self) -> FlagSet<Function> {
        self.flag_set
    }

    fn declare(
        &mut self,
        name: String,
        kind: FlagKind,
        default: FlagValue,
        help: Option<String>,
        completion: Option<Function>,
    ) -> mlua::Result<()> {
        log::debug!("Target '{}' declares flag -{}", self.flag_set.target(), name);
        self.flag_set
            .add_flag(FlagDef {
                name,
                kind,
                default,
                help: help.unwrap_or_default(),
                completion,
            })
            .map_err(mlua::Error::external)
    }
}

impl UserData for FlagBuilder {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method_mut(
            "string",
            |_, this, (name, default, help, comp): (String, Option<String>, Option<String>, Option<Function>)| {
                this.declare(
                    name,
                    FlagKind::Str,
                    FlagValue::Str(default.unwrap_or_default()),
                    help,
                    comp,
                )
            },
        );
        methods.add_method_mut(
            "int",
            |_, this, (name, default, help, comp): (String, Option<i64>, Option<String>, Option<Function>)| {
                this.declare(
                    name,
                    FlagKind::Int,
                    FlagValue::Int(default.unwrap_or_default()),
                    help,
                    comp,
                )
            },
        );
        methods.add_method_mut(
            "number",
            |_, this, (name, default, help, comp): (String, Option<f64>, Option<String>, Option<Function>)| {
                this.declare(
                    name,
                    FlagKind::Number,
                    FlagValue::Number(default.unwrap_or_default()),
                    help,
                    comp,
                )
            },
        );
        methods.add_method_mut(
            "bool",
            |_, this, (name, default, help): (String, Option<bool>, Option<String>)| {
                this.declare(
                    name,
                    FlagKind::Bool,
                    FlagValue::Bool(default.unwrap_or_default()),
                    help,
                    None,
                )
            },
        );
        methods.add_method_mut("arg", |_, this, (name, help): (String, Option<String>)| {
            this.flag_set.add_arg(name, help.unwrap_or_default());
            Ok(())
        });
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn build(setup: &str) -> mlua::Result<FlagSet<Function>> {
        let lua = Lua::new();
        let setup: Function = lua.load(setup).eval()?;
        let builder = lua.create_userdata(FlagBuilder::new("deploy"))?;
        setup.call::<()>(builder.clone())?;
        Ok(builder.take::<FlagBuilder>()?.into_flag_set())
    }

    #[test]
    fn test_every_kind_is_declared() {
        let set = build(
            r#"function(flag)
                flag:string("env", "staging", "Where")
                flag:int("retries", 3, "How often")
                flag:number("ratio", 0.5, "Share")
                flag:bool("dry", false, "Pretend")
                flag:arg("host", "Target host")
            end"#,
        )
        .unwrap();
        assert_eq!(set.short_usage(), "deploy [-env string] [-retries int] [-ratio number] [-dry] <host>");
        let kinds: Vec<FlagKind> = set.flags().iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![FlagKind::Str, FlagKind::Int, FlagKind::Number, FlagKind::Bool]
        );
    }

    #[test]
    fn test_completion_function_is_kept() {
        let set = build(
            r#"function(flag)
                flag:string("env", "", "Where", function() return "a b" end)
            end"#,
        )
        .unwrap();
        assert!(set.flags().first().unwrap().completion.is_some());
    }

    #[test]
    fn test_redefinition_is_a_script_error() {
        let err = build(
            r#"function(flag)
                flag:bool("dry", false, "")
                flag:bool("dry", true, "")
            end"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("flag redefined: dry"));
    }
}
