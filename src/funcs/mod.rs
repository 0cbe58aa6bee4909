//! Function namespace available to templates
//!
//! Every synthesis builds a fresh [`FuncMap`] by layering, lowest precedence
//! first: the builtin library, the provider overrides (`tolower`,
//! `normalize`, `split`) and the caller's own functions.

mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::strings;
use crate::template::value::to_text;

pub use builtin::builtin_functions;

/// Error reported by a template function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FunctionError {
    pub message: String,
}

impl FunctionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A callable template function. The piped value, if any, is the last
/// argument.
pub type TemplateFn = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// Mapping from function name to callable
pub type FuncMap = HashMap<String, TemplateFn>;

/// Wrap a closure as a [`TemplateFn`]
pub fn func<F>(f: F) -> TemplateFn
where
    F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Check that exactly `n` arguments were passed to `name`
pub fn expect_args(name: &str, args: &[Value], n: usize) -> Result<(), FunctionError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(FunctionError::new(format!(
            "wrong number of args for {}: want {} got {}",
            name,
            n,
            args.len()
        )))
    }
}

/// Functions installed on top of the builtin library
pub fn override_functions() -> FuncMap {
    let mut funcs = FuncMap::new();

    // Kept alongside `lower` for templates written against older providers
    funcs.insert(
        "tolower".to_string(),
        func(|args| {
            expect_args("tolower", args, 1)?;
            Ok(Value::String(to_text(&args[0]).to_lowercase()))
        }),
    );
    funcs.insert(
        "normalize".to_string(),
        func(|args| {
            expect_args("normalize", args, 1)?;
            Ok(Value::String(strings::normalize(&to_text(&args[0]))))
        }),
    );
    funcs.insert(
        "split".to_string(),
        func(|args| {
            expect_args("split", args, 2)?;
            let parts = strings::split(&to_text(&args[0]), &to_text(&args[1]));
            Ok(Value::Array(parts.into_iter().map(Value::String).collect()))
        }),
    );

    funcs
}

/// Build the namespace for one synthesis. Caller functions win over
/// everything else on a name collision.
pub fn build_function_namespace(caller: &FuncMap) -> FuncMap {
    let mut funcs = builtin_functions();
    funcs.extend(override_functions());
    funcs.extend(
        caller
            .iter()
            .map(|(name, f)| (name.clone(), Arc::clone(f))),
    );
    funcs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn call(funcs: &FuncMap, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let f = funcs.get(name).expect("function should exist");
        (**f)(args)
    }

    #[test]
    fn test_namespace_contains_overrides_and_builtins() {
        let funcs = build_function_namespace(&FuncMap::new());
        for name in ["tolower", "normalize", "split", "lower", "upper", "printf", "eq"] {
            assert!(funcs.contains_key(name), "missing {}", name);
        }
    }

    #[test]
    fn test_overrides() {
        let funcs = build_function_namespace(&FuncMap::new());
        assert_eq!(call(&funcs, "tolower", &[json!("ABC")]), Ok(json!("abc")));
        assert_eq!(call(&funcs, "normalize", &[json!("a.b c")]), Ok(json!("a-b-c")));
        assert_eq!(
            call(&funcs, "split", &[json!(","), json!("a,b")]),
            Ok(json!(["a", "b"]))
        );
        assert_eq!(call(&funcs, "split", &[json!(","), json!("")]), Ok(json!([""])));
    }

    #[test]
    fn test_override_arity_errors() {
        let funcs = build_function_namespace(&FuncMap::new());
        let err = call(&funcs, "split", &[json!(",")]).unwrap_err();
        assert_eq!(err.message, "wrong number of args for split: want 2 got 1");
    }

    #[test]
    fn test_caller_functions_take_precedence() {
        let mut caller = FuncMap::new();
        caller.insert(
            "normalize".to_string(),
            func(|_| Ok(Value::String("custom".to_string()))),
        );
        caller.insert(
            "extra".to_string(),
            func(|_| Ok(Value::Bool(true))),
        );

        let funcs = build_function_namespace(&caller);
        assert_eq!(call(&funcs, "normalize", &[json!("a.b")]), Ok(json!("custom")));
        assert_eq!(call(&funcs, "extra", &[]), Ok(json!(true)));
        // Nothing else is dropped by the merge
        assert!(funcs.contains_key("split"));
        assert!(funcs.contains_key("lower"));
    }

    #[test]
    fn test_namespace_is_fresh_per_call() {
        let mut caller = FuncMap::new();
        caller.insert("only_here".to_string(), func(|_| Ok(Value::Null)));
        let with_caller = build_function_namespace(&caller);
        let without = build_function_namespace(&FuncMap::new());
        assert!(with_caller.contains_key("only_here"));
        assert!(!without.contains_key("only_here"));
    }
}
