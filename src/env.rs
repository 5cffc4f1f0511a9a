//! Lexical scopes.
//!
//! An [`Environment`] is a shared handle to one scope. Cloning the handle does not copy
//! the bindings: closures keep the handle of the scope they were created in and see any
//! later `define` made through another handle to the same scope. Each scope points to its
//! parent; the parent link is set once at creation and never changed, so plain reference
//! counting is enough to keep the chain alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::Value;
use crate::builtinops::{Arity, BuiltinFn, BuiltinOp};

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// Shared handle to a scope and, through it, to its chain of parents
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// Create an empty root scope (no builtins, see `create_global_env`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scope whose lookups fall back to `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    /// Bind `name` in this scope only, overwriting any existing binding here.
    /// Bindings of the same name in parent scopes are shadowed, not changed.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Look `name` up in this scope, then in each parent
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let next = {
                let scope = current.0.borrow();
                if let Some(value) = scope.bindings.get(name) {
                    return Some(value.clone());
                }
                scope.parent.clone()
            };
            current = next?;
        }
    }

    /// Like [`Environment::get`], failing with `UndefinedVariable`
    pub fn lookup(&self, name: &str) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UndefinedVariable(name.to_owned()))
    }

    /// Whether `name` is bound in this scope itself, ignoring parents
    pub fn contains_local(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Whether both handles refer to the same scope
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register a custom builtin function in this scope.
    ///
    /// The arity is checked before `func` runs, so the function can match on its
    /// argument slice directly.
    ///
    /// # Example
    /// ```
    /// use tinylisp::Error;
    /// use tinylisp::ast::Value;
    /// use tinylisp::builtinops::Arity;
    /// use tinylisp::evaluator::create_global_env;
    ///
    /// fn negate(args: &[Value]) -> Result<Value, Error> {
    ///     match args {
    ///         [Value::Number(n)] => Ok(Value::Number(-n)),
    ///         _ => Err(Error::TypeError("negate requires a number".into())),
    ///     }
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin("negate", Arity::Exact(1), negate);
    /// // Now (negate 3) can be called from evaluated expressions
    /// ```
    pub fn register_builtin(&self, name: &'static str, arity: Arity, func: BuiltinFn) {
        self.define(name, Value::Builtin(BuiltinOp { name, arity, func }));
    }

    /// Names bound in this scope itself, sorted
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.borrow().bindings.keys().cloned().collect();
        names.sort();
        names
    }
}

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are left out: a closure bound here refers back to this scope
        f.debug_struct("Environment")
            .field("names", &self.local_names())
            .field("has_parent", &self.0.borrow().parent.is_some())
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    #[test]
    fn test_lookup_walks_parents() {
        let root = Environment::new();
        root.define("x", val(1));
        let child = Environment::with_parent(&root);
        let grandchild = Environment::with_parent(&child);

        assert_eq!(grandchild.lookup("x").unwrap(), val(1));
        assert_eq!(
            grandchild.lookup("missing"),
            Err(Error::UndefinedVariable("missing".into()))
        );
    }

    #[test]
    fn test_define_shadows_parent() {
        let root = Environment::new();
        root.define("x", val(1));
        let child = Environment::with_parent(&root);
        child.define("x", val(2));

        assert_eq!(child.lookup("x").unwrap(), val(2));
        assert_eq!(root.lookup("x").unwrap(), val(1));
        assert!(child.contains_local("x"));
        assert!(!Environment::with_parent(&root).contains_local("x"));
    }

    #[test]
    fn test_redefine_overwrites() {
        let env = Environment::new();
        env.define("x", val(1));
        env.define("x", sym("two"));
        assert_eq!(env.lookup("x").unwrap(), sym("two"));
        assert_eq!(env.local_names(), vec!["x".to_owned()]);
    }

    #[test]
    fn test_handles_share_scope() {
        let root = Environment::new();
        let alias = root.clone();
        let child = Environment::with_parent(&root);

        // A definition made after the child was created is still visible through it
        alias.define("late", val(7));
        assert_eq!(child.lookup("late").unwrap(), val(7));

        assert!(alias.ptr_eq(&root));
        assert_eq!(child.parent(), Some(root.clone()));
        assert_ne!(child, root);
    }

    #[test]
    fn test_independent_roots_do_not_leak() {
        let a = Environment::new();
        let b = Environment::new();
        a.define("x", val(1));
        assert!(b.get("x").is_none());
    }

    #[test]
    fn test_register_builtin() {
        fn first(args: &[Value]) -> Result<Value, Error> {
            Ok(args[0].clone())
        }

        let env = Environment::new();
        env.register_builtin("first", Arity::Exact(1), first);
        let Value::Builtin(op) = env.lookup("first").unwrap() else {
            panic!("expected a builtin");
        };
        assert_eq!(op.call(&[val(3)]).unwrap(), val(3));
        assert!(matches!(
            op.call(&[]),
            Err(Error::ArityError { got: 0, .. })
        ));
    }
}
