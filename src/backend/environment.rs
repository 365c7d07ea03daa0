//! Binding environment for word lookup.
//!
//! A `Context` is a chain of scopes: the native library at the root, the
//! user context below it, and one child per interpreted function call.
//! Clones share the same scope (`Rc`), so mutation made by nested
//! evaluation is visible to every frame holding the context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::models::Value;

struct Scope {
    vars: HashMap<Rc<str>, Value>,
    parent: Option<Context>,
}

#[derive(Clone)]
pub struct Context(Rc<RefCell<Scope>>);

impl Context {
    pub fn new() -> Self {
        Context(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: None,
        })))
    }

    /// New empty scope whose lookups fall back to `self`
    pub fn child(&self) -> Self {
        Context(Rc::new(RefCell::new(Scope {
            vars: HashMap::new(),
            parent: Some(self.clone()),
        })))
    }

    /// Find the binding for `name`, walking outward through parent scopes
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self.clone();
        loop {
            let next = {
                let inner = scope.0.borrow();
                if let Some(value) = inner.vars.get(name) {
                    return Some(value.clone());
                }
                inner.parent.clone()
            };
            scope = next?;
        }
    }

    /// Bind `name` in this scope, shadowing any outer binding
    pub fn define(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(Rc::from(name), value);
    }

    /// Assign to the nearest scope that already binds `name`, or define it here
    pub fn assign(&self, name: &str, value: Value) {
        let mut scope = self.clone();
        loop {
            let next = {
                let mut inner = scope.0.borrow_mut();
                if let Some(slot) = inner.vars.get_mut(name) {
                    *slot = value;
                    return;
                }
                inner.parent.clone()
            };
            match next {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        trace!(target: "reval::environment", name, "defining on first assignment");
        self.define(name, value);
    }

    /// Whether this exact scope (not its parents) binds `name`
    pub fn binds_locally(&self, name: &str) -> bool {
        self.0.borrow().vars.contains_key(name)
    }

    /// Every name visible from this scope, inner bindings first
    pub fn names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = Vec::new();
        let mut scope = Some(self.clone());
        while let Some(current) = scope {
            let inner = current.0.borrow();
            names.extend(inner.vars.keys().filter(|k| !names.contains(k)).cloned().collect::<Vec<_>>());
            scope = inner.parent.clone();
        }
        names
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Context")
            .field("vars", &inner.vars.len())
            .field("has_parent", &inner.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let root = Context::new();
        root.define("x", Value::Integer(1));
        let child = root.child();
        assert_eq!(child.lookup("x"), Some(Value::Integer(1)));
        assert_eq!(child.lookup("y"), None);
    }

    #[test]
    fn test_define_shadows() {
        let root = Context::new();
        root.define("x", Value::Integer(1));
        let child = root.child();
        child.define("x", Value::Integer(2));
        assert_eq!(child.lookup("x"), Some(Value::Integer(2)));
        assert_eq!(root.lookup("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn test_assign_updates_nearest_binding() {
        let root = Context::new();
        root.define("x", Value::Integer(1));
        let child = root.child();
        child.assign("x", Value::Integer(5));
        assert_eq!(root.lookup("x"), Some(Value::Integer(5)));
        assert!(!child.binds_locally("x"));

        child.assign("fresh", Value::Integer(7));
        assert!(child.binds_locally("fresh"));
        assert_eq!(root.lookup("fresh"), None);
    }
}
