//! Environment for variable scoping in the interpreter.
//!
//! An [`Environment`] is a shared handle to one [`Scope`]; scopes link to their
//! parent, forming the lexical scope chain. Handles are reference counted because
//! closures capture the environment they were defined in and may outlive the
//! evaluation that created it. A closure stored in the scope it captures forms a
//! cycle; [`Environment::teardown`] breaks it explicitly.

use crate::interpreter::types::{Signal, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;

/* ===================== Scope ===================== */

/// A single scope record
#[derive(Default)]
pub struct Scope {
    values: HashMap<String, Value>,
    parent: Option<Environment>,
    /// Stable references handed out for bindings of this scope
    references: HashMap<String, Rc<Reference>>,
    /// Side table for external annotations: name -> tag key -> tag value
    tags: HashMap<String, HashMap<String, Value>>,
    /// Set only on the scope a `try` statement creates for its catch clause
    exception: Option<Value>,
}

/* ===================== Environment ===================== */

/// Shared handle to a scope in the chain
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// Empty root scope
    pub fn new() -> Self {
        Environment::default()
    }

    /// Root scope promoted from a raw name -> value mapping
    pub fn root<K: Into<String>>(values: impl IntoIterator<Item = (K, Value)>) -> Self {
        let env = Environment::new();
        env.merge_values(values);
        env
    }

    /// New empty scope whose parent is `self`
    pub fn child(&self) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            parent: Some(self.clone()),
            ..Scope::default()
        })))
    }

    /// Child scope pre-populated with `values`
    pub fn child_with<K: Into<String>>(&self, values: impl IntoIterator<Item = (K, Value)>) -> Self {
        let env = self.child();
        env.merge_values(values);
        env
    }

    /// Child scope carrying a caught exception in its internal slot
    pub fn with_exception(&self, exception: Value) -> Self {
        let env = self.child();
        env.0.borrow_mut().exception = Some(exception);
        env
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Re-links this scope under `parent`
    pub fn set_parent(&self, parent: Option<Environment>) {
        self.0.borrow_mut().parent = parent;
    }

    /* ----- bindings ----- */

    /// Nearest enclosing binding of `name`
    pub fn lookup(&self, name: &str) -> Result<Value, Signal> {
        self.get(name)
            .ok_or_else(|| Signal::ReferenceError(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let next = {
                let scope = env.0.borrow();
                if let Some(value) = scope.values.get(name) {
                    return Some(value.clone());
                }
                scope.parent.clone()
            };
            current = next;
        }
        None
    }

    /// Creates (or overwrites) a binding in this scope, shadowing outer ones
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().values.insert(name.into(), value);
    }

    /// Updates the nearest existing binding; never creates one
    pub fn assign(&self, name: &str, value: Value) -> Result<(), Signal> {
        let scope = self
            .resolve(name)
            .ok_or_else(|| Signal::ReferenceError(name.to_string()))?;
        scope.0.borrow_mut().values.insert(name.to_string(), value);
        Ok(())
    }

    /// Scope in the chain that binds `name`
    pub fn resolve(&self, name: &str) -> Option<Environment> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            if env.has_own(name) {
                return Some(env);
            }
            current = env.parent();
        }
        None
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().values.contains_key(name)
    }

    pub fn get_own(&self, name: &str) -> Option<Value> {
        self.0.borrow().values.get(name).cloned()
    }

    /// Bindings of this scope only (no parents), sorted by name
    pub fn own_values(&self) -> Vec<(String, Value)> {
        let mut values: Vec<(String, Value)> = self
            .0
            .borrow()
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    }

    /// Declares every entry in this scope
    pub fn merge_values<K: Into<String>>(&self, values: impl IntoIterator<Item = (K, Value)>) {
        let mut scope = self.0.borrow_mut();
        for (name, value) in values {
            scope.values.insert(name.into(), value);
        }
    }

    /// Exception held by the nearest catch scope
    pub fn exception(&self) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            let next = {
                let scope = env.0.borrow();
                if let Some(exception) = &scope.exception {
                    return Some(exception.clone());
                }
                scope.parent.clone()
            };
            current = next;
        }
        None
    }

    /* ----- references ----- */

    /// Stable reference to the slot that currently resolves `name`
    ///
    /// The same `Rc` is returned for every call against the same resolved scope,
    /// no matter how the bound value changes in between.
    pub fn reference(&self, name: &str) -> Result<Rc<Reference>, Signal> {
        let scope = self
            .resolve(name)
            .ok_or_else(|| Signal::ReferenceError(name.to_string()))?;
        let mut inner = scope.0.borrow_mut();
        let reference = inner
            .references
            .entry(name.to_string())
            .or_insert_with(|| {
                Rc::new(Reference {
                    name: name.to_string(),
                    id: Uuid::new_v4(),
                    environment: Rc::downgrade(&scope.0),
                })
            })
            .clone();
        Ok(reference)
    }

    /* ----- tags ----- */

    pub fn set_tag(&self, name: &str, key: impl Into<String>, value: Value) -> Result<(), Signal> {
        let scope = self
            .resolve(name)
            .ok_or_else(|| Signal::ReferenceError(name.to_string()))?;
        scope
            .0
            .borrow_mut()
            .tags
            .entry(name.to_string())
            .or_default()
            .insert(key.into(), value);
        Ok(())
    }

    pub fn get_tag(&self, name: &str, key: &str) -> Option<Value> {
        let scope = self.resolve(name)?;
        let inner = scope.0.borrow();
        inner.tags.get(name)?.get(key).cloned()
    }

    pub fn delete_tag(&self, name: &str, key: &str) {
        if let Some(scope) = self.resolve(name) {
            if let Some(tags) = scope.0.borrow_mut().tags.get_mut(name) {
                tags.remove(key);
            }
        }
    }

    /* ----- lifetime ----- */

    /// Clears this scope's bindings, references and tags
    ///
    /// Closures stored in a scope they also capture keep each other alive;
    /// tearing the scope down releases them. The handle stays usable but empty.
    pub fn teardown(&self) {
        let mut scope = self.0.borrow_mut();
        scope.values.clear();
        scope.references.clear();
        scope.tags.clear();
        scope.exception = None;
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of scopes from here to the root, inclusive
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = Some(self.clone());
        while let Some(env) = current {
            depth += 1;
            current = env.parent();
        }
        depth
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(scope) => {
                let mut names: Vec<&String> = scope.values.keys().collect();
                names.sort();
                f.debug_struct("Environment")
                    .field("names", &names)
                    .field("has_parent", &scope.parent.is_some())
                    .finish()
            }
            Err(_) => f.write_str("Environment(<borrowed>)"),
        }
    }
}

/* ===================== References ===================== */

/// Identity of one (scope, name) binding, independent of the bound value
pub struct Reference {
    pub name: String,
    pub id: Uuid,
    environment: Weak<RefCell<Scope>>,
}

impl Reference {
    /// Current value of the slot, `None` once the scope is gone or torn down
    pub fn value(&self) -> Option<Value> {
        let scope = self.environment.upgrade()?;
        let scope = scope.borrow();
        scope.values.get(&self.name).cloned()
    }

    /// Whether the slot currently holds a host-provided function
    pub fn is_native(&self) -> bool {
        matches!(self.value(), Some(Value::Function(f)) if f.is_native())
    }

    pub fn environment(&self) -> Option<Environment> {
        self.environment.upgrade().map(Environment)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("is_native", &self.is_native())
            .finish()
    }
}
