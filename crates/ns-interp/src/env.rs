//! Lexically-nested environments.
//!
//! [`Vars`] is a chain of name→value scopes; lookups walk toward the
//! root, definitions always land in the innermost scope. A scope may be
//! *locked*: names already defined there cannot be reassigned (the
//! built-in globals are locked after installation), but lookups still
//! pass through.
//!
//! [`Frame`] is the call-frame chain; each frame owns a `Vars` scope that
//! extends its parent's.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::value::Value;

/// Outcome of an assignment through the scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The name was found and updated.
    Set,
    /// The name exists in a locked scope.
    Locked,
    /// No scope in the chain defines the name.
    Missing,
}

#[derive(Clone)]
pub struct Vars(Rc<VarsInner>);

struct VarsInner {
    parent: Option<Vars>,
    map: RefCell<FxHashMap<String, Value>>,
    locked: bool,
}

impl Vars {
    pub fn new() -> Self {
        Self(Rc::new(VarsInner {
            parent: None,
            map: RefCell::new(FxHashMap::default()),
            locked: false,
        }))
    }

    pub fn with_map(map: FxHashMap<String, Value>, locked: bool) -> Self {
        Self(Rc::new(VarsInner { parent: None, map: RefCell::new(map), locked }))
    }

    /// A fresh child scope whose lookups fall back to this one.
    pub fn extend(&self) -> Vars {
        Self(Rc::new(VarsInner {
            parent: Some(self.clone()),
            map: RefCell::new(FxHashMap::default()),
            locked: false,
        }))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.0.map.borrow().get(name) {
            return Some(value.clone());
        }
        self.0.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Assign to an existing name somewhere up the chain.
    pub fn set(&self, name: &str, value: Value) -> SetOutcome {
        if self.0.map.borrow().contains_key(name) {
            if self.0.locked {
                return SetOutcome::Locked;
            }
            self.0.map.borrow_mut().insert(name.to_string(), value);
            return SetOutcome::Set;
        }
        match &self.0.parent {
            Some(parent) => parent.set(name, value),
            None => SetOutcome::Missing,
        }
    }

    /// Define (or shadow) a name in this scope.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.map.borrow_mut().insert(name.into(), value);
    }
}

impl Default for Vars {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct Frame(Rc<FrameInner>);

struct FrameInner {
    vars: Vars,
    parent: Option<Frame>,
}

impl Frame {
    pub fn root(vars: Vars) -> Self {
        Self(Rc::new(FrameInner { vars, parent: None }))
    }

    pub fn vars(&self) -> &Vars {
        &self.0.vars
    }

    /// The frame this one was entered from, if any.
    pub fn parent(&self) -> Option<&Frame> {
        self.0.parent.as_ref()
    }

    /// A child frame whose scope extends this frame's scope.
    pub fn child(&self) -> Frame {
        Self(Rc::new(FrameInner {
            vars: self.0.vars.extend(),
            parent: Some(self.clone()),
        }))
    }

    /// A child frame with bindings pre-installed.
    pub fn child_with(&self, bindings: Vec<(String, Value)>) -> Frame {
        let frame = self.child();
        for (name, value) in bindings {
            frame.vars().define(name, value);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_the_chain() {
        let root = Vars::new();
        root.define("a", Value::number(1.0));
        let child = root.extend();
        child.define("b", Value::number(2.0));
        assert_eq!(child.get("a").unwrap().as_number(), Some(1.0));
        assert_eq!(child.get("b").unwrap().as_number(), Some(2.0));
        assert!(root.get("b").is_none());
    }

    #[test]
    fn shadowing_does_not_touch_the_parent() {
        let root = Vars::new();
        root.define("x", Value::number(1.0));
        let child = root.extend();
        child.define("x", Value::number(2.0));
        assert_eq!(child.get("x").unwrap().as_number(), Some(2.0));
        assert_eq!(root.get("x").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn set_updates_the_defining_scope() {
        let root = Vars::new();
        root.define("x", Value::number(1.0));
        let child = root.extend();
        assert_eq!(child.set("x", Value::number(9.0)), SetOutcome::Set);
        assert_eq!(root.get("x").unwrap().as_number(), Some(9.0));
        assert_eq!(child.set("nope", Value::null()), SetOutcome::Missing);
    }

    #[test]
    fn frames_chain_to_their_parent() {
        let root = Frame::root(Vars::new());
        root.vars().define("x", Value::number(1.0));
        let child = root.child_with(vec![("y".to_string(), Value::number(2.0))]);
        assert!(child.parent().is_some());
        assert!(root.parent().is_none());
        assert_eq!(child.vars().get("x").unwrap().as_number(), Some(1.0));
        assert_eq!(child.vars().get("y").unwrap().as_number(), Some(2.0));
    }

    #[test]
    fn locked_scope_rejects_writes_but_allows_reads() {
        let mut map = FxHashMap::default();
        map.insert("builtin".to_string(), Value::number(7.0));
        let globals = Vars::with_map(map, true);
        let child = globals.extend();
        assert_eq!(child.set("builtin", Value::null()), SetOutcome::Locked);
        assert_eq!(child.get("builtin").unwrap().as_number(), Some(7.0));
        // Shadowing in the child is still fine.
        child.define("builtin", Value::number(1.0));
        assert_eq!(child.get("builtin").unwrap().as_number(), Some(1.0));
    }
}
