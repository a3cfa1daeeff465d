//! The runtime value model.
//!
//! A [`Value`] is a shared, mutable cell. Environments, object properties
//! and references all hold handles to the same cells, so replacing a
//! cell's contents in place (the `*ref = v` operation) is observed by
//! every holder. Plain assignment, by contrast, rebinds a name or
//! property to a different cell and leaves the old one untouched.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use ns_parser::{NodeId, ParseTree};

use crate::env::Vars;
use crate::error::RuntimeError;
use crate::Interp;

/// A handle to a runtime value cell.
#[derive(Clone)]
pub struct Value(Rc<RefCell<ValueCell>>);

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Value(..)")
    }
}

/// The contents of a value cell: the kind-specific payload plus the
/// instance property map.
pub struct ValueCell {
    pub kind: ValueKind,
    pub props: FxHashMap<String, Value>,
}

/// Kind-specific payload of a value.
#[derive(Clone)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Function { func: Rc<Func>, bound: Option<Value> },
    Class(Rc<ClassDef>),
    Trait(Rc<TraitDef>),
    /// An object created from a Class; its fields live in `props`.
    Instance { class: Value },
    /// A first-class alias to another value cell.
    Ref(Value),
    /// An imported program exposed as a namespace.
    Module { vars: Vars },
    /// A value with decorator hooks (e.g. the `export` built-in).
    Decorator { pre: Option<NativeHook>, post: Option<NativeHook> },
}

/// A callable: either a native function or user code captured with its
/// closure frame and owning tree.
pub enum Func {
    Native { name: &'static str, f: NativeFn },
    Code { tree: Rc<ParseTree>, node: NodeId, frame: crate::env::Frame },
}

pub type NativeFn = fn(&mut Interp, &Args) -> Result<Value, RuntimeError>;

/// A decorator hook. `value` is the decorated value for post hooks and
/// `None` for pre hooks; returning `Some` replaces the decorated value.
pub type NativeHook = fn(
    &mut Interp,
    value: Option<&Value>,
    args: &[Value],
    tree: &Rc<ParseTree>,
    node: NodeId,
) -> Result<Option<Value>, RuntimeError>;

/// Arguments handed to a native function, along with the call site used
/// for error attribution.
pub struct Args {
    pub args: Vec<Value>,
    pub bound: Option<Value>,
    pub tree: Rc<ParseTree>,
    pub node: NodeId,
}

impl Args {
    /// The bound receiver, or an error naming the method.
    pub fn receiver(&self, method: &str) -> Result<Value, RuntimeError> {
        self.bound.clone().ok_or_else(|| {
            RuntimeError::at_node(format!("Unbound call to `{method}`"), &self.tree, self.node)
        })
    }

    /// The `n`th positional argument, defaulting to null.
    pub fn arg(&self, n: usize) -> Value {
        self.args.get(n).cloned().unwrap_or_else(Value::null)
    }
}

/// A class: display name, declared field names and trait implementations.
///
/// Trait implementations are a list of `(trait value, impl class)` pairs;
/// traits compare by identity, so lookup walks the list with pointer
/// equality.
pub struct ClassDef {
    pub name: String,
    pub fields: RefCell<Vec<String>>,
    pub traits: RefCell<Vec<(Value, Value)>>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: RefCell::new(Vec::new()),
            traits: RefCell::new(Vec::new()),
        }
    }
}

/// A trait identity: a name plus the method names an impl provides.
pub struct TraitDef {
    pub name: &'static str,
    pub methods: &'static [&'static str],
}

impl Value {
    fn from_kind(kind: ValueKind) -> Self {
        Self(Rc::new(RefCell::new(ValueCell { kind, props: FxHashMap::default() })))
    }

    pub fn null() -> Self {
        Self::from_kind(ValueKind::Null)
    }

    pub fn boolean(b: bool) -> Self {
        Self::from_kind(ValueKind::Boolean(b))
    }

    pub fn number(n: f64) -> Self {
        Self::from_kind(ValueKind::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::from_kind(ValueKind::Str(s.into()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Self::from_kind(ValueKind::Array(items))
    }

    pub fn function(func: Func) -> Self {
        Self::from_kind(ValueKind::Function { func: Rc::new(func), bound: None })
    }

    pub fn native(name: &'static str, f: NativeFn) -> Self {
        Self::function(Func::Native { name, f })
    }

    /// A function value sharing `func` but carrying its own binding.
    pub fn bound_function(func: Rc<Func>, bound: Option<Value>) -> Self {
        Self::from_kind(ValueKind::Function { func, bound })
    }

    pub fn class(def: ClassDef) -> Self {
        Self::from_kind(ValueKind::Class(Rc::new(def)))
    }

    pub fn trait_def(def: TraitDef) -> Self {
        Self::from_kind(ValueKind::Trait(Rc::new(def)))
    }

    pub fn instance(class: Value) -> Self {
        Self::from_kind(ValueKind::Instance { class })
    }

    pub fn reference(target: Value) -> Self {
        Self::from_kind(ValueKind::Ref(target))
    }

    pub fn module(vars: Vars) -> Self {
        Self::from_kind(ValueKind::Module { vars })
    }

    pub fn decorator(pre: Option<NativeHook>, post: Option<NativeHook>) -> Self {
        Self::from_kind(ValueKind::Decorator { pre, post })
    }

    pub fn borrow(&self) -> Ref<'_, ValueCell> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, ValueCell> {
        self.0.borrow_mut()
    }

    /// Cell identity: two handles to the same cell.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A new cell with the same (shallow) contents. This is what the
    /// `Copy.copy` trait does for the built-in scalars.
    pub fn shallow_copy(&self) -> Value {
        let cell = self.borrow();
        Self(Rc::new(RefCell::new(ValueCell {
            kind: cell.kind.clone(),
            props: cell.props.clone(),
        })))
    }

    /// Replace this cell's contents with those of `other`, in place.
    /// Every other handle to this cell observes the change.
    pub fn replace_with(&self, other: &Value) {
        if self.ptr_eq(other) {
            return;
        }
        let (kind, props) = {
            let cell = other.borrow();
            (cell.kind.clone(), cell.props.clone())
        };
        let mut cell = self.borrow_mut();
        cell.kind = kind;
        cell.props = props;
    }

    /// Follow `Ref` cells to the final target.
    pub fn deref(&self) -> Value {
        let mut v = self.clone();
        loop {
            let next = match &v.borrow().kind {
                ValueKind::Ref(target) => target.clone(),
                _ => return v.clone(),
            };
            v = next;
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.borrow().kind, ValueKind::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match &self.borrow().kind {
            ValueKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match &self.borrow().kind {
            ValueKind::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// A property from this value's own map.
    pub fn prop(&self, name: &str) -> Option<Value> {
        self.borrow().props.get(name).cloned()
    }

    pub fn set_prop(&self, name: impl Into<String>, value: Value) {
        self.borrow_mut().props.insert(name.into(), value);
    }

    /// Human-readable type name used in operator errors.
    pub fn type_name(&self) -> String {
        match &self.borrow().kind {
            ValueKind::Null => "null".to_string(),
            ValueKind::Boolean(_) => "Boolean".to_string(),
            ValueKind::Number(_) => "Number".to_string(),
            ValueKind::Str(_) => "String".to_string(),
            ValueKind::Array(_) => "Array".to_string(),
            ValueKind::Function { .. } => "Function".to_string(),
            ValueKind::Class(def) => format!("class {}", def.name),
            ValueKind::Trait(def) => format!("trait {}", def.name),
            ValueKind::Instance { class } => match &class.borrow().kind {
                ValueKind::Class(def) => def.name.clone(),
                _ => "instance".to_string(),
            },
            ValueKind::Ref(_) => "Ref".to_string(),
            ValueKind::Module { .. } => "Module".to_string(),
            ValueKind::Decorator { .. } => "Decorator".to_string(),
        }
    }

    /// Truthiness by kind: null is false, refs follow their target,
    /// strings and numbers by emptiness/zero, everything else is true.
    pub fn truthy(&self) -> bool {
        match &self.borrow().kind {
            ValueKind::Null => false,
            ValueKind::Boolean(b) => *b,
            ValueKind::Number(n) => *n != 0.0,
            ValueKind::Str(s) => !s.is_empty(),
            ValueKind::Ref(target) => target.truthy(),
            _ => true,
        }
    }

    /// Look up the impl class a trait is implemented with, if any.
    /// The lookup goes through this value's class.
    pub fn trait_impl(&self, class: &Value, trait_value: &Value) -> Option<Value> {
        match &class.borrow().kind {
            ValueKind::Class(def) => def
                .traits
                .borrow()
                .iter()
                .find(|(t, _)| t.ptr_eq(trait_value))
                .map(|(_, impl_class)| impl_class.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_copy_detaches_the_cell() {
        let a = Value::number(1.0);
        let b = a.shallow_copy();
        assert!(!a.ptr_eq(&b));
        b.borrow_mut().kind = ValueKind::Number(2.0);
        assert_eq!(a.as_number(), Some(1.0));
    }

    #[test]
    fn replace_with_is_visible_through_aliases() {
        let target = Value::number(0.0);
        let alias = target.clone();
        target.replace_with(&Value::number(5.0));
        assert_eq!(alias.as_number(), Some(5.0));
    }

    #[test]
    fn deref_follows_reference_chains() {
        let base = Value::string("x");
        let r1 = Value::reference(base.clone());
        let r2 = Value::reference(r1);
        assert!(r2.deref().ptr_eq(&base));
    }

    #[test]
    fn truthiness_rules() {
        assert!(!Value::null().truthy());
        assert!(!Value::number(0.0).truthy());
        assert!(Value::number(2.0).truthy());
        assert!(!Value::string("").truthy());
        assert!(Value::string("a").truthy());
        assert!(!Value::reference(Value::null()).truthy());
        assert!(Value::array(vec![]).truthy());
    }
}
