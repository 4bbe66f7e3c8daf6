use crate::ast::*;
use crate::types::JsValue;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum Completion {
    Normal(JsValue),
    Return(JsValue),
    Throw(JsValue),
    Break(Option<String>),
    Continue(Option<String>),
}

impl Completion {
    pub(crate) fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }
}

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug)]
pub struct Environment {
    pub(crate) bindings: FxHashMap<String, Binding>,
    pub(crate) parent: Option<EnvRef>,
    pub(crate) home: Option<ClassHome>,
}

/// What `super` refers to inside a class body. Kept off the binding map so
/// user declarations cannot shadow it.
#[derive(Debug, Clone)]
pub(crate) struct ClassHome {
    /// Object `super.key` is looked up on.
    pub(crate) super_home: JsValue,
    /// Constructor whose fields `super()` initializes.
    pub(crate) class: JsValue,
    /// Parent constructor, only for instance code of derived classes.
    pub(crate) super_ctor: Option<JsValue>,
}

#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) value: JsValue,
    pub(crate) kind: BindingKind,
    pub(crate) initialized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BindingKind {
    Var,
    Let,
    Const,
}

/// Why an assignment to an existing binding was refused.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BindingError {
    ConstAssignment,
    Uninitialized(String),
}

impl Environment {
    pub fn new(parent: Option<EnvRef>) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            bindings: FxHashMap::default(),
            parent,
            home: None,
        }))
    }

    /// Declares `name` here. Lexical bindings start in their TDZ.
    pub(crate) fn declare(&mut self, name: &str, kind: BindingKind) {
        self.bindings.insert(
            name.to_string(),
            Binding {
                value: JsValue::Undefined,
                kind,
                initialized: kind == BindingKind::Var,
            },
        );
    }

    /// Initializes a binding declared in this very scope.
    pub(crate) fn initialize(&mut self, name: &str, value: JsValue) {
        if let Some(binding) = self.bindings.get_mut(name) {
            binding.value = value;
            binding.initialized = true;
        }
    }

    /// Assignment through the scope chain. Unknown names become globals.
    pub(crate) fn set(&mut self, name: &str, value: JsValue) -> Result<(), BindingError> {
        if let Some(binding) = self.bindings.get_mut(name) {
            if !binding.initialized {
                return Err(BindingError::Uninitialized(name.to_string()));
            }
            if binding.kind == BindingKind::Const {
                return Err(BindingError::ConstAssignment);
            }
            binding.value = value;
            Ok(())
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().set(name, value)
        } else {
            self.bindings.insert(
                name.to_string(),
                Binding {
                    value,
                    kind: BindingKind::Var,
                    initialized: true,
                },
            );
            Ok(())
        }
    }

    pub fn get(&self, name: &str) -> Option<JsValue> {
        if let Some(binding) = self.bindings.get(name) {
            if !binding.initialized {
                return None; // TDZ
            }
            Some(binding.value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    pub fn has(&self, name: &str) -> bool {
        if self.bindings.contains_key(name) {
            true
        } else if let Some(parent) = &self.parent {
            parent.borrow().has(name)
        } else {
            false
        }
    }

    /// Fresh environment holding copies of this one's bindings, for the
    /// per-iteration scope of `for (let ...)` loops.
    pub(crate) fn copy_for_iteration(&self) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            bindings: self.bindings.clone(),
            parent: self.parent.clone(),
            home: self.home.clone(),
        }))
    }

    /// Nearest enclosing class home.
    pub(crate) fn class_home(&self) -> Option<ClassHome> {
        match (&self.home, &self.parent) {
            (Some(home), _) => Some(home.clone()),
            (None, Some(parent)) => parent.borrow().class_home(),
            (None, None) => None,
        }
    }
}

pub type NativeFn = Rc<dyn Fn(&mut super::Interpreter, &JsValue, &[JsValue]) -> Completion>;

#[derive(Clone)]
pub enum JsFunction {
    User {
        name: Option<String>,
        params: Vec<Pattern>,
        body: BlockNode,
        closure: EnvRef,
        is_arrow: bool,
    },
    Native(String, usize, NativeFn),
}

impl JsFunction {
    pub fn native(
        name: &str,
        arity: usize,
        f: impl Fn(&mut super::Interpreter, &JsValue, &[JsValue]) -> Completion + 'static,
    ) -> Self {
        JsFunction::Native(name.to_string(), arity, Rc::new(f))
    }
}

impl std::fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsFunction::User { name, .. } => write!(f, "JsFunction::User({name:?})"),
            JsFunction::Native(name, arity, _) => {
                write!(f, "JsFunction::Native({name:?}, {arity})")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyDescriptor {
    pub fn data(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    pub fn data_default(value: JsValue) -> Self {
        Self::data(value, true, true, true)
    }
}

/// An instance field declared in a class body, initialized on `new`.
#[derive(Debug, Clone)]
pub(crate) struct ClassFieldDef {
    pub(crate) key: String,
    pub(crate) init: Option<Expression>,
    pub(crate) env: EnvRef,
}

const MAX_ARRAY_LENGTH: f64 = 4_294_967_295.0;
const MAX_DENSE_GAP: usize = 1 << 16;

/// Rejected `length` write: negative, fractional, above 2^32 - 1, or too
/// far past the current end for dense storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidArrayLength;

/// Canonical array index form of a property key.
fn array_index(key: &str) -> Option<usize> {
    let idx = key.parse::<usize>().ok()?;
    (idx < MAX_ARRAY_LENGTH as usize && idx.to_string() == key).then_some(idx)
}

pub struct JsObjectData {
    pub id: Option<u64>,
    pub properties: FxHashMap<String, PropertyDescriptor>,
    pub property_order: Vec<String>,
    pub prototype: Option<Rc<RefCell<JsObjectData>>>,
    pub callable: Option<JsFunction>,
    pub array_elements: Option<Vec<JsValue>>,
    pub class_name: String,
    pub(crate) is_class_constructor: bool,
    pub(crate) class_field_defs: Vec<ClassFieldDef>,
}

impl JsObjectData {
    pub(crate) fn new() -> Self {
        Self {
            id: None,
            properties: FxHashMap::default(),
            property_order: Vec::new(),
            prototype: None,
            callable: None,
            array_elements: None,
            class_name: "Object".to_string(),
            is_class_constructor: false,
            class_field_defs: Vec::new(),
        }
    }

    pub fn get_property(&self, key: &str) -> JsValue {
        if let Some(desc) = self.properties.get(key) {
            return desc.value.clone();
        }
        if let Some(ref elems) = self.array_elements {
            if key == "length" {
                return JsValue::Number(elems.len() as f64);
            }
            if let Ok(idx) = key.parse::<usize>()
                && idx < elems.len()
            {
                return elems[idx].clone();
            }
        }
        if let Some(proto) = &self.prototype {
            return proto.borrow().get_property(key);
        }
        JsValue::Undefined
    }

    pub fn has_own_property(&self, key: &str) -> bool {
        if self.properties.contains_key(key) {
            return true;
        }
        match &self.array_elements {
            Some(elems) => {
                key == "length" || key.parse::<usize>().is_ok_and(|idx| idx < elems.len())
            }
            None => false,
        }
    }

    pub fn has_property(&self, key: &str) -> bool {
        if self.has_own_property(key) {
            return true;
        }
        if let Some(proto) = &self.prototype {
            return proto.borrow().has_property(key);
        }
        false
    }

    /// Own enumerable keys: array indices first, then properties in
    /// insertion order.
    pub fn own_enumerable_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = match &self.array_elements {
            Some(elems) => (0..elems.len()).map(|i| i.to_string()).collect(),
            None => Vec::new(),
        };
        for k in &self.property_order {
            if self.properties.get(k).is_some_and(|d| d.enumerable) {
                keys.push(k.clone());
            }
        }
        keys
    }

    /// Keys visited by `for-in`, own first, then up the prototype chain.
    pub fn enumerable_keys_with_proto(&self) -> Vec<String> {
        let mut keys = self.own_enumerable_keys();
        if let Some(ref proto) = self.prototype {
            for k in proto.borrow().enumerable_keys_with_proto() {
                if !keys.contains(&k) && !self.has_own_property(&k) {
                    keys.push(k);
                }
            }
        }
        keys
    }

    /// Ordinary [[Set]] on an own or new data property. Array `length`
    /// writes are validated, and indices far past the end stay ordinary
    /// properties instead of growing the dense storage.
    pub fn set_property_value(&mut self, key: &str, value: JsValue) -> Result<(), InvalidArrayLength> {
        if let Some(ref mut elems) = self.array_elements {
            if key == "length" {
                let len = crate::interpreter::to_number(&value);
                if !(0.0..=MAX_ARRAY_LENGTH).contains(&len) || len.fract() != 0.0 {
                    return Err(InvalidArrayLength);
                }
                let len = len as usize;
                if len > elems.len() + MAX_DENSE_GAP {
                    return Err(InvalidArrayLength);
                }
                elems.resize(len, JsValue::Undefined);
                return Ok(());
            }
            if let Some(idx) = array_index(key)
                && idx <= elems.len() + MAX_DENSE_GAP
            {
                if idx >= elems.len() {
                    elems.resize(idx + 1, JsValue::Undefined);
                }
                elems[idx] = value;
                return Ok(());
            }
        }
        if let Some(desc) = self.properties.get_mut(key) {
            if desc.writable {
                desc.value = value;
            }
        } else {
            self.insert_value(key.to_string(), value);
        }
        Ok(())
    }

    pub fn delete_property(&mut self, key: &str) -> bool {
        if let Some(desc) = self.properties.get(key) {
            if !desc.configurable {
                return false;
            }
            self.properties.remove(key);
            self.property_order.retain(|k| k != key);
            return true;
        }
        if let Some(ref mut elems) = self.array_elements
            && let Ok(idx) = key.parse::<usize>()
            && idx < elems.len()
        {
            elems[idx] = JsValue::Undefined;
        }
        true
    }

    pub fn insert_value(&mut self, key: String, value: JsValue) {
        self.insert_property(key, PropertyDescriptor::data_default(value));
    }

    /// Writable, non-enumerable, configurable: how builtin methods and
    /// error messages are installed.
    pub fn insert_builtin(&mut self, key: String, value: JsValue) {
        self.insert_property(key, PropertyDescriptor::data(value, true, false, true));
    }

    pub fn insert_property(&mut self, key: String, desc: PropertyDescriptor) {
        if !self.properties.contains_key(&key) {
            self.property_order.push(key.clone());
        }
        self.properties.insert(key, desc);
    }

    pub fn get_property_value(&self, key: &str) -> Option<JsValue> {
        self.properties.get(key).map(|d| d.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn let_bindings_start_uninitialized() {
        let env = Environment::new(None);
        env.borrow_mut().declare("x", BindingKind::Let);
        assert!(env.borrow().get("x").is_none());
        assert!(env.borrow().has("x"));
        assert_eq!(
            env.borrow_mut().set("x", JsValue::Number(1.0)),
            Err(BindingError::Uninitialized("x".to_string()))
        );
        env.borrow_mut().initialize("x", JsValue::Number(1.0));
        assert!(matches!(env.borrow().get("x"), Some(JsValue::Number(n)) if n == 1.0));
    }

    #[test]
    fn const_rejects_assignment() {
        let env = Environment::new(None);
        env.borrow_mut().declare("c", BindingKind::Const);
        env.borrow_mut().initialize("c", JsValue::Null);
        assert_eq!(
            env.borrow_mut().set("c", JsValue::Null),
            Err(BindingError::ConstAssignment)
        );
    }

    #[test]
    fn set_walks_the_scope_chain() {
        let outer = Environment::new(None);
        outer.borrow_mut().declare("v", BindingKind::Var);
        let inner = Environment::new(Some(outer.clone()));
        inner.borrow_mut().set("v", JsValue::Boolean(true)).unwrap();
        assert!(matches!(outer.borrow().get("v"), Some(JsValue::Boolean(true))));
        assert!(inner.borrow().bindings.is_empty());
    }

    #[test]
    fn iteration_copy_is_independent() {
        let outer = Environment::new(None);
        let loop_env = Environment::new(Some(outer));
        loop_env.borrow_mut().declare("i", BindingKind::Let);
        loop_env.borrow_mut().initialize("i", JsValue::Number(0.0));
        let copy = loop_env.borrow().copy_for_iteration();
        copy.borrow_mut().set("i", JsValue::Number(1.0)).unwrap();
        assert!(matches!(loop_env.borrow().get("i"), Some(JsValue::Number(n)) if n == 0.0));
    }

    #[test]
    fn array_length_and_index_writes() {
        let mut arr = JsObjectData::new();
        arr.array_elements = Some(vec![JsValue::Number(1.0)]);
        arr.set_property_value("3", JsValue::Number(4.0)).unwrap();
        assert!(matches!(arr.get_property("length"), JsValue::Number(n) if n == 4.0));
        arr.set_property_value("length", JsValue::Number(1.0)).unwrap();
        assert_eq!(arr.own_enumerable_keys(), vec!["0"]);
    }

    #[test]
    fn oversized_array_writes_do_not_grow_storage() {
        let mut arr = JsObjectData::new();
        arr.array_elements = Some(Vec::new());
        for bad in [4_294_967_296.0, 4_294_967_295.0, -1.0, 1.5] {
            assert_eq!(
                arr.set_property_value("length", JsValue::Number(bad)),
                Err(InvalidArrayLength)
            );
        }
        arr.set_property_value("4000000000", JsValue::Number(1.0)).unwrap();
        arr.set_property_value("01", JsValue::Number(2.0)).unwrap();
        assert!(matches!(arr.get_property("length"), JsValue::Number(n) if n == 0.0));
        assert!(matches!(arr.get_property("4000000000"), JsValue::Number(n) if n == 1.0));
        assert_eq!(arr.own_enumerable_keys(), vec!["4000000000", "01"]);
    }
}
