use crate::ast::*;
use crate::config::Config;
use crate::parser::Parser;
use crate::types::{JsObject, JsString, JsValue, number_ops};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

mod types;
pub use types::*;

mod helpers;
pub(crate) use helpers::*;
mod builtins;
mod clauses;
mod eval;
mod exec;

#[cfg(test)]
mod tests;

pub struct Interpreter {
    config: Config,
    global_env: EnvRef,
    objects: Vec<Option<Rc<RefCell<JsObjectData>>>>,
    object_prototype: Option<Rc<RefCell<JsObjectData>>>,
    function_prototype: Option<Rc<RefCell<JsObjectData>>>,
    array_prototype: Option<Rc<RefCell<JsObjectData>>>,
    string_prototype: Option<Rc<RefCell<JsObjectData>>>,
    error_prototypes: FxHashMap<String, Rc<RefCell<JsObjectData>>>,
    call_depth: usize,
    console_output: Vec<String>,
    console_lines: usize,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        let global = Environment::new(None);

        {
            let mut env = global.borrow_mut();
            for (name, value) in [
                ("undefined", JsValue::Undefined),
                ("NaN", JsValue::Number(f64::NAN)),
                ("Infinity", JsValue::Number(f64::INFINITY)),
                ("this", JsValue::Undefined),
            ] {
                env.bindings.insert(
                    name.to_string(),
                    Binding {
                        value,
                        kind: BindingKind::Const,
                        initialized: true,
                    },
                );
            }
        }

        let mut interp = Self {
            config,
            global_env: global,
            objects: Vec::new(),
            object_prototype: None,
            function_prototype: None,
            array_prototype: None,
            string_prototype: None,
            error_prototypes: FxHashMap::default(),
            call_depth: 0,
            console_output: Vec::new(),
            console_lines: 0,
        };
        interp.setup_globals();
        interp
    }

    /// Parses and runs `source` in this interpreter's global scope, which
    /// persists across calls.
    pub fn eval_source(&mut self, source: &str) -> Result<JsValue, crate::Error> {
        let program = Parser::new(source)?.parse_program()?;
        match self.run(&program) {
            Completion::Throw(val) => Err(crate::Error::Uncaught(self.format_value(&val))),
            Completion::Normal(val) | Completion::Return(val) => Ok(val),
            Completion::Break(_) | Completion::Continue(_) => Ok(JsValue::Undefined),
        }
    }

    pub fn run(&mut self, program: &Program) -> Completion {
        let global = self.global_env.clone();
        let mut names = Vec::new();
        var_declared_names(&program.body, &mut names);
        self.hoist_var_names(names, &global);
        self.exec_statements(&program.body, &global)
    }

    /// Lines written by `console.log`, in order. Empty when
    /// `Config::echo_console` sends them to stdout instead.
    pub fn console_output(&self) -> &[String] {
        &self.console_output
    }

    /// Number of `console.log` calls so far, echoed or captured.
    pub fn console_line_count(&self) -> usize {
        self.console_lines
    }

    pub(crate) fn max_call_depth(&self) -> usize {
        self.config.max_call_depth
    }

    fn allocate_object_slot(&mut self, obj: Rc<RefCell<JsObjectData>>) -> u64 {
        let id = self.objects.len() as u64;
        obj.borrow_mut().id = Some(id);
        self.objects.push(Some(obj));
        id
    }

    fn get_object(&self, id: u64) -> Option<Rc<RefCell<JsObjectData>>> {
        self.objects.get(id as usize).and_then(|slot| slot.clone())
    }

    fn object_value(obj: &Rc<RefCell<JsObjectData>>) -> JsValue {
        let id = obj.borrow().id.unwrap_or_default();
        JsValue::Object(JsObject { id })
    }

    fn create_object_with_proto(
        &mut self,
        prototype: Option<Rc<RefCell<JsObjectData>>>,
    ) -> Rc<RefCell<JsObjectData>> {
        let mut data = JsObjectData::new();
        data.prototype = prototype;
        let obj = Rc::new(RefCell::new(data));
        self.allocate_object_slot(obj.clone());
        obj
    }

    fn create_object(&mut self) -> Rc<RefCell<JsObjectData>> {
        self.create_object_with_proto(self.object_prototype.clone())
    }

    fn create_array(&mut self, elements: Vec<JsValue>) -> JsValue {
        let arr = self.create_object_with_proto(self.array_prototype.clone());
        {
            let mut a = arr.borrow_mut();
            a.class_name = "Array".to_string();
            a.array_elements = Some(elements);
        }
        Self::object_value(&arr)
    }

    fn create_function(&mut self, func: JsFunction) -> JsValue {
        let is_arrow = matches!(&func, JsFunction::User { is_arrow: true, .. });
        let is_native = matches!(&func, JsFunction::Native(..));
        let (fn_name, fn_length) = match &func {
            JsFunction::User { name, params, .. } => {
                let n = name.clone().unwrap_or_default();
                let len = params
                    .iter()
                    .take_while(|p| !matches!(p, Pattern::Rest(_) | Pattern::Assign(..)))
                    .count();
                (n, len)
            }
            JsFunction::Native(name, arity, _) => (name.clone(), *arity),
        };
        let mut obj_data = JsObjectData::new();
        obj_data.prototype = self.function_prototype.clone();
        obj_data.callable = Some(func);
        obj_data.class_name = "Function".to_string();
        obj_data.insert_property(
            "length".to_string(),
            PropertyDescriptor::data(JsValue::Number(fn_length as f64), false, false, true),
        );
        obj_data.insert_property(
            "name".to_string(),
            PropertyDescriptor::data(JsValue::from_str(&fn_name), false, false, true),
        );
        let obj = Rc::new(RefCell::new(obj_data));
        let func_id = self.allocate_object_slot(obj.clone());
        let func_val = JsValue::Object(JsObject { id: func_id });
        // Ordinary functions get a prototype whose constructor points back
        if !is_arrow && !is_native {
            let proto = self.create_object();
            proto
                .borrow_mut()
                .insert_builtin("constructor".to_string(), func_val.clone());
            obj.borrow_mut().insert_property(
                "prototype".to_string(),
                PropertyDescriptor::data(Self::object_value(&proto), true, false, false),
            );
        }
        func_val
    }

    fn is_callable(&self, val: &JsValue) -> bool {
        match val {
            JsValue::Object(o) => self
                .get_object(o.id)
                .is_some_and(|obj| obj.borrow().callable.is_some()),
            _ => false,
        }
    }

    pub(crate) fn create_error(&mut self, name: &str, message: &str) -> JsValue {
        let proto = self
            .error_prototypes
            .get(name)
            .cloned()
            .or_else(|| self.error_prototypes.get("Error").cloned());
        let obj = self.create_object_with_proto(proto);
        {
            let mut o = obj.borrow_mut();
            o.class_name = "Error".to_string();
            o.insert_builtin("message".to_string(), JsValue::from_str(message));
        }
        Self::object_value(&obj)
    }

    pub(crate) fn create_type_error(&mut self, message: &str) -> JsValue {
        self.create_error("TypeError", message)
    }

    pub(crate) fn create_reference_error(&mut self, message: &str) -> JsValue {
        self.create_error("ReferenceError", message)
    }

    pub(crate) fn create_range_error(&mut self, message: &str) -> JsValue {
        self.create_error("RangeError", message)
    }

    /// Rendering used for uncaught exceptions: `Name: message` for error
    /// objects, the plain string form otherwise.
    pub fn format_value(&self, val: &JsValue) -> String {
        if let JsValue::Object(o) = val
            && let Some(obj) = self.get_object(o.id)
        {
            let obj = obj.borrow();
            if obj.class_name == "Error" || obj.get_property("message").is_string() {
                return error_summary(&obj);
            }
        }
        self.inspect(val, 0)
    }

    pub fn inspect_value(&self, val: &JsValue) -> String {
        self.inspect(val, 0)
    }

    /// `console.log` rendering. Strings print raw at the top level and
    /// quoted when nested.
    pub(crate) fn inspect(&self, val: &JsValue, depth: usize) -> String {
        let JsValue::Object(o) = val else {
            return match val {
                JsValue::String(s) if depth > 0 => format!("'{s}'"),
                other => to_js_string(other),
            };
        };
        let Some(obj) = self.get_object(o.id) else {
            return to_js_string(val);
        };
        let obj = obj.borrow();
        if let Some(func) = &obj.callable {
            let name = match obj.get_property("name") {
                JsValue::String(s) if !s.is_empty() => s.to_rust_string(),
                _ => "(anonymous)".to_string(),
            };
            let is_user = matches!(func, JsFunction::User { .. });
            return if obj.is_class_constructor && is_user {
                format!("[class {name}]")
            } else {
                format!("[Function: {name}]")
            };
        }
        if obj.class_name == "Error" {
            return error_summary(&obj);
        }
        if depth > 2 {
            return if obj.array_elements.is_some() {
                "[Array]".to_string()
            } else {
                "[Object]".to_string()
            };
        }
        if let Some(elems) = &obj.array_elements {
            if elems.is_empty() {
                return "[]".to_string();
            }
            let parts: Vec<String> = elems.iter().map(|e| self.inspect(e, depth + 1)).collect();
            return format!("[ {} ]", parts.join(", "));
        }
        let parts: Vec<String> = obj
            .own_enumerable_keys()
            .iter()
            .map(|k| format!("{k}: {}", self.inspect(&obj.get_property(k), depth + 1)))
            .collect();
        if parts.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", parts.join(", "))
        }
    }
}

fn error_summary(obj: &JsObjectData) -> String {
    let name = match obj.get_property("name") {
        JsValue::Undefined => String::new(),
        other => to_js_string(&other),
    };
    let message = match obj.get_property("message") {
        JsValue::Undefined => String::new(),
        other => to_js_string(&other),
    };
    match (name.is_empty(), message.is_empty()) {
        (_, true) => name,
        (true, false) => message,
        (false, false) => format!("{name}: {message}"),
    }
}
