use super::*;

type ObjRef = Rc<RefCell<JsObjectData>>;

const ERROR_SUBTYPES: [&str; 4] = ["TypeError", "RangeError", "ReferenceError", "SyntaxError"];

fn arg(args: &[JsValue], i: usize) -> JsValue {
    args.get(i).cloned().unwrap_or(JsValue::Undefined)
}

/// Relative index as used by `slice`: negatives count from the end.
fn relative_index(val: f64, len: usize) -> usize {
    let len_f = len as f64;
    let idx = if val.is_nan() {
        0.0
    } else if val < 0.0 {
        (len_f + val.trunc()).max(0.0)
    } else {
        val.trunc().min(len_f)
    };
    idx as usize
}

impl Interpreter {
    pub(crate) fn setup_globals(&mut self) {
        let object_proto = self.create_object_with_proto(None);
        self.object_prototype = Some(object_proto.clone());
        let function_proto = self.create_object_with_proto(Some(object_proto.clone()));
        self.function_prototype = Some(function_proto);
        let array_proto = self.create_object_with_proto(Some(object_proto.clone()));
        self.array_prototype = Some(array_proto.clone());
        let string_proto = self.create_object_with_proto(Some(object_proto.clone()));
        self.string_prototype = Some(string_proto.clone());

        self.setup_object(&object_proto);
        self.setup_array(&array_proto);
        self.setup_string(&string_proto);
        self.setup_errors(&object_proto);
        self.setup_conversions();
        self.setup_math();
        self.setup_console();
    }

    fn register_global(&mut self, name: &str, val: JsValue) {
        let mut env = self.global_env.borrow_mut();
        env.declare(name, BindingKind::Var);
        env.initialize(name, val);
    }

    fn install_methods(&mut self, holder: &ObjRef, funcs: Vec<JsFunction>) {
        for func in funcs {
            let name = match &func {
                JsFunction::Native(name, _, _) => name.clone(),
                JsFunction::User { name, .. } => name.clone().unwrap_or_default(),
            };
            let val = self.create_function(func);
            holder.borrow_mut().insert_builtin(name, val);
        }
    }

    /// Wires `ctor.prototype` and `proto.constructor` to each other.
    fn link_constructor(&mut self, ctor: &JsValue, proto: &ObjRef) {
        if let Some(ctor_obj) = ctor.as_object_id().and_then(|id| self.get_object(id)) {
            ctor_obj.borrow_mut().insert_property(
                "prototype".to_string(),
                PropertyDescriptor::data(Self::object_value(proto), false, false, false),
            );
        }
        proto
            .borrow_mut()
            .insert_builtin("constructor".to_string(), ctor.clone());
    }

    fn setup_object(&mut self, object_proto: &ObjRef) {
        self.install_methods(
            object_proto,
            vec![
                JsFunction::native("toString", 0, |interp, this, _args| {
                    let tag = match this {
                        JsValue::Undefined => "Undefined",
                        JsValue::Null => "Null",
                        JsValue::Object(o) => match interp.get_object(o.id) {
                            Some(obj) if obj.borrow().callable.is_some() => "Function",
                            Some(obj) if obj.borrow().array_elements.is_some() => "Array",
                            Some(obj) if obj.borrow().class_name == "Error" => "Error",
                            _ => "Object",
                        },
                        JsValue::String(_) => "String",
                        JsValue::Number(_) => "Number",
                        JsValue::Boolean(_) => "Boolean",
                    };
                    Completion::Normal(JsValue::from_str(&format!("[object {tag}]")))
                }),
                JsFunction::native("hasOwnProperty", 1, |interp, this, args| {
                    let key = match interp.to_string_value(&arg(args, 0)) {
                        Ok(k) => k,
                        Err(e) => return Completion::Throw(e),
                    };
                    let found = match this {
                        JsValue::Object(o) => interp
                            .get_object(o.id)
                            .is_some_and(|obj| obj.borrow().has_own_property(&key)),
                        JsValue::String(s) => {
                            key == "length" || key.parse::<usize>().is_ok_and(|i| i < s.len())
                        }
                        JsValue::Undefined | JsValue::Null => {
                            let err = interp
                                .create_type_error("Cannot convert undefined or null to object");
                            return Completion::Throw(err);
                        }
                        _ => false,
                    };
                    Completion::Normal(JsValue::Boolean(found))
                }),
            ],
        );

        let object_ctor = self.create_function(JsFunction::native("Object", 1, |interp, _this, args| {
            match arg(args, 0) {
                v @ JsValue::Object(_) => Completion::Normal(v),
                _ => {
                    let obj = interp.create_object();
                    Completion::Normal(Self::object_value(&obj))
                }
            }
        }));
        self.link_constructor(&object_ctor, object_proto);
        if let Some(ctor_obj) = object_ctor.as_object_id().and_then(|id| self.get_object(id)) {
            self.install_methods(
                &ctor_obj,
                vec![JsFunction::native("keys", 1, |interp, _this, args| {
                    let keys = match arg(args, 0) {
                        JsValue::Object(o) => match interp.get_object(o.id) {
                            Some(obj) => obj.borrow().own_enumerable_keys(),
                            None => Vec::new(),
                        },
                        JsValue::String(s) => (0..s.len()).map(|i| i.to_string()).collect(),
                        JsValue::Undefined | JsValue::Null => {
                            let err = interp
                                .create_type_error("Cannot convert undefined or null to object");
                            return Completion::Throw(err);
                        }
                        _ => Vec::new(),
                    };
                    let values = keys.iter().map(|k| JsValue::from_str(k)).collect();
                    Completion::Normal(interp.create_array(values))
                })],
            );
        }
        self.register_global("Object", object_ctor);
    }

    /// Elements of `this` when it is an array.
    fn this_array(&mut self, this: &JsValue, method: &str) -> Result<ObjRef, JsValue> {
        let arr = this
            .as_object_id()
            .and_then(|id| self.get_object(id))
            .filter(|obj| obj.borrow().array_elements.is_some());
        arr.ok_or_else(|| {
            self.create_type_error(&format!("Array.prototype.{method} called on non-array"))
        })
    }

    fn array_join(&mut self, this: &JsValue, sep: &str) -> Completion {
        let arr = match self.this_array(this, "join") {
            Ok(a) => a,
            Err(e) => return Completion::Throw(e),
        };
        let elems = arr.borrow().array_elements.clone().unwrap_or_default();
        let mut parts = Vec::with_capacity(elems.len());
        for elem in &elems {
            if elem.is_nullish() {
                parts.push(String::new());
                continue;
            }
            match self.to_string_value(elem) {
                Ok(s) => parts.push(s),
                Err(e) => return Completion::Throw(e),
            }
        }
        Completion::Normal(JsValue::from_str(&parts.join(sep)))
    }

    fn setup_array(&mut self, array_proto: &ObjRef) {
        self.install_methods(
            array_proto,
            vec![
                JsFunction::native("push", 1, |interp, this, args| {
                    let arr = match interp.this_array(this, "push") {
                        Ok(a) => a,
                        Err(e) => return Completion::Throw(e),
                    };
                    let mut a = arr.borrow_mut();
                    let elems = a.array_elements.get_or_insert_with(Vec::new);
                    elems.extend(args.iter().cloned());
                    Completion::Normal(JsValue::Number(elems.len() as f64))
                }),
                JsFunction::native("pop", 0, |interp, this, _args| {
                    let arr = match interp.this_array(this, "pop") {
                        Ok(a) => a,
                        Err(e) => return Completion::Throw(e),
                    };
                    let popped = arr.borrow_mut().array_elements.as_mut().and_then(|e| e.pop());
                    Completion::Normal(popped.unwrap_or(JsValue::Undefined))
                }),
                JsFunction::native("join", 1, |interp, this, args| {
                    let sep = match arg(args, 0) {
                        JsValue::Undefined => ",".to_string(),
                        v => match interp.to_string_value(&v) {
                            Ok(s) => s,
                            Err(e) => return Completion::Throw(e),
                        },
                    };
                    interp.array_join(this, &sep)
                }),
                JsFunction::native("toString", 0, |interp, this, _args| {
                    interp.array_join(this, ",")
                }),
                JsFunction::native("indexOf", 1, |interp, this, args| {
                    let arr = match interp.this_array(this, "indexOf") {
                        Ok(a) => a,
                        Err(e) => return Completion::Throw(e),
                    };
                    let needle = arg(args, 0);
                    let idx = arr
                        .borrow()
                        .array_elements
                        .as_ref()
                        .and_then(|elems| elems.iter().position(|v| strict_equality(v, &needle)));
                    Completion::Normal(JsValue::Number(idx.map_or(-1.0, |i| i as f64)))
                }),
                JsFunction::native("includes", 1, |interp, this, args| {
                    let arr = match interp.this_array(this, "includes") {
                        Ok(a) => a,
                        Err(e) => return Completion::Throw(e),
                    };
                    let needle = arg(args, 0);
                    let found = arr
                        .borrow()
                        .array_elements
                        .as_ref()
                        .is_some_and(|elems| elems.iter().any(|v| same_value_zero(v, &needle)));
                    Completion::Normal(JsValue::Boolean(found))
                }),
                JsFunction::native("forEach", 1, |interp, this, args| {
                    match interp.array_callback_loop(this, args, "forEach") {
                        Ok(_) => Completion::Normal(JsValue::Undefined),
                        Err(e) => Completion::Throw(e),
                    }
                }),
                JsFunction::native("map", 1, |interp, this, args| {
                    match interp.array_callback_loop(this, args, "map") {
                        Ok(results) => Completion::Normal(interp.create_array(results)),
                        Err(e) => Completion::Throw(e),
                    }
                }),
            ],
        );

        let array_ctor = self.create_function(JsFunction::native("Array", 1, |interp, _this, args| {
            Completion::Normal(interp.create_array(args.to_vec()))
        }));
        self.link_constructor(&array_ctor, array_proto);
        if let Some(ctor_obj) = array_ctor.as_object_id().and_then(|id| self.get_object(id)) {
            self.install_methods(
                &ctor_obj,
                vec![JsFunction::native("isArray", 1, |interp, _this, args| {
                    let is_array = arg(args, 0)
                        .as_object_id()
                        .and_then(|id| interp.get_object(id))
                        .is_some_and(|obj| obj.borrow().array_elements.is_some());
                    Completion::Normal(JsValue::Boolean(is_array))
                })],
            );
        }
        self.register_global("Array", array_ctor);
    }

    /// Calls `callback(element, index, array)` for each element, reading the
    /// length afresh on every step.
    fn array_callback_loop(
        &mut self,
        this: &JsValue,
        args: &[JsValue],
        method: &str,
    ) -> Result<Vec<JsValue>, JsValue> {
        let arr = self.this_array(this, method)?;
        let callback = arg(args, 0);
        if !self.is_callable(&callback) {
            let shown = self.inspect(&callback, 0);
            return Err(self.create_type_error(&format!("{shown} is not a function")));
        }
        let this_arg = arg(args, 1);
        let mut results = Vec::new();
        let mut i = 0;
        loop {
            let item = arr
                .borrow()
                .array_elements
                .as_ref()
                .and_then(|elems| elems.get(i).cloned());
            let Some(item) = item else {
                break;
            };
            let call_args = [item, JsValue::Number(i as f64), this.clone()];
            match self.call_function(&callback, &this_arg, &call_args) {
                Completion::Normal(v) => results.push(v),
                Completion::Throw(e) => return Err(e),
                _ => results.push(JsValue::Undefined),
            }
            i += 1;
        }
        Ok(results)
    }

    fn this_string(&mut self, this: &JsValue) -> Result<JsString, JsValue> {
        match this {
            JsValue::String(s) => Ok(s.clone()),
            JsValue::Undefined | JsValue::Null => Err(self.create_type_error(
                "String.prototype method called on null or undefined",
            )),
            other => self.to_string_value(other).map(|s| JsString::from_str(&s)),
        }
    }

    fn setup_string(&mut self, string_proto: &ObjRef) {
        fn search_arg(interp: &mut Interpreter, args: &[JsValue]) -> Result<JsString, JsValue> {
            interp
                .to_string_value(&arg(args, 0))
                .map(|s| JsString::from_str(&s))
        }

        self.install_methods(
            string_proto,
            vec![
                JsFunction::native("includes", 1, |interp, this, args| {
                    let (s, search) = match (interp.this_string(this), search_arg(interp, args)) {
                        (Ok(s), Ok(search)) => (s, search),
                        (Err(e), _) | (_, Err(e)) => return Completion::Throw(e),
                    };
                    Completion::Normal(JsValue::Boolean(s.index_of(&search, 0).is_some()))
                }),
                JsFunction::native("startsWith", 1, |interp, this, args| {
                    let (s, search) = match (interp.this_string(this), search_arg(interp, args)) {
                        (Ok(s), Ok(search)) => (s, search),
                        (Err(e), _) | (_, Err(e)) => return Completion::Throw(e),
                    };
                    Completion::Normal(JsValue::Boolean(s.starts_with_at(&search, 0)))
                }),
                JsFunction::native("endsWith", 1, |interp, this, args| {
                    let (s, search) = match (interp.this_string(this), search_arg(interp, args)) {
                        (Ok(s), Ok(search)) => (s, search),
                        (Err(e), _) | (_, Err(e)) => return Completion::Throw(e),
                    };
                    let ends = search.len() <= s.len() && s.starts_with_at(&search, s.len() - search.len());
                    Completion::Normal(JsValue::Boolean(ends))
                }),
                JsFunction::native("toUpperCase", 0, |interp, this, _args| {
                    match interp.this_string(this) {
                        Ok(s) => Completion::Normal(JsValue::from_str(&s.to_rust_string().to_uppercase())),
                        Err(e) => Completion::Throw(e),
                    }
                }),
                JsFunction::native("toLowerCase", 0, |interp, this, _args| {
                    match interp.this_string(this) {
                        Ok(s) => Completion::Normal(JsValue::from_str(&s.to_rust_string().to_lowercase())),
                        Err(e) => Completion::Throw(e),
                    }
                }),
                JsFunction::native("trim", 0, |interp, this, _args| match interp.this_string(this) {
                    Ok(s) => Completion::Normal(JsValue::from_str(s.to_rust_string().trim())),
                    Err(e) => Completion::Throw(e),
                }),
                JsFunction::native("slice", 2, |interp, this, args| {
                    let s = match interp.this_string(this) {
                        Ok(s) => s,
                        Err(e) => return Completion::Throw(e),
                    };
                    let len = s.len();
                    let start = match interp.to_number_value(&arg(args, 0)) {
                        Ok(n) => relative_index(n, len),
                        Err(e) => return Completion::Throw(e),
                    };
                    let end = match arg(args, 1) {
                        JsValue::Undefined => len,
                        v => match interp.to_number_value(&v) {
                            Ok(n) => relative_index(n, len),
                            Err(e) => return Completion::Throw(e),
                        },
                    };
                    Completion::Normal(JsValue::String(s.slice(start, end)))
                }),
                JsFunction::native("toString", 0, |interp, this, _args| match interp.this_string(this) {
                    Ok(s) => Completion::Normal(JsValue::String(s)),
                    Err(e) => Completion::Throw(e),
                }),
            ],
        );

        let string_ctor = self.create_function(JsFunction::native("String", 1, |interp, _this, args| {
            if args.is_empty() {
                return Completion::Normal(JsValue::from_str(""));
            }
            match interp.to_string_value(&args[0]) {
                Ok(s) => Completion::Normal(JsValue::from_str(&s)),
                Err(e) => Completion::Throw(e),
            }
        }));
        self.link_constructor(&string_ctor, string_proto);
        self.register_global("String", string_ctor);
    }

    /// The constructor shared by `Error` and its subtypes. Called on an
    /// object that already inherits from the matching prototype (via `new`
    /// or `super(...)`), it initializes that object; otherwise it makes one.
    fn error_constructor(name: &'static str) -> JsFunction {
        JsFunction::native(name, 1, move |interp, this, args| {
            let message = match arg(args, 0) {
                JsValue::Undefined => None,
                v => match interp.to_string_value(&v) {
                    Ok(s) => Some(s),
                    Err(e) => return Completion::Throw(e),
                },
            };
            let proto = interp.error_prototypes.get(name).cloned();
            let inherits = match (this.as_object_id().and_then(|id| interp.get_object(id)), &proto) {
                (Some(obj), Some(proto)) => {
                    let mut current = obj.borrow().prototype.clone();
                    let mut found = false;
                    while let Some(p) = current {
                        if Rc::ptr_eq(&p, proto) {
                            found = true;
                            break;
                        }
                        current = p.borrow().prototype.clone();
                    }
                    found.then_some(obj)
                }
                _ => None,
            };
            let target = match inherits {
                Some(obj) => obj,
                None => interp.create_object_with_proto(proto),
            };
            {
                let mut t = target.borrow_mut();
                t.class_name = "Error".to_string();
                if let Some(msg) = message {
                    t.insert_builtin("message".to_string(), JsValue::from_str(&msg));
                }
            }
            Completion::Normal(Self::object_value(&target))
        })
    }

    fn setup_errors(&mut self, object_proto: &ObjRef) {
        let error_proto = self.create_object_with_proto(Some(object_proto.clone()));
        {
            let mut p = error_proto.borrow_mut();
            p.insert_builtin("name".to_string(), JsValue::from_str("Error"));
            p.insert_builtin("message".to_string(), JsValue::from_str(""));
        }
        self.install_methods(
            &error_proto,
            vec![JsFunction::native("toString", 0, |interp, this, _args| {
                let JsValue::Object(o) = this else {
                    let err = interp.create_type_error("Error.prototype.toString called on non-object");
                    return Completion::Throw(err);
                };
                let (name, message) = match interp.get_object(o.id) {
                    Some(obj) => {
                        let obj = obj.borrow();
                        (obj.get_property("name"), obj.get_property("message"))
                    }
                    None => (JsValue::Undefined, JsValue::Undefined),
                };
                let name = match name {
                    JsValue::Undefined => "Error".to_string(),
                    v => to_js_string(&v),
                };
                let message = match message {
                    JsValue::Undefined => String::new(),
                    v => to_js_string(&v),
                };
                let text = match (name.is_empty(), message.is_empty()) {
                    (_, true) => name,
                    (true, false) => message,
                    (false, false) => format!("{name}: {message}"),
                };
                Completion::Normal(JsValue::from_str(&text))
            })],
        );
        self.error_prototypes.insert("Error".to_string(), error_proto.clone());
        let error_ctor = self.create_function(Self::error_constructor("Error"));
        self.link_constructor(&error_ctor, &error_proto);
        let error_ctor_obj = error_ctor.as_object_id().and_then(|id| self.get_object(id));
        self.register_global("Error", error_ctor);

        for name in ERROR_SUBTYPES {
            let proto = self.create_object_with_proto(Some(error_proto.clone()));
            {
                let mut p = proto.borrow_mut();
                p.insert_builtin("name".to_string(), JsValue::from_str(name));
                p.insert_builtin("message".to_string(), JsValue::from_str(""));
            }
            self.error_prototypes.insert(name.to_string(), proto.clone());
            let ctor = self.create_function(Self::error_constructor(name));
            if let Some(ctor_obj) = ctor.as_object_id().and_then(|id| self.get_object(id)) {
                ctor_obj.borrow_mut().prototype = error_ctor_obj.clone();
            }
            self.link_constructor(&ctor, &proto);
            self.register_global(name, ctor);
        }
    }

    fn setup_conversions(&mut self) {
        let funcs = vec![
            JsFunction::native("Number", 1, |interp, _this, args| {
                if args.is_empty() {
                    return Completion::Normal(JsValue::Number(0.0));
                }
                match interp.to_number_value(&args[0]) {
                    Ok(n) => Completion::Normal(JsValue::Number(n)),
                    Err(e) => Completion::Throw(e),
                }
            }),
            JsFunction::native("Boolean", 1, |_interp, _this, args| {
                Completion::Normal(JsValue::Boolean(to_boolean(&arg(args, 0))))
            }),
            JsFunction::native("isNaN", 1, |interp, _this, args| {
                match interp.to_number_value(&arg(args, 0)) {
                    Ok(n) => Completion::Normal(JsValue::Boolean(n.is_nan())),
                    Err(e) => Completion::Throw(e),
                }
            }),
        ];
        for func in funcs {
            let name = match &func {
                JsFunction::Native(name, _, _) => name.clone(),
                JsFunction::User { .. } => continue,
            };
            let val = self.create_function(func);
            self.register_global(&name, val);
        }
    }

    fn math_unary(name: &'static str, op: fn(f64) -> f64) -> JsFunction {
        JsFunction::native(name, 1, move |interp, _this, args| {
            match interp.to_number_value(&arg(args, 0)) {
                Ok(n) => Completion::Normal(JsValue::Number(op(n))),
                Err(e) => Completion::Throw(e),
            }
        })
    }

    fn math_fold(name: &'static str, init: f64, pick: fn(f64, f64) -> f64) -> JsFunction {
        JsFunction::native(name, 2, move |interp, _this, args| {
            let mut acc = init;
            for a in args {
                let n = match interp.to_number_value(a) {
                    Ok(n) => n,
                    Err(e) => return Completion::Throw(e),
                };
                acc = if n.is_nan() || acc.is_nan() { f64::NAN } else { pick(acc, n) };
            }
            Completion::Normal(JsValue::Number(acc))
        })
    }

    fn setup_math(&mut self) {
        let math = self.create_object();
        self.install_methods(
            &math,
            vec![
                Self::math_unary("floor", f64::floor),
                Self::math_unary("ceil", f64::ceil),
                Self::math_unary("abs", f64::abs),
                Self::math_fold("max", f64::NEG_INFINITY, f64::max),
                Self::math_fold("min", f64::INFINITY, f64::min),
            ],
        );
        let math_val = Self::object_value(&math);
        self.register_global("Math", math_val);
    }

    fn setup_console(&mut self) {
        let console = self.create_object();
        self.install_methods(
            &console,
            vec![JsFunction::native("log", 0, |interp, _this, args| {
                let parts: Vec<String> = args.iter().map(|v| interp.inspect(v, 0)).collect();
                let line = parts.join(" ");
                interp.console_lines += 1;
                if interp.config.echo_console {
                    println!("{line}");
                } else {
                    interp.console_output.push(line);
                }
                Completion::Normal(JsValue::Undefined)
            })],
        );
        let console_val = Self::object_value(&console);
        self.register_global("console", console_val);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged(src: &str) -> Vec<String> {
        let mut interp = Interpreter::new(Config::default());
        if let Err(e) = interp.eval_source(src) {
            panic!("{src:?} failed: {e}");
        }
        interp.console_output().to_vec()
    }

    #[test]
    fn relative_index_clamps() {
        assert_eq!(relative_index(-2.0, 5), 3);
        assert_eq!(relative_index(-9.0, 5), 0);
        assert_eq!(relative_index(9.0, 5), 5);
        assert_eq!(relative_index(f64::NAN, 5), 0);
    }

    #[test]
    fn error_subtypes_chain_to_error() {
        assert_eq!(
            logged(
                "let e = new TypeError('bad');
                 console.log(e instanceof TypeError, e instanceof Error, e.name, e.message);
                 console.log(String(e), RangeError('r').toString());"
            ),
            vec!["true true TypeError bad", "TypeError: bad RangeError: r"]
        );
    }

    #[test]
    fn array_methods() {
        assert_eq!(
            logged(
                "let a = [1, 2];
                 a.push(3);
                 console.log(a.join('-'), a.indexOf(2), a.includes(4), a.map(x => x * 2));
                 console.log(a.pop(), a.length, Array.isArray(a), Array.isArray('a'));"
            ),
            vec!["1-2-3 1 false [ 2, 4, 6 ]", "3 2 true false"]
        );
    }

    #[test]
    fn string_methods() {
        assert_eq!(
            logged(
                "let s = '  Guarded  '.trim();
                 console.log(s.toUpperCase(), s.slice(-3), s.startsWith('Gu'), s.endsWith('ed'), s.includes('x'));"
            ),
            vec!["GUARDED ded true true false"]
        );
    }

    #[test]
    fn object_and_math_helpers() {
        assert_eq!(
            logged(
                "let o = { a: 1, b: 2 };
                 console.log(Object.keys(o), o.hasOwnProperty('a'), o.hasOwnProperty('toString'));
                 console.log(Math.max(1, 5, 3), Math.min(), Math.floor(-1.5), isNaN('x'), Number('42'));"
            ),
            vec!["[ 'a', 'b' ] true false", "5 Infinity -2 true 42"]
        );
    }
}
