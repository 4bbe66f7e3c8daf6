use super::*;

/// Something an assignment or update can write to.
enum Target {
    Binding(String),
    Property(JsValue, String),
}

fn describe_callee(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(name) => name.clone(),
        Expression::This => "this".to_string(),
        Expression::Member(obj, MemberProperty::Dot(prop)) => {
            format!("{}.{prop}", describe_callee(obj))
        }
        Expression::Member(obj, MemberProperty::Computed(_)) => {
            format!("{}[...]", describe_callee(obj))
        }
        Expression::Call(callee, _) => format!("{}(...)", describe_callee(callee)),
        _ => "expression".to_string(),
    }
}

impl Interpreter {
    pub(crate) fn eval_expr(&mut self, expr: &Expression, env: &EnvRef) -> Completion {
        match expr {
            Expression::Literal(lit) => Completion::Normal(match lit {
                Literal::Null => JsValue::Null,
                Literal::Boolean(b) => JsValue::Boolean(*b),
                Literal::Number(n) => JsValue::Number(*n),
                Literal::String(s) => JsValue::from_str(s),
            }),
            Expression::Identifier(name) => self.lookup_identifier(name, env),
            Expression::This => {
                let this = env.borrow().get("this");
                Completion::Normal(this.unwrap_or(JsValue::Undefined))
            }
            Expression::Super => {
                let err = self.create_error("SyntaxError", "'super' keyword unexpected here");
                Completion::Throw(err)
            }
            Expression::Array(elements) => self.eval_array_literal(elements, env),
            Expression::Object(props) => self.eval_object_literal(props, env),
            Expression::Function(f) => Completion::Normal(self.eval_function_expr(f, env)),
            Expression::ArrowFunction(af) => {
                let func = JsFunction::User {
                    name: None,
                    params: af.params.clone(),
                    body: BlockNode::plain(af.body.clone()),
                    closure: env.clone(),
                    is_arrow: true,
                };
                Completion::Normal(self.create_function(func))
            }
            Expression::Class(ce) => {
                let mut class_val = JsValue::Undefined;
                let comp = self.exec_guarded(&ce.handlers, env, |interp| {
                    match interp.eval_class(ce.name.as_deref(), &ce.super_class, &ce.body, env) {
                        Completion::Normal(v) => {
                            class_val = v;
                            Completion::Normal(JsValue::Undefined)
                        }
                        other => other,
                    }
                });
                match comp {
                    Completion::Normal(_) => Completion::Normal(class_val),
                    other => other,
                }
            }
            Expression::Unary(op, operand) => {
                let val = match self.eval_expr(operand, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                let numeric = |interp: &mut Self, f: fn(f64) -> f64| match interp.to_number_value(&val) {
                    Ok(n) => Completion::Normal(JsValue::Number(f(n))),
                    Err(e) => Completion::Throw(e),
                };
                match op {
                    UnaryOp::Not => Completion::Normal(JsValue::Boolean(!to_boolean(&val))),
                    UnaryOp::Minus => numeric(self, |n| -n),
                    UnaryOp::Plus => numeric(self, |n| n),
                    UnaryOp::BitNot => numeric(self, number_ops::bitwise_not),
                }
            }
            Expression::Binary(op, left, right) => {
                let lval = match self.eval_expr(left, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                let rval = match self.eval_expr(right, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                match self.binary_op(*op, &lval, &rval) {
                    Ok(v) => Completion::Normal(v),
                    Err(e) => Completion::Throw(e),
                }
            }
            Expression::Logical(op, left, right) => {
                let lval = match self.eval_expr(left, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                let short_circuit = match op {
                    LogicalOp::And => !to_boolean(&lval),
                    LogicalOp::Or => to_boolean(&lval),
                    LogicalOp::NullishCoalescing => !lval.is_nullish(),
                };
                if short_circuit {
                    Completion::Normal(lval)
                } else {
                    self.eval_expr(right, env)
                }
            }
            Expression::Update(op, prefix, arg) => self.eval_update(*op, *prefix, arg, env),
            Expression::Assign(op, target, value) => self.eval_assign(*op, target, value, env),
            Expression::Conditional(test, consequent, alternate) => {
                let t = match self.eval_expr(test, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                if to_boolean(&t) {
                    self.eval_expr(consequent, env)
                } else {
                    self.eval_expr(alternate, env)
                }
            }
            Expression::Call(callee, args) => self.eval_call(callee, args, env),
            Expression::New(callee, args) => self.eval_new(callee, args, env),
            Expression::Member(obj, prop) => {
                if let Expression::Super = **obj {
                    return self.eval_super_member(prop, env);
                }
                let obj_val = match self.eval_expr(obj, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                let key = match self.eval_member_key(prop, env) {
                    Ok(k) => k,
                    Err(e) => return Completion::Throw(e),
                };
                self.get_member(&obj_val, &key)
            }
            Expression::Spread(_) => {
                let err = self.create_error("SyntaxError", "Unexpected spread element");
                Completion::Throw(err)
            }
            Expression::Template(tl) => {
                let mut out = String::new();
                for (i, quasi) in tl.quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(e) = tl.expressions.get(i) {
                        let val = match self.eval_expr(e, env) {
                            Completion::Normal(v) => v,
                            other => return other,
                        };
                        match self.to_string_value(&val) {
                            Ok(s) => out.push_str(&s),
                            Err(e) => return Completion::Throw(e),
                        }
                    }
                }
                Completion::Normal(JsValue::from_str(&out))
            }
            Expression::Typeof(operand) => {
                if let Expression::Identifier(name) = &**operand
                    && !env.borrow().has(name)
                {
                    return Completion::Normal(JsValue::from_str("undefined"));
                }
                let val = match self.eval_expr(operand, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                Completion::Normal(JsValue::from_str(typeof_val(&val, &self.objects)))
            }
            Expression::Void(operand) => match self.eval_expr(operand, env) {
                Completion::Normal(_) => Completion::Normal(JsValue::Undefined),
                other => other,
            },
            Expression::Delete(operand) => self.eval_delete(operand, env),
            Expression::Sequence(exprs) => {
                let mut result = JsValue::Undefined;
                for e in exprs {
                    result = match self.eval_expr(e, env) {
                        Completion::Normal(v) => v,
                        other => return other,
                    };
                }
                Completion::Normal(result)
            }
        }
    }

    fn lookup_identifier(&mut self, name: &str, env: &EnvRef) -> Completion {
        let found = env.borrow().get(name);
        if let Some(val) = found {
            return Completion::Normal(val);
        }
        let declared = env.borrow().has(name);
        let err = if declared {
            self.create_reference_error(&format!("Cannot access '{name}' before initialization"))
        } else {
            self.create_reference_error(&format!("{name} is not defined"))
        };
        Completion::Throw(err)
    }

    fn eval_function_expr(&mut self, f: &FunctionExpr, env: &EnvRef) -> JsValue {
        // A named function expression sees its own name in a scope of its own
        let closure = match &f.name {
            Some(name) => {
                let scope = Environment::new(Some(env.clone()));
                scope.borrow_mut().declare(name, BindingKind::Const);
                scope
            }
            None => env.clone(),
        };
        let func = JsFunction::User {
            name: f.name.clone(),
            params: f.params.clone(),
            body: f.body.clone(),
            closure: closure.clone(),
            is_arrow: false,
        };
        let val = self.create_function(func);
        if let Some(name) = &f.name {
            closure.borrow_mut().initialize(name, val.clone());
        }
        val
    }

    fn eval_array_literal(&mut self, elements: &[Option<Expression>], env: &EnvRef) -> Completion {
        let mut values = Vec::with_capacity(elements.len());
        for elem in elements {
            match elem {
                None => values.push(JsValue::Undefined),
                Some(Expression::Spread(inner)) => {
                    let val = match self.eval_expr(inner, env) {
                        Completion::Normal(v) => v,
                        other => return other,
                    };
                    match self.iterate_to_vec(&val) {
                        Ok(items) => values.extend(items),
                        Err(e) => return Completion::Throw(e),
                    }
                }
                Some(e) => match self.eval_expr(e, env) {
                    Completion::Normal(v) => values.push(v),
                    other => return other,
                },
            }
        }
        Completion::Normal(self.create_array(values))
    }

    fn eval_object_literal(&mut self, props: &[Property], env: &EnvRef) -> Completion {
        let obj = self.create_object();
        for prop in props {
            match prop {
                Property::KeyValue(key, value) => {
                    let key = match self.eval_property_key(key, env) {
                        Completion::Normal(k) => property_key_string(&k),
                        other => return other,
                    };
                    let val = match self.eval_expr(value, env) {
                        Completion::Normal(v) => v,
                        other => return other,
                    };
                    if value.is_anonymous_function_definition() {
                        self.set_function_name(&val, &key);
                    }
                    obj.borrow_mut().insert_value(key, val);
                }
                Property::Spread(source) => {
                    let val = match self.eval_expr(source, env) {
                        Completion::Normal(v) => v,
                        other => return other,
                    };
                    if let JsValue::Object(o) = &val
                        && let Some(src) = self.get_object(o.id)
                    {
                        let entries: Vec<(String, JsValue)> = {
                            let src = src.borrow();
                            src.own_enumerable_keys()
                                .into_iter()
                                .map(|k| {
                                    let v = src.get_property(&k);
                                    (k, v)
                                })
                                .collect()
                        };
                        let mut target = obj.borrow_mut();
                        for (k, v) in entries {
                            target.insert_value(k, v);
                        }
                    }
                }
            }
        }
        Completion::Normal(Self::object_value(&obj))
    }

    /// Evaluates a property name. Computed keys go through ToPrimitive and
    /// always come back as strings.
    pub(crate) fn eval_property_key(&mut self, key: &PropertyKey, env: &EnvRef) -> Completion {
        match key {
            PropertyKey::Identifier(name) | PropertyKey::String(name) => {
                Completion::Normal(JsValue::from_str(name))
            }
            PropertyKey::Number(n) => Completion::Normal(JsValue::from_str(&number_ops::to_string(*n))),
            PropertyKey::Computed(expr) => {
                let val = match self.eval_expr(expr, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                match self.to_property_key(&val) {
                    Ok(k) => Completion::Normal(JsValue::from_str(&k)),
                    Err(e) => Completion::Throw(e),
                }
            }
        }
    }

    fn eval_member_key(&mut self, prop: &MemberProperty, env: &EnvRef) -> Result<String, JsValue> {
        match prop {
            MemberProperty::Dot(name) => Ok(name.clone()),
            MemberProperty::Computed(expr) => {
                let val = match self.eval_expr(expr, env) {
                    Completion::Normal(v) => v,
                    Completion::Throw(e) => return Err(e),
                    _ => JsValue::Undefined,
                };
                self.to_property_key(&val)
            }
        }
    }

    fn to_property_key(&mut self, val: &JsValue) -> Result<String, JsValue> {
        let prim = self.to_primitive(val, "string")?;
        Ok(property_key_string(&prim))
    }

    /// `super.key` inside a method: looked up on the home object's parent.
    fn eval_super_member(&mut self, prop: &MemberProperty, env: &EnvRef) -> Completion {
        let key = match self.eval_member_key(prop, env) {
            Ok(k) => k,
            Err(e) => return Completion::Throw(e),
        };
        let home = env.borrow().class_home();
        match home {
            Some(home) => self.get_member(&home.super_home, &key),
            None => {
                let err = self.create_error("SyntaxError", "'super' keyword unexpected here");
                Completion::Throw(err)
            }
        }
    }

    pub(crate) fn get_member(&mut self, val: &JsValue, key: &str) -> Completion {
        match val {
            JsValue::Undefined | JsValue::Null => {
                let err = self.create_type_error(&format!(
                    "Cannot read properties of {val} (reading '{key}')"
                ));
                Completion::Throw(err)
            }
            JsValue::String(s) => {
                if key == "length" {
                    return Completion::Normal(JsValue::Number(s.len() as f64));
                }
                if let Ok(idx) = key.parse::<usize>() {
                    return Completion::Normal(if idx < s.len() {
                        JsValue::String(s.slice(idx, idx + 1))
                    } else {
                        JsValue::Undefined
                    });
                }
                let proto = self.string_prototype.clone();
                Completion::Normal(proto.map_or(JsValue::Undefined, |p| p.borrow().get_property(key)))
            }
            JsValue::Boolean(_) | JsValue::Number(_) => {
                let proto = self.object_prototype.clone();
                Completion::Normal(proto.map_or(JsValue::Undefined, |p| p.borrow().get_property(key)))
            }
            JsValue::Object(o) => match self.get_object(o.id) {
                Some(obj) => Completion::Normal(obj.borrow().get_property(key)),
                None => Completion::Normal(JsValue::Undefined),
            },
        }
    }

    pub(crate) fn set_member(&mut self, target: &JsValue, key: &str, val: JsValue) -> Result<(), JsValue> {
        match target {
            JsValue::Undefined | JsValue::Null => Err(self.create_type_error(&format!(
                "Cannot set properties of {target} (setting '{key}')"
            ))),
            JsValue::Object(o) => {
                let Some(obj) = self.get_object(o.id) else {
                    return Ok(());
                };
                let written = obj.borrow_mut().set_property_value(key, val);
                written.map_err(|InvalidArrayLength| self.create_range_error("Invalid array length"))
            }
            // Writes to primitives are dropped
            _ => Ok(()),
        }
    }

    /// Names an anonymous function or class after the binding it is
    /// assigned to.
    pub(crate) fn set_function_name(&mut self, val: &JsValue, name: &str) {
        if let JsValue::Object(o) = val
            && let Some(obj) = self.get_object(o.id)
        {
            let mut obj = obj.borrow_mut();
            let unnamed = matches!(obj.get_property_value("name"), Some(JsValue::String(ref s)) if s.is_empty());
            if obj.callable.is_some() && unnamed {
                obj.insert_property(
                    "name".to_string(),
                    PropertyDescriptor::data(JsValue::from_str(name), false, false, true),
                );
            }
        }
    }

    /// Spreads an array or string into its elements.
    pub(crate) fn iterate_to_vec(&mut self, val: &JsValue) -> Result<Vec<JsValue>, JsValue> {
        match val {
            JsValue::String(s) => Ok(s
                .to_rust_string()
                .chars()
                .map(|c| JsValue::from_str(c.encode_utf8(&mut [0; 4])))
                .collect()),
            JsValue::Object(o) => {
                let elems = self
                    .get_object(o.id)
                    .and_then(|obj| obj.borrow().array_elements.clone());
                match elems {
                    Some(items) => Ok(items),
                    None => Err(self.create_type_error("object is not iterable")),
                }
            }
            other => Err(self.create_type_error(&format!("{other} is not iterable"))),
        }
    }

    fn to_primitive(&mut self, val: &JsValue, preferred_type: &str) -> Result<JsValue, JsValue> {
        let JsValue::Object(o) = val else {
            return Ok(val.clone());
        };
        let methods = if preferred_type == "string" {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for method_name in methods {
            let method = match self.get_object(o.id) {
                Some(obj) => obj.borrow().get_property(method_name),
                None => JsValue::Undefined,
            };
            if self.is_callable(&method) {
                match self.call_function(&method, val, &[]) {
                    Completion::Normal(v) if !v.is_object() => return Ok(v),
                    Completion::Throw(e) => return Err(e),
                    _ => {}
                }
            }
        }
        Err(self.create_type_error("Cannot convert object to primitive value"))
    }

    pub(crate) fn to_string_value(&mut self, val: &JsValue) -> Result<String, JsValue> {
        let prim = self.to_primitive(val, "string")?;
        Ok(to_js_string(&prim))
    }

    pub(crate) fn to_number_value(&mut self, val: &JsValue) -> Result<f64, JsValue> {
        let prim = self.to_primitive(val, "number")?;
        Ok(to_number(&prim))
    }

    fn binary_op(&mut self, op: BinaryOp, left: &JsValue, right: &JsValue) -> Result<JsValue, JsValue> {
        let num = |n: f64| -> Result<JsValue, JsValue> { Ok(JsValue::Number(n)) };
        match op {
            BinaryOp::Add => {
                let lp = self.to_primitive(left, "default")?;
                let rp = self.to_primitive(right, "default")?;
                if lp.is_string() || rp.is_string() {
                    let mut s = to_js_string(&lp);
                    s.push_str(&to_js_string(&rp));
                    return Ok(JsValue::from_str(&s));
                }
                num(to_number(&lp) + to_number(&rp))
            }
            BinaryOp::StrictEq => Ok(JsValue::Boolean(strict_equality(left, right))),
            BinaryOp::StrictNotEq => Ok(JsValue::Boolean(!strict_equality(left, right))),
            BinaryOp::Eq | BinaryOp::NotEq => {
                let eq = self.abstract_equality(left, right)?;
                Ok(JsValue::Boolean(if op == BinaryOp::Eq { eq } else { !eq }))
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
                let lp = self.to_primitive(left, "number")?;
                let rp = self.to_primitive(right, "number")?;
                let result = match op {
                    BinaryOp::Lt => less_than(&lp, &rp) == Some(true),
                    BinaryOp::Gt => less_than(&rp, &lp) == Some(true),
                    BinaryOp::LtEq => less_than(&rp, &lp) == Some(false),
                    _ => less_than(&lp, &rp) == Some(false),
                };
                Ok(JsValue::Boolean(result))
            }
            BinaryOp::Instanceof => self.instance_of(left, right).map(JsValue::Boolean),
            BinaryOp::In => {
                let JsValue::Object(o) = right else {
                    let key = self.to_property_key(left)?;
                    return Err(self.create_type_error(&format!(
                        "Cannot use 'in' operator to search for '{key}' in {right}"
                    )));
                };
                let key = self.to_property_key(left)?;
                let found = self
                    .get_object(o.id)
                    .is_some_and(|obj| obj.borrow().has_property(&key));
                Ok(JsValue::Boolean(found))
            }
            _ => {
                let ln = self.to_number_value(left)?;
                let rn = self.to_number_value(right)?;
                num(match op {
                    BinaryOp::Sub => ln - rn,
                    BinaryOp::Mul => ln * rn,
                    BinaryOp::Div => ln / rn,
                    BinaryOp::Mod => ln % rn,
                    BinaryOp::Exp => {
                        if rn.is_nan() || (ln.abs() == 1.0 && rn.is_infinite()) {
                            f64::NAN
                        } else {
                            ln.powf(rn)
                        }
                    }
                    BinaryOp::LShift => number_ops::left_shift(ln, rn),
                    BinaryOp::RShift => number_ops::signed_right_shift(ln, rn),
                    BinaryOp::URShift => number_ops::unsigned_right_shift(ln, rn),
                    BinaryOp::BitAnd => number_ops::bitwise_and(ln, rn),
                    BinaryOp::BitOr => number_ops::bitwise_or(ln, rn),
                    BinaryOp::BitXor => number_ops::bitwise_xor(ln, rn),
                    _ => f64::NAN,
                })
            }
        }
    }

    fn abstract_equality(&mut self, left: &JsValue, right: &JsValue) -> Result<bool, JsValue> {
        match (left, right) {
            (JsValue::Object(a), JsValue::Object(b)) => Ok(a.id == b.id),
            (JsValue::Object(_), other) | (other, JsValue::Object(_)) if other.is_nullish() => {
                Ok(false)
            }
            (JsValue::Object(_), _) => {
                let lp = self.to_primitive(left, "default")?;
                Ok(loose_equality(&lp, right))
            }
            (_, JsValue::Object(_)) => {
                let rp = self.to_primitive(right, "default")?;
                Ok(loose_equality(left, &rp))
            }
            _ => Ok(loose_equality(left, right)),
        }
    }

    fn instance_of(&mut self, val: &JsValue, ctor: &JsValue) -> Result<bool, JsValue> {
        if !self.is_callable(ctor) {
            return Err(self.create_type_error("Right-hand side of 'instanceof' is not callable"));
        }
        let JsValue::Object(o) = val else {
            return Ok(false);
        };
        let target = match self.get_member(ctor, "prototype") {
            Completion::Normal(JsValue::Object(p)) => self.get_object(p.id),
            Completion::Throw(e) => return Err(e),
            _ => None,
        };
        let Some(target) = target else {
            return Ok(false);
        };
        let mut current = self.get_object(o.id).and_then(|obj| obj.borrow().prototype.clone());
        while let Some(proto) = current {
            if Rc::ptr_eq(&proto, &target) {
                return Ok(true);
            }
            current = proto.borrow().prototype.clone();
        }
        Ok(false)
    }

    fn resolve_target(&mut self, expr: &Expression, env: &EnvRef) -> Result<Target, JsValue> {
        match expr {
            Expression::Identifier(name) => Ok(Target::Binding(name.clone())),
            Expression::Member(obj, prop) => {
                let obj_val = match self.eval_expr(obj, env) {
                    Completion::Normal(v) => v,
                    Completion::Throw(e) => return Err(e),
                    _ => JsValue::Undefined,
                };
                let key = self.eval_member_key(prop, env)?;
                Ok(Target::Property(obj_val, key))
            }
            _ => Err(self.create_error("SyntaxError", "Invalid left-hand side in assignment")),
        }
    }

    fn read_target(&mut self, target: &Target, env: &EnvRef) -> Completion {
        match target {
            Target::Binding(name) => self.lookup_identifier(name, env),
            Target::Property(obj, key) => self.get_member(obj, key),
        }
    }

    fn write_target(&mut self, target: &Target, val: JsValue, env: &EnvRef) -> Result<(), JsValue> {
        match target {
            Target::Binding(name) => {
                let result = env.borrow_mut().set(name, val);
                result.map_err(|e| self.binding_error(e))
            }
            Target::Property(obj, key) => self.set_member(obj, key, val),
        }
    }

    fn eval_update(&mut self, op: UpdateOp, prefix: bool, arg: &Expression, env: &EnvRef) -> Completion {
        let target = match self.resolve_target(arg, env) {
            Ok(t) => t,
            Err(e) => return Completion::Throw(e),
        };
        let old = match self.read_target(&target, env) {
            Completion::Normal(v) => v,
            other => return other,
        };
        let old_num = match self.to_number_value(&old) {
            Ok(n) => n,
            Err(e) => return Completion::Throw(e),
        };
        let new_num = match op {
            UpdateOp::Increment => old_num + 1.0,
            UpdateOp::Decrement => old_num - 1.0,
        };
        if let Err(e) = self.write_target(&target, JsValue::Number(new_num), env) {
            return Completion::Throw(e);
        }
        Completion::Normal(JsValue::Number(if prefix { new_num } else { old_num }))
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &Expression,
        value: &Expression,
        env: &EnvRef,
    ) -> Completion {
        if op == AssignOp::Assign && matches!(target, Expression::Array(_) | Expression::Object(_)) {
            let pattern = match crate::parser::expr_to_pattern(target.clone()) {
                Ok(p) => p,
                Err(e) => {
                    let err = self.create_error("SyntaxError", &e.message);
                    return Completion::Throw(err);
                }
            };
            let val = match self.eval_expr(value, env) {
                Completion::Normal(v) => v,
                other => return other,
            };
            return match self.bind_pattern(&pattern, val.clone(), BindingKind::Var, env) {
                Ok(()) => Completion::Normal(val),
                Err(e) => Completion::Throw(e),
            };
        }

        let resolved = match self.resolve_target(target, env) {
            Ok(t) => t,
            Err(e) => return Completion::Throw(e),
        };
        let val = match op {
            AssignOp::Assign => match self.eval_expr(value, env) {
                Completion::Normal(v) => v,
                other => return other,
            },
            AssignOp::LogicalAndAssign | AssignOp::LogicalOrAssign | AssignOp::NullishAssign => {
                let current = match self.read_target(&resolved, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                let keep = match op {
                    AssignOp::LogicalAndAssign => !to_boolean(&current),
                    AssignOp::LogicalOrAssign => to_boolean(&current),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Completion::Normal(current);
                }
                match self.eval_expr(value, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                }
            }
            compound => {
                let current = match self.read_target(&resolved, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                let rhs = match self.eval_expr(value, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                let Some(bin) = compound.binary_op() else {
                    return Completion::Normal(JsValue::Undefined);
                };
                match self.binary_op(bin, &current, &rhs) {
                    Ok(v) => v,
                    Err(e) => return Completion::Throw(e),
                }
            }
        };
        if let Target::Binding(name) = &resolved
            && value.is_anonymous_function_definition()
        {
            self.set_function_name(&val, name);
        }
        match self.write_target(&resolved, val.clone(), env) {
            Ok(()) => Completion::Normal(val),
            Err(e) => Completion::Throw(e),
        }
    }

    fn eval_delete(&mut self, operand: &Expression, env: &EnvRef) -> Completion {
        let Expression::Member(obj, prop) = operand else {
            return match self.eval_expr(operand, env) {
                Completion::Normal(_) => Completion::Normal(JsValue::Boolean(true)),
                other => other,
            };
        };
        let obj_val = match self.eval_expr(obj, env) {
            Completion::Normal(v) => v,
            other => return other,
        };
        let key = match self.eval_member_key(prop, env) {
            Ok(k) => k,
            Err(e) => return Completion::Throw(e),
        };
        match &obj_val {
            JsValue::Undefined | JsValue::Null => {
                let err = self.create_type_error(&format!(
                    "Cannot convert undefined or null to object (deleting '{key}')"
                ));
                Completion::Throw(err)
            }
            JsValue::Object(o) => {
                let deleted = match self.get_object(o.id) {
                    Some(obj) => obj.borrow_mut().delete_property(&key),
                    None => true,
                };
                Completion::Normal(JsValue::Boolean(deleted))
            }
            _ => Completion::Normal(JsValue::Boolean(true)),
        }
    }

    fn eval_spread_args(&mut self, args: &[Expression], env: &EnvRef) -> Result<Vec<JsValue>, JsValue> {
        let mut evaluated = Vec::new();
        for arg in args {
            if let Expression::Spread(inner) = arg {
                let val = match self.eval_expr(inner, env) {
                    Completion::Normal(v) => v,
                    Completion::Throw(e) => return Err(e),
                    _ => JsValue::Undefined,
                };
                let items = self.iterate_to_vec(&val)?;
                evaluated.extend(items);
            } else {
                let val = match self.eval_expr(arg, env) {
                    Completion::Normal(v) => v,
                    Completion::Throw(e) => return Err(e),
                    _ => JsValue::Undefined,
                };
                evaluated.push(val);
            }
        }
        Ok(evaluated)
    }

    fn eval_call(&mut self, callee: &Expression, args: &[Expression], env: &EnvRef) -> Completion {
        if let Expression::Super = callee {
            return self.eval_super_call(args, env);
        }
        let (func, this_val) = match callee {
            Expression::Member(obj, prop) => {
                let this_val = if let Expression::Super = **obj {
                    env.borrow().get("this").unwrap_or(JsValue::Undefined)
                } else {
                    match self.eval_expr(obj, env) {
                        Completion::Normal(v) => v,
                        other => return other,
                    }
                };
                let func = if let Expression::Super = **obj {
                    self.eval_super_member(prop, env)
                } else {
                    match self.eval_member_key(prop, env) {
                        Ok(key) => self.get_member(&this_val, &key),
                        Err(e) => Completion::Throw(e),
                    }
                };
                match func {
                    Completion::Normal(f) => (f, this_val),
                    other => return other,
                }
            }
            _ => match self.eval_expr(callee, env) {
                Completion::Normal(f) => (f, JsValue::Undefined),
                other => return other,
            },
        };
        let args = match self.eval_spread_args(args, env) {
            Ok(a) => a,
            Err(e) => return Completion::Throw(e),
        };
        if !self.is_callable(&func) {
            let err = self.create_type_error(&format!("{} is not a function", describe_callee(callee)));
            return Completion::Throw(err);
        }
        if let JsValue::Object(o) = &func
            && let Some(obj) = self.get_object(o.id)
            && obj.borrow().is_class_constructor
        {
            let name = to_js_string(&obj.borrow().get_property("name"));
            let err = self.create_type_error(&format!(
                "Class constructor {name} cannot be invoked without 'new'"
            ));
            return Completion::Throw(err);
        }
        self.call_function(&func, &this_val, &args)
    }

    /// `super(...)` runs the parent constructor on the current `this`, then
    /// initializes the fields of the class whose constructor is running.
    fn eval_super_call(&mut self, args: &[Expression], env: &EnvRef) -> Completion {
        let home = env.borrow().class_home();
        let Some((parent, class)) = home.and_then(|h| Some((h.super_ctor?, h.class))) else {
            let err = self.create_error("SyntaxError", "'super' keyword unexpected here");
            return Completion::Throw(err);
        };
        let args = match self.eval_spread_args(args, env) {
            Ok(a) => a,
            Err(e) => return Completion::Throw(e),
        };
        let this_val = env.borrow().get("this").unwrap_or(JsValue::Undefined);
        let comp = self.call_constructor(&parent, &this_val, &args);
        if comp.is_abrupt() {
            return comp;
        }
        if let Err(e) = self.initialize_fields(&class, &this_val) {
            return Completion::Throw(e);
        }
        Completion::Normal(JsValue::Undefined)
    }

    pub(crate) fn call_function(&mut self, func_val: &JsValue, this_val: &JsValue, args: &[JsValue]) -> Completion {
        if self.call_depth >= self.max_call_depth() {
            let err = self.create_range_error("Maximum call stack size exceeded");
            return Completion::Throw(err);
        }
        self.call_depth += 1;
        let result = self.invoke(func_val, this_val, args);
        self.call_depth -= 1;
        result
    }

    fn invoke(&mut self, func_val: &JsValue, this_val: &JsValue, args: &[JsValue]) -> Completion {
        let callable = match func_val {
            JsValue::Object(o) => self
                .get_object(o.id)
                .and_then(|obj| obj.borrow().callable.clone()),
            _ => None,
        };
        match callable {
            Some(JsFunction::Native(_, _, f)) => f(self, this_val, args),
            Some(JsFunction::User {
                params,
                body,
                closure,
                is_arrow,
                ..
            }) => {
                let func_env = Environment::new(Some(closure));
                for (i, param) in params.iter().enumerate() {
                    let bound = if let Pattern::Rest(inner) = param {
                        let rest = self.create_array(args.get(i..).unwrap_or(&[]).to_vec());
                        self.bind_pattern(inner, rest, BindingKind::Let, &func_env)
                    } else {
                        let val = args.get(i).cloned().unwrap_or(JsValue::Undefined);
                        self.bind_pattern(param, val, BindingKind::Let, &func_env)
                    };
                    if let Err(e) = bound {
                        return Completion::Throw(e);
                    }
                }
                // Arrows see `this` through their closure
                if !is_arrow {
                    let mut e = func_env.borrow_mut();
                    e.declare("this", BindingKind::Const);
                    e.initialize("this", this_val.clone());
                }
                let mut names = Vec::new();
                block_var_declared_names(&body, &mut names);
                self.hoist_var_names(names, &func_env);

                // Clauses see parameters and `this`, not the body's lexicals
                let result = self.exec_guarded(&body.handlers, &func_env, |interp| {
                    let body_env = Environment::new(Some(func_env.clone()));
                    interp.exec_statements(&body.body, &body_env)
                });
                match result {
                    Completion::Return(v) => Completion::Normal(v),
                    Completion::Normal(_) => Completion::Normal(JsValue::Undefined),
                    other => other,
                }
            }
            None => {
                let err = self.create_type_error(&format!("{} is not a function", self.inspect(func_val, 0)));
                Completion::Throw(err)
            }
        }
    }

    fn is_constructor(&self, val: &JsValue) -> bool {
        match val {
            JsValue::Object(o) => self.get_object(o.id).is_some_and(|obj| {
                matches!(
                    obj.borrow().callable,
                    Some(JsFunction::User { is_arrow: false, .. })
                ) || obj.borrow().has_own_property("prototype")
            }),
            _ => false,
        }
    }

    fn eval_new(&mut self, callee: &Expression, args: &[Expression], env: &EnvRef) -> Completion {
        let ctor = match self.eval_expr(callee, env) {
            Completion::Normal(v) => v,
            other => return other,
        };
        let args = match self.eval_spread_args(args, env) {
            Ok(a) => a,
            Err(e) => return Completion::Throw(e),
        };
        if !self.is_constructor(&ctor) {
            let err = self.create_type_error(&format!("{} is not a constructor", describe_callee(callee)));
            return Completion::Throw(err);
        }
        self.construct(&ctor, &args)
    }

    pub(crate) fn construct(&mut self, ctor: &JsValue, args: &[JsValue]) -> Completion {
        let proto = match self.get_member(ctor, "prototype") {
            Completion::Normal(JsValue::Object(p)) => self.get_object(p.id),
            Completion::Throw(e) => return Completion::Throw(e),
            _ => None,
        };
        let proto = proto.or_else(|| self.object_prototype.clone());
        let this_obj = self.create_object_with_proto(proto);
        let this_val = Self::object_value(&this_obj);
        match self.call_constructor(ctor, &this_val, args) {
            Completion::Normal(v) if v.is_object() => Completion::Normal(v),
            Completion::Normal(_) => Completion::Normal(this_val),
            other => other,
        }
    }

    /// Runs a constructor body on an existing `this`. Base classes get their
    /// fields before the body runs; derived classes get them from `super()`.
    fn call_constructor(&mut self, ctor: &JsValue, this_val: &JsValue, args: &[JsValue]) -> Completion {
        let is_base_class = match ctor {
            JsValue::Object(o) => self.get_object(o.id).is_some_and(|obj| {
                let obj = obj.borrow();
                obj.is_class_constructor
                    && !obj
                        .prototype
                        .as_ref()
                        .is_some_and(|p| p.borrow().callable.is_some())
            }),
            _ => false,
        };
        if is_base_class && let Err(e) = self.initialize_fields(ctor, this_val) {
            return Completion::Throw(e);
        }
        self.call_function(ctor, this_val, args)
    }

    fn initialize_fields(&mut self, class_val: &JsValue, this_val: &JsValue) -> Result<(), JsValue> {
        let defs = match class_val {
            JsValue::Object(o) => match self.get_object(o.id) {
                Some(obj) => obj.borrow().class_field_defs.clone(),
                None => Vec::new(),
            },
            _ => Vec::new(),
        };
        for def in defs {
            let field_env = Environment::new(Some(def.env.clone()));
            {
                let mut e = field_env.borrow_mut();
                e.declare("this", BindingKind::Const);
                e.initialize("this", this_val.clone());
            }
            let val = match &def.init {
                Some(init) => match self.eval_expr(init, &field_env) {
                    Completion::Normal(v) => {
                        if init.is_anonymous_function_definition() {
                            self.set_function_name(&v, &def.key);
                        }
                        v
                    }
                    Completion::Throw(e) => return Err(e),
                    _ => JsValue::Undefined,
                },
                None => JsValue::Undefined,
            };
            self.set_member(this_val, &def.key, val)?;
        }
        Ok(())
    }

    /// ClassDefinitionEvaluation: heritage, constructor, methods, fields,
    /// then static fields and static blocks in source order.
    pub(crate) fn eval_class(
        &mut self,
        name: Option<&str>,
        super_class: &Option<Box<Expression>>,
        body: &[ClassElement],
        env: &EnvRef,
    ) -> Completion {
        let class_env = Environment::new(Some(env.clone()));
        if let Some(n) = name {
            class_env.borrow_mut().declare(n, BindingKind::Const);
        }

        let parent = match super_class {
            Some(expr) => {
                let val = match self.eval_expr(expr, &class_env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                if !self.is_constructor(&val) {
                    let err = self.create_type_error(&format!(
                        "Class extends value {} is not a constructor or null",
                        self.inspect(&val, 0)
                    ));
                    return Completion::Throw(err);
                }
                let parent_proto = match self.get_member(&val, "prototype") {
                    Completion::Normal(JsValue::Object(p)) => self.get_object(p.id),
                    Completion::Throw(e) => return Completion::Throw(e),
                    _ => None,
                };
                Some((val, parent_proto))
            }
            None => None,
        };

        // Instance and static members close over different super homes
        let instance_env = Environment::new(Some(class_env.clone()));
        let static_env = Environment::new(Some(class_env.clone()));
        static_env.borrow_mut().declare("this", BindingKind::Const);

        let ctor_expr = body.iter().find_map(|el| match el {
            ClassElement::Method(m) if m.kind == ClassMethodKind::Constructor => Some(m.value.clone()),
            _ => None,
        });
        let ctor_expr = ctor_expr.unwrap_or_else(|| default_constructor(parent.is_some()));
        let ctor_val = self.create_function(JsFunction::User {
            name: Some(name.unwrap_or_default().to_string()),
            params: ctor_expr.params,
            body: ctor_expr.body,
            closure: instance_env.clone(),
            is_arrow: false,
        });
        let Some(ctor_obj) = ctor_val.as_object_id().and_then(|id| self.get_object(id)) else {
            return Completion::Normal(JsValue::Undefined);
        };
        let proto_obj = match ctor_obj.borrow().get_property("prototype") {
            JsValue::Object(p) => self.get_object(p.id),
            _ => None,
        };
        let Some(proto_obj) = proto_obj else {
            return Completion::Normal(JsValue::Undefined);
        };
        ctor_obj.borrow_mut().is_class_constructor = true;

        let (super_ctor, super_proto) = match &parent {
            Some((parent_val, parent_proto)) => {
                if let Some(parent_obj) = parent_val.as_object_id().and_then(|id| self.get_object(id)) {
                    ctor_obj.borrow_mut().prototype = Some(parent_obj);
                }
                proto_obj.borrow_mut().prototype = parent_proto.clone();
                let home = parent_proto
                    .as_ref()
                    .map_or(JsValue::Undefined, Self::object_value);
                (Some(parent_val.clone()), home)
            }
            None => {
                let home = self
                    .object_prototype
                    .as_ref()
                    .map_or(JsValue::Undefined, Self::object_value);
                (None, home)
            }
        };
        let static_home = super_ctor.clone().unwrap_or_else(|| {
            self.function_prototype
                .as_ref()
                .map_or(JsValue::Undefined, Self::object_value)
        });
        instance_env.borrow_mut().home = Some(ClassHome {
            super_home: super_proto,
            class: ctor_val.clone(),
            super_ctor,
        });
        {
            let mut e = static_env.borrow_mut();
            e.home = Some(ClassHome {
                super_home: static_home,
                class: ctor_val.clone(),
                super_ctor: None,
            });
            e.initialize("this", ctor_val.clone());
        }

        let mut statics = Vec::new();
        let mut fields = Vec::new();
        for element in body {
            match element {
                ClassElement::Method(m) if m.kind == ClassMethodKind::Constructor => {}
                ClassElement::Method(m) => {
                    let key = match self.eval_property_key(&m.key, &class_env) {
                        Completion::Normal(k) => property_key_string(&k),
                        other => return other,
                    };
                    let closure = if m.is_static { &static_env } else { &instance_env };
                    let method = self.create_function(JsFunction::User {
                        name: Some(key.clone()),
                        params: m.value.params.clone(),
                        body: m.value.body.clone(),
                        closure: closure.clone(),
                        is_arrow: false,
                    });
                    let holder = if m.is_static { &ctor_obj } else { &proto_obj };
                    holder.borrow_mut().insert_builtin(key, method);
                }
                ClassElement::Property(p) => {
                    let key = match self.eval_property_key(&p.key, &class_env) {
                        Completion::Normal(k) => property_key_string(&k),
                        other => return other,
                    };
                    if p.is_static {
                        statics.push((Some(key), p.value.as_ref(), None));
                    } else {
                        fields.push(ClassFieldDef {
                            key,
                            init: p.value.clone(),
                            env: instance_env.clone(),
                        });
                    }
                }
                ClassElement::StaticBlock(stmts) => statics.push((None, None, Some(stmts))),
            }
        }
        ctor_obj.borrow_mut().class_field_defs = fields;

        if let Some(n) = name {
            class_env.borrow_mut().initialize(n, ctor_val.clone());
        }

        for (key, init, block) in statics {
            if let Some(stmts) = block {
                let block_env = Environment::new(Some(static_env.clone()));
                let mut names = Vec::new();
                var_declared_names(stmts, &mut names);
                self.hoist_var_names(names, &block_env);
                match self.exec_statements(stmts, &block_env) {
                    Completion::Normal(_) => {}
                    other => return other,
                }
                continue;
            }
            let val = match init {
                Some(expr) => match self.eval_expr(expr, &static_env) {
                    Completion::Normal(v) => v,
                    other => return other,
                },
                None => JsValue::Undefined,
            };
            if let Some(key) = key {
                ctor_obj.borrow_mut().insert_value(key, val);
            }
        }
        Completion::Normal(ctor_val)
    }
}

/// `constructor() {}` or, for derived classes, `constructor(...args) { super(...args); }`
fn default_constructor(derived: bool) -> FunctionExpr {
    if !derived {
        return FunctionExpr {
            name: None,
            params: Vec::new(),
            body: BlockNode::default(),
        };
    }
    let args = || Expression::Identifier("args".to_string());
    FunctionExpr {
        name: None,
        params: vec![Pattern::Rest(Box::new(Pattern::Identifier("args".to_string())))],
        body: BlockNode::plain(vec![Statement::Expression(Expression::Call(
            Box::new(Expression::Super),
            vec![Expression::Spread(Box::new(args()))],
        ))]),
    }
}
