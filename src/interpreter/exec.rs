use super::*;

/// What a loop driver does with one body completion.
enum LoopStep {
    Next,
    Exit,
    Abrupt(Completion),
}

fn loop_step(comp: Completion, labels: &[String]) -> LoopStep {
    match comp {
        Completion::Normal(_) | Completion::Continue(None) => LoopStep::Next,
        Completion::Continue(Some(ref l)) if labels.contains(l) => LoopStep::Next,
        Completion::Break(None) => LoopStep::Exit,
        other => LoopStep::Abrupt(other),
    }
}

fn binding_kind(kind: VarKind) -> BindingKind {
    match kind {
        VarKind::Var => BindingKind::Var,
        VarKind::Let => BindingKind::Let,
        VarKind::Const => BindingKind::Const,
    }
}

impl Interpreter {
    pub(crate) fn exec_statements(&mut self, stmts: &[Statement], env: &EnvRef) -> Completion {
        self.declare_lexical(stmts, env);

        let mut result = JsValue::Undefined;
        for stmt in stmts {
            match self.exec_statement(stmt, env) {
                Completion::Normal(val) => result = val,
                other => return other,
            }
        }
        Completion::Normal(result)
    }

    /// Lexical declarations enter their TDZ; function declarations are
    /// created up front.
    fn declare_lexical<'s>(&mut self, stmts: impl IntoIterator<Item = &'s Statement>, env: &EnvRef) {
        for stmt in stmts {
            match stmt {
                Statement::Variable(decl) if decl.kind != VarKind::Var => {
                    let mut names = Vec::new();
                    for d in &decl.declarations {
                        pattern_bound_names(&d.pattern, &mut names);
                    }
                    let mut e = env.borrow_mut();
                    for name in names {
                        e.declare(&name, binding_kind(decl.kind));
                    }
                }
                Statement::ClassDeclaration(cd) => {
                    env.borrow_mut().declare(&cd.name, BindingKind::Let);
                }
                Statement::FunctionDeclaration(f) => {
                    let func = JsFunction::User {
                        name: Some(f.name.clone()),
                        params: f.params.clone(),
                        body: f.body.clone(),
                        closure: env.clone(),
                        is_arrow: false,
                    };
                    let val = self.create_function(func);
                    let mut e = env.borrow_mut();
                    e.declare(&f.name, BindingKind::Var);
                    e.initialize(&f.name, val);
                }
                _ => {}
            }
        }
    }

    /// Declares the `var` names of a function or script body. Names already
    /// bound in `env`, such as parameters, keep their values.
    pub(crate) fn hoist_var_names(&self, names: Vec<String>, env: &EnvRef) {
        let mut e = env.borrow_mut();
        for name in names {
            if !e.bindings.contains_key(&name) {
                e.declare(&name, BindingKind::Var);
            }
        }
    }

    pub(crate) fn exec_statement(&mut self, stmt: &Statement, env: &EnvRef) -> Completion {
        match stmt {
            Statement::Empty => Completion::Normal(JsValue::Undefined),
            Statement::Expression(expr) => self.eval_expr(expr, env),
            Statement::Block(block) | Statement::Try(block) => self.exec_block_node(block, env),
            Statement::Variable(decl) => self.exec_variable_declaration(decl, env),
            Statement::If(if_stmt) => {
                let test = match self.eval_expr(&if_stmt.test, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                if to_boolean(&test) {
                    self.exec_statement(&if_stmt.consequent, env)
                } else if let Some(alt) = &if_stmt.alternate {
                    self.exec_statement(alt, env)
                } else {
                    Completion::Normal(JsValue::Undefined)
                }
            }
            Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_) => self.exec_loop(stmt, &[], env),
            Statement::Return(expr) => {
                let val = if let Some(e) = expr {
                    match self.eval_expr(e, env) {
                        Completion::Normal(v) => v,
                        other => return other,
                    }
                } else {
                    JsValue::Undefined
                };
                Completion::Return(val)
            }
            Statement::Break(label) => Completion::Break(label.clone()),
            Statement::Continue(label) => Completion::Continue(label.clone()),
            Statement::Throw(expr) => {
                let val = match self.eval_expr(expr, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                Completion::Throw(val)
            }
            Statement::Switch(s) => self.exec_switch(s, env),
            Statement::Labeled(..) => self.exec_labeled(stmt, env),
            Statement::FunctionDeclaration(_) => Completion::Normal(JsValue::Undefined), // hoisted
            Statement::ClassDeclaration(cd) => {
                let mut class_val = JsValue::Undefined;
                let comp = self.exec_guarded(&cd.handlers, env, |interp| {
                    match interp.eval_class(Some(&cd.name), &cd.super_class, &cd.body, env) {
                        Completion::Normal(v) => {
                            class_val = v;
                            Completion::Normal(JsValue::Undefined)
                        }
                        other => other,
                    }
                });
                if comp.is_abrupt() {
                    return comp;
                }
                // A handled throw leaves the class binding undefined
                env.borrow_mut().initialize(&cd.name, class_val);
                Completion::Normal(JsValue::Undefined)
            }
        }
    }

    /// Collects a run of labels so the loop underneath can honour
    /// `continue label`.
    fn exec_labeled(&mut self, stmt: &Statement, env: &EnvRef) -> Completion {
        let mut labels = Vec::new();
        let mut inner = stmt;
        while let Statement::Labeled(label, body) = inner {
            labels.push(label.clone());
            inner = body;
        }
        let comp = match inner {
            Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_) => self.exec_loop(inner, &labels, env),
            other => self.exec_statement(other, env),
        };
        match comp {
            Completion::Break(Some(ref l)) if labels.contains(l) => {
                Completion::Normal(JsValue::Undefined)
            }
            other => other,
        }
    }

    fn exec_loop(&mut self, stmt: &Statement, labels: &[String], env: &EnvRef) -> Completion {
        match stmt {
            Statement::While(w) => self.exec_while(w, labels, env),
            Statement::DoWhile(dw) => self.exec_do_while(dw, labels, env),
            Statement::For(f) => self.exec_for(f, labels, env),
            Statement::ForIn(fi) => self.exec_for_in(fi, labels, env),
            Statement::ForOf(fo) => self.exec_for_of(fo, labels, env),
            other => self.exec_statement(other, env),
        }
    }

    fn exec_variable_declaration(
        &mut self,
        decl: &VariableDeclaration,
        env: &EnvRef,
    ) -> Completion {
        let kind = binding_kind(decl.kind);
        for d in &decl.declarations {
            if d.init.is_none() && decl.kind == VarKind::Var {
                continue; // already hoisted
            }
            let val = if let Some(init) = &d.init {
                match self.eval_expr(init, env) {
                    Completion::Normal(v) => v,
                    other => return other,
                }
            } else {
                JsValue::Undefined
            };
            if let Pattern::Identifier(ref name) = d.pattern
                && d.init.as_ref().is_some_and(|e| e.is_anonymous_function_definition())
            {
                self.set_function_name(&val, name);
            }
            if let Err(e) = self.bind_pattern(&d.pattern, val, kind, env) {
                return Completion::Throw(e);
            }
        }
        Completion::Normal(JsValue::Undefined)
    }

    /// Binds `name` in `env`. `Var` assigns through the scope chain to the
    /// hoisted binding; lexical kinds declare and initialize in `env`.
    fn bind_name(
        &mut self,
        name: &str,
        val: JsValue,
        kind: BindingKind,
        env: &EnvRef,
    ) -> Result<(), JsValue> {
        match kind {
            BindingKind::Var => {
                let result = env.borrow_mut().set(name, val);
                result.map_err(|e| self.binding_error(e))
            }
            BindingKind::Let | BindingKind::Const => {
                let mut e = env.borrow_mut();
                e.declare(name, kind);
                e.initialize(name, val);
                Ok(())
            }
        }
    }

    pub(crate) fn binding_error(&mut self, err: BindingError) -> JsValue {
        match err {
            BindingError::ConstAssignment => {
                self.create_type_error("Assignment to constant variable.")
            }
            BindingError::Uninitialized(name) => self.create_reference_error(&format!(
                "Cannot access '{name}' before initialization"
            )),
        }
    }

    pub(crate) fn bind_pattern(
        &mut self,
        pat: &Pattern,
        val: JsValue,
        kind: BindingKind,
        env: &EnvRef,
    ) -> Result<(), JsValue> {
        match pat {
            Pattern::Identifier(name) => self.bind_name(name, val, kind, env),
            Pattern::Assign(inner, default) => {
                let v = if val.is_undefined() {
                    match self.eval_expr(default, env) {
                        Completion::Normal(v) => v,
                        Completion::Throw(e) => return Err(e),
                        _ => JsValue::Undefined,
                    }
                } else {
                    val
                };
                if let Pattern::Identifier(ref name) = **inner
                    && default.is_anonymous_function_definition()
                {
                    self.set_function_name(&v, name);
                }
                self.bind_pattern(inner, v, kind, env)
            }
            Pattern::Array(elements) => {
                let mut items = self.iterate_to_vec(&val)?.into_iter();
                for elem in elements {
                    match elem {
                        Some(ArrayPatternElement::Pattern(p)) => {
                            let item = items.next().unwrap_or(JsValue::Undefined);
                            self.bind_pattern(p, item, kind, env)?;
                        }
                        Some(ArrayPatternElement::Rest(p)) => {
                            let rest = self.create_array(items.by_ref().collect());
                            self.bind_pattern(p, rest, kind, env)?;
                            break;
                        }
                        None => {
                            items.next();
                        }
                    }
                }
                Ok(())
            }
            Pattern::Object(props) => {
                if val.is_nullish() {
                    return Err(self.create_type_error(&format!(
                        "Cannot destructure '{val}' as it is {val}."
                    )));
                }
                let mut excluded_keys = Vec::new();
                for prop in props {
                    match prop {
                        ObjectPatternProperty::Shorthand(name) => {
                            excluded_keys.push(name.clone());
                            let v = match self.get_member(&val, name) {
                                Completion::Normal(v) => v,
                                Completion::Throw(e) => return Err(e),
                                _ => JsValue::Undefined,
                            };
                            self.bind_name(name, v, kind, env)?;
                        }
                        ObjectPatternProperty::KeyValue(key, pat) => {
                            let key_str = match self.eval_property_key(key, env) {
                                Completion::Normal(k) => property_key_string(&k),
                                Completion::Throw(e) => return Err(e),
                                _ => String::new(),
                            };
                            let v = match self.get_member(&val, &key_str) {
                                Completion::Normal(v) => v,
                                Completion::Throw(e) => return Err(e),
                                _ => JsValue::Undefined,
                            };
                            excluded_keys.push(key_str);
                            self.bind_pattern(pat, v, kind, env)?;
                        }
                        ObjectPatternProperty::Rest(pat) => {
                            let rest_obj = self.create_object();
                            if let JsValue::Object(o) = &val
                                && let Some(src) = self.get_object(o.id)
                            {
                                let src = src.borrow();
                                for key in src.own_enumerable_keys() {
                                    if !excluded_keys.contains(&key) {
                                        let v = src.get_property(&key);
                                        rest_obj.borrow_mut().insert_value(key, v);
                                    }
                                }
                            }
                            let rest_val = Self::object_value(&rest_obj);
                            self.bind_pattern(pat, rest_val, kind, env)?;
                        }
                    }
                }
                Ok(())
            }
            Pattern::Rest(inner) => self.bind_pattern(inner, val, kind, env),
        }
    }

    fn exec_while(&mut self, w: &WhileStatement, labels: &[String], env: &EnvRef) -> Completion {
        loop {
            let test = match self.eval_expr(&w.test, env) {
                Completion::Normal(v) => v,
                other => return other,
            };
            if !to_boolean(&test) {
                break;
            }
            match loop_step(self.exec_statement(&w.body, env), labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Abrupt(c) => return c,
            }
        }
        Completion::Normal(JsValue::Undefined)
    }

    fn exec_do_while(
        &mut self,
        dw: &DoWhileStatement,
        labels: &[String],
        env: &EnvRef,
    ) -> Completion {
        loop {
            match loop_step(self.exec_statement(&dw.body, env), labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Abrupt(c) => return c,
            }
            let test = match self.eval_expr(&dw.test, env) {
                Completion::Normal(v) => v,
                other => return other,
            };
            if !to_boolean(&test) {
                break;
            }
        }
        Completion::Normal(JsValue::Undefined)
    }

    fn exec_for(&mut self, f: &ForStatement, labels: &[String], env: &EnvRef) -> Completion {
        let mut iter_env = Environment::new(Some(env.clone()));
        let mut per_iteration = false;
        if let Some(init) = &f.init {
            let comp = match init {
                ForInit::Variable(decl) => {
                    per_iteration = decl.kind != VarKind::Var;
                    if per_iteration {
                        let mut names = Vec::new();
                        for d in &decl.declarations {
                            pattern_bound_names(&d.pattern, &mut names);
                        }
                        for name in names {
                            iter_env.borrow_mut().declare(&name, binding_kind(decl.kind));
                        }
                    }
                    self.exec_variable_declaration(decl, &iter_env)
                }
                ForInit::Expression(expr) => self.eval_expr(expr, &iter_env),
            };
            if comp.is_abrupt() {
                return comp;
            }
        }
        loop {
            if let Some(test) = &f.test {
                let val = match self.eval_expr(test, &iter_env) {
                    Completion::Normal(v) => v,
                    other => return other,
                };
                if !to_boolean(&val) {
                    break;
                }
            }
            match loop_step(self.exec_statement(&f.body, &iter_env), labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Abrupt(c) => return c,
            }
            if per_iteration {
                let next = iter_env.borrow().copy_for_iteration();
                iter_env = next;
            }
            if let Some(update) = &f.update {
                let comp = self.eval_expr(update, &iter_env);
                if comp.is_abrupt() {
                    return comp;
                }
            }
        }
        Completion::Normal(JsValue::Undefined)
    }

    /// Binds the per-iteration value of a for-in/of head.
    fn bind_for_head(
        &mut self,
        left: &ForInOfLeft,
        val: JsValue,
        env: &EnvRef,
        iter_env: &EnvRef,
    ) -> Result<(), JsValue> {
        match left {
            ForInOfLeft::Variable(decl) => match decl.declarations.first() {
                Some(d) => self.bind_pattern(&d.pattern, val, binding_kind(decl.kind), iter_env),
                None => Ok(()),
            },
            ForInOfLeft::Pattern(Pattern::Identifier(name)) => {
                let result = env.borrow_mut().set(name, val);
                result.map_err(|e| self.binding_error(e))
            }
            ForInOfLeft::Pattern(pat) => self.bind_pattern(pat, val, BindingKind::Let, iter_env),
        }
    }

    fn exec_for_in(&mut self, fi: &ForInStatement, labels: &[String], env: &EnvRef) -> Completion {
        let obj_val = match self.eval_expr(&fi.right, env) {
            Completion::Normal(v) => v,
            other => return other,
        };
        let keys = match &obj_val {
            JsValue::Object(o) => match self.get_object(o.id) {
                Some(obj) => obj.borrow().enumerable_keys_with_proto(),
                None => Vec::new(),
            },
            JsValue::String(s) => (0..s.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        };
        for key in keys {
            let iter_env = Environment::new(Some(env.clone()));
            if let Err(e) = self.bind_for_head(&fi.left, JsValue::from_str(&key), env, &iter_env) {
                return Completion::Throw(e);
            }
            match loop_step(self.exec_statement(&fi.body, &iter_env), labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Abrupt(c) => return c,
            }
        }
        Completion::Normal(JsValue::Undefined)
    }

    fn exec_for_of(&mut self, fo: &ForOfStatement, labels: &[String], env: &EnvRef) -> Completion {
        let iterable = match self.eval_expr(&fo.right, env) {
            Completion::Normal(v) => v,
            other => return other,
        };
        // Arrays are read live so the body may append to them
        let array = match &iterable {
            JsValue::Object(o) => self
                .get_object(o.id)
                .filter(|obj| obj.borrow().array_elements.is_some()),
            _ => None,
        };
        let snapshot = match array {
            Some(_) => Vec::new(),
            None => match self.iterate_to_vec(&iterable) {
                Ok(items) => items,
                Err(e) => return Completion::Throw(e),
            },
        };
        let mut index = 0;
        loop {
            let val = match &array {
                Some(arr) => {
                    let item = arr
                        .borrow()
                        .array_elements
                        .as_ref()
                        .and_then(|elems| elems.get(index).cloned());
                    match item {
                        Some(v) => v,
                        None => break,
                    }
                }
                None => match snapshot.get(index) {
                    Some(v) => v.clone(),
                    None => break,
                },
            };
            index += 1;
            let iter_env = Environment::new(Some(env.clone()));
            if let Err(e) = self.bind_for_head(&fo.left, val, env, &iter_env) {
                return Completion::Throw(e);
            }
            match loop_step(self.exec_statement(&fo.body, &iter_env), labels) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Abrupt(c) => return c,
            }
        }
        Completion::Normal(JsValue::Undefined)
    }

    fn exec_switch(&mut self, s: &SwitchStatement, env: &EnvRef) -> Completion {
        let disc = match self.eval_expr(&s.discriminant, env) {
            Completion::Normal(v) => v,
            other => return other,
        };
        let comp = self.exec_guarded(&s.handlers, env, |interp| {
            interp.exec_switch_cases(&s.cases, &disc, env)
        });
        match comp {
            Completion::Break(None) => Completion::Normal(JsValue::Undefined),
            other => other,
        }
    }

    /// Case selection and fall-through. `break` is returned to the caller.
    fn exec_switch_cases(&mut self, cases: &[SwitchCase], disc: &JsValue, env: &EnvRef) -> Completion {
        let switch_env = Environment::new(Some(env.clone()));
        // Declarations from every case share the switch scope
        self.declare_lexical(cases.iter().flat_map(|c| &c.consequent), &switch_env);
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            let Some(test) = &case.test else {
                continue;
            };
            let test = match self.eval_expr(test, &switch_env) {
                Completion::Normal(v) => v,
                other => return other,
            };
            if strict_equality(disc, &test) {
                start = Some(i);
                break;
            }
        }
        let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Completion::Normal(JsValue::Undefined),
        };
        for case in &cases[start..] {
            for stmt in &case.consequent {
                match self.exec_statement(stmt, &switch_env) {
                    Completion::Normal(_) => {}
                    other => return other,
                }
            }
        }
        Completion::Normal(JsValue::Undefined)
    }
}
