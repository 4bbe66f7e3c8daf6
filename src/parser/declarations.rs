use super::*;

impl<'a> Parser<'a> {
    pub(super) fn parse_variable_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // var
        let declarations = self.parse_variable_declaration_list(VarKind::Var, true)?;
        self.eat_semicolon()?;
        Ok(Statement::Variable(VariableDeclaration {
            kind: VarKind::Var,
            declarations,
        }))
    }

    pub(super) fn parse_lexical_declaration(&mut self) -> Result<Statement, ParseError> {
        let kind = match self.advance()? {
            Token::Keyword(Keyword::Let) => VarKind::Let,
            Token::Keyword(Keyword::Const) => VarKind::Const,
            other => return Err(self.error(format!("Expected let or const, got {other:?}"))),
        };
        let declarations = self.parse_variable_declaration_list(kind, true)?;
        let mut names = Vec::new();
        for d in &declarations {
            pattern_bound_names(&d.pattern, &mut names);
        }
        self.check_duplicate_names(&names)?;
        self.eat_semicolon()?;
        Ok(Statement::Variable(VariableDeclaration {
            kind,
            declarations,
        }))
    }

    /// `check_init` enforces initializers for `const` and destructuring;
    /// for-in/of heads check their own form.
    pub(super) fn parse_variable_declaration_list(
        &mut self,
        kind: VarKind,
        check_init: bool,
    ) -> Result<Vec<VariableDeclarator>, ParseError> {
        let mut decls = Vec::new();
        loop {
            let pattern = self.parse_binding_pattern()?;
            let init = if self.current == Token::Assign {
                self.advance()?;
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            if check_init && init.is_none() {
                if kind == VarKind::Const {
                    return Err(self.error("Missing initializer in const declaration"));
                }
                if !matches!(pattern, Pattern::Identifier(_)) {
                    return Err(self.error("Missing initializer in destructuring declaration"));
                }
            }
            decls.push(VariableDeclarator { pattern, init });
            if self.current == Token::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(decls)
    }

    pub(super) fn parse_binding_pattern(&mut self) -> Result<Pattern, ParseError> {
        if let Some(name) = self.current_identifier_name() {
            self.advance()?;
            return Ok(Pattern::Identifier(name));
        }
        match &self.current {
            Token::LeftBracket => self.parse_array_pattern(),
            Token::LeftBrace => self.parse_object_pattern(),
            _ => Err(self.error(format!("Expected binding pattern, got {:?}", self.current))),
        }
    }

    /// A binding pattern optionally followed by `= default`.
    fn parse_binding_element(&mut self) -> Result<Pattern, ParseError> {
        let pat = self.parse_binding_pattern()?;
        if self.current == Token::Assign {
            self.advance()?;
            let default = self.with_in(|p| p.parse_assignment_expression())?;
            return Ok(Pattern::Assign(Box::new(pat), Box::new(default)));
        }
        Ok(pat)
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.eat(&Token::LeftBracket)?;
        let mut elements = Vec::new();
        while self.current != Token::RightBracket {
            if self.current == Token::Comma {
                elements.push(None);
                self.advance()?;
                continue;
            }
            if self.current == Token::Ellipsis {
                self.advance()?;
                let rest = self.parse_binding_pattern()?;
                elements.push(Some(ArrayPatternElement::Rest(rest)));
                break;
            }
            let pat = self.parse_binding_element()?;
            elements.push(Some(ArrayPatternElement::Pattern(pat)));
            if self.current != Token::RightBracket {
                self.eat(&Token::Comma)?;
            }
        }
        self.eat(&Token::RightBracket)?;
        Ok(Pattern::Array(elements))
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, ParseError> {
        self.eat(&Token::LeftBrace)?;
        let mut props = Vec::new();
        while self.current != Token::RightBrace {
            if self.current == Token::Ellipsis {
                self.advance()?;
                let rest = self.parse_binding_pattern()?;
                props.push(ObjectPatternProperty::Rest(rest));
                break;
            }
            let key = self.parse_property_name()?;
            if self.current == Token::Colon {
                self.advance()?;
                let pat = self.parse_binding_element()?;
                props.push(ObjectPatternProperty::KeyValue(key, pat));
            } else {
                // Shorthand: { x } or { x = default }
                let name = match &key {
                    PropertyKey::Identifier(n) if Keyword::from_str(n).is_none() => n.clone(),
                    _ => return Err(self.error("Expected identifier for shorthand pattern")),
                };
                if self.current == Token::Assign {
                    self.advance()?;
                    let default = self.with_in(|p| p.parse_assignment_expression())?;
                    let pat =
                        Pattern::Assign(Box::new(Pattern::Identifier(name)), Box::new(default));
                    props.push(ObjectPatternProperty::KeyValue(key, pat));
                } else {
                    props.push(ObjectPatternProperty::Shorthand(name));
                }
            }
            if self.current != Token::RightBrace {
                self.eat(&Token::Comma)?;
            }
        }
        self.eat(&Token::RightBrace)?;
        Ok(Pattern::Object(props))
    }

    /// Literal or computed key in object literals, patterns and classes.
    pub(super) fn parse_property_name(&mut self) -> Result<PropertyKey, ParseError> {
        if let Some(name) = self.current_property_name() {
            self.advance()?;
            return Ok(PropertyKey::Identifier(name));
        }
        match &self.current {
            Token::StringLiteral(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(PropertyKey::String(s))
            }
            Token::NumericLiteral(n) => {
                let n = *n;
                self.advance()?;
                Ok(PropertyKey::Number(n))
            }
            Token::LeftBracket => {
                self.advance()?;
                let expr = self.with_in(|p| p.parse_assignment_expression())?;
                self.eat(&Token::RightBracket)?;
                Ok(PropertyKey::Computed(Box::new(expr)))
            }
            other => Err(self.error(format!("Unexpected token {other:?} as property name"))),
        }
    }

    pub(super) fn parse_function_declaration(&mut self) -> Result<Statement, ParseError> {
        self.eat(&Token::Keyword(Keyword::Function))?;
        let name = match self.current_identifier_name() {
            Some(n) => {
                self.advance()?;
                n
            }
            None => return Err(self.error("Expected function name")),
        };
        let (params, body) = self.parse_function_rest(false, false)?;
        Ok(Statement::FunctionDeclaration(FunctionDecl { name, params, body }))
    }

    /// Parameters and body of a function, method or constructor. The body
    /// may carry its own catch/finally clauses, which run inside the call.
    pub(super) fn parse_function_rest(
        &mut self,
        is_method: bool,
        is_constructor: bool,
    ) -> Result<(Vec<Pattern>, BlockNode), ParseError> {
        let saved = self.enter_function_body(is_method, is_constructor);
        let result = self.with_in(|p| p.parse_params_and_body());
        self.leave_function_body(saved);
        result
    }

    fn parse_params_and_body(&mut self) -> Result<(Vec<Pattern>, BlockNode), ParseError> {
        let params = self.parse_formal_parameters()?;
        let body = self.parse_braced_statements()?;
        self.check_params_against_body(&params, &body)?;
        let handlers = self.parse_handlers()?;
        Ok((params, BlockNode { body, handlers }))
    }

    pub(super) fn parse_formal_parameters(&mut self) -> Result<Vec<Pattern>, ParseError> {
        self.eat(&Token::LeftParen)?;
        let mut params = Vec::new();
        while self.current != Token::RightParen {
            if self.current == Token::Ellipsis {
                self.advance()?;
                let rest = self.parse_binding_pattern()?;
                params.push(Pattern::Rest(Box::new(rest)));
                if self.current != Token::RightParen {
                    return Err(self.error("Rest parameter must be last formal parameter"));
                }
                break;
            }
            params.push(self.parse_binding_element()?);
            if self.current != Token::RightParen {
                self.eat(&Token::Comma)?;
            }
        }
        self.eat(&Token::RightParen)?;
        Ok(params)
    }

    /// Parameter names may not be redeclared lexically in the body.
    pub(super) fn check_params_against_body(
        &self,
        params: &[Pattern],
        body: &[Statement],
    ) -> Result<(), ParseError> {
        let mut param_names = Vec::new();
        for p in params {
            pattern_bound_names(p, &mut param_names);
        }
        if params.iter().any(|p| !matches!(p, Pattern::Identifier(_))) {
            self.check_duplicate_names(&param_names)?;
        }
        let mut lexical = Vec::new();
        lexically_declared_names(body, &mut lexical);
        for stmt in body {
            // Function declarations may shadow parameters
            if let Statement::FunctionDeclaration(f) = stmt {
                lexical.retain(|n| *n != f.name);
            }
        }
        if let Some(name) = param_names.iter().find(|n| lexical.contains(n)) {
            return Err(self.error(format!("Identifier '{name}' has already been declared")));
        }
        Ok(())
    }

    pub(super) fn parse_class_declaration(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // class
        let name = match self.current_identifier_name() {
            Some(n) => {
                self.advance()?;
                n
            }
            None => return Err(self.error("Expected class name")),
        };
        let (super_class, body, handlers) = self.parse_class_tail()?;
        Ok(Statement::ClassDeclaration(ClassDecl {
            name,
            super_class,
            body,
            handlers,
        }))
    }

    /// `[extends Expr] { elements }` plus trailing clauses.
    pub(super) fn parse_class_tail(
        &mut self,
    ) -> Result<(Option<Box<Expression>>, Vec<ClassElement>, Handlers), ParseError> {
        let super_class = if self.current == Token::Keyword(Keyword::Extends) {
            self.advance()?;
            Some(Box::new(self.parse_left_hand_side_expression()?))
        } else {
            None
        };
        let body = self.parse_class_body(super_class.is_some())?;
        let handlers = self.parse_handlers()?;
        Ok((super_class, body, handlers))
    }

    fn parse_class_body(&mut self, has_heritage: bool) -> Result<Vec<ClassElement>, ParseError> {
        self.eat(&Token::LeftBrace)?;
        let mut elements = Vec::new();
        let mut has_constructor = false;
        while self.current != Token::RightBrace {
            if self.current == Token::Semicolon {
                self.advance()?;
                continue;
            }
            let element = self.parse_class_element(has_heritage)?;
            match &element {
                ClassElement::Method(m) if m.kind == ClassMethodKind::Constructor => {
                    if has_constructor {
                        return Err(self.error("A class may only have one constructor"));
                    }
                    has_constructor = true;
                }
                ClassElement::Property(p) if !p.is_static && key_is(&p.key, "constructor") => {
                    return Err(self.error("Classes may not have a field named 'constructor'"));
                }
                _ => {}
            }
            elements.push(element);
        }
        self.eat(&Token::RightBrace)?;
        Ok(elements)
    }

    fn parse_class_element(&mut self, has_heritage: bool) -> Result<ClassElement, ParseError> {
        let mut is_static = false;
        if self.current == Token::Keyword(Keyword::Static) {
            self.advance()?;
            // `static` followed by `(`, `=`, `;` or `}` names a member called "static"
            if matches!(
                self.current,
                Token::LeftParen | Token::Assign | Token::Semicolon | Token::RightBrace
            ) {
                self.push_back(Token::Keyword(Keyword::Static), self.prev_line_terminator);
            } else {
                is_static = true;
            }
            if is_static && self.current == Token::LeftBrace {
                return Ok(ClassElement::StaticBlock(self.parse_static_block()?));
            }
        }

        let key = self.parse_property_name()?;
        if self.current == Token::LeftParen {
            let is_constructor = !is_static && key_is(&key, "constructor");
            let (params, body) =
                self.parse_function_rest(true, is_constructor && has_heritage)?;
            let name = match &key {
                PropertyKey::Identifier(n) | PropertyKey::String(n) => Some(n.clone()),
                _ => None,
            };
            return Ok(ClassElement::Method(ClassMethod {
                key,
                kind: if is_constructor {
                    ClassMethodKind::Constructor
                } else {
                    ClassMethodKind::Method
                },
                value: FunctionExpr { name, params, body },
                is_static,
            }));
        }

        // Field: the initializer sees `this` like a method body does
        let value = if self.current == Token::Assign {
            self.advance()?;
            let saved = self.enter_function_body(true, false);
            let value = self.with_in(|p| p.parse_assignment_expression());
            self.leave_function_body(saved);
            Some(value?)
        } else {
            None
        };
        self.eat_semicolon()?;
        Ok(ClassElement::Property(ClassProperty {
            key,
            value,
            is_static,
        }))
    }

    fn parse_static_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        let saved = self.enter_function_body(true, false);
        let saved_in_function = std::mem::replace(&mut self.in_function, 0);
        let body = self.parse_braced_statements();
        self.in_function = saved_in_function;
        self.leave_function_body(saved);
        body
    }
}

fn key_is(key: &PropertyKey, name: &str) -> bool {
    matches!(key, PropertyKey::Identifier(n) | PropertyKey::String(n) if n == name)
}
