use super::*;

impl<'a> Parser<'a> {
    pub(super) fn parse_statement_or_declaration(&mut self) -> Result<Statement, ParseError> {
        match &self.current {
            Token::Keyword(Keyword::Function) => self.parse_function_declaration(),
            Token::Keyword(Keyword::Class) => self.parse_class_declaration(),
            Token::Keyword(Keyword::Let) | Token::Keyword(Keyword::Const) => {
                self.parse_lexical_declaration()
            }
            _ => self.parse_statement(),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.current {
            Token::Keyword(Keyword::Let) | Token::Keyword(Keyword::Const) => Err(
                self.error("Lexical declaration cannot appear in a single-statement context")
            ),
            Token::Keyword(Keyword::Class) => {
                Err(self.error("Class declaration cannot appear in a single-statement context"))
            }
            Token::LeftBrace => Ok(Statement::Block(self.parse_block_node()?)),
            Token::Semicolon => {
                self.advance()?;
                Ok(Statement::Empty)
            }
            Token::Keyword(Keyword::Var) => self.parse_variable_statement(),
            Token::Keyword(Keyword::If) => self.parse_if_statement(),
            Token::Keyword(Keyword::While) => self.parse_while_statement(),
            Token::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            Token::Keyword(Keyword::For) => self.parse_for_statement(),
            Token::Keyword(Keyword::Return) => self.parse_return_statement(),
            Token::Keyword(Keyword::Break) => self.parse_break_statement(),
            Token::Keyword(Keyword::Continue) => self.parse_continue_statement(),
            Token::Keyword(Keyword::Throw) => self.parse_throw_statement(),
            Token::Keyword(Keyword::Try) => self.parse_try_statement(),
            Token::Keyword(Keyword::Switch) => self.parse_switch_statement(),
            Token::Keyword(Keyword::Catch) => {
                Err(self.error("Unexpected 'catch': no block to attach it to"))
            }
            Token::Keyword(Keyword::Finally) => {
                Err(self.error("Unexpected 'finally': no block to attach it to"))
            }
            _ => self.parse_expression_statement_or_labeled(),
        }
    }

    fn parse_expression_statement_or_labeled(&mut self) -> Result<Statement, ParseError> {
        if let Some(name) = self.current_identifier_name() {
            let orig_token = self.current.clone();
            let ident_lt = self.prev_line_terminator;
            self.advance()?;
            if self.current == Token::Colon {
                self.advance()?;
                if self.labels.iter().any(|(l, _)| *l == name) {
                    return Err(self.error(format!("Label '{name}' has already been declared")));
                }
                let is_iteration = matches!(
                    self.current,
                    Token::Keyword(Keyword::For)
                        | Token::Keyword(Keyword::While)
                        | Token::Keyword(Keyword::Do)
                );
                self.labels.push((name.clone(), is_iteration));
                let stmt = self.parse_statement();
                self.labels.pop();
                return Ok(Statement::Labeled(name, Box::new(stmt?)));
            }
            // Not a label: restore the identifier and reparse as an expression
            let after_tok = std::mem::replace(&mut self.current, orig_token);
            let after_lt = std::mem::replace(&mut self.prev_line_terminator, ident_lt);
            self.pushback = Some((after_tok, after_lt));
        }
        self.parse_expression_statement()
    }

    /// `{ ... }` plus any trailing `catch`/`finally` clauses.
    pub(super) fn parse_block_node(&mut self) -> Result<BlockNode, ParseError> {
        let body = self.parse_braced_statements()?;
        let handlers = self.parse_handlers()?;
        Ok(BlockNode { body, handlers })
    }

    /// `{ ... }` with no clause list of its own.
    pub(super) fn parse_braced_statements(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.eat(&Token::LeftBrace)?;
        let mut stmts = Vec::new();
        while self.current != Token::RightBrace && self.current != Token::Eof {
            stmts.push(self.parse_statement_or_declaration()?);
        }
        self.eat(&Token::RightBrace)?;
        self.check_block_scope(&stmts)?;
        Ok(stmts)
    }

    /// Rejects duplicate lexical names in one scope and `var` names that
    /// collide with them. Sibling function declarations may repeat.
    pub(super) fn check_block_scope(&self, stmts: &[Statement]) -> Result<(), ParseError> {
        let mut lexical: Vec<(String, bool)> = Vec::new();
        for stmt in stmts {
            let is_function = matches!(stmt, Statement::FunctionDeclaration(_));
            let mut names = Vec::new();
            lexically_declared_names(std::slice::from_ref(stmt), &mut names);
            for name in names {
                if lexical
                    .iter()
                    .any(|(n, f)| *n == name && !(is_function && *f))
                {
                    return Err(self.error(format!("Identifier '{name}' has already been declared")));
                }
                lexical.push((name, is_function));
            }
        }
        let mut vars = Vec::new();
        var_declared_names(stmts, &mut vars);
        for name in vars {
            if lexical.iter().any(|(n, _)| *n == name) {
                return Err(self.error(format!("Identifier '{name}' has already been declared")));
            }
        }
        Ok(())
    }

    fn parse_if_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // if
        self.eat(&Token::LeftParen)?;
        let test = self.parse_expression()?;
        self.eat(&Token::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.current == Token::Keyword(Keyword::Else) {
            self.advance()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_iteration_body(&mut self) -> Result<Box<Statement>, ParseError> {
        self.in_iteration += 1;
        let body = self.parse_statement();
        self.in_iteration -= 1;
        Ok(Box::new(body?))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // while
        self.eat(&Token::LeftParen)?;
        let test = self.parse_expression()?;
        self.eat(&Token::RightParen)?;
        let body = self.parse_iteration_body()?;
        Ok(Statement::While(WhileStatement { test, body }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // do
        let body = self.parse_iteration_body()?;
        self.eat(&Token::Keyword(Keyword::While))?;
        self.eat(&Token::LeftParen)?;
        let test = self.parse_expression()?;
        self.eat(&Token::RightParen)?;
        // A semicolon after do-while is always optional
        if self.current == Token::Semicolon {
            self.advance()?;
        }
        Ok(Statement::DoWhile(DoWhileStatement { test, body }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // for
        self.eat(&Token::LeftParen)?;

        let init = match &self.current {
            Token::Semicolon => None,
            Token::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => {
                let kind = match self.advance()? {
                    Token::Keyword(Keyword::Var) => VarKind::Var,
                    Token::Keyword(Keyword::Let) => VarKind::Let,
                    _ => VarKind::Const,
                };
                let saved_no_in = std::mem::replace(&mut self.no_in, true);
                let declarations = self.parse_variable_declaration_list(kind, false);
                self.no_in = saved_no_in;
                let decl = VariableDeclaration {
                    kind,
                    declarations: declarations?,
                };
                if self.current == Token::Keyword(Keyword::In) || self.is_contextual("of") {
                    if decl.declarations.len() != 1 || decl.declarations[0].init.is_some() {
                        return Err(self.error(
                            "for-in/of loop variable declaration may not have an initializer",
                        ));
                    }
                    return self.parse_for_in_of_rest(ForInOfLeft::Variable(decl));
                }
                if decl.kind == VarKind::Const
                    && decl.declarations.iter().any(|d| d.init.is_none())
                {
                    return Err(self.error("Missing initializer in const declaration"));
                }
                Some(ForInit::Variable(decl))
            }
            _ => {
                let saved_no_in = std::mem::replace(&mut self.no_in, true);
                let expr = self.parse_expression();
                self.no_in = saved_no_in;
                let expr = expr?;
                if self.current == Token::Keyword(Keyword::In) || self.is_contextual("of") {
                    let pattern = expr_to_pattern(expr)?;
                    return self.parse_for_in_of_rest(ForInOfLeft::Pattern(pattern));
                }
                Some(ForInit::Expression(expr))
            }
        };

        self.eat(&Token::Semicolon)?;
        let test = if self.current == Token::Semicolon {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.eat(&Token::Semicolon)?;
        let update = if self.current == Token::RightParen {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.eat(&Token::RightParen)?;
        let body = self.parse_iteration_body()?;
        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
        }))
    }

    fn parse_for_in_of_rest(&mut self, left: ForInOfLeft) -> Result<Statement, ParseError> {
        let is_of = self.current != Token::Keyword(Keyword::In);
        self.advance()?; // in / of
        let right = if is_of {
            self.parse_assignment_expression()?
        } else {
            self.parse_expression()?
        };
        self.eat(&Token::RightParen)?;
        let body = self.parse_iteration_body()?;
        if is_of {
            Ok(Statement::ForOf(ForOfStatement { left, right, body }))
        } else {
            Ok(Statement::ForIn(ForInStatement { left, right, body }))
        }
    }

    fn parse_return_statement(&mut self) -> Result<Statement, ParseError> {
        if self.in_function == 0 {
            return Err(self.error("Illegal return statement"));
        }
        self.advance()?; // return
        let arg = if self.current == Token::Semicolon
            || self.current == Token::RightBrace
            || self.current == Token::Eof
            || self.prev_line_terminator
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.eat_semicolon()?;
        Ok(Statement::Return(arg))
    }

    fn parse_break_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // break
        let label = self.parse_optional_label()?;
        match &label {
            Some(l) => {
                if !self.labels.iter().any(|(name, _)| name == l) {
                    return Err(self.error(format!("Undefined label '{l}'")));
                }
            }
            None => {
                if self.in_iteration == 0 && self.in_switch == 0 {
                    return Err(self.error("Illegal break statement"));
                }
            }
        }
        self.eat_semicolon()?;
        Ok(Statement::Break(label))
    }

    fn parse_continue_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // continue
        if self.in_iteration == 0 {
            return Err(self.error("Illegal continue statement: no surrounding iteration statement"));
        }
        let label = self.parse_optional_label()?;
        if let Some(l) = &label {
            match self.labels.iter().rev().find(|(name, _)| name == l) {
                None => return Err(self.error(format!("Undefined label '{l}'"))),
                Some((_, false)) => {
                    return Err(self.error(format!(
                        "Illegal continue statement: '{l}' does not denote an iteration statement"
                    )));
                }
                Some(_) => {}
            }
        }
        self.eat_semicolon()?;
        Ok(Statement::Continue(label))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // throw
        if self.prev_line_terminator {
            return Err(self.error("Illegal newline after throw"));
        }
        let arg = self.parse_expression()?;
        self.eat_semicolon()?;
        Ok(Statement::Throw(arg))
    }

    fn parse_try_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // try
        let block = self.parse_block_node()?;
        if block.handlers.is_empty() {
            return Err(self.error("Missing catch or finally after try"));
        }
        Ok(Statement::Try(block))
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, ParseError> {
        self.advance()?; // switch
        self.eat(&Token::LeftParen)?;
        let discriminant = self.parse_expression()?;
        self.eat(&Token::RightParen)?;
        self.eat(&Token::LeftBrace)?;
        self.in_switch += 1;
        let cases = self.parse_switch_cases();
        self.in_switch -= 1;
        let cases = cases?;
        self.eat(&Token::RightBrace)?;
        let all: Vec<Statement> = cases
            .iter()
            .flat_map(|c| c.consequent.iter().cloned())
            .collect();
        self.check_block_scope(&all)?;
        let handlers = self.parse_handlers()?;
        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            handlers,
        }))
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>, ParseError> {
        let mut cases = Vec::new();
        let mut has_default = false;
        while self.current != Token::RightBrace {
            let test = match &self.current {
                Token::Keyword(Keyword::Case) => {
                    self.advance()?;
                    Some(self.parse_expression()?)
                }
                Token::Keyword(Keyword::Default) => {
                    if has_default {
                        return Err(self.error("More than one default clause in switch statement"));
                    }
                    has_default = true;
                    self.advance()?;
                    None
                }
                other => {
                    return Err(self.error(format!("Unexpected token {other:?} in switch body")));
                }
            };
            self.eat(&Token::Colon)?;
            let mut consequent = Vec::new();
            while !matches!(
                self.current,
                Token::Keyword(Keyword::Case)
                    | Token::Keyword(Keyword::Default)
                    | Token::RightBrace
                    | Token::Eof
            ) {
                consequent.push(self.parse_statement_or_declaration()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(cases)
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, ParseError> {
        let expr = self.parse_expression()?;
        self.eat_semicolon()?;
        Ok(Statement::Expression(expr))
    }
}
