use super::*;

impl<'a> Parser<'a> {
    /// Trailing `catch` clauses and an optional `finally` after a block's
    /// closing brace. Returns empty handlers when neither follows.
    pub(super) fn parse_handlers(&mut self) -> Result<Handlers, ParseError> {
        let mut handlers = Handlers::default();
        loop {
            match &self.current {
                Token::Keyword(Keyword::Catch) => {
                    if handlers.finalizer.is_some() {
                        return Err(self.error("catch clause cannot follow finally"));
                    }
                    self.advance()?;
                    handlers.catches.push(self.parse_catch_clause()?);
                }
                Token::Keyword(Keyword::Finally) => {
                    if handlers.finalizer.is_some() {
                        return Err(self.error("Only one finally clause is allowed"));
                    }
                    self.advance()?;
                    let body = self.parse_braced_statements()?;
                    handlers.finalizer = Some(Box::new(BlockNode::plain(body)));
                }
                _ => return Ok(handlers),
            }
        }
    }

    /// Everything after the `catch` keyword.
    fn parse_catch_clause(&mut self) -> Result<CatchClause, ParseError> {
        let param = if self.current == Token::LeftParen {
            self.advance()?;
            let pat = self.parse_binding_pattern()?;
            self.eat(&Token::RightParen)?;
            Some(pat)
        } else {
            None
        };

        let guard = if self.is_contextual("when") {
            self.advance()?;
            Some(self.parse_guard()?)
        } else {
            None
        };

        let body = self.parse_braced_statements()?;
        if let Some(pat) = &param {
            self.check_catch_binding(pat, &body)?;
        }
        Ok(CatchClause {
            param,
            guard,
            body: BlockNode::plain(body),
        })
    }

    fn parse_guard(&mut self) -> Result<Expression, ParseError> {
        if self.current != Token::LeftParen {
            return Err(self.error("Missing guard expression after 'when'"));
        }
        self.advance()?;
        if self.current == Token::RightParen {
            return Err(self.error("Missing guard expression after 'when'"));
        }
        let guard = self.with_in(|p| p.parse_expression())?;
        self.eat(&Token::RightParen)?;
        Ok(guard)
    }

    fn check_catch_binding(&self, param: &Pattern, body: &[Statement]) -> Result<(), ParseError> {
        let mut bound = Vec::new();
        pattern_bound_names(param, &mut bound);
        self.check_duplicate_names(&bound)?;

        let mut declared = Vec::new();
        lexically_declared_names(body, &mut declared);
        var_declared_names(body, &mut declared);
        if let Some(name) = bound.iter().find(|n| declared.contains(n)) {
            return Err(self.error(format!("Identifier '{name}' has already been declared")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        Parser::new(src).unwrap().parse_program().unwrap()
    }

    fn parse_err(src: &str) -> String {
        match Parser::new(src).and_then(|mut p| p.parse_program()) {
            Ok(_) => panic!("expected a syntax error for {src:?}"),
            Err(e) => e.message,
        }
    }

    fn block_handlers(stmt: &Statement) -> &Handlers {
        match stmt {
            Statement::Block(b) | Statement::Try(b) => &b.handlers,
            other => panic!("expected a block, got {other:?}"),
        }
    }

    #[test]
    fn bare_block_without_clauses() {
        let prog = parse("{ x; }");
        assert!(block_handlers(&prog.body[0]).is_empty());
    }

    #[test]
    fn multiple_guarded_clauses_and_finally() {
        let prog = parse(
            "{ f(); } catch (e) when (e instanceof TypeError) { a(); } \
             catch ({ code }) when (code > 1) { b(); } catch { c(); } finally { d(); }",
        );
        let h = block_handlers(&prog.body[0]);
        assert_eq!(h.catches.len(), 3);
        assert!(h.catches[0].guard.is_some());
        assert!(matches!(h.catches[1].param, Some(Pattern::Object(_))));
        assert!(h.catches[2].param.is_none());
        assert!(h.catches[2].guard.is_none());
        assert!(h.finalizer.is_some());
    }

    #[test]
    fn guard_without_binding() {
        let prog = parse("{ } catch when (ready) { }");
        let h = block_handlers(&prog.body[0]);
        assert!(h.catches[0].param.is_none());
        assert!(matches!(h.catches[0].guard, Some(Expression::Identifier(_))));
    }

    #[test]
    fn classic_try_catch_is_unchanged() {
        let prog = parse("try { a(); } catch (e) { b(e); } finally { c(); }");
        let h = block_handlers(&prog.body[0]);
        assert_eq!(h.catches.len(), 1);
        assert!(h.catches[0].guard.is_none());
        assert!(h.finalizer.is_some());
    }

    #[test]
    fn try_requires_a_clause() {
        assert_eq!(parse_err("try { }"), "Missing catch or finally after try");
    }

    #[test]
    fn clauses_attach_to_functions_classes_and_switch() {
        let prog = parse(
            "function f() { } catch (e) { } \
             class A { } catch (e) { } \
             switch (x) { case 1: break; } finally { }",
        );
        match &prog.body[0] {
            Statement::FunctionDeclaration(f) => assert_eq!(f.body.handlers.catches.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        match &prog.body[1] {
            Statement::ClassDeclaration(c) => assert_eq!(c.handlers.catches.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        match &prog.body[2] {
            Statement::Switch(s) => assert!(s.handlers.finalizer.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn loop_and_do_bodies_take_clauses() {
        let prog = parse("while (c) { } catch (e) { } do { } catch { } while (c);");
        match &prog.body[0] {
            Statement::While(w) => assert_eq!(block_handlers(&w.body).catches.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&prog.body[1], Statement::DoWhile(_)));
    }

    #[test]
    fn catch_after_finally_is_rejected() {
        assert_eq!(
            parse_err("{ } finally { } catch (e) { }"),
            "catch clause cannot follow finally"
        );
    }

    #[test]
    fn second_finally_is_rejected() {
        assert_eq!(
            parse_err("{ } finally { } finally { }"),
            "Only one finally clause is allowed"
        );
    }

    #[test]
    fn duplicate_binding_names_are_rejected() {
        assert_eq!(
            parse_err("{ } catch ([a, a]) { }"),
            "Identifier 'a' has already been declared"
        );
    }

    #[test]
    fn binding_colliding_with_body_declarations_is_rejected() {
        assert_eq!(
            parse_err("{ } catch (e) { let e = 1; }"),
            "Identifier 'e' has already been declared"
        );
        assert_eq!(
            parse_err("{ } catch ({ x }) { { var x; } }"),
            "Identifier 'x' has already been declared"
        );
    }

    #[test]
    fn malformed_guards_are_rejected() {
        assert_eq!(
            parse_err("{ } catch (e) when { }"),
            "Missing guard expression after 'when'"
        );
        assert_eq!(
            parse_err("{ } catch (e) when () { }"),
            "Missing guard expression after 'when'"
        );
        assert!(parse_err("{ } catch (e) when (e. ) { }").contains("Expected identifier"));
    }

    #[test]
    fn when_remains_an_identifier() {
        let prog = parse("var when = 1; when = when + 1; function when2(when) { return when; }");
        assert_eq!(prog.body.len(), 3);
    }

    #[test]
    fn nested_guarded_block_inside_catch_body() {
        let prog = parse("{ } catch (e) { { g(); } catch (f) when (f) { } }");
        let h = block_handlers(&prog.body[0]);
        let inner = &h.catches[0].body.body[0];
        assert_eq!(block_handlers(inner).catches.len(), 1);
    }

    #[test]
    fn stray_catch_is_rejected() {
        assert!(parse_err("x; catch (e) { }").contains("no block to attach"));
    }
}
