use crate::ast::*;
use crate::lexer::{Keyword, LexError, Lexer, Token};
use std::fmt;

mod clauses;
mod declarations;
mod expressions;
mod statements;

#[derive(Debug)]
pub struct ParseError {
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            message: format!("{e}"),
        }
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    prev_line_terminator: bool,
    pushback: Option<(Token, bool)>, // (token, had_line_terminator_before)
    no_in: bool,
    in_function: u32,
    in_iteration: u32,
    in_switch: u32,
    labels: Vec<(String, bool)>, // (name, is_iteration)
    allow_super_property: bool,
    allow_super_call: bool,
}

/// Statement-context flags saved across a function or static-block body.
struct BodyContext {
    in_iteration: u32,
    in_switch: u32,
    labels: Vec<(String, bool)>,
    allow_super_property: bool,
    allow_super_call: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let mut had_lt = false;
        let current = loop {
            let tok = lexer.next_token()?;
            if tok == Token::LineTerminator {
                had_lt = true;
                continue;
            }
            break tok;
        };
        Ok(Self {
            lexer,
            current,
            prev_line_terminator: had_lt,
            pushback: None,
            no_in: false,
            in_function: 0,
            in_iteration: 0,
            in_switch: 0,
            labels: Vec::new(),
            allow_super_property: false,
            allow_super_call: false,
        })
    }

    fn advance(&mut self) -> Result<Token, ParseError> {
        let old = std::mem::replace(&mut self.current, Token::Eof);
        if let Some((tok, lt)) = self.pushback.take() {
            self.current = tok;
            self.prev_line_terminator = lt;
        } else {
            self.prev_line_terminator = false;
            loop {
                let tok = self.lexer.next_token()?;
                if tok == Token::LineTerminator {
                    self.prev_line_terminator = true;
                    continue;
                }
                self.current = tok;
                break;
            }
        }
        Ok(old)
    }

    /// Makes `token` current again; the present token becomes the next one.
    fn push_back(&mut self, token: Token, had_lt: bool) {
        let old_current = std::mem::replace(&mut self.current, token);
        let old_lt = std::mem::replace(&mut self.prev_line_terminator, had_lt);
        self.pushback = Some((old_current, old_lt));
    }

    fn eat(&mut self, expected: &Token) -> Result<(), ParseError> {
        if &self.current == expected {
            self.advance()?;
            Ok(())
        } else {
            Err(self.error(format!("Expected {expected:?}, got {:?}", self.current)))
        }
    }

    fn eat_semicolon(&mut self) -> Result<(), ParseError> {
        if self.current == Token::Semicolon {
            self.advance()?;
            return Ok(());
        }
        // ASI
        if self.prev_line_terminator
            || self.current == Token::RightBrace
            || self.current == Token::Eof
        {
            return Ok(());
        }
        Err(self.error(format!("Unexpected token {:?}", self.current)))
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            message: msg.into(),
        }
    }

    fn is_contextual(&self, word: &str) -> bool {
        matches!(&self.current, Token::Identifier(name) if name == word)
    }

    fn parse_optional_label(&mut self) -> Result<Option<String>, ParseError> {
        if !self.prev_line_terminator
            && let Some(name) = self.current_identifier_name()
        {
            self.advance()?;
            return Ok(Some(name));
        }
        Ok(None)
    }

    fn current_identifier_name(&self) -> Option<String> {
        match &self.current {
            Token::Identifier(name) => Some(name.clone()),
            _ => None,
        }
    }

    /// Identifier or keyword spelled as a property name after `.` or in a
    /// literal key position.
    fn current_property_name(&self) -> Option<String> {
        match &self.current {
            Token::Identifier(name) => Some(name.clone()),
            Token::Keyword(kw) => Some(kw.as_str().to_string()),
            Token::BooleanLiteral(b) => Some(b.to_string()),
            Token::NullLiteral => Some("null".to_string()),
            _ => None,
        }
    }

    fn enter_function_body(&mut self, is_method: bool, is_constructor: bool) -> BodyContext {
        let saved = BodyContext {
            in_iteration: self.in_iteration,
            in_switch: self.in_switch,
            labels: std::mem::take(&mut self.labels),
            allow_super_property: self.allow_super_property,
            allow_super_call: self.allow_super_call,
        };
        self.in_iteration = 0;
        self.in_switch = 0;
        self.in_function += 1;
        self.allow_super_property = is_method;
        self.allow_super_call = is_constructor;
        saved
    }

    fn leave_function_body(&mut self, saved: BodyContext) {
        self.in_function -= 1;
        self.in_iteration = saved.in_iteration;
        self.in_switch = saved.in_switch;
        self.labels = saved.labels;
        self.allow_super_property = saved.allow_super_property;
        self.allow_super_call = saved.allow_super_call;
    }

    /// Runs `f` with the `in` operator allowed again, as inside brackets.
    fn with_in<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.no_in, false);
        let result = f(self);
        self.no_in = saved;
        result
    }

    fn check_duplicate_names(&self, names: &[String]) -> Result<(), ParseError> {
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(self.error(format!("Identifier '{name}' has already been declared")));
            }
        }
        Ok(())
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while self.current != Token::Eof {
            body.push(self.parse_statement_or_declaration()?);
        }
        self.check_block_scope(&body)?;
        Ok(Program { body })
    }
}

fn invalid_target() -> ParseError {
    ParseError {
        message: "Invalid destructuring assignment target".to_string(),
    }
}

/// Reinterprets a parsed expression as a binding pattern, for arrow
/// parameter lists and `for (x of ...)` heads.
pub(crate) fn expr_to_pattern(expr: Expression) -> Result<Pattern, ParseError> {
    match expr {
        Expression::Identifier(name) => Ok(Pattern::Identifier(name)),
        Expression::Assign(AssignOp::Assign, left, right) => {
            let pat = expr_to_pattern(*left)?;
            Ok(Pattern::Assign(Box::new(pat), right))
        }
        Expression::Array(elements) => {
            let mut pats = Vec::with_capacity(elements.len());
            for elem in elements {
                pats.push(match elem {
                    None => None,
                    Some(Expression::Spread(inner)) => {
                        Some(ArrayPatternElement::Rest(expr_to_pattern(*inner)?))
                    }
                    Some(e) => Some(ArrayPatternElement::Pattern(expr_to_pattern(e)?)),
                });
            }
            Ok(Pattern::Array(pats))
        }
        Expression::Object(props) => {
            let mut pat_props = Vec::with_capacity(props.len());
            for prop in props {
                match prop {
                    Property::Spread(target) => {
                        pat_props.push(ObjectPatternProperty::Rest(expr_to_pattern(target)?));
                    }
                    Property::KeyValue(PropertyKey::Identifier(key), Expression::Identifier(name))
                        if key == name =>
                    {
                        pat_props.push(ObjectPatternProperty::Shorthand(name));
                    }
                    Property::KeyValue(key, value) => {
                        pat_props.push(ObjectPatternProperty::KeyValue(key, expr_to_pattern(value)?));
                    }
                }
            }
            Ok(Pattern::Object(pat_props))
        }
        Expression::Spread(inner) => Ok(Pattern::Rest(Box::new(expr_to_pattern(*inner)?))),
        _ => Err(invalid_target()),
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

    #[test]
    fn parse_empty() {
        let prog = parse("");
        assert!(prog.body.is_empty());
    }

    #[test]
    fn parse_var_declaration() {
        let prog = parse("var x = 42;");
        assert_eq!(prog.body.len(), 1);
        assert!(matches!(&prog.body[0], Statement::Variable(_)));
    }

    #[test]
    fn parse_if_statement() {
        let prog = parse("if (true) { x; } else { y; }");
        assert!(matches!(&prog.body[0], Statement::If(_)));
    }

    #[test]
    fn parse_function_declaration() {
        let prog = parse("function foo(a, b) { return a + b; }");
        match &prog.body[0] {
            Statement::FunctionDeclaration(f) => {
                assert_eq!(f.name, "foo");
                assert_eq!(f.params.len(), 2);
                assert!(f.body.handlers.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_for_loop() {
        let prog = parse("for (var i = 0; i < 10; i++) { x; }");
        assert!(matches!(&prog.body[0], Statement::For(_)));
    }

    #[test]
    fn parse_for_in_and_of() {
        let prog = parse("for (const k in o) {} for (x of xs) {}");
        assert!(matches!(&prog.body[0], Statement::ForIn(_)));
        assert!(matches!(&prog.body[1], Statement::ForOf(_)));
    }

    #[test]
    fn parse_arrow_function() {
        let prog = parse("var f = (a, [b, c], ...rest) => a + b;");
        if let Statement::Variable(decl) = &prog.body[0]
            && let Some(Expression::ArrowFunction(af)) = &decl.declarations[0].init
        {
            assert_eq!(af.params.len(), 3);
            assert!(matches!(af.params[2], Pattern::Rest(_)));
            assert!(matches!(af.body[0], Statement::Return(Some(_))));
        } else {
            panic!("expected arrow function");
        }
    }

    #[test]
    fn parse_class() {
        let prog = parse(
            "class A extends B { constructor(x) { super(x); } static make() { return 1; } y = 2; static { A.z = 3; } }",
        );
        match &prog.body[0] {
            Statement::ClassDeclaration(c) => {
                assert_eq!(c.name, "A");
                assert!(c.super_class.is_some());
                assert_eq!(c.body.len(), 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_template_with_substitutions() {
        let prog = parse("`a${1}b${2}c`;");
        match &prog.body[0] {
            Statement::Expression(Expression::Template(t)) => {
                assert_eq!(t.quasis, vec!["a", "b", "c"]);
                assert_eq!(t.expressions.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn asi_after_newline() {
        let prog = parse("let a = 1\nlet b = 2\na + b");
        assert_eq!(prog.body.len(), 3);
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert!(parse_err("break;").contains("Illegal break"));
        assert!(parse_err("while (1) { continue nope; }").contains("Undefined label"));
    }

    #[test]
    fn return_outside_function_is_rejected() {
        assert!(parse_err("return 1;").contains("Illegal return"));
    }

    #[test]
    fn duplicate_lexical_declaration_is_rejected() {
        assert_eq!(
            parse_err("let a = 1; const a = 2;"),
            "Identifier 'a' has already been declared"
        );
    }

    #[test]
    fn lex_errors_surface_with_position() {
        let err = parse_err("let s = 'open");
        assert!(err.starts_with("1:"));
    }
}
