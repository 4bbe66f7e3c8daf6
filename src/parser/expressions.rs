use super::*;

enum Head {
    Arrow(Expression),
    Operand(Expression),
}

impl<'a> Parser<'a> {
    pub fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_assignment_expression()?;
        if self.current == Token::Comma {
            let mut exprs = vec![expr];
            while self.current == Token::Comma {
                self.advance()?;
                exprs.push(self.parse_assignment_expression()?);
            }
            Ok(Expression::Sequence(exprs))
        } else {
            Ok(expr)
        }
    }

    fn is_simple_assignment_target(expr: &Expression) -> bool {
        matches!(expr, Expression::Identifier(_) | Expression::Member(_, _))
    }

    fn validate_assignment_target(
        &self,
        expr: &Expression,
        simple_only: bool,
    ) -> Result<(), ParseError> {
        if !simple_only && matches!(expr, Expression::Array(_) | Expression::Object(_)) {
            return expr_to_pattern(expr.clone()).map(|_| ());
        }
        if Self::is_simple_assignment_target(expr) {
            return Ok(());
        }
        Err(self.error("Invalid left-hand side in assignment"))
    }

    pub(super) fn parse_assignment_expression(&mut self) -> Result<Expression, ParseError> {
        let left = match self.parse_arrow_head()? {
            Some(Head::Arrow(arrow)) => return Ok(arrow),
            Some(Head::Operand(expr)) => expr,
            None => self.parse_conditional_expression()?,
        };

        let op = match &self.current {
            Token::Assign => Some(AssignOp::Assign),
            Token::PlusAssign => Some(AssignOp::AddAssign),
            Token::MinusAssign => Some(AssignOp::SubAssign),
            Token::StarAssign => Some(AssignOp::MulAssign),
            Token::SlashAssign => Some(AssignOp::DivAssign),
            Token::PercentAssign => Some(AssignOp::ModAssign),
            Token::ExponentAssign => Some(AssignOp::ExpAssign),
            Token::LeftShiftAssign => Some(AssignOp::LShiftAssign),
            Token::RightShiftAssign => Some(AssignOp::RShiftAssign),
            Token::UnsignedRightShiftAssign => Some(AssignOp::URShiftAssign),
            Token::AmpersandAssign => Some(AssignOp::BitAndAssign),
            Token::PipeAssign => Some(AssignOp::BitOrAssign),
            Token::CaretAssign => Some(AssignOp::BitXorAssign),
            Token::LogicalAndAssign => Some(AssignOp::LogicalAndAssign),
            Token::LogicalOrAssign => Some(AssignOp::LogicalOrAssign),
            Token::NullishAssign => Some(AssignOp::NullishAssign),
            _ => None,
        };

        if let Some(op) = op {
            let simple_only = op != AssignOp::Assign;
            self.validate_assignment_target(&left, simple_only)?;
            self.advance()?;
            let right = self.parse_assignment_expression()?;
            Ok(Expression::Assign(op, Box::new(left), Box::new(right)))
        } else {
            Ok(left)
        }
    }

    /// `x => ...` and `(params) => ...`. A parenthesized head that is not
    /// an arrow comes back as a finished operand, suffixes and operators
    /// included, ready for an assignment operator.
    fn parse_arrow_head(&mut self) -> Result<Option<Head>, ParseError> {
        match &self.current {
            Token::Identifier(name) => {
                let name = name.clone();
                let had_lt = self.prev_line_terminator;
                self.advance()?;
                if self.current == Token::Arrow && !self.prev_line_terminator {
                    self.advance()?;
                    let params = vec![Pattern::Identifier(name)];
                    return self.parse_arrow_body(params).map(|a| Some(Head::Arrow(a)));
                }
                // Not an arrow: put the identifier back
                self.push_back(Token::Identifier(name), had_lt);
                Ok(None)
            }
            Token::LeftParen => {
                let (mut exprs, rest) = self.with_in(|p| p.parse_parenthesized_list())?;
                if self.current == Token::Arrow && !self.prev_line_terminator {
                    self.advance()?;
                    let mut params = exprs
                        .into_iter()
                        .map(expr_to_pattern)
                        .collect::<Result<Vec<_>, _>>()?;
                    if let Some(rest) = rest {
                        params.push(Pattern::Rest(Box::new(rest)));
                    }
                    let mut names = Vec::new();
                    for p in &params {
                        pattern_bound_names(p, &mut names);
                    }
                    self.check_duplicate_names(&names)?;
                    return self.parse_arrow_body(params).map(|a| Some(Head::Arrow(a)));
                }
                if rest.is_some() || exprs.is_empty() {
                    return Err(self.error("Unexpected token )"));
                }
                let expr = if exprs.len() == 1 {
                    exprs.remove(0)
                } else {
                    Expression::Sequence(exprs)
                };
                let expr = self.parse_call_tail(expr)?;
                let expr = self.parse_postfix_tail(expr)?;
                self.parse_binary_tail(expr).map(|e| Some(Head::Operand(e)))
            }
            _ => Ok(None),
        }
    }

    /// `( a, b, ...rest )`, consumed through the closing paren.
    fn parse_parenthesized_list(
        &mut self,
    ) -> Result<(Vec<Expression>, Option<Pattern>), ParseError> {
        self.eat(&Token::LeftParen)?;
        let mut exprs = Vec::new();
        let mut rest = None;
        while self.current != Token::RightParen {
            if self.current == Token::Ellipsis {
                self.advance()?;
                rest = Some(self.parse_binding_pattern()?);
                break;
            }
            exprs.push(self.parse_assignment_expression()?);
            if self.current == Token::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        self.eat(&Token::RightParen)?;
        Ok((exprs, rest))
    }

    fn parse_arrow_body(&mut self, params: Vec<Pattern>) -> Result<Expression, ParseError> {
        // Arrows see the enclosing `super` bindings.
        let (prop, call) = (self.allow_super_property, self.allow_super_call);
        let saved = self.enter_function_body(prop, call);
        let result = if self.current == Token::LeftBrace {
            self.with_in(|p| p.parse_braced_statements())
        } else {
            self.parse_assignment_expression()
                .map(|e| vec![Statement::Return(Some(e))])
        };
        self.leave_function_body(saved);
        let body = result?;
        self.check_params_against_body(&params, &body)?;
        Ok(Expression::ArrowFunction(ArrowFunction { params, body }))
    }

    /// Continues precedence climbing from an already parsed operand, used
    /// when a parenthesized group was consumed while looking for `=>`.
    fn parse_binary_tail(&mut self, operand: Expression) -> Result<Expression, ParseError> {
        let left = self.parse_exponentiation_from(operand)?;
        let left = self.climb_binary(left, 0)?;
        let left = self.parse_logical_tail(left)?;
        self.parse_conditional_tail(left)
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_nullish_coalescing()?;
        self.parse_conditional_tail(expr)
    }

    fn parse_conditional_tail(&mut self, expr: Expression) -> Result<Expression, ParseError> {
        if self.current == Token::Question {
            self.advance()?;
            let consequent = self.with_in(|p| p.parse_assignment_expression())?;
            self.eat(&Token::Colon)?;
            let alternate = self.parse_assignment_expression()?;
            Ok(Expression::Conditional(
                Box::new(expr),
                Box::new(consequent),
                Box::new(alternate),
            ))
        } else {
            Ok(expr)
        }
    }

    fn parse_nullish_coalescing(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_unary()?;
        let left = self.climb_binary(left, 0)?;
        self.parse_logical_tail(left)
    }

    /// `&&`, `||` and `??` over already climbed binary operands.
    fn parse_logical_tail(&mut self, mut left: Expression) -> Result<Expression, ParseError> {
        left = self.parse_logical_and_tail(left)?;
        while self.current == Token::LogicalOr {
            self.advance()?;
            let right = self.parse_logical_and_operand()?;
            left = Expression::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        while self.current == Token::NullishCoalescing {
            self.advance()?;
            let right = self.parse_logical_and_operand()?;
            left = Expression::Logical(
                LogicalOp::NullishCoalescing,
                Box::new(left),
                Box::new(right),
            );
        }
        Ok(left)
    }

    fn parse_logical_and_operand(&mut self) -> Result<Expression, ParseError> {
        let operand = self.parse_unary()?;
        let operand = self.climb_binary(operand, 0)?;
        self.parse_logical_and_tail(operand)
    }

    fn parse_logical_and_tail(&mut self, mut left: Expression) -> Result<Expression, ParseError> {
        while self.current == Token::LogicalAnd {
            self.advance()?;
            let right = self.parse_unary()?;
            let right = self.climb_binary(right, 0)?;
            left = Expression::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Binary operator at the current token with its precedence, from `|`
    /// (1) up to multiplicative (9). `**` is handled by the unary level.
    fn current_binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match &self.current {
            Token::Pipe => (BinaryOp::BitOr, 1),
            Token::Caret => (BinaryOp::BitXor, 2),
            Token::Ampersand => (BinaryOp::BitAnd, 3),
            Token::Equal => (BinaryOp::Eq, 4),
            Token::NotEqual => (BinaryOp::NotEq, 4),
            Token::StrictEqual => (BinaryOp::StrictEq, 4),
            Token::StrictNotEqual => (BinaryOp::StrictNotEq, 4),
            Token::LessThan => (BinaryOp::Lt, 5),
            Token::GreaterThan => (BinaryOp::Gt, 5),
            Token::LessThanEqual => (BinaryOp::LtEq, 5),
            Token::GreaterThanEqual => (BinaryOp::GtEq, 5),
            Token::Keyword(Keyword::Instanceof) => (BinaryOp::Instanceof, 5),
            Token::Keyword(Keyword::In) if !self.no_in => (BinaryOp::In, 5),
            Token::LeftShift => (BinaryOp::LShift, 6),
            Token::RightShift => (BinaryOp::RShift, 6),
            Token::UnsignedRightShift => (BinaryOp::URShift, 6),
            Token::Plus => (BinaryOp::Add, 7),
            Token::Minus => (BinaryOp::Sub, 7),
            Token::Star => (BinaryOp::Mul, 8),
            Token::Slash => (BinaryOp::Div, 8),
            Token::Percent => (BinaryOp::Mod, 8),
            _ => return None,
        };
        Some(op)
    }

    /// Left-associative precedence climbing over `current_binary_op`.
    fn climb_binary(
        &mut self,
        mut left: Expression,
        min_prec: u8,
    ) -> Result<Expression, ParseError> {
        while let Some((op, prec)) = self.current_binary_op() {
            if prec < min_prec {
                break;
            }
            self.advance()?;
            let mut right = self.parse_unary()?;
            while let Some((_, next_prec)) = self.current_binary_op() {
                if next_prec <= prec {
                    break;
                }
                right = self.climb_binary(right, prec + 1)?;
            }
            left = Expression::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_exponentiation_from(&mut self, base: Expression) -> Result<Expression, ParseError> {
        if self.current == Token::Exponent {
            self.advance()?;
            let exp = self.parse_unary()?; // right-associative through parse_unary
            Ok(Expression::Binary(BinaryOp::Exp, Box::new(base), Box::new(exp)))
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        let expr = match &self.current {
            Token::Keyword(Keyword::Delete) => {
                self.advance()?;
                return Ok(Expression::Delete(Box::new(self.parse_unary()?)));
            }
            Token::Keyword(Keyword::Void) => {
                self.advance()?;
                return Ok(Expression::Void(Box::new(self.parse_unary()?)));
            }
            Token::Keyword(Keyword::Typeof) => {
                self.advance()?;
                return Ok(Expression::Typeof(Box::new(self.parse_unary()?)));
            }
            Token::Plus | Token::Minus | Token::Tilde | Token::Bang => {
                let op = match self.advance()? {
                    Token::Plus => UnaryOp::Plus,
                    Token::Minus => UnaryOp::Minus,
                    Token::Tilde => UnaryOp::BitNot,
                    _ => UnaryOp::Not,
                };
                let expr = self.parse_unary()?;
                return Ok(Expression::Unary(op, Box::new(expr)));
            }
            Token::Increment | Token::Decrement => {
                let op = if self.advance()? == Token::Increment {
                    UpdateOp::Increment
                } else {
                    UpdateOp::Decrement
                };
                let expr = self.parse_unary()?;
                self.validate_assignment_target(&expr, true)?;
                Expression::Update(op, true, Box::new(expr))
            }
            _ => self.parse_postfix()?,
        };
        self.parse_exponentiation_from(expr)
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_left_hand_side_expression()?;
        self.parse_postfix_tail(expr)
    }

    fn parse_postfix_tail(&mut self, expr: Expression) -> Result<Expression, ParseError> {
        if !self.prev_line_terminator {
            let op = match self.current {
                Token::Increment => Some(UpdateOp::Increment),
                Token::Decrement => Some(UpdateOp::Decrement),
                _ => None,
            };
            if let Some(op) = op {
                self.validate_assignment_target(&expr, true)?;
                self.advance()?;
                return Ok(Expression::Update(op, false, Box::new(expr)));
            }
        }
        Ok(expr)
    }

    fn parse_dot_member_property(&mut self) -> Result<MemberProperty, ParseError> {
        match self.current_property_name() {
            Some(name) => {
                self.advance()?;
                Ok(MemberProperty::Dot(name))
            }
            None => Err(self.error("Expected identifier after '.'")),
        }
    }

    pub(super) fn parse_left_hand_side_expression(&mut self) -> Result<Expression, ParseError> {
        let expr = if self.current == Token::Keyword(Keyword::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };
        self.parse_call_tail(expr)
    }

    fn parse_call_tail(&mut self, mut expr: Expression) -> Result<Expression, ParseError> {
        loop {
            match &self.current {
                Token::Dot => {
                    self.advance()?;
                    let prop = self.parse_dot_member_property()?;
                    expr = Expression::Member(Box::new(expr), prop);
                }
                Token::LeftBracket => {
                    self.advance()?;
                    let prop = self.with_in(|p| p.parse_expression())?;
                    self.eat(&Token::RightBracket)?;
                    expr = Expression::Member(
                        Box::new(expr),
                        MemberProperty::Computed(Box::new(prop)),
                    );
                }
                Token::LeftParen => {
                    let args = self.parse_arguments()?;
                    expr = Expression::Call(Box::new(expr), args);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_new_expression(&mut self) -> Result<Expression, ParseError> {
        self.advance()?; // new
        if self.current == Token::Keyword(Keyword::New) {
            let inner = self.parse_new_expression()?;
            return Ok(Expression::New(Box::new(inner), Vec::new()));
        }
        let mut callee = self.parse_primary_expression()?;
        loop {
            match &self.current {
                Token::Dot => {
                    self.advance()?;
                    let prop = self.parse_dot_member_property()?;
                    callee = Expression::Member(Box::new(callee), prop);
                }
                Token::LeftBracket => {
                    self.advance()?;
                    let prop = self.with_in(|p| p.parse_expression())?;
                    self.eat(&Token::RightBracket)?;
                    callee = Expression::Member(
                        Box::new(callee),
                        MemberProperty::Computed(Box::new(prop)),
                    );
                }
                _ => break,
            }
        }
        let args = if self.current == Token::LeftParen {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::New(Box::new(callee), args))
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        self.eat(&Token::LeftParen)?;
        self.with_in(|p| {
            let mut args = Vec::new();
            while p.current != Token::RightParen {
                if p.current == Token::Ellipsis {
                    p.advance()?;
                    let expr = p.parse_assignment_expression()?;
                    args.push(Expression::Spread(Box::new(expr)));
                } else {
                    args.push(p.parse_assignment_expression()?);
                }
                if p.current == Token::Comma {
                    p.advance()?;
                } else {
                    break;
                }
            }
            p.eat(&Token::RightParen)?;
            Ok(args)
        })
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, ParseError> {
        match &self.current {
            Token::Keyword(Keyword::This) => {
                self.advance()?;
                Ok(Expression::This)
            }
            Token::Keyword(Keyword::Super) => {
                self.advance()?;
                let is_call = self.current == Token::LeftParen;
                let is_property = self.current == Token::Dot || self.current == Token::LeftBracket;
                let allowed = (is_call && self.allow_super_call)
                    || (is_property && self.allow_super_property);
                if !allowed {
                    return Err(self.error("'super' keyword unexpected here"));
                }
                Ok(Expression::Super)
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(Expression::Identifier(name))
            }
            Token::NullLiteral => {
                self.advance()?;
                Ok(Expression::Literal(Literal::Null))
            }
            Token::BooleanLiteral(b) => {
                let b = *b;
                self.advance()?;
                Ok(Expression::Literal(Literal::Boolean(b)))
            }
            Token::NumericLiteral(n) => {
                let n = *n;
                self.advance()?;
                Ok(Expression::Literal(Literal::Number(n)))
            }
            Token::StringLiteral(s) => {
                let s = s.clone();
                self.advance()?;
                Ok(Expression::Literal(Literal::String(s)))
            }
            Token::LeftParen => {
                self.advance()?;
                let expr = self.with_in(|p| p.parse_expression())?;
                self.eat(&Token::RightParen)?;
                Ok(expr)
            }
            Token::LeftBracket => self.parse_array_literal(),
            Token::LeftBrace => self.parse_object_literal(),
            Token::Keyword(Keyword::Function) => self.parse_function_expression(),
            Token::Keyword(Keyword::Class) => self.parse_class_expression(),
            Token::NoSubstitutionTemplate(_) | Token::TemplateHead(_) => {
                let tmpl = self.parse_template_literal()?;
                Ok(Expression::Template(tmpl))
            }
            Token::Slash | Token::SlashAssign => {
                Err(self.error("Regular expression literals are not supported"))
            }
            _ => Err(self.error(format!("Unexpected token: {:?}", self.current))),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression, ParseError> {
        self.advance()?; // [
        let elements = self.with_in(|p| {
            let mut elements = Vec::new();
            while p.current != Token::RightBracket {
                if p.current == Token::Comma {
                    elements.push(None);
                    p.advance()?;
                    continue;
                }
                if p.current == Token::Ellipsis {
                    p.advance()?;
                    let expr = p.parse_assignment_expression()?;
                    elements.push(Some(Expression::Spread(Box::new(expr))));
                } else {
                    elements.push(Some(p.parse_assignment_expression()?));
                }
                if p.current != Token::RightBracket {
                    p.eat(&Token::Comma)?;
                }
            }
            Ok(elements)
        })?;
        self.eat(&Token::RightBracket)?;
        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, ParseError> {
        self.advance()?; // {
        let props = self.with_in(|p| {
            let mut props = Vec::new();
            while p.current != Token::RightBrace {
                if p.current == Token::Ellipsis {
                    p.advance()?;
                    props.push(Property::Spread(p.parse_assignment_expression()?));
                } else {
                    props.push(p.parse_object_property()?);
                }
                if p.current != Token::RightBrace {
                    p.eat(&Token::Comma)?;
                }
            }
            Ok(props)
        })?;
        self.eat(&Token::RightBrace)?;
        Ok(Expression::Object(props))
    }

    fn parse_object_property(&mut self) -> Result<Property, ParseError> {
        let shorthand_name = self.current_identifier_name();
        let key = self.parse_property_name()?;
        match &self.current {
            Token::Colon => {
                self.advance()?;
                let value = self.parse_assignment_expression()?;
                Ok(Property::KeyValue(key, value))
            }
            Token::LeftParen => {
                let name = match &key {
                    PropertyKey::Identifier(n) | PropertyKey::String(n) => Some(n.clone()),
                    _ => None,
                };
                let (params, body) = self.parse_function_rest(true, false)?;
                Ok(Property::KeyValue(
                    key,
                    Expression::Function(FunctionExpr { name, params, body }),
                ))
            }
            _ => {
                let Some(name) = shorthand_name else {
                    return Err(self.error(format!("Unexpected token {:?}", self.current)));
                };
                // `{ a = 1 }` is only meaningful as a destructuring target
                if self.current == Token::Assign {
                    self.advance()?;
                    let default = self.parse_assignment_expression()?;
                    return Ok(Property::KeyValue(
                        key,
                        Expression::Assign(
                            AssignOp::Assign,
                            Box::new(Expression::Identifier(name)),
                            Box::new(default),
                        ),
                    ));
                }
                Ok(Property::KeyValue(key, Expression::Identifier(name)))
            }
        }
    }

    fn parse_function_expression(&mut self) -> Result<Expression, ParseError> {
        self.advance()?; // function
        let name = match self.current_identifier_name() {
            Some(n) => {
                self.advance()?;
                Some(n)
            }
            None => None,
        };
        let (params, body) = self.parse_function_rest(false, false)?;
        Ok(Expression::Function(FunctionExpr { name, params, body }))
    }

    fn parse_class_expression(&mut self) -> Result<Expression, ParseError> {
        self.advance()?; // class
        let name = match self.current_identifier_name() {
            Some(n) => {
                self.advance()?;
                Some(n)
            }
            None => None,
        };
        let (super_class, body, handlers) = self.parse_class_tail()?;
        Ok(Expression::Class(ClassExpr {
            name,
            super_class,
            body,
            handlers,
        }))
    }

    fn parse_template_literal(&mut self) -> Result<TemplateLiteral, ParseError> {
        match self.advance()? {
            Token::NoSubstitutionTemplate(cooked) => Ok(TemplateLiteral {
                quasis: vec![cooked],
                expressions: Vec::new(),
            }),
            Token::TemplateHead(cooked) => {
                let mut quasis = vec![cooked];
                let mut expressions = Vec::new();
                loop {
                    expressions.push(self.with_in(|p| p.parse_expression())?);
                    if self.current != Token::RightBrace || self.pushback.is_some() {
                        return Err(self.error("Expected '}' after template substitution"));
                    }
                    match self.lexer.read_template_continuation()? {
                        Token::TemplateTail(cooked) => {
                            quasis.push(cooked);
                            self.advance()?;
                            break;
                        }
                        Token::TemplateMiddle(cooked) => {
                            quasis.push(cooked);
                            self.advance()?;
                        }
                        _ => return Err(self.error("Expected template continuation")),
                    }
                }
                Ok(TemplateLiteral {
                    quasis,
                    expressions,
                })
            }
            other => Err(self.error(format!("Expected template literal, got {other:?}"))),
        }
    }
}
