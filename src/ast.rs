//! AST node types for the supported ECMAScript subset.
//!
//! Every construct that owns a braced body stores it as a [`BlockNode`], so
//! trailing `catch`/`finally` clauses hang off the same shape everywhere.

#[derive(Clone, Debug)]
pub struct Program {
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug)]
pub enum Statement {
    Empty,
    Expression(Expression),
    Block(BlockNode),
    Variable(VariableDeclaration),
    If(IfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    ForOf(ForOfStatement),
    Return(Option<Expression>),
    Break(Option<String>),
    Continue(Option<String>),
    Throw(Expression),
    /// `try { }` is a block that must carry at least one clause.
    Try(BlockNode),
    Switch(SwitchStatement),
    Labeled(String, Box<Statement>),
    FunctionDeclaration(FunctionDecl),
    ClassDeclaration(ClassDecl),
}

/// A braced statement list plus the clauses attached after its `}`.
#[derive(Clone, Debug, Default)]
pub struct BlockNode {
    pub body: Vec<Statement>,
    pub handlers: Handlers,
}

impl BlockNode {
    pub fn plain(body: Vec<Statement>) -> Self {
        BlockNode {
            body,
            handlers: Handlers::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Handlers {
    pub catches: Vec<CatchClause>,
    pub finalizer: Option<Box<BlockNode>>,
}

impl Handlers {
    pub fn is_empty(&self) -> bool {
        self.catches.is_empty() && self.finalizer.is_none()
    }
}

/// `catch [(param)] [when (guard)] { body }`
#[derive(Clone, Debug)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub guard: Option<Expression>,
    pub body: BlockNode,
}

#[derive(Clone, Debug)]
pub struct VariableDeclaration {
    pub kind: VarKind,
    pub declarations: Vec<VariableDeclarator>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Debug)]
pub struct VariableDeclarator {
    pub pattern: Pattern,
    pub init: Option<Expression>,
}

#[derive(Clone, Debug)]
pub enum Pattern {
    Identifier(String),
    Array(Vec<Option<ArrayPatternElement>>),
    Object(Vec<ObjectPatternProperty>),
    Assign(Box<Pattern>, Box<Expression>),
    /// Only valid as the last formal parameter.
    Rest(Box<Pattern>),
}

#[derive(Clone, Debug)]
pub enum ArrayPatternElement {
    Pattern(Pattern),
    Rest(Pattern),
}

#[derive(Clone, Debug)]
pub enum ObjectPatternProperty {
    KeyValue(PropertyKey, Pattern),
    Shorthand(String),
    Rest(Pattern),
}

#[derive(Clone, Debug)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    This,
    Super,
    Array(Vec<Option<Expression>>),
    Object(Vec<Property>),
    Function(FunctionExpr),
    ArrowFunction(ArrowFunction),
    Class(ClassExpr),
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Logical(LogicalOp, Box<Expression>, Box<Expression>),
    Update(UpdateOp, bool, Box<Expression>), // op, prefix, argument
    Assign(AssignOp, Box<Expression>, Box<Expression>),
    Conditional(Box<Expression>, Box<Expression>, Box<Expression>),
    Call(Box<Expression>, Vec<Expression>),
    New(Box<Expression>, Vec<Expression>),
    Member(Box<Expression>, MemberProperty),
    Spread(Box<Expression>),
    Template(TemplateLiteral),
    Typeof(Box<Expression>),
    Void(Box<Expression>),
    Delete(Box<Expression>),
    Sequence(Vec<Expression>),
}

#[derive(Clone, Debug)]
pub enum MemberProperty {
    Dot(String),
    Computed(Box<Expression>),
}

#[derive(Clone, Debug)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    LShift,
    RShift,
    URShift,
    BitAnd,
    BitOr,
    BitXor,
    In,
    Instanceof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    NullishCoalescing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ExpAssign,
    LShiftAssign,
    RShiftAssign,
    URShiftAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    LogicalAndAssign,
    LogicalOrAssign,
    NullishAssign,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::ModAssign => Some(BinaryOp::Mod),
            AssignOp::ExpAssign => Some(BinaryOp::Exp),
            AssignOp::LShiftAssign => Some(BinaryOp::LShift),
            AssignOp::RShiftAssign => Some(BinaryOp::RShift),
            AssignOp::URShiftAssign => Some(BinaryOp::URShift),
            AssignOp::BitAndAssign => Some(BinaryOp::BitAnd),
            AssignOp::BitOrAssign => Some(BinaryOp::BitOr),
            AssignOp::BitXorAssign => Some(BinaryOp::BitXor),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Property {
    /// `key: value`, shorthand `key`, or method `key() {}`.
    KeyValue(PropertyKey, Expression),
    Spread(Expression),
}

#[derive(Clone, Debug)]
pub enum PropertyKey {
    Identifier(String),
    String(String),
    Number(f64),
    Computed(Box<Expression>),
}

#[derive(Clone, Debug)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    pub alternate: Option<Box<Statement>>,
}

#[derive(Clone, Debug)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub struct DoWhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Expression>,
    pub update: Option<Expression>,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Expression),
}

#[derive(Clone, Debug)]
pub struct ForInStatement {
    pub left: ForInOfLeft,
    pub right: Expression,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub struct ForOfStatement {
    pub left: ForInOfLeft,
    pub right: Expression,
    pub body: Box<Statement>,
}

#[derive(Clone, Debug)]
pub enum ForInOfLeft {
    Variable(VariableDeclaration),
    Pattern(Pattern),
}

#[derive(Clone, Debug)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    pub handlers: Handlers,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<Pattern>,
    pub body: BlockNode,
}

#[derive(Clone, Debug)]
pub struct FunctionExpr {
    pub name: Option<String>,
    pub params: Vec<Pattern>,
    pub body: BlockNode,
}

/// Arrow bodies never carry clauses: an expression body is stored as a
/// single `return` statement.
#[derive(Clone, Debug)]
pub struct ArrowFunction {
    pub params: Vec<Pattern>,
    pub body: Vec<Statement>,
}

#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: String,
    pub super_class: Option<Box<Expression>>,
    pub body: Vec<ClassElement>,
    pub handlers: Handlers,
}

#[derive(Clone, Debug)]
pub struct ClassExpr {
    pub name: Option<String>,
    pub super_class: Option<Box<Expression>>,
    pub body: Vec<ClassElement>,
    pub handlers: Handlers,
}

#[derive(Clone, Debug)]
pub enum ClassElement {
    Method(ClassMethod),
    Property(ClassProperty),
    StaticBlock(Vec<Statement>),
}

#[derive(Clone, Debug)]
pub struct ClassMethod {
    pub key: PropertyKey,
    pub kind: ClassMethodKind,
    pub value: FunctionExpr,
    pub is_static: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassMethodKind {
    Method,
    Constructor,
}

#[derive(Clone, Debug)]
pub struct ClassProperty {
    pub key: PropertyKey,
    pub value: Option<Expression>,
    pub is_static: bool,
}

impl Expression {
    /// True only for function/class/arrow expressions that have no binding
    /// name of their own.
    pub fn is_anonymous_function_definition(&self) -> bool {
        match self {
            Expression::Function(f) => f.name.as_ref().is_none_or(|n| n.is_empty()),
            Expression::ArrowFunction(_) => true,
            Expression::Class(c) => c.name.as_ref().is_none_or(|n| n.is_empty()),
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TemplateLiteral {
    pub quasis: Vec<String>,
    pub expressions: Vec<Expression>,
}

/// Names bound by `var` declarations anywhere in `body`, not descending into
/// nested functions or classes. Declaration order, duplicates kept.
pub fn var_declared_names(body: &[Statement], names: &mut Vec<String>) {
    for stmt in body {
        var_names_in_statement(stmt, names);
    }
}

/// `var` names of a braced body and of its attached clauses.
pub fn block_var_declared_names(block: &BlockNode, names: &mut Vec<String>) {
    var_declared_names(&block.body, names);
    var_names_in_handlers(&block.handlers, names);
}

fn var_names_in_handlers(handlers: &Handlers, names: &mut Vec<String>) {
    for clause in &handlers.catches {
        block_var_declared_names(&clause.body, names);
    }
    if let Some(fin) = &handlers.finalizer {
        block_var_declared_names(fin, names);
    }
}

fn var_names_in_statement(stmt: &Statement, names: &mut Vec<String>) {
    match stmt {
        Statement::Variable(decl) if decl.kind == VarKind::Var => {
            for d in &decl.declarations {
                pattern_bound_names(&d.pattern, names);
            }
        }
        Statement::Block(block) | Statement::Try(block) => block_var_declared_names(block, names),
        Statement::If(s) => {
            var_names_in_statement(&s.consequent, names);
            if let Some(alt) = &s.alternate {
                var_names_in_statement(alt, names);
            }
        }
        Statement::While(s) => var_names_in_statement(&s.body, names),
        Statement::DoWhile(s) => var_names_in_statement(&s.body, names),
        Statement::For(s) => {
            if let Some(ForInit::Variable(decl)) = &s.init
                && decl.kind == VarKind::Var
            {
                for d in &decl.declarations {
                    pattern_bound_names(&d.pattern, names);
                }
            }
            var_names_in_statement(&s.body, names);
        }
        Statement::ForIn(ForInStatement { left, body, .. })
        | Statement::ForOf(ForOfStatement { left, body, .. }) => {
            if let ForInOfLeft::Variable(decl) = left
                && decl.kind == VarKind::Var
            {
                for d in &decl.declarations {
                    pattern_bound_names(&d.pattern, names);
                }
            }
            var_names_in_statement(body, names);
        }
        Statement::Switch(s) => {
            for case in &s.cases {
                var_declared_names(&case.consequent, names);
            }
            var_names_in_handlers(&s.handlers, names);
        }
        Statement::Labeled(_, body) => var_names_in_statement(body, names),
        Statement::ClassDeclaration(c) => var_names_in_handlers(&c.handlers, names),
        _ => {}
    }
}

/// Collects the identifiers a binding pattern introduces.
pub fn pattern_bound_names(pattern: &Pattern, names: &mut Vec<String>) {
    match pattern {
        Pattern::Identifier(name) => names.push(name.clone()),
        Pattern::Array(elems) => {
            for elem in elems.iter().flatten() {
                match elem {
                    ArrayPatternElement::Pattern(p) | ArrayPatternElement::Rest(p) => {
                        pattern_bound_names(p, names)
                    }
                }
            }
        }
        Pattern::Object(props) => {
            for prop in props {
                match prop {
                    ObjectPatternProperty::KeyValue(_, p) | ObjectPatternProperty::Rest(p) => {
                        pattern_bound_names(p, names)
                    }
                    ObjectPatternProperty::Shorthand(name) => names.push(name.clone()),
                }
            }
        }
        Pattern::Assign(inner, _) | Pattern::Rest(inner) => pattern_bound_names(inner, names),
    }
}

/// Names declared at the top level of a statement list by `let`, `const`,
/// `class` and block-scoped function declarations.
pub fn lexically_declared_names(body: &[Statement], names: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Statement::Variable(decl) if decl.kind != VarKind::Var => {
                for d in &decl.declarations {
                    pattern_bound_names(&d.pattern, names);
                }
            }
            Statement::FunctionDeclaration(f) => names.push(f.name.clone()),
            Statement::ClassDeclaration(c) => names.push(c.name.clone()),
            _ => {}
        }
    }
}
