use crate::lexer::Position;
use crate::types::Type;

/// An expression node.
///
/// `ty` and `literal` are empty after parsing and are filled in by the
/// semantic analyzer. `literal` holds the inlined IR text for operands
/// known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
    pub ty: Option<Type>,
    pub literal: Option<String>,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Expr {
            kind,
            pos,
            ty: None,
            literal: None,
        }
    }

    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Variable(_) | ExprKind::Index(_, _) | ExprKind::Field(_, _)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Literal(Literal),
    Grouping(Box<Expr>),
    Variable(String),

    // target = value, target += value, ...
    Assign(Box<Expr>, AssignOp, Box<Expr>),

    Call(String, Vec<Expr>),
    Index(String, Box<Expr>), // array[index]
    Field(String, String),    // value.field
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Comparison and equality operators always produce `bool`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
}

impl AssignOp {
    /// The arithmetic behind a compound assignment, `None` for plain `=`.
    pub fn binary_op(self) -> Option<BinOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinOp::Add),
            AssignOp::SubAssign => Some(BinOp::Sub),
            AssignOp::MulAssign => Some(BinOp::Mul),
            AssignOp::DivAssign => Some(BinOp::Div),
            AssignOp::ModAssign => Some(BinOp::Mod),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
            AssignOp::ModAssign => "%=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expression(Expr),
    Block(Vec<Stmt>),
    Function(Function),
    VarDecl(VarDecl),

    // Control flow
    Return(Option<Expr>, Position),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    // for start, condition, step { body }
    For(Option<Box<Stmt>>, Option<Expr>, Option<Expr>, Box<Stmt>),

    // printf("format", args...)
    Printf(String, Vec<Expr>, Position),

    Struct(StructDecl),
}

impl Stmt {
    /// Where the statement starts, as far as the tree still knows it.
    pub fn pos(&self) -> Position {
        match self {
            Stmt::Expression(e) => e.pos,
            Stmt::Block(stmts) => stmts.first().map(Stmt::pos).unwrap_or_default(),
            Stmt::Function(f) => f.pos,
            Stmt::VarDecl(decl) => decl.pos,
            Stmt::Return(_, pos) | Stmt::Printf(_, _, pos) => *pos,
            Stmt::If(cond, _, _) => cond.pos,
            Stmt::For(start, cond, _, body) => match (start, cond) {
                (Some(start), _) => start.pos(),
                (None, Some(cond)) => cond.pos,
                (None, None) => body.pos(),
            },
            Stmt::Struct(decl) => decl.pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<(String, Type)>,
    pub return_type: Option<Type>,
    pub body: Vec<Stmt>,
    pub pos: Position,
}

/// `name := init`, `name : ty` or `name : ty = init`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<Type>,
    pub init: Option<Expr>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub pos: Position,
}
