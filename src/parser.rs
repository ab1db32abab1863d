use crate::ast::*;
use crate::lexer::{Position, Token, TokenKind};
use crate::scope::{Scope, Signature};
use crate::types::Type;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("[Line {pos}] Error at '{found}': {message}")]
    Syntax {
        found: String,
        pos: Position,
        message: String,
    },
    #[error("[Line {pos}] Error at end: {message}")]
    UnexpectedEof { pos: Position, message: String },
}

impl ParseError {
    pub fn pos(&self) -> Position {
        match self {
            ParseError::Syntax { pos, .. } | ParseError::UnexpectedEof { pos, .. } => *pos,
        }
    }
}

/// Binding strength of infix operators, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // = += -= *= /= %=
    LogicalOr,
    LogicalAnd,
    Equality,   // == !=
    Comparison, // < <= > >=
    Term,       // + -
    Factor,     // * / %
    Unary,      // ! -
    Call,       // () [] .
    Primary,
}

impl Precedence {
    pub fn of(kind: Option<TokenKind>) -> Precedence {
        match kind {
            Some(
                TokenKind::Equals
                | TokenKind::PlusEquals
                | TokenKind::MinusEquals
                | TokenKind::StarEquals
                | TokenKind::SlashEquals
                | TokenKind::PercentEquals,
            ) => Precedence::Assignment,
            Some(TokenKind::Or) => Precedence::LogicalOr,
            Some(TokenKind::And) => Precedence::LogicalAnd,
            Some(TokenKind::DoubleEquals | TokenKind::NotEquals) => Precedence::Equality,
            Some(
                TokenKind::Less
                | TokenKind::LessEquals
                | TokenKind::Greater
                | TokenKind::GreaterEquals,
            ) => Precedence::Comparison,
            Some(TokenKind::Plus | TokenKind::Minus) => Precedence::Term,
            Some(TokenKind::Star | TokenKind::Slash | TokenKind::Percent) => Precedence::Factor,
            Some(TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot) => Precedence::Call,
            _ => Precedence::None,
        }
    }
}

/// Everything the parser hands to the semantic analyzer.
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub scope: Scope,
}

/// Parse a token stream, collecting every syntax error instead of stopping
/// at the first one. Faulty declarations are left out of the program.
pub fn parse(tokens: Vec<Token>) -> (Program, Vec<ParseError>) {
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    scope: Scope,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            scope: Scope::new(),
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Program, Vec<ParseError>) {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.is_at_end() {
            if let Some(stmt) = self.recovering_declaration() {
                statements.push(stmt);
            }
            self.skip_newlines();
        }

        let program = Program {
            statements,
            scope: self.scope,
        };
        (program, self.errors)
    }

    // ---- token helpers ----

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn check_ahead(&self, kinds: &[TokenKind]) -> bool {
        kinds
            .iter()
            .enumerate()
            .all(|(i, kind)| self.tokens.get(self.pos + i).map(|t| t.kind) == Some(*kind))
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume the current token only if it has the given kind.
    fn take(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            self.advance()
        } else {
            None
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, ParseError> {
        match self.take(kind) {
            Some(token) => Ok(token),
            None => Err(self.error_at_current(message)),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(TokenKind::Newline) {}
    }

    fn error_at(token: &Token, message: &str) -> ParseError {
        let found = if token.kind == TokenKind::Newline {
            "\\n".to_string()
        } else {
            token.text.clone()
        };
        ParseError::Syntax {
            found,
            pos: token.pos,
            message: message.to_string(),
        }
    }

    fn error_at_current(&self, message: &str) -> ParseError {
        match self.peek() {
            Some(token) => Self::error_at(token, message),
            None => ParseError::UnexpectedEof {
                pos: self.tokens.last().map(|t| t.pos).unwrap_or_default(),
                message: message.to_string(),
            },
        }
    }

    /// Simple statements end at a newline. A closing brace or the end of
    /// input also ends one, without being consumed.
    fn end_statement(&mut self) -> Result<(), ParseError> {
        if self.eat(TokenKind::Newline) || self.check(TokenKind::RBrace) || self.is_at_end() {
            Ok(())
        } else {
            Err(self.error_at_current("Expected newline at end of statement."))
        }
    }

    // ---- error recovery ----

    fn recovering_declaration(&mut self) -> Option<Stmt> {
        match self.declaration() {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    /// Skip to the next statement boundary: just past a newline, or right
    /// before a keyword that starts a declaration or statement.
    fn synchronize(&mut self) {
        if self.eat(TokenKind::Newline) {
            return;
        }
        self.advance();
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Newline => {
                    self.advance();
                    return;
                }
                TokenKind::Fn
                | TokenKind::Struct
                | TokenKind::If
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Printf => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- declarations ----

    fn declaration(&mut self) -> Result<Stmt, ParseError> {
        if self.check(TokenKind::Fn) {
            return self.function_declaration();
        }
        if self.check(TokenKind::Struct) {
            return self.struct_declaration();
        }
        if self.check_ahead(&[TokenKind::Identifier, TokenKind::ColonEquals])
            || self.check_ahead(&[TokenKind::Identifier, TokenKind::Colon])
        {
            return self.var_declaration();
        }
        self.statement()
    }

    fn function_declaration(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.expect(TokenKind::Fn, "Expected 'fn'.")?;
        let name = self.expect(TokenKind::Identifier, "Expected function name.")?;
        self.expect(TokenKind::LParen, "Expected '(' after function name.")?;

        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let param = self.expect(TokenKind::Identifier, "Expected parameter name.")?;
            self.expect(TokenKind::Colon, "Expected ':' after parameter name.")?;
            let ty = self.parse_type()?;
            params.push((param.text, ty));
            // Trailing commas are fine.
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected ')' after parameters.")?;

        let return_type = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        // Registered before the body so recursive calls resolve.
        self.scope.add_function(
            &name.text,
            Signature {
                params: params.iter().map(|(_, ty)| ty.clone()).collect(),
                ret: return_type.clone(),
            },
        );

        self.expect(TokenKind::LBrace, "Expected '{' before function body.")?;
        let body = self.block()?;

        Ok(Stmt::Function(Function {
            name: name.text,
            params,
            return_type,
            body,
            pos: keyword.pos,
        }))
    }

    fn struct_declaration(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.expect(TokenKind::Struct, "Expected 'struct'.")?;
        let name = self.expect(TokenKind::Identifier, "Expected struct name.")?;
        self.expect(TokenKind::LBrace, "Expected '{' after struct name.")?;
        self.skip_newlines();

        let mut layout = IndexMap::new();
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let field = self.expect(TokenKind::Identifier, "Expected field name.")?;
            self.expect(TokenKind::Colon, "Expected ':' after field name.")?;
            let ty = self.parse_type()?;
            if layout.insert(field.text.clone(), ty.clone()).is_some() {
                return Err(Self::error_at(&field, "Duplicate field."));
            }
            fields.push((field.text, ty));
            self.eat(TokenKind::Comma);
            self.skip_newlines();
        }
        self.expect(TokenKind::RBrace, "Expected '}' after struct fields.")?;
        self.skip_newlines();

        self.scope.add_struct(&name.text, layout);
        Ok(Stmt::Struct(StructDecl {
            name: name.text,
            fields,
            pos: keyword.pos,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.expect(TokenKind::Identifier, "Expected variable name.")?;

        let (ty, init) = if self.eat(TokenKind::ColonEquals) {
            (None, Some(self.expression()?))
        } else {
            self.expect(TokenKind::Colon, "Expected ':=' or ':' after variable name.")?;
            let ty = self.parse_type()?;
            let init = if self.eat(TokenKind::Equals) {
                Some(self.expression()?)
            } else {
                None
            };
            (Some(ty), init)
        };
        self.end_statement()?;

        Ok(Stmt::VarDecl(VarDecl {
            name: name.text,
            ty,
            init,
            pos: name.pos,
        }))
    }

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        if self.eat(TokenKind::LBracket) {
            let len = if let Some(token) = self.take(TokenKind::IntegerLiteral) {
                match token.text.parse::<u32>() {
                    Ok(n) => Some(n),
                    Err(_) => return Err(Self::error_at(&token, "Invalid array length.")),
                }
            } else {
                None
            };
            self.expect(TokenKind::RBracket, "Expected ']' in array type.")?;
            let elem = self.parse_type()?;
            return Ok(Type::Array(Box::new(elem), len));
        }

        let name = self.expect(TokenKind::Identifier, "Expected type.")?;
        Ok(Type::primitive(&name.text).unwrap_or(Type::Struct(name.text)))
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Return) => self.return_statement(),
            Some(TokenKind::If) => {
                self.advance();
                self.if_statement()
            }
            Some(TokenKind::LBrace) => {
                self.advance();
                Ok(Stmt::Block(self.block()?))
            }
            Some(TokenKind::For) => self.for_statement(),
            Some(TokenKind::Printf) => self.printf_statement(),
            _ => self.expression_statement(),
        }
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.expect(TokenKind::Return, "Expected 'return'.")?;
        let value = if self.check(TokenKind::Newline)
            || self.check(TokenKind::RBrace)
            || self.is_at_end()
        {
            None
        } else {
            Some(self.expression()?)
        };
        self.end_statement()?;
        Ok(Stmt::Return(value, keyword.pos))
    }

    /// Called with `if` already consumed, so `else if` chains recurse here.
    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        let cond = self.expression()?;
        self.expect(TokenKind::LBrace, "Expected '{' after if condition.")?;
        let body = Box::new(Stmt::Block(self.block()?));

        let else_branch = if self.eat(TokenKind::Else) {
            if self.eat(TokenKind::LBrace) {
                Some(Box::new(Stmt::Block(self.block()?)))
            } else if self.eat(TokenKind::If) {
                Some(Box::new(self.if_statement()?))
            } else {
                return Err(self.error_at_current("Expected '{' or 'if' after else."));
            }
        } else {
            None
        };

        Ok(Stmt::If(cond, body, else_branch))
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.expect(TokenKind::For, "Expected 'for'.")?;

        // for { ... }
        if self.eat(TokenKind::LBrace) {
            let body = Box::new(Stmt::Block(self.block()?));
            return Ok(Stmt::For(None, None, None, body));
        }

        let start = if self.check_ahead(&[TokenKind::Identifier, TokenKind::ColonEquals]) {
            let name = self.expect(TokenKind::Identifier, "Expected variable name.")?;
            self.expect(TokenKind::ColonEquals, "Expected ':=' after variable name.")?;
            let init = self.expression()?;
            Stmt::VarDecl(VarDecl {
                name: name.text,
                ty: None,
                init: Some(init),
                pos: name.pos,
            })
        } else {
            let first = self.expression()?;
            // for condition { ... }
            if self.eat(TokenKind::LBrace) {
                let body = Box::new(Stmt::Block(self.block()?));
                return Ok(Stmt::For(None, Some(first), None, body));
            }
            Stmt::Expression(first)
        };

        // for start, condition, step { ... }
        self.expect(TokenKind::Comma, "Expected ',' after for-loop start.")?;
        let cond = self.expression()?;
        self.expect(TokenKind::Comma, "Expected ',' after for-loop condition.")?;
        let step = self.expression()?;
        self.expect(TokenKind::LBrace, "Expected '{' before for-loop body.")?;
        let body = Box::new(Stmt::Block(self.block()?));

        Ok(Stmt::For(Some(Box::new(start)), Some(cond), Some(step), body))
    }

    fn printf_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.expect(TokenKind::Printf, "Expected 'printf'.")?;
        self.expect(TokenKind::LParen, "printf needs '('.")?;
        let format = self.expect(
            TokenKind::StringLiteral,
            "printf needs a format string like \"%d\\n\".",
        )?;

        let mut args = Vec::new();
        while self.eat(TokenKind::Comma) {
            args.push(self.expression()?);
        }
        self.expect(TokenKind::RParen, "printf needs a closing ')'.")?;
        self.end_statement()?;

        Ok(Stmt::Printf(trim_quotes(&format.text), args, keyword.pos))
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.end_statement()?;
        Ok(Stmt::Expression(expr))
    }

    /// Parse statements up to the matching `}`; the `{` is already consumed.
    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            if let Some(stmt) = self.recovering_declaration() {
                stmts.push(stmt);
            }
            self.skip_newlines();
        }
        self.expect(TokenKind::RBrace, "Expected '}' after block.")?;
        self.skip_newlines();
        Ok(stmts)
    }

    // ---- expressions ----

    pub fn expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_precedence(Precedence::None)
    }

    /// Precedence climbing: keep folding infix operators into `left` while
    /// they bind tighter than `min`.
    fn parse_precedence(&mut self, min: Precedence) -> Result<Expr, ParseError> {
        let starts = self.peek_kind().is_some_and(starts_expression);
        let Some(token) = (if starts { self.advance() } else { None }) else {
            return Err(self.error_at_current("Expected expression."));
        };
        let mut left = self.prefix(token)?;

        while Precedence::of(self.peek_kind()) > min {
            let Some(op) = self.advance() else { break };
            left = self.infix(left, op)?;
        }

        Ok(left)
    }

    fn prefix(&mut self, token: Token) -> Result<Expr, ParseError> {
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::IntegerLiteral => match token.text.parse::<i64>() {
                Ok(n) => ExprKind::Literal(Literal::Integer(n)),
                Err(_) => return Err(Self::error_at(&token, "Integer literal out of range.")),
            },
            TokenKind::FloatLiteral => match token.text.parse::<f64>() {
                Ok(n) => ExprKind::Literal(Literal::Float(n)),
                Err(_) => return Err(Self::error_at(&token, "Invalid float literal.")),
            },
            TokenKind::StringLiteral => ExprKind::Literal(Literal::Str(trim_quotes(&token.text))),
            TokenKind::True => ExprKind::Literal(Literal::Bool(true)),
            TokenKind::False => ExprKind::Literal(Literal::Bool(false)),
            TokenKind::Identifier => return self.identifier(token),
            TokenKind::Minus => {
                let operand = self.parse_precedence(Precedence::Unary)?;
                ExprKind::Unary(UnaryOp::Neg, Box::new(operand))
            }
            TokenKind::Not => {
                let operand = self.parse_precedence(Precedence::Unary)?;
                ExprKind::Unary(UnaryOp::Not, Box::new(operand))
            }
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "Expected ')' after expression.")?;
                ExprKind::Grouping(Box::new(inner))
            }
            _ => return Err(Self::error_at(&token, "Expected expression.")),
        };
        Ok(Expr::new(kind, pos))
    }

    /// Calls, indexing and field access bind directly to the name.
    fn identifier(&mut self, name: Token) -> Result<Expr, ParseError> {
        let pos = name.pos;

        if self.eat(TokenKind::LParen) {
            let mut args = Vec::new();
            while !self.eat(TokenKind::RParen) {
                args.push(self.expression()?);
                if !self.eat(TokenKind::Comma) {
                    self.expect(TokenKind::RParen, "Expected ')' after arguments.")?;
                    break;
                }
            }
            return Ok(Expr::new(ExprKind::Call(name.text, args), pos));
        }

        if self.eat(TokenKind::LBracket) {
            let index = self.expression()?;
            self.expect(TokenKind::RBracket, "Expected ']' after index.")?;
            return Ok(Expr::new(ExprKind::Index(name.text, Box::new(index)), pos));
        }

        if self.eat(TokenKind::Dot) {
            let field = self.expect(TokenKind::Identifier, "Expected field name after '.'.")?;
            return Ok(Expr::new(ExprKind::Field(name.text, field.text), pos));
        }

        Ok(Expr::new(ExprKind::Variable(name.text), pos))
    }

    fn infix(&mut self, left: Expr, op: Token) -> Result<Expr, ParseError> {
        let precedence = Precedence::of(Some(op.kind));
        if precedence == Precedence::Call {
            return Err(Self::error_at(&op, "Only names can be called, indexed or accessed."));
        }
        let right = self.parse_precedence(precedence)?;
        let pos = left.pos;

        if precedence == Precedence::Assignment {
            if !left.is_lvalue() {
                return Err(Self::error_at(&op, "Invalid assignment target."));
            }
            let assign_op = match op.kind {
                TokenKind::PlusEquals => AssignOp::AddAssign,
                TokenKind::MinusEquals => AssignOp::SubAssign,
                TokenKind::StarEquals => AssignOp::MulAssign,
                TokenKind::SlashEquals => AssignOp::DivAssign,
                TokenKind::PercentEquals => AssignOp::ModAssign,
                _ => AssignOp::Assign,
            };
            return Ok(Expr::new(
                ExprKind::Assign(Box::new(left), assign_op, Box::new(right)),
                pos,
            ));
        }

        let bin_op = match op.kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            TokenKind::DoubleEquals => BinOp::Eq,
            TokenKind::NotEquals => BinOp::Ne,
            TokenKind::Less => BinOp::Lt,
            TokenKind::Greater => BinOp::Gt,
            TokenKind::LessEquals => BinOp::Le,
            TokenKind::GreaterEquals => BinOp::Ge,
            TokenKind::And => BinOp::And,
            TokenKind::Or => BinOp::Or,
            _ => return Err(Self::error_at(&op, "Unknown operator.")),
        };
        Ok(Expr::new(
            ExprKind::Binary(Box::new(left), bin_op, Box::new(right)),
            pos,
        ))
    }
}

fn starts_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Identifier
            | TokenKind::Minus
            | TokenKind::Not
            | TokenKind::LParen
    )
}

fn trim_quotes(text: &str) -> String {
    text.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text)
        .to_string()
}
