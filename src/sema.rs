use crate::ast::*;
use crate::lexer::Position;
use crate::scope::Scope;
use crate::types::Type;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("[Line {pos}] Undefined variable '{name}'")]
    UndefinedVariable { name: String, pos: Position },
    #[error("[Line {pos}] Undefined function '{name}'")]
    UndefinedFunction { name: String, pos: Position },
    #[error("[Line {pos}] Undefined struct '{name}'")]
    UndefinedStruct { name: String, pos: Position },
    #[error("[Line {pos}] Struct '{strukt}' has no field '{field}'")]
    UndefinedField {
        strukt: String,
        field: String,
        pos: Position,
    },
    #[error("[Line {pos}] Function '{name}' takes {expected} argument(s) but {found} were given")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
        pos: Position,
    },
    #[error("[Line {pos}] Function '{name}' returns nothing, its result cannot be used")]
    VoidValue { name: String, pos: Position },
    #[error("[Line {pos}] '{name}' has type {ty} and cannot be indexed")]
    NotIndexable { name: String, ty: Type, pos: Position },
    #[error("[Line {pos}] '{name}' has type {ty} and has no fields")]
    NotAStruct { name: String, ty: Type, pos: Position },
    #[error("[Line {pos}] Operator '{op}' cannot be applied to {ty}")]
    InvalidOperand {
        op: &'static str,
        ty: Type,
        pos: Position,
    },
    #[error("[Line {pos}] Condition must be bool, found {ty}")]
    NonBooleanCondition { ty: Type, pos: Position },
    #[error("[Line {pos}] '{name}' needs a fixed array length")]
    UnsizedArray { name: String, pos: Position },
    #[error("[Line {pos}] {what} is not allowed here")]
    MisplacedStatement { what: &'static str, pos: Position },
    #[error("[Line {pos}] Expected {expected}, found {found}")]
    TypeMismatch {
        expected: Type,
        found: Type,
        pos: Position,
    },
    #[error("[Line {pos}] Function '{name}' returns {expected} but this return gives {found}")]
    ReturnMismatch {
        name: String,
        expected: String,
        found: String,
        pos: Position,
    },
    #[error("[Line {pos}] Integer literal {value} does not fit in i32")]
    IntegerOverflow { value: i64, pos: Position },
    #[error("[Line {pos}] Struct '{name}' contains itself")]
    RecursiveStruct { name: String, pos: Position },
}

/// Resolve names and annotate every expression with its type, in place.
///
/// Stops at the first error. On success the scope is handed back so the
/// code generator can look up signatures and struct layouts.
pub fn analyze(statements: &mut [Stmt], scope: Scope) -> Result<Scope, SemanticError> {
    let mut analyzer = Analyzer {
        scope,
        function: String::new(),
        return_type: None,
    };
    for stmt in statements.iter_mut() {
        analyzer.top_level(stmt)?;
    }
    Ok(analyzer.scope)
}

struct Analyzer {
    scope: Scope,
    // The function being analyzed
    function: String,
    return_type: Option<Type>,
}

impl Analyzer {
    fn top_level(&mut self, stmt: &mut Stmt) -> Result<(), SemanticError> {
        match stmt {
            Stmt::Function(f) => self.function(f),
            Stmt::Struct(decl) => {
                for (field, ty) in &decl.fields {
                    self.check_type(field, ty, decl.pos)?;
                    if self.contains_struct(ty, &decl.name, &mut Vec::new()) {
                        return Err(SemanticError::RecursiveStruct {
                            name: decl.name.clone(),
                            pos: decl.pos,
                        });
                    }
                }
                Ok(())
            }
            other => Err(SemanticError::MisplacedStatement {
                what: describe(other),
                pos: other.pos(),
            }),
        }
    }

    fn function(&mut self, f: &mut Function) -> Result<(), SemanticError> {
        self.scope.reset_vars();
        self.function = f.name.clone();
        self.return_type = f.return_type.clone();
        for (name, ty) in &f.params {
            self.check_type(name, ty, f.pos)?;
            self.scope.add_var(name, ty.clone());
        }
        if let Some(ret) = &f.return_type {
            self.check_type(&f.name, ret, f.pos)?;
        }
        for stmt in f.body.iter_mut() {
            self.statement(stmt)?;
        }
        Ok(())
    }

    /// Struct names must be declared, and storage needs a known size.
    fn check_type(&self, name: &str, ty: &Type, pos: Position) -> Result<(), SemanticError> {
        match ty {
            Type::Array(_, None) => Err(SemanticError::UnsizedArray {
                name: name.to_string(),
                pos,
            }),
            Type::Array(elem, Some(_)) => self.check_type(name, elem, pos),
            Type::Struct(s) if !self.scope.has_struct(s) => Err(SemanticError::UndefinedStruct {
                name: s.clone(),
                pos,
            }),
            _ => Ok(()),
        }
    }

    /// Whether a value of type `ty` holds a `target` struct, directly or
    /// through arrays and other structs.
    fn contains_struct(&self, ty: &Type, target: &str, seen: &mut Vec<String>) -> bool {
        match ty {
            Type::Array(elem, _) => self.contains_struct(elem, target, seen),
            Type::Struct(name) if name == target => true,
            Type::Struct(name) => {
                if seen.contains(name) {
                    return false;
                }
                seen.push(name.clone());
                match self.scope.struct_fields(name) {
                    Some(fields) => fields
                        .values()
                        .any(|field| self.contains_struct(field, target, seen)),
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn statement(&mut self, stmt: &mut Stmt) -> Result<(), SemanticError> {
        match stmt {
            Stmt::Expression(e) => self.expr(e),
            Stmt::Block(stmts) => {
                for s in stmts.iter_mut() {
                    self.statement(s)?;
                }
                Ok(())
            }
            Stmt::Function(_) | Stmt::Struct(_) => Err(SemanticError::MisplacedStatement {
                what: describe(stmt),
                pos: stmt.pos(),
            }),
            Stmt::VarDecl(decl) => self.var_decl(decl),
            Stmt::Return(value, pos) => self.return_stmt(value.as_mut(), *pos),
            Stmt::If(cond, then, otherwise) => {
                self.condition(cond)?;
                self.statement(then)?;
                if let Some(otherwise) = otherwise {
                    self.statement(otherwise)?;
                }
                Ok(())
            }
            Stmt::For(start, cond, step, body) => {
                if let Some(start) = start {
                    self.statement(start)?;
                }
                if let Some(cond) = cond {
                    self.condition(cond)?;
                }
                if let Some(step) = step {
                    self.expr(step)?;
                }
                self.statement(body)
            }
            Stmt::Printf(_, args, _) => {
                for (arg, param) in args.iter_mut().zip(&sig.params) {
                    let ty = self.value(arg)?;
                    expect_kind(param, &ty, arg.pos)?;
                }
                Ok(())
            }
        }
    }

    fn return_stmt(&mut self, value: Option<&mut Expr>, pos: Position) -> Result<(), SemanticError> {
        let found = match value {
            Some(v) => Some(self.value(v)?),
            None => None,
        };
        let matches = match (&self.return_type, &found) {
            (Some(expected), Some(found)) => same_kind(expected, found),
            (None, None) => true,
            _ => false,
        };
        if matches {
            return Ok(());
        }
        let spell = |ty: &Option<Type>| match ty {
            Some(ty) => ty.to_string(),
            None => "nothing".to_string(),
        };
        Err(SemanticError::ReturnMismatch {
            name: self.function.clone(),
            expected: spell(&self.return_type),
            found: spell(&found),
            pos,
        })
    }

    fn var_decl(&mut self, decl: &mut VarDecl) -> Result<(), SemanticError> {
        let init_ty = match &mut decl.init {
            Some(init) => Some(self.value(init)?),
            None => None,
        };
        if let (Some(declared), Some(init), Some(init_ty)) = (&decl.ty, &decl.init, &init_ty) {
            expect_kind(declared, init_ty, init.pos)?;
        }
        // An explicit type wins over the initializer's.
        let Some(ty) = decl.ty.clone().or(init_ty) else {
            return Err(SemanticError::VoidValue {
                name: decl.name.clone(),
                pos: decl.pos,
            });
        };
        self.check_type(&decl.name, &ty, decl.pos)?;
        self.scope.add_var(&decl.name, ty.clone());
        decl.ty = Some(ty);
        Ok(())
    }

    fn condition(&mut self, cond: &mut Expr) -> Result<(), SemanticError> {
        let ty = self.value(cond)?;
        if ty != Type::Bool {
            return Err(SemanticError::NonBooleanCondition { ty, pos: cond.pos });
        }
        Ok(())
    }

    /// Analyze an expression whose result is used, so it must have a type.
    fn value(&mut self, e: &mut Expr) -> Result<Type, SemanticError> {
        self.expr(e)?;
        match &e.ty {
            Some(ty) => Ok(ty.clone()),
            None => Err(SemanticError::VoidValue {
                name: match &e.kind {
                    ExprKind::Call(name, _) => name.clone(),
                    _ => "expression".to_string(),
                },
                pos: e.pos,
            }),
        }
    }

    fn expr(&mut self, e: &mut Expr) -> Result<(), SemanticError> {
        let pos = e.pos;
        let (ty, literal) = match &mut e.kind {
            ExprKind::Literal(lit) => {
                let (ty, text) = match lit {
                    Literal::Integer(n) if *n > i32::MAX as i64 => {
                        return Err(SemanticError::IntegerOverflow { value: *n, pos });
                    }
                    Literal::Integer(n) => (Type::I32, n.to_string()),
                    Literal::Float(n) => (Type::F32, float_literal(*n)),
                    Literal::Str(s) => (Type::Str, s.clone()),
                    Literal::Bool(b) => (Type::Bool, b.to_string()),
                };
                (Some(ty), Some(text))
            }

            ExprKind::Grouping(inner) => {
                self.value(inner)?;
                (inner.ty.clone(), inner.literal.clone())
            }

            ExprKind::Unary(op, operand) => {
                let ty = self.value(operand)?;
                let literal = match op {
                    UnaryOp::Neg if !ty.is_numeric() => {
                        return Err(SemanticError::InvalidOperand { op: op.symbol(), ty, pos });
                    }
                    UnaryOp::Not if ty != Type::Bool => {
                        return Err(SemanticError::InvalidOperand { op: op.symbol(), ty, pos });
                    }
                    UnaryOp::Neg if ty.is_integer() => operand.literal.as_deref().map(negate),
                    UnaryOp::Not => match operand.literal.as_deref() {
                        Some("true") => Some("false".to_string()),
                        Some("false") => Some("true".to_string()),
                        _ => None,
                    },
                    UnaryOp::Neg => None,
                };
                (Some(ty), literal)
            }

            ExprKind::Binary(left, op, right) => {
                let left_ty = self.value(left)?;
                let right_ty = self.value(right)?;
                let op = *op;
                for ty in [&left_ty, &right_ty] {
                    check_operand(op, ty, pos)?;
                }
                expect_kind(&left_ty, &right_ty, right.pos)?;
                let ty = if op.is_comparison() {
                    Type::Bool
                } else {
                    right_ty
                };
                (Some(ty), None)
            }

            ExprKind::Variable(name) => match self.scope.var(name) {
                Some(ty) => (Some(ty.clone()), None),
                None => {
                    return Err(SemanticError::UndefinedVariable {
                        name: name.clone(),
                        pos,
                    })
                }
            },

            ExprKind::Assign(target, op, value) => {
                let target_ty = self.value(target)?;
                if let Some(bin_op) = op.binary_op() {
                    if !target_ty.is_numeric() {
                        return Err(SemanticError::InvalidOperand {
                            op: bin_op.symbol(),
                            ty: target_ty,
                            pos,
                        });
                    }
                }
                let value_ty = self.value(value)?;
                expect_kind(&target_ty, &value_ty, value.pos)?;
                (Some(value_ty), None)
            }

            ExprKind::Call(name, args) => {
                let Some(sig) = self.scope.function(name).cloned() else {
                    return Err(SemanticError::UndefinedFunction {
                        name: name.clone(),
                        pos,
                    });
                };
                if sig.params.len() != args.len() {
                    return Err(SemanticError::ArgumentCount {
                        name: name.clone(),
                        expected: sig.params.len(),
                        found: args.len(),
                        pos,
                    });
                }
                for arg in args.iter_mut() {
                    self.value(arg)?;
                }
                (sig.ret, None)
            }

            ExprKind::Index(name, index) => {
                let array_ty = self.var_type(name, pos)?;
                let Some(elem) = array_ty.element().cloned() else {
                    return Err(SemanticError::NotIndexable {
                        name: name.clone(),
                        ty: array_ty,
                        pos,
                    });
                };
                let index_ty = self.value(index)?;
                if !index_ty.is_integer() {
                    return Err(SemanticError::InvalidOperand {
                        op: "[]",
                        ty: index_ty,
                        pos: index.pos,
                    });
                }
                (Some(elem), None)
            }

            ExprKind::Field(name, field) => {
                let ty = self.var_type(name, pos)?;
                let strukt = match &ty {
                    Type::Struct(strukt) => strukt.clone(),
                    _ => {
                        return Err(SemanticError::NotAStruct {
                            name: name.clone(),
                            ty,
                            pos,
                        })
                    }
                };
                match self.scope.struct_field(&strukt, field) {
                    Some((_, field_ty)) => (Some(field_ty.clone()), None),
                    None => {
                        return Err(SemanticError::UndefinedField {
                            strukt,
                            field: field.clone(),
                            pos,
                        })
                    }
                }
            }
        };

        e.ty = ty;
        e.literal = literal;
        Ok(())
    }

    fn var_type(&self, name: &str, pos: Position) -> Result<Type, SemanticError> {
        self.scope
            .var(name)
            .cloned()
            .ok_or_else(|| SemanticError::UndefinedVariable {
                name: name.to_string(),
                pos,
            })
    }
}

/// Integers convert between widths and floats between precisions; every
/// other type only matches itself.
fn same_kind(a: &Type, b: &Type) -> bool {
    (a.is_integer() && b.is_integer()) || (a.is_float() && b.is_float()) || a == b
}

fn expect_kind(expected: &Type, found: &Type, pos: Position) -> Result<(), SemanticError> {
    if same_kind(expected, found) {
        Ok(())
    } else {
        Err(SemanticError::TypeMismatch {
            expected: expected.clone(),
            found: found.clone(),
            pos,
        })
    }
}

fn check_operand(op: BinOp, ty: &Type, pos: Position) -> Result<(), SemanticError> {
    let ok = match op {
        BinOp::And | BinOp::Or => *ty == Type::Bool,
        BinOp::Eq | BinOp::Ne => ty.is_numeric() || *ty == Type::Bool,
        _ => ty.is_numeric(),
    };
    if ok {
        Ok(())
    } else {
        Err(SemanticError::InvalidOperand {
            op: op.symbol(),
            ty: ty.clone(),
            pos,
        })
    }
}

/// IR spells float constants as the hex bits of the double holding the
/// single precision value.
pub fn float_literal(value: f64) -> String {
    format!("0x{:016X}", ((value as f32) as f64).to_bits())
}

fn negate(literal: &str) -> String {
    match literal.strip_prefix('-') {
        Some(positive) => positive.to_string(),
        None => format!("-{}", literal),
    }
}

fn describe(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::Expression(_) => "An expression statement",
        Stmt::Block(_) => "A block",
        Stmt::Function(_) => "A nested function",
        Stmt::VarDecl(_) => "A global variable",
        Stmt::Return(..) => "A return statement",
        Stmt::If(..) => "An if statement",
        Stmt::For(..) => "A for loop",
        Stmt::Printf(..) => "A printf statement",
        Stmt::Struct(_) => "A nested struct",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn analyze_source(source: &str) -> (Vec<Stmt>, Result<Scope, SemanticError>) {
        let (program, errors) = parse(lex(source).unwrap());
        assert!(errors.is_empty(), "unexpected syntax errors: {:?}", errors);
        let mut statements = program.statements;
        let result = analyze(&mut statements, program.scope);
        (statements, result)
    }

    fn analyze_ok(source: &str) -> Vec<Stmt> {
        let (statements, result) = analyze_source(source);
        if let Err(e) = result {
            panic!("unexpected semantic error: {}", e);
        }
        statements
    }

    fn analyze_err(source: &str) -> SemanticError {
        analyze_source(source).1.unwrap_err()
    }

    fn body(statements: &[Stmt], index: usize) -> &[Stmt] {
        match &statements[index] {
            Stmt::Function(f) => &f.body,
            other => panic!("expected function, got {:?}", other),
        }
    }

    fn init(stmt: &Stmt) -> &Expr {
        match stmt {
            Stmt::VarDecl(VarDecl { init: Some(e), .. }) => e,
            other => panic!("expected initialized declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_is_bool_and_keeps_left_type() {
        let statements = analyze_ok("fn f(a: i64, b: i32) -> bool {\n  return a > b\n}\n");
        let Stmt::Return(Some(cmp), _) = &body(&statements, 0)[0] else {
            panic!("expected return");
        };
        assert_eq!(cmp.ty, Some(Type::Bool));
        let ExprKind::Binary(left, _, _) = &cmp.kind else {
            panic!("expected binary");
        };
        assert_eq!(left.ty, Some(Type::I64));
    }

    #[test]
    fn test_literal_annotations() {
        let statements = analyze_ok(
            "fn f() {\n  a := 7\n  b := 2.5\n  c := \"hi\"\n  d := true\n  e := -5\n}\n",
        );
        let stmts = body(&statements, 0);
        let annotations: Vec<(Option<Type>, Option<String>)> = stmts
            .iter()
            .map(|s| (init(s).ty.clone(), init(s).literal.clone()))
            .collect();
        assert_eq!(
            annotations,
            vec![
                (Some(Type::I32), Some("7".to_string())),
                (Some(Type::F32), Some("0x4004000000000000".to_string())),
                (Some(Type::Str), Some("hi".to_string())),
                (Some(Type::Bool), Some("true".to_string())),
                (Some(Type::I32), Some("-5".to_string())),
            ]
        );
    }

    #[test]
    fn test_float_literal_is_rounded_to_single_precision() {
        // 0.1 is not exact in f32, so the bits differ from the f64 encoding.
        assert_eq!(float_literal(0.1), "0x3FB99999A0000000");
        assert_eq!(float_literal(1.0), "0x3FF0000000000000");
    }

    #[test]
    fn test_binary_takes_right_operand_type() {
        let statements = analyze_ok("fn f(a: i64) {\n  x := a + 1\n}\n");
        let Stmt::VarDecl(decl) = &body(&statements, 0)[0] else {
            panic!("expected declaration");
        };
        assert_eq!(decl.ty, Some(Type::I32));
    }

    #[test]
    fn test_explicit_type_wins() {
        let statements = analyze_ok("fn f() {\n  x : i64 = 3\n  y : [4]i32\n}\n");
        let stmts = body(&statements, 0);
        let Stmt::VarDecl(x) = &stmts[0] else {
            panic!("expected declaration");
        };
        assert_eq!(x.ty, Some(Type::I64));
        assert_eq!(init(&stmts[0]).ty, Some(Type::I32));
        let Stmt::VarDecl(y) = &stmts[1] else {
            panic!("expected declaration");
        };
        assert_eq!(y.ty, Some(Type::Array(Box::new(Type::I32), Some(4))));
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(
            analyze_err("fn f() { y = 1 }"),
            SemanticError::UndefinedVariable {
                name: "y".to_string(),
                pos: Position::new(1, 10),
            }
        );
    }

    #[test]
    fn test_variables_do_not_leak_between_functions() {
        let err = analyze_err("fn a() {\n  x := 1\n}\nfn b() {\n  x = 2\n}\n");
        assert!(matches!(err, SemanticError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_forward_call_resolves() {
        let statements =
            analyze_ok("fn a() -> i64 {\n  return b(1)\n}\nfn b(n: i32) -> i64 {\n  return 2\n}\n");
        let Stmt::Return(Some(call), _) = &body(&statements, 0)[0] else {
            panic!("expected return");
        };
        assert_eq!(call.ty, Some(Type::I64));
    }

    #[test]
    fn test_call_errors() {
        assert!(matches!(
            analyze_err("fn f() {\n  g()\n}\n"),
            SemanticError::UndefinedFunction { .. }
        ));
        assert!(matches!(
            analyze_err("fn g(a: i32) {\n}\nfn f() {\n  g()\n}\n"),
            SemanticError::ArgumentCount {
                expected: 1,
                found: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_void_call_only_as_statement() {
        analyze_ok("fn g() {\n}\nfn f() {\n  g()\n}\n");
        assert_eq!(
            analyze_err("fn g() {\n}\nfn f() {\n  x := g()\n}\n"),
            SemanticError::VoidValue {
                name: "g".to_string(),
                pos: Position::new(4, 8),
            }
        );
    }

    #[test]
    fn test_operand_checks() {
        assert!(matches!(
            analyze_err("fn f() {\n  x := !3\n}\n"),
            SemanticError::InvalidOperand { op: "!", .. }
        ));
        assert!(matches!(
            analyze_err("fn f() {\n  x := -true\n}\n"),
            SemanticError::InvalidOperand { op: "-", .. }
        ));
        assert!(matches!(
            analyze_err("fn f() {\n  x := 1 && true\n}\n"),
            SemanticError::InvalidOperand { op: "&&", .. }
        ));
    }

    #[test]
    fn test_condition_must_be_bool() {
        assert!(matches!(
            analyze_err("fn f() {\n  if 1 {\n  }\n}\n"),
            SemanticError::NonBooleanCondition { ty: Type::I32, .. }
        ));
        assert!(matches!(
            analyze_err("fn f() {\n  for 2 {\n  }\n}\n"),
            SemanticError::NonBooleanCondition { .. }
        ));
    }

    #[test]
    fn test_index_and_field_types() {
        let statements = analyze_ok(
            "struct P {\n  x: i32\n  y: f64\n}\nfn f() {\n  xs : [4]i64\n  p : P\n  a := xs[1]\n  b := p.y\n}\n",
        );
        let stmts = body(&statements, 1);
        assert_eq!(init(&stmts[2]).ty, Some(Type::I64));
        assert_eq!(init(&stmts[3]).ty, Some(Type::F64));
    }

    #[test]
    fn test_index_and_field_errors() {
        assert!(matches!(
            analyze_err("fn f() {\n  n := 1\n  m := n[0]\n}\n"),
            SemanticError::NotIndexable { ty: Type::I32, .. }
        ));
        assert!(matches!(
            analyze_err("fn f() {\n  n := 1\n  m := n.x\n}\n"),
            SemanticError::NotAStruct { .. }
        ));
        assert!(matches!(
            analyze_err("struct P {\n  x: i32\n}\nfn f() {\n  p : P\n  m := p.z\n}\n"),
            SemanticError::UndefinedField { .. }
        ));
        assert!(matches!(
            analyze_err("fn f() {\n  q : Q\n}\n"),
            SemanticError::UndefinedStruct { .. }
        ));
    }

    #[test]
    fn test_unsized_array_storage() {
        assert!(matches!(
            analyze_err("fn f(xs: []i32) {\n}\n"),
            SemanticError::UnsizedArray { .. }
        ));
    }

    #[test]
    fn test_return_must_match_function() {
        assert_eq!(
            analyze_err("fn f() {\n  return 5\n}\n"),
            SemanticError::ReturnMismatch {
                name: "f".to_string(),
                expected: "nothing".to_string(),
                found: "i32".to_string(),
                pos: Position::new(2, 3),
            }
        );
        assert_eq!(
            analyze_err("fn g() -> i32 {\n  return\n}\n"),
            SemanticError::ReturnMismatch {
                name: "g".to_string(),
                expected: "i32".to_string(),
                found: "nothing".to_string(),
                pos: Position::new(2, 3),
            }
        );
        assert!(matches!(
            analyze_err("fn h() -> bool {\n  return 1\n}\n"),
            SemanticError::ReturnMismatch { .. }
        ));
        analyze_ok("fn k() -> i64 {\n  return 1\n}\nfn v() {\n  return\n}\n");
    }

    #[test]
    fn test_values_must_match_their_destination() {
        assert_eq!(
            analyze_err("fn f() {\n  x := 1\n  x = 2.5\n}\n"),
            SemanticError::TypeMismatch {
                expected: Type::I32,
                found: Type::F32,
                pos: Position::new(3, 7),
            }
        );
        assert!(matches!(
            analyze_err("fn f() {\n  b := true\n  b = 3\n}\n"),
            SemanticError::TypeMismatch { expected: Type::Bool, .. }
        ));
        assert!(matches!(
            analyze_err("fn f() {\n  s : string = 1\n}\n"),
            SemanticError::TypeMismatch { expected: Type::Str, .. }
        ));
        assert!(matches!(
            analyze_err("fn g(n: i64) {\n}\nfn f() {\n  g(true)\n}\n"),
            SemanticError::TypeMismatch { expected: Type::I64, found: Type::Bool, .. }
        ));
        assert!(matches!(
            analyze_err("fn f(a: f32) {\n  x := a + 1\n}\n"),
            SemanticError::TypeMismatch { expected: Type::F32, found: Type::I32, .. }
        ));
        // Widths of the same kind are converted, not rejected.
        analyze_ok("fn g(n: i64) {\n}\nfn f() {\n  x := 1\n  g(x)\n  y : f64 = 1.5\n}\n");
    }

    #[test]
    fn test_integer_literal_range() {
        analyze_ok("fn f() -> i32 {\n  return 2147483647\n}\n");
        assert_eq!(
            analyze_err("fn f() -> i32 {\n  return 3000000000\n}\n"),
            SemanticError::IntegerOverflow {
                value: 3000000000,
                pos: Position::new(2, 10),
            }
        );
    }

    #[test]
    fn test_struct_cannot_contain_itself() {
        assert!(matches!(
            analyze_err("struct A {\n  a: A\n}\n"),
            SemanticError::RecursiveStruct { .. }
        ));
        assert!(matches!(
            analyze_err("struct A {\n  xs: [2]A\n}\n"),
            SemanticError::RecursiveStruct { .. }
        ));
        assert!(matches!(
            analyze_err("struct A {\n  b: B\n}\nstruct B {\n  a: A\n}\n"),
            SemanticError::RecursiveStruct { .. }
        ));
        analyze_ok("struct P {\n  x: i32\n}\nstruct L {\n  a: P\n  b: P\n}\n");
    }

    #[test]
    fn test_misplaced_statements() {
        assert!(matches!(
            analyze_err("printf(\"hi\")\n"),
            SemanticError::MisplacedStatement { .. }
        ));
        assert!(matches!(
            analyze_err("fn f() {\n  fn g() {\n  }\n}\n"),
            SemanticError::MisplacedStatement { .. }
        ));
    }
}
