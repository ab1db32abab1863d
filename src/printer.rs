use crate::ast::*;

/// Render an expression as an s-expression, e.g. `(+ 1 (* 2 3))`.
pub fn expr(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Literal(lit) => literal(lit),
        ExprKind::Variable(name) => name.clone(),
        ExprKind::Grouping(inner) => parenthesize("group", &[expr(inner)]),
        ExprKind::Unary(op, operand) => parenthesize(op.symbol(), &[expr(operand)]),
        ExprKind::Binary(left, op, right) => parenthesize(op.symbol(), &[expr(left), expr(right)]),
        ExprKind::Assign(target, op, value) => {
            parenthesize(op.symbol(), &[expr(target), expr(value)])
        }
        ExprKind::Call(name, args) => {
            let args: Vec<String> = args.iter().map(expr).collect();
            parenthesize(name, &args)
        }
        ExprKind::Index(name, index) => parenthesize("[]", &[name.clone(), expr(index)]),
        ExprKind::Field(name, field) => parenthesize(".", &[name.clone(), field.clone()]),
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Integer(n) => n.to_string(),
        Literal::Float(n) => n.to_string(),
        Literal::Str(s) => format!("\"{}\"", s),
        Literal::Bool(b) => b.to_string(),
    }
}

/// Render a statement, nesting bodies inline.
pub fn stmt(s: &Stmt) -> String {
    match s {
        Stmt::Expression(e) => expr(e),
        Stmt::Block(stmts) => parenthesize("block", &stmts.iter().map(stmt).collect::<Vec<_>>()),
        Stmt::VarDecl(decl) => {
            let mut parts = vec![decl.name.clone()];
            if let Some(ty) = &decl.ty {
                parts.push(ty.to_string());
            }
            if let Some(init) = &decl.init {
                parts.push(expr(init));
            }
            parenthesize("var", &parts)
        }
        Stmt::Function(f) => {
            let params: Vec<String> = f
                .params
                .iter()
                .map(|(name, ty)| format!("{}: {}", name, ty))
                .collect();
            let mut parts = vec![f.name.clone(), parenthesize("params", &params)];
            if let Some(ret) = &f.return_type {
                parts.push(parenthesize("returns", &[ret.to_string()]));
            }
            let body: Vec<String> = f.body.iter().map(stmt).collect();
            parts.push(parenthesize("body", &body));
            parenthesize("fn", &parts)
        }
        Stmt::Return(value, _) => match value {
            Some(v) => parenthesize("return", &[expr(v)]),
            None => "(return)".to_string(),
        },
        Stmt::If(cond, then, otherwise) => {
            let mut parts = vec![expr(cond), stmt(then)];
            if let Some(otherwise) = otherwise {
                parts.push(stmt(otherwise));
            }
            parenthesize("if", &parts)
        }
        Stmt::For(start, cond, step, body) => {
            let mut parts = Vec::new();
            if let Some(start) = start {
                parts.push(parenthesize("start", &[stmt(start)]));
            }
            if let Some(cond) = cond {
                parts.push(parenthesize("condition", &[expr(cond)]));
            }
            if let Some(step) = step {
                parts.push(parenthesize("step", &[expr(step)]));
            }
            parts.push(stmt(body));
            parenthesize("for", &parts)
        }
        Stmt::Printf(format, args, _) => {
            let mut parts = vec![format!("\"{}\"", format)];
            parts.extend(args.iter().map(expr));
            parenthesize("printf", &parts)
        }
        Stmt::Struct(decl) => {
            let mut parts = vec![decl.name.clone()];
            parts.extend(
                decl.fields
                    .iter()
                    .map(|(name, ty)| format!("({} {})", name, ty)),
            );
            parenthesize("struct", &parts)
        }
    }
}

/// One line per top-level statement.
pub fn program(stmts: &[Stmt]) -> String {
    stmts.iter().map(stmt).collect::<Vec<_>>().join("\n")
}

fn parenthesize(name: &str, parts: &[String]) -> String {
    if parts.is_empty() {
        format!("({})", name)
    } else {
        format!("({} {})", name, parts.join(" "))
    }
}
