use crate::ast::*;
use crate::scope::Scope;
use crate::types::Type;
use indexmap::IndexMap;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodegenError {
    /// A tree shape the generator has no lowering for. The analyzer should
    /// have rejected it, so this always points at a compiler bug.
    #[error("internal compiler error: {0}")]
    Defect(String),
}

type Result<T> = std::result::Result<T, CodegenError>;

fn defect<T>(message: impl Into<String>) -> Result<T> {
    Err(CodegenError::Defect(message.into()))
}

/// Lower an analyzed program to textual LLVM IR.
pub fn generate(statements: &[Stmt], scope: &Scope, target_triple: &str) -> Result<String> {
    CodeGen::new(scope).generate(statements, target_triple)
}

/// Global string constants, deduplicated by their source text and numbered
/// in order of first use.
#[derive(Debug, Default)]
pub struct StringTable {
    entries: IndexMap<String, usize>,
}

impl StringTable {
    pub fn intern(&mut self, raw: &str) -> usize {
        let next = self.entries.len();
        *self.entries.entry(raw.to_string()).or_insert(next)
    }

    /// One `@.str.N = constant ...` line per entry.
    pub fn emit(&self, out: &mut String) {
        for (raw, id) in &self.entries {
            let bytes = unescape(raw);
            out.push_str(&format!(
                "@.str.{} = constant [{} x i8] c\"{}\\00\"\n",
                id,
                bytes.len() + 1,
                escape(&bytes)
            ));
        }
    }
}

/// Decode the escapes a source string may contain. Unknown escapes are kept
/// as written.
fn unescape(raw: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        let decoded = if c == '\\' {
            match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('0') => '\0',
                Some('\\') => '\\',
                Some('"') => '"',
                Some(other) => {
                    bytes.push(b'\\');
                    other
                }
                None => '\\',
            }
        } else {
            c
        };
        let mut buf = [0; 4];
        bytes.extend_from_slice(decoded.encode_utf8(&mut buf).as_bytes());
    }
    bytes
}

fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\{:02X}", b));
        }
    }
    out
}

/// A stack slot backing a named variable.
#[derive(Debug, Clone)]
struct Local {
    slot: String,
    ty: Type,
}

pub struct CodeGen<'a> {
    scope: &'a Scope,
    strings: StringTable,
    out: String,

    // Per function state
    next_id: usize,
    locals: HashMap<String, Local>,
    terminated: bool,
    return_type: Option<Type>,
}

impl<'a> CodeGen<'a> {
    pub fn new(scope: &'a Scope) -> Self {
        CodeGen {
            scope,
            strings: StringTable::default(),
            out: String::new(),
            next_id: 0,
            locals: HashMap::new(),
            terminated: false,
            return_type: None,
        }
    }

    pub fn generate(mut self, statements: &[Stmt], target_triple: &str) -> Result<String> {
        let mut header = format!("target triple = \"{}\"\n", target_triple);

        // Struct types first, so every function can refer to them.
        for stmt in statements {
            if let Stmt::Struct(decl) = stmt {
                let fields: Vec<String> = decl.fields.iter().map(|(_, ty)| ty.llvm_name()).collect();
                header.push_str(&format!("%{} = type {{ {} }}\n", decl.name, fields.join(", ")));
            }
        }

        let mut first = true;
        for stmt in statements {
            match stmt {
                Stmt::Function(f) => {
                    if !first {
                        self.out.push('\n');
                    }
                    self.function(f)?;
                    first = false;
                }
                Stmt::Struct(_) => {}
                other => return defect(format!("statement outside a function: {:?}", other)),
            }
        }

        self.strings.emit(&mut header);
        Ok(format!(
            "{}\n{}\ndeclare i32 @printf(ptr, ...)\n",
            header, self.out
        ))
    }

    // ---- emission helpers ----

    fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn register(&mut self) -> String {
        format!("%id.{}", self.next_id())
    }

    fn new_label(&mut self, name: &str) -> String {
        format!("{}.{}", name, self.next_id())
    }

    /// Append one instruction. Code following a terminator gets its own
    /// block so every block keeps exactly one terminator.
    fn emit(&mut self, instruction: &str) {
        if self.terminated {
            let label = self.new_label("hidden_basic_block");
            self.out.push_str(&format!("{}:\n", label));
            self.terminated = false;
        }
        self.out.push_str("  ");
        self.out.push_str(instruction);
        self.out.push('\n');
    }

    fn terminate(&mut self, instruction: &str) {
        self.emit(instruction);
        self.terminated = true;
    }

    /// Branch to `label` unless the current block already ended.
    fn jump(&mut self, label: &str) {
        if !self.terminated {
            self.terminate(&format!("br label %{}", label));
        }
    }

    /// Open a new block, falling through into it from an unfinished one.
    fn start_block(&mut self, label: &str) {
        self.jump(label);
        self.out.push_str(&format!("{}:\n", label));
        self.terminated = false;
    }

    fn local(&self, name: &str) -> Result<Local> {
        match self.locals.get(name) {
            Some(local) => Ok(local.clone()),
            None => defect(format!("no stack slot for '{}'", name)),
        }
    }

    // ---- statements ----

    fn function(&mut self, f: &Function) -> Result<()> {
        self.next_id = 0;
        self.locals.clear();
        self.terminated = false;
        self.return_type = f.return_type.clone();

        let ret = f
            .return_type
            .as_ref()
            .map_or_else(|| "void".to_string(), Type::llvm_name);

        // Parameters take %id.0 .. %id.{n-1}; user registers start at n + 1.
        let ids: Vec<usize> = f.params.iter().map(|_| self.next_id()).collect();
        self.next_id();

        let signature: Vec<String> = f
            .params
            .iter()
            .zip(&ids)
            .map(|((_, ty), id)| format!("{} %id.{}", ty.llvm_name(), id))
            .collect();
        self.out.push_str(&format!(
            "define {} @{}({}) {{\n",
            ret,
            f.name,
            signature.join(", ")
        ));

        for ((name, ty), id) in f.params.iter().zip(&ids) {
            let llvm = ty.llvm_name();
            self.emit(&format!("%{} = alloca {}", name, llvm));
            self.emit(&format!("store {} %id.{}, ptr %{}", llvm, id, name));
            self.locals.insert(
                name.clone(),
                Local {
                    slot: name.clone(),
                    ty: ty.clone(),
                },
            );
        }

        for stmt in &f.body {
            self.statement(stmt)?;
        }

        if !self.terminated {
            if f.return_type.is_none() {
                self.terminate("ret void");
            } else {
                self.terminate("unreachable");
            }
        }
        self.out.push_str("}\n");
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expression(e) => {
                self.expr(e)?;
                Ok(())
            }
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.statement(s)?;
                }
                Ok(())
            }
            Stmt::VarDecl(decl) => self.var_decl(decl),
            Stmt::Return(value, _) => self.return_stmt(value.as_ref()),
            Stmt::If(cond, then, otherwise) => self.if_stmt(cond, then, otherwise.as_deref()),
            Stmt::For(start, cond, step, body) => {
                self.for_stmt(start.as_deref(), cond.as_ref(), step.as_ref(), body)
            }
            Stmt::Printf(format, args, _) => self.printf(format, args),
            Stmt::Function(f) => defect(format!("nested function '{}'", f.name)),
            Stmt::Struct(decl) => defect(format!("nested struct '{}'", decl.name)),
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) -> Result<()> {
        let Some(ty) = &decl.ty else {
            return defect(format!("untyped declaration of '{}'", decl.name));
        };
        let llvm = ty.llvm_name();

        // A redeclaration gets a fresh slot; the initializer still sees the
        // previous binding.
        let slot = if self.locals.contains_key(&decl.name) {
            format!("{}.{}", decl.name, self.next_id())
        } else {
            decl.name.clone()
        };
        self.emit(&format!("%{} = alloca {}", slot, llvm));

        let init = match &decl.init {
            Some(init) => Some(self.converted(init, ty)?),
            None => None,
        };
        self.locals.insert(
            decl.name.clone(),
            Local {
                slot: slot.clone(),
                ty: ty.clone(),
            },
        );
        if let Some(value) = init {
            self.emit(&format!("store {} {}, ptr %{}", llvm, value, slot));
        }
        Ok(())
    }

    fn return_stmt(&mut self, value: Option<&Expr>) -> Result<()> {
        match value {
            Some(v) => {
                let ty = match &self.return_type {
                    Some(ty) => ty.clone(),
                    None => return defect(format!("value returned from void function at {}", v.pos)),
                };
                let operand = self.converted(v, &ty)?;
                self.terminate(&format!("ret {} {}", ty.llvm_name(), operand));
            }
            None => self.terminate("ret void"),
        }
        Ok(())
    }

    fn if_stmt(&mut self, cond: &Expr, then: &Stmt, otherwise: Option<&Stmt>) -> Result<()> {
        let cond = self.value(cond)?;
        let body = self.new_label("if_body");
        let end = self.new_label("if_end");
        let else_body = match otherwise {
            Some(_) => Some(self.new_label("else_body")),
            None => None,
        };

        let on_false = else_body.as_deref().unwrap_or(&end);
        self.terminate(&format!("br i1 {}, label %{}, label %{}", cond, body, on_false));

        self.start_block(&body);
        self.statement(then)?;
        self.jump(&end);

        if let (Some(label), Some(otherwise)) = (&else_body, otherwise) {
            self.start_block(label);
            self.statement(otherwise)?;
            self.jump(&end);
        }

        self.start_block(&end);
        Ok(())
    }

    fn for_stmt(
        &mut self,
        start: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> Result<()> {
        let body_label = self.new_label("for_body");
        if let Some(start) = start {
            self.statement(start)?;
        }

        let Some(cond) = cond else {
            self.start_block(&body_label);
            self.statement(body)?;
            self.jump(&body_label);
            return Ok(());
        };

        let cond_label = self.new_label("for_condition");
        let end_label = self.new_label("for_end");
        let step_label = match step {
            Some(_) => Some(self.new_label("for_iteration")),
            None => None,
        };

        self.start_block(&cond_label);
        let cond = self.value(cond)?;
        self.terminate(&format!(
            "br i1 {}, label %{}, label %{}",
            cond, body_label, end_label
        ));

        self.start_block(&body_label);
        self.statement(body)?;

        if let (Some(label), Some(step)) = (&step_label, step) {
            self.start_block(label);
            self.expr(step)?;
        }
        self.jump(&cond_label);

        self.start_block(&end_label);
        Ok(())
    }

    fn printf(&mut self, format: &str, args: &[Expr]) -> Result<()> {
        let id = self.strings.intern(format);
        let mut operands = vec![format!("ptr @.str.{}", id)];
        for arg in args {
            let value = self.value(arg)?;
            let ty = expr_type(arg)?;
            // C varargs promote float to double.
            if *ty == Type::F32 {
                let widened = self.register();
                self.emit(&format!("{} = fpext float {} to double", widened, value));
                operands.push(format!("double {}", widened));
            } else {
                operands.push(format!("{} {}", ty.llvm_name(), value));
            }
        }
        let result = self.register();
        self.emit(&format!(
            "{} = call i32 (ptr, ...) @printf({})",
            result,
            operands.join(", ")
        ));
        Ok(())
    }

    // ---- expressions ----

    /// Lower an expression whose result is used.
    fn value(&mut self, e: &Expr) -> Result<String> {
        match self.expr(e)? {
            Some(operand) => Ok(operand),
            None => defect(format!("expression at {} produces no value", e.pos)),
        }
    }

    /// Lower an expression and return its operand: an inlined constant or
    /// the register holding the result. Void calls yield `None`.
    fn expr(&mut self, e: &Expr) -> Result<Option<String>> {
        if let Some(literal) = &e.literal {
            if e.ty == Some(Type::Str) {
                let id = self.strings.intern(literal);
                return Ok(Some(format!("@.str.{}", id)));
            }
            return Ok(Some(literal.clone()));
        }

        let operand = match &e.kind {
            ExprKind::Literal(_) => return defect(format!("unannotated literal at {}", e.pos)),
            ExprKind::Grouping(inner) => return self.expr(inner),
            ExprKind::Variable(name) => {
                let local = self.local(name)?;
                let result = self.register();
                self.emit(&format!(
                    "{} = load {}, ptr %{}",
                    result,
                    local.ty.llvm_name(),
                    local.slot
                ));
                result
            }
            ExprKind::Unary(op, operand) => self.unary(*op, operand)?,
            ExprKind::Binary(left, op, right) => self.binary(e, left, *op, right)?,
            ExprKind::Assign(target, op, value) => self.store(target, *op, value)?,
            ExprKind::Call(name, args) => return self.call(name, args),
            ExprKind::Index(..) | ExprKind::Field(..) => {
                let (address, ty) = self.address(e)?;
                let result = self.register();
                self.emit(&format!("{} = load {}, ptr {}", result, ty.llvm_name(), address));
                result
            }
        };
        Ok(Some(operand))
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<String> {
        let value = self.value(operand)?;
        let ty = expr_type(operand)?.llvm_name();
        let result = self.register();
        let instruction = match op {
            UnaryOp::Neg if expr_type(operand)?.is_float() => format!("fneg {} {}", ty, value),
            UnaryOp::Neg => format!("sub nsw {} 0, {}", ty, value),
            UnaryOp::Not => format!("icmp eq i1 {}, false", value),
        };
        self.emit(&format!("{} = {}", result, instruction));
        Ok(result)
    }

    /// The left operand decides the operand type of the instruction. The
    /// right operand is brought to that width, and an arithmetic result is
    /// brought to the width the analyzer gave the whole expression.
    fn binary(&mut self, e: &Expr, left: &Expr, op: BinOp, right: &Expr) -> Result<String> {
        let lhs = self.value(left)?;
        let ty = expr_type(left)?.clone();
        let rhs = self.converted(right, &ty)?;
        let result = self.operation(op, &ty, &lhs, &rhs)?;
        if op.is_comparison() {
            return Ok(result);
        }
        self.convert(result, &ty, expr_type(e)?, false)
    }

    /// Emit `lhs op rhs` with both operands already of type `ty`.
    fn operation(&mut self, op: BinOp, ty: &Type, lhs: &str, rhs: &str) -> Result<String> {
        let operation = if ty.is_float() {
            match op {
                BinOp::Add => "fadd",
                BinOp::Sub => "fsub",
                BinOp::Mul => "fmul",
                BinOp::Div => "fdiv",
                BinOp::Mod => "frem",
                BinOp::Eq => "fcmp oeq",
                BinOp::Ne => "fcmp one",
                BinOp::Gt => "fcmp ogt",
                BinOp::Ge => "fcmp oge",
                BinOp::Lt => "fcmp olt",
                BinOp::Le => "fcmp ole",
                BinOp::And | BinOp::Or => {
                    return defect(format!("logical '{}' on floats", op.symbol()))
                }
            }
        } else {
            match op {
                BinOp::Add => "add nsw",
                BinOp::Sub => "sub nsw",
                BinOp::Mul => "mul nsw",
                BinOp::Div => "sdiv",
                BinOp::Mod => "srem",
                BinOp::Eq => "icmp eq",
                BinOp::Ne => "icmp ne",
                BinOp::Gt => "icmp sgt",
                BinOp::Ge => "icmp sge",
                BinOp::Lt => "icmp slt",
                BinOp::Le => "icmp sle",
                BinOp::And => "and",
                BinOp::Or => "or",
            }
        };

        let llvm = ty.llvm_name();
        let result = self.register();
        self.emit(&format!("{} = {} {} {}, {}", result, operation, llvm, lhs, rhs));
        Ok(result)
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> Result<Option<String>> {
        let Some(sig) = self.scope.function(name) else {
            return defect(format!("call to unknown function '{}'", name));
        };
        let params = sig.params.clone();
        let ret = sig.ret.clone();

        let mut operands = Vec::with_capacity(args.len());
        for (arg, ty) in args.iter().zip(&params) {
            let value = self.converted(arg, ty)?;
            operands.push(format!("{} {}", ty.llvm_name(), value));
        }
        let operands = operands.join(", ");

        match ret {
            Some(ret) => {
                let result = self.register();
                self.emit(&format!(
                    "{} = call {} @{}({})",
                    result,
                    ret.llvm_name(),
                    name,
                    operands
                ));
                Ok(Some(result))
            }
            None => {
                self.emit(&format!("call void @{}({})", name, operands));
                Ok(None)
            }
        }
    }

    /// Every assignment ends here. The slot type decides the stored type.
    ///
    /// `x op= v` is stored as `x = x op v`, with the address of `x` computed
    /// once so an index expression runs a single time.
    fn store(&mut self, target: &Expr, op: AssignOp, value: &Expr) -> Result<String> {
        let (address, ty) = self.address(target)?;
        let operand = match op.binary_op() {
            Some(bin_op) => {
                let current = self.register();
                self.emit(&format!("{} = load {}, ptr {}", current, ty.llvm_name(), address));
                let rhs = self.converted(value, &ty)?;
                self.operation(bin_op, &ty, &current, &rhs)?
            }
            None => self.converted(value, &ty)?,
        };
        self.emit(&format!("store {} {}, ptr {}", ty.llvm_name(), operand, address));
        Ok(operand)
    }

    /// Lower `e` and bring the result to type `to`.
    fn converted(&mut self, e: &Expr, to: &Type) -> Result<String> {
        let operand = self.value(e)?;
        let constant = e.literal.is_some();
        self.convert(operand, expr_type(e)?, to, constant)
    }

    /// Widen or narrow a value between integer widths or float widths.
    /// Constants are spelled the same at every width and pass through.
    fn convert(&mut self, operand: String, from: &Type, to: &Type, constant: bool) -> Result<String> {
        if from == to || constant {
            return Ok(operand);
        }
        let instruction = match (int_width(from), int_width(to)) {
            (Some(a), Some(b)) if a < b && *from == Type::U8 => "zext",
            (Some(a), Some(b)) if a < b => "sext",
            (Some(_), Some(_)) => "trunc",
            _ => match (from, to) {
                (Type::F32, Type::F64) => "fpext",
                (Type::F64, Type::F32) => "fptrunc",
                _ => return defect(format!("no conversion from {} to {}", from, to)),
            },
        };
        let result = self.register();
        self.emit(&format!(
            "{} = {} {} {} to {}",
            result,
            instruction,
            from.llvm_name(),
            operand,
            to.llvm_name()
        ));
        Ok(result)
    }

    /// Pointer to the storage an lvalue names, with the type stored there.
    fn address(&mut self, target: &Expr) -> Result<(String, Type)> {
        match &target.kind {
            ExprKind::Variable(name) => {
                let local = self.local(name)?;
                Ok((format!("%{}", local.slot), local.ty))
            }
            ExprKind::Index(name, index) => {
                let local = self.local(name)?;
                let Some(elem) = local.ty.element().cloned() else {
                    return defect(format!("indexing non-array '{}'", name));
                };
                let value = self.value(index)?;
                let index_ty = expr_type(index)?;
                let offset = if *index_ty == Type::I64 {
                    value
                } else {
                    let widened = self.register();
                    self.emit(&format!(
                        "{} = sext {} {} to i64",
                        widened,
                        index_ty.llvm_name(),
                        value
                    ));
                    widened
                };
                let result = self.register();
                self.emit(&format!(
                    "{} = getelementptr inbounds {}, ptr %{}, i64 0, i64 {}",
                    result,
                    local.ty.llvm_name(),
                    local.slot,
                    offset
                ));
                Ok((result, elem))
            }
            ExprKind::Field(name, field) => {
                let local = self.local(name)?;
                let Type::Struct(strukt) = &local.ty else {
                    return defect(format!("field access on non-struct '{}'", name));
                };
                let Some((index, field_ty)) = self.scope.struct_field(strukt, field) else {
                    return defect(format!("unknown field '{}.{}'", strukt, field));
                };
                let field_ty = field_ty.clone();
                let result = self.register();
                self.emit(&format!(
                    "{} = getelementptr inbounds %{}, ptr %{}, i32 0, i32 {}",
                    result, strukt, local.slot, index
                ));
                Ok((result, field_ty))
            }
            _ => defect(format!("expression at {} is not assignable", target.pos)),
        }
    }
}

fn int_width(ty: &Type) -> Option<u32> {
    match ty {
        Type::U8 => Some(8),
        Type::I32 => Some(32),
        Type::I64 => Some(64),
        _ => None,
    }
}

fn expr_type(e: &Expr) -> Result<&Type> {
    match &e.ty {
        Some(ty) => Ok(ty),
        None => defect(format!("expression at {} has no type", e.pos)),
    }
}
