//! Evaluation of linked scripts.

use crate::check::{resolve_fun, Scripts, PRINTLN};
use crate::expr::{BinOp, Block, Expr, ExprKind, Stmt};
use crate::script::FunDecl;
use kiln_common::{ModuleName, QualifiedName};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

const MAX_DEPTH: usize = 512;

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    /// An integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A string.
    Str(String),
    /// The unit value.
    Unit,
    /// A top-level function.
    Fun(QualifiedName),
    /// A closure passed to a handler.
    Closure(Rc<Closure>),
}

/// A closure with its defining module and captured locals.
#[derive(Debug)]
pub struct Closure {
    module: ModuleName,
    body: Block,
    locals: Vec<(String, Value)>,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Str(s) => f.write_str(s),
            Value::Unit => f.write_str("()"),
            Value::Fun(name) => write!(f, "<{name}>"),
            Value::Closure(_) => f.write_str("<closure>"),
        }
    }
}

/// What a running program writes: printed lines and entered handlers.
#[derive(Clone, Default, Debug)]
pub struct Console {
    /// Printed lines, in order.
    pub output: Rc<RefCell<Vec<String>>>,
    /// Handlers entered, outermost first.
    pub trace: Rc<RefCell<Vec<String>>>,
}

/// Runs the zero-argument function `main`.
pub fn run(scripts: &Scripts, console: &Console, main: &QualifiedName) -> Result<Value, String> {
    let fun = scripts
        .get(&main.module)
        .and_then(|script| script.fun(&main.name))
        .ok_or_else(|| format!("no function '{main}'"))?;
    let mut interp = Interp {
        scripts,
        console,
        depth: 0,
    };
    interp.call(&main.module, fun, Vec::new())
}

struct Interp<'a> {
    scripts: &'a Scripts,
    console: &'a Console,
    depth: usize,
}

type Locals = Vec<(String, Value)>;

impl Interp<'_> {
    fn call(&mut self, module: &ModuleName, fun: &FunDecl, args: Vec<Value>) -> Result<Value, String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(format!("stack overflow in '{}'", fun.name));
        }
        let mut locals: Locals = fun.params.iter().cloned().zip(args).collect();
        let value = self.block(module, &mut locals, &fun.body);
        self.depth -= 1;
        value
    }

    fn block(&mut self, module: &ModuleName, locals: &mut Locals, block: &Block) -> Result<Value, String> {
        let depth = locals.len();
        let mut last = Value::Unit;
        for stmt in &block.stmts {
            match stmt {
                Stmt::Val(name, expr) => {
                    let value = self.eval(module, locals, expr)?;
                    if name != "_" {
                        locals.push((name.clone(), value));
                    }
                }
                Stmt::Expr(expr) => last = self.eval(module, locals, expr)?,
            }
        }
        locals.truncate(depth);
        Ok(last)
    }

    fn eval(&mut self, module: &ModuleName, locals: &mut Locals, expr: &Expr) -> Result<Value, String> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Unit => Ok(Value::Unit),
            ExprKind::Binary(op, lhs, rhs) => {
                let lhs = self.eval(module, locals, lhs)?;
                let rhs = self.eval(module, locals, rhs)?;
                let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) else {
                    return Err(format!("cannot apply '{op}' to {lhs} and {rhs}"));
                };
                let result = match op {
                    BinOp::Add => a.checked_add(*b),
                    BinOp::Sub => a.checked_sub(*b),
                    BinOp::Mul => a.checked_mul(*b),
                };
                result
                    .map(Value::Int)
                    .ok_or_else(|| "arithmetic overflow".to_string())
            }
            ExprKind::Lambda(body) => Ok(Value::Closure(Rc::new(Closure {
                module: module.clone(),
                body: body.clone(),
                locals: locals.clone(),
            }))),
            ExprKind::Name(name) => {
                if let Some((_, value)) = locals.iter().rev().find(|(n, _)| n == name) {
                    return Ok(value.clone());
                }
                resolve_fun(self.scripts, module, name)
                    .map(|(qname, _)| Value::Fun(qname))
                    .ok_or_else(|| format!("unknown identifier '{name}'"))
            }
            ExprKind::Call(name, args) if name == PRINTLN => {
                let mut line = String::new();
                for arg in args {
                    line.push_str(&self.eval(module, locals, arg)?.to_string());
                }
                self.console.output.borrow_mut().push(line);
                Ok(Value::Unit)
            }
            ExprKind::Call(name, args) => {
                let local = locals
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone());
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(module, locals, arg)?);
                }
                match local {
                    Some(value) => self.apply(value, values),
                    None => {
                        let (qname, fun) = resolve_fun(self.scripts, module, name)
                            .ok_or_else(|| format!("unknown function '{name}'"))?;
                        if fun.is_handler() {
                            self.console.trace.borrow_mut().push(qname.to_string());
                        }
                        self.call(&qname.module, fun, values)
                    }
                }
            }
        }
    }

    fn apply(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, String> {
        match callee {
            Value::Closure(closure) => {
                let mut locals = closure.locals.clone();
                self.block(&closure.module, &mut locals, &closure.body)
            }
            Value::Fun(qname) => {
                let scripts = self.scripts;
                let fun = scripts
                    .get(&qname.module)
                    .and_then(|script| script.fun(&qname.name))
                    .ok_or_else(|| format!("unknown function '{qname}'"))?;
                self.call(&qname.module, fun, args)
            }
            other => Err(format!("{other} is not a function")),
        }
    }
}
