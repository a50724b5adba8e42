//! Tree-walking interpreter for parsed scripts.

use super::Bindings;
use super::ast::{BinaryOp, Expr, ExprKind, Stmt, Target, UnaryOp};
use super::error::{ScriptError, ScriptErrorKind};
use crate::cvars::{Value, is_valid_name};
use std::cmp::Ordering;

type IResult<T> = Result<T, ScriptError>;

/// Executes statements against one page's bindings, collecting everything
/// `print` emits.
pub struct Interpreter<'a> {
    bindings: &'a mut Bindings,
    output: String,
}

impl<'a> Interpreter<'a> {
    pub fn new(bindings: &'a mut Bindings) -> Self {
        Self {
            bindings,
            output: String::new(),
        }
    }

    pub fn run(mut self, stmts: &[Stmt]) -> IResult<String> {
        self.exec_all(stmts)?;
        Ok(self.output)
    }

    fn exec_all(&mut self, stmts: &[Stmt]) -> IResult<()> {
        for stmt in stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                match target {
                    Target::Global(name) => {
                        self.bindings.globals.insert(name.clone(), value);
                    }
                    Target::Cvar(name) => self.bindings.cvars.set(name.clone(), value),
                }
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.is_truthy() {
                        return self.exec_all(body);
                    }
                }
                if let Some(body) = otherwise {
                    self.exec_all(body)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&mut self, expr: &Expr) -> IResult<Value> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::Global(name) => self.bindings.globals.get(name).cloned().ok_or_else(|| {
                ScriptError::new(line, ScriptErrorKind::UndefinedVariable(name.clone()))
            }),
            ExprKind::Cvar(name) => Ok(self.bindings.cvars.get(name).cloned().unwrap_or_default()),
            ExprKind::Unary(op, operand) => {
                let value = self.eval(operand)?;
                unary(*op, value).map_err(|kind| ScriptError::new(line, kind))
            }
            ExprKind::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right).map_err(|kind| ScriptError::new(line, kind))
            }
            ExprKind::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            ExprKind::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            ExprKind::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<IResult<Vec<_>>>()?;
                self.call(name, args)
                    .map_err(|kind| ScriptError::new(line, kind))
            }
        }
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ScriptErrorKind> {
        if name == "print" {
            let parts: Vec<String> = args.iter().map(Value::to_string).collect();
            self.output.push_str(&parts.join(" "));
            return Ok(Value::Null);
        }
        if name == "defined" {
            let [key] = arity::<1>(name, args)?;
            return match key {
                Value::Str(key) => Ok(Value::Bool(
                    is_valid_name(&key) && self.bindings.cvars.contains(&key),
                )),
                other => Err(type_error("defined", "string", &other)),
            };
        }
        builtin(name, args)
    }
}

/// Side-effect free built-in functions.
fn builtin(name: &str, args: Vec<Value>) -> Result<Value, ScriptErrorKind> {
    match name {
        "str" => {
            let [v] = arity::<1>(name, args)?;
            Ok(Value::Str(v.to_string()))
        }
        "int" => {
            let [v] = arity::<1>(name, args)?;
            to_int(v)
        }
        "float" => {
            let [v] = arity::<1>(name, args)?;
            to_float(v)
        }
        "len" => {
            let [v] = arity::<1>(name, args)?;
            let s = expect_str(name, v)?;
            Ok(Value::Int(s.chars().count() as i64))
        }
        "upper" => {
            let [v] = arity::<1>(name, args)?;
            Ok(Value::Str(expect_str(name, v)?.to_uppercase()))
        }
        "lower" => {
            let [v] = arity::<1>(name, args)?;
            Ok(Value::Str(expect_str(name, v)?.to_lowercase()))
        }
        "trim" => {
            let [v] = arity::<1>(name, args)?;
            Ok(Value::Str(expect_str(name, v)?.trim().to_string()))
        }
        "replace" => {
            let [s, from, to] = arity::<3>(name, args)?;
            let s = expect_str(name, s)?;
            let from = expect_str(name, from)?;
            let to = expect_str(name, to)?;
            if from.is_empty() {
                return Err(ScriptErrorKind::Type(
                    "`replace` pattern must not be empty".to_string(),
                ));
            }
            Ok(Value::Str(s.replace(&from, &to)))
        }
        "escape" => {
            let [v] = arity::<1>(name, args)?;
            Ok(Value::Str(escape_html(&v.to_string())))
        }
        "default" => {
            let [v, fallback] = arity::<2>(name, args)?;
            Ok(if v == Value::Null { fallback } else { v })
        }
        _ => Err(ScriptErrorKind::UnknownFunction(name.to_string())),
    }
}

fn arity<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ScriptErrorKind> {
    let got = args.len();
    args.try_into().map_err(|_| ScriptErrorKind::Arity {
        name: name.to_string(),
        expected: ["0", "1", "2", "3"].get(N).copied().unwrap_or("several"),
        got,
    })
}

fn type_error(func: &str, expected: &str, got: &Value) -> ScriptErrorKind {
    ScriptErrorKind::Type(format!(
        "`{}` expects {}, got {}",
        func,
        expected,
        got.type_name()
    ))
}

fn expect_str(func: &str, value: Value) -> Result<String, ScriptErrorKind> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(type_error(func, "a string", &other)),
    }
}

fn to_int(value: Value) -> Result<Value, ScriptErrorKind> {
    match value {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Bool(b) => Ok(Value::Int(b as i64)),
        Value::Float(x) if x.is_finite() && x.abs() < i64::MAX as f64 => Ok(Value::Int(x as i64)),
        Value::Str(ref s) => s
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| ScriptErrorKind::Type(format!("cannot convert {:?} to int", s))),
        other => Err(type_error("int", "a number or numeric string", &other)),
    }
}

fn to_float(value: Value) -> Result<Value, ScriptErrorKind> {
    match value {
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Float(x) => Ok(Value::Float(x)),
        Value::Str(ref s) => s
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|_| ScriptErrorKind::Type(format!("cannot convert {:?} to float", s))),
        other => Err(type_error("float", "a number or numeric string", &other)),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, ScriptErrorKind> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or(ScriptErrorKind::Overflow),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, other) => Err(ScriptErrorKind::Type(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ScriptErrorKind> {
    let mismatch = || ScriptErrorKind::BinaryType {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match op {
        BinaryOp::Eq => return Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::Ne => return Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(left, right).ok_or_else(mismatch)?;
            let result = match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    match (left, right) {
        (Value::Str(_), _) | (_, Value::Str(_)) if op == BinaryOp::Add => {
            Ok(Value::Str(format!("{}{}", left, right)))
        }
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (as_f64(left), as_f64(right));
            match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                BinaryOp::Div if b == 0.0 => Err(ScriptErrorKind::DivisionByZero),
                BinaryOp::Div => Ok(Value::Float(a / b)),
                BinaryOp::Rem if b == 0.0 => Err(ScriptErrorKind::DivisionByZero),
                BinaryOp::Rem => Ok(Value::Float(a % b)),
                _ => Err(mismatch()),
            }
        }
        _ => Err(mismatch()),
    }
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, ScriptErrorKind> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(ScriptErrorKind::DivisionByZero),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Rem => a.checked_rem(b),
        _ => {
            return Err(ScriptErrorKind::BinaryType {
                op: op.symbol(),
                left: "int",
                right: "int",
            });
        }
    };
    result.map(Value::Int).ok_or(ScriptErrorKind::Overflow)
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            as_f64(left) == as_f64(right)
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            as_f64(left).partial_cmp(&as_f64(right))
        }
        _ => None,
    }
}
