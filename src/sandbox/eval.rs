//! 脚本求值：变量环境、内置函数、工具绑定调用
//!
//! 工具调用是异步的，因此求值函数返回 BoxFuture 以支持递归。
//! 数值语义贴近 Python：`/` 恒为浮点，`//` 与 `%` 向下取整，整数溢出时退化为浮点。

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::sandbox::parser::{BinOp, Expr, FStrPart, Stmt};
use crate::sandbox::ScriptError;
use crate::tools::Tool;

const BUILTINS: &[&str] = &[
    "print", "str", "len", "abs", "round", "int", "float", "bool", "min", "max", "sum", "sorted",
];

const TRUNCATION_NOTICE: &str = "\n...[output truncated]\n";

/// 单个值的大小上限：字符串按字节计，列表按元素递归累计
pub const MAX_VALUE_SIZE: usize = 1_000_000;
/// 列表嵌套层数上限
pub const MAX_LIST_DEPTH: usize = 100;

/// 脚本中的值
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// 工具绑定（按绑定名）
    Tool(String),
    Builtin(&'static str),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tool(_) => "tool",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Tool(_) | Value::Builtin(_) => true,
        }
    }

    /// 等价于 Python 的 str()
    pub fn to_display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// 等价于 Python 的 repr()
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::List(items) => format!(
                "[{}]",
                items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
            ),
            Value::Tool(name) => format!("<tool {name}>"),
            Value::Builtin(name) => format!("<built-in function {name}>"),
        }
    }

    /// (大小, 列表嵌套深度)
    fn footprint(&self) -> (usize, usize) {
        match self {
            Value::Str(s) => (s.len(), 0),
            Value::List(items) => list_footprint(items),
            _ => (1, 0),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }
}

/// Python 风格浮点格式：整数值保留 `.0`，极大/极小值用 `e+XX` / `e-XX`
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let sci = format!("{f:e}");
        return match sci.split_once('e') {
            Some((mantissa, exp)) => {
                let (sign, digits) = match exp.strip_prefix('-') {
                    Some(d) => ('-', d),
                    None => ('+', exp),
                };
                format!("{mantissa}e{sign}{digits:0>2}")
            }
            None => sci,
        };
    }
    if f == f.trunc() {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

type EvalResult = Result<Value, ScriptError>;

pub(crate) struct Interpreter<'b> {
    bindings: &'b HashMap<String, Arc<dyn Tool>>,
    vars: HashMap<String, Value>,
    stdout: String,
    stdout_chars: usize,
    max_output_chars: usize,
    truncated: bool,
    final_answer: Option<String>,
}

impl<'b> Interpreter<'b> {
    /// max_output_chars 为 0 表示不限制
    pub(crate) fn new(bindings: &'b HashMap<String, Arc<dyn Tool>>, max_output_chars: usize) -> Self {
        Self {
            bindings,
            vars: HashMap::new(),
            stdout: String::new(),
            stdout_chars: 0,
            max_output_chars,
            truncated: false,
            final_answer: None,
        }
    }

    pub(crate) fn finish(self) -> (String, Option<String>) {
        (self.stdout, self.final_answer)
    }

    pub(crate) async fn exec(&mut self, stmt: &Stmt) -> Result<(), (usize, ScriptError)> {
        match stmt {
            Stmt::Assign { name, value, line } => {
                let v = self.eval(value).await.map_err(|e| (*line, e))?;
                self.vars.insert(name.clone(), v);
            }
            Stmt::Expr { expr, line } => {
                self.eval(expr).await.map_err(|e| (*line, e))?;
            }
        }
        Ok(())
    }

    fn write(&mut self, text: &str) {
        if self.truncated {
            return;
        }
        let len = text.chars().count();
        if self.max_output_chars == 0 || self.stdout_chars + len <= self.max_output_chars {
            self.stdout.push_str(text);
            self.stdout_chars += len;
            return;
        }
        let room = self.max_output_chars - self.stdout_chars;
        self.stdout.extend(text.chars().take(room));
        self.stdout.push_str(TRUNCATION_NOTICE);
        self.stdout_chars = self.max_output_chars;
        self.truncated = true;
    }

    fn lookup(&self, name: &str) -> EvalResult {
        if let Some(v) = self.vars.get(name) {
            return Ok(v.clone());
        }
        if self.bindings.contains_key(name) {
            return Ok(Value::Tool(name.to_string()));
        }
        if let Some(b) = BUILTINS.iter().find(|b| **b == name) {
            return Ok(Value::Builtin(*b));
        }
        Err(ScriptError::Name(name.to_string()))
    }

    pub(crate) fn eval<'s>(&'s mut self, expr: &'s Expr) -> BoxFuture<'s, EvalResult> {
        async move {
            match expr {
                Expr::Int(n) => Ok(Value::Int(*n)),
                Expr::Float(f) => Ok(Value::Float(*f)),
                Expr::Str(s) => Ok(Value::Str(s.clone())),
                Expr::Bool(b) => Ok(Value::Bool(*b)),
                Expr::None => Ok(Value::None),
                Expr::Name(name) => self.lookup(name),
                Expr::FStr(parts) => {
                    let mut out = String::new();
                    for part in parts {
                        match part {
                            FStrPart::Lit(s) => out.push_str(s),
                            FStrPart::Expr(e) => out.push_str(&self.eval(e).await?.to_display()),
                        }
                        check_size(Some(out.len()))?;
                    }
                    Ok(Value::Str(out))
                }
                Expr::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item).await?);
                    }
                    bounded(Value::List(values))
                }
                Expr::Neg(inner) => match self.eval(inner).await? {
                    Value::Int(n) => Ok(n
                        .checked_neg()
                        .map(Value::Int)
                        .unwrap_or(Value::Float(-(n as f64)))),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    Value::Bool(b) => Ok(Value::Int(-(b as i64))),
                    other => Err(ScriptError::Type(format!(
                        "bad operand type for unary -: '{}'",
                        other.type_name()
                    ))),
                },
                Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner).await?.truthy())),
                Expr::Binary(BinOp::And, l, r) => {
                    let left = self.eval(l).await?;
                    if !left.truthy() {
                        return Ok(left);
                    }
                    self.eval(r).await
                }
                Expr::Binary(BinOp::Or, l, r) => {
                    let left = self.eval(l).await?;
                    if left.truthy() {
                        return Ok(left);
                    }
                    self.eval(r).await
                }
                Expr::Binary(op, l, r) => {
                    let left = self.eval(l).await?;
                    let right = self.eval(r).await?;
                    binary(*op, left, right)
                }
                Expr::Index(target, index) => {
                    let target = self.eval(target).await?;
                    let index = self.eval(index).await?;
                    subscript(target, index)
                }
                Expr::Attr(target, attr) => {
                    let target = self.eval(target).await?;
                    Err(ScriptError::Type(format!(
                        "'{}' object attribute '{attr}' is only callable",
                        target.type_name()
                    )))
                }
                Expr::Call {
                    callee,
                    args,
                    kwargs,
                } => {
                    let mut arg_values = Vec::with_capacity(args.len());
                    for a in args {
                        arg_values.push(self.eval(a).await?);
                    }
                    let mut kwarg_values = Vec::with_capacity(kwargs.len());
                    for (k, e) in kwargs {
                        kwarg_values.push((k.as_str(), self.eval(e).await?));
                    }

                    if let Expr::Attr(target, method) = callee.as_ref() {
                        // list.append 需要就地修改变量
                        if let (Expr::Name(var), "append") = (target.as_ref(), method.as_str()) {
                            if let Some(Value::List(items)) = self.vars.get_mut(var) {
                                let item = arg_values.into_iter().next().ok_or_else(|| {
                                    ScriptError::Type("append() takes exactly one argument".into())
                                })?;
                                let (list_size, list_depth) = list_footprint(items);
                                let (item_size, item_depth) = item.footprint();
                                check_size(list_size.checked_add(item_size))?;
                                check_depth(list_depth.max(item_depth + 1))?;
                                items.push(item);
                                return Ok(Value::None);
                            }
                        }
                        let target = self.eval(target).await?;
                        return match target {
                            Value::Tool(name) => self.call_tool(&name, arg_values, kwarg_values).await,
                            other => call_method(other, method, arg_values),
                        };
                    }

                    match self.eval(callee).await? {
                        Value::Tool(name) => self.call_tool(&name, arg_values, kwarg_values).await,
                        Value::Builtin(name) => self.call_builtin(name, arg_values, kwarg_values),
                        other => Err(ScriptError::Type(format!(
                            "'{}' object is not callable",
                            other.type_name()
                        ))),
                    }
                }
            }
        }
        .boxed()
    }

    /// 调用工具绑定：输入取第一个位置参数，缺失时取第一个关键字参数
    async fn call_tool(
        &mut self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(&str, Value)>,
    ) -> EvalResult {
        let tool = self
            .bindings
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::Name(name.to_string()))?;
        let input = args
            .into_iter()
            .next()
            .or_else(|| kwargs.into_iter().next().map(|(_, v)| v))
            .map(|v| v.to_display())
            .unwrap_or_default();

        tracing::debug!(tool = name, "script tool call");
        match tool.run(&input).await {
            Ok(output) => {
                // 终止信号的文本写入输出，使观察中可见最终调用
                if let Some(answer) = output.final_answer {
                    self.write(&format!("{}\n", output.text));
                    if self.final_answer.is_none() {
                        self.final_answer = Some(answer);
                    }
                }
                Ok(Value::Str(output.text))
            }
            Err(e) => Err(ScriptError::Tool {
                tool: name.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn call_builtin(
        &mut self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(&str, Value)>,
    ) -> EvalResult {
        match name {
            "print" => {
                let sep = kwarg_str(&kwargs, "sep").unwrap_or_else(|| " ".to_string());
                let end = kwarg_str(&kwargs, "end").unwrap_or_else(|| "\n".to_string());
                let line = args
                    .iter()
                    .map(Value::to_display)
                    .collect::<Vec<_>>()
                    .join(&sep);
                self.write(&format!("{line}{end}"));
                Ok(Value::None)
            }
            "str" => Ok(Value::Str(
                args.first().map(Value::to_display).unwrap_or_default(),
            )),
            "len" => match one_arg(name, args)? {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                other => Err(ScriptError::Type(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            },
            "abs" => match one_arg(name, args)? {
                Value::Int(n) => Ok(n
                    .checked_abs()
                    .map(Value::Int)
                    .unwrap_or(Value::Float((n as f64).abs()))),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(bad_arg(name, &other)),
            },
            "round" => {
                let mut it = args.into_iter();
                let x = it
                    .next()
                    .ok_or_else(|| ScriptError::Type("round() missing required argument".into()))?;
                let digits = it.next().or_else(|| kwarg(&kwargs, "ndigits"));
                round(x, digits)
            }
            "int" => match one_arg(name, args)? {
                Value::Int(n) => Ok(Value::Int(n)),
                Value::Bool(b) => Ok(Value::Int(b as i64)),
                Value::Float(f) if f.is_finite() => Ok(float_to_value_int(f.trunc())),
                Value::Str(s) => s
                    .trim()
                    .replace('_', "")
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| {
                        ScriptError::Value(format!("invalid literal for int() with base 10: '{s}'"))
                    }),
                other => Err(bad_arg(name, &other)),
            },
            "float" => match one_arg(name, args)? {
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ScriptError::Value(format!("could not convert string to float: '{s}'"))),
                other => other
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| bad_arg(name, &other)),
            },
            "bool" => Ok(Value::Bool(
                args.first().map(Value::truthy).unwrap_or(false),
            )),
            "min" | "max" => {
                let items = spread(args);
                let mut best: Option<Value> = None;
                for item in items {
                    best = Some(match best {
                        None => item,
                        Some(current) => {
                            let ord = compare(&item, &current)?;
                            let better = if name == "min" {
                                ord == std::cmp::Ordering::Less
                            } else {
                                ord == std::cmp::Ordering::Greater
                            };
                            if better {
                                item
                            } else {
                                current
                            }
                        }
                    });
                }
                best.ok_or_else(|| ScriptError::Value(format!("{name}() arg is an empty sequence")))
            }
            "sum" => {
                let mut total = Value::Int(0);
                for item in spread(args) {
                    total = binary(BinOp::Add, total, item)?;
                }
                Ok(total)
            }
            "sorted" => {
                let mut items = spread(args);
                let mut err = None;
                items.sort_by(|a, b| {
                    compare(a, b).unwrap_or_else(|e| {
                        err.get_or_insert(e);
                        std::cmp::Ordering::Equal
                    })
                });
                match err {
                    Some(e) => Err(e),
                    None => Ok(Value::List(items)),
                }
            }
            _ => Err(ScriptError::Name(name.to_string())),
        }
    }
}

fn kwarg(kwargs: &[(&str, Value)], key: &str) -> Option<Value> {
    kwargs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
}

fn kwarg_str(kwargs: &[(&str, Value)], key: &str) -> Option<String> {
    kwarg(kwargs, key).map(|v| v.to_display())
}

fn one_arg(name: &str, args: Vec<Value>) -> EvalResult {
    let mut it = args.into_iter();
    match (it.next(), it.next()) {
        (Some(v), None) => Ok(v),
        _ => Err(ScriptError::Type(format!(
            "{name}() takes exactly one argument"
        ))),
    }
}

fn bad_arg(name: &str, v: &Value) -> ScriptError {
    ScriptError::Type(format!(
        "bad argument type for {name}(): '{}'",
        v.type_name()
    ))
}

/// min/max/sum/sorted：单个列表参数时展开
fn spread(args: Vec<Value>) -> Vec<Value> {
    match <[Value; 1]>::try_from(args) {
        Ok([Value::List(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    }
}

fn float_to_value_int(f: f64) -> Value {
    if f.abs() < 9.2e18 {
        Value::Int(f as i64)
    } else {
        Value::Float(f)
    }
}

fn round(x: Value, digits: Option<Value>) -> EvalResult {
    let digits = match digits {
        None | Some(Value::None) => None,
        Some(d) => Some(
            d.as_int()
                .ok_or_else(|| ScriptError::Type("ndigits must be an integer".into()))?,
        ),
    };
    match (x, digits) {
        (Value::Int(n), _) => Ok(Value::Int(n)),
        (Value::Float(f), None) => Ok(float_to_value_int(f.round_ties_even())),
        (Value::Float(f), Some(d)) => {
            let scale = 10f64.powi(d as i32);
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
        (other, _) => Err(bad_arg("round", &other)),
    }
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, ScriptError> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .ok_or_else(|| ScriptError::Value("cannot compare nan".into())),
            _ => Err(ScriptError::Type(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| values_equal(p, q))
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

fn int_or_float(checked: Option<i64>, fallback: f64) -> Value {
    checked.map(Value::Int).unwrap_or(Value::Float(fallback))
}

fn list_footprint(items: &[Value]) -> (usize, usize) {
    items.iter().fold((1, 1), |(size, depth), v| {
        let (s, d) = v.footprint();
        (size.saturating_add(s), depth.max(d + 1))
    })
}

/// 结果大小超过 MAX_VALUE_SIZE（或计算溢出）时报错；在分配之前调用
fn check_size(size: Option<usize>) -> Result<(), ScriptError> {
    match size {
        Some(n) if n <= MAX_VALUE_SIZE => Ok(()),
        _ => Err(ScriptError::Value(format!(
            "result too large (limit {MAX_VALUE_SIZE})"
        ))),
    }
}

fn check_depth(depth: usize) -> Result<(), ScriptError> {
    if depth > MAX_LIST_DEPTH {
        return Err(ScriptError::Value("lists nested too deeply".to_string()));
    }
    Ok(())
}

fn bounded(value: Value) -> EvalResult {
    let (size, depth) = value.footprint();
    check_size(Some(size))?;
    check_depth(depth)?;
    Ok(value)
}

fn type_error(op: &str, a: &Value, b: &Value) -> ScriptError {
    ScriptError::Type(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    ))
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

fn binary(op: BinOp, a: Value, b: Value) -> EvalResult {
    use std::cmp::Ordering;
    match op {
        BinOp::Eq => return Ok(Value::Bool(values_equal(&a, &b))),
        BinOp::Ne => return Ok(Value::Bool(!values_equal(&a, &b))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ord = compare(&a, &b)?;
            return Ok(Value::Bool(match op {
                BinOp::Lt => ord == Ordering::Less,
                BinOp::Le => ord != Ordering::Greater,
                BinOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }));
        }
        _ => {}
    }

    // 序列运算
    match (op, &a, &b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            check_size(x.len().checked_add(y.len()))?;
            return Ok(Value::Str(format!("{x}{y}")));
        }
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            let ((xs, xd), (ys, yd)) = (list_footprint(x), list_footprint(y));
            check_size(xs.checked_add(ys))?;
            check_depth(xd.max(yd))?;
            return Ok(Value::List(x.iter().chain(y).cloned().collect()));
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            let n = usize::try_from(*n).unwrap_or(0);
            check_size(s.len().checked_mul(n))?;
            return Ok(Value::Str(s.repeat(n)));
        }
        (BinOp::Mul, Value::List(items), Value::Int(n))
        | (BinOp::Mul, Value::Int(n), Value::List(items)) => {
            let n = usize::try_from(*n).unwrap_or(0);
            check_size(list_footprint(items).0.checked_mul(n))?;
            return Ok(Value::List(
                std::iter::repeat(items.iter().cloned()).take(n).flatten().collect(),
            ));
        }
        (BinOp::Mod, Value::Str(_), _) => {
            return Err(ScriptError::Type("%-formatting is not supported, use f-strings".into()))
        }
        _ => {}
    }

    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return int_binary(op, x, y);
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => float_binary(op, x, y),
        _ => Err(type_error(op_symbol(op), &a, &b)),
    }
}

fn int_binary(op: BinOp, x: i64, y: i64) -> EvalResult {
    let (fx, fy) = (x as f64, y as f64);
    match op {
        BinOp::Add => Ok(int_or_float(x.checked_add(y), fx + fy)),
        BinOp::Sub => Ok(int_or_float(x.checked_sub(y), fx - fy)),
        BinOp::Mul => Ok(int_or_float(x.checked_mul(y), fx * fy)),
        BinOp::Div => {
            if y == 0 {
                return Err(ScriptError::ZeroDivision);
            }
            Ok(Value::Float(fx / fy))
        }
        BinOp::FloorDiv => {
            if y == 0 {
                return Err(ScriptError::ZeroDivision);
            }
            match (x.checked_div(y), x.checked_rem(y)) {
                (Some(q), Some(r)) => {
                    let q = if r != 0 && ((r < 0) != (y < 0)) { q - 1 } else { q };
                    Ok(Value::Int(q))
                }
                _ => Ok(Value::Float((fx / fy).floor())),
            }
        }
        BinOp::Mod => {
            if y == 0 {
                return Err(ScriptError::ZeroDivision);
            }
            let r = x.checked_rem(y).unwrap_or(0);
            Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }))
        }
        BinOp::Pow => {
            if y < 0 {
                if x == 0 {
                    return Err(ScriptError::ZeroDivision);
                }
                return Ok(Value::Float(fx.powf(fy)));
            }
            let checked = u32::try_from(y).ok().and_then(|e| x.checked_pow(e));
            Ok(int_or_float(checked, fx.powf(fy)))
        }
        _ => Err(ScriptError::Type(format!(
            "unsupported operator {}",
            op_symbol(op)
        ))),
    }
}

fn float_binary(op: BinOp, x: f64, y: f64) -> EvalResult {
    match op {
        BinOp::Add => Ok(Value::Float(x + y)),
        BinOp::Sub => Ok(Value::Float(x - y)),
        BinOp::Mul => Ok(Value::Float(x * y)),
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if y == 0.0 => Err(ScriptError::ZeroDivision),
        BinOp::Div => Ok(Value::Float(x / y)),
        BinOp::FloorDiv => Ok(Value::Float((x / y).floor())),
        BinOp::Mod => {
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }))
        }
        BinOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(ScriptError::ZeroDivision);
            }
            let v = x.powf(y);
            if v.is_nan() {
                return Err(ScriptError::Value("math domain error".into()));
            }
            Ok(Value::Float(v))
        }
        _ => Err(ScriptError::Type(format!(
            "unsupported operator {}",
            op_symbol(op)
        ))),
    }
}

fn subscript(target: Value, index: Value) -> EvalResult {
    let i = index
        .as_int()
        .ok_or_else(|| ScriptError::Type(format!("indices must be integers, not {}", index.type_name())))?;
    let resolve = |len: usize| -> Option<usize> {
        let idx = if i < 0 { len as i64 + i } else { i };
        (0..len as i64).contains(&idx).then_some(idx as usize)
    };
    match target {
        Value::List(items) => resolve(items.len())
            .and_then(|idx| items.into_iter().nth(idx))
            .ok_or_else(|| ScriptError::Index("list index out of range".into())),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            resolve(chars.len())
                .map(|idx| Value::Str(chars[idx].to_string()))
                .ok_or_else(|| ScriptError::Index("string index out of range".into()))
        }
        other => Err(ScriptError::Type(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn str_arg(method: &str, args: &[Value], idx: usize) -> Result<String, ScriptError> {
    match args.get(idx) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(ScriptError::Type(format!(
            "{method}() argument must be str, not {}",
            other.type_name()
        ))),
        None => Err(ScriptError::Type(format!("{method}() missing argument"))),
    }
}

fn call_method(target: Value, method: &str, args: Vec<Value>) -> EvalResult {
    match (&target, method) {
        (Value::Str(s), "upper") => Ok(Value::Str(s.to_uppercase())),
        (Value::Str(s), "lower") => Ok(Value::Str(s.to_lowercase())),
        (Value::Str(s), "strip") => Ok(Value::Str(s.trim().to_string())),
        (Value::Str(s), "lstrip") => Ok(Value::Str(s.trim_start().to_string())),
        (Value::Str(s), "rstrip") => Ok(Value::Str(s.trim_end().to_string())),
        (Value::Str(s), "split") => {
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(|p| Value::Str(p.into())).collect(),
                Some(_) => {
                    let sep = str_arg(method, &args, 0)?;
                    if sep.is_empty() {
                        return Err(ScriptError::Value("empty separator".into()));
                    }
                    s.split(sep.as_str()).map(|p| Value::Str(p.into())).collect()
                }
            };
            Ok(Value::List(parts))
        }
        (Value::Str(sep), "join") => match args.into_iter().next() {
            Some(Value::List(items)) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Str(p) => parts.push(p),
                        other => {
                            return Err(ScriptError::Type(format!(
                                "sequence item: expected str instance, {} found",
                                other.type_name()
                            )))
                        }
                    }
                }
                let total = parts.iter().map(String::len).fold(
                    sep.len().checked_mul(parts.len().saturating_sub(1)),
                    |acc, n| acc.and_then(|a| a.checked_add(n)),
                );
                check_size(total)?;
                Ok(Value::Str(parts.join(sep.as_str())))
            }
            _ => Err(ScriptError::Type("join() argument must be a list".into())),
        },
        (Value::Str(s), "replace") => {
            let from = str_arg(method, &args, 0)?;
            let to = str_arg(method, &args, 1)?;
            let grows = to.len().saturating_sub(from.len());
            check_size(
                s.matches(from.as_str())
                    .count()
                    .checked_mul(grows)
                    .and_then(|extra| extra.checked_add(s.len())),
            )?;
            Ok(Value::Str(s.replace(&from, &to)))
        }
        (Value::Str(s), "startswith") => Ok(Value::Bool(s.starts_with(&str_arg(method, &args, 0)?))),
        (Value::Str(s), "endswith") => Ok(Value::Bool(s.ends_with(&str_arg(method, &args, 0)?))),
        (Value::Str(s), "count") => Ok(Value::Int(s.matches(&str_arg(method, &args, 0)?).count() as i64)),
        _ => Err(ScriptError::Type(format!(
            "'{}' object has no attribute '{method}'",
            target.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::parser::parse_expression;

    async fn eval(src: &str) -> EvalResult {
        let bindings = HashMap::new();
        let mut interp = Interpreter::new(&bindings, 0);
        let expr = parse_expression(src)?;
        interp.eval(&expr).await
    }

    #[test]
    fn test_format_float_matches_python() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(2.5e-5), "2.5e-05");
    }

    #[tokio::test]
    async fn test_python_division_semantics() {
        assert_eq!(eval("7 // 2").await.unwrap(), Value::Int(3));
        assert_eq!(eval("-7 // 2").await.unwrap(), Value::Int(-4));
        assert_eq!(eval("-7 % 3").await.unwrap(), Value::Int(2));
        assert_eq!(eval("6 / 3").await.unwrap(), Value::Float(2.0));
        assert_eq!(eval("1 // 0").await, Err(ScriptError::ZeroDivision));
    }

    #[tokio::test]
    async fn test_overflow_falls_back_to_float() {
        assert!(matches!(eval("2 ** 70").await.unwrap(), Value::Float(_)));
        assert_eq!(eval("2 ** 10").await.unwrap(), Value::Int(1024));
        assert_eq!(eval("2 ** -1").await.unwrap(), Value::Float(0.5));
    }

    #[tokio::test]
    async fn test_builtins() {
        assert_eq!(eval("round(2.5)").await.unwrap(), Value::Int(2));
        assert_eq!(eval("round(3.14159, 2)").await.unwrap(), Value::Float(3.14));
        assert_eq!(eval("max([3, 9, 4])").await.unwrap(), Value::Int(9));
        assert_eq!(eval("min(3, 1.5)").await.unwrap(), Value::Float(1.5));
        assert_eq!(eval("sum([1, 2, 3.5])").await.unwrap(), Value::Float(6.5));
        assert_eq!(eval("int('42') + len('abc')").await.unwrap(), Value::Int(45));
        assert_eq!(eval("str([1, 'a', None])").await.unwrap(), Value::Str("[1, 'a', None]".into()));
    }

    #[tokio::test]
    async fn test_string_methods_and_indexing() {
        assert_eq!(
            eval("', '.join('a b c'.split())").await.unwrap(),
            Value::Str("a, b, c".into())
        );
        assert_eq!(eval("'hello'[-1].upper()").await.unwrap(), Value::Str("O".into()));
        assert!(matches!(eval("[1][3]").await, Err(ScriptError::Index(_))));
    }

    #[tokio::test]
    async fn test_boolean_short_circuit() {
        assert_eq!(eval("0 or 'x'").await.unwrap(), Value::Str("x".into()));
        assert_eq!(eval("1 and 0").await.unwrap(), Value::Int(0));
        assert_eq!(eval("not 3 > 2").await.unwrap(), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_repetition_is_size_checked() {
        assert_eq!(eval("'ab' * 3").await.unwrap(), Value::Str("ababab".into()));
        assert_eq!(eval("'ab' * -2").await.unwrap(), Value::Str(String::new()));
        for src in [
            "'ab' * 9223372036854775807",
            "'x' * 10**11",
            "[1, 2] * 9223372036854775807",
            "'x' * 1000 * 1000 * 10",
        ] {
            assert!(
                matches!(eval(src).await, Err(ScriptError::Value(_))),
                "{src} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_growth_through_methods_is_bounded() {
        assert!(matches!(
            eval("('x' * 1000).replace('x', 'y' * 2000)").await,
            Err(ScriptError::Value(_))
        ));
        assert!(matches!(
            eval("('-' * 600000).join(['a', 'b', 'c'])").await,
            Err(ScriptError::Value(_))
        ));
    }

    #[tokio::test]
    async fn test_type_errors() {
        assert!(matches!(eval("'a' + 1").await, Err(ScriptError::Type(_))));
        assert!(matches!(eval("3(1)").await, Err(ScriptError::Type(_))));
    }
}
