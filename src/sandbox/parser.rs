//! 脚本语法分析：递归下降，生成语句与表达式 AST
//!
//! 语法刻意只覆盖无循环的 Python 子集：赋值、增量赋值、表达式语句；
//! import / def / if / for / while 等在解析阶段即报错，保证脚本必然终止。

use crate::sandbox::lexer::{tokenize, FPart, Tok, Token};
use crate::sandbox::ScriptError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    FStr(Vec<FStrPart>),
    Bool(bool),
    None,
    Name(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum FStrPart {
    Lit(String),
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Assign { name: String, value: Expr, line: usize },
    Expr { expr: Expr, line: usize },
}

/// 括号、一元运算、调用参数、f-string 插值等递归结构的最大嵌套层数
pub const MAX_NESTING: usize = 100;
/// 单条语句中由循环拼接出的运算节点（`a + b + ...`、`f()()`、`x[0][0]`）上限
pub const MAX_CHAIN_NODES: usize = 256;

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "import", "from", "def", "class", "if", "elif", "else", "for", "while", "with", "try",
    "except", "lambda", "global", "nonlocal", "return", "yield", "async", "await", "del",
    "exec", "eval", "open", "__import__",
];

pub fn parse_program(src: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut stmts = Vec::new();
    loop {
        parser.skip_newlines();
        if parser.peek() == &Tok::Eof {
            break;
        }
        parser.nodes = 0;
        stmts.push(parser.statement()?);
    }
    Ok(stmts)
}

/// 解析单个表达式（计算器与 f-string 插值使用）
pub fn parse_expression(src: &str) -> Result<Expr, ScriptError> {
    Parser::new(tokenize(src)?).whole_expression()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// 当前递归嵌套层数
    depth: usize,
    /// 当前语句已拼接的运算节点数
    nodes: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            nodes: 0,
        }
    }

    fn whole_expression(&mut self) -> Result<Expr, ScriptError> {
        self.skip_newlines();
        let expr = self.expr()?;
        self.skip_newlines();
        if self.peek() != &Tok::Eof {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    /// f-string 插值：嵌套层数与节点计数延续外层
    fn sub_expression(&mut self, src: &str) -> Result<Expr, ScriptError> {
        let mut inner = Parser::new(tokenize(src)?);
        inner.depth = self.depth;
        inner.nodes = self.nodes;
        let expr = inner.whole_expression()?;
        self.nodes = inner.nodes;
        Ok(expr)
    }

    /// 进入一层递归；超过 MAX_NESTING 时报语法错误，避免栈溢出
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    /// 记录一个由循环拼接的节点；节点过多时报错，限制语法树深度
    fn chain(&mut self) -> Result<(), ScriptError> {
        self.nodes += 1;
        if self.nodes > MAX_CHAIN_NODES {
            return Err(self.error("expression too long".to_string()));
        }
        Ok(())
    }

    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<(), ScriptError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == &Tok::Newline {
            self.pos += 1;
        }
    }

    fn error(&self, message: String) -> ScriptError {
        ScriptError::Syntax {
            line: self.line(),
            message,
        }
    }

    fn unexpected(&self) -> ScriptError {
        self.error(format!("unexpected {}", describe(self.peek())))
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.line();
        if let Tok::Ident(word) = self.peek() {
            if matches!(word.as_str(), "import" | "from") {
                return Err(ScriptError::Forbidden(
                    "imports are not available in the sandbox".to_string(),
                ));
            }
            if UNSUPPORTED_KEYWORDS.contains(&word.as_str())
                && !matches!(self.peek_at(1), Tok::LParen)
            {
                return Err(self.error(format!("'{word}' statements are not supported")));
            }
        }

        let stmt = match (self.peek().clone(), self.peek_at(1).clone()) {
            (Tok::Ident(name), Tok::Assign) => {
                self.pos += 2;
                let value = self.expr()?;
                Stmt::Assign { name, value, line }
            }
            (Tok::Ident(name), op @ (Tok::PlusAssign | Tok::MinusAssign | Tok::StarAssign | Tok::SlashAssign)) => {
                self.pos += 2;
                let rhs = self.expr()?;
                let op = match op {
                    Tok::PlusAssign => BinOp::Add,
                    Tok::MinusAssign => BinOp::Sub,
                    Tok::StarAssign => BinOp::Mul,
                    _ => BinOp::Div,
                };
                let value = Expr::Binary(op, Box::new(Expr::Name(name.clone())), Box::new(rhs));
                Stmt::Assign { name, value, line }
            }
            _ => Stmt::Expr {
                expr: self.expr()?,
                line,
            },
        };

        match self.peek() {
            Tok::Newline => {
                self.pos += 1;
                Ok(stmt)
            }
            Tok::Eof => Ok(stmt),
            Tok::Colon => Err(self.error("block statements are not supported".to_string())),
            _ => Err(self.unexpected()),
        }
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        self.nested(Self::or_expr)
    }

    fn keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Ident(w) if w == kw)
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.and_expr()?;
        while self.keyword("or") {
            self.pos += 1;
            self.chain()?;
            let right = self.and_expr()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.not_expr()?;
        while self.keyword("and") {
            self.pos += 1;
            self.chain()?;
            let right = self.not_expr()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, ScriptError> {
        if self.keyword("not") {
            self.pos += 1;
            let inner = self.nested(Self::not_expr)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Tok::Eq => BinOp::Eq,
            Tok::Ne => BinOp::Ne,
            Tok::Lt => BinOp::Lt,
            Tok::Le => BinOp::Le,
            Tok::Gt => BinOp::Gt,
            Tok::Ge => BinOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    // additive = term (('+' | '-') term)*
    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.chain()?;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // term = unary (('*' | '/' | '//' | '%') unary)*
    fn term(&mut self) -> Result<Expr, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            self.chain()?;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // unary = ('-' | '+') unary | power
    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if self.eat(&Tok::Minus) {
            let inner = self.nested(Self::unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        if self.eat(&Tok::Plus) {
            return self.nested(Self::unary);
        }
        self.power()
    }

    // power = postfix ('**' unary)?，右结合且优先级高于一元负号左侧
    fn power(&mut self) -> Result<Expr, ScriptError> {
        let base = self.postfix()?;
        if self.eat(&Tok::DoubleStar) {
            let exp = self.nested(Self::unary)?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), Tok::LParen | Tok::Dot | Tok::LBracket) {
                self.chain()?;
            }
            match self.peek() {
                Tok::LParen => {
                    self.pos += 1;
                    let (args, kwargs) = self.call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        kwargs,
                    };
                }
                Tok::Dot => {
                    self.pos += 1;
                    match self.advance() {
                        Tok::Ident(attr) => expr = Expr::Attr(Box::new(expr), attr),
                        other => {
                            return Err(self.error(format!(
                                "expected attribute name, found {}",
                                describe(&other)
                            )))
                        }
                    }
                }
                Tok::LBracket => {
                    self.pos += 1;
                    let index = self.expr()?;
                    self.expect(Tok::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    /// 调用参数：位置参数与关键字参数（name=value）分开收集
    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ScriptError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        loop {
            if self.eat(&Tok::RParen) {
                return Ok((args, kwargs));
            }
            match (self.peek().clone(), self.peek_at(1).clone()) {
                (Tok::Ident(name), Tok::Assign) => {
                    self.pos += 2;
                    kwargs.push((name, self.expr()?));
                }
                _ => args.push(self.expr()?),
            }
            if !self.eat(&Tok::Comma) {
                self.expect(Tok::RParen, "')'")?;
                return Ok((args, kwargs));
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let line = self.line();
        match self.advance() {
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Float(f) => Ok(Expr::Float(f)),
            Tok::Str(s) => {
                // 相邻字符串字面量自动拼接
                let mut s = s;
                while let Tok::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            Tok::FStr(parts) => {
                let parts = parts
                    .into_iter()
                    .map(|p| match p {
                        FPart::Lit(s) => Ok(FStrPart::Lit(s)),
                        FPart::Expr(src) => self
                            .sub_expression(&src)
                            .map(FStrPart::Expr)
                            .map_err(|e| e.at_line(line)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::FStr(parts))
            }
            Tok::Ident(word) => Ok(match word.as_str() {
                "True" => Expr::Bool(true),
                "False" => Expr::Bool(false),
                "None" => Expr::None,
                _ => Expr::Name(word),
            }),
            Tok::LParen => {
                let inner = self.expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                loop {
                    if self.eat(&Tok::RBracket) {
                        return Ok(Expr::List(items));
                    }
                    items.push(self.expr()?);
                    if !self.eat(&Tok::Comma) {
                        self.expect(Tok::RBracket, "']'")?;
                        return Ok(Expr::List(items));
                    }
                }
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected {}", describe(&other))))
            }
        }
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Int(n) => format!("number {n}"),
        Tok::Float(f) => format!("number {f}"),
        Tok::Str(_) | Tok::FStr(_) => "string".to_string(),
        Tok::Ident(w) => format!("'{w}'"),
        Tok::Newline => "end of line".to_string(),
        Tok::Eof => "end of input".to_string(),
        other => format!("{other:?}"),
    }
}
