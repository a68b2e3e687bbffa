//! 脚本词法分析：数字、字符串（含 f-string）、标识符、运算符、换行
//!
//! 括号内的换行被忽略（允许跨行调用）；`#` 到行尾为注释；`;` 等价于换行。

use crate::sandbox::ScriptError;

#[derive(Clone, Debug, PartialEq)]
pub enum FPart {
    Lit(String),
    /// `{...}` 中的表达式源码（格式说明符已去掉）
    Expr(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    FStr(Vec<FPart>),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    DoubleStar,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Newline,
    Eof,
}

/// 带行号的 token
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut depth = 0usize;

    let syntax = |line: usize, msg: String| ScriptError::Syntax { line, message: msg };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                if depth == 0 {
                    tokens.push(Token { tok: Tok::Newline, line });
                }
                line += 1;
                i += 1;
            }
            ';' => {
                tokens.push(Token { tok: Tok::Newline, line });
                i += 1;
            }
            ' ' | '\t' | '\r' => i += 1,
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                line += 1;
                i += 2;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '0'..='9' | '.' if c != '.' || chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() {
                    let d = chars[i];
                    if d.is_ascii_digit() || d == '_' {
                        i += 1;
                    } else if d == '.' && !is_float {
                        is_float = true;
                        i += 1;
                    } else if (d == 'e' || d == 'E')
                        && chars
                            .get(i + 1)
                            .is_some_and(|n| n.is_ascii_digit() || *n == '-' || *n == '+')
                    {
                        is_float = true;
                        i += 2;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().filter(|d| **d != '_').collect();
                let tok = if is_float {
                    Tok::Float(
                        text.parse()
                            .map_err(|_| syntax(line, format!("invalid number '{text}'")))?,
                    )
                } else {
                    match text.parse::<i64>() {
                        Ok(n) => Tok::Int(n),
                        Err(_) => Tok::Float(
                            text.parse()
                                .map_err(|_| syntax(line, format!("invalid number '{text}'")))?,
                        ),
                    }
                };
                tokens.push(Token { tok, line });
            }
            '"' | '\'' => {
                let (s, next, lines) = read_string(&chars, i, line)?;
                tokens.push(Token { tok: Tok::Str(s), line });
                line += lines;
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let quote = chars.get(i).copied();
                let is_prefix = matches!(word.as_str(), "f" | "F" | "r" | "R" | "rf" | "fr");
                if is_prefix && matches!(quote, Some('"') | Some('\'')) {
                    let (s, next, lines) = read_string(&chars, i, line)?;
                    let tok = if word.to_lowercase().contains('f') {
                        Tok::FStr(split_fstring(&s, line)?)
                    } else {
                        Tok::Str(s)
                    };
                    tokens.push(Token { tok, line });
                    line += lines;
                    i = next;
                } else {
                    tokens.push(Token {
                        tok: Tok::Ident(word),
                        line,
                    });
                }
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (tok, len) = match (c, next) {
                    ('*', Some('*')) => (Tok::DoubleStar, 2),
                    ('/', Some('/')) => (Tok::DoubleSlash, 2),
                    ('=', Some('=')) => (Tok::Eq, 2),
                    ('!', Some('=')) => (Tok::Ne, 2),
                    ('<', Some('=')) => (Tok::Le, 2),
                    ('>', Some('=')) => (Tok::Ge, 2),
                    ('+', Some('=')) => (Tok::PlusAssign, 2),
                    ('-', Some('=')) => (Tok::MinusAssign, 2),
                    ('*', Some('=')) => (Tok::StarAssign, 2),
                    ('/', Some('=')) => (Tok::SlashAssign, 2),
                    ('+', _) => (Tok::Plus, 1),
                    ('-', _) => (Tok::Minus, 1),
                    ('*', _) => (Tok::Star, 1),
                    ('/', _) => (Tok::Slash, 1),
                    ('%', _) => (Tok::Percent, 1),
                    ('<', _) => (Tok::Lt, 1),
                    ('>', _) => (Tok::Gt, 1),
                    ('=', _) => (Tok::Assign, 1),
                    (',', _) => (Tok::Comma, 1),
                    ('.', _) => (Tok::Dot, 1),
                    (':', _) => (Tok::Colon, 1),
                    ('(', _) => {
                        depth += 1;
                        (Tok::LParen, 1)
                    }
                    ('[', _) => {
                        depth += 1;
                        (Tok::LBracket, 1)
                    }
                    (')', _) => {
                        depth = depth.saturating_sub(1);
                        (Tok::RParen, 1)
                    }
                    (']', _) => {
                        depth = depth.saturating_sub(1);
                        (Tok::RBracket, 1)
                    }
                    ('{' | '}', _) => {
                        return Err(syntax(line, "dict literals are not supported".to_string()))
                    }
                    _ => return Err(syntax(line, format!("unexpected character '{c}'"))),
                };
                tokens.push(Token { tok, line });
                i += len;
            }
        }
    }
    tokens.push(Token { tok: Tok::Newline, line });
    tokens.push(Token { tok: Tok::Eof, line });
    Ok(tokens)
}

/// 读取从 `start`（引号处）开始的字符串，支持三引号与常见转义；返回 (内容, 结束后位置, 跨越的换行数)
fn read_string(
    chars: &[char],
    start: usize,
    line: usize,
) -> Result<(String, usize, usize), ScriptError> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };
    let mut out = String::new();
    let mut lines = 0;

    loop {
        let Some(&c) = chars.get(i) else {
            return Err(ScriptError::Syntax {
                line,
                message: "unterminated string literal".to_string(),
            });
        };
        if c == quote {
            if !triple {
                return Ok((out, i + 1, lines));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((out, i + 3, lines));
            }
        }
        if c == '\n' {
            if !triple {
                return Err(ScriptError::Syntax {
                    line,
                    message: "unterminated string literal".to_string(),
                });
            }
            lines += 1;
        }
        if c == '\\' {
            let escaped = chars.get(i + 1).copied().unwrap_or('\\');
            out.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
            i += 2;
            continue;
        }
        out.push(c);
        i += 1;
    }
}

/// 拆分 f-string：`{{` / `}}` 为字面括号，`{expr:spec}` 取 expr 部分
fn split_fstring(s: &str, line: usize) -> Result<Vec<FPart>, ScriptError> {
    let mut parts = Vec::new();
    let mut lit = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                lit.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                lit.push('}');
            }
            '{' => {
                if !lit.is_empty() {
                    parts.push(FPart::Lit(std::mem::take(&mut lit)));
                }
                let mut expr = String::new();
                let mut closed = false;
                for e in chars.by_ref() {
                    if e == '}' {
                        closed = true;
                        break;
                    }
                    expr.push(e);
                }
                if !closed {
                    return Err(ScriptError::Syntax {
                        line,
                        message: "unterminated '{' in f-string".to_string(),
                    });
                }
                let expr = match expr.split_once(':') {
                    Some((e, _spec)) => e.to_string(),
                    None => expr,
                };
                parts.push(FPart::Expr(expr.trim_end_matches('=').trim().to_string()));
            }
            other => lit.push(other),
        }
    }
    if !lit.is_empty() {
        parts.push(FPart::Lit(lit));
    }
    Ok(parts)
}
