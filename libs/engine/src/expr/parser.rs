//! Recursive-descent parser producing the expression AST

use super::lexer::{tokenize, Spanned, Token};
use super::ExprError;

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// `$` — the whole evaluation context
    Context,
    Literal(serde_json::Value),
    /// Navigation chain: a head expression followed by path stages
    Path {
        head: Box<Expr>,
        stages: Vec<Stage>,
    },
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
}

/// One stage of a navigation chain
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stage {
    /// `.name` — field access, mapping over sequences
    Field(String),
    /// `.(expr)` — evaluate per item with the item as context
    Block(Box<Expr>),
    /// `[expr]` — index, multi-select, or filter depending on the expression
    Index(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Range,
    And,
    Or,
    In,
}

pub(crate) fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len: source.len(),
    };
    let expr = parser.expression()?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::Parse {
            pos: extra.pos,
            message: format!("unexpected trailing token {:?}", extra.token),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_token() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.next() {
            Some(spanned) if spanned.token == expected => Ok(()),
            Some(spanned) => Err(ExprError::Parse {
                pos: spanned.pos,
                message: format!("expected {expected:?}, found {:?}", spanned.token),
            }),
            None => Err(ExprError::Parse {
                pos: self.source_len,
                message: format!("expected {expected:?}, found end of expression"),
            }),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ExprError {
        ExprError::Parse {
            pos: self.peek().map(|s| s.pos).unwrap_or(self.source_len),
            message: message.into(),
        }
    }

    // expression := ternary
    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, ExprError> {
        let cond = self.or_expr()?;
        if self.eat(&Token::Question) {
            let then = self.expression()?;
            let otherwise = if self.eat(&Token::Colon) {
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise,
            });
        }
        Ok(cond)
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.in_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.in_expr()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn in_expr(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.comparison()?;
        if self.eat(&Token::In) {
            let rhs = self.comparison()?;
            return Ok(binary(BinaryOp::In, lhs, rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.range_expr()?;
        let op = match self.peek_token() {
            Some(Token::Eq) => Some(BinaryOp::Eq),
            Some(Token::Ne) => Some(BinaryOp::Ne),
            Some(Token::Lt) => Some(BinaryOp::Lt),
            Some(Token::Le) => Some(BinaryOp::Le),
            Some(Token::Gt) => Some(BinaryOp::Gt),
            Some(Token::Ge) => Some(BinaryOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let rhs = self.range_expr()?;
            return Ok(binary(op, lhs, rhs));
        }
        Ok(lhs)
    }

    fn range_expr(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.concat()?;
        if self.eat(&Token::Range) {
            let rhs = self.concat()?;
            return Ok(binary(BinaryOp::Range, lhs, rhs));
        }
        Ok(lhs)
    }

    fn concat(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.additive()?;
        while self.eat(&Token::Amp) {
            let rhs = self.additive()?;
            lhs = binary(BinaryOp::Concat, lhs, rhs);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Token::Minus) {
            let expr = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                expr: Box::new(expr),
            });
        }
        self.postfix()
    }

    // postfix := primary stage*
    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let head = self.primary()?;
        let mut stages = Vec::new();

        loop {
            if self.eat(&Token::Dot) {
                match self.next() {
                    Some(Spanned {
                        token: Token::Ident(name),
                        ..
                    }) => stages.push(Stage::Field(name)),
                    Some(Spanned {
                        token: Token::Str(name),
                        ..
                    }) => stages.push(Stage::Field(name)),
                    Some(Spanned {
                        token: Token::LParen,
                        ..
                    }) => {
                        let inner = self.expression()?;
                        self.expect(Token::RParen)?;
                        stages.push(Stage::Block(Box::new(inner)));
                    }
                    Some(Spanned { token, pos }) => {
                        return Err(ExprError::Parse {
                            pos,
                            message: format!("expected field or '(' after '.', found {token:?}"),
                        });
                    }
                    None => {
                        return Err(self.error_here("expected field or '(' after '.'"));
                    }
                }
            } else if self.eat(&Token::LBracket) {
                let inner = self.expression()?;
                self.expect(Token::RBracket)?;
                stages.push(Stage::Index(Box::new(inner)));
            } else {
                break;
            }
        }

        if stages.is_empty() {
            Ok(head)
        } else {
            Ok(Expr::Path {
                head: Box::new(head),
                stages,
            })
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Spanned {
                token: Token::Dollar,
                ..
            }) => Ok(Expr::Context),

            Some(Spanned {
                token: Token::DollarIdent(name),
                ..
            }) => {
                if self.peek_token() == Some(&Token::LParen) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                        self.expect(Token::RParen)?;
                    }
                    Ok(Expr::Call { name, args })
                } else {
                    // `$name` outside call position reads the context field
                    Ok(Expr::Path {
                        head: Box::new(Expr::Context),
                        stages: vec![Stage::Field(name)],
                    })
                }
            }

            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => Ok(Expr::Path {
                head: Box::new(Expr::Context),
                stages: vec![Stage::Field(name)],
            }),

            Some(Spanned {
                token: Token::Str(s),
                ..
            }) => Ok(Expr::Literal(serde_json::Value::String(s))),

            Some(Spanned {
                token: Token::Num(n),
                pos,
            }) => {
                let number = serde_json::Number::from_f64(n).ok_or(ExprError::Parse {
                    pos,
                    message: format!("number out of range: {n}"),
                })?;
                Ok(Expr::Literal(serde_json::Value::Number(number)))
            }

            Some(Spanned {
                token: Token::True, ..
            }) => Ok(Expr::Literal(serde_json::Value::Bool(true))),
            Some(Spanned {
                token: Token::False,
                ..
            }) => Ok(Expr::Literal(serde_json::Value::Bool(false))),
            Some(Spanned {
                token: Token::Null, ..
            }) => Ok(Expr::Literal(serde_json::Value::Null)),

            Some(Spanned {
                token: Token::LParen,
                ..
            }) => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }

            Some(Spanned {
                token: Token::LBracket,
                ..
            }) => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::RBracket)?;
                }
                Ok(Expr::Array(items))
            }

            Some(Spanned {
                token: Token::LBrace,
                ..
            }) => {
                let mut fields = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = match self.next() {
                            Some(Spanned {
                                token: Token::Str(s),
                                ..
                            }) => s,
                            Some(Spanned {
                                token: Token::Ident(s),
                                ..
                            }) => s,
                            Some(Spanned { token, pos }) => {
                                return Err(ExprError::Parse {
                                    pos,
                                    message: format!("expected object key, found {token:?}"),
                                });
                            }
                            None => return Err(self.error_here("expected object key")),
                        };
                        self.expect(Token::Colon)?;
                        let value = self.expression()?;
                        fields.push((key, value));
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::RBrace)?;
                }
                Ok(Expr::Object(fields))
            }

            Some(Spanned { token, pos }) => Err(ExprError::Parse {
                pos,
                message: format!("unexpected token {token:?}"),
            }),
            None => Err(ExprError::Parse {
                pos: self.source_len,
                message: "empty expression".to_string(),
            }),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
