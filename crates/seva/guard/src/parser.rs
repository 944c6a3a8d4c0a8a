//! Parser: precedence-climbing parser for guard expressions.
//!
//! Grammar, loosest to tightest binding:
//!
//! ```text
//! or     := and ("||" and)*
//! and    := cmp ("&&" cmp)*
//! cmp    := sum (("==" | "!=" | "<" | "<=" | ">" | ">=") sum)?
//! sum    := term (("+" | "-") term)*
//! term   := unary ("*" unary)*
//! unary  := ("!" | "-") unary | primary
//! primary := literal | identifier | has_role "(" string ")" | "(" or ")"
//! ```

use crate::ast::{BinaryOp, GuardExpr, UnaryOp, Value};
use crate::error::{GuardError, GuardResult};
use crate::lexer::{Lexer, Token, TokenKind};

/// Compile guard source into an expression tree.
pub fn compile(input: &str) -> GuardResult<GuardExpr> {
    let mut lexer = Lexer::new(input);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    parser.expect(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn parse_or(&mut self) -> GuardResult<GuardExpr> {
        let mut lhs = self.parse_and()?;
        while self.check(TokenKind::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = GuardExpr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> GuardResult<GuardExpr> {
        let mut lhs = self.parse_cmp()?;
        while self.check(TokenKind::AndAnd) {
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = GuardExpr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> GuardResult<GuardExpr> {
        let lhs = self.parse_sum()?;
        let op = match self.peek_kind() {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_sum()?;
        Ok(GuardExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_sum(&mut self) -> GuardResult<GuardExpr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = GuardExpr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> GuardResult<GuardExpr> {
        let mut lhs = self.parse_unary()?;
        while self.check(TokenKind::Star) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = GuardExpr::Binary {
                op: BinaryOp::Mul,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> GuardResult<GuardExpr> {
        match self.peek_kind() {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(GuardExpr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(GuardExpr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> GuardResult<GuardExpr> {
        match self.peek_kind() {
            TokenKind::NumberLiteral => {
                let token = self.advance();
                let n = token.text.parse::<f64>().map_err(|_| GuardError::ParseError {
                    line: token.line,
                    col: token.col,
                    message: format!("invalid number '{}'", token.text),
                })?;
                Ok(GuardExpr::Literal(Value::Number(n)))
            }
            TokenKind::StringLiteral => {
                let token = self.advance();
                Ok(GuardExpr::Literal(Value::Text(token.text.clone())))
            }
            TokenKind::True => {
                self.advance();
                Ok(GuardExpr::Literal(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(GuardExpr::Literal(Value::Bool(false)))
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let name = token.text.clone();
                if name == "has_role" && self.check(TokenKind::OpenParen) {
                    self.advance();
                    let role = self.expect(TokenKind::StringLiteral)?.text.clone();
                    self.expect(TokenKind::CloseParen)?;
                    Ok(GuardExpr::HasRole(role))
                } else {
                    Ok(GuardExpr::Var(name))
                }
            }
            TokenKind::Eof => Err(GuardError::UnexpectedEof("an expression".into())),
            other => {
                let token = self.peek();
                Err(GuardError::UnexpectedToken {
                    expected: "an expression".into(),
                    found: format!("{} ('{}')", other, token.text),
                })
            }
        }
    }

    // ── Token helpers ────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> GuardResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.peek();
            Err(GuardError::UnexpectedToken {
                expected: kind.to_string(),
                found: format!("{} ('{}')", token.kind, token.text),
            })
        }
    }
}
