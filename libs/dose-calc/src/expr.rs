//! Arithmetic expression parser
//!
//! Parses the arithmetic view of a logic definition (variables, constants,
//! `+ - * /`, prefix sign and parentheses) into an owned expression tree and
//! evaluates it against an input map.
//!
//! Operators are read by precedence climbing. Each precedence level is kept as
//! a flat left-associative chain, so tree depth only grows with parenthesis
//! and prefix-sign nesting, which is bounded by `max_depth`.

use crate::error::{CalcError, Result};
use crate::evaluator::MAX_DEPTH_LIMIT;
use crate::token::{input_value, InputMap, Operator, Paren, Token};

/// Highest operator precedence; below it come prefix signs and primaries
const MAX_PRECEDENCE: u8 = 2;

/// Parsed arithmetic expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),

    /// Input reference, resolved at evaluation time
    Variable(String),

    /// Prefix minus
    Neg(Box<Expr>),

    /// Left-associative run of operators of one precedence level
    Chain {
        head: Box<Expr>,
        tail: Vec<(Operator, Expr)>,
    },
}

impl Expr {
    /// Parse a token slice as one complete arithmetic expression
    ///
    /// `max_depth` is clamped to [`MAX_DEPTH_LIMIT`].
    pub fn parse(tokens: &[Token], max_depth: usize) -> Result<Self> {
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
            max_depth: max_depth.min(MAX_DEPTH_LIMIT),
        };

        if tokens.is_empty() {
            return Err(CalcError::expression("empty expression"));
        }

        let expr = parser.parse_level(1)?;
        match parser.peek() {
            None => Ok(expr),
            Some(Token::Parenthesis {
                value: Paren::Close,
            }) => Err(CalcError::expression(format!(
                "unmatched ')' at position {}",
                parser.position
            ))),
            Some(token) => Err(parser.unexpected(token)),
        }
    }

    /// Evaluate against inputs; missing variables read as 0
    pub fn eval(&self, inputs: &InputMap) -> Result<f64> {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => Ok(input_value(inputs, name)),
            Expr::Neg(inner) => Ok(-inner.eval(inputs)?),
            Expr::Chain { head, tail } => {
                let mut acc = head.eval(inputs)?;
                for (op, rhs) in tail {
                    acc = apply(*op, acc, rhs.eval(inputs)?)?;
                }
                Ok(acc)
            },
        }
    }
}

fn apply(op: Operator, lhs: f64, rhs: f64) -> Result<f64> {
    match op {
        Operator::Add => Ok(lhs + rhs),
        Operator::Sub => Ok(lhs - rhs),
        Operator::Mul => Ok(lhs * rhs),
        Operator::Div => {
            if rhs == 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            Ok(lhs / rhs)
        },
    }
}

/// Parse and evaluate in one step, rejecting non-finite results
pub fn evaluate(tokens: &[Token], inputs: &InputMap, max_depth: usize) -> Result<f64> {
    let value = Expr::parse(tokens, max_depth)?.eval(inputs)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::NonFinite(value))
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    depth: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn peek_operator(&self) -> Option<Operator> {
        match self.peek() {
            Some(Token::Operator { value }) => Some(*value),
            _ => None,
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(CalcError::DepthExceeded(self.max_depth));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn unexpected(&self, token: &Token) -> CalcError {
        CalcError::expression(format!(
            "unexpected {} token at position {}",
            token.kind(),
            self.position
        ))
    }

    fn parse_level(&mut self, precedence: u8) -> Result<Expr> {
        if precedence > MAX_PRECEDENCE {
            return self.parse_unary();
        }

        let head = self.parse_level(precedence + 1)?;
        let mut tail = Vec::new();
        while let Some(op) = self.peek_operator() {
            if op.precedence() != precedence {
                break;
            }
            self.advance();
            tail.push((op, self.parse_level(precedence + 1)?));
        }

        if tail.is_empty() {
            Ok(head)
        } else {
            Ok(Expr::Chain {
                head: Box::new(head),
                tail,
            })
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek_operator() {
            Some(op @ (Operator::Add | Operator::Sub)) => {
                self.advance();
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(if op == Operator::Sub {
                    Expr::Neg(Box::new(operand))
                } else {
                    operand
                })
            },
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self
            .peek()
            .ok_or_else(|| CalcError::expression("unexpected end of expression"))?;

        match token {
            Token::Constant { value } => {
                self.advance();
                Ok(Expr::Number(*value))
            },
            Token::Variable { id } => {
                self.advance();
                Ok(Expr::Variable(id.clone()))
            },
            Token::Parenthesis { value: Paren::Open } => {
                let open_at = self.position;
                self.advance();
                self.enter()?;
                let inner = self.parse_level(1)?;
                self.leave();
                match self.advance() {
                    Some(Token::Parenthesis {
                        value: Paren::Close,
                    }) => Ok(inner),
                    _ => Err(CalcError::expression(format!(
                        "unmatched '(' at position {}",
                        open_at
                    ))),
                }
            },
            Token::Parenthesis {
                value: Paren::Close,
            } => Err(CalcError::expression(format!(
                "unexpected ')' at position {}",
                self.position
            ))),
            other => Err(self.unexpected(other)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::token::Operator::{Add, Div, Mul, Sub};

    const DEPTH: usize = 32;

    fn eval(tokens: &[Token]) -> Result<f64> {
        evaluate(tokens, &InputMap::new(), DEPTH)
    }

    fn make_inputs(pairs: &[(&str, f64)]) -> InputMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_operator_precedence() {
        // 3 + 4 * 2 = 11
        let tokens = [
            Token::num(3.0),
            Token::op(Add),
            Token::num(4.0),
            Token::op(Mul),
            Token::num(2.0),
        ];
        assert_eq!(eval(&tokens).unwrap(), 11.0);
    }

    #[test]
    fn test_parentheses_override_precedence() {
        // (3 + 4) * 2 = 14
        let tokens = [
            Token::open(),
            Token::num(3.0),
            Token::op(Add),
            Token::num(4.0),
            Token::close(),
            Token::op(Mul),
            Token::num(2.0),
        ];
        assert_eq!(eval(&tokens).unwrap(), 14.0);
    }

    #[test]
    fn test_left_associativity() {
        // 20 - 5 - 3 = 12, 100 / 10 / 2 = 5
        let sub = [
            Token::num(20.0),
            Token::op(Sub),
            Token::num(5.0),
            Token::op(Sub),
            Token::num(3.0),
        ];
        let div = [
            Token::num(100.0),
            Token::op(Div),
            Token::num(10.0),
            Token::op(Div),
            Token::num(2.0),
        ];
        assert_eq!(eval(&sub).unwrap(), 12.0);
        assert_eq!(eval(&div).unwrap(), 5.0);
    }

    #[test]
    fn test_variables_and_defaults() {
        let tokens = [Token::var("x"), Token::op(Add), Token::num(1.0)];
        assert_eq!(eval(&tokens).unwrap(), 1.0);

        let inputs = make_inputs(&[("x", 41.0)]);
        assert_eq!(evaluate(&tokens, &inputs, DEPTH).unwrap(), 42.0);
    }

    #[test]
    fn test_prefix_sign() {
        // -5 + 3 = -2
        let leading = [Token::op(Sub), Token::num(5.0), Token::op(Add), Token::num(3.0)];
        // 3 * - 2 = -6
        let after_op = [Token::num(3.0), Token::op(Mul), Token::op(Sub), Token::num(2.0)];
        // 3 - - 2 = 5
        let double = [Token::num(3.0), Token::op(Sub), Token::op(Sub), Token::num(2.0)];
        // + 4 = 4
        let plus = [Token::op(Add), Token::num(4.0)];

        assert_eq!(eval(&leading).unwrap(), -2.0);
        assert_eq!(eval(&after_op).unwrap(), -6.0);
        assert_eq!(eval(&double).unwrap(), 5.0);
        assert_eq!(eval(&plus).unwrap(), 4.0);
    }

    #[test]
    fn test_unmatched_parentheses() {
        let open = [Token::open(), Token::num(1.0), Token::op(Add), Token::num(2.0)];
        let close = [Token::num(1.0), Token::close()];
        let stray = [Token::close(), Token::num(1.0)];

        assert!(matches!(eval(&open), Err(CalcError::Expression(m)) if m.contains("'('")));
        assert!(matches!(eval(&close), Err(CalcError::Expression(m)) if m.contains("')'")));
        assert!(eval(&stray).is_err());
    }

    #[test]
    fn test_malformed_sequences() {
        // 3 4
        assert!(eval(&[Token::num(3.0), Token::num(4.0)]).is_err());
        // 3 +
        assert!(eval(&[Token::num(3.0), Token::op(Add)]).is_err());
        // * 3
        assert!(eval(&[Token::op(Mul), Token::num(3.0)]).is_err());
        // ()
        assert!(eval(&[Token::open(), Token::close()]).is_err());
        // empty
        assert!(eval(&[]).is_err());
        // string inside arithmetic
        assert!(eval(&[Token::num(1.0), Token::op(Add), Token::text("x")]).is_err());
    }

    #[test]
    fn test_division_by_zero() {
        let tokens = [Token::num(10.0), Token::op(Div), Token::var("b")];
        assert!(matches!(eval(&tokens), Err(CalcError::DivisionByZero)));
    }

    #[test]
    fn test_non_finite_result() {
        let tokens = [Token::num(1e308), Token::op(Mul), Token::num(10.0)];
        assert!(matches!(eval(&tokens), Err(CalcError::NonFinite(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut tokens = vec![Token::open(); 10];
        tokens.push(Token::num(1.0));
        tokens.extend(vec![Token::close(); 10]);

        assert_eq!(evaluate(&tokens, &InputMap::new(), 10).unwrap(), 1.0);
        assert!(matches!(
            evaluate(&tokens, &InputMap::new(), 9),
            Err(CalcError::DepthExceeded(9))
        ));
    }

    #[test]
    fn test_depth_limit_has_ceiling() {
        let mut tokens = vec![Token::open(); 5_000];
        tokens.push(Token::num(1.0));
        tokens.extend(vec![Token::close(); 5_000]);

        assert!(matches!(
            evaluate(&tokens, &InputMap::new(), usize::MAX),
            Err(CalcError::DepthExceeded(MAX_DEPTH_LIMIT))
        ));
    }

    #[test]
    fn test_long_chain_stays_flat() {
        let mut tokens = vec![Token::num(1.0)];
        for _ in 0..10_000 {
            tokens.push(Token::op(Add));
            tokens.push(Token::num(1.0));
        }

        let expr = Expr::parse(&tokens, DEPTH).unwrap();
        match &expr {
            Expr::Chain { tail, .. } => assert_eq!(tail.len(), 10_000),
            other => panic!("expected chain, got {:?}", other),
        }
        assert_eq!(expr.eval(&InputMap::new()).unwrap(), 10_001.0);
    }

    #[test]
    fn test_vasopressor_dose() {
        // (rate * 32) / weight / 60
        let tokens = [
            Token::open(),
            Token::var("rate"),
            Token::op(Mul),
            Token::num(32.0),
            Token::close(),
            Token::op(Div),
            Token::var("weight"),
            Token::op(Div),
            Token::num(60.0),
        ];
        let inputs = make_inputs(&[("rate", 10.0), ("weight", 50.0)]);
        let result = evaluate(&tokens, &inputs, DEPTH).unwrap();
        assert!((result - 320.0 / 3000.0).abs() < 1e-12);
    }
}
