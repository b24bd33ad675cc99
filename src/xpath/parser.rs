//! Path expression parser
//!
//! Recursive descent over the restricted grammar:
//!
//! ```text
//! path      := ('/' | '//') step (('/' | '//') step)*
//! step      := nametest predicate?
//! nametest  := '*' | NCName (':' NCName)?
//! predicate := '[' '@' NCName '=' literal ']'
//! ```
//!
//! A relative expression is treated as anchored at the document root, the
//! way split expressions are written in practice.

use super::lexer::{Lexer, Token};

/// Parsed path expression
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub steps: Vec<Step>,
}

/// One location step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NameTest,
    pub predicate: Option<Predicate>,
}

/// Step axis: `/` selects children, `//` any descendant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
}

/// Element name test
#[derive(Debug, Clone, PartialEq)]
pub enum NameTest {
    /// `*`
    Any,
    /// `name` or `prefix:name`; the prefix resolves through the
    /// caller-supplied table only
    Name {
        prefix: Option<String>,
        local: String,
    },
}

/// Step predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `[@name='value']`
    AttrEquals { name: String, value: String },
}

/// Parse a path expression
pub fn parse(input: &str) -> Result<Path, String> {
    let mut parser = Parser::new(input)?;
    parser.parse_path()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, String> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    fn advance(&mut self) -> Result<(), String> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn parse_path(&mut self) -> Result<Path, String> {
        let mut steps = Vec::new();

        // Leading separator; a bare name means a root-anchored child step.
        let mut axis = match self.current {
            Token::Slash => {
                self.advance()?;
                Axis::Child
            }
            Token::DoubleSlash => {
                self.advance()?;
                Axis::Descendant
            }
            _ => Axis::Child,
        };

        loop {
            steps.push(self.parse_step(axis)?);

            axis = match self.current {
                Token::Slash => {
                    self.advance()?;
                    Axis::Child
                }
                Token::DoubleSlash => {
                    self.advance()?;
                    Axis::Descendant
                }
                Token::Eof => break,
                ref t => return Err(format!("unexpected token {:?} after step", t)),
            };
        }

        if steps.is_empty() {
            return Err("empty path expression".to_string());
        }
        Ok(Path { steps })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, String> {
        let test = match &self.current {
            Token::Star => {
                self.advance()?;
                NameTest::Any
            }
            Token::Name(name) => {
                let test = match name.split_once(':') {
                    Some((prefix, local)) => NameTest::Name {
                        prefix: Some(prefix.to_string()),
                        local: local.to_string(),
                    },
                    None => NameTest::Name {
                        prefix: None,
                        local: name.clone(),
                    },
                };
                self.advance()?;
                test
            }
            t => return Err(format!("expected element name, found {:?}", t)),
        };

        let predicate = if self.current == Token::LeftBracket {
            Some(self.parse_predicate()?)
        } else {
            None
        };

        Ok(Step {
            axis,
            test,
            predicate,
        })
    }

    fn parse_predicate(&mut self) -> Result<Predicate, String> {
        self.expect(Token::LeftBracket)?;
        self.expect(Token::At)?;
        let name = match &self.current {
            Token::Name(name) => name.clone(),
            t => return Err(format!("expected attribute name, found {:?}", t)),
        };
        self.advance()?;
        self.expect(Token::Eq)?;
        let value = match &self.current {
            Token::Literal(value) => value.clone(),
            t => return Err(format!("expected quoted literal, found {:?}", t)),
        };
        self.advance()?;
        self.expect(Token::RightBracket)?;
        Ok(Predicate::AttrEquals { name, value })
    }

    fn expect(&mut self, token: Token) -> Result<(), String> {
        if self.current == token {
            self.advance()
        } else {
            Err(format!(
                "expected {:?}, found {:?}",
                token, self.current
            ))
        }
    }
}
