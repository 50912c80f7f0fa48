//! The parser.
//!
//! Takes tokens from the lexer and parses the statement syntax into the
//! statement tree. The parser only ensures the syntax is well-formed; whether
//! a bucket exists, an alias is unique, or an aggregate is legal in context
//! is the planner's job. Expressions are parsed with precedence climbing.

use super::{Keyword, Lexer, Token};
use crate::error::{Error, Result};
use crate::expr::{
    Collection, ExistenceTest, Expr, FunctionCall, Literal, Operator, Quantifier,
};
use crate::stmt::{
    CreateIndexStatement, Direction, FromClause, JoinType, KeyExpr, KeyJoinTerm, ResultExpr,
    SelectStatement, Statement,
};
use std::iter::Peekable;

/// Operator precedence.
type Precedence = u8;

/// Operator associativity. Left-associative operators bind tighter to their
/// left-hand side, so their right-hand parse runs at one higher precedence.
enum Associativity {
    Left,
    Right,
}

impl Associativity {
    fn next_precedence(&self, precedence: Precedence) -> Precedence {
        match self {
            Associativity::Left => precedence + 1,
            Associativity::Right => precedence,
        }
    }
}

enum PrefixOperator {
    Minus,
    Not,
}

impl PrefixOperator {
    fn precedence(&self) -> Precedence {
        match self {
            PrefixOperator::Not => 3,
            PrefixOperator::Minus => 9,
        }
    }

    /// Prefix operators are right-associative by definition.
    fn associativity(&self) -> Associativity {
        Associativity::Right
    }

    fn into_expression(self, rhs: Expr) -> Expr {
        let rhs = Box::new(rhs);
        match self {
            PrefixOperator::Minus => Operator::Negate(rhs).into(),
            PrefixOperator::Not => Operator::Not(rhs).into(),
        }
    }
}

enum InfixOperator {
    Or,
    And,
    Equal,
    NotEqual,
    Like,
    NotLike,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
}

impl InfixOperator {
    fn precedence(&self) -> Precedence {
        use InfixOperator::*;
        match self {
            Or => 1,
            And => 2,
            // prefix NOT is 3
            Equal | NotEqual | Like | NotLike => 4,
            LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual => 5,
            Add | Subtract => 6,
            Multiply | Divide | Remainder => 7,
        }
    }

    fn associativity(&self) -> Associativity {
        Associativity::Left
    }

    fn into_expression(self, lhs: Expr, rhs: Expr) -> Expr {
        use InfixOperator::*;
        let (l, r) = (Box::new(lhs), Box::new(rhs));
        match self {
            Or => Operator::Or(vec![*l, *r]).into(),
            And => Operator::And(vec![*l, *r]).into(),
            Equal => Operator::Equal(l, r).into(),
            NotEqual => Operator::NotEqual(l, r).into(),
            Like => Operator::Like {
                left: l,
                right: r,
                negated: false,
            }
            .into(),
            NotLike => Operator::Like {
                left: l,
                right: r,
                negated: true,
            }
            .into(),
            LessThan => Operator::LessThan(l, r).into(),
            LessThanOrEqual => Operator::LessThanOrEqual(l, r).into(),
            GreaterThan => Operator::GreaterThan(l, r).into(),
            GreaterThanOrEqual => Operator::GreaterThanOrEqual(l, r).into(),
            Add => Operator::Add(l, r).into(),
            Subtract => Operator::Subtract(l, r).into(),
            Multiply => Operator::Multiply(l, r).into(),
            Divide => Operator::Divide(l, r).into(),
            Remainder => Operator::Remainder(l, r).into(),
        }
    }
}

enum PostfixOperator {
    Is { test: ExistenceTest, negated: bool },
    Element(Expr),
    Field(String),
}

impl PostfixOperator {
    fn precedence(&self) -> Precedence {
        match self {
            PostfixOperator::Is { .. } => 4,
            PostfixOperator::Element(_) | PostfixOperator::Field(_) => 10,
        }
    }

    fn into_expression(self, lhs: Expr) -> Expr {
        match self {
            PostfixOperator::Is { test, negated } => Operator::Is {
                expr: Box::new(lhs),
                test,
                negated,
            }
            .into(),
            PostfixOperator::Element(index) => Expr::Element {
                base: Box::new(lhs),
                index: Box::new(index),
            },
            // a field access on a plain path extends the path
            PostfixOperator::Field(field) => match lhs {
                Expr::Property(mut path) => {
                    path.push(field);
                    Expr::Property(path)
                }
                other => Expr::Field {
                    base: Box::new(other),
                    field,
                },
            },
        }
    }
}

pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    /// Set when `.*` terminated the expression being parsed; only the select
    /// list may consume it.
    dot_star: bool,
}

impl Parser<'_> {
    /// Parse the input as a single statement, with an optional trailing
    /// semicolon.
    pub fn parse(statement: &str) -> Result<Statement> {
        let mut parser = Parser::new(statement);
        let statement = parser.parse_statement()?;
        parser.skip(&Token::Semicolon);
        parser.expect_end()?;
        Ok(statement)
    }

    /// Parse a standalone expression; used by tests and index definitions.
    pub fn parse_expression_text(text: &str) -> Result<Expr> {
        let mut parser = Parser::new(text);
        let expr = parser.parse_expression()?;
        if parser.dot_star {
            return Err(Error::Syntax(".* is only allowed in the select list".into()));
        }
        parser.expect_end()?;
        Ok(expr)
    }

    pub fn new(input: &str) -> Parser<'_> {
        Parser {
            lexer: Lexer::new(input).peekable(),
            dot_star: false,
        }
    }

    // ------------------------------------------------------------------
    // token plumbing
    // ------------------------------------------------------------------

    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .transpose()?
            .ok_or_else(|| Error::Syntax("unexpected end of input".into()))
    }

    fn peek(&mut self) -> Result<Option<&Token>> {
        match self.lexer.peek() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some(token)),
            Some(Err(err)) => Err(err.clone()),
        }
    }

    fn next_if(&mut self, predicate: impl Fn(&Token) -> bool) -> Option<Token> {
        match self.peek() {
            Ok(Some(token)) if predicate(token) => {}
            _ => return None,
        }
        self.lexer.next().transpose().ok().flatten()
    }

    fn next_keyword(&mut self, keyword: Keyword) -> bool {
        self.next_if(|t| *t == Token::Keyword(keyword)).is_some()
    }

    fn skip(&mut self, token: &Token) -> bool {
        self.next_if(|t| t == token).is_some()
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.next()?;
        if token != expected {
            return Err(Error::Syntax(format!(
                "expected {}, found {}",
                expected, token
            )));
        }
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect_end(&mut self) -> Result<()> {
        if let Some(token) = self.lexer.next().transpose()? {
            return Err(Error::Syntax(format!("unexpected token {}", token)));
        }
        Ok(())
    }

    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => Err(Error::Syntax(format!(
                "expected identifier, found {}",
                token
            ))),
        }
    }

    /// The next identifier, also accepting keywords in contexts where they
    /// can only be names (e.g. after a period).
    fn next_ident_or_keyword(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            Token::Keyword(keyword) => Ok(keyword.to_string().to_lowercase()),
            token => Err(Error::Syntax(format!(
                "expected identifier, found {}",
                token
            ))),
        }
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Explain)) => {
                self.next()?;
                let mut select = self.parse_select()?;
                select.explain = true;
                Ok(Statement::Select(select))
            }
            Some(Token::Keyword(Keyword::Select)) => Ok(Statement::Select(self.parse_select()?)),
            Some(Token::Keyword(Keyword::Create)) => {
                Ok(Statement::CreateIndex(self.parse_create_index()?))
            }
            Some(token) => Err(Error::Syntax(format!("unexpected token {}", token))),
            None => Err(Error::Syntax("unexpected end of input".into())),
        }
    }

    fn parse_select(&mut self) -> Result<SelectStatement> {
        self.expect_keyword(Keyword::Select)?;
        let distinct = if self.next_keyword(Keyword::All) {
            false
        } else {
            self.next_keyword(Keyword::Distinct)
        };

        let mut select = vec![self.parse_result_expr()?];
        while self.skip(&Token::Comma) {
            select.push(self.parse_result_expr()?);
        }

        let from = self.parse_from_clause()?;
        let r#where = if self.next_keyword(Keyword::Where) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.next_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            group_by.push(self.parse_expression()?);
            while self.skip(&Token::Comma) {
                group_by.push(self.parse_expression()?);
            }
        }
        let having = if self.next_keyword(Keyword::Having) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.next_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            loop {
                let expr = self.parse_expression()?;
                let direction = if self.next_keyword(Keyword::Desc) {
                    Direction::Desc
                } else {
                    self.next_keyword(Keyword::Asc);
                    Direction::Asc
                };
                order_by.push((expr, direction));
                if !self.skip(&Token::Comma) {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = None;
        loop {
            if self.next_keyword(Keyword::Limit) {
                if limit.replace(self.parse_unsigned()?).is_some() {
                    return Err(Error::Syntax("LIMIT given more than once".into()));
                }
            } else if self.next_keyword(Keyword::Offset) {
                if offset.replace(self.parse_unsigned()?).is_some() {
                    return Err(Error::Syntax("OFFSET given more than once".into()));
                }
            } else {
                break;
            }
        }

        Ok(SelectStatement {
            distinct,
            select,
            from,
            r#where,
            group_by,
            having,
            order_by,
            limit,
            offset,
            explain: false,
        })
    }

    fn parse_result_expr(&mut self) -> Result<ResultExpr> {
        if self.skip(&Token::Asterisk) {
            return Ok(ResultExpr::star());
        }
        let expr = self.parse_expression()?;
        if self.dot_star {
            self.dot_star = false;
            return Ok(ResultExpr::dot_star(expr));
        }
        let alias = if self.next_keyword(Keyword::As) {
            Some(self.next_ident()?)
        } else {
            None
        };
        Ok(ResultExpr::named(expr, alias))
    }

    fn parse_from_clause(&mut self) -> Result<Option<FromClause>> {
        if !self.next_keyword(Keyword::From) {
            return Ok(None);
        }
        let (pool, bucket) = self.parse_bucket_ref()?;
        let alias = if self.next_keyword(Keyword::As) {
            Some(self.next_ident()?)
        } else {
            None
        };

        let mut joins = Vec::new();
        loop {
            let join_type = if self.next_keyword(Keyword::Join) {
                JoinType::Inner
            } else if self.next_keyword(Keyword::Inner) {
                self.expect_keyword(Keyword::Join)?;
                JoinType::Inner
            } else if self.next_keyword(Keyword::Left) {
                self.expect_keyword(Keyword::Join)?;
                JoinType::Left
            } else {
                break;
            };
            let (join_pool, join_bucket) = self.parse_bucket_ref()?;
            if join_pool.is_some() {
                return Err(Error::Syntax(
                    "joined buckets live in the statement's pool".into(),
                ));
            }
            let join_alias = if self.next_keyword(Keyword::As) {
                Some(self.next_ident()?)
            } else {
                None
            };
            let many = if self.next_keyword(Keyword::Keys) {
                true
            } else if self.next_keyword(Keyword::Key) {
                false
            } else {
                return Err(Error::Syntax("expected KEY or KEYS after JOIN".into()));
            };
            let keys = KeyExpr {
                many,
                expr: self.parse_expression()?,
            };
            joins.push(KeyJoinTerm {
                join_type,
                bucket: join_bucket,
                alias: join_alias,
                keys,
            });
        }

        Ok(Some(FromClause {
            pool,
            bucket,
            alias,
            joins,
        }))
    }

    /// `bucket` or `pool:bucket`.
    fn parse_bucket_ref(&mut self) -> Result<(Option<String>, String)> {
        let first = self.next_ident()?;
        if self.skip(&Token::Colon) {
            Ok((Some(first), self.next_ident()?))
        } else {
            Ok((None, first))
        }
    }

    fn parse_create_index(&mut self) -> Result<CreateIndexStatement> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Index)?;
        let name = self.next_ident()?;
        self.expect_keyword(Keyword::On)?;
        let (pool, bucket) = self.parse_bucket_ref()?;
        self.expect(Token::OpenParen)?;
        let mut expressions = vec![self.parse_expression()?];
        while self.skip(&Token::Comma) {
            expressions.push(self.parse_expression()?);
        }
        self.expect(Token::CloseParen)?;
        let method = if self.next_keyword(Keyword::Using) {
            Some(self.next_ident()?)
        } else {
            None
        };
        Ok(CreateIndexStatement {
            name,
            pool,
            bucket,
            method,
            expressions,
        })
    }

    fn parse_unsigned(&mut self) -> Result<u64> {
        match self.next()? {
            Token::Number(n) => n
                .parse::<u64>()
                .map_err(|_| Error::Syntax(format!("expected a non-negative integer, found {}", n))),
            token => Err(Error::Syntax(format!(
                "expected a non-negative integer, found {}",
                token
            ))),
        }
    }

    // ------------------------------------------------------------------
    // expressions
    // ------------------------------------------------------------------

    pub fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_expression_at(0)
    }

    /// Precedence climbing: parse a prefix operator or an atom, then fold in
    /// postfix and infix operators while their precedence allows.
    fn parse_expression_at(&mut self, min_precedence: Precedence) -> Result<Expr> {
        let mut lhs = if let Some(prefix) = self.parse_prefix_operator_at(min_precedence)? {
            let next = prefix.associativity().next_precedence(prefix.precedence());
            let rhs = self.parse_expression_at(next)?;
            prefix.into_expression(rhs)
        } else {
            self.parse_expression_atom()?
        };

        loop {
            if let Some(postfix) = self.parse_postfix_operator_at(min_precedence)? {
                lhs = postfix.into_expression(lhs);
                continue;
            }
            if let Some(infix) = self.parse_infix_operator_at(min_precedence)? {
                let next = infix.associativity().next_precedence(infix.precedence());
                let rhs = self.parse_expression_at(next)?;
                lhs = infix.into_expression(lhs, rhs);
                continue;
            }
            break;
        }
        Ok(lhs)
    }

    fn parse_prefix_operator_at(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<Option<PrefixOperator>> {
        let op = match self.peek()? {
            Some(Token::Minus) => PrefixOperator::Minus,
            Some(Token::Keyword(Keyword::Not)) => PrefixOperator::Not,
            _ => return Ok(None),
        };
        if op.precedence() < min_precedence {
            return Ok(None);
        }
        self.next()?;
        Ok(Some(op))
    }

    fn parse_infix_operator_at(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<Option<InfixOperator>> {
        if self.dot_star {
            return Ok(None);
        }
        let op = match self.peek()? {
            Some(Token::Keyword(Keyword::Or)) => InfixOperator::Or,
            Some(Token::Keyword(Keyword::And)) => InfixOperator::And,
            Some(Token::Equal) => InfixOperator::Equal,
            Some(Token::NotEqual) => InfixOperator::NotEqual,
            Some(Token::Keyword(Keyword::Like)) => InfixOperator::Like,
            // in infix position NOT can only begin NOT LIKE
            Some(Token::Keyword(Keyword::Not)) => InfixOperator::NotLike,
            Some(Token::LessThan) => InfixOperator::LessThan,
            Some(Token::LessThanOrEqual) => InfixOperator::LessThanOrEqual,
            Some(Token::GreaterThan) => InfixOperator::GreaterThan,
            Some(Token::GreaterThanOrEqual) => InfixOperator::GreaterThanOrEqual,
            Some(Token::Plus) => InfixOperator::Add,
            Some(Token::Minus) => InfixOperator::Subtract,
            Some(Token::Asterisk) => InfixOperator::Multiply,
            Some(Token::Slash) => InfixOperator::Divide,
            Some(Token::Percent) => InfixOperator::Remainder,
            _ => return Ok(None),
        };
        if op.precedence() < min_precedence {
            return Ok(None);
        }
        let was_not = matches!(op, InfixOperator::NotLike);
        self.next()?;
        if was_not {
            self.expect_keyword(Keyword::Like)?;
        }
        Ok(Some(op))
    }

    fn parse_postfix_operator_at(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<Option<PostfixOperator>> {
        if self.dot_star {
            return Ok(None);
        }
        match self.peek()? {
            Some(Token::Keyword(Keyword::Is)) => {
                if 4 < min_precedence {
                    return Ok(None);
                }
                self.next()?;
                let negated = self.next_keyword(Keyword::Not);
                let test = match self.next()? {
                    Token::Keyword(Keyword::Null) => ExistenceTest::Null,
                    Token::Keyword(Keyword::Missing) => ExistenceTest::Missing,
                    Token::Keyword(Keyword::Valued) => ExistenceTest::Valued,
                    token => {
                        return Err(Error::Syntax(format!(
                            "expected NULL, MISSING or VALUED, found {}",
                            token
                        )))
                    }
                };
                Ok(Some(PostfixOperator::Is { test, negated }))
            }
            Some(Token::OpenBracket) => {
                self.next()?;
                let index = self.parse_expression()?;
                self.expect(Token::CloseBracket)?;
                Ok(Some(PostfixOperator::Element(index)))
            }
            Some(Token::Period) => {
                self.next()?;
                if self.skip(&Token::Asterisk) {
                    // `.*` ends the expression; the select list consumes it
                    self.dot_star = true;
                    return Ok(None);
                }
                Ok(Some(PostfixOperator::Field(self.next_ident_or_keyword()?)))
            }
            _ => Ok(None),
        }
    }

    fn parse_expression_atom(&mut self) -> Result<Expr> {
        match self.next()? {
            Token::Number(spelling) => {
                let number: f64 = spelling
                    .parse()
                    .map_err(|_| Error::Syntax(format!("invalid number {}", spelling)))?;
                Ok(Expr::Literal(Literal::Number(number)))
            }
            Token::String(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Keyword(Keyword::True) => Ok(Expr::Literal(Literal::Bool(true))),
            Token::Keyword(Keyword::False) => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Keyword(Keyword::Null) => Ok(Expr::Literal(Literal::Null)),
            Token::Keyword(Keyword::Missing) => Ok(Expr::Literal(Literal::Missing)),
            Token::Param(name) => Ok(Expr::Parameter(name)),
            Token::Ident(name) => {
                if matches!(self.peek()?, Some(Token::OpenParen)) {
                    self.parse_function_call(name)
                } else {
                    Ok(Expr::property(name))
                }
            }
            Token::OpenParen => {
                let expr = self.parse_expression()?;
                self.expect(Token::CloseParen)?;
                Ok(expr)
            }
            Token::OpenBracket => {
                let mut elements = Vec::new();
                if !self.skip(&Token::CloseBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.skip(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(Token::CloseBracket)?;
                }
                Ok(Expr::Array(elements))
            }
            Token::OpenBrace => self.parse_object_constructor(),
            Token::Keyword(Keyword::Case) => self.parse_case(),
            Token::Keyword(Keyword::Any) => self.parse_collection(Quantifier::Any),
            Token::Keyword(Keyword::All) => self.parse_collection(Quantifier::All),
            Token::Keyword(Keyword::First) => self.parse_collection(Quantifier::First),
            Token::Keyword(Keyword::Array) => self.parse_collection(Quantifier::Array),
            token => Err(Error::Syntax(format!(
                "expected expression, found {}",
                token
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<Expr> {
        self.expect(Token::OpenParen)?;
        let name = name.to_uppercase();
        if self.skip(&Token::Asterisk) {
            self.expect(Token::CloseParen)?;
            return Ok(Expr::Function(FunctionCall {
                name,
                args: Vec::new(),
                distinct: false,
                star: true,
            }));
        }
        let distinct = self.next_keyword(Keyword::Distinct);
        let mut args = Vec::new();
        if !self.skip(&Token::CloseParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.skip(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen)?;
        }
        Ok(Expr::Function(FunctionCall {
            name,
            args,
            distinct,
            star: false,
        }))
    }

    fn parse_object_constructor(&mut self) -> Result<Expr> {
        let mut fields = Vec::new();
        if !self.skip(&Token::CloseBrace) {
            loop {
                let key = match self.next()? {
                    Token::String(s) => s,
                    Token::Ident(i) => i,
                    Token::Keyword(k) => k.to_string().to_lowercase(),
                    token => {
                        return Err(Error::Syntax(format!(
                            "expected object key, found {}",
                            token
                        )))
                    }
                };
                self.expect(Token::Colon)?;
                fields.push((key, self.parse_expression()?));
                if !self.skip(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseBrace)?;
        }
        Ok(Expr::Object(fields))
    }

    fn parse_case(&mut self) -> Result<Expr> {
        let operand = if matches!(self.peek()?, Some(Token::Keyword(Keyword::When))) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        let mut when_clauses = Vec::new();
        while self.next_keyword(Keyword::When) {
            let when = self.parse_expression()?;
            self.expect_keyword(Keyword::Then)?;
            when_clauses.push((when, self.parse_expression()?));
        }
        if when_clauses.is_empty() {
            return Err(Error::Syntax("CASE requires at least one WHEN".into()));
        }
        let else_clause = if self.next_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;
        Ok(Expr::Case {
            operand,
            when_clauses,
            else_clause,
        })
    }

    fn parse_collection(&mut self, quantifier: Quantifier) -> Result<Expr> {
        let output = Box::new(self.parse_expression()?);
        self.expect_keyword(Keyword::Over)?;
        let over = Box::new(self.parse_expression()?);
        let when = if self.next_keyword(Keyword::When) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Expr::Collection(Collection {
            quantifier,
            output,
            over,
            when,
        }))
    }
}
