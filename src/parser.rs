//! src/parser.rs

use crate::ast::{BinaryOperator, Block, Expression, ExpressionKind, Literal, Program, Statement, UnaryOperator};
use crate::common::{Position, Type};
use crate::error::SyntaxError;
use crate::lexer::{Keyword, Operator, Punctuation, Token, TokenType};

/// 语句可以开始的 token，用于报错信息。
const STATEMENT_START: &[&str] = &[
    "'int'",
    "'float'",
    "'bool'",
    "identifier",
    "'if'",
    "'while'",
    "'print'",
    "'return'",
    "'{'",
];

const EXPRESSION_START: &[&str] = &["literal", "identifier", "'('", "'-'", "'!'"];

/// 括号、一元运算符和语句块合计的最大嵌套层数。
/// 后面各阶段都按树递归，层数必须在解析时就限制住。
pub const MAX_NESTING: usize = 64;

const NESTING_LIMIT: &str = "at most 64 levels of nesting";

type ParseResult<T> = Result<T, SyntaxError>;

/// 解析整个 token 序列，这是最常用的入口。
pub fn parse(tokens: &[Token]) -> ParseResult<Program> {
    Parser::new(tokens).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Parser {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// <program> ::= { <statement> } EOF
    pub fn parse(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();
        while !matches!(self.peek_type(), Some(TokenType::Eof)) {
            statements.push(self.parse_statement()?);
        }
        self.expect(&TokenType::Eof, "end of input")?;

        // Eof 之后不应该还有 token
        if self.position < self.tokens.len() {
            return Err(self.error_here(&["end of input"]));
        }
        Ok(Program { statements })
    }

    // --- Private Helper Methods ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_type(&self) -> Option<&TokenType> {
        self.peek().map(|t| &t.token_type)
    }

    fn consume(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// token 序列被截断时，错误位置落在最后一个 token 之后。
    fn end_position(&self) -> Position {
        match self.tokens.last() {
            Some(last) => Position::new(
                last.position.line,
                last.position.column + last.lexeme.chars().count(),
            ),
            None => Position::new(1, 1),
        }
    }

    fn error_here(&self, expected: &[&str]) -> SyntaxError {
        let (position, found) = match self.peek() {
            Some(token) if token.token_type == TokenType::Eof => {
                (token.position, "end of input".to_string())
            }
            Some(token) => (token.position, format!("'{}'", token.lexeme)),
            None => (self.end_position(), "end of input".to_string()),
        };
        SyntaxError {
            position,
            expected: expected.iter().map(|s| s.to_string()).collect(),
            found,
        }
    }

    /// 在多一层嵌套里运行 `parse`，超过 MAX_NESTING 时在当前 token 处报错。
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here(&[NESTING_LIMIT]));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// 期望并消费一个特定类型的 token。
    fn expect(&mut self, expected: &TokenType, description: &str) -> ParseResult<Position> {
        match self.peek() {
            Some(token) if &token.token_type == expected => {
                let position = token.position;
                self.position += 1;
                Ok(position)
            }
            _ => Err(self.error_here(&[description])),
        }
    }

    fn expect_punctuation(&mut self, punct: Punctuation, description: &str) -> ParseResult<Position> {
        self.expect(&TokenType::Punctuation(punct), description)
    }

    fn expect_identifier(&mut self) -> ParseResult<(String, Position)> {
        if let Some(Token {
            token_type: TokenType::Identifier(name),
            position,
            ..
        }) = self.peek()
        {
            let result = (name.clone(), *position);
            self.consume();
            return Ok(result);
        }
        Err(self.error_here(&["identifier"]))
    }

    // --- Statements ---

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        match self.peek_type() {
            Some(TokenType::Keyword(Keyword::Int))
            | Some(TokenType::Keyword(Keyword::Float))
            | Some(TokenType::Keyword(Keyword::Bool)) => self.parse_declaration(),
            Some(TokenType::Identifier(_)) => self.parse_assignment(),
            Some(TokenType::Keyword(Keyword::If)) => self.parse_if(),
            Some(TokenType::Keyword(Keyword::While)) => self.parse_while(),
            Some(TokenType::Keyword(Keyword::Print)) => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect_punctuation(Punctuation::Semicolon, "';'")?;
                Ok(Statement::Print(expr))
            }
            Some(TokenType::Keyword(Keyword::Return)) => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect_punctuation(Punctuation::Semicolon, "';'")?;
                Ok(Statement::Return(expr))
            }
            Some(TokenType::Punctuation(Punctuation::OpenBrace)) => {
                Ok(Statement::Block(self.parse_block()?))
            }
            _ => Err(self.error_here(STATEMENT_START)),
        }
    }

    /// <declaration> ::= <type> <identifier> [ "=" <exp> ] ";"
    fn parse_declaration(&mut self) -> ParseResult<Statement> {
        let declared_type = match self.peek_type() {
            Some(TokenType::Keyword(Keyword::Int)) => Type::Int,
            Some(TokenType::Keyword(Keyword::Float)) => Type::Float,
            Some(TokenType::Keyword(Keyword::Bool)) => Type::Bool,
            _ => return Err(self.error_here(&["'int'", "'float'", "'bool'"])),
        };
        self.consume();
        let (name, position) = self.expect_identifier()?;

        let init = match self.peek_type() {
            Some(TokenType::Operator(Operator::Assign)) => {
                self.consume();
                Some(self.parse_expression()?)
            }
            Some(TokenType::Punctuation(Punctuation::Semicolon)) => None,
            _ => return Err(self.error_here(&["'='", "';'"])),
        };
        self.expect_punctuation(Punctuation::Semicolon, "';'")?;

        Ok(Statement::VarDecl {
            name,
            declared_type,
            init,
            position,
            slot: None,
        })
    }

    /// <assignment> ::= <identifier> "=" <exp> ";"
    fn parse_assignment(&mut self) -> ParseResult<Statement> {
        let (name, position) = self.expect_identifier()?;
        self.expect(&TokenType::Operator(Operator::Assign), "'='")?;
        let value = self.parse_expression()?;
        self.expect_punctuation(Punctuation::Semicolon, "';'")?;
        Ok(Statement::Assign {
            name,
            value,
            position,
            slot: None,
            target_type: None,
        })
    }

    /// <if> ::= "if" "(" <exp> ")" <block> [ "else" ( <block> | <if> ) ]
    fn parse_if(&mut self) -> ParseResult<Statement> {
        self.expect(&TokenType::Keyword(Keyword::If), "'if'")?;
        let condition = self.parse_condition()?;
        let then_block = self.parse_block()?;

        let else_block = if matches!(self.peek_type(), Some(TokenType::Keyword(Keyword::Else))) {
            self.consume();
            match self.peek_type() {
                // else if 被表示成只含一个 If 的 else 块
                Some(TokenType::Keyword(Keyword::If)) => Some(Block {
                    statements: vec![self.nested(Self::parse_if)?],
                }),
                Some(TokenType::Punctuation(Punctuation::OpenBrace)) => Some(self.parse_block()?),
                _ => return Err(self.error_here(&["'{'", "'if'"])),
            }
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_block,
            else_block,
        })
    }

    /// <while> ::= "while" "(" <exp> ")" <block>
    fn parse_while(&mut self) -> ParseResult<Statement> {
        self.expect(&TokenType::Keyword(Keyword::While), "'while'")?;
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(Statement::While { condition, body })
    }

    fn parse_condition(&mut self) -> ParseResult<Expression> {
        self.expect_punctuation(Punctuation::OpenParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect_punctuation(Punctuation::CloseParen, "')'")?;
        Ok(condition)
    }

    /// <block> ::= "{" { <statement> } "}"
    fn parse_block(&mut self) -> ParseResult<Block> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> ParseResult<Block> {
        self.expect_punctuation(Punctuation::OpenBrace, "'{'")?;
        let mut statements = Vec::new();
        loop {
            match self.peek_type() {
                Some(TokenType::Punctuation(Punctuation::CloseBrace)) => break,
                Some(TokenType::Eof) | None => {
                    let mut expected = STATEMENT_START.to_vec();
                    expected.push("'}'");
                    return Err(self.error_here(&expected));
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
        self.expect_punctuation(Punctuation::CloseBrace, "'}'")?;
        Ok(Block { statements })
    }

    // --- Expressions: 优先级从低到高 ---

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    /// 解析一层左结合的二元运算。
    fn parse_left_assoc(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<Expression>,
        operators: &[(Operator, BinaryOperator)],
    ) -> ParseResult<Expression> {
        let mut left = operand(self)?;
        loop {
            let matched = match self.peek() {
                Some(Token {
                    token_type: TokenType::Operator(op),
                    position,
                    ..
                }) => operators
                    .iter()
                    .find(|(candidate, _)| candidate == op)
                    .map(|(_, bin)| (*bin, *position)),
                _ => None,
            };
            let Some((operator, position)) = matched else {
                return Ok(left);
            };
            self.consume();
            let right = operand(self)?;
            left = Expression::new(
                ExpressionKind::Binary {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                position,
            );
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        self.parse_left_assoc(Self::parse_and, &[(Operator::OrOr, BinaryOperator::Or)])
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        self.parse_left_assoc(Self::parse_equality, &[(Operator::AndAnd, BinaryOperator::And)])
    }

    fn parse_equality(&mut self) -> ParseResult<Expression> {
        self.parse_left_assoc(
            Self::parse_relational,
            &[
                (Operator::Equal, BinaryOperator::Equal),
                (Operator::NotEqual, BinaryOperator::NotEqual),
            ],
        )
    }

    fn parse_relational(&mut self) -> ParseResult<Expression> {
        self.parse_left_assoc(
            Self::parse_additive,
            &[
                (Operator::Less, BinaryOperator::LessThan),
                (Operator::LessEqual, BinaryOperator::LessOrEqual),
                (Operator::Greater, BinaryOperator::GreaterThan),
                (Operator::GreaterEqual, BinaryOperator::GreaterOrEqual),
            ],
        )
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        self.parse_left_assoc(
            Self::parse_multiplicative,
            &[
                (Operator::Plus, BinaryOperator::Add),
                (Operator::Minus, BinaryOperator::Subtract),
            ],
        )
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        self.parse_left_assoc(
            Self::parse_unary,
            &[
                (Operator::Star, BinaryOperator::Multiply),
                (Operator::Slash, BinaryOperator::Divide),
                (Operator::Percent, BinaryOperator::Remainder),
            ],
        )
    }

    /// <unary> ::= ( "-" | "!" ) <unary> | <primary>
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = match self.peek_type() {
            Some(TokenType::Operator(Operator::Minus)) => UnaryOperator::Negate,
            Some(TokenType::Operator(Operator::Bang)) => UnaryOperator::Not,
            _ => return self.parse_primary(),
        };
        let position = self.peek().map(|t| t.position).unwrap_or_default();
        let operand = self.nested(|parser| {
            parser.consume();
            parser.parse_unary()
        })?;
        Ok(Expression::new(
            ExpressionKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            position,
        ))
    }

    /// <primary> ::= <int> | <float> | <bool> | <identifier> | "(" <exp> ")"
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        if matches!(
            self.peek_type(),
            Some(TokenType::Punctuation(Punctuation::OpenParen))
        ) {
            return self.nested(|parser| {
                parser.consume();
                let inner = parser.parse_expression()?;
                parser.expect_punctuation(Punctuation::CloseParen, "')'")?;
                Ok(inner)
            });
        }

        let Some(token) = self.peek() else {
            return Err(self.error_here(EXPRESSION_START));
        };
        let position = token.position;
        let kind = match &token.token_type {
            TokenType::IntegerLiteral(i) => ExpressionKind::Literal(Literal::Int(*i)),
            TokenType::FloatLiteral(x) => ExpressionKind::Literal(Literal::Float(*x)),
            TokenType::BooleanLiteral(b) => ExpressionKind::Literal(Literal::Bool(*b)),
            TokenType::Identifier(name) => ExpressionKind::Var {
                name: name.clone(),
                slot: None,
            },
            _ => return Err(self.error_here(EXPRESSION_START)),
        };
        self.consume();
        Ok(Expression::new(kind, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> ParseResult<Program> {
        let tokens = tokenize(source).expect("lex ok");
        parse(&tokens)
    }

    fn single_return(source: &str) -> Expression {
        let mut program = parse_source(source).expect("parse ok");
        match program.statements.pop() {
            Some(Statement::Return(expr)) => expr,
            other => panic!("expected return, got {:?}", other),
        }
    }

    fn binary_parts(expr: &Expression) -> (BinaryOperator, &Expression, &Expression) {
        match &expr.kind {
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => (*operator, left, right),
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = single_return("return x + y * 2;");
        let (op, left, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOperator::Add);
        assert!(matches!(&left.kind, ExpressionKind::Var { name, .. } if name == "x"));
        let (inner, _, _) = binary_parts(right);
        assert_eq!(inner, BinaryOperator::Multiply);
    }

    #[test]
    fn binary_operators_are_left_associative() {
        let expr = single_return("return 10 - 4 - 3;");
        let (op, left, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOperator::Subtract);
        assert_eq!(right.kind, ExpressionKind::Literal(Literal::Int(3)));
        let (inner, _, inner_right) = binary_parts(left);
        assert_eq!(inner, BinaryOperator::Subtract);
        assert_eq!(inner_right.kind, ExpressionKind::Literal(Literal::Int(4)));
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr = single_return("return (1 + 2) * 3;");
        let (op, left, _) = binary_parts(&expr);
        assert_eq!(op, BinaryOperator::Multiply);
        assert_eq!(binary_parts(left).0, BinaryOperator::Add);
    }

    #[test]
    fn logical_precedence_chain() {
        // a || b && c == d < e  =>  a || (b && (c == (d < e)))
        let expr = single_return("return a || b && c == d < e;");
        let (op, _, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOperator::Or);
        let (op, _, right) = binary_parts(right);
        assert_eq!(op, BinaryOperator::And);
        let (op, _, right) = binary_parts(right);
        assert_eq!(op, BinaryOperator::Equal);
        assert_eq!(binary_parts(right).0, BinaryOperator::LessThan);
    }

    #[test]
    fn unary_operators_nest() {
        let expr = single_return("return -!x;");
        match &expr.kind {
            ExpressionKind::Unary {
                operator: UnaryOperator::Negate,
                operand,
            } => assert!(matches!(
                operand.kind,
                ExpressionKind::Unary {
                    operator: UnaryOperator::Not,
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn statements_and_else_if() {
        let program = parse_source(
            r#"
            int x = 5;
            float f;
            if (x > 10) { print x; } else if (x > 3) { x = 1; } else { return 0; }
            while (x < 3) { x = x + 1; }
            { bool b = true; }
            print(x);
            "#,
        )
        .expect("parse ok");
        assert_eq!(program.statements.len(), 6);
        assert!(matches!(
            &program.statements[1],
            Statement::VarDecl { declared_type: Type::Float, init: None, .. }
        ));
        match &program.statements[2] {
            Statement::If {
                else_block: Some(else_block),
                ..
            } => {
                assert_eq!(else_block.statements.len(), 1);
                assert!(matches!(
                    &else_block.statements[0],
                    Statement::If { else_block: Some(_), .. }
                ));
            }
            other => panic!("expected if/else, got {:?}", other),
        }
        assert!(matches!(&program.statements[3], Statement::While { .. }));
        assert!(matches!(&program.statements[4], Statement::Block(_)));
        assert!(matches!(&program.statements[5], Statement::Print(_)));
    }

    #[test]
    fn missing_semicolon_reports_found_token() {
        let err = parse_source("int x = 2\nreturn x;").unwrap_err();
        assert_eq!(err.position, Position::new(2, 1));
        assert_eq!(err.expected, vec!["';'".to_string()]);
        assert_eq!(err.found, "'return'");
    }

    #[test]
    fn truncated_token_streams_fail_at_the_cut() {
        let tokens = tokenize("int x = 2 + 3;").unwrap();
        // 去掉 Eof 之后再逐个截断
        let body = &tokens[..tokens.len() - 1];
        for cut in 1..body.len() {
            let truncated = &body[..cut];
            let err = parse(truncated).expect_err("truncated input must fail");
            let last = truncated.last().unwrap();
            assert_eq!(err.found, "end of input");
            assert_eq!(
                err.position,
                Position::new(last.position.line, last.position.column + last.lexeme.len())
            );
        }
        // 完整但缺少 Eof 的序列同样失败
        assert!(parse(body).is_err());
        assert!(parse(&tokens).is_ok());
    }

    #[test]
    fn unclosed_block_is_a_syntax_error() {
        let err = parse_source("while (true) { x = 1;").unwrap_err();
        assert_eq!(err.found, "end of input");
        assert!(err.expected.contains(&"'}'".to_string()));
    }

    #[test]
    fn empty_program_parses() {
        let program = parse_source("").unwrap();
        assert!(program.statements.is_empty());
    }

    fn nested_parens(depth: usize) -> String {
        format!("return {}1{};", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn nesting_is_limited_before_the_stack_runs_out() {
        assert!(parse_source(&nested_parens(MAX_NESTING)).is_ok());

        let err = parse_source(&nested_parens(MAX_NESTING + 1)).unwrap_err();
        assert_eq!(err.expected, vec!["at most 64 levels of nesting".to_string()]);
        assert_eq!(err.found, "'('");
        // "return " 占 7 列，第 65 个括号在第 72 列
        assert_eq!(err.position, Position::new(1, 8 + MAX_NESTING));

        let err = parse_source(&nested_parens(20_000)).unwrap_err();
        assert_eq!(err.found, "'('");
    }

    #[test]
    fn unary_operators_and_blocks_count_as_nesting() {
        let source = format!("return {}true;", "! ".repeat(1_000));
        assert_eq!(parse_source(&source).unwrap_err().found, "'!'");

        let source = format!("{}{}", "{ ".repeat(1_000), "} ".repeat(1_000));
        assert_eq!(parse_source(&source).unwrap_err().found, "'{'");

        let mut source = String::from("if (true) { }");
        for _ in 0..1_000 {
            source.push_str(" else if (true) { }");
        }
        // 第 64 个 else if 的块越过上限
        assert_eq!(parse_source(&source).unwrap_err().found, "'{'");

        let source = format!("{}print -!-x;{}", "{ ".repeat(10), "} ".repeat(10));
        assert!(parse_source(&source).is_ok());
    }

    #[test]
    fn long_flat_chains_parse_and_drop() {
        let source = format!("return {}x;", "x + ".repeat(100_000));
        let expr = single_return(&source);
        let (op, _, right) = binary_parts(&expr);
        assert_eq!(op, BinaryOperator::Add);
        assert!(matches!(&right.kind, ExpressionKind::Var { name, .. } if name == "x"));
    }
}
