//src/ast.rs
//! 抽象语法树。解析器构建它，语义分析只负责填充 `ty` 和 `slot` 两类注解，
//! 之后的阶段只读。

use crate::common::{Position, Type};
use std::fmt;

#[derive(Debug, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq)]
pub enum Statement {
    VarDecl {
        name: String,
        declared_type: Type,
        init: Option<Expression>,
        position: Position,
        // 语义分析后才有：变量在 TAC 中的唯一存储名
        slot: Option<String>,
    },
    Assign {
        name: String,
        value: Expression,
        position: Position,
        slot: Option<String>,
        // 被赋值变量的声明类型，int -> float 拓宽时需要
        target_type: Option<Type>,
    },
    If {
        condition: Expression,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        condition: Expression,
        body: Block,
    },
    Print(Expression),
    Return(Expression),
    Block(Block),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    And,
    Or,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
        })
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterOrEqual => ">=",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Int(_) => Type::Int,
            Literal::Float(_) => Type::Float,
            Literal::Bool(_) => Type::Bool,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
    // 语义分析时自底向上算出并缓存的类型
    pub ty: Option<Type>,
}

#[derive(Debug, PartialEq)]
pub enum ExpressionKind {
    Literal(Literal),
    Var {
        name: String,
        slot: Option<String>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExpressionKind, position: Position) -> Self {
        Expression {
            kind,
            position,
            ty: None,
        }
    }
}

// 很长的左结合链会形成很深的树，逐个拆下子节点释放，不走递归析构
impl Drop for Expression {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_operands(&mut self.kind, &mut pending);
        while let Some(mut expr) = pending.pop() {
            detach_operands(&mut expr.kind, &mut pending);
        }
    }
}

fn detach_operands(kind: &mut ExpressionKind, pending: &mut Vec<Box<Expression>>) {
    match std::mem::replace(kind, ExpressionKind::Literal(Literal::Bool(false))) {
        ExpressionKind::Unary { operand, .. } => pending.push(operand),
        ExpressionKind::Binary { left, right, .. } => {
            pending.push(left);
            pending.push(right);
        }
        ExpressionKind::Literal(_) | ExpressionKind::Var { .. } => {}
    }
}

/// 把 AST 打印成缩进的树，每层两个空格。
pub fn dump(program: &Program) -> Vec<String> {
    let mut lines = vec!["Program".to_string()];
    for stmt in &program.statements {
        dump_statement(stmt, 1, &mut lines);
    }
    lines
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn dump_block(block: &Block, depth: usize, lines: &mut Vec<String>) {
    for stmt in &block.statements {
        dump_statement(stmt, depth, lines);
    }
}

fn dump_statement(stmt: &Statement, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    match stmt {
        Statement::VarDecl {
            name,
            declared_type,
            init,
            ..
        } => {
            lines.push(format!("{}VarDecl {}: {}", pad, name, declared_type));
            if let Some(expr) = init {
                dump_expression(expr, depth + 1, lines);
            }
        }
        Statement::Assign { name, value, .. } => {
            lines.push(format!("{}Assign {}", pad, name));
            dump_expression(value, depth + 1, lines);
        }
        Statement::If {
            condition,
            then_block,
            else_block,
        } => {
            lines.push(format!("{}If", pad));
            dump_expression(condition, depth + 1, lines);
            lines.push(format!("{}Then", indent(depth + 1)));
            dump_block(then_block, depth + 2, lines);
            if let Some(block) = else_block {
                lines.push(format!("{}Else", indent(depth + 1)));
                dump_block(block, depth + 2, lines);
            }
        }
        Statement::While { condition, body } => {
            lines.push(format!("{}While", pad));
            dump_expression(condition, depth + 1, lines);
            lines.push(format!("{}Body", indent(depth + 1)));
            dump_block(body, depth + 2, lines);
        }
        Statement::Print(expr) => {
            lines.push(format!("{}Print", pad));
            dump_expression(expr, depth + 1, lines);
        }
        Statement::Return(expr) => {
            lines.push(format!("{}Return", pad));
            dump_expression(expr, depth + 1, lines);
        }
        Statement::Block(block) => {
            lines.push(format!("{}Block", pad));
            dump_block(block, depth + 1, lines);
        }
    }
}

fn dump_expression(expr: &Expression, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    match &expr.kind {
        ExpressionKind::Literal(lit) => {
            lines.push(format!("{}Literal {} ({})", pad, lit, lit.ty()));
        }
        ExpressionKind::Var { name, .. } => {
            lines.push(format!("{}VarRef {}", pad, name));
        }
        ExpressionKind::Unary { operator, operand } => {
            lines.push(format!("{}UnaryOp {}", pad, operator));
            dump_expression(operand, depth + 1, lines);
        }
        ExpressionKind::Binary { .. } => {
            // 沿左侧迭代，右操作数倒序补上
            let mut rights = Vec::new();
            let mut node = expr;
            let mut level = depth;
            while let ExpressionKind::Binary {
                operator,
                left,
                right,
            } = &node.kind
            {
                lines.push(format!("{}BinaryOp {}", indent(level), operator));
                level += 1;
                rights.push((&**right, level));
                node = &**left;
            }
            dump_expression(node, level, lines);
            for (right, level) in rights.into_iter().rev() {
                dump_expression(right, level, lines);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn dump_source(source: &str) -> Vec<String> {
        let tokens = tokenize(source).expect("lex ok");
        dump(&parse(&tokens).expect("parse ok"))
    }

    #[test]
    fn chains_print_left_operands_first() {
        assert_eq!(
            dump_source("return 1 - 2 * 3 - x;"),
            vec![
                "Program",
                "  Return",
                "    BinaryOp -",
                "      BinaryOp -",
                "        Literal 1 (int)",
                "        BinaryOp *",
                "          Literal 2 (int)",
                "          Literal 3 (int)",
                "      VarRef x",
            ]
        );
    }

    #[test]
    fn long_chains_dump_iteratively() {
        let source = format!("return {}1;", "1 + ".repeat(2_000));
        let lines = dump_source(&source);
        assert_eq!(lines.len(), 2 + 2_000 + 2_001);
        assert_eq!(lines[2], "    BinaryOp +");
        assert_eq!(lines.last().map(String::as_str), Some("      Literal 1 (int)"));
    }
}
