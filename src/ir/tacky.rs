// src/ir/tacky.rs

//! 定义 TACKY (Three-Address Code) 中间表示的数据结构。
//! IR 不依赖 AST，运算符在这里重新定义。

use crate::ir::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,  // -
    Not,     // !
    ToFloat, // (float)，只由生成器在 int -> float 拓宽时插入
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterEqual,
    And,
    Or,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::ToFloat => "(float) ",
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
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        })
    }
}

/// TACKY 中的一个值，可以是一个常量或一个变量（用户变量或临时变量）。
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    Constant(Value),
    Var(String),
}

impl Val {
    pub fn as_var(&self) -> Option<&str> {
        match self {
            Val::Var(name) => Some(name),
            Val::Constant(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<Value> {
        match self {
            Val::Constant(value) => Some(*value),
            Val::Var(_) => None,
        }
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Constant(value) => write!(f, "{}", value),
            Val::Var(name) => f.write_str(name),
        }
    }
}

/// TACKY 中的一条指令。指令的位置是有意义的：跳转目标由 Label 的位置决定。
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Copy {
        src: Val,
        dst: String,
    },
    Binary {
        op: BinaryOperator,
        src1: Val,
        src2: Val,
        dst: String,
    },
    Unary {
        op: UnaryOperator,
        src: Val,
        dst: String,
    },
    Label(String),
    Jump(String),
    /// 条件为 false 时跳转
    JumpIfFalse {
        condition: Val,
        target: String,
    },
    Print(Val),
    Return(Val),
}

impl Instruction {
    /// 这条指令写入的变量。
    pub fn dst(&self) -> Option<&str> {
        match self {
            Instruction::Copy { dst, .. }
            | Instruction::Binary { dst, .. }
            | Instruction::Unary { dst, .. } => Some(dst),
            _ => None,
        }
    }

    /// 这条指令读取的所有操作数。
    pub fn operands(&self) -> Vec<&Val> {
        match self {
            Instruction::Copy { src, .. } | Instruction::Unary { src, .. } => vec![src],
            Instruction::Binary { src1, src2, .. } => vec![src1, src2],
            Instruction::JumpIfFalse { condition, .. } => vec![condition],
            Instruction::Print(val) | Instruction::Return(val) => vec![val],
            Instruction::Label(_) | Instruction::Jump(_) => Vec::new(),
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Val> {
        match self {
            Instruction::Copy { src, .. } | Instruction::Unary { src, .. } => vec![src],
            Instruction::Binary { src1, src2, .. } => vec![src1, src2],
            Instruction::JumpIfFalse { condition, .. } => vec![condition],
            Instruction::Print(val) | Instruction::Return(val) => vec![val],
            Instruction::Label(_) | Instruction::Jump(_) => Vec::new(),
        }
    }

    pub fn reads(&self, name: &str) -> bool {
        self.operands().iter().any(|val| val.as_var() == Some(name))
    }

    /// 跳转目标（如果有）。
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Instruction::Jump(target) | Instruction::JumpIfFalse { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Copy { src, dst } => write!(f, "{} = {}", dst, src),
            Instruction::Binary {
                op,
                src1,
                src2,
                dst,
            } => write!(f, "{} = {} {} {}", dst, src1, op, src2),
            Instruction::Unary { op, src, dst } => write!(f, "{} = {}{}", dst, op, src),
            Instruction::Label(name) => write!(f, "{}:", name),
            Instruction::Jump(target) => write!(f, "goto {}", target),
            Instruction::JumpIfFalse { condition, target } => {
                write!(f, "ifFalse {} goto {}", condition, target)
            }
            Instruction::Print(val) => write!(f, "print {}", val),
            Instruction::Return(val) => write!(f, "return {}", val),
        }
    }
}

/// 每条指令一行的稳定文本形式。
pub fn listing(instructions: &[Instruction]) -> Vec<String> {
    instructions.iter().map(|inst| inst.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_encoding() {
        let code = vec![
            Instruction::Copy {
                src: Val::Constant(Value::Int(2)),
                dst: "x".to_string(),
            },
            Instruction::Binary {
                op: BinaryOperator::Multiply,
                src1: Val::Var("y".to_string()),
                src2: Val::Constant(Value::Int(2)),
                dst: "t0".to_string(),
            },
            Instruction::Unary {
                op: UnaryOperator::Negate,
                src: Val::Var("x".to_string()),
                dst: "t1".to_string(),
            },
            Instruction::Unary {
                op: UnaryOperator::ToFloat,
                src: Val::Var("x".to_string()),
                dst: "t2".to_string(),
            },
            Instruction::Label("L0".to_string()),
            Instruction::JumpIfFalse {
                condition: Val::Var("t0".to_string()),
                target: "L1".to_string(),
            },
            Instruction::Jump("L0".to_string()),
            Instruction::Print(Val::Constant(Value::Float(1.0))),
            Instruction::Return(Val::Constant(Value::Bool(false))),
        ];
        assert_eq!(
            listing(&code),
            vec![
                "x = 2",
                "t0 = y * 2",
                "t1 = -x",
                "t2 = (float) x",
                "L0:",
                "ifFalse t0 goto L1",
                "goto L0",
                "print 1.0",
                "return false",
            ]
        );
    }

    #[test]
    fn operand_queries() {
        let inst = Instruction::Binary {
            op: BinaryOperator::Add,
            src1: Val::Var("a".to_string()),
            src2: Val::Var("b".to_string()),
            dst: "t0".to_string(),
        };
        assert_eq!(inst.dst(), Some("t0"));
        assert!(inst.reads("a") && inst.reads("b") && !inst.reads("t0"));
        assert_eq!(Instruction::Jump("L3".to_string()).jump_target(), Some("L3"));
    }
}
