// src/ir/assembly.rs

//! 目标机的指令模型：两个寄存器，加上按变量名寻址的内存槽。

use crate::ir::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    R0,
    R1,
}

impl Register {
    pub fn index(self) -> usize {
        match self {
            Register::R0 => 0,
            Register::R1 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Not,
    Itof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Imm(Value),
    Mem(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Load {
        src: Operand,
        dst: Register,
    },
    Store {
        src: Register,
        dst: String,
    },
    /// dst = dst op src
    Binary {
        op: BinaryOperator,
        src: Register,
        dst: Register,
    },
    Unary {
        op: UnaryOperator,
        operand: Register,
    },
    Label(String),
    Jmp(String),
    /// 寄存器中的值为 false 时跳转
    JmpFalse {
        condition: Register,
        target: String,
    },
    Print(Register),
    Ret(Register),
}
