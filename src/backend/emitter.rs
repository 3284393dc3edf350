// src/backend/emitter.rs

use crate::ir::assembly::{BinaryOperator, Instruction, Operand, Register, UnaryOperator};

/// 将目标机指令转换为文本，每条指令一行。标签顶格，其余指令缩进四个空格。
pub fn emit_listing(instructions: &[Instruction]) -> Vec<String> {
    instructions.iter().map(emit_instruction).collect()
}

fn emit_instruction(instruction: &Instruction) -> String {
    match instruction {
        Instruction::Load { src, dst } => {
            format!("    LOAD {}, {}", format_register(*dst), format_operand(src))
        }
        Instruction::Store { src, dst } => {
            format!("    STORE {}, {}", dst, format_register(*src))
        }
        Instruction::Binary { op, src, dst } => format!(
            "    {} {}, {}",
            format_binary_operator(*op),
            format_register(*dst),
            format_register(*src)
        ),
        Instruction::Unary { op, operand } => {
            format!("    {} {}", format_unary_operator(*op), format_register(*operand))
        }
        Instruction::Label(name) => format!("{}:", name),
        Instruction::Jmp(target) => format!("    JMP {}", target),
        Instruction::JmpFalse { condition, target } => {
            format!("    JZ {}, {}", format_register(*condition), target)
        }
        Instruction::Print(reg) => format!("    PRINT {}", format_register(*reg)),
        Instruction::Ret(reg) => format!("    RET {}", format_register(*reg)),
    }
}

fn format_register(reg: Register) -> &'static str {
    match reg {
        Register::R0 => "R0",
        Register::R1 => "R1",
    }
}

// 立即数以 `#` 开头，内存操作数直接写变量名
fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Imm(value) => format!("#{}", value),
        Operand::Mem(name) => name.clone(),
    }
}

fn format_unary_operator(op: UnaryOperator) -> &'static str {
    match op {
        UnaryOperator::Neg => "NEG",
        UnaryOperator::Not => "NOT",
        UnaryOperator::Itof => "ITOF",
    }
}

fn format_binary_operator(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "ADD",
        BinaryOperator::Sub => "SUB",
        BinaryOperator::Mul => "MUL",
        BinaryOperator::Div => "DIV",
        BinaryOperator::Mod => "MOD",
        BinaryOperator::CmpEq => "CMPEQ",
        BinaryOperator::CmpNe => "CMPNE",
        BinaryOperator::CmpLt => "CMPLT",
        BinaryOperator::CmpLe => "CMPLE",
        BinaryOperator::CmpGt => "CMPGT",
        BinaryOperator::CmpGe => "CMPGE",
        BinaryOperator::And => "AND",
        BinaryOperator::Or => "OR",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::value::Value;

    #[test]
    fn listing_format() {
        let code = vec![
            Instruction::Label("L0".to_string()),
            Instruction::Load {
                src: Operand::Imm(Value::Float(2.5)),
                dst: Register::R0,
            },
            Instruction::Load {
                src: Operand::Mem("x.1".to_string()),
                dst: Register::R1,
            },
            Instruction::Binary {
                op: BinaryOperator::CmpLe,
                src: Register::R1,
                dst: Register::R0,
            },
            Instruction::Unary {
                op: UnaryOperator::Itof,
                operand: Register::R0,
            },
            Instruction::Store {
                src: Register::R0,
                dst: "t3".to_string(),
            },
            Instruction::JmpFalse {
                condition: Register::R0,
                target: "L1".to_string(),
            },
            Instruction::Jmp("L0".to_string()),
            Instruction::Print(Register::R0),
            Instruction::Ret(Register::R0),
        ];
        assert_eq!(
            emit_listing(&code),
            vec![
                "L0:",
                "    LOAD R0, #2.5",
                "    LOAD R1, x.1",
                "    CMPLE R0, R1",
                "    ITOF R0",
                "    STORE t3, R0",
                "    JZ R0, L1",
                "    JMP L0",
                "    PRINT R0",
                "    RET R0",
            ]
        );
    }
}
