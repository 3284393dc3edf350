// src/backend/asm_gen.rs

use crate::ir::{assembly, tacky};
use tracing::debug;

/// 负责将优化后的 TACKY IR 转换为目标机指令。
/// 每条 TACKY 指令独立展开：操作数先装入寄存器，计算，再写回内存。
/// 一条 TACKY 指令里最多同时用到 R0 和 R1 两个寄存器。
#[derive(Debug, Default)]
pub struct AsmGenerator;

impl AsmGenerator {
    pub fn new() -> Self {
        AsmGenerator
    }

    /// 主入口。输入已经过语义分析，因此不会失败。
    pub fn generate(&self, code: &[tacky::Instruction]) -> Vec<assembly::Instruction> {
        let mut instructions = Vec::new();
        for tacky_inst in code {
            self.convert_instruction(tacky_inst, &mut instructions);
        }
        debug!(
            tacky = code.len(),
            assembly = instructions.len(),
            "lowered TACKY to target instructions"
        );
        instructions
    }

    fn convert_instruction(
        &self,
        tacky_inst: &tacky::Instruction,
        instructions: &mut Vec<assembly::Instruction>,
    ) {
        use assembly::Register::{R0, R1};

        match tacky_inst {
            tacky::Instruction::Copy { src, dst } => {
                instructions.push(self.load(src, R0));
                instructions.push(assembly::Instruction::Store {
                    src: R0,
                    dst: dst.clone(),
                });
            }
            tacky::Instruction::Binary {
                op,
                src1,
                src2,
                dst,
            } => {
                instructions.push(self.load(src1, R0));
                instructions.push(self.load(src2, R1));
                instructions.push(assembly::Instruction::Binary {
                    op: self.convert_binop(*op),
                    src: R1,
                    dst: R0,
                });
                instructions.push(assembly::Instruction::Store {
                    src: R0,
                    dst: dst.clone(),
                });
            }
            tacky::Instruction::Unary { op, src, dst } => {
                instructions.push(self.load(src, R0));
                instructions.push(assembly::Instruction::Unary {
                    op: self.convert_unop(*op),
                    operand: R0,
                });
                instructions.push(assembly::Instruction::Store {
                    src: R0,
                    dst: dst.clone(),
                });
            }
            tacky::Instruction::Label(name) => {
                instructions.push(assembly::Instruction::Label(name.clone()));
            }
            tacky::Instruction::Jump(target) => {
                instructions.push(assembly::Instruction::Jmp(target.clone()));
            }
            tacky::Instruction::JumpIfFalse { condition, target } => {
                instructions.push(self.load(condition, R0));
                instructions.push(assembly::Instruction::JmpFalse {
                    condition: R0,
                    target: target.clone(),
                });
            }
            tacky::Instruction::Print(val) => {
                instructions.push(self.load(val, R0));
                instructions.push(assembly::Instruction::Print(R0));
            }
            tacky::Instruction::Return(val) => {
                instructions.push(self.load(val, R0));
                instructions.push(assembly::Instruction::Ret(R0));
            }
        }
    }

    fn load(&self, val: &tacky::Val, dst: assembly::Register) -> assembly::Instruction {
        assembly::Instruction::Load {
            src: self.convert_tacky_val(val),
            dst,
        }
    }

    fn convert_tacky_val(&self, val: &tacky::Val) -> assembly::Operand {
        match val {
            tacky::Val::Constant(value) => assembly::Operand::Imm(*value),
            tacky::Val::Var(name) => assembly::Operand::Mem(name.clone()),
        }
    }

    fn convert_unop(&self, op: tacky::UnaryOperator) -> assembly::UnaryOperator {
        match op {
            tacky::UnaryOperator::Negate => assembly::UnaryOperator::Neg,
            tacky::UnaryOperator::Not => assembly::UnaryOperator::Not,
            tacky::UnaryOperator::ToFloat => assembly::UnaryOperator::Itof,
        }
    }

    fn convert_binop(&self, op: tacky::BinaryOperator) -> assembly::BinaryOperator {
        match op {
            tacky::BinaryOperator::Add => assembly::BinaryOperator::Add,
            tacky::BinaryOperator::Subtract => assembly::BinaryOperator::Sub,
            tacky::BinaryOperator::Multiply => assembly::BinaryOperator::Mul,
            tacky::BinaryOperator::Divide => assembly::BinaryOperator::Div,
            tacky::BinaryOperator::Remainder => assembly::BinaryOperator::Mod,
            tacky::BinaryOperator::Equal => assembly::BinaryOperator::CmpEq,
            tacky::BinaryOperator::NotEqual => assembly::BinaryOperator::CmpNe,
            tacky::BinaryOperator::LessThan => assembly::BinaryOperator::CmpLt,
            tacky::BinaryOperator::LessOrEqual => assembly::BinaryOperator::CmpLe,
            tacky::BinaryOperator::GreaterThan => assembly::BinaryOperator::CmpGt,
            tacky::BinaryOperator::GreaterEqual => assembly::BinaryOperator::CmpGe,
            tacky::BinaryOperator::And => assembly::BinaryOperator::And,
            tacky::BinaryOperator::Or => assembly::BinaryOperator::Or,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::assembly::{Instruction, Operand, Register};
    use crate::ir::tacky::Val;
    use crate::ir::value::Value;

    #[test]
    fn binary_uses_both_registers() {
        let code = vec![tacky::Instruction::Binary {
            op: tacky::BinaryOperator::Multiply,
            src1: Val::Var("y".to_string()),
            src2: Val::Constant(Value::Int(2)),
            dst: "t0".to_string(),
        }];
        assert_eq!(
            AsmGenerator::new().generate(&code),
            vec![
                Instruction::Load {
                    src: Operand::Mem("y".to_string()),
                    dst: Register::R0,
                },
                Instruction::Load {
                    src: Operand::Imm(Value::Int(2)),
                    dst: Register::R1,
                },
                Instruction::Binary {
                    op: assembly::BinaryOperator::Mul,
                    src: Register::R1,
                    dst: Register::R0,
                },
                Instruction::Store {
                    src: Register::R0,
                    dst: "t0".to_string(),
                },
            ]
        );
    }

    #[test]
    fn control_flow_maps_directly() {
        let code = vec![
            tacky::Instruction::Label("L0".to_string()),
            tacky::Instruction::JumpIfFalse {
                condition: Val::Var("t0".to_string()),
                target: "L1".to_string(),
            },
            tacky::Instruction::Jump("L0".to_string()),
            tacky::Instruction::Return(Val::Constant(Value::Bool(true))),
        ];
        assert_eq!(
            AsmGenerator::new().generate(&code),
            vec![
                Instruction::Label("L0".to_string()),
                Instruction::Load {
                    src: Operand::Mem("t0".to_string()),
                    dst: Register::R0,
                },
                Instruction::JmpFalse {
                    condition: Register::R0,
                    target: "L1".to_string(),
                },
                Instruction::Jmp("L0".to_string()),
                Instruction::Load {
                    src: Operand::Imm(Value::Bool(true)),
                    dst: Register::R0,
                },
                Instruction::Ret(Register::R0),
            ]
        );
    }
}
