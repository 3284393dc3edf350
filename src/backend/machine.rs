// src/backend/machine.rs

//! 目标机执行器：按指令模型的语义运行代码生成的结果。
//! 运算符的含义和模拟器共用 `ir::value`，所以两者的结果可以直接比较。

use crate::error::RuntimeError;
use crate::ir::assembly::{BinaryOperator, Instruction, Operand, Register, UnaryOperator};
use crate::ir::tacky;
use crate::ir::value::{Value, eval_binary, eval_unary};
use crate::simulator::{Execution, SimulatorConfig, charge_step, runtime_error, unknown_label};
use std::collections::HashMap;
use tracing::debug;

pub struct Machine {
    config: SimulatorConfig,
}

/// 两个寄存器和按名字寻址的内存。
struct State<'a> {
    registers: [Option<Value>; 2],
    memory: HashMap<&'a str, Value>,
}

impl<'a> State<'a> {
    fn register(&self, reg: Register, index: usize) -> Result<Value, RuntimeError> {
        self.registers[reg.index()].ok_or_else(|| RuntimeError::RuntimeTypeFault {
            message: format!("register {:?} is empty", reg),
            index,
        })
    }

    fn operand(&self, operand: &Operand, index: usize) -> Result<Value, RuntimeError> {
        match operand {
            Operand::Imm(value) => Ok(*value),
            Operand::Mem(name) => {
                self.memory
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| RuntimeError::RuntimeTypeFault {
                        message: format!("memory slot '{}' has no value", name),
                        index,
                    })
            }
        }
    }
}

impl Machine {
    pub fn new(config: SimulatorConfig) -> Self {
        Machine { config }
    }

    pub fn run(&self, code: &[Instruction]) -> Result<Execution, RuntimeError> {
        let labels: HashMap<&str, usize> = code
            .iter()
            .enumerate()
            .filter_map(|(index, inst)| match inst {
                Instruction::Label(name) => Some((name.as_str(), index)),
                _ => None,
            })
            .collect();

        let mut state = State {
            registers: [None; 2],
            memory: HashMap::new(),
        };
        let mut execution = Execution::default();
        let mut steps = 0;
        let mut ip = 0;

        while let Some(inst) = code.get(ip) {
            charge_step(&mut steps, self.config.max_steps)?;
            let index = ip;
            ip += 1;

            match inst {
                Instruction::Load { src, dst } => {
                    state.registers[dst.index()] = Some(state.operand(src, index)?);
                }
                Instruction::Store { src, dst } => {
                    let value = state.register(*src, index)?;
                    state.memory.insert(dst.as_str(), value);
                }
                Instruction::Binary { op, src, dst } => {
                    let a = state.register(*dst, index)?;
                    let b = state.register(*src, index)?;
                    let value = eval_binary(convert_binop(*op), a, b)
                        .map_err(|e| runtime_error(e, index))?;
                    state.registers[dst.index()] = Some(value);
                }
                Instruction::Unary { op, operand } => {
                    let a = state.register(*operand, index)?;
                    let value = eval_unary(convert_unop(*op), a).map_err(|e| runtime_error(e, index))?;
                    state.registers[operand.index()] = Some(value);
                }
                Instruction::Label(_) => {}
                Instruction::Jmp(target) => {
                    ip = *labels
                        .get(target.as_str())
                        .ok_or_else(|| unknown_label(target, index))?;
                }
                Instruction::JmpFalse { condition, target } => {
                    match state.register(*condition, index)? {
                        Value::Bool(true) => {}
                        Value::Bool(false) => {
                            ip = *labels
                                .get(target.as_str())
                                .ok_or_else(|| unknown_label(target, index))?;
                        }
                        other => {
                            return Err(RuntimeError::RuntimeTypeFault {
                                message: format!("condition must be bool, found {}", other.ty()),
                                index,
                            });
                        }
                    }
                }
                Instruction::Print(reg) => {
                    execution.printed.push(state.register(*reg, index)?);
                }
                Instruction::Ret(reg) => {
                    let value = state.register(*reg, index)?;
                    debug!(steps, %value, "target machine returned");
                    execution.returned = Some(value);
                    return Ok(execution);
                }
            }
        }

        debug!(steps, "target machine finished without a return value");
        Ok(execution)
    }
}

fn convert_unop(op: UnaryOperator) -> tacky::UnaryOperator {
    match op {
        UnaryOperator::Neg => tacky::UnaryOperator::Negate,
        UnaryOperator::Not => tacky::UnaryOperator::Not,
        UnaryOperator::Itof => tacky::UnaryOperator::ToFloat,
    }
}

fn convert_binop(op: BinaryOperator) -> tacky::BinaryOperator {
    match op {
        BinaryOperator::Add => tacky::BinaryOperator::Add,
        BinaryOperator::Sub => tacky::BinaryOperator::Subtract,
        BinaryOperator::Mul => tacky::BinaryOperator::Multiply,
        BinaryOperator::Div => tacky::BinaryOperator::Divide,
        BinaryOperator::Mod => tacky::BinaryOperator::Remainder,
        BinaryOperator::CmpEq => tacky::BinaryOperator::Equal,
        BinaryOperator::CmpNe => tacky::BinaryOperator::NotEqual,
        BinaryOperator::CmpLt => tacky::BinaryOperator::LessThan,
        BinaryOperator::CmpLe => tacky::BinaryOperator::LessOrEqual,
        BinaryOperator::CmpGt => tacky::BinaryOperator::GreaterThan,
        BinaryOperator::CmpGe => tacky::BinaryOperator::GreaterEqual,
        BinaryOperator::And => tacky::BinaryOperator::And,
        BinaryOperator::Or => tacky::BinaryOperator::Or,
    }
}
