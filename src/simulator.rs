//! src/simulator.rs
//!
//! 直接解释执行未经优化的 TACKY，得到程序的输出和返回值。
//! 它不依赖代码生成的结果，用来和目标机的执行结果互相校验。

use crate::error::RuntimeError;
use crate::ir::tacky::{Instruction, Val};
use crate::ir::value::{EvalError, Value, eval_binary, eval_unary};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// 最多执行多少条指令。`None` 表示不限制。
    pub max_steps: Option<u64>,
}

/// 一次执行的可观察结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub printed: Vec<Value>,
    /// 执行到末尾而没有遇到 return 时为 `None`。
    pub returned: Option<Value>,
}

pub(crate) fn runtime_error(err: EvalError, index: usize) -> RuntimeError {
    match err {
        EvalError::DivisionByZero => RuntimeError::DivisionByZero { index },
        EvalError::TypeFault { .. } => RuntimeError::RuntimeTypeFault {
            message: err.to_string(),
            index,
        },
    }
}

pub(crate) fn unknown_label(label: &str, index: usize) -> RuntimeError {
    RuntimeError::RuntimeTypeFault {
        message: format!("jump to unknown label '{}'", label),
        index,
    }
}

/// 每执行一条指令调用一次；超出预算时报错。
pub(crate) fn charge_step(steps: &mut u64, max_steps: Option<u64>) -> Result<(), RuntimeError> {
    if let Some(limit) = max_steps {
        if *steps >= limit {
            return Err(RuntimeError::StepLimitExceeded { limit });
        }
    }
    *steps += 1;
    Ok(())
}

pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Simulator { config }
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

        let mut env: HashMap<&str, Value> = HashMap::new();
        let mut execution = Execution::default();
        let mut steps = 0;
        let mut ip = 0;

        while let Some(inst) = code.get(ip) {
            charge_step(&mut steps, self.config.max_steps)?;
            let index = ip;
            ip += 1;

            match inst {
                Instruction::Copy { src, dst } => {
                    let value = read(src, &env, index)?;
                    env.insert(dst.as_str(), value);
                }
                Instruction::Binary {
                    op,
                    src1,
                    src2,
                    dst,
                } => {
                    let a = read(src1, &env, index)?;
                    let b = read(src2, &env, index)?;
                    let value = eval_binary(*op, a, b).map_err(|e| runtime_error(e, index))?;
                    env.insert(dst.as_str(), value);
                }
                Instruction::Unary { op, src, dst } => {
                    let a = read(src, &env, index)?;
                    let value = eval_unary(*op, a).map_err(|e| runtime_error(e, index))?;
                    env.insert(dst.as_str(), value);
                }
                Instruction::Label(_) => {}
                Instruction::Jump(target) => {
                    ip = *labels
                        .get(target.as_str())
                        .ok_or_else(|| unknown_label(target, index))?;
                }
                Instruction::JumpIfFalse { condition, target } => {
                    match read(condition, &env, index)? {
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
                Instruction::Print(val) => {
                    execution.printed.push(read(val, &env, index)?);
                }
                Instruction::Return(val) => {
                    let value = read(val, &env, index)?;
                    debug!(steps, %value, "simulation returned");
                    execution.returned = Some(value);
                    return Ok(execution);
                }
            }
        }

        debug!(steps, "simulation finished without a return value");
        Ok(execution)
    }
}

fn read(val: &Val, env: &HashMap<&str, Value>, index: usize) -> Result<Value, RuntimeError> {
    match val {
        Val::Constant(value) => Ok(*value),
        Val::Var(name) => {
            env.get(name.as_str())
                .copied()
                .ok_or_else(|| RuntimeError::RuntimeTypeFault {
                    message: format!("variable '{}' has no value", name),
                    index,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tacky_gen::{TackyContext, TackyGenerator};
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::semantics::analyze;

    fn simulate(source: &str, max_steps: Option<u64>) -> Result<Execution, RuntimeError> {
        let tokens = tokenize(source).unwrap();
        let ast = analyze(parse(&tokens).unwrap()).unwrap();
        let mut context = TackyContext::new();
        let code = TackyGenerator::new(&mut context).generate(&ast);
        Simulator::new(SimulatorConfig { max_steps }).run(&code)
    }

    #[test]
    fn returns_and_prints() {
        let execution = simulate("int i = 0; while (i < 3) { print i; i = i + 1; } return i * 10;", None).unwrap();
        assert_eq!(
            execution.printed,
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
        assert_eq!(execution.returned, Some(Value::Int(30)));
    }

    #[test]
    fn falling_off_the_end() {
        let execution = simulate("print 1.5;", None).unwrap();
        assert_eq!(execution.printed, vec![Value::Float(1.5)]);
        assert_eq!(execution.returned, None);
    }

    #[test]
    fn division_by_zero() {
        let err = simulate("int x = 1; return x / 0;", None).unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero { index: 1 }));

        let err = simulate("float f = 2.0; print f % 0.0;", None).unwrap_err();
        assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
    }

    #[test]
    fn integer_overflow_wraps() {
        let execution = simulate("int big = 9223372036854775807; return big + 1;", None).unwrap();
        assert_eq!(execution.returned, Some(Value::Int(i64::MIN)));
    }

    #[test]
    fn step_limit() {
        let err = simulate("while (true) { }", Some(100)).unwrap_err();
        assert_eq!(err, RuntimeError::StepLimitExceeded { limit: 100 });
    }

    #[test]
    fn unbound_name_is_a_fault() {
        let code = vec![Instruction::Print(Val::Var("ghost".to_string()))];
        let err = Simulator::new(SimulatorConfig::default()).run(&code).unwrap_err();
        assert!(matches!(err, RuntimeError::RuntimeTypeFault { index: 0, .. }));
    }

    #[test]
    fn unknown_label_is_a_fault() {
        let code = vec![Instruction::Jump("L9".to_string())];
        let err = Simulator::new(SimulatorConfig::default()).run(&code).unwrap_err();
        assert!(matches!(err, RuntimeError::RuntimeTypeFault { .. }));
    }
}
