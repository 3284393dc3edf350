// src/ir/value.rs

//! 运行时的值，以及所有运算符的语义。
//! 常量折叠、模拟器和目标机执行器都调用这里的函数，保证三者对同一个运算给出同样的结果。

use crate::common::Type;
use crate::ir::tacky::{BinaryOperator, UnaryOperator};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// 结构相等：浮点数按位比较，所以 `0.0 != -0.0`，而同一个 NaN 等于它自己。
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Bool(_) => Type::Bool,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            Value::Bool(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("operator '{operator}' cannot be applied to {operands}")]
    TypeFault { operator: String, operands: String },
}

fn binary_fault(op: BinaryOperator, a: Value, b: Value) -> EvalError {
    EvalError::TypeFault {
        operator: op.to_string(),
        operands: format!("{} and {}", a.ty(), b.ty()),
    }
}

/// 计算二元运算。整数运算溢出时回绕；int 和 float 混合时先把 int 拓宽成 float。
pub fn eval_binary(op: BinaryOperator, a: Value, b: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Remainder => eval_arithmetic(op, a, b),
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            let equal = match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => x == y,
                (Value::Int(x), Value::Int(y)) => x == y,
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => return Err(binary_fault(op, a, b)),
                },
            };
            Ok(Value::Bool(if op == BinaryOperator::Equal { equal } else { !equal }))
        }
        BinaryOperator::LessThan
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterEqual => {
            let ordering = match (a, b) {
                (Value::Int(x), Value::Int(y)) => Some(x.cmp(&y)),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => return Err(binary_fault(op, a, b)),
                },
            };
            // NaN 参与的比较全部为 false
            let result = ordering.is_some_and(|ord| match op {
                BinaryOperator::LessThan => ord == Ordering::Less,
                BinaryOperator::LessOrEqual => ord != Ordering::Greater,
                BinaryOperator::GreaterThan => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            });
            Ok(Value::Bool(result))
        }
        BinaryOperator::And | BinaryOperator::Or => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(if op == BinaryOperator::And {
                x && y
            } else {
                x || y
            })),
            _ => Err(binary_fault(op, a, b)),
        },
    }
}

fn eval_arithmetic(op: BinaryOperator, a: Value, b: Value) -> Result<Value, EvalError> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        let result = match op {
            BinaryOperator::Add => x.wrapping_add(y),
            BinaryOperator::Subtract => x.wrapping_sub(y),
            BinaryOperator::Multiply => x.wrapping_mul(y),
            BinaryOperator::Divide if y == 0 => return Err(EvalError::DivisionByZero),
            BinaryOperator::Divide => x.wrapping_div(y),
            BinaryOperator::Remainder if y == 0 => return Err(EvalError::DivisionByZero),
            BinaryOperator::Remainder => x.wrapping_rem(y),
            _ => return Err(binary_fault(op, a, b)),
        };
        return Ok(Value::Int(result));
    }

    let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) else {
        return Err(binary_fault(op, a, b));
    };
    let result = match op {
        BinaryOperator::Add => x + y,
        BinaryOperator::Subtract => x - y,
        BinaryOperator::Multiply => x * y,
        BinaryOperator::Divide | BinaryOperator::Remainder if y == 0.0 => {
            return Err(EvalError::DivisionByZero);
        }
        BinaryOperator::Divide => x / y,
        BinaryOperator::Remainder => x % y,
        _ => return Err(binary_fault(op, a, b)),
    };
    Ok(Value::Float(result))
}

pub fn eval_unary(op: UnaryOperator, a: Value) -> Result<Value, EvalError> {
    match (op, a) {
        (UnaryOperator::Negate, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOperator::Negate, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::ToFloat, Value::Int(i)) => Ok(Value::Float(i as f64)),
        (UnaryOperator::ToFloat, Value::Float(x)) => Ok(Value::Float(x)),
        _ => Err(EvalError::TypeFault {
            operator: op.to_string(),
            operands: a.ty().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_wraps_and_truncates() {
        assert_eq!(
            eval_binary(BinaryOperator::Add, Value::Int(i64::MAX), Value::Int(1)),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(
            eval_binary(BinaryOperator::Divide, Value::Int(-7), Value::Int(2)),
            Ok(Value::Int(-3))
        );
        assert_eq!(
            eval_binary(BinaryOperator::Remainder, Value::Int(-7), Value::Int(2)),
            Ok(Value::Int(-1))
        );
        assert_eq!(
            eval_binary(BinaryOperator::Divide, Value::Int(i64::MIN), Value::Int(-1)),
            Ok(Value::Int(i64::MIN))
        );
    }

    #[test]
    fn mixed_operands_widen_to_float() {
        assert_eq!(
            eval_binary(BinaryOperator::Multiply, Value::Int(3), Value::Float(0.5)),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            eval_binary(BinaryOperator::Equal, Value::Int(2), Value::Float(2.0)),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            eval_binary(BinaryOperator::LessThan, Value::Float(f64::NAN), Value::Int(1)),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn relational_operators() {
        let cases = [
            (BinaryOperator::LessThan, false),
            (BinaryOperator::LessOrEqual, true),
            (BinaryOperator::GreaterThan, false),
            (BinaryOperator::GreaterEqual, true),
        ];
        for (op, expected) in cases {
            assert_eq!(
                eval_binary(op, Value::Int(3), Value::Float(3.0)),
                Ok(Value::Bool(expected))
            );
        }
        assert_eq!(
            eval_binary(BinaryOperator::GreaterEqual, Value::Float(f64::NAN), Value::Float(f64::NAN)),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn division_by_zero_for_ints_and_floats() {
        for op in [BinaryOperator::Divide, BinaryOperator::Remainder] {
            assert_eq!(
                eval_binary(op, Value::Int(1), Value::Int(0)),
                Err(EvalError::DivisionByZero)
            );
            assert_eq!(
                eval_binary(op, Value::Float(1.0), Value::Float(-0.0)),
                Err(EvalError::DivisionByZero)
            );
            assert_eq!(
                eval_binary(op, Value::Float(1.0), Value::Int(0)),
                Err(EvalError::DivisionByZero)
            );
        }
    }

    #[test]
    fn type_faults() {
        assert!(matches!(
            eval_binary(BinaryOperator::Add, Value::Bool(true), Value::Int(1)),
            Err(EvalError::TypeFault { .. })
        ));
        assert!(matches!(
            eval_binary(BinaryOperator::Equal, Value::Bool(true), Value::Int(1)),
            Err(EvalError::TypeFault { .. })
        ));
        assert!(matches!(
            eval_unary(UnaryOperator::Not, Value::Int(1)),
            Err(EvalError::TypeFault { .. })
        ));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval_unary(UnaryOperator::Negate, Value::Int(4)), Ok(Value::Int(-4)));
        assert_eq!(eval_unary(UnaryOperator::ToFloat, Value::Int(4)), Ok(Value::Float(4.0)));
        assert_eq!(eval_unary(UnaryOperator::Not, Value::Bool(false)), Ok(Value::Bool(true)));
    }

    #[test]
    fn structural_equality_and_display() {
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}
