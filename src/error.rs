//! src/error.rs
//!
//! 编译流程中各个阶段的错误类型。词法和语法错误会直接中止整个流程；
//! 语义错误由 pipeline 写进 transcript；运行时错误只会由模拟器产生。

use crate::common::{Position, Type};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexicalErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Lexical error at {position}: {kind}")]
pub struct LexicalError {
    pub position: Position,
    pub kind: LexicalErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Syntax error at {position}: expected {}, found {found}", .expected.join(" or "))]
pub struct SyntaxError {
    pub position: Position,
    pub expected: Vec<String>,
    pub found: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("variable '{name}' is not declared ({position})")]
    UndefinedVariable { name: String, position: Position },

    #[error("variable '{name}' is already declared in this scope ({position})")]
    DuplicateDeclaration { name: String, position: Position },

    #[error("variable '{name}' is used before it is assigned ({position})")]
    UseBeforeInit { name: String, position: Position },

    #[error("operator '{operator}' cannot be applied to {operands} ({position})")]
    TypeMismatch {
        operator: String,
        operands: String,
        position: Position,
    },

    #[error("condition of '{construct}' must be bool, found {found} ({position})")]
    ConditionTypeError {
        construct: &'static str,
        found: Type,
        position: Position,
    },

    #[error("cannot assign a value of type {found} to '{name}' of type {expected} ({position})")]
    AssignmentTypeError {
        name: String,
        expected: Type,
        found: Type,
        position: Position,
    },
}

impl SemanticError {
    /// 错误种类的名字，用于 transcript 中的错误行。
    pub fn kind(&self) -> &'static str {
        match self {
            SemanticError::UndefinedVariable { .. } => "UndefinedVariable",
            SemanticError::DuplicateDeclaration { .. } => "DuplicateDeclaration",
            SemanticError::UseBeforeInit { .. } => "UseBeforeInit",
            SemanticError::TypeMismatch { .. } => "TypeMismatch",
            SemanticError::ConditionTypeError { .. } => "ConditionTypeError",
            SemanticError::AssignmentTypeError { .. } => "AssignmentTypeError",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("DivisionByZero: division by zero at instruction {index}")]
    DivisionByZero { index: usize },

    #[error("RuntimeTypeFault: {message} at instruction {index}")]
    RuntimeTypeFault { message: String, index: usize },

    #[error("StepLimitExceeded: execution stopped after {limit} steps")]
    StepLimitExceeded { limit: u64 },
}

/// 会让整个编译流程中止的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lexical(#[from] LexicalError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}
