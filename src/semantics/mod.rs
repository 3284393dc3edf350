//! src/semantics/mod.rs

pub mod symbol_table;
pub mod type_checker;

use crate::ast::Program;
use crate::error::SemanticError;

/// 对 AST 做完整的语义分析，返回带注解的 AST。
pub fn analyze(program: Program) -> Result<Program, SemanticError> {
    type_checker::TypeChecker::new().check_program(program)
}
