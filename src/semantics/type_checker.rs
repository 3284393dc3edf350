// src/semantics/type_checker.rs

use crate::ast::{BinaryOperator, Block, Expression, ExpressionKind, Program, Statement, UnaryOperator};
use crate::common::Type;
use crate::error::SemanticError;
use crate::semantics::symbol_table::SymbolTable;
use std::collections::HashSet;

type CheckResult<T> = Result<T, SemanticError>;

/// 语义分析器：一次深度优先遍历完成名字解析、类型检查和赋值检查，
/// 并把类型和 slot 写回 AST。
pub struct TypeChecker {
    symbols: SymbolTable,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            symbols: SymbolTable::new(),
        }
    }

    /// 类型检查的主入口，成功时返回带注解的 AST。
    pub fn check_program(&mut self, mut program: Program) -> CheckResult<Program> {
        self.check_statements(&mut program.statements)?;
        Ok(program)
    }

    /// 分析结束后的符号表（只剩最外层作用域）。
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// 检查一串语句，返回它们是否一定会执行到 return。
    fn check_statements(&mut self, statements: &mut [Statement]) -> CheckResult<bool> {
        let mut returns = false;
        for stmt in statements {
            returns |= self.check_statement(stmt)?;
            if returns {
                // return 之后的代码不可达，按所有变量都已赋值处理
                self.symbols.mark_all_initialized();
            }
        }
        Ok(returns)
    }

    fn check_block(&mut self, block: &mut Block) -> CheckResult<bool> {
        self.symbols.enter_scope();
        let returns = self.check_statements(&mut block.statements)?;
        self.symbols.exit_scope();
        Ok(returns)
    }

    fn check_statement(&mut self, stmt: &mut Statement) -> CheckResult<bool> {
        match stmt {
            Statement::VarDecl {
                name,
                declared_type,
                init,
                position,
                slot,
            } => {
                // 初始化表达式在变量可见之前检查
                if let Some(expr) = init {
                    let found = self.check_expression(expr)?;
                    if !declared_type.accepts(found) {
                        return Err(SemanticError::AssignmentTypeError {
                            name: name.clone(),
                            expected: *declared_type,
                            found,
                            position: expr.position,
                        });
                    }
                }
                let declared = self
                    .symbols
                    .declare(name, *declared_type, init.is_some())
                    .ok_or_else(|| SemanticError::DuplicateDeclaration {
                        name: name.clone(),
                        position: *position,
                    })?;
                *slot = Some(declared);
                Ok(false)
            }
            Statement::Assign {
                name,
                value,
                position,
                slot,
                target_type,
            } => {
                let (expected, target) = match self.symbols.lookup(name) {
                    Some(symbol) => (symbol.declared_type, symbol.slot.clone()),
                    None => {
                        return Err(SemanticError::UndefinedVariable {
                            name: name.clone(),
                            position: *position,
                        });
                    }
                };
                let found = self.check_expression(value)?;
                if !expected.accepts(found) {
                    return Err(SemanticError::AssignmentTypeError {
                        name: name.clone(),
                        expected,
                        found,
                        position: value.position,
                    });
                }
                self.symbols.mark_initialized(name);
                *slot = Some(target);
                *target_type = Some(expected);
                Ok(false)
            }
            Statement::If {
                condition,
                then_block,
                else_block,
            } => {
                self.check_condition(condition, "if")?;

                let before = self.symbols.initialized_slots();
                let then_returns = self.check_block(then_block)?;
                let after_then = self.symbols.initialized_slots();
                self.symbols.restore_initialized(&before);

                let Some(else_block) = else_block else {
                    // then 分支可能不执行
                    return Ok(false);
                };

                let else_returns = self.check_block(else_block)?;
                let after_else = self.symbols.initialized_slots();

                // 一定 return 的分支不会流到 if 之后，不参与合并
                let merged: HashSet<String> = match (then_returns, else_returns) {
                    (true, true) => self.symbols.visible_slots(),
                    (true, false) => after_else,
                    (false, true) => after_then,
                    (false, false) => after_then.intersection(&after_else).cloned().collect(),
                };
                self.symbols.restore_initialized(&merged);
                Ok(then_returns && else_returns)
            }
            Statement::While { condition, body } => {
                self.check_condition(condition, "while")?;
                let before = self.symbols.initialized_slots();
                self.check_block(body)?;
                // 循环体可能一次都不执行
                self.symbols.restore_initialized(&before);
                Ok(false)
            }
            Statement::Print(expr) => {
                self.check_expression(expr)?;
                Ok(false)
            }
            Statement::Return(expr) => {
                self.check_expression(expr)?;
                Ok(true)
            }
            Statement::Block(block) => self.check_block(block),
        }
    }

    fn check_condition(&mut self, condition: &mut Expression, construct: &'static str) -> CheckResult<()> {
        let found = self.check_expression(condition)?;
        if found != Type::Bool {
            return Err(SemanticError::ConditionTypeError {
                construct,
                found,
                position: condition.position,
            });
        }
        Ok(())
    }

    /// 自底向上计算表达式的类型，并缓存到节点上。
    fn check_expression(&mut self, expr: &mut Expression) -> CheckResult<Type> {
        let position = expr.position;
        let ty = match expr.kind {
            ExpressionKind::Literal(ref lit) => lit.ty(),
            ExpressionKind::Var {
                ref name,
                ref mut slot,
            } => {
                let symbol = self
                    .symbols
                    .lookup(name)
                    .ok_or_else(|| SemanticError::UndefinedVariable {
                        name: name.clone(),
                        position,
                    })?;
                if !symbol.initialized {
                    return Err(SemanticError::UseBeforeInit {
                        name: name.clone(),
                        position,
                    });
                }
                *slot = Some(symbol.slot.clone());
                symbol.declared_type
            }
            ExpressionKind::Unary {
                operator,
                ref mut operand,
            } => {
                let operand_type = self.check_expression(operand)?;
                let result = match operator {
                    UnaryOperator::Negate if operand_type.is_numeric() => Some(operand_type),
                    UnaryOperator::Not if operand_type == Type::Bool => Some(Type::Bool),
                    _ => None,
                };
                result.ok_or_else(|| SemanticError::TypeMismatch {
                    operator: operator.to_string(),
                    operands: operand_type.to_string(),
                    position,
                })?
            }
            ExpressionKind::Binary { .. } => return self.check_binary_chain(expr),
        };
        expr.ty = Some(ty);
        Ok(ty)
    }

    /// 左结合的运算链沿左侧迭代检查，长表达式不会加深递归。
    /// 检查顺序和报错位置与逐层递归相同：先左后右，错误落在出错的那个运算符上。
    fn check_binary_chain(&mut self, expr: &mut Expression) -> CheckResult<Type> {
        let mut rights = Vec::new();
        let mut node = &mut *expr;
        loop {
            match node.kind {
                ExpressionKind::Binary {
                    operator,
                    ref mut left,
                    ref mut right,
                } => {
                    rights.push((operator, node.position, &mut **right));
                    node = &mut **left;
                }
                _ => break,
            }
        }

        let mut current = self.check_expression(node)?;
        let mut types = Vec::with_capacity(rights.len());
        for (operator, position, right) in rights.into_iter().rev() {
            let right_type = self.check_expression(right)?;
            current = binary_result_type(operator, current, right_type).ok_or_else(|| {
                SemanticError::TypeMismatch {
                    operator: operator.to_string(),
                    operands: format!("{} and {}", current, right_type),
                    position,
                }
            })?;
            types.push(current);
        }

        // types 自底向上排列，从顶层往下写回
        let mut node = expr;
        for ty in types.into_iter().rev() {
            node.ty = Some(ty);
            match node.kind {
                ExpressionKind::Binary { ref mut left, .. } => node = &mut **left,
                _ => break,
            }
        }
        Ok(current)
    }
}

/// 二元运算的类型规则；`None` 表示操作数类型不合法。
pub fn binary_result_type(operator: BinaryOperator, left: Type, right: Type) -> Option<Type> {
    let numeric = left.is_numeric() && right.is_numeric();
    match operator {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Remainder => {
            if !numeric {
                None
            } else if left == Type::Int && right == Type::Int {
                Some(Type::Int)
            } else {
                Some(Type::Float)
            }
        }
        BinaryOperator::LessThan
        | BinaryOperator::LessOrEqual
        | BinaryOperator::GreaterThan
        | BinaryOperator::GreaterOrEqual => numeric.then_some(Type::Bool),
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            (numeric || (left == Type::Bool && right == Type::Bool)).then_some(Type::Bool)
        }
        BinaryOperator::And | BinaryOperator::Or => {
            (left == Type::Bool && right == Type::Bool).then_some(Type::Bool)
        }
    }
}
