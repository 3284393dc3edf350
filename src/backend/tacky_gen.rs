// src/backend/tacky_gen.rs

use crate::ast;
use crate::common::{Type, UniqueIdGenerator};
use crate::ir::tacky::{self, Instruction, Val};
use crate::ir::value::Value;

/// 生成临时变量名和标签名的计数器。由调用者持有，每次编译一个新的。
#[derive(Debug, Default)]
pub struct TackyContext {
    temporaries: UniqueIdGenerator,
    labels: UniqueIdGenerator,
}

impl TackyContext {
    pub fn new() -> Self {
        TackyContext::default()
    }

    /// 生成一个唯一的临时变量名，例如 "t0", "t1"。
    fn make_temporary(&mut self) -> String {
        format!("t{}", self.temporaries.next())
    }

    /// 生成一个唯一的标签名，例如 "L0", "L1"。
    fn make_label(&mut self) -> String {
        format!("L{}", self.labels.next())
    }
}

/// 负责将带注解的 AST 转换为 TACKY IR 的生成器。
pub struct TackyGenerator<'a> {
    context: &'a mut TackyContext,
}

impl<'a> TackyGenerator<'a> {
    pub fn new(context: &'a mut TackyContext) -> Self {
        TackyGenerator { context }
    }

    /// 主入口。假定输入已经通过语义分析，因此不会失败。
    pub fn generate(&mut self, program: &ast::Program) -> Vec<Instruction> {
        let mut instructions = Vec::new();
        for stmt in &program.statements {
            self.generate_statement(stmt, &mut instructions);
        }
        instructions
    }

    fn convert_unop(&self, op: ast::UnaryOperator) -> tacky::UnaryOperator {
        match op {
            ast::UnaryOperator::Negate => tacky::UnaryOperator::Negate,
            ast::UnaryOperator::Not => tacky::UnaryOperator::Not,
        }
    }

    fn convert_binop(&self, op: ast::BinaryOperator) -> tacky::BinaryOperator {
        match op {
            ast::BinaryOperator::Add => tacky::BinaryOperator::Add,
            ast::BinaryOperator::Subtract => tacky::BinaryOperator::Subtract,
            ast::BinaryOperator::Multiply => tacky::BinaryOperator::Multiply,
            ast::BinaryOperator::Divide => tacky::BinaryOperator::Divide,
            ast::BinaryOperator::Remainder => tacky::BinaryOperator::Remainder,
            ast::BinaryOperator::And => tacky::BinaryOperator::And,
            ast::BinaryOperator::Or => tacky::BinaryOperator::Or,
            ast::BinaryOperator::Equal => tacky::BinaryOperator::Equal,
            ast::BinaryOperator::NotEqual => tacky::BinaryOperator::NotEqual,
            ast::BinaryOperator::LessThan => tacky::BinaryOperator::LessThan,
            ast::BinaryOperator::LessOrEqual => tacky::BinaryOperator::LessOrEqual,
            ast::BinaryOperator::GreaterThan => tacky::BinaryOperator::GreaterThan,
            ast::BinaryOperator::GreaterOrEqual => tacky::BinaryOperator::GreaterEqual,
        }
    }

    fn generate_block(&mut self, block: &ast::Block, instructions: &mut Vec<Instruction>) {
        for stmt in &block.statements {
            self.generate_statement(stmt, instructions);
        }
    }

    fn generate_statement(&mut self, stmt: &ast::Statement, instructions: &mut Vec<Instruction>) {
        match stmt {
            ast::Statement::VarDecl {
                name,
                declared_type,
                init,
                slot,
                ..
            } => {
                // 没有初始化器的声明 (e.g., "int a;") 在 TACKY 层面被忽略
                if let Some(expr) = init {
                    let dst = slot.as_deref().unwrap_or(name).to_string();
                    self.generate_store(expr, *declared_type, dst, instructions);
                }
            }
            ast::Statement::Assign {
                name,
                value,
                slot,
                target_type,
                ..
            } => {
                let dst = slot.as_deref().unwrap_or(name).to_string();
                let target = target_type.or(value.ty).unwrap_or(Type::Int);
                self.generate_store(value, target, dst, instructions);
            }
            ast::Statement::If {
                condition,
                then_block,
                else_block,
            } => {
                let cond = self.generate_expression(condition, instructions);
                let end_label = self.context.make_label();
                match else_block {
                    None => {
                        instructions.push(Instruction::JumpIfFalse {
                            condition: cond,
                            target: end_label.clone(),
                        });
                        self.generate_block(then_block, instructions);
                    }
                    Some(else_block) => {
                        let else_label = self.context.make_label();
                        instructions.push(Instruction::JumpIfFalse {
                            condition: cond,
                            target: else_label.clone(),
                        });
                        self.generate_block(then_block, instructions);
                        instructions.push(Instruction::Jump(end_label.clone()));
                        instructions.push(Instruction::Label(else_label));
                        self.generate_block(else_block, instructions);
                    }
                }
                instructions.push(Instruction::Label(end_label));
            }
            ast::Statement::While { condition, body } => {
                let start_label = self.context.make_label();
                let end_label = self.context.make_label();
                instructions.push(Instruction::Label(start_label.clone()));
                let cond = self.generate_expression(condition, instructions);
                instructions.push(Instruction::JumpIfFalse {
                    condition: cond,
                    target: end_label.clone(),
                });
                self.generate_block(body, instructions);
                instructions.push(Instruction::Jump(start_label));
                instructions.push(Instruction::Label(end_label));
            }
            ast::Statement::Print(expr) => {
                let val = self.generate_expression(expr, instructions);
                instructions.push(Instruction::Print(val));
            }
            ast::Statement::Return(expr) => {
                let val = self.generate_expression(expr, instructions);
                instructions.push(Instruction::Return(val));
            }
            ast::Statement::Block(block) => self.generate_block(block, instructions),
        }
    }

    /// 计算表达式并写入 `dst`，必要时先把 int 拓宽成 float。
    fn generate_store(
        &mut self,
        expr: &ast::Expression,
        target: Type,
        dst: String,
        instructions: &mut Vec<Instruction>,
    ) {
        let val = self.generate_expression(expr, instructions);
        let src = self.coerce(val, expr.ty, target, instructions);
        instructions.push(Instruction::Copy { src, dst });
    }

    fn coerce(
        &mut self,
        val: Val,
        from: Option<Type>,
        to: Type,
        instructions: &mut Vec<Instruction>,
    ) -> Val {
        if to != Type::Float || from != Some(Type::Int) {
            return val;
        }
        match val {
            // 常量在编译期直接转换
            Val::Constant(Value::Int(i)) => Val::Constant(Value::Float(i as f64)),
            other => {
                let dst = self.context.make_temporary();
                instructions.push(Instruction::Unary {
                    op: tacky::UnaryOperator::ToFloat,
                    src: other,
                    dst: dst.clone(),
                });
                Val::Var(dst)
            }
        }
    }

    /// 将一个表达式转换为 TACKY 指令，返回存放结果的值。
    /// 常量和变量直接使用，每个运算结果放进一个新的临时变量。
    fn generate_expression(&mut self, expr: &ast::Expression, instructions: &mut Vec<Instruction>) -> Val {
        match &expr.kind {
            ast::ExpressionKind::Literal(lit) => Val::Constant(match lit {
                ast::Literal::Int(i) => Value::Int(*i),
                ast::Literal::Float(x) => Value::Float(*x),
                ast::Literal::Bool(b) => Value::Bool(*b),
            }),
            ast::ExpressionKind::Var { name, slot } => {
                Val::Var(slot.as_deref().unwrap_or(name).to_string())
            }
            ast::ExpressionKind::Unary { operator, operand } => {
                let src = self.generate_expression(operand, instructions);
                let dst = self.context.make_temporary();
                instructions.push(Instruction::Unary {
                    op: self.convert_unop(*operator),
                    src,
                    dst: dst.clone(),
                });
                Val::Var(dst)
            }
            ast::ExpressionKind::Binary { .. } => self.generate_binary_chain(expr, instructions),
        }
    }

    /// 左结合的运算链沿左侧迭代展开，先算最左边的操作数，再依次算右操作数。
    fn generate_binary_chain(&mut self, expr: &ast::Expression, instructions: &mut Vec<Instruction>) -> Val {
        let mut rights = Vec::new();
        let mut node = expr;
        while let ast::ExpressionKind::Binary {
            operator,
            left,
            right,
        } = &node.kind
        {
            rights.push((*operator, &**right));
            node = &**left;
        }

        // && 和 || 不短路：表达式没有副作用，两边都求值
        let mut current = self.generate_expression(node, instructions);
        for (operator, right) in rights.into_iter().rev() {
            let src2 = self.generate_expression(right, instructions);
            let dst = self.context.make_temporary();
            instructions.push(Instruction::Binary {
                op: self.convert_binop(operator),
                src1: current,
                src2,
                dst: dst.clone(),
            });
            current = Val::Var(dst);
        }
        current
    }
}
