// src/backend/optimizer.rs

//! TACKY 层面的优化。
//!
//! 一轮依次执行常量折叠、代数化简、常量传播、基本块内的公共子表达式消除和死代码消除。
//! 一直重复，直到一整轮都没有改变指令序列，或者达到 `max_rounds`。
//! 所有 pass 都不会调整指令顺序，可能触发运行时错误的计算也会被保留。

use crate::common::Type;
use crate::ir::tacky::{BinaryOperator, Instruction, UnaryOperator, Val};
use crate::ir::value::{Value, eval_binary, eval_unary};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::Range;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerConfig {
    /// 最多执行多少轮。
    pub max_rounds: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig { max_rounds: 64 }
    }
}

/// 用默认配置优化。
pub fn optimize(code: &[Instruction]) -> Vec<Instruction> {
    Optimizer::new(OptimizerConfig::default()).optimize(code)
}

pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Optimizer { config }
    }

    pub fn optimize(&self, code: &[Instruction]) -> Vec<Instruction> {
        let mut current = code.to_vec();
        for round in 1..=self.config.max_rounds {
            let next = run_round(&current);
            if next == current {
                debug!(round, instructions = current.len(), "optimizer reached a fixed point");
                return current;
            }
            debug!(round, before = current.len(), after = next.len(), "optimizer round changed the code");
            current = next;
        }
        warn!(
            max_rounds = self.config.max_rounds,
            "optimizer stopped before reaching a fixed point"
        );
        current
    }
}

fn run_round(code: &[Instruction]) -> Vec<Instruction> {
    let code = fold_constants(code);
    let code = simplify_algebra(&code);
    let code = propagate_constants(&code);
    let code = eliminate_common_subexpressions(&code);
    eliminate_dead_code(&code)
}

// ---------------------------------------------------------------------------
// 基本块和控制流图
// ---------------------------------------------------------------------------

/// 基本块的首指令：第 0 条、每个标签、以及跳转或返回之后的那一条。
struct ControlFlowGraph {
    blocks: Vec<Range<usize>>,
    successors: Vec<Vec<usize>>,
}

impl ControlFlowGraph {
    fn build(code: &[Instruction]) -> Self {
        let mut starts = Vec::new();
        for (i, inst) in code.iter().enumerate() {
            let leader = i == 0
                || matches!(inst, Instruction::Label(_))
                || matches!(
                    code[i - 1],
                    Instruction::Jump(_) | Instruction::JumpIfFalse { .. } | Instruction::Return(_)
                );
            if leader {
                starts.push(i);
            }
        }

        let blocks: Vec<Range<usize>> = starts
            .iter()
            .enumerate()
            .map(|(b, &start)| start..starts.get(b + 1).copied().unwrap_or(code.len()))
            .collect();

        let mut label_blocks = HashMap::new();
        for (b, range) in blocks.iter().enumerate() {
            if let Instruction::Label(name) = &code[range.start] {
                label_blocks.insert(name.as_str(), b);
            }
        }

        let successors: Vec<Vec<usize>> = blocks
            .iter()
            .enumerate()
            .map(|(b, range)| -> Vec<usize> {
                let next = (b + 1 < blocks.len()).then_some(b + 1);
                match &code[range.end - 1] {
                    Instruction::Jump(target) => {
                        label_blocks.get(target.as_str()).copied().into_iter().collect()
                    }
                    Instruction::JumpIfFalse { target, .. } => next
                        .into_iter()
                        .chain(label_blocks.get(target.as_str()).copied())
                        .collect(),
                    Instruction::Return(_) => Vec::new(),
                    _ => next.into_iter().collect(),
                }
            })
            .collect();

        ControlFlowGraph { blocks, successors }
    }

    /// 从入口块出发能到达的块，按块号排序。
    fn reachable(&self) -> Vec<usize> {
        let mut seen = vec![false; self.blocks.len()];
        let mut stack = Vec::new();
        if !self.blocks.is_empty() {
            seen[0] = true;
            stack.push(0);
        }
        while let Some(b) = stack.pop() {
            for &succ in &self.successors[b] {
                if !seen[succ] {
                    seen[succ] = true;
                    stack.push(succ);
                }
            }
        }
        (0..self.blocks.len()).filter(|&b| seen[b]).collect()
    }
}

// ---------------------------------------------------------------------------
// 常量折叠
// ---------------------------------------------------------------------------

fn fold_constants(code: &[Instruction]) -> Vec<Instruction> {
    code.iter()
        .map(|inst| {
            let folded = match inst {
                Instruction::Binary {
                    op,
                    src1: Val::Constant(a),
                    src2: Val::Constant(b),
                    ..
                } => eval_binary(*op, *a, *b).ok(),
                Instruction::Unary {
                    op,
                    src: Val::Constant(a),
                    ..
                } => eval_unary(*op, *a).ok(),
                _ => None,
            };
            // 求值出错（例如除以零）的指令原样保留，让错误在运行时发生
            match (folded, inst.dst()) {
                (Some(value), Some(dst)) => Instruction::Copy {
                    src: Val::Constant(value),
                    dst: dst.to_string(),
                },
                _ => inst.clone(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 代数化简
// ---------------------------------------------------------------------------

/// 从 TACKY 本身推断每个变量的类型。合法程序里同一个变量的所有定义类型一致。
fn infer_types(code: &[Instruction]) -> HashMap<String, Type> {
    let mut types: HashMap<String, Type> = HashMap::new();
    loop {
        let mut changed = false;
        for inst in code {
            let Some(dst) = inst.dst() else { continue };
            if types.contains_key(dst) {
                continue;
            }
            let ty = match inst {
                Instruction::Copy { src, .. } => operand_type(src, &types),
                Instruction::Unary { op, src, .. } => match op {
                    UnaryOperator::Negate => operand_type(src, &types),
                    UnaryOperator::Not => Some(Type::Bool),
                    UnaryOperator::ToFloat => Some(Type::Float),
                },
                Instruction::Binary { op, src1, src2, .. } => match op {
                    BinaryOperator::Add
                    | BinaryOperator::Subtract
                    | BinaryOperator::Multiply
                    | BinaryOperator::Divide
                    | BinaryOperator::Remainder => {
                        match (operand_type(src1, &types), operand_type(src2, &types)) {
                            (Some(Type::Int), Some(Type::Int)) => Some(Type::Int),
                            (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => Some(Type::Float),
                            _ => None,
                        }
                    }
                    _ => Some(Type::Bool),
                },
                _ => None,
            };
            if let Some(ty) = ty {
                types.insert(dst.to_string(), ty);
                changed = true;
            }
        }
        if !changed {
            return types;
        }
    }
}

fn operand_type(val: &Val, types: &HashMap<String, Type>) -> Option<Type> {
    match val {
        Val::Constant(value) => Some(value.ty()),
        Val::Var(name) => types.get(name).copied(),
    }
}

fn simplify_algebra(code: &[Instruction]) -> Vec<Instruction> {
    let types = infer_types(code);
    code.iter()
        .map(|inst| match inst {
            Instruction::Binary {
                op,
                src1,
                src2,
                dst,
            } => match simplify_binary(*op, src1, src2, &types) {
                Some(src) => Instruction::Copy {
                    src,
                    dst: dst.clone(),
                },
                None => inst.clone(),
            },
            _ => inst.clone(),
        })
        .collect()
}

fn is_constant(val: &Val, expected: Value) -> bool {
    val.as_constant() == Some(expected)
}

/// 恒等元和吸收元。float 的 `x + 0` 和 `x * 0` 不化简：`-0.0 + 0.0` 是 `0.0`，`NaN * 0` 是 NaN。
fn simplify_binary(
    op: BinaryOperator,
    a: &Val,
    b: &Val,
    types: &HashMap<String, Type>,
) -> Option<Val> {
    let ty_a = operand_type(a, types);
    let ty_b = operand_type(b, types);
    let numeric = |ty: Option<Type>| ty.is_some_and(Type::is_numeric);

    // 右侧单位元：x - 0, x / 1
    let right_identity = |unit: i64, float_unit: f64| {
        if (numeric(ty_a) && is_constant(b, Value::Int(unit)))
            || (ty_a == Some(Type::Float) && is_constant(b, Value::Float(float_unit)))
        {
            Some(a.clone())
        } else {
            None
        }
    };

    match op {
        BinaryOperator::Subtract => right_identity(0, 0.0),
        BinaryOperator::Divide => right_identity(1, 1.0),
        BinaryOperator::Add => {
            for (x, tx, c) in [(a, ty_a, b), (b, ty_b, a)] {
                if tx == Some(Type::Int) && is_constant(c, Value::Int(0)) {
                    return Some(x.clone());
                }
            }
            None
        }
        BinaryOperator::Multiply => {
            for (x, tx, c) in [(a, ty_a, b), (b, ty_b, a)] {
                if numeric(tx) && is_constant(c, Value::Int(1)) {
                    return Some(x.clone());
                }
                if tx == Some(Type::Float) && is_constant(c, Value::Float(1.0)) {
                    return Some(x.clone());
                }
                if tx == Some(Type::Int) && is_constant(c, Value::Int(0)) {
                    return Some(Val::Constant(Value::Int(0)));
                }
            }
            None
        }
        BinaryOperator::And | BinaryOperator::Or => {
            let absorbing = op == BinaryOperator::Or;
            for (x, tx, c) in [(a, ty_a, b), (b, ty_b, a)] {
                if tx != Some(Type::Bool) {
                    continue;
                }
                // && 的单位元是 true，|| 的是 false；另一个值是吸收元
                if is_constant(c, Value::Bool(!absorbing)) {
                    return Some(x.clone());
                }
                if is_constant(c, Value::Bool(absorbing)) {
                    return Some(Val::Constant(Value::Bool(absorbing)));
                }
            }
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// 常量传播
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fact {
    Constant(Value),
    Varying,
}

/// 变量不在表里表示“还没有定义”，和任何事实相交都得到另一方。
type Facts = HashMap<String, Fact>;

fn resolve(val: &Val, facts: &Facts) -> Option<Value> {
    match val {
        Val::Constant(value) => Some(*value),
        Val::Var(name) => match facts.get(name) {
            Some(Fact::Constant(value)) => Some(*value),
            _ => None,
        },
    }
}

fn transfer(inst: &Instruction, facts: &mut Facts) {
    let Some(dst) = inst.dst() else { return };
    let value = match inst {
        Instruction::Copy { src, .. } => resolve(src, facts),
        Instruction::Unary { op, src, .. } => {
            resolve(src, facts).and_then(|a| eval_unary(*op, a).ok())
        }
        Instruction::Binary { op, src1, src2, .. } => {
            match (resolve(src1, facts), resolve(src2, facts)) {
                (Some(a), Some(b)) => eval_binary(*op, a, b).ok(),
                _ => None,
            }
        }
        _ => None,
    };
    let fact = value.map_or(Fact::Varying, Fact::Constant);
    facts.insert(dst.to_string(), fact);
}

/// 把 `other` 合并进 `into`，返回 `into` 是否改变。
fn meet(into: &mut Facts, other: &Facts) -> bool {
    let mut changed = false;
    for (name, fact) in other {
        match into.get(name) {
            None => {
                into.insert(name.clone(), *fact);
                changed = true;
            }
            Some(existing) if existing == fact || *existing == Fact::Varying => {}
            Some(_) => {
                into.insert(name.clone(), Fact::Varying);
                changed = true;
            }
        }
    }
    changed
}

fn propagate_constants(code: &[Instruction]) -> Vec<Instruction> {
    let cfg = ControlFlowGraph::build(code);
    if cfg.blocks.is_empty() {
        return Vec::new();
    }

    let mut entry_facts: Vec<Option<Facts>> = vec![None; cfg.blocks.len()];
    entry_facts[0] = Some(Facts::new());
    let mut worklist = VecDeque::from([0]);
    while let Some(b) = worklist.pop_front() {
        let Some(mut facts) = entry_facts[b].clone() else {
            continue;
        };
        for inst in &code[cfg.blocks[b].clone()] {
            transfer(inst, &mut facts);
        }
        for &succ in &cfg.successors[b] {
            let changed = if let Some(existing) = &mut entry_facts[succ] {
                meet(existing, &facts)
            } else {
                entry_facts[succ] = Some(facts.clone());
                true
            };
            if changed && !worklist.contains(&succ) {
                worklist.push_back(succ);
            }
        }
    }

    let mut result = Vec::with_capacity(code.len());
    for (b, range) in cfg.blocks.iter().enumerate() {
        // 不可达的块没有入口事实，原样保留，交给死代码消除
        let mut facts = entry_facts[b].clone();
        for inst in &code[range.clone()] {
            let mut inst = inst.clone();
            if let Some(facts) = facts.as_mut() {
                for val in inst.operands_mut() {
                    if let Some(value) = resolve(val, facts) {
                        *val = Val::Constant(value);
                    }
                }
                transfer(&inst, facts);
            }
            result.push(inst);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// 公共子表达式消除（基本块内）
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Computation {
    Binary(BinaryOperator, Val, Val),
    Unary(UnaryOperator, Val),
}

impl Computation {
    fn of(inst: &Instruction) -> Option<Self> {
        match inst {
            Instruction::Binary { op, src1, src2, .. } => {
                Some(Computation::Binary(*op, src1.clone(), src2.clone()))
            }
            Instruction::Unary { op, src, .. } => Some(Computation::Unary(*op, src.clone())),
            _ => None,
        }
    }

    fn reads(&self, name: &str) -> bool {
        match self {
            Computation::Binary(_, a, b) => a.as_var() == Some(name) || b.as_var() == Some(name),
            Computation::Unary(_, a) => a.as_var() == Some(name),
        }
    }
}

fn eliminate_common_subexpressions(code: &[Instruction]) -> Vec<Instruction> {
    let mut available: Vec<(Computation, String)> = Vec::new();
    let mut result = Vec::with_capacity(code.len());

    for inst in code {
        if matches!(inst, Instruction::Label(_)) {
            available.clear();
        }

        let mut inst = inst.clone();
        let earlier = Computation::of(&inst).and_then(|computation| {
            available
                .iter()
                .find(|(seen, _)| *seen == computation)
                .map(|(_, name)| name.clone())
        });
        if let (Some(earlier), Some(dst)) = (earlier, inst.dst().map(str::to_string)) {
            inst = Instruction::Copy {
                src: Val::Var(earlier),
                dst,
            };
        }

        if let Some(dst) = inst.dst().map(str::to_string) {
            // 重新定义 dst 之后，所有读取它或存放在它里面的计算都失效
            available.retain(|(computation, name)| *name != dst && !computation.reads(&dst));
            if let Some(computation) = Computation::of(&inst) {
                if !computation.reads(&dst) {
                    available.push((computation, dst));
                }
            }
        }

        if matches!(
            inst,
            Instruction::Jump(_) | Instruction::JumpIfFalse { .. } | Instruction::Return(_)
        ) {
            available.clear();
        }
        result.push(inst);
    }
    result
}

// ---------------------------------------------------------------------------
// 死代码消除
// ---------------------------------------------------------------------------

fn eliminate_dead_code(code: &[Instruction]) -> Vec<Instruction> {
    let code = resolve_constant_branches(code);
    let code = remove_unreachable_blocks(&code);
    let code = remove_redundant_jumps(&code);
    let code = remove_unused_labels(&code);
    remove_dead_stores(&code)
}

fn resolve_constant_branches(code: &[Instruction]) -> Vec<Instruction> {
    code.iter()
        .filter_map(|inst| match inst {
            Instruction::JumpIfFalse {
                condition: Val::Constant(Value::Bool(true)),
                ..
            } => None,
            Instruction::JumpIfFalse {
                condition: Val::Constant(Value::Bool(false)),
                target,
            } => Some(Instruction::Jump(target.clone())),
            _ => Some(inst.clone()),
        })
        .collect()
}

fn remove_unreachable_blocks(code: &[Instruction]) -> Vec<Instruction> {
    let cfg = ControlFlowGraph::build(code);
    cfg.reachable()
        .into_iter()
        .flat_map(|b| code[cfg.blocks[b].clone()].iter().cloned())
        .collect()
}

/// `goto L` 紧跟着 `L:` 时跳转是多余的。
fn remove_redundant_jumps(code: &[Instruction]) -> Vec<Instruction> {
    code.iter()
        .enumerate()
        .filter(|(i, inst)| match (inst, code.get(i + 1)) {
            (Instruction::Jump(target), Some(Instruction::Label(label))) => target != label,
            _ => true,
        })
        .map(|(_, inst)| inst.clone())
        .collect()
}

fn remove_unused_labels(code: &[Instruction]) -> Vec<Instruction> {
    let targets: HashSet<&str> = code.iter().filter_map(|inst| inst.jump_target()).collect();
    code.iter()
        .filter(|inst| match inst {
            Instruction::Label(name) => targets.contains(name.as_str()),
            _ => true,
        })
        .cloned()
        .collect()
}

/// 除数不是已知的非零常量时，除法可能出错，不能删除。
fn may_fault(inst: &Instruction) -> bool {
    match inst {
        Instruction::Binary {
            op: BinaryOperator::Divide | BinaryOperator::Remainder,
            src2,
            ..
        } => !matches!(
            src2.as_constant(),
            Some(Value::Int(n)) if n != 0
        ) && !matches!(
            src2.as_constant(),
            Some(Value::Float(x)) if x != 0.0
        ),
        _ => false,
    }
}

fn remove_dead_stores(code: &[Instruction]) -> Vec<Instruction> {
    let read: HashSet<&str> = code
        .iter()
        .flat_map(|inst| inst.operands())
        .filter_map(|val| val.as_var())
        .collect();

    code.iter()
        .filter(|inst| {
            if let Instruction::Copy {
                src: Val::Var(src),
                dst,
            } = inst
            {
                if src == dst {
                    return false;
                }
            }
            match inst.dst() {
                Some(dst) => read.contains(dst) || may_fault(inst),
                None => true,
            }
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tacky_gen::{TackyContext, TackyGenerator};
    use crate::ir::tacky::listing;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::semantics::analyze;

    fn tacky_for(source: &str) -> Vec<Instruction> {
        let tokens = tokenize(source).unwrap();
        let ast = analyze(parse(&tokens).unwrap()).unwrap();
        let mut context = TackyContext::new();
        TackyGenerator::new(&mut context).generate(&ast)
    }

    fn var(name: &str) -> Val {
        Val::Var(name.to_string())
    }

    fn binary(op: BinaryOperator, src1: Val, src2: Val, dst: &str) -> Instruction {
        Instruction::Binary {
            op,
            src1,
            src2,
            dst: dst.to_string(),
        }
    }

    #[test]
    fn straight_line_code_folds_to_its_result() {
        let optimized = optimize(&tacky_for("int x = 2; int y = 3; return x + y * 2;"));
        assert_eq!(listing(&optimized), vec!["return 8"]);
    }

    #[test]
    fn constant_branch_removes_the_dead_arm() {
        let optimized = optimize(&tacky_for(
            "int x = 5; if (x > 10) { return 1; } else { return 0; }",
        ));
        assert_eq!(listing(&optimized), vec!["return 0"]);
    }

    #[test]
    fn division_by_zero_survives() {
        let optimized = optimize(&tacky_for("int x = 1; return x / 0;"));
        assert_eq!(listing(&optimized), vec!["t0 = 1 / 0", "return t0"]);
    }

    #[test]
    fn dead_division_by_zero_is_kept() {
        let optimized = optimize(&tacky_for("int z = 4 % 0; print 1;"));
        assert_eq!(listing(&optimized), vec!["t0 = 4 % 0", "print 1"]);
    }

    #[test]
    fn loop_variables_are_not_propagated() {
        let source = "int i = 0; int s = 0; while (i < 4) { s = s + i; i = i + 1; } return s;";
        let optimized = optimize(&tacky_for(source));
        let text = listing(&optimized);
        assert!(text.contains(&"t0 = i < 4".to_string()));
        assert!(text.contains(&"return s".to_string()));
        assert!(text.contains(&"i = 0".to_string()));
    }

    #[test]
    fn optimizing_twice_changes_nothing() {
        let sources = [
            "int x = 2; int y = 3; return x + y * 2;",
            "int i = 0; int s = 0; while (i < 4) { s = s + i; i = i + 1; } print s; return s * 1;",
            "float f = 1; int n = 3; while (n > 0) { f = f * 2.0; n = n - 1; } return f;",
            "bool b = true; int k = 0; if (b && k < 1) { k = 5; } else { k = 6; } return k;",
        ];
        for source in sources {
            let once = optimize(&tacky_for(source));
            let twice = optimize(&once);
            assert_eq!(once, twice, "not idempotent for {}", source);
        }
    }

    #[test]
    fn repeated_computation_reuses_earlier_result() {
        let code = vec![
            binary(BinaryOperator::Add, var("a"), var("b"), "t0"),
            binary(BinaryOperator::Add, var("a"), var("b"), "t1"),
            Instruction::Copy {
                src: var("c"),
                dst: "a".to_string(),
            },
            binary(BinaryOperator::Add, var("a"), var("b"), "t2"),
        ];
        assert_eq!(
            listing(&eliminate_common_subexpressions(&code)),
            vec!["t0 = a + b", "t1 = t0", "a = c", "t2 = a + b"]
        );
    }

    #[test]
    fn labels_end_available_computations() {
        let code = vec![
            binary(BinaryOperator::Multiply, var("a"), var("b"), "t0"),
            Instruction::Label("L0".to_string()),
            binary(BinaryOperator::Multiply, var("a"), var("b"), "t1"),
        ];
        assert_eq!(eliminate_common_subexpressions(&code), code);
    }

    #[test]
    fn identities_respect_operand_types() {
        let code = vec![
            binary(BinaryOperator::LessThan, var("a"), var("b"), "t0"),
            binary(BinaryOperator::And, var("t0"), Val::Constant(Value::Bool(true)), "t1"),
            binary(BinaryOperator::Or, Val::Constant(Value::Bool(true)), var("t0"), "t2"),
            Instruction::Unary {
                op: UnaryOperator::ToFloat,
                src: var("a"),
                dst: "t3".to_string(),
            },
            binary(BinaryOperator::Add, var("t3"), Val::Constant(Value::Int(0)), "t4"),
            binary(BinaryOperator::Multiply, var("t3"), Val::Constant(Value::Float(1.0)), "t5"),
            Instruction::Unary {
                op: UnaryOperator::Negate,
                src: Val::Constant(Value::Int(7)),
                dst: "t6".to_string(),
            },
            binary(BinaryOperator::Multiply, var("t6"), Val::Constant(Value::Int(0)), "t7"),
            binary(BinaryOperator::Add, Val::Constant(Value::Int(0)), var("t6"), "t8"),
            binary(BinaryOperator::Subtract, var("t3"), Val::Constant(Value::Int(0)), "t9"),
        ];
        assert_eq!(
            listing(&simplify_algebra(&code)),
            vec![
                "t0 = a < b",
                "t1 = t0",
                "t2 = true",
                "t3 = (float) a",
                "t4 = t3 + 0",
                "t5 = t3",
                "t6 = -7",
                "t7 = 0",
                "t8 = t6",
                "t9 = t3",
            ]
        );
    }

    #[test]
    fn code_after_jump_is_unreachable() {
        let code = vec![
            Instruction::Jump("L0".to_string()),
            Instruction::Print(Val::Constant(Value::Int(1))),
            Instruction::Label("L0".to_string()),
            Instruction::Print(Val::Constant(Value::Int(2))),
        ];
        assert_eq!(listing(&eliminate_dead_code(&code)), vec!["print 2"]);
    }

    #[test]
    fn zero_rounds_leaves_code_alone() {
        let code = tacky_for("int x = 2; return x;");
        let optimizer = Optimizer::new(OptimizerConfig { max_rounds: 0 });
        assert_eq!(optimizer.optimize(&code), code);
    }
}
