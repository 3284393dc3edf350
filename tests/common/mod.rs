use edu_compiler::backend::tacky_gen::{TackyContext, TackyGenerator};
use edu_compiler::error::RuntimeError;
use edu_compiler::ir::tacky::Instruction;
use edu_compiler::lexer::tokenize;
use edu_compiler::parser::parse;
use edu_compiler::semantics::analyze;
use edu_compiler::simulator::Execution;

/// 一组合法程序，覆盖所有语句和运算符。
pub const PROGRAMS: &[&str] = &[
    "int x = 2; int y = 3; return x + y * 2;",
    "int x = 5; if (x > 10) { return 1; } else { return 0; }",
    "int x = 1; return x / 0;",
    "int i = 0; int s = 0; while (i < 5) { s = s + i * i; i = i + 1; } return s;",
    "float f = 1; int n = 4; while (n > 0) { f = f * 1.5; n = n - 1; } print f; return f / 2;",
    "bool a = true; bool b = !a; print a && b; print a || b; print a == b; return !(a != b);",
    "int x = 7; int y = x % 3; int z = -y; print z; return z * 0 + x - 0;",
    "int a = 3; int b = 4; print a * b; print a * b; a = 10; return a * b;",
    "int x; if (1 < 2) { x = 5; } else { x = 6; } return x;",
    "int n = 10; int acc = 0; while (n > 0) { if (n % 3 == 0) { acc = acc + n; } else if (n == 5) { print n; } n = n - 1; } return acc;",
    "int big = 9223372036854775807; print big + 1; return big * 2;",
    "float z = 0.0; float neg = -z; print neg; print z - 0.0; return neg + 0.0;",
    "int x = 1; { int x = 2; { int x = 3; print x; } print x; } return x;",
    "float a = 2.5; int b = 2; print a > b; print a <= b; print b * a; return a % b;",
    "int k = 0; while (k < 3) { int t0 = k * 2; print t0; k = k + 1; }",
    "int x = 4; int d = x - 4; print 8 / d;",
    "bool done = false; int i = 0; while (!done) { i = i + 1; if (i >= 3) { done = true; } } return i;",
];

pub fn tacky_for(source: &str) -> Vec<Instruction> {
    let tokens = tokenize(source).expect("lexes");
    let ast = analyze(parse(&tokens).expect("parses")).expect("checks");
    let mut context = TackyContext::new();
    TackyGenerator::new(&mut context).generate(&ast)
}

/// 出错位置会因为优化而改变，比较时只看错误种类。
pub fn observable(result: Result<Execution, RuntimeError>) -> Result<Execution, &'static str> {
    result.map_err(|err| match err {
        RuntimeError::DivisionByZero { .. } => "DivisionByZero",
        RuntimeError::RuntimeTypeFault { .. } => "RuntimeTypeFault",
        RuntimeError::StepLimitExceeded { .. } => "StepLimitExceeded",
    })
}
