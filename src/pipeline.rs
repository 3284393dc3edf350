//! src/pipeline.rs
//!
//! 把七个阶段串起来。每个阶段把自己的输出行追加到 transcript 中，
//! 调用者拿到的是一个值，而不是被捕获的标准输出。

use crate::ast;
use crate::backend::asm_gen::AsmGenerator;
use crate::backend::emitter::emit_listing;
use crate::backend::optimizer::{Optimizer, OptimizerConfig};
use crate::backend::tacky_gen::{TackyContext, TackyGenerator};
use crate::error::{CompileError, RuntimeError, SemanticError};
use crate::ir::tacky::listing;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::semantics::analyze;
use crate::simulator::{Execution, Simulator, SimulatorConfig};
use tracing::info;

/// 可以在其后停止的阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lex,
    Parse,
    Validate,
    Tacky,
    Optimize,
    Codegen,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub stop_after: Option<Stage>,
    pub optimizer: OptimizerConfig,
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 模拟器正常结束。
    Completed(Execution),
    /// 编译成功，但模拟执行时出错。
    RuntimeFault(RuntimeError),
    SemanticFailure(SemanticError),
    Stopped(Stage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub lines: Vec<String>,
    pub outcome: Outcome,
}

impl Transcript {
    /// 语义错误是请求级别的失败；其他结果都算编译成功。
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::SemanticFailure(_))
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

struct TranscriptBuilder {
    lines: Vec<String>,
    stop_after: Option<Stage>,
}

impl TranscriptBuilder {
    fn header(&mut self, header: &str) {
        self.lines.push(header.to_string());
    }

    fn extend(&mut self, lines: impl IntoIterator<Item = String>) {
        self.lines.extend(lines);
    }

    fn stops_after(&self, stage: Stage) -> bool {
        self.stop_after == Some(stage)
    }

    fn finish(self, outcome: Outcome) -> Transcript {
        Transcript {
            lines: self.lines,
            outcome,
        }
    }
}

/// 编译并模拟执行一段源代码。词法和语法错误以 `Err` 返回，其余结果都在 transcript 里。
pub fn compile(source: &str, options: &CompileOptions) -> Result<Transcript, CompileError> {
    let mut out = TranscriptBuilder {
        lines: Vec::new(),
        stop_after: options.stop_after,
    };

    // --- PHASE 1: LEXING ---
    out.header("PHASE 1: Lexical Analysis");
    out.header("TOKENS:");
    let tokens = tokenize(source)?;
    out.extend(tokens.iter().map(|token| token.to_string()));
    info!(tokens = tokens.len(), "lexical analysis complete");
    if out.stops_after(Stage::Lex) {
        return Ok(out.finish(Outcome::Stopped(Stage::Lex)));
    }

    // --- PHASE 2: PARSING ---
    out.header("PHASE 2: Syntax Analysis / AST Construction");
    let program = parse(&tokens)?;
    out.extend(ast::dump(&program));
    info!(statements = program.statements.len(), "parsing complete");
    if out.stops_after(Stage::Parse) {
        return Ok(out.finish(Outcome::Stopped(Stage::Parse)));
    }

    // --- PHASE 3: SEMANTIC ANALYSIS ---
    out.header("PHASE 3: Semantic Analysis");
    let program = match analyze(program) {
        Ok(program) => program,
        Err(err) => {
            info!(kind = err.kind(), "semantic analysis failed");
            out.header("Semantic Analysis: FAILED");
            out.extend([format!("Error: {}: {}", err.kind(), err)]);
            return Ok(out.finish(Outcome::SemanticFailure(err)));
        }
    };
    out.header("Semantic Analysis: PASSED");
    info!("semantic analysis passed");
    if out.stops_after(Stage::Validate) {
        return Ok(out.finish(Outcome::Stopped(Stage::Validate)));
    }

    // --- PHASE 4: TACKY GENERATION ---
    out.header("PHASE 4: Intermediate Code Generation");
    let mut context = TackyContext::new();
    let tacky = TackyGenerator::new(&mut context).generate(&program);
    out.extend(listing(&tacky));
    info!(instructions = tacky.len(), "TACKY generation complete");
    if out.stops_after(Stage::Tacky) {
        return Ok(out.finish(Outcome::Stopped(Stage::Tacky)));
    }

    // --- PHASE 5: OPTIMIZATION ---
    out.header("PHASE 5: Optimization");
    let optimized = Optimizer::new(options.optimizer).optimize(&tacky);
    out.extend(listing(&optimized));
    info!(
        before = tacky.len(),
        after = optimized.len(),
        "optimization complete"
    );
    if out.stops_after(Stage::Optimize) {
        return Ok(out.finish(Outcome::Stopped(Stage::Optimize)));
    }

    // --- PHASE 6: CODE GENERATION ---
    out.header("PHASE 6: Code Generation (Assembly)");
    let assembly = AsmGenerator::new().generate(&optimized);
    out.extend(emit_listing(&assembly));
    info!(instructions = assembly.len(), "code generation complete");
    if out.stops_after(Stage::Codegen) {
        return Ok(out.finish(Outcome::Stopped(Stage::Codegen)));
    }

    // --- PHASE 7: SIMULATION ---
    // 模拟器执行的是未经优化的 TACKY
    out.header("PHASE 7: Simulation");
    let outcome = match Simulator::new(options.simulator).run(&tacky) {
        Ok(execution) => {
            out.extend(execution.printed.iter().map(|value| value.to_string()));
            match execution.returned {
                Some(value) => out.extend([format!("Return value: {}", value)]),
                None => out.header("Program finished without a return value"),
            }
            info!(printed = execution.printed.len(), "simulation complete");
            Outcome::Completed(execution)
        }
        Err(err) => {
            out.extend([format!("Runtime error: {}", err)]);
            info!(error = %err, "simulation stopped with a runtime error");
            Outcome::RuntimeFault(err)
        }
    };
    Ok(out.finish(outcome))
}
