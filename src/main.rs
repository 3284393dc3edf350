//  src/main.rs

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use edu_compiler::backend::optimizer::OptimizerConfig;
use edu_compiler::simulator::SimulatorConfig;
use edu_compiler::{CompileOptions, Stage, Transcript, compile};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::process::ExitCode;
use tracing::Level;

/// An educational compiler: lexes, parses, checks, lowers, optimizes,
/// generates target code and simulates a small imperative language.
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Stop after lexical analysis
    #[arg(long)]
    lex: bool,
    /// Stop after building the AST
    #[arg(long)]
    parse: bool,
    /// Stop after semantic analysis
    #[arg(long)]
    validate: bool,
    /// Stop after generating TACKY
    #[arg(long)]
    tacky: bool,
    /// Stop after optimization
    #[arg(long)]
    optimize: bool,
    /// Stop after code generation
    #[arg(long)]
    codegen: bool,

    /// Instruction budget for the simulator
    #[arg(long, value_name = "N", default_value_t = 1_000_000)]
    max_steps: u64,
    /// Upper bound on optimizer rounds
    #[arg(long, value_name = "N", default_value_t = OptimizerConfig::default().max_rounds)]
    max_rounds: usize,

    /// Read a `{"code": ...}` request and print an `{"output": ...}` response
    #[arg(long)]
    json: bool,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Source file, or `-` for stdin
    input: String,
}

impl Cli {
    fn stop_after(&self) -> Option<Stage> {
        // 与编译顺序一致，最早的阶段优先
        [
            (self.lex, Stage::Lex),
            (self.parse, Stage::Parse),
            (self.validate, Stage::Validate),
            (self.tacky, Stage::Tacky),
            (self.optimize, Stage::Optimize),
            (self.codegen, Stage::Codegen),
        ]
        .into_iter()
        .find_map(|(set, stage)| set.then_some(stage))
    }

    fn options(&self) -> CompileOptions {
        CompileOptions {
            stop_after: self.stop_after(),
            optimizer: OptimizerConfig {
                max_rounds: self.max_rounds,
            },
            simulator: SimulatorConfig {
                max_steps: Some(self.max_steps),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Serialize)]
struct Response {
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let input = read_input(&cli.input)?;
    let succeeded = if cli.json {
        run_json(&cli, &input)?
    } else {
        run_plain(&cli, &input)
    };
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(verbose: u8, json: bool) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))
    }
}

fn transcript_output(transcript: &Transcript) -> String {
    let mut output = transcript.text();
    output.push('\n');
    output
}

fn run_plain(cli: &Cli, source: &str) -> bool {
    match compile(source, &cli.options()) {
        Ok(transcript) => {
            print!("{}", transcript_output(&transcript));
            transcript.is_success()
        }
        Err(err) => {
            eprintln!("Compilation failed: {}", err);
            false
        }
    }
}

fn run_json(cli: &Cli, body: &str) -> Result<bool> {
    let request: Request = serde_json::from_str(body).context("request body is not valid JSON")?;
    let (response, succeeded) = match compile(&request.code, &cli.options()) {
        Ok(transcript) => (
            Response {
                output: transcript_output(&transcript),
                error: None,
            },
            transcript.is_success(),
        ),
        Err(err) => (
            Response {
                output: String::new(),
                error: Some(err.to_string()),
            },
            false,
        ),
    };
    println!("{}", serde_json::to_string(&response)?);
    Ok(succeeded)
}
