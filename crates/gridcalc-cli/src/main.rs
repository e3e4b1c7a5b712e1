//! gridcalc CLI - evaluate and inspect spreadsheet formulas

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gridcalc::prelude::*;
use gridcalc::{tokens_to_string, Token};
use std::io::{self, Write};
use tracing::debug;

#[derive(Parser)]
#[command(name = "gridcalc")]
#[command(author, version, about = "Spreadsheet formula evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula and print its value
    Eval {
        /// Formula to evaluate, e.g. "=SUM(A1:A3)"
        formula: String,

        /// Cell contents as ADDRESS=VALUE; values starting with '=' are formulas
        #[arg(short, long = "cell", value_name = "ADDRESS=VALUE", value_parser = parse_assignment)]
        cells: Vec<(String, String)>,
    },

    /// Validate a formula and print its tokens
    Check {
        /// Formula to check
        formula: String,
    },

    /// Print the cells a formula reads
    Deps {
        /// Formula to inspect
        formula: String,
    },
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((address, value)) if !address.trim().is_empty() => {
            Ok((address.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected ADDRESS=VALUE, got '{}'", s)),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Eval { formula, cells } => eval(&formula, &cells),
        Commands::Check { formula } => check(&formula),
        Commands::Deps { formula } => deps(&formula),
    }
}

fn eval(formula: &str, cells: &[(String, String)]) -> Result<()> {
    let mut sheet = Worksheet::new();
    for (address, contents) in cells {
        sheet
            .set_contents(address, contents)
            .with_context(|| format!("Failed to set {} to '{}'", address, contents))?;
    }
    debug!(cells = sheet.cell_count(), "loaded cells");

    let value = sheet
        .engine()
        .evaluate(formula, &sheet)
        .with_context(|| format!("Failed to evaluate '{}'", formula))?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", display_value(&value))?;
    Ok(())
}

fn display_value(value: &FormulaValue) -> String {
    match value {
        FormulaValue::Array(rows) => rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| CellValue::from(v.clone()).to_string())
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => CellValue::from(other.clone()).to_string(),
    }
}

fn check(formula: &str) -> Result<()> {
    let engine = FormulaEngine::new();
    let tokens = engine
        .tokenize(formula)
        .with_context(|| format!("Failed to tokenize '{}'", formula))?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", tokens_to_string(&tokens))?;
    for token in &tokens {
        writeln!(stdout, "  {:<10} {}", token_kind(token), token)?;
    }

    let result = engine.validate(&tokens);
    if !result.valid {
        for err in &result.errors {
            writeln!(stdout, "error[{}]: {}", err.kind(), err)?;
        }
        bail!("{} error(s) in '{}'", result.errors.len(), formula);
    }
    writeln!(stdout, "ok")?;
    Ok(())
}

fn token_kind(token: &Token) -> &'static str {
    match token {
        Token::Value(_) => "value",
        Token::Reference(_) => "reference",
        Token::Range(_) => "range",
        Token::Operator(_) => "operator",
        Token::Function { .. } => "function",
        Token::Paren(_) => "paren",
    }
}

fn deps(formula: &str) -> Result<()> {
    let engine = FormulaEngine::new();
    let deps = engine
        .dependencies(formula)
        .with_context(|| format!("Failed to tokenize '{}'", formula))?;

    let mut stdout = io::stdout().lock();
    for addr in deps {
        writeln!(stdout, "{}", addr)?;
    }
    Ok(())
}
