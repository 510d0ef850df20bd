//! REPL implementation

use super::{output, resolver};
use crate::elm::converter::AstToElmConverter;
use crate::eval::{CqlEngine, EvaluationContextBuilder};
use anyhow::{Context, Result};
use colored::*;
use indexmap::IndexMap;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for REPL
pub struct ReplConfig {
    pub model: String,
    pub version: Option<String>,
    pub library_paths: Vec<PathBuf>,
}

/// REPL state
struct ReplState {
    /// Library resolver
    resolver: resolver::LibraryResolver,
    /// Source text of a library loaded via `:load`, used as the base every
    /// expression is evaluated against.
    base_source: Option<String>,
    /// Expressions defined in this session via `define Name: expr`, kept in
    /// entry order so later defines can reference earlier ones.
    definitions: IndexMap<String, String>,
    /// Data model
    model: String,
    /// Model version
    version: Option<String>,
}

impl ReplState {
    fn new(config: ReplConfig) -> Self {
        Self {
            resolver: resolver::LibraryResolver::new(config.library_paths),
            base_source: None,
            definitions: IndexMap::new(),
            model: config.model,
            version: config.version,
        }
    }

    /// Build a complete CQL source by layering the session's `define`
    /// statements (and a trailing scratch definition to evaluate) on top of
    /// the loaded base library, or a minimal synthetic library header if
    /// none was loaded.
    fn build_source(&self, scratch_name: &str, scratch_expr: &str) -> String {
        let mut src = self
            .base_source
            .clone()
            .unwrap_or_else(|| "library Repl version '1.0.0'\n".to_string());

        for (name, expr) in &self.definitions {
            src.push_str(&format!("\ndefine \"{}\": {}\n", name, expr));
        }
        src.push_str(&format!("\ndefine \"{}\": {}\n", scratch_name, scratch_expr));
        src
    }
}

const SCRATCH_NAME: &str = "__repl_scratch__";

/// Run the interactive REPL
pub async fn run(config: ReplConfig) -> Result<()> {
    println!("{}", "CQL Interactive REPL".cyan().bold());
    println!("Type {} for help, {} to quit", ":help".green(), ":quit".green());
    println!("Model: {} {}", config.model, config.version.as_deref().unwrap_or("(default)"));
    println!();

    let mut state = ReplState::new(config);

    // Set up rustyline editor
    let mut rl = DefaultEditor::new()?;

    // Load history if it exists
    let history_file = dirs::home_dir()
        .map(|mut path| {
            path.push(".cql_history");
            path
        });

    if let Some(ref path) = history_file {
        let _ = rl.load_history(path);
    }

    loop {
        let readline = rl.readline("cql> ");

        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                // Handle commands
                if line.starts_with(':') {
                    match handle_command(line, &mut state).await {
                        Ok(false) => break, // :quit
                        Ok(true) => continue,
                        Err(e) => {
                            eprintln!("{}", output::format_error(&e));
                            continue;
                        }
                    }
                }

                // Handle define statements
                if line.starts_with("define ") {
                    match handle_define(line, &mut state) {
                        Ok(_) => {
                            println!("{}", output::format_success("Definition added"));
                        }
                        Err(e) => {
                            eprintln!("{}", output::format_error(&e));
                        }
                    }
                    continue;
                }

                // Evaluate expression
                match evaluate_expression(line, &state) {
                    Ok(result) => {
                        println!("{}", result.green());
                    }
                    Err(e) => {
                        eprintln!("{}", output::format_error(&e));
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    // Save history
    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }

    println!("Goodbye!");
    Ok(())
}

/// Handle REPL commands (starting with :)
async fn handle_command(command: &str, state: &mut ReplState) -> Result<bool> {
    let parts: Vec<&str> = command.split_whitespace().collect();

    match parts[0] {
        ":help" | ":h" => {
            print_help();
            Ok(true)
        }
        ":quit" | ":q" | ":exit" => {
            Ok(false)
        }
        ":clear" | ":c" => {
            state.definitions.clear();
            state.base_source = None;
            println!("{}", output::format_success("All definitions cleared"));
            Ok(true)
        }
        ":load" | ":l" => {
            if parts.len() < 2 {
                anyhow::bail!("Usage: :load <file.cql>");
            }
            let path = PathBuf::from(parts[1]);
            handle_load(&path, state)?;
            Ok(true)
        }
        ":type" | ":t" => {
            if parts.len() < 2 {
                anyhow::bail!("Usage: :type <expression>");
            }
            let expr = parts[1..].join(" ");
            handle_type(&expr, state)?;
            Ok(true)
        }
        ":list" | ":ls" => {
            handle_list(state);
            Ok(true)
        }
        ":paths" => {
            println!("Library search paths:");
            for path in state.resolver.search_paths() {
                println!("  {}", path.display());
            }
            Ok(true)
        }
        other => {
            anyhow::bail!("Unknown command: {}. Type :help for help", other);
        }
    }
}

/// Handle define statements
fn handle_define(line: &str, state: &mut ReplState) -> Result<()> {
    // Parse: define Name: expression
    let without_define = line.strip_prefix("define ").unwrap();

    let parts: Vec<&str> = without_define.splitn(2, ':').collect();
    if parts.len() != 2 {
        anyhow::bail!("Invalid define syntax. Expected: define Name: expression");
    }

    let name = parts[0].trim().trim_matches('"').to_string();
    let expr = parts[1].trim().to_string();

    // Validate by compiling it against the current session state before storing.
    let probe_source = state.build_source(SCRATCH_NAME, &expr);
    compile(&probe_source).with_context(|| format!("Invalid expression for '{}'", name))?;

    state.definitions.insert(name, expr);

    Ok(())
}

/// Parse and lower a CQL source string to an ELM library.
fn compile(source: &str) -> Result<octofhir_cql_elm::Library> {
    let ast_library = crate::parser::parse(source).context("Failed to parse expression")?;
    let mut converter = AstToElmConverter::new();
    Ok(converter.convert_library(&ast_library))
}

/// Evaluate an expression against the session's accumulated definitions.
fn evaluate_expression(expr: &str, state: &ReplState) -> Result<String> {
    let source = state.build_source(SCRATCH_NAME, expr);
    let elm_library = Arc::new(compile(&source)?);

    let engine = CqlEngine::new();
    let mut ctx = EvaluationContextBuilder::new()
        .library(elm_library.clone())
        .build();

    let value = engine
        .evaluate_expression(&elm_library, SCRATCH_NAME, &mut ctx)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(value.to_string())
}

/// Load a library file
fn handle_load(path: &PathBuf, state: &mut ReplState) -> Result<()> {
    let content = state.resolver.resolve_path(path)
        .with_context(|| format!("Failed to load library: {}", path.display()))?;

    // Parse the library to validate it and report definition count/name.
    let library = crate::parser::parse(&content)
        .with_context(|| "Failed to parse library")?;

    let lib_name = library.definition
        .as_ref()
        .map(|d| d.name.name.name.clone())
        .unwrap_or_else(|| "(unnamed)".to_string());
    let lib_version = library.definition
        .as_ref()
        .and_then(|d| d.version.as_ref())
        .map(|v| v.version.clone())
        .unwrap_or_else(|| "(no version)".to_string());

    state.base_source = Some(content);
    state.definitions.clear();

    println!(
        "{}",
        output::format_success(&format!(
            "Loaded library: {} version {} ({} definitions)",
            lib_name,
            lib_version,
            library.statements.len()
        ))
    );

    Ok(())
}

/// Show type of an expression
fn handle_type(expr: &str, state: &ReplState) -> Result<()> {
    let source = state.build_source(SCRATCH_NAME, expr);
    let elm_library = Arc::new(compile(&source)?);

    let engine = CqlEngine::new();
    let mut ctx = EvaluationContextBuilder::new()
        .library(elm_library.clone())
        .build();

    let value = engine
        .evaluate_expression(&elm_library, SCRATCH_NAME, &mut ctx)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("{}: {}", expr.cyan(), value.get_type().qualified_name().yellow());
    Ok(())
}

/// List all definitions
fn handle_list(state: &ReplState) {
    if state.definitions.is_empty() && state.base_source.is_none() {
        println!("No definitions");
        return;
    }

    if let Some(source) = &state.base_source {
        if let Ok(library) = crate::parser::parse(source) {
            use crate::ast::Statement;
            println!("Loaded library definitions:");
            for stmt in &library.statements {
                let name = match &stmt.inner {
                    Statement::ExpressionDef(def) => def.name.name.clone(),
                    Statement::FunctionDef(def) => def.name.name.clone(),
                };
                println!("  {}", name.cyan());
            }
        }
    }

    if !state.definitions.is_empty() {
        println!("Session definitions:");
        for (name, expr) in &state.definitions {
            println!("  {} = {}", name.cyan(), expr);
        }
    }
}

/// Print help message
fn print_help() {
    println!("{}", "CQL REPL Commands:".bold());
    println!();
    println!("  {}  Show this help message", ":help, :h".green());
    println!("  {}  Quit the REPL", ":quit, :q, :exit".green());
    println!("  {}  Clear all definitions", ":clear, :c".green());
    println!("  {}  Load a library file", ":load <file>, :l <file>".green());
    println!("  {}  Show type of expression", ":type <expr>, :t <expr>".green());
    println!("  {}  List all definitions", ":list, :ls".green());
    println!("  {}  Show library search paths", ":paths".green());
    println!();
    println!("{}", "Expression Evaluation:".bold());
    println!();
    println!("  {}  Define a named expression", "define Name: expression".cyan());
    println!("  {}  Evaluate an expression", "expression".cyan());
    println!();
    println!("{}", "Examples:".bold());
    println!();
    println!("  {}", "define X: 1 + 2".cyan());
    println!("  {}", "X * 3".cyan());
    println!("  {}", ":type [1, 2, 3]".cyan());
    println!("  {}", ":load MyLibrary.cql".cyan());
}

// Helper to get home directory
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
