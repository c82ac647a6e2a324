use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser as ClapParser;
use clap::Subcommand;
use log::LevelFilter;

use slox::ast_printer::AstPrinter;
use slox::interpreter::Interpreter;
use slox::parser::Parser;
use slox::resolver::Resolver;
use slox::scanner::Scanner;
use slox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Script to run; opens an interactive prompt when omitted
    script: Option<PathBuf>,

    #[command(subcommand)]
    commands: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes the provided input from a given valid filepath
    Tokenize { filename: PathBuf },

    /// Parses the provided input and prints each statement in prefix form
    Parse { filename: PathBuf },

    /// Runs the provided script
    Run { filename: PathBuf },
}

/// How a single pipeline run ended; decides the process exit code.
enum Outcome {
    Ok,
    StaticError,
    RuntimeError,
}

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()?;

    let args: Cli = Cli::parse();

    match args.commands {
        Some(Commands::Tokenize { filename }) => tokenize(&filename),

        Some(Commands::Parse { filename }) => parse(&filename),

        Some(Commands::Run { filename }) => run_file(&filename),

        None => match args.script {
            Some(script) => run_file(&script),
            None => run_prompt(),
        },
    }
}

fn tokenize(path: &Path) -> anyhow::Result<()> {
    let source = fs::read(path)?;

    let mut had_error = false;

    for item in Scanner::new(&source) {
        match item {
            Ok(token) => println!("{}", token),

            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    if had_error {
        process::exit(65);
    }

    Ok(())
}

fn parse(path: &Path) -> anyhow::Result<()> {
    let source = fs::read(path)?;

    let (tokens, mut had_error) = scan(&source);

    let (statements, errors) = Parser::new(tokens).parse();
    for e in &errors {
        had_error = true;
        eprintln!("{}", e);
    }

    for stmt in &statements {
        println!("{}", AstPrinter::print_stmt(stmt));
    }

    if had_error {
        process::exit(65);
    }

    Ok(())
}

fn run_file(path: &Path) -> anyhow::Result<()> {
    let source = fs::read(path)?;

    let mut interpreter = Interpreter::new();

    match run(&source, &mut interpreter) {
        Outcome::Ok => Ok(()),
        Outcome::StaticError => process::exit(65),
        Outcome::RuntimeError => process::exit(70),
    }
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut interpreter = Interpreter::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        if line.trim() == "q" {
            break;
        }

        // Diagnostics were already printed; the session continues either way.
        run(line.as_bytes(), &mut interpreter);
    }

    Ok(())
}

/// Scan → parse → resolve → execute against `interpreter`.  Prints every
/// diagnostic to stderr; a program with static errors is never executed.
fn run(source: &[u8], interpreter: &mut Interpreter) -> Outcome {
    let (tokens, mut had_static_error) = scan(source);

    let (statements, errors) = Parser::new(tokens).parse();
    for e in &errors {
        had_static_error = true;
        eprintln!("{}", e);
    }

    let resolve_errors = Resolver::new(interpreter).resolve(&statements);
    for e in &resolve_errors {
        had_static_error = true;
        eprintln!("{}", e);
    }

    if had_static_error {
        return Outcome::StaticError;
    }

    match interpreter.interpret(&statements) {
        Ok(()) => Outcome::Ok,

        Err(e) => {
            eprintln!("{}", e);
            Outcome::RuntimeError
        }
    }
}

/// Collects the token list, reporting lexical diagnostics to stderr.
fn scan(source: &[u8]) -> (Vec<Token>, bool) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut had_error = false;

    for item in Scanner::new(source) {
        match item {
            Ok(token) => tokens.push(token),

            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    (tokens, had_error)
}
