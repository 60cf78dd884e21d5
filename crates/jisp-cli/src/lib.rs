//! Command line front end for the JISP interpreter.
//!
//! `jisp [-rc] [file|-]` — reads one or more top-level JSON values from the
//! given file (or stdin when the file is `-` or omitted), executes each
//! against a fresh document, and prints the final document. `-r` prints a
//! string root unquoted; `-c` prints compact instead of pretty JSON.

use std::env;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use jisp_core::{render, run_with_options, Fatal, OutputOptions, ValueStream};
use tracing::error;

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub raw: bool,
    pub compact: bool,
    pub input: Input,
}

pub fn run_from_env() -> i32 {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();
    match parse_args(&args) {
        Ok(options) => run_cli(&options),
        Err(message) => {
            eprintln!("{message}");
            1
        }
    }
}

pub fn parse_args(args: &[String]) -> Result<CliOptions, String> {
    let mut raw = false;
    let mut compact = false;
    let mut input = Input::Stdin;

    for arg in args {
        if arg == "-" {
            input = Input::Stdin;
        } else if let Some(flags) = arg.strip_prefix('-') {
            for flag in flags.chars() {
                match flag {
                    'r' => raw = true,
                    'c' => compact = true,
                    other => return Err(format!("unknown option: -{other}")),
                }
            }
        } else {
            input = Input::File(PathBuf::from(arg));
        }
    }

    Ok(CliOptions {
        raw,
        compact,
        input,
    })
}

fn run_cli(options: &CliOptions) -> i32 {
    let (source_name, text) = match read_input(&options.input) {
        Ok(pair) => pair,
        Err(message) => {
            eprintln!("{message}");
            return 1;
        }
    };

    let output = OutputOptions {
        raw: options.raw,
        compact: options.compact,
    };

    let mut stream = ValueStream::new(&text);
    loop {
        match stream.next_value() {
            Ok(None) => return 0,
            Ok(Some(program)) => match run_with_options(program, output.clone()) {
                Ok(final_doc) => print_document(&final_doc, &output),
                Err(fatal) => {
                    report_fatal(&fatal);
                    return 1;
                }
            },
            Err(parse_error) => {
                eprintln!("jisp parse error ({source_name}): {parse_error}");
                return 1;
            }
        }
    }
}

fn read_input(input: &Input) -> Result<(String, String), String> {
    match input {
        Input::Stdin => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("failed to read stdin: {e}"))?;
            Ok(("stdin".to_string(), text))
        }
        Input::File(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("failed to open file {}: {e}", path.display()))?;
            Ok((path.display().to_string(), text))
        }
    }
}

fn print_document(doc: &serde_json::Value, output: &OutputOptions) {
    if output.raw {
        if let Some(s) = doc.as_str() {
            println!("{s}");
            return;
        }
    }
    println!("{}", render(doc, output));
}

fn report_fatal(fatal: &Fatal) {
    error!(kind = fatal.kind.as_str(), "fatal error");
    eprintln!("jisp fatal error [{}]: {}", fatal.kind.as_str(), fatal.message);
    if let Some(snapshot) = &fatal.snapshot {
        let rendered = serde_json::to_string_pretty(snapshot)
            .unwrap_or_else(|_| snapshot.to_string());
        eprintln!("\n---- JSON State Snapshot ----");
        eprintln!("{rendered}");
        eprintln!("-----------------------------");
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("JISP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
