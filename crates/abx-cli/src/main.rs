//! ABX CLI
//!
//! Lint filter lists and inspect single filters with the ABX analyzer.

use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;

use abx_core::{Category, ExtCompiled, FilterParser, ParserOptions};

#[derive(Parser)]
#[command(name = "abx-cli")]
#[command(about = "ABP/uBO filter list linter and inspector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze filter lists and report per-category totals
    Lint {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Emit the stats as JSON
        #[arg(long)]
        json: bool,

        /// Print one line per discarded filter
        #[arg(short, long)]
        verbose: bool,
    },

    /// Analyze a single filter and dump its structure
    Inspect {
        /// The filter text
        filter: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to serialize stats: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Lint {
            input,
            json,
            verbose,
        } => cmd_lint(&input, json, verbose),
        Commands::Inspect { filter } => cmd_inspect(&filter),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[derive(Debug, Default, Serialize)]
struct LintStats {
    lines: usize,
    blank: usize,
    comments: usize,
    network: usize,
    extended: usize,
    exceptions: usize,
    errors: usize,
    unsupported: usize,
    ignored: usize,
}

impl LintStats {
    fn record(&mut self, parser: &FilterParser) {
        self.lines += 1;
        if parser.is_blank() {
            self.blank += 1;
            return;
        }
        match parser.category() {
            Category::None => {}
            Category::Comment => self.comments += 1,
            Category::StaticNetFilter => self.network += 1,
            Category::StaticExtFilter => self.extended += 1,
        }
        if parser.is_exception() {
            self.exceptions += 1;
        }
        if parser.has_error() {
            self.errors += 1;
        } else if parser.is_unsupported() {
            self.unsupported += 1;
        } else if parser.should_ignore() {
            self.ignored += 1;
        }
    }
}

fn cmd_lint(inputs: &[String], json: bool, verbose: bool) -> Result<(), CliError> {
    let start = Instant::now();
    let mut parser = FilterParser::new(ParserOptions::default());
    let mut stats = LintStats::default();

    for path in inputs {
        let content = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        for (number, line) in content.lines().enumerate() {
            parser.analyze(line);
            stats.record(&parser);
            if verbose && parser.should_discard() && !parser.is_blank() {
                let reason = if parser.has_error() {
                    "error"
                } else if parser.is_unsupported() {
                    "unsupported"
                } else {
                    "ignored"
                };
                println!(
                    "  {}:{}: {} ({})",
                    Path::new(path)
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy(),
                    number + 1,
                    line,
                    reason
                );
            }
        }
    }

    let elapsed = start.elapsed();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Linted {} filter lists", inputs.len());
    println!("  Lines:       {}", stats.lines);
    println!("  Blank:       {}", stats.blank);
    println!("  Comments:    {}", stats.comments);
    println!("  Network:     {}", stats.network);
    println!("  Extended:    {}", stats.extended);
    println!("  Exceptions:  {}", stats.exceptions);
    println!("  Errors:      {}", stats.errors);
    println!("  Unsupported: {}", stats.unsupported);
    println!("  Ignored:     {}", stats.ignored);
    println!("  Time:        {:.1}ms", elapsed.as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_inspect(filter: &str) -> Result<(), CliError> {
    let mut parser = FilterParser::new(ParserOptions { interactive: true });
    parser.analyze(filter);

    println!("Filter: {}", parser.raw());
    println!("  Category:  {:?}", parser.category());
    let flavor = parser.flavor();
    let names: Vec<&str> = flavor.iter_names().map(|(name, _)| name).collect();
    println!("  Flavor:    {}", if names.is_empty() { "-".to_string() } else { names.join(" | ") });

    match parser.category() {
        Category::StaticNetFilter => {
            println!("  Pattern:   {:?}", parser.net_pattern());
            println!("  Regex:     {}", parser.pattern_is_regex());
            println!("  Hostname:  {}", parser.pattern_is_plain_hostname());
            let options: Vec<String> = parser
                .net_options()
                .map(|o| {
                    format!(
                        "{}{:?}{}",
                        if o.negated { "~" } else { "" },
                        o.id,
                        o.value.map(|v| format!("={v}")).unwrap_or_default()
                    )
                })
                .collect();
            if !options.is_empty() {
                println!("  Options:   {}", options.join(", "));
            }
            let tokens: Vec<&str> = parser.pattern_tokens().map(|t| t.token).collect();
            if !tokens.is_empty() {
                println!("  Tokens:    {}", tokens.join(" "));
            }
        }
        Category::StaticExtFilter => {
            println!("  Hostnames: {:?}", parser.options_text());
            match parser.ext_compiled() {
                Some(ExtCompiled::Scriptlet(body)) => println!("  Scriptlet: {body}"),
                Some(ExtCompiled::Selector(sel)) => {
                    println!("  Selector:  {}", sel.canonical);
                    if !sel.tasks.is_empty() {
                        println!("  Tasks:     {}", sel.tasks.len());
                    }
                }
                None => {}
            }
        }
        _ => {}
    }
    println!("  Discard:   {}", parser.should_discard());

    Ok(())
}
