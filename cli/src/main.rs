use std::path::Path;
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use codeblock_cli::{test_runner, writer};
use generator::nested::MAX_NESTING_DEPTH;
use generator::{Extraction, GenerateOptions};

#[derive(Parser)]
#[command(
    name = "codeblock",
    version,
    about = "Extract annotated code blocks from Markdown into source files"
)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log what is being parsed and written
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the files a Markdown document generates
    Extract(ExtractArgs),

    /// Verify generated files on disk are up to date
    Check(CheckArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Markdown source file
    file: String,

    /// Output directory, relative to the source file (overrides `outDir`)
    #[arg(long)]
    outdir: Option<String>,

    /// Do not extract Markdown files generated by the document
    #[arg(long)]
    no_nested: bool,

    /// Only report diagnostics, not written files
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Markdown source file
    file: String,

    /// Output directory, relative to the source file (overrides `outDir`)
    #[arg(long)]
    outdir: Option<String>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    match cli.command {
        Command::Extract(args) => do_extract(args, cli.no_color),
        Command::Check(args) => do_check(args, cli.no_color),
        Command::Test(args) => {
            let path = Path::new(&args.path);
            if args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            process::exit(test_runner::run_tests(path, cli.no_color, &args.category));
        }
    }
}

fn init_tracing(verbose: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .without_time()
        .init();
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Read and extract `file`, exiting on I/O failure.
fn load(file: &str, outdir: Option<String>, nested: bool) -> Extraction {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", file, e);
            process::exit(1);
        }
    };

    let options = GenerateOptions { out_dir: outdir };
    let max_depth = if nested { MAX_NESTING_DEPTH } else { 0 };
    Extraction::build_limited(&source, file, &options, max_depth)
}

/// Render the diagnostics of every stage. Returns true if any is an error.
fn emit_diagnostics(extraction: &Extraction, no_color: bool) -> bool {
    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    let mut files = SimpleFiles::new();
    let mut has_errors = false;

    for stage in extraction.stages() {
        let file_id = files.add(stage.source_path.clone(), stage.text.clone());
        for diagnostic in stage.diagnostics() {
            has_errors |= diagnostic.is_error();
            let report = diagnostic.to_diagnostic(file_id);
            let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &report);
        }
    }

    has_errors
}

fn do_extract(args: ExtractArgs, no_color: bool) {
    let extraction = load(&args.file, args.outdir, !args.no_nested);
    let has_errors = emit_diagnostics(&extraction, no_color);

    let summary = match writer::write_outputs(&extraction) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("error: cannot write outputs of '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    if !args.quiet {
        for path in &summary.written {
            eprintln!("wrote {}", path.display());
        }
        eprintln!(
            "{}: {} written, {} unchanged",
            args.file,
            summary.written.len(),
            summary.unchanged.len()
        );
    }

    if has_errors {
        process::exit(1);
    }
}

fn do_check(args: CheckArgs, no_color: bool) {
    let extraction = load(&args.file, args.outdir, true);
    let has_errors = emit_diagnostics(&extraction, no_color);

    let mismatches = match writer::check_outputs(&extraction) {
        Ok(mismatches) => mismatches,
        Err(e) => {
            eprintln!("error: cannot check outputs of '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    for mismatch in &mismatches {
        eprintln!("{}", mismatch);
    }

    if mismatches.is_empty() && !has_errors {
        eprintln!("ok: {} is up to date", args.file);
        return;
    }
    process::exit(1);
}
