//! The NS interpreter CLI.
//!
//! `nsi <file.ns>` runs a program; `nsi <file.ns> --ast` prints the
//! parsed tree instead. The process exit code is the integer part of the
//! program's top-level Number value (0 for anything else); lex, parse
//! and runtime errors render to stdout and exit 1.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use ariadne::{Color, Label, Report, ReportKind, Source as AriadneSource};
use clap::Parser;

use ns_common::diag::TraceFrame;
use ns_common::source::Source;
use ns_common::span::Span;
use ns_interp::{Interp, ValueKind};

#[derive(Parser)]
#[command(name = "nsi", version, about = "The NS interpreter")]
struct Cli {
    /// Path to the .ns source file
    file: PathBuf,

    /// Print the parsed AST and exit
    #[arg(long)]
    ast: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(()) => ExitCode::from(1),
    }
}

fn run(cli: &Cli) -> Result<ExitCode, ()> {
    let source = match Source::from_file(&cli.file) {
        Ok(source) => source,
        Err(e) => {
            println!("error: cannot read `{}`: {e}", cli.file.display());
            return Err(());
        }
    };

    let tokens = match ns_lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            report("Syntax error", &e.to_string(), e.span, &[], &source);
            return Err(());
        }
    };

    let tree = match ns_parser::parse(tokens) {
        Ok(tree) => tree,
        Err(e) => {
            report("Syntax error", &e.message, e.span, &e.trace, &source);
            return Err(());
        }
    };

    if cli.ast {
        print!("{}", ns_parser::dump(&tree));
        return Ok(ExitCode::SUCCESS);
    }

    let main_dir = cli
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let mut interp = Interp::new(main_dir);
    match interp.run(&Rc::new(tree)) {
        Ok(value) => {
            // A top-level Number becomes the exit code.
            let code = match &value.borrow().kind {
                ValueKind::Number(n) => n.trunc().rem_euclid(256.0) as u8,
                _ => 0,
            };
            Ok(ExitCode::from(code))
        }
        Err(e) => {
            report(e.label, &e.message, e.span, &[], &e.source);
            Err(())
        }
    }
}

/// Render a diagnostic to stdout: the labeled message, the offending
/// line with the span underlined, and the enclosing node chain as notes.
fn report(title: &'static str, message: &str, span: Span, trace: &[TraceFrame], source: &Source) {
    let start = span.start as usize;
    let end = (span.end as usize).max(start + 1).min(source.body.len().max(start + 1));
    let mut builder = Report::<std::ops::Range<usize>>::build(
        ReportKind::Custom(title, Color::Red),
        start..end,
    )
    .with_message(message)
    .with_label(Label::new(start..end).with_message(message).with_color(Color::Yellow));
    for frame in trace.iter().rev() {
        builder = builder.with_note(format!(
            "in {} ({}:{}:{})",
            frame.label,
            source.name,
            frame.line + 1,
            frame.column + 1
        ));
    }
    let _ = builder.finish().print(AriadneSource::from(source.body.as_str()));
}
