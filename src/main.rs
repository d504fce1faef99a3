use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use docxide_stylecheck::docx::{self, ExtractOptions};
use docxide_stylecheck::verify::{Report, ReportMetadata};
use docxide_stylecheck::{
    CancelToken, CompareOptions, Error, MismatchRecord, StyleSet, StyleType, compare,
};

/// Extract DOCX style models and check documents against a template
#[derive(Parser, Debug)]
#[command(name = "docxide-stylecheck")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the style records of a document
    Extract {
        docx: PathBuf,
        /// Print the whole style set as JSON
        #[arg(long)]
        json: bool,
        /// Leave out named style definitions
        #[arg(long)]
        no_definitions: bool,
    },
    /// Compare a document against a template (.docx or a snapshot .json)
    Compare {
        template: PathBuf,
        document: PathBuf,
        /// Use the strict float tolerance
        #[arg(long)]
        strict: bool,
        /// Style types to leave out, e.g. --ignore Section --ignore Field
        #[arg(long = "ignore", value_name = "STYLE_TYPE")]
        ignore: Vec<StyleType>,
        /// Abort when processing takes longer than this
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a template's style set as JSON for later comparisons
    Snapshot { template: PathBuf, output: PathBuf },
}

fn file_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn load_styles(path: &Path, cancel: &CancelToken) -> Result<StyleSet, Error> {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    {
        return StyleSet::from_json(&std::fs::read_to_string(path)?);
    }
    let options = ExtractOptions {
        document_id: file_id(path),
        include_style_definitions: true,
        cancel: cancel.clone(),
    };
    docx::extract_file(path, &options)
}

fn truncate(s: &str, width: usize) -> String {
    let one_line = s.replace(['\n', '\t'], " ");
    if one_line.chars().count() <= width {
        return one_line;
    }
    let mut out: String = one_line.chars().take(width.saturating_sub(2)).collect();
    out.push_str("..");
    out
}

fn print_styles(styles: &StyleSet) {
    println!(
        "{:>5}  {:<22} {:<20} {:<24} {:<44} {}",
        "#", "Type", "Role", "Name", "Context", "Sample"
    );
    println!("{}", "-".repeat(140));
    for r in &styles.records {
        let patterns = if r.direct_format_patterns.is_empty() {
            String::new()
        } else {
            format!(" (+{} direct)", r.direct_format_patterns.len())
        };
        println!(
            "{:>5}  {:<22} {:<20} {:<24} {:<44} {}{}",
            r.id,
            r.style_type.as_str(),
            r.context.structural_role.as_str(),
            truncate(&r.name, 24),
            truncate(&r.context.context_key, 44),
            truncate(&r.context.sample_text, 30),
            patterns,
        );
    }
    println!("{}", "-".repeat(140));
    println!(
        "{} records, {} direct-format patterns",
        styles.records.len(),
        styles.patterns.len()
    );
}

fn print_mismatches(mismatches: &[MismatchRecord]) {
    println!(
        "{:<8} {:<24} {:<40} {:<36} {}",
        "Severity", "Kind", "Location", "Fields", "Sample"
    );
    println!("{}", "-".repeat(140));
    for m in mismatches {
        println!(
            "{:<8} {:<24} {:<40} {:<36} {}",
            m.severity.as_str(),
            m.kind.as_str(),
            truncate(&m.location, 40),
            truncate(&m.mismatched_fields.join(","), 36),
            truncate(&m.sample_text, 30),
        );
        println!("{:>10}{}", "", m.recommended_action);
    }
    println!("{}", "-".repeat(140));
}

fn run(args: Args) -> Result<(), Error> {
    match args.command {
        Command::Extract {
            docx: path,
            json,
            no_definitions,
        } => {
            let options = ExtractOptions {
                document_id: file_id(&path),
                include_style_definitions: !no_definitions,
                ..Default::default()
            };
            let styles = docx::extract_file(&path, &options)?;
            if json {
                println!("{}", styles.to_json()?);
            } else {
                print_styles(&styles);
            }
        }
        Command::Compare {
            template,
            document,
            strict,
            ignore,
            timeout_secs,
            json,
        } => {
            let t0 = Instant::now();
            let cancel = match timeout_secs {
                Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
                None => CancelToken::new(),
            };
            let template_styles = load_styles(&template, &cancel)?;
            let document_styles = load_styles(&document, &cancel)?;
            let options = CompareOptions {
                strict,
                ignored_style_types: ignore.into_iter().collect::<HashSet<_>>(),
                cancel,
                ..Default::default()
            };
            let mismatches = compare(&template_styles, &document_styles, &options)?;
            let metadata = ReportMetadata {
                template_id: template_styles.document_id.clone(),
                document_id: document_styles.document_id.clone(),
                strict,
                template_records: template_styles.records.len(),
                document_records: document_styles.records.len(),
                elapsed_ms: t0.elapsed().as_secs_f64() * 1000.0,
            };
            let report = Report::new(metadata, mismatches);
            if json {
                println!("{}", report.to_json()?);
            } else {
                print_mismatches(&report.mismatches);
                println!("{}", report.summary);
            }
        }
        Command::Snapshot { template, output } => {
            let styles = load_styles(&template, &CancelToken::new())?;
            std::fs::write(&output, styles.to_json()?)?;
            println!(
                "Saved {} records from {} to {}",
                styles.records.len(),
                template.display(),
                output.display()
            );
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
