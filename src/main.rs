use anyhow::bail;
use clap::{Parser, Subcommand};
use termflow::{DESCRIPTORS, Result, Severity, ValueKind, build_report_data, render, spec};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "termflow")]
#[command(about = "Typed operation graphs over named terms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a transformation and write an HTML report.
    Report {
        #[arg(long)]
        spec: String,

        #[arg(short = 'o', long)]
        out: String,
    },

    /// Evaluate a transformation and print the results.
    Eval {
        #[arg(long)]
        spec: String,

        /// Print the full report as JSON instead of a text table.
        #[arg(long)]
        json: bool,
    },

    /// Validate a transformation without evaluating it.
    Check {
        #[arg(long)]
        spec: String,

        /// Treat warnings as failures.
        #[arg(long)]
        strict: bool,
    },

    /// List the built-in operation kinds and their input slots.
    Ops,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.cmd {
        Commands::Report { spec, out } => {
            // 1) Parse + validate the transformation spec.
            let mut xf = spec::load(&spec)?.validate_and_build()?;

            // 2) Evaluate the graph.
            let outcomes = xf.evaluate()?;

            // 3) Aggregate + render HTML.
            let data = build_report_data(&xf, &outcomes);
            let html = render::render_html_report(&data)?;
            std::fs::write(&out, html)?;
            println!("Wrote {}", out);
        }

        Commands::Eval { spec, json } => {
            let mut xf = spec::load(&spec)?.validate_and_build()?;
            let outcomes = xf.evaluate()?;
            let data = build_report_data(&xf, &outcomes);
            if json {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print!("{}", render::render_text_report(&data));
            }
        }

        Commands::Check { spec, strict } => {
            let xf = spec::load(&spec)?.validate_and_build()?;

            let mut errors = 0usize;
            let mut warnings = 0usize;
            for (id, op) in xf.operations() {
                for problem in op.problems() {
                    println!("{}  ({})", problem, id);
                    match problem.severity {
                        Severity::Error => errors += 1,
                        Severity::Warning => warnings += 1,
                    }
                }
            }
            for problem in xf.problems() {
                println!("{}", problem);
                match problem.severity {
                    Severity::Error => errors += 1,
                    Severity::Warning => warnings += 1,
                }
            }

            if errors > 0 {
                bail!("validation failed with {} error(s)", errors);
            }
            if strict && warnings > 0 {
                bail!("validation failed with {} warning(s) in strict mode", warnings);
            }
            println!(
                "OK: {} operation(s), {} term(s)",
                xf.operations().len(),
                xf.terms().len()
            );
        }

        Commands::Ops => {
            for d in DESCRIPTORS {
                println!("{:<16} {}", d.name, d.description);
                for s in d.slots {
                    let max = s.max.map_or_else(|| "*".to_string(), |m| m.to_string());
                    println!("    {}: [{}..{}] {}", s.id, s.min, max, kind_names(s.kinds));
                }
                println!("    result: {}", kind_names(d.result_kinds));
            }
        }
    }

    Ok(())
}

fn kind_names(kinds: &[ValueKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join("|")
}
