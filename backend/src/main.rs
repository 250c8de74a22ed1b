//! Enroll CLI - import school rosters into the school backend
//!
//! # Main Commands
//!
//! ```bash
//! enroll import 5A.xlsx             # Import a roster (backend from ENROLL_API_URL)
//! enroll import roster.csv --dry-run
//! enroll serve                      # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! enroll inspect roster.xlsx        # Show discovered classes and parsed students
//! enroll classify "Grade : _PRE KG - A___"
//! enroll template --format xlsx -o roster.xlsx
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use enroll::{
    api::AppState, classify, read_file, BranchId, EnrollConfig, ImportOptions, LogProgress,
    MemoryRegistry, NoProgress, Registry,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "enroll")]
#[command(about = "Import school rosters and infer their classes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full import: roster file -> classes, students, payments
    Import {
        /// Roster file (.xlsx, .xls, .csv)
        input: PathBuf,

        /// Use an in-memory registry instead of the backend
        #[arg(long)]
        dry_run: bool,

        /// Branch to import into (overrides ENROLL_BRANCH_ID)
        #[arg(short, long)]
        branch: Option<String>,

        /// Academic year (overrides ENROLL_ACADEMIC_YEAR)
        #[arg(short, long)]
        year: Option<i32>,

        /// Registration fee per student (overrides ENROLL_REGISTRATION_FEE)
        #[arg(long)]
        fee: Option<f64>,

        /// Write the summary as JSON to this file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Discover classes and parse students without writing anything
    Inspect {
        /// Roster file (.xlsx, .xls, .csv)
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the class classifier on a header text or a filename
    Classify {
        /// Header cell text, or a filename with --filename
        text: String,

        /// Treat the text as a filename
        #[arg(long)]
        filename: bool,
    },

    /// Write a blank roster template
    Template {
        #[arg(short, long, value_enum, default_value = "csv")]
        format: TemplateFormat,

        /// Output file (default: stdout for csv, roster-template.xlsx for xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Use an in-memory registry instead of the backend
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TemplateFormat {
    Csv,
    Xlsx,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Import {
            input,
            dry_run,
            branch,
            year,
            fee,
            output,
        } => cmd_import(&input, dry_run, branch, year, fee, output.as_deref()).await,

        Commands::Inspect { input, output } => cmd_inspect(&input, output.as_deref()),

        Commands::Classify { text, filename } => cmd_classify(&text, filename),

        Commands::Template { format, output } => cmd_template(format, output.as_deref()),

        Commands::Serve { port, dry_run } => cmd_serve(port, dry_run).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Backend registry, or an in-memory one pre-loaded with every grade level.
fn make_registry(
    config: &EnrollConfig,
    branch: &BranchId,
    dry_run: bool,
) -> Result<Arc<dyn Registry>, Box<dyn std::error::Error>> {
    if dry_run {
        eprintln!("🧪 Dry run: writing to an in-memory registry");
        return Ok(Arc::new(MemoryRegistry::with_default_grade_levels(branch)));
    }
    Ok(Arc::new(config.http_registry()?))
}

async fn cmd_import(
    input: &Path,
    dry_run: bool,
    branch: Option<String>,
    year: Option<i32>,
    fee: Option<f64>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = EnrollConfig::from_env()?;
    let mut options: ImportOptions = config.import_options();
    if let Some(branch) = branch {
        options.branch = BranchId::new(branch);
    }
    if let Some(year) = year {
        options.academic_year = year;
    }
    if let Some(fee) = fee {
        options.registration_fee = fee;
    }

    let registry = make_registry(&config, &options.branch, dry_run)?;
    eprintln!(
        "📥 Importing {} into branch {} ({})",
        input.display(),
        options.branch,
        options.academic_year
    );

    let summary = enroll::import_file(input, registry.as_ref(), &options, &mut LogProgress).await?;

    eprintln!("\n{}", "=".repeat(70));
    eprintln!("📊 SUMMARY");
    eprintln!("{}", "=".repeat(70));
    eprintln!("   Classes:   {}", summary.classes.join(", "));
    eprintln!("   Enrolled:  {}", summary.success_count);
    eprintln!("   Failed:    {}", summary.failed_count);
    if summary.payment_failures > 0 {
        eprintln!("   Payments not recorded: {}", summary.payment_failures);
    }
    let (shown, more) = summary.error_preview(10);
    for error in shown {
        eprintln!("   ❌ {}", error);
    }
    if more > 0 {
        eprintln!("   ... and {} more errors", more);
    }
    eprintln!("{}\n", "=".repeat(70));

    let json = serde_json::to_string_pretty(&summary)?;
    write_output(&json, output)
}

fn cmd_inspect(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());

    let parsed = read_file(input)?;
    eprintln!("   Rows: {}", parsed.rows.len());
    if let Some(encoding) = &parsed.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    eprintln!("   Columns: {}", parsed.headers.join(", "));

    let filename = input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let as_of = ImportOptions::default().as_of;
    let preview = enroll::preview(&parsed.rows, filename, as_of, &mut NoProgress)?;

    for class in &preview.classes {
        eprintln!("   🏫 {} ({}): {} students", class.class_name, class.grade_level, class.students.len());
        for name in &class.unparsed {
            eprintln!("      ⚠️  unparsed name: {}", name);
        }
    }
    eprintln!("✅ {} students in {} classes", preview.student_count(), preview.classes.len());

    let json = serde_json::to_string_pretty(&preview)?;
    write_output(&json, output)
}

fn cmd_classify(text: &str, as_filename: bool) -> Result<(), Box<dyn std::error::Error>> {
    let signal = if as_filename {
        classify::from_filename(text)
    } else {
        classify::from_header_text(text)
    };

    match signal {
        Some(signal) => {
            println!("Class:    {}", signal.class_name());
            println!("Grade:    {}", signal.grade_level);
            println!("Strategy: {}", classify::strategy_name(signal.matched_strategy));
            Ok(())
        }
        None => Err(format!("No class signal in '{}'", text).into()),
    }
}

fn cmd_template(format: TemplateFormat, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        TemplateFormat::Csv => write_output(&enroll::template::csv_template(), output),
        TemplateFormat::Xlsx => {
            let path = output.unwrap_or(Path::new("roster-template.xlsx"));
            fs::write(path, enroll::template::xlsx_template()?)?;
            eprintln!("💾 Template written to: {}", path.display());
            Ok(())
        }
    }
}

async fn cmd_serve(port: u16, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = EnrollConfig::from_env()?;
    let registry = make_registry(&config, &config.branch_id, dry_run)?;
    enroll::server::start_server(port, AppState { registry, config }).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
