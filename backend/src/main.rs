//! Retention CLI - department retention of entering cohorts
//!
//! # Main Commands
//!
//! ```bash
//! retention serve --input cohorts.csv         # Start HTTP server (port 3000)
//! retention timeline cohorts.csv math          # Outcomes per cohort for one department
//! retention compare cohorts.csv --urm urm      # Retention rate per department
//! retention undeclared cohorts.csv             # Outcomes of undeclared admits
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! retention parse cohorts.csv                  # Raw rows as JSON
//! retention normalize cohorts.csv              # Canonical rows as JSON
//! retention aggregate cohorts.csv --format csv # Result rows
//! retention departments cohorts.csv            # Start departments in the data
//! retention config show                        # Print the active lookup table
//! ```
//!
//! Every command accepts `--config <file>`; without it `RETENTION_CONFIG`
//! (also read from `.env`) or the built-in table is used.

use clap::{Args, Parser, Subcommand, ValueEnum};
use retention::api::logs::LOG_BROADCASTER;
use retention::config::DepartmentConfig;
use retention::parser::parse_csv_file_auto;
use retention::transform::{format_delimiter, load_csv, Normalizer, OutcomeRule, Snapshot};
use retention::views::{self, StudentType, Subgroup, UrmStatus};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "retention")]
#[command(about = "Department retention analysis of student cohort exports", long_about = None)]
struct Cli {
    /// Department config JSON (default: $RETENTION_CONFIG, else built-in)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Don't echo pipeline logs to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct SubgroupArgs {
    /// URM subgroup
    #[arg(long, value_enum, default_value = "all")]
    urm: UrmStatus,

    /// Admission subgroup
    #[arg(long, value_enum, default_value = "all")]
    student_type: StudentType,
}

impl From<SubgroupArgs> for Subgroup {
    fn from(args: SubgroupArgs) -> Self {
        Subgroup::new(args.urm, args.student_type)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleArg {
    /// Retained = same department
    Department,
    /// Retained = any department of the division
    Division,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output the raw rows as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse and normalize a CSV file
    Normalize {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Full pipeline: result rows per cohort, department and outcome
    Aggregate {
        input: PathBuf,

        #[command(flatten)]
        subgroup: SubgroupArgs,

        /// Only this start department
        #[arg(short, long)]
        department: Option<String>,

        /// How retention is decided
        #[arg(long, value_enum, default_value = "department")]
        rule: RuleArg,

        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Outcome shares per cohort for one department
    Timeline {
        input: PathBuf,

        /// Start department, e.g. "physics and astronomy"
        department: String,

        #[command(flatten)]
        subgroup: SubgroupArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Retention rate per department over the comparison window
    Compare {
        input: PathBuf,

        #[command(flatten)]
        subgroup: SubgroupArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Outcome shares per cohort for undeclared admits
    Undeclared {
        input: PathBuf,

        #[command(flatten)]
        subgroup: SubgroupArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the start departments in a CSV file
    Departments { input: PathBuf },

    /// Inspect department configs
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// CSV file to serve until the first upload
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the active config as JSON
    Show,

    /// Check a config file against the schema and consistency rules
    Validate {
        /// Config JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    LOG_BROADCASTER.set_quiet(cli.quiet);

    if let Err(e) = run(cli).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Normalize { input, output } => cmd_normalize(&input, config_path, output.as_deref()),

        Commands::Aggregate {
            input,
            subgroup,
            department,
            rule,
            format,
            output,
        } => {
            let snapshot = load(&input, config_path)?;
            cmd_aggregate(&snapshot, subgroup.into(), department, rule, format, output.as_deref())
        }

        Commands::Timeline {
            input,
            department,
            subgroup,
            output,
        } => {
            let snapshot = load(&input, config_path)?;
            let view = views::department_timeline(&snapshot, &department, subgroup.into())?;
            eprintln!("📈 {}", view.title);
            print_summary(&view.summary);
            write_json(&view, output.as_deref())
        }

        Commands::Compare { input, subgroup, output } => {
            let snapshot = load(&input, config_path)?;
            let view = views::department_comparison(&snapshot, subgroup.into());
            eprintln!("📊 {}", view.title);
            for entry in &view.entries {
                eprintln!(
                    "   {:<45} {:5.1}%  ({} students)",
                    views::title_case(&entry.department),
                    entry.retention_rate,
                    entry.total_students
                );
            }
            write_json(&view, output.as_deref())
        }

        Commands::Undeclared { input, subgroup, output } => {
            let snapshot = load(&input, config_path)?;
            let view = views::undeclared_timeline(&snapshot, subgroup.into());
            eprintln!("📈 {}", view.title);
            print_summary(&view.summary);
            write_json(&view, output.as_deref())
        }

        Commands::Departments { input } => {
            let snapshot = load(&input, config_path)?;
            for dept in views::departments(&snapshot) {
                println!("{}", dept);
            }
            Ok(())
        }

        Commands::Config { action } => cmd_config(action, config_path),

        Commands::Serve { port, input } => {
            let config = Arc::new(DepartmentConfig::resolve(config_path)?);
            retention::server::start_server(port, config, input).await
        }
    }
}

fn load(input: &Path, config_path: Option<&Path>) -> Result<Snapshot, Box<dyn std::error::Error>> {
    let config = Arc::new(DepartmentConfig::resolve(config_path)?);
    Ok(load_csv(input, config)?)
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;
    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}' (auto-detected)", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    write_json(&result.records, output)
}

fn cmd_normalize(
    input: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = DepartmentConfig::resolve(config_path)?;
    let parsed = parse_csv_file_auto(input)?;
    let records = Normalizer::new(&config).normalize(&parsed.records)?;
    eprintln!("✅ Normalized {} records with config \"{}\"", records.len(), config.name);

    write_json(&records, output)
}

fn cmd_aggregate(
    snapshot: &Snapshot,
    subgroup: Subgroup,
    department: Option<String>,
    rule: RuleArg,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rule = match rule {
        RuleArg::Department => OutcomeRule::Department,
        RuleArg::Division => snapshot.division_rule(),
    };
    let mut filter = subgroup.filter();
    if let Some(dept) = department {
        filter = filter.with_department(dept.trim().to_lowercase());
    }

    let table = snapshot.results(&rule, &filter);
    eprintln!("⚙️  {} result rows", table.len());

    match format {
        OutputFormat::Json => write_json(&table, output),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in table.iter() {
                writer.serialize(row)?;
            }
            let bytes = writer.into_inner().map_err(|e| e.into_error())?;
            write_output(&String::from_utf8(bytes)?, output)
        }
    }
}

fn cmd_config(action: ConfigAction, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = DepartmentConfig::resolve(config_path)?;
            println!("{}", config.to_json()?);
        }
        ConfigAction::Validate { file } => {
            let config = DepartmentConfig::load(&file)?;
            eprintln!("✅ {} is valid", file.display());
            eprintln!("   Name: {}", config.name);
            eprintln!("   Majors: {}", config.majors.len());
            eprintln!("   Departments: {}", config.division_departments().len());
            eprintln!("   Corrections: {}", config.corrections.len());
            eprintln!(
                "   Comparison window: {}-{}",
                config.comparison_window.first, config.comparison_window.last
            );
        }
    }
    Ok(())
}

fn print_summary(summary: &views::Summary) {
    eprintln!(
        "   {}-{}: {} students, {:.1}% retained",
        summary.window.first, summary.window.last, summary.total_students, summary.retention_rate
    );
}

fn write_json<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    write_output(&json, output)
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
