//! CLI entry point for `inboxrules`.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::UnicodeWidthChar;

use inboxrules::config::{self, Config};
use inboxrules::ingest::{self, IngestReport};
use inboxrules::mailbox::{DryRunMailbox, LocalMailbox};
use inboxrules::model::EmailRecord;
use inboxrules::rules::{
    ActionKind, AgeSpec, CollectingSink, Combinator, ConditionValue, Diagnostic, DiagnosticSink,
    Field, FileRuleSource, Predicate, Rule, RuleEngine, Severity, TracingSink,
};
use inboxrules::store::{FileStore, RecordStore};

#[derive(Parser)]
#[command(
    name = "inboxrules",
    version,
    about = "Apply declarative triage rules to a mailbox"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: $INBOXRULES_CONFIG or the platform config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest MBOX files, .eml files or directories into the record store
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        limits: IngestArgs,
    },
    /// Apply the rules to every stored record
    Process {
        #[command(flatten)]
        rules: ProcessArgs,
    },
    /// Ingest, then process
    Run {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[command(flatten)]
        limits: IngestArgs,
        #[command(flatten)]
        rules: ProcessArgs,
    },
    /// Inspect rule documents
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// List stored records
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show the mailbox labels, or create one
    Labels {
        #[arg(long, value_name = "NAME")]
        add: Option<String>,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(clap::Args)]
struct IngestArgs {
    /// Maximum number of messages to ingest (0 = unlimited)
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
    /// Only ingest messages carrying this label
    #[arg(long, value_name = "NAME")]
    label: Option<String>,
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Rule document (default: `[rules] file` from the config)
    #[arg(long, value_name = "FILE")]
    rules: Option<PathBuf>,
    /// Print the actions rules would take without changing the mailbox
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Load a rule document and summarize it
    Check { file: Option<PathBuf> },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Ingest { paths, limits } => cmd_ingest(&config, &paths, &limits),
        Commands::Process { rules } => cmd_process(&config, &rules),
        Commands::Run {
            paths,
            limits,
            rules,
        } => {
            cmd_ingest(&config, &paths, &limits)?;
            cmd_process(&config, &rules)
        }
        Commands::Rules {
            command: RulesCommand::Check { file },
        } => cmd_rules_check(&config, file.as_deref()),
        Commands::List { json } => cmd_list(&config, json),
        Commands::Labels { add } => cmd_labels(&config, add.as_deref()),
        Commands::Config {
            command: ConfigCommand::Init { force },
        } => cmd_config_init(cli.config.as_deref(), force),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_file = config::log_file_path(config);
    let log_dir = log_file.parent().map(Path::to_path_buf).unwrap_or_default();
    let log_name = log_file.file_name().unwrap_or_default();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, log_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Forwards diagnostics to the log and keeps a tally for the summary.
#[derive(Default)]
struct CountingSink {
    warnings: Cell<usize>,
    errors: Cell<usize>,
}

impl DiagnosticSink for CountingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let counter = match diagnostic.severity() {
            Severity::Warning => &self.warnings,
            Severity::Error => &self.errors,
        };
        counter.set(counter.get() + 1);
        TracingSink.emit(diagnostic);
    }
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "inboxrules", &mut std::io::stdout());
    Ok(())
}

fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn cmd_config_init(explicit: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config::config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?,
    };
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }
    config::save_config(&Config::default(), &path)?;
    println!("  Wrote {}", path.display());
    Ok(())
}

/// Parse the inputs, upsert into the store and seed the mailbox.
fn cmd_ingest(config: &Config, paths: &[PathBuf], limits: &IngestArgs) -> anyhow::Result<()> {
    for path in paths {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }

    let mut options = config.ingest.to_options();
    if let Some(limit) = limits.limit {
        options.max_messages = limit;
    }
    if let Some(ref label) = limits.label {
        options.label_filter = Some(label.clone());
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Reading [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let report = ingest::ingest_paths(
        paths,
        &options,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let mut store = FileStore::open(config::store_path(config))?;
    let summary = store.upsert(report.records.clone())?;

    let mut mailbox = LocalMailbox::open(config::mailbox_path(config))?;
    let seeded = report
        .records
        .iter()
        .filter(|r| mailbox.register(r))
        .count();
    mailbox.save()?;

    print_ingest_summary(&report, summary.inserted, summary.updated, seeded, &store, elapsed);
    Ok(())
}

fn print_ingest_summary(
    report: &IngestReport,
    inserted: usize,
    updated: usize,
    seeded: usize,
    store: &FileStore,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Messages read", report.records.len());
    if report.filtered > 0 {
        println!("  {:<20} {}", "Filtered out", report.filtered);
    }
    if report.unparseable > 0 {
        println!("  {:<20} {}", "Unparseable", report.unparseable);
    }
    println!("  {:<20} {}", "New records", inserted);
    println!("  {:<20} {}", "Updated records", updated);
    println!("  {:<20} {}", "New in mailbox", seeded);
    println!(
        "  {:<20} {} ({})",
        "Store",
        store.path().display(),
        format_size(store.file_size(), BINARY)
    );
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);
    println!();
}

fn cmd_process(config: &Config, args: &ProcessArgs) -> anyhow::Result<()> {
    let store = FileStore::open(config::store_path(config))?;
    let records = store.fetch_all()?;

    let rules_file = args
        .rules
        .clone()
        .unwrap_or_else(|| config::rules_path(config));
    let sink = CountingSink::default();
    let engine = RuleEngine::load(&FileRuleSource::new(&rules_file), &sink);

    if args.dry_run {
        let mut mail = DryRunMailbox::new();
        engine.process(&records, &mut mail, &sink);
        print_plan(&records, &mail);
    } else {
        let mut mail = LocalMailbox::open(config::mailbox_path(config))?;
        for record in &records {
            mail.register(record);
        }
        engine.process(&records, &mut mail, &sink);
        mail.save()?;
    }

    println!();
    println!("  {:<20} {}", "Records", records.len());
    println!("  {:<20} {}", "Rules", engine.len());
    println!("  {:<20} {}", "Warnings", sink.warnings.get());
    println!("  {:<20} {}", "Errors", sink.errors.get());
    println!();
    Ok(())
}

fn print_plan(records: &[EmailRecord], mail: &DryRunMailbox) {
    let subjects: HashMap<&str, &str> = records
        .iter()
        .map(|r| (r.id.as_str(), r.subject_display()))
        .collect();

    println!();
    if mail.planned().is_empty() {
        println!("  No actions would be taken.");
        return;
    }
    let mut last_id = "";
    for action in mail.planned() {
        if action.id() != last_id {
            last_id = action.id();
            let subject = subjects.get(last_id).copied().unwrap_or("");
            println!("  {} {}", last_id, truncate_to_width(subject, 60));
        }
        println!("      {action}");
    }
}

fn cmd_rules_check(config: &Config, file: Option<&Path>) -> anyhow::Result<()> {
    let path = file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config::rules_path(config));
    let sink = CollectingSink::new();
    let engine = RuleEngine::load(&FileRuleSource::new(&path), &sink);

    println!();
    println!("  {:<20} {}", "Rule document", path.display());
    println!("  {:<20} {}", "Rules", engine.len());
    println!();

    let mut unknown = 0usize;
    for (i, rule) in engine.rules().iter().enumerate() {
        print_rule(i + 1, rule);
        for problem in unrecognized_names(rule) {
            println!("       warning: {problem}");
            unknown += 1;
        }
    }

    for diagnostic in sink.diagnostics() {
        println!("  error: {diagnostic}");
    }

    if sink.count(Severity::Error) > 0 {
        anyhow::bail!("Rule document failed to load: {}", path.display());
    }
    if unknown > 0 {
        println!();
        println!("  {unknown} unrecognized name(s); those parts never match or run.");
    }
    println!();
    Ok(())
}

fn print_rule(number: usize, rule: &Rule) {
    println!(
        "  {:>3}. {} ({} of {} condition(s))",
        number,
        rule.description,
        rule.combinator.label(),
        rule.conditions.len()
    );
    for condition in &rule.conditions {
        println!(
            "       if {} {} {}",
            condition.field.label(),
            condition.predicate.label(),
            describe_value(&condition.value)
        );
    }
    for action in &rule.actions {
        match action.target.as_deref() {
            Some(target) => println!("       then {} -> {}", action.kind.label(), target),
            None => println!("       then {}", action.kind.label()),
        }
    }
}

/// Names the engine will report at run time, found up front.
fn unrecognized_names(rule: &Rule) -> Vec<String> {
    let mut problems = Vec::new();
    if let Combinator::Unrecognized(name) = &rule.combinator {
        problems.push(format!("unknown overall predicate '{name}'"));
    }
    for condition in &rule.conditions {
        if let Field::Unrecognized(name) = &condition.field {
            problems.push(format!("unknown field '{name}'"));
        }
        if let Predicate::Unrecognized(name) = &condition.predicate {
            problems.push(format!("unknown predicate '{name}'"));
        }
    }
    for action in &rule.actions {
        if let ActionKind::Unrecognized(name) = &action.kind {
            problems.push(format!("unknown action type '{name}'"));
        }
    }
    problems
}

fn describe_value(value: &ConditionValue) -> String {
    match value {
        ConditionValue::Text(s) => format!("{s:?}"),
        ConditionValue::Age(AgeSpec::Days(d)) => format!("{d} day(s)"),
        ConditionValue::Age(AgeSpec::Months(m)) => format!("{m} month(s)"),
        ConditionValue::Null => "null".to_string(),
        ConditionValue::Other(v) => v.to_string(),
    }
}

fn cmd_list(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = FileStore::open(config::store_path(config))?;
    let records = store.fetch_all()?;

    if json {
        let output = serde_json::json!({
            "record_count": records.len(),
            "records": records,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  {} record(s)", records.len());
    println!();
    if records.is_empty() {
        return Ok(());
    }

    println!(
        "  {:<4} {:<16} {:<28} {:<44} {}",
        "#", "Date", "From", "Subject", "Labels"
    );
    println!("  {}", "-".repeat(110));
    for (i, record) in records.iter().enumerate() {
        let date = record
            .received_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {:<4} {:<16} {} {} {}",
            i + 1,
            date,
            pad_to_width(record.sender_display(), 28),
            pad_to_width(record.subject_display(), 44),
            record.labels.join(", ")
        );
    }
    println!();
    Ok(())
}

fn cmd_labels(config: &Config, add: Option<&str>) -> anyhow::Result<()> {
    let mut mailbox = LocalMailbox::open(config::mailbox_path(config))?;

    if let Some(name) = add {
        let id = mailbox.create_label(name);
        mailbox.save()?;
        println!("  {name} ({id})");
        return Ok(());
    }

    println!();
    println!("  {:<20} {:<24} {:>8}", "Id", "Name", "Messages");
    println!("  {}", "-".repeat(54));
    for (label, count) in mailbox.label_counts() {
        println!(
            "  {:<20} {} {:>8}",
            label.id,
            pad_to_width(&label.name, 24),
            count
        );
    }
    println!();
    Ok(())
}

/// Cut `s` to at most `width` terminal columns.
fn truncate_to_width(s: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Truncate then pad with spaces to exactly `width` columns.
fn pad_to_width(s: &str, width: usize) -> String {
    let mut out = truncate_to_width(s, width);
    let used: usize = out.chars().map(|c| c.width().unwrap_or(0)).sum();
    out.extend(std::iter::repeat(' ').take(width - used));
    out
}
