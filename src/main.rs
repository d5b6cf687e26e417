//! CLI entry point for `mailtrail`.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use mailtrail::backend::{embedder_from_config, generator_from_config};
use mailtrail::config::{self, Config};
use mailtrail::error::TrailError;
use mailtrail::eval;
use mailtrail::index::{index_paths, IndexOptions};
use mailtrail::parser::{self, ParseMode, SplitStrategy, ThreadSplitter};
use mailtrail::query::{self, Answer, RetrievalOptions, SearchKind};
use mailtrail::session::Session;
use mailtrail::store::summary::{thread_summaries, top_senders};
use mailtrail::store::{DocumentStore, FileStore};

#[derive(Parser)]
#[command(name = "mailtrail", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Document store directory (overrides the configured one)
    #[arg(long, global = true, value_name = "DIR", env = "MAILTRAIL_STORE")]
    store: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a plain-text email and print it in canonical form
    Parse {
        path: PathBuf,
        /// Reject header lines without a colon
        #[arg(long)]
        strict: bool,
        /// Print the body with its quote trail reordered, latest reply first
        #[arg(long)]
        reorder: bool,
        #[arg(long)]
        json: bool,
    },
    /// Split a multi-message thread export into one file per message
    Split {
        path: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        /// Drop segments shorter than this many characters
        #[arg(long, value_name = "CHARS")]
        min_len: Option<usize>,
    },
    /// Convert a Gmail "print all" export into one file per message
    Gmail {
        path: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Index email files or directories into the document store
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Thread label attached to every indexed document
        #[arg(short, long)]
        thread: Option<String>,
        /// Treat each file as a multi-message blob and split it first
        #[arg(long)]
        split: bool,
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
        #[arg(long, value_name = "CHARS")]
        min_len: Option<usize>,
        #[arg(long)]
        strict: bool,
        /// Keep quote trails in their original order
        #[arg(long)]
        no_reorder: bool,
    },
    /// Answer a question from the indexed emails
    Ask {
        question: String,
        /// Restrict retrieval to one thread ("All Threads" searches everything)
        #[arg(short, long)]
        thread: Option<String>,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long, value_enum)]
        search: Option<SearchArg>,
        /// Print the retrieved context without calling the generator
        #[arg(long)]
        context_only: bool,
        #[arg(long)]
        json: bool,
    },
    /// Ask questions interactively, paying one credit per question
    Chat {
        #[arg(short, long)]
        thread: Option<String>,
    },
    /// List indexed threads with document counts and date ranges
    Threads {
        /// Number of top senders to show
        #[arg(long, default_value_t = 10)]
        senders: usize,
        #[arg(long)]
        json: bool,
    },
    /// Score answers against a JSON file of expected answers
    Eval {
        cases: PathBuf,
        #[arg(short, long)]
        thread: Option<String>,
        /// Skip the hallucination ratio
        #[arg(long)]
        no_hallucination: bool,
        #[arg(long, value_name = "FILE")]
        json_log: Option<PathBuf>,
        #[arg(long, value_name = "FILE")]
        csv_log: Option<PathBuf>,
        /// Print the per-case records as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the effective configuration as TOML
    Config {
        /// Write it to the config file
        #[arg(long)]
        init: bool,
        /// Overwrite an existing config file
        #[arg(long, requires = "init")]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Header,
    Separator,
}

impl From<StrategyArg> for SplitStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Header => SplitStrategy::HeaderAnchored,
            StrategyArg::Separator => SplitStrategy::SeparatorAnchored,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchArg {
    Mmr,
    Similarity,
}

impl From<SearchArg> for SearchKind {
    fn from(arg: SearchArg) -> Self {
        match arg {
            SearchArg::Mmr => SearchKind::Mmr,
            SearchArg::Similarity => SearchKind::Similarity,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();
    if let Some(dir) = cli.store {
        config.store.path = Some(dir);
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Parse {
            path,
            strict,
            reorder,
            json,
        } => cmd_parse(&path, strict, reorder, json, &config),
        Commands::Split {
            path,
            output,
            strategy,
            min_len,
        } => cmd_split(&path, &output, splitter_for(&config, strategy, min_len), &config),
        Commands::Gmail { path, output } => cmd_gmail(&path, &output),
        Commands::Index {
            paths,
            thread,
            split,
            strategy,
            min_len,
            strict,
            no_reorder,
        } => {
            let options = IndexOptions {
                reorder_marker: (config.parser.reorder_trails && !no_reorder)
                    .then(|| config.parser.trail_marker.clone()),
                parse_mode: parse_mode(strict || config.parser.strict),
                split: split.then(|| splitter_for(&config, strategy, min_len)),
                label_max_len: config.splitter.label_max_len,
            };
            cmd_index(&paths, thread.as_deref(), &options, &config)
        }
        Commands::Ask {
            question,
            thread,
            top_k,
            search,
            context_only,
            json,
        } => {
            let mut options = RetrievalOptions::from(&config.retrieval);
            if let Some(k) = top_k {
                options.top_k = k.max(1);
            }
            if let Some(search) = search {
                options.search = search.into();
            }
            cmd_ask(
                &question,
                query::thread_scope(thread.as_deref()),
                &options,
                context_only,
                json,
                &config,
            )
        }
        Commands::Chat { thread } => cmd_chat(query::thread_scope(thread.as_deref()), &config),
        Commands::Threads { senders, json } => cmd_threads(senders, json, &config),
        Commands::Eval {
            cases,
            thread,
            no_hallucination,
            json_log,
            csv_log,
            json,
        } => {
            let json_log = json_log.unwrap_or_else(|| config.evaluation.json_log.clone());
            let csv_log = csv_log.unwrap_or_else(|| config.evaluation.csv_log.clone());
            cmd_eval(
                &cases,
                query::thread_scope(thread.as_deref()),
                config.evaluation.hallucination && !no_hallucination,
                &json_log,
                &csv_log,
                json,
                &config,
            )
        }
        Commands::Config { init, force } => cmd_config(init, force, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and a log file in the data directory.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mailtrail.log".into());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
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

fn parse_mode(strict: bool) -> ParseMode {
    if strict {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    }
}

fn splitter_for(
    config: &Config,
    strategy: Option<StrategyArg>,
    min_len: Option<usize>,
) -> ThreadSplitter {
    ThreadSplitter::new(
        strategy.map_or(config.splitter.strategy, Into::into),
        min_len.unwrap_or(config.splitter.min_segment_len),
    )
}

fn open_store(config: &Config) -> anyhow::Result<FileStore> {
    let dir = config::store_dir(config);
    let embedder = embedder_from_config(&config.backend);
    FileStore::open(&dir, embedder, config.store.query_cache_size)
        .with_context(|| format!("opening document store in {}", dir.display()))
}

fn progress_bar(len: u64, verb: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {verb} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})"
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parser::header::decode_text_bytes(&bytes))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "thread".to_string())
}

/// Write `(file name, contents)` pairs into `dir`, creating it.
fn write_outputs(dir: &Path, files: &[(String, String)]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (name, contents) in files {
        let path = dir.join(name);
        std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Parse one email file and print it.
fn cmd_parse(
    path: &Path,
    strict: bool,
    reorder: bool,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let record = parser::load_email_file(path, parse_mode(strict || config.parser.strict))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else if reorder {
        println!(
            "{}",
            parser::reorder(&record.body_text(), &config.parser.trail_marker)
        );
    } else {
        print!("{}", record.to_text());
    }
    Ok(())
}

/// Split a thread blob and write one file per segment.
fn cmd_split(
    path: &Path,
    output: &Path,
    splitter: ThreadSplitter,
    config: &Config,
) -> anyhow::Result<()> {
    let blob = read_text(path)?;
    let base = file_stem(path);
    let records = mailtrail::index::pipeline::segment_records(
        &blob,
        &base,
        &splitter,
        config.splitter.label_max_len,
    );

    let files: Vec<(String, String)> = records
        .iter()
        .map(|r| (r.source_identifier().to_string(), r.to_text()))
        .collect();
    write_outputs(output, &files)?;

    println!(
        "  Wrote {} segment(s) from {} to {}",
        files.len(),
        path.display(),
        output.display()
    );
    Ok(())
}

/// Convert a Gmail print export into `email_NNN.txt` files.
fn cmd_gmail(path: &Path, output: &Path) -> anyhow::Result<()> {
    let text = read_text(path)?;
    let records = parser::parse_gmail_export(&text);
    if records.is_empty() {
        println!("  No messages found in {}", path.display());
        return Ok(());
    }

    let files: Vec<(String, String)> = records
        .iter()
        .map(|r| (r.source_identifier().to_string(), r.to_text()))
        .collect();
    write_outputs(output, &files)?;
    println!(
        "  Extracted {} message(s) to {}",
        files.len(),
        output.display()
    );
    Ok(())
}

/// Index files into the store and print a summary.
fn cmd_index(
    paths: &[PathBuf],
    thread: Option<&str>,
    options: &IndexOptions,
    config: &Config,
) -> anyhow::Result<()> {
    for path in paths {
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
    }

    let mut store = open_store(config)?;
    let before = store.len();
    let pb = progress_bar(0, "Indexing");
    let start = Instant::now();

    let result = index_paths(
        &mut store,
        paths,
        thread,
        options,
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;
    pb.finish_and_clear();

    use humansize::{format_size, BINARY};
    println!();
    println!("  {:<20} {}", "Indexed", result.count);
    println!("  {:<20} {}", "Failed", result.errors.len());
    println!("  {:<20} {}", "Store documents", store.len());
    println!("  {:<20} {}", "Previously stored", before);
    println!("  {:<20} {}", "Thread", thread.unwrap_or("-"));
    println!("  {:<20} {}", "Embedding model", store.model_name());
    println!(
        "  {:<20} {}",
        "Store size",
        format_size(store.file_size(), BINARY)
    );
    println!("  {:<20} {:.2?}", "Elapsed", start.elapsed());
    if !result.errors.is_empty() {
        println!();
        for failure in &result.errors {
            println!("    {}: {}", failure.source_id, failure.error);
        }
    }
    println!();
    Ok(())
}

/// Answer one question.
fn cmd_ask(
    question: &str,
    thread: Option<&str>,
    options: &RetrievalOptions,
    context_only: bool,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let mut store = open_store(config)?;

    if context_only {
        let retrieved = query::retrieve(&mut store, question, thread, options)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&retrieved)?);
        } else if retrieved.is_empty() {
            println!("No relevant documents found.");
        } else {
            println!("{}", query::build_context(&retrieved));
        }
        return Ok(());
    }

    let generator = generator_from_config(&config.backend)?;
    let answer = query::answer(&mut store, generator.as_ref(), question, thread, options)?;

    if json {
        let value = match &answer {
            Answer::Grounded {
                text, retrieved, ..
            } => serde_json::json!({
                "question": question,
                "thread": thread,
                "answer": text,
                "sources": retrieved.iter().map(|d| &d.metadata).collect::<Vec<_>>(),
            }),
            Answer::NoRelevantDocuments => serde_json::json!({
                "question": question,
                "thread": thread,
                "answer": null,
                "sources": [],
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_answer(&answer);
    Ok(())
}

fn print_answer(answer: &Answer) {
    match answer {
        Answer::Grounded {
            text, retrieved, ..
        } => {
            println!();
            println!("{}", text.trim());
            println!();
            println!("  Sources:");
            for doc in retrieved {
                println!(
                    "    {:<40} {}",
                    doc.metadata.source,
                    doc.metadata.subject.as_deref().unwrap_or("No Subject")
                );
            }
            println!();
        }
        Answer::NoRelevantDocuments => println!("No relevant documents found."),
    }
}

/// Interactive question loop with per-session credits.
fn cmd_chat(thread: Option<&str>, config: &Config) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let generator = generator_from_config(&config.backend)?;
    let options = RetrievalOptions::from(&config.retrieval);
    let costs = &config.session;
    let mut session = Session::new(costs.initial_credits);

    println!(
        "  {} document(s), thread: {}. Commands: :credits, :topup, :quit",
        store.len(),
        thread.unwrap_or(query::ALL_THREADS)
    );

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("[{} credits] > ", session.credits());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        match input {
            "" => continue,
            ":quit" | ":q" => break,
            ":credits" => {
                println!("  {} credit(s) left", session.credits());
                continue;
            }
            ":topup" => {
                let balance = session.top_up(costs.top_up);
                println!("  Added {} credit(s), balance {balance}", costs.top_up);
                continue;
            }
            _ => {}
        }

        match session.spend(costs.query_cost) {
            Ok(()) => {}
            Err(TrailError::InsufficientCredits { needed, available }) => {
                println!("  Not enough credits ({available} left, {needed} needed). Use :topup.");
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        match query::answer(&mut store, generator.as_ref(), input, thread, &options) {
            Ok(answer) => print_answer(&answer),
            Err(e) => {
                tracing::warn!(error = %e, "Question failed");
                println!("  Error: {e}");
            }
        }
    }

    println!("  {} question(s) asked", session.queries());
    Ok(())
}

/// Show per-thread statistics for the store.
fn cmd_threads(senders: usize, json: bool, config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let documents = store.documents();
    let summaries = thread_summaries(documents.iter().copied());
    let top = top_senders(documents.iter().copied(), senders);

    if json {
        let value = serde_json::json!({
            "store": store.path().map(|p| p.to_string_lossy().into_owned()),
            "store_size": store.file_size(),
            "embedding_model": store.model_name(),
            "dimension": store.dimension(),
            "document_count": store.len(),
            "threads": summaries,
            "top_senders": top.iter().map(|(sender, count)| serde_json::json!({
                "sender": sender,
                "count": count,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    use humansize::{format_size, BINARY};
    println!();
    if let Some(path) = store.path() {
        println!("  {:<20} {}", "Store", path.display());
    }
    println!(
        "  {:<20} {}",
        "Store size",
        format_size(store.file_size(), BINARY)
    );
    println!("  {:<20} {}", "Embedding model", store.model_name());
    println!("  {:<20} {}", "Documents", store.len());

    if !summaries.is_empty() {
        println!();
        println!("  {:<40} {:>6}  {:<10}  {:<10}", "Thread", "Docs", "Oldest", "Newest");
        println!("  {}", "-".repeat(72));
        for s in &summaries {
            let name: String = s.name.chars().take(39).collect();
            let fmt = |d: Option<chrono::DateTime<chrono::Utc>>| {
                d.map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string())
            };
            println!(
                "  {:<40} {:>6}  {:<10}  {:<10}",
                name,
                s.documents,
                fmt(s.oldest),
                fmt(s.newest)
            );
        }
    }

    if !top.is_empty() {
        println!();
        println!("  Top senders:");
        for (sender, count) in &top {
            println!("    {count:>6}  {sender}");
        }
    }
    println!();
    Ok(())
}

/// Run an evaluation batch, log it and print the scores.
fn cmd_eval(
    cases_path: &Path,
    thread: Option<&str>,
    with_hallucination: bool,
    json_log: &Path,
    csv_log: &Path,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let cases = eval::load_cases(cases_path)?;
    if cases.is_empty() {
        println!("  No test cases in {}", cases_path.display());
        return Ok(());
    }

    let mut store = open_store(config)?;
    let generator = generator_from_config(&config.backend)?;
    let options = RetrievalOptions::from(&config.retrieval);

    let pb = progress_bar(cases.len() as u64, "Evaluating");
    let records = eval::evaluate(
        &mut store,
        generator.as_ref(),
        &cases,
        thread,
        &options,
        with_hallucination,
        Some(&|current: u64, _total: u64| pb.set_position(current)),
    )?;
    pb.finish_and_clear();

    // Both logs are attempted before either error is reported.
    let json_logged = eval::append_json_log(json_log, &records);
    let csv_logged = eval::append_csv_log(csv_log, &records);
    if let (Err(e), Err(_)) = (&json_logged, &csv_logged) {
        tracing::error!(error = %e, "Could not write JSON log");
    }
    json_logged.and(csv_logged)?;
    let summary = eval::summarize(&records);

    if json {
        let value = serde_json::json!({
            "summary": summary,
            "records": records,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {:<50} {:>5} {:>6}", "Question", "EM", "F1");
    println!("  {}", "-".repeat(63));
    for r in &records {
        let q: String = r.question.chars().take(49).collect();
        println!(
            "  {:<50} {:>5} {:>6.2}",
            q,
            if r.exact_match { "yes" } else { "no" },
            r.f1_score
        );
    }
    println!();
    println!("  {:<20} {}", "Cases", summary.cases);
    println!(
        "  {:<20} {:.1}%",
        "Exact match",
        summary.exact_match_rate * 100.0
    );
    println!("  {:<20} {:.2}", "Mean F1", summary.mean_f1);
    if let Some(h) = summary.mean_hallucination {
        println!("  {:<20} {:.2}", "Grounded sentences", h);
    }
    println!("  {:<20} {}", "JSON log", json_log.display());
    println!("  {:<20} {}", "CSV log", csv_log.display());
    println!();
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailtrail", &mut std::io::stdout());
    Ok(())
}

/// Print the effective configuration, or write it to the config file.
fn cmd_config(init: bool, force: bool, config: &Config) -> anyhow::Result<()> {
    if !init {
        print!("{}", toml::to_string_pretty(config)?);
        return Ok(());
    }

    if let Some(path) = config::config_file_path().filter(|p| p.exists()) {
        if !force {
            println!("  Config already exists at {} (use --force to overwrite)", path.display());
            return Ok(());
        }
    }
    let path = config::save_config(config)?;
    println!("  Wrote {}", path.display());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
