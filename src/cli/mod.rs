use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use crate::core::config::AppConfig;
use crate::core::row;
use crate::llm::TogetherGenerator;
use crate::pipeline::{QueryAnswer, QueryPipeline};
use crate::sanitize::{format_mwk, BudgetCorrector};
use crate::session::{PageResult, SessionStore};
use crate::storage::Database;

#[derive(Debug, Parser)]
#[command(
    name = "infraquery",
    version,
    about = "Ask questions about Malawi infrastructure projects"
)]
struct Cli {
    /// Path to the projects SQLite database
    #[arg(long, env = "INFRAQUERY_DB")]
    db: Option<PathBuf>,

    /// Together API key
    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used for SQL generation
    #[arg(long, env = "INFRAQUERY_MODEL")]
    model: Option<String>,

    /// Session idle timeout in seconds
    #[arg(long, default_value_t = 3600)]
    session_ttl: u64,

    /// Results per page
    #[arg(long, default_value_t = 10)]
    page_size: usize,

    /// One-shot question; omit for interactive mode
    question: Option<String>,
}

pub async fn run_cli() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::default();
    config.db_path = cli.db;
    config.llm.api_key = cli.api_key;
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    config.session_ttl_secs = cli.session_ttl;
    config.page_size = cli.page_size;
    config.validate()?;

    let db = Database::open(&config.db_path()).await?;
    db.run_migrations().await?;

    let sessions = Arc::new(
        SessionStore::new(config.session_ttl_secs).with_page_size(config.page_size),
    );
    let pipeline = QueryPipeline::new(
        Arc::new(TogetherGenerator::new(config.llm.clone())?),
        Arc::new(db.executor()),
        Arc::new(BudgetCorrector::with_config(config.budget)),
        sessions.clone(),
    );

    match cli.question {
        Some(question) => {
            let answer = pipeline.ask(&question, None).await?;
            print_answer(&answer);
            Ok(())
        }
        None => repl(pipeline, sessions).await,
    }
}

async fn repl(pipeline: QueryPipeline, sessions: Arc<SessionStore>) -> Result<()> {
    println!("infraquery v{}", env!("CARGO_PKG_VERSION"));
    println!("Ask a question. Type 'next' or 'page N' for more results, Ctrl-D to exit.\n");

    let mut session_id: Option<String> = None;
    let mut current_page = 1usize;

    loop {
        eprint!("? ");
        io::stderr().flush().ok();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                // EOF (Ctrl-D)
                println!();
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        sessions.sweep_expired();

        let page_request = if input.eq_ignore_ascii_case("next") {
            Some(current_page + 1)
        } else if let Some(rest) = input.strip_prefix("page ") {
            rest.trim().parse::<usize>().ok()
        } else {
            None
        };

        if let Some(page) = page_request {
            let Some(id) = session_id.as_deref() else {
                eprintln!("No active session - ask a question first.");
                continue;
            };
            match pipeline.get_page(id, page) {
                Ok(result) => {
                    current_page = page;
                    print_page(&result);
                }
                Err(e) => eprintln!("{e}"),
            }
            continue;
        }

        match pipeline.ask(input, session_id.as_deref()).await {
            Ok(answer) => {
                session_id = Some(answer.session_id.clone());
                current_page = 1;
                print_answer(&answer);
            }
            Err(e) => eprintln!("Query failed: {e}"),
        }
    }

    Ok(())
}

fn print_answer(answer: &QueryAnswer) {
    println!("{}", answer.answer);
    println!("  \x1b[90m{}\x1b[0m", answer.sql_query);
    if let Some(page) = &answer.page {
        print_page(page);
    }
}

fn print_page(page: &PageResult) {
    for entry in &page.results {
        match row::get_str(entry, "projectname") {
            Some(name) => {
                let district = row::get_str(entry, "district").unwrap_or("-");
                match row::get_f64(entry, "budget") {
                    Some(budget) => {
                        println!("  {name} [{district}] {}", format_mwk(budget))
                    }
                    None => println!("  {name} [{district}]"),
                }
            }
            // Aggregate rows have no project name; show them as-is.
            None => println!("  {}", serde_json::to_string(entry).unwrap_or_default()),
        }
    }
    let meta = &page.metadata;
    println!(
        "  page {}/{} ({} results)",
        meta.current_page, meta.total_pages, meta.total_results
    );
    if page.pagination.has_more {
        println!("  type 'next' for more");
    }
}
