use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vaultrag::{
    Config,
    DataDir,
    Indexer,
    LocalVectorIndex,
    OllamaClient,
    RetrievalEngine,
    VaultSource,
    answer,
    cli::{AskArgs, Cli, Command, IndexArgs, SearchArgs},
    error::Result,
    strategy::{Retrieval, Strategy},
    text_util,
    vector_index::Embedder,
    web_search::DuckDuckGoSearch,
};

/// Log filter override, in `EnvFilter` syntax.
const LOG_ENV: &str = "VAULTRAG_LOG";

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config = load_config(&cli, &data_dir)?;
    if !matches!(cli.command, Command::Index(_)) && !data_dir.has_index() {
        tracing::warn!("no index yet; run `vaultrag index` first");
    }
    let app = App::open(&data_dir, config)?;

    match cli.command {
        Command::Index(args) => cmd_index(&app, &args).await?,
        Command::Search(args) => cmd_search(&app, &args).await?,
        Command::Ask(args) => cmd_ask(&app, &args).await?,
        Command::Status(args) => cmd_status(&app, &data_dir, args.json)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

/// File, then environment, then command-line flags.
fn load_config(cli: &Cli, data_dir: &DataDir) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(|| data_dir.config_file());
    let mut config = Config::load(&path)?;
    config.apply_env();
    if let Some(vault) = &cli.vault {
        config.system.vault_path = vault.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Collaborators shared by every command.
struct App {
    config: Config,
    ollama: Arc<OllamaClient>,
    index: Arc<LocalVectorIndex>,
}

impl App {
    fn open(data_dir: &DataDir, config: Config) -> Result<Self> {
        let ollama = Arc::new(OllamaClient::new(
            &config.system.ollama_url,
            &config.system.llm_model,
            &config.system.embed_model,
            config.request_timeout(),
        )?);
        let embedder: Arc<dyn Embedder> = ollama.clone();
        let index =
            Arc::new(LocalVectorIndex::open(&data_dir.vector_db(), embedder)?);
        Ok(Self {
            config,
            ollama,
            index,
        })
    }

    fn engine(
        &self,
        strategy: Option<Strategy>,
        top_k: Option<usize>,
        no_web: bool,
    ) -> Result<RetrievalEngine> {
        let mut settings = self.config.retrieval_settings();
        if let Some(strategy) = strategy {
            settings.strategy = strategy;
        }
        if let Some(k) = top_k {
            settings.top_k = k.max(1);
        }
        settings.web_fallback &= !no_web;

        let web = DuckDuckGoSearch::new(self.config.request_timeout())?;
        Ok(RetrievalEngine::new(
            self.index.clone(),
            self.ollama.clone(),
            Arc::new(web),
            settings,
        ))
    }
}

async fn cmd_index(app: &App, args: &IndexArgs) -> Result<()> {
    let vault = VaultSource::new(&app.config.system.vault_path);
    let indexer = Indexer::new(
        app.index.clone(),
        app.config.chunking()?,
        app.config.system.batch_size,
    )?;

    tracing::info!(vault = %vault.root().display(), "indexing vault");
    let report = if args.rebuild {
        indexer.rebuild(&vault).await?
    } else {
        indexer.reindex(&vault).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_up_to_date() {
        println!(
            "Up to date: {} scanned, {} skipped, {} failed",
            report.scanned, report.skipped, report.failed
        );
    } else {
        println!(
            "Indexed {} new document(s) as {} chunk(s): {} scanned, {} skipped, {} failed",
            report.added,
            report.chunks,
            report.scanned,
            report.skipped,
            report.failed
        );
    }
    if report.orphaned > 0 && !args.json {
        println!(
            "{} stale document(s) remain in the index; run `vaultrag index --rebuild` to drop them",
            report.orphaned
        );
    }
    Ok(())
}

async fn cmd_search(app: &App, args: &SearchArgs) -> Result<()> {
    let engine = app.engine(args.strategy, args.count, args.no_web)?;
    let retrieval = engine.retrieve(&args.query).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&retrieval)?);
    } else {
        print_retrieval(&retrieval, &args.query);
    }
    Ok(())
}

async fn cmd_ask(app: &App, args: &AskArgs) -> Result<()> {
    let engine = app.engine(args.strategy, None, args.no_web)?;
    let retrieval = engine.retrieve(&args.query).await?;
    tracing::info!(
        passages = retrieval.chunks.len(),
        sources = ?answer::source_titles(&retrieval.chunks),
        "generating answer"
    );

    let answer =
        answer::answer(app.ollama.as_ref(), &args.query, retrieval).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("{}", answer.text.trim());
    if !answer.sources.is_empty() {
        println!("\nSources:");
        for source in &answer.sources {
            println!("  - {source}");
        }
    }
    Ok(())
}

fn cmd_status(app: &App, data_dir: &DataDir, json: bool) -> Result<()> {
    let chunks = app.index.db().chunk_count()?;
    let documents = app.index.db().document_count()?;
    let system = &app.config.system;

    if json {
        let status = serde_json::json!({
            "data_dir": data_dir.root(),
            "vault": system.vault_path,
            "ollama_url": system.ollama_url,
            "llm_model": system.llm_model,
            "embed_model": system.embed_model,
            "strategy": app.config.retrieval.strategy,
            "documents": documents,
            "chunks": chunks,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Vault: {}", system.vault_path.display());
        println!(
            "Ollama: {} ({}, {})",
            system.ollama_url, system.llm_model, system.embed_model
        );
        println!("Strategy: {}", app.config.retrieval.strategy);
        println!("Documents: {documents}");
        println!("Chunks: {chunks}");
    }
    Ok(())
}

fn print_retrieval(retrieval: &Retrieval, query: &str) {
    if retrieval.chunks.is_empty() {
        println!("No results found.");
        return;
    }

    for (rank, chunk) in retrieval.chunks.iter().enumerate() {
        println!(
            "{:>3}. {} #{} [{}]",
            rank + 1,
            chunk.title,
            chunk.identity.short(),
            chunk.source
        );
        if let Some(snippet) = text_util::extract_snippet(&chunk.content, query)
        {
            println!("{}", text_util::indent(&snippet, "     "));
        }
    }

    let origin = if retrieval.from_web {
        "web".to_string()
    } else {
        retrieval.strategy.to_string()
    };
    println!("\n{} result(s) via {origin}", retrieval.chunks.len());
}
