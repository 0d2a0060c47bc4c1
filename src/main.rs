use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use askdoc::{
    chunking::ChunkingConfig,
    cli::{self, Cli, Command},
    corpus::Corpus,
    data_dir::DataDir,
    embedder::{self, EmbeddingClient, OllamaConfig, OllamaEmbeddingClient},
    engine::{self, QueryEngine, RetrievalOptions},
    error,
    fusion,
    generation::{GenerationClient, GenerationConfig, OllamaGenerationClient},
    loader,
    store::CorpusStore,
    synthesizer::{self, AnswerEvent},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ASKDOC_LOG") {
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

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match &cli.command {
        Command::Index(args) => cmd_index(&cli, args),
        Command::Ask(args) => cmd_ask(&cli, args),
        Command::Search(args) => cmd_search(&cli, args),
        Command::Status(args) => cmd_status(&cli, args.json),
        Command::Completions(args) => {
            args.generate();
            Ok(())
        }
    }
}

fn open_store(cli: &Cli) -> error::Result<CorpusStore> {
    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    CorpusStore::open(data_dir.root())
}

fn embedding_client(cli: &Cli) -> error::Result<OllamaEmbeddingClient> {
    OllamaEmbeddingClient::new(OllamaConfig {
        base_url: cli.ollama_url.clone(),
        model: cli.embed_model.clone(),
        ..OllamaConfig::default()
    })
}

fn generation_client(cli: &Cli) -> error::Result<OllamaGenerationClient> {
    OllamaGenerationClient::new(GenerationConfig {
        base_url: cli.ollama_url.clone(),
        model: cli.gen_model.clone(),
        ..GenerationConfig::default()
    })
}

fn retrieval_options(
    args: &cli::RetrievalArgs,
) -> error::Result<RetrievalOptions> {
    Ok(RetrievalOptions {
        k: args.count,
        lexical_weight: args.lexical_weight,
        dense_weight: args.dense_weight,
        policy: fusion::policy_by_name(&args.fusion)?,
    })
}

fn cmd_index(cli: &Cli, args: &cli::IndexArgs) -> error::Result<()> {
    let store = open_store(cli)?;
    let embedder_client = embedding_client(cli)?;

    eprintln!("Scanning {}...", args.path.display());
    let records = loader::load_directory(&args.path)?;
    eprintln!("  Extracted {} pages", records.len());

    let config = ChunkingConfig {
        chunk_size: args.chunk_size,
        overlap: args.overlap,
    };
    let passages = loader::passages_from_records(&records, &config);
    eprintln!("  Split into {} passages", passages.len());

    eprintln!("Embedding with '{}'...", cli.embed_model);
    let vectors = embedder::embed_passages(&embedder_client, &passages)?;

    let corpus = Corpus::build(passages, vectors, embedder_client.model())?;
    let version = store.publish(&corpus)?;

    eprintln!(
        "Published corpus {version}: {} passages, dimension {}",
        corpus.len(),
        corpus.dimension()
    );
    Ok(())
}

fn cmd_search(cli: &Cli, args: &cli::SearchArgs) -> error::Result<()> {
    let store = open_store(cli)?;
    let corpus = store.load()?;
    let embedder_client = embedding_client(cli)?;
    let engine = QueryEngine::new(&corpus, &embedder_client)?;

    let opts = retrieval_options(&args.retrieval)?;
    let retrieval = engine.retrieve(&args.query, &opts)?;

    for warning in &retrieval.warnings {
        eprintln!("warning: {warning}");
    }

    if args.json {
        print_search_json(&corpus, &retrieval, &args.query)?;
    } else {
        print_search_human(&corpus, &retrieval)?;
    }
    Ok(())
}

fn print_search_human(
    corpus: &Corpus,
    retrieval: &engine::Retrieval,
) -> error::Result<()> {
    if retrieval.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, result) in retrieval.results.iter().enumerate() {
        let passage = corpus.get(result.passage_id)?;
        let name = synthesizer::clean_source_name(&passage.source);
        let location = match passage.page {
            Some(page) => format!("{name} p{page}"),
            None => name,
        };
        println!(
            "{:>3}. [{:.4}] {location} {}",
            i + 1,
            result.fused_score,
            passage.id
        );
        println!("     {}", snippet(&passage.text, 100));
    }
    println!("\n{} result(s)", retrieval.results.len());
    Ok(())
}

fn print_search_json(
    corpus: &Corpus,
    retrieval: &engine::Retrieval,
    query: &str,
) -> error::Result<()> {
    let results: Vec<serde_json::Value> = retrieval
        .results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let passage = corpus.get(result.passage_id)?;
            Ok(serde_json::json!({
                "rank": i + 1,
                "score": result.fused_score,
                "id": passage.id.short(),
                "source": passage.source,
                "page": passage.page,
                "text": passage.text,
            }))
        })
        .collect::<error::Result<_>>()?;

    let output = serde_json::json!({
        "query": query,
        "result_count": results.len(),
        "warnings": retrieval.warnings,
        "results": results,
    });
    println!("{output}");
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= max_chars {
        line
    } else {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

fn cmd_ask(cli: &Cli, args: &cli::AskArgs) -> error::Result<()> {
    let store = open_store(cli)?;
    let corpus = store.load()?;
    let embedder_client = embedding_client(cli)?;
    let generator = generation_client(cli)?;
    let engine = QueryEngine::new(&corpus, &embedder_client)?;
    let opts = retrieval_options(&args.retrieval)?;

    if let Some(ref question) = args.question {
        return answer_question(&engine, &generator, question, &opts);
    }

    // Interactive session: one question per turn, empty input re-prompts,
    // 'exit' or 'quit' ends the session.
    eprintln!("Ask a question ('exit' to quit).");
    let stdin = std::io::stdin();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit")
            || question.eq_ignore_ascii_case("quit")
        {
            break;
        }

        // A failed question reports its error and returns to the prompt.
        if let Err(e) = answer_question(&engine, &generator, question, &opts)
        {
            eprintln!("error: {e}");
        }
    }
    Ok(())
}

fn answer_question(
    engine: &QueryEngine<'_>,
    generator: &dyn GenerationClient,
    question: &str,
    opts: &RetrievalOptions,
) -> error::Result<()> {
    let retrieval = engine.retrieve(question, opts)?;

    for warning in &retrieval.warnings {
        eprintln!("warning: {warning}");
    }
    if retrieval.results.is_empty() {
        println!("No relevant passages found.");
        return Ok(());
    }

    let passages = engine.passages(&retrieval.results)?;
    let stream = synthesizer::synthesize(question, &passages, generator)?;

    let mut stdout = std::io::stdout();
    for event in stream {
        match event {
            AnswerEvent::Token(token) => {
                print!("{token}");
                stdout.flush()?;
            }
            AnswerEvent::Completed { sources } => {
                println!("\n\nSources consulted: {}", sources.join(", "));
            }
            AnswerEvent::Cancelled => {
                println!("\n[cancelled]");
            }
            AnswerEvent::Failed { message } => {
                println!();
                eprintln!("error: {message}");
            }
        }
    }
    Ok(())
}

fn cmd_status(cli: &Cli, json: bool) -> error::Result<()> {
    let store = open_store(cli)?;

    let Some(version) = store.current_version()? else {
        if json {
            println!("{}", serde_json::json!({ "corpus": null }));
        } else {
            println!("No corpus has been indexed yet.");
        }
        return Ok(());
    };

    let corpus = store.load()?;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "corpus": {
                    "version": version,
                    "passages": corpus.len(),
                    "dimension": corpus.dimension(),
                    "embedding_model": corpus.embedding_model(),
                }
            })
        );
    } else {
        println!("Corpus version: {version}");
        println!("Passages: {}", corpus.len());
        println!("Embedding dimension: {}", corpus.dimension());
        println!("Embedding model: {}", corpus.embedding_model());
    }
    Ok(())
}
