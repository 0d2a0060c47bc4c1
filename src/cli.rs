use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "askdoc",
    about = "A hybrid-retrieval question answering CLI for your documents"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the Ollama-compatible model server
    #[arg(long, global = true, default_value = "http://localhost:11434")]
    pub ollama_url: String,

    /// Embedding model name
    #[arg(long, global = true, default_value = "nomic-embed-text")]
    pub embed_model: String,

    /// Generation model name
    #[arg(long, global = true, default_value = "deepseek-llm")]
    pub gen_model: String,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index a directory of documents into a new corpus version
    Index(IndexArgs),
    /// Ask a question (interactive session when no question is given)
    Ask(AskArgs),
    /// Run hybrid retrieval only and print the fused ranking
    Search(SearchArgs),
    /// Show the active corpus version and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Directory containing the documents to index
    pub path: PathBuf,

    /// Maximum passage size in characters
    #[arg(long, default_value = "1000")]
    pub chunk_size: usize,

    /// Overlap between adjacent passages in characters
    #[arg(long, default_value = "200")]
    pub overlap: usize,
}

// -- Shared retrieval flags --

#[derive(Debug, Parser)]
pub struct RetrievalArgs {
    /// Number of passages to retrieve
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Fusion weight for the lexical (BM25) source
    #[arg(long, default_value = "0.5")]
    pub lexical_weight: f32,

    /// Fusion weight for the dense (embedding) source
    #[arg(long, default_value = "0.5")]
    pub dense_weight: f32,

    /// Fusion strategy: 'rrf' (rank-based) or 'score'
    #[arg(long, default_value = "rrf")]
    pub fusion: String,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question to answer; omit to start an interactive session
    pub question: Option<String>,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "askdoc",
            &mut std::io::stdout(),
        );
    }
}
