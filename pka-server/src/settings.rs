//! Server configuration from flags and environment.

use std::path::PathBuf;

use clap::Parser;

/// Command-line and environment configuration.
///
/// Every flag can also be set through its environment variable; a local
/// `.env` file is loaded before parsing.
#[derive(Debug, Parser)]
#[command(name = "pka-server", about = "Personal knowledge agent server", version)]
pub struct Settings {
    /// Address to bind.
    #[arg(long, env = "PKA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "PKA_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Chat model forwarded to the generation backend.
    #[arg(long, env = "PKA_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// OpenAI API key (also used by the embedding backend).
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Alternate OpenAI-compatible base URL.
    #[arg(long, env = "OPENAI_API_BASE")]
    pub openai_api_base: Option<String>,

    /// Directory of corpus documents; retrieval is disabled when unset.
    #[arg(long, env = "PKA_CORPUS_DIR")]
    pub corpus_dir: Option<PathBuf>,

    /// Where the built vector index is persisted and reloaded from.
    #[arg(long, env = "PKA_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Chunk size in characters.
    #[arg(long, env = "PKA_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Overlap between adjacent chunks, in characters.
    #[arg(long, env = "PKA_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Context passages retrieved per turn.
    #[arg(long, env = "PKA_TOP_K", default_value_t = 3)]
    pub top_k: usize,

    /// Embedding model name.
    #[arg(long, env = "PKA_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_only_an_api_key() {
        let settings =
            Settings::try_parse_from(["pka-server", "--openai-api-key", "sk-test"]).unwrap();
        assert_eq!(settings.bind_addr(), "127.0.0.1:8000");
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.chunk_overlap, 200);
        assert_eq!(settings.top_k, 3);
        assert!(settings.corpus_dir.is_none());
    }
}
