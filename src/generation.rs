//! Generation service client.
//!
//! The language model is an opaque external service reached over HTTP
//! (Ollama-compatible, NDJSON streaming). Generation produces a lazy,
//! finite, non-restartable sequence of text fragments; dropping the
//! iterator closes the underlying connection, which is how cancellation
//! stops the remote call. Service failures surface as
//! [`Error::GenerationUnavailable`].

use std::{
    io::{BufRead, BufReader},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A lazy stream of answer fragments from the generation service.
pub type FragmentStream = Box<dyn Iterator<Item = Result<String>> + Send>;

/// An external text-generation service.
pub trait GenerationClient: Send + Sync {
    /// Start generating from a fully assembled prompt.
    fn generate(&self, prompt: &str) -> Result<FragmentStream>;

    /// Name of the generation model.
    fn model(&self) -> &str;
}

/// Configuration for the Ollama-compatible generation endpoint.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "deepseek-llm".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Blocking HTTP client for Ollama's streaming `/api/generate` endpoint.
pub struct OllamaGenerationClient {
    client: reqwest::blocking::Client,
    config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

impl OllamaGenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::Config(format!("could not build HTTP client: {e}"))
            })?;
        Ok(Self { client, config })
    }
}

impl GenerationClient for OllamaGenerationClient {
    fn generate(&self, prompt: &str) -> Result<FragmentStream> {
        let url = format!(
            "{}/api/generate",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.config.model,
                prompt,
                stream: true,
            })
            .send()
            .map_err(|e| Error::GenerationUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::GenerationUnavailable(format!(
                "{url} returned {status}: {body}"
            )));
        }

        Ok(Box::new(NdjsonFragments {
            lines: BufReader::new(response).lines(),
            finished: false,
        }))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OllamaGenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaGenerationClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Iterator over NDJSON `{response, done}` lines from the service.
struct NdjsonFragments<R: BufRead> {
    lines: std::io::Lines<R>,
    finished: bool,
}

impl<R: BufRead> Iterator for NdjsonFragments<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(Error::GenerationUnavailable(format!(
                        "stream interrupted: {e}"
                    ))));
                }
                None => {
                    self.finished = true;
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let chunk: GenerateChunk = match serde_json::from_str(&line) {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(Error::GenerationUnavailable(format!(
                        "unreadable stream line: {e}"
                    ))));
                }
            };
            if chunk.done {
                self.finished = true;
                if chunk.response.is_empty() {
                    return None;
                }
            }
            if chunk.response.is_empty() {
                continue;
            }
            return Some(Ok(chunk.response));
        }
    }
}


#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn fragments_from(ndjson: &str) -> Vec<Result<String>> {
        NdjsonFragments {
            lines: BufReader::new(Cursor::new(ndjson.to_string())).lines(),
            finished: false,
        }
        .collect()
    }

    #[test]
    fn parses_streamed_fragments() {
        let ndjson = concat!(
            "{\"response\":\"Hello\",\"done\":false}\n",
            "{\"response\":\" world\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        );
        let fragments = fragments_from(ndjson);
        let texts: Vec<String> =
            fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(texts, vec!["Hello", " world"]);
    }

    #[test]
    fn final_chunk_with_text_is_yielded() {
        let ndjson = "{\"response\":\"tail\",\"done\":true}\n";
        let fragments = fragments_from(ndjson);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "tail");
    }

    #[test]
    fn skips_blank_lines() {
        let ndjson = concat!(
            "{\"response\":\"a\",\"done\":false}\n",
            "\n",
            "{\"response\":\"b\",\"done\":true}\n",
        );
        let texts: Vec<String> = fragments_from(ndjson)
            .into_iter()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn malformed_line_is_generation_unavailable() {
        let ndjson = concat!(
            "{\"response\":\"ok\",\"done\":false}\n",
            "not json at all\n",
            "{\"response\":\"never seen\",\"done\":false}\n",
        );
        let fragments = fragments_from(ndjson);
        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].is_ok());
        assert!(matches!(
            fragments[1].as_ref().unwrap_err(),
            Error::GenerationUnavailable(_)
        ));
    }

    #[test]
    fn nothing_after_done() {
        let ndjson = concat!(
            "{\"response\":\"a\",\"done\":true}\n",
            "{\"response\":\"ghost\",\"done\":false}\n",
        );
        let texts: Vec<String> = fragments_from(ndjson)
            .into_iter()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(texts, vec!["a"]);
    }

    #[test]
    fn unreachable_server_is_generation_unavailable() {
        let client = OllamaGenerationClient::new(GenerationConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            model: "m".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        assert!(matches!(
            client.generate("hello"),
            Err(Error::GenerationUnavailable(_))
        ));
    }
}
