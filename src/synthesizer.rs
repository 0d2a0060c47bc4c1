//! Answer synthesis: turning retrieved passages and a question into a
//! streamed, source-cited answer.
//!
//! The synthesizer assembles a single prompt (system instruction, context
//! block, question) and drives the generation service. Its output is an
//! [`AnswerStream`]: a finite, non-restartable sequence of events that can
//! be cancelled between fragments. Partial output already produced is
//! always surfaced, including when the service fails mid-stream.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    error::Result,
    generation::{FragmentStream, GenerationClient},
    passage::Passage,
};

/// One event in a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    /// A fragment of generated answer text.
    Token(String),
    /// Generation finished; carries the deduplicated source list.
    Completed { sources: Vec<String> },
    /// The caller cancelled the stream; no further events follow.
    Cancelled,
    /// The generation service failed mid-stream. Tokens already emitted
    /// remain valid partial output.
    Failed { message: String },
}

/// Handle for cancelling an in-flight answer stream.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A streamed answer. Finite and not restartable: once a terminal event
/// (`Completed`, `Cancelled`, `Failed`) has been yielded, the iterator is
/// exhausted. Cancelling drops the underlying generation call, which
/// closes its connection.
pub struct AnswerStream {
    fragments: Option<FragmentStream>,
    sources: Vec<String>,
    cancel: Arc<AtomicBool>,
}

impl AnswerStream {
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }
}

impl Iterator for AnswerStream {
    type Item = AnswerEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let fragments = self.fragments.as_mut()?;

        if self.cancel.load(Ordering::SeqCst) {
            self.fragments = None;
            return Some(AnswerEvent::Cancelled);
        }

        match fragments.next() {
            Some(Ok(token)) => Some(AnswerEvent::Token(token)),
            Some(Err(e)) => {
                self.fragments = None;
                Some(AnswerEvent::Failed {
                    message: e.to_string(),
                })
            }
            None => {
                self.fragments = None;
                Some(AnswerEvent::Completed {
                    sources: std::mem::take(&mut self.sources),
                })
            }
        }
    }
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

/// Synthesize an answer for `query` from the retrieved passages.
///
/// Fails with `GenerationUnavailable` if the service cannot be reached at
/// all; mid-stream failures surface through the stream instead.
pub fn synthesize(
    query: &str,
    passages: &[Passage],
    client: &dyn GenerationClient,
) -> Result<AnswerStream> {
    let prompt = build_prompt(query, passages);
    let fragments = client.generate(&prompt)?;

    Ok(AnswerStream {
        fragments: Some(fragments),
        sources: consulted_sources(passages),
        cancel: Arc::new(AtomicBool::new(false)),
    })
}

/// Strip directory components from a source path, accepting either
/// separator convention.
pub fn clean_source_name(source: &str) -> String {
    source
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source)
        .to_string()
}

/// Deduplicated source filenames in first-appearance order.
///
/// Passage text is never deduplicated; a source legitimately appears once
/// here even when several passages came from it.
pub fn consulted_sources(passages: &[Passage]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for passage in passages {
        let name = clean_source_name(&passage.source);
        if seen.insert(name.clone()) {
            sources.push(name);
        }
    }
    sources
}

/// Build the context block: every passage's text tagged with its cleaned
/// source name and page.
fn build_context(passages: &[Passage]) -> String {
    let mut context = String::new();
    for passage in passages {
        let name = clean_source_name(&passage.source);
        match passage.page {
            Some(page) => {
                context.push_str(&format!("[source: {name}, page {page}]\n"))
            }
            None => context.push_str(&format!("[source: {name}]\n")),
        }
        context.push_str(passage.text.trim_end());
        context.push_str("\n\n");
    }
    context
}

fn build_prompt(query: &str, passages: &[Passage]) -> String {
    format!(
        "You are a helpful assistant answering questions about a document \
         collection. Use only the context below. If the context does not \
         contain the answer, say so. Cite the source names you used.\n\n\
         Context:\n{}Question: {query}\nAnswer:",
        build_context(passages)
    )
}
