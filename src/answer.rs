//! Turning retrieved passages into an answer.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    document::Chunk,
    error::Result,
    strategy::{Generator, Retrieval},
};

/// Build the answer prompt from retrieved passages.
pub fn build_prompt(query: &str, passages: &[Chunk]) -> String {
    let context = passages
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Answer strictly using this Context:\n{context}\n\nQuestion: {query}")
}

/// Titles of the passages, first-seen order, without duplicates.
pub fn source_titles(passages: &[Chunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    passages
        .iter()
        .map(|c| {
            if c.title.is_empty() {
                "Unknown".to_string()
            } else {
                c.title.clone()
            }
        })
        .filter(|title| seen.insert(title.clone()))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub retrieval: Retrieval,
}

/// Ask the generator to answer `query` from `retrieval`.
pub async fn answer(
    generator: &dyn Generator,
    query: &str,
    retrieval: Retrieval,
) -> Result<Answer> {
    let prompt = build_prompt(query, &retrieval.chunks);
    let text = generator.complete(&prompt).await?;
    Ok(Answer {
        text,
        sources: source_titles(&retrieval.chunks),
        retrieval,
    })
}
