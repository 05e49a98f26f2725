//! Builders for test inputs.

#![allow(dead_code)]

use std::io::Write;

use lexicard::config::JobConfig;
use lexicard::gateway::WordResult;
use tempfile::NamedTempFile;

/// Builds gateway word results for a body by locating each surface form,
/// so positions are consistent with the text.
pub struct WordsBuilder<'a> {
    body: &'a str,
    words: Vec<WordResult>,
    search_from: usize,
}

impl<'a> WordsBuilder<'a> {
    pub fn for_body(body: &'a str) -> Self {
        Self {
            body,
            words: Vec::new(),
            search_from: 0,
        }
    }

    /// Adds the next occurrence of `raw` with its translation.
    pub fn word(mut self, raw: &str, translated: &str) -> Self {
        let byte = self.body[self.search_from..]
            .find(raw)
            .map(|i| i + self.search_from)
            .unwrap_or_else(|| panic!("'{}' not found in body", raw));
        let position = self.body[..byte].chars().count() as u32;
        self.search_from = byte + raw.len();

        self.words.push(WordResult {
            source_raw: raw.to_string(),
            source_simplified: raw.to_lowercase(),
            category: Some("X".to_string()),
            position,
            translated: translated.to_string(),
        });
        self
    }

    pub fn build(self) -> Vec<WordResult> {
        self.words
    }
}

/// A single placeholder word, for tests that only care that a
/// translation succeeded.
pub fn one_word(translated: &str) -> Vec<WordResult> {
    vec![WordResult {
        source_raw: "word".to_string(),
        source_simplified: "word".to_string(),
        category: None,
        position: 0,
        translated: translated.to_string(),
    }]
}

pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: JobConfig::default(),
        }
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn max_queued_runs(mut self, runs: u32) -> Self {
        self.config.max_queued_runs = runs;
        self
    }

    pub fn retry_delay_secs(mut self, secs: u64) -> Self {
        self.config.retry_delay_secs = secs;
        self
    }

    pub fn build(self) -> JobConfig {
        self.config
    }
}

/// Writes `content` to a temporary `.json` file.
pub fn config_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}
