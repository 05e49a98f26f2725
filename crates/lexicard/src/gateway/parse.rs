//! Parsing of the translation service's response body.
//!
//! The body is a JSON array of 6-element arrays:
//!
//! | index | meaning                          |
//! |-------|----------------------------------|
//! | 0     | raw word as it appears           |
//! | 1     | simplified (lemma) form          |
//! | 2     | grammatical category             |
//! | 3     | unused                           |
//! | 4     | character position in the text   |
//! | 5     | translated word                  |
//!
//! Index 3 is deliberately ignored; its meaning is not defined by the
//! service.

use serde_json::Value;

use super::error::GatewayError;
use crate::model::NewWord;

const TUPLE_LEN: usize = 6;

/// One word of a successful translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordResult {
    pub source_raw: String,
    pub source_simplified: String,
    pub category: Option<String>,
    pub position: u32,
    pub translated: String,
}

impl From<WordResult> for NewWord {
    fn from(word: WordResult) -> Self {
        Self {
            position: word.position,
            source_raw: word.source_raw,
            source_simplified: word.source_simplified,
            translated: word.translated,
            category: word.category,
        }
    }
}

/// Parses a response body. Any deviation from the expected shape fails
/// the whole response; an empty array is reported as
/// [`GatewayError::Empty`].
pub fn parse_word_results(body: &str) -> Result<Vec<WordResult>, GatewayError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GatewayError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let items = value
        .as_array()
        .ok_or_else(|| GatewayError::MalformedResponse("expected a JSON array".to_string()))?;

    if items.is_empty() {
        return Err(GatewayError::Empty);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_tuple(index, item))
        .collect()
}

fn parse_tuple(index: usize, item: &Value) -> Result<WordResult, GatewayError> {
    let fields = item
        .as_array()
        .filter(|fields| fields.len() == TUPLE_LEN)
        .ok_or_else(|| {
            GatewayError::MalformedResponse(format!(
                "item {} is not an array of {} elements",
                index, TUPLE_LEN
            ))
        })?;

    let string_at = |i: usize| -> Result<String, GatewayError> {
        fields[i].as_str().map(str::to_string).ok_or_else(|| {
            GatewayError::MalformedResponse(format!("item {} field {} is not a string", index, i))
        })
    };

    let category = match &fields[2] {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        _ => {
            return Err(GatewayError::MalformedResponse(format!(
                "item {} category is not a string",
                index
            )))
        }
    };

    let position = fields[4]
        .as_u64()
        .and_then(|p| u32::try_from(p).ok())
        .ok_or_else(|| {
            GatewayError::MalformedResponse(format!(
                "item {} position is not a non-negative integer",
                index
            ))
        })?;

    Ok(WordResult {
        source_raw: string_at(0)?,
        source_simplified: string_at(1)?,
        category,
        position,
        translated: string_at(5)?,
    })
}
