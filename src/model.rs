//! Model name to encoding mapping.

use std::sync::Arc;

use crate::registry::{get_encoding, RegistryError};
use crate::Encoding;

/// Errors encountered when resolving a model name.
#[non_exhaustive]
#[derive(Debug)]
#[derive(thiserror::Error)]
pub enum ModelError {
    /// The model name matches no table entry and no prefix.
    #[error(
        "Could not automatically map {0:?} to an encoding; use get_encoding to pick one explicitly"
    )]
    UnknownModel(String),
    /// The mapped encoding failed to resolve.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Exact model names. Checked before the prefix table.
const MODEL_TO_ENCODING: &[(&str, &str)] = &[
    // chat
    ("gpt-4o", "o200k_base"),
    ("gpt-4", "cl100k_base"),
    ("gpt-3.5-turbo", "cl100k_base"),
    ("gpt-3.5", "cl100k_base"),
    ("gpt-35-turbo", "cl100k_base"),
    // base
    ("davinci-002", "cl100k_base"),
    ("babbage-002", "cl100k_base"),
    // embeddings
    ("text-embedding-ada-002", "cl100k_base"),
    ("text-embedding-3-small", "cl100k_base"),
    ("text-embedding-3-large", "cl100k_base"),
    // DEPRECATED MODELS
    // text (DEPRECATED)
    ("text-davinci-003", "p50k_base"),
    ("text-davinci-002", "p50k_base"),
    ("text-davinci-001", "r50k_base"),
    ("text-curie-001", "r50k_base"),
    ("text-babbage-001", "r50k_base"),
    ("text-ada-001", "r50k_base"),
    ("davinci", "r50k_base"),
    ("curie", "r50k_base"),
    ("babbage", "r50k_base"),
    ("ada", "r50k_base"),
    // code (DEPRECATED)
    ("code-davinci-002", "p50k_base"),
    ("code-davinci-001", "p50k_base"),
    ("code-cushman-002", "p50k_base"),
    ("code-cushman-001", "p50k_base"),
    ("davinci-codex", "p50k_base"),
    ("cushman-codex", "p50k_base"),
    // edit (DEPRECATED)
    ("text-davinci-edit-001", "p50k_edit"),
    ("code-davinci-edit-001", "p50k_edit"),
    // old embeddings (DEPRECATED)
    ("text-similarity-davinci-001", "r50k_base"),
    ("text-similarity-curie-001", "r50k_base"),
    ("text-similarity-babbage-001", "r50k_base"),
    ("text-similarity-ada-001", "r50k_base"),
    ("text-search-davinci-doc-001", "r50k_base"),
    ("text-search-curie-doc-001", "r50k_base"),
    ("text-search-babbage-doc-001", "r50k_base"),
    ("text-search-ada-doc-001", "r50k_base"),
    ("code-search-babbage-code-001", "r50k_base"),
    ("code-search-ada-code-001", "r50k_base"),
    // open source
    ("gpt2", "gpt2"),
    ("gpt-2", "gpt2"),
];

/// Model name prefixes, for versioned releases and fine-tunes.
/// The longest matching prefix wins.
const MODEL_PREFIX_TO_ENCODING: &[(&str, &str)] = &[
    ("o1-", "o200k_base"),
    ("o3-", "o200k_base"),
    ("chatgpt-4o-", "o200k_base"),
    ("gpt-4o-", "o200k_base"),
    ("gpt-4-", "cl100k_base"),
    ("gpt-3.5-turbo-", "cl100k_base"),
    ("gpt-35-turbo-", "cl100k_base"),
    ("ft:gpt-4o", "o200k_base"),
    ("ft:gpt-4", "cl100k_base"),
    ("ft:gpt-3.5-turbo", "cl100k_base"),
    ("ft:davinci-002", "cl100k_base"),
    ("ft:babbage-002", "cl100k_base"),
];

/// Returns the name of the encoding used by the given model.
///
/// Exact names are checked first, then the longest matching prefix.
pub fn encoding_name_for_model(model: &str) -> Result<&'static str, ModelError> {
    if let Some((_, encoding)) = MODEL_TO_ENCODING.iter().find(|(name, _)| *name == model) {
        return Ok(encoding);
    }
    MODEL_PREFIX_TO_ENCODING
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, encoding)| *encoding)
        .ok_or_else(|| ModelError::UnknownModel(model.into()))
}

/// Returns the encoding used by the given model.
pub fn encoding_for_model(model: &str) -> Result<Arc<Encoding>, ModelError> {
    Ok(get_encoding(encoding_name_for_model(model)?)?)
}
