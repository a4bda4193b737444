//! Encoding definition format.

use alloc::string::String;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

use crate::{Encoding, InitializationError, SpecialVocab, TokenId, Vocab};

/// Construction arguments for an [`Encoding`].
///
/// Loaders produce definitions, and definitions are what gets serialized:
/// an encoding can always be rebuilt from its definition, or looked up by
/// name through the registry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Deserialize, Serialize))]
pub struct Definition {
    /// Human-readable name of the encoding.
    pub name:             String,
    /// The pre-tokenization split pattern.
    pub pattern:          String,
    /// The mergeable vocabulary. Each rank is unique and every single byte is present.
    pub vocab:            Vocab,
    /// The special tokens. Ranks are disjoint from the vocabulary.
    pub specials:         SpecialVocab,
    /// The declared total vocabulary size, asserted at construction when present.
    pub explicit_n_vocab: Option<TokenId>,
}

impl TryFrom<Definition> for Encoding {
    type Error = InitializationError;

    fn try_from(value: Definition) -> Result<Self, Self::Error> {
        Encoding::from_definition(value)
    }
}

impl From<&Encoding> for Definition {
    fn from(value: &Encoding) -> Self {
        value.to_definition()
    }
}

impl Encoding {
    /// Creates an encoding from the given definition.
    ///
    /// Returns an error if the vocabulary violates its invariants
    /// or the pattern fails to compile.
    ///
    /// See [`Definition`] and [`Encoding::new`] for more details.
    #[inline(always)]
    pub fn from_definition(definition: Definition) -> Result<Self, InitializationError> {
        let Definition {
            name,
            pattern,
            vocab,
            specials,
            explicit_n_vocab,
        } = definition;
        Self::new(name, &pattern, vocab, specials, explicit_n_vocab)
    }

    /// Creates a definition from this encoding.
    ///
    /// The definition can be used for serialization and for initializing
    /// the encoding with [`Encoding::from_definition`].
    #[inline(never)]
    pub fn to_definition(&self) -> Definition {
        let mut vocab =
            self.ranks.iter().map(|(bytes, id)| (bytes.clone(), id).into()).collect::<Vocab>();
        vocab.sort_unstable();
        let mut specials = self
            .specials
            .iter()
            .map(|(name, id)| (String::from(name), id).into())
            .collect::<SpecialVocab>();
        specials.sort_unstable_by_key(|special| special.id);
        Definition {
            name: self.name.clone(),
            pattern: self.pattern.to_string(),
            vocab,
            specials,
            explicit_n_vocab: self.explicit_n_vocab,
        }
    }
}
