//! Regex wrapper for the pre-tokenization and special-token patterns.

use core::fmt::{Debug, Display};
use core::ops::Deref;

use alloc::borrow::Cow;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Regex error type.
#[derive(thiserror::Error)]
pub struct RegexError(pub String);
impl Display for RegexError {
    #[inline(always)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}
impl Debug for RegexError {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_tuple("RegexError").field(&self.0).finish()
    }
}

/// Regex wrapper around the `fancy-regex` engine.
///
/// The patterns used by the tokenizer require unicode property classes,
/// case-insensitive groups and non-greedy alternatives.
#[derive(Clone)]
pub struct Regex {
    pub(crate) pattern: String,
    pub(crate) regex:   fancy_regex::Regex,
}
impl Regex {
    #[inline(always)]
    pub fn new(pattern: &str) -> Result<Self, RegexError> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex:   fancy_regex::Regex::new(pattern).map_err(|e| RegexError(e.to_string()))?,
        })
    }

    /// Returns the start and end positions of all non-overlapping matches in textual order.
    #[inline(always)]
    pub(crate) fn find_iter(&self, text: &str) -> Vec<(usize, usize)> {
        self.regex
            .find_iter(text)
            .map(|m| m.unwrap())
            .map(|m| (m.start(), m.end()))
            .collect()
    }

    /// Returns the start and end positions of the first match at or after `pos`.
    #[inline(always)]
    pub(crate) fn find_from_pos(&self, text: &str, pos: usize) -> Option<(usize, usize)> {
        self.regex
            .find_from_pos(text, pos)
            .unwrap()
            .map(|m| (m.start(), m.end()))
    }
}
impl PartialEq for Regex {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}
impl Eq for Regex {}
impl Deref for Regex {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &str {
        &self.pattern
    }
}
impl AsRef<str> for Regex {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.deref()
    }
}
impl Display for Regex {
    #[inline(always)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        Display::fmt(&self.pattern, f)
    }
}
impl Debug for Regex {
    #[inline(never)]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_tuple("Regex").field(&self.pattern).finish()
    }
}
impl TryFrom<String> for Regex {
    type Error = RegexError;

    #[inline(always)]
    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Self::new(&pattern)
    }
}
impl TryFrom<&str> for Regex {
    type Error = RegexError;

    #[inline(always)]
    fn try_from(pattern: &str) -> Result<Self, Self::Error> {
        Self::new(pattern)
    }
}

pub(crate) fn escape(pattern: &'_ str) -> Cow<'_, str> {
    fancy_regex::escape(pattern)
}
