//! Decoder and token offset reconstruction.

use alloc::string::{FromUtf8Error, String};
use alloc::vec::Vec;

use crate::vocab::{TokenBytes, TokenId};
use crate::Encoding;

/// Errors encountered during decoding.
#[non_exhaustive]
#[derive(Debug)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum DecodeError {
    /// A token id exists in neither the vocabulary nor the special tokens.
    #[cfg_attr(feature = "std", error("invalid token {0}"))]
    InvalidToken(TokenId),
    /// The decoded bytes are not valid utf-8 under the strict policy.
    #[cfg_attr(feature = "std", error("invalid utf-8: {0}"))]
    InvalidUtf8(FromUtf8Error),
}
impl From<FromUtf8Error> for DecodeError {
    fn from(e: FromUtf8Error) -> Self {
        Self::InvalidUtf8(e)
    }
}

/// Handling of malformed utf-8 in decoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Fail with [`DecodeError::InvalidUtf8`].
    #[default]
    Strict,
    /// Substitute U+FFFD following the standard replacement rule.
    Replace,
    /// Drop malformed byte sequences.
    Ignore,
}

#[inline(always)]
fn is_continuation(byte: u8) -> bool {
    (0x80..0xC0).contains(&byte)
}

#[inline(never)]
fn decode_utf8_ignore(mut bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len());
    loop {
        match core::str::from_utf8(bytes) {
            Ok(text) => {
                result.push_str(text);
                break;
            }
            Err(error) => {
                let (valid, rest) = bytes.split_at(error.valid_up_to());
                // The prefix was just validated.
                result.push_str(unsafe { core::str::from_utf8_unchecked(valid) });
                bytes = &rest[error.error_len().unwrap_or(rest.len())..];
            }
        }
    }
    result
}

impl Encoding {
    /// Decodes the given sequence of tokens into bytes.
    ///
    /// Returns an error if a token exists in neither the vocabulary nor the special tokens.
    #[inline(never)]
    pub fn decode_bytes(&self, tokens: &[TokenId]) -> Result<Vec<u8>, DecodeError> {
        let mut result = Vec::<u8>::with_capacity(tokens.len() * 2);
        for &token in tokens {
            let bytes = self
                .ranks
                .bytes_of(token)
                .or_else(|| self.specials.bytes_of(token))
                .ok_or(DecodeError::InvalidToken(token))?;
            result.extend(bytes);
        }
        Ok(result)
    }

    /// Decodes the given sequence of tokens into a string, failing on malformed utf-8.
    #[inline(always)]
    pub fn decode(&self, tokens: &[TokenId]) -> Result<String, DecodeError> {
        self.decode_with_policy(tokens, DecodePolicy::Strict)
    }

    /// Decodes the given sequence of tokens into a string,
    /// handling malformed utf-8 according to the policy.
    #[inline(never)]
    pub fn decode_with_policy(
        &self, tokens: &[TokenId], policy: DecodePolicy,
    ) -> Result<String, DecodeError> {
        let bytes = self.decode_bytes(tokens)?;
        Ok(match policy {
            DecodePolicy::Strict => String::from_utf8(bytes)?,
            DecodePolicy::Replace => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(error) => String::from_utf8_lossy(error.as_bytes()).into_owned(),
            },
            DecodePolicy::Ignore => decode_utf8_ignore(&bytes),
        })
    }

    /// Decodes the given sequence of tokens and returns, for each token,
    /// the character index in the decoded string at which it begins.
    ///
    /// Malformed utf-8 is replaced. A token carrying the continuation bytes of
    /// a code point started by the previous token begins at the character the
    /// previous token opened.
    #[inline(never)]
    pub fn decode_with_offsets(
        &self, tokens: &[TokenId],
    ) -> Result<(String, Vec<usize>), DecodeError> {
        let mut bytes = Vec::<u8>::with_capacity(tokens.len() * 2);
        let mut offsets = Vec::with_capacity(tokens.len());
        let mut text_len = 0usize;
        for &token in tokens {
            let token_bytes = self
                .ranks
                .bytes_of(token)
                .or_else(|| self.specials.bytes_of(token))
                .ok_or(DecodeError::InvalidToken(token))?;
            let straddles = token_bytes.first().copied().is_some_and(is_continuation);
            offsets.push(if straddles { text_len.saturating_sub(1) } else { text_len });
            text_len += token_bytes.iter().filter(|&&b| !is_continuation(b)).count();
            bytes.extend(token_bytes);
        }
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(error) => String::from_utf8_lossy(error.as_bytes()).into_owned(),
        };
        Ok((text, offsets))
    }

    /// Decodes tokens that were just produced by this encoding.
    #[inline(always)]
    pub(crate) fn decode_known(&self, tokens: &[TokenId]) -> Vec<u8> {
        // The encoder only emits ranks from the tables.
        self.decode_bytes(tokens).expect("encoder output decodes")
    }

    /// Decodes a single token into its byte sequence.
    ///
    /// Returns an error if the token exists in neither the vocabulary nor the special tokens.
    #[inline(always)]
    pub fn decode_single_token_bytes(&self, token: TokenId) -> Result<&[u8], crate::TokenError> {
        self.ranks
            .bytes_of(token)
            .or_else(|| self.specials.bytes_of(token))
            .map(TokenBytes::as_slice)
            .ok_or(crate::TokenError::InvalidTokenId(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_ignore() {
        assert_eq!(decode_utf8_ignore(b"ab\xffcd"), "abcd");
        assert_eq!(decode_utf8_ignore(b"\xe4\xb8"), "");
        assert_eq!(decode_utf8_ignore("é".as_bytes()), "é");
    }
}
