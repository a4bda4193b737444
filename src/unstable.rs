//! Completion enumeration for unstable encode results.
//!
//! When text is encoded incrementally, the tokens covering the last
//! pre-tokenized piece can change once more bytes arrive. This module splits
//! an encode result into the prefix that is final and the set of token
//! sequences the trailing bytes could still become.

use alloc::vec::Vec;

use hashbrown::HashSet;

use crate::encoder::{self, EncodeError};
use crate::vocab::TokenId;
use crate::{AllowedSpecial, DisallowedSpecial, Encoding};

impl Encoding {
    /// Encodes the given text and returns the stable token prefix together
    /// with every plausible tokenization of the unstable trailing bytes.
    ///
    /// The unstable run covers the last pre-tokenized piece; each completion
    /// is one valid tokenization of those bytes extended by some plausible
    /// continuation. Completions are deduplicated and unordered.
    ///
    /// Fails like [`Encoding::encode`] if a disallowed special token occurs
    /// anywhere in the text.
    #[inline(never)]
    pub fn encode_with_unstable(
        &self, text: &str, allowed: &AllowedSpecial, disallowed: &DisallowedSpecial,
    ) -> Result<(Vec<TokenId>, HashSet<Vec<TokenId>>), EncodeError> {
        let allowed = self.allowed_set(allowed);
        self.check_disallowed(text, &allowed, disallowed)?;
        let (tokens, last_piece_token_len) = self.encode_with_specials(text, &allowed);
        if last_piece_token_len == 0 {
            // The last token was a special token; nothing is unstable.
            return Ok((tokens, HashSet::new()));
        }
        let (mut tokens, last_piece_token_len) =
            self.increase_last_piece_token_len(tokens, last_piece_token_len);

        let unstable_bytes = self.decode_known(&tokens[tokens.len() - last_piece_token_len..]);
        tokens.truncate(tokens.len() - last_piece_token_len);

        let mut completions = HashSet::new();
        if unstable_bytes.is_empty() {
            return Ok((tokens, completions));
        }

        // Single tokens that extend the unstable bytes, including an exact match.
        let sorted = self.ranks.sorted_token_bytes();
        let mut point = sorted.partition_point(|bytes| bytes.as_slice() < unstable_bytes.as_slice());
        while point < sorted.len() && sorted[point].starts_with(&unstable_bytes) {
            completions.insert(alloc::vec![self.rank_of_sorted(&sorted[point])]);
            point += 1;
        }

        // At every other position a straddling token could begin, extend the
        // unstable bytes with the candidate's remainder and retokenize.
        for i in 1..unstable_bytes.len() {
            let prefix = &unstable_bytes[..i];
            let suffix = &unstable_bytes[i..];
            let mut point = sorted.partition_point(|bytes| bytes.as_slice() < suffix);
            while point < sorted.len() && sorted[point].starts_with(suffix) {
                let possibility = [prefix, sorted[point].as_slice()].concat();
                // The candidate may reintroduce a pre-tokenization split, so
                // retokenize through the pattern where the bytes form a string.
                let encoded = match core::str::from_utf8(&possibility) {
                    Ok(text) => self.encode_ordinary(text),
                    Err(_) => encoder::encode_piece_tokens(&self.ranks, &possibility),
                };
                let mut seq = Vec::new();
                let mut seq_len = 0;
                for token in encoded {
                    seq.push(token);
                    seq_len += self.ranks.bytes_of(token).map_or(0, Vec::len);
                    if seq_len >= unstable_bytes.len() {
                        break;
                    }
                }
                completions.insert(seq);
                point += 1;
            }
        }

        // A whitespace character at the end of the unstable bytes can develop
        // a split once more bytes arrive, making the tokenization of the two
        // sides on their own possible as well.
        if unstable_bytes.len() > 1 {
            let (last_char, width) = bstr::decode_last_utf8(unstable_bytes.as_slice());
            if unstable_bytes.len() > width && last_char.is_some_and(char::is_whitespace) {
                let mut reencoded = encoder::encode_piece_tokens(
                    &self.ranks,
                    &unstable_bytes[..unstable_bytes.len() - width],
                );
                reencoded.extend(encoder::encode_piece_tokens(
                    &self.ranks,
                    &unstable_bytes[unstable_bytes.len() - width..],
                ));
                completions.insert(reencoded);
            }
        }

        Ok((tokens, completions))
    }

    /// Widens the unstable token run backwards over all-whitespace tokens.
    ///
    /// Pre-tokenization splits inside runs of whitespace are themselves
    /// unstable: appended bytes can make a split disappear and merge tokens
    /// that looked final, e.g. `"\n"` + `" "` becoming `"\n \n"`.
    #[inline(never)]
    pub(crate) fn increase_last_piece_token_len(
        &self, tokens: Vec<TokenId>, mut last_piece_token_len: usize,
    ) -> (Vec<TokenId>, usize) {
        let token_is_all_space = |token: &TokenId| {
            self.ranks
                .bytes_of(*token)
                .map(|bytes| bytes.iter().rev().all(|&b| matches!(b, b' ' | b'\n' | b'\t')))
                .unwrap_or(false)
        };
        if last_piece_token_len > 0
            && token_is_all_space(&tokens[tokens.len() - last_piece_token_len])
        {
            while last_piece_token_len < tokens.len()
                && token_is_all_space(&tokens[tokens.len() - last_piece_token_len - 1])
            {
                last_piece_token_len += 1;
            }
        }
        debug_assert!(last_piece_token_len <= tokens.len());
        (tokens, last_piece_token_len)
    }

    /// Looks up the rank of a byte sequence taken from the sorted table.
    #[inline(always)]
    fn rank_of_sorted(&self, bytes: &[u8]) -> TokenId {
        // The sorted table is built from the vocabulary keys.
        self.ranks.rank_of(bytes).expect("sorted table entries have ranks")
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use crate::vocab::{Token, Vocab};
    use crate::Encoding;

    #[test]
    fn test_unstable_run_widens_over_whitespace_pieces() {
        // Every whitespace character is its own piece, so the trailing
        // whitespace tokens come from separate pieces but are still unstable
        // together.
        let mut vocab =
            (0..=u8::MAX).map(|b| Token::from((vec![b], b as u32))).collect::<Vocab>();
        vocab.push(Token::from((b"  ".to_vec(), 256)));
        let encoding = Encoding::new("spaces", r"\p{L}+|\s", vocab, Vec::new(), None).unwrap();

        let (tokens, last) = encoding.encode_with_specials("x  ", &crate::HashSet::new());
        assert_eq!(tokens, [b'x' as u32, 32, 32]);
        assert_eq!(last, 1);
        let (tokens, widened) = encoding.increase_last_piece_token_len(tokens, last);
        assert_eq!(widened, 2);
        assert_eq!(tokens.len(), 3);
    }
}
