//! Rank-greedy byte pair merging.

use alloc::vec::Vec;
use core::cmp::Ordering;

use orx_priority_queue::{DaryHeapOfIndices, PriorityQueue, PriorityQueueDecKey};

use crate::vocab::{RankTable, TokenId};

/// Initial capacity for the reusable merge buffer.
pub(crate) const ENCODE_BUFFER_SIZE: usize = 256;
/// Piece length above which the heap merge is used instead of the linear rescan.
pub(crate) const ENCODE_LINEAR_LIMIT: usize = 192;

/// Part of a piece during the linear merge, bounded by the start of the next part.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RankedPart {
    start: u32,
    rank:  TokenId,
}

/// Reusable scratch space for the linear merge.
pub(crate) type PartBuffer = Vec<RankedPart>;

/// Part of a piece during the heap merge, linked to its neighbors by index.
#[derive(Debug, Clone, Copy)]
struct LinkedPart {
    start: u32,
    width: u32,
    prior: u32,
    after: u32,
    rank:  TokenId,
}
impl PartialEq for LinkedPart {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
    }
}
impl Eq for LinkedPart {}
impl PartialOrd for LinkedPart {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for LinkedPart {
    // Ties on rank resolve to the leftmost pair.
    #[inline(always)]
    fn cmp(&self, other: &Self) -> Ordering {
        (self.rank, self.start).cmp(&(other.rank, other.start))
    }
}

type PieceHeap = DaryHeapOfIndices<u32, LinkedPart, 4>;

/// Encodes the given piece into a sequence of tokens, appending to `result`.
///
/// The piece must be non-empty. Every single byte is guaranteed a rank by
/// construction, so encoding cannot fail.
#[inline(always)]
pub(crate) fn encode_piece(
    ranks: &RankTable, piece: &[u8], buffer: &mut PartBuffer, result: &mut Vec<TokenId>,
) {
    debug_assert!(!piece.is_empty());
    if piece.len() == 1 {
        result.push(resolve(ranks, piece));
        return;
    }
    if piece.len() > ENCODE_LINEAR_LIMIT {
        encode_pairs_heap(ranks, piece, result);
    } else {
        encode_pairs(ranks, piece, buffer, result);
        buffer.clear();
    }
}

/// Encodes the given piece into a freshly allocated sequence of tokens.
#[inline(never)]
pub(crate) fn encode_piece_tokens(ranks: &RankTable, piece: &[u8]) -> Vec<TokenId> {
    let mut buffer = PartBuffer::with_capacity(piece.len().min(ENCODE_BUFFER_SIZE) + 1);
    let mut result = Vec::with_capacity(piece.len() / 2 + 1);
    encode_piece(ranks, piece, &mut buffer, &mut result);
    result
}

#[inline(always)]
fn resolve(ranks: &RankTable, part: &[u8]) -> TokenId {
    // Single bytes are validated at construction and merges are rank-resolved,
    // so every remaining part has a rank.
    ranks.rank_of(part).expect("piece resolves to a merged or single-byte rank")
}

/// Returns the rank of the concatenation of the parts between `start` and `end`,
/// or `MAX` if the concatenation is not in the vocabulary.
#[inline(always)]
fn get_rank(
    ranks: &RankTable, piece: &[u8], parts: &[RankedPart], start: usize, end: usize,
) -> TokenId {
    if end < parts.len() {
        ranks
            .rank_of(
                &piece[unsafe {
                    parts.get_unchecked(start).start as usize..parts.get_unchecked(end).start as usize
                }],
            )
            .unwrap_or(TokenId::MAX)
    } else {
        TokenId::MAX
    }
}

/// Encodes the given piece with the linear merge.
#[inline(never)]
fn encode_pairs(
    ranks: &RankTable, piece: &[u8], buffer: &mut PartBuffer, result: &mut Vec<TokenId>,
) {
    let start = buffer.len();
    buffer.extend((0..piece.len()).map(|i| RankedPart {
        start: i as u32,
        rank:  TokenId::MAX,
    }));
    buffer.push(RankedPart {
        start: piece.len() as u32,
        rank:  TokenId::MAX,
    });
    merge_parts(ranks, piece, buffer, start);
    let end = buffer.len() - 1;
    for i in start..end {
        result.push(resolve(ranks, &piece[buffer[i].start as usize..buffer[i + 1].start as usize]));
    }
}

/// Merges the given parts, always taking the pair with the lowest rank and
/// resolving ties to the leftmost position.
#[inline(never)]
fn merge_parts(ranks: &RankTable, piece: &[u8], parts: &mut PartBuffer, start: usize) {
    if parts.len() <= start + 1 {
        return;
    }
    let mut min_rank = TokenId::MAX;
    let mut i = start;
    for j in start..parts.len() - 1 {
        parts[j].rank = get_rank(ranks, piece, &parts[..], j, j + 2);
        if parts[j].rank < min_rank {
            (min_rank, i) = (parts[j].rank, j);
        }
    }
    while min_rank != TokenId::MAX {
        if i > start {
            parts[i - 1].rank = get_rank(ranks, piece, parts, i - 1, i + 2);
        }
        parts[i].rank = get_rank(ranks, piece, parts, i, i + 3);
        parts.remove(i + 1);
        min_rank = TokenId::MAX;
        #[allow(clippy::needless_range_loop)]
        for j in start..parts.len() - 1 {
            if parts[j].rank < min_rank {
                (min_rank, i) = (parts[j].rank, j);
            }
        }
    }
}

/// Encodes the given piece with the heap merge.
///
/// The additional allocation overhead compared to the linear rescan is
/// amortized for longer pieces.
#[inline(never)]
#[cold]
fn encode_pairs_heap(ranks: &RankTable, piece: &[u8], result: &mut Vec<TokenId>) {
    let mut heap = PieceHeap::with_index_bound(piece.len());
    let last = piece.len() as u32 - 1;
    for i in 0..=last {
        heap.push(i, LinkedPart {
            start: i,
            width: 1,
            prior: if i > 0 { i - 1 } else { u32::MAX },
            after: if i < last { i + 1 } else { u32::MAX },
            rank:  if i < last {
                ranks
                    .rank_of(&piece[i as usize..i as usize + 2])
                    .unwrap_or(TokenId::MAX)
            } else {
                TokenId::MAX
            },
        });
    }
    merge_parts_heap(ranks, piece, &mut heap);
    let mut e = 0;
    while e <= last {
        let part = heap.key_of(&e).unwrap();
        result.push(resolve(ranks, &piece[part.start as usize..(part.start + part.width) as usize]));
        e = part.after;
    }
}

/// Merges the given parts, always taking the pair with the lowest rank and
/// resolving ties to the leftmost position.
///
/// This version tracks the merge candidates in an indexed heap.
#[inline(never)]
#[cold]
fn merge_parts_heap(ranks: &RankTable, piece: &[u8], heap: &mut PieceHeap) {
    while heap.len() > 1 {
        let &(i, mut part) = heap.peek().unwrap();
        if part.rank == TokenId::MAX {
            break;
        }
        let next = heap.remove(&part.after);
        part.width += next.width;
        part.after = next.after;
        if part.after != u32::MAX {
            let mut next = heap.key_of(&part.after).unwrap();
            if let Some(rank) =
                ranks.rank_of(&piece[part.start as usize..(next.start + next.width) as usize])
            {
                part.rank = rank;
            } else {
                part.rank = TokenId::MAX;
            }
            next.prior = i;
            heap.update_key(&part.after, next);
        } else {
            part.rank = TokenId::MAX;
        }
        if part.prior != u32::MAX {
            let mut prior = heap.key_of(&part.prior).unwrap();
            if let Some(rank) =
                ranks.rank_of(&piece[prior.start as usize..(part.start + part.width) as usize])
            {
                prior.rank = rank;
            } else {
                prior.rank = TokenId::MAX;
            }
            heap.update_key(&part.prior, prior);
        }
        heap.update_key(&i, part);
    }
}
