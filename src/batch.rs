//! Parallel batch encoding and decoding.
//!
//! The engine holds no shared mutable state on the hot path, so batches are
//! plain parallel maps over a worker pool. The shared pool is built once on
//! first use; an explicit thread count builds a scoped pool for that call.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::decoder::{DecodeError, DecodePolicy};
use crate::encoder::EncodeError;
use crate::vocab::TokenId;
use crate::{AllowedSpecial, DisallowedSpecial, Encoding};

/// Environment variable overriding the shared pool's thread count.
pub const NUM_THREADS_ENV: &str = "BPEKIT_NUM_THREADS";

static SHARED_POOL: Lazy<Option<ThreadPool>> = Lazy::new(|| {
    let threads = std::env::var(NUM_THREADS_ENV)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("bpekit-{index}"))
        .build()
        .map_err(|error| log::warn!("failed to build the shared worker pool: {error}"))
        .ok()
});

/// Runs the given operation on a worker pool.
///
/// An explicit thread count gets a scoped pool. Without one, the shared pool
/// is used, falling back to rayon's global pool if it failed to build.
#[inline(never)]
fn run<R: Send>(num_threads: Option<usize>, op: impl FnOnce() -> R + Send) -> R {
    if let Some(threads) = num_threads {
        match ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => return pool.install(op),
            Err(error) => {
                log::warn!("failed to build a worker pool for {threads} threads: {error}");
            }
        }
    }
    match SHARED_POOL.as_ref() {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

impl Encoding {
    /// Encodes a batch of texts in parallel, ignoring special tokens.
    ///
    /// Results are returned in input order. `num_threads` overrides the
    /// worker pool size for this call; the default is the shared pool sized
    /// by `BPEKIT_NUM_THREADS` or the machine.
    #[inline(never)]
    pub fn encode_ordinary_batch<S: AsRef<str> + Sync>(
        &self, texts: &[S], num_threads: Option<usize>,
    ) -> Vec<Vec<TokenId>> {
        run(num_threads, || {
            texts.par_iter().map(|text| self.encode_ordinary(text.as_ref())).collect()
        })
    }

    /// Encodes a batch of texts in parallel.
    ///
    /// Results are returned in input order. The first error is returned and
    /// outstanding work is abandoned at the next task boundary.
    #[inline(never)]
    pub fn encode_batch<S: AsRef<str> + Sync>(
        &self, texts: &[S], allowed: &AllowedSpecial, disallowed: &DisallowedSpecial,
        num_threads: Option<usize>,
    ) -> Result<Vec<Vec<TokenId>>, EncodeError> {
        run(num_threads, || {
            texts
                .par_iter()
                .map(|text| self.encode(text.as_ref(), allowed, disallowed))
                .collect()
        })
    }

    /// Decodes a batch of token sequences in parallel.
    ///
    /// Results are returned in input order; the first error is returned.
    #[inline(never)]
    pub fn decode_batch<S: AsRef<[TokenId]> + Sync>(
        &self, batch: &[S], policy: DecodePolicy, num_threads: Option<usize>,
    ) -> Result<Vec<String>, DecodeError> {
        run(num_threads, || {
            batch
                .par_iter()
                .map(|tokens| self.decode_with_policy(tokens.as_ref(), policy))
                .collect()
        })
    }

    /// Decodes a batch of token sequences into bytes in parallel.
    ///
    /// Results are returned in input order; the first error is returned.
    #[inline(never)]
    pub fn decode_bytes_batch<S: AsRef<[TokenId]> + Sync>(
        &self, batch: &[S], num_threads: Option<usize>,
    ) -> Result<Vec<Vec<u8>>, DecodeError> {
        run(num_threads, || {
            batch.par_iter().map(|tokens| self.decode_bytes(tokens.as_ref())).collect()
        })
    }
}
