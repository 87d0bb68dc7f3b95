// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use log::debug;
use num_complex::Complex;
use rustc_hash::FxHashMap;

use super::{GateKind, gate_matrix, row_major};
use crate::error::Result;
use crate::precision::{Precision, cast_complex};

type CacheKey = (GateKind, bool, Vec<u64>);

/// Memoised gate matrices, cast to the engine precision.
///
/// Entries are keyed by gate kind, adjoint flag and the bit patterns of the
/// parameters, and live until [`GateCache::clear`] is called.
#[derive(Debug)]
pub struct GateCache<P> {
    matrices: FxHashMap<CacheKey, Arc<[Complex<P>]>>,
    hits: u64,
    misses: u64,
}

impl<P: Precision> Default for GateCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Precision> GateCache<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            matrices: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Row-major matrix of `kind` over its target wires.
    pub fn get_matrix(
        &mut self,
        kind: GateKind,
        params: &[f64],
        adjoint: bool,
    ) -> Result<Arc<[Complex<P>]>> {
        kind.check_params(params)?;
        let key = (
            kind,
            adjoint,
            params.iter().map(|&p| p.key_bits()).collect::<Vec<_>>(),
        );

        if let Some(matrix) = self.matrices.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(matrix));
        }

        self.misses += 1;
        debug!("gate cache miss: {kind} adjoint={adjoint} params={params:?}");
        let matrix: Arc<[Complex<P>]> = row_major(&gate_matrix(kind, params, adjoint)?)
            .into_iter()
            .map(cast_complex)
            .collect();
        self.matrices.insert(key, Arc::clone(&matrix));
        Ok(matrix)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.matrices.clear();
        self.hits = 0;
        self.misses = 0;
    }
}
