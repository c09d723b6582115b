use std::{collections::BTreeMap, fmt, num::NonZeroUsize, thread};

use ndarray::{Array4, Array5, Axis};
use rand::{Rng, SeedableRng as _, seq::SliceRandom as _};
use rand_pcg::Pcg64Mcg;

use crate::{NegativeFallback, SampleError, TncDataset, TncItem};

/// A batch of stacked examples.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[batch, channel, feature, window_size]`
    pub anchors: Array4<f32>,
    /// `[batch, mc_sample_size, channel, feature, window_size]`
    pub positives: Array5<f32>,
    /// `[batch, mc_sample_size, channel, feature, window_size]`
    pub negatives: Array5<f32>,
    pub labels: Vec<f32>,
    pub stats: SamplingStats,
}

impl Batch {
    fn from_items(items: &[TncItem]) -> Result<Self, SampleError> {
        let anchors = ndarray::stack(
            Axis(0),
            &items.iter().map(|i| i.anchor.view()).collect::<Vec<_>>(),
        )
        .map_err(|source| SampleError::Shape { source })?;
        let positives = ndarray::stack(
            Axis(0),
            &items.iter().map(|i| i.positives.view()).collect::<Vec<_>>(),
        )
        .map_err(|source| SampleError::Shape { source })?;
        let negatives = ndarray::stack(
            Axis(0),
            &items.iter().map(|i| i.negatives.view()).collect::<Vec<_>>(),
        )
        .map_err(|source| SampleError::Shape { source })?;

        let mut stats = SamplingStats::default();
        items.iter().for_each(|item| stats.record(item));
        Ok(Self {
            anchors,
            positives,
            negatives,
            labels: items.iter().map(|i| i.label).collect(),
            stats,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Counts of sampling outcomes, aggregated per batch and merged by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplingStats {
    /// Number of anchors per neighborhood half-width.
    pub half_widths: BTreeMap<usize, usize>,
    /// Number of anchors per count of negatives rejected by the correlation filter.
    pub negatives_removed: BTreeMap<usize, usize>,
    pub fallbacks: BTreeMap<NegativeFallback, usize>,
}

impl SamplingStats {
    pub fn record(&mut self, item: &TncItem) {
        *self
            .half_widths
            .entry(item.neighborhood.half_width)
            .or_default() += 1;
        if let Some(removed) = item.negatives_removed {
            *self.negatives_removed.entry(removed).or_default() += 1;
        }
        if let Some(fallback) = item.fallback {
            *self.fallbacks.entry(fallback).or_default() += 1;
        }
    }

    pub fn merge(&mut self, other: &Self) {
        for (k, v) in &other.half_widths {
            *self.half_widths.entry(*k).or_default() += v;
        }
        for (k, v) in &other.negatives_removed {
            *self.negatives_removed.entry(*k).or_default() += v;
        }
        for (k, v) in &other.fallbacks {
            *self.fallbacks.entry(*k).or_default() += v;
        }
    }

    #[must_use]
    pub fn anchors(&self) -> usize {
        self.half_widths.values().sum()
    }
}

impl fmt::Display for SamplingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "half widths {:?}", self.half_widths)?;
        if !self.negatives_removed.is_empty() {
            write!(f, ", negatives removed {:?}", self.negatives_removed)?;
        }
        if !self.fallbacks.is_empty() {
            write!(f, ", fallbacks {:?}", self.fallbacks)?;
        }
        Ok(())
    }
}

/// Batches a [`TncDataset`], sampling the items of each batch on worker threads.
///
/// Each worker owns a PCG stream seeded from the loader's RNG, so an epoch is
/// reproducible for a given seed and worker count.
#[derive(Debug, Clone, Copy)]
pub struct DataLoader<'a> {
    dataset: &'a TncDataset,
    batch_size: usize,
    shuffle: bool,
    num_workers: usize,
}

impl<'a> DataLoader<'a> {
    /// Creates a shuffling loader using one worker per available core.
    #[must_use]
    pub fn new(dataset: &'a TncDataset, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        let num_workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            dataset,
            batch_size,
            shuffle: true,
            num_workers,
        }
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    /// Number of batches per epoch; the last batch may be short.
    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Iterates over one epoch of batches.
    pub fn epoch<R>(&self, rng: &mut R) -> Batches<'a>
    where
        R: Rng + ?Sized,
    {
        let mut order = (0..self.dataset.len()).collect::<Vec<_>>();
        if self.shuffle {
            order.shuffle(rng);
        }
        Batches {
            loader: *self,
            order,
            cursor: 0,
            rng: Pcg64Mcg::seed_from_u64(rng.random()),
        }
    }

    fn load(&self, indices: &[usize], rng: &mut Pcg64Mcg) -> Result<Batch, SampleError> {
        let chunk_size = indices.len().div_ceil(self.num_workers).max(1);
        let seeds = indices
            .chunks(chunk_size)
            .map(|_| rng.random::<u64>())
            .collect::<Vec<_>>();

        let chunks = thread::scope(|s| {
            let handles = indices
                .chunks(chunk_size)
                .zip(seeds)
                .map(|(chunk, seed)| {
                    s.spawn(move || {
                        let mut rng = Pcg64Mcg::seed_from_u64(seed);
                        chunk
                            .iter()
                            .map(|&index| self.dataset.get(index, &mut rng))
                            .collect::<Result<Vec<_>, _>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect::<Result<Vec<_>, _>>()
        })?;

        Batch::from_items(&chunks.concat())
    }
}

/// Iterator over the batches of one epoch.
#[derive(Debug)]
pub struct Batches<'a> {
    loader: DataLoader<'a>,
    order: Vec<usize>,
    cursor: usize,
    rng: Pcg64Mcg,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch, SampleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;
        Some(self.loader.load(indices, &mut self.rng))
    }
}
