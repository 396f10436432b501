//! `IndexStats` summarises how one size class of a duplicate index is spread
//! over its buckets. Used by the command line tools and by tests checking
//! bucket growth on flat content.

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::index::IndexEntry;
use crate::size_class::SizeClass;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub size: String,
    pub entries: usize,
    pub buckets: usize,
    pub largest_bucket: usize,
    /// Entries sharing their full fingerprint pair with at least one other entry.
    pub duplicated_entries: usize,
}

impl IndexStats {
    pub fn collect<'a>(size: SizeClass, buckets: impl Iterator<Item = &'a [IndexEntry]>) -> Self {
        let mut stats = Self {
            size: size.to_string(),
            entries: 0,
            buckets: 0,
            largest_bucket: 0,
            duplicated_entries: 0,
        };
        for bucket in buckets {
            stats.buckets += 1;
            stats.entries += bucket.len();
            stats.largest_bucket = stats.largest_bucket.max(bucket.len());
            let mut seen: HashMap<u32, usize> = HashMap::new();
            for entry in bucket {
                *seen.entry(entry.secondary).or_default() += 1;
            }
            stats.duplicated_entries += seen.values().filter(|&&n| n > 1).sum::<usize>();
        }
        stats
    }

    /// Mean entries per populated bucket.
    pub fn mean_bucket(&self) -> f64 {
        if self.buckets == 0 {
            0.0
        } else {
            self.entries as f64 / self.buckets as f64
        }
    }

    pub fn report(&self) {
        info!(
            size = %self.size,
            entries = self.entries,
            buckets = self.buckets,
            largest = self.largest_bucket,
            duplicated = self.duplicated_entries,
            "index statistics"
        );
    }
}
