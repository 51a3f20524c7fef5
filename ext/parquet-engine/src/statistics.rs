//! Running statistics for one leaf column of one row group.

use ahash::AHashSet;
use std::cmp::Ordering;

use crate::error::Result;
use crate::physical::{compare, PhysicalType, PhysicalValue};
use crate::schema::PrimitiveType;

/// Distinct values tracked exactly before the count turns into an upper bound
pub const DEFAULT_DISTINCT_LIMIT: usize = 65_536;

/// Min/max/null/distinct accumulator for a column chunk
#[derive(Debug, Clone)]
pub struct ColumnChunkStatistics {
    primitive_type: PrimitiveType,
    min: Option<PhysicalValue>,
    max: Option<PhysicalValue>,
    null_count: u64,
    value_count: u64,
    distinct: AHashSet<PhysicalValue>,
    distinct_limit: usize,
    /// Values counted as new after the exact set filled up
    untracked_distinct: u64,
}

/// Plain snapshot of the accumulated statistics
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsSummary {
    pub min: Option<PhysicalValue>,
    pub max: Option<PhysicalValue>,
    pub null_count: u64,
    pub distinct_count: Option<u64>,
}

impl ColumnChunkStatistics {
    pub fn new(primitive_type: PrimitiveType) -> Self {
        Self::with_distinct_limit(primitive_type, DEFAULT_DISTINCT_LIMIT)
    }

    pub fn with_distinct_limit(primitive_type: PrimitiveType, distinct_limit: usize) -> Self {
        Self {
            primitive_type,
            min: None,
            max: None,
            null_count: 0,
            value_count: 0,
            distinct: AHashSet::new(),
            distinct_limit,
            untracked_distinct: 0,
        }
    }

    /// Record one occurrence; `None` is a null.
    pub fn add(&mut self, value: Option<&PhysicalValue>) {
        let Some(value) = value else {
            self.null_count += 1;
            return;
        };
        self.value_count += 1;
        self.track_distinct(value);

        if value.is_nan() {
            return;
        }
        let ty = self.primitive_type;
        // Ties keep the first-seen extreme
        if self
            .min
            .as_ref()
            .map_or(true, |min| compare(ty, value, min) == Ordering::Less)
        {
            self.min = Some(value.clone());
        }
        if self
            .max
            .as_ref()
            .map_or(true, |max| compare(ty, value, max) == Ordering::Greater)
        {
            self.max = Some(value.clone());
        }
    }

    fn track_distinct(&mut self, value: &PhysicalValue) {
        if self.distinct.contains(value) {
            return;
        }
        if self.distinct.len() < self.distinct_limit {
            self.distinct.insert(value.clone());
        } else {
            self.untracked_distinct += 1;
        }
    }

    /// Fold `other` into `self`. Both must describe the same column.
    pub fn merge(&mut self, other: &ColumnChunkStatistics) {
        let ty = self.primitive_type;
        if let Some(other_min) = &other.min {
            if self
                .min
                .as_ref()
                .map_or(true, |min| compare(ty, other_min, min) == Ordering::Less)
            {
                self.min = Some(other_min.clone());
            }
        }
        if let Some(other_max) = &other.max {
            if self
                .max
                .as_ref()
                .map_or(true, |max| compare(ty, other_max, max) == Ordering::Greater)
            {
                self.max = Some(other_max.clone());
            }
        }
        self.null_count += other.null_count;
        self.value_count += other.value_count;
        self.untracked_distinct += other.untracked_distinct;
        for value in &other.distinct {
            self.track_distinct(value);
        }
    }

    pub fn min(&self) -> Option<&PhysicalValue> {
        self.min.as_ref()
    }

    pub fn max(&self) -> Option<&PhysicalValue> {
        self.max.as_ref()
    }

    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    /// Number of non-null values seen
    pub fn value_count(&self) -> u64 {
        self.value_count
    }

    /// Distinct values seen; an upper bound once the exact set is saturated
    pub fn distinct_count(&self) -> u64 {
        self.distinct.len() as u64 + self.untracked_distinct
    }

    /// The distinct count, if it is still exact
    pub fn exact_distinct_count(&self) -> Option<u64> {
        (self.untracked_distinct == 0).then_some(self.distinct.len() as u64)
    }

    /// Snapshot for the footer, which only records an exact distinct count
    pub fn summary(&self) -> StatisticsSummary {
        StatisticsSummary {
            min: self.min.clone(),
            max: self.max.clone(),
            null_count: self.null_count,
            distinct_count: self.exact_distinct_count(),
        }
    }
}

impl StatisticsSummary {
    pub fn to_thrift(&self) -> parquet::format::Statistics {
        let min = self.min.as_ref().map(PhysicalValue::to_stat_bytes);
        let max = self.max.as_ref().map(PhysicalValue::to_stat_bytes);
        let exact = max.is_some().then_some(true);
        parquet::format::Statistics {
            max: None,
            min: None,
            null_count: Some(self.null_count as i64),
            distinct_count: self.distinct_count.map(|c| c as i64),
            max_value: max,
            min_value: min,
            is_max_value_exact: exact,
            is_min_value_exact: exact,
        }
    }

    pub fn from_thrift(
        physical_type: PhysicalType,
        stats: &parquet::format::Statistics,
    ) -> Result<Self> {
        // Files from older writers only carry the deprecated fields
        let min = stats.min_value.as_ref().or(stats.min.as_ref());
        let max = stats.max_value.as_ref().or(stats.max.as_ref());
        Ok(Self {
            min: min
                .map(|b| PhysicalValue::from_stat_bytes(physical_type, b))
                .transpose()?,
            max: max
                .map(|b| PhysicalValue::from_stat_bytes(physical_type, b))
                .transpose()?,
            null_count: stats.null_count.unwrap_or(0).max(0) as u64,
            distinct_count: stats.distinct_count.map(|c| c.max(0) as u64),
        })
    }
}
