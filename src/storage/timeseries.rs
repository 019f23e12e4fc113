//! Bounded, time-ordered record log
//!
//! A [`TimeSeries`] is a ring buffer: appends go to the back and evict from
//! the front once the cap is reached, both in O(1). Timestamps never
//! decrease; a record older than the newest one is clamped forward on append.

use std::collections::VecDeque;
use std::collections::vec_deque;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::Sample;
use crate::alerts::AlertEvent;

/// A record with a timestamp the series can order by
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>);
}

impl Timestamped for Sample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }
}

impl Timestamped for AlertEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeries<T> {
    records: VecDeque<T>,
    cap: usize,
}

impl<T: Timestamped> TimeSeries<T> {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            records: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    /// Build a series from loaded records, keeping the newest `cap`
    pub fn from_records(mut records: Vec<T>, cap: usize) -> Self {
        records.sort_by_key(|record| record.timestamp());

        let mut series = Self::new(cap);
        let skip = records.len().saturating_sub(series.cap);
        series.records.extend(records.into_iter().skip(skip));
        series
    }

    /// Append a record, returning the evicted one once the cap is exceeded
    pub fn push(&mut self, mut record: T) -> Option<T> {
        if let Some(newest) = self.records.back().map(Timestamped::timestamp) {
            if record.timestamp() < newest {
                warn!(
                    "record at {} is older than {newest}, clamping",
                    record.timestamp()
                );
                record.set_timestamp(newest);
            }
        }

        self.records.push_back(record);
        if self.records.len() > self.cap {
            return self.records.pop_front();
        }
        None
    }

    /// Records with a timestamp in `[since, until]`, oldest first
    pub fn range(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> vec_deque::Iter<'_, T> {
        let start = self.records.partition_point(|r| r.timestamp() < since);
        let end = self.records.partition_point(|r| r.timestamp() <= until);
        self.records.range(start..end.max(start))
    }

    /// The most recent `n` records, oldest first
    pub fn latest(&self, n: usize) -> vec_deque::Iter<'_, T> {
        let start = self.records.len().saturating_sub(n);
        self.records.range(start..)
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, T> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> vec_deque::IterMut<'_, T> {
        self.records.iter_mut()
    }

    /// Contiguous view of all records, oldest first
    pub fn as_slice(&mut self) -> &[T] {
        self.records.make_contiguous()
    }

    pub fn newest(&self) -> Option<&T> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}
