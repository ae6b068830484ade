// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Derived per-benchmark series.

use bench_history_core::{BenchmarkRecord, Entry, SeriesPoint};
use std::sync::Arc;

/// Values of one `(group, tool, name)` ordered by entry date.
///
/// A series holds a snapshot of its group taken at query time, so later
/// appends never show up in an existing series. Points are materialized
/// as they are iterated.
#[derive(Debug, Clone)]
pub struct Series {
    entries: Arc<Vec<Entry>>,
    tool: String,
    name: String,
    /// `(entry position, bench index)` in date order.
    index: Vec<(usize, usize)>,
}

impl Series {
    /// Build a series from the first `before` entries of a group snapshot,
    /// keeping the newest `max_points` points.
    pub(crate) fn build(
        entries: Arc<Vec<Entry>>,
        tool: &str,
        name: &str,
        before: Option<usize>,
        max_points: Option<usize>,
    ) -> Self {
        let limit = before.map_or(entries.len(), |b| b.min(entries.len()));
        let mut index: Vec<(usize, usize)> = entries[..limit]
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.tool == tool)
            .filter_map(|(position, entry)| {
                entry
                    .benches
                    .iter()
                    .position(|bench| bench.name == name)
                    .map(|bench| (position, bench))
            })
            .collect();

        // Stable: equal dates keep append order.
        index.sort_by_key(|&(position, _)| entries[position].date);

        if let Some(max) = max_points {
            let excess = index.len().saturating_sub(max);
            index.drain(..excess);
        }

        Self {
            entries,
            tool: tool.to_string(),
            name: name.to_string(),
            index,
        }
    }

    /// Tool of the series.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Benchmark name of the series.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Points, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = SeriesPoint> + ExactSizeIterator + '_ {
        self.index
            .iter()
            .map(move |&(position, bench)| self.point(position, bench))
    }

    /// Collect all points.
    pub fn points(&self) -> Vec<SeriesPoint> {
        self.iter().collect()
    }

    /// Newest point.
    pub fn last(&self) -> Option<SeriesPoint> {
        self.iter().next_back()
    }

    /// Full record behind the newest point.
    pub fn latest_record(&self) -> Option<&BenchmarkRecord> {
        self.index
            .last()
            .map(|&(position, bench)| &self.entries[position].benches[bench])
    }

    fn point(&self, position: usize, bench: usize) -> SeriesPoint {
        let entry = &self.entries[position];
        let record = &entry.benches[bench];
        SeriesPoint {
            date: entry.date,
            value: record.value,
            unit: record.unit.clone(),
            commit_id: entry.commit.id.clone(),
            position,
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = SeriesPoint;
    type IntoIter = Box<dyn Iterator<Item = SeriesPoint> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entry, record};

    fn snapshot() -> Arc<Vec<Entry>> {
        Arc::new(vec![
            entry("c1", 300, "go", vec![record("A", 1.0, "ns/op")]),
            entry("c2", 100, "go", vec![record("A", 2.0, "ns/op"), record("B", 9.0, "ns/op")]),
            entry("c3", 300, "go", vec![record("A", 3.0, "ns/op")]),
            entry("c4", 200, "cargo", vec![record("A", 4.0, "ns/iter")]),
            entry("c5", 400, "go", vec![record("B", 5.0, "ns/op")]),
        ])
    }

    #[test]
    fn test_series_sorted_by_date_stable_on_ties() {
        let series = Series::build(snapshot(), "go", "A", None, None);
        let commits: Vec<String> = series.iter().map(|p| p.commit_id).collect();
        assert_eq!(commits, vec!["c2", "c1", "c3"]);
        assert_eq!(series.last().map(|p| p.position), Some(2));
    }

    #[test]
    fn test_series_max_points_keeps_newest() {
        let series = Series::build(snapshot(), "go", "A", None, Some(2));
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 3.0]);

        assert!(Series::build(snapshot(), "go", "A", None, Some(0)).is_empty());
    }

    #[test]
    fn test_series_before_excludes_later_entries() {
        let series = Series::build(snapshot(), "go", "A", Some(2), None);
        assert_eq!(series.len(), 2);
        assert!(series.iter().all(|p| p.position < 2));
    }

    #[test]
    fn test_series_filters_by_tool_and_name() {
        assert_eq!(Series::build(snapshot(), "cargo", "A", None, None).len(), 1);
        assert_eq!(Series::build(snapshot(), "go", "B", None, None).len(), 2);
        assert!(Series::build(snapshot(), "go", "missing", None, None).is_empty());
    }

    #[test]
    fn test_latest_record_is_full_record() {
        let series = Series::build(snapshot(), "go", "B", None, None);
        let record = series.latest_record().unwrap();
        assert_eq!(record.value, 5.0);
        assert_eq!(record.unit.as_str(), "ns/op");
    }
}
