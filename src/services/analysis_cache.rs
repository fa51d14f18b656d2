use crate::types::AnalysisSnapshot;
use dashmap::DashMap;
use std::sync::Arc;

/// Latest analysis snapshot per instrument.
///
/// Entries are swapped as whole `Arc`s, so a reader holds either the old or
/// the new snapshot and never a partially updated one. No eviction.
pub struct AnalysisCache {
    snapshots: DashMap<String, Arc<AnalysisSnapshot>>,
}

impl AnalysisCache {
    /// Create a new analysis cache.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    /// Replace the snapshot for its instrument.
    pub fn put(&self, snapshot: AnalysisSnapshot) {
        self.snapshots
            .insert(Self::key(&snapshot.symbol), Arc::new(snapshot));
    }

    /// Get the snapshot for an instrument, if one was ever computed.
    pub fn get(&self, symbol: &str) -> Option<Arc<AnalysisSnapshot>> {
        self.snapshots
            .get(&Self::key(symbol))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Get the snapshot, or an empty degraded one for unknown instruments.
    pub fn get_snapshot(&self, symbol: &str) -> Arc<AnalysisSnapshot> {
        self.get(symbol)
            .unwrap_or_else(|| Arc::new(AnalysisSnapshot::empty(&Self::key(symbol))))
    }

    /// Instruments with a cached snapshot.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.snapshots.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self {
            snapshots: DashMap::new(),
        }
    }
}
