//! Ordered, deduplicated container of detected locations.

use std::collections::HashSet;
use std::slice;

use serde::{Deserialize, Serialize};

use crate::model::{Coordinate, CoordinateKey, DEFAULT_PRECISION, LocationRecord, ServiceId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Rule deciding when two records describe the same location.
pub enum Equivalence {
    /// Same coordinate key, whichever service found it. First record wins.
    #[default]
    Coordinate,
    /// Same coordinate key and same detecting service.
    CoordinateAndService,
}

#[derive(Debug, Clone)]
/// Insertion-ordered set of [`LocationRecord`]s.
///
/// No two records are equivalent under the collection's precision and
/// [`Equivalence`] rule.
pub struct LocationCollection {
    records: Vec<LocationRecord>,
    seen: HashSet<(CoordinateKey, Option<ServiceId>)>,
    precision: u8,
    equivalence: Equivalence,
}

impl Default for LocationCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationCollection {
    /// Empty collection comparing coordinates at [`DEFAULT_PRECISION`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(DEFAULT_PRECISION, Equivalence::default())
    }

    /// Empty collection with an explicit dedup policy.
    #[must_use]
    pub fn with_policy(precision: u8, equivalence: Equivalence) -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
            precision,
            equivalence,
        }
    }

    /// Empty collection sharing this collection's policy.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self::with_policy(self.precision, self.equivalence)
    }

    /// Precision coordinates are compared at.
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    fn identity(&self, record: &LocationRecord) -> (CoordinateKey, Option<ServiceId>) {
        let key = record.coordinate().key(self.precision);
        match self.equivalence {
            Equivalence::Coordinate => (key, None),
            Equivalence::CoordinateAndService => (key, Some(record.source())),
        }
    }

    /// Append a record unless an equivalent one is already present.
    ///
    /// Returns whether the record was added.
    pub fn add(&mut self, record: LocationRecord) -> bool {
        if self.seen.insert(self.identity(&record)) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    /// Merge another collection, keeping this collection's policy.
    ///
    /// Returns how many records were actually added.
    pub fn add_all(&mut self, other: LocationCollection) -> usize {
        other
            .records
            .into_iter()
            .map(|record| self.add(record))
            .filter(|added| *added)
            .count()
    }

    /// New collection with the records matching `predicate`.
    #[must_use]
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&LocationRecord) -> bool,
    {
        let mut filtered = self.empty_like();
        for record in self.records.iter().filter(|record| predicate(record)) {
            filtered.add(record.clone());
        }
        filtered
    }

    /// Whether the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Iterate records in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, LocationRecord> {
        self.records.iter()
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[LocationRecord] {
        &self.records
    }

    /// Mutable access to one record, for filling enrichment fields.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut LocationRecord> {
        self.records.get_mut(index)
    }

    /// Coordinates in insertion order.
    #[must_use]
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.records.iter().map(|record| *record.coordinate()).collect()
    }

    /// Consume the collection into a plain list.
    #[must_use]
    pub fn into_vec(self) -> Vec<LocationRecord> {
        self.records
    }
}

impl<'coll> IntoIterator for &'coll LocationCollection {
    type Item = &'coll LocationRecord;
    type IntoIter = slice::Iter<'coll, LocationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
