use crate::naming::Fingerprint;
use crate::slow_query::SlowQueryRecord;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// What happened to a record offered to a [`SlowQuerySet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Folded into an existing record with the same fingerprint.
    Aggregated,
    /// Inserted into spare capacity.
    Inserted,
    /// Inserted in place of the cheapest record, whose fingerprint is returned.
    Evicted(Fingerprint),
    /// Not retained: the set is full and the record was not more expensive
    /// than the cheapest one kept.
    Dropped,
}

#[derive(Debug)]
struct Slot {
    record: SlowQueryRecord,
    inserted: u64,
}

/// Capacity-bounded map from fingerprint to slow query record.
///
/// When full, a new fingerprint replaces the record with the smallest total
/// duration only if its own total is strictly greater. Among records tied
/// for the smallest total, the one inserted first is evicted.
#[derive(Debug)]
pub struct SlowQuerySet {
    capacity: usize,
    slots: HashMap<Fingerprint, Slot>,
    generation: u64,
    dropped: HashSet<Fingerprint>,
}

impl SlowQuerySet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: HashMap::with_capacity(capacity),
            generation: 0,
            dropped: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Distinct fingerprints dropped or evicted since the set was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.len() as u64
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&SlowQueryRecord> {
        self.slots.get(fingerprint).map(|s| &s.record)
    }

    pub fn merge(&mut self, record: SlowQueryRecord) -> MergeOutcome {
        if self.slots.len() >= self.capacity {
            if let Some(slot) = self.slots.get_mut(&record.fingerprint) {
                slot.record.aggregate(&record);
                return MergeOutcome::Aggregated;
            }
            return self.replace_cheapest(record);
        }

        match self.slots.entry(record.fingerprint.clone()) {
            Entry::Occupied(mut e) => {
                e.get_mut().record.aggregate(&record);
                MergeOutcome::Aggregated
            }
            Entry::Vacant(e) => {
                self.generation += 1;
                e.insert(Slot {
                    record,
                    inserted: self.generation,
                });
                MergeOutcome::Inserted
            }
        }
    }

    fn replace_cheapest(&mut self, record: SlowQueryRecord) -> MergeOutcome {
        let cheapest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| (slot.record.total, slot.inserted))
            .map(|(fp, slot)| (fp.clone(), slot.record.total));

        match cheapest {
            Some((fingerprint, total)) if record.total > total => {
                self.slots.remove(&fingerprint);
                self.dropped.insert(fingerprint.clone());
                self.generation += 1;
                self.slots.insert(
                    record.fingerprint.clone(),
                    Slot {
                        record,
                        inserted: self.generation,
                    },
                );
                MergeOutcome::Evicted(fingerprint)
            }
            _ => {
                self.dropped.insert(record.fingerprint);
                MergeOutcome::Dropped
            }
        }
    }

    /// Consume the set into its records, most expensive first.
    pub fn into_records(self) -> Vec<SlowQueryRecord> {
        let mut records: Vec<_> = self.slots.into_values().map(|s| s.record).collect();
        records.sort_by(|a, b| {
            b.total
                .cmp(&a.total)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        records
    }
}
