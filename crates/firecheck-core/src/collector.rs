//! Collection of `WeaponFire` events delivered by the bus.
//!
//! The bus may call into the collector from several threads at once.
//! Decoding runs on the delivering thread without any lock held; only the
//! insert-if-absent step takes the mutex, so two deliveries carrying the
//! same identifier can never both be admitted.  The first one to reach
//! the lock wins and later arrivals are counted as duplicates, even when
//! their payload differs.

use firecheck_protocol::codec::{RprDecoder, WeaponFireDecoder};
use firecheck_protocol::{EventIdentifier, Interaction, InteractionListener, WeaponFireEvent};
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::btree_map::{self, BTreeMap, Entry};
use std::sync::atomic::{AtomicU64, Ordering};

// ═══════════════════════════════════════════════════════════════════════
//  Discovered set
// ═══════════════════════════════════════════════════════════════════════

/// Events observed on the bus, keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredSet {
    events: BTreeMap<EventIdentifier, WeaponFireEvent>,
}

impl DiscoveredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set applying the first-arrival rule in iteration order.
    pub fn from_events(events: impl IntoIterator<Item = WeaponFireEvent>) -> Self {
        let mut set = Self::new();
        for event in events {
            set.insert_if_absent(event);
        }
        set
    }

    /// Insert `event` unless its identifier is already present.
    ///
    /// Returns `true` if the event was inserted.
    pub fn insert_if_absent(&mut self, event: WeaponFireEvent) -> bool {
        match self.events.entry(event.identifier.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(event);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, identifier: &EventIdentifier) -> Option<&WeaponFireEvent> {
        self.events.get(identifier)
    }

    pub fn contains(&self, identifier: &EventIdentifier) -> bool {
        self.events.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in identifier order.
    pub fn iter(&self) -> btree_map::Values<'_, EventIdentifier, WeaponFireEvent> {
        self.events.values()
    }

    pub fn into_events(self) -> Vec<WeaponFireEvent> {
        self.events.into_values().collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Collector
// ═══════════════════════════════════════════════════════════════════════

/// What happened to one delivered interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First arrival of this identifier; now part of the discovered set.
    Inserted,
    /// Identifier already present; payload discarded.
    Duplicate,
    /// A parameter failed to decode; payload discarded.
    Rejected,
    /// Not a `WeaponFire` interaction.
    Ignored,
}

/// Counters since the collector was created or last cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub ignored: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    inserted: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    ignored: AtomicU64,
}

/// Accumulates the discovered set from bus deliveries.
pub struct EventCollector<D: WeaponFireDecoder = RprDecoder> {
    decoder: D,
    discovered: Mutex<DiscoveredSet>,
    counters: Counters,
}

impl EventCollector<RprDecoder> {
    pub fn new() -> Self {
        Self::with_decoder(RprDecoder)
    }
}

impl Default for EventCollector<RprDecoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: WeaponFireDecoder> EventCollector<D> {
    pub fn with_decoder(decoder: D) -> Self {
        Self {
            decoder,
            discovered: Mutex::new(DiscoveredSet::new()),
            counters: Counters::default(),
        }
    }

    /// Decode and admit one delivered interaction.
    ///
    /// Decode failures are logged and counted, never propagated.
    pub fn on_event_payload(&self, interaction: &Interaction) -> Admission {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        if !interaction.is_weapon_fire() {
            self.counters.ignored.fetch_add(1, Ordering::Relaxed);
            debug!("Ignoring {} interaction", interaction.class);
            return Admission::Ignored;
        }

        match self.decoder.decode(&interaction.parameters) {
            Ok(event) => self.admit(event),
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping WeaponFire payload: {}", e);
                Admission::Rejected
            }
        }
    }

    /// Admit an already-decoded event under the first-arrival rule.
    pub fn insert_decoded(&self, event: WeaponFireEvent) -> Admission {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        self.admit(event)
    }

    fn admit(&self, event: WeaponFireEvent) -> Admission {
        let identifier = event.identifier.clone();
        let inserted = self.discovered.lock().insert_if_absent(event);
        if inserted {
            self.counters.inserted.fetch_add(1, Ordering::Relaxed);
            debug!("Discovered WeaponFire {}", identifier);
            Admission::Inserted
        } else {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!("Duplicate WeaponFire {} ignored", identifier);
            Admission::Duplicate
        }
    }

    /// Copy of the discovered set as it stands now.
    pub fn snapshot(&self) -> DiscoveredSet {
        self.discovered.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.discovered.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.lock().is_empty()
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            received: self.counters.received.load(Ordering::Relaxed),
            inserted: self.counters.inserted.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
        }
    }

    /// Forget everything observed so far.
    pub fn clear(&self) {
        *self.discovered.lock() = DiscoveredSet::new();
        for counter in [
            &self.counters.received,
            &self.counters.inserted,
            &self.counters.duplicates,
            &self.counters.rejected,
            &self.counters.ignored,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl<D: WeaponFireDecoder> InteractionListener for EventCollector<D> {
    fn receive_interaction(&self, interaction: &Interaction) {
        self.on_event_payload(interaction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sut;
    use firecheck_protocol::codec::encode_weapon_fire;
    use firecheck_protocol::{ParameterMap, WARHEAD_TYPE};
    use std::sync::Arc;

    #[test]
    fn first_arrival_wins() {
        let collector = EventCollector::new();
        let first = sut(1);
        let mut second = sut(1);
        second.quantity_fired = 99;

        assert_eq!(
            collector.on_event_payload(&encode_weapon_fire(&first)),
            Admission::Inserted
        );
        assert_eq!(
            collector.on_event_payload(&encode_weapon_fire(&second)),
            Admission::Duplicate
        );

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(&first.identifier), Some(&first));
    }

    #[test]
    fn undecodable_payload_is_rejected_without_affecting_others() {
        let collector = EventCollector::new();
        let mut broken = encode_weapon_fire(&sut(1));
        broken.parameters.remove(WARHEAD_TYPE);

        assert_eq!(collector.on_event_payload(&broken), Admission::Rejected);
        assert_eq!(
            collector.on_event_payload(&encode_weapon_fire(&sut(2))),
            Admission::Inserted
        );

        let stats = collector.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.inserted, 1);
        assert!(!collector.snapshot().contains(&sut(1).identifier));
    }

    #[test]
    fn other_interaction_classes_are_ignored() {
        let collector = EventCollector::new();
        let other = Interaction::new("MunitionDetonation", ParameterMap::new());
        assert_eq!(collector.on_event_payload(&other), Admission::Ignored);
        assert!(collector.is_empty());
        assert_eq!(collector.stats().ignored, 1);
    }

    #[test]
    fn snapshot_is_detached_from_later_arrivals() {
        let collector = EventCollector::new();
        collector.insert_decoded(sut(1));
        let snapshot = collector.snapshot();
        collector.insert_decoded(sut(2));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn clear_resets_set_and_counters() {
        let collector = EventCollector::new();
        collector.insert_decoded(sut(1));
        collector.insert_decoded(sut(1));
        collector.clear();
        assert!(collector.is_empty());
        assert_eq!(collector.stats(), CollectorStats::default());
        assert_eq!(collector.insert_decoded(sut(1)), Admission::Inserted);
    }

    #[test]
    fn concurrent_duplicates_admit_exactly_one_per_identifier() {
        let collector = Arc::new(EventCollector::new());
        let threads: Vec<_> = (0..8u16)
            .map(|t| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    for count in 0..50u16 {
                        let mut event = sut(count);
                        // Each thread carries a distinguishable payload.
                        event.fire_mission_index = t as u32;
                        collector.on_event_payload(&encode_weapon_fire(&event));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let stats = collector.stats();
        assert_eq!(stats.received, 400);
        assert_eq!(stats.inserted, 50);
        assert_eq!(stats.duplicates, 350);
        assert_eq!(collector.len(), 50);
    }

    #[test]
    fn discovered_set_from_events_keeps_first() {
        let mut later = sut(1);
        later.fuse_type = 0;
        let set = DiscoveredSet::from_events([sut(1), later, sut(2)]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&sut(1).identifier).unwrap().fuse_type, 1100);
        let ids: Vec<u16> = set.iter().map(|e| e.identifier.event_count).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
