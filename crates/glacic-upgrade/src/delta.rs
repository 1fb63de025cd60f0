use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::state::{DhcpLease, DnsCacheEntry, StateDelta};

/// Accumulates DHCP and DNS changes made while an upgrade is in flight.
///
/// Leases have set semantics keyed by MAC: the latest add wins, and an add
/// and a release of the same MAC cancel each other. DNS additions are kept
/// in arrival order. Once stopped, every `record_*` call is a no-op.
#[derive(Debug)]
pub struct DeltaCollector {
    inner: Mutex<Pending>,
}

#[derive(Debug)]
struct Pending {
    checkpoint_id: u64,
    dhcp_added: BTreeMap<String, DhcpLease>,
    dhcp_removed: BTreeSet<String>,
    dns_added: Vec<DnsCacheEntry>,
    active: bool,
}

impl DeltaCollector {
    pub fn new(checkpoint_id: u64) -> Self {
        Self {
            inner: Mutex::new(Pending {
                checkpoint_id,
                dhcp_added: BTreeMap::new(),
                dhcp_removed: BTreeSet::new(),
                dns_added: Vec::new(),
                active: true,
            }),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_lease(&self, lease: DhcpLease) {
        let mut pending = self.pending();
        if !pending.active {
            return;
        }
        pending.dhcp_removed.remove(&lease.mac);
        pending.dhcp_added.insert(lease.mac.clone(), lease);
    }

    pub fn record_release(&self, mac: &str) {
        let mut pending = self.pending();
        if !pending.active {
            return;
        }
        pending.dhcp_added.remove(mac);
        pending.dhcp_removed.insert(mac.to_string());
    }

    pub fn record_dns(&self, entry: DnsCacheEntry) {
        let mut pending = self.pending();
        if pending.active {
            pending.dns_added.push(entry);
        }
    }

    /// Takes everything recorded so far and moves to the next checkpoint.
    pub fn flush(&self) -> StateDelta {
        let mut pending = self.pending();
        let delta = StateDelta {
            checkpoint_id: pending.checkpoint_id,
            dhcp_added: std::mem::take(&mut pending.dhcp_added).into_values().collect(),
            dhcp_removed: std::mem::take(&mut pending.dhcp_removed)
                .into_iter()
                .collect(),
            dns_added: std::mem::take(&mut pending.dns_added),
            timestamp: Utc::now(),
        };
        pending.checkpoint_id += 1;
        delta
    }

    pub fn stop(&self) {
        self.pending().active = false;
    }

    pub fn is_active(&self) -> bool {
        self.pending().active
    }

    pub fn is_empty(&self) -> bool {
        let pending = self.pending();
        pending.dhcp_added.is_empty() && pending.dhcp_removed.is_empty() && pending.dns_added.is_empty()
    }

    pub fn checkpoint_id(&self) -> u64 {
        self.pending().checkpoint_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lease(mac: &str, ip: &str) -> DhcpLease {
        DhcpLease {
            mac: mac.into(),
            ip: ip.into(),
            hostname: String::new(),
            expires: Utc::now(),
            interface: "eth1".into(),
        }
    }

    fn dns(name: &str) -> DnsCacheEntry {
        DnsCacheEntry {
            name: name.into(),
            record_type: 1,
            ttl: 60,
            data: vec![10, 0, 0, 1],
            expires: Utc::now(),
        }
    }

    #[test]
    fn test_release_then_add_keeps_only_add() {
        let collector = DeltaCollector::new(1);
        collector.record_release("aa");
        collector.record_lease(lease("aa", "10.0.0.5"));
        let delta = collector.flush();
        assert_eq!(delta.dhcp_added.len(), 1);
        assert_eq!(delta.dhcp_added[0].mac, "aa");
        assert_eq!(delta.dhcp_added[0].ip, "10.0.0.5");
        assert!(delta.dhcp_removed.is_empty());
    }

    #[test]
    fn test_latest_add_wins() {
        let collector = DeltaCollector::new(1);
        collector.record_lease(lease("aa", "10.0.0.5"));
        collector.record_lease(lease("aa", "10.0.0.6"));
        let delta = collector.flush();
        assert_eq!(delta.dhcp_added.len(), 1);
        assert_eq!(delta.dhcp_added[0].ip, "10.0.0.6");
    }

    #[test]
    fn test_add_then_release_keeps_only_release() {
        let collector = DeltaCollector::new(1);
        collector.record_lease(lease("aa", "10.0.0.5"));
        collector.record_release("aa");
        let delta = collector.flush();
        assert!(delta.dhcp_added.is_empty());
        assert_eq!(delta.dhcp_removed, vec!["aa".to_string()]);
    }

    #[test]
    fn test_flush_resets_and_bumps_checkpoint() {
        let collector = DeltaCollector::new(5);
        assert!(collector.is_empty());
        collector.record_dns(dns("a.example."));
        collector.record_dns(dns("b.example."));
        assert!(!collector.is_empty());

        let delta = collector.flush();
        assert_eq!(delta.checkpoint_id, 5);
        let names: Vec<&str> = delta.dns_added.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.example.", "b.example."]);

        assert!(collector.is_empty());
        assert_eq!(collector.checkpoint_id(), 6);
        assert!(collector.flush().is_empty());
    }

    #[test]
    fn test_recording_after_stop_is_ignored() {
        let collector = DeltaCollector::new(1);
        collector.record_lease(lease("aa", "10.0.0.5"));
        collector.stop();
        collector.stop();
        assert!(!collector.is_active());

        collector.record_lease(lease("bb", "10.0.0.6"));
        collector.record_release("aa");
        collector.record_dns(dns("late.example."));

        let delta = collector.flush();
        assert_eq!(delta.dhcp_added.len(), 1);
        assert_eq!(delta.dhcp_added[0].mac, "aa");
        assert!(delta.dhcp_removed.is_empty());
        assert!(delta.dns_added.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8, u8),
        Release(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4, any::<u8>()).prop_map(|(mac, host)| Op::Add(mac, host)),
            (0u8..4).prop_map(Op::Release),
        ]
    }

    proptest! {
        #[test]
        fn test_each_mac_ends_in_exactly_the_last_state(ops in proptest::collection::vec(op(), 0..40)) {
            let collector = DeltaCollector::new(0);
            let mut expected: BTreeMap<String, Option<String>> = BTreeMap::new();
            for op in &ops {
                match op {
                    Op::Add(mac, host) => {
                        let mac = format!("mac{mac}");
                        let ip = format!("10.0.0.{host}");
                        collector.record_lease(lease(&mac, &ip));
                        expected.insert(mac, Some(ip));
                    }
                    Op::Release(mac) => {
                        let mac = format!("mac{mac}");
                        collector.record_release(&mac);
                        expected.insert(mac, None);
                    }
                }
            }

            let delta = collector.flush();
            let added: BTreeMap<String, String> = delta
                .dhcp_added
                .iter()
                .map(|l| (l.mac.clone(), l.ip.clone()))
                .collect();
            let removed: BTreeSet<String> = delta.dhcp_removed.iter().cloned().collect();
            for (mac, state) in &expected {
                match state {
                    Some(ip) => {
                        prop_assert_eq!(added.get(mac), Some(ip));
                        prop_assert!(!removed.contains(mac));
                    }
                    None => {
                        prop_assert!(removed.contains(mac));
                        prop_assert!(!added.contains_key(mac));
                    }
                }
            }
            prop_assert_eq!(added.len() + removed.len(), expected.len());
        }
    }
}
