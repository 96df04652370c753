/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::consts::TOWER_NAME;
use log::debug;
use std::collections::BTreeMap;

/// Identifier of a peripheral as reported by the BLE backend.
pub type PeripheralId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralEntry {
    pub id: PeripheralId,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub connected: bool,
    pub connecting: bool,
}

impl PeripheralEntry {
    pub fn new(id: impl Into<PeripheralId>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            rssi: None,
            connected: false,
            connecting: false,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("NO NAME")
    }
}

/// Discovered towers, keyed by peripheral id.
#[derive(Debug)]
pub struct PeripheralRegistry {
    tower_name: String,
    peripherals: BTreeMap<PeripheralId, PeripheralEntry>,
}

impl Default for PeripheralRegistry {
    fn default() -> Self {
        Self::with_tower_name(TOWER_NAME)
    }
}

impl PeripheralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for towers whose bridge was renamed away from [`TOWER_NAME`].
    pub fn with_tower_name(name: &str) -> Self {
        Self {
            tower_name: name.to_string(),
            peripherals: BTreeMap::new(),
        }
    }

    pub fn tower_name(&self) -> &str {
        &self.tower_name
    }

    /// Whether an advertised local name belongs to a tower.
    pub fn accepts(&self, name: Option<&str>) -> bool {
        name == Some(self.tower_name.as_str())
    }

    pub fn clear(&mut self) {
        self.peripherals.clear();
    }

    /// Last write wins.
    pub fn add_or_update(&mut self, entry: PeripheralEntry) {
        self.peripherals.insert(entry.id.clone(), entry);
    }

    pub fn get(&self, id: &str) -> Option<&PeripheralEntry> {
        self.peripherals.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peripherals.contains_key(id)
    }

    pub fn mark_connecting(&mut self, id: &str) {
        self.update(id, |p| {
            p.connecting = true;
            p.connected = false;
        });
    }

    pub fn mark_connected(&mut self, id: &str) {
        self.update(id, |p| {
            p.connecting = false;
            p.connected = true;
        });
    }

    pub fn mark_disconnected(&mut self, id: &str) {
        self.update(id, |p| {
            p.connecting = false;
            p.connected = false;
        });
    }

    pub fn set_rssi(&mut self, id: &str, rssi: i16) {
        self.update(id, |p| p.rssi = Some(rssi));
    }

    /// Entries in id order, so listings are stable between refreshes.
    pub fn list(&self) -> impl Iterator<Item = &PeripheralEntry> {
        self.peripherals.values()
    }

    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }

    fn update(&mut self, id: &str, f: impl FnOnce(&mut PeripheralEntry)) {
        match self.peripherals.get_mut(id) {
            Some(entry) => f(entry),
            None => debug!("[{}] ignoring update for unknown peripheral", id),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tower(id: &str) -> PeripheralEntry {
        PeripheralEntry::new(id, Some(TOWER_NAME.to_string()))
    }

    #[test]
    fn only_towers_are_accepted() {
        let registry = PeripheralRegistry::new();
        assert!(registry.accepts(Some("DSD TECH")));
        assert!(!registry.accepts(Some("DSD TECH 2")));
        assert!(!registry.accepts(None));
    }

    #[test]
    fn renamed_towers_are_accepted() {
        let mut registry = PeripheralRegistry::with_tower_name("TOWER-2");
        assert!(registry.accepts(Some("TOWER-2")));
        assert!(!registry.accepts(Some(TOWER_NAME)));
        registry.add_or_update(PeripheralEntry::new("aa", Some("TOWER-2".to_string())));
        registry.clear();
        assert_eq!(registry.tower_name(), "TOWER-2");
    }

    #[test]
    fn last_write_wins() {
        let mut registry = PeripheralRegistry::new();
        registry.add_or_update(tower("aa"));
        let mut updated = tower("aa");
        updated.rssi = Some(-40);
        registry.add_or_update(updated);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("aa").unwrap().rssi, Some(-40));
    }

    #[test]
    fn connection_flags_follow_lifecycle() {
        let mut registry = PeripheralRegistry::new();
        registry.add_or_update(tower("aa"));

        registry.mark_connecting("aa");
        let p = registry.get("aa").unwrap();
        assert!(p.connecting && !p.connected);

        registry.mark_connected("aa");
        let p = registry.get("aa").unwrap();
        assert!(!p.connecting && p.connected);

        registry.mark_disconnected("aa");
        let p = registry.get("aa").unwrap();
        assert!(!p.connecting && !p.connected);
    }

    #[test]
    fn updates_to_unknown_ids_are_ignored() {
        let mut registry = PeripheralRegistry::new();
        registry.mark_connected("zz");
        registry.set_rssi("zz", -10);
        assert!(registry.is_empty());
    }

    #[test]
    fn list_is_ordered_by_id() {
        let mut registry = PeripheralRegistry::new();
        registry.add_or_update(tower("cc"));
        registry.add_or_update(tower("aa"));
        registry.add_or_update(tower("bb"));
        let ids: Vec<_> = registry.list().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["aa", "bb", "cc"]);
        registry.clear();
        assert!(registry.is_empty());
    }
}
