/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::dice::RollVector;
use crate::error::TowerError;
use crate::registry::{PeripheralEntry, PeripheralId, PeripheralRegistry};
use log::{debug, warn};
use pretty_hex::*;

/// Which view the client is on. Derived from the selected tower only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    DeviceList,
    TowerPanel(PeripheralId),
}

/// Client-side state: discovered towers, the selected one and the roll vector.
#[derive(Debug, Default)]
pub struct Session {
    registry: PeripheralRegistry,
    selected: Option<PeripheralId>,
    roll: RollVector,
    scanning: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that treats peripherals advertising `name` as towers.
    pub fn with_tower_name(name: &str) -> Self {
        Self {
            registry: PeripheralRegistry::with_tower_name(name),
            ..Self::default()
        }
    }

    pub fn registry(&self) -> &PeripheralRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PeripheralRegistry {
        &mut self.registry
    }

    pub fn roll(&self) -> &RollVector {
        &self.roll
    }

    pub fn roll_mut(&mut self) -> &mut RollVector {
        &mut self.roll
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn selected(&self) -> Option<&PeripheralEntry> {
        self.selected.as_deref().and_then(|id| self.registry.get(id))
    }

    pub fn screen(&self) -> Screen {
        match &self.selected {
            Some(id) => Screen::TowerPanel(id.clone()),
            None => Screen::DeviceList,
        }
    }

    /// Resets the registry for a fresh scan. Returns false if one is already running.
    pub fn begin_scan(&mut self) -> bool {
        if self.scanning {
            debug!("[begin_scan] scan already in progress.");
            return false;
        }
        self.registry.clear();
        if self.selected.take().is_some() {
            debug!("[begin_scan] dropping selection, registry was reset.");
        }
        self.scanning = true;
        true
    }

    pub fn select(&mut self, id: &str) -> Result<(), TowerError> {
        if !self.registry.contains(id) {
            return Err(TowerError::UnknownPeripheral(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn deselect(&mut self) -> Option<PeripheralId> {
        self.selected.take()
    }

    pub fn on_discover(&mut self, entry: PeripheralEntry) {
        if !self.registry.accepts(entry.name.as_deref()) {
            return;
        }
        // The backend reports `connected` fresh; `connecting` is only tracked here.
        let entry = match self.registry.get(&entry.id) {
            Some(known) => PeripheralEntry {
                connecting: known.connecting,
                ..entry
            },
            None => entry,
        };
        debug!("[on_discover][{}] {}", entry.id, entry.display_name());
        self.registry.add_or_update(entry);
    }

    pub fn on_stop_scan(&mut self) {
        self.scanning = false;
        debug!("[on_stop_scan] scan is stopped.");
    }

    pub fn on_disconnect(&mut self, id: &str) {
        if self.registry.contains(id) {
            debug!(
                "[on_disconnect][{}] previously connected peripheral is disconnected.",
                id
            );
            self.registry.mark_disconnected(id);
        }
        if self.selected.as_deref() == Some(id) {
            warn!("[on_disconnect][{}] selected tower dropped, back to device list.", id);
            self.selected = None;
        }
        debug!("[on_disconnect][{}] disconnected.", id);
    }

    pub fn on_value_update(&self, id: &str, characteristic: &uuid::Uuid, value: &[u8]) {
        debug!(
            "[on_value_update] received data from '{}' with characteristic='{}' and value=\n{}",
            id,
            characteristic,
            value.hex_dump()
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::TOWER_NAME;
    use crate::dice::DieType;

    fn tower(id: &str) -> PeripheralEntry {
        PeripheralEntry::new(id, Some(TOWER_NAME.to_string()))
    }

    #[test]
    fn starts_on_device_list() {
        let session = Session::new();
        assert_eq!(session.screen(), Screen::DeviceList);
        assert!(session.selected().is_none());
        assert!(session.roll().is_empty());
    }

    #[test]
    fn discover_filters_by_name() {
        let mut session = Session::new();
        session.on_discover(tower("aa"));
        session.on_discover(PeripheralEntry::new("bb", Some("Headphones".to_string())));
        session.on_discover(PeripheralEntry::new("cc", None));
        assert_eq!(session.registry().len(), 1);
        assert!(session.registry().contains("aa"));
    }

    #[test]
    fn rediscovery_takes_backend_connection_state() {
        let mut session = Session::new();
        session.on_discover(tower("aa"));
        session.registry_mut().mark_connected("aa");
        let mut seen_again = tower("aa");
        seen_again.rssi = Some(-70);
        session.on_discover(seen_again);
        let p = session.registry().get("aa").unwrap();
        assert!(!p.connected);
        assert_eq!(p.rssi, Some(-70));

        let mut reconnected = tower("aa");
        reconnected.connected = true;
        session.on_discover(reconnected);
        assert!(session.registry().get("aa").unwrap().connected);
    }

    #[test]
    fn rediscovery_keeps_connecting_flag() {
        let mut session = Session::new();
        session.on_discover(tower("aa"));
        session.registry_mut().mark_connecting("aa");
        session.on_discover(tower("aa"));
        assert!(session.registry().get("aa").unwrap().connecting);
    }

    #[test]
    fn discover_uses_configured_tower_name() {
        let mut session = Session::with_tower_name("TOWER-2");
        session.on_discover(tower("aa"));
        session.on_discover(PeripheralEntry::new("bb", Some("TOWER-2".to_string())));
        assert!(!session.registry().contains("aa"));
        assert!(session.registry().contains("bb"));

        // A fresh scan keeps the configured name.
        assert!(session.begin_scan());
        session.on_discover(PeripheralEntry::new("cc", Some("TOWER-2".to_string())));
        assert!(session.registry().contains("cc"));
    }

    #[test]
    fn disconnect_of_other_tower_keeps_selection() {
        let mut session = Session::new();
        session.on_discover(tower("aa"));
        session.on_discover(tower("bb"));
        session.registry_mut().mark_connected("aa");
        session.registry_mut().mark_connected("bb");
        session.select("aa").unwrap();
        session.on_disconnect("bb");
        assert_eq!(session.screen(), Screen::TowerPanel("aa".to_string()));
        assert!(session.registry().get("aa").unwrap().connected);
        assert!(!session.registry().get("bb").unwrap().connected);
    }

    #[test]
    fn select_and_back() {
        let mut session = Session::new();
        assert_eq!(
            session.select("aa"),
            Err(TowerError::UnknownPeripheral("aa".to_string()))
        );
        session.on_discover(tower("aa"));
        session.select("aa").unwrap();
        assert_eq!(session.screen(), Screen::TowerPanel("aa".to_string()));
        assert_eq!(session.deselect(), Some("aa".to_string()));
        assert_eq!(session.screen(), Screen::DeviceList);
    }

    #[test]
    fn scan_resets_registry_once() {
        let mut session = Session::new();
        session.on_discover(tower("aa"));
        session.select("aa").unwrap();
        assert!(session.begin_scan());
        assert!(session.is_scanning());
        assert!(session.registry().is_empty());
        assert_eq!(session.screen(), Screen::DeviceList);

        session.on_discover(tower("bb"));
        assert!(!session.begin_scan());
        assert!(session.registry().contains("bb"));

        session.on_stop_scan();
        assert!(!session.is_scanning());
    }

    #[test]
    fn disconnect_of_selected_returns_to_list() {
        let mut session = Session::new();
        session.on_discover(tower("aa"));
        session.registry_mut().mark_connected("aa");
        session.select("aa").unwrap();
        session.on_disconnect("aa");
        assert_eq!(session.screen(), Screen::DeviceList);
        assert!(!session.registry().get("aa").unwrap().connected);
    }

    #[test]
    fn roll_vector_survives_navigation() {
        let mut session = Session::new();
        session.on_discover(tower("aa"));
        session.select("aa").unwrap();
        session.roll_mut().increment(DieType::D20);
        session.deselect();
        assert_eq!(session.roll().get(DieType::D20), 1);
    }
}
