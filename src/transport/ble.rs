/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::TowerTransport;
use crate::codec::{build_frame, TowerCodec};
use crate::consts::{
    BLE_DATA_CHARACTERISTIC_UUID, BLE_NAME_CHARACTERISTIC_UUID, CONNECT_SETTLE_DELAY,
    MAX_NAME_LENGTH,
};
use crate::error::TowerError;
use crate::registry::{PeripheralEntry, PeripheralId};
use crate::session::Session;
use async_lock::Mutex;
use async_stream::stream;
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    ValueNotification, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::BytesMut;
use futures::stream::{Stream, StreamExt};
use log::{debug, error, trace, warn};
use pretty_hex::*;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::codec::Decoder;

/// ATT payload of a single write with the default MTU.
const BLE_CHUNK_SIZE: usize = 20;

/// What the scanner reports to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Discovered(PeripheralEntry),
    Disconnected(PeripheralId),
}

async fn describe(p: &Peripheral) -> Result<PeripheralEntry, TowerError> {
    let props = p
        .properties()
        .await
        .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
    let connected = p
        .is_connected()
        .await
        .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;

    let mut entry = PeripheralEntry::new(p.id().to_string(), None);
    if let Some(props) = props {
        entry.name = props.local_name;
        entry.rssi = props.rssi;
    }
    entry.connected = connected;
    Ok(entry)
}

pub type ScanEventStream = Pin<Box<dyn Stream<Item = ScanEvent> + Send>>;

/// Every adapter the platform exposes, in the order `list_adapters` prints them.
async fn system_adapters() -> Result<Vec<Adapter>, TowerError> {
    let manager = Manager::new()
        .await
        .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
    let adapters = manager
        .adapters()
        .await
        .map_err(|e| -> TowerError { TowerError::BTAdapterError(e.to_string()) })?;

    if adapters.is_empty() {
        return Err(TowerError::BTAdapterError(
            "no Bluetooth adapter present".to_string(),
        ));
    }
    Ok(adapters)
}

/// Finds towers through one Bluetooth adapter.
pub struct TowerScanner {
    adapter: Adapter,
    adapter_idx: usize,
}

impl TowerScanner {
    /// Bind to the adapter at `adapter_idx`, as numbered by [`TowerScanner::list_adapters`].
    pub async fn open(adapter_idx: usize) -> Result<Self, TowerError> {
        let adapter = system_adapters()
            .await?
            .into_iter()
            .nth(adapter_idx)
            .ok_or(TowerError::OutOfBounds)?;
        debug!("[open] scanning for towers on adapter {}", adapter_idx);
        Ok(Self {
            adapter,
            adapter_idx,
        })
    }

    /// Describe each adapter a tower could be reached through.
    pub async fn list_adapters() -> Result<Vec<String>, TowerError> {
        let mut names = vec![];
        for adapter in system_adapters().await? {
            names.push(
                adapter
                    .adapter_info()
                    .await
                    .map_err(|e| -> TowerError { TowerError::BTAdapterError(e.to_string()) })?,
            );
        }
        Ok(names)
    }

    pub fn adapter_index(&self) -> usize {
        self.adapter_idx
    }

    fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Central events of the current adapter, resolved into session events.
    pub async fn events(&self) -> Result<ScanEventStream, TowerError> {
        let adapter = self.adapter().clone();
        let mut events = adapter
            .events()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;

        Ok(Box::pin(stream! {
            while let Some(event) = events.next().await {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        let peripheral = match adapter.peripheral(&id).await {
                            Ok(p) => p,
                            Err(e) => {
                                trace!("[{}] peripheral vanished: {}", id, e);
                                continue;
                            }
                        };
                        match describe(&peripheral).await {
                            Ok(entry) => {
                                yield ScanEvent::Discovered(entry);
                            }
                            Err(e) => warn!("[{}] unable to read properties: {}", id, e),
                        }
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        yield ScanEvent::Disconnected(id.to_string());
                    }
                    _ => {}
                }
            }
        }))
    }

    /// Scan for `duration`, feeding discoveries into the session.
    /// Returns the number of towers known afterwards.
    pub async fn scan(&self, duration: Duration, session: &Mutex<Session>) -> Result<usize, TowerError> {
        if !session.lock().await.begin_scan() {
            return Ok(session.lock().await.registry().len());
        }

        let res = self.run_scan(duration, session).await;
        if let Err(e) = self.adapter().stop_scan().await {
            warn!("[scan] failed to stop scan: {}", e);
        }
        session.lock().await.on_stop_scan();

        if let Err(e) = res {
            error!("[scan] ble scan returned in error: {}", e);
            return Err(e);
        }
        Ok(session.lock().await.registry().len())
    }

    async fn run_scan(&self, duration: Duration, session: &Mutex<Session>) -> Result<(), TowerError> {
        let mut events = self.events().await?;

        self.adapter()
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;

        let deadline = time::Instant::now() + duration;
        loop {
            match time::timeout_at(deadline, events.next()).await {
                Ok(Some(ScanEvent::Discovered(entry))) => session.lock().await.on_discover(entry),
                Ok(Some(ScanEvent::Disconnected(id))) => session.lock().await.on_disconnect(&id),
                Ok(None) | Err(_) => break,
            }
        }

        // Peripherals cached by the backend do not always emit a discovery event.
        let known = self
            .adapter()
            .peripherals()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
        for p in known {
            match describe(&p).await {
                Ok(entry) => session.lock().await.on_discover(entry),
                Err(e) => trace!("[scan] skipping cached peripheral: {}", e),
            }
        }
        Ok(())
    }

    /// Add peripherals the system already holds a connection to.
    pub async fn retrieve_connected(&self, session: &Mutex<Session>) -> Result<usize, TowerError> {
        let peripherals = self
            .adapter()
            .peripherals()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;

        let mut found = 0;
        for p in peripherals {
            let entry = describe(&p).await?;
            if entry.connected {
                debug!("[retrieve_connected][{}] {}", entry.id, entry.display_name());
                session.lock().await.registry_mut().add_or_update(entry);
                found += 1;
            }
        }

        if found == 0 {
            warn!("[retrieve_connected] No connected peripherals found.");
        }
        Ok(found)
    }

    /// Look up a previously discovered peripheral.
    pub async fn find(&self, id: &str) -> Result<Peripheral, TowerError> {
        let peripherals = self
            .adapter()
            .peripherals()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;

        peripherals
            .into_iter()
            .find(|p| p.id().to_string() == id)
            .ok_or_else(|| TowerError::UnknownPeripheral(id.to_string()))
    }

    /// Keep the session's connection flags current in the background.
    pub async fn watch_disconnects(
        &self,
        session: Arc<Mutex<Session>>,
    ) -> Result<JoinHandle<()>, TowerError> {
        let mut events = self.events().await?;
        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let ScanEvent::Disconnected(id) = event {
                    session.lock().await.on_disconnect(&id);
                }
            }
        }))
    }
}

#[derive(Clone)]
pub struct TowerCharacteristics {
    data: Characteristic,
    name: Option<Characteristic>,
}

type NotificationStream = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

pub struct BLETransport {
    tower: Peripheral,
    chars: Option<TowerCharacteristics>,
    notifications: Option<NotificationStream>,
    rx: BytesMut,
    rssi: Option<i16>,
}

impl BLETransport {
    pub fn new(tower: Peripheral) -> Self {
        Self {
            tower,
            chars: None,
            notifications: None,
            rx: BytesMut::new(),
            rssi: None,
        }
    }

    pub fn id(&self) -> PeripheralId {
        self.tower.id().to_string()
    }

    /// Signal strength read right after connecting.
    pub fn rssi(&self) -> Option<i16> {
        self.rssi
    }

    fn chars(&self) -> Result<&TowerCharacteristics, TowerError> {
        self.chars.as_ref().ok_or(TowerError::NotConnected)
    }

    /// Write a new advertised name to the bridge module.
    pub async fn rename(&mut self, name: &str) -> Result<(), TowerError> {
        validate_name(name)?;
        let chars = self.chars()?.clone();
        let target = chars.name.ok_or(TowerError::BTNoCharacteristics)?;
        self.tower
            .write(&target, name.as_bytes(), WriteType::WithResponse)
            .await
            .map_err(|e| -> TowerError { TowerError::IOFailure(e.to_string()) })?;
        debug!("[{}] module renamed to {:?}", self.id(), name);
        Ok(())
    }
}

/// Log every descriptor the tower exposes. Failures are logged, not returned.
async fn read_descriptors(tower: &Peripheral) {
    let id = tower.id().to_string();
    for characteristic in tower.characteristics() {
        for descriptor in characteristic.descriptors.iter() {
            match tower.read_descriptor(descriptor).await {
                Ok(data) => debug!(
                    "[{}] descriptor {} read as: {:?}",
                    id,
                    descriptor.uuid,
                    data.hex_dump()
                ),
                Err(e) => error!(
                    "[{}] failed to retrieve descriptor {} for characteristic {}: {}",
                    id, descriptor.uuid, characteristic.uuid, e
                ),
            }
        }
    }
}

pub fn validate_name(name: &str) -> Result<(), TowerError> {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(TowerError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl TowerTransport for BLETransport {
    async fn init(&mut self) -> Result<(), TowerError> {
        self.tower
            .connect()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
        debug!("[{}] connected.", self.id());

        time::sleep(CONNECT_SETTLE_DELAY).await;

        self.tower
            .discover_services()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
        debug!(
            "[{}] retrieved {} characteristics",
            self.id(),
            self.tower.characteristics().len()
        );

        self.rssi = self
            .tower
            .properties()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?
            .and_then(|p| p.rssi);
        debug!("[{}] current RSSI value: {:?}", self.id(), self.rssi);

        read_descriptors(&self.tower).await;

        let chars = self.tower.characteristics();
        let data = chars
            .iter()
            .find(|c| c.uuid == BLE_DATA_CHARACTERISTIC_UUID)
            .ok_or(TowerError::BTNoCharacteristics)?
            .clone();
        let name = chars
            .iter()
            .find(|c| c.uuid == BLE_NAME_CHARACTERISTIC_UUID)
            .cloned();

        self.tower
            .subscribe(&data)
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
        self.notifications = Some(
            self.tower
                .notifications()
                .await
                .map_err(|e| -> TowerError { TowerError::IOFailure(e.to_string()) })?,
        );

        self.chars = Some(TowerCharacteristics { data, name });

        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>, TowerError> {
        // Empty the buffer first.
        if let Some(x) = TowerCodec.decode(&mut self.rx)? {
            return Ok(x);
        }

        let data_uuid = self.chars()?.data.uuid;
        let notifications = self
            .notifications
            .as_mut()
            .ok_or(TowerError::NotConnected)?;
        loop {
            let notif = notifications
                .next()
                .await
                .ok_or_else(|| TowerError::IOFailure("notification stream closed".to_string()))?;

            if notif.uuid != data_uuid {
                continue;
            }

            trace!("BTLE RX: {:?}\n", notif.value.hex_dump());
            self.rx.extend_from_slice(&notif.value);
            if let Some(x) = TowerCodec.decode(&mut self.rx)? {
                return Ok(x);
            }
            // Data is not ready yet, loop back and wait again.
        }
    }

    async fn write_frame(&mut self, data: &[u8]) -> Result<(), TowerError> {
        let chars = self.chars()?.clone();
        let frame = build_frame(data)?;
        trace!("BTLE TX: {:?}\n", frame.hex_dump());

        for chunk in frame.chunks(BLE_CHUNK_SIZE) {
            self.tower
                .write(&chars.data, chunk, WriteType::WithoutResponse)
                .await
                .map_err(|e| -> TowerError { TowerError::IOFailure(e.to_string()) })?;
        }

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TowerError> {
        self.notifications = None;
        if let Some(chars) = self.chars.take() {
            if let Err(e) = self.tower.unsubscribe(&chars.data).await {
                debug!("[{}] unsubscribe failed: {}", self.id(), e);
            }
        }

        let connected = self
            .tower
            .is_connected()
            .await
            .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
        if connected {
            self.tower
                .disconnect()
                .await
                .map_err(|e| -> TowerError { TowerError::BTFailure(e.to_string()) })?;
            debug!("[{}] disconnected.", self.id());
        }
        self.rx.clear();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn module_names_are_bounded() {
        assert!(validate_name("TOWER").is_ok());
        assert!(validate_name("ABCDEFGHIJKL").is_ok());
        assert_eq!(
            validate_name("ABCDEFGHIJKLM"),
            Err(TowerError::InvalidName("ABCDEFGHIJKLM".to_string()))
        );
        assert!(validate_name("").is_err());
    }

    #[test]
    fn connect_futures_are_send() {
        fn assert_send<T: Send>(_: &T) {}
        // Type-checked only; needs no radio.
        let _ = |scanner: &TowerScanner| {
            assert_send(&TowerScanner::open(0));
            assert_send(&TowerScanner::list_adapters());
            assert_send(&scanner.events());
        };
        let _ = |transport: &mut BLETransport, tower: &Peripheral| {
            assert_send(&read_descriptors(tower));
            assert_send(&transport.init());
            assert_send(&transport.read_frame());
            assert_send(&transport.rename("TOWER"));
        };
    }

    #[test]
    fn roll_frame_fits_in_one_write() {
        let frame = build_frame(&crate::codec::Command::Roll(Default::default()).to_payload())
            .unwrap();
        assert!(frame.len() <= BLE_CHUNK_SIZE);
    }
}
