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
use crate::consts::TOWER_BAUD;
use crate::error::TowerError;
use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time;
use tokio_serial::{self, SerialPortBuilderExt, SerialStream};
use tokio_util::codec::Decoder;

use pretty_hex::*;

/// How long the line has to stay quiet before it counts as drained.
const DRAIN_QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Tower wired over a USB-UART adapter instead of the BLE bridge.
pub struct SerialTransport {
    tty: String,
    port: Option<SerialStream>,
    rx: BytesMut,
}

impl SerialTransport {
    pub fn new(tty: &str) -> Self {
        Self {
            tty: tty.to_string(),
            port: None,
            rx: BytesMut::new(),
        }
    }

    fn port(&mut self) -> Result<&mut SerialStream, TowerError> {
        self.port.as_mut().ok_or(TowerError::NotConnected)
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<(), TowerError> {
        trace!("Serial Write - {}", data.hex_dump());
        let port = self.port()?;
        port.write_all(data).await?;
        port.flush().await?;
        Ok(())
    }

    /// Discard whatever the tower printed before we attached.
    async fn drain_stale_input(&mut self) -> Result<(), TowerError> {
        let mut buf = [0u8; 256];
        let port = self.port()?;
        let mut dropped = 0;
        while let Ok(res) = time::timeout(DRAIN_QUIET_PERIOD, port.read(&mut buf)).await {
            let readsz = res?;
            if readsz == 0 {
                break;
            }
            trace!("Serial Drain - {}", buf[0..readsz].hex_dump());
            dropped += readsz;
        }
        debug!("Dropped {} stale bytes from {}", dropped, self.tty);
        Ok(())
    }
}

#[async_trait]
impl TowerTransport for SerialTransport {
    async fn init(&mut self) -> Result<(), TowerError> {
        let port = tokio_serial::new(&self.tty, TOWER_BAUD)
            .open_native_async()
            .map_err(|e| -> TowerError { TowerError::IOFailure(e.to_string()) })?;
        self.port = Some(port);
        self.rx.clear();
        self.drain_stale_input().await
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>, TowerError> {
        let mut buf = [0u8; 256];
        loop {
            if let Some(x) = TowerCodec.decode(&mut self.rx)? {
                return Ok(x);
            }
            let readsz = self.port()?.read(&mut buf).await?;
            if readsz == 0 {
                return Err(TowerError::IOFailure(format!("{} closed", self.tty)));
            }
            trace!("Serial Read - {}", buf[0..readsz].hex_dump());
            self.rx.extend_from_slice(&buf[0..readsz]);
        }
    }

    async fn write_frame(&mut self, data: &[u8]) -> Result<(), TowerError> {
        let frame = build_frame(data)?;
        self.write_raw(&frame).await
    }

    async fn disconnect(&mut self) -> Result<(), TowerError> {
        self.port = None;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn write_before_init_is_rejected() {
        let mut transport = SerialTransport::new("/dev/null-tower");
        assert_eq!(
            transport.write_frame(&[0x01]).await,
            Err(TowerError::NotConnected)
        );
        assert_eq!(transport.read_frame().await, Err(TowerError::NotConnected));
    }
}
