/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::codec::Command;
use crate::dice::{DieType, RollVector};
use crate::error::TowerError;
use crate::transport::TowerTransport;
use log::{debug, info};
use pretty_hex::*;
use std::time::Duration;
use tokio::time;

/// A connected tower speaking over some transport.
pub struct Tower<T: TowerTransport> {
    transport: T,
}

impl<T: TowerTransport> Tower<T> {
    /// Initializes the transport before handing the tower out.
    pub async fn open(mut transport: T) -> Result<Self, TowerError> {
        transport.init().await?;
        Ok(Self { transport })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub async fn send(&mut self, command: &Command) -> Result<(), TowerError> {
        let payload = command.to_payload();
        debug!("Sending {:?}\n{}", command, payload.hex_dump());
        self.transport.write_frame(&payload).await
    }

    /// Roll the configured dice. An all-zero vector is rejected.
    pub async fn roll(&mut self, roll: &RollVector) -> Result<(), TowerError> {
        if roll.is_empty() {
            return Err(TowerError::EmptyRoll);
        }
        info!("Rolling {}", roll);
        self.send(&Command::Roll(*roll)).await
    }

    pub async fn roll_single(&mut self, die: DieType) -> Result<(), TowerError> {
        self.roll(&RollVector::single(die)).await
    }

    /// Next frame from the tower, or `None` if nothing arrives in time.
    pub async fn await_reply(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TowerError> {
        match time::timeout(timeout, self.transport.read_frame()).await {
            Ok(frame) => frame.map(Some),
            Err(_) => Ok(None),
        }
    }

    pub async fn close(mut self) -> Result<T, TowerError> {
        self.transport.disconnect().await?;
        Ok(self.transport)
    }
}
