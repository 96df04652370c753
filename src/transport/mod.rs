/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::error::TowerError;
use async_trait::async_trait;

#[cfg(feature = "ble")]
pub mod ble;
#[cfg(feature = "serial")]
pub mod serial;

/// Transport interface definition
#[async_trait]
pub trait TowerTransport: Send {
    /// Open the link and prepare it for tower frames.
    /// Must be called before sending or receiving.
    async fn init(&mut self) -> Result<(), TowerError>;
    /// Read a tower frame. Returns frame body without the length header.
    async fn read_frame(&mut self) -> Result<Vec<u8>, TowerError>;
    /// Write a tower frame. The length header is calculated and prepended.
    async fn write_frame(&mut self, data: &[u8]) -> Result<(), TowerError>;
    /// Close the link. Calling it on a closed transport is a no-op.
    async fn disconnect(&mut self) -> Result<(), TowerError>;
}
