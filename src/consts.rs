/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::time::Duration;
use uuid::Uuid;

/// Local name advertised by the tower's BLE-UART bridge (HM-10 class module).
pub const TOWER_NAME: &str = "DSD TECH";

/// UART pass-through service exposed by the bridge.
pub const BLE_SERIALSVC_UUID: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);
/// Write / notify characteristic carrying tower frames.
pub const BLE_DATA_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);
/// Writing UTF-8 bytes here renames the module.
pub const BLE_NAME_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000ffe2_0000_1000_8000_00805f9b34fb);

pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(3);
/// Bonding has to settle before service discovery on some stacks.
pub const CONNECT_SETTLE_DELAY: Duration = Duration::from_millis(900);

/// Highest count a single die type can be set to.
pub const MAX_COUNT: u8 = 20;
/// Tower max frame length, header excluded.
pub const MAX_FRAME_LENGTH: usize = 64;
/// Module name limit imposed by the bridge firmware.
pub const MAX_NAME_LENGTH: usize = 12;

/// Default UART speed of the bridge.
pub const TOWER_BAUD: u32 = 9600;
