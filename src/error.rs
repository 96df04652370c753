/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TowerError {
    #[error("Failed to fetch adapter list: {0}")]
    BTAdapterError(String),
    #[error("Generic BT error: {0}")]
    BTFailure(String),
    #[error("BT characteristics does not exist. Maybe invalid device?")]
    BTNoCharacteristics,
    #[error("No tower with id {0} was discovered.")]
    UnknownPeripheral(String),
    #[error("Transport is not initialized.")]
    NotConnected,
    #[error("Failed to do I/O: {0}")]
    IOFailure(String),
    #[error("Data too large to process: {0}")]
    DataTooLarge(usize),
    #[error("Count {0} exceeds the per-die maximum.")]
    CountTooLarge(u8),
    #[error("Unknown die type: {0}")]
    UnknownDie(String),
    #[error("Refusing to roll: no dice selected.")]
    EmptyRoll,
    #[error("Invalid module name: {0}")]
    InvalidName(String),
    #[error("Index out of bounds.")]
    OutOfBounds,
}

impl From<std::io::Error> for TowerError {
    fn from(e: std::io::Error) -> Self {
        TowerError::IOFailure(e.to_string())
    }
}
