/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Client for a BLE dice-rolling tower: discovery, per-die roll counts and
//! the roll command frame.

pub mod action;
pub mod codec;
pub mod consts;
pub mod dice;
pub mod error;
pub mod registry;
pub mod session;
pub mod tower;
pub mod transport;

pub use dice::{DieType, RollVector};
pub use error::TowerError;
pub use session::{Screen, Session};
pub use tower::Tower;
