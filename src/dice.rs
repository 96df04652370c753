/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::consts::MAX_COUNT;
use crate::error::TowerError;
use std::fmt;
use std::str::FromStr;

/// Die types the tower can roll, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub const ALL: [DieType; 7] = [
        DieType::D4,
        DieType::D6,
        DieType::D8,
        DieType::D10,
        DieType::D12,
        DieType::D20,
        DieType::D100,
    ];

    /// Position of this die in a [`RollVector`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn sides(self) -> u8 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DieType::D4 => "D4",
            DieType::D6 => "D6",
            DieType::D8 => "D8",
            DieType::D10 => "D10",
            DieType::D12 => "D12",
            DieType::D20 => "D20",
            DieType::D100 => "D100",
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts `d20`, `D20` or a bare `20`.
impl FromStr for DieType {
    type Err = TowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('d')
            .or_else(|| trimmed.strip_prefix('D'))
            .unwrap_or(trimmed);

        DieType::ALL
            .iter()
            .copied()
            .find(|die| digits.parse::<u8>().ok() == Some(die.sides()))
            .ok_or_else(|| TowerError::UnknownDie(s.to_string()))
    }
}

/// Per-die-type counts sent to the tower on a roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollVector {
    counts: [u8; DieType::ALL.len()],
}

impl RollVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exactly one die of the given type.
    pub fn single(die: DieType) -> Self {
        let mut roll = Self::new();
        roll.counts[die.index()] = 1;
        roll
    }

    pub fn get(&self, die: DieType) -> u8 {
        self.counts[die.index()]
    }

    pub fn set(&mut self, die: DieType, count: u8) -> Result<(), TowerError> {
        self.set_index(die.index(), count)
    }

    pub fn set_index(&mut self, idx: usize, count: u8) -> Result<(), TowerError> {
        if count > MAX_COUNT {
            return Err(TowerError::CountTooLarge(count));
        }
        let slot = self.counts.get_mut(idx).ok_or(TowerError::OutOfBounds)?;
        *slot = count;
        Ok(())
    }

    /// Returns the new count. Stops at [`MAX_COUNT`].
    pub fn increment(&mut self, die: DieType) -> u8 {
        let slot = &mut self.counts[die.index()];
        if *slot < MAX_COUNT {
            *slot += 1;
        }
        *slot
    }

    /// Returns the new count. Stops at zero.
    pub fn decrement(&mut self, die: DieType) -> u8 {
        let slot = &mut self.counts[die.index()];
        *slot = slot.saturating_sub(1);
        *slot
    }

    pub fn reset(&mut self) {
        self.counts = [0; DieType::ALL.len()];
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|&c| c as u32).sum()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.counts
    }

    pub fn iter(&self) -> impl Iterator<Item = (DieType, u8)> + '_ {
        DieType::ALL.iter().map(move |&die| (die, self.get(die)))
    }
}

impl fmt::Display for RollVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (die, count) in self.iter() {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", die, count)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn die_order_matches_wire_index() {
        for (i, die) in DieType::ALL.iter().enumerate() {
            assert_eq!(die.index(), i);
        }
        assert_eq!(DieType::D100.index(), 6);
    }

    #[test]
    fn parse_die_names() {
        assert_eq!("d20".parse::<DieType>().unwrap(), DieType::D20);
        assert_eq!("D100".parse::<DieType>().unwrap(), DieType::D100);
        assert_eq!(" 4 ".parse::<DieType>().unwrap(), DieType::D4);
        assert_eq!(
            "d7".parse::<DieType>(),
            Err(TowerError::UnknownDie("d7".to_string()))
        );
        assert!("dd6".parse::<DieType>().is_err());
    }

    #[test]
    fn increment_saturates_at_max() {
        let mut roll = RollVector::new();
        for _ in 0..(MAX_COUNT as usize + 5) {
            roll.increment(DieType::D6);
        }
        assert_eq!(roll.get(DieType::D6), MAX_COUNT);
        assert_eq!(roll.get(DieType::D4), 0);
    }

    #[test]
    fn decrement_stops_at_zero() {
        let mut roll = RollVector::new();
        assert_eq!(roll.decrement(DieType::D8), 0);
        roll.increment(DieType::D8);
        roll.increment(DieType::D8);
        assert_eq!(roll.decrement(DieType::D8), 1);
    }

    #[test]
    fn set_checks_bounds() {
        let mut roll = RollVector::new();
        assert_eq!(roll.set(DieType::D12, 21), Err(TowerError::CountTooLarge(21)));
        assert_eq!(roll.set_index(7, 1), Err(TowerError::OutOfBounds));
        roll.set_index(3, 5).unwrap();
        assert_eq!(roll.get(DieType::D10), 5);
        assert_eq!(roll.total(), 5);
    }

    #[test]
    fn reset_clears_every_counter() {
        let mut roll = RollVector::new();
        roll.set(DieType::D4, 3).unwrap();
        roll.set(DieType::D100, 20).unwrap();
        assert!(!roll.is_empty());
        roll.reset();
        assert!(roll.is_empty());
        assert_eq!(roll.as_bytes(), &[0u8; 7]);
    }

    #[test]
    fn single_presets() {
        assert_eq!(RollVector::single(DieType::D20).as_bytes(), &[0, 0, 0, 0, 0, 1, 0]);
        assert_eq!(RollVector::single(DieType::D100).as_bytes(), &[0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn display_lists_all_dice() {
        let mut roll = RollVector::new();
        roll.set(DieType::D6, 2).unwrap();
        assert_eq!(
            roll.to_string(),
            "D4:0 D6:2 D8:0 D10:0 D12:0 D20:0 D100:0"
        );
    }
}
