/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::dice::DieType;
use crate::error::TowerError;
use crate::session::{Screen, Session};
use std::str::FromStr;

/// One line of input in the interactive client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Scan,
    List,
    Connected,
    /// Position in the device listing, starting at 1.
    Select(usize),
    Back,
    Increment(DieType),
    Decrement(DieType),
    Set(DieType, u8),
    Reset,
    /// `None` rolls the configured vector.
    Roll(Option<DieType>),
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
device list:  scan | list | connected | select <n> | quit
tower panel:  + <die> | - <die> | set <die> <n> | reset | roll [d20|d100|<die>] | show | back
dice:         d4 d6 d8 d10 d12 d20 d100";

impl Action {
    /// Actions that only make sense with a tower selected.
    pub fn requires_panel(&self) -> bool {
        matches!(
            self,
            Action::Back
                | Action::Increment(_)
                | Action::Decrement(_)
                | Action::Set(..)
                | Action::Reset
                | Action::Roll(_)
        )
    }

    /// Apply the parts of an action that only touch local state.
    /// Returns false when the caller has to act on the tower or the radio.
    pub fn apply_local(&self, session: &mut Session) -> Result<bool, TowerError> {
        if self.requires_panel() && session.screen() == Screen::DeviceList {
            return Err(TowerError::NotConnected);
        }

        match *self {
            Action::Increment(die) => {
                session.roll_mut().increment(die);
            }
            Action::Decrement(die) => {
                session.roll_mut().decrement(die);
            }
            Action::Set(die, count) => session.roll_mut().set(die, count)?,
            Action::Reset => session.roll_mut().reset(),
            Action::Show | Action::Help | Action::List => {}
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Resolve a listing position to a peripheral id.
    pub fn selected_id(index: usize, session: &Session) -> Result<String, TowerError> {
        index
            .checked_sub(1)
            .and_then(|i| session.registry().list().nth(i))
            .map(|p| p.id.clone())
            .ok_or(TowerError::OutOfBounds)
    }
}

impl FromStr for Action {
    type Err = TowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words.next().unwrap_or("").to_ascii_lowercase();
        let arg = words.next();
        let arg2 = words.next();
        let bad = || TowerError::IOFailure(format!("unrecognized command: {:?}", s.trim()));

        let die = |w: Option<&str>| -> Result<DieType, TowerError> { w.ok_or_else(bad)?.parse() };

        let action = match verb.as_str() {
            "scan" | "refresh" => Action::Scan,
            "list" | "ls" => Action::List,
            "connected" => Action::Connected,
            "select" | "sel" => {
                let n = arg.and_then(|w| w.parse().ok()).ok_or_else(bad)?;
                Action::Select(n)
            }
            "back" => Action::Back,
            "+" | "inc" => Action::Increment(die(arg)?),
            "-" | "dec" => Action::Decrement(die(arg)?),
            "set" => {
                let count = arg2.and_then(|w| w.parse().ok()).ok_or_else(bad)?;
                Action::Set(die(arg)?, count)
            }
            "reset" => Action::Reset,
            "roll" => match arg {
                Some(w) => Action::Roll(Some(w.parse()?)),
                None => Action::Roll(None),
            },
            "show" => Action::Show,
            "help" | "?" => Action::Help,
            "quit" | "exit" | "q" => Action::Quit,
            _ => return Err(bad()),
        };
        Ok(action)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::consts::TOWER_NAME;
    use crate::registry::PeripheralEntry;

    fn session_with_towers(ids: &[&str]) -> Session {
        let mut session = Session::new();
        for id in ids {
            session.on_discover(PeripheralEntry::new(*id, Some(TOWER_NAME.to_string())));
        }
        session
    }

    #[test]
    fn parse_commands() {
        assert_eq!("scan".parse::<Action>().unwrap(), Action::Scan);
        assert_eq!("select 2".parse::<Action>().unwrap(), Action::Select(2));
        assert_eq!("+ d6".parse::<Action>().unwrap(), Action::Increment(DieType::D6));
        assert_eq!("- 100".parse::<Action>().unwrap(), Action::Decrement(DieType::D100));
        assert_eq!("set d12 4".parse::<Action>().unwrap(), Action::Set(DieType::D12, 4));
        assert_eq!("roll".parse::<Action>().unwrap(), Action::Roll(None));
        assert_eq!("ROLL d20".parse::<Action>().unwrap(), Action::Roll(Some(DieType::D20)));
        assert_eq!("q".parse::<Action>().unwrap(), Action::Quit);
    }

    #[test]
    fn reject_malformed_commands() {
        assert!("".parse::<Action>().is_err());
        assert!("select".parse::<Action>().is_err());
        assert!("select two".parse::<Action>().is_err());
        assert!("+".parse::<Action>().is_err());
        assert!("set d6".parse::<Action>().is_err());
        assert_eq!(
            "roll d3".parse::<Action>(),
            Err(TowerError::UnknownDie("d3".to_string()))
        );
    }

    #[test]
    fn panel_actions_need_a_selection() {
        let mut session = session_with_towers(&["aa"]);
        assert_eq!(
            Action::Increment(DieType::D4).apply_local(&mut session),
            Err(TowerError::NotConnected)
        );
        session.select("aa").unwrap();
        assert_eq!(Action::Increment(DieType::D4).apply_local(&mut session), Ok(true));
        assert_eq!(session.roll().get(DieType::D4), 1);
    }

    #[test]
    fn local_vector_edits() {
        let mut session = session_with_towers(&["aa"]);
        session.select("aa").unwrap();
        Action::Set(DieType::D8, 5).apply_local(&mut session).unwrap();
        Action::Decrement(DieType::D8).apply_local(&mut session).unwrap();
        assert_eq!(session.roll().get(DieType::D8), 4);
        assert_eq!(
            Action::Set(DieType::D8, 30).apply_local(&mut session),
            Err(TowerError::CountTooLarge(30))
        );
        Action::Reset.apply_local(&mut session).unwrap();
        assert!(session.roll().is_empty());
    }

    #[test]
    fn radio_actions_are_left_to_caller() {
        let mut session = session_with_towers(&["aa"]);
        assert_eq!(Action::Scan.apply_local(&mut session), Ok(false));
        assert_eq!(Action::Select(1).apply_local(&mut session), Ok(false));
        session.select("aa").unwrap();
        assert_eq!(Action::Roll(None).apply_local(&mut session), Ok(false));
        assert_eq!(Action::Back.apply_local(&mut session), Ok(false));
    }

    #[test]
    fn listing_positions_start_at_one() {
        let session = session_with_towers(&["bb", "aa"]);
        assert_eq!(Action::selected_id(1, &session).unwrap(), "aa");
        assert_eq!(Action::selected_id(2, &session).unwrap(), "bb");
        assert_eq!(Action::selected_id(0, &session), Err(TowerError::OutOfBounds));
        assert_eq!(Action::selected_id(3, &session), Err(TowerError::OutOfBounds));
    }
}
