/*
 * SPDX-FileCopyrightText: 2022 perillamint
 *
 * SPDX-License-Identifier: MPL-2.0
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use dice_tower::action::{Action, HELP};
use dice_tower::consts::{BLE_DATA_CHARACTERISTIC_UUID, TOWER_NAME};
use dice_tower::registry::PeripheralEntry;
use dice_tower::transport::ble::{BLETransport, TowerScanner};
use dice_tower::transport::serial::SerialTransport;
use dice_tower::transport::TowerTransport;
use dice_tower::{DieType, RollVector, Screen, Session, Tower, TowerError};

use async_lock::Mutex;
use clap::Parser;
use futures::StreamExt;
use log::{debug, error, info, warn};
use pretty_hex::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::codec::{FramedRead, LinesCodec};

#[macro_use]
extern crate lazy_static;

#[derive(clap::Parser)]
#[clap(about, version, author)]
struct Args {
    /// Link to the tower: `ble` or `serial`.
    #[clap(
        long,
        short = 't',
        value_name = "TRANSPORT",
        default_value = "ble",
        env = "DICE_TOWER_TRANSPORT"
    )]
    transport: String,
    /// Bluetooth adapter index, see `adapters`.
    #[clap(long, short = 'a', default_value = "0", env = "DICE_TOWER_ADAPTER")]
    adapter: usize,
    /// Peripheral id to use instead of the first tower found.
    #[clap(long, short = 'd', env = "DICE_TOWER_DEVICE")]
    device: Option<String>,
    /// Advertised local name that marks a peripheral as a tower.
    #[clap(long, short = 'n', default_value = TOWER_NAME, env = "DICE_TOWER_NAME")]
    name: String,
    #[clap(long, default_value = "3", env = "DICE_TOWER_SCAN_SECS")]
    scan_secs: u64,
    #[clap(long, default_value = "/dev/ttyUSB0", env = "DICE_TOWER_SERIAL_PORT")]
    serial_port: String,
    /// Seconds to wait for a reply frame after rolling. 0 disables.
    #[clap(long, default_value = "0", env = "DICE_TOWER_REPLY_SECS")]
    reply_secs: u64,
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(clap::Subcommand)]
enum Cmd {
    /// List Bluetooth adapters.
    Adapters,
    /// Scan for towers.
    Scan,
    /// List towers the system is already connected to.
    Connected,
    /// Roll a custom set of dice.
    Roll {
        #[clap(long, default_value = "0")]
        d4: u8,
        #[clap(long, default_value = "0")]
        d6: u8,
        #[clap(long, default_value = "0")]
        d8: u8,
        #[clap(long, default_value = "0")]
        d10: u8,
        #[clap(long, default_value = "0")]
        d12: u8,
        #[clap(long, default_value = "0")]
        d20: u8,
        #[clap(long, default_value = "0")]
        d100: u8,
    },
    /// Roll a single D20.
    RollD20,
    /// Roll a single D100.
    RollD100,
    /// Change the name the tower advertises.
    Rename { name: String },
    /// Line-driven device list and tower panel.
    Interactive,
}

lazy_static! {
    static ref ARGS: Args = Args::parse();
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), TowerError> {
    match &ARGS.command {
        Cmd::Adapters => {
            for (idx, name) in TowerScanner::list_adapters().await?.iter().enumerate() {
                println!("{}: {}", idx, name);
            }
            Ok(())
        }
        Cmd::Scan => {
            let (_, session) = scan().await?;
            print_devices(&*session.lock().await);
            Ok(())
        }
        Cmd::Connected => {
            let scanner = scanner().await?;
            let session = Mutex::new(Session::with_tower_name(&ARGS.name));
            scanner.retrieve_connected(&session).await?;
            print_devices(&*session.lock().await);
            Ok(())
        }
        Cmd::Roll {
            d4,
            d6,
            d8,
            d10,
            d12,
            d20,
            d100,
        } => {
            let mut roll = RollVector::new();
            for (die, count) in DieType::ALL
                .iter()
                .zip([*d4, *d6, *d8, *d10, *d12, *d20, *d100])
            {
                roll.set(*die, count)?;
            }
            roll_once(roll).await
        }
        Cmd::RollD20 => roll_once(RollVector::single(DieType::D20)).await,
        Cmd::RollD100 => roll_once(RollVector::single(DieType::D100)).await,
        Cmd::Rename { name } => {
            let mut tower = open_ble().await?;
            tower.transport_mut().rename(name).await?;
            tower.close().await?;
            println!("Module renamed to {:?}. Power-cycle the tower to apply.", name);
            Ok(())
        }
        Cmd::Interactive => interactive().await,
    }
}

async fn scanner() -> Result<TowerScanner, TowerError> {
    TowerScanner::open(ARGS.adapter).await
}

async fn scan() -> Result<(TowerScanner, Mutex<Session>), TowerError> {
    let scanner = scanner().await?;
    let session = Mutex::new(Session::with_tower_name(&ARGS.name));
    let found = scanner
        .scan(Duration::from_secs(ARGS.scan_secs), &session)
        .await?;
    debug!("[scan] {} tower(s) found", found);
    Ok((scanner, session))
}

async fn open_ble() -> Result<Tower<BLETransport>, TowerError> {
    let (scanner, session) = scan().await?;
    let id = match &ARGS.device {
        Some(id) => id.clone(),
        None => session
            .lock()
            .await
            .registry()
            .list()
            .next()
            .map(|p| p.id.clone())
            .ok_or_else(|| TowerError::UnknownPeripheral(ARGS.name.clone()))?,
    };
    let peripheral = scanner.find(&id).await?;
    Tower::open(BLETransport::new(peripheral)).await
}

async fn roll_once(roll: RollVector) -> Result<(), TowerError> {
    match ARGS.transport.as_str() {
        "ble" => roll_and_close(open_ble().await?, roll).await,
        "serial" => {
            let tower = Tower::open(SerialTransport::new(&ARGS.serial_port)).await?;
            roll_and_close(tower, roll).await
        }
        other => Err(TowerError::IOFailure(format!(
            "unknown transport {:?}. Use --help for more information.",
            other
        ))),
    }
}

async fn roll_and_close<T: TowerTransport>(
    mut tower: Tower<T>,
    roll: RollVector,
) -> Result<(), TowerError> {
    tower.roll(&roll).await?;
    println!("Rolled {}", roll);
    if ARGS.reply_secs > 0 {
        match tower.await_reply(Duration::from_secs(ARGS.reply_secs)).await? {
            Some(reply) => println!("{}", reply.hex_dump()),
            None => warn!("No reply from tower."),
        }
    }
    tower.close().await?;
    Ok(())
}

fn print_devices(session: &Session) {
    if session.registry().is_empty() {
        println!("No towers found, try `scan` again.");
        return;
    }
    for (idx, p) in session.registry().list().enumerate() {
        println!("{:>2}. {}", idx + 1, describe(p));
    }
}

fn describe(p: &PeripheralEntry) -> String {
    let mut line = format!("{} [{}]", p.display_name(), p.id);
    if let Some(rssi) = p.rssi {
        line.push_str(&format!(" {} dBm", rssi));
    }
    if p.connecting {
        line.push_str(" - Connecting...");
    } else if p.connected {
        line.push_str(" - connected");
    }
    line
}

fn print_panel(session: &Session) {
    if let Some(p) = session.selected() {
        println!("Tower: {}", describe(p));
    }
    for (die, count) in session.roll().iter() {
        println!("  {:>4} {:>2} {}", die.label(), count, "#".repeat(count as usize));
    }
}

fn render(session: &Session) {
    match session.screen() {
        Screen::DeviceList => print_devices(session),
        Screen::TowerPanel(_) => print_panel(session),
    }
}

async fn interactive() -> Result<(), TowerError> {
    if ARGS.transport != "ble" {
        return Err(TowerError::IOFailure(
            "interactive mode needs the ble transport".to_string(),
        ));
    }

    let scanner = scanner().await?;
    let session = Arc::new(Mutex::new(Session::with_tower_name(&ARGS.name)));
    let watcher = scanner.watch_disconnects(session.clone()).await?;
    let mut tower: Option<Tower<BLETransport>> = None;

    scanner
        .scan(Duration::from_secs(ARGS.scan_secs), &session)
        .await?;
    println!("{}", HELP);
    render(&*session.lock().await);

    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    while let Some(line) = lines.next().await {
        let line = line.map_err(|e| -> TowerError { TowerError::IOFailure(e.to_string()) })?;
        if line.trim().is_empty() {
            continue;
        }
        let action = match line.parse::<Action>() {
            Ok(action) => action,
            Err(e) => {
                println!("{}\n{}", e, HELP);
                continue;
            }
        };
        if action == Action::Quit {
            break;
        }

        let applied = action.apply_local(&mut *session.lock().await);
        match applied {
            Ok(true) => {
                if action == Action::Help {
                    println!("{}", HELP);
                }
                render(&*session.lock().await);
                continue;
            }
            Ok(false) => {}
            Err(TowerError::NotConnected) => {
                println!("Select a tower first.");
                continue;
            }
            Err(e) => {
                println!("{}", e);
                continue;
            }
        }

        if let Err(e) = dispatch(action, &scanner, &session, &mut tower).await {
            error!("[interactive] {:?} failed: {}", action, e);
            println!("{}", e);
        }
        render(&*session.lock().await);
    }

    if let Some(tower) = tower.take() {
        tower.close().await?;
    }
    watcher.abort();
    Ok(())
}

async fn dispatch(
    action: Action,
    scanner: &TowerScanner,
    session: &Mutex<Session>,
    tower: &mut Option<Tower<BLETransport>>,
) -> Result<(), TowerError> {
    match action {
        Action::Scan => {
            // The registry is rebuilt from scratch, so drop any open link.
            if let Some(t) = tower.take() {
                t.close().await?;
            }
            scanner
                .scan(Duration::from_secs(ARGS.scan_secs), session)
                .await?;
        }
        Action::Connected => {
            scanner.retrieve_connected(session).await?;
        }
        Action::Select(n) => {
            let id = Action::selected_id(n, &*session.lock().await)?;
            connect(&id, scanner, session, tower).await?;
        }
        Action::Back => {
            let id = session.lock().await.deselect();
            if let Some(t) = tower.take() {
                t.close().await?;
            }
            if let Some(id) = id {
                session.lock().await.registry_mut().mark_disconnected(&id);
            }
        }
        Action::Roll(die) => {
            let t = tower.as_mut().ok_or(TowerError::NotConnected)?;
            let roll = match die {
                Some(die) => RollVector::single(die),
                None => *session.lock().await.roll(),
            };
            t.roll(&roll).await?;
            println!("Rolled {}", roll);
            if ARGS.reply_secs > 0 {
                if let Some(reply) = t.await_reply(Duration::from_secs(ARGS.reply_secs)).await? {
                    session.lock().await.on_value_update(
                        &t.transport().id(),
                        &BLE_DATA_CHARACTERISTIC_UUID,
                        &reply,
                    );
                    println!("{}", reply.hex_dump());
                }
            }
        }
        other => debug!("[dispatch] nothing to do for {:?}", other),
    }
    Ok(())
}

async fn connect(
    id: &str,
    scanner: &TowerScanner,
    session: &Mutex<Session>,
    tower: &mut Option<Tower<BLETransport>>,
) -> Result<(), TowerError> {
    if let Some(t) = tower.take() {
        let old = t.transport().id();
        t.close().await?;
        session.lock().await.registry_mut().mark_disconnected(&old);
    }

    let peripheral = scanner.find(id).await?;
    session.lock().await.registry_mut().mark_connecting(id);

    match Tower::open(BLETransport::new(peripheral)).await {
        Ok(t) => {
            let mut session = session.lock().await;
            session.registry_mut().mark_connected(id);
            if let Some(rssi) = t.transport().rssi() {
                session.registry_mut().set_rssi(id, rssi);
            }
            session.select(id)?;
            info!("[connect][{}] connected.", id);
            *tower = Some(t);
            Ok(())
        }
        Err(e) => {
            error!("[connect][{}] connect error: {}", id, e);
            session.lock().await.registry_mut().mark_disconnected(id);
            Err(e)
        }
    }
}
