//! Aurena terminal remote control
//!
//! Connects a controller session to a player server, logs every state
//! change pushed over the event stream, and reads control commands from
//! stdin.
//!
//! Usage:
//!   cargo run --release -- http://player.local:5457/
//!   cargo run --release -- http://player.local:5457/ --events-roles

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use url::Url;

use aurena_core::{
    ClientId, ControllerConfig, ControllerObserver, ControllerSession, PlaybackState, MASTER_ID,
};

/// Observer that narrates server-side changes to the terminal
struct Narrator {
    session: Arc<ControllerSession>,
}

impl ControllerObserver for Narrator {
    fn on_connection_changed(&self, connected: bool) {
        if connected {
            println!("* connected");
        } else {
            println!("* disconnected, retrying");
        }
    }

    fn on_playback_changed(&self, playback: &PlaybackState) {
        let state = if playback.paused { "paused" } else { "playing" };
        match playback.current_media {
            Some(id) => println!("* {state}, track {id}"),
            None => println!("* {state}, no media"),
        }
    }

    fn on_volume_changed(&self, target: ClientId, level: f64, _animate: bool) {
        let percent = (level * 100.0).round();
        if target == MASTER_ID {
            println!("* master volume {percent}%");
        } else {
            println!("* client {target} volume {percent}%");
        }
    }

    fn on_roster_changed(&self) {
        println!("* roster:");
        for device in self.session.store().devices() {
            let enabled = if device.enabled { "on" } else { "off" };
            let record = if device.record_enabled { ", rec" } else { "" };
            println!(
                "    {} {} [{}{}] {:.0}%",
                device.client_id,
                device.host,
                enabled,
                record,
                device.volume * 100.0
            );
        }
    }

    fn on_device_changed(&self, client_id: ClientId) {
        if let Some(device) = self.session.store().device(client_id) {
            let enabled = if device.enabled { "on" } else { "off" };
            let record = if device.record_enabled { ", rec" } else { "" };
            if let Some(stats) = &device.stats {
                let sync = if stats.synchronised { "in sync" } else { "out of sync" };
                println!(
                    "* client {client_id} [{enabled}{record}] {sync}, rtt {} us",
                    stats.rtt_average_ns / 1_000
                );
            } else {
                println!("* client {client_id} [{enabled}{record}]");
            }
        }
    }

    fn on_client_message(&self, client_id: ClientId, message: &str) {
        println!("* client {client_id}: {message}");
    }
}

const HELP: &str = "\
commands:
  play | pause | toggle       playback control
  next | prev                 track navigation
  jump <id>                   jump to a track index or http URL
  vol <level>                 master volume (0.0 - 1.5)
  vol <client> <level>        device volume
  enable <client> on|off      enable or disable a device
  record <client> on|off      toggle record-enable for a device
  calibrate                   run clock calibration
  roster                      re-read the device roster
  status                      print the local mirror
  quit";

fn handle_line(session: &Arc<ControllerSession>, line: &str) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => {}
        ["play"] => session.play(),
        ["pause"] => session.pause(),
        ["toggle"] => session.play_pause(),
        ["next"] => session.next(),
        ["prev"] => session.previous(),
        ["jump", id] => {
            if !session.jump_to(id) {
                println!("jump: need a track index or an http URL");
            }
        }
        ["vol", level] => match level.parse::<f64>() {
            Ok(level) => session.set_master_volume(level),
            Err(_) => println!("vol: bad level {level:?}"),
        },
        ["vol", client, level] => match (client.parse::<ClientId>(), level.parse::<f64>()) {
            (Ok(client), Ok(level)) => session.set_device_volume(client, level),
            _ => println!("vol: bad arguments"),
        },
        ["enable", client, flag @ ("on" | "off")] => match client.parse::<ClientId>() {
            Ok(client) => {
                let record = session
                    .store()
                    .device(client)
                    .map(|d| d.record_enabled)
                    .unwrap_or(false);
                session.set_client_enable(client, *flag == "on", record);
            }
            Err(_) => println!("enable: bad client id"),
        },
        ["record", client, flag @ ("on" | "off")] => match client.parse::<ClientId>() {
            Ok(client) => {
                let enabled = session
                    .store()
                    .device(client)
                    .map(|d| d.enabled)
                    .unwrap_or(true);
                session.set_client_enable(client, enabled, *flag == "on");
            }
            Err(_) => println!("record: bad client id"),
        },
        ["calibrate"] => session.calibrate(),
        ["roster"] => session.refresh_roster(),
        ["status"] => print_status(session),
        ["quit" | "exit"] => return false,
        _ => println!("{HELP}"),
    }
    true
}

fn print_status(session: &Arc<ControllerSession>) {
    let store = session.store();
    let playback = store.playback();
    let state = if playback.paused { "paused" } else { "playing" };
    match playback.current_media {
        Some(id) => println!("{state}, track {id}"),
        None => println!("{state}, no media"),
    }
    println!(
        "master volume {}%",
        store.volume_percent(MASTER_ID).unwrap_or(0)
    );
    for device in store.devices() {
        let enabled = if device.enabled { "on" } else { "off" };
        println!(
            "  client {} ({}) [{}] {:.0}%",
            device.client_id,
            device.host,
            enabled,
            device.volume * 100.0
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("aurena_core=info".parse()?)
                .add_directive("aurena_remote=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let server = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| "http://localhost:5457/".to_string());
    let use_roles = args.contains(&"--events-roles".to_string());

    let mut config = ControllerConfig::new(Url::parse(&server)?);
    if use_roles {
        config = config.with_events_roles();
    }

    let session = ControllerSession::new(config)?;
    session.add_observer(Arc::new(Narrator {
        session: Arc::clone(&session),
    }));
    session.connect()?;

    println!("aurena remote - controlling {server}");
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !handle_line(&session, &line) {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                error!(%err, "stdin read failed");
                break;
            }
        }
    }

    Ok(())
}
