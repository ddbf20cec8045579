/*
 *  status.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Network and clock pages, and the loop that alternates them
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta};
use log::{debug, info, warn};

use crate::config::StatusConfig;
use crate::lcd::LcdSession;
use crate::netinfo::{self, NetInfo, NetInfoError};

const NET_DOWN_LINES: [&str; 2] = ["Network Error! ", "Check ETH Cable"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetStatus {
    Up(NetInfo),
    Down,
}

/// Where the monitor gets its answers from
#[allow(async_fn_in_trait)]
pub trait NetProbe {
    fn interface_info(&self, ifname: &str) -> Result<NetInfo, NetInfoError>;
    async fn is_alive(&self, target: &str) -> bool;
}

/// Kernel interface tables plus a real ping
pub struct SystemProbe;

impl NetProbe for SystemProbe {
    fn interface_info(&self, ifname: &str) -> Result<NetInfo, NetInfoError> {
        netinfo::interface_info(ifname)
    }

    async fn is_alive(&self, target: &str) -> bool {
        netinfo::is_net_alive(target).await
    }
}

/// Tracks link state between polls.
///
/// While the network is up only the ping is repeated and the cached
/// interface info is reused; once it drops the interface is re-read on
/// every poll until it comes back.
pub struct NetMonitor<P: NetProbe = SystemProbe> {
    probe: P,
    interface: String,
    ping_target: String,
    last: Option<NetInfo>,
}

impl NetMonitor<SystemProbe> {
    pub fn new(interface: &str, ping_target: &str) -> Self {
        Self::with_probe(SystemProbe, interface, ping_target)
    }
}

impl<P: NetProbe> NetMonitor<P> {
    pub fn with_probe(probe: P, interface: &str, ping_target: &str) -> Self {
        Self {
            probe,
            interface: interface.to_string(),
            ping_target: ping_target.to_string(),
            last: None,
        }
    }

    pub async fn poll(&mut self) -> NetStatus {
        match self.last.take() {
            Some(info) => {
                if self.probe.is_alive(&self.ping_target).await {
                    self.last = Some(info);
                } else {
                    warn!("{} unreachable", self.ping_target);
                }
            }
            None => match self.probe.interface_info(&self.interface) {
                Ok(info) => self.last = Some(info),
                Err(e) => debug!("{}: {}", self.interface, e),
            },
        }

        match &self.last {
            Some(info) => NetStatus::Up(info.clone()),
            None => NetStatus::Down,
        }
    }
}

pub fn net_lines(status: &NetStatus) -> [String; 2] {
    match status {
        NetStatus::Up(info) => [
            info.ip.to_string(),
            format!("Speed={}, {}", info.speed_mbps, info.duplex.label()),
        ],
        NetStatus::Down => NET_DOWN_LINES.map(String::from),
    }
}

/// "Time " plus a ctime-style stamp, shifted by `offset_hours`
pub fn time_text(now: NaiveDateTime, offset_hours: i32) -> String {
    let shifted = now + TimeDelta::hours(offset_hours as i64);
    format!("Time {} ", shifted.format("%a %b %e %H:%M:%S %Y"))
}

/// First `width` characters on row 0, the remainder on row 1
pub fn time_lines(now: NaiveDateTime, offset_hours: i32, width: usize) -> [String; 2] {
    let text = time_text(now, offset_hours);
    let (top, rest) = text.split_at(width.min(text.len()));
    [top.to_string(), rest.to_string()]
}

/// Clear the panel and write one line per row. Failures are logged only.
pub fn show_lines(session: &mut LcdSession, lines: &[String]) {
    if let Err(e) = session.clear(-1) {
        warn!("LCD clear failed: {}", e);
    }
    for (row, line) in lines.iter().enumerate() {
        if let Err(e) = session.print(0, row as u8, line) {
            warn!("LCD print failed on row {}: {}", row, e);
        }
    }
}

/// Alternate the network page and the optional clock page forever
pub async fn run<P: NetProbe>(
    session: &mut LcdSession,
    monitor: &mut NetMonitor<P>,
    config: &StatusConfig,
) {
    let pause = Duration::from_secs(config.switch_delay_secs());
    let width = session.geometry().width() as usize;
    info!(
        "Status loop on {} every {:?}, clock page {}",
        config.interface(),
        pause,
        if config.time_offset_hours.is_some() { "on" } else { "off" }
    );

    loop {
        let status = monitor.poll().await;
        let lines = net_lines(&status);
        debug!("{:?}", lines);
        show_lines(session, &lines);
        tokio::time::sleep(pause).await;

        if let Some(offset) = config.time_offset_hours {
            let lines = time_lines(Local::now().naive_local(), offset, width);
            debug!("{}{}", lines[0], lines[1]);
            show_lines(session, &lines);
            tokio::time::sleep(pause).await;
        }
    }
}
