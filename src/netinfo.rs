/*
 *  netinfo.rs
 *
 *  netlcd - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Interface address, link speed/duplex and reachability probes
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

use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use local_ip_address::list_afinet_netifas;
use log::{debug, info};
use thiserror::Error;
use tokio::process::Command;

const SYS_CLASS_NET: &str = "/sys/class/net";

#[derive(Debug, Error)]
pub enum NetInfoError {
    #[error("interface query failed: {0}")]
    Query(#[from] local_ip_address::Error),
    #[error("no IPv4 address on {0}")]
    NoAddress(String),
    #[error("cannot read link settings of {iface}: {source}")]
    LinkSettings {
        iface: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    Full,
    Half,
    Unknown,
}

impl Duplex {
    fn parse(s: &str) -> Self {
        match s.trim() {
            "full" => Duplex::Full,
            "half" => Duplex::Half,
            _ => Duplex::Unknown,
        }
    }

    /// Four-character label for the status line
    pub fn label(&self) -> &'static str {
        match self {
            Duplex::Full => "FULL",
            Duplex::Half => "HALF",
            Duplex::Unknown => "????",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInfo {
    pub ip: Ipv4Addr,
    /// Mb/s, 0 when the driver does not report it
    pub speed_mbps: u32,
    pub duplex: Duplex,
}

/// IPv4 address plus link settings of one interface
///
/// Fails when the interface has no IPv4 address or the kernel exposes no
/// link settings for it (e.g. cable unplugged).
pub fn interface_info(ifname: &str) -> Result<NetInfo, NetInfoError> {
    let ip = ipv4_of(ifname)?;
    info!("{} address is {}", ifname, ip);

    let (speed_mbps, duplex) = link_settings(Path::new(SYS_CLASS_NET), ifname)?;
    info!("{} link speed = {} Mb/s, {:?} duplex", ifname, speed_mbps, duplex);

    Ok(NetInfo { ip, speed_mbps, duplex })
}

fn ipv4_of(ifname: &str) -> Result<Ipv4Addr, NetInfoError> {
    list_afinet_netifas()?
        .into_iter()
        .find_map(|(name, addr)| match addr {
            IpAddr::V4(v4) if name == ifname => Some(v4),
            _ => None,
        })
        .ok_or_else(|| NetInfoError::NoAddress(ifname.to_string()))
}

/// Speed and duplex as published under `<root>/<ifname>/`
pub fn link_settings(root: &Path, ifname: &str) -> Result<(u32, Duplex), NetInfoError> {
    let dir = root.join(ifname);
    let read = |name: &str| {
        fs::read_to_string(dir.join(name)).map_err(|source| NetInfoError::LinkSettings {
            iface: ifname.to_string(),
            source,
        })
    };

    // "-1" or garbage when the link is down
    let speed = read("speed")?.trim().parse::<u32>().unwrap_or(0);
    let duplex = Duplex::parse(&read("duplex")?);
    Ok((speed, duplex))
}

/// One ping to `target`; alive iff it came back
pub async fn is_net_alive(target: &str) -> bool {
    let output = Command::new("ping")
        .args([target, "-c", "1", "-w", "1"])
        .output()
        .await;

    let alive = match output {
        Ok(out) => ping_succeeded(&String::from_utf8_lossy(&out.stdout)),
        Err(e) => {
            debug!("ping failed to run: {}", e);
            false
        }
    };
    debug!("network alive = {}", alive);
    alive
}

fn ping_succeeded(output: &str) -> bool {
    output.lines().any(|line| line.contains("1 received"))
}
