//! Host-testable demo node: wires a small in-process mesh of
//! [`RoutingCore`]s onto a shared broadcast-medium `RadioIo` and exposes a
//! chat-style command line against the first node.
//!
//! Runs on host:
//! - `cargo run --bin node`
//!
//! ## Commands
//!
//! - `send <addr> <text>` - Send text to a destination (hex or decimal)
//! - `routes` - Show the local node's route table
//! - `status` - Show counters
//! - `help` - Show this list
//! - `quit` - Exit
//!
//! ## Endpoints
//!
//! - Stats: http://localhost:8080/stats (node 1 only)

use log::{info, warn};
use loramesh::address::{Address, Role};
use loramesh::config::RoutingConfig;
use loramesh::core::RoutingCore;
use loramesh::radio_io::{FrameKind, RadioError, RadioIo, ReceivedFrame, TxOutcome, TxPriority};
use loramesh::stats_server::{StatsServer, DEFAULT_STATS_PORT};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Number of demo nodes sharing the bus. The operator only talks to node 1;
/// the rest exist to give routes somewhere to go.
const DEMO_NODE_COUNT: u16 = 3;

/// In-process stand-in for a physical radio: every `try_send` is delivered
/// straight into every other node's inbox, simulating a lossless
/// single-channel medium so the demo needs no real hardware.
struct BusRadio {
    inbox: Mutex<VecDeque<ReceivedFrame>>,
    peers: Mutex<Vec<Arc<BusRadio>>>,
    mtu: usize,
}

impl BusRadio {
    fn new(mtu: usize) -> Arc<Self> {
        Arc::new(Self {
            inbox: Mutex::new(VecDeque::new()),
            peers: Mutex::new(Vec::new()),
            mtu,
        })
    }
}

impl RadioIo for BusRadio {
    fn poll_rx(&self) -> Option<ReceivedFrame> {
        self.inbox.lock().unwrap().pop_front()
    }

    fn try_send(&self, payload: &[u8], priority: TxPriority) -> Result<TxOutcome, RadioError> {
        if payload.len() > self.mtu {
            return Err(RadioError::NotReady);
        }
        let kind = match priority {
            TxPriority::Control => FrameKind::Control,
            TxPriority::Data => FrameKind::Data,
        };
        for peer in self.peers.lock().unwrap().iter() {
            peer.inbox.lock().unwrap().push_back(ReceivedFrame {
                kind,
                payload: payload.to_vec(),
                rssi: -60.0,
                snr: 8.0,
                link_seq: 0,
            });
        }
        Ok(TxOutcome::Accepted)
    }

    fn mtu(&self) -> usize {
        self.mtu
    }
}

fn print_help() {
    println!("commands:");
    println!("  send <addr> <text>   send text to a destination (hex 0x.. or decimal)");
    println!("  routes               show this node's route table");
    println!("  status               show counters");
    println!("  help                 show this list");
    println!("  quit                 exit");
}

fn parse_address(s: &str) -> Option<Address> {
    let v = if let Some(hex) = s.strip_prefix("0x") {
        u16::from_str_radix(hex, 16).ok()?
    } else {
        s.parse().ok()?
    };
    Some(Address(v))
}

fn print_routes(core: &RoutingCore) {
    let table = core.route_table();
    let nodes = table.snapshot_network_nodes();
    if nodes.is_empty() {
        println!("(no routes yet)");
        return;
    }
    for node in nodes {
        let via = table.next_hop(node.address);
        println!(
            "  {} via {} metric {} role {} gateway_load {}",
            node.address, via, node.metric, node.role, node.gateway_load
        );
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("=== loramesh demo: {DEMO_NODE_COUNT}-node in-process mesh ===");

    let radios: Vec<Arc<BusRadio>> = (0..DEMO_NODE_COUNT).map(|_| BusRadio::new(256)).collect();
    for (i, radio) in radios.iter().enumerate() {
        let mut peers = radio.peers.lock().unwrap();
        for (j, other) in radios.iter().enumerate() {
            if i != j {
                peers.push(other.clone());
            }
        }
    }

    let cores: Vec<Arc<RoutingCore>> = radios
        .iter()
        .enumerate()
        .map(|(i, radio)| {
            let address = Address(i as u16 + 1);
            Arc::new(
                RoutingCore::new(
                    address,
                    Role::ROUTER,
                    RoutingConfig::default(),
                    radio.clone(),
                    Arc::new(|| 255),
                )
                .expect("default routing config is always valid"),
            )
        })
        .collect();

    for core in &cores {
        let core = core.clone();
        tokio::spawn(async move {
            let mut poll = tokio::time::interval(Duration::from_millis(20));
            loop {
                poll.tick().await;
                core.poll_radio(Instant::now());
            }
        });
    }

    for core in &cores {
        let core = core.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tick.tick().await;
                let now = Instant::now();
                core.tick_hello(now);
                core.tick_health(now);
            }
        });
    }

    for core in &cores {
        let core = core.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tick.tick().await;
                core.tick_expiry(Instant::now());
            }
        });
    }

    let local = cores[0].clone();
    info!("local node address: {}", local.local_address());

    let _stats_server = match StatsServer::start(None, DEFAULT_STATS_PORT, local.stats()) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("stats server not started: {e}");
            None
        }
    };

    print_help();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut parts = line.trim().splitn(3, ' ');
        match parts.next() {
            Some("send") => {
                let (Some(addr), Some(text)) = (parts.next(), parts.next()) else {
                    println!("usage: send <addr> <text>");
                    continue;
                };
                let Some(dst) = parse_address(addr) else {
                    println!("bad address: {addr}");
                    continue;
                };
                let outcome = local.send(dst, 0, text.as_bytes().to_vec());
                println!("{:?}", outcome);
            }
            Some("routes") => print_routes(&local),
            Some("status") => println!("{:?}", local.stats().snapshot()),
            Some("help") => print_help(),
            Some("quit") | Some("exit") => break,
            Some("") | None => {}
            Some(other) => println!("unknown command: {other} (try `help`)"),
        }
    }
}
