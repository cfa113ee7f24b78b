//! LoRa interface adapter: bridges the blocking SX1262 driver to the
//! routing core's [`RadioIo`](crate::radio_io::RadioIo) trait.
//!
//! # Half-Duplex Management
//!
//! LoRa is half-duplex — the radio cannot transmit and receive
//! simultaneously. The worker thread prioritizes TX over RX since we
//! control when to transmit but cannot control when packets arrive.
//!
//! # Blocking Bridge Pattern
//!
//! The SX1262 driver uses blocking SPI calls, so it is owned entirely by
//! one dedicated worker thread; `LoRaInterface` only exchanges frames with
//! that thread over channels, keeping `poll_rx`/`try_send` non-blocking as
//! [`RadioIo`](crate::radio_io::RadioIo) requires.
//!
//! # Frame tag
//!
//! Everything above this adapter treats a received frame as an opaque
//! `ReceivedFrame` tagged `Control`/`Data` plus a link-layer sequence
//! number for sequence-gap ETX (spec §4.3). Neither distinction exists on
//! the physical layer, so this adapter — not the routing core — stamps
//! one byte (kind) and one little-endian `u16` (this node's outgoing
//! frame counter) ahead of every payload it transmits, and strips the
//! same prefix off everything it receives.
//!
//! ```ignore
//! use loramesh::lora::{LoRaRadio, LoRaInterface};
//!
//! let mut radio = LoRaRadio::new(spi, sclk, mosi, miso, cs, reset, busy, dio1, Region::Eu868)?;
//! radio.init()?;
//! let iface: Arc<dyn RadioIo> = Arc::new(LoRaInterface::spawn(radio));
//! ```

use super::config::LORA_MTU;
use super::radio::LoRaRadio;
use crate::radio_io::{FrameKind, ReceivedFrame, RadioError, RadioIo, TxOutcome, TxPriority};
use log::{debug, error, warn};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;
use std::time::Duration;

/// LoRa receive timeout per poll (ms). Short, so the worker thread checks
/// for pending TX frequently despite the radio being half-duplex.
const RX_TIMEOUT_MS: u32 = 50;

/// Delay after a driver error before retrying.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Maximum consecutive driver panics before the worker thread gives up.
const MAX_CONSECUTIVE_PANICS: u32 = 3;

/// Bytes of adapter framing ahead of the payload: 1 kind tag + 2 link-seq.
const FRAME_PREFIX_LEN: usize = 3;

struct TxItem {
    payload: Vec<u8>,
    priority: TxPriority,
}

/// Adapter from a blocking [`LoRaRadio`] to the async-free [`RadioIo`] the
/// routing core depends on.
pub struct LoRaInterface {
    control_tx: SyncSender<TxItem>,
    data_tx: SyncSender<TxItem>,
    rx: Mutex<Receiver<ReceivedFrame>>,
    next_seq: AtomicU16,
}

impl LoRaInterface {
    /// Take ownership of an initialized radio and spawn its worker thread.
    pub fn spawn(radio: LoRaRadio<'static>) -> Self {
        let (control_tx, control_rx) = sync_channel::<TxItem>(4);
        let (data_tx, data_rx) = sync_channel::<TxItem>(16);
        let (rx_tx, rx_rx) = sync_channel::<ReceivedFrame>(16);

        std::thread::spawn(move || worker_loop(radio, control_rx, data_rx, rx_tx));

        Self {
            control_tx,
            data_tx,
            rx: Mutex::new(rx_rx),
            next_seq: AtomicU16::new(0),
        }
    }
}

impl RadioIo for LoRaInterface {
    fn poll_rx(&self) -> Option<ReceivedFrame> {
        self.rx.lock().unwrap().try_recv().ok()
    }

    fn try_send(&self, payload: &[u8], priority: TxPriority) -> Result<TxOutcome, RadioError> {
        if payload.len() + FRAME_PREFIX_LEN > LORA_MTU {
            return Err(RadioError::NotReady);
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut framed = Vec::with_capacity(FRAME_PREFIX_LEN + payload.len());
        framed.push(kind_tag(priority));
        framed.extend_from_slice(&seq.to_le_bytes());
        framed.extend_from_slice(payload);

        let channel = match priority {
            TxPriority::Control => &self.control_tx,
            TxPriority::Data => &self.data_tx,
        };
        match channel.try_send(TxItem { payload: framed, priority }) {
            Ok(()) => Ok(TxOutcome::Accepted),
            Err(TrySendError::Full(_)) => Ok(TxOutcome::Busy),
            Err(TrySendError::Disconnected(_)) => Err(RadioError::NotReady),
        }
    }

    fn mtu(&self) -> usize {
        LORA_MTU - FRAME_PREFIX_LEN
    }
}

fn kind_tag(priority: TxPriority) -> u8 {
    match priority {
        TxPriority::Control => 0,
        TxPriority::Data => 1,
    }
}

fn kind_from_tag(tag: u8) -> Option<FrameKind> {
    match tag {
        0 => Some(FrameKind::Control),
        1 => Some(FrameKind::Data),
        _ => None,
    }
}

/// Owns the radio exclusively; runs until the TX channels disconnect
/// (i.e. the `LoRaInterface` and every clone of its senders are dropped).
fn worker_loop(
    mut radio: LoRaRadio<'static>,
    control_rx: Receiver<TxItem>,
    data_rx: Receiver<TxItem>,
    rx_tx: SyncSender<ReceivedFrame>,
) {
    let mut consecutive_panics: u32 = 0;

    loop {
        if consecutive_panics >= MAX_CONSECUTIVE_PANICS {
            error!(
                "LoRa worker shutting down after {consecutive_panics} consecutive driver errors"
            );
            break;
        }

        // Priority 1: control frames, then data frames (half-duplex, we
        // control when to transmit).
        let next_tx = control_rx.try_recv().ok().or_else(|| data_rx.try_recv().ok());
        if let Some(item) = next_tx {
            debug!("LoRa TX: {} bytes ({:?})", item.payload.len(), item.priority);
            match radio.transmit(&item.payload) {
                Ok(()) => {
                    debug!("LoRa TX complete");
                    consecutive_panics = 0;
                }
                Err(e) => {
                    warn!("LoRa TX error: {e}");
                    consecutive_panics = 0;
                    std::thread::sleep(ERROR_BACKOFF);
                }
            }
            continue;
        }

        match radio.receive(RX_TIMEOUT_MS) {
            Ok(Some(received)) => {
                consecutive_panics = 0;
                if received.data.len() < FRAME_PREFIX_LEN {
                    warn!("LoRa RX: frame shorter than adapter prefix, dropped");
                    continue;
                }
                let kind = match kind_from_tag(received.data[0]) {
                    Some(kind) => kind,
                    None => {
                        warn!("LoRa RX: unknown frame kind tag {}", received.data[0]);
                        continue;
                    }
                };
                let link_seq = u16::from_le_bytes([received.data[1], received.data[2]]);
                let frame = ReceivedFrame {
                    kind,
                    payload: received.data[FRAME_PREFIX_LEN..].to_vec(),
                    rssi: received.rssi as f32,
                    snr: received.snr as f32,
                    link_seq,
                };
                if rx_tx.try_send(frame).is_err() {
                    warn!("LoRa RX: inbox full, dropping frame");
                }
            }
            Ok(None) => {
                consecutive_panics = 0;
            }
            Err(e) => {
                warn!("LoRa RX error: {e}");
                consecutive_panics = 0;
                std::thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

// Exercising this module requires ESP32 hardware (or a wired-up SPI
// simulator); it is validated through on-device integration testing, like
// the rest of `lora::radio`.
