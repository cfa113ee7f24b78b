//! Boundary between the routing core and the physical radio driver.
//!
//! Everything on the other side of this trait — modulation, CRC,
//! time-on-air accounting, duty-cycle enforcement — is explicitly out of
//! scope here; `LoRaInterface` in `lora::iface` is the production
//! implementation wrapping the SX1262 driver.

use std::fmt;

/// Which payload codec a received frame should be decoded with. The radio
/// header (outside this crate) carries this distinction on the wire — the
/// HELLO and DATA payload formats share no self-describing tag of their
/// own, so the core must not guess by trying both decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Control,
    Data,
}

/// A decoded frame as delivered upward by the radio driver, carrying the
/// physical-layer measurements the routing core needs (spec §4.3's
/// LinkMetrics inputs) alongside the payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFrame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
    pub rssi: f32,
    pub snr: f32,
    /// Per-neighbor frame counter from the radio/MAC layer, used for
    /// sequence-gap ETX. Not the same counter as a DATA frame's `seq`.
    pub link_seq: u16,
}

/// Priority hint for an outbound frame. HELLOs share the medium with
/// application DATA traffic; Forwarder and HelloScheduler both enqueue
/// through the same trait, so priority is explicit at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPriority {
    Control,
    Data,
}

/// Outcome of a non-blocking send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Accepted,
    /// The radio could not accept the frame right now (duty cycle,
    /// half-duplex busy, queue full); caller may retry later.
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioError {
    Busy,
    NotReady,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "radio busy"),
            Self::NotReady => write!(f, "radio not ready"),
        }
    }
}

impl std::error::Error for RadioError {}

/// The routing core's entire contract with a physical radio.
///
/// Implementations decide modulation, airtime budget, and duty-cycle
/// enforcement; the core only needs to poll for inbound frames and hand
/// off outbound bytes with a priority hint.
pub trait RadioIo: Send + Sync {
    /// Non-blocking poll for one received frame, if any is queued.
    fn poll_rx(&self) -> Option<ReceivedFrame>;

    /// Attempt to transmit `payload` without blocking.
    fn try_send(&self, payload: &[u8], priority: TxPriority) -> Result<TxOutcome, RadioError>;

    /// Maximum payload size this radio's current configuration allows in
    /// one frame (e.g. `lora::config::LORA_MTU` for the production driver).
    fn mtu(&self) -> usize;
}

#[cfg(test)]
pub(crate) mod loopback {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// In-memory `RadioIo` used by host tests and the demo binary: every
    /// `try_send` is immediately visible to `poll_rx` on the same instance,
    /// so tests can exercise Forwarder/HelloScheduler without real radio
    /// hardware.
    #[derive(Default)]
    pub struct LoopbackRadio {
        inbox: Mutex<VecDeque<ReceivedFrame>>,
        sent: Mutex<Vec<(Vec<u8>, TxPriority)>>,
        mtu: usize,
    }

    impl LoopbackRadio {
        pub fn new(mtu: usize) -> Self {
            Self {
                inbox: Mutex::new(VecDeque::new()),
                sent: Mutex::new(Vec::new()),
                mtu,
            }
        }

        pub fn deliver(&self, frame: ReceivedFrame) {
            self.inbox.lock().unwrap().push_back(frame);
        }

        pub fn sent(&self) -> Vec<(Vec<u8>, TxPriority)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl RadioIo for LoopbackRadio {
        fn poll_rx(&self) -> Option<ReceivedFrame> {
            self.inbox.lock().unwrap().pop_front()
        }

        fn try_send(&self, payload: &[u8], priority: TxPriority) -> Result<TxOutcome, RadioError> {
            if payload.len() > self.mtu {
                return Err(RadioError::NotReady);
            }
            self.sent.lock().unwrap().push((payload.to_vec(), priority));
            Ok(TxOutcome::Accepted)
        }

        fn mtu(&self) -> usize {
            self.mtu
        }
    }
}
