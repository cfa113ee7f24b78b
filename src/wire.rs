//! Wire formats: HELLO, DATA, and the telemetry application record.
//!
//! Every integer is little-endian and tightly packed — no reliance on
//! compiler struct packing (`#[repr(packed)]` et al.), per the Design
//! Notes: encode/decode by hand with `to_le_bytes`/`from_le_bytes`.

use crate::address::Address;
use std::fmt;

/// Sentinel gateway-load value meaning "unknown" / "not advertised".
pub const GATEWAY_LOAD_UNKNOWN: u8 = 255;

/// Byte length of one packed `NetworkNode` record.
pub const NETWORK_NODE_LEN: usize = 5;

/// Byte length of the fixed HELLO header (before the node list).
pub const HELLO_HEADER_LEN: usize = 5;

/// Byte length of the fixed DATA header (before the application payload).
pub const DATA_HEADER_LEN: usize = 10;

/// Error decoding a wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Too short to contain even the fixed header.
    TooShort,
    /// `nodeCount * NETWORK_NODE_LEN` does not match the remaining bytes.
    TrailingBytes,
    /// More nodes advertised than the wire format allows (0..13).
    TooManyNodes,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "frame shorter than its fixed header"),
            Self::TrailingBytes => write!(f, "payload length is not header + N*node"),
            Self::TooManyNodes => write!(f, "node count exceeds wire maximum"),
        }
    }
}

impl std::error::Error for WireError {}

/// Maximum nodes a single HELLO can carry (wire format allows 0..13).
pub const MAX_NODES_PER_HELLO: usize = 13;

/// One destination as advertised in a HELLO, or stored in the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkNode {
    pub address: Address,
    /// Hop count as known to the advertiser (1 byte).
    pub metric: u8,
    pub role: crate::address::Role,
    /// 255 = unknown, 0..254 = packets-per-minute load indicator.
    pub gateway_load: u8,
}

impl NetworkNode {
    fn to_bytes(self) -> [u8; NETWORK_NODE_LEN] {
        let addr = self.address.value().to_le_bytes();
        [addr[0], addr[1], self.metric, self.role.0, self.gateway_load]
    }

    fn from_bytes(b: &[u8]) -> Self {
        let address = Address(u16::from_le_bytes([b[0], b[1]]));
        Self {
            address,
            metric: b[2],
            role: crate::address::Role(b[3]),
            gateway_load: b[4],
        }
    }
}

/// HELLO control frame: a sender's route digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePacket {
    pub sender_address: Address,
    pub sender_role: crate::address::Role,
    pub sender_gateway_load: u8,
    pub node_list: Vec<NetworkNode>,
}

impl RoutePacket {
    /// Encode to wire bytes. Returns `WireError::TooManyNodes` if the node
    /// list would not fit the one-byte count field's allowed range.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        if self.node_list.len() > MAX_NODES_PER_HELLO {
            return Err(WireError::TooManyNodes);
        }
        let mut out = Vec::with_capacity(HELLO_HEADER_LEN + self.node_list.len() * NETWORK_NODE_LEN);
        out.extend_from_slice(&self.sender_address.value().to_le_bytes());
        out.push(self.sender_role.0);
        out.push(self.sender_gateway_load);
        out.push(self.node_list.len() as u8);
        for node in &self.node_list {
            out.extend_from_slice(&node.to_bytes());
        }
        Ok(out)
    }

    /// Decode from wire bytes. Malformed input (short, wrong remainder, or
    /// too many nodes) is rejected without panicking — callers are expected
    /// to count this against `Stats::record_drop(DropReason::Malformed)`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HELLO_HEADER_LEN {
            return Err(WireError::TooShort);
        }
        let sender_address = Address(u16::from_le_bytes([buf[0], buf[1]]));
        let sender_role = crate::address::Role(buf[2]);
        let sender_gateway_load = buf[3];
        let node_count = buf[4] as usize;
        if node_count > MAX_NODES_PER_HELLO {
            return Err(WireError::TooManyNodes);
        }
        let expected_len = HELLO_HEADER_LEN + node_count * NETWORK_NODE_LEN;
        if buf.len() != expected_len {
            return Err(WireError::TrailingBytes);
        }
        let mut node_list = Vec::with_capacity(node_count);
        for i in 0..node_count {
            let start = HELLO_HEADER_LEN + i * NETWORK_NODE_LEN;
            node_list.push(NetworkNode::from_bytes(&buf[start..start + NETWORK_NODE_LEN]));
        }
        Ok(Self {
            sender_address,
            sender_role,
            sender_gateway_load,
            node_list,
        })
    }
}

/// DATA frame type tag (application-defined; opaque to the core beyond this byte).
pub type DataType = u8;

/// A forwarded application datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub src: Address,
    pub dst: Address,
    pub seq: u16,
    pub ttl: u8,
    pub kind: DataType,
    pub payload: Vec<u8>,
}

impl DataPacket {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DATA_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.src.value().to_le_bytes());
        out.extend_from_slice(&self.dst.value().to_le_bytes());
        out.extend_from_slice(&self.seq.to_le_bytes());
        out.push(self.ttl);
        out.push(self.kind);
        out.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < DATA_HEADER_LEN {
            return Err(WireError::TooShort);
        }
        let src = Address(u16::from_le_bytes([buf[0], buf[1]]));
        let dst = Address(u16::from_le_bytes([buf[2], buf[3]]));
        let seq = u16::from_le_bytes([buf[4], buf[5]]);
        let ttl = buf[6];
        let kind = buf[7];
        let app_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        if buf.len() != DATA_HEADER_LEN + app_len {
            return Err(WireError::TrailingBytes);
        }
        Ok(Self {
            src,
            dst,
            seq,
            ttl,
            kind,
            payload: buf[DATA_HEADER_LEN..].to_vec(),
        })
    }
}

/// Byte length of [`TelemetryRecord`].
///
/// The field list in spec §6 (seqNum:4, srcAddr:2, timestamp:4,
/// sensorValue:4, hopCount:1, pm1_0:1, pm2_5:1, pm10:1, lat:4, lon:4,
/// gpsValid:1, sats:1) sums to 28 bytes, not the "26-byte blob" the prose
/// also states; this codec follows the field list, since it is the more
/// specific and independently checkable of the two (see DESIGN.md).
pub const TELEMETRY_RECORD_LEN: usize = 28;

/// The opaque-to-the-core application telemetry record used by the
/// validation suite. Nothing in the routing core inspects this beyond
/// treating it as DATA frame payload bytes (spec §9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    pub seq_num: u32,
    pub src_addr: Address,
    pub timestamp: u32,
    pub sensor_value: f32,
    pub hop_count: u8,
    pub pm1_0: u8,
    pub pm2_5: u8,
    pub pm10: u8,
    pub lat: f32,
    pub lon: f32,
    pub gps_valid: bool,
    pub sats: u8,
}

impl TelemetryRecord {
    pub fn to_bytes(&self) -> [u8; TELEMETRY_RECORD_LEN] {
        let mut out = [0u8; TELEMETRY_RECORD_LEN];
        out[0..4].copy_from_slice(&self.seq_num.to_le_bytes());
        out[4..6].copy_from_slice(&self.src_addr.value().to_le_bytes());
        out[6..10].copy_from_slice(&self.timestamp.to_le_bytes());
        out[10..14].copy_from_slice(&self.sensor_value.to_le_bytes());
        out[14] = self.hop_count;
        out[15] = self.pm1_0;
        out[16] = self.pm2_5;
        out[17] = self.pm10;
        out[18..22].copy_from_slice(&self.lat.to_le_bytes());
        out[22..26].copy_from_slice(&self.lon.to_le_bytes());
        out[26] = self.gps_valid as u8;
        out[27] = self.sats;
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != TELEMETRY_RECORD_LEN {
            return Err(WireError::TooShort);
        }
        Ok(Self {
            seq_num: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            src_addr: Address(u16::from_le_bytes([buf[4], buf[5]])),
            timestamp: u32::from_le_bytes(buf[6..10].try_into().unwrap()),
            sensor_value: f32::from_le_bytes(buf[10..14].try_into().unwrap()),
            hop_count: buf[14],
            pm1_0: buf[15],
            pm2_5: buf[16],
            pm10: buf[17],
            lat: f32::from_le_bytes(buf[18..22].try_into().unwrap()),
            lon: f32::from_le_bytes(buf[22..26].try_into().unwrap()),
            gps_valid: buf[26] != 0,
            sats: buf[27],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Role;
    use loramesh_macros::esp32_test;

    fn sample_node(addr: u16, metric: u8) -> NetworkNode {
        NetworkNode {
            address: Address(addr),
            metric,
            role: Role::ROUTER,
            gateway_load: GATEWAY_LOAD_UNKNOWN,
        }
    }

    #[esp32_test]
    fn test_hello_round_trip() {
        let packet = RoutePacket {
            sender_address: Address(0x0010),
            sender_role: Role::ROUTER,
            sender_gateway_load: 5,
            node_list: vec![sample_node(0x0020, 1), sample_node(0x0030, 2)],
        };
        let bytes = packet.to_bytes().unwrap();
        let decoded = RoutePacket::from_bytes(&bytes).unwrap();
        assert_eq!(packet, decoded);
    }

    #[esp32_test]
    fn test_hello_empty_node_list() {
        let packet = RoutePacket {
            sender_address: Address(0x1),
            sender_role: Role::SENSOR,
            sender_gateway_load: GATEWAY_LOAD_UNKNOWN,
            node_list: vec![],
        };
        let bytes = packet.to_bytes().unwrap();
        assert_eq!(bytes.len(), HELLO_HEADER_LEN);
        assert_eq!(RoutePacket::from_bytes(&bytes).unwrap(), packet);
    }

    #[esp32_test]
    fn test_hello_too_many_nodes_rejected() {
        let packet = RoutePacket {
            sender_address: Address(0x1),
            sender_role: Role::SENSOR,
            sender_gateway_load: 0,
            node_list: (0..14).map(|i| sample_node(i, 1)).collect(),
        };
        assert_eq!(packet.to_bytes(), Err(WireError::TooManyNodes));
    }

    #[esp32_test]
    fn test_hello_malformed_length_rejected() {
        let mut bytes = vec![0x01, 0x00, 0x00, 0xFF, 0x01];
        bytes.extend_from_slice(&[0, 0, 0]); // short one byte of a node record
        assert_eq!(RoutePacket::from_bytes(&bytes), Err(WireError::TrailingBytes));
    }

    #[esp32_test]
    fn test_hello_too_short_rejected() {
        assert_eq!(RoutePacket::from_bytes(&[0x01, 0x02]), Err(WireError::TooShort));
    }

    #[esp32_test]
    fn test_data_round_trip() {
        let pkt = DataPacket {
            src: Address(0x1),
            dst: Address(0x2),
            seq: 42,
            ttl: 3,
            kind: 7,
            payload: vec![1, 2, 3, 4],
        };
        let bytes = pkt.to_bytes();
        assert_eq!(DataPacket::from_bytes(&bytes).unwrap(), pkt);
    }

    #[esp32_test]
    fn test_data_empty_payload() {
        let pkt = DataPacket {
            src: Address(0x1),
            dst: Address(BROADCAST_FOR_TEST),
            seq: 1,
            ttl: 5,
            kind: 0,
            payload: vec![],
        };
        let bytes = pkt.to_bytes();
        assert_eq!(bytes.len(), DATA_HEADER_LEN);
        assert_eq!(DataPacket::from_bytes(&bytes).unwrap(), pkt);
    }

    const BROADCAST_FOR_TEST: u16 = 0xFFFF;

    #[esp32_test]
    fn test_telemetry_round_trip() {
        let rec = TelemetryRecord {
            seq_num: 12345,
            src_addr: Address(0xBEEF),
            timestamp: 1_700_000_000,
            sensor_value: 21.5,
            hop_count: 3,
            pm1_0: 4,
            pm2_5: 9,
            pm10: 15,
            lat: 53.349_8,
            lon: -6.260_3,
            gps_valid: true,
            sats: 8,
        };
        let bytes = rec.to_bytes();
        assert_eq!(bytes.len(), TELEMETRY_RECORD_LEN);
        assert_eq!(TelemetryRecord::from_bytes(&bytes).unwrap(), rec);
    }
}
