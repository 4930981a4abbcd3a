use anyhow::{Result, anyhow};

pub const HASHBLOCK: &str = "hashblock";
pub const RAWTX: &str = "rawtx";

/// One daemon publication: `[topic, payload, 4-byte LE sequence]`. The
/// sequence frame is per-topic and only used for logging here.
#[derive(Debug, Clone, PartialEq)]
pub enum DataMessage {
    /// Hex of the new tip hash, exactly as published.
    HashBlock(String),
    /// Raw transaction bytes.
    RawTx(Vec<u8>),
}

impl DataMessage {
    pub fn from_zmq_message(multipart: Vec<Vec<u8>>) -> Result<(Option<u32>, Self)> {
        if multipart.len() < 2 {
            return Err(anyhow!(
                "Received multipart message with {} frames",
                multipart.len()
            ));
        }

        let sequence = multipart
            .get(2)
            .and_then(|frame| <[u8; 4]>::try_from(frame.as_slice()).ok())
            .map(u32::from_le_bytes);

        let topic = &multipart[0];
        let payload = &multipart[1];
        if topic.as_slice() == HASHBLOCK.as_bytes() {
            if payload.len() != 32 {
                return Err(anyhow!(
                    "Received hashblock payload of {} bytes",
                    payload.len()
                ));
            }
            Ok((sequence, DataMessage::HashBlock(hex::encode(payload))))
        } else if topic.as_slice() == RAWTX.as_bytes() {
            Ok((sequence, DataMessage::RawTx(payload.clone())))
        } else {
            Err(anyhow!(
                "Received message with unknown topic: {}",
                String::from_utf8_lossy(topic)
            ))
        }
    }
}

/// Socket lifecycle events from the ZMQ monitor pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorMessage {
    Connected,
    ConnectDelayed,
    ConnectRetried,
    Closed,
    Disconnected,
    MonitorStopped,
    HandshakeSucceeded,
    HandshakeFailed(u16),
    Other(u16),
}

impl MonitorMessage {
    pub fn from_raw(event_type: u16) -> Self {
        match event_type {
            0x0001 => MonitorMessage::Connected,
            0x0002 => MonitorMessage::ConnectDelayed,
            0x0004 => MonitorMessage::ConnectRetried,
            0x0080 => MonitorMessage::Closed,
            0x0200 => MonitorMessage::Disconnected,
            0x0400 => MonitorMessage::MonitorStopped,
            0x1000 => MonitorMessage::HandshakeSucceeded,
            0x0800 | 0x2000 | 0x4000 => MonitorMessage::HandshakeFailed(event_type),
            other => MonitorMessage::Other(other),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            MonitorMessage::ConnectRetried
                | MonitorMessage::Closed
                | MonitorMessage::Disconnected
                | MonitorMessage::HandshakeFailed(_)
        )
    }

    pub fn all_events_mask() -> i32 {
        0xFFFF
    }

    pub fn from_zmq_message(multipart: Vec<Vec<u8>>) -> Result<Self> {
        if multipart.is_empty() || multipart[0].len() < 2 {
            return Err(anyhow!("Received invalid monitor message"));
        }
        let event_type = u16::from_le_bytes(
            multipart[0][0..2]
                .try_into()
                .expect("slice is exactly two bytes"),
        );
        Ok(MonitorMessage::from_raw(event_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hashblock() {
        let hash = [0xabu8; 32];
        let (sequence, message) = DataMessage::from_zmq_message(vec![
            HASHBLOCK.as_bytes().to_vec(),
            hash.to_vec(),
            7u32.to_le_bytes().to_vec(),
        ])
        .unwrap();
        assert_eq!(sequence, Some(7));
        assert_eq!(message, DataMessage::HashBlock("ab".repeat(32)));
    }

    #[test]
    fn parses_rawtx() {
        let payload = vec![1u8, 2, 3];
        let (_, message) =
            DataMessage::from_zmq_message(vec![RAWTX.as_bytes().to_vec(), payload.clone()])
                .unwrap();
        assert_eq!(message, DataMessage::RawTx(payload));
    }

    #[test]
    fn rejects_unknown_topic() {
        assert!(DataMessage::from_zmq_message(vec![b"hashtx".to_vec(), vec![0u8; 32]]).is_err());
    }

    #[test]
    fn monitor_failures() {
        assert!(MonitorMessage::from_raw(0x0200).is_failure());
        assert!(!MonitorMessage::from_raw(0x1000).is_failure());
    }
}
