//! WAL record types
//!
//! Every structural mutation of the HNSW graph is described by exactly one
//! `WalRecord`. The log is the only durable copy of graph topology; vector
//! payloads are never written here.
//!
//! ## Binary Layout
//!
//! All integers little-endian. The opcode byte is followed by:
//!
//! | Opcode | Record | Payload |
//! |---|---|---|
//! | 0 | AddVertex | id:u64, level:u32 |
//! | 1 | SetEntryPointWithMaxLayer | id:u64, level:u32 |
//! | 2 | SetConnectionsAtLevel | id:u64, level:u32, count:u32, ids:u64 x count |
//! | 3 | AddConnectionAtLevel | id:u64, level:u32, neighbor:u64 |
//! | 4 | DeleteVertex | id:u64 |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};
use vectory_core::error::{Error, Result};
use vectory_core::types::VectorId;

/// Opcode bytes, one per record variant
pub mod opcodes {
    /// AddVertex
    pub const ADD_VERTEX: u8 = 0;
    /// SetEntryPointWithMaxLayer
    pub const SET_ENTRY_POINT: u8 = 1;
    /// SetConnectionsAtLevel
    pub const SET_CONNECTIONS: u8 = 2;
    /// AddConnectionAtLevel
    pub const ADD_CONNECTION: u8 = 3;
    /// DeleteVertex
    pub const DELETE_VERTEX: u8 = 4;
}

/// A single graph mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// A vertex was registered with layers `0..=level`
    AddVertex {
        /// Vertex id
        id: VectorId,
        /// Highest layer the vertex lives on
        level: u32,
    },

    /// The entry point moved to `id`, and the graph's top layer is now `level`
    SetEntryPointWithMaxLayer {
        /// New entry point
        id: VectorId,
        /// New top layer
        level: u32,
    },

    /// The adjacency of `id` at `level` was replaced
    SetConnectionsAtLevel {
        /// Vertex whose list was replaced
        id: VectorId,
        /// Layer
        level: u32,
        /// Complete new neighbor list, in order
        neighbors: Vec<VectorId>,
    },

    /// `neighbor` was appended to the adjacency of `id` at `level`
    AddConnectionAtLevel {
        /// Vertex whose list grew
        id: VectorId,
        /// Layer
        level: u32,
        /// Appended neighbor
        neighbor: VectorId,
    },

    /// `id` was tombstoned
    DeleteVertex {
        /// Tombstoned id
        id: VectorId,
    },
}

impl WalRecord {
    /// Opcode byte for this record
    pub fn opcode(&self) -> u8 {
        match self {
            WalRecord::AddVertex { .. } => opcodes::ADD_VERTEX,
            WalRecord::SetEntryPointWithMaxLayer { .. } => opcodes::SET_ENTRY_POINT,
            WalRecord::SetConnectionsAtLevel { .. } => opcodes::SET_CONNECTIONS,
            WalRecord::AddConnectionAtLevel { .. } => opcodes::ADD_CONNECTION,
            WalRecord::DeleteVertex { .. } => opcodes::DELETE_VERTEX,
        }
    }

    /// Size in bytes of the payload that follows the opcode
    pub fn payload_len(&self) -> usize {
        match self {
            WalRecord::AddVertex { .. } | WalRecord::SetEntryPointWithMaxLayer { .. } => 12,
            WalRecord::SetConnectionsAtLevel { neighbors, .. } => 16 + 8 * neighbors.len(),
            WalRecord::AddConnectionAtLevel { .. } => 20,
            WalRecord::DeleteVertex { .. } => 8,
        }
    }

    /// Write the payload (everything after the opcode) to `w`
    pub fn write_payload<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            WalRecord::AddVertex { id, level } | WalRecord::SetEntryPointWithMaxLayer { id, level } => {
                w.write_u64::<LittleEndian>(*id)?;
                w.write_u32::<LittleEndian>(*level)?;
            }
            WalRecord::SetConnectionsAtLevel {
                id,
                level,
                neighbors,
            } => {
                w.write_u64::<LittleEndian>(*id)?;
                w.write_u32::<LittleEndian>(*level)?;
                w.write_u32::<LittleEndian>(neighbors.len() as u32)?;
                for n in neighbors {
                    w.write_u64::<LittleEndian>(*n)?;
                }
            }
            WalRecord::AddConnectionAtLevel {
                id,
                level,
                neighbor,
            } => {
                w.write_u64::<LittleEndian>(*id)?;
                w.write_u32::<LittleEndian>(*level)?;
                w.write_u64::<LittleEndian>(*neighbor)?;
            }
            WalRecord::DeleteVertex { id } => {
                w.write_u64::<LittleEndian>(*id)?;
            }
        }
        Ok(())
    }

    /// Serialize as opcode byte followed by payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(1 + self.payload_len());
        buf.push(self.opcode());
        self.write_payload(&mut buf)?;
        Ok(buf)
    }

    /// Deserialize from opcode byte followed by payload
    ///
    /// `offset` is the file position of the record, used in error messages.
    pub fn from_bytes(bytes: &[u8], offset: u64) -> Result<Self> {
        match bytes.split_first() {
            Some((&opcode, payload)) => Self::decode(opcode, payload, offset),
            None => Err(Error::Corruption(format!(
                "offset {}: empty record body",
                offset
            ))),
        }
    }

    /// Decode a payload for `opcode`
    ///
    /// # Errors
    ///
    /// - `UnknownOpcode` if `opcode` is not in the opcode table
    /// - `Corruption` if the payload length does not match the opcode's layout
    pub fn decode(opcode: u8, payload: &[u8], offset: u64) -> Result<Self> {
        let mut cursor = Cursor::new(payload);
        let short = |what: &str| {
            Error::Corruption(format!(
                "offset {}: payload too short for {} (opcode {}, {} bytes)",
                offset,
                what,
                opcode,
                payload.len()
            ))
        };

        let record = match opcode {
            opcodes::ADD_VERTEX | opcodes::SET_ENTRY_POINT => {
                let id = cursor.read_u64::<LittleEndian>().map_err(|_| short("id"))?;
                let level = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|_| short("level"))?;
                if opcode == opcodes::ADD_VERTEX {
                    WalRecord::AddVertex { id, level }
                } else {
                    WalRecord::SetEntryPointWithMaxLayer { id, level }
                }
            }
            opcodes::SET_CONNECTIONS => {
                let id = cursor.read_u64::<LittleEndian>().map_err(|_| short("id"))?;
                let level = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|_| short("level"))?;
                let count = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|_| short("count"))? as usize;
                let remaining = payload.len().saturating_sub(16);
                if remaining as u64 != count as u64 * 8 {
                    return Err(Error::Corruption(format!(
                        "offset {}: neighbor count {} does not match {} payload bytes",
                        offset, count, remaining
                    )));
                }
                let mut neighbors = Vec::with_capacity(count);
                for _ in 0..count {
                    neighbors.push(
                        cursor
                            .read_u64::<LittleEndian>()
                            .map_err(|_| short("neighbor"))?,
                    );
                }
                WalRecord::SetConnectionsAtLevel {
                    id,
                    level,
                    neighbors,
                }
            }
            opcodes::ADD_CONNECTION => {
                let id = cursor.read_u64::<LittleEndian>().map_err(|_| short("id"))?;
                let level = cursor
                    .read_u32::<LittleEndian>()
                    .map_err(|_| short("level"))?;
                let neighbor = cursor
                    .read_u64::<LittleEndian>()
                    .map_err(|_| short("neighbor"))?;
                WalRecord::AddConnectionAtLevel {
                    id,
                    level,
                    neighbor,
                }
            }
            opcodes::DELETE_VERTEX => {
                let id = cursor.read_u64::<LittleEndian>().map_err(|_| short("id"))?;
                WalRecord::DeleteVertex { id }
            }
            other => {
                return Err(Error::UnknownOpcode {
                    opcode: other,
                    offset,
                })
            }
        };

        if cursor.position() as usize != payload.len() {
            return Err(Error::Corruption(format!(
                "offset {}: {} trailing bytes after opcode {} payload",
                offset,
                payload.len() - cursor.position() as usize,
                opcode
            )));
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_records() -> Vec<WalRecord> {
        vec![
            WalRecord::AddVertex {
                id: 0x0102_0304_0506_0708,
                level: 3,
            },
            WalRecord::SetEntryPointWithMaxLayer {
                id: u64::MAX,
                level: u32::MAX,
            },
            WalRecord::SetConnectionsAtLevel {
                id: 17,
                level: 0,
                neighbors: vec![1, 99, u64::MAX, 0],
            },
            WalRecord::SetConnectionsAtLevel {
                id: 18,
                level: 2,
                neighbors: vec![],
            },
            WalRecord::AddConnectionAtLevel {
                id: 5,
                level: 1,
                neighbor: 6,
            },
            WalRecord::DeleteVertex { id: 42 },
        ]
    }

    #[test]
    fn test_each_opcode_roundtrips() {
        for record in all_records() {
            let bytes = record.to_bytes().unwrap();
            assert_eq!(bytes[0], record.opcode());
            assert_eq!(bytes.len(), 1 + record.payload_len());

            let decoded = WalRecord::from_bytes(&bytes, 0).unwrap();
            assert_eq!(decoded, record, "roundtrip failed for {:?}", record);
        }
    }

    #[test]
    fn test_add_vertex_layout() {
        let bytes = WalRecord::AddVertex { id: 1, level: 2 }.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0, 1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0],
            "AddVertex must be opcode, u64 LE id, u32 LE level"
        );
    }

    #[test]
    fn test_set_connections_layout() {
        let bytes = WalRecord::SetConnectionsAtLevel {
            id: 1,
            level: 0,
            neighbors: vec![7],
        }
        .to_bytes().unwrap();
        assert_eq!(bytes.len(), 1 + 8 + 4 + 4 + 8);
        assert_eq!(bytes[0], opcodes::SET_CONNECTIONS);
        assert_eq!(&bytes[13..17], &1u32.to_le_bytes());
        assert_eq!(&bytes[17..25], &7u64.to_le_bytes());
    }

    #[test]
    fn test_delete_layout() {
        let bytes = WalRecord::DeleteVertex { id: 9 }.to_bytes().unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], opcodes::DELETE_VERTEX);
    }

    #[test]
    fn test_unknown_opcode() {
        let err = WalRecord::decode(5, &[0u8; 8], 100).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownOpcode {
                opcode: 5,
                offset: 100
            }
        ));
    }

    #[test]
    fn test_short_payload_is_corruption() {
        let err = WalRecord::decode(opcodes::ADD_VERTEX, &[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_trailing_bytes_are_corruption() {
        let mut bytes = WalRecord::DeleteVertex { id: 1 }.to_bytes().unwrap();
        bytes.push(0xAA);
        let err = WalRecord::from_bytes(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_neighbor_count_mismatch_is_corruption() {
        let mut bytes = WalRecord::SetConnectionsAtLevel {
            id: 1,
            level: 0,
            neighbors: vec![2, 3],
        }
        .to_bytes().unwrap();
        // Claim three neighbors while carrying two.
        bytes[13..17].copy_from_slice(&3u32.to_le_bytes());
        let err = WalRecord::from_bytes(&bytes, 0).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }
}
