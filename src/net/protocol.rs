//! Line protocol spoken between host and clients.
//!
//! One message per line, fields separated by `:`. Decimal fields always use
//! a `.` separator and two fraction digits, whatever the local locale is.

use thiserror::Error;

use crate::world::tile::Direction;

pub type PlayerId = u32;

/// The host is always player 1.
pub const HOST_ID: PlayerId = 1;
/// Clients are numbered from 2 in connection order.
pub const FIRST_CLIENT_ID: PlayerId = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    PlayerAssign {
        id: PlayerId,
        spawn_x: i32,
        spawn_y: i32,
        seed: u64,
    },
    WorldSeed(u64),
    PlayerUpdate {
        id: PlayerId,
        x: f64,
        y: f64,
        direction: Direction,
    },
    WorldSaveStart {
        chunks: usize,
    },
    WorldSaveChunk {
        index: usize,
        data: String,
    },
    WorldSaveEnd,
    /// Host to the remaining clients: `id` disconnected.
    PlayerLeave {
        id: PlayerId,
    },
    Ping,
    Pong,
}

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("unknown message kind '{0}'")]
    UnknownKind(String),
    #[error("{kind} expects {expected} fields, got {got}")]
    FieldCount {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid {field} value '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid direction code {0}")]
    InvalidDirection(u8),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PlayerAssign { .. } => "PLAYER_ASSIGN",
            Message::WorldSeed(_) => "WORLD_SEED",
            Message::PlayerUpdate { .. } => "PLAYER_UPDATE",
            Message::WorldSaveStart { .. } => "WORLD_SAVE_START",
            Message::WorldSaveChunk { .. } => "WORLD_SAVE_CHUNK",
            Message::WorldSaveEnd => "WORLD_SAVE_END",
            Message::PlayerLeave { .. } => "PLAYER_LEAVE",
            Message::Ping => "PING",
            Message::Pong => "PONG",
        }
    }

    /// Wire form without the trailing newline. Seeds go out as signed
    /// 64-bit decimals so peers with signed seeds can read every value.
    pub fn encode(&self) -> String {
        match self {
            Message::PlayerAssign {
                id,
                spawn_x,
                spawn_y,
                seed,
            } => format!(
                "PLAYER_ASSIGN:{}:{}:{}:{}",
                id, spawn_x, spawn_y, *seed as i64
            ),
            Message::WorldSeed(seed) => format!("WORLD_SEED:{}", *seed as i64),
            Message::PlayerUpdate { id, x, y, direction } => {
                format!("PLAYER_UPDATE:{}:{:.2}:{:.2}:{}", id, x, y, direction.code())
            }
            Message::WorldSaveStart { chunks } => format!("WORLD_SAVE_START:{}", chunks),
            Message::WorldSaveChunk { index, data } => {
                format!("WORLD_SAVE_CHUNK:{}:{}", index, data)
            }
            Message::WorldSaveEnd => "WORLD_SAVE_END".to_string(),
            Message::PlayerLeave { id } => format!("PLAYER_LEAVE:{}", id),
            Message::Ping => "PING".to_string(),
            Message::Pong => "PONG".to_string(),
        }
    }

    pub fn parse(line: &str) -> Result<Message, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let kind = line.split(':').next().unwrap_or_default();
        match kind {
            "PLAYER_ASSIGN" => {
                let f = fields(line, "PLAYER_ASSIGN", 5)?;
                Ok(Message::PlayerAssign {
                    id: parse_int(f[1], "player id")?,
                    spawn_x: parse_coordinate(f[2], "spawn x")?,
                    spawn_y: parse_coordinate(f[3], "spawn y")?,
                    seed: parse_seed(f[4])?,
                })
            }
            "WORLD_SEED" => {
                let f = fields(line, "WORLD_SEED", 2)?;
                Ok(Message::WorldSeed(parse_seed(f[1])?))
            }
            "PLAYER_UPDATE" => {
                let f = fields(line, "PLAYER_UPDATE", 5)?;
                let code: u8 = parse_int(f[4], "direction")?;
                Ok(Message::PlayerUpdate {
                    id: parse_int(f[1], "player id")?,
                    x: parse_decimal(f[2], "x")?,
                    y: parse_decimal(f[3], "y")?,
                    direction: Direction::from_code(code)
                        .ok_or(ProtocolError::InvalidDirection(code))?,
                })
            }
            "WORLD_SAVE_START" => {
                let f = fields(line, "WORLD_SAVE_START", 2)?;
                Ok(Message::WorldSaveStart {
                    chunks: parse_int(f[1], "chunk count")?,
                })
            }
            "WORLD_SAVE_CHUNK" => {
                // payload is taken verbatim, colons included
                let f: Vec<&str> = line.splitn(3, ':').collect();
                if f.len() != 3 {
                    return Err(ProtocolError::FieldCount {
                        kind: "WORLD_SAVE_CHUNK",
                        expected: 3,
                        got: f.len(),
                    });
                }
                Ok(Message::WorldSaveChunk {
                    index: parse_int(f[1], "chunk index")?,
                    data: f[2].to_string(),
                })
            }
            "WORLD_SAVE_END" => bare(line, Message::WorldSaveEnd),
            "PLAYER_LEAVE" => {
                let f = fields(line, "PLAYER_LEAVE", 2)?;
                Ok(Message::PlayerLeave {
                    id: parse_int(f[1], "player id")?,
                })
            }
            "PING" => bare(line, Message::Ping),
            "PONG" => bare(line, Message::Pong),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

fn fields<'a>(line: &'a str, kind: &'static str, expected: usize) -> Result<Vec<&'a str>, ProtocolError> {
    let f: Vec<&str> = line.split(':').collect();
    if f.len() != expected {
        return Err(ProtocolError::FieldCount {
            kind,
            expected,
            got: f.len(),
        });
    }
    Ok(f)
}

fn bare(line: &str, message: Message) -> Result<Message, ProtocolError> {
    if line.contains(':') {
        return Err(ProtocolError::FieldCount {
            kind: message.kind(),
            expected: 1,
            got: line.split(':').count(),
        });
    }
    Ok(message)
}

fn parse_int<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Signed and unsigned 64-bit forms both map onto the same seed bits.
fn parse_seed(value: &str) -> Result<u64, ProtocolError> {
    value
        .parse::<i64>()
        .map(|seed| seed as u64)
        .or_else(|_| value.parse::<u64>())
        .map_err(|_| ProtocolError::InvalidNumber {
            field: "seed",
            value: value.to_string(),
        })
}

/// Accepts `-?digits(.digits)?` only: no exponents, no commas, no `inf`/`NaN`.
fn parse_decimal(value: &str, field: &'static str) -> Result<f64, ProtocolError> {
    let invalid = || ProtocolError::InvalidNumber {
        field,
        value: value.to_string(),
    };
    let unsigned = value.strip_prefix('-').unwrap_or(value);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (unsigned, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(whole) || fraction.is_some_and(|f| !digits(f)) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

/// Spawn cells are sent as integers; a decimal form is tolerated and floored.
fn parse_coordinate(value: &str, field: &'static str) -> Result<i32, ProtocolError> {
    let v = parse_decimal(value, field)?.floor();
    if v < i32::MIN as f64 || v > i32::MAX as f64 {
        return Err(ProtocolError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    Ok(v as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_update_uses_two_decimals_with_dot() {
        let msg = Message::PlayerUpdate {
            id: 2,
            x: 12.345,
            y: 7.0,
            direction: Direction::Left,
        };
        assert_eq!(msg.encode(), "PLAYER_UPDATE:2:12.35:7.00:2");
    }

    #[test]
    fn assign_and_seed_encode_as_integers() {
        let msg = Message::PlayerAssign {
            id: 3,
            spawn_x: 510,
            spawn_y: 498,
            seed: 777,
        };
        assert_eq!(msg.encode(), "PLAYER_ASSIGN:3:510:498:777");
        assert_eq!(Message::WorldSeed(777).encode(), "WORLD_SEED:777");
    }

    #[test]
    fn parses_every_kind() {
        let cases = [
            (
                "PLAYER_ASSIGN:2:10:11:42",
                Message::PlayerAssign {
                    id: 2,
                    spawn_x: 10,
                    spawn_y: 11,
                    seed: 42,
                },
            ),
            ("WORLD_SEED:18446744073709551615", Message::WorldSeed(u64::MAX)),
            (
                "PLAYER_UPDATE:1:500.50:-3.25:3",
                Message::PlayerUpdate {
                    id: 1,
                    x: 500.5,
                    y: -3.25,
                    direction: Direction::Right,
                },
            ),
            ("WORLD_SAVE_START:4", Message::WorldSaveStart { chunks: 4 }),
            (
                "WORLD_SAVE_CHUNK:0:QUJD+/==",
                Message::WorldSaveChunk {
                    index: 0,
                    data: "QUJD+/==".to_string(),
                },
            ),
            ("WORLD_SAVE_END", Message::WorldSaveEnd),
            ("PLAYER_LEAVE:3", Message::PlayerLeave { id: 3 }),
            ("PING", Message::Ping),
            ("PONG\r\n", Message::Pong),
        ];
        for (line, expected) in cases {
            assert_eq!(Message::parse(line), Ok(expected), "line {:?}", line);
        }
    }

    #[test]
    fn assign_tolerates_decimal_spawn() {
        let msg = Message::parse("PLAYER_ASSIGN:2:10.75:11.00:42").unwrap();
        assert!(matches!(msg, Message::PlayerAssign { spawn_x: 10, spawn_y: 11, .. }));
    }

    #[test]
    fn chunk_payload_keeps_colons() {
        let msg = Message::parse("WORLD_SAVE_CHUNK:7:a:b:c").unwrap();
        assert_eq!(
            msg,
            Message::WorldSaveChunk {
                index: 7,
                data: "a:b:c".to_string()
            }
        );
    }

    #[test]
    fn locale_commas_rejected() {
        let err = Message::parse("PLAYER_UPDATE:2:12,50:7,00:0").unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidNumber { field: "x", .. }));
    }

    #[test]
    fn exotic_floats_rejected() {
        for bad in ["1e3", "inf", "NaN", ".5", "5.", "+1.0", ""] {
            let line = format!("PLAYER_UPDATE:2:{}:1.00:0", bad);
            assert!(Message::parse(&line).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn wrong_field_count_rejected() {
        assert_eq!(
            Message::parse("WORLD_SEED"),
            Err(ProtocolError::FieldCount {
                kind: "WORLD_SEED",
                expected: 2,
                got: 1
            })
        );
        assert!(Message::parse("PLAYER_UPDATE:2:1.00:1.00").is_err());
        assert!(Message::parse("PLAYER_UPDATE:2:1.00:1.00:0:9").is_err());
        assert!(Message::parse("PING:1").is_err());
    }

    #[test]
    fn bad_direction_and_unknown_kind() {
        assert_eq!(
            Message::parse("PLAYER_UPDATE:2:1.00:1.00:7"),
            Err(ProtocolError::InvalidDirection(7))
        );
        assert_eq!(
            Message::parse("HELLO:1"),
            Err(ProtocolError::UnknownKind("HELLO".to_string()))
        );
        assert!(Message::parse("WORLD_SEED:5x").is_err());
        assert!(Message::parse("WORLD_SEED:18446744073709551616").is_err());
        assert!(Message::parse("PLAYER_LEAVE").is_err());
    }

    #[test]
    fn seeds_travel_in_signed_form() {
        assert_eq!(Message::WorldSeed(u64::MAX).encode(), "WORLD_SEED:-1");
        assert_eq!(
            Message::WorldSeed(1 << 63).encode(),
            format!("WORLD_SEED:{}", i64::MIN)
        );
        assert_eq!(
            Message::parse("WORLD_SEED:-5"),
            Ok(Message::WorldSeed(-5i64 as u64))
        );
        let assign = Message::PlayerAssign {
            id: 2,
            spawn_x: 1,
            spawn_y: 2,
            seed: u64::MAX - 6,
        };
        assert_eq!(assign.encode(), "PLAYER_ASSIGN:2:1:2:-7");
        assert_eq!(Message::parse(&assign.encode()), Ok(assign));
    }
}
