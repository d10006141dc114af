//! Splitting a serialized save into protocol-sized chunks and putting it back
//! together on the receiving side.

use thiserror::Error;

use super::protocol::Message;

/// Upper bound on the payload bytes carried by one WORLD_SAVE_CHUNK line.
pub const CHUNK_SIZE: usize = 32 * 1024;
/// Largest transfer a receiver will prepare for (128 MiB of text).
pub const MAX_CHUNKS: usize = 4096;
/// Longest protocol line a reader buffers: one full chunk plus its header.
pub const MAX_LINE_LEN: usize = CHUNK_SIZE + 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("chunk received before WORLD_SAVE_START")]
    NotStarted,
    #[error("announced {announced} chunks, limit is {limit}")]
    TooManyChunks { announced: usize, limit: usize },
    #[error("chunk index {index} outside announced count {expected}")]
    IndexOutOfRange { index: usize, expected: usize },
    #[error("chunk {index} carries {len} bytes, limit is {limit}")]
    ChunkTooLarge {
        index: usize,
        len: usize,
        limit: usize,
    },
    #[error("transfer incomplete: {received} of {expected} chunks")]
    Incomplete { received: usize, expected: usize },
}

/// Splits `text` into pieces of at most `size` bytes without cutting a
/// UTF-8 sequence. Base64 is ASCII, so in practice every piece is full.
pub fn split_chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(4);
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// START, one CHUNK per piece in index order, END.
pub fn transfer_messages(text: &str) -> Vec<Message> {
    let chunks = split_chunks(text, CHUNK_SIZE);
    let mut messages = Vec::with_capacity(chunks.len() + 2);
    messages.push(Message::WorldSaveStart {
        chunks: chunks.len(),
    });
    messages.extend(chunks.into_iter().enumerate().map(|(index, data)| {
        Message::WorldSaveChunk {
            index,
            data: data.to_string(),
        }
    }));
    messages.push(Message::WorldSaveEnd);
    messages
}

/// Collects chunks of one transfer. Chunks may arrive in any order; a
/// repeated index replaces the earlier payload.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    slots: Option<Vec<Option<String>>>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new transfer, discarding anything half-received.
    pub fn start(&mut self, chunks: usize) -> Result<(), TransferError> {
        self.slots = None;
        if chunks > MAX_CHUNKS {
            return Err(TransferError::TooManyChunks {
                announced: chunks,
                limit: MAX_CHUNKS,
            });
        }
        self.slots = Some(vec![None; chunks]);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.slots.is_some()
    }

    pub fn received(&self) -> usize {
        self.slots
            .as_ref()
            .map_or(0, |s| s.iter().filter(|c| c.is_some()).count())
    }

    pub fn accept(&mut self, index: usize, data: String) -> Result<(), TransferError> {
        let slots = self.slots.as_mut().ok_or(TransferError::NotStarted)?;
        if data.len() > CHUNK_SIZE {
            return Err(TransferError::ChunkTooLarge {
                index,
                len: data.len(),
                limit: CHUNK_SIZE,
            });
        }
        let expected = slots.len();
        let slot = slots
            .get_mut(index)
            .ok_or(TransferError::IndexOutOfRange { index, expected })?;
        *slot = Some(data);
        Ok(())
    }

    /// Ends the transfer. The assembler is reset either way.
    pub fn finish(&mut self) -> Result<String, TransferError> {
        let slots = self.slots.take().ok_or(TransferError::NotStarted)?;
        let expected = slots.len();
        let received = slots.iter().filter(|c| c.is_some()).count();
        if received != expected {
            return Err(TransferError::Incomplete { received, expected });
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_size_and_char_boundaries() {
        let text = "ab\u{e9}cd\u{e9}";
        let chunks = split_chunks(text, 4);
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(chunks.concat(), text);
        assert!(split_chunks("", 8).is_empty());
    }

    #[test]
    fn messages_frame_the_chunks() {
        let text = "A".repeat(CHUNK_SIZE * 2 + 10);
        let msgs = transfer_messages(&text);
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[0], Message::WorldSaveStart { chunks: 3 });
        assert_eq!(msgs[4], Message::WorldSaveEnd);
        match &msgs[3] {
            Message::WorldSaveChunk { index, data } => {
                assert_eq!(*index, 2);
                assert_eq!(data.len(), 10);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn out_of_order_chunks_reassemble() {
        let text = "0123456789abcdefghij";
        let pieces = split_chunks(text, 4);
        let mut asm = ChunkAssembler::new();
        asm.start(pieces.len()).unwrap();
        for i in (0..pieces.len()).rev() {
            asm.accept(i, pieces[i].to_string()).unwrap();
        }
        assert_eq!(asm.finish().unwrap(), text);
        assert!(!asm.is_active());
    }

    #[test]
    fn duplicate_chunk_overwrites() {
        let mut asm = ChunkAssembler::new();
        asm.start(2).unwrap();
        asm.accept(0, "old".into()).unwrap();
        asm.accept(0, "ab".into()).unwrap();
        assert_eq!(asm.received(), 1);
        asm.accept(1, "cd".into()).unwrap();
        assert_eq!(asm.finish().unwrap(), "abcd");
    }

    #[test]
    fn incomplete_transfer_rejected() {
        let mut asm = ChunkAssembler::new();
        asm.start(3).unwrap();
        asm.accept(0, "a".into()).unwrap();
        asm.accept(2, "c".into()).unwrap();
        assert_eq!(
            asm.finish(),
            Err(TransferError::Incomplete {
                received: 2,
                expected: 3
            })
        );
    }

    #[test]
    fn chunk_outside_transfer_rejected() {
        let mut asm = ChunkAssembler::new();
        assert_eq!(asm.accept(0, "x".into()), Err(TransferError::NotStarted));
        assert_eq!(
            asm.start(MAX_CHUNKS + 1),
            Err(TransferError::TooManyChunks {
                announced: MAX_CHUNKS + 1,
                limit: MAX_CHUNKS
            })
        );
        assert!(!asm.is_active());
        asm.start(1).unwrap();
        assert_eq!(
            asm.accept(1, "x".into()),
            Err(TransferError::IndexOutOfRange {
                index: 1,
                expected: 1
            })
        );
    }

    #[test]
    fn oversized_chunk_rejected() {
        let mut asm = ChunkAssembler::new();
        asm.start(1).unwrap();
        assert_eq!(
            asm.accept(0, "A".repeat(CHUNK_SIZE * 2000)),
            Err(TransferError::ChunkTooLarge {
                index: 0,
                len: CHUNK_SIZE * 2000,
                limit: CHUNK_SIZE
            })
        );
        assert_eq!(asm.received(), 0);
        asm.accept(0, "A".repeat(CHUNK_SIZE)).unwrap();
        assert_eq!(asm.finish().map(|t| t.len()), Ok(CHUNK_SIZE));
    }
}
