//! Flat byte layout of a board, as read and written by native code.
//!
//! ```text
//! offset 0   u32 width
//! offset 4   u32 height
//! offset 8   u32 head x
//! offset 12  u32 head y
//! offset 16  cells, row-major, 16 bytes each: four u32 counters in color order
//! ```
//!
//! All words are little-endian.

use crate::board::{Board, Cell};
use crate::error::BoardError;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 16;
/// Size of one cell in bytes.
pub const CELL_SIZE: usize = 16;

/// Total buffer size for a board of the given dimensions, or `None` if it
/// does not fit in `usize`.
pub fn native_size(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(CELL_SIZE)?
        .checked_add(HEADER_SIZE)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn decode_cells(bytes: &[u8], count: usize) -> Vec<Cell> {
    (0..count)
        .map(|i| {
            let base = HEADER_SIZE + i * CELL_SIZE;
            let mut stones = [0u32; 4];
            for (c, slot) in stones.iter_mut().enumerate() {
                *slot = read_u32(bytes, base + 4 * c);
            }
            Cell { stones }
        })
        .collect()
}

impl Board {
    /// Size of this board's native buffer.
    pub fn native_len(&self) -> usize {
        HEADER_SIZE + CELL_SIZE * self.cells().len()
    }

    /// Encode the board into its native layout.
    pub fn to_native_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.native_len());
        let (x, y) = self.head();
        for word in [self.width(), self.height(), x, y] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        for cell in self.cells() {
            for count in cell.stones {
                bytes.extend_from_slice(&count.to_le_bytes());
            }
        }
        bytes
    }

    /// Decode a board from its native layout.
    pub fn from_native_bytes(bytes: &[u8]) -> Result<Board, BoardError> {
        if bytes.len() < HEADER_SIZE {
            return Err(BoardError::BufferLength {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let width = read_u32(bytes, 0);
        let height = read_u32(bytes, 4);
        let expected = native_size(width, height).ok_or(BoardError::BufferLength {
            expected: usize::MAX,
            actual: bytes.len(),
        })?;
        if bytes.len() != expected {
            return Err(BoardError::BufferLength {
                expected,
                actual: bytes.len(),
            });
        }
        let head = (read_u32(bytes, 8), read_u32(bytes, 12));
        let cells = decode_cells(bytes, (expected - HEADER_SIZE) / CELL_SIZE);
        Board::from_parts(width, height, head, cells)
    }

    /// Overwrite head and cells from a native buffer of the same size.
    ///
    /// The undo logs are left untouched.
    pub fn update_from_native(&mut self, bytes: &[u8]) -> Result<(), BoardError> {
        let expected = self.native_len();
        if bytes.len() != expected {
            return Err(BoardError::BufferLength {
                expected,
                actual: bytes.len(),
            });
        }
        let (x, y) = (read_u32(bytes, 8), read_u32(bytes, 12));
        self.check_in_bounds(x, y)?;
        let cells = decode_cells(bytes, self.cells().len());
        self.set_cells(cells);
        self.set_head_unlogged(x, y);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Color, Direction};

    #[test]
    fn layout_matches_header_and_cells() {
        let mut board = Board::with_head(2, 1, 1, 0).unwrap();
        board.put(Color::Black, 7);
        let bytes = board.to_native_bytes();
        assert_eq!(Some(bytes.len()), native_size(2, 1));
        assert_eq!(bytes.len(), board.native_len());
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        // cell (1, 0), Black counter
        assert_eq!(read_u32(&bytes, HEADER_SIZE + CELL_SIZE + 4), 7);
    }

    #[test]
    fn decode_restores_board() {
        let mut board = Board::new(3, 2).unwrap();
        board.move_head(Direction::North, 1).unwrap();
        board.put(Color::Green, 2);
        let decoded = Board::from_native_bytes(&board.to_native_bytes()).unwrap();
        assert_eq!(decoded, board);
    }

    #[test]
    fn decode_rejects_bad_lengths_and_heads() {
        assert!(matches!(
            Board::from_native_bytes(&[0; 8]),
            Err(BoardError::BufferLength { .. })
        ));
        let mut bytes = Board::new(1, 1).unwrap().to_native_bytes();
        bytes[8..12].copy_from_slice(&5u32.to_le_bytes());
        assert!(matches!(
            Board::from_native_bytes(&bytes),
            Err(BoardError::HeadOutOfBounds { .. })
        ));
    }

    #[test]
    fn decode_rejects_oversized_headers() {
        assert_eq!(native_size(u32::MAX, u32::MAX), None);
        let mut bytes = vec![0u8; HEADER_SIZE + CELL_SIZE];
        bytes[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            Board::from_native_bytes(&bytes),
            Err(BoardError::BufferLength { actual, .. }) if actual == HEADER_SIZE + CELL_SIZE
        ));
    }

    #[test]
    fn update_keeps_the_change_log() {
        let mut board = Board::new(2, 2).unwrap();
        board.put(Color::Red, 1);
        let mut other = board.clone();
        other.move_head(Direction::East, 1).unwrap();
        board.update_from_native(&other.to_native_bytes()).unwrap();
        assert_eq!(board.head(), (1, 0));
        assert_eq!(board.changelog().len(), 1);
    }
}
