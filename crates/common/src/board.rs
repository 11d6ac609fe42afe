//! The board: a grid of stone cells, a head, and a transactional undo log.
//!
//! Every mutation appends its inverse to the active [`ChangeLog`].
//! [`Board::push_state`] archives the active log and starts a fresh one;
//! [`Board::pop_state`] replays the fresh log backwards and reinstates the
//! archived one. Function bodies are bracketed this way so that their
//! board effects never reach the caller, while procedures (never bracketed)
//! keep theirs.

use crate::error::BoardError;
use crate::value::{Color, Direction, ALL_COLORS};
use std::mem;
use tracing::debug;

/// Four independent stone counters, indexed by [`Color`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cell {
    pub stones: [u32; 4],
}

impl Cell {
    pub fn count(&self, color: Color) -> u32 {
        self.stones[color.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.stones.iter().all(|&n| n == 0)
    }
}

/// One inverse operation recorded in a [`ChangeLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Put { color: Color, count: u32 },
    Take { color: Color, count: u32 },
    Move { direction: Direction, count: u32 },
    SetHead { x: u32, y: u32 },
    Restore(Vec<Cell>),
}

/// Ordered list of inverse operations, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    entries: Vec<Change>,
}

impl ChangeLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Change] {
        &self.entries
    }

    fn record(&mut self, change: Change) {
        self.entries.push(change);
    }
}

/// A `width × height` grid of [`Cell`]s plus the head position.
///
/// Cells are stored row-major: `(x, y)` lives at `y * width + x`.
#[derive(Debug, Clone)]
pub struct Board {
    width: u32,
    height: u32,
    head: (u32, u32),
    cells: Vec<Cell>,
    log: ChangeLog,
    archived: Vec<ChangeLog>,
}

impl PartialEq for Board {
    /// Boards are equal when size, head and every cell match. Undo logs
    /// are bookkeeping and do not take part.
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head && self.equal_contents(other)
    }
}

impl Eq for Board {}

impl Board {
    /// An empty board with the head at the origin.
    pub fn new(width: u32, height: u32) -> Result<Self, BoardError> {
        if width == 0 || height == 0 {
            return Err(BoardError::InvalidSize { width, height });
        }
        Ok(Self {
            width,
            height,
            head: (0, 0),
            cells: vec![Cell::default(); width as usize * height as usize],
            log: ChangeLog::default(),
            archived: Vec::new(),
        })
    }

    /// An empty board with the head at `(x, y)`.
    pub fn with_head(width: u32, height: u32, x: u32, y: u32) -> Result<Self, BoardError> {
        let mut board = Self::new(width, height)?;
        board.check_in_bounds(x, y)?;
        board.head = (x, y);
        Ok(board)
    }

    pub(crate) fn from_parts(
        width: u32,
        height: u32,
        head: (u32, u32),
        cells: Vec<Cell>,
    ) -> Result<Self, BoardError> {
        let mut board = Self::new(width, height)?;
        board.check_in_bounds(head.0, head.1)?;
        board.head = head;
        board.cells = cells;
        Ok(board)
    }

    pub(crate) fn check_in_bounds(&self, x: u32, y: u32) -> Result<(), BoardError> {
        if x >= self.width || y >= self.height {
            return Err(BoardError::HeadOutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Head position as `(x, y)`.
    pub fn head(&self) -> (u32, u32) {
        self.head
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<&Cell> {
        if x < self.width && y < self.height {
            self.cells.get(self.index(x, y))
        } else {
            None
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn head_index(&self) -> usize {
        self.index(self.head.0, self.head.1)
    }

    pub(crate) fn set_cells(&mut self, cells: Vec<Cell>) {
        self.cells = cells;
    }

    pub(crate) fn set_head_unlogged(&mut self, x: u32, y: u32) {
        self.head = (x, y);
    }

    // ---- Queries ----

    pub fn num_stones(&self, color: Color) -> u32 {
        self.cells[self.head_index()].count(color)
    }

    pub fn exist_stones(&self, color: Color) -> bool {
        self.num_stones(color) > 0
    }

    /// Whether one step in `direction` keeps the head on the board.
    pub fn can_move(&self, direction: Direction) -> bool {
        self.target(direction, 1).is_some()
    }

    /// Same size and same cells; the head position is ignored.
    pub fn equal_contents(&self, other: &Board) -> bool {
        self.width == other.width && self.height == other.height && self.cells == other.cells
    }

    fn target(&self, direction: Direction, count: u32) -> Option<(u32, u32)> {
        let (dx, dy) = direction.delta();
        let x = self.head.0 as i64 + dx * count as i64;
        let y = self.head.1 as i64 + dy * count as i64;
        let in_x = (0..self.width as i64).contains(&x);
        let in_y = (0..self.height as i64).contains(&y);
        (in_x && in_y).then_some((x as u32, y as u32))
    }

    // ---- Mutations ----

    /// Add `count` stones of `color` to the head cell.
    pub fn put(&mut self, color: Color, count: u32) {
        self.raw_put(color, count);
        self.log.record(Change::Take { color, count });
    }

    /// Remove `count` stones of `color` from the head cell.
    ///
    /// Fails without touching the cell if fewer than `count` are present.
    pub fn take(&mut self, color: Color, count: u32) -> Result<(), BoardError> {
        let available = self.num_stones(color);
        if available < count {
            return Err(BoardError::cannot_take(color, count, available));
        }
        self.raw_take(color, count);
        self.log.record(Change::Put { color, count });
        Ok(())
    }

    /// Move the head `count` cells in `direction`.
    ///
    /// Fails without moving if the destination is off the board.
    pub fn move_head(&mut self, direction: Direction, count: u32) -> Result<(), BoardError> {
        let (x, y) = self
            .target(direction, count)
            .ok_or_else(|| BoardError::cannot_move(direction))?;
        self.head = (x, y);
        self.log.record(Change::Move {
            direction: direction.opposite(),
            count,
        });
        Ok(())
    }

    /// Move the head to the edge of the board in `direction`.
    pub fn go_to_boundary(&mut self, direction: Direction) {
        let (x, y) = self.head;
        self.log.record(Change::SetHead { x, y });
        self.head = match direction {
            Direction::North => (x, self.height - 1),
            Direction::East => (self.width - 1, y),
            Direction::South => (x, 0),
            Direction::West => (0, y),
        };
    }

    pub fn go_to_origin(&mut self) {
        let (x, y) = self.head;
        self.log.record(Change::SetHead { x, y });
        self.head = (0, 0);
    }

    /// Remove every stone from the board. The head stays put.
    pub fn clear(&mut self) {
        let empty = vec![Cell::default(); self.cells.len()];
        let old = mem::replace(&mut self.cells, empty);
        self.log.record(Change::Restore(old));
    }

    fn raw_put(&mut self, color: Color, count: u32) {
        let i = self.head_index();
        let slot = &mut self.cells[i].stones[color.index()];
        *slot = slot.wrapping_add(count);
    }

    fn raw_take(&mut self, color: Color, count: u32) {
        let i = self.head_index();
        let slot = &mut self.cells[i].stones[color.index()];
        *slot = slot.wrapping_sub(count);
    }

    /// Apply one logged inverse without recording anything.
    fn revert(&mut self, change: Change) {
        match change {
            Change::Put { color, count } => self.raw_put(color, count),
            Change::Take { color, count } => self.raw_take(color, count),
            Change::Move { direction, count } => {
                if let Some(head) = self.target(direction, count) {
                    self.head = head;
                }
            }
            Change::SetHead { x, y } => self.head = (x, y),
            Change::Restore(cells) => self.cells = cells,
        }
    }

    // ---- Transactions ----

    /// Archive the active change log and start an empty one.
    pub fn push_state(&mut self) {
        let current = mem::take(&mut self.log);
        self.archived.push(current);
        debug!(depth = self.archived.len(), "board state pushed");
    }

    /// Undo everything recorded since the matching [`push_state`](Self::push_state)
    /// and reinstate the archived log.
    pub fn pop_state(&mut self) -> Result<(), BoardError> {
        let restored = self.archived.pop().ok_or(BoardError::UnbalancedState)?;
        let undo = mem::replace(&mut self.log, restored);
        debug!(
            depth = self.archived.len(),
            changes = undo.len(),
            "board state popped"
        );
        for change in undo.entries.into_iter().rev() {
            self.revert(change);
        }
        Ok(())
    }

    pub fn clear_changelog(&mut self) {
        self.log = ChangeLog::default();
    }

    /// The active change log.
    pub fn changelog(&self) -> &ChangeLog {
        &self.log
    }

    /// Number of archived logs, i.e. open function transactions.
    pub fn state_depth(&self) -> usize {
        self.archived.len()
    }

    /// Total stones of every color on the board.
    pub fn total_stones(&self) -> u64 {
        self.cells
            .iter()
            .flat_map(|cell| ALL_COLORS.iter().map(move |&c| cell.count(c) as u64))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_empty_board() {
        assert_eq!(
            Board::new(0, 3).unwrap_err(),
            BoardError::InvalidSize {
                width: 0,
                height: 3
            }
        );
    }

    #[test]
    fn put_and_take() {
        let mut board = Board::new(2, 2).unwrap();
        board.put(Color::Red, 3);
        assert_eq!(board.num_stones(Color::Red), 3);
        board.take(Color::Red, 2).unwrap();
        assert_eq!(board.num_stones(Color::Red), 1);
        assert!(board.exist_stones(Color::Red));
        assert!(!board.exist_stones(Color::Blue));
    }

    #[test]
    fn take_is_all_or_nothing() {
        let mut board = Board::new(2, 2).unwrap();
        board.put(Color::Green, 1);
        let err = board.take(Color::Green, 2).unwrap_err();
        assert!(matches!(err, BoardError::CannotTake { available: 1, .. }));
        assert_eq!(board.num_stones(Color::Green), 1);
    }

    #[test]
    fn east_moves_stop_at_the_edge() {
        let mut board = Board::new(3, 3).unwrap();
        board.move_head(Direction::East, 1).unwrap();
        assert_eq!(board.head(), (1, 0));
        board.move_head(Direction::East, 1).unwrap();
        assert_eq!(board.head(), (2, 0));
        assert!(board.move_head(Direction::East, 1).is_err());
        assert_eq!(board.head(), (2, 0));
    }

    #[test]
    fn can_move_checks_every_edge() {
        let board = Board::new(1, 1).unwrap();
        for dir in [Direction::North, Direction::East, Direction::South, Direction::West] {
            assert!(!board.can_move(dir));
        }
        let board = Board::with_head(3, 3, 1, 1).unwrap();
        for dir in [Direction::North, Direction::East, Direction::South, Direction::West] {
            assert!(board.can_move(dir));
        }
    }

    #[test]
    fn boundary_and_origin() {
        let mut board = Board::with_head(4, 3, 1, 1).unwrap();
        board.go_to_boundary(Direction::North);
        assert_eq!(board.head(), (1, 2));
        board.go_to_boundary(Direction::East);
        assert_eq!(board.head(), (3, 2));
        board.go_to_origin();
        assert_eq!(board.head(), (0, 0));
    }

    #[test]
    fn pop_state_rolls_back_in_reverse() {
        let mut board = Board::with_head(3, 3, 1, 1).unwrap();
        board.put(Color::Blue, 2);
        let before = board.clone();

        board.push_state();
        board.put(Color::Black, 1);
        board.move_head(Direction::North, 1).unwrap();
        board.take(Color::Blue, 0).unwrap();
        board.put(Color::Blue, 4);
        board.go_to_origin();
        board.clear();
        board.put(Color::Red, 1);
        board.pop_state().unwrap();

        assert_eq!(board, before);
        assert_eq!(board.state_depth(), 0);
    }

    #[test]
    fn nested_states_restore_outer_log() {
        let mut board = Board::new(2, 2).unwrap();
        board.push_state();
        board.put(Color::Red, 1);
        board.push_state();
        board.put(Color::Red, 5);
        board.pop_state().unwrap();
        assert_eq!(board.num_stones(Color::Red), 1);
        assert_eq!(board.changelog().len(), 1);
        board.pop_state().unwrap();
        assert_eq!(board.num_stones(Color::Red), 0);
    }

    #[test]
    fn rollback_undoes_a_wrapped_put() {
        let mut board = Board::new(1, 1).unwrap();
        board.put(Color::Green, 5);
        board.push_state();
        board.put(Color::Green, u32::MAX);
        assert_eq!(board.num_stones(Color::Green), 4);
        board.pop_state().unwrap();
        assert_eq!(board.num_stones(Color::Green), 5);
    }

    #[test]
    fn unbalanced_pop_fails() {
        let mut board = Board::new(1, 1).unwrap();
        assert_eq!(board.pop_state(), Err(BoardError::UnbalancedState));
    }

    #[test]
    fn equal_contents_ignores_head() {
        let a = Board::with_head(2, 2, 0, 0).unwrap();
        let b = Board::with_head(2, 2, 1, 1).unwrap();
        assert!(a.equal_contents(&b));
        assert_ne!(a, b);
    }
}
