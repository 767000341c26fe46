use std::fmt;

use crate::board::{Board, MATRIX_COLS, MATRIX_ROWS};

/// Re-read interval used to reject contact bounce.
pub const SETTLE_MS: u64 = 10;

/// The sixteen keys of the matrix pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    D0,
    D1,
    D2,
    D3,
    D4,
    D5,
    D6,
    D7,
    D8,
    D9,
    A,
    B,
    C,
    D,
    Star,
    Hash,
}

impl Key {
    pub const fn symbol(self) -> char {
        use Key::*;

        match self {
            D0 => '0',
            D1 => '1',
            D2 => '2',
            D3 => '3',
            D4 => '4',
            D5 => '5',
            D6 => '6',
            D7 => '7',
            D8 => '8',
            D9 => '9',
            A => 'A',
            B => 'B',
            C => 'C',
            D => 'D',
            Star => '*',
            Hash => '#',
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Legend of the pad, KEYMAP[row][col].
pub const KEYMAP: [[Key; MATRIX_COLS]; MATRIX_ROWS] = [
    [Key::D1, Key::D2, Key::D3, Key::A],
    [Key::D4, Key::D5, Key::D6, Key::B],
    [Key::D7, Key::D8, Key::D9, Key::C],
    [Key::Star, Key::D0, Key::Hash, Key::D],
];

/// One full sweep of the matrix.
///
/// Drives one column at a time and samples every row. A reading only
/// counts if it is still active after the settle interval; the first
/// confirmed (column, row) position wins and the column line is restored
/// before returning. `None` means no key is down.
pub fn scan<B: Board>(board: &mut B) -> Option<Key> {
    for col in 0..MATRIX_COLS {
        board.drive_column(col, true);

        for row in 0..MATRIX_ROWS {
            if board.read_row(row) {
                board.delay_ms(SETTLE_MS);
                if board.read_row(row) {
                    board.drive_column(col, false);
                    return Some(KEYMAP[row][col]);
                }
            }
        }

        board.drive_column(col, false);
    }

    None
}
