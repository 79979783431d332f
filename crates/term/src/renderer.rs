//! BoardRenderer: turns a `BoardState` into fixed-width text for logs and
//! debug tools.
//!
//! Each cell is two characters wide (`Cell::label`), broken cells show as `xx`
//! and the active piece is drawn over the grid. The renderer is a plain value;
//! callers pick the verbosity when they build it.

use crate::core::{BoardState, Cell, CellFlag, Grid, Piece};
use crate::types::{BOARD_COLS, BOARD_ROWS};

/// How much context to print around the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Grid only
    Quiet,
    /// Header line plus grid
    #[default]
    Normal,
    /// Header, own grid beside the partner grid, next-piece preview
    Verbose,
}

impl Verbosity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet" | "q" => Some(Verbosity::Quiet),
            "normal" | "n" => Some(Verbosity::Normal),
            "verbose" | "v" => Some(Verbosity::Verbose),
            _ => None,
        }
    }
}

const BROKEN_LABEL: &str = "xx";
const GAP: &str = "   ";

#[derive(Debug, Clone, Copy, Default)]
pub struct BoardRenderer {
    verbosity: Verbosity,
}

impl BoardRenderer {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn render(&self, board: &BoardState) -> String {
        let mut out = String::with_capacity((BOARD_COLS * 4 + 8) * (BOARD_ROWS + 4));
        self.render_into(board, &mut out);
        out
    }

    /// Append the rendering to `out` (callers can reuse one buffer across frames).
    pub fn render_into(&self, board: &BoardState, out: &mut String) {
        if self.verbosity != Verbosity::Quiet {
            write_header(board, out);
        }

        for row in 0..BOARD_ROWS {
            let own = grid_row(&board.grid, board.piece.as_ref(), row);
            if self.verbosity == Verbosity::Verbose {
                let partner = grid_row(&board.partner_grid, None, row);
                let (left, right) = if board.partner_on_right {
                    (own, partner)
                } else {
                    (partner, own)
                };
                out.push_str(&format!("|{}|{}|{}|\n", left, GAP, right));
            } else if self.verbosity == Verbosity::Normal {
                out.push_str(&format!("|{}|\n", own));
            } else {
                out.push_str(&own);
                out.push('\n');
            }
        }

        if self.verbosity == Verbosity::Verbose {
            out.push_str("next:");
            match board.next_piece {
                Some(next) => {
                    for cell in next.cells {
                        out.push(' ');
                        out.push_str(cell.label());
                    }
                }
                None => out.push_str(" -"),
            }
            out.push('\n');
        }
    }
}

fn write_header(board: &BoardState, out: &mut String) {
    let breaks: u32 = board.break_counts.iter().sum();
    out.push_str(&format!(
        "seat {} {} tick {} breaks {} powers {} received {}{}\n",
        board.board_id,
        board.phase.as_str(),
        board.tick,
        breaks,
        board.active_powers.len(),
        board.powers_received,
        if board.yahoo_timer > 0.0 { " YAHOO" } else { "" }
    ));
}

fn grid_row(grid: &Grid, piece: Option<&Piece>, row: usize) -> String {
    let mut line = String::with_capacity(BOARD_COLS * 2);
    for col in 0..BOARD_COLS {
        let overlay = piece.and_then(|p| {
            p.positions()
                .iter()
                .position(|&(r, c)| r as usize == row && c as usize == col && r >= 0)
                .map(|i| p.cells[i])
        });
        line.push_str(cell_label(overlay.unwrap_or(grid[row][col])));
    }
    line
}

fn cell_label(cell: Cell) -> &'static str {
    if !cell.is_empty() && cell.has_flag(CellFlag::Broken) {
        BROKEN_LABEL
    } else {
        cell.label()
    }
}
