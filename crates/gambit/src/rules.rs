//! Rules-engine capability used by game sessions.
//!
//! Sessions never inspect board internals. They ask a [`Board`] for legal
//! destinations, hand it moves to validate-and-apply, and query the terminal
//! outcome. [`StandardChess`] backs this with `shakmaty`.

use std::num::NonZeroU32;

use shakmaty::{Chess, Color as ChessColor, EnPassantMode, Move, Outcome, Position, Role, Setup};
use thiserror::Error;

use crate::protocol::{Color, GameResult, Square};

/// Source and destination of a requested move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveDescriptor {
    pub from: Square,
    pub to: Square,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal move {from} -> {to}")]
pub struct IllegalMove {
    pub from: Square,
    pub to: Square,
}

impl From<MoveDescriptor> for IllegalMove {
    fn from(mv: MoveDescriptor) -> Self {
        Self {
            from: mv.from,
            to: mv.to,
        }
    }
}

/// One game's board state, owned by the rules engine.
pub trait Board: Send {
    /// Every square the piece on `from` may legally move to, in engine order.
    fn legal_destinations(&self, from: Square) -> Vec<Square>;

    /// Validate and commit a move. The board is unchanged on error.
    fn apply_move(&mut self, mv: MoveDescriptor) -> Result<(), IllegalMove>;

    /// Terminal result, if the game is over.
    fn outcome(&self) -> Option<GameResult>;
}

/// Factory for fresh boards, one per session.
pub trait RulesEngine: Send + Sync {
    fn new_board(&self) -> Box<dyn Board>;
}

/// Standard chess from the initial position.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChess;

impl RulesEngine for StandardChess {
    fn new_board(&self) -> Box<dyn Board> {
        Box::new(ChessBoard::default())
    }
}

/// Halfmoves without a capture or pawn move that end the game in a draw.
const SEVENTY_FIVE_MOVE_HALFMOVES: u32 = 150;

/// Occurrences of one position that end the game in a draw.
const FIVEFOLD_REPETITION: usize = 5;

#[derive(Debug, Clone)]
pub struct ChessBoard {
    position: Chess,
    /// Positions since the last capture or pawn move, current one last.
    history: Vec<Setup>,
}

impl ChessBoard {
    fn from_position(position: Chess) -> Self {
        let history = vec![repetition_key(&position)];
        Self { position, history }
    }

    fn is_fivefold_repetition(&self) -> bool {
        let Some(current) = self.history.last() else {
            return false;
        };
        self.history.iter().filter(|&seen| seen == current).count() >= FIVEFOLD_REPETITION
    }
}

impl Default for ChessBoard {
    fn default() -> Self {
        Self::from_position(Chess::default())
    }
}

/// Position identity for repetition: placement, side to move, castling
/// rights and a capturable en passant square. Move counters are cleared.
fn repetition_key(position: &Chess) -> Setup {
    let mut setup = position.clone().into_setup(EnPassantMode::Legal);
    setup.halfmoves = 0;
    setup.fullmoves = NonZeroU32::MIN;
    setup
}

fn square_index(sq: Square) -> u32 {
    u32::from(sq.rank) * 8 + u32::from(sq.file)
}

fn from_index(index: u32) -> Option<Square> {
    Square::new((index / 8) as u8, (index % 8) as u8)
}

fn wire_color(color: ChessColor) -> Color {
    match color {
        ChessColor::White => Color::Zero,
        ChessColor::Black => Color::One,
    }
}

/// Where the moving piece lands. Castling is encoded king-takes-rook by the
/// engine, but clients send the king's two-square destination.
fn destination_index(m: &Move) -> u32 {
    match *m {
        Move::Castle { king, rook } => {
            let king = u32::from(king);
            if u32::from(rook) > king {
                king + 2
            } else {
                king - 2
            }
        }
        _ => u32::from(m.to()),
    }
}

fn origin_index(m: &Move) -> Option<u32> {
    m.from().map(u32::from)
}

impl Board for ChessBoard {
    fn legal_destinations(&self, from: Square) -> Vec<Square> {
        let origin = square_index(from);
        let mut destinations: Vec<Square> = Vec::new();
        for m in self.position.legal_moves() {
            if origin_index(&m) != Some(origin) {
                continue;
            }
            if let Some(sq) = from_index(destination_index(&m))
                && !destinations.contains(&sq)
            {
                destinations.push(sq);
            }
        }
        destinations
    }

    fn apply_move(&mut self, mv: MoveDescriptor) -> Result<(), IllegalMove> {
        let origin = square_index(mv.from);
        let target = square_index(mv.to);

        // The wire format has no promotion field; pawns reaching the last rank
        // become queens.
        let chosen = self
            .position
            .legal_moves()
            .into_iter()
            .filter(|m| origin_index(m) == Some(origin) && destination_index(m) == target)
            .find(|m| matches!(m.promotion(), None | Some(Role::Queen)))
            .ok_or(IllegalMove::from(mv))?;

        self.position.play_unchecked(&chosen);
        // Earlier positions can never recur after an irreversible move.
        if self.position.halfmoves() == 0 {
            self.history.clear();
        }
        self.history.push(repetition_key(&self.position));
        Ok(())
    }

    fn outcome(&self) -> Option<GameResult> {
        if let Some(outcome) = self.position.outcome() {
            return Some(match outcome {
                Outcome::Decisive { winner } => GameResult::Won(wire_color(winner)),
                Outcome::Draw => GameResult::Draw,
            });
        }
        let drawn = self.position.halfmoves() >= SEVENTY_FIVE_MOVE_HALFMOVES
            || self.is_fivefold_repetition();
        drawn.then_some(GameResult::Draw)
    }
}


#[cfg(test)]
mod tests {
    use shakmaty::CastlingMode;
    use shakmaty::fen::Fen;

    use super::testing::sq;
    use super::*;

    fn play(board: &mut dyn Board, moves: &[((u8, u8), (u8, u8))]) {
        for &((fr, ff), (tr, tf)) in moves {
            board
                .apply_move(MoveDescriptor {
                    from: sq(fr, ff),
                    to: sq(tr, tf),
                })
                .unwrap();
        }
    }

    #[test]
    fn opening_pawn_destinations() {
        let board = StandardChess.new_board();
        // e2 is rank 1, file 4.
        let dests = board.legal_destinations(sq(1, 4));
        assert_eq!(dests.len(), 2);
        assert!(dests.contains(&sq(2, 4)));
        assert!(dests.contains(&sq(3, 4)));
    }

    #[test]
    fn empty_square_has_no_destinations() {
        let board = StandardChess.new_board();
        assert!(board.legal_destinations(sq(4, 4)).is_empty());
    }

    #[test]
    fn illegal_move_leaves_board_unchanged() {
        let mut board = StandardChess.new_board();
        let mv = MoveDescriptor {
            from: sq(1, 4),
            to: sq(4, 4),
        };
        assert_eq!(board.apply_move(mv), Err(IllegalMove::from(mv)));
        assert_eq!(board.legal_destinations(sq(1, 4)).len(), 2);
    }

    #[test]
    fn moving_out_of_turn_is_illegal() {
        let mut board = StandardChess.new_board();
        // e7-e5 with white to move.
        let result = board.apply_move(MoveDescriptor {
            from: sq(6, 4),
            to: sq(4, 4),
        });
        assert!(result.is_err());
    }

    #[test]
    fn fools_mate_is_won_by_color_one() {
        let mut board = StandardChess.new_board();
        play(
            board.as_mut(),
            &[
                ((1, 5), (2, 5)), // f3
                ((6, 4), (4, 4)), // e5
                ((1, 6), (3, 6)), // g4
            ],
        );
        assert_eq!(board.outcome(), None);
        play(board.as_mut(), &[((7, 3), (3, 7))]); // Qh4#
        assert_eq!(board.outcome(), Some(GameResult::Won(Color::One)));
    }

    #[test]
    fn fivefold_repetition_is_a_draw() {
        let mut board = StandardChess.new_board();
        let shuffle = [
            ((0, 6), (2, 5)), // Nf3
            ((7, 6), (5, 5)), // Nf6
            ((2, 5), (0, 6)), // Ng1
            ((5, 5), (7, 6)), // Ng8
        ];
        // The start position has now occurred four times.
        for _ in 0..3 {
            play(board.as_mut(), &shuffle);
        }
        assert_eq!(board.outcome(), None);

        play(board.as_mut(), &shuffle);
        assert_eq!(board.outcome(), Some(GameResult::Draw));
    }

    #[test]
    fn seventy_five_quiet_moves_is_a_draw() {
        let position: Chess = "8/8/8/4k3/8/8/8/R3K3 w - - 149 100"
            .parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap();
        let mut board = ChessBoard::from_position(position);
        assert_eq!(board.outcome(), None);

        play(&mut board, &[((0, 0), (1, 0))]); // Ra2
        assert_eq!(board.outcome(), Some(GameResult::Draw));
    }

    #[test]
    fn pawn_move_resets_repetition_history() {
        let mut board = ChessBoard::default();
        play(&mut board, &[((0, 6), (2, 5)), ((7, 6), (5, 5))]); // Nf3 Nf6
        assert_eq!(board.history.len(), 3);

        play(&mut board, &[((1, 4), (3, 4))]); // e4
        assert_eq!(board.history.len(), 1);
    }

    #[test]
    fn castling_uses_king_destination() {
        let mut board = StandardChess.new_board();
        play(
            board.as_mut(),
            &[
                ((1, 4), (3, 4)), // e4
                ((6, 4), (4, 4)), // e5
                ((0, 6), (2, 5)), // Nf3
                ((7, 1), (5, 2)), // Nc6
                ((0, 5), (3, 2)), // Bc4
                ((7, 6), (5, 5)), // Nf6
            ],
        );
        assert!(board.legal_destinations(sq(0, 4)).contains(&sq(0, 6)));
        play(
            board.as_mut(),
            &[
                ((0, 4), (0, 6)), // O-O
                ((6, 3), (5, 3)), // d6
            ],
        );
        // King landed on g1 with the rook beside it on f1.
        assert_eq!(board.legal_destinations(sq(0, 6)), vec![sq(0, 7)]);
    }

    #[test]
    fn promotion_defaults_to_queen() {
        let mut board = StandardChess.new_board();
        play(
            board.as_mut(),
            &[
                ((1, 7), (3, 7)), // h4
                ((6, 6), (4, 6)), // g5
                ((3, 7), (4, 6)), // hxg5
                ((6, 7), (5, 7)), // h6
                ((4, 6), (5, 7)), // gxh6
                ((6, 0), (5, 0)), // a6
                ((5, 7), (6, 7)), // h7
                ((5, 0), (4, 0)), // a5
                ((6, 7), (7, 6)), // hxg8
                ((6, 1), (5, 1)), // b6
            ],
        );
        // Diagonal and orthogonal reach from g8: only a queen has both.
        let dests = board.legal_destinations(sq(7, 6));
        assert!(dests.contains(&sq(6, 7)));
        assert!(dests.contains(&sq(7, 5)));
    }
}
