use crate::bitmask::BitMask;
use rand::Rng;
use std::fmt;
use thiserror::Error;

const DARK_INIT: u64 = 0x0000_0010_0800_0000;
const LIGHT_INIT: u64 = 0x0000_0008_1000_0000;

/// Cells that can be reached by an eastward step (column 0 excluded).
const EAST_MASK: BitMask = BitMask(0xfefe_fefe_fefe_fefe);
/// Cells that can be reached by a westward step (column 7 excluded).
const WEST_MASK: BitMask = BitMask(0x7f7f_7f7f_7f7f_7f7f);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub enum Player {
    Dark = 0,
    Light = 1,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::Dark => Player::Light,
            Player::Light => Player::Dark,
        }
    }

    pub fn index(self) -> usize {
        return self as usize;
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.gen::<bool>() {
            Player::Dark
        } else {
            Player::Light
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Player::Dark => write!(f, "Dark"),
            Player::Light => write!(f, "Light"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub enum Outcome {
    Winner(Player),
    Draw,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("{player} cannot play at cell {index}")]
    InvalidMove { player: Player, index: u8 },

    #[error("({x}, {y}) is outside the board")]
    OutOfBounds { x: u8, y: u8 },

    #[error("dark and light disks overlap at {0:#018x}")]
    Overlap(u64),
}

#[derive(Clone, Copy, Debug)]
enum Shift {
    Left(u32),
    Right(u32),
}

/// One compass direction: the shift that steps a mask one cell along it, and
/// the cells a step may land on without wrapping around a board edge.
#[derive(Clone, Copy, Debug)]
pub struct Direction {
    shift: Shift,
    mask: BitMask,
}

pub const NORTH: Direction = Direction { shift: Shift::Left(8), mask: BitMask::FULL };
pub const SOUTH: Direction = Direction { shift: Shift::Right(8), mask: BitMask::FULL };
pub const EAST: Direction = Direction { shift: Shift::Left(1), mask: EAST_MASK };
pub const WEST: Direction = Direction { shift: Shift::Right(1), mask: WEST_MASK };
pub const NORTH_EAST: Direction = Direction { shift: Shift::Left(9), mask: EAST_MASK };
pub const NORTH_WEST: Direction = Direction { shift: Shift::Left(7), mask: WEST_MASK };
pub const SOUTH_EAST: Direction = Direction { shift: Shift::Right(7), mask: EAST_MASK };
pub const SOUTH_WEST: Direction = Direction { shift: Shift::Right(9), mask: WEST_MASK };

pub const DIRECTIONS: [Direction; 8] = [
    NORTH, SOUTH, EAST, WEST, NORTH_EAST, NORTH_WEST, SOUTH_EAST, SOUTH_WEST,
];

impl Direction {
    #[inline]
    fn step(self, bits: BitMask) -> BitMask {
        match self.shift {
            Shift::Left(n) => bits << n,
            Shift::Right(n) => bits >> n,
        }
    }

    /// Slides `gen` along this direction through the cells of `pro` and
    /// returns every cell visited, seeds included. At most 8 rounds.
    #[inline]
    pub fn fill(self, gen: BitMask, pro: BitMask) -> BitMask {
        let pro = pro & self.mask;
        let mut gen = gen;
        let mut flood = gen;
        while !gen.is_empty() {
            flood |= gen;
            gen = self.step(gen) & pro;
        }
        return flood;
    }

    /// Cells one step past the fill.
    #[inline]
    pub fn flood(self, gen: BitMask, pro: BitMask) -> BitMask {
        return self.step(self.fill(gen, pro)) & self.mask;
    }

    /// Cells one step past a run of `pro` that starts next to `gen`.
    #[inline]
    pub fn moves(self, gen: BitMask, pro: BitMask) -> BitMask {
        let flood = self.fill(gen, pro);
        return self.step(flood & pro) & self.mask;
    }
}

/// Flat cell index of a 1-indexed column `x` and row `y`.
pub fn flat_index(x: u8, y: u8) -> u8 {
    debug_assert!(
        (1..=8).contains(&x) && (1..=8).contains(&y),
        "({}, {}) is outside the board",
        x,
        y
    );
    return (y - 1) * 8 + (x - 1);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Board {
    disks: [BitMask; 2],
}

impl Board {
    pub fn new(dark: BitMask, light: BitMask) -> Result<Self, BoardError> {
        let overlap = dark & light;
        if !overlap.is_empty() {
            return Err(BoardError::Overlap(overlap.bits()));
        }
        return Ok(Board { disks: [dark, light] });
    }

    pub fn opening_position() -> Self {
        return Board {
            disks: [BitMask(DARK_INIT), BitMask(LIGHT_INIT)],
        };
    }

    pub fn disks(&self, player: Player) -> BitMask {
        return self.disks[player.index()];
    }

    pub fn occupied(&self) -> BitMask {
        return self.disks[0] | self.disks[1];
    }

    pub fn empty(&self) -> BitMask {
        return !self.occupied();
    }

    pub fn move_bits(&self, player: Player) -> BitMask {
        let gen = self.disks(player);
        let pro = self.disks(player.opponent());
        let mut moves = BitMask::EMPTY;
        for dir in DIRECTIONS.iter() {
            moves |= dir.moves(gen, pro);
        }
        return moves & self.empty();
    }

    pub fn has_moves(&self, player: Player) -> bool {
        return !self.move_bits(player).is_empty();
    }

    /// Every position `player` can reach in one move, in ascending cell order.
    /// Empty means `player` has to pass.
    pub fn find_moves(&self, player: Player) -> Vec<Board> {
        return self
            .move_bits(player)
            .iter()
            .map(|index| self.place_disk(player, index))
            .collect();
    }

    /// Places a disk for `player` at `index` and flips every bracketed run.
    ///
    /// Legality is not checked: `index` is expected to come from
    /// [`Board::move_bits`]. An illegal cell is not rejected; the disk is still
    /// placed and the two sides stay disjoint. Use [`Board::try_place_disk`] for
    /// moves from outside the search.
    pub fn place_disk(&self, player: Player, index: u8) -> Board {
        debug_assert!(index < 64);
        let placed = BitMask::from_index(index);
        let own = self.disks(player);
        let opp = self.disks(player.opponent());

        let mut flipped = BitMask::EMPTY;
        for dir in DIRECTIONS.iter() {
            let run = dir.fill(placed, opp);
            if !(dir.step(run) & dir.mask & own).is_empty() {
                flipped |= run & opp;
            }
        }

        let mut disks = self.disks;
        disks[player.index()] = own | placed | flipped;
        disks[player.opponent().index()] = opp & !(flipped | placed);
        return Board { disks };
    }

    pub fn try_place_disk(&self, player: Player, index: u8) -> Result<Board, BoardError> {
        if !self.move_bits(player).contains(index) {
            return Err(BoardError::InvalidMove { player, index });
        }
        return Ok(self.place_disk(player, index));
    }

    pub fn place_disk_xy(&self, player: Player, x: u8, y: u8) -> Board {
        return self.place_disk(player, flat_index(x, y));
    }

    pub fn try_place_disk_xy(&self, player: Player, x: u8, y: u8) -> Result<Board, BoardError> {
        if !(1..=8).contains(&x) || !(1..=8).contains(&y) {
            return Err(BoardError::OutOfBounds { x, y });
        }
        return self.try_place_disk(player, flat_index(x, y));
    }

    pub fn score(&self, player: Player) -> u32 {
        return self.disks(player).count_set_bits();
    }

    pub fn is_winner(&self, player: Player) -> bool {
        return self.score(player) > self.score(player.opponent());
    }

    pub fn is_game_over(&self) -> bool {
        return !self.has_moves(Player::Dark) && !self.has_moves(Player::Light);
    }

    /// Disk-count verdict; meaningful once the game is over.
    pub fn outcome(&self) -> Outcome {
        if self.is_winner(Player::Dark) {
            Outcome::Winner(Player::Dark)
        } else if self.is_winner(Player::Light) {
            Outcome::Winner(Player::Light)
        } else {
            Outcome::Draw
        }
    }

    /// Like [`Board::outcome`], but an exact tie goes to a random side.
    pub fn decide_winner<R: Rng + ?Sized>(&self, rng: &mut R) -> Player {
        match self.outcome() {
            Outcome::Winner(player) => player,
            Outcome::Draw => Player::random(rng),
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "  a b c d e f g h")?;
        for row in (0..8u8).rev() {
            write!(f, "{}", row + 1)?;
            for col in 0..8u8 {
                let index = row * 8 + col;
                let c = if self.disks[0].contains(index) {
                    '●'
                } else if self.disks[1].contains(index) {
                    '○'
                } else {
                    '·'
                };
                write!(f, " {}", c)?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "● {:>2}  ○ {:>2}",
            self.score(Player::Dark),
            self.score(Player::Light)
        )
    }
}

pub fn pprint_board(board: &Board) {
    println!("{}", board);
}

/// Plays uniformly random moves from `board` with `player` to move until the
/// side to move has none, then reports the side with more disks. A tie goes to
/// a random side.
pub fn playout<R: Rng + ?Sized>(board: &Board, player: Player, rng: &mut R) -> Player {
    let mut board = *board;
    let mut turn = player;
    loop {
        let mut moves = board.move_bits(turn);
        if moves.is_empty() {
            return board.decide_winner(rng);
        }
        let pick = rng.gen_range(0..moves.count_set_bits());
        for _ in 0..pick {
            moves.take_lowest_set_index();
        }
        board = board.place_disk(turn, moves.take_lowest_set_index());
        turn = turn.opponent();
    }
}
