pub mod ai;
pub mod bitmask;
pub mod board;
pub mod config;

pub use ai::mcts::{Mcts, MctsConfig, Node, SearchError};
pub use bitmask::BitMask;
pub use board::{playout, Board, BoardError, Outcome, Player};
