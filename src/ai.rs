pub mod mcts;

use crate::board::{flat_index, pprint_board, Board, Outcome, Player};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use proconio::source::line::LineSource;
use proconio::source::Source;
use rand::{Rng, RngCore};
use std::io::{BufRead, BufReader, Stdin};
use tracing::{info, warn};

pub use mcts::{Decision, Mcts, MctsConfig, Node, Score, SearchError};

/// Something that picks a move. Only asked when `turn` has a legal move;
/// returns the flat index of the cell to play.
pub trait GetAction {
    fn get_action(&mut self, board: &Board, turn: Player, rng: &mut dyn RngCore) -> anyhow::Result<u8>;

    fn name(&self) -> String;
}

pub struct RandomPlayer;

impl GetAction for RandomPlayer {
    fn get_action(&mut self, board: &Board, turn: Player, rng: &mut dyn RngCore) -> anyhow::Result<u8> {
        let mut moves = board.move_bits(turn);
        anyhow::ensure!(!moves.is_empty(), "{} has no legal move", turn);
        let pick = rng.gen_range(0..moves.count_set_bits());
        for _ in 0..pick {
            moves.take_lowest_set_index();
        }
        return Ok(moves.take_lowest_set_index());
    }

    fn name(&self) -> String {
        return String::from("Random");
    }
}

/// Reads `x y` (1-indexed column and row) per move, asking again on
/// unparsable input or an illegal cell. Fails once the input is closed.
pub struct HumanPlayer<R: BufRead> {
    source: LineSource<R>,
}

impl HumanPlayer<BufReader<Stdin>> {
    pub fn new() -> Self {
        return HumanPlayer::from_reader(BufReader::new(std::io::stdin()));
    }
}

impl<R: BufRead> HumanPlayer<R> {
    pub fn from_reader(reader: R) -> Self {
        return HumanPlayer {
            source: LineSource::new(reader),
        };
    }
}

impl<R: BufRead> GetAction for HumanPlayer<R> {
    fn get_action(&mut self, board: &Board, turn: Player, _: &mut dyn RngCore) -> anyhow::Result<u8> {
        loop {
            println!("{} to move (column row):", turn);
            let x = self.source.next_token().context("input closed")?.parse::<u8>();
            let y = self.source.next_token().context("input closed")?.parse::<u8>();
            let (x, y) = match (x, y) {
                (Ok(x), Ok(y)) => (x, y),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "expected two numbers");
                    continue;
                }
            };
            match board.try_place_disk_xy(turn, x, y) {
                Ok(_) => return Ok(flat_index(x, y)),
                Err(e) => warn!(error = %e, x, y, "illegal move"),
            }
        }
    }

    fn name(&self) -> String {
        return String::from("Human");
    }
}

impl GetAction for Mcts {
    fn get_action(&mut self, board: &Board, turn: Player, rng: &mut dyn RngCore) -> anyhow::Result<u8> {
        let decision = self.search(board, turn, rng)?;
        return decision
            .action
            .context("search picked a node without a move");
    }

    fn name(&self) -> String {
        return format!("Mcts:{}", self.config().iterations);
    }
}

#[derive(Debug, Clone)]
pub struct GameRecord {
    pub board: Board,
    /// Cells played in order; `None` is a pass.
    pub moves: Vec<Option<u8>>,
    pub outcome: Outcome,
}

/// Plays one game from the opening position. A side without a legal move
/// passes; the game ends when neither side can move.
pub fn play_game(
    dark: &mut dyn GetAction,
    light: &mut dyn GetAction,
    rng: &mut dyn RngCore,
    render: bool,
) -> anyhow::Result<GameRecord> {
    let mut board = Board::opening_position();
    let mut turn = Player::Dark;
    let mut moves = Vec::new();

    if render {
        pprint_board(&board);
    }
    loop {
        if !board.has_moves(turn) {
            if !board.has_moves(turn.opponent()) {
                break;
            }
            info!(player = %turn, "pass");
            moves.push(None);
            turn = turn.opponent();
            continue;
        }

        let agent: &mut dyn GetAction = match turn {
            Player::Dark => &mut *dark,
            Player::Light => &mut *light,
        };
        let index = agent.get_action(&board, turn, rng)?;
        board = board
            .try_place_disk(turn, index)
            .with_context(|| format!("{} ({}) played an illegal move", agent.name(), turn))?;
        moves.push(Some(index));
        if render {
            println!("{} plays {}", turn, index);
            pprint_board(&board);
        }
        turn = turn.opponent();
    }

    let outcome = board.outcome();
    info!(
        dark = board.score(Player::Dark),
        light = board.score(Player::Light),
        ?outcome,
        "game over"
    );
    return Ok(GameRecord {
        board,
        moves,
        outcome,
    });
}

/// Plays `2n` games, swapping colours each time, and returns each agent's
/// score rate (win 1, draw 0.5).
pub fn eval_agents(
    a1: &mut dyn GetAction,
    a2: &mut dyn GetAction,
    n: usize,
    rng: &mut dyn RngCore,
) -> anyhow::Result<(f32, f32)> {
    let mut score1 = 0.0;
    let mut score2 = 0.0;

    let pb = ProgressBar::new((n * 2) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) \n {msg}")?
            .progress_chars("#>-"),
    );

    for _ in 0..n {
        let record = play_game(a1, a2, rng, false)?;
        let (s1, s2) = points(record.outcome, Player::Dark);
        score1 += s1;
        score2 += s2;
        pb.inc(1);
        pb.set_message(format!("[{} {score1}, {} {score2}]", a1.name(), a2.name()));

        let record = play_game(a2, a1, rng, false)?;
        let (s1, s2) = points(record.outcome, Player::Light);
        score1 += s1;
        score2 += s2;
        pb.inc(1);
        pb.set_message(format!("[{} {score1}, {} {score2}]", a1.name(), a2.name()));
    }
    pb.finish();
    let games = (2 * n).max(1) as f32;
    return Ok((score1 / games, score2 / games));
}

/// Points for the agent playing `side` and for its opponent.
fn points(outcome: Outcome, side: Player) -> (f32, f32) {
    match outcome {
        Outcome::Winner(player) if player == side => (1.0, 0.0),
        Outcome::Winner(_) => (0.0, 1.0),
        Outcome::Draw => (0.5, 0.5),
    }
}
