use crate::board::{playout, Board, Player};
use rand::Rng;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("no child reaches the given board")]
    MoveNotFound,

    #[error("node has no children to choose from")]
    NoChildren,
}

/// Search parameters. Deserializable so a game file can carry them.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Simulations run per move decision.
    pub iterations: u32,
    /// Exploration constant C of the UCT formula.
    pub exploration: f64,
    /// Keeps the UCT terms finite for unvisited children.
    pub epsilon: f64,
    /// Carry the chosen subtree over to the next decision.
    pub reuse_tree: bool,
}

impl Default for MctsConfig {
    fn default() -> Self {
        return MctsConfig {
            iterations: 250_000,
            exploration: 1.5,
            epsilon: 1e-7,
            reuse_tree: true,
        };
    }
}

impl MctsConfig {
    pub fn for_testing() -> Self {
        return MctsConfig {
            iterations: 100,
            ..MctsConfig::default()
        };
    }

    pub fn with_iterations(mut self, n: u32) -> Self {
        self.iterations = n;
        self
    }

    pub fn with_exploration(mut self, c: f64) -> Self {
        self.exploration = c;
        self
    }

    pub fn with_reuse_tree(mut self, reuse: bool) -> Self {
        self.reuse_tree = reuse;
        self
    }
}

/// Search tree node. Children are owned; statistics flow back up through the
/// return value of [`Node::mcts`], so there are no parent links.
///
/// `wins` counts simulations that went the way of the side to move *here*.
#[derive(Debug, Clone)]
pub struct Node {
    board: Board,
    turn: Player,
    action: Option<u8>,
    wins: u32,
    simulations: u32,
    children: Vec<Node>,
    terminal: bool,
}

#[derive(serde::Serialize, PartialEq, PartialOrd)]
pub struct Score {
    pub action: Option<u8>,
    pub wins: u32,
    pub simulations: u32,
    pub share: f64,
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let action = match self.action {
            Some(index) => format!("{:>2}", index),
            None => String::from("--"),
        };
        write!(
            f,
            "action: {}, visits: {:>5.2}%({:>7}), losses: {:>7}",
            action,
            self.share * 100.0,
            self.simulations,
            self.simulations - self.wins
        )
    }
}

impl Node {
    pub fn new(board: Board, turn: Player) -> Self {
        return Node {
            board,
            turn,
            action: None,
            wins: 0,
            simulations: 0,
            children: Vec::new(),
            terminal: false,
        };
    }

    fn child(board: Board, turn: Player, action: u8) -> Self {
        return Node {
            action: Some(action),
            ..Node::new(board, turn)
        };
    }

    pub fn get_board(&self) -> Board {
        return self.board;
    }

    pub fn get_turn(&self) -> Player {
        return self.turn;
    }

    /// Cell played to reach this node; `None` at a fresh root.
    pub fn action(&self) -> Option<u8> {
        return self.action;
    }

    pub fn wins(&self) -> u32 {
        return self.wins;
    }

    pub fn simulations(&self) -> u32 {
        return self.simulations;
    }

    pub fn children(&self) -> &[Node] {
        return &self.children;
    }

    pub fn is_terminal(&self) -> bool {
        return self.terminal;
    }

    pub fn is_expanded(&self) -> bool {
        return self.terminal || !self.children.is_empty();
    }

    /// Share of this node's simulations won by its side to move.
    /// 0 before the first simulation.
    pub fn confidence(&self) -> f64 {
        if self.simulations == 0 {
            return 0.0;
        }
        return self.wins as f64 / self.simulations as f64;
    }

    fn expand(&mut self) {
        let moves = self.board.move_bits(self.turn);
        if moves.is_empty() {
            self.terminal = true;
            return;
        }
        let next = self.turn.opponent();
        self.children = moves
            .iter()
            .map(|index| Node::child(self.board.place_disk(self.turn, index), next, index))
            .collect();
    }

    /// UCT value of `child` seen from this node. The mean term uses the child's
    /// losses, which are this node's wins.
    pub fn uct_value(&self, child: &Node, config: &MctsConfig) -> f64 {
        let visits = child.simulations as f64 + config.epsilon;
        let mean = (child.simulations - child.wins) as f64 / visits;
        let explore = ((self.simulations as f64 + 1.0).ln() / visits).sqrt();
        return mean + config.exploration * explore;
    }

    fn select_index(&self, config: &MctsConfig) -> Option<usize> {
        let mut best = None;
        let mut max_value = f64::NEG_INFINITY;
        for (i, child) in self.children.iter().enumerate() {
            let value = self.uct_value(child, config);
            if value > max_value {
                max_value = value;
                best = Some(i);
            }
        }
        return best;
    }

    /// Child with the highest UCT value; the first one wins ties.
    pub fn select(&self, config: &MctsConfig) -> Result<&Node, SearchError> {
        let i = self.select_index(config).ok_or(SearchError::NoChildren)?;
        return Ok(&self.children[i]);
    }

    /// Runs one simulation with default parameters. See [`Node::mcts_with`].
    pub fn mcts<R: Rng + ?Sized>(&mut self, rng: &mut R) -> u32 {
        return self.mcts_with(&MctsConfig::default(), rng);
    }

    /// Runs one selection / expansion / rollout / backpropagation step and
    /// returns 1 if the side to move here won the simulated game, else 0.
    pub fn mcts_with<R: Rng + ?Sized>(&mut self, config: &MctsConfig, rng: &mut R) -> u32 {
        if !self.is_expanded() {
            self.expand();
        }

        let win = match self.select_index(config) {
            None => {
                // terminal: no move for the side to move
                (self.board.decide_winner(rng) == self.turn) as u32
            }
            Some(i) => {
                let turn = self.turn;
                let next = &mut self.children[i];
                if next.simulations == 0 {
                    let win = (playout(&next.board, next.turn, rng) == turn) as u32;
                    next.wins += 1 - win;
                    next.simulations += 1;
                    win
                } else {
                    1 - next.mcts_with(config, rng)
                }
            }
        };

        self.wins += win;
        self.simulations += 1;
        return win;
    }

    /// Most visited child; the first one wins ties.
    pub fn best_move(&self) -> Result<&Node, SearchError> {
        let i = self.best_index().ok_or(SearchError::NoChildren)?;
        return Ok(&self.children[i]);
    }

    /// Detaches the most visited child, dropping its siblings.
    pub fn into_best_move(mut self) -> Result<Node, SearchError> {
        let i = self.best_index().ok_or(SearchError::NoChildren)?;
        return Ok(self.children.swap_remove(i));
    }

    fn best_index(&self) -> Option<usize> {
        let mut best = None;
        let mut max_simulations = 0;
        for (i, child) in self.children.iter().enumerate() {
            if best.is_none() || child.simulations > max_simulations {
                max_simulations = child.simulations;
                best = Some(i);
            }
        }
        return best;
    }

    fn position_of(&self, board: &Board) -> Result<usize, SearchError> {
        return self
            .children
            .iter()
            .position(|child| child.board == *board)
            .ok_or(SearchError::MoveNotFound);
    }

    /// The child whose board is exactly `board`, e.g. after the opponent moved.
    pub fn choose_move(&mut self, board: &Board) -> Result<&mut Node, SearchError> {
        let i = self.position_of(board)?;
        return Ok(&mut self.children[i]);
    }

    /// Like [`Node::choose_move`], but detaches the child so it can become the
    /// next root.
    pub fn into_child(mut self, board: &Board) -> Result<Node, SearchError> {
        let i = self.position_of(board)?;
        return Ok(self.children.swap_remove(i));
    }

    pub fn scores(&self) -> Vec<Score> {
        let total = self.simulations.max(1) as f64;
        return self
            .children
            .iter()
            .map(|child| Score {
                action: child.action,
                wins: child.wins,
                simulations: child.simulations,
                share: child.simulations as f64 / total,
            })
            .collect();
    }
}

/// MCTS player. Keeps the subtree of its last move between turns when
/// `reuse_tree` is set.
pub struct Mcts {
    config: MctsConfig,
    root: Option<Node>,
}

impl Mcts {
    pub fn new(config: MctsConfig) -> Self {
        return Mcts { config, root: None };
    }

    pub fn config(&self) -> &MctsConfig {
        return &self.config;
    }

    fn take_root(&mut self, board: &Board, turn: Player) -> Node {
        let retained = match self.root.take() {
            Some(node) => node,
            None => return Node::new(*board, turn),
        };
        if retained.get_board() == *board && retained.get_turn() == turn {
            return retained;
        }
        match retained.into_child(board) {
            Ok(node) if node.get_turn() == turn => {
                debug!(simulations = node.simulations(), "reusing subtree");
                node
            }
            Ok(_) => Node::new(*board, turn),
            Err(e) => {
                debug!(error = %e, "rebuilding search tree");
                Node::new(*board, turn)
            }
        }
    }

    /// Searches from `board` and returns the most visited move.
    pub fn search<R: Rng + ?Sized>(
        &mut self,
        board: &Board,
        turn: Player,
        rng: &mut R,
    ) -> Result<Decision, SearchError> {
        let start = Instant::now();
        let mut root = self.take_root(board, turn);
        for _ in 0..self.config.iterations {
            root.mcts_with(&self.config, rng);
        }

        if cfg!(feature = "view") {
            for score in root.scores() {
                println!("{:?}", score);
            }
        }
        let confidence = root.confidence();
        info!(
            player = %turn,
            simulations = root.simulations(),
            confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search finished"
        );

        let best = root.into_best_move()?;
        let decision = Decision {
            action: best.action(),
            board: best.get_board(),
            confidence,
        };
        if self.config.reuse_tree {
            self.root = Some(best);
        }
        return Ok(decision);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Option<u8>,
    pub board: Board,
    /// Root confidence of the search that produced this decision.
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::GetAction;
    use crate::bitmask::BitMask;
    use crate::board::Outcome;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn with_stats(mut node: Node, stats: &[(u32, u32)]) -> Node {
        node.expand();
        assert_eq!(node.children.len(), stats.len());
        for (child, &(wins, sims)) in node.children.iter_mut().zip(stats) {
            child.wins = wins;
            child.simulations = sims;
        }
        node.simulations = stats.iter().map(|s| s.1).sum();
        node
    }

    #[test]
    fn root_counts_every_iteration() {
        let mut rng = StdRng::seed_from_u64(42);
        let config = MctsConfig::for_testing();
        let mut root = Node::new(Board::opening_position(), Player::Dark);
        for _ in 0..config.iterations {
            root.mcts_with(&config, &mut rng);
        }
        assert_eq!(root.simulations(), 100);
        assert_eq!(root.children().len(), 4);
        assert!((0.0..=1.0).contains(&root.confidence()));

        let child_total: u32 = root.children().iter().map(|c| c.simulations()).sum();
        assert_eq!(child_total, 100);

        let best = root.best_move().unwrap();
        let openers = Board::opening_position().find_moves(Player::Dark);
        assert!(openers.contains(&best.get_board()));
        assert_eq!(best.get_turn(), Player::Light);
        for child in root.children() {
            assert!(best.simulations() >= child.simulations());
        }
    }

    #[test]
    fn children_follow_find_moves_order() {
        let mut root = Node::new(Board::opening_position(), Player::Dark);
        root.mcts(&mut StdRng::seed_from_u64(0));
        let boards: Vec<Board> = root.children().iter().map(|c| c.get_board()).collect();
        assert_eq!(boards, Board::opening_position().find_moves(Player::Dark));
        let actions: Vec<Option<u8>> = root.children().iter().map(|c| c.action()).collect();
        assert_eq!(actions, vec![Some(20), Some(29), Some(34), Some(43)]);
    }

    #[test]
    fn select_prefers_unvisited_then_first() {
        let config = MctsConfig::default();
        let node = with_stats(
            Node::new(Board::opening_position(), Player::Dark),
            &[(0, 0), (0, 0), (0, 0), (0, 0)],
        );
        assert_eq!(node.select(&config).unwrap().action(), Some(20));

        let node = with_stats(
            Node::new(Board::opening_position(), Player::Dark),
            &[(5, 10), (0, 0), (2, 10), (0, 0)],
        );
        assert_eq!(node.select(&config).unwrap().action(), Some(29));
    }

    #[test]
    fn select_is_argmax_of_uct() {
        let config = MctsConfig::default();
        let node = with_stats(
            Node::new(Board::opening_position(), Player::Dark),
            &[(9, 10), (2, 10), (5, 10), (2, 10)],
        );
        // fewest child wins means most parent wins; ties go to the earlier child
        assert_eq!(node.select(&config).unwrap().action(), Some(29));

        let values: Vec<f64> = node.children().iter().map(|c| node.uct_value(c, &config)).collect();
        let expected = 8.0 / (10.0 + 1e-7) + 1.5 * ((41.0f64).ln() / (10.0 + 1e-7)).sqrt();
        assert!((values[1] - expected).abs() < 1e-9);
    }

    #[test]
    fn best_move_is_most_visited() {
        let node = with_stats(
            Node::new(Board::opening_position(), Player::Dark),
            &[(1, 3), (0, 7), (6, 7), (2, 2)],
        );
        assert_eq!(node.best_move().unwrap().action(), Some(29));
        assert_eq!(node.into_best_move().unwrap().action(), Some(29));
    }

    #[test]
    fn childless_nodes_fail_structurally() {
        let config = MctsConfig::default();
        let node = Node::new(Board::opening_position(), Player::Dark);
        assert_eq!(node.select(&config).err(), Some(SearchError::NoChildren));
        assert_eq!(node.best_move().err(), Some(SearchError::NoChildren));
    }

    #[test]
    fn terminal_node_resolves_by_score() {
        let board = Board::new(BitMask(0x0000_00ff_ffff_ffff), BitMask(0xffff_ff00_0000_0000)).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let mut winning = Node::new(board, Player::Dark);
        let mut losing = Node::new(board, Player::Light);
        for _ in 0..10 {
            assert_eq!(winning.mcts(&mut rng), 1);
            assert_eq!(losing.mcts(&mut rng), 0);
        }
        assert!(winning.is_terminal());
        assert!(winning.children().is_empty());
        assert_eq!(winning.confidence(), 1.0);
        assert_eq!(losing.confidence(), 0.0);
        assert_eq!(losing.simulations(), 10);
    }

    #[test]
    fn terminal_tie_is_a_coin_flip() {
        let board = Board::new(BitMask(0xffff_ffff), BitMask(0xffff_ffff_0000_0000)).unwrap();
        assert_eq!(board.outcome(), Outcome::Draw);
        let mut rng = StdRng::seed_from_u64(17);

        for turn in [Player::Dark, Player::Light] {
            let mut node = Node::new(board, turn);
            for _ in 0..200 {
                node.mcts(&mut rng);
            }
            assert!(node.is_terminal());
            assert_eq!(node.simulations(), 200);
            assert!(node.wins() > 0 && node.wins() < node.simulations());
        }
    }

    #[test]
    fn statistics_are_complementary_one_level_down() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut root = Node::new(Board::opening_position(), Player::Dark);
        for _ in 0..200 {
            root.mcts(&mut rng);
        }
        let child_losses: u32 = root
            .children()
            .iter()
            .map(|c| c.simulations() - c.wins())
            .sum();
        assert_eq!(root.wins(), child_losses);
    }

    #[test]
    fn choose_move_returns_existing_child() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut root = Node::new(Board::opening_position(), Player::Dark);
        for _ in 0..50 {
            root.mcts(&mut rng);
        }
        let target = root.children()[2].get_board();
        let sims = root.children()[2].simulations();
        let before = root.children().len();

        let chosen = root.choose_move(&target).unwrap();
        assert_eq!(chosen.get_board(), target);
        assert_eq!(chosen.simulations(), sims);
        let chosen_ptr = chosen as *const Node;
        assert_eq!(chosen_ptr, &root.children()[2] as *const Node);
        assert_eq!(root.children().len(), before);

        let child = root.into_child(&target).unwrap();
        assert_eq!(child.simulations(), sims);
    }

    #[test]
    fn choose_move_reports_missing_board() {
        let mut root = Node::new(Board::opening_position(), Player::Dark);
        root.mcts(&mut StdRng::seed_from_u64(1));
        let elsewhere = Board::opening_position().place_disk(Player::Light, 19);
        assert_eq!(root.choose_move(&elsewhere).err(), Some(SearchError::MoveNotFound));
        assert_eq!(root.into_child(&elsewhere).err(), Some(SearchError::MoveNotFound));
    }

    #[test]
    fn agent_reuses_subtree_after_reply() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut agent = Mcts::new(MctsConfig::for_testing().with_iterations(300));
        let board = Board::opening_position();

        let first = agent.search(&board, Player::Dark, &mut rng).unwrap();
        let retained = agent.root.as_ref().unwrap();
        assert_eq!(retained.get_board(), first.board);
        let reply = retained
            .children()
            .iter()
            .max_by_key(|c| c.simulations())
            .cloned()
            .unwrap();
        assert!(first.board.find_moves(Player::Light).contains(&reply.get_board()));

        assert!(reply.simulations() > 0);
        let root = agent.take_root(&reply.get_board(), Player::Dark);
        assert_eq!(root.simulations(), reply.simulations());
        assert!(agent.root.is_none());

        // an unknown position starts from scratch
        agent.root = Some(root);
        let fresh = agent.take_root(&Board::opening_position(), Player::Light);
        assert_eq!(fresh.simulations(), 0);
    }

    #[test]
    fn agent_search_continues_from_retained_tree() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut agent = Mcts::new(MctsConfig::for_testing().with_iterations(200));
        let first = agent.search(&Board::opening_position(), Player::Dark, &mut rng).unwrap();
        let reply = first.board.find_moves(Player::Light)[0];
        let second = agent.search(&reply, Player::Dark, &mut rng).unwrap();
        assert!(reply.find_moves(Player::Dark).contains(&second.board));
        assert!((0.0..=1.0).contains(&second.confidence));
    }

    #[test]
    fn agent_returns_legal_cell() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut agent = Mcts::new(MctsConfig::for_testing().with_reuse_tree(false));
        let board = Board::opening_position();
        let index = agent.get_action(&board, Player::Dark, &mut rng).unwrap();
        assert!(board.move_bits(Player::Dark).contains(index));
        assert!(agent.root.is_none());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = MctsConfig::default().with_iterations(1000).with_exploration(0.7);
        let text = serde_json::to_string(&config).unwrap();
        let back: MctsConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);

        let partial: MctsConfig = serde_json::from_str(r#"{"iterations": 10}"#).unwrap();
        assert_eq!(partial.iterations, 10);
        assert_eq!(partial.exploration, 1.5);
    }
}
