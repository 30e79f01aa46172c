use crate::ai::{GetAction, HumanPlayer, Mcts, MctsConfig, RandomPlayer};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AgentKind {
    Human,
    Random,
    Mcts(MctsConfig),
}

impl AgentKind {
    pub fn build(&self) -> Box<dyn GetAction> {
        match self {
            AgentKind::Human => Box::new(HumanPlayer::new()),
            AgentKind::Random => Box::new(RandomPlayer),
            AgentKind::Mcts(config) => Box::new(Mcts::new(config.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub dark: AgentKind,
    pub light: AgentKind,
    /// Fixed seed for a reproducible game; entropy when absent.
    pub seed: Option<u64>,
    /// 1 plays a single game; more runs an evaluation match, which needs an
    /// even count so both agents get each colour equally often.
    pub games: usize,
    pub render: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        return GameConfig {
            dark: AgentKind::Mcts(MctsConfig::default()),
            light: AgentKind::Mcts(MctsConfig::default()),
            seed: None,
            games: 1,
            render: true,
        };
    }
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse {}", path.display()))?;
        return Ok(config);
    }

    /// Colour-swapped pairs to play in an evaluation match.
    pub fn eval_pairs(&self) -> Result<usize> {
        anyhow::ensure!(
            self.games % 2 == 0,
            "games must be even for an evaluation match, got {}",
            self.games
        );
        return Ok(self.games / 2);
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data_str = serde_json::to_string_pretty(self)?;

        let file = File::create(path.as_ref())?;
        let mut buff_writer = BufWriter::new(file);
        buff_writer
            .write_all(data_str.as_bytes())
            .context("write error")?;
        buff_writer.flush().context("flush error")?;

        Ok(())
    }
}
