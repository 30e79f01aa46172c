use anyhow::Result;
use othello_mcts::ai::{eval_agents, play_game};
use othello_mcts::board::Outcome;
use othello_mcts::config::GameConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut dark = config.dark.build();
    let mut light = config.light.build();

    if config.games > 1 {
        let pairs = config.eval_pairs()?;
        let (s1, s2) = eval_agents(dark.as_mut(), light.as_mut(), pairs, &mut rng)?;
        info!(first = %dark.name(), second = %light.name(), s1, s2, "evaluation finished");
        println!("{}: {:.3}, {}: {:.3}", dark.name(), s1, light.name(), s2);
        return Ok(());
    }

    let record = play_game(dark.as_mut(), light.as_mut(), &mut rng, config.render)?;
    match record.outcome {
        Outcome::Winner(player) => println!("{} wins", player),
        Outcome::Draw => println!("Draw"),
    }
    Ok(())
}
