use std::{env, error::Error};

use mdp::{
    algo::{QLearningAgent, QLearningConfig},
    env::Environment,
    gym::GridWorld,
    policy::has_contradictions,
    seeded_rng, DEFAULT_SEED,
};

#[path = "../logging.rs"]
mod logging;
#[allow(dead_code)]
#[path = "../policy_iteration_gridworld/render.rs"]
mod render;

const DEFAULT_LAYOUT: &str = "demos/layouts/classic.lay";

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let mut args = env::args().skip(1);
    let path = args.next().unwrap_or_else(|| DEFAULT_LAYOUT.into());
    let epsilon = args.next().map(|e| e.parse::<f64>()).transpose()?.unwrap_or(0.2);

    let world = GridWorld::load(&path)?;
    println!("{world}");

    let mut agent = QLearningAgent::new(QLearningConfig::with_epsilon(epsilon));
    agent.learn(&world, &mut seeded_rng(DEFAULT_SEED))?;

    println!(
        "{} episodes, {} iterations",
        agent.episodes(),
        agent.iterations()
    );
    println!("{}", render::policy(&world, agent.policy()));
    for state in world.states() {
        if let Some(dir) = agent.action(state) {
            println!("{state}: {dir} (q = {:.3})", agent.q_value(state, Some(dir))?);
        }
    }
    println!(
        "Has contradiction: {}",
        has_contradictions(&world, agent.policy())
    );

    Ok(())
}
