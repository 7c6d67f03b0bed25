use std::{env, error::Error};

use mdp::{
    algo::{Evaluation, PolicyIterationAgent, PolicyIterationConfig},
    gym::GridWorld,
    policy::has_contradictions,
    seeded_rng, DEFAULT_SEED,
};

#[path = "../logging.rs"]
mod logging;
mod render;

const DEFAULT_LAYOUT: &str = "demos/layouts/classic.lay";

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_LAYOUT.into());
    let world = GridWorld::load(&path)?;
    println!("{world}");

    let mut rng = seeded_rng(DEFAULT_SEED);
    for evaluation in [Evaluation::OneStep, Evaluation::Converge { theta: 1e-8 }] {
        let mut agent = PolicyIterationAgent::new(PolicyIterationConfig {
            evaluation,
            ..Default::default()
        });
        agent.solve(&world, &mut rng)?;

        println!("{:?}: {} iterations", evaluation, agent.iterations());
        println!("{}", render::values(&world, agent.state_value()));
        println!("{}", render::policy(&world, agent.policy()));
        println!(
            "Has contradiction: {}\n",
            has_contradictions(&world, agent.policy())
        );
    }

    Ok(())
}
