use std::collections::HashMap;

use log::{debug, info};
use rand::Rng;

use crate::{
    assert_interval,
    env::Environment,
    error::MdpError,
    exploration::{Choice, EpsilonGreedy},
    policy::Policy,
};

/// Which steps count toward the minimum before convergence may be declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepGuard {
    /// Steps taken since learning began
    #[default]
    Cumulative,
    /// Steps taken in the episode that just ended
    PerEpisode,
}

/// Configuration for the [`QLearningAgent`]
#[derive(Debug, Clone)]
pub struct QLearningConfig {
    /// **Default**: constant epsilon of `0.2`
    pub exploration: EpsilonGreedy,
    /// Learning rate
    ///
    /// **Default**: `0.7`
    pub alpha: f64,
    /// Discount factor
    ///
    /// **Default**: `0.9`
    pub gamma: f64,
    /// Convergence threshold on the largest Q-value change in an episode
    ///
    /// **Default**: `1e-4`
    pub theta: f64,
    /// **Default**: [`StepGuard::Cumulative`]
    pub step_guard: StepGuard,
    /// Give up with [`MdpError::IterationLimit`] after this many episodes
    ///
    /// **Default**: `Some(1_000_000)`
    pub max_episodes: Option<u32>,
}

impl QLearningConfig {
    /// Default configuration with a fixed exploration rate
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            exploration: EpsilonGreedy::constant(epsilon),
            ..Default::default()
        }
    }
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            exploration: EpsilonGreedy::constant(0.2),
            alpha: 0.7,
            gamma: 0.9,
            theta: 1e-4,
            step_guard: StepGuard::default(),
            max_episodes: Some(1_000_000),
        }
    }
}

/// A Q-learning agent that learns its environment through sampled steps into a Q-table
///
/// The table is keyed by `(state, action)`. Terminal states hold a single `(state, None)`
/// entry since no action is ever taken from them.
///
/// ### Generics
/// - `E` - The [`Environment`] in which the agent will learn
pub struct QLearningAgent<E>
where
    E: Environment,
{
    q_table: HashMap<(E::State, Option<E::Action>), f64>,
    policy: Policy<E::State, E::Action>,
    exploration: EpsilonGreedy,
    alpha: f64,
    gamma: f64,
    theta: f64,
    step_guard: StepGuard,
    max_episodes: Option<u32>,
    episode: u32,
    iterations: u64,
}

impl<E> QLearningAgent<E>
where
    E: Environment,
{
    /// Initialize a new `QLearningAgent`
    ///
    /// **Panics** if `alpha` or `gamma` is not in the interval `[0,1]`
    pub fn new(config: QLearningConfig) -> Self {
        assert_interval!(config.alpha, 0.0, 1.0);
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            q_table: HashMap::new(),
            policy: HashMap::new(),
            exploration: config.exploration,
            alpha: config.alpha,
            gamma: config.gamma,
            theta: config.theta,
            step_guard: config.step_guard,
            max_episodes: config.max_episodes,
            episode: 0,
            iterations: 0,
        }
    }

    /// Learn from simulated episodes until the Q-values settle, then derive the greedy policy
    ///
    /// `rng` drives the initial Q-values, start states, exploration, and environment steps.
    pub fn learn<R>(&mut self, env: &E, rng: &mut R) -> Result<(), MdpError>
    where
        R: Rng + ?Sized,
    {
        self.initialize(env, rng);
        Self::check_startable(env)?;
        let state_count = env.states().len() as u64;

        loop {
            if let Some(limit) = self.max_episodes.filter(|&limit| self.episode >= limit) {
                return Err(MdpError::IterationLimit { limit });
            }

            let (delta, steps) = self.run_episode(env, rng)?;
            let counted = match self.step_guard {
                StepGuard::Cumulative => self.iterations,
                StepGuard::PerEpisode => steps,
            };
            self.episode += 1;
            debug!(
                "episode {}: {} steps, max change {:.6}",
                self.episode, steps, delta
            );

            if delta < self.theta && counted > state_count {
                break;
            }
        }

        self.derive_policy(env)?;
        info!(
            "q-learning converged after {} episodes ({} steps)",
            self.episode, self.iterations
        );
        Ok(())
    }

    fn initialize<R>(&mut self, env: &E, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.q_table.clear();
        self.policy.clear();
        self.episode = 0;
        self.iterations = 0;

        for state in env.states() {
            if env.is_terminal(state) {
                self.q_table.insert((state.clone(), None), 0.0);
                continue;
            }
            for action in env.actions(state) {
                self.q_table
                    .insert((state.clone(), Some(action)), rng.gen::<f64>());
            }
        }
    }

    /// Fail when no episode could ever begin because every non-terminal state is boxed in
    fn check_startable(env: &E) -> Result<(), MdpError> {
        let non_terminal = env
            .states()
            .iter()
            .filter(|s| !env.is_terminal(s))
            .collect::<Vec<_>>();
        let Some(first) = non_terminal.first() else {
            return Err(MdpError::NoNonTerminalStates);
        };
        if non_terminal.iter().all(|s| env.actions(s).is_empty()) {
            return Err(MdpError::NoLegalActions(format!("{first:?}")));
        }
        Ok(())
    }

    /// Draw a non-terminal start state that has at least one legal action
    fn start_state<R>(env: &E, rng: &mut R) -> Result<E::State, MdpError>
    where
        R: Rng + ?Sized,
    {
        loop {
            let state = env.random_state(rng)?;
            if !env.actions(&state).is_empty() {
                return Ok(state);
            }
        }
    }

    /// Play one episode from a random start state, updating the table after every step
    ///
    /// **Returns** the largest absolute Q-value change and the number of steps taken
    fn run_episode<R>(&mut self, env: &E, rng: &mut R) -> Result<(f64, u64), MdpError>
    where
        R: Rng + ?Sized,
    {
        let mut state = Self::start_state(env, rng)?;
        let mut delta: f64 = 0.0;
        let mut steps = 0;

        while !env.is_terminal(&state) {
            let action = self.act(env, &state, rng)?;
            let percept = env.step(&state, &action, rng)?;

            let bootstrap = if env.is_terminal(&percept.state) {
                env.reward(&percept.state)
            } else {
                self.best(env, &percept.state)?.1
            };

            let key = (state, Some(action));
            let q_value = self.q(&key)?;
            let update = q_value + self.alpha * (percept.reward + self.gamma * bootstrap - q_value);
            delta = delta.max((update - q_value).abs());
            self.q_table.insert(key, update);

            state = percept.state;
            self.iterations += 1;
            steps += 1;
        }

        Ok((delta, steps))
    }

    /// Choose an action based on the current state and exploration policy
    fn act<R>(&self, env: &E, state: &E::State, rng: &mut R) -> Result<E::Action, MdpError>
    where
        R: Rng + ?Sized,
    {
        match self.exploration.choose(self.episode, rng) {
            Choice::Explore => env.random_action(state, rng),
            Choice::Exploit => Ok(self.best(env, state)?.0),
        }
    }

    /// The legal action with the greatest Q-value, first seen winning ties
    fn best(&self, env: &E, state: &E::State) -> Result<(E::Action, f64), MdpError> {
        let mut best: Option<(E::Action, f64)> = None;
        for action in env.actions(state) {
            let value = self.q(&(state.clone(), Some(action.clone())))?;
            if best.as_ref().map_or(true, |&(_, max)| value > max) {
                best = Some((action, value));
            }
        }

        best.ok_or_else(|| MdpError::NoLegalActions(format!("{state:?}")))
    }

    fn q(&self, key: &(E::State, Option<E::Action>)) -> Result<f64, MdpError> {
        self.q_table
            .get(key)
            .copied()
            .ok_or_else(|| MdpError::missing_value(&key.0, key.1.as_ref()))
    }

    fn derive_policy(&mut self, env: &E) -> Result<(), MdpError> {
        for state in env.states() {
            if env.is_terminal(state) {
                self.policy.insert(state.clone(), None);
                continue;
            }
            if env.actions(state).is_empty() {
                continue;
            }
            let (action, _) = self.best(env, state)?;
            self.policy.insert(state.clone(), Some(action));
        }
        Ok(())
    }

    /// Look up a learned value; `None` as the action addresses a terminal state's sentinel
    pub fn q_value(&self, state: &E::State, action: Option<&E::Action>) -> Result<f64, MdpError> {
        self.q(&(state.clone(), action.cloned()))
    }

    pub fn q_table(&self) -> &HashMap<(E::State, Option<E::Action>), f64> {
        &self.q_table
    }

    /// Get the action the derived policy commits to in `state`
    pub fn action(&self, state: &E::State) -> Option<&E::Action> {
        self.policy.get(state).and_then(Option::as_ref)
    }

    /// Get the agent's derived policy, empty until [`learn`](Self::learn) succeeds
    pub fn policy(&self) -> &Policy<E::State, E::Action> {
        &self.policy
    }

    /// Number of episodes played in the last run
    pub fn episodes(&self) -> u32 {
        self.episode
    }

    /// Number of steps taken in the last run
    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gym::{Dir, GridState, GridWorld},
        util::seeded_rng,
    };

    fn classic() -> GridWorld {
        "...+\n.%.-\n....\n".parse().unwrap()
    }

    fn corridor() -> GridWorld {
        GridWorld::parse("...+\n").unwrap().with_slip(0.0)
    }

    #[test]
    fn terminal_sentinels_and_policy() {
        let world = classic();
        let mut agent = QLearningAgent::new(QLearningConfig::default());
        agent.learn(&world, &mut seeded_rng(4)).unwrap();

        for state in world.terminals().keys() {
            assert_eq!(agent.q_value(state, None).unwrap(), 0.0, "Sentinel never updated");
            assert_eq!(agent.policy()[state], None);
            assert!(matches!(
                agent.q_value(state, Some(&Dir::East)),
                Err(MdpError::MissingValue { .. })
            ));
        }
        for state in world.states().iter().filter(|s| !world.is_terminal(s)) {
            let action = agent.action(state).expect("non-terminal state has an action");
            assert!(world.actions(state).contains(action));
        }
        assert!(agent.episodes() > 0);
        assert!(agent.iterations() > world.states().len() as u64);
    }

    #[test]
    fn table_covers_every_legal_pair() {
        let world = classic();
        let mut agent = QLearningAgent::new(QLearningConfig::default());
        agent.learn(&world, &mut seeded_rng(4)).unwrap();

        let legal_pairs: usize = world
            .states()
            .iter()
            .map(|s| world.actions(s).len().max(usize::from(world.is_terminal(s))))
            .sum();
        assert_eq!(agent.q_table().len(), legal_pairs);
    }

    #[test]
    fn greedy_deterministic_learning_is_reproducible() {
        let world = classic().with_slip(0.0);
        let learn = |seed| {
            let mut agent = QLearningAgent::new(QLearningConfig::with_epsilon(0.0));
            agent.learn(&world, &mut seeded_rng(seed)).unwrap();
            (agent.policy().clone(), agent.episodes(), agent.iterations())
        };

        for seed in [1, 2, 3] {
            let (policy, episodes, iterations) = learn(seed);
            assert_eq!((policy.clone(), episodes, iterations), learn(seed));
            assert_eq!(policy[&GridState::new(2, 2)], Some(Dir::East));
        }
    }

    #[test]
    fn corridor_leads_to_goal() {
        let world = corridor();
        for seed in 0..5 {
            let mut agent = QLearningAgent::new(QLearningConfig::default());
            agent.learn(&world, &mut seeded_rng(seed)).unwrap();
            for x in 0..3 {
                assert_eq!(agent.action(&GridState::new(x, 0)), Some(&Dir::East));
            }
            let goal_value = agent.q_value(&GridState::new(2, 0), Some(&Dir::East)).unwrap();
            assert!((goal_value - 1.9).abs() < 1e-3, "Q(s, a) -> 1 + 0.9 * 1");
        }
    }

    #[test]
    fn decaying_exploration() {
        let world = corridor();
        let mut agent = QLearningAgent::new(QLearningConfig {
            exploration: EpsilonGreedy::geometric(1.0, 0.95, 0.0),
            alpha: 0.7,
            gamma: 0.9,
            theta: 1e-4,
            step_guard: StepGuard::Cumulative,
            max_episodes: Some(100_000),
        });
        agent.learn(&world, &mut seeded_rng(6)).unwrap();
        assert_eq!(agent.action(&GridState::new(2, 0)), Some(&Dir::East));
    }

    #[test]
    fn per_episode_guard_hits_cap_on_short_episodes() {
        let world = corridor();
        let mut agent = QLearningAgent::new(QLearningConfig {
            step_guard: StepGuard::PerEpisode,
            max_episodes: Some(200),
            ..QLearningConfig::with_epsilon(0.0)
        });
        let err = agent.learn(&world, &mut seeded_rng(1)).unwrap_err();
        assert!(matches!(err, MdpError::IterationLimit { limit: 200 }));
        assert!(agent.policy().is_empty(), "No policy derived without convergence");
    }

    #[test]
    fn all_terminal_world_is_an_error() {
        let world: GridWorld = "+-\n".parse().unwrap();
        let mut agent = QLearningAgent::new(QLearningConfig::default());
        assert!(matches!(
            agent.learn(&world, &mut seeded_rng(1)),
            Err(MdpError::NoNonTerminalStates)
        ));
    }

    #[test]
    fn boxed_in_state_is_never_a_start() {
        let world: GridWorld = ".%+\n%%.\n".parse().unwrap();
        let boxed = GridState::new(0, 1);
        for seed in 0..20 {
            let mut agent = QLearningAgent::new(QLearningConfig::default());
            agent.learn(&world, &mut seeded_rng(seed)).unwrap();

            assert!(!agent.policy().contains_key(&boxed), "Boxed-in state left unset");
            assert_eq!(agent.action(&GridState::new(2, 0)), Some(&Dir::North));
            assert_eq!(agent.policy()[&GridState::new(2, 1)], None);
        }
    }

    #[test]
    fn fully_boxed_world_is_an_error() {
        let world: GridWorld = ".%\n".parse().unwrap();
        let mut agent = QLearningAgent::new(QLearningConfig::default());
        assert!(matches!(
            agent.learn(&world, &mut seeded_rng(1)),
            Err(MdpError::NoLegalActions(_))
        ));
    }

    #[test]
    #[should_panic]
    fn rejects_invalid_alpha() {
        QLearningAgent::<GridWorld>::new(QLearningConfig {
            alpha: -0.1,
            ..Default::default()
        });
    }
}
