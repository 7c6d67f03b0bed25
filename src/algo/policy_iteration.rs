use std::collections::HashMap;

use log::{debug, info};
use rand::{seq::SliceRandom, Rng};

use crate::{assert_interval, env::Environment, error::MdpError, policy::Policy};

/// How much work the evaluation step does per outer iteration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// A single synchronous Bellman backup under the current policy (modified policy iteration)
    OneStep,
    /// Repeated backups until the largest change in a sweep falls below `theta`
    Converge { theta: f64 },
}

/// Configuration for the [`PolicyIterationAgent`]
#[derive(Debug, Clone)]
pub struct PolicyIterationConfig {
    /// Discount factor
    ///
    /// **Default**: `0.9`
    pub gamma: f64,
    /// **Default**: [`Evaluation::OneStep`]
    pub evaluation: Evaluation,
    /// Give up with [`MdpError::IterationLimit`] after this many outer iterations (and, for
    /// [`Evaluation::Converge`], this many sweeps per evaluation)
    ///
    /// **Default**: `Some(1000)`
    pub max_iterations: Option<u32>,
}

impl Default for PolicyIterationConfig {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            evaluation: Evaluation::OneStep,
            max_iterations: Some(1000),
        }
    }
}

/// A policy iteration agent
///
/// This agent applies policy iteration with respect to the state values. It is a dynamic programming approach
/// and requires a full model of the environment's dynamics, which it reads through
/// [`Environment::transitions`]. As a tabular method, a discrete, small, and hashable state and action space is required.
pub struct PolicyIterationAgent<E: Environment> {
    state_value: HashMap<E::State, f64>,
    policy: Policy<E::State, E::Action>,
    gamma: f64,
    evaluation: Evaluation,
    max_iterations: Option<u32>,
    iterations: u32,
}

impl<E: Environment> PolicyIterationAgent<E> {
    /// Initialize a new `PolicyIterationAgent`
    ///
    /// **Panics** if `gamma` is not in the interval `[0,1]`
    pub fn new(config: PolicyIterationConfig) -> Self {
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            state_value: HashMap::new(),
            policy: HashMap::new(),
            gamma: config.gamma,
            evaluation: config.evaluation,
            max_iterations: config.max_iterations,
            iterations: 0,
        }
    }

    /// Run policy iteration until a full improvement pass leaves every action unchanged
    ///
    /// The initial policy picks a legal action per state using `rng`.
    pub fn solve<R>(&mut self, env: &E, rng: &mut R) -> Result<(), MdpError>
    where
        R: Rng + ?Sized,
    {
        self.initialize(env, rng);

        loop {
            self.check_limit(self.iterations)?;
            self.evaluate(env)?;
            let changed = self.improve(env)?;
            self.iterations += 1;
            debug!(
                "policy iteration {}: policy {}",
                self.iterations,
                if changed { "changed" } else { "stable" }
            );
            if !changed {
                break;
            }
        }

        for state in env.states().iter().filter(|s| env.is_terminal(s)) {
            self.policy.insert(state.clone(), None);
        }

        info!(
            "policy iteration converged after {} iterations over {} states",
            self.iterations,
            env.states().len()
        );
        Ok(())
    }

    fn initialize<R>(&mut self, env: &E, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.state_value.clear();
        self.policy.clear();
        self.iterations = 0;

        for state in env.states() {
            if env.is_terminal(state) {
                self.state_value.insert(state.clone(), env.reward(state));
                continue;
            }
            let action = env.actions(state).choose(rng).cloned();
            self.policy.insert(state.clone(), action);
            self.state_value.insert(state.clone(), 0.0);
        }
    }

    fn check_limit(&self, count: u32) -> Result<(), MdpError> {
        match self.max_iterations {
            Some(limit) if count >= limit => Err(MdpError::IterationLimit { limit }),
            _ => Ok(()),
        }
    }

    fn evaluate(&mut self, env: &E) -> Result<(), MdpError> {
        match self.evaluation {
            Evaluation::OneStep => {
                self.state_value = self.backup(env)?;
            }
            Evaluation::Converge { theta } => {
                let mut sweeps = 0;
                loop {
                    self.check_limit(sweeps)?;
                    let next = self.backup(env)?;
                    let delta = next
                        .iter()
                        .map(|(state, value)| (value - self.state_value[state]).abs())
                        .fold(0.0, f64::max);
                    self.state_value = next;
                    sweeps += 1;
                    if delta < theta {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// One synchronous Bellman backup of every state under the current policy
    fn backup(&self, env: &E) -> Result<HashMap<E::State, f64>, MdpError> {
        env.states()
            .iter()
            .map(|state| -> Result<(E::State, f64), MdpError> {
                let value = if env.is_terminal(state) {
                    env.reward(state)
                } else {
                    let action = self.policy.get(state).and_then(Option::as_ref);
                    env.reward(state) + self.gamma * self.expected_value(env, state, action)?
                };
                Ok((state.clone(), value))
            })
            .collect()
    }

    /// Greedily update the policy against the current state values
    ///
    /// **Returns** whether any state's action changed
    fn improve(&mut self, env: &E) -> Result<bool, MdpError> {
        let mut changed = false;
        for state in env.states().iter().filter(|s| !env.is_terminal(s)) {
            let mut best: Option<(E::Action, f64)> = None;
            for action in env.actions(state) {
                let value = self.expected_value(env, state, Some(&action))?;
                if best.as_ref().map_or(true, |&(_, max)| value > max) {
                    best = Some((action, value));
                }
            }

            let Some((action, _)) = best else {
                continue;
            };
            if self.action(state) != Some(&action) {
                self.policy.insert(state.clone(), Some(action));
                changed = true;
            }
        }

        Ok(changed)
    }

    fn expected_value(
        &self,
        env: &E,
        state: &E::State,
        action: Option<&E::Action>,
    ) -> Result<f64, MdpError> {
        env.transitions(state, action)
            .iter()
            .map(|t| self.value(&t.state).map(|v| t.probability * v))
            .sum()
    }

    fn value(&self, state: &E::State) -> Result<f64, MdpError> {
        self.state_value
            .get(state)
            .copied()
            .ok_or_else(|| MdpError::missing_value::<_, E::Action>(state, None))
    }

    /// Get the action the policy commits to in `state`
    pub fn action(&self, state: &E::State) -> Option<&E::Action> {
        self.policy.get(state).and_then(Option::as_ref)
    }

    /// Get the agent's policy
    pub fn policy(&self) -> &Policy<E::State, E::Action> {
        &self.policy
    }

    /// Get the agent's state value function
    pub fn state_value(&self) -> &HashMap<E::State, f64> {
        &self.state_value
    }

    /// Number of evaluation/improvement rounds the last solve took
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;

    use super::*;
    use crate::{
        gym::{Dir, GridState, GridWorld},
        policy::has_contradictions,
        util::seeded_rng,
    };

    fn classic() -> GridWorld {
        "...+\n.%.-\n....\n".parse().unwrap()
    }

    fn converging() -> PolicyIterationConfig {
        PolicyIterationConfig {
            evaluation: Evaluation::Converge { theta: 1e-10 },
            ..Default::default()
        }
    }

    #[test]
    fn terminals_keep_reward_and_take_no_action() {
        let world = classic();
        let mut agent = PolicyIterationAgent::new(PolicyIterationConfig::default());
        agent.solve(&world, &mut seeded_rng(1)).unwrap();

        for (state, reward) in world.terminals() {
            assert_eq!(agent.state_value()[state], *reward);
            assert_eq!(agent.policy()[state], None);
            assert_eq!(agent.action(state), None);
        }
        assert_eq!(agent.policy().len(), world.states().len(), "Every state has an entry");
        assert!(agent.iterations() > 0);
    }

    #[test]
    fn one_step_solve_is_stable() {
        let world = classic();
        for seed in 0..10 {
            let mut agent = PolicyIterationAgent::new(PolicyIterationConfig::default());
            agent.solve(&world, &mut seeded_rng(seed)).unwrap();
            assert!(!agent.improve(&world).unwrap(), "Improvement is idempotent");
            assert_eq!(agent.action(&GridState::new(2, 2)), Some(&Dir::East));
        }
    }

    #[test]
    fn converged_solve_finds_optimal_policy() {
        let world = classic();
        let mut agent = PolicyIterationAgent::new(converging());
        agent.solve(&world, &mut seeded_rng(3)).unwrap();

        let expected = [
            ((0, 0), Dir::North),
            ((0, 1), Dir::North),
            ((0, 2), Dir::East),
            ((1, 0), Dir::East),
            ((1, 2), Dir::East),
            ((2, 0), Dir::North),
            ((2, 1), Dir::North),
            ((2, 2), Dir::East),
            ((3, 0), Dir::West),
        ];
        for ((x, y), dir) in expected {
            assert_eq!(agent.action(&GridState::new(x, y)), Some(&dir), "at ({x}, {y})");
        }
        assert_float_eq!(agent.state_value()[&GridState::new(2, 2)], 0.7954, abs <= 1e-3);
        assert!(!has_contradictions(&world, agent.policy()));
    }

    #[test]
    fn converged_values_are_a_bellman_fixed_point() {
        let world = classic();
        let mut agent = PolicyIterationAgent::new(converging());
        agent.solve(&world, &mut seeded_rng(8)).unwrap();

        for state in world.states().iter().filter(|s| !world.is_terminal(s)) {
            let expected = world
                .transitions(state, agent.action(state))
                .iter()
                .map(|t| t.probability * agent.state_value()[&t.state])
                .sum::<f64>();
            let backup = world.reward(state) + 0.9 * expected;
            assert_float_eq!(agent.state_value()[state], backup, abs <= 1e-6);
        }
    }

    #[test]
    fn same_seed_same_policy() {
        let world = classic();
        let solve = |seed| {
            let mut agent = PolicyIterationAgent::new(PolicyIterationConfig::default());
            agent.solve(&world, &mut seeded_rng(seed)).unwrap();
            (agent.policy().clone(), agent.iterations())
        };
        assert_eq!(solve(21), solve(21));
    }

    #[test]
    fn iteration_cap() {
        let world = classic();
        let mut agent = PolicyIterationAgent::new(PolicyIterationConfig {
            max_iterations: Some(0),
            ..Default::default()
        });
        let err = agent.solve(&world, &mut seeded_rng(1)).unwrap_err();
        assert!(matches!(err, MdpError::IterationLimit { limit: 0 }));
    }

    #[test]
    fn boxed_in_state_keeps_no_action() {
        let world: GridWorld = ".%+\n%%.\n".parse().unwrap();
        let mut agent = PolicyIterationAgent::new(PolicyIterationConfig::default());
        agent.solve(&world, &mut seeded_rng(1)).unwrap();

        let boxed = GridState::new(0, 1);
        assert_eq!(agent.action(&boxed), None);
        assert_float_eq!(agent.state_value()[&boxed], -0.04, abs <= 1e-12);
    }

    #[test]
    #[should_panic]
    fn rejects_invalid_gamma() {
        PolicyIterationAgent::<GridWorld>::new(PolicyIterationConfig {
            gamma: 1.5,
            ..Default::default()
        });
    }
}
