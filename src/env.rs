use std::{fmt::Debug, hash::Hash};

use rand::{seq::SliceRandom, Rng};

use crate::error::MdpError;

/// A possible outcome of attempting an action: the successor state and the probability of reaching it
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    pub state: S,
    pub probability: f64,
}

impl<S> Transition<S> {
    pub fn new(state: S, probability: f64) -> Self {
        Self { state, probability }
    }
}

/// What an agent perceives after actually taking a step: the state it landed in and the reward received
#[derive(Debug, Clone, PartialEq)]
pub struct Percept<S> {
    pub state: S,
    pub reward: f64,
}

/// Represents a Markov decision process, defining the dynamics of an environment
/// in which an agent can operate.
///
/// This base trait represents the common case of a discrete-time MDP with one agent
/// and a finite, fully enumerable state space and action space. The environment is a
/// pure model: it holds no episode position, so the same instance can be queried by a
/// model-based solver and stepped by a sample-based one.
///
/// Every method that needs randomness takes the random source explicitly, so a caller can
/// share one seeded stream between environment sampling and its own exploration draws.
pub trait Environment {
    /// A representation of the state of the environment
    type State: Clone + Eq + Hash + Ord + Debug;

    /// A representation of an action that an agent can take to affect the environment
    type Action: Clone + Eq + Hash + Ord + Debug;

    /// Every state of the environment, terminal ones included, in a stable order
    fn states(&self) -> &[Self::State];

    /// Get the legal actions for a state
    ///
    /// Terminal states have none. Actions that would trivially leave the agent in place
    /// are excluded.
    fn actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// The full outcome distribution of attempting `action` in `state`
    ///
    /// Must be deterministic for a given pair. Returns an empty list when `action` is `None`.
    fn transitions(
        &self,
        state: &Self::State,
        action: Option<&Self::Action>,
    ) -> Vec<Transition<Self::State>>;

    /// Terminal reward if `state` is terminal, otherwise the living reward
    fn reward(&self, state: &Self::State) -> f64;

    /// Determine if the state ends an episode
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Fail fast on a state that does not belong to this environment
    fn check(&self, state: &Self::State) -> Result<(), MdpError> {
        self.states()
            .contains(state)
            .then_some(())
            .ok_or_else(|| MdpError::UnknownState(format!("{state:?}")))
    }

    /// Sample one real step from the transition model
    ///
    /// Draws `u` in `[0, 1)` and picks the first transition whose cumulative probability
    /// exceeds it. A draw that falls past the end of a distribution summing to less than one
    /// is rejected with [`MdpError::Unnormalized`]. A state foreign to the environment is rejected
    /// with [`MdpError::UnknownState`] before any draw.
    ///
    /// **Returns** the resulting state with its reward
    fn step<R>(
        &self,
        state: &Self::State,
        action: &Self::Action,
        rng: &mut R,
    ) -> Result<Percept<Self::State>, MdpError>
    where
        R: Rng + ?Sized,
    {
        self.check(state)?;
        let transitions = self.transitions(state, Some(action));
        let u = rng.gen::<f64>();
        let mut cumulative = 0.0;
        for transition in transitions {
            cumulative += transition.probability;
            if u < cumulative {
                let reward = self.reward(&transition.state);
                return Ok(Percept {
                    state: transition.state,
                    reward,
                });
            }
        }

        Err(MdpError::Unnormalized {
            state: format!("{state:?}"),
            action: format!("{action:?}"),
            sum: cumulative,
        })
    }

    /// Draw a state uniformly from the non-terminal states
    fn random_state<R>(&self, rng: &mut R) -> Result<Self::State, MdpError>
    where
        R: Rng + ?Sized,
    {
        let states = self.states();
        if states.iter().all(|s| self.is_terminal(s)) {
            return Err(MdpError::NoNonTerminalStates);
        }

        loop {
            let state = &states[rng.gen_range(0..states.len())];
            if !self.is_terminal(state) {
                return Ok(state.clone());
            }
        }
    }

    /// Draw an action uniformly from the legal actions of `state`
    fn random_action<R>(&self, state: &Self::State, rng: &mut R) -> Result<Self::Action, MdpError>
    where
        R: Rng + ?Sized,
    {
        self.actions(state)
            .choose(rng)
            .cloned()
            .ok_or_else(|| MdpError::NoLegalActions(format!("{state:?}")))
    }
}

/// An environment whose actions have an intended direction that can be reasoned about
/// without the transition model
pub trait Adjacency: Environment {
    /// The state `action` points at from `state`, ignoring any stochastic drift
    ///
    /// The result need not be a valid state of the environment.
    fn intended(&self, state: &Self::State, action: &Self::Action) -> Option<Self::State>;
}
