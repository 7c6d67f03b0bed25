use rand::Rng;

use crate::assert_interval;

use super::Choice;

/// How the exploration rate evolves over the episodes of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// The same rate every episode
    Constant(f64),
    /// Starts at `start` and shrinks by `factor` after every episode, never dropping below `floor`
    Geometric { start: f64, factor: f64, floor: f64 },
}

/// Epsilon greedy exploration policy with a per-episode epsilon schedule
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    schedule: Schedule,
}

impl EpsilonGreedy {
    /// Epsilon greedy policy with a fixed exploration rate
    ///
    /// **Panics** if `epsilon` is not in the interval `[0,1]`
    pub fn constant(epsilon: f64) -> Self {
        assert_interval!(epsilon, 0.0, 1.0);
        Self {
            schedule: Schedule::Constant(epsilon),
        }
    }

    /// Epsilon greedy policy whose rate is `max(start * factor^episode, floor)`
    ///
    /// **Panics** if `start` or `factor` is not in the interval `[0,1]`, or `floor` is not in `[0,start]`
    pub fn geometric(start: f64, factor: f64, floor: f64) -> Self {
        assert_interval!(start, 0.0, 1.0);
        assert_interval!(factor, 0.0, 1.0);
        assert_interval!(floor, 0.0, start);
        Self {
            schedule: Schedule::Geometric {
                start,
                factor,
                floor,
            },
        }
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Exploration rate for the given episode
    pub fn epsilon(&self, episode: u32) -> f64 {
        match self.schedule {
            Schedule::Constant(epsilon) => epsilon,
            Schedule::Geometric {
                start,
                factor,
                floor,
            } => (start * factor.powf(episode as f64)).max(floor),
        }
    }

    /// Invoke epsilon greedy policy for current episode
    ///
    /// Explores when a uniform draw from `rng` falls below epsilon.
    pub fn choose<R>(&self, episode: u32, rng: &mut R) -> Choice
    where
        R: Rng + ?Sized,
    {
        if rng.gen::<f64>() < self.epsilon(episode) {
            Choice::Explore
        } else {
            Choice::Exploit
        }
    }
}
