pub mod policy_iteration;
pub mod q_learning;

pub use policy_iteration::{Evaluation, PolicyIterationAgent, PolicyIterationConfig};
pub use q_learning::{QLearningAgent, QLearningConfig, StepGuard};
