use std::collections::HashMap;

use log::warn;

use crate::env::Adjacency;

/// Maps each state to the action committed to there, `None` for terminal states
pub type Policy<S, A> = HashMap<S, Option<A>>;

/// Find pairs of adjacent states whose policy actions point at each other
///
/// Each pair is reported once, smaller state first, in sorted order.
pub fn contradictions<E>(env: &E, policy: &Policy<E::State, E::Action>) -> Vec<(E::State, E::State)>
where
    E: Adjacency,
{
    let points_back = |from: &E::State, to: &E::State| {
        policy
            .get(from)
            .and_then(Option::as_ref)
            .and_then(|action| env.intended(from, action))
            .is_some_and(|target| target == *to)
    };

    let mut pairs = policy
        .iter()
        .filter(|(state, _)| !env.is_terminal(state))
        .filter_map(|(state, action)| {
            let target = env.intended(state, action.as_ref()?)?;
            (target > *state && !env.is_terminal(&target) && points_back(&target, state))
                .then(|| (state.clone(), target))
        })
        .collect::<Vec<_>>();

    pairs.sort();
    pairs
}

/// Log every contradicting pair in `policy` and report whether there were any
pub fn has_contradictions<E>(env: &E, policy: &Policy<E::State, E::Action>) -> bool
where
    E: Adjacency,
{
    let pairs = contradictions(env, policy);
    for (a, b) in &pairs {
        warn!(
            "contradiction between {:?} ({:?}) and {:?} ({:?})",
            a, policy[a], b, policy[b]
        );
    }
    if !pairs.is_empty() {
        warn!("total contradictions found: {}", pairs.len());
    }

    !pairs.is_empty()
}
