use std::collections::HashMap;

use mdp::{
    gym::{Dir, GridState, GridWorld},
    policy::Policy,
};

/// Lay state values out on the grid, top row first
pub fn values(world: &GridWorld, values: &HashMap<GridState, f64>) -> String {
    grid(world, |state| {
        values
            .get(&state)
            .map_or_else(|| "   %   ".into(), |v| format!("{v:>7.3}"))
    })
}

/// Lay policy arrows out on the grid, top row first
pub fn policy(world: &GridWorld, policy: &Policy<GridState, Dir>) -> String {
    grid(world, |state| {
        let cell = match policy.get(&state) {
            Some(Some(Dir::East)) => ">",
            Some(Some(Dir::West)) => "<",
            Some(Some(Dir::North)) => "^",
            Some(Some(Dir::South)) => "v",
            Some(None) => "*",
            None => "%",
        };
        format!(" {cell} ")
    })
}

fn grid(world: &GridWorld, cell: impl Fn(GridState) -> String) -> String {
    (0..world.height())
        .rev()
        .map(|y| {
            (0..world.width())
                .map(|x| cell(GridState::new(x, y)))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
