//! Shorthand for writing single-tape rule tables by hand. Rule sets are
//! grouped per state, a key may cover several read symbols at once, and a
//! target may leave the state or the cell implicit. [`flatten`] expands all
//! of that into a normalized [`Rules`] table.

use crate::types::{Action, Direction, Read, Rules, State, Symbol, Write};

/// The read side of a shorthand rule.
#[derive(Debug, Clone)]
pub enum Key<S> {
    /// A single read symbol.
    One(S),
    /// A group of read symbols sharing one target; expanded in order.
    Set(Vec<S>),
    /// The wildcard key.
    Any,
}

/// The target side of a shorthand rule. `next` of `None` means "stay in the
/// current state".
#[derive(Debug, Clone)]
pub struct Target<Q, S> {
    /// State to switch to, or `None` to keep the current one.
    pub next: Option<Q>,
    /// What to write under the head.
    pub write: Write<S>,
    /// Where the head goes.
    pub dir: Direction,
}

impl<Q, S> Target<Q, S> {
    /// Full form: switch to `next`, write, move.
    pub fn to(next: Q, write: Write<S>, dir: Direction) -> Self {
        Target {
            next: Some(next),
            write,
            dir,
        }
    }

    /// Move-only form: keep the state, keep the cell, move the head.
    pub fn mv(dir: Direction) -> Self {
        Target {
            next: None,
            write: Write::Keep,
            dir,
        }
    }

    /// Same-state form: keep the state, write, move.
    pub fn same(write: Write<S>, dir: Direction) -> Self {
        Target {
            next: None,
            write,
            dir,
        }
    }
}

/// Expands per-state shorthand groups into a normalized rule table.
///
/// Entries are inserted in the order given, so the resulting table (and
/// everything compiled from it) is deterministic. Duplicate keys produced by
/// overlapping groups follow the table's last-writer-wins contract.
pub fn flatten<Q: State, S: Symbol>(groups: Vec<(Q, Vec<(Key<S>, Target<Q, S>)>)>) -> Rules<Q, S> {
    let mut rules = Rules::new();
    for (state, entries) in groups {
        for (key, target) in entries {
            let next = target.next.unwrap_or_else(|| state.clone());
            let action = Action {
                next,
                write: target.write,
                dir: target.dir,
            };
            match key {
                Key::One(symbol) => rules.insert(state.clone(), Read::Exact(symbol), action),
                Key::Any => rules.insert(state.clone(), Read::Any, action),
                Key::Set(symbols) => {
                    for symbol in symbols {
                        rules.insert(state.clone(), Read::Exact(symbol), action.clone());
                    }
                }
            }
        }
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_key_expands_per_symbol() {
        let rules = flatten(vec![(
            "skip",
            vec![(Key::Set(vec!['0', '1', '_']), Target::mv(Direction::Left))],
        )]);
        assert_eq!(rules.len(), 3);
        for symbol in ['0', '1', '_'] {
            let action = rules.lookup(&"skip", &symbol).unwrap();
            assert_eq!(action.next, "skip");
            assert_eq!(action.write, Write::Keep);
            assert_eq!(action.dir, Direction::Left);
        }
    }

    #[test]
    fn test_implicit_state_resolves_to_current() {
        let rules = flatten(vec![(
            "w",
            vec![(
                Key::One('a'),
                Target::same(Write::Put('b'), Direction::Right),
            )],
        )]);
        assert_eq!(rules.lookup(&"w", &'a').unwrap().next, "w");
    }

    #[test]
    fn test_any_key() {
        let rules = flatten(vec![(
            "q",
            vec![
                (Key::One('x'), Target::to("hit", Write::Keep, Direction::Stay)),
                (Key::Any, Target::to("miss", Write::Keep, Direction::Stay)),
            ],
        )]);
        assert_eq!(rules.lookup(&"q", &'x').unwrap().next, "hit");
        assert_eq!(rules.lookup(&"q", &'y').unwrap().next, "miss");
    }

    #[test]
    fn test_flatten_is_idempotent_on_normalized_input() {
        let first = flatten(vec![
            (
                "a",
                vec![
                    (Key::Set(vec!['0', '1']), Target::mv(Direction::Right)),
                    (Key::Any, Target::to("b", Write::Put('x'), Direction::Stay)),
                ],
            ),
            (
                "b",
                vec![(Key::One('x'), Target::to("a", Write::Keep, Direction::Left))],
            ),
        ]);

        // Feed the normalized table back through flatten: nothing changes.
        let groups: Vec<_> = first
            .iter()
            .map(|((state, read), action)| {
                let key = match read {
                    Read::Exact(symbol) => Key::One(symbol.clone()),
                    Read::Any => Key::Any,
                };
                (
                    *state,
                    vec![(
                        key,
                        Target::to(action.next, action.write.clone(), action.dir),
                    )],
                )
            })
            .collect();
        let second = flatten(groups);
        assert_eq!(first, second);
    }
}
