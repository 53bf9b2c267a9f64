//! Core vocabulary for the toolkit: tape symbols and machine states, rule
//! keys and rule targets, the insertion-ordered rule tables, and the error
//! type shared by all constructors and compilers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

use crate::Rule;

/// Anything usable as a machine state: cloneable, hashable, with stable
/// equality. Implemented automatically for every qualifying type.
pub trait State: Clone + Eq + Hash + Debug {}
impl<T: Clone + Eq + Hash + Debug> State for T {}

/// Anything usable as a tape symbol. Same bounds as [`State`]; the two
/// aliases exist so signatures read as intended.
pub trait Symbol: Clone + Eq + Hash + Debug {}
impl<T: Clone + Eq + Hash + Debug> Symbol for T {}

/// Head displacement performed after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one cell to the left. Moving left of cell 0 halts.
    Left,
    /// Move the head one cell to the right, extending the tape on demand.
    Right,
    /// Keep the head where it is.
    Stay,
}

impl Direction {
    /// The signed displacement this direction stands for.
    pub fn offset(self) -> isize {
        match self {
            Direction::Left => -1,
            Direction::Stay => 0,
            Direction::Right => 1,
        }
    }
}

/// The read side of a rule key: either a concrete symbol or the wildcard
/// that matches whatever is under the head.
///
/// The wildcard is *not* a symbol; it never appears on a tape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Read<S> {
    /// Match exactly this symbol.
    Exact(S),
    /// Match any symbol. A concrete entry for the same state wins over this.
    Any,
}

/// The write side of a rule target: either a symbol to put under the head or
/// the marker that leaves the cell untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Write<S> {
    /// Overwrite the cell with this symbol.
    Put(S),
    /// Leave the cell as it is.
    Keep,
}

impl<S: Symbol> Write<S> {
    /// The symbol the cell holds after this write, given its current content.
    pub fn resolved(&self, current: &S) -> S {
        match self {
            Write::Put(s) => s.clone(),
            Write::Keep => current.clone(),
        }
    }
}

/// Target of a single-tape transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action<Q, S> {
    /// State the machine switches to.
    pub next: Q,
    /// What happens to the cell under the head.
    pub write: Write<S>,
    /// Where the head goes afterwards.
    pub dir: Direction,
}

/// Target of a multi-tape transition: one write and one move per tape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiAction<Q, S> {
    /// State the machine switches to.
    pub next: Q,
    /// Per-tape writes, indexed by tape.
    pub writes: Vec<Write<S>>,
    /// Per-tape head moves, indexed by tape.
    pub dirs: Vec<Direction>,
}

/// The read side of a multi-tape rule key: a full tuple of head symbols, or
/// the wildcard matching every tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadHeads<S> {
    /// Match exactly this tuple of symbols (one per tape).
    Exact(Vec<S>),
    /// Match any tuple. Concrete entries for the same state win over this.
    Any,
}

#[derive(Debug, Clone)]
struct StateSlots<S> {
    exact: HashMap<S, usize>,
    any: Option<usize>,
}

impl<S: Symbol> PartialEq for StateSlots<S> {
    fn eq(&self, other: &Self) -> bool {
        self.exact == other.exact && self.any == other.any
    }
}

impl<S: Symbol> Default for StateSlots<S> {
    fn default() -> Self {
        StateSlots {
            exact: HashMap::new(),
            any: None,
        }
    }
}

/// Single-tape rule table: a map from `(state, read)` to [`Action`] that
/// remembers insertion order.
///
/// Ordering is part of the contract: compilers iterate the table when
/// emitting compiled machines, and the universal encoder lays rules out on
/// tape in this order. Re-inserting an existing key overwrites the target
/// but keeps the key's original position (last writer wins).
#[derive(Debug, Clone)]
pub struct Rules<Q, S> {
    entries: Vec<((Q, Read<S>), Action<Q, S>)>,
    slots: HashMap<Q, StateSlots<S>>,
}

impl<Q: State, S: Symbol> PartialEq for Rules<Q, S> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.slots == other.slots
    }
}

impl<Q: State, S: Symbol> Rules<Q, S> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Rules {
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a rule, overwriting any previous target for the same key.
    pub fn insert(&mut self, state: Q, read: Read<S>, action: Action<Q, S>) {
        let slot = self.slots.entry(state.clone()).or_default();
        let existing = match &read {
            Read::Exact(s) => slot.exact.get(s).copied(),
            Read::Any => slot.any,
        };
        match existing {
            Some(index) => self.entries[index].1 = action,
            None => {
                let index = self.entries.len();
                match &read {
                    Read::Exact(s) => {
                        slot.exact.insert(s.clone(), index);
                    }
                    Read::Any => slot.any = Some(index),
                }
                self.entries.push(((state, read), action));
            }
        }
    }

    /// Looks up the transition fired in `state` when `symbol` is under the
    /// head: the concrete entry if present, the state's wildcard entry
    /// otherwise.
    pub fn lookup(&self, state: &Q, symbol: &S) -> Option<&Action<Q, S>> {
        let slot = self.slots.get(state)?;
        let index = slot.exact.get(symbol).copied().or(slot.any)?;
        Some(&self.entries[index].1)
    }

    /// True if the state has at least one outgoing rule.
    pub fn has_state(&self, state: &Q) -> bool {
        self.slots.contains_key(state)
    }

    /// True if the state has a wildcard entry.
    pub fn has_any(&self, state: &Q) -> bool {
        self.slots.get(state).is_some_and(|slot| slot.any.is_some())
    }

    /// The concrete entry for `(state, symbol)`, ignoring the wildcard.
    pub fn get_exact(&self, state: &Q, symbol: &S) -> Option<&Action<Q, S>> {
        let slot = self.slots.get(state)?;
        let index = slot.exact.get(symbol).copied()?;
        Some(&self.entries[index].1)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&(Q, Read<S>), &Action<Q, S>)> {
        self.entries.iter().map(|(key, action)| (key, action))
    }
}

impl<Q: State, S: Symbol> Default for Rules<Q, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: State, S: Symbol> FromIterator<(Q, Read<S>, Action<Q, S>)> for Rules<Q, S> {
    fn from_iter<I: IntoIterator<Item = (Q, Read<S>, Action<Q, S>)>>(iter: I) -> Self {
        let mut rules = Rules::new();
        for (state, read, action) in iter {
            rules.insert(state, read, action);
        }
        rules
    }
}

#[derive(Debug, Clone)]
struct MultiStateSlots<S> {
    exact: HashMap<Vec<S>, usize>,
    any: Option<usize>,
}

impl<S: Symbol> PartialEq for MultiStateSlots<S> {
    fn eq(&self, other: &Self) -> bool {
        self.exact == other.exact && self.any == other.any
    }
}

impl<S: Symbol> Default for MultiStateSlots<S> {
    fn default() -> Self {
        MultiStateSlots {
            exact: HashMap::new(),
            any: None,
        }
    }
}

/// Multi-tape rule table; same ordering and overwrite contract as [`Rules`].
#[derive(Debug, Clone)]
pub struct MultiRules<Q, S> {
    entries: Vec<((Q, ReadHeads<S>), MultiAction<Q, S>)>,
    slots: HashMap<Q, MultiStateSlots<S>>,
}

impl<Q: State, S: Symbol> PartialEq for MultiRules<Q, S> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.slots == other.slots
    }
}

impl<Q: State, S: Symbol> MultiRules<Q, S> {
    /// Creates an empty table.
    pub fn new() -> Self {
        MultiRules {
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a rule, overwriting any previous target for the same key.
    pub fn insert(&mut self, state: Q, read: ReadHeads<S>, action: MultiAction<Q, S>) {
        let slot = self.slots.entry(state.clone()).or_default();
        let existing = match &read {
            ReadHeads::Exact(heads) => slot.exact.get(heads).copied(),
            ReadHeads::Any => slot.any,
        };
        match existing {
            Some(index) => self.entries[index].1 = action,
            None => {
                let index = self.entries.len();
                match &read {
                    ReadHeads::Exact(heads) => {
                        slot.exact.insert(heads.clone(), index);
                    }
                    ReadHeads::Any => slot.any = Some(index),
                }
                self.entries.push(((state, read), action));
            }
        }
    }

    /// Looks up the transition fired in `state` for the tuple of symbols
    /// currently under the heads (concrete entry first, wildcard second).
    pub fn lookup(&self, state: &Q, heads: &[S]) -> Option<&MultiAction<Q, S>> {
        let slot = self.slots.get(state)?;
        let index = slot.exact.get(heads).copied().or(slot.any)?;
        Some(&self.entries[index].1)
    }

    /// True if the state has at least one outgoing rule.
    pub fn has_state(&self, state: &Q) -> bool {
        self.slots.contains_key(state)
    }

    /// True if the state has a wildcard entry.
    pub fn has_any(&self, state: &Q) -> bool {
        self.slots.get(state).is_some_and(|slot| slot.any.is_some())
    }

    /// The state's wildcard entry, if it has one.
    pub fn get_any(&self, state: &Q) -> Option<&MultiAction<Q, S>> {
        let index = self.slots.get(state)?.any?;
        Some(&self.entries[index].1)
    }

    /// The concrete read tuples of a state, in no particular order.
    pub fn exact_reads(&self, state: &Q) -> impl Iterator<Item = &Vec<S>> {
        self.slots
            .get(state)
            .into_iter()
            .flat_map(|slot| slot.exact.keys())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&(Q, ReadHeads<S>), &MultiAction<Q, S>)> {
        self.entries.iter().map(|(key, action)| (key, action))
    }
}

impl<Q: State, S: Symbol> Default for MultiRules<Q, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised while constructing machines or converting between
/// representations. Running a machine never fails: a missing rule or a move
/// off the left tape end simply halts it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MachineError {
    /// A multi-tape rule whose read, write, or delta tuple does not have one
    /// entry per tape.
    #[error("rule for state {state} expects {expected} tapes, found a tuple of {found}")]
    RuleArity {
        state: String,
        expected: usize,
        found: usize,
    },
    /// `run` was given the wrong number of input tapes.
    #[error("expected {expected} input tapes, got {found}")]
    TapeCount { expected: usize, found: usize },
    /// `run` was given the wrong number of head positions.
    #[error("expected {expected} head positions, got {found}")]
    HeadCount { expected: usize, found: usize },
    /// An input symbol that the compiled machine's alphabet does not cover.
    #[error("symbol {0} is not in the machine alphabet")]
    UnknownSymbol(String),
    /// A compiled tape that does not decode (bad block index or stray cell).
    #[error("invalid compiled tape content: {0}")]
    BadEncoding(String),
    /// The universal encoding requires the simulated machine to use `0` as
    /// its empty symbol.
    #[error("universal encoding requires empty symbol 0")]
    EmptyNotZero,
    /// A compiled program string that does not match the program grammar.
    #[error("program parse error: {0}")]
    Parse(#[from] Box<pest::error::Error<Rule>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(next: &'static str, write: Write<char>, dir: Direction) -> Action<&'static str, char> {
        Action { next, write, dir }
    }

    #[test]
    fn test_direction_serialization() {
        let left_json = serde_json::to_string(&Direction::Left).unwrap();
        let stay_json = serde_json::to_string(&Direction::Stay).unwrap();

        assert_eq!(left_json, "\"Left\"");
        assert_eq!(stay_json, "\"Stay\"");

        let left: Direction = serde_json::from_str(&left_json).unwrap();
        assert_eq!(left, Direction::Left);
    }

    #[test]
    fn test_read_write_serialization() {
        let read: Read<char> = Read::Exact('a');
        let json = serde_json::to_string(&read).unwrap();
        let back: Read<char> = serde_json::from_str(&json).unwrap();
        assert_eq!(read, back);

        let keep: Write<char> = Write::Keep;
        let json = serde_json::to_string(&keep).unwrap();
        let back: Write<char> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Write::Keep);
    }

    #[test]
    fn test_rules_preserve_insertion_order() {
        let mut rules = Rules::new();
        rules.insert("b", Read::Exact('x'), action("c", Write::Put('0'), Direction::Right));
        rules.insert("a", Read::Exact('y'), action("b", Write::Keep, Direction::Left));
        rules.insert("b", Read::Any, action("b", Write::Keep, Direction::Stay));

        let keys: Vec<_> = rules.iter().map(|(key, _)| key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                ("b", Read::Exact('x')),
                ("a", Read::Exact('y')),
                ("b", Read::Any),
            ]
        );
    }

    #[test]
    fn test_rules_overwrite_keeps_position() {
        let mut rules = Rules::new();
        rules.insert("a", Read::Exact('x'), action("b", Write::Keep, Direction::Stay));
        rules.insert("a", Read::Exact('y'), action("c", Write::Keep, Direction::Stay));
        rules.insert("a", Read::Exact('x'), action("d", Write::Keep, Direction::Stay));

        assert_eq!(rules.len(), 2);
        let first = rules.iter().next().unwrap();
        assert_eq!(first.0, &("a", Read::Exact('x')));
        assert_eq!(first.1.next, "d");
    }

    #[test]
    fn test_lookup_prefers_exact_over_any() {
        let mut rules = Rules::new();
        rules.insert("q", Read::Any, action("any", Write::Keep, Direction::Stay));
        rules.insert("q", Read::Exact('a'), action("exact", Write::Keep, Direction::Stay));

        assert_eq!(rules.lookup(&"q", &'a').unwrap().next, "exact");
        assert_eq!(rules.lookup(&"q", &'b').unwrap().next, "any");
        assert!(rules.lookup(&"r", &'a').is_none());
    }

    #[test]
    fn test_multi_lookup_by_slice() {
        let mut rules: MultiRules<&str, char> = MultiRules::new();
        rules.insert(
            "q",
            ReadHeads::Exact(vec!['a', 'b']),
            MultiAction {
                next: "hit",
                writes: vec![Write::Keep, Write::Keep],
                dirs: vec![Direction::Stay, Direction::Stay],
            },
        );
        rules.insert(
            "q",
            ReadHeads::Any,
            MultiAction {
                next: "fallback",
                writes: vec![Write::Keep, Write::Keep],
                dirs: vec![Direction::Stay, Direction::Stay],
            },
        );

        assert_eq!(rules.lookup(&"q", &['a', 'b']).unwrap().next, "hit");
        assert_eq!(rules.lookup(&"q", &['a', 'c']).unwrap().next, "fallback");
    }
}
