//! The multi-tape Turing machine interpreter: k synchronized tapes and
//! heads, one rule table keyed by the full tuple of symbols under the heads.
//! Also home to the partial-rule layer that expands per-tape gaps into full
//! tuples over an alphabet.

use std::collections::HashMap;

use crate::machine::StepResult;
use crate::types::{
    Direction, MachineError, MultiAction, MultiRules, ReadHeads, State, Symbol, Write,
};

/// A deterministic k-tape Turing machine.
///
/// Each tape is right-infinite, exactly as in the single-tape
/// [`Machine`](crate::Machine); a transition reads all k heads at once,
/// writes all k cells, then moves all k heads. Writes happen before moves,
/// and moves are applied tape by tape: the first head that would fall off
/// the left end halts the machine with the earlier heads already moved.
#[derive(Debug, Clone)]
pub struct MultitapeMachine<Q, S> {
    tapes_count: usize,
    rules: MultiRules<Q, S>,
    init_state: Q,
    empty_symbol: S,
}

impl<Q: State, S: Symbol> MultitapeMachine<Q, S> {
    /// Creates a k-tape machine.
    ///
    /// Fails with [`MachineError::RuleArity`] if any rule's read tuple,
    /// write tuple, or move tuple does not have exactly `tapes_count`
    /// entries (wildcard reads carry no tuple and are exempt from the read
    /// check).
    pub fn new(
        tapes_count: usize,
        rules: MultiRules<Q, S>,
        init_state: Q,
        empty_symbol: S,
    ) -> Result<Self, MachineError> {
        for ((state, read), action) in rules.iter() {
            let mut lengths = vec![action.writes.len(), action.dirs.len()];
            if let ReadHeads::Exact(heads) = read {
                lengths.push(heads.len());
            }
            for found in lengths {
                if found != tapes_count {
                    return Err(MachineError::RuleArity {
                        state: format!("{state:?}"),
                        expected: tapes_count,
                        found,
                    });
                }
            }
        }
        Ok(MultitapeMachine {
            tapes_count,
            rules,
            init_state,
            empty_symbol,
        })
    }

    /// Number of tapes.
    pub fn tapes_count(&self) -> usize {
        self.tapes_count
    }

    /// The machine's rule table.
    pub fn rules(&self) -> &MultiRules<Q, S> {
        &self.rules
    }

    /// The state a run starts in.
    pub fn init_state(&self) -> &Q {
        &self.init_state
    }

    /// The fill symbol for fresh tape cells.
    pub fn empty_symbol(&self) -> &S {
        &self.empty_symbol
    }

    /// Runs the machine on the given input tapes until it halts or
    /// `max_steps` transitions have been attempted, and returns the final
    /// tapes. `heads` defaults to all zeros.
    pub fn run(
        &self,
        tapes: &[Vec<S>],
        heads: Option<&[usize]>,
        max_steps: Option<usize>,
    ) -> Result<Vec<Vec<S>>, MachineError> {
        let mut exec = self.start(tapes, heads)?;
        exec.run(max_steps);
        Ok(exec.into_tapes())
    }

    /// Creates a run context over copies of the input tapes. Each tape is
    /// extended with the empty symbol so the cell under its head exists.
    pub fn start(
        &self,
        tapes: &[Vec<S>],
        heads: Option<&[usize]>,
    ) -> Result<MultiExecution<'_, Q, S>, MachineError> {
        if tapes.len() != self.tapes_count {
            return Err(MachineError::TapeCount {
                expected: self.tapes_count,
                found: tapes.len(),
            });
        }
        let heads = match heads {
            Some(heads) if heads.len() != self.tapes_count => {
                return Err(MachineError::HeadCount {
                    expected: self.tapes_count,
                    found: heads.len(),
                });
            }
            Some(heads) => heads.to_vec(),
            None => vec![0; self.tapes_count],
        };

        let mut tapes = tapes.to_vec();
        for (tape, &head) in tapes.iter_mut().zip(&heads) {
            if head >= tape.len() {
                tape.resize(head + 1, self.empty_symbol.clone());
            }
        }
        Ok(MultiExecution {
            machine: self,
            state: self.init_state.clone(),
            tapes,
            heads,
            halted: false,
            steps: 0,
            read_buf: Vec::with_capacity(self.tapes_count),
        })
    }
}

/// The mutable part of a multi-tape run.
#[derive(Debug)]
pub struct MultiExecution<'m, Q, S> {
    machine: &'m MultitapeMachine<Q, S>,
    state: Q,
    tapes: Vec<Vec<S>>,
    heads: Vec<usize>,
    halted: bool,
    steps: usize,
    read_buf: Vec<S>,
}

impl<Q: State, S: Symbol> MultiExecution<'_, Q, S> {
    /// Performs one synchronized transition across all tapes.
    pub fn step(&mut self) -> StepResult {
        if self.halted {
            return StepResult::Halt;
        }
        self.steps += 1;

        self.read_buf.clear();
        for (tape, &head) in self.tapes.iter().zip(&self.heads) {
            self.read_buf.push(tape[head].clone());
        }

        let machine = self.machine;
        let Some(action) = machine.rules.lookup(&self.state, &self.read_buf) else {
            self.halted = true;
            return StepResult::Halt;
        };

        for (index, write) in action.writes.iter().enumerate() {
            if let Write::Put(symbol) = write {
                self.tapes[index][self.heads[index]] = symbol.clone();
            }
        }
        self.state = action.next.clone();
        self.mv(&action.dirs)
    }

    fn mv(&mut self, dirs: &[Direction]) -> StepResult {
        for (index, dir) in dirs.iter().enumerate() {
            match dir {
                Direction::Stay => {}
                Direction::Left => {
                    if self.heads[index] == 0 {
                        self.halted = true;
                        return StepResult::Halt;
                    }
                    self.heads[index] -= 1;
                }
                Direction::Right => {
                    self.heads[index] += 1;
                    if self.heads[index] == self.tapes[index].len() {
                        self.tapes[index].push(self.machine.empty_symbol.clone());
                    }
                }
            }
        }
        StepResult::Continue
    }

    /// Steps until the machine halts or `max_steps` transitions have been
    /// attempted.
    pub fn run(&mut self, max_steps: Option<usize>) {
        let mut taken = 0;
        while !self.halted {
            if max_steps.is_some_and(|cap| taken >= cap) {
                break;
            }
            taken += 1;
            self.step();
        }
    }

    /// Current state.
    pub fn state(&self) -> &Q {
        &self.state
    }

    /// Current contents of all tapes.
    pub fn tapes(&self) -> &[Vec<S>] {
        &self.tapes
    }

    /// Current head positions, one per tape.
    pub fn heads(&self) -> &[usize] {
        &self.heads
    }

    /// True once no rule fired or a head fell off the left end.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of transitions attempted so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Consumes the context and returns the tapes.
    pub fn into_tapes(self) -> Vec<Vec<S>> {
        self.tapes
    }
}

/// One shorthand rule over a subset of the tapes.
///
/// Tapes missing from `read` range over the whole alphabet; tapes missing
/// from `write` keep their cell content; tapes missing from `dirs` stay
/// put. A `read` of `None` produces a single wildcard rule for the state.
#[derive(Debug, Clone)]
pub struct PartialRule<Q, S> {
    /// Per-tape read requirements, or `None` for a wildcard rule.
    pub read: Option<HashMap<usize, S>>,
    /// State the machine switches to.
    pub next: Q,
    /// Per-tape writes; gaps mean "leave the cell alone".
    pub write: HashMap<usize, S>,
    /// Per-tape moves; gaps mean "stay".
    pub dirs: HashMap<usize, Direction>,
}

/// Expands partial per-state rules into a full [`MultiRules`] table by
/// enumerating the alphabet over every tape the read map leaves open.
///
/// Enumeration follows alphabet order, last open tape varying fastest, so
/// the resulting table is deterministic for a given input ordering.
pub fn expand_partial<Q: State, S: Symbol>(
    alphabet: &[S],
    tapes_count: usize,
    partial: Vec<(Q, Vec<PartialRule<Q, S>>)>,
) -> MultiRules<Q, S> {
    let mut rules = MultiRules::new();
    for (state, state_rules) in partial {
        for rule in state_rules {
            let dirs: Vec<Direction> = (0..tapes_count)
                .map(|index| rule.dirs.get(&index).copied().unwrap_or(Direction::Stay))
                .collect();
            let writes: Vec<Write<S>> = (0..tapes_count)
                .map(|index| match rule.write.get(&index) {
                    Some(symbol) => Write::Put(symbol.clone()),
                    None => Write::Keep,
                })
                .collect();
            let action = MultiAction {
                next: rule.next.clone(),
                writes,
                dirs,
            };

            let Some(read) = rule.read else {
                rules.insert(state.clone(), ReadHeads::Any, action);
                continue;
            };

            let open: Vec<usize> = (0..tapes_count)
                .filter(|index| !read.contains_key(index))
                .collect();
            for combo in combinations(alphabet, open.len()) {
                let mut filled = combo.into_iter();
                let heads: Vec<S> = (0..tapes_count)
                    .map(|index| match read.get(&index) {
                        Some(symbol) => symbol.clone(),
                        None => filled.next().expect("one fill symbol per open tape"),
                    })
                    .collect();
                rules.insert(state.clone(), ReadHeads::Exact(heads), action.clone());
            }
        }
    }
    rules
}

/// All length-`n` tuples over `alphabet`, last position varying fastest.
fn combinations<S: Symbol>(alphabet: &[S], n: usize) -> Vec<Vec<S>> {
    let mut out = vec![Vec::new()];
    for _ in 0..n {
        let mut next = Vec::with_capacity(out.len() * alphabet.len());
        for prefix in &out {
            for symbol in alphabet {
                let mut tuple = prefix.clone();
                tuple.push(symbol.clone());
                next.push(tuple);
            }
        }
        out = next;
    }
    out
}
