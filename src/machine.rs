//! The single-tape Turing machine interpreter. A [`Machine`] is an immutable
//! rule table plus its initial state and empty symbol; every run gets its own
//! mutable [`Execution`] context, so a machine can be run any number of times
//! (and concurrently) without interference.

use crate::types::{Direction, Rules, State, Symbol, Write};

/// Outcome of a single interpreter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A rule fired; the machine keeps going.
    Continue,
    /// No rule fired (or the head fell off the left end); the machine halted.
    Halt,
}

/// A deterministic single-tape Turing machine.
///
/// The tape is right-infinite: it starts at cell 0, grows on demand by
/// appending the empty symbol, and a move left of cell 0 halts the machine.
/// Halting is implicit — a state/symbol pair with no rule simply stops the
/// run and the tape is returned as-is.
#[derive(Debug, Clone)]
pub struct Machine<Q, S> {
    rules: Rules<Q, S>,
    init_state: Q,
    empty_symbol: S,
}

impl<Q: State, S: Symbol> Machine<Q, S> {
    /// Creates a machine from a rule table, an initial state, and the symbol
    /// used to fill newly materialized tape cells.
    ///
    /// The table is captured by value; later changes to the caller's copy
    /// (if any) do not affect the machine.
    pub fn new(rules: Rules<Q, S>, init_state: Q, empty_symbol: S) -> Self {
        Machine {
            rules,
            init_state,
            empty_symbol,
        }
    }

    /// The machine's rule table.
    pub fn rules(&self) -> &Rules<Q, S> {
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

    /// Runs the machine on `tape` until it halts or `max_steps` transitions
    /// have been attempted, and returns the final tape. Trailing empty
    /// symbols are not stripped.
    ///
    /// With `max_steps` of `Some(0)` the input tape comes back unchanged
    /// (apart from the guarantee that the cell under the head exists). Use
    /// [`Machine::start`] when you need to know whether the machine actually
    /// halted.
    pub fn run(&self, tape: &[S], head: usize, max_steps: Option<usize>) -> Vec<S> {
        let mut exec = self.start(tape, head);
        exec.run(max_steps);
        exec.into_tape()
    }

    /// Creates a run context positioned at `head` on a copy of `tape`. The
    /// tape is extended with the empty symbol so the cell under the head
    /// exists; in particular an empty input becomes a one-cell tape.
    pub fn start(&self, tape: &[S], head: usize) -> Execution<'_, Q, S> {
        let mut tape = tape.to_vec();
        if head >= tape.len() {
            tape.resize(head + 1, self.empty_symbol.clone());
        }
        Execution {
            machine: self,
            state: self.init_state.clone(),
            tape,
            head,
            halted: false,
            steps: 0,
        }
    }
}

/// The mutable part of a run: current state, tape, head, halt flag, and the
/// number of steps taken. Holds a borrow of its machine.
#[derive(Debug)]
pub struct Execution<'m, Q, S> {
    machine: &'m Machine<Q, S>,
    state: Q,
    tape: Vec<S>,
    head: usize,
    halted: bool,
    steps: usize,
}

impl<Q: State, S: Symbol> Execution<'_, Q, S> {
    /// Performs one transition: look up `(state, symbol)` with wildcard
    /// fallback, write, switch state, move.
    ///
    /// Once halted, further calls return [`StepResult::Halt`] and change
    /// nothing.
    pub fn step(&mut self) -> StepResult {
        if self.halted {
            return StepResult::Halt;
        }
        self.steps += 1;

        let machine = self.machine;
        let Some(action) = machine.rules.lookup(&self.state, &self.tape[self.head]) else {
            self.halted = true;
            return StepResult::Halt;
        };

        if let Write::Put(symbol) = &action.write {
            self.tape[self.head] = symbol.clone();
        }
        self.state = action.next.clone();
        self.mv(action.dir)
    }

    fn mv(&mut self, dir: Direction) -> StepResult {
        match dir {
            Direction::Stay => StepResult::Continue,
            Direction::Left => {
                if self.head == 0 {
                    self.halted = true;
                    StepResult::Halt
                } else {
                    self.head -= 1;
                    StepResult::Continue
                }
            }
            Direction::Right => {
                self.head += 1;
                if self.head == self.tape.len() {
                    self.tape.push(self.machine.empty_symbol.clone());
                }
                StepResult::Continue
            }
        }
    }

    /// Steps until the machine halts or `max_steps` transitions have been
    /// attempted. With no bound this only returns if the machine halts.
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

    /// Current tape contents.
    pub fn tape(&self) -> &[S] {
        &self.tape
    }

    /// Current head position. Always less than the tape length.
    pub fn head(&self) -> usize {
        self.head
    }

    /// True once no rule fired or the head fell off the left end.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of transitions attempted so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Consumes the context and returns the tape.
    pub fn into_tape(self) -> Vec<S> {
        self.tape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Read};

    fn rule(
        state: &'static str,
        read: Read<char>,
        next: &'static str,
        write: Write<char>,
        dir: Direction,
    ) -> (&'static str, Read<char>, Action<&'static str, char>) {
        (state, read, Action { next, write, dir })
    }

    /// A machine that replaces `a` with `b`, moving right until the first
    /// empty cell, then halts.
    fn rewriter() -> Machine<&'static str, char> {
        let rules = Rules::from_iter([rule(
            "go",
            Read::Exact('a'),
            "go",
            Write::Put('b'),
            Direction::Right,
        )]);
        Machine::new(rules, "go", '_')
    }

    #[test]
    fn test_run_rewrites_until_halt() {
        let machine = rewriter();
        assert_eq!(machine.run(&['a', 'a', 'a'], 0, None), vec!['b', 'b', 'b', '_']);
    }

    #[test]
    fn test_empty_tape_is_extended_under_head() {
        let machine = rewriter();
        assert_eq!(machine.run(&[], 0, None), vec!['_']);

        let exec = machine.start(&[], 3);
        assert_eq!(exec.tape(), &['_', '_', '_', '_']);
    }

    #[test]
    fn test_max_steps_zero_and_one() {
        let machine = rewriter();
        assert_eq!(machine.run(&['a', 'a'], 0, Some(0)), vec!['a', 'a']);
        assert_eq!(machine.run(&['a', 'a'], 0, Some(1)), vec!['b', 'a']);
    }

    #[test]
    fn test_bounded_run_is_not_halted() {
        let machine = rewriter();
        let mut exec = machine.start(&['a', 'a'], 0);
        exec.run(Some(1));
        assert!(!exec.is_halted());
        exec.run(None);
        assert!(exec.is_halted());
        assert_eq!(exec.steps(), 3);
    }

    #[test]
    fn test_left_edge_halts() {
        let rules = Rules::from_iter([rule(
            "go",
            Read::Any,
            "go",
            Write::Put('x'),
            Direction::Left,
        )]);
        let machine = Machine::new(rules, "go", '_');
        let mut exec = machine.start(&['a', 'b'], 1);
        assert_eq!(exec.step(), StepResult::Continue);
        assert_eq!(exec.step(), StepResult::Halt);
        assert!(exec.is_halted());
        // Both cells were written before the run fell off the edge.
        assert_eq!(exec.tape(), &['x', 'x']);
    }

    #[test]
    fn test_exact_rule_beats_wildcard() {
        let rules = Rules::from_iter([
            rule("q", Read::Any, "q", Write::Put('Y'), Direction::Stay),
            rule("q", Read::Exact('a'), "q", Write::Put('X'), Direction::Stay),
        ]);
        let machine = Machine::new(rules, "q", '_');
        assert_eq!(machine.run(&['a'], 0, Some(1)), vec!['X']);
        assert_eq!(machine.run(&['b'], 0, Some(1)), vec!['Y']);
    }

    #[test]
    fn test_keep_leaves_cell_untouched() {
        let rules = Rules::from_iter([rule(
            "q",
            Read::Exact('a'),
            "done",
            Write::Keep,
            Direction::Right,
        )]);
        let machine = Machine::new(rules, "q", '_');
        assert_eq!(machine.run(&['a'], 0, None), vec!['a', '_']);
    }

    #[test]
    fn test_rules_are_captured_at_construction() {
        let mut rules = Rules::new();
        rules.insert(
            "go",
            Read::Exact('a'),
            Action {
                next: "go",
                write: Write::Put('b'),
                dir: Direction::Right,
            },
        );
        let machine = Machine::new(rules.clone(), "go", '_');

        // Redirecting the caller's copy must not affect the machine.
        rules.insert(
            "go",
            Read::Exact('a'),
            Action {
                next: "go",
                write: Write::Put('z'),
                dir: Direction::Right,
            },
        );
        assert_eq!(machine.run(&['a'], 0, None), vec!['b', '_']);
    }

    #[test]
    fn test_rerunning_on_output_changes_nothing() {
        let machine = rewriter();
        let out = machine.run(&['a', 'a'], 0, None);
        let again = machine.run(&out, 0, None);
        assert_eq!(again[..out.len()], out[..]);
    }
}
