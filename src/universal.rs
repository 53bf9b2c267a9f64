//! The fixed universal machine: a 3-tape machine over
//! `{_, 0, 1, -, >, /, #}` that simulates any bit-alphabet single-tape
//! machine. Its rules never depend on the simulated machine — only the
//! tapes do:
//!
//! - tape 0 holds the encoded rule list (`>` then
//!   `state1 _ r s d state2 _` per rule, `/`-separated, `#`-terminated),
//! - tape 1 holds the current simulated state as a binary index,
//! - tape 2 holds the simulated tape, whose empty symbol is `0`.
//!
//! Each simulated step is one LOOKUP (linear scan of tape 0 comparing
//! state and read symbol), one APPLY (write, move, copy the new state to
//! tape 1), and one RETURN (rewind tapes 0 and 1).

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::binarize::Bit;
use crate::machine::Machine;
use crate::multitape::MultitapeMachine;
use crate::types::{
    Direction, MachineError, MultiAction, MultiRules, Read, ReadHeads, State, Write,
};

/// The universal machine's tape alphabet.
pub const ALPHABET: [char; 7] = ['_', '0', '1', '-', '>', '/', '#'];

/// Symbols that can occur on the two work tapes.
const WORK_SYMBOLS: [char; 4] = ['>', '0', '1', '_'];

/// The closed control-state catalogue of the universal machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtmState {
    /// Advance all heads past the `>` sentinels.
    MainInit,
    /// Top of the step cycle: find the rule for (state, symbol).
    MainLookup,
    /// Carry out the matched rule.
    MainApply,
    /// Rewind tapes 0 and 1 for the next cycle.
    MainReturn,

    /// Skip to the start of the next rule.
    LookupSearch,
    /// Compare the rule's state index against tape 1.
    LookupCheck,
    /// State matched; compare the rule's read symbol against tape 2.
    LookupFoundState,

    /// Write the rule's output symbol to tape 2.
    ApplyWrite,
    /// Decode the rule's move and shift tape 2's head.
    ApplyMove,
    /// Replace tape 1's content with the rule's target state.
    ApplyChangeState,

    /// Rewind tape 0 to its sentinel.
    Return0,
    /// Rewind tape 1 to its sentinel, then step both off it.
    Return1,

    /// No outgoing rules; reaching it stops the machine.
    Halt,

    /// Scan tape 0 rightwards for `/` or `#`.
    FindNext,
    /// Rewind tape 1 to its sentinel before a comparison.
    CompareGoLeft,
    /// Bitwise comparison of tape 0 against tape 1.
    CompareCheck,
    /// One-cell move of tape 2's head, with tape growth and edge check.
    Move,
    /// Walk tape 1 to its right end before erasing.
    ChangeStateGoRight,
    /// Erase tape 1 back to the sentinel.
    ChangeStateErase,
    /// Copy the target state index from tape 0 to tape 1.
    ChangeStateCopy,
}

const R: Direction = Direction::Right;
const L: Direction = Direction::Left;
const S: Direction = Direction::Stay;
/// Leave every tape's cell as it is.
const KEEP3: [Option<char>; 3] = [None, None, None];
/// Leave every head where it is.
const STAY3: [Direction; 3] = [S, S, S];

struct Builder {
    rules: MultiRules<UtmState, char>,
}

impl Builder {
    /// Inserts one rule per combination of the wildcard slots: a read of
    /// `None` yields a single whole-tuple wildcard rule, and a `None` slot
    /// ranges over the tape's admissible symbols (the full alphabet on
    /// tape 0, the work symbols elsewhere). `None` write slots keep cells.
    fn switch(
        &mut self,
        from: UtmState,
        to: UtmState,
        read: Option<[Option<char>; 3]>,
        write: [Option<char>; 3],
        dirs: [Direction; 3],
    ) {
        let writes: Vec<Write<char>> = write
            .iter()
            .map(|slot| match slot {
                Some(symbol) => Write::Put(*symbol),
                None => Write::Keep,
            })
            .collect();
        let action = MultiAction {
            next: to,
            writes,
            dirs: dirs.to_vec(),
        };

        let Some(read) = read else {
            self.rules.insert(from, ReadHeads::Any, action);
            return;
        };
        let variants: Vec<Vec<char>> = read
            .iter()
            .enumerate()
            .map(|(tape, slot)| match slot {
                Some(symbol) => vec![*symbol],
                None if tape == 0 => ALPHABET.to_vec(),
                None => WORK_SYMBOLS.to_vec(),
            })
            .collect();
        for &c0 in &variants[0] {
            for &c1 in &variants[1] {
                for &c2 in &variants[2] {
                    self.rules
                        .insert(from, ReadHeads::Exact(vec![c0, c1, c2]), action.clone());
                }
            }
        }
    }

    fn build(mut self) -> MultitapeMachine<UtmState, char> {
        use UtmState::*;

        self.switch(MainInit, MainLookup, None, KEEP3, [R, R, R]);

        // Cycle invariant: entering MainLookup, heads 0 and 1 sit just past
        // their sentinels and head 2 is the simulated head.
        self.lookup(MainLookup, MainApply, Halt);
        self.apply(MainApply, MainReturn, Halt);
        self.ret(MainReturn, MainLookup);

        MultitapeMachine::new(3, self.rules, MainInit, '_')
            .expect("the fixed rule set has one entry per tape")
    }

    fn lookup(&mut self, enter: UtmState, exit_found: UtmState, exit_not_found: UtmState) {
        use UtmState::*;
        // Entering, head 0 is already on the first rule's state index.
        self.switch(enter, LookupCheck, None, KEEP3, STAY3);
        self.find_next_rule(LookupSearch, LookupCheck, exit_not_found);
        self.compare_states(LookupCheck, LookupFoundState, LookupSearch);
        self.compare_symbols(LookupFoundState, exit_found, LookupSearch);
    }

    fn find_next_rule(&mut self, enter: UtmState, exit_found: UtmState, exit_not_found: UtmState) {
        use UtmState::*;
        self.switch(enter, FindNext, None, KEEP3, STAY3);
        self.switch(FindNext, exit_not_found, Some([Some('#'), None, None]), KEEP3, STAY3);
        self.switch(FindNext, exit_found, Some([Some('/'), None, None]), KEEP3, [R, S, S]);
        self.switch(FindNext, FindNext, None, KEEP3, [R, S, S]);
    }

    fn compare_states(&mut self, enter: UtmState, exit_equal: UtmState, exit_not_equal: UtmState) {
        use UtmState::*;
        // Pre: head 0 on the rule's state index. Post on equality: head 0
        // just past the `_` delimiter, on the read symbol.
        self.switch(enter, CompareGoLeft, None, KEEP3, STAY3);
        self.switch(CompareGoLeft, CompareCheck, Some([None, Some('>'), None]), KEEP3, [S, R, S]);
        self.switch(CompareGoLeft, CompareGoLeft, None, KEEP3, [S, L, S]);

        for bit in ['0', '1'] {
            self.switch(CompareCheck, CompareCheck, Some([Some(bit), Some(bit), None]), KEEP3, [R, R, S]);
        }
        self.switch(CompareCheck, exit_equal, Some([Some('_'), Some('_'), None]), KEEP3, [R, S, S]);
        self.switch(CompareCheck, exit_not_equal, None, KEEP3, STAY3);
    }

    fn compare_symbols(&mut self, enter: UtmState, exit_equal: UtmState, exit_not_equal: UtmState) {
        // Pre: head 0 on the rule's read symbol; `-` matches anything.
        for bit in ['0', '1'] {
            self.switch(enter, exit_equal, Some([Some(bit), None, Some(bit)]), KEEP3, [R, S, S]);
        }
        self.switch(enter, exit_equal, Some([Some('-'), None, None]), KEEP3, [R, S, S]);
        self.switch(enter, exit_not_equal, None, KEEP3, STAY3);
    }

    fn apply(&mut self, enter: UtmState, exit: UtmState, exit_out_of_tape: UtmState) {
        use UtmState::*;
        // Pre: head 0 on the rule's written symbol.
        self.switch(enter, ApplyWrite, None, KEEP3, STAY3);
        self.write(ApplyWrite, ApplyMove);
        self.mv(ApplyMove, ApplyChangeState, exit_out_of_tape);
        self.change_state(ApplyChangeState, exit);
    }

    fn write(&mut self, enter: UtmState, exit: UtmState) {
        for bit in ['0', '1'] {
            self.switch(enter, exit, Some([Some(bit), None, None]), [None, None, Some(bit)], [R, S, S]);
        }
        self.switch(enter, exit, Some([Some('-'), None, None]), KEEP3, [R, S, S]);
    }

    fn mv(&mut self, enter: UtmState, exit: UtmState, exit_out_of_tape: UtmState) {
        use UtmState::*;
        self.switch(enter, Move, Some([Some('1'), None, None]), KEEP3, [R, S, R]);
        self.switch(enter, Move, Some([Some('-'), None, None]), KEEP3, [R, S, L]);
        self.switch(enter, Move, Some([Some('0'), None, None]), KEEP3, [R, S, S]);
        // Fresh cell: materialize the simulated empty symbol.
        self.switch(Move, exit, Some([None, None, Some('_')]), [None, None, Some('0')], STAY3);
        self.switch(Move, exit_out_of_tape, Some([None, None, Some('>')]), KEEP3, STAY3);
        self.switch(Move, exit, None, KEEP3, STAY3);
    }

    fn change_state(&mut self, enter: UtmState, exit: UtmState) {
        use UtmState::*;
        // Pre: head 0 on the start of the rule's target state index.
        self.switch(enter, ChangeStateGoRight, None, KEEP3, STAY3);
        self.switch(ChangeStateGoRight, ChangeStateErase, Some([None, Some('_'), None]), KEEP3, [S, L, S]);
        self.switch(ChangeStateGoRight, ChangeStateGoRight, None, KEEP3, [S, R, S]);

        self.switch(ChangeStateErase, ChangeStateCopy, Some([None, Some('>'), None]), KEEP3, [S, R, S]);
        self.switch(ChangeStateErase, ChangeStateErase, None, [None, Some('_'), None], [S, L, S]);

        self.switch(ChangeStateCopy, exit, Some([Some('_'), None, None]), KEEP3, STAY3);
        for bit in ['0', '1'] {
            self.switch(ChangeStateCopy, ChangeStateCopy, Some([Some(bit), None, None]), [None, Some(bit), None], [R, R, S]);
        }
    }

    fn ret(&mut self, enter: UtmState, exit: UtmState) {
        use UtmState::*;
        self.switch(enter, Return0, None, KEEP3, STAY3);
        self.switch(Return0, Return1, Some([Some('>'), None, None]), KEEP3, STAY3);
        self.switch(Return0, Return0, None, KEEP3, [L, S, S]);

        self.switch(Return1, exit, Some([Some('>'), Some('>'), None]), KEEP3, [R, R, S]);
        self.switch(Return1, Return1, None, KEEP3, [S, L, S]);
    }
}

/// The universal machine itself. The rules are fixed; feed it encoded
/// machines and inputs via [`encode`] or [`Utm::simulate`].
#[derive(Debug, Clone)]
pub struct Utm {
    machine: MultitapeMachine<UtmState, char>,
}

impl Utm {
    /// Builds the fixed rule set.
    pub fn new() -> Self {
        Utm {
            machine: Builder {
                rules: MultiRules::new(),
            }
            .build(),
        }
    }

    /// The underlying 3-tape machine.
    pub fn machine(&self) -> &MultitapeMachine<UtmState, char> {
        &self.machine
    }

    /// Encodes `machine` and `input`, runs the universal machine to
    /// completion, and decodes the simulated tape. Diverges if the
    /// simulated machine does.
    pub fn simulate<Q: State>(
        &self,
        machine: &Machine<Q, Bit>,
        input: &[Bit],
    ) -> Result<Vec<Bit>, MachineError> {
        let tapes = encode(machine, input)?;
        let out = self.machine.run(&tapes, None, None)?;
        decode(&out)
    }
}

impl Default for Utm {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// The fixed universal machine, built once on first use.
    pub static ref UTM: Utm = Utm::new();
}

fn bit_char(bit: Bit) -> Result<char, MachineError> {
    match bit {
        0 => Ok('0'),
        1 => Ok('1'),
        other => Err(MachineError::BadEncoding(format!("non-bit symbol {other}"))),
    }
}

fn index_bits(index: usize) -> impl Iterator<Item = char> {
    format!("{index:b}").chars().collect::<Vec<_>>().into_iter()
}

/// Encodes a bit machine's rule table in the tape-0 program format, without
/// the leading `>`.
///
/// The machine's initial state gets index 0 (so tape 1 starts as `0`), and
/// concrete-read rules are laid out before wildcard rules so the linear
/// lookup scan reproduces their priority. Fails with
/// [`MachineError::EmptyNotZero`] unless the machine's empty symbol is `0`.
pub fn encode_program<Q: State>(machine: &Machine<Q, Bit>) -> Result<Vec<char>, MachineError> {
    if *machine.empty_symbol() != 0 {
        return Err(MachineError::EmptyNotZero);
    }

    let mut state_index: HashMap<Q, usize> = HashMap::new();
    state_index.insert(machine.init_state().clone(), 0);
    for ((state, _), action) in machine.rules().iter() {
        for q in [state, &action.next] {
            let next_index = state_index.len();
            state_index.entry(q.clone()).or_insert(next_index);
        }
    }

    let mut concrete = Vec::new();
    let mut fallback = Vec::new();
    for ((state, read), action) in machine.rules().iter() {
        match read {
            Read::Exact(bit) => concrete.push((state, Some(*bit), action)),
            Read::Any => fallback.push((state, None, action)),
        }
    }

    let total = concrete.len() + fallback.len();
    let mut tape = Vec::new();
    for (position, (state, read, action)) in concrete.into_iter().chain(fallback).enumerate() {
        tape.extend(index_bits(state_index[state]));
        tape.push('_');
        tape.push(match read {
            Some(bit) => bit_char(bit)?,
            None => '-',
        });
        tape.push(match &action.write {
            Write::Put(bit) => bit_char(*bit)?,
            Write::Keep => '-',
        });
        tape.push(match action.dir {
            Direction::Right => '1',
            Direction::Stay => '0',
            Direction::Left => '-',
        });
        tape.extend(index_bits(state_index[&action.next]));
        tape.push('_');
        tape.push(if position + 1 == total { '#' } else { '/' });
    }
    Ok(tape)
}

/// Builds the three input tapes for the universal machine: the program, the
/// initial state index `0`, and the encoded input.
pub fn encode<Q: State>(
    machine: &Machine<Q, Bit>,
    input: &[Bit],
) -> Result<Vec<Vec<char>>, MachineError> {
    let mut program = vec!['>'];
    program.extend(encode_program(machine)?);

    let mut data = vec!['>'];
    for &bit in input {
        data.push(bit_char(bit)?);
    }

    Ok(vec![program, vec!['>', '0'], data])
}

/// Reads the simulated tape back out of the universal machine's tapes:
/// drops tape 2's sentinel and at most one trailing `_` left by tape
/// growth.
pub fn decode(tapes: &[Vec<char>]) -> Result<Vec<Bit>, MachineError> {
    let data = tapes
        .get(2)
        .ok_or_else(|| MachineError::BadEncoding("expected three tapes".into()))?;
    let mut cells = match data.split_first() {
        Some((&'>', rest)) => rest.to_vec(),
        _ => return Err(MachineError::BadEncoding("tape 2 has no sentinel".into())),
    };
    if cells.last() == Some(&'_') {
        cells.pop();
    }
    cells
        .into_iter()
        .map(|cell| match cell {
            '0' => Ok(0),
            '1' => Ok(1),
            other => Err(MachineError::BadEncoding(format!("stray cell {other:?}"))),
        })
        .collect()
}
