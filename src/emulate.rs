//! Compiles a k-tape machine into a behaviorally equivalent single-tape
//! machine.
//!
//! Cell `j` of tape `t` lands at position `j*k + t` of the single tape; each
//! cell carries a head-flag, set exactly where the k virtual heads point.
//! One source step becomes a macro-step of four sweeps: collect the k
//! flagged symbols into the state (rightwards), write every flagged cell
//! (leftwards), relocate each flag a whole column (`k` cells) per virtual
//! move (rightwards), and walk back to the leftmost flag for the next
//! round. Writing and moving are separate sweeps on purpose: a move off the
//! left tape edge halts the machine, and by then every cell of the step
//! must already hold its new symbol, exactly as the direct multi-tape
//! interpreter writes all tapes before moving any head.
//!
//! The compiled rule set is generated by a worklist over the states that
//! are actually reachable from the initial one, rather than by blind
//! enumeration of every phase/payload combination.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::machine::Machine;
use crate::multitape::MultitapeMachine;
use crate::types::{Action, Direction, MachineError, Read, Rules, State, Symbol, Write};

/// One cell of the interleaved tape: the original symbol plus the head-flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell<S> {
    /// The symbol of the encoded virtual tape cell.
    pub symbol: S,
    /// True exactly when a virtual head points at this cell.
    pub flagged: bool,
}

impl<S> Cell<S> {
    /// A cell with no head on it.
    pub fn plain(symbol: S) -> Self {
        Cell {
            symbol,
            flagged: false,
        }
    }

    /// A cell a virtual head points at.
    pub fn under_head(symbol: S) -> Self {
        Cell {
            symbol,
            flagged: true,
        }
    }
}

/// A source transition captured in the compiled state while the write sweep
/// puts its k new symbols down.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteJob<Q, S> {
    next: Q,
    writes: Vec<Write<S>>,
    dirs: Vec<Direction>,
    written: Vec<bool>,
}

impl<Q, S> WriteJob<Q, S> {
    fn all_written(&self) -> bool {
        self.written.iter().all(|written| *written)
    }
}

/// What remains of a source transition once every cell is written: the
/// target state and the per-tape moves still to carry out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MoveJob<Q> {
    next: Q,
    dirs: Vec<Direction>,
    moved: Vec<bool>,
}

impl<Q> MoveJob<Q> {
    fn all_moved(&self) -> bool {
        self.moved.iter().all(|moved| *moved)
    }
}

/// State family of the compiled machine. `slot` is always the head's
/// position mod k, except while shuttling a flag (the excursion returns to
/// where it started, so the stored slot stays valid).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EmuState<Q, S> {
    /// Between macro-steps, parked on the leftmost flagged cell.
    Regular(Q, usize),
    /// Sweeping right matching flags against the concrete rules of `state`;
    /// `partial` holds the symbols observed so far, by tape.
    Reading {
        state: Q,
        partial: Vec<Option<S>>,
        slot: usize,
    },
    /// Sweeping right counting flags for a wildcard rule.
    ReadingAny { state: Q, seen: usize, slot: usize },
    /// Sweeping left writing every flagged cell of the captured transition.
    /// No head moves happen in this phase, so once it starts, all k writes
    /// land even if a later move dies on the left tape edge.
    Writing { job: WriteJob<Q, S>, slot: usize },
    /// Sweeping right from the leftmost flag carrying out the moves.
    /// `behind` counts the flags strictly left of the head; the closing
    /// rewind uses it to find the leftmost flag again.
    Moving {
        job: MoveJob<Q>,
        slot: usize,
        behind: usize,
    },
    /// Carrying a flag a column away from its old cell.
    MovingOut {
        job: MoveJob<Q>,
        slot: usize,
        behind: usize,
        dir: Direction,
        remaining: usize,
    },
    /// Walking back to the cell the flag came from.
    MovingBack {
        job: MoveJob<Q>,
        slot: usize,
        behind: usize,
        dir: Direction,
        remaining: usize,
    },
    /// Walking left past `flags` flagged cells; the last one is the
    /// leftmost flag.
    Rewinding { state: Q, slot: usize, flags: usize },
    /// Walking right to the first flagged cell, which is the leftmost flag
    /// when none lie behind.
    Advancing { state: Q, slot: usize },
}

/// Compiler from a k-tape machine to a single-tape machine over flagged
/// cells, together with the tape codec.
#[derive(Debug, Clone)]
pub struct Emulator<Q, S> {
    machine: Machine<EmuState<Q, S>, Cell<S>>,
    tapes_count: usize,
    empty_symbol: S,
}

impl<Q: State, S: Symbol> Emulator<Q, S> {
    /// Compiles `source`, collecting the alphabet from its rules.
    pub fn new(source: &MultitapeMachine<Q, S>) -> Self {
        Self::with_alphabet(source, &[])
    }

    /// Compiles `source` with extra alphabet symbols that appear on input
    /// tapes but in no rule. Symbols outside the alphabet halt the compiled
    /// machine when a head reaches them, so list them here if you need them.
    pub fn with_alphabet(source: &MultitapeMachine<Q, S>, extra: &[S]) -> Self {
        let mut alphabet = vec![source.empty_symbol().clone()];
        let mut seen: HashSet<S> = alphabet.iter().cloned().collect();
        let note = |symbol: &S, alphabet: &mut Vec<S>, seen: &mut HashSet<S>| {
            if seen.insert(symbol.clone()) {
                alphabet.push(symbol.clone());
            }
        };
        for ((_, read), action) in source.rules().iter() {
            if let crate::types::ReadHeads::Exact(heads) = read {
                for symbol in heads {
                    note(symbol, &mut alphabet, &mut seen);
                }
            }
            for write in &action.writes {
                if let Write::Put(symbol) = write {
                    note(symbol, &mut alphabet, &mut seen);
                }
            }
        }
        for symbol in extra {
            note(symbol, &mut alphabet, &mut seen);
        }

        let generator = Generator {
            source,
            alphabet,
            k: source.tapes_count(),
        };
        let machine = generator.build();
        Emulator {
            machine,
            tapes_count: source.tapes_count(),
            empty_symbol: source.empty_symbol().clone(),
        }
    }

    /// The compiled single-tape machine.
    pub fn machine(&self) -> &Machine<EmuState<Q, S>, Cell<S>> {
        &self.machine
    }

    /// Number of virtual tapes.
    pub fn tapes_count(&self) -> usize {
        self.tapes_count
    }

    /// Interleaves k input tapes into one flagged tape, with every virtual
    /// head at column 0 (so the flags occupy the first column block).
    pub fn encode_tapes(&self, tapes: &[Vec<S>]) -> Result<Vec<Cell<S>>, MachineError> {
        if tapes.len() != self.tapes_count {
            return Err(MachineError::TapeCount {
                expected: self.tapes_count,
                found: tapes.len(),
            });
        }
        let columns = tapes.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut out = Vec::with_capacity(columns * self.tapes_count);
        for column in 0..columns {
            for tape in tapes {
                let symbol = tape
                    .get(column)
                    .cloned()
                    .unwrap_or_else(|| self.empty_symbol.clone());
                out.push(Cell {
                    symbol,
                    flagged: column == 0,
                });
            }
        }
        Ok(out)
    }

    /// De-interleaves a flagged tape back into k tapes, dropping the flags.
    /// A trailing incomplete column yields shorter later tapes, which is
    /// fine under trailing-empty tolerance.
    pub fn decode_tape(&self, tape: &[Cell<S>]) -> Vec<Vec<S>> {
        let mut tapes = vec![Vec::with_capacity(tape.len() / self.tapes_count); self.tapes_count];
        for (position, cell) in tape.iter().enumerate() {
            tapes[position % self.tapes_count].push(cell.symbol.clone());
        }
        tapes
    }
}

struct Generator<'a, Q, S> {
    source: &'a MultitapeMachine<Q, S>,
    alphabet: Vec<S>,
    k: usize,
}

type EmuRule<Q, S> = (Read<Cell<S>>, Action<EmuState<Q, S>, Cell<S>>);

impl<Q: State, S: Symbol> Generator<'_, Q, S> {
    fn build(&self) -> Machine<EmuState<Q, S>, Cell<S>> {
        let init = EmuState::Regular(self.source.init_state().clone(), 0);
        let mut rules: Rules<EmuState<Q, S>, Cell<S>> = Rules::new();
        let mut queue = VecDeque::from([init.clone()]);
        let mut seen: HashSet<EmuState<Q, S>> = HashSet::from([init.clone()]);

        while let Some(state) = queue.pop_front() {
            for (read, action) in self.transitions(&state) {
                if seen.insert(action.next.clone()) {
                    queue.push_back(action.next.clone());
                }
                rules.insert(state.clone(), read, action);
            }
        }

        let empty = Cell::plain(self.source.empty_symbol().clone());
        Machine::new(rules, init, empty)
    }

    fn next_slot(&self, slot: usize) -> usize {
        (slot + 1) % self.k
    }

    fn prev_slot(&self, slot: usize) -> usize {
        (slot + self.k - 1) % self.k
    }

    /// Does any concrete rule of `state` agree with the symbols observed so
    /// far?
    fn consistent(&self, state: &Q, partial: &[Option<S>]) -> bool {
        self.source.rules().exact_reads(state).any(|heads| {
            partial
                .iter()
                .zip(heads)
                .all(|(seen, expected)| seen.as_ref().is_none_or(|symbol| symbol == expected))
        })
    }

    /// The compiled transition taken when the flag of `slot` turns out to
    /// carry `symbol`, given what has been observed before it. `None` means
    /// the source machine has no rule to simulate: the compiled machine
    /// halts with the tape still encoding the pre-step configuration.
    fn after_flag(
        &self,
        state: &Q,
        mut partial: Vec<Option<S>>,
        slot: usize,
        symbol: &S,
    ) -> Option<Action<EmuState<Q, S>, Cell<S>>> {
        partial[slot] = Some(symbol.clone());
        let filled = partial.iter().filter(|seen| seen.is_some()).count();

        if filled == self.k {
            let heads: Vec<S> = partial.into_iter().map(Option::unwrap).collect();
            let action = self.source.rules().lookup(state, &heads)?;
            return Some(self.start_write(action, slot));
        }
        if self.consistent(state, &partial) {
            return Some(Action {
                next: EmuState::Reading {
                    state: state.clone(),
                    partial,
                    slot: self.next_slot(slot),
                },
                write: Write::Keep,
                dir: Direction::Right,
            });
        }
        if self.source.rules().has_any(state) {
            return Some(Action {
                next: EmuState::ReadingAny {
                    state: state.clone(),
                    seen: filled,
                    slot: self.next_slot(slot),
                },
                write: Write::Keep,
                dir: Direction::Right,
            });
        }
        None
    }

    /// Captures a matched source transition; the write sweep starts on the
    /// current (rightmost-flag) cell, so the head stays put.
    fn start_write(
        &self,
        action: &crate::types::MultiAction<Q, S>,
        slot: usize,
    ) -> Action<EmuState<Q, S>, Cell<S>> {
        Action {
            next: EmuState::Writing {
                job: WriteJob {
                    next: action.next.clone(),
                    writes: action.writes.clone(),
                    dirs: action.dirs.clone(),
                    written: vec![false; self.k],
                },
                slot,
            },
            write: Write::Keep,
            dir: Direction::Stay,
        }
    }

    /// The transition leaving the write sweep from the leftmost flag: on to
    /// the move sweep, or straight back to `Regular` when every move is a
    /// stay.
    fn start_moves(&self, job: &WriteJob<Q, S>, slot: usize) -> EmuState<Q, S> {
        let moved: Vec<bool> = job
            .dirs
            .iter()
            .map(|dir| *dir == Direction::Stay)
            .collect();
        let move_job = MoveJob {
            next: job.next.clone(),
            dirs: job.dirs.clone(),
            moved,
        };
        if move_job.all_moved() {
            EmuState::Regular(move_job.next, slot)
        } else {
            EmuState::Moving {
                job: move_job,
                slot,
                behind: 0,
            }
        }
    }

    /// The transition closing the move sweep from the cell the last flag
    /// left: rewind left past the `behind` flags, or right to the first one
    /// when none lie behind.
    fn start_rewind(&self, next: &Q, slot: usize, behind: usize) -> (EmuState<Q, S>, Direction) {
        if behind > 0 {
            (
                EmuState::Rewinding {
                    state: next.clone(),
                    slot: self.prev_slot(slot),
                    flags: behind,
                },
                Direction::Left,
            )
        } else {
            (
                EmuState::Advancing {
                    state: next.clone(),
                    slot: self.next_slot(slot),
                },
                Direction::Right,
            )
        }
    }

    fn transitions(&self, state: &EmuState<Q, S>) -> Vec<EmuRule<Q, S>> {
        let mut out = Vec::new();
        match state {
            EmuState::Regular(q, slot) => {
                if !self.source.rules().has_state(q) {
                    return out; // halt state of the source machine
                }
                for symbol in &self.alphabet {
                    let partial = vec![None; self.k];
                    if let Some(action) = self.after_flag(q, partial, *slot, symbol) {
                        out.push((Read::Exact(Cell::under_head(symbol.clone())), action));
                    }
                }
            }

            EmuState::Reading { state: q, partial, slot } => {
                for symbol in &self.alphabet {
                    // Plain cells are skipped; flags fold their symbol in.
                    out.push((
                        Read::Exact(Cell::plain(symbol.clone())),
                        Action {
                            next: EmuState::Reading {
                                state: q.clone(),
                                partial: partial.clone(),
                                slot: self.next_slot(*slot),
                            },
                            write: Write::Keep,
                            dir: Direction::Right,
                        },
                    ));
                    if partial[*slot].is_none() {
                        if let Some(action) = self.after_flag(q, partial.clone(), *slot, symbol) {
                            out.push((Read::Exact(Cell::under_head(symbol.clone())), action));
                        }
                    }
                }
            }

            EmuState::ReadingAny { state: q, seen, slot } => {
                let Some(any) = self.source.rules().get_any(q) else {
                    return out;
                };
                for symbol in &self.alphabet {
                    out.push((
                        Read::Exact(Cell::plain(symbol.clone())),
                        Action {
                            next: EmuState::ReadingAny {
                                state: q.clone(),
                                seen: *seen,
                                slot: self.next_slot(*slot),
                            },
                            write: Write::Keep,
                            dir: Direction::Right,
                        },
                    ));
                    let action = if seen + 1 == self.k {
                        self.start_write(any, *slot)
                    } else {
                        Action {
                            next: EmuState::ReadingAny {
                                state: q.clone(),
                                seen: seen + 1,
                                slot: self.next_slot(*slot),
                            },
                            write: Write::Keep,
                            dir: Direction::Right,
                        }
                    };
                    out.push((Read::Exact(Cell::under_head(symbol.clone())), action));
                }
            }

            EmuState::Writing { job, slot } => {
                for symbol in &self.alphabet {
                    // Plain cells between flags are passed over.
                    out.push((
                        Read::Exact(Cell::plain(symbol.clone())),
                        Action {
                            next: EmuState::Writing {
                                job: job.clone(),
                                slot: self.prev_slot(*slot),
                            },
                            write: Write::Keep,
                            dir: Direction::Left,
                        },
                    ));
                    if job.written[*slot] {
                        // Each flag is visited once per sweep; a written one
                        // under the head means the tape is malformed.
                        continue;
                    }

                    let write = match &job.writes[*slot] {
                        Write::Put(new) => Write::Put(Cell::under_head(new.clone())),
                        Write::Keep => Write::Keep,
                    };
                    let mut written = job.written.clone();
                    written[*slot] = true;
                    let written_job = WriteJob {
                        written,
                        ..job.clone()
                    };
                    let action = if written_job.all_written() {
                        // The k-th write is the leftmost flag: the cell the
                        // move sweep starts from.
                        Action {
                            next: self.start_moves(&written_job, *slot),
                            write,
                            dir: Direction::Stay,
                        }
                    } else {
                        Action {
                            next: EmuState::Writing {
                                job: written_job,
                                slot: self.prev_slot(*slot),
                            },
                            write,
                            dir: Direction::Left,
                        }
                    };
                    out.push((Read::Exact(Cell::under_head(symbol.clone())), action));
                }
            }

            EmuState::Moving { job, slot, behind } => {
                for symbol in &self.alphabet {
                    out.push((
                        Read::Exact(Cell::plain(symbol.clone())),
                        Action {
                            next: EmuState::Moving {
                                job: job.clone(),
                                slot: self.next_slot(*slot),
                                behind: *behind,
                            },
                            write: Write::Keep,
                            dir: Direction::Right,
                        },
                    ));
                    let action = if job.moved[*slot] {
                        // A settled flag; passing it puts it behind us.
                        Action {
                            next: EmuState::Moving {
                                job: job.clone(),
                                slot: self.next_slot(*slot),
                                behind: behind + 1,
                            },
                            write: Write::Keep,
                            dir: Direction::Right,
                        }
                    } else {
                        // Pick the flag up and carry it a column over.
                        let dir = job.dirs[*slot];
                        Action {
                            next: EmuState::MovingOut {
                                job: job.clone(),
                                slot: *slot,
                                behind: *behind,
                                dir,
                                remaining: self.k - 1,
                            },
                            write: Write::Put(Cell::plain(symbol.clone())),
                            dir,
                        }
                    };
                    out.push((Read::Exact(Cell::under_head(symbol.clone())), action));
                }
            }

            EmuState::MovingOut { job, slot, behind, dir, remaining } => {
                if *remaining > 0 {
                    out.push((
                        Read::Any,
                        Action {
                            next: EmuState::MovingOut {
                                job: job.clone(),
                                slot: *slot,
                                behind: *behind,
                                dir: *dir,
                                remaining: remaining - 1,
                            },
                            write: Write::Keep,
                            dir: *dir,
                        },
                    ));
                } else {
                    // On the target cell of the same virtual tape: drop the
                    // flag here and head back.
                    let back = match dir {
                        Direction::Left => Direction::Right,
                        Direction::Right => Direction::Left,
                        Direction::Stay => unreachable!("no excursion for a stay move"),
                    };
                    for symbol in &self.alphabet {
                        out.push((
                            Read::Exact(Cell::plain(symbol.clone())),
                            Action {
                                next: EmuState::MovingBack {
                                    job: job.clone(),
                                    slot: *slot,
                                    behind: *behind,
                                    dir: *dir,
                                    remaining: self.k - 1,
                                },
                                write: Write::Put(Cell::under_head(symbol.clone())),
                                dir: back,
                            },
                        ));
                    }
                }
            }

            EmuState::MovingBack { job, slot, behind, dir, remaining } => {
                let back = match dir {
                    Direction::Left => Direction::Right,
                    Direction::Right => Direction::Left,
                    Direction::Stay => unreachable!("no excursion for a stay move"),
                };
                if *remaining > 0 {
                    out.push((
                        Read::Any,
                        Action {
                            next: EmuState::MovingBack {
                                job: job.clone(),
                                slot: *slot,
                                behind: *behind,
                                dir: *dir,
                                remaining: remaining - 1,
                            },
                            write: Write::Keep,
                            dir: back,
                        },
                    ));
                } else {
                    // Back on the cell the flag left. A flag carried left
                    // now sits behind the sweep; one carried right is ahead
                    // of it and gets passed (and counted) later.
                    let mut moved = job.moved.clone();
                    moved[*slot] = true;
                    let moved_job = MoveJob {
                        moved,
                        ..job.clone()
                    };
                    let behind = behind + usize::from(*dir == Direction::Left);
                    let action = if moved_job.all_moved() {
                        let (next, dir) = self.start_rewind(&moved_job.next, *slot, behind);
                        Action {
                            next,
                            write: Write::Keep,
                            dir,
                        }
                    } else {
                        Action {
                            next: EmuState::Moving {
                                job: moved_job,
                                slot: self.next_slot(*slot),
                                behind,
                            },
                            write: Write::Keep,
                            dir: Direction::Right,
                        }
                    };
                    out.push((Read::Any, action));
                }
            }

            EmuState::Rewinding { state: q, slot, flags } => {
                for symbol in &self.alphabet {
                    out.push((
                        Read::Exact(Cell::plain(symbol.clone())),
                        Action {
                            next: EmuState::Rewinding {
                                state: q.clone(),
                                slot: self.prev_slot(*slot),
                                flags: *flags,
                            },
                            write: Write::Keep,
                            dir: Direction::Left,
                        },
                    ));
                    let action = if *flags == 1 {
                        // The last flag on the way left is the leftmost.
                        Action {
                            next: EmuState::Regular(q.clone(), *slot),
                            write: Write::Keep,
                            dir: Direction::Stay,
                        }
                    } else {
                        Action {
                            next: EmuState::Rewinding {
                                state: q.clone(),
                                slot: self.prev_slot(*slot),
                                flags: flags - 1,
                            },
                            write: Write::Keep,
                            dir: Direction::Left,
                        }
                    };
                    out.push((Read::Exact(Cell::under_head(symbol.clone())), action));
                }
            }

            EmuState::Advancing { state: q, slot } => {
                for symbol in &self.alphabet {
                    out.push((
                        Read::Exact(Cell::plain(symbol.clone())),
                        Action {
                            next: EmuState::Advancing {
                                state: q.clone(),
                                slot: self.next_slot(*slot),
                            },
                            write: Write::Keep,
                            dir: Direction::Right,
                        },
                    ));
                    out.push((
                        Read::Exact(Cell::under_head(symbol.clone())),
                        Action {
                            next: EmuState::Regular(q.clone(), *slot),
                            write: Write::Keep,
                            dir: Direction::Stay,
                        },
                    ));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MultiAction, MultiRules, ReadHeads};

    fn trimmed<S: Symbol>(mut tape: Vec<S>, empty: &S) -> Vec<S> {
        while tape.last() == Some(empty) {
            tape.pop();
        }
        tape
    }

    fn assert_emulates<Q: State, S: Symbol>(
        source: &MultitapeMachine<Q, S>,
        inputs: &[Vec<S>],
        extra: &[S],
    ) {
        let expected = source.run(inputs, None, None).unwrap();

        let emulator = Emulator::with_alphabet(source, extra);
        let tape = emulator.encode_tapes(inputs).unwrap();
        let final_tape = emulator.machine().run(&tape, 0, None);
        let decoded = emulator.decode_tape(&final_tape);

        let empty = source.empty_symbol();
        for (tape_index, (got, want)) in decoded.iter().zip(&expected).enumerate() {
            assert_eq!(
                trimmed(got.clone(), empty),
                trimmed(want.clone(), empty),
                "tape {tape_index}"
            );
        }
    }

    /// Two tapes: copy the ones of tape 0 onto tape 1.
    fn copier() -> MultitapeMachine<&'static str, u8> {
        let mut rules = MultiRules::new();
        rules.insert(
            "copy",
            ReadHeads::Exact(vec![1, 0]),
            MultiAction {
                next: "copy",
                writes: vec![Write::Keep, Write::Put(1)],
                dirs: vec![Direction::Right, Direction::Right],
            },
        );
        MultitapeMachine::new(2, rules, "copy", 0).unwrap()
    }

    #[test]
    fn test_encode_layout_interleaves_with_flags() {
        let emulator = Emulator::new(&copier());
        let tape = emulator.encode_tapes(&[vec![1, 1], vec![]]).unwrap();
        assert_eq!(
            tape,
            vec![
                Cell::under_head(1),
                Cell::under_head(0),
                Cell::plain(1),
                Cell::plain(0),
            ]
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let emulator = Emulator::new(&copier());
        let tapes = vec![vec![1, 0, 1], vec![1]];
        let decoded = emulator.decode_tape(&emulator.encode_tapes(&tapes).unwrap());
        assert_eq!(decoded, vec![vec![1, 0, 1], vec![1, 0, 0]]);
    }

    #[test]
    fn test_emulated_copier_matches_source() {
        let source = copier();
        assert_emulates(&source, &[vec![1, 1, 1], vec![]], &[]);
        assert_emulates(&source, &[vec![], vec![]], &[]);
    }

    #[test]
    fn test_emulated_single_tape_machine() {
        // k = 1 exercises the degenerate column size.
        let mut rules = MultiRules::new();
        rules.insert(
            "flip",
            ReadHeads::Exact(vec![1]),
            MultiAction {
                next: "flip",
                writes: vec![Write::Put(0)],
                dirs: vec![Direction::Right],
            },
        );
        rules.insert(
            "flip",
            ReadHeads::Exact(vec![0]),
            MultiAction {
                next: "flip",
                writes: vec![Write::Put(1)],
                dirs: vec![Direction::Right],
            },
        );
        let source = MultitapeMachine::new(1, rules, "flip", 0).unwrap();
        // Runs forever on an unbounded tape, so compare bounded prefixes.
        let expected = source.run(&[vec![1, 0, 1]], None, Some(5)).unwrap();

        let emulator = Emulator::new(&source);
        let tape = emulator.encode_tapes(&[vec![1, 0, 1]]).unwrap();
        // One source step costs six compiled steps here, and later
        // macro-steps only touch cells further right.
        let mut exec = emulator.machine().start(&tape, 0);
        exec.run(Some(60));
        let decoded = emulator.decode_tape(exec.tape());
        assert_eq!(decoded[0][..4], expected[0][..4]);
    }

    #[test]
    fn test_typed_read_falls_back_to_wildcard() {
        let mut rules = MultiRules::new();
        rules.insert(
            "q",
            ReadHeads::Exact(vec!['a', 'a']),
            MultiAction {
                next: "matched",
                writes: vec![Write::Put('M'), Write::Put('M')],
                dirs: vec![Direction::Stay, Direction::Stay],
            },
        );
        rules.insert(
            "q",
            ReadHeads::Any,
            MultiAction {
                next: "missed",
                writes: vec![Write::Put('X'), Write::Keep],
                dirs: vec![Direction::Stay, Direction::Stay],
            },
        );
        let source = MultitapeMachine::new(2, rules, "q", '_').unwrap();

        // First flag already refutes the concrete rule.
        assert_emulates(&source, &[vec!['z'], vec!['a']], &['z']);
        // Only the second flag refutes it.
        assert_emulates(&source, &[vec!['a'], vec!['z']], &['z']);
        // The concrete rule matches outright.
        assert_emulates(&source, &[vec!['a'], vec!['a']], &[]);
    }

    #[test]
    fn test_underflow_halts_with_all_writes_applied() {
        // Tape 0's head falls off the left end while tape 1 moves right.
        // Both machines must still deliver both writes of the step.
        let mut rules = MultiRules::new();
        rules.insert(
            "q",
            ReadHeads::Any,
            MultiAction {
                next: "q",
                writes: vec![Write::Put('w'), Write::Put('v')],
                dirs: vec![Direction::Left, Direction::Right],
            },
        );
        let source = MultitapeMachine::new(2, rules, "q", '_').unwrap();

        let expected = source.run(&[vec!['a'], vec!['b']], None, None).unwrap();
        assert_eq!(expected, vec![vec!['w'], vec!['v']]);

        assert_emulates(&source, &[vec!['a'], vec!['b']], &['a', 'b']);
    }

    #[test]
    fn test_underflow_on_later_tape_keeps_earlier_write() {
        // The underflowing move belongs to tape 1, whose flag sits right of
        // tape 0's in the column block; tape 0's cell must keep its new
        // symbol anyway.
        let mut rules = MultiRules::new();
        rules.insert(
            "q",
            ReadHeads::Any,
            MultiAction {
                next: "q",
                writes: vec![Write::Put('x'), Write::Put('y')],
                dirs: vec![Direction::Stay, Direction::Left],
            },
        );
        let source = MultitapeMachine::new(2, rules, "q", '_').unwrap();

        let expected = source.run(&[vec!['a'], vec!['b']], None, None).unwrap();
        assert_eq!(expected, vec![vec!['x'], vec!['y']]);

        assert_emulates(&source, &[vec!['a'], vec!['b']], &['a', 'b']);
    }

    #[test]
    fn test_emulated_palindrome_recognizer() {
        let source = crate::programs::palindrome(&['a', 'b'], '>', '_');
        for (word, accepted) in [("aba", '1'), ("ab", '0'), ("", '1'), ("abba", '1')] {
            let mut tape0: Vec<char> = vec!['>'];
            tape0.extend(word.chars());
            let inputs = vec![tape0, vec![], vec![]];

            let expected = source.run(&inputs, None, None).unwrap();
            assert_eq!(expected[2][0], accepted, "source run of {word:?}");

            let emulator = Emulator::new(&source);
            let tape = emulator.encode_tapes(&inputs).unwrap();
            let final_tape = emulator.machine().run(&tape, 0, None);
            let decoded = emulator.decode_tape(&final_tape);
            assert_eq!(decoded[2][0], accepted, "emulated run of {word:?}");
        }
    }
}
