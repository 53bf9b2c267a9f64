//! Compiles a single-tape machine over an arbitrary alphabet into a
//! behaviorally equivalent machine over bits.
//!
//! Every source symbol becomes a fixed-width block of bits (most significant
//! first), with the source empty symbol at index 0 so fresh all-zero cells
//! decode back to it. One source step becomes a macro-step of the compiled
//! machine: read the block bit-by-bit into the state, write the new block
//! back-to-front, then walk a whole block in the source move direction.

use std::collections::{HashMap, HashSet};

use crate::machine::Machine;
use crate::types::{Action, Direction, MachineError, Read, Rules, State, Symbol, Write};

/// A tape symbol of a binarized machine.
pub type Bit = u8;

/// State family of a binarized machine: a phase tag around the source state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BinState<Q> {
    /// Between macro-steps; the head is on the first bit of a block.
    Regular(Q),
    /// Reading the block; carries the bits seen so far.
    Reading(Q, Vec<Bit>),
    /// Writing the new block back-to-front; carries the bits still to write
    /// and the pending block move, which disambiguates states that write the
    /// same block but then move differently.
    Writing(Q, Vec<Write<Bit>>, isize),
    /// Walking the head a block at a time; carries the remaining signed
    /// distance in cells.
    Moving(Q, isize),
}

/// Compiler from an arbitrary-alphabet machine to a bit machine, together
/// with the input/output codec for its tapes.
///
/// The alphabet is collected from the source rules in table order (empty
/// symbol first), so equal machines compile to identical bit machines.
#[derive(Debug, Clone)]
pub struct BinEncoder<Q, S> {
    machine: Machine<Q, S>,
    states: Vec<Q>,
    alphabet: Vec<S>,
    symbol_index: HashMap<S, usize>,
    block_size: usize,
}

impl<Q: State, S: Symbol> BinEncoder<Q, S> {
    /// Prepares a compiler for `machine`, enumerating its states and
    /// alphabet.
    pub fn new(machine: &Machine<Q, S>) -> Self {
        let mut states = vec![machine.init_state().clone()];
        let mut alphabet = vec![machine.empty_symbol().clone()];
        let mut seen_states: HashSet<Q> = states.iter().cloned().collect();
        let mut seen_symbols: HashSet<S> = alphabet.iter().cloned().collect();

        for ((state, read), action) in machine.rules().iter() {
            for q in [state, &action.next] {
                if seen_states.insert(q.clone()) {
                    states.push(q.clone());
                }
            }
            let mut note = |symbol: &S| {
                if seen_symbols.insert(symbol.clone()) {
                    alphabet.push(symbol.clone());
                }
            };
            if let Read::Exact(symbol) = read {
                note(symbol);
            }
            if let Write::Put(symbol) = &action.write {
                note(symbol);
            }
        }

        let symbol_index = alphabet
            .iter()
            .enumerate()
            .map(|(index, symbol)| (symbol.clone(), index))
            .collect();
        let bits_needed = usize::BITS - (alphabet.len() - 1).leading_zeros();
        let block_size = (bits_needed as usize).max(1);

        BinEncoder {
            machine: machine.clone(),
            states,
            alphabet,
            symbol_index,
            block_size,
        }
    }

    /// Width of one symbol block, in bits. At least 1.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The collected alphabet, empty symbol first.
    pub fn alphabet(&self) -> &[S] {
        &self.alphabet
    }

    fn encode_symbol(&self, symbol: &S) -> Result<Vec<Bit>, MachineError> {
        let index = *self
            .symbol_index
            .get(symbol)
            .ok_or_else(|| MachineError::UnknownSymbol(format!("{symbol:?}")))?;
        Ok((0..self.block_size)
            .rev()
            .map(|bit| ((index >> bit) & 1) as Bit)
            .collect())
    }

    fn decode_symbol(&self, block: &[Bit]) -> Result<S, MachineError> {
        let mut index = 0usize;
        for &bit in block {
            if bit > 1 {
                return Err(MachineError::BadEncoding(format!("stray cell {bit}")));
            }
            index = (index << 1) | bit as usize;
        }
        self.alphabet
            .get(index)
            .cloned()
            .ok_or_else(|| MachineError::BadEncoding(format!("block index {index} out of range")))
    }

    /// Encodes a source tape as the concatenation of its symbol blocks.
    pub fn encode_input(&self, tape: &[S]) -> Result<Vec<Bit>, MachineError> {
        let mut out = Vec::with_capacity(tape.len() * self.block_size);
        for symbol in tape {
            out.extend(self.encode_symbol(symbol)?);
        }
        Ok(out)
    }

    /// Decodes a bit tape back to source symbols, block by block. A trailing
    /// partial block (from tape growth mid-walk) is dropped.
    pub fn decode_output(&self, tape: &[Bit]) -> Result<Vec<S>, MachineError> {
        tape.chunks_exact(self.block_size)
            .map(|block| self.decode_symbol(block))
            .collect()
    }

    /// Compiles the source machine into its bit-alphabet equivalent.
    ///
    /// Wildcard source rules are compiled by giving every alphabet symbol
    /// without a concrete rule its own read path into the wildcard's target;
    /// `Keep` writes become blocks of `Keep` bits, so the bits that were
    /// read stay untouched.
    pub fn encode_machine(&self) -> Machine<BinState<Q>, Bit> {
        let block = self.block_size;
        let mut rules: Rules<BinState<Q>, Bit> = Rules::new();

        // Phase glue: a single wildcard rule that changes only the state.
        fn switch<Q: State>(rules: &mut Rules<BinState<Q>, Bit>, from: BinState<Q>, to: BinState<Q>) {
            rules.insert(
                from,
                Read::Any,
                Action {
                    next: to,
                    write: Write::Keep,
                    dir: Direction::Stay,
                },
            );
        }

        for state in &self.states {
            switch(
                &mut rules,
                BinState::Regular(state.clone()),
                BinState::Reading(state.clone(), Vec::new()),
            );
        }

        // Every (state, concrete symbol) pair the compiled machine must
        // handle: the source's concrete rules in table order, then one
        // synthesized entry per symbol a wildcard rule covers.
        let source = self.machine.rules();
        let mut pairs: Vec<(&Q, &S, &Action<Q, S>)> = Vec::new();
        for ((state, read), action) in source.iter() {
            if let Read::Exact(symbol) = read {
                pairs.push((state, symbol, action));
            }
        }
        for ((state, read), action) in source.iter() {
            if matches!(read, Read::Any) {
                for symbol in &self.alphabet {
                    if source.get_exact(state, symbol).is_none() {
                        pairs.push((state, symbol, action));
                    }
                }
            }
        }

        let mut seen_moves: Vec<(Q, isize)> = Vec::new();
        let mut seen_set: HashSet<(Q, isize)> = HashSet::new();

        for (state, symbol, action) in pairs {
            let bits = self
                .encode_symbol(symbol)
                .expect("alphabet symbols always encode");

            // Read the block, accumulating bits into the state; the head
            // ends on the block's last bit.
            for index in 0..block {
                let dir = if index + 1 < block {
                    Direction::Right
                } else {
                    Direction::Stay
                };
                rules.insert(
                    BinState::Reading(state.clone(), bits[..index].to_vec()),
                    Read::Exact(bits[index]),
                    Action {
                        next: BinState::Reading(state.clone(), bits[..=index].to_vec()),
                        write: Write::Keep,
                        dir,
                    },
                );
            }

            let to_write: Vec<Write<Bit>> = match &action.write {
                Write::Put(new_symbol) => self
                    .encode_symbol(new_symbol)
                    .expect("alphabet symbols always encode")
                    .into_iter()
                    .map(Write::Put)
                    .collect(),
                Write::Keep => vec![Write::Keep; block],
            };
            let to_move = action.dir.offset() * block as isize;
            let next = action.next.clone();

            switch(
                &mut rules,
                BinState::Reading(state.clone(), bits),
                BinState::Writing(next.clone(), to_write.clone(), to_move),
            );

            // Write the block back-to-front; the head ends on its first bit.
            let mut suffix = to_write;
            while let Some(write) = suffix.pop() {
                let dir = if suffix.is_empty() {
                    Direction::Stay
                } else {
                    Direction::Left
                };
                let mut full = suffix.clone();
                full.push(write.clone());
                rules.insert(
                    BinState::Writing(next.clone(), full, to_move),
                    Read::Any,
                    Action {
                        next: BinState::Writing(next.clone(), suffix.clone(), to_move),
                        write,
                        dir,
                    },
                );
            }

            switch(
                &mut rules,
                BinState::Writing(next.clone(), Vec::new(), to_move),
                BinState::Moving(next.clone(), to_move),
            );
            if seen_set.insert((next.clone(), to_move)) {
                seen_moves.push((next, to_move));
            }
        }

        // Walk chains: one cell per step towards the target block start.
        for (state, distance) in seen_moves {
            let mut remaining = distance;
            while remaining != 0 {
                let (dir, step) = if remaining > 0 {
                    (Direction::Right, 1)
                } else {
                    (Direction::Left, -1)
                };
                rules.insert(
                    BinState::Moving(state.clone(), remaining),
                    Read::Any,
                    Action {
                        next: BinState::Moving(state.clone(), remaining - step),
                        write: Write::Keep,
                        dir,
                    },
                );
                remaining -= step;
            }
            switch(
                &mut rules,
                BinState::Moving(state.clone(), 0),
                BinState::Regular(state),
            );
        }

        Machine::new(rules, BinState::Regular(self.machine.init_state().clone()), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shorthand::{flatten, Key, Target};

    /// Trims trailing empty symbols for comparisons up to tape growth.
    fn trimmed<S: Symbol>(mut tape: Vec<S>, empty: &S) -> Vec<S> {
        while tape.last() == Some(empty) {
            tape.pop();
        }
        tape
    }

    fn simple_machine() -> Machine<&'static str, char> {
        let rules = flatten(vec![
            (
                "INIT",
                vec![(
                    Key::One('_'),
                    Target::to("WORK", Write::Put('a'), Direction::Right),
                )],
            ),
            (
                "WORK",
                vec![
                    (
                        Key::One('a'),
                        Target::same(Write::Put('b'), Direction::Right),
                    ),
                    (
                        Key::One('_'),
                        Target::same(Write::Put('a'), Direction::Left),
                    ),
                ],
            ),
        ]);
        Machine::new(rules, "INIT", '_')
    }

    #[test]
    fn test_alphabet_has_empty_first() {
        let encoder = BinEncoder::new(&simple_machine());
        assert_eq!(encoder.alphabet()[0], '_');
        assert_eq!(encoder.block_size(), 2);
    }

    #[test]
    fn test_blocks_are_msb_first() {
        let encoder = BinEncoder::new(&simple_machine());
        // '_' -> 0, 'a' -> 1, 'b' -> 2.
        assert_eq!(encoder.encode_input(&['_', 'a', 'b']).unwrap(), vec![0, 0, 0, 1, 1, 0]);
        assert_eq!(
            encoder.decode_output(&[0, 0, 0, 1, 1, 0]).unwrap(),
            vec!['_', 'a', 'b']
        );
    }

    #[test]
    fn test_decode_drops_trailing_partial_block() {
        let encoder = BinEncoder::new(&simple_machine());
        assert_eq!(encoder.decode_output(&[0, 1, 1]).unwrap(), vec!['a']);
    }

    #[test]
    fn test_encode_input_rejects_unknown_symbols() {
        let encoder = BinEncoder::new(&simple_machine());
        assert!(matches!(
            encoder.encode_input(&['z']),
            Err(MachineError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_decode_rejects_out_of_range_blocks() {
        let encoder = BinEncoder::new(&simple_machine());
        assert!(matches!(
            encoder.decode_output(&[1, 1]),
            Err(MachineError::BadEncoding(_))
        ));
    }

    #[test]
    fn test_round_trip_simple_machine() {
        let machine = simple_machine();
        let direct = machine.run(&[], 0, None);

        let encoder = BinEncoder::new(&machine);
        let compiled = encoder.encode_machine();
        let bits = compiled.run(&encoder.encode_input(&[]).unwrap(), 0, None);
        let decoded = encoder.decode_output(&bits).unwrap();

        assert_eq!(trimmed(decoded, &'_'), trimmed(direct, &'_'));
    }

    #[test]
    fn test_round_trip_preserves_wildcard_priority() {
        // The wildcard disagrees with the concrete rule; the compiled
        // machine must keep the same priority.
        let rules = flatten(vec![(
            "q",
            vec![
                (
                    Key::One('a'),
                    Target::to("stop", Write::Put('X'), Direction::Stay),
                ),
                (
                    Key::Any,
                    Target::to("stop", Write::Put('Y'), Direction::Stay),
                ),
            ],
        )]);
        let machine = Machine::new(rules, "q", '_');
        let encoder = BinEncoder::new(&machine);
        let compiled = encoder.encode_machine();

        for input in [vec!['a'], vec!['X'], vec!['_']] {
            let direct = machine.run(&input, 0, None);
            let bits = compiled.run(&encoder.encode_input(&input).unwrap(), 0, None);
            let decoded = encoder.decode_output(&bits).unwrap();
            assert_eq!(
                trimmed(decoded, &'_'),
                trimmed(direct, &'_'),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_keep_write_restores_read_block() {
        // A wildcard rule that keeps the cell and moves right: the compiled
        // machine must leave every block intact.
        let rules = flatten(vec![(
            "skip",
            vec![(Key::Set(vec!['a', 'b']), Target::mv(Direction::Right))]
        )]);
        let machine = Machine::new(rules, "skip", '_');
        let encoder = BinEncoder::new(&machine);
        let compiled = encoder.encode_machine();

        let input = vec!['a', 'b', 'a'];
        let bits = compiled.run(&encoder.encode_input(&input).unwrap(), 0, None);
        let decoded = encoder.decode_output(&bits).unwrap();
        assert_eq!(trimmed(decoded, &'_'), input);
    }
}
