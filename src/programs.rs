//! A small library of ready-made machines: the classic construction
//! exercises, used both as consumer-facing examples and as the workloads
//! the compiler round-trip tests run.

use std::collections::HashMap;

use crate::binarize::Bit;
use crate::machine::Machine;
use crate::multitape::{expand_partial, MultitapeMachine, PartialRule};
use crate::shorthand::{flatten, Key, Target};
use crate::types::{Direction, Write};

/// Two states, three symbols: writes an `a`, then bounces right replacing
/// `a` with `b` until it walks back onto a `b` and halts.
pub fn simple() -> Machine<&'static str, char> {
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

/// Turing's alternating printer: writes `0 _ 1 _ 0 _ 1 ...` forever, using
/// non-writing transitions for the gap cells. Run it with a step bound.
pub fn repeat() -> Machine<char, char> {
    let rules = flatten(vec![
        (
            'b',
            vec![(Key::One('_'), Target::to('c', Write::Put('0'), Direction::Right))],
        ),
        (
            'c',
            vec![(Key::One('_'), Target::to('e', Write::Keep, Direction::Right))],
        ),
        (
            'e',
            vec![(Key::One('_'), Target::to('f', Write::Put('1'), Direction::Right))],
        ),
        (
            'f',
            vec![(Key::One('_'), Target::to('b', Write::Keep, Direction::Right))],
        ),
    ]);
    Machine::new(rules, 'b', '_')
}

/// Adds one to a most-significant-bit-first binary number.
///
/// Scans to the number's end, then resolves the carry leftwards. The
/// operand must contain a zero bit; on an all-ones input the carry walks
/// off the left end and the machine halts with the cells zeroed.
pub fn increment() -> Machine<&'static str, char> {
    let rules = flatten(vec![
        (
            "scan",
            vec![
                (Key::Set(vec!['0', '1']), Target::mv(Direction::Right)),
                (Key::One('_'), Target::to("carry", Write::Keep, Direction::Left)),
            ],
        ),
        (
            "carry",
            vec![
                (Key::One('1'), Target::same(Write::Put('0'), Direction::Left)),
                (Key::One('0'), Target::to("done", Write::Put('1'), Direction::Stay)),
            ],
        ),
    ]);
    Machine::new(rules, "scan", '_')
}

/// Duplicates a block of ones over the binary alphabet: `1^n` becomes
/// `1^n 0 1^n`.
///
/// Works by cycling one source cell at a time: blank it out as a marker,
/// carry a one past the separator to the copy's end, then walk back,
/// restore the marker, and advance to the next source cell.
pub fn copy_ones() -> Machine<&'static str, Bit> {
    let rules = flatten(vec![
        (
            "mark",
            vec![(Key::One(1), Target::to("carry", Write::Put(0), Direction::Right))],
        ),
        (
            "carry",
            vec![
                (Key::One(1), Target::mv(Direction::Right)),
                (Key::One(0), Target::to("paste", Write::Keep, Direction::Right)),
            ],
        ),
        (
            "paste",
            vec![
                (Key::One(1), Target::mv(Direction::Right)),
                (Key::One(0), Target::to("rewind", Write::Put(1), Direction::Left)),
            ],
        ),
        (
            "rewind",
            vec![
                (Key::One(1), Target::mv(Direction::Left)),
                (Key::One(0), Target::to("restore", Write::Keep, Direction::Left)),
            ],
        ),
        (
            "restore",
            vec![
                (Key::One(1), Target::mv(Direction::Left)),
                (Key::One(0), Target::to("mark", Write::Put(1), Direction::Right)),
            ],
        ),
    ]);
    Machine::new(rules, "mark", 0)
}

/// One operand digit carried in the adder's state: a bit, or the marker
/// that its operand is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Digit {
    /// A zero bit.
    Zero,
    /// A one bit.
    One,
    /// The operand has no digits left.
    End,
}

impl Digit {
    fn value(self) -> u8 {
        match self {
            Digit::One => 1,
            _ => 0,
        }
    }
}

/// Control states of the binary adder; each round consumes one digit of
/// each operand and appends one result digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddState {
    /// Walking left to the `#` anchor, carry in tow.
    SeekStart(u8),
    /// Scanning right for the first operand's next digit.
    ReadFirst(u8),
    /// First digit secured; heading for the `+`.
    GotFirst(u8, Digit),
    /// Scanning the second operand.
    ReadSecond(u8, Digit),
    /// Both digits secured; heading for the `=`.
    GotBoth(u8, Digit, Digit),
    /// Appending the sum digit after the written output.
    WriteResult(u8, Digit, Digit),
    /// Done.
    Stop,
}

/// Binary addition on a tape laid out as `# x-digits + y-digits =`, both
/// operands least-significant digit first, plus the input/output codec for
/// that layout.
#[derive(Debug, Clone)]
pub struct AddMachine {
    machine: Machine<AddState, char>,
}

impl AddMachine {
    /// Builds the adder's rule table.
    pub fn new() -> Self {
        use AddState::*;
        let digits = [Digit::Zero, Digit::One, Digit::End];
        let mut groups: Vec<(AddState, Vec<(Key<char>, Target<AddState, char>)>)> = Vec::new();

        for carry in [0, 1] {
            groups.push((
                SeekStart(carry),
                vec![
                    (
                        Key::Set(vec!['0', '1', '+', '_', '=']),
                        Target::mv(Direction::Left),
                    ),
                    (
                        Key::One('#'),
                        Target::to(ReadFirst(carry), Write::Keep, Direction::Stay),
                    ),
                ],
            ));

            groups.push((
                ReadFirst(carry),
                vec![
                    (Key::Set(vec!['#', '_']), Target::mv(Direction::Right)),
                    (
                        Key::One('0'),
                        Target::to(GotFirst(carry, Digit::Zero), Write::Put('_'), Direction::Right),
                    ),
                    (
                        Key::One('1'),
                        Target::to(GotFirst(carry, Digit::One), Write::Put('_'), Direction::Right),
                    ),
                    // First operand exhausted.
                    (
                        Key::One('+'),
                        Target::to(ReadSecond(carry, Digit::End), Write::Keep, Direction::Right),
                    ),
                ],
            ));

            for first in digits {
                groups.push((
                    GotFirst(carry, first),
                    vec![
                        (Key::Set(vec!['0', '1', '_']), Target::mv(Direction::Right)),
                        (
                            Key::One('+'),
                            Target::to(ReadSecond(carry, first), Write::Keep, Direction::Right),
                        ),
                    ],
                ));
            }

            for first in digits {
                groups.push((
                    ReadSecond(carry, first),
                    vec![
                        (Key::One('_'), Target::mv(Direction::Right)),
                        (
                            Key::One('0'),
                            Target::to(
                                GotBoth(carry, first, Digit::Zero),
                                Write::Put('_'),
                                Direction::Right,
                            ),
                        ),
                        (
                            Key::One('1'),
                            Target::to(
                                GotBoth(carry, first, Digit::One),
                                Write::Put('_'),
                                Direction::Right,
                            ),
                        ),
                        // Second operand exhausted.
                        (
                            Key::One('='),
                            Target::to(
                                WriteResult(carry, first, Digit::End),
                                Write::Keep,
                                Direction::Right,
                            ),
                        ),
                    ],
                ));
            }

            for first in digits {
                for second in digits {
                    groups.push((
                        GotBoth(carry, first, second),
                        vec![
                            (Key::Set(vec!['0', '1']), Target::mv(Direction::Right)),
                            (
                                Key::One('='),
                                Target::to(
                                    WriteResult(carry, first, second),
                                    Write::Keep,
                                    Direction::Right,
                                ),
                            ),
                        ],
                    ));

                    let sum = first.value() + second.value() + carry;
                    let digit = if sum % 2 == 0 { '0' } else { '1' };
                    let next_carry = sum / 2;
                    let finished = first == Digit::End && second == Digit::End;
                    let target = if finished {
                        Target::to(Stop, Write::Put(digit), Direction::Stay)
                    } else {
                        Target::to(SeekStart(next_carry), Write::Put(digit), Direction::Stay)
                    };
                    groups.push((
                        WriteResult(carry, first, second),
                        vec![
                            (Key::Set(vec!['0', '1']), Target::mv(Direction::Right)),
                            (Key::One('_'), target),
                        ],
                    ));
                }
            }
        }

        AddMachine {
            machine: Machine::new(flatten(groups), SeekStart(0), '_'),
        }
    }

    /// The underlying machine.
    pub fn machine(&self) -> &Machine<AddState, char> {
        &self.machine
    }

    /// Lays `x + y` out on a tape: `#`, then each operand's binary digits
    /// least-significant first, separated by `+` and closed with `=`.
    pub fn encode_input(&self, x: u64, y: u64) -> Vec<char> {
        let mut tape = vec!['#'];
        tape.extend(format!("{x:b}").chars().rev());
        tape.push('+');
        tape.extend(format!("{y:b}").chars().rev());
        tape.push('=');
        tape
    }

    /// Reads the sum back off an output tape: the digits left on it,
    /// least-significant first.
    pub fn decode_output(&self, tape: &[char]) -> u64 {
        tape.iter()
            .rev()
            .filter(|cell| matches!(**cell, '0' | '1'))
            .fold(0, |acc, cell| (acc << 1) | u64::from(*cell == '1'))
    }

    /// Convenience: encode, run, decode.
    pub fn add(&self, x: u64, y: u64) -> u64 {
        let out = self.machine.run(&self.encode_input(x, y), 0, None);
        self.decode_output(&out)
    }
}

impl Default for AddMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// A three-tape palindrome recognizer over `base`: tape 0 holds the input
/// after a `start` marker, tape 1 receives a working copy, and tape 2 gets
/// `1` or `0` in its first cell for the verdict.
///
/// Rules are written as partial per-tape requirements and expanded over the
/// alphabet; the final verdict rule is the wildcard fallback that fires
/// whenever the forward and backward scans disagree.
pub fn palindrome(
    base: &[char],
    start: char,
    empty: char,
) -> MultitapeMachine<&'static str, char> {
    let rule = |read: Option<HashMap<usize, char>>,
                next: &'static str,
                write: HashMap<usize, char>,
                dirs: HashMap<usize, Direction>| {
        let read = read.map(|mut read| {
            // Tape 2 is only ever read blank; pinning it keeps the
            // expansion from enumerating the alphabet over it.
            read.entry(2).or_insert(empty);
            read
        });
        PartialRule {
            read,
            next,
            write,
            dirs,
        }
    };

    let mut copy = vec![rule(
        Some(HashMap::from([(0, empty), (1, empty)])),
        "left",
        HashMap::new(),
        HashMap::from([(0, Direction::Left)]),
    )];
    let mut left = vec![rule(
        Some(HashMap::from([(0, start), (1, empty)])),
        "test",
        HashMap::new(),
        HashMap::from([(0, Direction::Right), (1, Direction::Left)]),
    )];
    let mut test = vec![rule(
        Some(HashMap::from([(0, empty), (1, start)])),
        "stop",
        HashMap::from([(2, '1')]),
        HashMap::new(),
    )];
    for &s in base {
        copy.push(rule(
            Some(HashMap::from([(0, s), (1, empty)])),
            "copy",
            HashMap::from([(1, s)]),
            HashMap::from([(0, Direction::Right), (1, Direction::Right)]),
        ));
        left.push(rule(
            Some(HashMap::from([(0, s), (1, empty)])),
            "left",
            HashMap::new(),
            HashMap::from([(0, Direction::Left)]),
        ));
        test.push(rule(
            Some(HashMap::from([(0, s), (1, s)])),
            "test",
            HashMap::new(),
            HashMap::from([(0, Direction::Right), (1, Direction::Left)]),
        ));
    }
    // Mismatch fallback.
    test.push(rule(None, "stop", HashMap::from([(2, '0')]), HashMap::new()));

    let groups = vec![
        (
            "init",
            vec![rule(
                Some(HashMap::from([(0, start), (1, empty)])),
                "copy",
                HashMap::from([(1, start)]),
                HashMap::from([(0, Direction::Right), (1, Direction::Right)]),
            )],
        ),
        ("copy", copy),
        ("left", left),
        ("test", test),
    ];

    let mut alphabet = vec![start, empty];
    alphabet.extend(base);
    let rules = expand_partial(&alphabet, 3, groups);
    MultitapeMachine::new(3, rules, "init", empty)
        .expect("partial expansion emits one entry per tape")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binarize::BinEncoder;

    #[test]
    fn test_repeat_prints_alternating_bits() {
        let machine = repeat();
        let tape = machine.run(&[], 0, Some(9));
        assert_eq!(
            tape[..9],
            ['0', '_', '1', '_', '0', '_', '1', '_', '0']
        );
    }

    #[test]
    fn test_increment() {
        let machine = increment();
        let tape = machine.run(&['1', '0', '1'], 0, None);
        assert_eq!(tape[..3], ['1', '1', '0']);

        let tape = machine.run(&['0'], 0, None);
        assert_eq!(tape[..1], ['1']);
    }

    #[test]
    fn test_binarized_increment() {
        let machine = increment();
        let encoder = BinEncoder::new(&machine);
        let compiled = encoder.encode_machine();

        let bits = encoder.encode_input(&['1', '0', '1']).unwrap();
        let out = compiled.run(&bits, 0, None);
        let decoded = encoder.decode_output(&out).unwrap();
        assert_eq!(decoded[..3], ['1', '1', '0']);
    }

    #[test]
    fn test_copy_ones() {
        let machine = copy_ones();
        assert_eq!(
            machine.run(&[1, 1, 1, 1], 0, None),
            vec![1, 1, 1, 1, 0, 1, 1, 1, 1]
        );
        assert_eq!(machine.run(&[1], 0, None), vec![1, 0, 1]);
        assert_eq!(machine.run(&[], 0, None), vec![0]);
    }

    #[test]
    fn test_addition_over_a_range() {
        let adder = AddMachine::new();
        for x in 0..30 {
            for y in 0..30 {
                assert_eq!(adder.add(x, y), x + y, "{x} + {y}");
            }
        }
    }

    #[test]
    fn test_binarized_addition() {
        let adder = AddMachine::new();
        let encoder = BinEncoder::new(adder.machine());
        let compiled = encoder.encode_machine();

        for (x, y) in [(0, 0), (3, 5), (13, 17), (29, 29)] {
            let bits = encoder.encode_input(&adder.encode_input(x, y)).unwrap();
            let out = compiled.run(&bits, 0, None);
            let decoded = encoder.decode_output(&out).unwrap();
            assert_eq!(adder.decode_output(&decoded), x + y, "{x} + {y}");
        }
    }

    #[test]
    fn test_palindrome_verdicts() {
        let letters: Vec<char> = ('a'..='z').chain('A'..='Z').collect();
        let machine = palindrome(&letters, '>', '_');

        let expected = [
            ("abba", '1'),
            ("abbc", '0'),
            ("", '1'),
            ("dadda", '0'),
            ("daddad", '1'),
            ("VV", '1'),
        ];
        for (word, verdict) in expected {
            let mut tape0 = vec!['>'];
            tape0.extend(word.chars());
            let tapes = machine
                .run(&[tape0, vec![], vec![]], None, None)
                .unwrap();
            assert_eq!(tapes[2][0], verdict, "word {word:?}");
        }
    }

    #[test]
    fn test_simple_machine_halts() {
        let machine = simple();
        assert_eq!(machine.run(&[], 0, None), vec!['b', 'b', 'a']);
    }
}
