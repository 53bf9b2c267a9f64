//! A toolkit for constructing, executing, and transforming Turing machines.
//!
//! The classical computability reductions, as runnable code: any machine
//! over an arbitrary alphabet can be compiled to a binary-alphabet machine
//! ([`binarize`]), any multi-tape machine can be compiled to a single-tape
//! machine ([`emulate`]), and one fixed three-tape machine ([`universal`])
//! runs any encoded binary machine on any encoded input. The interpreters
//! the compilers target live in [`machine`] and [`multitape`]; both support
//! wildcard reads and non-writing rules, which the compiled machines lean
//! on heavily.

pub mod binarize;
pub mod emulate;
pub mod machine;
pub mod multitape;
pub mod parser;
pub mod programs;
pub mod shorthand;
pub mod types;
pub mod universal;

/// Re-exports the `Rule` enum the `pest` grammar generates for the program
/// format parser.
pub use crate::parser::Rule;
/// Re-exports the alphabet binarizer.
pub use binarize::{BinEncoder, BinState, Bit};
/// Re-exports the multi-tape emulator.
pub use emulate::{Cell, EmuState, Emulator};
/// Re-exports the single-tape interpreter.
pub use machine::{Execution, Machine, StepResult};
/// Re-exports the multi-tape interpreter and the partial-rule layer.
pub use multitape::{expand_partial, MultiExecution, MultitapeMachine, PartialRule};
/// Re-exports the program-format parser entry point.
pub use parser::parse;
/// Re-exports the adder with its tape codec.
pub use programs::AddMachine;
/// Re-exports the rule shorthand layer.
pub use shorthand::{flatten, Key, Target};
/// Re-exports the core vocabulary types.
pub use types::{
    Action, Direction, MachineError, MultiAction, MultiRules, Read, ReadHeads, Rules, State,
    Symbol, Write,
};
/// Re-exports the universal machine and its codec.
pub use universal::{decode, encode, encode_program, Utm, UtmState, UTM};
