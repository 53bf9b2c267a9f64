//! Parser for the compiled program format, utilizing the `pest` crate.
//! This is the inverse of [`universal::encode_program`](crate::universal::encode_program):
//! it reads a program string back into a runnable bit machine whose states
//! are the numeric indices the encoding assigned.

use pest::iterators::Pair;
use pest::Parser as PestParser;
use pest_derive::Parser as PestParser;

use crate::binarize::Bit;
use crate::machine::Machine;
use crate::types::{Action, Direction, MachineError, Read, Rules, Write};

/// Derives a `PestParser` for the program grammar in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct ProgramParser;

/// Parses a compiled program (including its leading `>`) into a bit
/// machine over numeric states, with state 0 initial and empty symbol `0`.
pub fn parse(input: &str) -> Result<Machine<u32, Bit>, MachineError> {
    let root = ProgramParser::parse(Rule::program, input.trim())
        .map_err(|error| MachineError::Parse(Box::new(error)))?
        .next()
        .expect("a successful parse has a program node");

    let mut rules: Rules<u32, Bit> = Rules::new();
    for section in root.into_inner() {
        if section.as_rule() != Rule::rule_list {
            continue; // EOI
        }
        for entry in section.into_inner() {
            let (state, read, action) = parse_entry(entry)?;
            rules.insert(state, read, action);
        }
    }
    Ok(Machine::new(rules, 0, 0))
}

fn parse_entry(entry: Pair<Rule>) -> Result<(u32, Read<Bit>, Action<u32, Bit>), MachineError> {
    let mut parts = entry.into_inner();
    let state = parse_index(&next_part(&mut parts)?)?;
    let read = match next_part(&mut parts)?.as_str() {
        "0" => Read::Exact(0),
        "1" => Read::Exact(1),
        _ => Read::Any,
    };
    let write = match next_part(&mut parts)?.as_str() {
        "0" => Write::Put(0),
        "1" => Write::Put(1),
        _ => Write::Keep,
    };
    let dir = match next_part(&mut parts)?.as_str() {
        "1" => Direction::Right,
        "0" => Direction::Stay,
        _ => Direction::Left,
    };
    let next = parse_index(&next_part(&mut parts)?)?;
    Ok((state, read, Action { next, write, dir }))
}

fn next_part<'i>(
    parts: &mut pest::iterators::Pairs<'i, Rule>,
) -> Result<Pair<'i, Rule>, MachineError> {
    parts
        .next()
        .ok_or_else(|| MachineError::BadEncoding("truncated rule".into()))
}

fn parse_index(pair: &Pair<Rule>) -> Result<u32, MachineError> {
    u32::from_str_radix(pair.as_str(), 2)
        .map_err(|_| MachineError::BadEncoding(format!("state index {} too wide", pair.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs;
    use crate::universal;

    #[test]
    fn test_parse_round_trips_with_encoder() {
        let copy = programs::copy_ones();
        let mut text = String::from(">");
        text.extend(universal::encode_program(&copy).unwrap());

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.rules().len(), copy.rules().len());
        assert_eq!(*parsed.init_state(), 0);

        // The parsed machine behaves like the original.
        let input = [1, 1, 1];
        assert_eq!(
            parsed.run(&input, 0, None),
            copy.run(&input, 0, None)
        );
    }

    #[test]
    fn test_parse_single_rule() {
        let machine = parse(">0_0111_#").unwrap();
        assert_eq!(machine.rules().len(), 1);
        let action = machine.rules().lookup(&0, &0).unwrap();
        assert_eq!(action.next, 1);
        assert_eq!(action.write, Write::Put(1));
        assert_eq!(action.dir, Direction::Right);
    }

    #[test]
    fn test_parse_wildcard_and_keep_markers() {
        let machine = parse(">10_---0_#").unwrap();
        let action = machine.rules().lookup(&2, &1).unwrap();
        assert_eq!(action.write, Write::Keep);
        assert_eq!(action.dir, Direction::Left);
        assert_eq!(action.next, 0);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(parse("junk"), Err(MachineError::Parse(_))));
        assert!(matches!(parse(">0_01"), Err(MachineError::Parse(_))));
        assert!(matches!(parse(""), Err(MachineError::Parse(_))));
    }

    #[test]
    fn test_parse_empty_program() {
        let machine = parse(">").unwrap();
        assert!(machine.rules().is_empty());
    }
}
