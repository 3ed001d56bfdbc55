//! Scenario file parsing.
//!
//! Scenarios are line oriented. Commas are cosmetic and stripped before
//! tokenizing:
//!
//! - `node <id> <x> <y> <energy>` places a node
//! - `bcst from <id>` schedules a data broadcast from that node
//! - a bare number sets the survival energy floor (the last one wins)

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use canopy_protocol::{NodeId, Position};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: blank lines are not allowed in scenarios")]
    BlankLine { line: usize },
    #[error("line {line}: `node` needs <id> <x> <y> <energy>")]
    MalformedNode { line: usize },
    #[error("line {line}: `bcst` needs an origin id")]
    MalformedBroadcast { line: usize },
    #[error("line {line}: `{token}` is not a number")]
    BadNumber { line: usize, token: String },
}

/// One `node` line, before the uniform radio range is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub position: Position,
    pub energy: f32,
}

/// Everything a scenario file declares, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimInput {
    pub nodes: Vec<NodeSpec>,
    pub broadcasts: Vec<NodeId>,
    pub min_energy: f32,
}

pub fn load(path: &Path) -> Result<SimInput, ParseError> {
    parse(&fs::read_to_string(path)?)
}

pub fn parse(text: &str) -> Result<SimInput, ParseError> {
    let mut input = SimInput::default();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let cleaned = raw.replace(',', "");
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();
        let Some((&first, rest)) = tokens.split_first() else {
            return Err(ParseError::BlankLine { line });
        };
        match first {
            "node" => {
                let &[id_token, x, y, energy] = rest else {
                    return Err(ParseError::MalformedNode { line });
                };
                input.nodes.push(NodeSpec {
                    id: node_id(id_token, line)?,
                    position: Position::new(number(x, line)?, number(y, line)?),
                    energy: number(energy, line)?,
                });
            }
            "bcst" => {
                // The origin id sits after the filler word, as in
                // `bcst from 3`.
                let origin = rest
                    .get(1)
                    .ok_or(ParseError::MalformedBroadcast { line })?;
                input.broadcasts.push(node_id(origin, line)?);
            }
            other => input.min_energy = number(other, line)?,
        }
    }
    Ok(input)
}

fn number(token: &str, line: usize) -> Result<f32, ParseError> {
    token.parse().map_err(|_| ParseError::BadNumber {
        line,
        token: token.to_string(),
    })
}

fn node_id(token: &str, line: usize) -> Result<NodeId, ParseError> {
    token
        .parse::<u32>()
        .map(NodeId::new)
        .map_err(|_| ParseError::BadNumber {
            line,
            token: token.to_string(),
        })
}
