//! SPICE netlist parsing for standard cell descriptions.
//!
//! Only the subset of SPICE needed to describe a transistor-level cell is supported:
//! `.subckt`/`.ends` blocks containing MOSFET (`M`) lines with optional `key=value`
//! parameters, comments, `+` line continuations and `*.PININFO` metadata.
//!
//! # Examples
//!
//! ```
//! use spice::Parser;
//!
//! let parsed = Parser::parse("* inverter\n.subckt inv a y vdd vss\nMN0 y a vss vss nch w=100n\n.ends\n").unwrap();
//! let inv = parsed.subckt("inv").unwrap();
//! assert_eq!(inv.ports.len(), 4);
//! assert_eq!(inv.components.len(), 1);
//! ```
#![warn(missing_docs)]

pub mod parser;
pub mod value;

pub use parser::{
    Ast, Component, Elem, Line, Mos, Node, Params, ParsedSpice, Parser, ParserError, PinDir,
    Subckt, Substr, Token, TokenizerError,
};
pub use value::parse_value;
