//! SPICE netlist parser.

mod lex;
#[cfg(test)]
mod tests;

use std::borrow::Borrow;
use std::fmt::Display;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use arcstr::ArcStr;
use indexmap::IndexMap;
use thiserror::Error;

use lex::Lexer;
pub use lex::{Token, TokenizerError};

/// The type representing nodes in a parsed SPICE circuit.
pub type Node = Substr;

/// A substring of the text being parsed.
#[derive(Clone, Default, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Substr(arcstr::Substr);

/// Parses SPICE netlists.
///
/// Parsing is line-oriented: each logical line is classified into a [`Line`]
/// and then fed to a two-state reader that is either at the top level or
/// inside a `.subckt` block.
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct Parser {
    ast: Ast,
    open: Option<Subckt>,
}

impl Parser {
    /// Parse the given file.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedSpice, ParserError> {
        let path = path.as_ref();
        tracing::debug!(?path, "reading SPICE file");
        let text = std::fs::read_to_string(path).map_err(|err| ParserError::FailedToRead {
            path: path.into(),
            err,
        })?;
        let mut parsed = Self::parse(ArcStr::from(text))?;
        parsed.root = Some(path.to_path_buf());
        Ok(parsed)
    }

    /// Parse the given string.
    pub fn parse(data: impl Into<Substr>) -> Result<ParsedSpice, ParserError> {
        let data = data.into();
        let name = data
            .lines()
            .next()
            .map(str::trim)
            .filter(|first| !first.is_empty())
            .map(ArcStr::from)
            .unwrap_or(arcstr::literal!("spice_library"));

        let mut parser = Self::default();
        let mut lexer = Lexer::new(&data);
        while let Some(tokens) = lexer.next_line()? {
            match classify(&tokens)? {
                Some(Line::End) => break,
                Some(line) => parser.accept(line)?,
                None => {}
            }
        }
        if let Some(subckt) = parser.open {
            return Err(ParserError::UnterminatedSubckt(subckt.name));
        }

        Ok(ParsedSpice {
            ast: parser.ast,
            root: None,
            name,
        })
    }

    fn accept(&mut self, line: Line) -> Result<(), ParserError> {
        if matches!(line, Line::EndSubckt) {
            let subckt = self
                .open
                .take()
                .ok_or_else(|| ParserError::UnexpectedLine(Box::new(Line::EndSubckt)))?;
            tracing::trace!(
                name = %subckt.name,
                components = subckt.components.len(),
                "parsed subcircuit"
            );
            self.ast.elems.push(Elem::Subckt(subckt));
            return Ok(());
        }

        match (&mut self.open, line) {
            (None, Line::SubcktDecl { name, ports }) => {
                self.open = Some(Subckt {
                    name,
                    ports,
                    ..Default::default()
                });
            }
            (None, Line::Component(c)) => self.ast.elems.push(Elem::Component(c)),
            (Some(subckt), Line::Component(c)) => subckt.components.push(c),
            (Some(subckt), Line::PinInfo(pins)) => {
                subckt.pin_info.get_or_insert_with(IndexMap::new).extend(pins);
            }
            (_, line) => return Err(ParserError::UnexpectedLine(Box::new(line))),
        }
        Ok(())
    }
}

fn invalid(tokens: &[Token], reason: impl Into<String>) -> ParserError {
    ParserError::InvalidLine {
        line: tokens.to_vec(),
        reason: reason.into(),
    }
}

/// Turns the tokens of one logical line into a [`Line`].
///
/// Returns `None` for lines that carry nothing of interest, such as unknown metadata.
fn classify(tokens: &[Token]) -> Result<Option<Line>, ParserError> {
    let line = match tokens {
        [] => return Ok(None),
        [Token::Directive(d), rest @ ..] => {
            if d.eq_ignore_ascii_case(".subckt") {
                // Anything from the first `name=value` on is a subcircuit parameter.
                let header = match rest.iter().position(|t| *t == Token::Equals) {
                    Some(i) => &rest[..i.saturating_sub(1)],
                    None => rest,
                };
                let [name, ports @ ..] = header else {
                    return Err(invalid(tokens, "missing subcircuit name"));
                };
                Line::SubcktDecl {
                    name: name.try_ident()?.clone(),
                    ports: ports
                        .iter()
                        .map(|t| t.try_ident().cloned())
                        .collect::<Result<_, _>>()?,
                }
            } else if d.eq_ignore_ascii_case(".ends") {
                Line::EndSubckt
            } else if d.eq_ignore_ascii_case(".end") {
                Line::End
            } else {
                return Err(ParserError::UnexpectedDirective(d.clone()));
            }
        }
        [Token::MetaDirective(d), rest @ ..] => {
            if !d.eq_ignore_ascii_case("pininfo") {
                return Ok(None);
            }
            let pins = rest
                .iter()
                .map(|t| {
                    let entry = t.try_ident()?;
                    pin_entry(entry)
                        .ok_or_else(|| invalid(tokens, format!("malformed pin info entry `{entry}`")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Line::PinInfo(pins)
        }
        [Token::Ident(name), rest @ ..] => {
            let kind = name.chars().next().unwrap_or_default().to_ascii_uppercase();
            if kind != 'M' {
                return Err(ParserError::UnexpectedComponentType(kind));
            }
            let [d, g, s, b, model, rest @ ..] = rest else {
                return Err(invalid(
                    tokens,
                    "MOSFETs must specify drain, gate, source, body and model",
                ));
            };
            Line::Component(Component::Mos(Mos {
                name: name.clone(),
                d: d.try_ident()?.clone(),
                g: g.try_ident()?.clone(),
                s: s.try_ident()?.clone(),
                b: b.try_ident()?.clone(),
                model: model.try_ident()?.clone(),
                params: params(tokens, rest)?,
            }))
        }
        [tok, ..] => return Err(ParserError::UnexpectedToken(tok.clone())),
    };
    Ok(Some(line))
}

/// Reads a run of `key=value` assignments.
fn params(line: &[Token], mut rest: &[Token]) -> Result<Params, ParserError> {
    let mut params = Params::new();
    while !rest.is_empty() {
        let [Token::Ident(k), Token::Equals, Token::Ident(v), tail @ ..] = rest else {
            return Err(invalid(line, "parameters must be of the form `key=value`"));
        };
        params.insert(k.clone(), v.clone());
        rest = tail;
    }
    Ok(params)
}

/// Splits a `name:dir` pin info entry.
fn pin_entry(entry: &Substr) -> Option<(Node, PinDir)> {
    let (name, dir) = entry.rsplit_once(':')?;
    let dir = match dir {
        "I" | "i" => PinDir::Input,
        "O" | "o" => PinDir::Output,
        "B" | "b" => PinDir::InOut,
        _ => return None,
    };
    (!name.is_empty()).then(|| (Substr(entry.substr_from(name)), dir))
}

/// A parsed SPICE netlist.
#[derive(Debug, Clone)]
pub struct ParsedSpice {
    /// The parsed contents.
    pub ast: Ast,
    /// The file the netlist was read from, if any.
    pub root: Option<PathBuf>,
    /// The first line of the input with whitespace trimmed, or `spice_library`
    /// if that line is blank.
    pub name: ArcStr,
}

impl ParsedSpice {
    /// Iterates over all subcircuits in the netlist.
    pub fn subckts(&self) -> impl Iterator<Item = &Subckt> {
        self.ast.elems.iter().filter_map(|elem| match elem {
            Elem::Subckt(s) => Some(s),
            Elem::Component(_) => None,
        })
    }

    /// Finds a subcircuit by case-insensitive name.
    pub fn subckt(&self, name: &str) -> Option<&Subckt> {
        self.subckts().find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// The top-level elements of a netlist.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Ast {
    /// Subcircuits and top-level components, in file order.
    pub elems: Vec<Elem>,
}

/// A logical line: one line of text plus any `+` continuations that follow it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Line {
    /// `.subckt name ports...`
    SubcktDecl {
        /// The name of the subcircuit.
        name: Substr,
        /// The nodes exposed by the subcircuit.
        ports: Vec<Node>,
    },
    /// A component instance.
    Component(Component),
    /// `.ends`
    EndSubckt,
    /// `*.PININFO` pin directions.
    PinInfo(Vec<(Node, PinDir)>),
    /// `.end`. Anything after it is ignored.
    End,
}

/// An element of a SPICE netlist.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Elem {
    /// A subcircuit definition.
    Subckt(Subckt),
    /// A component outside any subcircuit.
    Component(Component),
}

/// The direction of a pin declared in `*.PININFO` metadata.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PinDir {
    /// `:I`
    Input,
    /// `:O`
    Output,
    /// `:B`, used for bidirectional and supply pins.
    InOut,
}

/// A subcircuit definition.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Subckt {
    /// The subcircuit name.
    pub name: Substr,
    /// The nodes exposed by the subcircuit, in declaration order.
    pub ports: Vec<Node>,
    /// The components of the subcircuit.
    pub components: Vec<Component>,
    /// Pin directions, if the subcircuit carries `*.PININFO` metadata.
    pub pin_info: Option<IndexMap<Node, PinDir>>,
}

impl Subckt {
    /// Iterates over the MOSFETs of this subcircuit.
    pub fn mosfets(&self) -> impl Iterator<Item = &Mos> {
        self.components.iter().map(|c| match c {
            Component::Mos(m) => m,
        })
    }
}

/// A SPICE netlist component.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Component {
    /// A MOSFET (an `M` line).
    Mos(Mos),
}

/// A MOSFET instance: `M<name> d g s b model [key=value...]`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Mos {
    /// The instance name, including the leading `M`.
    pub name: Substr,
    /// The drain.
    pub d: Node,
    /// The gate.
    pub g: Node,
    /// The source.
    pub s: Node,
    /// The body.
    pub b: Node,
    /// The model name.
    pub model: Substr,
    /// Instance parameters.
    pub params: Params,
}

/// Instance parameters in declaration order.
///
/// Keys are matched case-insensitively.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Params {
    values: IndexMap<Substr, Substr>,
}

impl Params {
    /// Creates an empty parameter set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `k` to `v`.
    pub fn insert(&mut self, k: impl Into<Substr>, v: impl Into<Substr>) {
        self.values.insert(k.into(), v.into());
    }

    /// Looks up the value of `k`.
    pub fn get(&self, k: &str) -> Option<&Substr> {
        self.values
            .iter()
            .find_map(|(key, v)| key.eq_ignore_ascii_case(k).then_some(v))
    }

    /// Iterates over all key-value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Substr, &Substr)> {
        self.values.iter()
    }

    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An error arising from parsing a SPICE netlist.
#[derive(Debug, Error)]
pub enum ParserError {
    /// The text could not be split into tokens.
    #[error("tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),
    /// A line in the wrong context, such as `.ends` outside a subcircuit.
    #[error("unexpected line: {0:?}")]
    UnexpectedLine(Box<Line>),
    /// An unsupported directive.
    #[error("unexpected SPICE directive: {0}")]
    UnexpectedDirective(Substr),
    /// An unsupported component type.
    #[error("unexpected component type: {0}")]
    UnexpectedComponentType(char),
    /// A token where a name was expected.
    #[error("unexpected token: {0:?}")]
    UnexpectedToken(Token),
    /// A subcircuit was still open at the end of the input.
    #[error("subcircuit `{0}` is missing a matching `.ends`")]
    UnterminatedSubckt(Substr),
    /// A malformed line.
    #[error("invalid line `{line:?}`: {reason}")]
    InvalidLine {
        /// The tokens of the line.
        line: Vec<Token>,
        /// Why the line was rejected.
        reason: String,
    },
    /// The input file could not be read.
    #[error("failed to read file at path `{path:?}`: {err:?}")]
    FailedToRead {
        /// The path we attempted to read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

impl Deref for Substr {
    type Target = arcstr::Substr;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Substr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Substr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Substr {
    fn from(value: &str) -> Self {
        Self(arcstr::Substr::from(value))
    }
}

impl From<arcstr::Substr> for Substr {
    fn from(value: arcstr::Substr) -> Self {
        Self(value)
    }
}

impl From<ArcStr> for Substr {
    fn from(value: ArcStr) -> Self {
        Self(arcstr::Substr::full(value))
    }
}

impl From<Substr> for ArcStr {
    fn from(value: Substr) -> Self {
        ArcStr::from(value.as_str())
    }
}
