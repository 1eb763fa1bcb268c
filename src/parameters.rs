//! Block-structured runtime parameters.
//!
//! An input deck is a sequence of named blocks, each holding `key = value`
//! lines with optional trailing `# comment`s:
//!
//! ```text
//! <mesh>
//! nx1 = 64   # cells along x1
//! x1min = -1.0
//! label = "run #4"
//!
//! <output2>
//! file_type = rst
//! dt = 0.5
//! ```
//!
//! A value in double quotes may contain `#`; inside the quotes `\"` and `\\`
//! stand for a quote and a backslash. [`ParameterInput::dump`] writes the
//! same format back out, quoting where needed, terminated by a `<par_end>`
//! sentinel line; that text is the first section of every restart file.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;




/// Sentinel line that ends a parameter dump.
pub const PAR_END: &str = "<par_end>";




/// Errors that arise from reading or validating the input deck. These are
/// all raised before any file I/O is attempted on behalf of a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("missing parameter {block}/{key}")]
    Missing { block: String, key: String },

    #[error("parameter {block}/{key} = '{value}' is not a valid {expected}")]
    InvalidType { block: String, key: String, value: String, expected: &'static str },

    #[error("invalid value for {block}/{key}: {message}")]
    InvalidValue { block: String, key: String, message: String },

    #[error("{module} requires {prerequisite}")]
    MissingPrerequisite { module: &'static str, prerequisite: &'static str },

    #[error("conflicting input: {0}")]
    Conflict(String),

    #[error("malformed override '{0}' (expected block/key=value)")]
    Override(String),

    #[error("unable to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

impl ConfigError {
    pub fn invalid_value(block: &str, key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            block: block.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct InputLine {
    key: String,
    value: String,
    comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct InputBlock {
    name: String,
    lines: Vec<InputLine>,
}




/// The parsed input deck. Blocks and the lines within them keep their
/// original order, so that a dump of an unmodified deck reproduces it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterInput {
    blocks: Vec<InputBlock>,
}




// ============================================================================
impl ParameterInput {

    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an input deck from text. Parsing stops at a `<par_end>` line if
    /// one is present, so the parameter section of a restart file can be
    /// handed to this function directly.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut pin = Self::new();
        let mut current: Option<usize> = None;

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == PAR_END {
                break;
            }
            if let Some(name) = line.strip_prefix('<') {
                let name = name.strip_suffix('>').ok_or_else(|| ConfigError::Parse {
                    line: number + 1,
                    message: format!("unterminated block name '{}'", line),
                })?.trim();

                if name.is_empty() {
                    return Err(ConfigError::Parse { line: number + 1, message: "empty block name".into() });
                }
                current = Some(pin.block_index_or_insert(name));
                continue;
            }

            let block = current.ok_or_else(|| ConfigError::Parse {
                line: number + 1,
                message: "parameter appears before any <block>".into(),
            })?;

            let (key, rest) = line
                .split_once('=')
                .filter(|(key, _)| !key.contains('#'))
                .ok_or_else(|| ConfigError::Parse {
                    line: number + 1,
                    message: format!("expected key = value, found '{}'", line),
                })?;
            let key = key.trim();

            if key.is_empty() {
                return Err(ConfigError::Parse { line: number + 1, message: "empty parameter name".into() });
            }
            let (value, comment) = split_value(rest).map_err(|message| ConfigError::Parse { line: number + 1, message })?;
            pin.blocks[block].upsert(key, &value, comment);
        }
        Ok(pin)
    }

    /// Read and parse an input deck from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Apply a command-line override of the form `block/key=value`.
    pub fn apply_override(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (path, value) = spec.split_once('=').ok_or_else(|| ConfigError::Override(spec.into()))?;
        let (block, key) = path.split_once('/').ok_or_else(|| ConfigError::Override(spec.into()))?;

        if block.trim().is_empty() || key.trim().is_empty() {
            return Err(ConfigError::Override(spec.into()))
        }
        self.set_string(block.trim(), key.trim(), value.trim());
        Ok(())
    }

    /// Render the deck as text, terminated by the `<par_end>` sentinel.
    pub fn dump(&self) -> String {
        let mut text = String::new();

        for block in &self.blocks {
            let _ = writeln!(text, "<{}>", block.name);

            for line in &block.lines {
                let value = quote(&line.value);

                match &line.comment {
                    Some(comment) => { let _ = writeln!(text, "{} = {}  # {}", line.key, value, comment); }
                    None          => { let _ = writeln!(text, "{} = {}", line.key, value); }
                }
            }
        }
        let _ = writeln!(text, "{}", PAR_END);
        text
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.blocks.iter().any(|b| b.name == name)
    }

    pub fn has_parameter(&self, block: &str, key: &str) -> bool {
        self.find(block, key).is_some()
    }

    /// Return the block names in the order they first appeared.
    pub fn block_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.blocks.iter().map(|b| b.name.as_str())
    }

    pub fn get_string(&self, block: &str, key: &str) -> Result<&str, ConfigError> {
        self.find(block, key).ok_or_else(|| ConfigError::Missing {
            block: block.to_string(),
            key: key.to_string(),
        })
    }

    pub fn get_integer(&self, block: &str, key: &str) -> Result<i64, ConfigError> {
        let value = self.get_string(block, key)?;
        value.parse().map_err(|_| invalid_type(block, key, value, "integer"))
    }

    pub fn get_real(&self, block: &str, key: &str) -> Result<f64, ConfigError> {
        let value = self.get_string(block, key)?;
        value.parse().map_err(|_| invalid_type(block, key, value, "real number"))
    }

    pub fn get_boolean(&self, block: &str, key: &str) -> Result<bool, ConfigError> {
        let value = self.get_string(block, key)?;
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(invalid_type(block, key, value, "boolean")),
        }
    }

    /// Return a string parameter, or record the default in the deck and
    /// return that if the parameter is absent.
    pub fn get_or_add_string(&mut self, block: &str, key: &str, default: &str) -> String {
        match self.find(block, key) {
            Some(value) => value.to_string(),
            None => {
                self.set_string(block, key, default);
                default.to_string()
            }
        }
    }

    pub fn get_or_add_integer(&mut self, block: &str, key: &str, default: i64) -> Result<i64, ConfigError> {
        if !self.has_parameter(block, key) {
            self.set_integer(block, key, default)
        }
        self.get_integer(block, key)
    }

    pub fn get_or_add_real(&mut self, block: &str, key: &str, default: f64) -> Result<f64, ConfigError> {
        if !self.has_parameter(block, key) {
            self.set_real(block, key, default)
        }
        self.get_real(block, key)
    }

    pub fn get_or_add_boolean(&mut self, block: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
        if !self.has_parameter(block, key) {
            self.set_string(block, key, if default { "true" } else { "false" })
        }
        self.get_boolean(block, key)
    }

    /// Add or replace a parameter. A replaced parameter keeps its position
    /// and its comment.
    pub fn set_string(&mut self, block: &str, key: &str, value: &str) {
        let index = self.block_index_or_insert(block);
        self.blocks[index].upsert(key, value, None)
    }

    pub fn set_integer(&mut self, block: &str, key: &str, value: i64) {
        self.set_string(block, key, &value.to_string())
    }

    pub fn set_real(&mut self, block: &str, key: &str, value: f64) {
        self.set_string(block, key, &format!("{:?}", value))
    }

    fn find(&self, block: &str, key: &str) -> Option<&str> {
        self.blocks
            .iter()
            .find(|b| b.name == block)
            .and_then(|b| b.lines.iter().find(|l| l.key == key))
            .map(|l| l.value.as_str())
    }

    fn block_index_or_insert(&mut self, name: &str) -> usize {
        match self.blocks.iter().position(|b| b.name == name) {
            Some(index) => index,
            None => {
                self.blocks.push(InputBlock { name: name.to_string(), lines: Vec::new() });
                self.blocks.len() - 1
            }
        }
    }
}




// ============================================================================
impl InputBlock {
    fn upsert(&mut self, key: &str, value: &str, comment: Option<String>) {
        match self.lines.iter_mut().find(|l| l.key == key) {
            Some(line) => {
                line.value = value.to_string();
                if comment.is_some() {
                    line.comment = comment
                }
            }
            None => self.lines.push(InputLine {
                key: key.to_string(),
                value: value.to_string(),
                comment,
            }),
        }
    }
}

fn invalid_type(block: &str, key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidType {
        block: block.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}




/// Split the text after `=` into the value and an optional trailing comment.
fn split_value(rest: &str) -> Result<(String, Option<String>), String> {
    let rest = rest.trim();

    let (value, tail) = match rest.strip_prefix('"') {
        Some(quoted) => {
            let mut value = String::new();
            let mut chars = quoted.char_indices();
            let end = loop {
                match chars.next() {
                    Some((_, '\\')) => match chars.next() {
                        Some((_, c)) => value.push(c),
                        None => return Err("unterminated quoted value".into()),
                    },
                    Some((n, '"')) => break n + 1,
                    Some((_, c)) => value.push(c),
                    None => return Err("unterminated quoted value".into()),
                }
            };
            (value, quoted[end..].trim())
        }
        None => match rest.find('#') {
            Some(n) => (rest[..n].trim().to_string(), &rest[n..]),
            None => (rest.to_string(), ""),
        },
    };
    match tail.strip_prefix('#') {
        Some(comment) => Ok((value, Some(comment.trim().to_string()))),
        None if tail.is_empty() => Ok((value, None)),
        None => Err(format!("unexpected '{}' after quoted value", tail)),
    }
}

/// Quote a value if writing it bare would not parse back to the same string.
fn quote(value: &str) -> String {
    if value.contains('#') || value.starts_with('"') || value.trim() != value {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{ConfigError, ParameterInput, PAR_END};

    const DECK: &str = "
# a comment line
<mesh>
nx1 = 64     # cells along x1
x1min = -1.0

<output1>
file_type = rst
dt = 0.5
";

    #[test]
    fn parses_blocks_values_and_comments() {
        let pin = ParameterInput::parse(DECK).unwrap();
        assert_eq!(pin.get_integer("mesh", "nx1").unwrap(), 64);
        assert_eq!(pin.get_real("mesh", "x1min").unwrap(), -1.0);
        assert_eq!(pin.get_string("output1", "file_type").unwrap(), "rst");
        assert_eq!(pin.block_names().collect::<Vec<_>>(), vec!["mesh", "output1"]);
    }

    #[test]
    fn dump_round_trips_and_ends_with_sentinel() {
        let pin = ParameterInput::parse(DECK).unwrap();
        let text = pin.dump();
        assert!(text.ends_with(&format!("{}\n", PAR_END)));
        assert!(text.contains("nx1 = 64  # cells along x1"));
        assert_eq!(ParameterInput::parse(&text).unwrap(), pin);
    }

    #[test]
    fn parsing_stops_at_sentinel() {
        let pin = ParameterInput::parse("<a>\nx = 1\n<par_end>\ngarbage without block").unwrap();
        assert_eq!(pin.get_integer("a", "x").unwrap(), 1);
    }

    #[test]
    fn missing_and_mistyped_parameters_are_reported() {
        let pin = ParameterInput::parse(DECK).unwrap();
        assert!(matches!(pin.get_real("mesh", "x2min"), Err(ConfigError::Missing { .. })));
        assert!(matches!(pin.get_integer("output1", "file_type"), Err(ConfigError::InvalidType { .. })));
    }

    #[test]
    fn line_outside_block_is_a_parse_error() {
        assert!(matches!(ParameterInput::parse("x = 1"), Err(ConfigError::Parse { line: 1, .. })));
    }

    #[test]
    fn setting_real_values_round_trips_exactly() {
        let mut pin = ParameterInput::new();
        pin.set_real("output1", "last_time", 0.1 + 0.2);
        let reparsed = ParameterInput::parse(&pin.dump()).unwrap();
        assert_eq!(reparsed.get_real("output1", "last_time").unwrap(), 0.1 + 0.2);
    }

    #[test]
    fn overrides_replace_existing_values() {
        let mut pin = ParameterInput::parse(DECK).unwrap();
        pin.apply_override("mesh/nx1=32").unwrap();
        pin.apply_override("horizon/nlev=8").unwrap();
        assert_eq!(pin.get_integer("mesh", "nx1").unwrap(), 32);
        assert_eq!(pin.get_integer("horizon", "nlev").unwrap(), 8);
        assert!(pin.apply_override("nx1=3").is_err());
    }

    #[test]
    fn hashes_inside_quoted_values_survive_a_dump() {
        let mut pin = ParameterInput::parse("<job>\nlabel = \"run #4\"  # trailing\nplain = a#b\n").unwrap();
        assert_eq!(pin.get_string("job", "label").unwrap(), "run #4");
        assert_eq!(pin.get_string("job", "plain").unwrap(), "a");

        pin.set_string("job", "path", r#"C:\dir "x" #2"#);
        let text = pin.dump();
        assert!(text.contains(r#"label = "run #4"  # trailing"#));

        let reparsed = ParameterInput::parse(&text).unwrap();
        assert_eq!(reparsed, pin);
        assert_eq!(reparsed.get_string("job", "path").unwrap(), r#"C:\dir "x" #2"#);
        assert!(matches!(ParameterInput::parse("<a>\nx = \"open"), Err(ConfigError::Parse { line: 2, .. })));
    }
}
