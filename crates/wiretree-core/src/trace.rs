//! Human-readable field trace.
//!
//! Each decoded field produces one line, indented by one tab per nesting
//! level:
//!
//! ```text
//! (1) Varint: 150
//! (2) embedded message:
//!     (1) string: hello
//! ```
//!
//! Traces are plain values: the decoder builds one per message scope and
//! splices a nested scope's trace in only once that scope parsed cleanly.

use crate::tree::{to_hex_pairs, FieldKind, Fixed32, Fixed64, Value};
use std::fmt;

/// A single trace line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    /// Nesting depth (number of leading tabs)
    pub depth: usize,
    /// Field number of the entry
    pub field_number: u32,
    /// Kind the entry was decoded as
    pub kind: FieldKind,
    /// Rendered value (empty for embedded messages)
    pub rendering: String,
}

impl TraceLine {
    /// Builds the line describing `value`
    pub fn new(depth: usize, field_number: u32, value: &Value) -> Self {
        Self {
            depth,
            field_number,
            kind: value.kind(),
            rendering: render_value(value),
        }
    }
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.depth {
            f.write_str("\t")?;
        }
        write!(f, "({}) {}:", self.field_number, self.kind.label())?;
        if !self.rendering.is_empty() {
            write!(f, " {}", self.rendering)?;
        }
        Ok(())
    }
}

/// Ordered trace lines for a decoded tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    lines: Vec<TraceLine>,
}

impl Trace {
    /// Creates an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one field
    pub fn push_field(&mut self, depth: usize, field_number: u32, value: &Value) {
        self.lines.push(TraceLine::new(depth, field_number, value));
    }

    /// Appends the lines of a nested scope
    pub fn extend(&mut self, nested: Trace) {
        self.lines.extend(nested.lines);
    }

    /// The recorded lines
    pub fn lines(&self) -> &[TraceLine] {
        &self.lines
    }

    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl IntoIterator for Trace {
    type Item = TraceLine;
    type IntoIter = std::vec::IntoIter<TraceLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Varint(v) => v.to_string(),
        Value::Fixed32(Fixed32::Float(float)) => {
            format!("0x{:x} / {:?}", float.to_bits(), float)
        }
        Value::Fixed32(Fixed32::Int(bits)) => format!("0x{:x}", bits),
        Value::Fixed64(Fixed64::Float(float)) => {
            format!("0x{:x} / {:?}", float.to_bits(), float)
        }
        Value::Fixed64(Fixed64::Int(bits)) => format!("0x{:x}", bits),
        Value::Message(_) => String::new(),
        Value::String(text) => text.clone(),
        Value::Repeated(values) => format!("{:?}", values),
        Value::Bytes(bytes) => to_hex_pairs(bytes),
    }
}
