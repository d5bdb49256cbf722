//! Compact context encoding.
//!
//! Structured values are re-encoded before being embedded in a prompt. The
//! compact form is TOON-style: indentation instead of braces, array lengths
//! in headers, and uniform object arrays collapsed into a header plus one
//! comma-separated row per element:
//!
//! ```text
//! details:
//!   language: python
//! options[3]: A,B,C
//! cases[2]{input,output}:
//!   1,2
//!   "a, b",c
//! ```
//!
//! Encoding never fails from the caller's point of view. If the compact
//! encoder gives up, [`encode`] returns pretty-printed JSON with sorted keys.
//! [`decode`] accepts either form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::warn;

/// Maximum nesting depth the compact encoder and decoder accept.
pub const MAX_DEPTH: usize = 64;

const INDENT: &str = "  ";

/// Which encoding to use for problem context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextFormat {
    /// Compact TOON-style encoding, falling back to JSON.
    #[default]
    Toon,
    /// Always the generic pretty JSON form.
    Json,
}

impl ContextFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toon => "toon",
            Self::Json => "json",
        }
    }

    /// Label used when telling a model what it is reading.
    pub fn label(self) -> &'static str {
        match self {
            Self::Toon => "TOON",
            Self::Json => "JSON",
        }
    }
}

impl fmt::Display for ContextFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "toon" => Ok(Self::Toon),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown context format: {other}")),
        }
    }
}

/// Compact encoder/decoder faults. These never escape [`encode`] or [`decode`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unsupported input: {0}")]
    Unsupported(String),
}

/// Encode `value` in the compact form, falling back to pretty JSON.
pub fn encode(value: &Value) -> String {
    encode_with_format(value, ContextFormat::Toon).0
}

/// Encode `value` as requested. Returns the text and the format actually
/// produced, which is `Json` whenever the compact encoder gave up.
pub fn encode_with_format(value: &Value, format: ContextFormat) -> (String, ContextFormat) {
    match format {
        ContextFormat::Json => (pretty_json(value), ContextFormat::Json),
        ContextFormat::Toon => match encode_toon(value) {
            Ok(text) => (text, ContextFormat::Toon),
            Err(e) => {
                warn!(error = %e, "Compact encoding failed, falling back to JSON");
                (pretty_json(value), ContextFormat::Json)
            }
        },
    }
}

/// The generic structural serialization: indented JSON, keys sorted.
pub fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Decode either form. JSON is tried first.
pub fn decode(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }
    match decode_toon(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "Context decoding failed");
            None
        }
    }
}

// --- Encoding ---

/// Encode `value` in the compact form only.
pub fn encode_toon(value: &Value) -> Result<String, EncodeError> {
    let mut lines = Vec::new();
    match value {
        Value::Object(map) => encode_object(map, 0, 0, &mut lines)?,
        Value::Array(items) => encode_array(None, items, 0, 0, &mut lines)?,
        scalar => lines.push(encode_scalar(scalar)),
    }
    Ok(lines.join("\n"))
}

fn check_depth(depth: usize) -> Result<(), EncodeError> {
    if depth > MAX_DEPTH {
        Err(EncodeError::TooDeep)
    } else {
        Ok(())
    }
}

fn encode_object(
    map: &Map<String, Value>,
    level: usize,
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), EncodeError> {
    check_depth(depth)?;
    for (key, value) in map {
        encode_field(key, value, level, depth, lines)?;
    }
    Ok(())
}

fn encode_field(
    key: &str,
    value: &Value,
    level: usize,
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), EncodeError> {
    let ind = INDENT.repeat(level);
    match value {
        Value::Object(map) => {
            lines.push(format!("{ind}{}:", encode_key(key)));
            encode_object(map, level + 1, depth + 1, lines)
        }
        Value::Array(items) => encode_array(Some(key), items, level, depth + 1, lines),
        scalar => {
            lines.push(format!("{ind}{}: {}", encode_key(key), encode_scalar(scalar)));
            Ok(())
        }
    }
}

fn encode_array(
    key: Option<&str>,
    items: &[Value],
    level: usize,
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), EncodeError> {
    check_depth(depth)?;
    let ind = INDENT.repeat(level);
    let key = key.map(encode_key).unwrap_or_default();
    let n = items.len();

    if items.iter().all(is_primitive) {
        if n == 0 {
            lines.push(format!("{ind}{key}[0]:"));
        } else {
            lines.push(format!("{ind}{key}[{n}]: {}", encode_row(items.iter())));
        }
        return Ok(());
    }

    if let Some(fields) = tabular_fields(items) {
        let header: Vec<String> = fields.iter().map(|f| encode_key(f)).collect();
        lines.push(format!("{ind}{key}[{n}]{{{}}}:", header.join(",")));
        let row_ind = INDENT.repeat(level + 1);
        for item in items.iter().filter_map(Value::as_object) {
            let row = encode_row(fields.iter().map(|f| &item[*f]));
            lines.push(format!("{row_ind}{row}"));
        }
        return Ok(());
    }

    lines.push(format!("{ind}{key}[{n}]:"));
    for item in items {
        encode_list_item(item, level + 1, depth, lines)?;
    }
    Ok(())
}

fn encode_list_item(
    item: &Value,
    level: usize,
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), EncodeError> {
    let ind = INDENT.repeat(level);
    match item {
        Value::Object(map) if map.is_empty() => lines.push(format!("{ind}-")),
        Value::Object(map) => {
            let start = lines.len();
            encode_object(map, level + 1, depth + 1, lines)?;
            hyphenate(&mut lines[start], level);
        }
        Value::Array(inner) => {
            let start = lines.len();
            encode_array(None, inner, level + 1, depth + 1, lines)?;
            hyphenate(&mut lines[start], level);
        }
        scalar => lines.push(format!("{ind}- {}", encode_scalar(scalar))),
    }
    Ok(())
}

/// Replace the indentation of a line written at `level + 1` with a list
/// marker at `level`. Both prefixes have the same width.
fn hyphenate(line: &mut String, level: usize) {
    let width = INDENT.len() * (level + 1);
    line.replace_range(..width, &format!("{}- ", INDENT.repeat(level)));
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

/// Field names shared by every element, if `items` is a non-empty list of
/// non-empty objects with identical keys and primitive values.
fn tabular_fields(items: &[Value]) -> Option<Vec<&str>> {
    let first = items.first()?.as_object()?;
    if first.is_empty() {
        return None;
    }
    let fields: Vec<&str> = first.keys().map(String::as_str).collect();
    let uniform = items.iter().all(|item| {
        item.as_object().is_some_and(|obj| {
            obj.len() == fields.len()
                && fields
                    .iter()
                    .all(|f| obj.get(*f).is_some_and(is_primitive))
        })
    });
    uniform.then_some(fields)
}

fn encode_row<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values.map(encode_scalar).collect::<Vec<_>>().join(",")
}

fn encode_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => encode_string(s),
        other => other.to_string(),
    }
}

fn encode_key(key: &str) -> String {
    encode_string(key)
}

fn encode_string(s: &str) -> String {
    if needs_quotes(s) {
        Value::String(s.to_string()).to_string()
    } else {
        s.to_string()
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || s == "-"
        || s.starts_with("- ")
        || matches!(s, "true" | "false" | "null")
        || s.parse::<f64>().is_ok()
        || serde_json::from_str::<Number>(s).is_ok()
        || s.chars().any(|c| {
            matches!(c, ',' | ':' | '"' | '\\' | '[' | ']' | '{' | '}') || c.is_control()
        })
}

// --- Decoding ---

/// Decode the compact form only.
pub fn decode_toon(text: &str) -> Result<Value, EncodeError> {
    let mut parser = Parser {
        lines: scan(text)?,
        pos: 0,
    };
    parser.parse_document()
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    level: usize,
    text: &'a str,
}

fn syntax(line: usize, message: impl Into<String>) -> EncodeError {
    EncodeError::Syntax {
        line,
        message: message.into(),
    }
}

fn scan(text: &str) -> Result<Vec<Line<'_>>, EncodeError> {
    let mut lines = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let stripped = raw.trim_start_matches(' ');
        if stripped.starts_with('\t') {
            return Err(EncodeError::Unsupported(format!(
                "tab indentation on line {}",
                i + 1
            )));
        }
        let spaces = raw.len() - stripped.len();
        if spaces % INDENT.len() != 0 {
            return Err(syntax(i + 1, "indentation is not a multiple of two spaces"));
        }
        lines.push(Line {
            number: i + 1,
            level: spaces / INDENT.len(),
            text: stripped.trim_end(),
        });
    }
    Ok(lines)
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    fn last_line_number(&self) -> usize {
        self.lines.last().map_or(0, |l| l.number)
    }

    fn parse_document(&mut self) -> Result<Value, EncodeError> {
        let Some(first) = self.peek() else {
            return Ok(Value::Object(Map::new()));
        };
        if first.level != 0 {
            return Err(syntax(first.number, "document must start at column zero"));
        }

        let value = if first.text.starts_with('[') {
            self.pos += 1;
            self.parse_array(first.text, 1, first.number, 0)?
        } else if self.lines.len() == 1 && split_key(first.text).is_none() {
            self.pos += 1;
            parse_scalar(first.text, first.number)?
        } else {
            Value::Object(self.parse_object(0, 0)?)
        };

        match self.peek() {
            Some(extra) => Err(syntax(extra.number, "unexpected content")),
            None => Ok(value),
        }
    }

    fn parse_object(&mut self, level: usize, depth: usize) -> Result<Map<String, Value>, EncodeError> {
        if depth > MAX_DEPTH {
            return Err(EncodeError::TooDeep);
        }
        let mut map = Map::new();
        while let Some(line) = self.peek() {
            if line.level < level {
                break;
            }
            if line.level > level {
                return Err(syntax(line.number, "unexpected indentation"));
            }
            self.pos += 1;
            let (key, rest) =
                split_key(line.text).ok_or_else(|| syntax(line.number, "expected `key: value`"))?;
            let value = self.parse_field_value(rest, level, line.number, depth)?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// `rest` starts at the `:` or `[` following a key written at `level`.
    fn parse_field_value(
        &mut self,
        rest: &'a str,
        level: usize,
        number: usize,
        depth: usize,
    ) -> Result<Value, EncodeError> {
        match rest.strip_prefix(':') {
            Some(after) if after.trim().is_empty() => {
                Ok(Value::Object(self.parse_object(level + 1, depth + 1)?))
            }
            Some(after) => parse_scalar(after, number),
            None => self.parse_array(rest, level + 1, number, depth + 1),
        }
    }

    /// Parse an array header (`[N]`, `[N]{f,g}`, optional inline values)
    /// and whatever rows or items follow at `child_level`.
    fn parse_array(
        &mut self,
        header: &'a str,
        child_level: usize,
        number: usize,
        depth: usize,
    ) -> Result<Value, EncodeError> {
        if depth > MAX_DEPTH {
            return Err(EncodeError::TooDeep);
        }
        let close = header
            .find(']')
            .ok_or_else(|| syntax(number, "unterminated array length"))?;
        let n: usize = header[1..close]
            .trim()
            .parse()
            .map_err(|_| syntax(number, "array length is not a number"))?;

        let mut rest = &header[close + 1..];
        let mut fields = None;
        if rest.starts_with('{') {
            let end = find_unquoted(rest, '}')
                .ok_or_else(|| syntax(number, "unterminated field list"))?;
            let names = split_cells(&rest[1..end])
                .into_iter()
                .map(|cell| parse_key(cell, number))
                .collect::<Result<Vec<_>, _>>()?;
            fields = Some(names);
            rest = &rest[end + 1..];
        }

        let inline = rest
            .strip_prefix(':')
            .ok_or_else(|| syntax(number, "expected `:` after array header"))?
            .trim();

        match fields {
            Some(fields) => {
                if !inline.is_empty() {
                    return Err(syntax(number, "tabular header cannot carry inline values"));
                }
                let mut rows = Vec::with_capacity(n);
                for _ in 0..n {
                    let line = self.next_at(child_level)?;
                    let cells = split_cells(line.text);
                    if cells.len() != fields.len() {
                        return Err(syntax(
                            line.number,
                            format!("expected {} values, found {}", fields.len(), cells.len()),
                        ));
                    }
                    let mut obj = Map::new();
                    for (field, cell) in fields.iter().zip(cells) {
                        obj.insert(field.clone(), parse_scalar(cell, line.number)?);
                    }
                    rows.push(Value::Object(obj));
                }
                Ok(Value::Array(rows))
            }
            None if !inline.is_empty() => {
                let values = split_cells(inline)
                    .into_iter()
                    .map(|cell| parse_scalar(cell, number))
                    .collect::<Result<Vec<_>, _>>()?;
                if values.len() != n {
                    return Err(syntax(
                        number,
                        format!("declared {n} values, found {}", values.len()),
                    ));
                }
                Ok(Value::Array(values))
            }
            None => {
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.parse_list_item(child_level, depth)?);
                }
                Ok(Value::Array(items))
            }
        }
    }

    fn next_at(&mut self, level: usize) -> Result<Line<'a>, EncodeError> {
        let line = self
            .peek()
            .ok_or_else(|| syntax(self.last_line_number(), "array ended early"))?;
        if line.level != level {
            return Err(syntax(line.number, "array ended early"));
        }
        self.pos += 1;
        Ok(line)
    }

    fn parse_list_item(&mut self, level: usize, depth: usize) -> Result<Value, EncodeError> {
        let line = self.next_at(level)?;
        if line.text == "-" {
            return Ok(Value::Object(Map::new()));
        }
        let after = line
            .text
            .strip_prefix("- ")
            .ok_or_else(|| syntax(line.number, "expected `- ` list item"))?;

        if after.starts_with('[') {
            return self.parse_array(after, level + 2, line.number, depth + 1);
        }

        if let Some((key, rest)) = split_key(after) {
            let mut map = Map::new();
            let first = self.parse_field_value(rest, level + 1, line.number, depth + 1)?;
            map.insert(key, first);
            map.extend(self.parse_object(level + 1, depth + 1)?);
            return Ok(Value::Object(map));
        }

        parse_scalar(after, line.number)
    }
}

/// Split `key: ...` or `key[N]...` into the key and the remainder starting
/// at `:` or `[`. `None` if the text is not a field.
fn split_key(text: &str) -> Option<(String, &str)> {
    if text.starts_with('"') {
        let end = quoted_end(text)?;
        let key: String = serde_json::from_str(&text[..=end]).ok()?;
        let rest = &text[end + 1..];
        (rest.starts_with(':') || rest.starts_with('[')).then_some((key, rest))
    } else {
        let idx = text.find([':', '['])?;
        Some((text[..idx].to_string(), &text[idx..]))
    }
}

fn parse_key(cell: &str, number: usize) -> Result<String, EncodeError> {
    if cell.starts_with('"') {
        serde_json::from_str(cell).map_err(|e| syntax(number, e.to_string()))
    } else {
        Ok(cell.to_string())
    }
}

fn parse_scalar(token: &str, number: usize) -> Result<Value, EncodeError> {
    let token = token.trim();
    if token.starts_with('"') {
        return serde_json::from_str::<String>(token)
            .map(Value::String)
            .map_err(|e| syntax(number, e.to_string()));
    }
    Ok(match token {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match serde_json::from_str::<Number>(token) {
            Ok(n) => Value::Number(n),
            Err(_) => Value::String(token.to_string()),
        },
    })
}

/// Byte index of the quote closing the string literal that opens `text`.
fn quoted_end(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if in_quotes {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == target {
            return Some(i);
        }
    }
    None
}

/// Split a row on commas outside string literals.
fn split_cells(text: &str) -> Vec<&str> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut cells = Vec::new();
    let mut rest = text;
    while let Some(idx) = find_unquoted(rest, ',') {
        cells.push(rest[..idx].trim());
        rest = &rest[idx + 1..];
    }
    cells.push(rest.trim());
    cells
}
