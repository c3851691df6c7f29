//! Command line edits of TOML config files.

use anyhow::{bail, Context, Result};
use toml::{value, Value};
use toml_query::{delete::TomlValueDeleteExt, insert::TomlValueInsertExt, read::TomlValueReadExt};
use tracing::debug;

/// Applies `scripts` to `doc`.
///
/// Scripts are separated by newlines or `;`. Empty scripts are ignored.
///
/// - `<key> = <value>` sets the value, creating missing tables on the way.
///   An array index past the end appends the value.
/// - `<key> =` deletes the key or array element. Missing keys are ignored.
///
/// Keys use the TOML dotted syntax plus `[n]` for array elements, e.g.
/// `move_group.named_targets.prepared[1] = 0.4`.
pub fn overwrite(doc: &mut Value, scripts: &str) -> Result<()> {
    for Edit { query, value } in parse(scripts)? {
        match value {
            Some(value) => {
                debug!(?query, ?value, "set");
                doc.insert(&query, value)?;
            }
            None => {
                let Some(old) = doc.read_mut(&query)? else {
                    debug!(?query, "nothing to delete");
                    continue;
                };
                // toml-query refuses to delete non-empty tables and arrays
                match old {
                    Value::Array(a) => a.clear(),
                    Value::Table(t) => *t = value::Map::new(),
                    _ => {}
                }
                debug!(?query, "delete");
                doc.delete(&query)?;
            }
        }
    }
    Ok(())
}

/// Same as [`overwrite`], for a document given as a string.
pub fn overwrite_str(doc: &str, scripts: &str) -> Result<String> {
    let mut doc: Value = toml::from_str(doc)?;
    overwrite(&mut doc, scripts)?;
    Ok(toml::to_string(&doc)?)
}

#[derive(Debug)]
struct Edit {
    query: String,
    /// `None` means delete.
    value: Option<Value>,
}

/// Tracks string literals and nesting while scanning a script.
#[derive(Default)]
struct Scanner {
    quote: Option<char>,
    escaped: bool,
    depth: i32,
}

impl Scanner {
    /// Returns true if `ch` is outside any literal or bracket.
    fn top_level(&mut self, ch: char) -> bool {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' && q == '"' {
                self.escaped = true;
            } else if ch == q {
                self.quote = None;
            }
            return false;
        }
        match ch {
            '"' | '\'' => {
                self.quote = Some(ch);
                false
            }
            '[' | '{' => {
                self.depth += 1;
                false
            }
            ']' | '}' => {
                self.depth -= 1;
                false
            }
            _ => self.depth <= 0,
        }
    }
}

fn parse(scripts: &str) -> Result<Vec<Edit>> {
    let mut edits = vec![];
    let mut scanner = Scanner::default();
    let mut key: Option<String> = None;
    let mut buf = String::new();

    let mut finish = |key: &mut Option<String>, buf: &mut String, pos: usize| -> Result<()> {
        let text = std::mem::take(buf);
        match key.take() {
            Some(k) => edits.push(to_edit(&k, &text, pos)?),
            None if text.trim().is_empty() => {}
            None => bail!("expected `=` in script at {pos}: {}", text.trim()),
        }
        Ok(())
    };

    for (pos, ch) in scripts.char_indices() {
        let top = scanner.top_level(ch);
        if top && ch == '=' {
            if key.is_some() {
                bail!("expected separator, found `=` at {}", pos + 1);
            }
            key = Some(std::mem::take(&mut buf));
        } else if top && (ch == '\n' || ch == ';') {
            finish(&mut key, &mut buf, pos + 1)?;
        } else {
            buf.push(ch);
        }
    }
    if let Some(q) = scanner.quote {
        bail!("unexpected eof, expected `{q}`");
    }
    finish(&mut key, &mut buf, scripts.len())?;
    Ok(edits)
}

fn to_edit(key: &str, text: &str, pos: usize) -> Result<Edit> {
    let text = text.trim();
    let value = if text.is_empty() {
        None
    } else {
        let mut parsed: value::Table = toml::from_str(&format!("v = {text}"))
            .with_context(|| format!("invalid value in script at {pos}: {text}"))?;
        parsed.remove("v")
    };
    Ok(Edit {
        query: to_query(key.trim()),
        value,
    })
}

/// `a[0].b` -> `a.[0].b`, the form toml-query expects.
fn to_query(key: &str) -> String {
    let mut query = String::with_capacity(key.len() + 4);
    let mut scanner = Scanner::default();
    for ch in key.chars() {
        let top = scanner.top_level(ch);
        if ch.is_whitespace() && scanner.quote.is_none() {
            continue;
        }
        if ch == '[' && !top && scanner.depth == 1 && !query.is_empty() && !query.ends_with('.') {
            query.push('.');
        }
        query.push(ch);
    }
    query
}
