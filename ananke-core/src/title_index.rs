//! Course title index inside the global nbgrader configuration.
//!
//! The file is Python source owned by other tooling as well, so only the
//! `c.NbGrader.course_titles = {...}` assignment is ever rewritten; every
//! other byte is preserved.

use std::ops::Range;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::error::{CoreError, Result};
use crate::fs::{FileLock, write_atomic};

const ASSIGNMENT: &str = "c.NbGrader.course_titles";

static ASSIGNMENT_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^c\.NbGrader\.course_titles[ \t]*=[ \t]*\{")
        .expect("static regex")
});

/// Parsed title mapping plus the byte range of its assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleAssignment {
    /// Byte range of the whole assignment in the source.
    pub span: Range<usize>,
    /// `(course_id, title)` pairs in file order.
    pub entries: Vec<(String, String)>,
}

/// Finds and parses the title assignment; `Ok(None)` when there is none.
pub fn parse(source: &str) -> Result<Option<TitleAssignment>> {
    let Some(found) = ASSIGNMENT_START.find(source) else {
        return Ok(None);
    };
    let mut scanner = Scanner {
        src: source,
        pos: found.end(),
    };
    let entries = scanner.entries()?;
    Ok(Some(TitleAssignment {
        span: found.start()..scanner.pos,
        entries,
    }))
}

/// Renders the assignment with double-quoted, escaped strings.
pub fn render(entries: &[(String, String)]) -> String {
    if entries.is_empty() {
        return format!("{ASSIGNMENT} = {{}}");
    }
    let mut out = format!("{ASSIGNMENT} = {{\n");
    for (id, title) in entries {
        out.push_str("    ");
        out.push_str(&quote(id));
        out.push_str(": ");
        out.push_str(&quote(title));
        out.push_str(",\n");
    }
    out.push('}');
    out
}

/// Rewrites `source` with the entries `edit` leaves behind.
///
/// Returns `None` when the mapping did not change.
pub fn rewrite<F>(source: &str, edit: F) -> Result<Option<String>>
where
    F: FnOnce(&mut Vec<(String, String)>),
{
    let parsed = parse(source)?;
    let mut entries = parsed
        .as_ref()
        .map(|a| a.entries.clone())
        .unwrap_or_default();
    let before = entries.clone();
    edit(&mut entries);
    if entries == before {
        return Ok(None);
    }

    let rendered = render(&entries);
    let text = match parsed {
        Some(assignment) => {
            let mut out = String::with_capacity(source.len() + 64);
            out.push_str(&source[..assignment.span.start]);
            out.push_str(&rendered);
            out.push_str(&source[assignment.span.end..]);
            out
        }
        None => {
            let mut out = source.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&rendered);
            out.push('\n');
            out
        }
    };
    Ok(Some(text))
}

fn quote(value: &str) -> String {
    // JSON string escapes are valid Python string escapes
    serde_json::Value::String(value.to_string()).to_string()
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl Scanner<'_> {
    fn entries(&mut self) -> Result<Vec<(String, String)>> {
        let mut entries: Vec<(String, String)> = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(entries);
                }
                Some(',') => {
                    self.pos += 1;
                }
                Some('\'' | '"') => {
                    let key = self.string()?;
                    self.skip_trivia();
                    self.expect(':')?;
                    self.skip_trivia();
                    let value = self.string()?;
                    match entries.iter_mut().find(|(k, _)| *k == key) {
                        Some(entry) => entry.1 = value,
                        None => entries.push((key, value)),
                    }
                }
                Some(other) => {
                    return Err(self.error(&format!("unexpected `{other}`")));
                }
                None => return Err(self.error("unterminated mapping")),
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error(&format!("expected `{want}`"))),
        }
    }

    fn string(&mut self) -> Result<String> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a string")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(self.error("unterminated string"));
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char> {
        let c = self.bump().ok_or_else(|| self.error("dangling escape"))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'u' => self.hex_char(4)?,
            'U' => self.hex_char(8)?,
            'x' => self.hex_char(2)?,
            other => other,
        })
    }

    fn hex_char(&mut self, digits: usize) -> Result<char> {
        let end = self.pos + digits;
        let code = self
            .src
            .get(self.pos..end)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .ok_or_else(|| self.error("bad hex escape"))?;
        self.pos = end;
        if (0xD800..0xDC00).contains(&code) {
            return self.surrogate_pair(code);
        }
        char::from_u32(code).ok_or_else(|| self.error("bad code point"))
    }

    fn surrogate_pair(&mut self, high: u32) -> Result<char> {
        if !self.src[self.pos..].starts_with("\\u") {
            return Err(self.error("lone surrogate"));
        }
        self.pos += 2;
        let end = self.pos + 4;
        let low = self
            .src
            .get(self.pos..end)
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .filter(|low| (0xDC00..0xE000).contains(low))
            .ok_or_else(|| self.error("lone surrogate"))?;
        self.pos = end;
        let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(code).ok_or_else(|| self.error("bad code point"))
    }

    fn error(&self, reason: &str) -> CoreError {
        CoreError::InvalidContent(format!(
            "{ASSIGNMENT} at byte {}: {reason}",
            self.pos
        ))
    }
}

/// Course titles stored in the global nbgrader configuration file.
#[derive(Debug, Clone)]
pub struct TitleIndex {
    path: PathBuf,
}

impl TitleIndex {
    /// Index kept in the configuration file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_source(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(source) => Ok(source),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(String::new())
            }
            Err(err) => Err(CoreError::Io(err)),
        }
    }

    /// Every indexed course; empty when the file or mapping is missing.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(parse(&self.read_source()?)?
            .map(|a| a.entries)
            .unwrap_or_default())
    }

    /// Title of `course_id`, if indexed.
    pub fn title(&self, course_id: &str) -> Result<Option<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|(id, _)| id == course_id)
            .map(|(_, title)| title))
    }

    async fn edit<F>(&self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<(String, String)>),
    {
        let _lock = FileLock::acquire(&self.path).await?;
        let source = self.read_source()?;
        match rewrite(&source, edit)? {
            Some(text) => {
                write_atomic(&self.path, text.as_bytes(), None)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Inserts or replaces the title of `course_id`.
    pub async fn upsert(&self, course_id: &str, title: &str) -> Result<bool> {
        let changed = self
            .edit(|entries| {
                match entries.iter_mut().find(|(id, _)| id == course_id) {
                    Some(entry) => entry.1 = title.to_string(),
                    None => entries.push((course_id.into(), title.into())),
                }
            })
            .await?;
        if changed {
            info!(course_id, title, "course title indexed");
        }
        Ok(changed)
    }

    /// Drops `course_id`; `false` when it was not indexed.
    pub async fn remove(&self, course_id: &str) -> Result<bool> {
        self.edit(|entries| entries.retain(|(id, _)| id != course_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "c = get_config()\n\
c.Exchange.root = '/opt/nbgrader_exchange'\n\
c.NbGrader.course_titles = {'c-1': 'Intro (c-1)', \"c-2\": \"Lab \\\"A\\\"\",}\n\
c.Other.mapping = {'x': {'y': 1}}\n";

    #[test]
    fn parses_both_quote_styles() {
        let assignment = parse(CONFIG).unwrap().unwrap();
        assert_eq!(
            assignment.entries,
            vec![
                ("c-1".to_string(), "Intro (c-1)".to_string()),
                ("c-2".to_string(), "Lab \"A\"".to_string()),
            ]
        );
        assert!(CONFIG[assignment.span.clone()].ends_with('}'));
    }

    #[test]
    fn rewrite_preserves_surrounding_bytes() {
        let text = rewrite(CONFIG, |entries| {
            entries.push(("c-3".into(), "Ünïcödé {braces} ✓".into()));
        })
        .unwrap()
        .unwrap();

        let assignment = parse(CONFIG).unwrap().unwrap();
        let new = parse(&text).unwrap().unwrap();
        assert_eq!(&text[..new.span.start], &CONFIG[..assignment.span.start]);
        assert_eq!(&text[new.span.end..], &CONFIG[assignment.span.end..]);
        assert_eq!(new.entries.len(), 3);
        assert_eq!(new.entries[2].1, "Ünïcödé {braces} ✓");
    }

    #[test]
    fn missing_assignment_is_appended() {
        let source = "c = get_config()";
        let text = rewrite(source, |e| e.push(("c-1".into(), "T".into())))
            .unwrap()
            .unwrap();
        assert!(text.starts_with("c = get_config()\n"));
        assert_eq!(
            parse(&text).unwrap().unwrap().entries,
            vec![("c-1".to_string(), "T".to_string())]
        );
    }

    #[test]
    fn unchanged_mapping_is_not_rewritten() {
        assert!(rewrite(CONFIG, |_| {}).unwrap().is_none());
    }

    #[test]
    fn unicode_escapes_are_decoded() {
        let source = "c.NbGrader.course_titles = {'a': '\\u00e9\\U0001F600'}";
        let entries = parse(source).unwrap().unwrap().entries;
        assert_eq!(entries[0].1, "é😀");
    }

    #[test]
    fn non_string_values_are_rejected() {
        let source = "c.NbGrader.course_titles = {'a': 1}";
        assert!(parse(source).is_err());
    }

    #[tokio::test]
    async fn upsert_and_remove_round_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nbgrader_config.py");
        std::fs::write(&path, CONFIG).unwrap();
        let index = TitleIndex::new(&path);

        assert!(index.upsert("c-1", "Renamed (c-1)").await.unwrap());
        assert!(!index.upsert("c-1", "Renamed (c-1)").await.unwrap());
        assert_eq!(
            index.title("c-1").unwrap().as_deref(),
            Some("Renamed (c-1)")
        );

        assert!(index.remove("c-2").await.unwrap());
        assert_eq!(index.entries().unwrap().len(), 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("c.Other.mapping = {'x': {'y': 1}}\n"));
    }
}
