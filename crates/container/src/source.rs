//! Tabular source reader and the standalone `encode` entry point.
//!
//! Sources are comma-separated UTF-8 text with a header row. Two columns
//! are required, matched case-insensitively:
//!
//! - identifier: `key`, `id` or `identifier`
//! - text: `value` or `text`
//!
//! Fields may be wrapped in double quotes to embed commas; a doubled quote
//! inside a quoted field is a literal quote. Blank lines are skipped.
//! Records do not span lines.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::compression::Compression;
use crate::entries::EntryMap;
use crate::error::{ContainerError, Result};
use crate::writer::ContainerWriter;

const KEY_COLUMNS: &[&str] = &["key", "id", "identifier"];
const TEXT_COLUMNS: &[&str] = &["value", "text"];
const SEPARATOR: char = ',';
const QUOTE: char = '"';

/// Reads a source file into an [`EntryMap`].
///
/// # Errors
///
/// - [`ContainerError::SourceNotFound`] if `path` does not exist.
/// - [`ContainerError::MissingColumn`] if the header lacks either column.
pub fn read_table(path: &Path) -> Result<EntryMap> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ContainerError::SourceNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    parse_table(BufReader::new(file))
}

/// Parses tabular text into an [`EntryMap`], first occurrence winning.
///
/// Rows with an empty identifier are skipped. A row shorter than the
/// header reads its missing text field as empty.
pub fn parse_table<R: BufRead>(reader: R) -> Result<EntryMap> {
    let mut lines = reader.lines().enumerate();

    let (key_col, text_col) = loop {
        let Some((n, line)) = lines.next() else {
            return Err(ContainerError::MissingColumn("identifier"));
        };
        let line = line?;
        let line = line.trim_start_matches('\u{feff}');
        if line.trim().is_empty() {
            continue;
        }
        let header = split_fields(line, n + 1)?;
        let key_col = find_column(&header, KEY_COLUMNS).ok_or(ContainerError::MissingColumn("identifier"))?;
        let text_col = find_column(&header, TEXT_COLUMNS).ok_or(ContainerError::MissingColumn("text"))?;
        break (key_col, text_col);
    };

    let mut entries = EntryMap::new();
    let mut duplicates = 0usize;
    for (n, line) in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = split_fields(&line, n + 1)?;
        let Some(key) = fields.get_mut(key_col).map(std::mem::take) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let text = fields.get_mut(text_col).map(std::mem::take).unwrap_or_default();
        if !entries.insert(key, text) {
            duplicates += 1;
        }
    }

    debug!(entries = entries.len(), duplicates, "source parsed");
    Ok(entries)
}

fn find_column(header: &[String], names: &[&str]) -> Option<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Splits one line into fields, honouring double-quoted fields.
fn split_fields(line: &str, line_no: usize) -> Result<Vec<String>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                QUOTE if chars.peek() == Some(&QUOTE) => {
                    field.push(QUOTE);
                    chars.next();
                }
                QUOTE => in_quotes = false,
                _ => field.push(c),
            }
        } else {
            match c {
                QUOTE if field.is_empty() => in_quotes = true,
                SEPARATOR => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err(ContainerError::UnterminatedQuote { line: line_no });
    }
    fields.push(field);
    Ok(fields)
}

/// Reads `source_path`, encodes it, and writes the container to
/// `output_path`.
///
/// Nothing is written unless the source parses completely, so a source
/// missing a required column leaves `output_path` untouched.
pub fn encode(source_path: &Path, output_path: &Path, compression: Compression) -> Result<()> {
    let entries = read_table(source_path)?;
    ContainerWriter::write_to_path(output_path, &entries, compression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(text: &str) -> Result<EntryMap> {
        parse_table(text.as_bytes())
    }

    // -------------------- Fields --------------------

    #[test]
    fn split_plain_and_quoted() -> Result<()> {
        assert_eq!(split_fields("a,b,c", 1)?, vec!["a", "b", "c"]);
        assert_eq!(split_fields("a,\"b,c\",d", 1)?, vec!["a", "b,c", "d"]);
        assert_eq!(split_fields("\"say \"\"hi\"\"\",x", 1)?, vec!["say \"hi\"", "x"]);
        assert_eq!(split_fields("a,,", 1)?, vec!["a", "", ""]);
        assert_eq!(split_fields("a,b\r", 1)?, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn unterminated_quote_reports_line() {
        assert!(matches!(
            split_fields("a,\"open", 7),
            Err(ContainerError::UnterminatedQuote { line: 7 })
        ));
    }

    // -------------------- Tables --------------------

    #[test]
    fn duplicate_identifier_keeps_first_row() -> Result<()> {
        let m = parse("Key,Value\na,Hello\nb,World\na,Ignored\n")?;
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("a"), Some("Hello"));
        assert_eq!(m.get("b"), Some("World"));
        Ok(())
    }

    #[test]
    fn columns_are_found_by_name_in_any_position() -> Result<()> {
        let m = parse("notes,TEXT,Identifier\nx,bonjour,greet\n")?;
        assert_eq!(m.get("greet"), Some("bonjour"));
        Ok(())
    }

    #[test]
    fn blank_lines_are_skipped() -> Result<()> {
        let m = parse("\n\nid,text\n\na,1\n   \nb,2\n")?;
        assert_eq!(m.len(), 2);
        Ok(())
    }

    #[test]
    fn short_row_reads_empty_text() -> Result<()> {
        let m = parse("id,other,text\na\n")?;
        assert_eq!(m.get("a"), Some(""));
        Ok(())
    }

    #[test]
    fn empty_identifier_rows_are_dropped() -> Result<()> {
        let m = parse("id,text\n,orphan\nk,v\n")?;
        assert_eq!(m.len(), 1);
        Ok(())
    }

    #[test]
    fn bom_is_ignored() -> Result<()> {
        let m = parse("\u{feff}key,value\nk,v\n")?;
        assert_eq!(m.get("k"), Some("v"));
        Ok(())
    }

    #[test]
    fn missing_text_column_is_a_format_error() {
        assert!(matches!(
            parse("key,comment\na,b\n"),
            Err(ContainerError::MissingColumn("text"))
        ));
    }

    #[test]
    fn missing_identifier_column_is_a_format_error() {
        assert!(matches!(
            parse("name,value\na,b\n"),
            Err(ContainerError::MissingColumn("identifier"))
        ));
        assert!(matches!(parse(""), Err(ContainerError::MissingColumn(_))));
    }

    // -------------------- encode --------------------

    #[test]
    fn encode_missing_source() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.bin");
        let err = encode(&dir.path().join("nope.csv"), &out, Compression::None).unwrap_err();
        assert!(matches!(err, ContainerError::SourceNotFound(_)));
        assert!(!out.exists());
    }

    #[test]
    fn encode_bad_header_writes_nothing() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("bad.csv");
        let out = dir.path().join("out.bin");
        std::fs::write(&src, "a,b\n1,2\n")?;

        assert!(encode(&src, &out, Compression::Lz4).is_err());
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn encode_writes_marked_container() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("strings.csv");
        let out = dir.path().join("strings.bin");
        std::fs::write(&src, "key,value\nhello,\"Hello, world\"\n")?;

        encode(&src, &out, Compression::Lz4)?;
        let info = crate::inspect(&std::fs::read(&out)?)?;
        assert_eq!(info.entries, 1);
        assert_eq!(info.marker.compression(), Compression::Lz4);
        Ok(())
    }
}
