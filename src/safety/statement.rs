//! Statement boundary detection.
//!
//! The prefix check says nothing about what follows the first statement, so
//! the gateway refuses any text that holds more than one.

/// Returns the statement with any trailing terminator removed, or `None` if
/// `sql` contains a second statement after the first `;`.
///
/// Quoted text and comments are skipped. Backslash escapes inside quotes are
/// honored by MySQL but not by SQLite; the text is scanned both ways and is
/// only accepted when both readings agree on a single statement.
pub fn single_statement(sql: &str) -> Option<&str> {
    let with_escapes = statement_end(sql, true)?;
    let without_escapes = statement_end(sql, false)?;
    if with_escapes != without_escapes {
        return None;
    }
    Some(match with_escapes {
        Some(end) => sql[..end].trim(),
        None => sql.trim(),
    })
}

/// Scans `sql` and returns the offset of the first terminator (`Ok(None)`
/// without one), or `None` when code follows it.
fn statement_end(sql: &str, backslash_escapes: bool) -> Option<Option<usize>> {
    let bytes = sql.as_bytes();
    let mut end = None;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                if end.is_some() {
                    return None;
                }
                i = skip_quoted(bytes, i, quote, backslash_escapes);
                continue;
            }
            // MySQL only treats `--` as a comment when followed by whitespace.
            b'-' if bytes.get(i + 1) == Some(&b'-')
                && bytes.get(i + 2).map_or(true, u8::is_ascii_whitespace) =>
            {
                i = skip_line(bytes, i);
                continue;
            }
            // `/*!...*/` is executed by MySQL, so only plain block comments are skipped.
            b'/' if bytes.get(i + 1) == Some(&b'*') && bytes.get(i + 2) != Some(&b'!') => {
                i = skip_block(bytes, i);
                continue;
            }
            b';' => {
                end.get_or_insert(i);
            }
            b if b.is_ascii_whitespace() => {}
            _ => {
                if end.is_some() {
                    return None;
                }
            }
        }
        i += 1;
    }

    Some(end)
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslash_escapes && quote != b'`' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset + 1)
}

fn skip_block(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}
