use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use sa_tensor::element::{narrow_f64, Elem};
use sa_tensor::Matrix;

use crate::error::{ParseError, Result};

/// Upper bound on the up-front reservation; larger inputs grow as they parse.
const MAX_RESERVE: usize = 1 << 20;

/// Load a `rows x cols` matrix from a text file.
///
/// The file must hold exactly `rows` lines of exactly `cols`
/// whitespace-separated numbers. Values are parsed as reals and truncated
/// toward zero. Any deviation is an error; no partial matrix is ever returned.
pub fn load_matrix(path: impl AsRef<Path>, rows: usize, cols: usize) -> Result<Matrix> {
    let path = path.as_ref();
    debug!(path = %path.display(), rows, cols, "loading matrix");
    let file = File::open(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_matrix(BufReader::new(file), rows, cols)
}

/// Parse a `rows x cols` matrix from an in-memory string.
pub fn parse_matrix_str(text: &str, rows: usize, cols: usize) -> Result<Matrix> {
    parse_matrix(text.as_bytes(), rows, cols)
}

/// Parse a `rows x cols` matrix from any buffered reader.
pub fn parse_matrix<R: BufRead>(reader: R, rows: usize, cols: usize) -> Result<Matrix> {
    let mut data = Vec::with_capacity(rows.saturating_mul(cols).min(MAX_RESERVE));
    let mut lines = reader.lines();

    for row in 0..rows {
        let line = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(ParseError::MissingRows {
                    expected: rows,
                    found: row,
                })
            }
        };
        parse_row(&line, row + 1, cols, &mut data)?;
    }

    // Anything after the last expected row, even a blank line, is rejected.
    if let Some(extra) = lines.next() {
        extra?;
        return Err(ParseError::TrailingRows {
            expected: rows,
            line: rows + 1,
        });
    }

    Ok(Matrix::new(data, rows, cols)?)
}

fn parse_row(line: &str, line_no: usize, cols: usize, out: &mut Vec<Elem>) -> Result<()> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != cols {
        return Err(ParseError::TokenCount {
            line: line_no,
            expected: cols,
            found: tokens.len(),
        });
    }

    for (i, token) in tokens.into_iter().enumerate() {
        let value: f64 = token.parse().map_err(|_| ParseError::NonNumeric {
            line: line_no,
            column: i + 1,
            token: token.to_string(),
        })?;
        let elem = narrow_f64(value).ok_or_else(|| ParseError::OutOfRange {
            line: line_no,
            column: i + 1,
            token: token.to_string(),
        })?;
        out.push(elem);
    }
    Ok(())
}
