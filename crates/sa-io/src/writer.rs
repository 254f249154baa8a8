use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use sa_tensor::Matrix;

use crate::error::{ParseError, Result};

/// Write `m` in the loader's text format: one line per row, values
/// separated by single spaces.
pub fn write_matrix<W: Write>(mut writer: W, m: &Matrix) -> std::io::Result<()> {
    for i in 0..m.rows() {
        if let Some(row) = m.row(i) {
            for (j, v) in row.iter().enumerate() {
                if j > 0 {
                    writer.write_all(b" ")?;
                }
                write!(writer, "{v}")?;
            }
        }
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Write `m` to a file, replacing any existing content.
pub fn save_matrix(path: impl AsRef<Path>, m: &Matrix) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), shape = %m.shape(), "saving matrix");
    let file = File::create(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    write_matrix(BufWriter::new(file), m)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{load_matrix, parse_matrix_str};

    #[test]
    fn test_write_format() {
        let m = Matrix::from_rows(&[[1, -2, 3], [40, 5, -600]]).unwrap();
        let mut out = Vec::new();
        write_matrix(&mut out, &m).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 -2 3\n40 5 -600\n");
    }

    #[test]
    fn test_saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tensor2.txt");
        let m = Matrix::from_fn(4, 3, |i, j| (i as i32 - 2) * (j as i32 + 7)).unwrap();
        save_matrix(&path, &m).unwrap();
        assert_eq!(load_matrix(&path, 4, 3).unwrap(), m);
    }

    #[test]
    fn test_zero_column_matrix() {
        let m = Matrix::zeros(2, 0).unwrap();
        let mut out = Vec::new();
        write_matrix(&mut out, &m).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "\n\n");
        assert_eq!(parse_matrix_str(&text, 2, 0).unwrap(), m);
    }
}
