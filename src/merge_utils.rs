use flate2::bufread::MultiGzDecoder;
use nutype::nutype;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::trace;

use crate::error::{MergeError, Result};

/// Type alias for a reader over a count table that is either plain text
/// or gzip compressed.
pub type CountReader = Box<dyn BufRead>;

#[nutype(derive(Debug, Clone, PartialEq, Eq, Hash, AsRef))]
/// The name of a sample column in the merged matrix.
///
/// A label is derived from the base name of an input file: everything before the
/// first `.` in the file name, so `results/SRR1234.exon.txt` becomes `SRR1234`.
/// Labels are the merge key for columns; two inputs with the same label share a
/// single column.
pub struct SampleLabel(String);

impl SampleLabel {
    /// Derives the sample label of the count table at `p`.
    ///
    /// Only the file name is considered, so dots in parent directories never
    /// influence the label. A file name that starts with `.` would yield an empty
    /// label; the whole file name is used instead.
    ///
    /// ```rust
    /// use countmerge::SampleLabel;
    /// let label = SampleLabel::from_path("counts/A.exon.txt");
    /// assert_eq!(label.as_ref(), "A");
    /// ```
    pub fn from_path<T: AsRef<Path>>(p: T) -> SampleLabel {
        let file_name = p
            .as_ref()
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        let stem = file_name.split('.').next().unwrap_or_default();
        if stem.is_empty() {
            SampleLabel::new(file_name)
        } else {
            SampleLabel::new(stem.to_string())
        }
    }
}

/// Checks if the reader is positioned at the start of a gzip stream by peeking
/// at the first two bytes. Nothing is consumed from the reader.
pub fn is_gzipped<T: BufRead>(reader: &mut T) -> std::io::Result<bool> {
    const GZIP_MAGIC_NUMBER: [u8; 2] = [0x1f, 0x8b];

    let src = reader.fill_buf()?;
    if src.get(..2) == Some(&GZIP_MAGIC_NUMBER) {
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Opens the count table at `p`, transparently decompressing it if it is gzipped.
///
/// Returns [`MergeError::InputNotFound`] if the path does not exist.
pub fn get_count_reader_from_path<T: AsRef<Path>>(p: T) -> Result<CountReader> {
    let p = p.as_ref();
    let file = File::open(p).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MergeError::InputNotFound(p.to_path_buf()),
        _ => MergeError::Io(e),
    })?;

    let mut inner_rdr = BufReader::new(file);
    if is_gzipped(&mut inner_rdr)? {
        trace!("auto-detected gzipped count table {:?} - reading via decompression", p);
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(inner_rdr))))
    } else {
        Ok(Box::new(inner_rdr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn label_is_text_before_first_dot() {
        assert_eq!(SampleLabel::from_path("A.tsv").as_ref(), "A");
        assert_eq!(SampleLabel::from_path("out/SRR01.exon.txt").as_ref(), "SRR01");
        assert_eq!(SampleLabel::from_path("run.v2/B.tsv").as_ref(), "B");
        assert_eq!(SampleLabel::from_path("noext").as_ref(), "noext");
    }

    #[test]
    fn label_falls_back_to_file_name() {
        assert_eq!(SampleLabel::from_path("dir/.hidden.tsv").as_ref(), ".hidden.tsv");
    }

    #[test]
    fn gzip_magic_is_detected_without_consuming() {
        let mut gz = Cursor::new(vec![0x1f, 0x8b, 0x08, 0x00]);
        assert!(is_gzipped(&mut gz).unwrap());
        assert_eq!(gz.position(), 0);

        let mut plain = Cursor::new(b"g1\t5\n".to_vec());
        assert!(!is_gzipped(&mut plain).unwrap());

        let mut empty = Cursor::new(Vec::new());
        assert!(!is_gzipped(&mut empty).unwrap());
    }

    #[test]
    fn missing_input_is_reported_as_not_found() {
        let err = match get_count_reader_from_path("/definitely/not/here.tsv") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, MergeError::InputNotFound(_)));
    }
}
