use crate::error::{MergeError, Result};
use crate::merge_utils::{get_count_reader_from_path, SampleLabel};
use indexmap::IndexMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A single sample's gene counts, as produced by VERSE.
///
/// The table maps gene ids to their count, kept verbatim as text so that integer
/// and fractional counts are written back exactly as the quantifier reported them.
/// Gene ids keep the order of their first appearance in the file; a gene id that
/// appears more than once keeps its first position but takes the value of its
/// last occurrence.
///
/// # Fields
///
/// * `path`: The file the table was read from.
/// * `label`: The [`SampleLabel`] derived from `path`.
/// * `counts`: Gene id to count, in order of first appearance.
/// * `duplicates`: How many lines repeated an already seen gene id.
#[derive(Clone, Debug)]
pub struct CountTable {
    path: PathBuf,
    label: SampleLabel,
    counts: IndexMap<String, String>,
    duplicates: usize,
}

impl CountTable {
    /// Reads the count table at `p`, which may be plain text or gzip compressed.
    ///
    /// If `has_header` is `true`, the first non-blank line is treated as a header
    /// and discarded without being validated.
    ///
    /// ### Errors
    ///
    /// * [`MergeError::InputNotFound`] if `p` does not exist.
    /// * [`MergeError::MalformedRow`] if a non-blank line does not have exactly two
    ///   tab-separated fields, or either of them is empty.
    /// * [`MergeError::Io`] for any other read failure.
    pub fn from_path<T: AsRef<Path>>(p: T, has_header: bool) -> Result<CountTable> {
        let p = p.as_ref();
        let rdr = get_count_reader_from_path(p)?;
        CountTable::from_reader(rdr, p, has_header)
    }

    /// Reads a count table from any buffered reader. `path` is used to derive the
    /// sample label and to report errors.
    pub fn from_reader<R: BufRead, T: AsRef<Path>>(
        rdr: R,
        path: T,
        has_header: bool,
    ) -> Result<CountTable> {
        let path = path.as_ref();
        let mut counts: IndexMap<String, String> = IndexMap::new();
        let mut duplicates = 0usize;
        let mut skip_header = has_header;

        for (idx, line) in rdr.lines().enumerate() {
            let line = line?;
            let line = line.strip_suffix('\r').unwrap_or(line.as_str());
            if line.trim().is_empty() {
                continue;
            }
            if skip_header {
                skip_header = false;
                continue;
            }

            let mut fields = line.split('\t');
            let (gene, count) = match (fields.next(), fields.next(), fields.next()) {
                (Some(gene), Some(count), None) if !gene.is_empty() && !count.is_empty() => {
                    (gene, count)
                }
                _ => {
                    return Err(MergeError::MalformedRow {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        fields: line.split('\t').count(),
                    })
                }
            };

            if counts.insert(gene.to_string(), count.to_string()).is_some() {
                duplicates += 1;
            }
        }

        if duplicates > 0 {
            warn!(
                "{:?} contains {} repeated gene id(s); the last value of each is kept.",
                path, duplicates
            );
        }
        if counts.is_empty() {
            warn!("{:?} contains no gene counts.", path);
        }

        let label = SampleLabel::from_path(path);
        debug!(
            "read {} genes for sample {:?} from {:?}",
            counts.len(),
            label.as_ref(),
            path
        );

        Ok(CountTable {
            path: path.to_path_buf(),
            label,
            counts,
            duplicates,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &SampleLabel {
        &self.label
    }

    /// Gene id to count, in order of first appearance.
    pub fn counts(&self) -> &IndexMap<String, String> {
        &self.counts
    }

    /// Get the count of a gene, if present.
    pub fn get(&self, gene_id: &str) -> Option<&str> {
        self.counts.get(gene_id).map(|c| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of lines that repeated an already seen gene id.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
