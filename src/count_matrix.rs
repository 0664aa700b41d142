use crate::error::{MergeError, Result};
use crate::merge_utils::SampleLabel;
use crate::options::{CollisionPolicy, MergeOptions};
use crate::reader::CountTable;
use indexmap::IndexMap;
use polars::prelude::*;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// A gene-by-sample count matrix built by outer-joining per-sample [`CountTable`]s on gene id.
///
/// The matrix is an ordered map from gene id to a fixed-size row with one slot per sample
/// column. A slot is `None` when the gene is absent from that sample.
///
/// # Fields
///
/// * `samples`: The sample labels, in column order.
/// * `rows`: Gene id to per-sample counts, in order of first appearance across the inputs.
///
/// # Examples
///
/// ```rust
/// use countmerge::{CollisionPolicy, CountMatrix, CountTable};
/// use std::io::Cursor;
///
/// let a = CountTable::from_reader(Cursor::new("g1\t5\ng2\t3\n"), "A.tsv", false)?;
/// let b = CountTable::from_reader(Cursor::new("g2\t7\ng3\t1\n"), "B.tsv", false)?;
/// let mat = CountMatrix::from_tables(vec![a, b], CollisionPolicy::Overwrite)?;
///
/// assert_eq!(mat.n_genes(), 3);
/// assert_eq!(mat.get("g2", "B"), Some("7"));
/// assert_eq!(mat.get("g1", "B"), None);
/// # Ok::<(), countmerge::MergeError>(())
/// ```
#[derive(Clone, Debug)]
pub struct CountMatrix {
    samples: Vec<SampleLabel>,
    rows: IndexMap<String, Vec<Option<String>>>,
}

impl CountMatrix {
    /// Outer-joins `tables` on gene id.
    ///
    /// Columns follow the order of `tables`. Rows follow the order in which gene ids are first
    /// seen when walking the tables in order. Tables sharing a [`SampleLabel`] are resolved by
    /// `collision`: under [`CollisionPolicy::Overwrite`] the later table replaces the whole
    /// column, which keeps the position of the first table with that label.
    pub fn from_tables(tables: Vec<CountTable>, collision: CollisionPolicy) -> Result<CountMatrix> {
        if tables.is_empty() {
            return Err(MergeError::NoInputs);
        }

        // assign a column slot to every distinct label
        let mut slots: IndexMap<SampleLabel, &Path> = IndexMap::with_capacity(tables.len());
        for tbl in tables.iter() {
            if let Some(first) = slots.get(tbl.label()) {
                match collision {
                    CollisionPolicy::Error => {
                        return Err(MergeError::LabelCollision {
                            label: tbl.label().as_ref().to_string(),
                            first: first.to_path_buf(),
                            second: tbl.path().to_path_buf(),
                        })
                    }
                    CollisionPolicy::Overwrite => {
                        warn!(
                            "{:?} and {:?} both map to sample {:?}; the column from {:?} is kept.",
                            first,
                            tbl.path(),
                            tbl.label().as_ref(),
                            tbl.path()
                        );
                    }
                }
            }
            slots.insert(tbl.label().clone(), tbl.path());
        }
        let n_samples = slots.len();

        let capacity = tables.iter().map(|t| t.len()).max().unwrap_or(0);
        let mut rows: IndexMap<String, Vec<Option<String>>> = IndexMap::with_capacity(capacity);
        let mut filled = vec![false; n_samples];

        for tbl in tables.iter() {
            // every label was inserted above
            let slot = match slots.get_index_of(tbl.label()) {
                Some(slot) => slot,
                None => continue,
            };

            // a later table with the same label replaces the column wholesale
            if filled[slot] {
                rows.values_mut().for_each(|row| row[slot] = None);
            }
            filled[slot] = true;

            for (gene, count) in tbl.counts() {
                let row = rows
                    .entry(gene.clone())
                    .or_insert_with(|| vec![None; n_samples]);
                row[slot] = Some(count.clone());
            }
        }

        let samples: Vec<SampleLabel> = slots.into_keys().collect();
        debug!(
            "joined {} tables into {} genes x {} samples",
            tables.len(),
            rows.len(),
            samples.len()
        );

        Ok(CountMatrix { samples, rows })
    }

    /// Reads every input named in `opts` and joins them. Nothing is written.
    pub fn from_options(opts: &MergeOptions) -> Result<CountMatrix> {
        if opts.inputs.is_empty() {
            return Err(MergeError::NoInputs);
        }
        let tables = opts
            .inputs
            .iter()
            .map(|p| CountTable::from_path(p, opts.has_header))
            .collect::<Result<Vec<CountTable>>>()?;

        CountMatrix::from_tables(tables, opts.collision)
    }

    /// The sample labels, in column order.
    pub fn samples(&self) -> &[SampleLabel] {
        &self.samples
    }

    /// Gene ids, in row order.
    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(|g| g.as_str())
    }

    /// The per-sample counts of a gene, or `None` if the gene is in no input.
    pub fn row(&self, gene_id: &str) -> Option<&[Option<String>]> {
        self.rows.get(gene_id).map(|r| r.as_slice())
    }

    /// The count of `gene_id` in the sample labelled `sample`.
    pub fn get(&self, gene_id: &str, sample: &str) -> Option<&str> {
        let slot = self.samples.iter().position(|s| s.as_ref() == sample)?;
        self.rows.get(gene_id)?[slot].as_deref()
    }

    pub fn n_genes(&self) -> usize {
        self.rows.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Converts the matrix into a [`DataFrame`] with the gene ids in a leading column named
    /// `index_name`, followed by one nullable string column per sample.
    pub fn to_df(&self, index_name: &str) -> Result<DataFrame> {
        if let Some(s) = self.samples.iter().find(|s| s.as_ref() == index_name) {
            return Err(MergeError::IndexNameClash(s.as_ref().to_string()));
        }

        let mut columns = Vec::with_capacity(self.samples.len() + 1);
        columns.push(Series::new(
            index_name,
            self.rows.keys().map(|g| g.as_str()).collect::<Vec<&str>>(),
        ));
        for (slot, label) in self.samples.iter().enumerate() {
            let values: Vec<Option<&str>> =
                self.rows.values().map(|row| row[slot].as_deref()).collect();
            columns.push(Series::new(label.as_ref(), values));
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Writes the matrix as delimited text to `file_path`.
    ///
    /// The header row holds `index_name` and the sample labels; missing counts are written as
    /// empty fields. The file is first written to a temporary file next to `file_path` and
    /// then renamed into place, so a failed write never leaves a partial matrix behind.
    ///
    /// ### Errors
    ///
    /// * [`MergeError::OutputUnwritable`] if the parent directory does not exist or the file
    ///   cannot be created, written or renamed.
    /// * [`MergeError::IndexNameClash`] if a sample label equals `index_name`.
    pub fn write_delimited<T: AsRef<Path>>(
        &self,
        file_path: T,
        index_name: &str,
        delimiter: u8,
    ) -> Result<()> {
        let file_path = file_path.as_ref();
        let unwritable = |source: std::io::Error| MergeError::OutputUnwritable {
            path: file_path.to_path_buf(),
            source,
        };

        let mut out_df = self.to_df(index_name)?;

        let parent = match file_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(&parent).map_err(unwritable)?;
        {
            let mut file = BufWriter::with_capacity(4194304, tmp.as_file_mut());
            CsvWriter::new(&mut file)
                .has_header(true)
                .with_separator(delimiter)
                .with_null_value(String::new())
                .finish(&mut out_df)
                .map_err(|e| unwritable(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
            file.flush().map_err(unwritable)?;
        }
        tmp.persist(file_path).map_err(|e| unwritable(e.error))?;

        info!(
            "wrote {} genes x {} samples to {:?}",
            self.n_genes(),
            self.n_samples(),
            file_path
        );
        Ok(())
    }
}

/// Merges the count tables named in `opts` and writes the matrix to `opts.output`.
///
/// All inputs are read and joined in memory before the output is touched, so any read or
/// parse failure leaves no output file behind.
pub fn merge_counts(opts: &MergeOptions) -> Result<CountMatrix> {
    info!(
        "merging {} count table(s) into {:?}",
        opts.inputs.len(),
        opts.output
    );
    let mat = CountMatrix::from_options(opts)?;
    mat.write_delimited(&opts.output, &opts.index_name, opts.delimiter)?;
    Ok(mat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table(content: &str, path: &str) -> CountTable {
        CountTable::from_reader(Cursor::new(content.to_string()), path, false).unwrap()
    }

    #[test]
    fn outer_join_keeps_union_and_first_appearance_order() {
        let a = table("g1\t5\ng2\t3\n", "A.tsv");
        let b = table("g2\t7\ng3\t1\n", "B.tsv");
        let mat = CountMatrix::from_tables(vec![a, b], CollisionPolicy::Overwrite).unwrap();

        assert_eq!(mat.genes().collect::<Vec<_>>(), vec!["g1", "g2", "g3"]);
        let labels: Vec<&str> = mat.samples().iter().map(|s| s.as_ref()).collect();
        assert_eq!(labels, vec!["A", "B"]);

        assert_eq!(
            mat.row("g1").unwrap(),
            &[Some("5".to_string()), None][..]
        );
        assert_eq!(
            mat.row("g2").unwrap(),
            &[Some("3".to_string()), Some("7".to_string())][..]
        );
        assert_eq!(mat.row("g3").unwrap(), &[None, Some("1".to_string())][..]);
        assert!(mat.row("g4").is_none());
    }

    #[test]
    fn shared_genes_are_counted_once() {
        let a = table("g1\t1\ng2\t1\ng3\t1\ng4\t1\n", "A.tsv");
        let b = table("g3\t2\ng4\t2\ng5\t2\n", "B.tsv");
        let mat = CountMatrix::from_tables(vec![a, b], CollisionPolicy::Overwrite).unwrap();
        // 4 + 3 - 2 shared
        assert_eq!(mat.n_genes(), 5);
        assert_eq!(mat.n_samples(), 2);
    }

    #[test]
    fn label_collision_overwrites_column_in_place() {
        let a = table("g1\t1\ng2\t2\n", "x/A.tsv");
        let b = table("g9\t9\n", "B.tsv");
        let a2 = table("g2\t20\ng3\t30\n", "y/A.exon.txt");
        let mat = CountMatrix::from_tables(vec![a, b, a2], CollisionPolicy::Overwrite).unwrap();

        let labels: Vec<&str> = mat.samples().iter().map(|s| s.as_ref()).collect();
        assert_eq!(labels, vec!["A", "B"]);
        assert_eq!(mat.genes().collect::<Vec<_>>(), vec!["g1", "g2", "g9", "g3"]);
        assert_eq!(mat.get("g1", "A"), None);
        assert_eq!(mat.get("g2", "A"), Some("20"));
        assert_eq!(mat.get("g3", "A"), Some("30"));
        assert_eq!(mat.get("g9", "B"), Some("9"));
    }

    #[test]
    fn label_collision_errors_under_strict_policy() {
        let a = table("g1\t1\n", "x/A.tsv");
        let a2 = table("g1\t2\n", "y/A.tsv");
        let err = CountMatrix::from_tables(vec![a, a2], CollisionPolicy::Error).unwrap_err();
        match err {
            MergeError::LabelCollision { label, first, second } => {
                assert_eq!(label, "A");
                assert_eq!(first, PathBuf::from("x/A.tsv"));
                assert_eq!(second, PathBuf::from("y/A.tsv"));
            }
            e => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn empty_input_list_is_rejected() {
        let err = CountMatrix::from_tables(Vec::new(), CollisionPolicy::Overwrite).unwrap_err();
        assert!(matches!(err, MergeError::NoInputs));
    }

    #[test]
    fn dataframe_has_index_and_sample_columns() {
        let a = table("g1\t5\n", "A.tsv");
        let b = table("g2\t7\n", "B.tsv");
        let mat = CountMatrix::from_tables(vec![a, b], CollisionPolicy::Overwrite).unwrap();
        let df = mat.to_df("gene_id").unwrap();

        assert_eq!(df.get_column_names(), vec!["gene_id", "A", "B"]);
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("A").unwrap().null_count(), 1);
    }

    #[test]
    fn index_name_may_not_shadow_a_sample() {
        let g = table("g1\t5\n", "gene.tsv");
        let mat = CountMatrix::from_tables(vec![g], CollisionPolicy::Overwrite).unwrap();
        assert!(matches!(
            mat.to_df("gene"),
            Err(MergeError::IndexNameClash(_))
        ));
        assert!(mat.to_df("gene_id").is_ok());
    }
}
