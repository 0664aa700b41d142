use std::path::PathBuf;

/// What to do when two inputs derive the same [`SampleLabel`](crate::SampleLabel).
///
/// # Variants
///
/// * `Overwrite` - The later input replaces the earlier input's column wholesale. The column
///   keeps the position of the first input with that label, and a warning is logged. This is
///   the default and matches how the matrix has always been built by the pipeline.
/// * `Error` - Abort the merge with [`MergeError::LabelCollision`](crate::MergeError::LabelCollision).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    #[default]
    Overwrite,
    Error,
}

/// Configuration for merging per-sample count tables into one matrix.
///
/// # Fields
///
/// * `inputs`: The count tables to merge, in column order.
/// * `output`: The path of the delimited matrix to write. Its parent directory must exist.
/// * `has_header`: If `true`, the first non-blank line of every input is a header and is skipped.
/// * `collision`: How duplicate sample labels are handled, see [`CollisionPolicy`].
/// * `index_name`: Header of the leading gene id column.
/// * `delimiter`: Field separator of the output file.
///
/// # Examples
///
/// ```rust
/// use countmerge::MergeOptions;
/// let opts = MergeOptions::new(vec!["A.tsv".into(), "B.tsv".into()], "out.csv");
/// assert_eq!(opts.index_name, "gene");
/// assert_eq!(opts.delimiter, b',');
/// assert!(!opts.has_header);
/// ```
#[derive(Clone, Debug)]
pub struct MergeOptions {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub has_header: bool,
    pub collision: CollisionPolicy,
    pub index_name: String,
    pub delimiter: u8,
}

impl MergeOptions {
    /// Creates options for merging `inputs` into `output` with the default layout:
    /// no input headers, overwrite on label collision, a `gene` index column and
    /// comma-separated output.
    pub fn new<T: Into<PathBuf>>(inputs: Vec<PathBuf>, output: T) -> MergeOptions {
        MergeOptions {
            inputs,
            output: output.into(),
            has_header: false,
            collision: CollisionPolicy::default(),
            index_name: String::from("gene"),
            delimiter: b',',
        }
    }

    pub fn with_header(mut self, has_header: bool) -> MergeOptions {
        self.has_header = has_header;
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> MergeOptions {
        self.collision = collision;
        self
    }

    pub fn with_index_name<T: Into<String>>(mut self, index_name: T) -> MergeOptions {
        self.index_name = index_name.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> MergeOptions {
        self.delimiter = delimiter;
        self
    }
}

/// Names of the external SRA toolkit binaries that the fetch helpers shell out to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    pub prefetch_bin: String,
    pub fasterq_bin: String,
}

impl Default for FetchOptions {
    fn default() -> FetchOptions {
        FetchOptions {
            prefetch_bin: String::from("prefetch"),
            fasterq_bin: String::from("fasterq-dump"),
        }
    }
}
