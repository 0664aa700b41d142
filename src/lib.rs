//! countmerge merges the per-sample gene-count tables written by
//! [VERSE](https://github.com/qinzhu/VERSE) into a single gene-by-sample matrix, and
//! carries the small download helpers that feed the quantification step with reads from
//! the [Sequence Read Archive](https://www.ncbi.nlm.nih.gov/sra).
//!
//! The merge is a full outer join on gene id: every gene seen in any input gets a row,
//! every input gets a column named after its file, and genes absent from a sample are left
//! empty. The whole matrix is built in memory before anything is written.

pub mod count_matrix;
pub mod error;
pub mod fetch;
pub mod merge_utils;
pub mod options;
pub mod reader;

pub use count_matrix::{merge_counts, CountMatrix};
pub use error::{FetchError, MergeError};
pub use merge_utils::SampleLabel;
pub use options::{CollisionPolicy, FetchOptions, MergeOptions};
pub use reader::CountTable;
