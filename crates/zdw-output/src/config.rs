use std::path::{Path, PathBuf};

use zdw_decoder::InclusionRule;

/// Default extension of data and desc files.
pub const DEFAULT_EXTENSION: &str = "sql";

/// Where and how decoded output is written.
///
/// ```text
/// ┌──────────────────┬──────────────────────────────────────────────────┐
/// │ Field            │ Purpose                                          │
/// ├──────────────────┼──────────────────────────────────────────────────┤
/// │ output_basename  │ Overrides the input base name for output files   │
/// │ extension        │ Suffix of data and desc files (default "sql")    │
/// │ output_dir       │ Directory receiving the files (default ".")      │
/// │ to_stdout        │ Write rows to stdout instead of a data file      │
/// │ column_separator │ Placed between columns of a data line            │
/// │ desc_separator   │ Placed between a column name and its type        │
/// │ desc_delimiter   │ Terminates each desc entry                       │
/// │ ordered          │ Route rows through the sequence reorder buffer   │
/// └──────────────────┴──────────────────────────────────────────────────┘
/// ```
///
/// The data file is `<output_dir>/<basename>.<extension>` and the desc
/// file `<output_dir>/<basename>.desc.<extension>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub output_basename: Option<String>,
    pub extension: String,
    pub output_dir: PathBuf,
    pub to_stdout: bool,
    pub column_separator: String,
    pub desc_separator: String,
    pub desc_delimiter: String,
    pub ordered: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_basename: None,
            extension: DEFAULT_EXTENSION.to_string(),
            output_dir: PathBuf::from("."),
            to_stdout: false,
            column_separator: "\t".to_string(),
            desc_separator: "\t".to_string(),
            desc_delimiter: "\n".to_string(),
            ordered: false,
        }
    }
}

impl OutputConfig {
    /// Same defaults, writing into `dir`.
    #[must_use]
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// The basename used for output: the override if set, else the
    /// input's base name.
    #[must_use]
    pub fn basename<'a>(&'a self, input_base: &'a str) -> &'a str {
        self.output_basename.as_deref().unwrap_or(input_base)
    }

    #[must_use]
    pub fn data_path(&self, input_base: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.basename(input_base), self.extension))
    }

    #[must_use]
    pub fn desc_path(&self, input_base: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.desc.{}", self.basename(input_base), self.extension))
    }
}

/// Run mode of a file unconversion.
///
/// `test_only` decodes every row and discards it; `desc_only` writes the
/// desc file and reads no rows. When both are set, `desc_only` wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnconvertOptions {
    /// Log per-block progress at `info`.
    pub show_status: bool,
    /// Suppress the per-file summary.
    pub quiet: bool,
    pub test_only: bool,
    pub desc_only: bool,
}

/// Which columns to emit.
///
/// `columns: None` emits every on-disk column in header order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    pub columns: Option<Vec<String>>,
    pub rule: InclusionRule,
}

impl ColumnSelection {
    /// Selection from a comma-separated list.
    #[must_use]
    pub fn from_csv(csv: &str, rule: InclusionRule) -> Self {
        Self {
            columns: Some(
                zdw_decoder::catalog::split_column_list(csv)
                    .map(str::to_string)
                    .collect(),
            ),
            rule,
        }
    }
}
