use std::collections::HashSet;

use zdw_wire::{ColumnDescriptor, FileHeader, FormatVersion, StorageClass};

use crate::error::DecodeError;

/// Synthetic column holding the input's base name.
pub const VIRTUAL_BASENAME: &str = "virtual_export_basename";

/// Synthetic column holding the 1-based row number.
pub const VIRTUAL_ROW: &str = "virtual_export_row";

const VIRTUAL_BASENAME_TYPE: &str = "varchar(255)";
const VIRTUAL_ROW_TYPE: &str = "bigint(20) unsigned";
const MISSING_COLUMN_TYPE: &str = "text";

/// How a projection list is interpreted.
///
/// | Rule                         | Unknown name       | Output order            |
/// |------------------------------|--------------------|-------------------------|
/// | `FailOnInvalidColumn`        | BadRequestedColumn | request order           |
/// | `SkipInvalidColumn`          | dropped            | request order           |
/// | `ExcludeSpecifiedColumns`    | ignored            | on-disk minus the names |
/// | `ProvideEmptyMissingColumns` | empty column       | request order           |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InclusionRule {
    #[default]
    FailOnInvalidColumn,
    SkipInvalidColumn,
    ExcludeSpecifiedColumns,
    ProvideEmptyMissingColumns,
}

/// Header-derived column metadata for one file.
#[derive(Clone, Debug)]
pub struct ColumnCatalog {
    version: FormatVersion,
    columns: Vec<ColumnDescriptor>,
    classes: Vec<StorageClass>,
    decimal_factor: Option<f64>,
}

impl ColumnCatalog {
    #[must_use]
    pub fn from_header(header: FileHeader) -> Self {
        let classes = header
            .columns
            .iter()
            .map(|c| c.column_type.storage(header.version))
            .collect();
        Self {
            version: header.version,
            columns: header.columns,
            classes,
            decimal_factor: header.decimal_factor,
        }
    }

    #[must_use]
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Storage class of every on-disk column, in column order.
    #[must_use]
    pub fn classes(&self) -> &[StorageClass] {
        &self.classes
    }

    #[must_use]
    pub fn decimal_factor(&self) -> Option<f64> {
        self.decimal_factor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// On-disk position of the first column called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// One column of decoded output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputColumn {
    /// On-disk column at this index.
    Disk(usize),
    /// Requested name absent from the file, always empty.
    Missing(String),
    VirtualBaseName,
    VirtualRow,
}

/// Mapping from on-disk columns to output positions.
///
/// Every on-disk column is either mapped to exactly one dense output
/// position or excluded. Built once per request and reused for every row.
#[derive(Clone, Debug)]
pub struct ProjectionPlan {
    outputs: Vec<OutputColumn>,
    positions: Vec<Option<usize>>,
}

impl ProjectionPlan {
    /// Every on-disk column in header order.
    #[must_use]
    pub fn all(catalog: &ColumnCatalog) -> Self {
        Self::from_outputs(catalog, (0..catalog.len()).map(OutputColumn::Disk).collect())
    }

    /// Build a plan from a list of names under `rule`.
    ///
    /// Virtual column names are always accepted. A name requested twice
    /// keeps its first position.
    ///
    /// # Errors
    ///
    /// [`DecodeError::BadRequestedColumn`] for an unknown name under
    /// [`InclusionRule::FailOnInvalidColumn`].
    pub fn build<S: AsRef<str>>(
        catalog: &ColumnCatalog,
        names: &[S],
        rule: InclusionRule,
    ) -> Result<Self, DecodeError> {
        if rule == InclusionRule::ExcludeSpecifiedColumns {
            let excluded: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
            let outputs = catalog
                .columns()
                .iter()
                .enumerate()
                .filter(|(_, c)| !excluded.contains(c.name.as_str()))
                .map(|(i, _)| OutputColumn::Disk(i))
                .collect();
            return Ok(Self::from_outputs(catalog, outputs));
        }

        let mut seen = HashSet::new();
        let mut outputs = Vec::with_capacity(names.len());
        for name in names.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            let column = if let Some(index) = catalog.find(name) {
                OutputColumn::Disk(index)
            } else if name == VIRTUAL_BASENAME {
                OutputColumn::VirtualBaseName
            } else if name == VIRTUAL_ROW {
                OutputColumn::VirtualRow
            } else {
                match rule {
                    InclusionRule::FailOnInvalidColumn => {
                        return Err(DecodeError::BadRequestedColumn {
                            name: name.to_string(),
                        });
                    }
                    InclusionRule::SkipInvalidColumn => continue,
                    _ => OutputColumn::Missing(name.to_string()),
                }
            };
            outputs.push(column);
        }
        Ok(Self::from_outputs(catalog, outputs))
    }

    /// Build a plan from comma-separated names; items are trimmed and
    /// empty items ignored.
    ///
    /// # Errors
    ///
    /// As for [`build`](Self::build).
    pub fn build_csv(
        catalog: &ColumnCatalog,
        csv: &str,
        rule: InclusionRule,
    ) -> Result<Self, DecodeError> {
        let names: Vec<&str> = split_column_list(csv).collect();
        Self::build(catalog, &names, rule)
    }

    fn from_outputs(catalog: &ColumnCatalog, outputs: Vec<OutputColumn>) -> Self {
        let mut positions = vec![None; catalog.len()];
        for (pos, column) in outputs.iter().enumerate() {
            if let OutputColumn::Disk(index) = column {
                positions[*index] = Some(pos);
            }
        }
        Self { outputs, positions }
    }

    #[must_use]
    pub fn outputs(&self) -> &[OutputColumn] {
        &self.outputs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Output position of on-disk column `index`, or `None` if excluded.
    #[must_use]
    pub fn position_of(&self, index: usize) -> Option<usize> {
        self.positions.get(index).copied().flatten()
    }

    #[must_use]
    pub fn uses_virtual_columns(&self) -> bool {
        self.outputs
            .iter()
            .any(|c| matches!(c, OutputColumn::VirtualBaseName | OutputColumn::VirtualRow))
    }

    /// Output column names in output order.
    #[must_use]
    pub fn names<'a>(&'a self, catalog: &'a ColumnCatalog) -> Vec<&'a str> {
        self.outputs
            .iter()
            .map(|column| match column {
                OutputColumn::Disk(i) => catalog.columns()[*i].name.as_str(),
                OutputColumn::Missing(name) => name.as_str(),
                OutputColumn::VirtualBaseName => VIRTUAL_BASENAME,
                OutputColumn::VirtualRow => VIRTUAL_ROW,
            })
            .collect()
    }

    /// Desc-file type text of every output column, in output order.
    #[must_use]
    pub fn desc_types(&self, catalog: &ColumnCatalog) -> Vec<String> {
        self.outputs
            .iter()
            .map(|column| match column {
                OutputColumn::Disk(i) => catalog.columns()[*i].desc_type(),
                OutputColumn::Missing(_) => MISSING_COLUMN_TYPE.to_string(),
                OutputColumn::VirtualBaseName => VIRTUAL_BASENAME_TYPE.to_string(),
                OutputColumn::VirtualRow => VIRTUAL_ROW_TYPE.to_string(),
            })
            .collect()
    }
}

/// Split a comma-separated column list, trimming items and skipping empties.
pub fn split_column_list(csv: &str) -> impl Iterator<Item = &str> {
    csv.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use zdw_wire::ColumnType;

    use super::*;

    fn catalog() -> ColumnCatalog {
        let column = |name: &str, column_type: ColumnType| ColumnDescriptor {
            name: name.to_string(),
            column_type,
            char_size: Some(10).filter(|_| column_type == ColumnType::Varchar),
        };
        ColumnCatalog::from_header(FileHeader {
            version: FormatVersion::new(9).unwrap(),
            columns: vec![
                column("A", ColumnType::Varchar),
                column("B", ColumnType::Tiny),
                column("C", ColumnType::Text),
            ],
            decimal_factor: None,
        })
    }

    fn outputs(plan: &ProjectionPlan) -> Vec<OutputColumn> {
        plan.outputs().to_vec()
    }

    #[test]
    fn all_columns_in_disk_order() {
        let plan = ProjectionPlan::all(&catalog());
        assert_eq!(
            outputs(&plan),
            vec![OutputColumn::Disk(0), OutputColumn::Disk(1), OutputColumn::Disk(2)]
        );
        assert_eq!(plan.position_of(2), Some(2));
    }

    #[test]
    fn exclusion_keeps_disk_order() {
        let plan =
            ProjectionPlan::build(&catalog(), &["B", "nope"], InclusionRule::ExcludeSpecifiedColumns)
                .unwrap();
        assert_eq!(outputs(&plan), vec![OutputColumn::Disk(0), OutputColumn::Disk(2)]);
        assert_eq!(plan.position_of(1), None);
        assert_eq!(plan.position_of(2), Some(1));
    }

    #[test]
    fn request_order_and_reordering() {
        let plan =
            ProjectionPlan::build(&catalog(), &["C", "A"], InclusionRule::FailOnInvalidColumn)
                .unwrap();
        assert_eq!(outputs(&plan), vec![OutputColumn::Disk(2), OutputColumn::Disk(0)]);
        assert_eq!(plan.position_of(0), Some(1));
        assert_eq!(plan.position_of(1), None);
    }

    #[test]
    fn unknown_name_fails_under_fail_rule() {
        let result = ProjectionPlan::build(&catalog(), &["A", "D"], InclusionRule::FailOnInvalidColumn);
        assert!(matches!(
            result,
            Err(DecodeError::BadRequestedColumn { ref name }) if name == "D"
        ));
    }

    #[test]
    fn unknown_name_skipped_under_skip_rule() {
        let plan =
            ProjectionPlan::build(&catalog(), &["D", "B"], InclusionRule::SkipInvalidColumn).unwrap();
        assert_eq!(outputs(&plan), vec![OutputColumn::Disk(1)]);
    }

    #[test]
    fn unknown_name_padded_under_pad_rule() {
        let cat = catalog();
        let plan =
            ProjectionPlan::build(&cat, &["A", "D"], InclusionRule::ProvideEmptyMissingColumns)
                .unwrap();
        assert_eq!(
            outputs(&plan),
            vec![OutputColumn::Disk(0), OutputColumn::Missing("D".into())]
        );
        assert_eq!(plan.names(&cat), vec!["A", "D"]);
        assert_eq!(plan.desc_types(&cat), vec!["varchar(10)", "text"]);
    }

    #[test]
    fn duplicates_keep_first_position() {
        let plan =
            ProjectionPlan::build(&catalog(), &["B", "A", "B"], InclusionRule::FailOnInvalidColumn)
                .unwrap();
        assert_eq!(outputs(&plan), vec![OutputColumn::Disk(1), OutputColumn::Disk(0)]);
    }

    #[test]
    fn virtual_columns_are_always_known() {
        let cat = catalog();
        let plan = ProjectionPlan::build(
            &cat,
            &[VIRTUAL_ROW, "A", VIRTUAL_BASENAME],
            InclusionRule::FailOnInvalidColumn,
        )
        .unwrap();
        assert!(plan.uses_virtual_columns());
        assert_eq!(
            plan.desc_types(&cat),
            vec!["bigint(20) unsigned", "varchar(10)", "varchar(255)"]
        );
    }

    #[test]
    fn csv_lists_are_trimmed() {
        let plan =
            ProjectionPlan::build_csv(&catalog(), " C , ,A,", InclusionRule::FailOnInvalidColumn)
                .unwrap();
        assert_eq!(outputs(&plan), vec![OutputColumn::Disk(2), OutputColumn::Disk(0)]);
    }

    #[test]
    fn empty_selection_is_allowed() {
        let plan =
            ProjectionPlan::build(&catalog(), &["A", "B", "C"], InclusionRule::ExcludeSpecifiedColumns)
                .unwrap();
        assert!(plan.is_empty());
    }
}
