//! Recovery for a known upstream corruption of the `application` table.
//!
//! Some `application` exports contain a stray field delimiter inside the
//! description, which splits one field in two and shifts the trailing
//! columns right by one. Gluing the two halves back together restores the
//! declared layout.

use std::path::Path;

use tracing::debug;

use super::header::Column;

const TABLE: &str = "application";
const COLUMN_COUNT: usize = 17;
const DESCRIPTION_INDEX: usize = 13;
const DESCRIPTION: &str = "description";
const EXTRA_FIELDS: usize = 1;

/// Repair applicable to one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DescriptionRepair {
    index: usize,
    expected: usize,
}

impl DescriptionRepair {
    /// Returns the repair rule when the export is the affected table.
    pub(crate) fn for_export(file_name: &str, columns: &[Column]) -> Option<Self> {
        let base = Path::new(file_name).file_name()?.to_str()?;
        let applies = base == TABLE
            && columns.len() == COLUMN_COUNT
            && columns[DESCRIPTION_INDEX].name == DESCRIPTION;
        applies.then_some(Self {
            index: DESCRIPTION_INDEX,
            expected: COLUMN_COUNT,
        })
    }

    /// Merges the split description, leaving other records untouched.
    pub(crate) fn apply(self, mut fields: Vec<String>) -> Vec<String> {
        if fields.len() != self.expected + EXTRA_FIELDS {
            return fields;
        }
        let tail = fields.remove(self.index + 1);
        fields[self.index].push_str(&tail);
        debug!(index = self.index, "merged split description field");
        fields
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn application_columns() -> Vec<Column> {
        (0..COLUMN_COUNT)
            .map(|i| Column {
                name: if i == DESCRIPTION_INDEX {
                    DESCRIPTION.to_string()
                } else {
                    format!("c{i}")
                },
                db_type: "VARCHAR(1000)".to_string(),
            })
            .collect()
    }

    fn record(len: usize) -> Vec<String> {
        (0..len).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_applies_only_to_application_table() {
        let columns = application_columns();
        assert!(DescriptionRepair::for_export("itunes20240101/application", &columns).is_some());
        assert!(DescriptionRepair::for_export("application", &columns).is_some());
        assert!(DescriptionRepair::for_export("itunes20240101/application_detail", &columns).is_none());
        assert!(DescriptionRepair::for_export("application", &columns[..16]).is_none());

        let mut renamed = application_columns();
        renamed[DESCRIPTION_INDEX].name = "title".to_string();
        assert!(DescriptionRepair::for_export("application", &renamed).is_none());
    }

    #[test]
    fn test_merges_one_extra_field_into_description() {
        let repair = DescriptionRepair::for_export("application", &application_columns()).unwrap();
        let fixed = repair.apply(record(18));
        assert_eq!(fixed.len(), 17);
        assert_eq!(fixed[13], "f13f14");
        assert_eq!(fixed[14], "f15");
        assert_eq!(fixed[16], "f17");
        assert_eq!(fixed[12], "f12");
    }

    #[test]
    fn test_other_counts_pass_through() {
        let repair = DescriptionRepair::for_export("application", &application_columns()).unwrap();
        assert_eq!(repair.apply(record(19)).len(), 19);
        assert_eq!(repair.apply(record(17)), record(17));
    }
}
