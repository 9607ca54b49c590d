//! The template store: a typed facade over the Template table, one row
//! per user-defined annotation control. Keeps labels unique, standard
//! controls present, and the two display orderings dense.

use serde::{Deserialize, Serialize};

use crate::database::SqlDatabase;
use crate::error::{Error, Result};
use crate::schema::{ColumnDefinition, ColumnTuple, ColumnTuplesWithWhere, SqlType};

pub const TEMPLATE_TABLE: &str = "TemplateTable";

// Template table column names.
pub const ID: &str = "Id";
pub const CONTROL_ORDER: &str = "ControlOrder";
pub const SPREADSHEET_ORDER: &str = "SpreadsheetOrder";
pub const TYPE: &str = "Type";
pub const DEFAULT_VALUE: &str = "DefaultValue";
pub const LABEL: &str = "Label";
pub const DATA_LABEL: &str = "DataLabel";
pub const TOOLTIP: &str = "Tooltip";
pub const VISIBLE: &str = "Visible";
pub const COPYABLE: &str = "Copyable";
pub const LIST: &str = "List";

/// Data labels of the built-in standard controls.
pub const FILE: &str = "File";
pub const RELATIVE_PATH: &str = "RelativePath";
pub const FOLDER: &str = "Folder";
pub const DATE_TIME: &str = "DateTime";
pub const UTC_OFFSET: &str = "UtcOffset";
pub const DELETE_FLAG: &str = "DeleteFlag";
/// Deprecated predecessor of DeleteFlag, still found in old files.
pub const MARK_FOR_DELETION: &str = "MarkForDeletion";

pub const DEFAULT_DATE_TIME: &str = "1900-01-01 12:00:00";
pub const DEFAULT_UTC_OFFSET: &str = "0.0";
pub const BOOLEAN_FALSE: &str = "false";
pub const BOOLEAN_TRUE: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlType {
    // User-defined controls.
    Note,
    Counter,
    FixedChoice,
    Flag,
    // Standard controls every template carries.
    File,
    RelativePath,
    Folder,
    DateTime,
    UtcOffset,
    DeleteFlag,
}

impl ControlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Note => "Note",
            ControlType::Counter => "Counter",
            ControlType::FixedChoice => "FixedChoice",
            ControlType::Flag => "Flag",
            ControlType::File => "File",
            ControlType::RelativePath => "RelativePath",
            ControlType::Folder => "Folder",
            ControlType::DateTime => "DateTime",
            ControlType::UtcOffset => "UtcOffset",
            ControlType::DeleteFlag => "DeleteFlag",
        }
    }

    /// The column type a control of this kind maps to in the data table.
    pub fn sql_type(&self) -> SqlType {
        match self {
            ControlType::Counter => SqlType::Integer,
            ControlType::UtcOffset => SqlType::Real,
            ControlType::DateTime => SqlType::DateTime,
            _ => SqlType::Text,
        }
    }

    pub fn is_standard(&self) -> bool {
        !matches!(
            self,
            ControlType::Note | ControlType::Counter | ControlType::FixedChoice | ControlType::Flag
        )
    }
}

pub fn parse_control_type(s: &str) -> ControlType {
    match s {
        "Counter" => ControlType::Counter,
        "FixedChoice" => ControlType::FixedChoice,
        "Flag" => ControlType::Flag,
        "File" => ControlType::File,
        "RelativePath" => ControlType::RelativePath,
        "Folder" => ControlType::Folder,
        "DateTime" => ControlType::DateTime,
        "UtcOffset" => ControlType::UtcOffset,
        "DeleteFlag" => ControlType::DeleteFlag,
        _ => ControlType::Note,
    }
}

/// One row of the Template table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRow {
    pub id: i64,
    pub control_order: i64,
    pub spreadsheet_order: i64,
    pub control_type: ControlType,
    pub default_value: String,
    pub label: String,
    pub data_label: String,
    pub tooltip: String,
    pub visible: bool,
    pub copyable: bool,
    pub list: String,
}

impl ControlRow {
    pub(crate) fn tuples(&self) -> Vec<ColumnTuple> {
        vec![
            ColumnTuple::new(CONTROL_ORDER, &self.control_order.to_string()),
            ColumnTuple::new(SPREADSHEET_ORDER, &self.spreadsheet_order.to_string()),
            ColumnTuple::new(TYPE, self.control_type.as_str()),
            ColumnTuple::new(DEFAULT_VALUE, &self.default_value),
            ColumnTuple::new(LABEL, &self.label),
            ColumnTuple::new(DATA_LABEL, &self.data_label),
            ColumnTuple::new(TOOLTIP, &self.tooltip),
            ColumnTuple::new(VISIBLE, bool_str(self.visible)),
            ColumnTuple::new(COPYABLE, bool_str(self.copyable)),
            ColumnTuple::new(LIST, &self.list),
        ]
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        BOOLEAN_TRUE
    } else {
        BOOLEAN_FALSE
    }
}

/// The loaded template: rows ordered by ControlOrder.
#[derive(Debug, Clone)]
pub struct ControlTable {
    rows: Vec<ControlRow>,
}

impl ControlTable {
    pub fn table_definitions() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new(ID, SqlType::Integer).unwrap(),
            ColumnDefinition::new(CONTROL_ORDER, SqlType::Integer).unwrap(),
            ColumnDefinition::new(SPREADSHEET_ORDER, SqlType::Integer).unwrap(),
            ColumnDefinition::new(TYPE, SqlType::Text).unwrap(),
            ColumnDefinition::new(DEFAULT_VALUE, SqlType::Text).unwrap(),
            ColumnDefinition::new(LABEL, SqlType::Text).unwrap(),
            ColumnDefinition::new(DATA_LABEL, SqlType::Text).unwrap(),
            ColumnDefinition::new(TOOLTIP, SqlType::Text).unwrap(),
            ColumnDefinition::with_default(VISIBLE, SqlType::Text, BOOLEAN_TRUE).unwrap(),
            ColumnDefinition::with_default(COPYABLE, SqlType::Text, BOOLEAN_FALSE).unwrap(),
            ColumnDefinition::with_default(LIST, SqlType::Text, "").unwrap(),
        ]
    }

    /// Create a fresh Template table seeded with the standard controls.
    /// Destructive on an existing table, per the create_table contract.
    pub fn create(db: &mut SqlDatabase) -> Result<()> {
        db.create_table(TEMPLATE_TABLE, &Self::table_definitions())?;
        Self::write_rows(db, &standard_controls())
    }

    /// Create a Template table holding the given rows, used to embed a
    /// copy of the template inside a data file.
    pub fn create_from_rows(db: &mut SqlDatabase, rows: &[ControlRow]) -> Result<()> {
        db.create_table(TEMPLATE_TABLE, &Self::table_definitions())?;
        Self::write_rows(db, rows)
    }

    fn write_rows(db: &mut SqlDatabase, rows: &[ControlRow]) -> Result<()> {
        let tuples: Vec<Vec<ColumnTuple>> = rows.iter().map(|row| row.tuples()).collect();
        db.insert(TEMPLATE_TABLE, &tuples)?;
        Ok(())
    }

    pub fn load(db: &SqlDatabase) -> Result<Self> {
        let mut stmt = db.conn().prepare(&format!(
            "SELECT Id, ControlOrder, SpreadsheetOrder, Type, DefaultValue, Label, DataLabel, \
             Tooltip, Visible, Copyable, List FROM {TEMPLATE_TABLE} ORDER BY ControlOrder"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ControlRow {
                    id: row.get(0)?,
                    control_order: row.get(1)?,
                    spreadsheet_order: row.get(2)?,
                    control_type: parse_control_type(&row.get::<_, String>(3)?),
                    default_value: row.get(4)?,
                    label: row.get(5)?,
                    data_label: row.get(6)?,
                    tooltip: row.get(7)?,
                    visible: row.get::<_, String>(8)? == BOOLEAN_TRUE,
                    copyable: row.get::<_, String>(9)? == BOOLEAN_TRUE,
                    list: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ControlRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, data_label: &str) -> Option<&ControlRow> {
        self.rows.iter().find(|r| r.data_label == data_label)
    }

    /// Insert any missing standard controls, appended after the existing
    /// rows with the next free order values. Legacy files predate several
    /// of them. Returns the number inserted.
    pub fn ensure_standard_controls(db: &mut SqlDatabase) -> Result<usize> {
        let existing = Self::load(db)?;
        let mut next_control = existing.rows.iter().map(|r| r.control_order).max().unwrap_or(0);
        let mut next_spreadsheet = existing
            .rows
            .iter()
            .map(|r| r.spreadsheet_order)
            .max()
            .unwrap_or(0);

        let mut missing = Vec::new();
        for control in standard_controls() {
            if control.control_type == ControlType::File
                || control.control_type == ControlType::Folder
            {
                // Present in every file shape ever shipped.
                continue;
            }
            if existing.find(&control.data_label).is_none() {
                let mut row = control.clone();
                next_control += 1;
                next_spreadsheet += 1;
                row.control_order = next_control;
                row.spreadsheet_order = next_spreadsheet;
                missing.push(row);
            }
        }
        if missing.is_empty() {
            return Ok(0);
        }
        log::info!(
            "template: inserting {} missing standard control(s): {}",
            missing.len(),
            missing
                .iter()
                .map(|r| r.data_label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let tuples: Vec<Vec<ColumnTuple>> = missing.iter().map(|r| r.tuples()).collect();
        db.insert(TEMPLATE_TABLE, &tuples)?;
        Ok(missing.len())
    }

    /// Guarantee every row has a non-empty, unique DataLabel and Label,
    /// generating type-prefixed ones where needed. Returns rows repaired.
    pub fn ensure_labels(db: &mut SqlDatabase) -> Result<usize> {
        let table = Self::load(db)?;
        let mut seen: Vec<String> = Vec::new();
        let mut seen_labels: Vec<String> = Vec::new();
        let mut mutations = Vec::new();

        for row in &table.rows {
            let mut data_label = row.data_label.trim().to_string();
            let mut label = row.label.trim().to_string();
            let mut changed = false;

            if data_label.is_empty() || seen.contains(&data_label) {
                data_label = generate_label(row.control_type, &seen);
                changed = true;
            }
            if label.is_empty() {
                label = data_label.clone();
                changed = true;
            }
            // Display labels must be unique too, not just data labels.
            if seen_labels.contains(&label) {
                label = generate_label(row.control_type, &seen_labels);
                changed = true;
            }
            seen.push(data_label.clone());
            seen_labels.push(label.clone());

            if changed {
                log::info!(
                    "template: repairing labels for control {} -> {data_label}",
                    row.id
                );
                mutations.push(ColumnTuplesWithWhere::for_id(
                    vec![
                        ColumnTuple::new(DATA_LABEL, &data_label),
                        ColumnTuple::new(LABEL, &label),
                    ],
                    row.id,
                ));
            }
        }
        let repaired = mutations.len();
        db.update(TEMPLATE_TABLE, &mutations)?;
        Ok(repaired)
    }

    /// Renumber both orderings to dense one-based sequences when a legacy
    /// file carries gaps, duplicates, or zero-based numbering.
    pub fn repair_orders(db: &mut SqlDatabase) -> Result<usize> {
        let table = Self::load(db)?;
        let n = table.rows.len();
        let control_ok =
            validate_orders(&table.rows.iter().map(|r| r.control_order).collect::<Vec<_>>(), n)
                .is_ok();
        let spreadsheet_ok = validate_orders(
            &table.rows.iter().map(|r| r.spreadsheet_order).collect::<Vec<_>>(),
            n,
        )
        .is_ok();
        if control_ok && spreadsheet_ok {
            return Ok(0);
        }

        log::info!("template: renumbering {n} control order values to a dense sequence");
        // Rows load sorted by ControlOrder; renumber in that order. The
        // spreadsheet ordering is renumbered by its own relative order.
        let mut by_spreadsheet: Vec<(i64, i64)> = table
            .rows
            .iter()
            .map(|r| (r.id, r.spreadsheet_order))
            .collect();
        by_spreadsheet.sort_by_key(|(_, order)| *order);
        let spreadsheet_rank: std::collections::HashMap<i64, i64> = by_spreadsheet
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i as i64 + 1))
            .collect();

        let mutations: Vec<ColumnTuplesWithWhere> = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                ColumnTuplesWithWhere::for_id(
                    vec![
                        ColumnTuple::new(CONTROL_ORDER, &(i as i64 + 1).to_string()),
                        ColumnTuple::new(
                            SPREADSHEET_ORDER,
                            &spreadsheet_rank[&row.id].to_string(),
                        ),
                    ],
                    row.id,
                )
            })
            .collect();
        let count = mutations.len();
        db.update(TEMPLATE_TABLE, &mutations)?;
        Ok(count)
    }

    pub fn set_control_order(db: &mut SqlDatabase, data_label: &str, position: i64) -> Result<()> {
        Self::reorder(db, data_label, position, CONTROL_ORDER, |r| r.control_order)
    }

    pub fn set_spreadsheet_order(
        db: &mut SqlDatabase,
        data_label: &str,
        position: i64,
    ) -> Result<()> {
        Self::reorder(db, data_label, position, SPREADSHEET_ORDER, |r| {
            r.spreadsheet_order
        })
    }

    /// Move one control to `position` (one-based) in the given ordering,
    /// shifting the displaced controls so the order values stay a dense
    /// 1..N permutation. The permutation is validated before persisting.
    fn reorder(
        db: &mut SqlDatabase,
        data_label: &str,
        position: i64,
        order_column: &str,
        order_of: fn(&ControlRow) -> i64,
    ) -> Result<()> {
        let table = Self::load(db)?;
        let mut ordered: Vec<&ControlRow> = table.rows.iter().collect();
        ordered.sort_by_key(|r| order_of(r));

        let index = ordered
            .iter()
            .position(|r| r.data_label == data_label)
            .ok_or_else(|| Error::ControlNotFound(data_label.to_string()))?;
        let moved = ordered.remove(index);
        let target = ((position - 1).max(0) as usize).min(ordered.len());
        ordered.insert(target, moved);

        let orders: Vec<i64> = (1..=ordered.len() as i64).collect();
        validate_orders(&orders, ordered.len())?;

        let mutations: Vec<ColumnTuplesWithWhere> = ordered
            .iter()
            .zip(&orders)
            .filter(|(row, order)| order_of(row) != **order)
            .map(|(row, order)| {
                ColumnTuplesWithWhere::for_id(
                    vec![ColumnTuple::new(order_column, &order.to_string())],
                    row.id,
                )
            })
            .collect();
        db.update(TEMPLATE_TABLE, &mutations)?;
        Ok(())
    }
}

/// Order values must form exactly {1..N}.
pub fn validate_orders(orders: &[i64], expected: usize) -> Result<()> {
    let mut sorted = orders.to_vec();
    sorted.sort_unstable();
    let dense: Vec<i64> = (1..=expected as i64).collect();
    if sorted != dense {
        return Err(Error::InvalidOrdering {
            expected,
            found: orders.to_vec(),
        });
    }
    Ok(())
}

fn generate_label(control_type: ControlType, taken: &[String]) -> String {
    let prefix = match control_type {
        ControlType::Counter => "Counter",
        ControlType::FixedChoice => "Choice",
        ControlType::Flag => "Flag",
        _ => "Note",
    };
    let mut counter = 0;
    loop {
        let candidate = format!("{prefix}{counter}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// The canonical standard controls, in template order.
pub fn standard_controls() -> Vec<ControlRow> {
    let make = |order: i64,
                control_type: ControlType,
                data_label: &str,
                default_value: &str,
                tooltip: &str,
                visible: bool| ControlRow {
        id: 0,
        control_order: order,
        spreadsheet_order: order,
        control_type,
        default_value: default_value.to_string(),
        label: data_label.to_string(),
        data_label: data_label.to_string(),
        tooltip: tooltip.to_string(),
        visible,
        copyable: false,
        list: String::new(),
    };
    vec![
        make(1, ControlType::File, FILE, "", "The file name", true),
        make(
            2,
            ControlType::RelativePath,
            RELATIVE_PATH,
            "",
            "Path from the root folder to the file",
            false,
        ),
        make(3, ControlType::Folder, FOLDER, "", "The root folder name", false),
        make(
            4,
            ControlType::DateTime,
            DATE_TIME,
            DEFAULT_DATE_TIME,
            "Date and time the image was taken",
            true,
        ),
        make(
            5,
            ControlType::UtcOffset,
            UTC_OFFSET,
            DEFAULT_UTC_OFFSET,
            "UTC offset of the date and time",
            false,
        ),
        make(
            6,
            ControlType::DeleteFlag,
            DELETE_FLAG,
            BOOLEAN_FALSE,
            "Mark the file for deletion",
            true,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_db() -> SqlDatabase {
        let mut db = SqlDatabase::open_in_memory().unwrap();
        ControlTable::create(&mut db).unwrap();
        db
    }

    fn add_user_control(db: &mut SqlDatabase, control_type: ControlType, data_label: &str) {
        let table = ControlTable::load(db).unwrap();
        let next = table.len() as i64 + 1;
        let row = ControlRow {
            id: 0,
            control_order: next,
            spreadsheet_order: next,
            control_type,
            default_value: String::new(),
            label: data_label.to_string(),
            data_label: data_label.to_string(),
            tooltip: String::new(),
            visible: true,
            copyable: true,
            list: String::new(),
        };
        db.insert(TEMPLATE_TABLE, &[row.tuples()]).unwrap();
    }

    #[test]
    fn test_create_seeds_standard_controls() {
        let db = fresh_db();
        let table = ControlTable::load(&db).unwrap();
        assert_eq!(table.len(), 6);
        assert!(table.find(FILE).is_some());
        assert!(table.find(DELETE_FLAG).is_some());
        let orders: Vec<i64> = table.rows().iter().map(|r| r.control_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_load_orders_by_control_order() {
        let mut db = fresh_db();
        ControlTable::set_control_order(&mut db, DELETE_FLAG, 1).unwrap();
        let table = ControlTable::load(&db).unwrap();
        assert_eq!(table.rows()[0].data_label, DELETE_FLAG);
    }

    #[test]
    fn test_ensure_standard_controls_backfills_missing() {
        let mut db = fresh_db();
        db.delete_rows(TEMPLATE_TABLE, Some("DataLabel IN ('DeleteFlag', 'UtcOffset')"))
            .unwrap();

        let inserted = ControlTable::ensure_standard_controls(&mut db).unwrap();
        assert_eq!(inserted, 2);

        let table = ControlTable::load(&db).unwrap();
        assert!(table.find(DELETE_FLAG).is_some());
        assert!(table.find(UTC_OFFSET).is_some());

        // Second run is a no-op.
        assert_eq!(ControlTable::ensure_standard_controls(&mut db).unwrap(), 0);
    }

    #[test]
    fn test_ensure_labels_generates_unique_names() {
        let mut db = fresh_db();
        add_user_control(&mut db, ControlType::Counter, "");
        add_user_control(&mut db, ControlType::Counter, "Animals");
        add_user_control(&mut db, ControlType::Counter, "Animals");

        let repaired = ControlTable::ensure_labels(&mut db).unwrap();
        assert_eq!(repaired, 2);

        let table = ControlTable::load(&db).unwrap();
        let mut labels: Vec<&str> = table.rows().iter().map(|r| r.data_label.as_str()).collect();
        let before = labels.len();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), before, "data labels must be unique");
        assert!(table.find("Counter0").is_some());
    }

    #[test]
    fn test_ensure_labels_dedupes_display_labels() {
        let mut db = fresh_db();
        // Distinct data labels sharing one display label.
        for data_label in ["SpeciesA", "SpeciesB"] {
            let table = ControlTable::load(&db).unwrap();
            let next = table.len() as i64 + 1;
            db.insert(
                TEMPLATE_TABLE,
                &[vec![
                    ColumnTuple::new(CONTROL_ORDER, &next.to_string()),
                    ColumnTuple::new(SPREADSHEET_ORDER, &next.to_string()),
                    ColumnTuple::new(TYPE, "Note"),
                    ColumnTuple::new(DEFAULT_VALUE, ""),
                    ColumnTuple::new(LABEL, "Species"),
                    ColumnTuple::new(DATA_LABEL, data_label),
                    ColumnTuple::new(TOOLTIP, ""),
                    ColumnTuple::new(VISIBLE, "true"),
                    ColumnTuple::new(COPYABLE, "true"),
                    ColumnTuple::new(LIST, ""),
                ]],
            )
            .unwrap();
        }

        let repaired = ControlTable::ensure_labels(&mut db).unwrap();
        assert_eq!(repaired, 1);

        let table = ControlTable::load(&db).unwrap();
        let mut labels: Vec<&str> = table.rows().iter().map(|r| r.label.as_str()).collect();
        let before = labels.len();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), before, "display labels must be unique");
        // The first holder keeps its label; data labels are untouched.
        assert_eq!(table.find("SpeciesA").unwrap().label, "Species");
        assert_ne!(table.find("SpeciesB").unwrap().label, "Species");
    }

    #[test]
    fn test_reorder_five_of_eight_to_two() {
        let mut db = fresh_db();
        add_user_control(&mut db, ControlType::Note, "NoteA");
        add_user_control(&mut db, ControlType::Note, "NoteB");
        // Standard 6 + 2 = 8 controls; UtcOffset sits at position 5.
        ControlTable::set_control_order(&mut db, UTC_OFFSET, 2).unwrap();

        let table = ControlTable::load(&db).unwrap();
        let orders: Vec<i64> = table.rows().iter().map(|r| r.control_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(table.rows()[1].data_label, UTC_OFFSET);
        // Original positions 2,3,4 shift to 3,4,5.
        assert_eq!(table.rows()[2].data_label, RELATIVE_PATH);
        assert_eq!(table.rows()[3].data_label, FOLDER);
        assert_eq!(table.rows()[4].data_label, DATE_TIME);
        // Positions past the vacated slot are untouched.
        assert_eq!(table.rows()[5].data_label, DELETE_FLAG);
    }

    #[test]
    fn test_reorder_down_the_list() {
        let mut db = fresh_db();
        ControlTable::set_control_order(&mut db, FILE, 6).unwrap();
        let table = ControlTable::load(&db).unwrap();
        let orders: Vec<i64> = table.rows().iter().map(|r| r.control_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(table.rows()[5].data_label, FILE);
        assert_eq!(table.rows()[0].data_label, RELATIVE_PATH);
    }

    #[test]
    fn test_spreadsheet_order_is_independent() {
        let mut db = fresh_db();
        ControlTable::set_spreadsheet_order(&mut db, DELETE_FLAG, 1).unwrap();
        let table = ControlTable::load(&db).unwrap();
        // Control order untouched.
        assert_eq!(table.rows()[0].data_label, FILE);
        let flag = table.find(DELETE_FLAG).unwrap();
        assert_eq!(flag.spreadsheet_order, 1);
        let spreadsheet: Vec<i64> = {
            let mut o: Vec<i64> = table.rows().iter().map(|r| r.spreadsheet_order).collect();
            o.sort_unstable();
            o
        };
        assert_eq!(spreadsheet, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_reorder_unknown_control() {
        let mut db = fresh_db();
        let err = ControlTable::set_control_order(&mut db, "Bogus", 1).unwrap_err();
        assert!(matches!(err, Error::ControlNotFound(_)));
    }

    #[test]
    fn test_repair_orders_renumbers_legacy_values() {
        let mut db = fresh_db();
        // Simulate a legacy zero-based, gapped numbering.
        db.execute("UPDATE TemplateTable SET ControlOrder = (Id - 1) * 3").unwrap();
        db.execute("UPDATE TemplateTable SET SpreadsheetOrder = (Id - 1) * 3").unwrap();

        let repaired = ControlTable::repair_orders(&mut db).unwrap();
        assert_eq!(repaired, 6);

        let table = ControlTable::load(&db).unwrap();
        let orders: Vec<i64> = table.rows().iter().map(|r| r.control_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
        // Relative order preserved.
        assert_eq!(table.rows()[0].data_label, FILE);

        // Already dense: no-op.
        assert_eq!(ControlTable::repair_orders(&mut db).unwrap(), 0);
    }

    #[test]
    fn test_validate_orders() {
        assert!(validate_orders(&[1, 2, 3], 3).is_ok());
        assert!(validate_orders(&[3, 1, 2], 3).is_ok());
        assert!(validate_orders(&[1, 2, 2], 3).is_err());
        assert!(validate_orders(&[0, 1, 2], 3).is_err());
        assert!(validate_orders(&[1, 2, 4], 3).is_err());
    }

    #[test]
    fn test_control_type_roundtrip() {
        for ct in [
            ControlType::Note,
            ControlType::Counter,
            ControlType::FixedChoice,
            ControlType::Flag,
            ControlType::File,
            ControlType::RelativePath,
            ControlType::Folder,
            ControlType::DateTime,
            ControlType::UtcOffset,
            ControlType::DeleteFlag,
        ] {
            assert_eq!(parse_control_type(ct.as_str()), ct);
        }
    }
}
