//! The file store: the Data table (one row per media file, one column per
//! template control) and its auxiliary tables: markers, detections,
//! classifications, and the single-row image-set session state.

use crate::controls::{self, ControlTable, ControlType};
use crate::database::SqlDatabase;
use crate::error::Result;
use crate::schema::{ColumnDefinition, ColumnTuple, ColumnTuplesWithWhere, SqlType};
use crate::version::FileVersion;

pub const DATA_TABLE: &str = "DataTable";
pub const MARKERS_TABLE: &str = "MarkersTable";
pub const IMAGE_SET_TABLE: &str = "ImageSetTable";
pub const DETECTIONS_TABLE: &str = "Detections";
pub const CLASSIFICATIONS_TABLE: &str = "Classifications";

// ImageSet columns.
pub const LOG: &str = "Log";
pub const ROW: &str = "Row";
pub const VERSION_COMPATIBILITY: &str = "VersionCompatibility";
pub const WHITE_SPACE_TRIMMED: &str = "WhiteSpaceTrimmed";
pub const SORT_TERMS: &str = "SortTerms";
pub const SELECTED_FOLDER: &str = "SelectedFolder";
pub const QUICK_PASTE_XML: &str = "QuickPasteXML";
pub const TIME_ZONE: &str = "TimeZone";

// Data columns only found in the oldest file shapes.
pub const LEGACY_DATE: &str = "Date";
pub const LEGACY_TIME: &str = "Time";

const INDEX_FILE: &str = "IndexFile";
const INDEX_RELATIVE_PATH: &str = "IndexRelativePath";

pub struct FileTable;

impl FileTable {
    /// The Data table schema a template implies: Id plus one column per
    /// control, each with the control's type and default.
    pub fn data_columns_for(template: &ControlTable) -> Vec<ColumnDefinition> {
        let mut columns = vec![ColumnDefinition::new(controls::ID, SqlType::Integer).unwrap()];
        for row in template.rows() {
            columns.push(ColumnDefinition {
                name: row.data_label.clone(),
                sql_type: row.control_type.sql_type(),
                default_value: Some(row.default_value.clone()),
            });
        }
        columns
    }

    /// Create the Data table and every auxiliary table from the template,
    /// and seed the single image-set row at the current version.
    pub fn create_from_template(
        db: &mut SqlDatabase,
        template: &ControlTable,
        version: &FileVersion,
    ) -> Result<()> {
        db.create_table(DATA_TABLE, &Self::data_columns_for(template))?;

        // One marker row per file, one column per counter control.
        let mut marker_columns = vec![ColumnDefinition::new(controls::ID, SqlType::Integer).unwrap()];
        for row in template.rows() {
            if row.control_type == ControlType::Counter {
                marker_columns
                    .push(ColumnDefinition::with_default(&row.data_label, SqlType::Text, "")?);
            }
        }
        db.create_table(MARKERS_TABLE, &marker_columns)?;

        db.create_table(
            DETECTIONS_TABLE,
            &[
                ColumnDefinition::new(controls::ID, SqlType::Integer)?,
                ColumnDefinition::new("FileId", SqlType::Integer)?,
                ColumnDefinition::new("Category", SqlType::Text)?,
                ColumnDefinition::new("Conf", SqlType::Real)?,
                ColumnDefinition::with_default("BBox", SqlType::Text, "")?,
            ],
        )?;
        db.create_table(
            CLASSIFICATIONS_TABLE,
            &[
                ColumnDefinition::new(controls::ID, SqlType::Integer)?,
                ColumnDefinition::new("DetectionId", SqlType::Integer)?,
                ColumnDefinition::new("Category", SqlType::Text)?,
                ColumnDefinition::new("Conf", SqlType::Real)?,
            ],
        )?;

        db.create_table(
            IMAGE_SET_TABLE,
            &[
                ColumnDefinition::new(controls::ID, SqlType::Integer)?,
                ColumnDefinition::with_default(LOG, SqlType::Text, "")?,
                ColumnDefinition::with_default(ROW, SqlType::Integer, "0")?,
                ColumnDefinition::with_default(VERSION_COMPATIBILITY, SqlType::Text, "")?,
                ColumnDefinition::with_default(WHITE_SPACE_TRIMMED, SqlType::Text, controls::BOOLEAN_TRUE)?,
                ColumnDefinition::with_default(SORT_TERMS, SqlType::Text, "")?,
                ColumnDefinition::with_default(SELECTED_FOLDER, SqlType::Text, "")?,
                ColumnDefinition::with_default(QUICK_PASTE_XML, SqlType::Text, "")?,
                ColumnDefinition::with_default(TIME_ZONE, SqlType::Text, "")?,
            ],
        )?;
        db.insert(
            IMAGE_SET_TABLE,
            &[vec![
                ColumnTuple::new(VERSION_COMPATIBILITY, &version.to_string()),
                ColumnTuple::new(WHITE_SPACE_TRIMMED, controls::BOOLEAN_TRUE),
            ]],
        )?;

        Self::ensure_path_indexes(db)?;
        Ok(())
    }

    // ── File rows ────────────────────────────────────────────────────

    pub fn add_files(db: &mut SqlDatabase, rows: &[Vec<ColumnTuple>]) -> Result<usize> {
        db.insert(DATA_TABLE, rows)
    }

    pub fn update_files(db: &mut SqlDatabase, mutations: &[ColumnTuplesWithWhere]) -> Result<usize> {
        db.update(DATA_TABLE, mutations)
    }

    pub fn delete_files(db: &SqlDatabase, wher: Option<&str>) -> Result<usize> {
        db.delete_rows(DATA_TABLE, wher)
    }

    /// Row count over the externally-driven selection filter.
    pub fn count_files(db: &SqlDatabase, wher: Option<&str>) -> Result<i64> {
        db.count_rows(DATA_TABLE, wher)
    }

    // ── Indexes ──────────────────────────────────────────────────────

    /// Recreate the path lookup indexes after a bulk load. Idempotent.
    pub fn ensure_path_indexes(db: &SqlDatabase) -> Result<()> {
        db.index_create(INDEX_FILE, DATA_TABLE, &[controls::FILE])?;
        db.index_create(
            INDEX_RELATIVE_PATH,
            DATA_TABLE,
            &[controls::RELATIVE_PATH, controls::FILE],
        )?;
        Ok(())
    }

    /// Dropped before a bulk load so inserts skip index maintenance.
    pub fn drop_path_indexes(db: &SqlDatabase) -> Result<()> {
        db.index_drop(INDEX_FILE)?;
        db.index_drop(INDEX_RELATIVE_PATH)?;
        Ok(())
    }

    /// True when both path lookup indexes exist.
    pub fn path_indexes_present(db: &SqlDatabase) -> bool {
        db.conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name IN (?1, ?2)",
                [INDEX_FILE, INDEX_RELATIVE_PATH],
                |row| row.get::<_, i64>(0),
            )
            .unwrap_or(0)
            == 2
    }

    // ── Image-set session state ──────────────────────────────────────

    pub fn image_set_value(db: &SqlDatabase, column: &str) -> Option<String> {
        db.scalar_string(IMAGE_SET_TABLE, column, None)
    }

    pub fn set_image_set_value(db: &mut SqlDatabase, column: &str, value: &str) -> Result<()> {
        db.update(
            IMAGE_SET_TABLE,
            &[ColumnTuplesWithWhere::new(vec![ColumnTuple::new(column, value)])],
        )?;
        Ok(())
    }
}
