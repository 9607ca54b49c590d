pub mod controls;
pub mod database;
pub mod error;
pub mod files;
pub mod schema;
pub mod upgrade;
pub mod version;

use std::path::Path;

pub use controls::{ControlRow, ControlTable, ControlType};
pub use database::SqlDatabase;
pub use error::{Error, Result};
pub use files::FileTable;
pub use schema::{ColumnDefinition, ColumnTuple, ColumnTuplesWithWhere, SqlType};
pub use upgrade::{UpgradeReport, CURRENT_VERSION};
pub use version::FileVersion;

/// One annotation project: a template file (schema only) and a data file
/// (schema plus one row per media file). Opening runs the upgrade
/// sequence, so by the time `open` returns the stores are in the current
/// canonical shape.
#[derive(Debug)]
pub struct Project {
    template_db: SqlDatabase,
    data_db: SqlDatabase,
    template: ControlTable,
}

impl Project {
    /// Create a fresh project: a template seeded with the standard
    /// controls, and a data file derived from it.
    pub fn create(template_path: &Path, data_path: &Path) -> Result<Self> {
        let mut template_db = SqlDatabase::create(template_path)?;
        ControlTable::create(&mut template_db)?;
        let template = ControlTable::load(&template_db)?;

        let mut data_db = SqlDatabase::create(data_path)?;
        Self::populate_data_file(&mut data_db, &template)?;

        Ok(Self {
            template_db,
            data_db,
            template,
        })
    }

    /// Open an existing project and silently upgrade both files to the
    /// current shape. A corrupt file, or one missing its defining table,
    /// aborts with `FileCorrupt` so the caller can offer recovery.
    pub fn open(template_path: &Path, data_path: &Path) -> Result<Self> {
        let mut template_db = SqlDatabase::open(template_path)?;
        if !template_db.table_exists(controls::TEMPLATE_TABLE) {
            return Err(Error::FileCorrupt(template_path.to_path_buf()));
        }
        let report = upgrade::upgrade_template_file(&mut template_db)?;
        if !report.applied.is_empty() {
            log::info!("template upgrade applied {} step(s)", report.applied.len());
        }

        let mut data_db = SqlDatabase::open(data_path)?;
        if !data_db.table_exists(files::DATA_TABLE)
            || !data_db.table_exists(files::IMAGE_SET_TABLE)
            || !data_db.table_exists(controls::TEMPLATE_TABLE)
        {
            return Err(Error::FileCorrupt(data_path.to_path_buf()));
        }
        let report = upgrade::upgrade_data_file(&mut data_db)?;
        if !report.applied.is_empty() {
            log::info!(
                "data upgrade from {} applied {} step(s)",
                report.from_version,
                report.applied.len()
            );
        }

        let template = ControlTable::load(&data_db)?;
        Ok(Self {
            template_db,
            data_db,
            template,
        })
    }

    /// Open the project if both files exist, otherwise create what is
    /// missing (a missing data file is rebuilt from the template).
    pub fn open_or_create(template_path: &Path, data_path: &Path) -> Result<Self> {
        if !template_path.exists() {
            return Self::create(template_path, data_path);
        }
        if !data_path.exists() {
            let mut template_db = SqlDatabase::open(template_path)?;
            if !template_db.table_exists(controls::TEMPLATE_TABLE) {
                return Err(Error::FileCorrupt(template_path.to_path_buf()));
            }
            upgrade::upgrade_template_file(&mut template_db)?;
            let template = ControlTable::load(&template_db)?;
            let mut data_db = SqlDatabase::create(data_path)?;
            Self::populate_data_file(&mut data_db, &template)?;
            return Ok(Self {
                template_db,
                data_db,
                template,
            });
        }
        Self::open(template_path, data_path)
    }

    fn populate_data_file(data_db: &mut SqlDatabase, template: &ControlTable) -> Result<()> {
        let version: FileVersion = CURRENT_VERSION.parse().expect("valid constant");
        ControlTable::create_from_rows(data_db, template.rows())?;
        FileTable::create_from_template(data_db, template, &version)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The template as loaded from the data file after upgrade.
    pub fn template(&self) -> &ControlTable {
        &self.template
    }

    pub fn reload_template(&mut self) -> Result<()> {
        self.template = ControlTable::load(&self.data_db)?;
        Ok(())
    }

    pub fn data_db(&mut self) -> &mut SqlDatabase {
        &mut self.data_db
    }

    pub fn template_db(&mut self) -> &mut SqlDatabase {
        &mut self.template_db
    }

    pub fn version(&self) -> Result<FileVersion> {
        upgrade::read_version_marker(&self.data_db)
    }

    // ── Row CRUD over the data file ──────────────────────────────────

    pub fn add_files(&mut self, rows: &[Vec<ColumnTuple>]) -> Result<usize> {
        FileTable::add_files(&mut self.data_db, rows)
    }

    pub fn update_files(&mut self, mutations: &[ColumnTuplesWithWhere]) -> Result<usize> {
        FileTable::update_files(&mut self.data_db, mutations)
    }

    pub fn delete_files(&mut self, wher: Option<&str>) -> Result<usize> {
        FileTable::delete_files(&self.data_db, wher)
    }

    pub fn count_files(&self, wher: Option<&str>) -> Result<i64> {
        FileTable::count_files(&self.data_db, wher)
    }

    pub fn select_files(
        &self,
        columns: &[&str],
        wher: Option<&str>,
    ) -> Result<Vec<Vec<Option<String>>>> {
        self.data_db.select_rows(files::DATA_TABLE, columns, wher)
    }

    // ── Schema introspection and mutation (data table) ───────────────

    pub fn column_exists(&self, column: &str) -> bool {
        self.data_db.column_exists(files::DATA_TABLE, column)
    }

    pub fn list_columns(&self) -> Vec<String> {
        self.data_db.column_names(files::DATA_TABLE)
    }

    pub fn column_defaults(&self) -> std::collections::HashMap<String, Option<String>> {
        self.data_db.columns_and_defaults(files::DATA_TABLE)
    }

    pub fn add_column(&mut self, definition: &ColumnDefinition) -> Result<()> {
        self.data_db.add_column_at_end(files::DATA_TABLE, definition)
    }

    pub fn add_column_at(&mut self, position: usize, definition: &ColumnDefinition) -> Result<()> {
        self.data_db.add_column_at(files::DATA_TABLE, position, definition)
    }

    pub fn delete_column(&mut self, column: &str) -> Result<()> {
        self.data_db.delete_column(files::DATA_TABLE, column)
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        self.data_db.rename_column(files::DATA_TABLE, from, to)
    }

    pub fn retype_column(
        &mut self,
        column: &str,
        sql_type: SqlType,
        default_value: Option<&str>,
    ) -> Result<()> {
        self.data_db
            .retype_column(files::DATA_TABLE, column, sql_type, default_value)
    }
}
