//! The migration orchestrator: an ordered, idempotent checklist applied
//! to every opened file, bringing any historical shape up to the current
//! one. Each step re-checks its own precondition, so re-running the whole
//! sequence is always safe.

use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::controls::{
    self, ControlTable, BOOLEAN_TRUE, DATE_TIME, DELETE_FLAG, FILE, FOLDER, MARK_FOR_DELETION,
    RELATIVE_PATH, UTC_OFFSET,
};
use crate::database::SqlDatabase;
use crate::error::{Error, Result};
use crate::files::{
    FileTable, DATA_TABLE, IMAGE_SET_TABLE, LEGACY_DATE, LEGACY_TIME, LOG, QUICK_PASTE_XML,
    SELECTED_FOLDER, SORT_TERMS, TIME_ZONE, VERSION_COMPATIBILITY, WHITE_SPACE_TRIMMED,
};
use crate::schema::{ColumnDefinition, ColumnTuple, ColumnTuplesWithWhere, SqlType};
use crate::version::FileVersion;

/// The application version written as the marker after a successful
/// upgrade.
pub const CURRENT_VERSION: &str = "2.3.0.0";

/// Files older than this may hold NULL where the code expects "".
const VERSION_NULL_CHECK: &str = "2.2.2.4";
/// Files older than this may hold locale decimal commas in UtcOffset.
const VERSION_UTC_COMMA_FIX: &str = "2.2.0.3";

pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LEGACY_DATE_FORMAT: &str = "%d-%b-%Y";
const LEGACY_TIME_FORMAT: &str = "%H:%M:%S";

/// Which steps actually ran during one upgrade pass.
#[derive(Debug, Default)]
pub struct UpgradeReport {
    pub from_version: FileVersion,
    pub applied: Vec<&'static str>,
}

impl UpgradeReport {
    fn record(&mut self, step: &'static str) {
        log::info!("upgrade: {step}");
        self.applied.push(step);
    }
}

/// Read the stored version marker. A missing marker column or an
/// unparsable value falls back to the lowest version, which forces every
/// version-gated step to run; a missing ImageSet table has no fallback.
pub fn read_version_marker(db: &SqlDatabase) -> Result<FileVersion> {
    if !db.table_exists(IMAGE_SET_TABLE) {
        return Err(Error::VersionUnreadable(
            "image set table is missing".to_string(),
        ));
    }
    if !db.column_exists(IMAGE_SET_TABLE, VERSION_COMPATIBILITY) {
        return Ok(FileVersion::lowest());
    }
    match FileTable::image_set_value(db, VERSION_COMPATIBILITY) {
        Some(raw) => Ok(FileVersion::from_str(&raw).unwrap_or_else(|_| {
            log::warn!("upgrade: unparsable version marker {raw:?}, treating as oldest");
            FileVersion::lowest()
        })),
        None => Ok(FileVersion::lowest()),
    }
}

/// Upgrade a template-only file: standard controls present, labels
/// unique, orderings dense, deprecated MarkForDeletion renamed.
pub fn upgrade_template_file(db: &mut SqlDatabase) -> Result<UpgradeReport> {
    let mut report = UpgradeReport::default();
    upgrade_template_rows(db, &mut report)?;
    Ok(report)
}

fn upgrade_template_rows(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    let template = ControlTable::load(db)?;
    if template.find(MARK_FOR_DELETION).is_some() && template.find(DELETE_FLAG).is_none() {
        db.update(
            controls::TEMPLATE_TABLE,
            &[ColumnTuplesWithWhere::with_where(
                vec![
                    ColumnTuple::new(controls::TYPE, DELETE_FLAG),
                    ColumnTuple::new(controls::DATA_LABEL, DELETE_FLAG),
                    ColumnTuple::new(controls::LABEL, DELETE_FLAG),
                    ColumnTuple::new(controls::DEFAULT_VALUE, controls::BOOLEAN_FALSE),
                ],
                &format!("DataLabel = '{MARK_FOR_DELETION}'"),
            )],
        )?;
        report.record("rename MarkForDeletion control to DeleteFlag");
    }
    if ControlTable::ensure_standard_controls(db)? > 0 {
        report.record("insert missing standard controls");
    }
    if ControlTable::ensure_labels(db)? > 0 {
        report.record("repair empty or duplicate labels");
    }
    if ControlTable::repair_orders(db)? > 0 {
        report.record("renumber control orderings");
    }
    Ok(())
}

/// Upgrade a data file in place, from whatever historical shape it has to
/// the current one. Idempotent: every step is precondition-gated, and the
/// version marker is only advanced after all steps succeed, so a failed
/// step is retried on the next open.
pub fn upgrade_data_file(db: &mut SqlDatabase) -> Result<UpgradeReport> {
    let current = FileVersion::from_str(CURRENT_VERSION).expect("valid constant");
    let mut report = UpgradeReport {
        from_version: read_version_marker(db)?,
        applied: Vec::new(),
    };
    let file_version = report.from_version;

    // The data file carries its own copy of the template.
    if db.table_exists(controls::TEMPLATE_TABLE) {
        upgrade_template_rows(db, &mut report)?;
    }

    // A mangled file can lose its single session row; every marker write
    // below needs one to land in, since UPDATE matches nothing otherwise.
    if db.count_rows(IMAGE_SET_TABLE, None)? == 0 {
        db.insert(IMAGE_SET_TABLE, &[vec![ColumnTuple::new(LOG, "")]])?;
        report.record("seed missing image set row");
    }

    // Remember the oldest-shape markers before anything backfills them.
    let datetime_was_missing = !db.column_exists(DATA_TABLE, DATE_TIME);
    let timezone_was_missing = !db.column_exists(IMAGE_SET_TABLE, TIME_ZONE);

    ensure_standard_data_columns(db, &mut report)?;
    trim_whitespace_once(db, &mut report)?;

    if file_version < FileVersion::from_str(VERSION_NULL_CHECK).expect("valid constant") {
        scrub_nulls(db, &mut report)?;
    }
    if file_version < FileVersion::from_str(VERSION_UTC_COMMA_FIX).expect("valid constant") {
        repair_decimal_commas(db, &mut report)?;
    }

    normalize_utc_offsets(db, &mut report)?;
    ensure_image_set_columns(db, &mut report)?;

    if datetime_was_missing && timezone_was_missing {
        recombine_legacy_date_time(db, &mut report)?;
    }

    // Table recreation drops every index on the recreated table, and the
    // oldest shapes never had them in the first place.
    if !FileTable::path_indexes_present(db) {
        FileTable::ensure_path_indexes(db)?;
        report.record("rebuild path lookup indexes");
    }

    if file_version < current {
        write_version_marker(db, CURRENT_VERSION)?;
        report.record("advance version marker");
    }
    Ok(report)
}

/// The oldest file shape predates the marker column entirely, so it has
/// to be added before the marker can be written.
fn write_version_marker(db: &mut SqlDatabase, version: &str) -> Result<()> {
    if !db.column_exists(IMAGE_SET_TABLE, VERSION_COMPATIBILITY) {
        db.add_column_at_end(
            IMAGE_SET_TABLE,
            &ColumnDefinition::with_default(VERSION_COMPATIBILITY, SqlType::Text, "")?,
        )?;
    }
    FileTable::set_image_set_value(db, VERSION_COMPATIBILITY, version)
}

/// Step 2: the standard data columns every current file has, inserted at
/// their canonical positions when a legacy file lacks them. A deprecated
/// MarkForDeletion column is renamed so its values carry over.
fn ensure_standard_data_columns(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    if db.column_exists(DATA_TABLE, MARK_FOR_DELETION) {
        if db.column_exists(DATA_TABLE, DELETE_FLAG) {
            // Both present only if a half-upgraded file was re-opened;
            // the renamed column is authoritative.
            db.delete_column(DATA_TABLE, MARK_FOR_DELETION)?;
        } else {
            db.rename_column(DATA_TABLE, MARK_FOR_DELETION, DELETE_FLAG)?;
        }
        report.record("replace MarkForDeletion column with DeleteFlag");
    }

    if !db.column_exists(DATA_TABLE, RELATIVE_PATH) {
        let position = position_after(db, FILE);
        db.add_column_at(
            DATA_TABLE,
            position,
            &ColumnDefinition::with_default(RELATIVE_PATH, SqlType::Text, "")?,
        )?;
        report.record("insert RelativePath column");
    }
    if !db.column_exists(DATA_TABLE, DATE_TIME) {
        let position = position_after(db, FOLDER);
        db.add_column_at(
            DATA_TABLE,
            position,
            &ColumnDefinition::with_default(
                DATE_TIME,
                SqlType::DateTime,
                controls::DEFAULT_DATE_TIME,
            )?,
        )?;
        report.record("insert DateTime column");
    }
    if !db.column_exists(DATA_TABLE, UTC_OFFSET) {
        let position = position_after(db, DATE_TIME);
        db.add_column_at(
            DATA_TABLE,
            position,
            &ColumnDefinition::with_default(
                UTC_OFFSET,
                SqlType::Real,
                controls::DEFAULT_UTC_OFFSET,
            )?,
        )?;
        report.record("insert UtcOffset column");
    }
    if !db.column_exists(DATA_TABLE, DELETE_FLAG) {
        db.add_column_at_end(
            DATA_TABLE,
            &ColumnDefinition::with_default(DELETE_FLAG, SqlType::Text, controls::BOOLEAN_FALSE)?,
        )?;
        report.record("append DeleteFlag column");
    }
    Ok(())
}

fn position_after(db: &SqlDatabase, column: &str) -> usize {
    let names = db.column_names(DATA_TABLE);
    names
        .iter()
        .position(|n| n == column)
        .map(|i| i + 1)
        .unwrap_or(names.len())
}

/// Step 3: trim whitespace from every text column, exactly once per file.
/// The pass is O(rows), so it is guarded by a persisted marker column.
fn trim_whitespace_once(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    if !db.column_exists(IMAGE_SET_TABLE, WHITE_SPACE_TRIMMED) {
        db.add_column_at_end(
            IMAGE_SET_TABLE,
            &ColumnDefinition::with_default(
                WHITE_SPACE_TRIMMED,
                SqlType::Text,
                controls::BOOLEAN_FALSE,
            )?,
        )?;
    }
    if FileTable::image_set_value(db, WHITE_SPACE_TRIMMED).as_deref() == Some(BOOLEAN_TRUE) {
        return Ok(());
    }
    let sets: Vec<String> = db
        .column_definitions(DATA_TABLE)?
        .iter()
        .filter(|def| def.name != controls::ID && def.sql_type == SqlType::Text)
        .map(|def| {
            let name = crate::schema::quote_identifier(&def.name);
            format!("{name} = TRIM({name})")
        })
        .collect();
    if !sets.is_empty() {
        db.execute(&format!("UPDATE {DATA_TABLE} SET {}", sets.join(", ")))?;
    }
    FileTable::set_image_set_value(db, WHITE_SPACE_TRIMMED, BOOLEAN_TRUE)?;
    report.record("trim whitespace in text columns");
    Ok(())
}

/// Step 4: old writers stored NULL where the application expects "".
fn scrub_nulls(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    let mut scrubbed = 0;
    for def in db.column_definitions(DATA_TABLE)? {
        if def.name == controls::ID {
            continue;
        }
        let name = crate::schema::quote_identifier(&def.name);
        scrubbed += db.execute(&format!(
            "UPDATE {DATA_TABLE} SET {name} = '' WHERE {name} IS NULL"
        ))?;
    }
    if scrubbed > 0 {
        report.record("replace NULL cells with empty strings");
    }
    Ok(())
}

/// Step 5: UTC offsets written under comma-decimal locales.
fn repair_decimal_commas(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    if !db.column_exists(DATA_TABLE, UTC_OFFSET) {
        return Ok(());
    }
    let repaired = db.execute(&format!(
        "UPDATE {DATA_TABLE} SET {UTC_OFFSET} = REPLACE({UTC_OFFSET}, ',', '.') \
         WHERE {UTC_OFFSET} LIKE '%,%'"
    ))?;
    if repaired > 0 {
        report.record("repair comma decimal separators in UtcOffset");
    }
    Ok(())
}

/// Step 6: fold every non-zero UTC offset into the DateTime value and
/// zero the offset, so all stored times share one convention. The
/// predicate filters first, so this is cheap when few rows qualify.
/// Cells that fail to parse are carried forward unchanged.
fn normalize_utc_offsets(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    if !db.column_exists(DATA_TABLE, UTC_OFFSET) || !db.column_exists(DATA_TABLE, DATE_TIME) {
        return Ok(());
    }
    let wher = format!(
        "{UTC_OFFSET} IS NOT NULL AND CAST({UTC_OFFSET} AS TEXT) NOT IN ('', '0', '0.0')"
    );
    let rows = db.select_rows(DATA_TABLE, &[controls::ID, DATE_TIME, UTC_OFFSET], Some(&wher))?;
    if rows.is_empty() {
        return Ok(());
    }

    let mut mutations = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(id), Some(date_time), Some(offset)) = (&row[0], &row[1], &row[2]) else {
            continue;
        };
        let Ok(offset_hours) = offset.parse::<f64>() else {
            log::warn!("upgrade: unparsable UtcOffset {offset:?} for row {id}, carried forward");
            continue;
        };
        let Ok(parsed) = NaiveDateTime::parse_from_str(date_time, DATE_TIME_FORMAT) else {
            log::warn!("upgrade: unparsable DateTime {date_time:?} for row {id}, carried forward");
            continue;
        };
        let shifted = parsed - Duration::seconds((offset_hours * 3600.0).round() as i64);
        mutations.push(ColumnTuplesWithWhere::with_where(
            vec![
                ColumnTuple::new(DATE_TIME, &shifted.format(DATE_TIME_FORMAT).to_string()),
                ColumnTuple::new(UTC_OFFSET, controls::DEFAULT_UTC_OFFSET),
            ],
            &format!("Id = {id}"),
        ));
    }
    let applied = mutations.len();
    db.update(DATA_TABLE, &mutations)?;
    if applied > 0 {
        report.record("normalize non-zero UTC offsets");
    }
    Ok(())
}

/// Step 7: the session-state columns added over the years, each
/// independently existence-gated.
fn ensure_image_set_columns(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    let mut added = false;
    for column in [SORT_TERMS, SELECTED_FOLDER, QUICK_PASTE_XML, TIME_ZONE] {
        if !db.column_exists(IMAGE_SET_TABLE, column) {
            db.add_column_at_end(
                IMAGE_SET_TABLE,
                &ColumnDefinition::with_default(column, SqlType::Text, "")?,
            )?;
            added = true;
        }
    }
    if added {
        report.record("append image set session columns");
    }
    Ok(())
}

/// Step 8: the oldest file shape predates DateTime entirely and stores
/// separate Date/Time text columns. Recompute DateTime for every row.
fn recombine_legacy_date_time(db: &mut SqlDatabase, report: &mut UpgradeReport) -> Result<()> {
    if !db.column_exists(DATA_TABLE, LEGACY_DATE) || !db.column_exists(DATA_TABLE, LEGACY_TIME) {
        return Ok(());
    }
    let rows = db.select_rows(DATA_TABLE, &[controls::ID, LEGACY_DATE, LEGACY_TIME], None)?;
    let mut mutations = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(id), Some(date), Some(time)) = (&row[0], &row[1], &row[2]) else {
            continue;
        };
        let parsed_date = NaiveDate::parse_from_str(date.trim(), LEGACY_DATE_FORMAT);
        let parsed_time = NaiveTime::parse_from_str(time.trim(), LEGACY_TIME_FORMAT);
        let (Ok(d), Ok(t)) = (parsed_date, parsed_time) else {
            log::warn!(
                "upgrade: unparsable legacy Date/Time {date:?} {time:?} for row {id}, carried forward"
            );
            continue;
        };
        mutations.push(ColumnTuplesWithWhere::with_where(
            vec![ColumnTuple::new(
                DATE_TIME,
                &d.and_time(t).format(DATE_TIME_FORMAT).to_string(),
            )],
            &format!("Id = {id}"),
        ));
    }
    let applied = mutations.len();
    db.update(DATA_TABLE, &mutations)?;
    if applied > 0 {
        report.record("recombine legacy Date/Time columns into DateTime");
    }
    Ok(())
}
