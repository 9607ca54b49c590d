//! End-to-end upgrade scenarios over real on-disk files: a decade-old
//! file shape must open, upgrade silently, and never lose a value.

use trapmark_core::controls::{self, ControlTable};
use trapmark_core::files::{self, FileTable};
use trapmark_core::upgrade::{self, CURRENT_VERSION};
use trapmark_core::{
    ColumnDefinition, ColumnTuple, ColumnTuplesWithWhere, FileVersion, Project, SqlDatabase,
    SqlType,
};

/// Build an old-shape data file: MarkForDeletion instead of DeleteFlag,
/// no RelativePath/DateTime/UtcOffset, legacy Date/Time columns, an
/// ImageSet without the session columns, and a template copy with gapped
/// orders.
fn build_legacy_data_file(db: &mut SqlDatabase) {
    db.create_table(
        "TemplateTable",
        &ControlTable::table_definitions(),
    )
    .unwrap();
    let legacy_controls = [
        ("File", "File", "10"),
        ("Folder", "Folder", "20"),
        ("Note", "Species", "30"),
        ("MarkForDeletion", "MarkForDeletion", "40"),
    ];
    for (control_type, data_label, order) in legacy_controls {
        db.insert(
            "TemplateTable",
            &[vec![
                ColumnTuple::new(controls::CONTROL_ORDER, order),
                ColumnTuple::new(controls::SPREADSHEET_ORDER, order),
                ColumnTuple::new(controls::TYPE, control_type),
                ColumnTuple::new(controls::DEFAULT_VALUE, ""),
                ColumnTuple::new(controls::LABEL, data_label),
                ColumnTuple::new(controls::DATA_LABEL, data_label),
                ColumnTuple::new(controls::TOOLTIP, ""),
                ColumnTuple::new(controls::VISIBLE, "true"),
                ColumnTuple::new(controls::COPYABLE, "false"),
                ColumnTuple::new(controls::LIST, ""),
            ]],
        )
        .unwrap();
    }

    db.create_table(
        "DataTable",
        &[
            ColumnDefinition::new("Id", SqlType::Integer).unwrap(),
            ColumnDefinition::with_default("File", SqlType::Text, "").unwrap(),
            ColumnDefinition::with_default("Folder", SqlType::Text, "").unwrap(),
            ColumnDefinition::with_default("Species", SqlType::Text, "").unwrap(),
            ColumnDefinition::with_default("Date", SqlType::Text, "").unwrap(),
            ColumnDefinition::with_default("Time", SqlType::Text, "").unwrap(),
            ColumnDefinition::with_default("MarkForDeletion", SqlType::Text, "false").unwrap(),
        ],
    )
    .unwrap();
    db.create_table(
        "ImageSetTable",
        &[
            ColumnDefinition::new("Id", SqlType::Integer).unwrap(),
            ColumnDefinition::with_default("Log", SqlType::Text, "").unwrap(),
            ColumnDefinition::with_default("VersionCompatibility", SqlType::Text, "").unwrap(),
        ],
    )
    .unwrap();
    db.insert(
        "ImageSetTable",
        &[vec![ColumnTuple::new("VersionCompatibility", "2.0.1.0")]],
    )
    .unwrap();

    db.insert(
        "DataTable",
        &[
            vec![
                ColumnTuple::new("File", "IMG_0001.JPG"),
                ColumnTuple::new("Folder", "Survey2014"),
                ColumnTuple::new("Species", " deer "),
                ColumnTuple::new("Date", "15-Mar-2014"),
                ColumnTuple::new("Time", "06:12:30"),
                ColumnTuple::new("MarkForDeletion", "true"),
            ],
            vec![
                ColumnTuple::new("File", "IMG_0002.JPG"),
                ColumnTuple::new("Folder", "Survey2014"),
                ColumnTuple::new("Species", "fox"),
                ColumnTuple::new("Date", "16-Mar-2014"),
                ColumnTuple::new("Time", "18:45:00"),
                ColumnTuple::new("MarkForDeletion", "false"),
            ],
        ],
    )
    .unwrap();
}

/// Snapshot the full schema and every DataTable row for equality checks.
fn snapshot(db: &SqlDatabase) -> (Vec<String>, Vec<Vec<Option<String>>>) {
    let mut stmt = db
        .conn()
        .prepare(
            "SELECT COALESCE(sql, '') FROM sqlite_master \
             WHERE name NOT LIKE 'sqlite_%' ORDER BY type DESC, name",
        )
        .unwrap();
    let schema: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();

    let columns = db.column_names("DataTable");
    let column_refs: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();
    let rows = db
        .select_rows("DataTable", &column_refs, None)
        .unwrap();
    (schema, rows)
}

#[test]
fn test_double_upgrade_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("legacy.ddb");
    let mut db = SqlDatabase::create(&path).unwrap();
    build_legacy_data_file(&mut db);

    let first_report = upgrade::upgrade_data_file(&mut db).unwrap();
    assert!(!first_report.applied.is_empty());
    let after_first = snapshot(&db);

    let second_report = upgrade::upgrade_data_file(&mut db).unwrap();
    assert!(
        second_report.applied.is_empty(),
        "second pass applied: {:?}",
        second_report.applied
    );
    let after_second = snapshot(&db);

    assert_eq!(after_first.0, after_second.0, "schema changed on re-run");
    assert_eq!(after_first.1, after_second.1, "row content changed on re-run");
}

#[test]
fn test_legacy_file_upgrades_and_keeps_values() {
    let mut db = SqlDatabase::open_in_memory().unwrap();
    build_legacy_data_file(&mut db);
    upgrade::upgrade_data_file(&mut db).unwrap();

    // MarkForDeletion is gone; DeleteFlag holds the prior values.
    assert!(!db.column_exists("DataTable", "MarkForDeletion"));
    assert_eq!(
        db.count_rows("DataTable", Some("DeleteFlag = 'true' AND File = 'IMG_0001.JPG'"))
            .unwrap(),
        1
    );
    assert_eq!(
        db.count_rows("DataTable", Some("DeleteFlag = 'false' AND File = 'IMG_0002.JPG'"))
            .unwrap(),
        1
    );

    // Template copy was repaired alongside.
    let template = ControlTable::load(&db).unwrap();
    assert!(template.find("MarkForDeletion").is_none());
    assert!(template.find("DeleteFlag").is_some());
    assert!(template.find("RelativePath").is_some());
    assert!(template.find("UtcOffset").is_some());
    let orders: Vec<i64> = template.rows().iter().map(|r| r.control_order).collect();
    let expected: Vec<i64> = (1..=template.len() as i64).collect();
    assert_eq!(orders, expected);

    // User data survived, whitespace trimmed, legacy dates recombined.
    assert_eq!(
        db.count_rows("DataTable", Some("Species = 'deer'")).unwrap(),
        1
    );
    assert_eq!(
        db.count_rows("DataTable", Some("DateTime = '2014-03-15 06:12:30'"))
            .unwrap(),
        1
    );
    assert_eq!(
        FileTable::image_set_value(&db, files::VERSION_COMPATIBILITY).as_deref(),
        Some(CURRENT_VERSION)
    );

    // The column recreations along the way must not leave the file
    // without its path lookup indexes.
    assert!(FileTable::path_indexes_present(&db));
}

#[test]
fn test_offset_normalization_over_thousand_rows() {
    let mut db = SqlDatabase::open_in_memory().unwrap();
    ControlTable::create(&mut db).unwrap();
    let template = ControlTable::load(&db).unwrap();
    let version: FileVersion = CURRENT_VERSION.parse().unwrap();
    FileTable::create_from_template(&mut db, &template, &version).unwrap();

    // 1,000 files, 3% carrying a non-zero UTC offset.
    let rows: Vec<Vec<ColumnTuple>> = (0..1000)
        .map(|i| {
            let offset = if i % 33 == 0 { "2.0" } else { "0.0" };
            vec![
                ColumnTuple::new("File", &format!("IMG_{i:04}.JPG")),
                ColumnTuple::new("DateTime", "2021-06-01 12:00:00"),
                ColumnTuple::new("UtcOffset", offset),
            ]
        })
        .collect();
    let shifted_count = (0..1000).filter(|i| i % 33 == 0).count() as i64;
    FileTable::add_files(&mut db, &rows).unwrap();

    upgrade::upgrade_data_file(&mut db).unwrap();

    // Every row now reports a zero offset.
    assert_eq!(
        db.count_rows(
            "DataTable",
            Some("CAST(UtcOffset AS TEXT) NOT IN ('0', '0.0')")
        )
        .unwrap(),
        0
    );
    // Shifted rows reflect the folded offset; the rest are untouched.
    assert_eq!(
        db.count_rows("DataTable", Some("DateTime = '2021-06-01 10:00:00'"))
            .unwrap(),
        shifted_count
    );
    assert_eq!(
        db.count_rows("DataTable", Some("DateTime = '2021-06-01 12:00:00'"))
            .unwrap(),
        1000 - shifted_count
    );
}

#[test]
fn test_project_open_runs_upgrade_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let template_path = tmp.path().join("survey.tdb");
    let data_path = tmp.path().join("survey.ddb");

    {
        let mut template_db = SqlDatabase::create(&template_path).unwrap();
        ControlTable::create(&mut template_db).unwrap();
        let mut data_db = SqlDatabase::create(&data_path).unwrap();
        build_legacy_data_file(&mut data_db);
    }

    let project = Project::open(&template_path, &data_path).unwrap();
    assert_eq!(project.count_files(None).unwrap(), 2);
    assert!(project.column_exists("DeleteFlag"));
    assert!(!project.column_exists("MarkForDeletion"));
    assert_eq!(project.version().unwrap(), CURRENT_VERSION.parse().unwrap());

    // Reopening is a clean no-op open.
    drop(project);
    let project = Project::open(&template_path, &data_path).unwrap();
    assert_eq!(project.count_files(None).unwrap(), 2);
}

#[test]
fn test_batched_insert_stays_transactional_at_scale() {
    let mut db = SqlDatabase::open_in_memory().unwrap();
    ControlTable::create(&mut db).unwrap();
    let template = ControlTable::load(&db).unwrap();
    let version: FileVersion = CURRENT_VERSION.parse().unwrap();
    FileTable::create_from_template(&mut db, &template, &version).unwrap();

    let rows: Vec<Vec<ColumnTuple>> = (0..5000)
        .map(|i| vec![ColumnTuple::new("File", &format!("IMG_{i:05}.JPG"))])
        .collect();
    assert_eq!(FileTable::add_files(&mut db, &rows).unwrap(), 5000);
    assert_eq!(FileTable::count_files(&db, None).unwrap(), 5000);

    let mutations: Vec<ColumnTuplesWithWhere> = (1..=5000)
        .map(|id| {
            ColumnTuplesWithWhere::for_id(vec![ColumnTuple::new("DeleteFlag", "true")], id)
        })
        .collect();
    assert_eq!(FileTable::update_files(&mut db, &mutations).unwrap(), 5000);
    assert_eq!(
        FileTable::count_files(&db, Some("DeleteFlag = 'true'")).unwrap(),
        5000
    );
}
