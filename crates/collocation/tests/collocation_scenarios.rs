//! End-to-end collocation runs against an in-memory grid source laid out
//! in a temporary year-organised directory.

use std::sync::Arc;

use collocation::{
    CollocationConfig, GriddedUpwelling, GroupConfig, SampleCollocator, Tolerance,
};
use colloc_common::{CellValue, SampleTable};
use storage::FileGroup;
use test_utils::{
    assert_approx_eq, fill_attrs, push_sample, regular_axis, sample_table, scenario_dataset,
    units_attrs, DatasetBuilder, GridTree, MockGridSource, SCENARIO_CHL, SCENARIO_DATE,
    SCENARIO_FILE,
};

fn chl_group(tree: &GridTree) -> GroupConfig {
    GroupConfig::new("plankton", FileGroup::new(tree.root()), vec!["CHL".into()])
}

fn cell(table: &SampleTable, row: usize, column: &str) -> CellValue {
    let col = table
        .column_index(column)
        .unwrap_or_else(|| panic!("column {} missing", column));
    table.get(row, col).cloned().unwrap_or(CellValue::Missing)
}

fn scenario() -> (GridTree, Arc<MockGridSource>) {
    let tree = GridTree::new();
    let path = tree.add_file(2016, SCENARIO_FILE);
    let source = MockGridSource::new().with_dataset(SCENARIO_FILE, scenario_dataset(path));
    (tree, Arc::new(source))
}

// ============================================================================
// Matching
// ============================================================================

#[test]
fn test_sample_near_cell_gets_its_value() {
    let (tree, source) = scenario();
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.02, -7.98)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(cell(&table, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
    let diag = report.group("plankton").unwrap();
    assert_eq!(diag.matched, 1);
    assert_eq!(diag.unmatched(), 0);
}

#[test]
fn test_sample_beyond_tolerance_is_missing() {
    let (tree, source) = scenario();
    let mut config = CollocationConfig::default().with_group(chl_group(&tree));
    config.tolerance = Tolerance::degrees(0.5);
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -8.0), (44.9, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(cell(&table, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert!(cell(&table, 1, "CHL").is_missing());
    assert_eq!(report.group("plankton").unwrap().tolerance_exceeded, 1);
    assert_eq!(report.group("plankton").unwrap().matched, 1);
}

#[test]
fn test_date_without_file_is_missing() {
    let (tree, source) = scenario();
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table((2016, 6, 16), &[(40.0, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert!(cell(&table, 0, "CHL").is_missing());
    assert_eq!(report.group("plankton").unwrap().no_file, 1);
    assert_eq!(report.cache.opens, 0);
}

#[test]
fn test_fill_value_is_missing() {
    let (tree, source) = scenario();
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(38.0, -9.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert!(cell(&table, 0, "CHL").is_missing());
    let diag = report.group("plankton").unwrap();
    assert_eq!(diag.matched, 1);
    assert_eq!(diag.masked_or_fill, 1);
}

#[test]
fn test_absent_variable_is_missing_without_failing_others() {
    let (tree, source) = scenario();
    let group = GroupConfig::new(
        "plankton",
        FileGroup::new(tree.root()),
        vec!["CHL".into(), "DIATO".into()],
    );
    let collocator =
        SampleCollocator::new(CollocationConfig::default().with_group(group), source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(cell(&table, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert!(cell(&table, 0, "DIATO").is_missing());
    assert_eq!(report.group("plankton").unwrap().variable_absent, 1);
}

#[test]
fn test_km_tolerance() {
    let (tree, source) = scenario();
    let mut config = CollocationConfig::default().with_group(chl_group(&tree));
    config.tolerance = Tolerance::km(5.0);
    let collocator = SampleCollocator::new(config, source).unwrap();

    // 0.03 deg of latitude is about 3.3 km; 0.1 deg about 11 km
    let mut table = sample_table(SCENARIO_DATE, &[(40.03, -8.0), (40.1, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(cell(&table, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert!(cell(&table, 1, "CHL").is_missing());
    assert_eq!(report.group("plankton").unwrap().tolerance_exceeded, 1);
}

// ============================================================================
// File handling
// ============================================================================

#[test]
fn test_each_file_opened_once() {
    let tree = GridTree::new();
    let mut source = MockGridSource::new();
    for day in [15, 16, 17] {
        let name = format!("CHL_201606{}.nc", day);
        let path = tree.add_file(2016, &name);
        source = source.with_dataset(&name, scenario_dataset(path));
    }
    let source = Arc::new(source);
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source.clone()).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[]);
    for i in 0..40 {
        let day = 15 + (i % 3) as u32;
        let lat = 38.0 + (i % 4) as f64;
        let lon = -9.0 + (i % 3) as f64;
        push_sample(&mut table, (2016, 6, day), lat, lon);
    }

    let report = collocator.run(&mut table).unwrap();

    assert_eq!(report.group("plankton").unwrap().matched, 40);
    assert_eq!(source.max_opens_per_path(), 1);
    assert_eq!(source.open_count(), 3);
    assert_eq!(report.cache.opens, 3);
}

#[test]
fn test_failed_open_is_not_retried() {
    let tree = GridTree::new();
    tree.add_file(2016, SCENARIO_FILE);
    let source = Arc::new(MockGridSource::new());
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source.clone()).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -8.0), (39.0, -9.0), (41.0, -7.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(report.group("plankton").unwrap().open_failed, 3);
    assert_eq!(source.open_count(), 1);
    assert_eq!(report.cache.failed_opens, 1);
}

#[test]
fn test_file_added_between_runs_is_found() {
    let tree = GridTree::new();
    let path = tree.root().join("2016").join(SCENARIO_FILE);
    let source =
        Arc::new(MockGridSource::new().with_dataset(SCENARIO_FILE, scenario_dataset(&path)));
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut first = sample_table(SCENARIO_DATE, &[(40.0, -8.0)]);
    let report = collocator.run(&mut first).unwrap();
    assert_eq!(report.group("plankton").unwrap().no_file, 1);

    tree.add_file(2016, SCENARIO_FILE);

    let mut second = sample_table(SCENARIO_DATE, &[(40.0, -8.0)]);
    let report = collocator.run(&mut second).unwrap();
    let diag = report.group("plankton").unwrap();
    assert_eq!(diag.no_file, 0);
    assert_eq!(diag.matched, 1);
    assert_eq!(report.cache.opens, 1);
    assert_eq!(cell(&second, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
}

#[test]
fn test_sheets_share_one_run() {
    let (tree, source) = scenario();
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source.clone()).unwrap();

    let mut north = sample_table(SCENARIO_DATE, &[(40.0, -8.0), (41.0, -7.0)]);
    let mut south = sample_table(SCENARIO_DATE, &[(38.0, -8.0)]);
    let report = collocator.run_all([&mut north, &mut south]).unwrap();

    assert_eq!(report.total_samples, 3);
    assert_eq!(report.group("plankton").unwrap().matched, 3);
    assert_eq!(source.open_count(), 1);
    assert_eq!(cell(&north, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert_eq!(cell(&south, 0, "CHL").as_f64(), Some(0.5));
}

#[test]
fn test_invalid_axis_file() {
    let tree = GridTree::new();
    tree.add_file(2016, SCENARIO_FILE);
    let source = Arc::new(MockGridSource::new().with_axis_failure(SCENARIO_FILE));
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert!(cell(&table, 0, "CHL").is_missing());
    assert_eq!(report.group("plankton").unwrap().axis_invalid, 1);
}

#[test]
fn test_ambiguous_files_use_first_and_warn() {
    let tree = GridTree::new();
    let first = tree.add_file(2016, "CHL_20160615.nc");
    let second = tree.add_file(2016, "CHL_20160615_v2.nc");
    let other = DatasetBuilder::new(
        second,
        regular_axis(38.0, 1.0, 4),
        regular_axis(-9.0, 1.0, 3),
    )
    .variable("CHL", fill_attrs(-999.0), |_, _| 9.0)
    .build();
    let source = Arc::new(
        MockGridSource::new()
            .with_dataset("CHL_20160615.nc", scenario_dataset(first))
            .with_dataset("CHL_20160615_v2.nc", other),
    );
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -8.0), (40.0, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(cell(&table, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert_eq!(cell(&table, 1, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("CHL_20160615.nc"));
    assert_eq!(report.group("plankton").unwrap().ambiguous, 1);
}

#[test]
fn test_groups_are_independent() {
    let tree = GridTree::new();
    let sst_tree = GridTree::new();
    let path = tree.add_file(2016, SCENARIO_FILE);
    let source = Arc::new(MockGridSource::new().with_dataset(SCENARIO_FILE, scenario_dataset(path)));

    let sst = GroupConfig::new("sst", FileGroup::new(sst_tree.root()), vec!["analysed_sst".into()]);
    let config = CollocationConfig::default()
        .with_group(chl_group(&tree))
        .with_group(sst);
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(cell(&table, 0, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert!(cell(&table, 0, "analysed_sst").is_missing());
    assert_eq!(report.group("sst").unwrap().no_file, 1);
}

// ============================================================================
// Table handling
// ============================================================================

#[test]
fn test_invalid_rows_and_status_column() {
    let (tree, source) = scenario();
    let mut group = chl_group(&tree);
    group.write_status = true;
    let collocator =
        SampleCollocator::new(CollocationConfig::default().with_group(group), source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -8.0), (95.0, -8.0), (44.9, -8.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_eq!(report.total_samples, 3);
    assert_eq!(report.invalid_samples, 1);
    assert_eq!(cell(&table, 0, "status").as_text().as_deref(), Some("ok"));
    assert_eq!(cell(&table, 1, "status").as_text().as_deref(), Some("invalid_sample"));
    assert_eq!(
        cell(&table, 2, "status").as_text().as_deref(),
        Some("tolerance_exceeded")
    );
    assert!(cell(&table, 1, "CHL").is_missing());
}

#[test]
fn test_rows_keep_order_and_input_columns() {
    let (tree, source) = scenario();
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table((2016, 6, 16), &[(41.0, -7.0)]);
    push_sample(&mut table, SCENARIO_DATE, 40.0, -8.0);
    push_sample(&mut table, (2015, 1, 1), 39.0, -9.0);
    let before: Vec<Vec<CellValue>> = table.rows().to_vec();

    collocator.run(&mut table).unwrap();

    assert_eq!(table.row_count(), 3);
    for (row, original) in before.iter().enumerate() {
        assert_eq!(&table.rows()[row][..original.len()], &original[..]);
    }
    assert!(cell(&table, 0, "CHL").is_missing());
    assert_eq!(cell(&table, 1, "CHL").as_f64(), Some(SCENARIO_CHL));
    assert!(cell(&table, 2, "CHL").is_missing());
}

#[test]
fn test_missing_mapped_column_is_an_error() {
    let (tree, source) = scenario();
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = SampleTable::new(vec!["Year".into(), "LATITUDE".into()]);
    assert!(collocator.run(&mut table).is_err());
}

#[test]
fn test_parallel_matches_sequential() {
    let tree = GridTree::new();
    let mut source = MockGridSource::new();
    for day in 10..20usize {
        let name = format!("CHL_201606{}.nc", day);
        let path = tree.add_file(2016, &name);
        let ds = DatasetBuilder::new(path, regular_axis(38.0, 0.25, 16), regular_axis(-10.0, 0.25, 12))
            .variable("CHL", fill_attrs(-999.0), move |row, col| {
                (day * 1000 + row * 12 + col) as f64 / 100.0
            })
            .build();
        source = source.with_dataset(&name, ds);
    }
    let source = Arc::new(source);

    let build_table = || {
        let mut table = sample_table(SCENARIO_DATE, &[]);
        for i in 0..200u32 {
            let day = 10 + i % 10;
            let lat = 37.9 + (i % 17) as f64 * 0.23;
            let lon = -10.1 + (i % 13) as f64 * 0.24;
            push_sample(&mut table, (2016, 6, day), lat, lon);
        }
        table
    };

    let mut sequential = build_table();
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let seq_report = SampleCollocator::new(config.clone(), source.clone())
        .unwrap()
        .run(&mut sequential)
        .unwrap();

    let mut parallel = build_table();
    let mut par_config = config;
    par_config.parallel = true;
    let par_report = SampleCollocator::new(par_config, source)
        .unwrap()
        .run(&mut parallel)
        .unwrap();

    assert_eq!(sequential.rows(), parallel.rows());
    assert_eq!(seq_report.groups, par_report.groups);
    assert!(seq_report.group("plankton").unwrap().matched > 0);
}

// ============================================================================
// Derived values
// ============================================================================

#[test]
fn test_kelvin_variable_converted() {
    let tree = GridTree::new();
    let path = tree.add_file(2016, "SST_20160615.nc");
    let ds = DatasetBuilder::new(path, vec![40.0, 41.0], vec![-9.0, -8.0])
        .variable("analysed_sst", units_attrs("kelvin"), |_, _| 288.15)
        .build();
    let source = Arc::new(MockGridSource::new().with_dataset("SST_20160615.nc", ds));

    let group = GroupConfig::new("sst", FileGroup::new(tree.root()), vec!["analysed_sst".into()]);
    let collocator =
        SampleCollocator::new(CollocationConfig::default().with_group(group), source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -9.0)]);
    collocator.run(&mut table).unwrap();

    assert_approx_eq!(cell(&table, 0, "analysed_sst").as_f64().unwrap(), 15.0, 1e-9);
}

#[test]
fn test_gridded_upwelling_index() {
    let tree = GridTree::new();
    let path = tree.add_file(2016, "WIND_20160615.nc");
    let ds = DatasetBuilder::new(path, vec![0.0, 36.0], vec![-10.0, -9.0])
        .variable("eastward_wind", units_attrs("m s-1"), |_, _| 5.0)
        .variable("northward_wind", units_attrs("m s-1"), |_, _| 3.0)
        .build();
    let source = Arc::new(MockGridSource::new().with_dataset("WIND_20160615.nc", ds));

    let mut group = GroupConfig::new(
        "wind",
        FileGroup::new(tree.root()),
        vec!["eastward_wind".into(), "northward_wind".into()],
    );
    group.upwelling = Some(GriddedUpwelling {
        u_variable: "eastward_wind".into(),
        v_variable: "northward_wind".into(),
        column: "UI".into(),
    });
    let collocator =
        SampleCollocator::new(CollocationConfig::default().with_group(group), source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(36.0, -9.0), (0.0, -10.0)]);
    let report = collocator.run(&mut table).unwrap();

    assert_approx_eq!(cell(&table, 0, "UI").as_f64().unwrap(), -0.5466353776828418, 1e-6);
    assert!(cell(&table, 1, "UI").is_missing());
    assert_eq!(report.group("wind").unwrap().undefined_at_equator, 1);
}

#[test]
fn test_time_step_nearest_to_sample_date() {
    let tree = GridTree::new();
    let path = tree.add_file(2016, "CHL_20160615.nc");
    let ds = DatasetBuilder::new(path, vec![40.0, 41.0], vec![-9.0, -8.0])
        .time(vec![0.0, 1.0, 2.0], "days since 2016-06-14")
        .time_variable("CHL", fill_attrs(-999.0), |t, _, _| t as f64 + 0.5)
        .build();
    let source = Arc::new(MockGridSource::new().with_dataset("CHL_20160615.nc", ds));
    let config = CollocationConfig::default().with_group(chl_group(&tree));
    let collocator = SampleCollocator::new(config, source).unwrap();

    let mut table = sample_table(SCENARIO_DATE, &[(40.0, -9.0)]);
    collocator.run(&mut table).unwrap();

    assert_eq!(cell(&table, 0, "CHL").as_f64(), Some(1.5));
}
