use serde_json::json;
use titer_tables::data::loader::{json_records, select_result_set};
use titer_tables::{
    BuildError, CityTable, ConsistencyBuilder, Decoration, EntryKind, ExportConfig, ExportError,
    MatrixExporter, RecordIndex, ResultSet, SearchConfig, TiterMatrix,
};

fn indexes() -> (RecordIndex, RecordIndex) {
    let cities = CityTable::builtin();
    let antigens = json_records(&json!([
        { "id": "A1", "long": "A/VIETNAM/1194/2004" },
        { "id": "A2", "long": "A/HONG-KONG/213/2003" },
        { "id": "A3", "long": "A/TURKEY/1/2005" },
        { "id": "A4", "long": "A/INDONESIA/5/2005" },
    ]))
    .unwrap();
    let sera = json_records(&json!([
        { "id": "S1", "long": "A/VIETNAM/1194/2004 F12", "strain_id": "A1" },
        { "id": "S2", "long": "A/HONG-KONG/213/2003 F3", "strain_id": "A2" },
        { "id": "S3", "long": "A/TURKEY/1/2005 F1" },
    ]))
    .unwrap();
    (
        RecordIndex::antigens(antigens, &cities, SearchConfig::default()).unwrap(),
        RecordIndex::sera(sera, &cities, SearchConfig::default()).unwrap(),
    )
}

fn result_set(value: serde_json::Value) -> ResultSet {
    serde_json::from_value(value).unwrap()
}

fn sample_matrix() -> TiterMatrix {
    let (antigens, sera) = indexes();
    let set = result_set(json!({
        "file": "plate-7.csv",
        "antigen_ids": ["A3", "A1", "A2"],
        "serum_ids": ["S2", "S1"],
        "titers": [
            ["<10", "40"],
            ["80", ">1280"],
            ["640", null],
        ],
    }));
    ConsistencyBuilder::new(&antigens, &sera)
        .unwrap()
        .build(&set)
        .unwrap()
}

#[test]
fn matrix_follows_result_order_and_subsets_masters() {
    let matrix = sample_matrix();
    assert_eq!(matrix.file(), Some("plate-7.csv"));
    assert_eq!(matrix.shape(), (3, 2));
    assert_eq!(matrix.antigen_ids(), vec!["A3", "A1", "A2"]);
    assert_eq!(matrix.serum_ids(), vec!["S2", "S1"]);
    assert!(matrix.antigen("A4").is_none());
    assert!(matrix.serum("S3").is_none());

    assert_eq!(matrix.titer("A1", "S2").unwrap().raw, "80");
    assert_eq!(matrix.is_less_than("A3", "S2"), Some(true));
    assert_eq!(matrix.is_greater_than("A1", "S1"), Some(true));
    assert!(matrix.titer("A2", "S1").unwrap().titer.is_missing());
    assert_eq!(matrix.homologous_serum("A2").map(|s| s.id.as_str()), Some("S2"));
}

#[test]
fn unknown_antigen_blocks_the_whole_table() {
    let (antigens, sera) = indexes();
    let set = result_set(json!({
        "antigen_ids": ["A1", "A9"],
        "serum_ids": ["S1"],
        "titers": [["40"], ["80"]],
    }));
    let err = ConsistencyBuilder::new(&antigens, &sera)
        .unwrap()
        .build(&set)
        .unwrap_err();
    assert_eq!(
        err,
        BuildError::UnresolvedReference {
            axis: EntryKind::Antigen,
            id: "A9".into()
        }
    );
}

#[test]
fn unknown_serum_is_reported_on_the_serum_axis() {
    let (antigens, sera) = indexes();
    let set = result_set(json!({
        "antigen_ids": ["A1"],
        "serum_ids": ["S1", "S7"],
        "titers": [["40", "80"]],
    }));
    let err = ConsistencyBuilder::new(&antigens, &sera)
        .unwrap()
        .build(&set)
        .unwrap_err();
    assert!(matches!(
        err,
        BuildError::UnresolvedReference { axis: EntryKind::Serum, ref id } if id == "S7"
    ));
}

#[test]
fn result_sets_load_from_experiment_documents() {
    let (antigens, sera) = indexes();
    let doc = json!([
        { "results": [] },
        { "results": [
            { "antigen_ids": ["A1"], "serum_ids": ["S1"], "titers": [[160]] }
        ] },
    ]);
    let set = select_result_set(&doc, 1, 0).unwrap();
    let matrix = ConsistencyBuilder::new(&antigens, &sera)
        .unwrap()
        .build(&set)
        .unwrap();
    assert_eq!(matrix.titer("A1", "S1").unwrap().titer.numeric(), Some(160.0));
    assert!(select_result_set(&doc, 0, 0).is_err());
}

#[test]
fn thresholded_and_plain_exports_share_shape() {
    let matrix = sample_matrix();
    let exporter = MatrixExporter::new(&matrix);
    let plain = exporter.export(&ExportConfig::default()).unwrap();
    let thresholded = exporter
        .export(&ExportConfig {
            thresholded: true,
            ..ExportConfig::default()
        })
        .unwrap();

    assert_eq!(plain.table.index, thresholded.table.index);
    assert_eq!(plain.table.columns, thresholded.table.columns);
    assert_eq!(plain.numeric, thresholded.numeric);

    let plain_body = plain.table.body();
    let thresholded_body = thresholded.table.body();
    assert_eq!(plain_body.len(), 3);
    for (i, row) in plain_body.iter().enumerate() {
        assert_eq!(row.len(), 2);
        assert_eq!(plain.numeric.values[i].len(), row.len());
    }

    // Uncensored cells are identical, censored ones are substituted.
    assert_eq!(plain_body[1][0], "80");
    assert_eq!(thresholded_body[1][0], "80");
    assert_eq!(plain_body[0][0], "5");
    assert_eq!(thresholded_body[0][0], "<10");
    assert_eq!(plain_body[1][1], "2560");
    assert_eq!(thresholded_body[1][1], ">1280");
    assert_eq!(plain_body[2][1], "*");
    assert_eq!(plain.numeric.values[2][1], None);
    assert_eq!(plain.numeric.values[0][0], Some(5.0));

    assert_eq!(
        plain.table.index,
        vec!["A/TURKEY/1/2005", "A/VIETNAM/1194/2004", "A/HONG-KONG/213/2003"]
    );
    assert_eq!(
        plain.table.columns,
        vec!["A/HONG-KONG/213/2003 F3", "A/VIETNAM/1194/2004 F12"]
    );
}

#[test]
fn extra_rows_must_match_the_serum_count() {
    let matrix = sample_matrix();
    let exporter = MatrixExporter::new(&matrix);

    let too_short = ExportConfig {
        extra_rows: vec![Decoration::new("lot", vec!["L1".into()])],
        ..ExportConfig::default()
    };
    assert!(matches!(
        exporter.export(&too_short),
        Err(ExportError::ShapeMismatch { expected: 2, actual: 1, .. })
    ));

    let with_ids = ExportConfig {
        extra_rows: vec![Decoration::new("serum", vec!["S2".into(), "S1".into()])],
        ..ExportConfig::default()
    };
    let export = exporter.export(&with_ids).unwrap();
    assert_eq!(export.table.body_row, 1);
    assert_eq!(export.table.index[0], "serum");
    assert_eq!(export.table.cells[0], matrix.serum_ids());
}

#[test]
fn extra_columns_must_match_the_antigen_count() {
    let matrix = sample_matrix();
    let config = ExportConfig {
        extra_columns: vec![Decoration::new("clade", vec!["2.2".into(), "1".into()])],
        ..ExportConfig::default()
    };
    let err = MatrixExporter::new(&matrix).export(&config).unwrap_err();
    assert_eq!(
        err,
        ExportError::ShapeMismatch {
            what: "extra column `clade`".into(),
            expected: 3,
            actual: 2,
        }
    );
}

#[test]
fn id_decorations_wrap_the_body() {
    let matrix = sample_matrix();
    let config = ExportConfig {
        add_ids: true,
        add_serum_strain_ids: true,
        ..ExportConfig::default()
    };
    let table = MatrixExporter::new(&matrix).export(&config).unwrap().table;

    assert_eq!((table.body_row, table.body_col), (2, 1));
    assert_eq!(table.index[..2], ["id".to_string(), "serum strain id".to_string()]);
    assert_eq!(table.columns[0], "id");
    assert_eq!(table.cells[0], vec!["", "S2", "S1"]);
    assert_eq!(table.cells[1], vec!["", "A2", "A1"]);
    let id_column: Vec<&str> = table.cells[2..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(id_column, vec!["A3", "A1", "A2"]);
    assert_eq!(table.body().len(), 3);
}

#[test]
fn id_flags_overwrite_caller_decorations_with_the_same_label() {
    let matrix = sample_matrix();
    let config = ExportConfig {
        extra_rows: vec![
            Decoration::new("id", vec!["old".into(), "old".into()]),
            Decoration::new("lot", vec!["L1".into(), "L2".into()]),
        ],
        extra_columns: vec![Decoration::new("id", vec!["x".into(), "y".into(), "z".into()])],
        add_ids: true,
        ..ExportConfig::default()
    };
    let table = MatrixExporter::new(&matrix).export(&config).unwrap().table;

    assert_eq!((table.body_row, table.body_col), (2, 1));
    assert_eq!(table.index[..2], ["id".to_string(), "lot".to_string()]);
    assert_eq!(table.columns.iter().filter(|c| *c == "id").count(), 1);
    assert_eq!(table.cells[0], vec!["", "S2", "S1"]);
    assert_eq!(table.cells[1], vec!["", "L1", "L2"]);
    assert_eq!(table.cells[2][0], "A3");
}

#[test]
fn custom_names_replace_headers_only_when_lengths_agree() {
    let matrix = sample_matrix();
    let exporter = MatrixExporter::new(&matrix);
    let short: Vec<String> = matrix.antigens().iter().map(|e| e.short.clone()).collect();

    let export = exporter
        .export(&ExportConfig {
            antigen_names: Some(short.clone()),
            ..ExportConfig::default()
        })
        .unwrap();
    assert_eq!(export.table.index, short);
    assert_eq!(export.numeric.row_labels, short);
    assert_eq!(export.table.index[2], "A/HK/213/2003");

    let err = exporter
        .export(&ExportConfig {
            serum_names: Some(vec!["only one".into()]),
            ..ExportConfig::default()
        })
        .unwrap_err();
    assert!(matches!(err, ExportError::ShapeMismatch { expected: 2, actual: 1, .. }));
}

#[test]
fn orders_reorder_and_subset_the_export() {
    let matrix = sample_matrix();
    let exporter = MatrixExporter::new(&matrix);

    let export = exporter
        .export(&ExportConfig {
            antigen_order: Some(vec!["A2".into(), "A3".into()]),
            serum_order: Some(vec!["S1".into()]),
            ..ExportConfig::default()
        })
        .unwrap();
    assert_eq!(export.numeric.values, vec![vec![None], vec![Some(40.0)]]);

    let unknown = exporter.export(&ExportConfig {
        antigen_order: Some(vec!["A4".into()]),
        ..ExportConfig::default()
    });
    assert_eq!(
        unknown.unwrap_err(),
        ExportError::UnknownId {
            axis: EntryKind::Antigen,
            id: "A4".into()
        }
    );

    let repeated = exporter.export(&ExportConfig {
        serum_order: Some(vec!["S1".into(), "S1".into()]),
        ..ExportConfig::default()
    });
    assert!(matches!(repeated, Err(ExportError::RepeatedId { axis: EntryKind::Serum, .. })));
}

#[test]
fn as_is_and_rounding() {
    let (antigens, sera) = indexes();
    let set = result_set(json!({
        "antigen_ids": ["A1"],
        "serum_ids": ["S1", "S2", "S3"],
        "titers": [["20/40", "<10", "*"]],
    }));
    let matrix = ConsistencyBuilder::new(&antigens, &sera)
        .unwrap()
        .build(&set)
        .unwrap();
    let exporter = MatrixExporter::new(&matrix);

    let raw = exporter
        .export(&ExportConfig {
            as_is: true,
            thresholded: true,
            ..ExportConfig::default()
        })
        .unwrap();
    assert_eq!(raw.table.body()[0], ["20/40", "<10", "*"]);

    let rounded = exporter
        .export(&ExportConfig {
            do_rounding: true,
            ..ExportConfig::default()
        })
        .unwrap();
    assert_eq!(rounded.table.body()[0], ["28", "5", "*"]);
    assert_eq!(rounded.numeric.values[0], vec![Some(28.0), Some(5.0), None]);

    let exact = exporter.export(&ExportConfig::default()).unwrap();
    let split = exact.numeric.values[0][0].unwrap();
    assert!((split - 800f64.sqrt()).abs() < 1e-9);
}

#[test]
fn csv_output_has_a_header_row_and_labelled_rows() {
    let matrix = sample_matrix();
    let config = ExportConfig {
        thresholded: true,
        add_ids: true,
        ..ExportConfig::default()
    };
    let table = MatrixExporter::new(&matrix).export(&config).unwrap().table;

    let mut out = Vec::new();
    table.write_csv(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            ",id,A/HONG-KONG/213/2003 F3,A/VIETNAM/1194/2004 F12",
            "id,,S2,S1",
            "A/TURKEY/1/2005,A3,<10,40",
            "A/VIETNAM/1194/2004,A1,80,>1280",
            "A/HONG-KONG/213/2003,A2,640,*",
        ]
    );
}
