use std::collections::BTreeMap;

use bid_leveling_core::{BidderId, CoverageStatus, NormalizationRule, RuleKind, RuleScope, ScopeId};
use bid_leveling_rendering::{
    DisplayFilter, MatrixBackend, MatrixOptions, MatrixPresentation,
};
use bid_leveling_system_bootstrap::DemoPackage;

fn build(
    rules: &[NormalizationRule],
    selections: &BTreeMap<ScopeId, BidderId>,
    options: MatrixOptions,
) -> MatrixPresentation {
    let package = DemoPackage::leveling_page();
    MatrixPresentation::build(
        package.bidders(),
        package.scope_items(),
        rules,
        selections,
        options,
    )
}

#[test]
fn leveling_page_matches_fixture_grid() {
    let matrix = build(&[], &BTreeMap::new(), MatrixOptions::default());
    assert_eq!(matrix.rows.len(), 5);

    let first = &matrix.rows[0];
    assert_eq!(first.scope.id, ScopeId::new("CSI-23-0900"));
    assert_eq!(first.median, 25_930);

    let leveled: Vec<i64> = first.cells.iter().map(|cell| cell.leveled).collect();
    assert_eq!(leveled, [54_506, 25_061, 44_651, 14_845, 25_930]);
    let raw: Vec<i64> = first.cells.iter().map(|cell| cell.raw).collect();
    assert_eq!(raw, [49_149, 21_604, 43_647, 12_931, 20_267]);
    let notes: Vec<u8> = first.cells.iter().map(|cell| cell.notes).collect();
    assert_eq!(notes, [3, 0, 0, 3, 0]);
    assert_eq!(first.cells[3].status, CoverageStatus::Clarify);
    assert!(first.cells.iter().all(|cell| cell.background.is_some()));
}

#[test]
fn hidden_cells_are_never_outliers_but_still_count_toward_median() {
    let all = build(&[], &BTreeMap::new(), MatrixOptions::default());
    let gaps = build(
        &[],
        &BTreeMap::new(),
        MatrixOptions {
            filter: DisplayFilter::GapsOnly,
            heatmap: false,
        },
    );

    for (full, filtered) in all.rows.iter().zip(&gaps.rows) {
        assert_eq!(full.median, filtered.median);
        for cell in &filtered.cells {
            assert_eq!(cell.visible, cell.status != CoverageStatus::Included);
            assert!(cell.visible || !cell.outlier);
            assert!(cell.background.is_none());
        }
    }
    assert!(gaps.outlier_count() <= all.outlier_count());
}

#[test]
fn selections_mark_cells_and_feed_totals() {
    let selections = BTreeMap::from([
        (ScopeId::new("CSI-23-0900"), BidderId::new("VND-012")),
        (ScopeId::new("CSI-23-3700"), BidderId::new("VND-006")),
    ]);
    let rules = [NormalizationRule::new(
        "RULE-PLUG-GAPS",
        "Plug exclusions and clarifications",
        RuleKind::Plug,
        5_000.0,
        RuleScope::Gaps,
    )];
    let matrix = build(&rules, &selections, MatrixOptions::default());

    assert!(matrix.rows[0].cells[1].selected);
    assert!(!matrix.rows[0].cells[0].selected);
    assert!(matrix.rows[2].cells[3].selected);
    assert_eq!(matrix.rows[2].cells[3].leveled, 43_320);
    assert_eq!(matrix.totals.total, 25_061 + 43_320);
    assert_eq!(matrix.totals.completeness, 40);
}

#[test]
fn backends_receive_the_presentation() {
    struct Recorder {
        rows: usize,
    }

    impl MatrixBackend for Recorder {
        fn present(&mut self, presentation: &MatrixPresentation) -> anyhow::Result<()> {
            self.rows = presentation.rows.len();
            Ok(())
        }
    }

    let mut recorder = Recorder { rows: 0 };
    recorder
        .present(&build(&[], &BTreeMap::new(), MatrixOptions::default()))
        .expect("presentation accepted");
    assert_eq!(recorder.rows, 5);
}
