use std::io::Write;

use anyhow::Result as AnyResult;
use bid_leveling_core::NormalizationRule;
use bid_leveling_rendering::{
    format_delta, format_money, CellPresentation, MatrixBackend, MatrixPresentation,
};
use bid_leveling_system_scenario::{AwardLine, ScenarioTotals};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, Table};

const HIDDEN_CELL: &str = "\u{00b7}";

/// Prints matrices as terminal tables.
#[derive(Debug)]
pub(crate) struct TableBackend<W> {
    out: W,
}

impl<W: Write> TableBackend<W> {
    pub(crate) fn new(out: W) -> Self {
        Self { out }
    }

    /// Prints the effective rule set.
    pub(crate) fn present_rules(&mut self, rules: &[NormalizationRule]) -> AnyResult<()> {
        let mut table = Table::new();
        let _ = table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Id", "Label", "Kind", "Value", "Applies to", "Active"]);
        for rule in rules {
            let _ = table.add_row(vec![
                Cell::new(&rule.id),
                Cell::new(&rule.label),
                Cell::new(format!("{:?}", rule.kind).to_lowercase()),
                Cell::new(rule.value).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:?}", rule.apply_to).to_lowercase()),
                Cell::new(if rule.active { "yes" } else { "no" }),
            ]);
        }
        writeln!(self.out, "{table}")?;
        Ok(())
    }

    /// Prints the award lines and totals of a scenario.
    pub(crate) fn present_award(
        &mut self,
        scenario_name: &str,
        lines: &[AwardLine],
        totals: ScenarioTotals,
    ) -> AnyResult<()> {
        let mut table = Table::new();
        let _ = table
            .load_preset(UTF8_FULL)
            .set_header(vec!["Scope", "Bidder", "Leveled"]);
        for line in lines {
            let _ = table.add_row(vec![
                Cell::new(&line.scope),
                Cell::new(&line.bidder),
                Cell::new(format_money(line.leveled)).set_alignment(CellAlignment::Right),
            ]);
        }
        writeln!(self.out, "{scenario_name}")?;
        writeln!(self.out, "{table}")?;
        self.write_totals(totals)
    }

    fn write_totals(&mut self, totals: ScenarioTotals) -> AnyResult<()> {
        writeln!(
            self.out,
            "Scenario total: {}  Completeness: {}%",
            format_money(totals.total),
            totals.completeness
        )?;
        Ok(())
    }
}

impl<W: Write> MatrixBackend for TableBackend<W> {
    fn present(&mut self, presentation: &MatrixPresentation) -> AnyResult<()> {
        let mut header = vec![Cell::new("Scope")];
        header.extend(presentation.bidders.iter().map(|bidder| Cell::new(&bidder.label)));
        header.push(Cell::new("Median"));

        let mut table = Table::new();
        let _ = table.load_preset(UTF8_FULL).set_header(header);
        for row in &presentation.rows {
            let mut cells = vec![Cell::new(format!("{}\n{}", row.scope.id, row.scope.label))];
            cells.extend(row.cells.iter().map(matrix_cell));
            cells.push(Cell::new(format_money(row.median)).set_alignment(CellAlignment::Right));
            let _ = table.add_row(cells);
        }

        writeln!(self.out, "{table}")?;
        self.write_totals(presentation.totals)?;
        writeln!(self.out, "Outliers: {}", presentation.outlier_count())?;
        Ok(())
    }
}

fn matrix_cell(cell: &CellPresentation) -> Cell {
    if !cell.visible {
        return Cell::new(HIDDEN_CELL).set_alignment(CellAlignment::Center);
    }

    let marker = if cell.selected { "* " } else { "" };
    let mut detail = format_delta(cell.delta);
    if cell.notes > 0 {
        detail.push_str(&format!(" [{}]", cell.notes));
    }
    if cell.outlier {
        detail.push_str(" !");
    }

    let text = format!(
        "{marker}{} {}\n{detail}",
        cell.status.short_tag(),
        format_money(cell.leveled)
    );
    let rendered = Cell::new(text).set_alignment(CellAlignment::Right);
    match cell.background {
        Some(background) => {
            let (r, g, b) = background.to_rgb_u8();
            rendered.bg(Color::Rgb { r, g, b })
        }
        None => rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bid_leveling_core::{BidderId, ScopeId};
    use bid_leveling_rendering::{DisplayFilter, MatrixOptions};
    use bid_leveling_session::default_rules;
    use bid_leveling_system_bootstrap::DemoPackage;
    use std::collections::BTreeMap;

    fn render(options: MatrixOptions, selections: &BTreeMap<ScopeId, BidderId>) -> String {
        let package = DemoPackage::leveling_page();
        let presentation = MatrixPresentation::build(
            package.bidders(),
            package.scope_items(),
            &default_rules(),
            selections,
            options,
        );
        let mut backend = TableBackend::new(Vec::new());
        backend.present(&presentation).expect("table renders");
        String::from_utf8(backend.out).expect("utf-8 output")
    }

    #[test]
    fn matrix_lists_every_bidder_and_leveled_value() {
        let output = render(MatrixOptions::default(), &BTreeMap::new());
        for bidder in ["VND-044", "VND-012", "VND-028", "VND-006", "VND-019"] {
            assert!(output.contains(bidder), "missing column {bidder}");
        }
        assert!(output.contains("INC $54,506"));
        assert!(output.contains("EXCL $38,320"));
        assert!(output.contains("Completeness: 0%"));
    }

    #[test]
    fn gaps_only_hides_included_cells_and_marks_selection() {
        let selections = BTreeMap::from([(
            ScopeId::new("CSI-23-3700"),
            BidderId::new("VND-006"),
        )]);
        let options = MatrixOptions {
            filter: DisplayFilter::GapsOnly,
            heatmap: false,
        };
        let output = render(options, &selections);
        assert!(!output.contains("INC $54,506"));
        assert!(output.contains("* EXCL $38,320"));
        assert!(output.contains("Scenario total: $38,320  Completeness: 20%"));
    }

    #[test]
    fn rules_table_lists_defaults() {
        let mut backend = TableBackend::new(Vec::new());
        backend.present_rules(&default_rules()).expect("rules render");
        let output = String::from_utf8(backend.out).expect("utf-8 output");
        assert!(output.contains("RULE-PLUG-GAPS"));
        assert!(output.contains("RULE-GC-MARKUP"));
        assert!(output.contains("RULE-RISK-GAPS"));
    }
}
