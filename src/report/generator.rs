//! Markdown report generation.
//!
//! This module renders an [`AnalyticsBundle`] as a Markdown report with
//! one table per chart, peer averages as extra columns, or as pretty JSON.

use crate::config::{ReportConfig, ReportFormat};
use crate::models::{
    AnalyticsBundle, CategoryCount, DrillSeries, HeadcountView, InterventionView, Kpis,
    PeerOverlay, RevenueView, Series,
};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Rendering switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub format: ReportFormat,
    pub include_drilldowns: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            format: ReportFormat::Markdown,
            include_drilldowns: true,
        }
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            format: config.format,
            include_drilldowns: config.include_drilldowns,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(bundle: &AnalyticsBundle, options: &ReportOptions) -> String {
    let mut output = String::new();

    // Title
    let title = bundle
        .participant_name
        .as_deref()
        .unwrap_or(&bundle.participant_id);
    output.push_str(&format!("# Performance Report: {}\n\n", title));

    output.push_str(&generate_metadata_section(bundle));

    if bundle.is_empty() {
        output.push_str("No performance data recorded for this participant yet.\n\n");
    }

    output.push_str(&generate_kpi_section(&bundle.kpis));

    let peers = bundle.peers.as_ref();
    output.push_str(&generate_revenue_section(&bundle.revenue, peers, options));
    output.push_str(&generate_headcount_section(&bundle.headcount, peers, options));
    output.push_str(&generate_interventions_section(&bundle.interventions, peers, options));
    output.push_str(&generate_compliance_section(&bundle.compliance, peers));
    output.push_str(&generate_warnings_section(&bundle.warnings));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(bundle: &AnalyticsBundle) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Participant:** `{}`\n", bundle.participant_id));
    if let Some(ref program) = bundle.program_id {
        section.push_str(&format!("- **Program:** `{}`\n", program));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        bundle.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(ref peers) = bundle.peers {
        let dimension = peers
            .dimension
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        section.push_str(&format!(
            "- **Peer Cohort:** {} peers by {}\n",
            peers.peer_count, dimension
        ));
    }
    section.push('\n');

    section
}

/// Generate the KPI table.
fn generate_kpi_section(kpis: &Kpis) -> String {
    let mut section = String::new();

    section.push_str("## Key Indicators\n\n");
    section.push_str("| Required | Completed | Participation | Headcount | Revenue |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {}% | {} | {} |\n\n",
        kpis.required_interventions,
        kpis.completed_interventions,
        kpis.participation_rate,
        format_number(kpis.current_headcount),
        format_number(kpis.total_revenue)
    ));

    section
}

/// Generate the revenue section.
fn generate_revenue_section(
    revenue: &RevenueView,
    peers: Option<&PeerOverlay>,
    options: &ReportOptions,
) -> String {
    let mut section = String::new();

    section.push_str("## Revenue\n\n");
    section.push_str("### Monthly\n\n");
    section.push_str(&series_table(
        "Month",
        &revenue.monthly,
        peers.map(|p| &p.revenue_monthly),
    ));
    section.push_str("### Annual\n\n");
    section.push_str(&series_table(
        "Year",
        &revenue.annual,
        peers.map(|p| &p.revenue_annual),
    ));

    if options.include_drilldowns {
        section.push_str(&drilldown_tables("Month", &revenue.drilldown));
    }

    section
}

/// Generate the headcount section with its permanent/temporary split.
fn generate_headcount_section(
    headcount: &HeadcountView,
    peers: Option<&PeerOverlay>,
    options: &ReportOptions,
) -> String {
    let mut section = String::new();

    section.push_str("## Headcount\n\n");

    if headcount.monthly.is_empty() {
        section.push_str("No data.\n\n");
        return section;
    }

    let with_split = options.include_drilldowns && !headcount.drilldown.is_empty();
    let peer_series = peers.map(|p| &p.headcount_monthly);

    let mut header = String::from("| Month | Total |");
    let mut align = String::from("|:---|---:|");
    if with_split {
        header.push_str(" Permanent | Temporary |");
        align.push_str("---:|---:|");
    }
    if peer_series.is_some() {
        header.push_str(" Peer Avg |");
        align.push_str("---:|");
    }
    section.push_str(&header);
    section.push('\n');
    section.push_str(&align);
    section.push('\n');

    for (i, (month, total)) in headcount
        .monthly
        .categories
        .iter()
        .zip(&headcount.monthly.data)
        .enumerate()
    {
        let mut row = format!("| {} | {} |", month, format_number(*total));
        if with_split {
            let split = headcount.drilldown.iter().find(|d| &d.id == month);
            let part = |idx: usize| {
                split
                    .and_then(|d| d.data.get(idx))
                    .map(|v| format_number(*v))
                    .unwrap_or_else(|| "-".to_string())
            };
            row.push_str(&format!(" {} | {} |", part(0), part(1)));
        }
        if let Some(peer) = peer_series {
            row.push_str(&format!(" {} |", peer_cell(peer.data.get(i).copied())));
        }
        section.push_str(&row);
        section.push('\n');
    }
    section.push('\n');

    section
}

/// Generate the interventions section.
fn generate_interventions_section(
    interventions: &InterventionView,
    peers: Option<&PeerOverlay>,
    options: &ReportOptions,
) -> String {
    let mut section = String::new();

    section.push_str("## Completed Interventions by Area\n\n");
    section.push_str(&counts_table(
        "Area",
        &interventions.by_area,
        peers.map(|p| p.interventions_by_area.as_slice()),
    ));

    if options.include_drilldowns {
        section.push_str(&drilldown_tables("Intervention", &interventions.drilldown));
    }

    section
}

/// Generate the compliance section.
fn generate_compliance_section(compliance: &[CategoryCount], peers: Option<&PeerOverlay>) -> String {
    let mut section = String::new();

    section.push_str("## Compliance Documents\n\n");
    section.push_str(&counts_table(
        "Status",
        compliance,
        peers.map(|p| p.compliance_by_status.as_slice()),
    ));

    section
}

/// Generate the warnings section.
fn generate_warnings_section(warnings: &[String]) -> String {
    if warnings.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Warnings\n\n");
    for warning in warnings {
        section.push_str(&format!("- {}\n", warning));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by PeerBench v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn series_table(label: &str, series: &Series, peer: Option<&Series>) -> String {
    if series.is_empty() {
        return "No data.\n\n".to_string();
    }

    let mut table = String::new();
    match peer {
        Some(_) => {
            table.push_str(&format!("| {} | Value | Peer Avg |\n", label));
            table.push_str("|:---|---:|---:|\n");
        }
        None => {
            table.push_str(&format!("| {} | Value |\n", label));
            table.push_str("|:---|---:|\n");
        }
    }

    for (i, (category, value)) in series.categories.iter().zip(&series.data).enumerate() {
        match peer {
            Some(p) => table.push_str(&format!(
                "| {} | {} | {} |\n",
                category,
                format_number(*value),
                peer_cell(p.data.get(i).copied())
            )),
            None => table.push_str(&format!("| {} | {} |\n", category, format_number(*value))),
        }
    }
    table.push('\n');

    table
}

fn counts_table(label: &str, counts: &[CategoryCount], peer: Option<&[CategoryCount]>) -> String {
    let peer_only: Vec<&CategoryCount> = peer
        .unwrap_or_default()
        .iter()
        .filter(|p| !counts.iter().any(|c| c.name == p.name))
        .collect();

    if counts.is_empty() && peer_only.is_empty() {
        return "No data.\n\n".to_string();
    }

    let mut table = String::new();
    match peer {
        Some(peer) => {
            table.push_str(&format!("| {} | Count | Peer Avg |\n", label));
            table.push_str("|:---|---:|---:|\n");
            for count in counts {
                let avg = peer.iter().find(|p| p.name == count.name).map(|p| p.count);
                table.push_str(&format!(
                    "| {} | {} | {} |\n",
                    count.name,
                    format_number(count.count),
                    peer_cell(avg)
                ));
            }
            for p in peer_only {
                table.push_str(&format!("| {} | 0 | {} |\n", p.name, peer_cell(Some(p.count))));
            }
        }
        None => {
            table.push_str(&format!("| {} | Count |\n", label));
            table.push_str("|:---|---:|\n");
            for count in counts {
                table.push_str(&format!("| {} | {} |\n", count.name, format_number(count.count)));
            }
        }
    }
    table.push('\n');

    table
}

fn drilldown_tables(label: &str, drilldown: &[DrillSeries]) -> String {
    if drilldown.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    for drill in drilldown {
        section.push_str(&format!(
            "<details>\n<summary>{}</summary>\n\n| {} | Value |\n|:---|---:|\n",
            drill.name, label
        ));
        for (category, value) in drill.categories.iter().zip(&drill.data) {
            section.push_str(&format!("| {} | {} |\n", category, format_number(*value)));
        }
        section.push_str("\n</details>\n\n");
    }

    section
}

fn peer_cell(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "-".to_string())
}

/// Integers print without decimals; averages keep two.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Generate a JSON report.
pub fn generate_json_report(bundle: &AnalyticsBundle) -> Result<String> {
    serde_json::to_string_pretty(bundle).map_err(Into::into)
}

/// Render in the configured format and write to `path`.
pub fn write_report(bundle: &AnalyticsBundle, options: &ReportOptions, path: &Path) -> Result<()> {
    let content = match options.format {
        ReportFormat::Json => generate_json_report(bundle)?,
        ReportFormat::Markdown => generate_markdown_report(bundle, options),
    };

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CohortDimension;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn series(entries: &[(&str, f64)]) -> Series {
        let map: BTreeMap<String, f64> = entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        Series::from_map(&map)
    }

    fn create_test_bundle() -> AnalyticsBundle {
        AnalyticsBundle {
            participant_id: "P1".to_string(),
            participant_name: Some("Acme Farms".to_string()),
            program_id: Some("PRG".to_string()),
            generated_at: Utc::now(),
            kpis: Kpis {
                required_interventions: 4,
                completed_interventions: 2,
                participation_rate: 50,
                current_headcount: 7.0,
                total_revenue: 1500.0,
            },
            revenue: RevenueView {
                monthly: series(&[("2024-01", 1000.0), ("2024-02", 500.0)]),
                annual: series(&[("2024", 1500.0)]),
                drilldown: vec![DrillSeries {
                    id: "2024".to_string(),
                    name: "2024".to_string(),
                    categories: vec!["2024-01".to_string(), "2024-02".to_string()],
                    data: vec![1000.0, 500.0],
                }],
            },
            headcount: HeadcountView {
                monthly: series(&[("2024-02", 7.0)]),
                drilldown: vec![DrillSeries {
                    id: "2024-02".to_string(),
                    name: "2024-02".to_string(),
                    categories: vec!["Permanent".to_string(), "Temporary".to_string()],
                    data: vec![5.0, 2.0],
                }],
            },
            interventions: InterventionView {
                by_area: vec![CategoryCount::new("Finance", 2.0)],
                drilldown: vec![],
            },
            compliance: vec![CategoryCount::new("Valid", 3.0)],
            peers: None,
            warnings: vec![],
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let bundle = create_test_bundle();
        let markdown = generate_markdown_report(&bundle, &ReportOptions::default());

        assert!(markdown.contains("# Performance Report: Acme Farms"));
        assert!(markdown.contains("## Key Indicators"));
        assert!(markdown.contains("| 4 | 2 | 50% | 7 | 1500 |"));
        assert!(markdown.contains("| 2024-01 | 1000 |"));
        assert!(markdown.contains("| 2024-02 | 7 | 5 | 2 |"));
        assert!(markdown.contains("| Valid | 3 |"));
        assert!(!markdown.contains("Peer Avg"));
        assert!(!markdown.contains("## Warnings"));
    }

    #[test]
    fn test_peer_columns_and_warnings() {
        let mut bundle = create_test_bundle();
        bundle.peers = Some(PeerOverlay {
            dimension: Some(CohortDimension::Sector),
            peer_count: 3,
            revenue_monthly: series(&[("2024-01", 400.0), ("2024-02", 0.0)]),
            revenue_annual: series(&[("2024", 400.0)]),
            headcount_monthly: series(&[("2024-02", 4.5)]),
            interventions_by_area: vec![
                CategoryCount::new("Finance", 1.5),
                CategoryCount::new("Legal", 0.25),
            ],
            compliance_by_status: vec![CategoryCount::new("Valid", 2.0)],
        });
        bundle.warnings.push("Peer comparison unavailable: boom".to_string());

        let markdown = generate_markdown_report(&bundle, &ReportOptions::default());
        assert!(markdown.contains("3 peers by sector"));
        assert!(markdown.contains("| 2024-01 | 1000 | 400 |"));
        assert!(markdown.contains("| 2024-02 | 7 | 5 | 2 | 4.50 |"));
        assert!(markdown.contains("| Legal | 0 | 0.25 |"));
        assert!(markdown.contains("## Warnings"));
        assert!(markdown.contains("- Peer comparison unavailable: boom"));
    }

    #[test]
    fn test_drilldowns_can_be_disabled() {
        let bundle = create_test_bundle();
        let options = ReportOptions {
            include_drilldowns: false,
            ..Default::default()
        };
        let markdown = generate_markdown_report(&bundle, &options);
        assert!(!markdown.contains("<details>"));
        assert!(markdown.contains("| Month | Total |\n"));
    }

    #[test]
    fn test_empty_bundle_notice() {
        let mut bundle = create_test_bundle();
        bundle.kpis = Kpis::default();
        bundle.revenue = RevenueView::default();
        bundle.headcount = HeadcountView::default();
        bundle.interventions = InterventionView::default();
        bundle.compliance.clear();

        let markdown = generate_markdown_report(&bundle, &ReportOptions::default());
        assert!(markdown.contains("No performance data recorded"));
    }

    #[test]
    fn test_generate_json_report() {
        let bundle = create_test_bundle();
        let json = generate_json_report(&bundle).unwrap();

        assert!(json.contains("\"participant_id\""));
        assert!(json.contains("\"kpis\""));
        assert!(!json.contains("\"peers\""));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let options = ReportOptions {
            format: ReportFormat::Json,
            include_drilldowns: true,
        };

        write_report(&create_test_bundle(), &options, &path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["participant_id"], "P1");
    }
}
