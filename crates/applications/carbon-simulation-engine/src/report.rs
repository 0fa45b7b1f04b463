//! Output tables consumed by downstream plotting
//!
//! Column names are a contract with existing consumers and must not change.
//! Every file is written to a uniquely named temporary file in the target
//! directory and persisted over the final name, so a failed run never leaves a
//! truncated file behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::Result;
use crate::simulator::SimulationReport;
use crate::types::{CarbonTrace, LatencyMatrix};

/// Leading columns of the global results table; one column per region follows
pub const RESULTS_COLUMNS: [&str; 6] = [
    "Policy",
    "Avg Latency (ms)",
    "P95 Latency (ms)",
    "SLO Violation Rate (%)",
    "Avg Carbon (gCO2eq/kWh)",
    "Carbon Reduction",
];

pub const WORKLOAD_COLUMNS: [&str; 8] = [
    "Policy",
    "Workload",
    "Workload_ID",
    "Request_Count",
    "Avg_Latency_ms",
    "P95_Latency_ms",
    "SLO_Threshold_ms",
    "SLO_Violation_Rate_%",
];

pub const RESULTS_FILE: &str = "tables/simulation_results.csv";
pub const WORKLOAD_FILE: &str = "tables/per_workload_results.csv";
pub const CARBON_TRACE_FILE: &str = "data/carbon_intensity_traces.csv";
pub const LATENCY_MATRIX_FILE: &str = "data/latency_matrix.csv";

/// A header plus string rows, ready for CSV
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.header)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Global per-policy table with region selection percentages
pub fn results_table(report: &SimulationReport, regions: &[String]) -> Table {
    let mut header: Vec<String> = RESULTS_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(regions.iter().cloned());

    let rows = report
        .results
        .iter()
        .map(|r| {
            let mut row = vec![
                r.policy_name.clone(),
                format!("{:.1}", r.mean_latency_ms),
                format!("{:.1}", r.p95_latency_ms),
                format!("{:.2}", r.slo_violation_rate),
                format!("{:.1}", r.mean_carbon),
                format!("{:.1}", r.carbon_reduction),
            ];
            row.extend(r.region_selection.iter().map(|s| format!("{:.2}", s.percentage)));
            row
        })
        .collect();

    Table { header, rows }
}

pub fn workload_table(report: &SimulationReport) -> Table {
    let rows = report
        .results
        .iter()
        .flat_map(|r| {
            r.workloads.iter().map(move |w| {
                vec![
                    r.policy_name.clone(),
                    w.workload_name.clone(),
                    w.workload_id.clone(),
                    w.request_count.to_string(),
                    format!("{:.1}", w.mean_latency_ms),
                    format!("{:.1}", w.p95_latency_ms),
                    format!("{:.1}", w.slo_threshold_ms),
                    format!("{:.2}", w.slo_violation_rate),
                ]
            })
        })
        .collect();

    Table {
        header: WORKLOAD_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

pub fn carbon_trace_table(trace: &CarbonTrace) -> Table {
    let mut header = vec!["hour".to_string()];
    header.extend(trace.regions.iter().cloned());

    let rows = trace
        .values
        .iter()
        .enumerate()
        .map(|(hour, values)| {
            let mut row = vec![hour.to_string()];
            row.extend(values.iter().map(|v| format!("{v:.3}")));
            row
        })
        .collect();

    Table { header, rows }
}

pub fn latency_matrix_table(matrix: &LatencyMatrix) -> Table {
    let mut header = vec!["user_location".to_string()];
    header.extend(matrix.regions.iter().cloned());

    let rows = matrix
        .user_locations
        .iter()
        .zip(&matrix.rtt_ms)
        .map(|(name, rtts)| {
            let mut row = vec![name.clone()];
            row.extend(rtts.iter().map(|v| format!("{v:.1}")));
            row
        })
        .collect();

    Table { header, rows }
}

/// Paths of the files written by [`write_outputs`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub results: PathBuf,
    pub per_workload: PathBuf,
    pub carbon_trace: PathBuf,
    pub latency_matrix: PathBuf,
}

/// Write `contents` to a temporary file beside `path`, then persist it over `path`
///
/// The temporary file is removed on drop if anything fails before the persist.
fn write_atomic<F>(path: &Path, contents: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        contents(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    write_atomic(path, |w| table.write_csv(w))?;
    info!(path = %path.display(), rows = table.rows.len(), "Wrote table");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_atomic(path, |w| {
        serde_json::to_writer_pretty(&mut *w, value)?;
        Ok(())
    })?;
    info!(path = %path.display(), "Wrote JSON results");
    Ok(())
}

/// Write every output table under `output_dir`
pub fn write_outputs(
    output_dir: &Path,
    report: &SimulationReport,
    trace: &CarbonTrace,
    matrix: &LatencyMatrix,
) -> Result<OutputPaths> {
    fs::create_dir_all(output_dir.join("tables"))?;
    fs::create_dir_all(output_dir.join("data"))?;

    let paths = OutputPaths {
        results: output_dir.join(RESULTS_FILE),
        per_workload: output_dir.join(WORKLOAD_FILE),
        carbon_trace: output_dir.join(CARBON_TRACE_FILE),
        latency_matrix: output_dir.join(LATENCY_MATRIX_FILE),
    };

    write_table(&paths.results, &results_table(report, &trace.regions))?;
    write_table(&paths.per_workload, &workload_table(report))?;
    write_table(&paths.carbon_trace, &carbon_trace_table(trace))?;
    write_table(&paths.latency_matrix, &latency_matrix_table(matrix))?;

    Ok(paths)
}
