use cryptoscan_core::evaluator::Evaluation;
use cryptoscan_core::retrieval::RawNeighbors;
use cryptoscan_core::scanner::ScanItem;
use cryptoscan_core::vulns::Vulnerability;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub fn scan_line(path: &Path, category: &str) -> String {
    format!("File: {} Category: {}", path.display(), category)
}

pub fn item_line(item: &ScanItem) -> String {
    scan_line(&item.path, item.category())
}

/// Pretty JSON with four-space indent. Going through `serde_json::Value`
/// sorts object keys.
pub fn neighbors_json(raw: &RawNeighbors) -> serde_json::Result<String> {
    let value = serde_json::to_value(raw)?;
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn matrix_row(row: &BTreeMap<String, usize>) -> String {
    let cells: Vec<String> = row.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
    format!("{{{}}}", cells.join(", "))
}

pub fn evaluation_lines(eval: &Evaluation) -> Vec<String> {
    let mut lines = vec!["Confusion Matrix".to_string()];
    for (label, row) in &eval.matrix {
        lines.push(format!("{}: {}", label, matrix_row(row)));
    }
    lines.push(format!(
        "Total: {}, Correct: {}, Accuracy: {}",
        eval.total,
        eval.correct,
        eval.accuracy()
    ));
    for m in &eval.mismatches {
        lines.push(format!(
            "File: {}, Predicted: {}, Actual: {}",
            m.path.display(),
            m.predicted,
            m.actual
        ));
    }
    lines
}

/// One advisory. With `installed`, only advisories listing that exact
/// version produce output.
pub fn vuln_lines(package: &str, vuln: &Vulnerability, installed: Option<&str>) -> Vec<String> {
    let summary = vuln.summary.as_deref().unwrap_or("");
    match installed {
        None => vec![format!("Vulnerability: {}, Summary: {}", vuln.id, summary)],
        Some(version) if vuln.lists_version(version) => {
            let affected: Vec<&str> = vuln
                .affected
                .iter()
                .flat_map(|a| a.versions.iter().map(String::as_str))
                .collect();
            vec![
                format!("Package {} is affected by vulnerability {}", package, vuln.id),
                format!("Current version: {}", version),
                format!("Affected versions: {}", affected.join(", ")),
                format!("Summary: {}", summary),
            ]
        }
        Some(_) => Vec::new(),
    }
}
