//! Training CSV loading and dataset statistics

use crate::error::{Result, TriageError};
use crate::ml::models::FeatureSet;
use crate::models::{ComplaintRecord, SeverityLabel};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

pub const COL_COMMENT: &str = "Comentario";
pub const COL_CITY: &str = "Ciudad";
pub const COL_AGE: &str = "Edad";
pub const COL_GENDER: &str = "Género";
pub const COL_URGENCY: &str = "Nivel de urgencia";
pub const COL_RURAL: &str = "Zona rural";
pub const COL_INTERNET: &str = "Acceso a internet";
pub const COL_PRIOR_ATTENTION: &str = "Atención previa del gobierno";
pub const COL_CATEGORY: &str = "Categoría del problema";
pub const COL_SEVERITY: &str = "Nivel_gravedad";

/// Columns a full-feature training file must carry
pub const FULL_COLUMNS: [&str; 10] = [
    COL_COMMENT,
    COL_CITY,
    COL_AGE,
    COL_GENDER,
    COL_URGENCY,
    COL_RURAL,
    COL_INTERNET,
    COL_PRIOR_ATTENTION,
    COL_CATEGORY,
    COL_SEVERITY,
];

/// Columns a text-only training file must carry
pub const TEXT_ONLY_COLUMNS: [&str; 2] = [COL_COMMENT, COL_SEVERITY];

/// Header name -> column position
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_headers(headers: &csv::StringRecord, required: &[&str]) -> Result<Self> {
        let map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim().to_string(), i))
            .collect();

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|c| !map.contains_key(*c))
            .collect();
        if !missing.is_empty() {
            return Err(TriageError::Data(format!(
                "missing required column(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self(map))
    }

    /// Trimmed, non-empty cell value
    fn get<'r>(&self, record: &'r csv::StringRecord, column: &str) -> Option<&'r str> {
        self.0
            .get(column)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// Parse a yes/no cell: `1/0`, `true/false`, `si/sí/no`
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "si" | "sí" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Parse an age cell; anything that is not a non-negative number is missing
pub fn parse_age(raw: &str) -> Option<u32> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite() && *a >= 0.0 && *a < 150.0)
        .map(|a| a.round() as u32)
}

fn flag_cell(
    columns: &Columns,
    record: &csv::StringRecord,
    column: &str,
    row: u64,
) -> Result<Option<bool>> {
    match columns.get(record, column) {
        None => Ok(None),
        Some(raw) => parse_flag(raw).map(Some).ok_or_else(|| {
            TriageError::Data(format!(
                "row {}: column '{}' has non-boolean value '{}'",
                row, column, raw
            ))
        }),
    }
}

/// Load labelled complaints from a CSV file.
///
/// Fails with a data error when the file cannot be read, required columns are
/// missing, no rows remain, or only one severity class is present; and with a
/// label error when a severity cannot be binarised.
pub fn load_records(path: &Path, feature_set: FeatureSet) -> Result<Vec<ComplaintRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| TriageError::Data(format!("cannot read {}: {}", path.display(), e)))?;

    let required: &[&str] = match feature_set {
        FeatureSet::Full => &FULL_COLUMNS,
        FeatureSet::TextOnly => &TEXT_ONLY_COLUMNS,
    };
    let columns = Columns::from_headers(reader.headers()?, required)?;

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let row = record
            .position()
            .map(|p| p.line())
            .unwrap_or(idx as u64 + 2);

        let raw_label = columns.get(&record, COL_SEVERITY).unwrap_or("");
        let severity = SeverityLabel::binarize(raw_label).map_err(|e| match e {
            TriageError::Label(msg) => TriageError::Label(format!("row {}: {}", row, msg)),
            other => other,
        })?;

        records.push(ComplaintRecord {
            comment: columns
                .get(&record, COL_COMMENT)
                .unwrap_or_default()
                .to_string(),
            city: columns.get(&record, COL_CITY).map(str::to_string),
            age: columns.get(&record, COL_AGE).and_then(parse_age),
            gender: columns.get(&record, COL_GENDER).map(str::to_string),
            urgency: columns.get(&record, COL_URGENCY).map(str::to_string),
            rural: flag_cell(&columns, &record, COL_RURAL, row)?,
            internet_access: flag_cell(&columns, &record, COL_INTERNET, row)?,
            prior_attention: flag_cell(&columns, &record, COL_PRIOR_ATTENTION, row)?,
            category: columns.get(&record, COL_CATEGORY).map(str::to_string),
            severity: Some(severity),
        });
    }

    validate_records(&records)?;

    info!(
        path = %path.display(),
        rows = records.len(),
        feature_set = ?feature_set,
        "Training data loaded"
    );
    Ok(records)
}

/// Training rows must exist, be labelled, and cover both classes
pub fn validate_records(records: &[ComplaintRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(TriageError::Data("dataset has no rows".to_string()));
    }

    let mut counts = [0usize; SeverityLabel::COUNT];
    for (i, record) in records.iter().enumerate() {
        let label = record.severity.ok_or_else(|| {
            TriageError::Data(format!("training record {} has no severity label", i))
        })?;
        counts[label.index()] += 1;
    }

    if counts.iter().any(|&c| c == 0) {
        return Err(TriageError::Data(format!(
            "dataset needs both GRAVE and MODERADO rows, got GRAVE={} MODERADO={}",
            counts[SeverityLabel::Grave.index()],
            counts[SeverityLabel::Moderado.index()]
        )));
    }

    debug!(grave = counts[0], moderado = counts[1], "Class balance checked");
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-city aggregates
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CityStats {
    pub total: usize,
    pub grave: usize,
    pub rural_share: f64,
    pub internet_share: f64,
    pub prior_attention_share: f64,
}

/// Descriptive statistics of a complaint dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetSummary {
    pub total_rows: usize,
    pub unique_comments: usize,
    pub distinct_cities: usize,
    pub label_distribution: BTreeMap<String, usize>,
    /// Ten most frequent cities, most frequent first
    pub top_cities: Vec<(String, usize)>,
    pub rural_count: usize,
    pub urban_count: usize,
    pub city_stats: BTreeMap<String, CityStats>,
}

impl DatasetSummary {
    pub fn from_records(records: &[ComplaintRecord]) -> Self {
        let unique_comments: BTreeSet<&str> = records.iter().map(|r| r.comment.as_str()).collect();

        let mut label_distribution = BTreeMap::new();
        for record in records {
            if let Some(label) = record.severity {
                *label_distribution.entry(label.to_string()).or_insert(0) += 1;
            }
        }

        #[derive(Default)]
        struct Tally {
            total: usize,
            grave: usize,
            rural: usize,
            internet: usize,
            prior: usize,
        }

        let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
        // Rows without a city stay out of the per-city statistics
        for record in records {
            let Some(city) = record.city.as_deref() else {
                continue;
            };
            let tally = tallies.entry(city.to_string()).or_default();
            tally.total += 1;
            tally.grave += usize::from(record.severity.is_some_and(|s| s.is_grave()));
            tally.rural += usize::from(record.rural == Some(true));
            tally.internet += usize::from(record.internet_access == Some(true));
            tally.prior += usize::from(record.prior_attention == Some(true));
        }

        let mut top_cities: Vec<(String, usize)> = tallies
            .iter()
            .map(|(city, t)| (city.clone(), t.total))
            .collect();
        top_cities.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_cities.truncate(10);

        let rural_count = records.iter().filter(|r| r.rural == Some(true)).count();
        let urban_count = records.iter().filter(|r| r.rural == Some(false)).count();

        let city_stats = tallies
            .into_iter()
            .map(|(city, t)| {
                let share = |n: usize| round2(n as f64 / t.total as f64);
                let stats = CityStats {
                    total: t.total,
                    grave: t.grave,
                    rural_share: share(t.rural),
                    internet_share: share(t.internet),
                    prior_attention_share: share(t.prior),
                };
                (city, stats)
            })
            .collect::<BTreeMap<_, _>>();

        Self {
            total_rows: records.len(),
            unique_comments: unique_comments.len(),
            distinct_cities: city_stats.len(),
            label_distribution,
            top_cities,
            rural_count,
            urban_count,
            city_stats,
        }
    }
}
