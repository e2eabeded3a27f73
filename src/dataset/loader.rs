//! CSV loader for the preprocessed cardiovascular training table.

use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use super::DatasetError;
use crate::features::{FEATURE_LEN, FEATURE_NAMES};

/// Alternate header spellings accepted for feature columns.
const COLUMN_ALIASES: &[(&str, &str)] = &[("weight", "weight_kg")];

/// Options controlling how a training table is read.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Name of the 0/1 label column (matched case-insensitively).
    pub target_column: String,
    /// Drop exact duplicate rows, keeping the first occurrence.
    pub deduplicate: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            target_column: "cardio".to_string(),
            deduplicate: true,
        }
    }
}

/// Labeled rows in feature order with the label as the last column.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub rows: Vec<Vec<f64>>,
    /// Number of rows dropped as duplicates.
    pub duplicates_removed: usize,
}

impl LoadedDataset {
    pub fn labels(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.last().copied().unwrap_or(0.0))
            .collect()
    }

    pub fn positives(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.last() == Some(&1.0))
            .count()
    }

    /// Clone the rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Vec<Vec<f64>> {
        indices.iter().map(|&i| self.rows[i].clone()).collect()
    }
}

/// Load a training table from a CSV file.
///
/// The delimiter is `;` when the header line contains `;` but no `,`.
/// Headers are trimmed and lower-cased, and `unnamed*` index columns are
/// ignored along with any other column the feature layout does not use.
pub fn load_csv(path: &Path, options: &LoadOptions) -> Result<LoadedDataset, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = parse_csv(&text, options)?;
    tracing::info!(
        "Loaded {} rows ({} positive) from {}",
        dataset.rows.len(),
        dataset.positives(),
        path.display()
    );
    Ok(dataset)
}

/// Parse a training table from CSV text.
pub fn parse_csv(text: &str, options: &LoadOptions) -> Result<LoadedDataset, DatasetError> {
    let delimiter = sniff_delimiter(text);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|name| name.trim().to_lowercase())
        .collect();
    let layout = ColumnLayout::resolve(&headers, &options.target_column)?;

    let mut rows = Vec::new();
    let mut seen: HashSet<Vec<u64>> = HashSet::new();
    let mut duplicates_removed = 0usize;
    for record in reader.records() {
        let record = record?;
        let row = layout.extract(&record, &headers)?;
        if options.deduplicate {
            let key: Vec<u64> = row.iter().map(|v| v.to_bits()).collect();
            if !seen.insert(key) {
                duplicates_removed += 1;
                continue;
            }
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(DatasetError::Empty);
    }
    if duplicates_removed > 0 {
        tracing::warn!("Dropped {duplicates_removed} duplicate training rows");
    }
    Ok(LoadedDataset {
        rows,
        duplicates_removed,
    })
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    if header.contains(';') && !header.contains(',') {
        b';'
    } else {
        b','
    }
}

/// Column positions of the features (in feature order) and the label.
struct ColumnLayout {
    features: [usize; FEATURE_LEN],
    target: usize,
}

impl ColumnLayout {
    fn resolve(headers: &[String], target_column: &str) -> Result<Self, DatasetError> {
        let find = |name: &str| headers.iter().position(|header| header == name);
        let mut features = [0usize; FEATURE_LEN];
        for (slot, name) in features.iter_mut().zip(FEATURE_NAMES) {
            let alias = COLUMN_ALIASES
                .iter()
                .find(|(canonical, _)| *canonical == name)
                .map(|(_, alias)| *alias);
            *slot = find(name)
                .or_else(|| alias.and_then(find))
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
        }
        let target_name = target_column.trim().to_lowercase();
        let target =
            find(&target_name).ok_or_else(|| DatasetError::MissingColumn(target_name.clone()))?;
        Ok(Self { features, target })
    }

    fn extract(&self, record: &StringRecord, headers: &[String]) -> Result<Vec<f64>, DatasetError> {
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);
        let cell = |idx: usize| -> Result<f64, DatasetError> {
            let raw = record.get(idx).unwrap_or_default();
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| DatasetError::Parse {
                    line,
                    column: headers[idx].clone(),
                    value: raw.to_string(),
                })
        };
        let mut row = Vec::with_capacity(FEATURE_LEN + 1);
        for &idx in &self.features {
            row.push(cell(idx)?);
        }
        let label = cell(self.target)?;
        if label != 0.0 && label != 1.0 {
            return Err(DatasetError::InvalidLabel { line, value: label });
        }
        row.push(label);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: &str = "gender,weight,ap_hi,ap_lo,cholesterol,gluc,smoke,alco,active,age_years,bmi,pulse_pressure,health_index,cholesterol_gluc_interaction,bmi_category";

    fn row(ap_hi: u32, label: u8) -> String {
        format!("1,70.0,{ap_hi},80,1,1,0,0,1,50,24.2,{},1.0,1,1,{label}", ap_hi - 80)
    }

    #[test]
    fn loads_rows_in_feature_order() {
        let text = format!(
            "Unnamed: 0,id,{HEADER},cardio\n0,7,{}\n1,8,{}\n",
            row(120, 0),
            row(150, 1)
        );
        let dataset = parse_csv(&text, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.rows[1][2], 150.0);
        assert_eq!(dataset.rows[1][11], 70.0);
        assert_eq!(dataset.rows[1].len(), FEATURE_LEN + 1);
        assert_eq!(dataset.labels(), vec![0.0, 1.0]);
        assert_eq!(dataset.positives(), 1);
    }

    #[test]
    fn columns_are_matched_by_name_not_position() {
        let mut headers: Vec<&str> = HEADER.split(',').collect();
        headers.reverse();
        let mut values: Vec<String> = row(130, 1).split(',').map(str::to_string).collect();
        let label = values.pop().unwrap();
        values.reverse();
        let text = format!("cardio,{}\n{label},{}\n", headers.join(","), values.join(","));
        let dataset = parse_csv(&text, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows[0][2], 130.0);
        assert_eq!(dataset.rows[0][15], 1.0);
    }

    #[test]
    fn semicolon_files_and_messy_headers() {
        let header = HEADER.replace(',', ";").replace("weight", " Weight_KG ");
        let text = format!("{header};CARDIO\n{}\n", row(125, 0).replace(',', ";"));
        let dataset = parse_csv(&text, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows[0][1], 70.0);
    }

    #[test]
    fn drops_duplicate_rows() {
        let text = format!("{HEADER},cardio\n{}\n{}\n{}\n", row(120, 0), row(120, 0), row(160, 1));
        let dataset = parse_csv(&text, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows.len(), 2);
        assert_eq!(dataset.duplicates_removed, 1);

        let keep_all = LoadOptions {
            deduplicate: false,
            ..LoadOptions::default()
        };
        assert_eq!(parse_csv(&text, &keep_all).unwrap().rows.len(), 3);
    }

    #[test]
    fn reports_missing_columns() {
        let text = format!("{HEADER}\n{}\n", row(120, 0).rsplit_once(',').unwrap().0);
        let err = parse_csv(&text, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(ref name) if name == "cardio"));

        let text = "gender,cardio\n1,0\n";
        let err = parse_csv(text, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(ref name) if name == "weight"));
    }

    #[test]
    fn reports_bad_cells_and_labels() {
        let bad_cell = format!("{HEADER},cardio\n{}\n", row(120, 0).replacen("70.0", "abc", 1));
        let err = parse_csv(&bad_cell, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::Parse { line: 2, ref column, .. } if column == "weight"));

        let bad_label = format!("{HEADER},cardio\n{}\n", row(120, 2));
        let err = parse_csv(&bad_label, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidLabel { value, .. } if value == 2.0));
    }

    #[test]
    fn header_only_file_is_empty() {
        let text = format!("{HEADER},cardio\n");
        assert!(matches!(
            parse_csv(&text, &LoadOptions::default()),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, format!("{HEADER},cardio\n{}\n", row(145, 1))).unwrap();
        let dataset = load_csv(&path, &LoadOptions::default()).unwrap();
        assert_eq!(dataset.rows.len(), 1);
        assert!(matches!(
            load_csv(&dir.path().join("missing.csv"), &LoadOptions::default()),
            Err(DatasetError::Read { .. })
        ));
    }
}
