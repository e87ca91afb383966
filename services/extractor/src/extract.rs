//! Yearly extraction and consolidation of the PPM animal-products dataset.

use crate::error::ExtractError;
use crate::sidra::{SidraQuery, StatisticsSource, Table};
use crate::workbook::{read_table, write_table};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Rondônia (RO) municipality codes.
const RO_MUNICIPALITY_CODES: &[&str] = &[
    "1100106", "1100205", "1100015", "1100023", "1100049", "1100056", "1100064", "1100080",
    "1100098", "1100114", "1100122", "1100155", "1100189", "1100254", "1100288", "1100304",
    "1100320", "1100338", "1100130", "1100148", "1100296", "1100346", "1100031", "1100379",
    "1100452", "1100924", "1100940", "1101435", "1101450", "1101468", "1101476", "1101484",
    "1101492", "1101559", "1101757", "1100072", "1100262", "1100403", "1100502", "1100601",
    "1100700", "1100809", "1100908", "1101005", "1101104", "1101203", "1101302", "1101401",
    "1101500", "1101609", "1101708", "1101807",
];

/// Fixed description of what gets requested every year and how the files are named.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub table_code: String,
    pub territorial_level: String,
    pub municipality_codes: Vec<String>,
    pub classification: (String, String),
}

impl Dataset {
    /// PPM table 74: animal-origin production by product type, municipalities of RO.
    pub fn ppm_animal_products() -> Self {
        Self {
            name: "PPM_RO_PRODUCAO_ORIGEM_ANIMAL".to_string(),
            table_code: "74".to_string(),
            territorial_level: "6".to_string(),
            municipality_codes: RO_MUNICIPALITY_CODES.iter().map(|c| c.to_string()).collect(),
            classification: ("80".to_string(), "0,2682,2685,2686,2687,2683,2684".to_string()),
        }
    }

    pub fn query_for_year(&self, year: i32) -> SidraQuery {
        SidraQuery {
            table_code: self.table_code.clone(),
            territorial_level: self.territorial_level.clone(),
            territorial_codes: self.municipality_codes.clone(),
            period: format!("{:04}", year),
            variable: "all".to_string(),
            classifications: vec![self.classification.clone()],
        }
    }

    pub fn yearly_file_name(&self, year: i32) -> String {
        format!("{}_{}.xlsx", self.name, year)
    }

    pub fn consolidated_file_name(&self) -> String {
        format!("{}_FINAL.xlsx", self.name)
    }
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(i32, String)>,
}

/// Fetch and persist one file per year, strictly one year after another.
///
/// A failure for one year is logged and recorded; the remaining years still run.
/// Only a data directory that cannot be created aborts the whole run.
pub async fn extract_years<S: StatisticsSource>(
    source: &S,
    dataset: &Dataset,
    years: Range<i32>,
    data_dir: &Path,
    delay: Duration,
) -> Result<ExtractionReport, ExtractError> {
    fs::create_dir_all(data_dir).await?;
    info!(dir = %data_dir.display(), "data directory ready");

    let mut report = ExtractionReport::default();

    for year in years {
        info!(year, dataset = %dataset.name, "starting download");
        match extract_year(source, dataset, year, data_dir, delay).await {
            Ok(path) => {
                info!(year, path = %path.display(), "yearly file written");
                report.written.push(path);
            }
            Err(e) => {
                error!(year, error = %e, "failed to generate yearly file");
                report.failed.push((year, e.to_string()));
            }
        }
    }

    Ok(report)
}

async fn extract_year<S: StatisticsSource>(
    source: &S,
    dataset: &Dataset,
    year: i32,
    data_dir: &Path,
    delay: Duration,
) -> Result<PathBuf, ExtractError> {
    if !delay.is_zero() {
        sleep(delay).await;
    }

    let table = source.fetch(&dataset.query_for_year(year)).await?;
    info!(year, rows = table.rows.len(), "received yearly block");

    let path = data_dir.join(dataset.yearly_file_name(year));
    write_table(&path, &table)?;
    Ok(path)
}

#[derive(Debug)]
pub struct ConsolidationReport {
    pub output: PathBuf,
    pub files: usize,
    pub rows: usize,
}

/// Merge the yearly files of a range into the single file the loader reads.
///
/// Years without a file are skipped. Every file must carry the same header as
/// the first one found.
pub fn consolidate(
    dataset: &Dataset,
    years: Range<i32>,
    data_dir: &Path,
) -> Result<ConsolidationReport, ExtractError> {
    let (first_year, until_year) = (years.start, years.end);
    let mut merged: Option<Table> = None;
    let mut files = 0;

    for year in years {
        let path = data_dir.join(dataset.yearly_file_name(year));
        if !path.exists() {
            warn!(year, path = %path.display(), "yearly file missing, skipping");
            continue;
        }

        let table = read_table(&path)?;
        info!(year, rows = table.rows.len(), "read yearly file");
        files += 1;

        match merged.as_mut() {
            None => merged = Some(table),
            Some(acc) => {
                if acc.headers != table.headers {
                    return Err(ExtractError::HeaderMismatch {
                        path,
                        expected: acc.headers.clone(),
                        found: table.headers,
                    });
                }
                acc.rows.extend(table.rows);
            }
        }
    }

    let merged = merged.ok_or(ExtractError::NothingToConsolidate {
        first_year,
        until_year,
    })?;

    let output = data_dir.join(dataset.consolidated_file_name());
    write_table(&output, &merged)?;

    Ok(ConsolidationReport {
        output,
        files,
        rows: merged.rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory source: answers from a fixed map, fails for unknown periods.
    struct FakeSource {
        tables: HashMap<String, Table>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeSource {
        fn new(tables: Vec<(i32, Table)>) -> Self {
            Self {
                tables: tables
                    .into_iter()
                    .map(|(year, t)| (year.to_string(), t))
                    .collect(),
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl StatisticsSource for FakeSource {
        async fn fetch(&self, query: &SidraQuery) -> Result<Table, ExtractError> {
            self.requested.borrow_mut().push(query.period.clone());
            self.tables
                .get(&query.period)
                .cloned()
                .ok_or_else(|| ExtractError::Payload(format!("no data for {}", query.period)))
        }
    }

    fn year_table(year: i32, municipalities: &[&str]) -> Table {
        Table {
            headers: vec![
                "Município (Código)".to_string(),
                "Ano".to_string(),
                "Valor".to_string(),
            ],
            rows: municipalities
                .iter()
                .map(|m| vec![m.to_string(), year.to_string(), "10".to_string()])
                .collect(),
        }
    }

    #[test]
    fn test_dataset_file_names() {
        let dataset = Dataset::ppm_animal_products();
        assert_eq!(
            dataset.yearly_file_name(2020),
            "PPM_RO_PRODUCAO_ORIGEM_ANIMAL_2020.xlsx"
        );
        assert_eq!(
            dataset.consolidated_file_name(),
            "PPM_RO_PRODUCAO_ORIGEM_ANIMAL_FINAL.xlsx"
        );
    }

    #[test]
    fn test_dataset_query_for_year() {
        let dataset = Dataset::ppm_animal_products();
        let query = dataset.query_for_year(2021);

        assert_eq!(query.period, "2021");
        assert_eq!(query.territorial_codes.len(), 52);
        assert!(query.path().starts_with("/t/74/n6/1100106,1100205,"));
        assert!(query.path().ends_with("/v/all/p/2021/c80/0,2682,2685,2686,2687,2683,2684"));
    }

    #[tokio::test]
    async fn test_extract_writes_one_file_per_year() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("files");
        let dataset = Dataset::ppm_animal_products();
        let source = FakeSource::new(vec![
            (2019, year_table(2019, &["1100015"])),
            (2020, year_table(2020, &["1100015", "1100023"])),
        ]);

        let report = extract_years(&source, &dataset, 2019..2021, &data_dir, Duration::ZERO)
            .await
            .unwrap();

        assert!(report.failed.is_empty());
        assert_eq!(report.written.len(), 2);
        let table = read_table(&data_dir.join(dataset.yearly_file_name(2020))).unwrap();
        assert_eq!(table, year_table(2020, &["1100015", "1100023"]));
    }

    #[tokio::test]
    async fn test_failed_year_does_not_stop_later_years() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::ppm_animal_products();
        let source = FakeSource::new(vec![
            (2019, year_table(2019, &["1100015"])),
            (2021, year_table(2021, &["1100015"])),
        ]);

        let report = extract_years(&source, &dataset, 2019..2022, dir.path(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(*source.requested.borrow(), vec!["2019", "2020", "2021"]);
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2020);
        assert!(!dir.path().join(dataset.yearly_file_name(2020)).exists());
        assert!(dir.path().join(dataset.yearly_file_name(2021)).exists());
    }

    #[tokio::test]
    async fn test_empty_range_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::ppm_animal_products();
        let source = FakeSource::new(Vec::new());

        let report = extract_years(&source, &dataset, 2024..2024, dir.path(), Duration::ZERO)
            .await
            .unwrap();

        assert!(report.written.is_empty());
        assert!(source.requested.borrow().is_empty());
    }

    #[test]
    fn test_consolidate_concatenates_in_year_order() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::ppm_animal_products();
        write_table(
            &dir.path().join(dataset.yearly_file_name(2019)),
            &year_table(2019, &["1100015", "1100023"]),
        )
        .unwrap();
        write_table(
            &dir.path().join(dataset.yearly_file_name(2020)),
            &year_table(2020, &["1100049"]),
        )
        .unwrap();

        let report = consolidate(&dataset, 2019..2021, dir.path()).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.rows, 3);
        let merged = read_table(&report.output).unwrap();
        assert_eq!(merged.headers, year_table(2019, &[]).headers);
        assert_eq!(merged.rows[0][1], "2019");
        assert_eq!(merged.rows[2], vec!["1100049", "2020", "10"]);
    }

    #[test]
    fn test_consolidate_skips_missing_years() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::ppm_animal_products();
        write_table(
            &dir.path().join(dataset.yearly_file_name(2021)),
            &year_table(2021, &["1100015"]),
        )
        .unwrap();

        let report = consolidate(&dataset, 2019..2022, dir.path()).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(report.rows, 1);
    }

    #[test]
    fn test_consolidate_rejects_header_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::ppm_animal_products();
        write_table(
            &dir.path().join(dataset.yearly_file_name(2019)),
            &year_table(2019, &["1100015"]),
        )
        .unwrap();
        let mut other = year_table(2020, &["1100015"]);
        other.headers[2] = "Value".to_string();
        write_table(&dir.path().join(dataset.yearly_file_name(2020)), &other).unwrap();

        let result = consolidate(&dataset, 2019..2021, dir.path());

        assert!(matches!(result, Err(ExtractError::HeaderMismatch { .. })));
        assert!(!dir.path().join(dataset.consolidated_file_name()).exists());
    }

    #[test]
    fn test_consolidate_without_files_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = Dataset::ppm_animal_products();

        let result = consolidate(&dataset, 2019..2021, dir.path());

        assert!(matches!(
            result,
            Err(ExtractError::NothingToConsolidate {
                first_year: 2019,
                until_year: 2021
            })
        ));
    }
}
