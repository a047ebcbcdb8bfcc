//! CSV export of persisted entities
//!
//! Each category is flattened into its own file. Nested objects (addresses,
//! dates of birth) are kept as compact JSON in a single column.

use crate::output::ExportError;
use crate::storage::{Category, Repository};
use csv::Writer;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

pub const COMPANIES_CSV: &str = "companies.csv";
pub const OFFICERS_CSV: &str = "officers.csv";
pub const FILINGS_CSV: &str = "filings.csv";

/// Rows written per file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub companies: usize,
    pub officers: usize,
    pub filings: usize,
}

#[derive(Debug, Serialize)]
struct CompanyRow {
    company_number: Option<String>,
    company_name: Option<String>,
    company_status: Option<String>,
    date_of_creation: Option<String>,
    sic_codes: String,
    registered_office_address: String,
    has_insolvency_history: Option<String>,
    has_charges: Option<String>,
    jurisdiction: Option<String>,
    last_updated: Option<String>,
}

impl From<&Value> for CompanyRow {
    fn from(company: &Value) -> Self {
        let sic_codes = company
            .get("sic_codes")
            .and_then(Value::as_array)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|c| text(Some(c)))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Self {
            company_number: field(company, "company_number"),
            company_name: field(company, "company_name"),
            company_status: field(company, "company_status"),
            date_of_creation: field(company, "date_of_creation"),
            sic_codes,
            registered_office_address: nested_json(company, "registered_office_address"),
            has_insolvency_history: field(company, "has_insolvency_history"),
            has_charges: field(company, "has_charges"),
            jurisdiction: field(company, "jurisdiction"),
            last_updated: field(company, "last_full_members_list_date"),
        }
    }
}

#[derive(Debug, Serialize)]
struct OfficerRow {
    company_number: String,
    name: Option<String>,
    officer_role: Option<String>,
    appointed_on: Option<String>,
    resigned_on: Option<String>,
    nationality: Option<String>,
    country_of_residence: Option<String>,
    occupation: Option<String>,
    address: String,
    date_of_birth: String,
}

impl OfficerRow {
    fn new(company_number: &str, officer: &Value) -> Self {
        Self {
            company_number: company_number.to_string(),
            name: field(officer, "name"),
            officer_role: field(officer, "officer_role"),
            appointed_on: field(officer, "appointed_on"),
            resigned_on: field(officer, "resigned_on"),
            nationality: field(officer, "nationality"),
            country_of_residence: field(officer, "country_of_residence"),
            occupation: field(officer, "occupation"),
            address: nested_json(officer, "address"),
            date_of_birth: nested_json(officer, "date_of_birth"),
        }
    }
}

#[derive(Debug, Serialize)]
struct FilingRow {
    company_number: String,
    filing_type: Option<String>,
    description: Option<String>,
    date: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    barcode: Option<String>,
    transaction_id: Option<String>,
}

impl FilingRow {
    fn new(company_number: &str, filing: &Value) -> Self {
        Self {
            company_number: company_number.to_string(),
            filing_type: field(filing, "type"),
            description: field(filing, "description"),
            date: field(filing, "date"),
            category: field(filing, "category"),
            subcategory: field(filing, "subcategory"),
            barcode: field(filing, "barcode"),
            transaction_id: field(filing, "transaction_id"),
        }
    }
}

/// A scalar as text; null and missing are empty
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn field(document: &Value, key: &str) -> Option<String> {
    text(document.get(key))
}

/// A nested object as compact JSON, `{}` when absent
fn nested_json(document: &Value, key: &str) -> String {
    match document.get(key) {
        Some(value) if !value.is_null() => value.to_string(),
        _ => "{}".to_string(),
    }
}

/// Exports every persisted entity to `companies.csv`, `officers.csv` and
/// `filings.csv` in `output_dir`
///
/// Documents that cannot be read are logged and skipped. A category with no
/// rows produces no file.
///
/// # Arguments
///
/// * `repository` - The repository holding the documents
/// * `output_dir` - Directory for the CSV files
///
/// # Returns
///
/// * `Ok(ExportSummary)` - Rows written per file
/// * `Err(ExportError)` - A file could not be written
pub fn export_to_csv<R: Repository + ?Sized>(
    repository: &R,
    output_dir: &Path,
) -> Result<ExportSummary, ExportError> {
    fs::create_dir_all(output_dir).map_err(|source| ExportError::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let companies: Vec<CompanyRow> = documents(repository, Category::Profile)?
        .iter()
        .map(|(_, profile)| CompanyRow::from(profile))
        .collect();

    let officers: Vec<OfficerRow> = documents(repository, Category::Officers)?
        .iter()
        .flat_map(|(id, list)| {
            items(list)
                .iter()
                .map(move |officer| OfficerRow::new(id, officer))
        })
        .collect();

    let filings: Vec<FilingRow> = documents(repository, Category::Filings)?
        .iter()
        .flat_map(|(id, list)| {
            items(list)
                .iter()
                .map(move |filing| FilingRow::new(id, filing))
        })
        .collect();

    Ok(ExportSummary {
        companies: write_rows(&output_dir.join(COMPANIES_CSV), &companies, "company")?,
        officers: write_rows(&output_dir.join(OFFICERS_CSV), &officers, "officer")?,
        filings: write_rows(&output_dir.join(FILINGS_CSV), &filings, "filing")?,
    })
}

/// Loads every readable document of a category, with its entity id
fn documents<R: Repository + ?Sized>(
    repository: &R,
    category: Category,
) -> Result<Vec<(String, Value)>, ExportError> {
    let mut loaded = Vec::new();
    for id in repository.list_ids(category)? {
        match repository.load(&id, category) {
            Ok(document) => loaded.push((id, document)),
            Err(e) => tracing::error!("Error processing {} file {}: {}", category, id, e),
        }
    }
    Ok(loaded)
}

fn items(list: &Value) -> &[Value] {
    list.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T], kind: &str) -> Result<usize, ExportError> {
    if rows.is_empty() {
        tracing::warn!("No {} data to export", kind);
        return Ok(0);
    }

    let csv_err = |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = Writer::from_writer(BufWriter::new(file));

    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!("Exported {} {} rows to {}", rows.len(), kind, path.display());
    Ok(rows.len())
}
