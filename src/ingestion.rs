use crate::error::{FinancialInsightsError, Result};
use crate::schema::{FinancialRecord, ParsedDataset, RowError, DEFAULT_CATEGORY, REQUIRED_COLUMNS};
use crate::utils::parse_date;
use chrono::{Local, NaiveDate};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use std::collections::HashMap;

/// Fewest valid rows for which a trend can be fitted and checked.
pub const MIN_VALID_RECORDS: usize = 3;

/// Parses and validates CSV text against today's date.
pub fn parse_csv(text: &str) -> Result<ParsedDataset> {
    parse_csv_as_of(text, Local::now().date_naive())
}

/// Same as [`parse_csv`] but with an explicit "today" for the future-date check.
pub fn parse_csv_as_of(text: &str, today: NaiveDate) -> Result<ParsedDataset> {
    CsvValidator::new(today).parse(text)
}

/// Resolved positions of the required columns within the header.
#[derive(Debug, Clone)]
struct ColumnIndex {
    timestamp: usize,
    revenue: usize,
    expenses: usize,
    cash_flow: usize,
    category: usize,
}

impl ColumnIndex {
    fn from_header(header: &StringRecord) -> Result<Self> {
        let mut idx: HashMap<String, usize> = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            // First occurrence wins when a column is repeated
            idx.entry(name.trim().to_ascii_lowercase()).or_insert(i);
        }

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !idx.contains_key(**col))
            .map(|col| col.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(FinancialInsightsError::MissingColumns(missing));
        }

        Ok(Self {
            timestamp: idx["timestamp"],
            revenue: idx["revenue"],
            expenses: idx["expenses"],
            cash_flow: idx["cash_flow"],
            category: idx["category"],
        })
    }
}

pub struct CsvValidator {
    today: NaiveDate,
    min_records: usize,
}

impl CsvValidator {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            min_records: MIN_VALID_RECORDS,
        }
    }

    /// Raises the minimum number of surviving rows. Values below
    /// [`MIN_VALID_RECORDS`] are ignored.
    pub fn with_min_records(mut self, min_records: usize) -> Self {
        self.min_records = min_records.max(MIN_VALID_RECORDS);
        self
    }

    pub fn parse(&self, text: &str) -> Result<ParsedDataset> {
        let text = text.trim();
        let non_blank = text.lines().filter(|l| !l.trim().is_empty()).count();
        if non_blank < 2 {
            return Err(FinancialInsightsError::EmptyOrHeaderOnly);
        }

        let mut lines = text.lines().enumerate();
        let header = match lines.next() {
            Some((_, header)) => split_line(header)?,
            None => return Err(FinancialInsightsError::EmptyOrHeaderOnly),
        };
        let columns = ColumnIndex::from_header(&header)?;

        let mut records = Vec::new();
        let mut warnings = Vec::new();

        // Header is line 0, so the enumerate index is the data-row number
        for (line, raw) in lines {
            if raw.trim().is_empty() {
                continue;
            }

            let row = split_line(raw)?;
            match self.validate_row(&row, &columns, line) {
                Ok(record) => records.push(record),
                Err(row_error) => {
                    debug!("Skipping row: {}", row_error);
                    warnings.push(row_error);
                }
            }
        }

        if records.len() < self.min_records {
            info!(
                "Rejecting input: {} valid rows, {} required",
                records.len(),
                self.min_records
            );
            return Err(FinancialInsightsError::InsufficientData {
                found: records.len(),
                required: self.min_records,
                row_errors: warnings,
            });
        }

        records.sort_by_key(|r| r.timestamp);

        info!(
            "Parsed {} records ({} rows skipped)",
            records.len(),
            warnings.len()
        );

        Ok(ParsedDataset { records, warnings })
    }

    fn validate_row(
        &self,
        row: &StringRecord,
        columns: &ColumnIndex,
        line: usize,
    ) -> std::result::Result<FinancialRecord, RowError> {
        if row.len() < REQUIRED_COLUMNS.len() {
            return Err(RowError::IncompleteRow { line });
        }

        let field = |i: usize| row.get(i).unwrap_or("");

        let raw_timestamp = field(columns.timestamp);
        let timestamp = parse_date(raw_timestamp).ok_or_else(|| RowError::InvalidTimestamp {
            line,
            value: raw_timestamp.to_string(),
        })?;

        let revenue = parse_amount(field(columns.revenue), "revenue", line)?;
        let expenses = parse_amount(field(columns.expenses), "expenses", line)?;
        let cash_flow = parse_amount(field(columns.cash_flow), "cash_flow", line)?;

        for (name, value) in [("revenue", revenue), ("expenses", expenses)] {
            if value < 0.0 {
                return Err(RowError::NegativeValue {
                    line,
                    field: name.to_string(),
                    value,
                });
            }
        }

        if timestamp > self.today {
            return Err(RowError::FutureDate {
                line,
                date: timestamp,
            });
        }

        let category = match field(columns.category) {
            "" => DEFAULT_CATEGORY.to_string(),
            other => other.to_string(),
        };

        Ok(FinancialRecord {
            timestamp,
            revenue,
            expenses,
            cash_flow,
            category,
        })
    }
}

/// Splits one physical line on commas. Quotes are literal characters, so a
/// stray `"` can only spoil its own row.
fn split_line(line: &str) -> Result<StringRecord> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    reader.read_record(&mut record)?;
    Ok(record)
}

fn parse_amount(raw: &str, name: &str, line: usize) -> std::result::Result<f64, RowError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RowError::InvalidNumeric {
            line,
            field: name.to_string(),
            value: raw.to_string(),
        })
}
