use crate::error::{FinancialInsightsError, Result};
use crate::schema::{FinancialRecord, REQUIRED_COLUMNS};
use csv::WriterBuilder;

pub const DEFAULT_REPORT_ROWS: usize = 10;

/// Writes records back out in the canonical input format, optionally
/// truncated to the first `limit` rows.
pub fn records_to_csv(records: &[FinancialRecord], limit: Option<usize>) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(REQUIRED_COLUMNS)?;
    for record in records.iter().take(limit.unwrap_or(records.len())) {
        writer.serialize(record)?;
    }

    let buffer = writer
        .into_inner()
        .map_err(|e| FinancialInsightsError::Io(e.into_error()))?;
    Ok(String::from_utf8(buffer)?)
}

/// Plain-text table of the first `limit` records with a "Showing X of Y" footer.
pub fn report_table(records: &[FinancialRecord], limit: usize) -> String {
    let shown = &records[..limit.min(records.len())];

    let mut out = String::from("Financial Report\n\n");
    out.push_str(&format!(
        "{:<12} {:>14} {:>14} {:>14}  {}\n",
        "Date", "Revenue", "Expenses", "Cash Flow", "Category"
    ));
    out.push_str(&format!("{}\n", "-".repeat(70)));

    for record in shown {
        out.push_str(&format!(
            "{:<12} {:>14} {:>14} {:>14}  {}\n",
            record.timestamp.format("%b %-d, %y").to_string(),
            format_currency(record.revenue),
            format_currency(record.expenses),
            format_currency(record.cash_flow),
            record.category
        ));
    }

    out.push_str(&format!(
        "\nShowing {} of {} records\n",
        shown.len(),
        records.len()
    ));
    out
}

/// `$12,345` style, rounded to whole units.
pub fn format_currency(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}", sign, grouped)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}
