use chrono::NaiveDate;
use std::io::Write;

use super::ReportFilter;
use crate::types::Signal;

pub const CSV_HEADER: [&str; 8] = [
    "ID",
    "Date",
    "Pair",
    "Direction",
    "Amount",
    "Result",
    "Profit",
    "Status",
];

fn row(s: &Signal) -> [String; 8] {
    [
        s.message_id.to_string(),
        s.received_at.clone(),
        s.pair.clone(),
        s.direction.to_string(),
        s.base_amount.to_string(),
        s.trading_result.map(|r| r.to_string()).unwrap_or_default(),
        s.total_profit.to_string(),
        s.status.to_string(),
    ]
}

/// Writes the report table with every cell quoted and `\n` after each row.
/// The writer is handed back once everything buffered has reached it.
pub fn write_csv<'a, W: Write>(
    out: W,
    signals: impl IntoIterator<Item = &'a Signal>,
) -> csv::Result<W> {
    let mut wtr = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    wtr.write_record(CSV_HEADER)?;
    for s in signals {
        wtr.write_record(row(s))?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}

/// The table as one string, without the final newline.
pub fn export_csv<'a>(signals: impl IntoIterator<Item = &'a Signal>) -> String {
    // Writing into a Vec cannot fail.
    let buf = write_csv(Vec::new(), signals).unwrap_or_default();
    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if text.ends_with('\n') {
        text.pop();
    }
    text
}

/// `trading_report[_FROM_to_TO]_TODAY.csv`; the range only appears when both ends are set.
pub fn report_file_name(filter: &ReportFilter, today: NaiveDate) -> String {
    let range = match (filter.from, filter.to) {
        (Some(from), Some(to)) => format!("_{from}_to_{to}"),
        _ => String::new(),
    };
    format!("trading_report{range}_{today}.csv")
}
