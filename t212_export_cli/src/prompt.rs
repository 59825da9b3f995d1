//! Interactive reporting period prompt.

use std::io::{BufRead, Write};

use anyhow::Result;
use chrono::NaiveDate;
use t212_export_lib::ReportingPeriod;

/// Asks for a `YYYY-MM` period; an empty answer accepts the previous month.
pub fn prompt_for_period<R, W>(input: &mut R, output: &mut W, today: NaiveDate) -> Result<ReportingPeriod>
where
    R: BufRead,
    W: Write,
{
    let default = ReportingPeriod::previous_month(today);
    writeln!(output, "Reporting Year Month in \"YYYY-MM\" format:")?;
    writeln!(output, "Or confirm default \"{}\" by ENTER.", default)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();

    if answer.is_empty() {
        return Ok(default);
    }
    Ok(answer.parse::<ReportingPeriod>()?)
}
