//! Analysis targets derived from row mark fields

use super::options::ColumnLayout;
use super::rows::Row;

/// Time point or interval to measure, in seconds
///
/// Invalid targets carry the reason in `error` and have negative times.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub start: f64,
    pub end: f64,
    pub error: Option<String>,
}

impl Target {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            start: -1.0,
            end: -1.0,
            error: Some(error.into()),
        }
    }

    /// Build the target for `row`; an empty mark-end field means a point
    pub fn from_row(row: &Row, layout: &ColumnLayout) -> Self {
        let start = match parse_time(row, layout.mark, "mark") {
            Ok(start) => start,
            Err(e) => return Target::invalid(e),
        };

        let end = match layout.mark_end {
            Some(column) if row.fields.get(column).is_some_and(|f| !f.trim().is_empty()) => {
                match parse_time(row, column, "mark end") {
                    Ok(end) => end,
                    Err(e) => return Target::invalid(e),
                }
            }
            _ => start,
        };

        if end < start {
            return Target::invalid(format!(
                "Row {}: mark end {} is before mark {}",
                row.number, end, start
            ));
        }

        Target::new(start, end)
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none() && self.start >= 0.0 && self.end >= 0.0
    }

    pub fn is_point(&self) -> bool {
        self.start == self.end
    }

    /// Absolute time at relative position `point` (0.0-1.0) across the span
    pub fn time_at(&self, point: f64) -> f64 {
        self.start + (self.end - self.start) * point
    }
}

fn parse_time(row: &Row, column: usize, what: &str) -> Result<f64, String> {
    let Some(raw) = row.fields.get(column) else {
        return Err(format!("Row {}: no {} column ({})", row.number, what, column));
    };
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("Row {}: could not parse {} \"{}\": {}", row.number, what, raw, e))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("Row {}: invalid {} \"{}\"", row.number, what, raw));
    }
    Ok(value)
}
