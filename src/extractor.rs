use std::fmt;
use crate::derived;

/// One row of the cached forecast table
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub date: String,
    pub time_slot: String,
    pub category: String,
    pub value: String,
    pub grid_x: i32,
    pub grid_y: i32,
}

/// The slot the caller wants answered, with the grid cell it applies to
#[derive(Debug, Clone)]
pub struct Target {
    pub date: String,
    pub time_slot: String,
    pub grid_x: i32,
    pub grid_y: i32,
}

/// Values extracted for one slot plus the derived metrics of that day.
/// Built fresh per request, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedForecast {
    pub temp: f64,
    pub precip_prob: Option<i64>,
    pub precip_type: Option<String>,
    pub sky: Option<String>,
    pub wind_speed: Option<f64>,
    pub daily_min: Option<f64>,
    pub daily_max: Option<f64>,
    pub daily_range: Option<f64>,
    pub apparent_temp: Option<f64>,
    pub forecast_label: String,
}

#[derive(Debug, PartialEq)]
pub enum ExtractError {
    /// No TMP record exists for the requested date/slot/grid
    Unavailable {
        date: String,
        time_slot: String,
        grid_x: i32,
        grid_y: i32,
    },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Unavailable { date, time_slot, grid_x, grid_y } => {
                write!(f, "no forecast for {} {} at grid ({}, {})", date, time_slot, grid_x, grid_y)
            }
        }
    }
}

/// Canonical string form for cell values: trimmed, thousands separators
/// stripped. The store returns the same logical value sometimes as a number
/// and sometimes as a formatted string, so every comparison goes through this.
pub fn canonical(raw: &str) -> String {
    raw.trim().replace(',', "")
}

/// Matches one slot out of the cached table and derives the day's metrics.
///
/// Records of the target day feed the temperature series regardless of slot;
/// records of the target slot populate the category fields. A cell that fails
/// to parse numerically leaves its field unset. Only a missing temperature
/// fails the whole match.
///
/// # Arguments
///
/// * 'rows' - the cached forecast table
/// * 'target' - date, slot and grid cell to answer for
/// * 'label' - display label for the slot ("N시")
pub fn extract(
    rows: &[ForecastRecord],
    target: &Target,
    label: &str,
) -> Result<ExtractedForecast, ExtractError> {
    let date = canonical(&target.date);
    let slot = canonical(&target.time_slot);

    let mut temp: Option<f64> = None;
    let mut precip_prob: Option<i64> = None;
    let mut precip_type: Option<String> = None;
    let mut sky: Option<String> = None;
    let mut wind_speed: Option<f64> = None;
    let mut daily_temps: Vec<f64> = Vec::new();

    for row in rows {
        if row.grid_x != target.grid_x || row.grid_y != target.grid_y {
            continue;
        }
        if canonical(&row.date) != date {
            continue;
        }

        let value = canonical(&row.value);
        let category = canonical(&row.category);

        if category == "TMP" {
            if let Ok(t) = value.parse::<f64>() {
                daily_temps.push(t);
            }
        }

        if canonical(&row.time_slot) != slot {
            continue;
        }

        match category.as_str() {
            "TMP" => temp = value.parse().ok(),
            "POP" => precip_prob = value.parse().ok(),
            "PTY" => precip_type = Some(value),
            "SKY" => sky = Some(value),
            "WSD" => wind_speed = value.parse().ok(),
            _ => {}
        }
    }

    let temp = temp.ok_or_else(|| ExtractError::Unavailable {
        date: date.clone(),
        time_slot: slot.clone(),
        grid_x: target.grid_x,
        grid_y: target.grid_y,
    })?;

    let range = derived::daily_range(&daily_temps);
    let apparent_temp = wind_speed.and_then(|w| derived::apparent_temperature(temp, w));

    Ok(ExtractedForecast {
        temp,
        precip_prob,
        precip_type,
        sky,
        wind_speed,
        daily_min: range.as_ref().map(|r| r.min),
        daily_max: range.as_ref().map(|r| r.max),
        daily_range: range.as_ref().map(|r| r.range),
        apparent_temp,
        forecast_label: label.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, slot: &str, category: &str, value: &str) -> ForecastRecord {
        ForecastRecord {
            date: date.to_string(),
            time_slot: slot.to_string(),
            category: category.to_string(),
            value: value.to_string(),
            grid_x: 60,
            grid_y: 127,
        }
    }

    fn target() -> Target {
        Target {
            date: "20260302".to_string(),
            time_slot: "0900".to_string(),
            grid_x: 60,
            grid_y: 127,
        }
    }

    #[test]
    fn categories_populate_without_interference() {
        let rows = vec![
            row("20260302", "0900", "TMP", "3.5"),
            row("20260302", "0900", "POP", "60"),
            row("20260302", "0900", "PTY", "1"),
            row("20260302", "0900", "SKY", "4"),
            row("20260302", "0900", "WSD", "2.5"),
        ];
        let out = extract(&rows, &target(), "9시").unwrap();
        assert_eq!(out.temp, 3.5);
        assert_eq!(out.precip_prob, Some(60));
        assert_eq!(out.precip_type.as_deref(), Some("1"));
        assert_eq!(out.sky.as_deref(), Some("4"));
        assert_eq!(out.wind_speed, Some(2.5));
        assert_eq!(out.forecast_label, "9시");
    }

    #[test]
    fn mismatched_grid_populates_nothing() {
        let mut other = row("20260302", "0900", "TMP", "3.5");
        other.grid_x = 61;
        let rows = vec![other, row("20260302", "0900", "TMP", "-1.0")];
        let out = extract(&rows, &target(), "9시").unwrap();
        assert_eq!(out.temp, -1.0);
        // the foreign grid cell must not leak into the day series either
        assert_eq!(out.daily_max, Some(-1.0));
    }

    #[test]
    fn day_series_collects_all_slots() {
        let rows = vec![
            row("20260302", "0600", "TMP", "-2.0"),
            row("20260302", "0900", "TMP", "3.5"),
            row("20260302", "1200", "TMP", "1.0"),
            row("20260303", "0900", "TMP", "20.0"),
        ];
        let out = extract(&rows, &target(), "9시").unwrap();
        assert_eq!(out.daily_max, Some(3.5));
        assert_eq!(out.daily_min, Some(-2.0));
        assert_eq!(out.daily_range, Some(5.5));
    }

    #[test]
    fn missing_temp_is_unavailable_not_partial() {
        let rows = vec![
            row("20260302", "0900", "POP", "60"),
            row("20260302", "1200", "TMP", "3.5"),
        ];
        let err = extract(&rows, &target(), "9시").unwrap_err();
        assert_eq!(
            err,
            ExtractError::Unavailable {
                date: "20260302".to_string(),
                time_slot: "0900".to_string(),
                grid_x: 60,
                grid_y: 127,
            }
        );
    }

    #[test]
    fn null_secondary_fields_are_a_match_not_an_error() {
        let rows = vec![row("20260302", "0900", "TMP", "3.5")];
        let out = extract(&rows, &target(), "9시").unwrap();
        assert_eq!(out.temp, 3.5);
        assert_eq!(out.precip_prob, None);
        assert_eq!(out.sky, None);
    }

    #[test]
    fn cells_match_after_canonicalization() {
        let rows = vec![row(" 20,260,302 ", " 0900", "TMP ", " 3.5 ")];
        let out = extract(&rows, &target(), "9시").unwrap();
        assert_eq!(out.temp, 3.5);
    }

    #[test]
    fn unparseable_cell_leaves_field_unset() {
        let rows = vec![
            row("20260302", "0900", "TMP", "3.5"),
            row("20260302", "0900", "POP", "강수없음"),
        ];
        let out = extract(&rows, &target(), "9시").unwrap();
        assert_eq!(out.precip_prob, None);
    }
}
