/// Min, max and spread of one day's temperature series
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DailyRange {
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

/// Computes the daily temperature range from the collected TMP series.
///
/// An empty series yields None rather than zeroes, so callers can tell
/// "no data" apart from a flat day.
///
/// # Arguments
///
/// * 'series' - temperatures in Celsius, any order
pub fn daily_range(series: &[f64]) -> Option<DailyRange> {
    let first = *series.first()?;
    let (min, max) = series.iter().fold((first, first), |(lo, hi), &t| {
        (lo.min(t), hi.max(t))
    });
    Some(DailyRange { min, max, range: max - min })
}

/// Calculates the apparent (wind chill) temperature in Celsius.
/// https://www.weather.gov/safety/cold-wind-chill-chart
///
/// The index only applies in the cold/windy regime: at most 10 degrees and
/// at least 4.8 km/h of wind. Outside that window the perceived temperature
/// is close enough to the actual one that no separate figure is reported,
/// so None is returned rather than the input temperature.
///
/// # Arguments
///
/// * 'temp' - temperature in Celsius
/// * 'wind_speed' - wind speed in m/s
pub fn apparent_temperature(temp: f64, wind_speed: f64) -> Option<f64> {
    let kmh = wind_speed * 3.6;
    if temp > 10.0 || kmh < 4.8 {
        return None;
    }

    let v16 = kmh.powf(0.16);
    let chill = 13.12 + 0.6215 * temp - 11.37 * v16 + 0.3965 * temp * v16;

    Some((chill * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_over_mixed_series() {
        let r = daily_range(&[-2.0, 3.5, 1.0]).unwrap();
        assert_eq!(r.max, 3.5);
        assert_eq!(r.min, -2.0);
        assert_eq!(r.range, 5.5);
    }

    #[test]
    fn empty_series_yields_none_not_zero() {
        assert_eq!(daily_range(&[]), None);
    }

    #[test]
    fn single_reading_has_zero_range() {
        let r = daily_range(&[7.0]).unwrap();
        assert_eq!(r.min, 7.0);
        assert_eq!(r.max, 7.0);
        assert_eq!(r.range, 0.0);
    }

    #[test]
    fn wind_chill_applies_at_cold_windy_boundary() {
        // 2.0 m/s is 7.2 km/h, inside the window at exactly 10 degrees
        assert!(apparent_temperature(10.0, 2.0).is_some());
    }

    #[test]
    fn wind_chill_skipped_just_above_temperature_threshold() {
        assert_eq!(apparent_temperature(10.1, 2.0), None);
    }

    #[test]
    fn wind_chill_skipped_below_speed_threshold() {
        // 1.0 m/s is 3.6 km/h, under the 4.8 km/h floor
        assert_eq!(apparent_temperature(5.0, 1.0), None);
        // 1.5 m/s is 5.4 km/h, just over it
        assert!(apparent_temperature(5.0, 1.5).is_some());
    }

    #[test]
    fn wind_chill_value_matches_reference_chart() {
        // 0 degrees with an 18 km/h wind reads about -4.9 on the NWS chart
        let chill = apparent_temperature(0.0, 5.0).unwrap();
        assert!((chill + 4.9).abs() <= 0.1, "got {}", chill);
        assert!(chill < 0.0);
    }

    #[test]
    fn wind_chill_rounds_to_one_decimal() {
        let chill = apparent_temperature(3.0, 4.0).unwrap();
        assert_eq!(chill, (chill * 10.0).round() / 10.0);
    }
}
