// src/protocol.rs
//
// Line protocol of the V/I acquisition firmware:
// - startup banner ends with the calibration offset line
// - each reading is three lines carrying "Input Voltage: <v> V" and "Current: <i> A"

/// Last line of the startup banner.
pub const BANNER_END_MARKER: &str = "Calibrated Current Sensor Offset:";
pub const VOLTAGE_MARKER: &str = "Input Voltage:";
pub const CURRENT_MARKER: &str = "Current:";

/// The firmware prints voltage, current and a separator per reading.
pub const LINES_PER_SAMPLE: usize = 3;

pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Fields extracted from one line triplet. `None` means the field was absent or unparsable.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Reading {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
}

/// Strip control characters (TAB survives) and surrounding whitespace.
pub fn clean_line(raw: &str) -> String {
    raw.chars()
        .filter(|&c| c == '\t' || !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn is_banner_end(line: &str) -> bool {
    line.contains(BANNER_END_MARKER)
}

pub fn parse_voltage(line: &str) -> Option<f64> {
    find_value_after(line, VOLTAGE_MARKER, 'V')
}

pub fn parse_current(line: &str) -> Option<f64> {
    find_value_after(line, CURRENT_MARKER, 'A')
}

/// Parse one reading. Each marker is searched in every line independently,
/// so the order in which the device prints them does not matter.
pub fn parse_reading<S: AsRef<str>>(lines: &[S]) -> Reading {
    Reading {
        voltage: lines.iter().find_map(|l| parse_voltage(l.as_ref())),
        current: lines.iter().find_map(|l| parse_current(l.as_ref())),
    }
}

// ----------------- helpers -----------------

fn find_value_after(src: &str, key: &str, unit: char) -> Option<f64> {
    let start = src.find(key)? + key.len();
    let token = src[start..]
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '|')
        .find(|t| !t.is_empty())?;

    // "5.02V" as well as "5.02 V"
    let token = token.strip_suffix(unit).unwrap_or(token);

    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        Ok(_) | Err(_) => {
            log::debug!("unparsable value after {:?} in {:?}", key, src);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_voltage_and_current_lines() {
        assert_eq!(parse_voltage("Input Voltage: 4.9876 V"), Some(4.9876));
        assert_eq!(parse_current("Current: -0.0123 A"), Some(-0.0123));
        assert_eq!(parse_voltage("Input Voltage:12.5V"), Some(12.5));
        assert_eq!(parse_current("Current: 1e-3 A"), Some(0.001));
    }

    #[test]
    fn marker_missing_or_garbage_gives_none() {
        assert_eq!(parse_voltage("-------------"), None);
        assert_eq!(parse_voltage("Input Voltage: ovf V"), None);
        assert_eq!(parse_current("Current:"), None);
        assert_eq!(parse_current("Current: nan A"), None);
    }

    #[test]
    fn banner_marker_is_not_a_current_reading() {
        let line = "Calibrated Current Sensor Offset: 2.5012";
        assert!(is_banner_end(line));
        assert_eq!(parse_current(line), None);
    }

    #[test]
    fn reading_is_order_independent() {
        let a = ["Input Voltage: 3.30 V", "Current: 0.250 A", "----------"];
        let b = ["Current: 0.250 A", "----------", "Input Voltage: 3.30 V"];
        let expected = Reading {
            voltage: Some(3.30),
            current: Some(0.250),
        };
        assert_eq!(parse_reading(&a), expected);
        assert_eq!(parse_reading(&b), expected);
    }

    #[test]
    fn both_fields_on_one_line() {
        let lines = ["Input Voltage: 5.01 V, Current: 0.75 A", "", "----"];
        let r = parse_reading(&lines);
        assert_eq!(r.voltage, Some(5.01));
        assert_eq!(r.current, Some(0.75));
    }

    #[test]
    fn first_parsable_line_wins() {
        let lines = ["Input Voltage: ERR V", "Input Voltage: 1.5 V", "Current: 2 A"];
        assert_eq!(parse_reading(&lines).voltage, Some(1.5));
    }

    #[test]
    fn triplet_without_markers_is_missing() {
        let lines = ["", "noise", "----"];
        assert_eq!(parse_reading(&lines), Reading::default());
    }

    #[test]
    fn clean_line_drops_control_chars() {
        assert_eq!(clean_line("\u{0}Current: 1 A\r\n"), "Current: 1 A");
        assert_eq!(clean_line("  a\tb  "), "a\tb");
    }
}
