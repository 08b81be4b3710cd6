//! Point naming convention: `P<device_no>_<rest>`.
//!
//! Controllers publish every point under a name whose leading token encodes
//! the owning device, e.g. `P3_running` or `P12_motor_speed`.

/// Outcome of parsing a point name against the naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch<'a> {
    /// The name belongs to `device_no`; `suffix` is everything after the `_`.
    Device { device_no: u32, suffix: &'a str },
    NotAMatch,
}

/// Parse a point name into its device number and suffix.
///
/// The name must start with `P`, followed by one or more ASCII digits,
/// followed by `_`. Leading zeros are allowed and compared numerically.
pub fn parse_point_name(name: &str) -> NameMatch<'_> {
    let Some(rest) = name.strip_prefix('P') else {
        return NameMatch::NotAMatch;
    };
    let Some((token, suffix)) = rest.split_once('_') else {
        return NameMatch::NotAMatch;
    };
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return NameMatch::NotAMatch;
    }
    match token.parse::<u32>() {
        Ok(device_no) => NameMatch::Device { device_no, suffix },
        Err(_) => NameMatch::NotAMatch,
    }
}

/// Whether `name` follows the convention and belongs to `device_no`.
pub fn belongs_to(name: &str, device_no: u32) -> bool {
    matches!(parse_point_name(name), NameMatch::Device { device_no: n, .. } if n == device_no)
}

/// Name of the point a device uses to report that it is running.
pub fn heartbeat_point_name(device_no: u32) -> String {
    format!("P{device_no}_running")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_device_and_suffix() {
        assert_eq!(
            parse_point_name("P3_running"),
            NameMatch::Device { device_no: 3, suffix: "running" }
        );
        assert_eq!(
            parse_point_name("P12_motor_speed"),
            NameMatch::Device { device_no: 12, suffix: "motor_speed" }
        );
    }

    #[test]
    fn empty_suffix_still_matches() {
        assert_eq!(
            parse_point_name("P4_"),
            NameMatch::Device { device_no: 4, suffix: "" }
        );
    }

    #[test]
    fn rejects_names_outside_convention() {
        for name in [
            "",
            "P",
            "P_",
            "P3",
            "p3_running",
            "Q3_running",
            "PX_running",
            "P3a_running",
            "P-3_running",
            "P+3_running",
            "P 3_running",
            "Temperature",
            "P99999999999_x",
        ] {
            assert_eq!(parse_point_name(name), NameMatch::NotAMatch, "{name:?}");
        }
    }

    #[test]
    fn leading_zeros_compare_numerically() {
        assert!(belongs_to("P03_temp", 3));
        assert!(!belongs_to("P03_temp", 30));
    }

    #[test]
    fn belongs_to_checks_device_number() {
        assert!(belongs_to("P3_running", 3));
        assert!(!belongs_to("P3_running", 33));
        assert!(!belongs_to("P33_running", 3));
        assert!(!belongs_to("P3running", 3));
    }

    #[test]
    fn heartbeat_name_round_trips_through_parser() {
        for n in [0u32, 3, 42, u32::MAX] {
            let name = heartbeat_point_name(n);
            assert_eq!(
                parse_point_name(&name),
                NameMatch::Device { device_no: n, suffix: "running" }
            );
        }
    }
}
