use std::collections::BTreeMap;

use pb_domain::naming;

/// Keep only the points whose names belong to `device_no`.
///
/// Names that do not follow the `P<digits>_...` convention are dropped
/// silently, as are names addressed to other devices.
pub fn filter_points(points: &BTreeMap<String, String>, device_no: u32) -> BTreeMap<String, String> {
    points
        .iter()
        .filter(|(name, _)| naming::belongs_to(name, device_no))
        .map(|(name, id)| (name.clone(), id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), format!("ns=2;s={n}")))
            .collect()
    }

    #[test]
    fn admits_only_the_target_device() {
        let all = candidates(&[
            "P3_running",
            "P3_temp",
            "P30_temp",
            "P4_running",
            "P03_speed",
            "Px_temp",
            "P3temp",
            "p3_lower",
            "Temperature",
            "P_3",
            "",
        ]);
        let kept = filter_points(&all, 3);
        let names: Vec<&str> = kept.keys().map(String::as_str).collect();
        assert_eq!(names, ["P03_speed", "P3_running", "P3_temp"]);
        assert_eq!(kept["P3_temp"], "ns=2;s=P3_temp");
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(filter_points(&BTreeMap::new(), 1).is_empty());
    }

    #[test]
    fn overflowing_device_numbers_never_match() {
        let all = candidates(&["P99999999999999999999_x", "P4294967295_x"]);
        let kept = filter_points(&all, u32::MAX);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains_key("P4294967295_x"));
    }
}
