//! Aggregate detection statistics for a single camera.

use serde::Deserialize;

/// One camera's detection totals as reported by the analytics endpoint.
///
/// The endpoint returns an array; the first element carries the aggregate
/// for the requested camera and an empty array means no footage has been
/// analyzed yet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyticsReport {
    pub total_footage_analyzed: i64,
    pub total_individuals_detected: i64,
    /// Ratio as computed server-side. Displayed values use
    /// [`average_human_passerbys`](Self::average_human_passerbys) instead so
    /// the shown number always matches the raw counts in the same report.
    pub average_human_passerbys_per_footage: f64,
    pub total_unusual_incidents: i64,
    pub total_animal_incidents: i64,
    pub total_unusual_crowd_incidents: i64,
    pub total_vehicle_detected: i64,
}

impl AnalyticsReport {
    /// Individuals detected per analyzed footage clip.
    pub fn average_human_passerbys(&self) -> f64 {
        self.total_individuals_detected as f64 / self.total_footage_analyzed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(footage: i64, individuals: i64) -> AnalyticsReport {
        AnalyticsReport {
            total_footage_analyzed: footage,
            total_individuals_detected: individuals,
            average_human_passerbys_per_footage: 0.0,
            total_unusual_incidents: 0,
            total_animal_incidents: 0,
            total_unusual_crowd_incidents: 0,
            total_vehicle_detected: 0,
        }
    }

    #[test]
    fn test_average_is_individuals_per_footage() {
        let r = report(50, 120);
        assert!((r.average_human_passerbys() - 2.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_ignores_server_reported_ratio() {
        let mut r = report(50, 120);
        r.average_human_passerbys_per_footage = 99.0;
        assert!((r.average_human_passerbys() - 2.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_parses_full_record() {
        let json = r#"{
            "total_footage_analyzed": 10,
            "total_individuals_detected": 25,
            "average_human_passerbys_per_footage": 2.5,
            "total_unusual_incidents": 3,
            "total_animal_incidents": 1,
            "total_unusual_crowd_incidents": 0,
            "total_vehicle_detected": 7
        }"#;

        let r: AnalyticsReport = serde_json::from_str(json).unwrap();
        assert_eq!(r.total_unusual_incidents, 3);
        assert_eq!(r.total_vehicle_detected, 7);
        assert!((r.average_human_passerbys() - 2.5).abs() < f64::EPSILON);
    }
}
