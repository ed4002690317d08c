use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_newtype!(ScanId);
id_newtype!(ImageId);
id_newtype!(AnalysisId);
id_newtype!(BarrierId);
id_newtype!(GuideId);
id_newtype!(ProfileId);

/// Server-side lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    Uploading,
    Ready,
    Analyzing,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Uploading => "uploading",
            ScanStatus::Ready => "ready",
            ScanStatus::Analyzing => "analyzing",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            ScanStatus::Pending,
            ScanStatus::Uploading,
            ScanStatus::Ready,
            ScanStatus::Analyzing,
            ScanStatus::Completed,
            ScanStatus::Failed,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| format!("unknown scan status `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl AnalysisStatus {
    /// `completed` and `failed` end a job; everything else keeps it active.
    pub fn is_terminal(self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }
}

/// Detected obstacle kinds. Values the client does not know about land in
/// `Unrecognized` instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierType {
    Step,
    Stairs,
    NarrowDoor,
    NarrowPassage,
    SteepRamp,
    UnevenSurface,
    Obstacle,
    HeavyDoor,
    RevolvingDoor,
    Threshold,
    Gravel,
    Grass,
    Slope,
    Other,
    #[serde(other)]
    Unrecognized,
}

impl BarrierType {
    pub fn as_str(self) -> &'static str {
        match self {
            BarrierType::Step => "step",
            BarrierType::Stairs => "stairs",
            BarrierType::NarrowDoor => "narrow_door",
            BarrierType::NarrowPassage => "narrow_passage",
            BarrierType::SteepRamp => "steep_ramp",
            BarrierType::UnevenSurface => "uneven_surface",
            BarrierType::Obstacle => "obstacle",
            BarrierType::HeavyDoor => "heavy_door",
            BarrierType::RevolvingDoor => "revolving_door",
            BarrierType::Threshold => "threshold",
            BarrierType::Gravel => "gravel",
            BarrierType::Grass => "grass",
            BarrierType::Slope => "slope",
            BarrierType::Other => "other",
            BarrierType::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierSeverity {
    Low,
    Medium,
    High,
    Critical,
    #[serde(other)]
    Unrecognized,
}

impl BarrierSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            BarrierSeverity::Low => "low",
            BarrierSeverity::Medium => "medium",
            BarrierSeverity::High => "high",
            BarrierSeverity::Critical => "critical",
            BarrierSeverity::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessibilityRating {
    Accessible,
    Caution,
    Difficult,
    Inaccessible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelchairType {
    Manual,
    Electric,
    Sport,
    Pediatric,
    Bariatric,
}

impl WheelchairType {
    pub const ALL: [WheelchairType; 5] = [
        WheelchairType::Manual,
        WheelchairType::Electric,
        WheelchairType::Sport,
        WheelchairType::Pediatric,
        WheelchairType::Bariatric,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WheelchairType::Manual => "manual",
            WheelchairType::Electric => "electric",
            WheelchairType::Sport => "sport",
            WheelchairType::Pediatric => "pediatric",
            WheelchairType::Bariatric => "bariatric",
        }
    }
}

impl std::str::FromStr for WheelchairType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WheelchairType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown wheelchair type `{s}`"))
    }
}

/// Kind of space a world-model node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    Entrance,
    Corridor,
    Room,
    Stairway,
    Elevator,
    Bathroom,
    Outdoor,
    Parking,
    #[serde(other)]
    Other,
}

/// How hard it is to move along a world-model edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Moderate,
    Difficult,
    Impassable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceEstimate {
    Short,
    Medium,
    Long,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_barrier_type_falls_back_instead_of_failing() {
        let parsed: BarrierType = serde_json::from_str("\"escalator\"").expect("parse");
        assert_eq!(parsed, BarrierType::Unrecognized);

        let parsed: BarrierType = serde_json::from_str("\"narrow_door\"").expect("parse");
        assert_eq!(parsed, BarrierType::NarrowDoor);
    }

    #[test]
    fn unknown_severity_falls_back_instead_of_failing() {
        let parsed: BarrierSeverity = serde_json::from_str("\"catastrophic\"").expect("parse");
        assert_eq!(parsed, BarrierSeverity::Unrecognized);
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(AnalysisStatus::Completed.is_terminal());
        assert!(AnalysisStatus::Failed.is_terminal());
        assert!(!AnalysisStatus::Pending.is_terminal());
        assert!(!AnalysisStatus::InProgress.is_terminal());
    }

    #[test]
    fn unknown_space_types_read_as_other() {
        let parsed: SpaceType = serde_json::from_str("\"lobby\"").expect("parse");
        assert_eq!(parsed, SpaceType::Other);
        let parsed: Difficulty = serde_json::from_str("\"impassable\"").expect("parse");
        assert_eq!(parsed, Difficulty::Impassable);
    }

    #[test]
    fn scan_status_parses_wire_names() {
        assert_eq!("analyzing".parse::<ScanStatus>(), Ok(ScanStatus::Analyzing));
        assert!("archived".parse::<ScanStatus>().is_err());
    }

    #[test]
    fn wheelchair_type_matches_its_serde_name() {
        for kind in WheelchairType::ALL {
            let wire = serde_json::to_value(kind).expect("serialize");
            assert_eq!(wire, serde_json::json!(kind.as_str()));
            assert_eq!(kind.as_str().parse::<WheelchairType>(), Ok(kind));
        }
        assert!("hoverchair".parse::<WheelchairType>().is_err());
    }

    #[test]
    fn ids_round_trip_through_display() {
        let id = ScanId::new();
        let parsed: ScanId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
    }
}
