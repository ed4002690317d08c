//! Display vocabulary derived from tour data. Everything here is a pure
//! function of its input.

use std::collections::BTreeMap;

use shared::{
    domain::{AccessibilityRating, BarrierId, BarrierSeverity, BarrierType},
    protocol::{BarrierSummary, NavigationStep},
};

/// Abstract palette; front ends map these onto their own styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorToken {
    Green,
    Yellow,
    Orange,
    Red,
    Gray,
}

impl ColorToken {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorToken::Green => "green",
            ColorToken::Yellow => "yellow",
            ColorToken::Orange => "orange",
            ColorToken::Red => "red",
            ColorToken::Gray => "gray",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub label: &'static str,
    pub color: ColorToken,
}

pub fn severity_badge(severity: BarrierSeverity) -> Badge {
    let (label, color) = match severity {
        BarrierSeverity::Low => ("Low", ColorToken::Green),
        BarrierSeverity::Medium => ("Medium", ColorToken::Yellow),
        BarrierSeverity::High => ("High", ColorToken::Orange),
        BarrierSeverity::Critical => ("Critical", ColorToken::Red),
        BarrierSeverity::Unrecognized => ("Unknown", ColorToken::Gray),
    };
    Badge { label, color }
}

pub fn rating_badge(rating: AccessibilityRating) -> Badge {
    Badge {
        label: match rating {
            AccessibilityRating::Accessible => "Accessible",
            AccessibilityRating::Caution => "Caution",
            AccessibilityRating::Difficult => "Difficult",
            AccessibilityRating::Inaccessible => "Inaccessible",
        },
        color: rating_dot_color(rating),
    }
}

/// Color of a step's dot on the progress bar.
pub fn rating_dot_color(rating: AccessibilityRating) -> ColorToken {
    match rating {
        AccessibilityRating::Accessible => ColorToken::Green,
        AccessibilityRating::Caution => ColorToken::Yellow,
        AccessibilityRating::Difficult => ColorToken::Orange,
        AccessibilityRating::Inaccessible => ColorToken::Red,
    }
}

pub fn barrier_type_label(barrier_type: BarrierType) -> &'static str {
    match barrier_type {
        BarrierType::Step => "Step",
        BarrierType::Stairs => "Stairs",
        BarrierType::NarrowDoor => "Narrow door",
        BarrierType::NarrowPassage => "Narrow passage",
        BarrierType::SteepRamp => "Steep ramp",
        BarrierType::UnevenSurface => "Uneven surface",
        BarrierType::Obstacle => "Obstacle",
        BarrierType::HeavyDoor => "Heavy door",
        BarrierType::RevolvingDoor => "Revolving door",
        BarrierType::Threshold => "Threshold",
        BarrierType::Gravel => "Gravel",
        BarrierType::Grass => "Grass",
        BarrierType::Slope => "Slope",
        BarrierType::Other | BarrierType::Unrecognized => "Other",
    }
}

pub fn barrier_type_icon(barrier_type: BarrierType) -> &'static str {
    match barrier_type {
        BarrierType::Step => "Footprints",
        BarrierType::Stairs => "Stairs",
        BarrierType::NarrowDoor => "DoorClosed",
        BarrierType::NarrowPassage => "MoveHorizontal",
        BarrierType::SteepRamp | BarrierType::Slope => "TrendingUp",
        BarrierType::UnevenSurface => "Waves",
        BarrierType::Obstacle => "AlertTriangle",
        BarrierType::HeavyDoor => "Lock",
        BarrierType::RevolvingDoor => "RotateCw",
        BarrierType::Threshold => "MinusSquare",
        BarrierType::Gravel => "Circle",
        BarrierType::Grass => "Leaf",
        BarrierType::Other | BarrierType::Unrecognized => "HelpCircle",
    }
}

/// Worst severity decides the rating.
pub fn rating_for<'a>(
    severities: impl IntoIterator<Item = &'a BarrierSeverity>,
) -> AccessibilityRating {
    let mut rating = AccessibilityRating::Accessible;
    for severity in severities {
        match severity {
            BarrierSeverity::Critical => return AccessibilityRating::Inaccessible,
            BarrierSeverity::High => rating = AccessibilityRating::Difficult,
            BarrierSeverity::Medium if rating == AccessibilityRating::Accessible => {
                rating = AccessibilityRating::Caution
            }
            _ => {}
        }
    }
    rating
}

pub fn score_color(score: Option<f64>) -> ColorToken {
    match score {
        None => ColorToken::Gray,
        Some(s) if s >= 80.0 => ColorToken::Green,
        Some(s) if s >= 60.0 => ColorToken::Yellow,
        Some(s) if s >= 40.0 => ColorToken::Orange,
        Some(_) => ColorToken::Red,
    }
}

pub fn score_label(score: Option<f64>) -> &'static str {
    match score {
        None => "Not evaluated",
        Some(s) if s >= 80.0 => "Highly accessible",
        Some(s) if s >= 60.0 => "Moderately accessible",
        Some(s) if s >= 40.0 => "Limited accessibility",
        Some(_) => "Restricted accessibility",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarrierChip {
    pub id: BarrierId,
    pub label: &'static str,
    pub icon: &'static str,
    pub color: ColorToken,
    pub selected: bool,
}

/// One chip per barrier on the step, in the order the guide lists them.
pub fn barrier_chips(step: &NavigationStep, selected: Option<BarrierId>) -> Vec<BarrierChip> {
    step.barriers
        .iter()
        .map(|barrier| BarrierChip {
            id: barrier.id,
            label: barrier_type_label(barrier.barrier_type),
            icon: barrier_type_icon(barrier.barrier_type),
            color: severity_badge(barrier.severity).color,
            selected: selected == Some(barrier.id),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarrierTally {
    pub total: usize,
    pub by_severity: BTreeMap<BarrierSeverity, usize>,
    pub by_type: BTreeMap<BarrierType, usize>,
}

impl BarrierTally {
    /// Severities worst first, with zero counts included.
    pub fn severity_rows(&self) -> Vec<(BarrierSeverity, usize)> {
        [
            BarrierSeverity::Critical,
            BarrierSeverity::High,
            BarrierSeverity::Medium,
            BarrierSeverity::Low,
        ]
        .into_iter()
        .map(|severity| (severity, self.by_severity.get(&severity).copied().unwrap_or(0)))
        .collect()
    }

    /// Types ordered by count, most frequent first.
    pub fn type_rows(&self) -> Vec<(BarrierType, usize)> {
        let mut rows: Vec<_> = self.by_type.iter().map(|(t, n)| (*t, *n)).collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}

pub fn summarize_barriers<'a>(
    barriers: impl IntoIterator<Item = &'a BarrierSummary>,
) -> BarrierTally {
    let mut tally = BarrierTally::default();
    for barrier in barriers {
        tally.total += 1;
        *tally.by_severity.entry(barrier.severity).or_default() += 1;
        *tally.by_type.entry(barrier.barrier_type).or_default() += 1;
    }
    tally
}
