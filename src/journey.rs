use std::fmt::Display;

use crate::network::{Timestamp, WalkingDistance};
use crate::utils;

/// A Pareto-optimal journey under (arrival time, number of trips).
///
/// These are the anchor labels the walking-aware search is compared against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArrivalLabel {
    pub arrival_time: Timestamp,
    pub number_of_trips: u8,
}

/// A Pareto-optimal journey under (arrival time, number of trips, walking distance).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WalkingParetoLabel {
    pub arrival_time: Timestamp,
    pub number_of_trips: u8,
    pub walking_distance: WalkingDistance,
}

impl WalkingParetoLabel {
    // Projection onto the anchor criteria.
    pub fn arrival_label(&self) -> ArrivalLabel {
        ArrivalLabel { arrival_time: self.arrival_time, number_of_trips: self.number_of_trips }
    }

    /// True if this label sits on the same (arrival time, trips) point as any of the anchors.
    pub fn is_anchor_label(&self, anchor_labels: &[ArrivalLabel]) -> bool {
        anchor_labels.contains(&self.arrival_label())
    }
}

impl Display for ArrivalLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Arrive at {} using {} trips.", utils::get_time_str(self.arrival_time), self.number_of_trips)
    }
}

impl Display for WalkingParetoLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,
               "Arrive at {} using {} trips, walking for {} minutes.",
               utils::get_time_str(self.arrival_time),
               self.number_of_trips,
               self.walking_distance / 60,
        )
    }
}
