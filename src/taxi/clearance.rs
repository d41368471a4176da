use crate::atc::phraseology;

/// One named taxiway in a route, optionally crossing a runway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteLeg {
    pub taxiway: String,
    pub crosses_runway: Option<String>,
}

impl RouteLeg {
    pub fn taxiway(name: impl Into<String>) -> Self {
        RouteLeg {
            taxiway: name.into(),
            crosses_runway: None,
        }
    }

    pub fn crossing(name: impl Into<String>, runway: impl Into<String>) -> Self {
        RouteLeg {
            taxiway: name.into(),
            crosses_runway: Some(runway.into()),
        }
    }
}

/// Canned-audio classification of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearanceKind {
    HoldShort,
    CrossRunway,
    TaxiVia,
}

impl ClearanceKind {
    pub fn message_key(&self) -> &'static str {
        match self {
            ClearanceKind::HoldShort => phraseology::ATC_HOLD_SHORT,
            ClearanceKind::CrossRunway => phraseology::ATC_CROSS_RUNWAY,
            ClearanceKind::TaxiVia => phraseology::ATC_TAXI_VIA,
        }
    }
}

/// One leg of a taxi route. Never changes once built.
#[derive(Clone, Debug, PartialEq)]
pub struct ClearanceSegment {
    pub from_node: String,
    pub to_node: String,
    pub taxiway: String,
    pub instruction: String,
    pub crosses_active_runway: bool,
    pub hold_short: Option<String>,
}

impl ClearanceSegment {
    /// Hold short wins over a crossing, which wins over a plain taxi.
    pub fn kind(&self) -> ClearanceKind {
        if self.hold_short.is_some() {
            ClearanceKind::HoldShort
        } else if self.crosses_active_runway {
            ClearanceKind::CrossRunway
        } else {
            ClearanceKind::TaxiVia
        }
    }
}

/// Clearance state for one aircraft.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveClearance {
    pub aircraft_id: String,
    pub segments: Vec<ClearanceSegment>,
    /// Index of the segment last issued; equals `segments.len()` once the
    /// terminal instruction is out.
    pub current: usize,
    pub runway: String,
    pub is_complete: bool,
    pub issued_at: f64,
    /// Normalized taxiway name of the report that caused the last advance.
    /// Reports on that taxiway inside the trigger zone never advance again.
    pub(crate) last_trigger: Option<String>,
}

impl ActiveClearance {
    pub fn current_segment(&self) -> Option<&ClearanceSegment> {
        self.segments.get(self.current)
    }

    pub fn is_at_last_segment(&self) -> bool {
        self.current + 1 == self.segments.len()
    }

    /// Segments not yet revealed to the pilot.
    pub fn remaining(&self) -> usize {
        self.segments.len().saturating_sub(self.current + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(hold_short: Option<&str>, crosses: bool) -> ClearanceSegment {
        ClearanceSegment {
            from_node: "gate_a3".into(),
            to_node: "TWY_A".into(),
            taxiway: "A".into(),
            instruction: String::new(),
            crosses_active_runway: crosses,
            hold_short: hold_short.map(String::from),
        }
    }

    #[test]
    fn classification_priority() {
        assert_eq!(segment(Some("RWY31_HOLD"), true).kind(), ClearanceKind::HoldShort);
        assert_eq!(segment(None, true).kind(), ClearanceKind::CrossRunway);
        assert_eq!(segment(None, false).kind(), ClearanceKind::TaxiVia);
        assert_eq!(ClearanceKind::HoldShort.message_key(), "ATC_HOLD_SHORT");
    }
}
