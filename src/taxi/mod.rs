//! Progressive taxi clearances.
//!
//! A route is cut into legs and revealed one leg at a time: the first leg is
//! issued with the clearance, each later one when the aircraft reaches the end
//! of the leg it is on, and a final "contact tower" once it holds short.

pub mod clearance;
pub mod routes;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::atc::phraseology::{self, PhraseVars, Phraseology};
use crate::clock::Clock;
use crate::radio::{MessageSink, PhraseRef, Priority, RadioMessage};
use crate::settings::RadioSettings;

pub use clearance::{ActiveClearance, ClearanceKind, ClearanceSegment, RouteLeg};
pub use routes::{StaticRoutes, TaxiRouteProvider};

#[derive(Debug, Error, PartialEq)]
pub enum ClearanceError {
    #[error("{0} already has an active taxi clearance")]
    AlreadyActive(String),

    #[error("no taxi route from {parking} to runway {runway}")]
    NoRouteData { parking: String, runway: String },

    #[error("no taxi clearance for {0}")]
    UnknownAircraft(String),
}

/// Position report from the ground tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionUpdate {
    pub aircraft_id: String,
    pub taxiway: Option<String>,
    /// Meters to the end waypoint of the current leg.
    pub distance_to_waypoint: f64,
}

impl PositionUpdate {
    pub fn new(aircraft_id: impl Into<String>, taxiway: impl Into<String>, distance: f64) -> Self {
        PositionUpdate {
            aircraft_id: aircraft_id.into(),
            taxiway: Some(taxiway.into()),
            distance_to_waypoint: distance,
        }
    }
}

pub struct ProgressiveTaxiManager {
    clearances: HashMap<String, ActiveClearance>,
    routes: Box<dyn TaxiRouteProvider>,
    phraseology: Arc<dyn Phraseology>,
    clock: Arc<dyn Clock>,
    airport: String,
    tower_frequency: String,
    advance_distance_m: f64,
}

impl ProgressiveTaxiManager {
    pub fn new(
        settings: &RadioSettings,
        routes: Box<dyn TaxiRouteProvider>,
        phraseology: Arc<dyn Phraseology>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ProgressiveTaxiManager {
            clearances: HashMap::new(),
            routes,
            phraseology,
            clock,
            airport: settings.airport.clone(),
            tower_frequency: settings.tower_frequency.clone(),
            advance_distance_m: settings.taxi.advance_distance_m,
        }
    }

    /// Build the segment list and issue only the first leg. `route` overrides
    /// the route provider. A completed clearance is superseded; an
    /// incomplete one is left alone and the request rejected.
    pub fn issue_initial_clearance(
        &mut self,
        aircraft_id: &str,
        parking_id: &str,
        runway: &str,
        route: Option<&[RouteLeg]>,
        sink: &mut dyn MessageSink,
    ) -> Result<&ActiveClearance, ClearanceError> {
        if let Some(existing) = self.clearances.get(aircraft_id) {
            if !existing.is_complete {
                log::warn!("{} already taxiing to runway {}", aircraft_id, existing.runway);
                return Err(ClearanceError::AlreadyActive(aircraft_id.to_string()));
            }
            log::info!("superseding completed clearance for {}", aircraft_id);
        }

        let legs = match route {
            Some(legs) => legs.to_vec(),
            None => self.routes.route(parking_id, runway).unwrap_or_default(),
        };
        let segments = self.build_segments(aircraft_id, parking_id, runway, &legs);
        if segments.is_empty() {
            log::warn!(
                "no route data from {} to runway {}, no clearance issued to {}",
                parking_id,
                runway,
                aircraft_id
            );
            return Err(ClearanceError::NoRouteData {
                parking: parking_id.to_string(),
                runway: runway.to_string(),
            });
        }

        log::info!(
            "{} cleared to runway {} in {} segments",
            aircraft_id,
            runway,
            segments.len()
        );
        self.clearances.insert(
            aircraft_id.to_string(),
            ActiveClearance {
                aircraft_id: aircraft_id.to_string(),
                segments,
                current: 0,
                runway: runway.to_string(),
                is_complete: false,
                issued_at: self.clock.now(),
                last_trigger: None,
            },
        );
        self.issue_segment(aircraft_id, 0, sink);

        self.clearances
            .get(aircraft_id)
            .ok_or_else(|| ClearanceError::UnknownAircraft(aircraft_id.to_string()))
    }

    /// First leg from parking, one leg per further taxiway, then a hold-short
    /// leg at the runway. Empty when there are no taxiways.
    fn build_segments(
        &self,
        aircraft_id: &str,
        parking_id: &str,
        runway: &str,
        legs: &[RouteLeg],
    ) -> Vec<ClearanceSegment> {
        let (Some(first), Some(last)) = (legs.first(), legs.last()) else {
            return Vec::new();
        };
        let hold_node = format!("RWY{}_HOLD", runway.to_ascii_uppercase());
        let node = |leg: &RouteLeg| format!("TWY_{}", leg.taxiway.to_ascii_uppercase());
        let vars = |leg: &RouteLeg| {
            PhraseVars::new(aircraft_id)
                .airport(self.airport.as_str())
                .runway(runway)
                .taxiway(leg.taxiway.as_str())
        };

        let mut segments = Vec::with_capacity(legs.len() + 1);
        segments.push(ClearanceSegment {
            from_node: parking_id.to_string(),
            to_node: node(first),
            taxiway: first.taxiway.clone(),
            instruction: self.phraseology.render(phraseology::ATC_TAXI_INITIAL, &vars(first)),
            crosses_active_runway: first.crosses_runway.is_some(),
            hold_short: Some(hold_node.clone()),
        });

        for pair in legs.windows(2) {
            let (prev, leg) = (&pair[0], &pair[1]);
            let instruction = match &leg.crosses_runway {
                Some(crossing) => self
                    .phraseology
                    .render(phraseology::ATC_CROSS_RUNWAY, &vars(leg).detail(crossing.as_str())),
                None => self.phraseology.render(phraseology::ATC_TAXI_VIA, &vars(leg)),
            };
            segments.push(ClearanceSegment {
                from_node: node(prev),
                to_node: node(leg),
                taxiway: leg.taxiway.clone(),
                instruction,
                crosses_active_runway: leg.crosses_runway.is_some(),
                hold_short: None,
            });
        }

        segments.push(ClearanceSegment {
            from_node: node(last),
            to_node: hold_node.clone(),
            taxiway: last.taxiway.clone(),
            instruction: self.phraseology.render(phraseology::ATC_HOLD_SHORT, &vars(last)),
            crosses_active_runway: false,
            hold_short: Some(hold_node),
        });
        segments
    }

    /// Publish segment `index`, or the terminal "contact tower" instruction
    /// once past the last segment. Returns whether anything was published.
    fn issue_segment(&mut self, aircraft_id: &str, index: usize, sink: &mut dyn MessageSink) -> bool {
        let Some(clearance) = self.clearances.get_mut(aircraft_id) else {
            return false;
        };

        if let Some(segment) = clearance.segments.get(index) {
            let mut msg = RadioMessage::atc(PhraseRef::single(segment.kind().message_key()), Priority::HIGH)
                .with_text(segment.instruction.as_str());
            if let Some(node) = &segment.hold_short {
                msg = msg.with_hold_short(node.as_str());
            }
            log::info!(
                "{} segment {}/{}: {}",
                aircraft_id,
                index + 1,
                clearance.segments.len(),
                segment.instruction
            );
            sink.enqueue(msg);
            return true;
        }

        if clearance.is_complete {
            return false;
        }

        let vars = PhraseVars::new(aircraft_id)
            .airport(self.airport.as_str())
            .runway(clearance.runway.as_str())
            .frequency(self.tower_frequency.as_str());
        let text = self.phraseology.render(phraseology::ATC_CONTACT_TOWER, &vars);
        let mut msg = RadioMessage::atc(PhraseRef::single(phraseology::ATC_CONTACT_TOWER), Priority::HIGH)
            .with_text(text);
        if let Some(node) = clearance.segments.last().and_then(|s| s.hold_short.clone()) {
            msg = msg.with_hold_short(node);
        }
        clearance.current = clearance.segments.len();
        clearance.is_complete = true;
        log::info!("{} taxi complete, handed to tower", aircraft_id);
        sink.enqueue(msg);
        true
    }

    /// Advance one leg when the aircraft is near the end of its current leg.
    /// Returns whether a new segment was issued.
    pub fn on_position_update(&mut self, update: &PositionUpdate, sink: &mut dyn MessageSink) -> bool {
        let Some(reported) = update.taxiway.as_deref().filter(|t| !t.trim().is_empty()) else {
            return false;
        };
        let threshold = self.advance_distance_m;
        let Some(clearance) = self.clearances.get_mut(&update.aircraft_id) else {
            return false;
        };
        if clearance.is_complete {
            return false;
        }
        let Some(segment) = clearance.current_segment() else {
            return false;
        };

        let name = normalize_taxiway(reported);
        let on_leg = taxiway_matches(reported, &segment.taxiway);
        let near_end = update.distance_to_waypoint < threshold;

        // Still sitting where the last advance fired.
        if near_end && clearance.last_trigger.as_deref() == Some(name.as_str()) {
            return false;
        }
        clearance.last_trigger = None;
        if !(on_leg && near_end) || clearance.is_at_last_segment() {
            return false;
        }

        clearance.current += 1;
        clearance.last_trigger = Some(name);
        let next = clearance.current;
        log::debug!(
            "{} reached end of {} ({:.0} m), advancing to segment {}",
            update.aircraft_id,
            reported,
            update.distance_to_waypoint,
            next
        );
        let aircraft_id = update.aircraft_id.clone();
        self.issue_segment(&aircraft_id, next, sink)
    }

    /// Pilot reports holding short at the runway: issue "contact tower".
    /// Ignored unless the final hold-short leg has been issued.
    pub fn report_holding_short(
        &mut self,
        aircraft_id: &str,
        sink: &mut dyn MessageSink,
    ) -> Result<bool, ClearanceError> {
        let clearance = self
            .clearances
            .get(aircraft_id)
            .ok_or_else(|| ClearanceError::UnknownAircraft(aircraft_id.to_string()))?;
        if clearance.is_complete {
            return Ok(false);
        }
        if !clearance.is_at_last_segment() {
            log::warn!(
                "{} reports holding short with {} segments to go",
                aircraft_id,
                clearance.remaining()
            );
            return Ok(false);
        }
        let past_end = clearance.segments.len();
        Ok(self.issue_segment(aircraft_id, past_end, sink))
    }

    /// Drop the clearance for an aircraft. Safe to call when there is none.
    pub fn cancel(&mut self, aircraft_id: &str) -> Option<ActiveClearance> {
        let removed = self.clearances.remove(aircraft_id);
        if removed.is_some() {
            log::info!("taxi clearance for {} cancelled", aircraft_id);
        }
        removed
    }

    pub fn clearance(&self, aircraft_id: &str) -> Option<&ActiveClearance> {
        self.clearances.get(aircraft_id)
    }

    /// Clearances still in progress.
    pub fn active_count(&self) -> usize {
        self.clearances.values().filter(|c| !c.is_complete).count()
    }
}

/// Lowercase taxiway name without a "taxiway"/"twy" prefix.
fn normalize_taxiway(name: &str) -> String {
    let name = name.trim().to_ascii_lowercase();
    name.strip_prefix("taxiway")
        .or_else(|| name.strip_prefix("twy"))
        .unwrap_or(&name)
        .trim()
        .to_string()
}

/// Loose case-insensitive match of a reported taxiway name against a leg.
fn taxiway_matches(reported: &str, leg_taxiway: &str) -> bool {
    normalize_taxiway(reported).contains(&normalize_taxiway(leg_taxiway))
}
