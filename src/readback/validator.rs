//! Critical-element extraction, readback synthesis and readback checking.
//!
//! All three are pure functions so each can be exercised on its own.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Safety-relevant datum in a clearance. Declaration order is the canonical
/// readback order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementKind {
    Altitude,
    Heading,
    Runway,
    Frequency,
    Squawk,
    Speed,
}

impl ElementKind {
    pub const ALL: [ElementKind; 6] = [
        ElementKind::Altitude,
        ElementKind::Heading,
        ElementKind::Runway,
        ElementKind::Frequency,
        ElementKind::Squawk,
        ElementKind::Speed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Altitude => "altitude",
            ElementKind::Heading => "heading",
            ElementKind::Runway => "runway",
            ElementKind::Frequency => "frequency",
            ElementKind::Squawk => "squawk",
            ElementKind::Speed => "speed",
        }
    }

    fn pattern(&self) -> &'static Regex {
        static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            ElementKind::ALL
                .iter()
                .map(|kind| Regex::new(kind.source()).expect("element pattern compiles"))
                .collect()
        });
        &patterns[*self as usize]
    }

    fn source(&self) -> &'static str {
        match self {
            ElementKind::Altitude => concat!(
                r"(?i)\b(?:climb|descend)(?:\s+and)?\s+maintain\s+(\d{1,3}(?:,\d{3})+|\d{3,5})\b",
                r"|\b(\d{1,3}(?:,\d{3})+|\d{3,5})\s*(?:feet|ft)\b",
                r"|\bflight\s+level\s+(\d{2,3})\b",
            ),
            ElementKind::Heading => r"(?i)\bheading\s+(\d{1,3})\b",
            ElementKind::Runway => r"(?i)\brunway\s+(\d{1,2})\s*(left|right|center|l|r|c)?\b",
            ElementKind::Frequency => r"\b(1[1-3]\d\.\d{1,3})\b",
            ElementKind::Squawk => r"(?i)\bsquawk(?:ing)?\s+([0-7]{4})\b",
            ElementKind::Speed => {
                r"(?i)\bspeed\s+(?:to\s+)?(\d{2,3})\b|\b(\d{2,3})\s*(?:knots|kts)\b"
            }
        }
    }

    /// Turn one regex match into the element value, or reject it.
    fn value_from(&self, caps: &Captures<'_>, text: &str) -> Option<String> {
        match self {
            ElementKind::Altitude => {
                if let Some(fl) = caps.get(3) {
                    return Some(format!("FL{}", fl.as_str()));
                }
                let m = caps.get(1).or_else(|| caps.get(2))?;
                // "climb and maintain 250 knots" is a speed, not an altitude.
                let rest = text[m.end()..].trim_start().to_ascii_lowercase();
                if rest.starts_with("knots") || rest.starts_with("kts") {
                    return None;
                }
                Some(m.as_str().to_string())
            }
            ElementKind::Runway => {
                let number = caps.get(1)?.as_str();
                let side = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
                    Some(s) if s.starts_with('l') => "L",
                    Some(s) if s.starts_with('r') => "R",
                    Some(s) if s.starts_with('c') => "C",
                    _ => "",
                };
                Some(format!("{}{}", number, side))
            }
            _ => caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().to_string()),
        }
    }

    /// Standard readback fragment for a value of this kind.
    fn fragment(&self, value: &str) -> String {
        match self {
            ElementKind::Altitude => match value.strip_prefix("FL") {
                Some(level) => format!("flight level {}", level),
                None => format!("maintain {} feet", value),
            },
            ElementKind::Heading => format!("heading {}", value),
            ElementKind::Runway => format!("runway {}", value),
            ElementKind::Frequency => value.to_string(),
            ElementKind::Squawk => format!("squawk {}", value),
            ElementKind::Speed => format!("speed {}", value),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extracted elements, iterated in canonical order.
pub type Elements = BTreeMap<ElementKind, String>;

/// Scan instruction text for every critical element kind. Kinds that do not
/// appear are simply absent from the result.
pub fn extract_elements(text: &str) -> Elements {
    let mut elements = Elements::new();
    for kind in ElementKind::ALL {
        let found = kind
            .pattern()
            .captures_iter(text)
            .find_map(|caps| kind.value_from(&caps, text));
        if let Some(value) = found {
            elements.insert(kind, value);
        }
    }
    elements
}

/// Pilot readback phrase: present elements in canonical order, then the
/// callsign. Falls back to a plain acknowledgment.
pub fn generate_readback(elements: &Elements, callsign: &str) -> String {
    if elements.is_empty() {
        return format!("Roger, {}", callsign);
    }
    let mut parts: Vec<String> = elements
        .iter()
        .map(|(kind, value)| kind.fragment(value))
        .collect();
    parts.push(callsign.to_string());
    parts.join(", ")
}

/// One element the pilot got wrong or left out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub kind: ElementKind,
    pub expected: String,
    pub heard: Option<String>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.heard {
            Some(heard) => write!(
                f,
                "{}: expected {}, read back {}",
                self.kind, self.expected, heard
            ),
            None => write!(f, "{}: expected {}, not read back", self.kind, self.expected),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadbackCheck {
    pub correct: bool,
    pub mismatches: Vec<Mismatch>,
}

impl ReadbackCheck {
    pub fn descriptions(&self) -> Vec<String> {
        self.mismatches.iter().map(ToString::to_string).collect()
    }
}

fn normalize(value: &str) -> String {
    value.replace(',', "").trim().to_string()
}

/// Check every element of the original instruction against the readback.
/// Extra elements in the readback are never flagged.
pub fn validate(original: &Elements, readback: &Elements) -> ReadbackCheck {
    let mismatches: Vec<Mismatch> = original
        .iter()
        .filter_map(|(kind, expected)| {
            let heard = readback.get(kind);
            let heard_norm = heard.map(|v| normalize(v)).unwrap_or_default();
            if normalize(expected) == heard_norm {
                return None;
            }
            Some(Mismatch {
                kind: *kind,
                expected: expected.clone(),
                heard: heard.cloned(),
            })
        })
        .collect();

    ReadbackCheck {
        correct: mismatches.is_empty(),
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEARANCE: &str = "climb and maintain 3000 feet, turn right heading 270, contact 125.35";

    fn elements(pairs: &[(ElementKind, &str)]) -> Elements {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn extracts_altitude_heading_frequency() {
        let e = extract_elements(CLEARANCE);
        assert_eq!(
            e,
            elements(&[
                (ElementKind::Altitude, "3000"),
                (ElementKind::Heading, "270"),
                (ElementKind::Frequency, "125.35"),
            ])
        );
    }

    #[test]
    fn readback_round_trip_keeps_values() {
        let original = extract_elements(CLEARANCE);
        let readback = generate_readback(&original, "N1AB");
        assert_eq!(readback, "maintain 3000 feet, heading 270, 125.35, N1AB");
        assert_eq!(extract_elements(&readback), original);
    }

    #[test]
    fn extracts_runway_squawk_speed() {
        let e = extract_elements("N1AB, squawk 4521, reduce speed to 180, cleared to land runway 28 left");
        assert_eq!(e.get(&ElementKind::Squawk).map(String::as_str), Some("4521"));
        assert_eq!(e.get(&ElementKind::Speed).map(String::as_str), Some("180"));
        assert_eq!(e.get(&ElementKind::Runway).map(String::as_str), Some("28L"));
        assert!(!e.contains_key(&ElementKind::Altitude));
    }

    #[test]
    fn runway_with_attached_suffix_and_plain_number() {
        assert_eq!(extract_elements("line up and wait runway 28R")[&ElementKind::Runway], "28R");
        assert_eq!(extract_elements("runway 31, cleared for takeoff")[&ElementKind::Runway], "31");
        assert_eq!(extract_elements("runway 31 cleared for takeoff")[&ElementKind::Runway], "31");
    }

    #[test]
    fn flight_level_and_comma_altitudes() {
        assert_eq!(extract_elements("climb and maintain flight level 350")[&ElementKind::Altitude], "FL350");
        assert_eq!(extract_elements("descend and maintain 11,000")[&ElementKind::Altitude], "11,000");
        let fl = elements(&[(ElementKind::Altitude, "FL350")]);
        assert_eq!(generate_readback(&fl, "N1AB"), "flight level 350, N1AB");
    }

    #[test]
    fn knots_are_not_altitude() {
        let e = extract_elements("climb and maintain 250 knots");
        assert!(!e.contains_key(&ElementKind::Altitude));
        assert_eq!(e[&ElementKind::Speed], "250");
    }

    #[test]
    fn no_elements_gives_roger() {
        assert!(extract_elements("taxi to the ramp").is_empty());
        assert_eq!(generate_readback(&Elements::new(), "N1AB"), "Roger, N1AB");
    }

    #[test]
    fn readback_order_is_canonical() {
        let e = elements(&[
            (ElementKind::Speed, "210"),
            (ElementKind::Squawk, "1200"),
            (ElementKind::Runway, "31"),
            (ElementKind::Altitude, "5000"),
        ]);
        assert_eq!(
            generate_readback(&e, "N1AB"),
            "maintain 5000 feet, runway 31, squawk 1200, speed 210, N1AB"
        );
    }

    #[test]
    fn validate_accepts_matching_readback_with_extras() {
        let original = elements(&[(ElementKind::Altitude, "3,000")]);
        let readback = elements(&[
            (ElementKind::Altitude, " 3000 "),
            (ElementKind::Heading, "270"),
        ]);
        let check = validate(&original, &readback);
        assert!(check.correct);
        assert!(check.mismatches.is_empty());
    }

    #[test]
    fn validate_reports_wrong_and_missing_elements() {
        let original = extract_elements(CLEARANCE);
        let readback = extract_elements("maintain 4000 feet, heading 270, N1AB");
        let check = validate(&original, &readback);
        assert!(!check.correct);
        assert_eq!(
            check.descriptions(),
            vec![
                "altitude: expected 3000, read back 4000".to_string(),
                "frequency: expected 125.35, not read back".to_string(),
            ]
        );
    }

    #[test]
    fn empty_original_is_always_correct() {
        let check = validate(&Elements::new(), &extract_elements(CLEARANCE));
        assert!(check.correct);
    }
}
