//! Template-based phraseology. Each phrase key doubles as the canned audio id
//! a player can look up; the rendered template is the spoken text.
use std::collections::HashMap;

// --- Phrase keys ---

pub const PILOT_READBACK: &str = "PILOT_READBACK";
pub const PILOT_SAY_AGAIN: &str = "PILOT_SAY_AGAIN";
pub const ATC_READBACK_CORRECT: &str = "ATC_READBACK_CORRECT";
pub const ATC_READBACK_INCORRECT: &str = "ATC_READBACK_INCORRECT";
pub const NOTHING_TO_ACKNOWLEDGE: &str = "SYSTEM_NOTHING_TO_ACKNOWLEDGE";
pub const NOTHING_TO_REPEAT: &str = "SYSTEM_NOTHING_TO_REPEAT";

pub const ATC_TAXI_INITIAL: &str = "ATC_TAXI_INITIAL";
pub const ATC_TAXI_VIA: &str = "ATC_TAXI_VIA";
pub const ATC_CROSS_RUNWAY: &str = "ATC_CROSS_RUNWAY";
pub const ATC_HOLD_SHORT: &str = "ATC_HOLD_SHORT";
pub const ATC_CONTACT_TOWER: &str = "ATC_CONTACT_TOWER";

/// Placeholder values for one rendering.
#[derive(Clone, Debug, Default)]
pub struct PhraseVars {
    pub callsign: String,
    pub airport: Option<String>,
    pub runway: Option<String>,
    pub taxiway: Option<String>,
    pub frequency: Option<String>,
    pub detail: Option<String>,
}

impl PhraseVars {
    pub fn new(callsign: impl Into<String>) -> Self {
        PhraseVars {
            callsign: callsign.into(),
            ..Default::default()
        }
    }

    pub fn airport(mut self, airport: impl Into<String>) -> Self {
        self.airport = Some(airport.into());
        self
    }

    pub fn runway(mut self, runway: impl Into<String>) -> Self {
        self.runway = Some(runway.into());
        self
    }

    pub fn taxiway(mut self, taxiway: impl Into<String>) -> Self {
        self.taxiway = Some(taxiway.into());
        self
    }

    pub fn frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = Some(frequency.into());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// String-producing phraseology. The engine never looks inside.
pub trait Phraseology: Send + Sync {
    fn render(&self, key: &str, vars: &PhraseVars) -> String;
}

pub struct TemplatePhraseology {
    templates: HashMap<String, String>,
}

impl TemplatePhraseology {
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        for (key, template) in DEFAULT_TEMPLATES {
            templates.insert(key.to_string(), template.to_string());
        }
        TemplatePhraseology { templates }
    }

    /// Override or add one template.
    pub fn with_template(mut self, key: &str, template: &str) -> Self {
        self.templates.insert(key.to_string(), template.to_string());
        self
    }
}

impl Default for TemplatePhraseology {
    fn default() -> Self {
        Self::new()
    }
}

impl Phraseology for TemplatePhraseology {
    fn render(&self, key: &str, vars: &PhraseVars) -> String {
        match self.templates.get(key) {
            Some(template) => fill(template, vars),
            None => {
                log::warn!("No phraseology template for {}", key);
                key.to_string()
            }
        }
    }
}

const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    (ATC_READBACK_CORRECT, "{callsign}, readback correct"),
    (ATC_READBACK_INCORRECT, "{callsign}, negative, {detail}"),
    (PILOT_SAY_AGAIN, "Say again, {callsign}"),
    (NOTHING_TO_ACKNOWLEDGE, "Nothing to acknowledge"),
    (NOTHING_TO_REPEAT, "Nothing to repeat"),
    (
        ATC_TAXI_INITIAL,
        "{callsign}, {airport} ground, runway {runway}, taxi via {taxiway}, hold short runway {runway}",
    ),
    (ATC_TAXI_VIA, "{callsign}, continue via {taxiway}"),
    (ATC_CROSS_RUNWAY, "{callsign}, cross runway {detail} via {taxiway}"),
    (ATC_HOLD_SHORT, "{callsign}, via {taxiway}, hold short runway {runway}"),
    (
        ATC_CONTACT_TOWER,
        "{callsign}, hold short runway {runway}, contact tower {frequency}",
    ),
];

/// Substitute `{name}` placeholders. Unset placeholders stay as written.
pub fn fill(template: &str, vars: &PhraseVars) -> String {
    let mut out = template.replace("{callsign}", &vars.callsign);
    let optional = [
        ("{airport}", &vars.airport),
        ("{runway}", &vars.runway),
        ("{taxiway}", &vars.taxiway),
        ("{frequency}", &vars.frequency),
        ("{detail}", &vars.detail),
    ];
    for (placeholder, value) in optional {
        if let Some(value) = value {
            out = out.replace(placeholder, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_placeholder() {
        let vars = PhraseVars::new("N1AB")
            .airport("Palo Alto")
            .runway("31")
            .taxiway("A");
        let text = TemplatePhraseology::new().render(ATC_TAXI_INITIAL, &vars);
        assert_eq!(
            text,
            "N1AB, Palo Alto ground, runway 31, taxi via A, hold short runway 31"
        );
    }

    #[test]
    fn unset_placeholders_are_left_alone() {
        assert_eq!(
            fill("{callsign} via {taxiway}", &PhraseVars::new("N1AB")),
            "N1AB via {taxiway}"
        );
    }

    #[test]
    fn override_and_unknown_key() {
        let p = TemplatePhraseology::new().with_template(PILOT_SAY_AGAIN, "{callsign}, say again please");
        assert_eq!(p.render(PILOT_SAY_AGAIN, &PhraseVars::new("N1AB")), "N1AB, say again please");
        assert_eq!(p.render("NO_SUCH_PHRASE", &PhraseVars::new("N1AB")), "NO_SUCH_PHRASE");
    }
}
