//! Parsers for classifier responses.
//!
//! Both parsers are pure functions over the raw response text. A response
//! that cannot be interpreted is reported as its own outcome instead of being
//! folded into a default, so callers decide what it means.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());

static THINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static JSON_OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

static VERDICT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)^[\s"'*`]*(valid|invalid)\b[\s"'*`]*[:.,\-]?\s*(.*)$"#).unwrap());

static CONFIDENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?confidence"?\s*[:=]\s*"?([0-9]*\.?[0-9]+)\s*(%)?"#).unwrap()
});

/// Confidence assigned when a match response cannot be read.
pub const NEUTRAL_CONFIDENCE: f32 = 0.5;

/// Bare numbers above this are percentages.
const PERCENT_CUTOFF: f32 = 10.0;

/// Strip code fences and reasoning tags from a response.
pub fn remove_code_blocks(content: &str) -> String {
    let content = THINK_RE.replace_all(content.trim(), "");
    let content = content.trim();
    match CODE_BLOCK_RE.captures(content).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => content.to_string(),
    }
}

/// Outcome of parsing a validation response.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationParse {
    /// Leading "Valid" token.
    Valid,
    /// Leading "Invalid" token, with the reason text if any.
    Invalid { reason: Option<String> },
    /// Neither token leads the response.
    Unparsable { raw: String },
}

/// Parse a response that should open with "Valid" or "Invalid".
pub fn parse_validation_response(response: &str) -> ValidationParse {
    let cleaned = remove_code_blocks(response);
    let first_line = cleaned.lines().find(|l| !l.trim().is_empty()).unwrap_or("");

    let Some(captures) = VERDICT_RE.captures(first_line) else {
        return ValidationParse::Unparsable { raw: cleaned };
    };
    let verdict = captures.get(1).map(|m| m.as_str().to_ascii_lowercase());
    let rest: String = std::iter::once(captures.get(2).map_or("", |m| m.as_str()))
        .chain(cleaned.lines().skip_while(|l| *l != first_line).skip(1))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match verdict.as_deref() {
        Some("valid") => ValidationParse::Valid,
        Some("invalid") => ValidationParse::Invalid {
            reason: (!rest.is_empty()).then_some(rest),
        },
        _ => ValidationParse::Unparsable { raw: cleaned },
    }
}

#[derive(Debug, Deserialize)]
struct MatchPayload {
    confidence: serde_json::Value,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Outcome of parsing a match response.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchParse {
    /// A JSON object with a numeric confidence.
    Json {
        confidence: f32,
        reasoning: Option<String>,
    },
    /// No usable JSON, but a confidence value was found in the prose.
    RegexConfidence { confidence: f32 },
    /// Nothing usable.
    Unparsable { raw: String },
}

impl MatchParse {
    /// Confidence in `[0, 1]`; [`NEUTRAL_CONFIDENCE`] when unparsable.
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Json { confidence, .. } | Self::RegexConfidence { confidence } => *confidence,
            Self::Unparsable { .. } => NEUTRAL_CONFIDENCE,
        }
    }

    /// Reasoning text from the response, if the response carried one.
    pub fn reasoning(&self) -> Option<&str> {
        match self {
            Self::Json { reasoning, .. } => reasoning.as_deref(),
            _ => None,
        }
    }

    /// Whether the response was unusable.
    pub fn is_unparsable(&self) -> bool {
        matches!(self, Self::Unparsable { .. })
    }
}

/// Parse a `{confidence, reasoning}` response, tolerating prose around it.
pub fn parse_match_response(response: &str) -> MatchParse {
    let cleaned = remove_code_blocks(response);

    if let Some(found) = JSON_OBJECT_RE.find(&cleaned) {
        if let Ok(payload) = serde_json::from_str::<MatchPayload>(found.as_str()) {
            if let Some(confidence) = json_confidence(&payload.confidence) {
                return MatchParse::Json {
                    confidence,
                    reasoning: payload.reasoning.filter(|r| !r.trim().is_empty()),
                };
            }
        }
    }

    if let Some(captures) = CONFIDENCE_RE.captures(&cleaned) {
        if let Some(value) = captures.get(1).and_then(|m| m.as_str().parse::<f32>().ok()) {
            let value = if captures.get(2).is_some() { value / 100.0 } else { value };
            return MatchParse::RegexConfidence {
                confidence: normalize_confidence(value),
            };
        }
    }

    MatchParse::Unparsable { raw: cleaned }
}

fn json_confidence(value: &serde_json::Value) -> Option<f32> {
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64()? as f32,
        serde_json::Value::String(s) => match s.trim().strip_suffix('%') {
            Some(percent) => percent.trim().parse::<f32>().ok()? / 100.0,
            None => s.trim().parse::<f32>().ok()?,
        },
        _ => return None,
    };
    Some(normalize_confidence(raw))
}

/// Clamp into `[0, 1]`. Values above [`PERCENT_CUTOFF`] are read as
/// percentages; anything between 1 and the cutoff counts as full confidence.
fn normalize_confidence(value: f32) -> f32 {
    if !value.is_finite() {
        return NEUTRAL_CONFIDENCE;
    }
    let value = if value > PERCENT_CUTOFF { value / 100.0 } else { value };
    value.clamp(0.0, 1.0)
}
