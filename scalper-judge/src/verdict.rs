use crate::error::JudgeError;
use derive_more::Display;
use scalper_instrument::Side;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Action recommended by the judge.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum JudgeAction {
    #[display("LONG")]
    Long,
    #[display("SHORT")]
    Short,
    /// Do nothing: skip the entry, or keep the position open.
    #[display("HOLD")]
    Hold,
    #[display("CLOSE")]
    Close,
}

impl From<Side> for JudgeAction {
    fn from(value: Side) -> Self {
        match value {
            Side::Long => JudgeAction::Long,
            Side::Short => JudgeAction::Short,
        }
    }
}

impl FromStr for JudgeAction {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '*')
            .to_ascii_uppercase();
        match normalised.as_str() {
            "LONG" | "BUY" => Ok(JudgeAction::Long),
            "SHORT" | "SELL" => Ok(JudgeAction::Short),
            "HOLD" | "WAIT" | "SKIP" | "NONE" | "NEUTRAL" => Ok(JudgeAction::Hold),
            "CLOSE" | "EXIT" => Ok(JudgeAction::Close),
            _ => Err(JudgeError::Validation(format!("unknown action: {s}"))),
        }
    }
}

/// Judge response after schema validation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JudgeResponse {
    pub action: JudgeAction,
    /// [0, 100].
    pub confidence: f64,
    pub reason: String,
}

/// Final decision returned to callers of the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Verdict {
    pub action: JudgeAction,
    pub confidence: f64,
    pub reason: String,
    /// Whether the judge confirms the candidate entry / exit.
    pub agrees: bool,
    /// The judge could not be consulted and this is a conservative default.
    pub degraded: bool,
}

impl Verdict {
    /// Conservative, non-agreeing verdict used whenever the judge is unavailable.
    pub fn degraded(error: &JudgeError) -> Self {
        Self {
            action: JudgeAction::Hold,
            confidence: 0.0,
            reason: format!("judge unavailable: {error}"),
            agrees: false,
            degraded: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    action: String,
    confidence: serde_json::Value,
    #[serde(default)]
    reason: String,
}

/// Parse a judge completion leniently.
///
/// The first balanced `{...}` block is parsed as strict JSON `{action, confidence, reason}`.
/// When that fails schema validation, `KEY: value` lines are parsed instead.
pub fn parse_response(text: &str) -> Result<JudgeResponse, JudgeError> {
    let json_error = match extract_json_block(text) {
        Some(block) => match parse_json(block) {
            Ok(response) => return Ok(response),
            Err(error) => error,
        },
        None => JudgeError::Validation(String::from("no JSON object in response")),
    };

    parse_lines(text).map_err(|line_error| {
        JudgeError::Validation(format!("{json_error}; fallback: {line_error}"))
    })
}

/// First balanced `{...}` block in `text`, ignoring braces inside JSON strings.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

fn parse_json(block: &str) -> Result<JudgeResponse, JudgeError> {
    let raw = serde_json::from_str::<RawResponse>(block)
        .map_err(|error| JudgeError::Validation(error.to_string()))?;

    let confidence = match &raw.confidence {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(string) => parse_confidence(string),
        _ => None,
    }
    .ok_or_else(|| JudgeError::Validation(format!("invalid confidence: {}", raw.confidence)))?;

    validated(raw.action.parse()?, confidence, raw.reason)
}

fn parse_confidence(value: &str) -> Option<f64> {
    value.trim().trim_end_matches('%').trim().parse().ok()
}

fn validated(action: JudgeAction, confidence: f64, reason: String) -> Result<JudgeResponse, JudgeError> {
    if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
        return Err(JudgeError::Validation(format!(
            "confidence {confidence} outside [0, 100]"
        )));
    }

    Ok(JudgeResponse {
        action,
        confidence,
        reason: reason.trim().to_owned(),
    })
}

fn parse_lines(text: &str) -> Result<JudgeResponse, JudgeError> {
    let (mut action, mut confidence, mut reason) = (None, None, None);

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key
            .trim()
            .trim_matches(|c: char| c == '"' || c == '*' || c == '-')
            .to_ascii_lowercase();
        let value = value.trim().trim_end_matches(',');

        match key.as_str() {
            "action" | "decision" => action = Some(value.parse::<JudgeAction>()?),
            "confidence" => confidence = parse_confidence(value.trim_matches('"')),
            "reason" | "reasoning" => reason = Some(value.trim_matches('"').to_owned()),
            _ => {}
        }
    }

    let action = action.ok_or_else(|| JudgeError::Validation(String::from("missing action")))?;
    let confidence =
        confidence.ok_or_else(|| JudgeError::Validation(String::from("missing confidence")))?;

    validated(action, confidence, reason.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        struct TestCase {
            input: &'static str,
            expected: Option<JudgeResponse>,
        }

        let response = |action, confidence, reason: &str| {
            Some(JudgeResponse {
                action,
                confidence,
                reason: reason.to_owned(),
            })
        };

        let cases = vec![
            // TC0: strict JSON
            TestCase {
                input: r#"{"action": "LONG", "confidence": 78, "reason": "clean breakout"}"#,
                expected: response(JudgeAction::Long, 78.0, "clean breakout"),
            },
            // TC1: JSON wrapped in prose & a code fence, braces inside the reason
            TestCase {
                input: "Sure!\n```json\n{\"action\": \"short\", \"confidence\": \"65%\", \"reason\": \"rejects {resistance}\"}\n```\nGood luck",
                expected: response(JudgeAction::Short, 65.0, "rejects {resistance}"),
            },
            // TC2: fallback line parser
            TestCase {
                input: "ACTION: HOLD\nCONFIDENCE: 40\nREASON: choppy tape",
                expected: response(JudgeAction::Hold, 40.0, "choppy tape"),
            },
            // TC3: JSON out of range then no usable lines
            TestCase {
                input: r#"{"action": "LONG", "confidence": 140, "reason": "x"}"#,
                expected: None,
            },
            // TC4: unknown action
            TestCase {
                input: r#"{"action": "MAYBE", "confidence": 50, "reason": "x"}"#,
                expected: None,
            },
            // TC5: garbage
            TestCase {
                input: "I cannot help with that",
                expected: None,
            },
            // TC6: schema failure in JSON falls back to lines
            TestCase {
                input: "{\"verdict\": \"yes\"}\naction: close\nconfidence: 85\nreason: momentum fading",
                expected: response(JudgeAction::Close, 85.0, "momentum fading"),
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = parse_response(test.input).ok();
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_extract_json_block() {
        assert_eq!(extract_json_block("a {\"b\": {\"c\": 1}} d"), Some("{\"b\": {\"c\": 1}}"));
        assert_eq!(extract_json_block("{ unbalanced"), None);
        assert_eq!(extract_json_block("no braces"), None);
    }

    #[test]
    fn test_degraded_never_agrees() {
        let verdict = Verdict::degraded(&JudgeError::CircuitOpen);
        assert!(!verdict.agrees);
        assert!(verdict.degraded);
        assert_eq!(verdict.action, JudgeAction::Hold);
    }
}
