//! Structured extraction rules.
//!
//! An extraction capability (an LLM, or the rule-based fallback) returns a
//! loosely-shaped JSON object. The functions here turn that object into a
//! typed [`RfpDraft`] or [`ProposalFields`] plus a list of
//! [`ExtractionIssue`]s. Anything that cannot be derived stays `None`; a
//! value is never guessed or zero-filled.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::requirements::{validate_requirements, Criterion, LineItem, Measure, Requirements};
use crate::types::Timestamp;

/// Maximum title length kept from an extraction.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum accepted input length for a single extraction call.
pub const MAX_INPUT_LENGTH: usize = 100_000;

/// Days per month used when converting durations.
const DAYS_PER_MONTH: f64 = 30.0;

/// Days per year used when converting durations.
const DAYS_PER_YEAR: f64 = 365.0;

/// String values a model emits when it means "no value".
const NULL_WORDS: &[&str] = &["null", "none", "n/a", "na", "unknown", "not specified", "-"];

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Informational, e.g. a field absent from the source text.
    Info,
    /// A value was present but dropped or coerced.
    Warning,
    /// The extraction result cannot be used.
    Fatal,
}

/// A note about one field of an extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionIssue {
    pub field: String,
    pub severity: IssueSeverity,
    pub message: String,
}

impl ExtractionIssue {
    pub fn info(field: &str, message: impl Into<String>) -> Self {
        Self::new(field, IssueSeverity::Info, message)
    }

    pub fn warning(field: &str, message: impl Into<String>) -> Self {
        Self::new(field, IssueSeverity::Warning, message)
    }

    pub fn fatal(field: &str, message: impl Into<String>) -> Self {
        Self::new(field, IssueSeverity::Fatal, message)
    }

    fn new(field: &str, severity: IssueSeverity, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            severity,
            message: message.into(),
        }
    }
}

pub fn has_fatal(issues: &[ExtractionIssue]) -> bool {
    issues.iter().any(|i| i.severity == IssueSeverity::Fatal)
}

/// Reject empty, whitespace-only, or oversized input text.
pub fn validate_input_text(text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::InvalidInput(
            "Extraction input text must not be empty".to_string(),
        ));
    }
    if text.len() > MAX_INPUT_LENGTH {
        return Err(CoreError::InvalidInput(format!(
            "Extraction input exceeds maximum length of {MAX_INPUT_LENGTH} bytes"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// A structured RFP proposal produced by extraction; validated before commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfpDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Requirements,
    pub budget: Option<f64>,
    pub deadline: Option<Timestamp>,
}

impl RfpDraft {
    /// Names of the optional-or-mandatory fields that carry a value.
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.budget.is_some() {
            fields.push("budget");
        }
        if self.deadline.is_some() {
            fields.push("deadline");
        }
        if !self.requirements.items.is_empty() {
            fields.push("items");
        }
        if !self.requirements.criteria.is_empty() {
            fields.push("criteria");
        }
        fields
    }

    /// Mandatory fields the draft is missing.
    pub fn missing_mandatory(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.is_none() {
            missing.push("title");
        }
        if self.description.is_none() {
            missing.push("description");
        }
        missing
    }

    /// Fail with `IncompleteExtraction` (carrying this draft) when a
    /// mandatory field is missing.
    pub fn ensure_complete(&self) -> Result<(), CoreError> {
        let missing = self.missing_mandatory();
        if missing.is_empty() {
            return Ok(());
        }
        Err(CoreError::IncompleteExtraction {
            message: format!("could not derive: {}", missing.join(", ")),
            partial: serde_json::to_value(self).unwrap_or(Value::Null),
        })
    }

    /// Merge a fresh extraction over a previous one without losing any
    /// field the previous draft had. Values present in `next` win.
    pub fn merge_monotonic(prev: &RfpDraft, next: RfpDraft) -> RfpDraft {
        let items = if next.requirements.items.is_empty() {
            prev.requirements.items.clone()
        } else {
            next.requirements.items
        };

        let mut criteria = next.requirements.criteria;
        for old in &prev.requirements.criteria {
            let kept = criteria
                .iter()
                .any(|c| c.criterion.eq_ignore_ascii_case(&old.criterion));
            if !kept {
                criteria.push(old.clone());
            }
        }

        RfpDraft {
            title: next.title.or_else(|| prev.title.clone()),
            description: next.description.or_else(|| prev.description.clone()),
            requirements: Requirements { criteria, items },
            budget: next.budget.or(prev.budget),
            deadline: next.deadline.or(prev.deadline),
        }
    }
}

/// Structured fields extracted from a proposal body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalFields {
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub delivery_days: Option<f64>,
    pub warranty_months: Option<f64>,
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    pub special_conditions: Option<String>,
}

impl ProposalFields {
    /// Fill fields that are absent here from `other`; returns what was filled.
    pub fn fill_absent_from(&mut self, other: &ProposalFields) -> Vec<&'static str> {
        let mut filled = Vec::new();
        if self.price.is_none() && other.price.is_some() {
            self.price = other.price;
            filled.push("price");
        }
        if self.currency.is_none() && other.currency.is_some() {
            self.currency.clone_from(&other.currency);
            filled.push("currency");
        }
        if self.delivery_days.is_none() && other.delivery_days.is_some() {
            self.delivery_days = other.delivery_days;
            filled.push("delivery_time");
        }
        if self.warranty_months.is_none() && other.warranty_months.is_some() {
            self.warranty_months = other.warranty_months;
            filled.push("warranty");
        }
        if self.payment_terms.is_none() && other.payment_terms.is_some() {
            self.payment_terms.clone_from(&other.payment_terms);
            filled.push("payment_terms");
        }
        for (k, v) in &other.specifications {
            if !self.specifications.contains_key(k) {
                self.specifications.insert(k.clone(), v.clone());
                filled.push("specifications");
            }
        }
        filled.dedup();
        filled
    }
}

// ---------------------------------------------------------------------------
// Value parsing
// ---------------------------------------------------------------------------

static RANGE_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(k|m|thousand|million)?\s*(?:-|–|to)\s*(\d+(?:\.\d+)?)\s*(k|m|thousand|million)?\b")
        .expect("valid regex")
});

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(k|m|thousand|million)?\b").expect("valid regex")
});

static WORD_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(a|an|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+(day|week|month|year)")
        .expect("valid regex")
});

static RANGE_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:-|–|to)\s*(\d+(?:\.\d+)?)\s*(?:business\s+|working\s+|calendar\s+)?(days?|weeks?|wks?|months?|mos?|years?|yrs?)\b")
        .expect("valid regex")
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:business\s+|working\s+|calendar\s+)?(days?|weeks?|wks?|months?|mos?|years?|yrs?)?\b")
        .expect("valid regex")
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("valid regex"));

/// A parsed numeric value; `ranged` marks a range collapsed to its upper bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Parsed {
    pub value: f64,
    pub ranged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    fn from_token(token: &str) -> Option<Self> {
        let t = token.trim_end_matches('s');
        match t {
            "day" => Some(Self::Day),
            "week" | "wk" => Some(Self::Week),
            "month" | "mo" => Some(Self::Month),
            "year" | "yr" => Some(Self::Year),
            _ => None,
        }
    }

    fn in_days(self) -> f64 {
        match self {
            Self::Day => 1.0,
            Self::Week => 7.0,
            Self::Month => DAYS_PER_MONTH,
            Self::Year => DAYS_PER_YEAR,
        }
    }

    fn in_months(self) -> f64 {
        match self {
            Self::Day => 1.0 / DAYS_PER_MONTH,
            Self::Week => 7.0 / DAYS_PER_MONTH,
            Self::Month => 1.0,
            Self::Year => 12.0,
        }
    }
}

/// A parsed duration; `unit` is `None` for a bare number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedDuration {
    pub amount: f64,
    pub unit: Option<TimeUnit>,
    pub ranged: bool,
}

impl ParsedDuration {
    /// Duration in days; bare numbers are read as days.
    pub fn as_days(&self) -> f64 {
        self.amount * self.unit.unwrap_or(TimeUnit::Day).in_days()
    }

    /// Duration in months; bare numbers are read as months.
    pub fn as_months(&self) -> f64 {
        self.amount * self.unit.unwrap_or(TimeUnit::Month).in_months()
    }
}

fn multiplier(suffix: Option<regex::Match<'_>>) -> f64 {
    match suffix.map(|m| m.as_str()) {
        Some("k") | Some("thousand") => 1_000.0,
        Some("m") | Some("million") => 1_000_000.0,
        _ => 1.0,
    }
}

/// Parse a money amount such as `"$12,500"`, `"12.5k"` or `"USD 900"`.
///
/// Ranges resolve to their upper bound with `ranged = true`.
pub fn parse_amount(text: &str) -> Option<Parsed> {
    let cleaned = text.to_lowercase().replace(',', "");
    if let Some(caps) = RANGE_AMOUNT_RE.captures(&cleaned) {
        let low: f64 = caps[1].parse().ok()?;
        let high: f64 = caps[3].parse().ok()?;
        let low = low * multiplier(caps.get(2).or(caps.get(4)));
        let high = high * multiplier(caps.get(4));
        return Some(Parsed {
            value: low.max(high),
            ranged: true,
        });
    }
    let caps = AMOUNT_RE.captures(&cleaned)?;
    let value: f64 = caps[1].parse().ok()?;
    Some(Parsed {
        value: value * multiplier(caps.get(2)),
        ranged: false,
    })
}

fn word_to_number(word: &str) -> &'static str {
    match word {
        "a" | "an" | "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "ten" => "10",
        "eleven" => "11",
        _ => "12",
    }
}

/// Parse a duration such as `"30 days"`, `"2-3 weeks"`, `"one year"`.
pub fn parse_duration(text: &str) -> Option<ParsedDuration> {
    let lowered = text.to_lowercase();
    let normalized = WORD_NUMBER_RE.replace_all(&lowered, |caps: &regex::Captures<'_>| {
        format!("{} {}", word_to_number(&caps[1]), &caps[2])
    });

    if let Some(caps) = RANGE_DURATION_RE.captures(&normalized) {
        let low: f64 = caps[1].parse().ok()?;
        let high: f64 = caps[2].parse().ok()?;
        return Some(ParsedDuration {
            amount: low.max(high),
            unit: TimeUnit::from_token(&caps[3]),
            ranged: true,
        });
    }
    let caps = DURATION_RE.captures(&normalized)?;
    Some(ParsedDuration {
        amount: caps[1].parse().ok()?,
        unit: caps.get(2).and_then(|m| TimeUnit::from_token(m.as_str())),
        ranged: false,
    })
}

/// Parse a deadline from RFC 3339, `YYYY-MM-DDTHH:MM:SS`, or a bare
/// `YYYY-MM-DD` (midnight UTC) anywhere in the text.
pub fn parse_deadline(text: &str) -> Option<Timestamp> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    let caps = ISO_DATE_RE.captures(trimmed)?;
    let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// A non-empty string, treating model null-words as absent.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || NULL_WORDS.contains(&trimmed.to_lowercase().as_str()) {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn amount_field(
    raw: &Value,
    keys: &[&str],
    field: &str,
    issues: &mut Vec<ExtractionIssue>,
) -> Option<f64> {
    let Some(value) = first_present(raw, keys) else {
        issues.push(ExtractionIssue::info(field, "not present in source"));
        return None;
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|v| Parsed { value: v, ranged: false }),
        other => text_of(other).and_then(|s| parse_amount(&s)),
    };
    match parsed {
        Some(p) if p.value.is_finite() && p.value >= 0.0 => {
            if p.ranged {
                issues.push(ExtractionIssue::warning(
                    field,
                    format!("range collapsed to upper bound {}", p.value),
                ));
            }
            Some(p.value)
        }
        Some(p) => {
            issues.push(ExtractionIssue::warning(
                field,
                format!("dropped invalid amount {}", p.value),
            ));
            None
        }
        None => {
            if text_of(value).is_some() {
                issues.push(ExtractionIssue::warning(
                    field,
                    format!("could not read an amount from {value}"),
                ));
            } else {
                issues.push(ExtractionIssue::info(field, "not present in source"));
            }
            None
        }
    }
}

fn duration_field(
    raw: &Value,
    keys: &[&str],
    field: &str,
    as_months: bool,
    issues: &mut Vec<ExtractionIssue>,
) -> Option<f64> {
    let Some(value) = first_present(raw, keys) else {
        issues.push(ExtractionIssue::info(field, "not present in source"));
        return None;
    };
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|amount| ParsedDuration {
            amount,
            unit: None,
            ranged: false,
        }),
        other => text_of(other).and_then(|s| parse_duration(&s)),
    };
    match parsed {
        Some(d) if d.amount.is_finite() && d.amount >= 0.0 => {
            if d.ranged {
                issues.push(ExtractionIssue::warning(
                    field,
                    "range collapsed to upper bound",
                ));
            }
            Some(if as_months { d.as_months() } else { d.as_days() })
        }
        _ => {
            if text_of(value).is_some() {
                issues.push(ExtractionIssue::warning(
                    field,
                    format!("could not read a duration from {value}"),
                ));
            } else {
                issues.push(ExtractionIssue::info(field, "not present in source"));
            }
            None
        }
    }
}

fn reject_non_object(raw: &Value, issues: &mut Vec<ExtractionIssue>) -> bool {
    if raw.is_object() {
        return false;
    }
    issues.push(ExtractionIssue::fatal(
        "payload",
        format!("extraction returned a non-object payload ({})", kind_of(raw)),
    ));
    true
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// RFP normalization
// ---------------------------------------------------------------------------

/// Normalize a raw RFP extraction into a typed draft.
///
/// Does not enforce mandatory fields; call [`RfpDraft::ensure_complete`].
pub fn normalize_rfp(raw: &Value) -> (RfpDraft, Vec<ExtractionIssue>) {
    let mut issues = Vec::new();
    let mut draft = RfpDraft::default();
    if reject_non_object(raw, &mut issues) {
        return (draft, issues);
    }

    draft.title = raw.get("title").and_then(text_of).map(|t| {
        if t.chars().count() > MAX_TITLE_LENGTH {
            issues.push(ExtractionIssue::warning(
                "title",
                format!("truncated to {MAX_TITLE_LENGTH} characters"),
            ));
            t.chars().take(MAX_TITLE_LENGTH).collect()
        } else {
            t
        }
    });
    if draft.title.is_none() {
        issues.push(ExtractionIssue::warning("title", "not derived"));
    }

    draft.description = raw.get("description").and_then(text_of);
    if draft.description.is_none() {
        issues.push(ExtractionIssue::warning("description", "not derived"));
    }

    draft.budget = amount_field(raw, &["budget"], "budget", &mut issues);

    draft.deadline = match raw.get("deadline").and_then(text_of) {
        Some(s) => {
            let parsed = parse_deadline(&s);
            if parsed.is_none() {
                issues.push(ExtractionIssue::warning(
                    "deadline",
                    format!("could not read a date from '{s}'"),
                ));
            }
            parsed
        }
        None => {
            issues.push(ExtractionIssue::info("deadline", "not present in source"));
            None
        }
    };

    let empty = Value::Object(Default::default());
    let req = raw.get("requirements").filter(|v| v.is_object()).unwrap_or(&empty);

    draft.requirements.items = normalize_items(req.get("items"), &mut issues);
    draft.requirements.criteria = explicit_criteria(req.get("criteria"), &mut issues);

    if draft.requirements.criteria.is_empty() {
        draft.requirements.criteria = derive_criteria(req, draft.budget, &mut issues);
    }

    if let Err(e) = validate_requirements(&draft.requirements) {
        issues.push(ExtractionIssue::warning(
            "criteria",
            format!("discarded invalid criteria: {e}"),
        ));
        draft.requirements.criteria = derive_criteria(req, draft.budget, &mut issues);
    }

    (draft, issues)
}

fn normalize_items(value: Option<&Value>, issues: &mut Vec<ExtractionIssue>) -> Vec<LineItem> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(name) = entry.get("name").and_then(text_of) else {
            issues.push(ExtractionIssue::warning("items", "dropped item without a name"));
            continue;
        };
        let quantity = entry.get("quantity").and_then(|q| match q {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            other => text_of(other)
                .and_then(|s| parse_amount(&s))
                .filter(|p| p.value >= 0.0 && p.value <= f64::from(u32::MAX))
                .map(|p| p.value as u32),
        });
        let specifications = entry.get("specifications").and_then(|s| match s {
            Value::Object(_) | Value::Array(_) => Some(s.to_string()),
            other => text_of(other),
        });
        items.push(LineItem {
            name,
            quantity,
            specifications,
        });
    }
    items
}

fn explicit_criteria(value: Option<&Value>, issues: &mut Vec<ExtractionIssue>) -> Vec<Criterion> {
    let Some(Value::Array(entries)) = value else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<Criterion>(entry.clone()) {
            Ok(c) => Some(c),
            Err(e) => {
                issues.push(ExtractionIssue::warning(
                    "criteria",
                    format!("dropped malformed criterion: {e}"),
                ));
                None
            }
        })
        .collect()
}

/// Default criteria for an RFP whose extraction named none: price and
/// delivery always, warranty and payment terms when the source states them.
fn derive_criteria(
    req: &Value,
    budget: Option<f64>,
    issues: &mut Vec<ExtractionIssue>,
) -> Vec<Criterion> {
    let mut scratch = Vec::new();
    let max_days = duration_field(
        req,
        &["delivery_timeline", "delivery_time"],
        "delivery_timeline",
        false,
        &mut scratch,
    );
    let min_months = duration_field(req, &["warranty"], "warranty", true, &mut scratch);
    let payment_terms = req.get("payment_terms").and_then(text_of);

    let mut criteria = vec![
        Criterion::new("price", None, Measure::Price { ceiling: budget }),
        Criterion::new("delivery_time", None, Measure::DeliveryTime { max_days }),
    ];
    if min_months.is_some() {
        criteria.push(Criterion::new(
            "warranty",
            None,
            Measure::Warranty { min_months },
        ));
    }
    if let Some(expected) = payment_terms {
        criteria.push(Criterion::new(
            "payment_terms",
            None,
            Measure::PaymentTerms { expected },
        ));
    }
    issues.push(ExtractionIssue::info(
        "criteria",
        format!("derived {} default criteria with equal weights", criteria.len()),
    ));
    criteria
}

// ---------------------------------------------------------------------------
// Proposal normalization
// ---------------------------------------------------------------------------

/// Normalize a raw proposal extraction into typed fields.
pub fn normalize_proposal(raw: &Value) -> (ProposalFields, Vec<ExtractionIssue>) {
    let mut issues = Vec::new();
    let mut fields = ProposalFields::default();
    if reject_non_object(raw, &mut issues) {
        return (fields, issues);
    }

    fields.price = amount_field(raw, &["price", "total_price", "cost"], "price", &mut issues);
    fields.currency = first_present(raw, &["price_currency", "currency"])
        .and_then(text_of)
        .map(|c| c.to_uppercase());
    fields.delivery_days = duration_field(
        raw,
        &["delivery_days", "delivery_time"],
        "delivery_time",
        false,
        &mut issues,
    );
    fields.warranty_months = duration_field(
        raw,
        &["warranty_months", "warranty"],
        "warranty",
        true,
        &mut issues,
    );
    fields.payment_terms = raw.get("payment_terms").and_then(text_of);
    if fields.payment_terms.is_none() {
        issues.push(ExtractionIssue::info("payment_terms", "not present in source"));
    }
    if let Some(Value::Object(specs)) = raw.get("specifications") {
        for (k, v) in specs {
            let rendered = match v {
                Value::Object(_) | Value::Array(_) => Some(v.to_string()),
                other => text_of(other),
            };
            if let Some(rendered) = rendered {
                fields.specifications.insert(k.clone(), rendered);
            }
        }
    }
    fields.special_conditions = raw.get("special_conditions").and_then(text_of);

    (fields, issues)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;

    #[test]
    fn amounts_in_common_formats() {
        assert_eq!(parse_amount("$12,500").unwrap().value, 12_500.0);
        assert_eq!(parse_amount("12.5k").unwrap().value, 12_500.0);
        assert_eq!(parse_amount("USD 900").unwrap().value, 900.0);
        assert_eq!(parse_amount("1.2 million").unwrap().value, 1_200_000.0);
        assert!(parse_amount("call us").is_none());
    }

    #[test]
    fn amount_range_takes_upper_bound() {
        let parsed = parse_amount("$1,000 - $1,200").unwrap();
        assert_eq!(parsed.value, 1_200.0);
        assert!(parsed.ranged);
    }

    #[test]
    fn durations_convert_to_days_and_months() {
        assert_eq!(parse_duration("30 days").unwrap().as_days(), 30.0);
        assert_eq!(parse_duration("2 weeks").unwrap().as_days(), 14.0);
        assert_eq!(parse_duration("one year").unwrap().as_months(), 12.0);
        assert_eq!(parse_duration("24 months").unwrap().as_months(), 24.0);
        assert_eq!(parse_duration("90 days").unwrap().as_months(), 3.0);
        assert_eq!(parse_duration("10 business days").unwrap().as_days(), 10.0);
    }

    #[test]
    fn duration_range_takes_upper_bound() {
        let d = parse_duration("3-4 weeks").unwrap();
        assert_eq!(d.as_days(), 28.0);
        assert!(d.ranged);
    }

    #[test]
    fn bare_duration_number_uses_caller_unit() {
        let d = parse_duration("45").unwrap();
        assert_eq!(d.as_days(), 45.0);
        assert_eq!(d.as_months(), 45.0);
    }

    #[test]
    fn deadlines_in_supported_formats() {
        let d = parse_deadline("2026-02-15").unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2026, 2, 15, 0));
        assert!(parse_deadline("2026-02-15T10:30:00Z").is_some());
        assert!(parse_deadline("2026-02-15T10:30:00").is_some());
        assert!(parse_deadline("deliver by 2026-03-01 please").is_some());
        assert!(parse_deadline("next month").is_none());
    }

    #[test]
    fn empty_text_is_invalid_input() {
        assert_matches!(validate_input_text("   \n"), Err(CoreError::InvalidInput(_)));
        assert!(validate_input_text("need 50 laptops").is_ok());
    }

    #[test]
    fn normalize_rfp_reads_model_shape() {
        let raw = json!({
            "title": "Laptop refresh",
            "description": "50 laptops for the sales team",
            "requirements": {
                "items": [{"name": "laptop", "quantity": 50, "specifications": "16GB RAM"}],
                "delivery_timeline": "30 days",
                "payment_terms": "net 30",
                "warranty": "1 year"
            },
            "budget": "$100,000",
            "deadline": "2026-02-15"
        });
        let (draft, issues) = normalize_rfp(&raw);

        assert!(!has_fatal(&issues));
        assert_eq!(draft.title.as_deref(), Some("Laptop refresh"));
        assert_eq!(draft.budget, Some(100_000.0));
        assert!(draft.deadline.is_some());
        assert_eq!(draft.requirements.items.len(), 1);
        assert_eq!(draft.requirements.items[0].quantity, Some(50));

        let names: Vec<_> = draft
            .requirements
            .criteria
            .iter()
            .map(|c| c.criterion.as_str())
            .collect();
        assert_eq!(names, ["price", "delivery_time", "warranty", "payment_terms"]);
        assert_eq!(
            draft.requirements.criteria[0].measure,
            Measure::Price { ceiling: Some(100_000.0) }
        );
        assert_eq!(
            draft.requirements.criteria[1].measure,
            Measure::DeliveryTime { max_days: Some(30.0) }
        );
    }

    #[test]
    fn normalize_rfp_leaves_unknown_fields_absent() {
        let (draft, issues) = normalize_rfp(&json!({
            "title": "Chairs",
            "description": "Office chairs",
            "budget": "null",
            "deadline": "soon"
        }));
        assert!(draft.budget.is_none());
        assert!(draft.deadline.is_none());
        assert!(issues
            .iter()
            .any(|i| i.field == "deadline" && i.severity == IssueSeverity::Warning));
    }

    #[test]
    fn normalize_rfp_rejects_non_object() {
        let (draft, issues) = normalize_rfp(&json!("just text"));
        assert!(has_fatal(&issues));
        assert_eq!(draft, RfpDraft::default());
    }

    #[test]
    fn incomplete_draft_carries_partial() {
        let draft = RfpDraft {
            description: Some("desc".into()),
            ..Default::default()
        };
        match draft.ensure_complete() {
            Err(CoreError::IncompleteExtraction { message, partial }) => {
                assert!(message.contains("title"));
                assert_eq!(partial["description"], "desc");
            }
            other => panic!("expected IncompleteExtraction, got {other:?}"),
        }
    }

    #[test]
    fn monotonic_merge_keeps_previous_fields() {
        let prev = RfpDraft {
            title: Some("Old".into()),
            description: Some("desc".into()),
            budget: Some(500.0),
            deadline: parse_deadline("2026-01-01"),
            requirements: Requirements {
                criteria: vec![Criterion::new("warranty", None, Measure::Warranty { min_months: None })],
                items: vec![],
            },
        };
        let next = RfpDraft {
            title: Some("New".into()),
            requirements: Requirements {
                criteria: vec![Criterion::new("price", None, Measure::Price { ceiling: None })],
                items: vec![],
            },
            ..Default::default()
        };
        let merged = RfpDraft::merge_monotonic(&prev, next);

        assert_eq!(merged.title.as_deref(), Some("New"));
        assert_eq!(merged.description.as_deref(), Some("desc"));
        assert_eq!(merged.budget, Some(500.0));
        assert!(merged.deadline.is_some());
        for field in prev.present_fields() {
            assert!(merged.present_fields().contains(&field), "lost {field}");
        }
        assert_eq!(merged.requirements.criteria.len(), 2);
    }

    #[test]
    fn normalize_proposal_reads_fields() {
        let (fields, issues) = normalize_proposal(&json!({
            "price": 1000,
            "price_currency": "usd",
            "delivery_time": "10 days",
            "warranty": "2 years",
            "payment_terms": "Net 30",
            "specifications": {"ram": "16GB", "ports": ["usb-c"]}
        }));
        assert!(!has_fatal(&issues));
        assert_eq!(fields.price, Some(1000.0));
        assert_eq!(fields.currency.as_deref(), Some("USD"));
        assert_eq!(fields.delivery_days, Some(10.0));
        assert_eq!(fields.warranty_months, Some(24.0));
        assert_eq!(fields.payment_terms.as_deref(), Some("Net 30"));
        assert_eq!(fields.specifications["ram"], "16GB");
        assert_eq!(fields.specifications["ports"], "[\"usb-c\"]");
    }

    #[test]
    fn unrecognized_proposal_fields_stay_absent_not_zero() {
        let (fields, issues) = normalize_proposal(&json!({
            "price": "to be discussed",
            "delivery_time": null
        }));
        assert!(!has_fatal(&issues));
        assert_eq!(fields.price, None);
        assert_eq!(fields.delivery_days, None);
        assert_eq!(fields.warranty_months, None);
        assert!(issues
            .iter()
            .any(|i| i.field == "price" && i.severity == IssueSeverity::Warning));
    }

    #[test]
    fn negative_price_is_dropped() {
        let (fields, issues) = normalize_proposal(&json!({"price": -10}));
        assert_eq!(fields.price, None);
        assert!(issues.iter().any(|i| i.message.contains("invalid amount")));
    }

    #[test]
    fn fill_absent_reports_filled_fields() {
        let mut primary = ProposalFields {
            price: Some(10.0),
            ..Default::default()
        };
        let fallback = ProposalFields {
            price: Some(99.0),
            delivery_days: Some(5.0),
            ..Default::default()
        };
        let filled = primary.fill_absent_from(&fallback);
        assert_eq!(filled, vec!["delivery_time"]);
        assert_eq!(primary.price, Some(10.0));
        assert_eq!(primary.delivery_days, Some(5.0));
    }
}
