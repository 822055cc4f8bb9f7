//! Deterministic, regex-based extraction.
//!
//! Recognizes the phrasing procurement requests and vendor replies commonly
//! use ("budget of $50,000", "delivery within 3 weeks", "2 year warranty",
//! "net 30"). Anything it does not recognize is left out of the object, so
//! the normalizer records it as absent. The same text always yields the
//! same object.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use procura_core::error::CoreError;
use procura_core::requirements::{Measure, Requirements};

use super::ExtractionCapability;

/// Titles longer than this are cut at a word boundary.
const TITLE_WORDS: usize = 12;

const AMOUNT: &str = r"(?:usd|eur|gbp)?\s*[$€£]?\s*\d[\d,]*(?:\.\d+)?(?:\s*(?:k|m|thousand|million)\b)?";

const DURATION: &str = r"\d+(?:\.\d+)?(?:\s*(?:-|–|to)\s*\d+(?:\.\d+)?)?\s*(?:business\s+|working\s+|calendar\s+)?(?:days?|weeks?|months?|years?)";

static BUDGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:budget|spend|up to|not to exceed|maximum of)\b[^0-9$€£\n]{{0,30}}({AMOUNT})"
    ))
    .expect("valid regex")
});

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:total|price|cost|quote|quoted|amount|offer)\b[^0-9$€£\n]{{0,30}}({AMOUNT}(?:\s*(?:-|–|to)\s*{AMOUNT})?)"
    ))
    .expect("valid regex")
});

static CURRENCY_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:[$€£]\s*\d[\d,]*(?:\.\d+)?(?:\s*(?:k|m)\b)?|\b(?:usd|eur|gbp)\s*\d[\d,]*(?:\.\d+)?)")
        .expect("valid regex")
});

static DEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:deadline|due|by|before|no later than)\b\D{0,20}(\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2})?(?:Z|[+-]\d{2}:\d{2})?)?)")
        .expect("valid regex")
});

static DELIVERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:deliver\w*|lead time|ship\w*|turnaround)\b[^.\n]{{0,40}}?({DURATION})"
    ))
    .expect("valid regex")
});

static WARRANTY_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)({DURATION})\s+(?:of\s+)?(?:\w+\s+)?warranty"))
        .expect("valid regex")
});

static WARRANTY_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bwarranty\b[^.\n]{{0,30}}?({DURATION})")).expect("valid regex")
});

static NET_TERMS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bnet[\s-]*(\d{1,3})\b").expect("valid regex"));

static PAYMENT_TERMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpayment(?:\s+terms?)?\s*(?::|are|is|of)\s*([^.\n]{2,80})").expect("valid regex")
});

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\s(])(\d{1,6})\s+(?:x\s+)?([a-z][a-z\-]{2,})").expect("valid regex")
});

static ITEM_SPEC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s+(?:with|having)\s+([^,.;\n]+?)(?:\s+and\s+\d|[,.;\n]|$)").expect("valid regex")
});

static CONDITIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:note|notes|conditions?|special conditions?)\s*:\s*(.+)$")
        .expect("valid regex")
});

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?\n]").expect("valid regex"));

/// Words that follow a number without naming a purchasable item.
const NON_ITEM_WORDS: &[&str] = &[
    "day", "days", "week", "weeks", "month", "months", "year", "years", "business", "working",
    "calendar", "thousand", "million", "dollars", "usd", "eur", "gbp", "percent", "hours",
    "minutes", "units", "pcs", "pieces",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleCapability;

impl RuleCapability {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtractionCapability for RuleCapability {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn extract_rfp(&self, text: &str) -> Result<Value, CoreError> {
        Ok(rfp_object(text))
    }

    async fn extract_proposal(
        &self,
        text: &str,
        requirements: &Requirements,
    ) -> Result<Value, CoreError> {
        Ok(proposal_object(text, requirements))
    }
}

fn rfp_object(text: &str) -> Value {
    let mut raw = Map::new();
    let mut req = Map::new();

    if let Some(title) = title_of(text) {
        raw.insert("title".into(), json!(title));
    }
    let description = text.trim();
    if !description.is_empty() {
        raw.insert("description".into(), json!(description));
    }
    if let Some(budget) = first_capture(&BUDGET_RE, text) {
        raw.insert("budget".into(), json!(budget));
    }
    if let Some(deadline) = first_capture(&DEADLINE_RE, text) {
        raw.insert("deadline".into(), json!(deadline));
    }

    let items = line_items(text);
    if !items.is_empty() {
        req.insert("items".into(), Value::Array(items));
    }
    if let Some(delivery) = first_capture(&DELIVERY_RE, text) {
        req.insert("delivery_timeline".into(), json!(delivery));
    }
    if let Some(warranty) = warranty_of(text) {
        req.insert("warranty".into(), json!(warranty));
    }
    if let Some(terms) = payment_terms_of(text) {
        req.insert("payment_terms".into(), json!(terms));
    }
    raw.insert("requirements".into(), Value::Object(req));

    Value::Object(raw)
}

fn proposal_object(text: &str, requirements: &Requirements) -> Value {
    let mut raw = Map::new();

    let price = first_capture(&PRICE_RE, text).or_else(|| {
        CURRENCY_AMOUNT_RE
            .find(text)
            .map(|m| m.as_str().trim().to_string())
    });
    if let Some(price) = price {
        if let Some(currency) = currency_of(&price) {
            raw.insert("price_currency".into(), json!(currency));
        }
        raw.insert("price".into(), json!(price));
    }
    if let Some(delivery) = first_capture(&DELIVERY_RE, text) {
        raw.insert("delivery_time".into(), json!(delivery));
    }
    if let Some(warranty) = warranty_of(text) {
        raw.insert("warranty".into(), json!(warranty));
    }
    if let Some(terms) = payment_terms_of(text) {
        raw.insert("payment_terms".into(), json!(terms));
    }

    let specs = specifications_of(text, requirements);
    if !specs.is_empty() {
        raw.insert("specifications".into(), Value::Object(specs));
    }
    if let Some(conditions) = first_capture(&CONDITIONS_RE, text) {
        raw.insert("special_conditions".into(), json!(conditions));
    }

    Value::Object(raw)
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First sentence, capped at [`TITLE_WORDS`] words.
fn title_of(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let first = match SENTENCE_END_RE.find(trimmed) {
        Some(m) => &trimmed[..m.start()],
        None => trimmed,
    };
    let words: Vec<&str> = first.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let mut title = words[..words.len().min(TITLE_WORDS)].join(" ");
    if words.len() > TITLE_WORDS {
        title.push_str("...");
    }
    Some(title)
}

fn warranty_of(text: &str) -> Option<String> {
    first_capture(&WARRANTY_BEFORE_RE, text).or_else(|| first_capture(&WARRANTY_AFTER_RE, text))
}

fn payment_terms_of(text: &str) -> Option<String> {
    if let Some(days) = first_capture(&NET_TERMS_RE, text) {
        return Some(format!("net {days}"));
    }
    first_capture(&PAYMENT_TERMS_RE, text)
}

fn currency_of(amount: &str) -> Option<&'static str> {
    let lower = amount.to_lowercase();
    if lower.contains('$') || lower.contains("usd") {
        Some("USD")
    } else if lower.contains('€') || lower.contains("eur") {
        Some("EUR")
    } else if lower.contains('£') || lower.contains("gbp") {
        Some("GBP")
    } else {
        None
    }
}

fn line_items(text: &str) -> Vec<Value> {
    let mut items = Vec::new();
    for caps in ITEM_RE.captures_iter(text) {
        let (Some(qty), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let noun = name.as_str().to_lowercase();
        if NON_ITEM_WORDS.contains(&noun.as_str()) {
            continue;
        }
        // Skip numbers that are part of an amount such as "$1,500 laptops".
        let before = &text[..qty.start()];
        if before.ends_with('$') || before.ends_with(',') || before.ends_with('.') {
            continue;
        }
        let Ok(quantity) = qty.as_str().parse::<u32>() else {
            continue;
        };
        let specifications = ITEM_SPEC_RE
            .captures(&text[name.end()..])
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());

        items.push(json!({
            "name": noun,
            "quantity": quantity,
            "specifications": specifications,
        }));
    }
    items
}

/// Look up `key: value` / `key value` for every specification criterion.
fn specifications_of(text: &str, requirements: &Requirements) -> Map<String, Value> {
    let mut specs = Map::new();
    for criterion in &requirements.criteria {
        let Measure::Specification { key, .. } = &criterion.measure else {
            continue;
        };
        let pattern = format!(r"(?i)\b{}\b\s*(?::|=|-|of|is)?\s*([^,.;\n]+)", regex::escape(key));
        let Ok(re) = Regex::new(&pattern) else {
            tracing::warn!(key = %key, "Skipping specification key that does not form a pattern");
            continue;
        };
        if let Some(value) = first_capture(&re, text) {
            specs.insert(key.clone(), json!(value));
        }
    }
    specs
}
