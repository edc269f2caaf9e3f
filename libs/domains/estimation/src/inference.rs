//! Attribute Inference Engine
//!
//! Maps an open-ended declaration attribute map onto the four cost-relevant
//! fields of a [`Resource`]: size, region, quantity and tags. There is no
//! per-type schema; every field is found by name patterns and value-shape
//! heuristics, each ranked by priority.
//!
//! All functions here are pure. They never fail: when no signal exists they
//! return the documented default (empty size/region, quantity 1, no tags).
//!
//! Attribute maps are [`Attributes`] (a `BTreeMap`), so every pass walks the
//! attributes in lexicographic name order and ties are broken the same way on
//! every run.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use crate::models::{clamp_quantity, Attributes, Declaration, Resource};

/// Name patterns for size fields, highest priority first.
///
/// A pattern matches an attribute whose name equals it or ends with it.
pub const SIZE_PATTERNS: &[(&str, u32)] = &[
    ("instance_type", 100),
    ("_type", 90),
    ("machine_type", 85),
    ("size", 80),
    ("instance_class", 75),
    ("_class", 70),
    ("_tier", 65),
    ("_size", 60),
    ("node_type", 55),
    ("bundle_id", 50),
    ("sku_name", 45),
    ("flavor", 40),
];

/// Priority of a SKU-shaped value whose attribute name hints at a size
pub const HINTED_SHAPE_PRIORITY: u32 = 75;

/// Priority of a SKU-shaped value found under an unrelated attribute name
pub const UNHINTED_SHAPE_PRIORITY: u32 = 30;

const SIZE_NAME_HINTS: &[&str] = &["instance", "type", "size", "class"];

const SIZE_WORDS: &[&str] = &["nano", "micro", "small", "medium", "large", "xlarge", "2xlarge"];

const REGION_FIELDS: &[&str] = &["region", "location", "zone", "availability_zone"];

const REGION_NAME_HINTS: &[&str] = &["region", "location", "zone"];

const WELL_KNOWN_REGIONS: &[&str] = &[
    "eastus",
    "eastus2",
    "westus",
    "westus2",
    "centralus",
    "northeurope",
    "westeurope",
    "eastasia",
    "southeastasia",
    "australiaeast",
];

/// A size candidate seen during inference of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCandidate<'a> {
    pub value: &'a str,
    /// Attribute the winning sighting came from
    pub source: &'a str,
    pub priority: u32,
}

impl AttributeCandidate<'_> {
    /// Ranking order: priority descending, then source name, then value
    fn rank(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.source.cmp(other.source))
            .then_with(|| self.value.cmp(other.value))
    }
}

/// Build a [`Resource`] from a declaration by running every inference
pub fn enrich(declaration: &Declaration) -> Resource {
    let attrs = &declaration.attributes;
    let mut resource = Resource::new(&declaration.resource_type, &declaration.name);

    let size = infer_size(&declaration.resource_type, attrs);
    if !size.is_empty() {
        resource.size = Some(size);
    }

    let region = infer_region(&declaration.resource_type, attrs);
    if !region.is_empty() {
        resource.region = Some(region);
    }

    resource.quantity = clamp_quantity(infer_quantity(attrs));
    resource.tags = extract_tags(attrs);
    resource.properties = attrs.clone();

    trace!(
        id = %resource.id,
        size = ?resource.size,
        region = ?resource.region,
        quantity = resource.quantity,
        "Enriched declaration"
    );

    resource
}

/// Infer the SKU / instance-class string. Empty when nothing qualifies.
pub fn infer_size(_resource_type: &str, attrs: &Attributes) -> String {
    size_candidates(attrs)
        .into_iter()
        .min_by(|a, b| a.rank(b))
        .map(|c| c.value.to_string())
        .unwrap_or_default()
}

/// Collect every size candidate, deduplicated by value.
///
/// Returned in ranking order (best first).
pub fn size_candidates(attrs: &Attributes) -> Vec<AttributeCandidate<'_>> {
    let mut candidates: Vec<AttributeCandidate<'_>> = Vec::new();
    let mut matched: BTreeSet<&str> = BTreeSet::new();

    // Pass 1: attribute names matching a known size pattern
    for (name, value) in attrs {
        let Some(text) = non_empty_str(value.as_str()) else {
            continue;
        };
        let best = SIZE_PATTERNS
            .iter()
            .filter(|(pattern, _)| name == pattern || name.ends_with(pattern))
            .map(|(_, priority)| *priority)
            .max();

        if let Some(priority) = best {
            record_candidate(&mut candidates, text, name, priority);
            matched.insert(name.as_str());
        }
    }

    // Pass 2: remaining string values shaped like a SKU
    for (name, value) in attrs {
        if matched.contains(name.as_str()) {
            continue;
        }
        let Some(text) = non_empty_str(value.as_str()) else {
            continue;
        };
        if !looks_like_instance_type(text) {
            continue;
        }

        let lower = name.to_ascii_lowercase();
        let priority = if SIZE_NAME_HINTS.iter().any(|hint| lower.contains(hint)) {
            HINTED_SHAPE_PRIORITY
        } else {
            UNHINTED_SHAPE_PRIORITY
        };
        record_candidate(&mut candidates, text, name, priority);
    }

    candidates.sort_by(|a, b| a.rank(b));
    candidates
}

fn record_candidate<'a>(
    candidates: &mut Vec<AttributeCandidate<'a>>,
    value: &'a str,
    source: &'a str,
    priority: u32,
) {
    match candidates.iter_mut().find(|c| c.value == value) {
        Some(existing) => {
            let better = priority > existing.priority
                || (priority == existing.priority && source < existing.source);
            if better {
                existing.priority = priority;
                existing.source = source;
            }
        }
        None => candidates.push(AttributeCandidate {
            value,
            source,
            priority,
        }),
    }
}

/// Whether a value resembles a cloud SKU / instance type.
///
/// Recognized shapes: `t2.micro` (class with letters and digits, a dot, a
/// size), `Standard_D2s_v3`, `n1-standard-1` / `e2-medium` (first segment
/// with letters and digits), or anything ending in a size word.
pub fn looks_like_instance_type(value: &str) -> bool {
    if value.len() >= 4 && value.contains('.') {
        let mut parts = value.split('.');
        if let (Some(first), Some(_)) = (parts.next(), parts.next()) {
            if first.len() >= 2 && has_letter_and_digit(first) {
                return true;
            }
        }
    }

    if value.starts_with("Standard_") || value.starts_with("Basic_") {
        return true;
    }

    if value.contains('-') {
        let segments: Vec<&str> = value.split('-').collect();
        let well_formed = segments
            .iter()
            .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()));
        if segments.len() >= 2 && well_formed && has_letter_and_digit(segments[0]) {
            return true;
        }
    }

    let lower = value.to_ascii_lowercase();
    SIZE_WORDS.iter().any(|word| lower.ends_with(word))
}

/// Infer the region. Empty when nothing qualifies.
///
/// Phases, first hit wins: exact field names, names containing a region
/// keyword, then any value shaped like a region.
pub fn infer_region(_resource_type: &str, attrs: &Attributes) -> String {
    for field in REGION_FIELDS {
        if let Some(text) = attrs.get(*field).and_then(|v| non_empty_str(v.as_str())) {
            return text.to_string();
        }
    }

    for (name, value) in attrs {
        let lower = name.to_ascii_lowercase();
        if !REGION_NAME_HINTS.iter().any(|hint| lower.contains(hint)) {
            continue;
        }
        if let Some(text) = non_empty_str(value.as_str()) {
            return text.to_string();
        }
    }

    attrs
        .values()
        .filter_map(|v| non_empty_str(v.as_str()))
        .find(|text| looks_like_region(text))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Whether a value resembles a cloud region code.
///
/// Recognized shapes: `us-east-1` (2-letter code, name of 4+ chars, number),
/// a fixed list of short codes such as `eastus`, and `us-central1` /
/// `europe-west1` (two segments ending in a digit, first segment of length 2
/// or longer than 4).
pub fn looks_like_region(value: &str) -> bool {
    let segments: Vec<&str> = value.split('-').collect();

    if segments.len() == 3
        && segments[0].len() == 2
        && segments[0].chars().all(|c| c.is_ascii_alphabetic())
        && segments[1].len() >= 4
        && segments[2].parse::<u32>().is_ok()
    {
        return true;
    }

    if WELL_KNOWN_REGIONS
        .iter()
        .any(|region| value.eq_ignore_ascii_case(region))
    {
        return true;
    }

    segments.len() == 2
        && value.ends_with(|c: char| c.is_ascii_digit())
        && (segments[0].len() == 2 || segments[0].len() > 4)
}

/// Infer the instance count from a numeric `count` attribute (truncated).
///
/// Returns 1 when absent, non-numeric or not positive.
pub fn infer_quantity(attrs: &Attributes) -> i64 {
    attrs
        .get("count")
        .and_then(|v| v.as_f64())
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| (n.trunc() as i64).max(1))
        .unwrap_or(1)
}

/// Copy the string-valued entries of a `tags` mapping
pub fn extract_tags(attrs: &Attributes) -> BTreeMap<String, String> {
    attrs
        .get("tags")
        .and_then(|v| v.as_map())
        .map(|tags| {
            tags.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty_str(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn has_letter_and_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_alphabetic()) && s.chars().any(|c| c.is_ascii_digit())
}
