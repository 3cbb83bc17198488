//! Individual rubric checks. Each is a pure function of the profile and a
//! schema-compliant persona and returns a value in `[0, 1]`.

use std::sync::OnceLock;

use regex::Regex;

use crate::persona::GeneratedPersona;
use crate::profile::Profile;

const CAUSAL_MARKERS: [&str; 8] = [
    "왜냐하면",
    "따라서",
    "고려하여",
    "때문에",
    "분류",
    "because",
    "due to",
    "considering",
];
const CLASSIFICATION_MARKERS: [&str; 4] = ["must_avoid", "preferred", "제약", "선호"];
const ROLE_MARKERS: [&str; 7] = ["당신은", "You are", "토론", "discussion", "role", "참여", "역할"];
const REFUSAL_MARKERS: [&str; 6] = ["절대", "안 됨", "못 먹", "allerg", "never", "cannot"];
const NEGOTIATION_MARKERS: [&str; 6] = ["협의", "가능", "선호", "prefer", "negotiab", "조율"];

const MIN_REASONING_CHARS: usize = 50;

fn strong_negative() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(절대|안\s*됨|불가|금지|NO|안돼|never|forbidden)").unwrap())
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        hits as f64 / total as f64
    }
}

/// Share of non-empty profile fields echoed somewhere in the persona.
pub(crate) fn field_coverage(profile: &Profile, persona: &GeneratedPersona) -> f64 {
    let must_avoid = persona.must_avoid_text();
    let preferred = persona.preferred_text();
    let prompt = persona.persona_prompt.as_str();

    let fields: [(&[String], Vec<&str>); 4] = [
        (profile.allergies.as_slice(), vec![must_avoid.as_str()]),
        (profile.preferred_food_categories.as_slice(), vec![preferred.as_str()]),
        (profile.preferred_ingredients.as_slice(), vec![preferred.as_str()]),
        (
            profile.extra_text.as_slice(),
            vec![must_avoid.as_str(), preferred.as_str()],
        ),
    ];

    let mut applicable = 0;
    let mut covered = 0;
    for (items, targets) in fields {
        if items.is_empty() {
            continue;
        }
        applicable += 1;
        let reflected = items.iter().any(|item| {
            targets.iter().any(|target| target.contains(item.as_str()))
                || prompt.contains(item.as_str())
        });
        if reflected {
            covered += 1;
        }
    }
    ratio(covered, applicable)
}

/// Allergies must land in `must_avoid`, preferences in `preferred`.
pub(crate) fn classification_accuracy(profile: &Profile, persona: &GeneratedPersona) -> f64 {
    let allergies = profile.allergies.iter().map(|a| persona.avoids(a));
    let preferences = profile.preferences().map(|p| persona.prefers(p));
    let checks: Vec<bool> = allergies.chain(preferences).collect();
    ratio(checks.iter().filter(|ok| **ok).count(), checks.len())
}

pub(crate) fn reasoning_depth(persona: &GeneratedPersona) -> f64 {
    let reasoning = persona.reasoning.as_str();
    let mut depth = 0.0;
    if reasoning.chars().count() >= MIN_REASONING_CHARS {
        depth += 0.3;
    }
    if contains_any(reasoning, &CAUSAL_MARKERS) {
        depth += 0.3;
    }
    if contains_any(reasoning, &CLASSIFICATION_MARKERS) {
        depth += 0.4;
    }
    f64::min(depth, 1.0)
}

/// Whether the persona prompt is usable as-is by a discussion agent.
pub(crate) fn discussion_readiness(persona: &GeneratedPersona) -> f64 {
    let prompt = persona.persona_prompt.as_str();
    let mut readiness = 0.0;
    if contains_any(prompt, &ROLE_MARKERS) {
        readiness += 0.3;
    }
    if persona.must_avoid.is_empty() || contains_any(prompt, &REFUSAL_MARKERS) {
        readiness += 0.3;
    }
    if persona.preferred.is_empty() || contains_any(prompt, &NEGOTIATION_MARKERS) {
        readiness += 0.4;
    }
    f64::min(readiness, 1.0)
}

pub(crate) fn specificity(profile: &Profile, persona: &GeneratedPersona) -> f64 {
    let mut checks = 0;
    let mut hits = 0;

    let keywords: Vec<&String> = profile.keywords().collect();
    if !keywords.is_empty() {
        checks += 1;
        let must_avoid = persona.must_avoid_text();
        let preferred = persona.preferred_text();
        let found = keywords
            .iter()
            .filter(|k| {
                persona.persona_prompt.contains(k.as_str())
                    || must_avoid.contains(k.as_str())
                    || preferred.contains(k.as_str())
            })
            .count();
        // found / total > 0.5
        if found * 2 > keywords.len() {
            hits += 1;
        }
    }

    if !profile.name.is_empty() {
        checks += 1;
        if persona.persona_prompt.contains(&profile.name) {
            hits += 1;
        }
    }

    ratio(hits, checks)
}

/// Penalizes contradictions between the two buckets and the allergy list.
pub(crate) fn consistency(profile: &Profile, persona: &GeneratedPersona) -> f64 {
    let mut penalty = 0.0;
    if persona
        .must_avoid
        .iter()
        .any(|item| persona.preferred.contains(item))
    {
        penalty += 0.5;
    }
    for allergy in &profile.allergies {
        if persona.prefers(allergy) {
            penalty += 0.5;
        }
    }
    f64::max(1.0 - penalty, 0.0)
}

/// Share of strongly negative free-text entries that reached `must_avoid`.
///
/// Entries without refusal language are not graded.
pub(crate) fn extra_text_parsing(profile: &Profile, persona: &GeneratedPersona) -> f64 {
    let must_avoid = persona.must_avoid_text();
    let mut strong = 0;
    let mut reflected = 0;
    for text in &profile.extra_text {
        if !strong_negative().is_match(text) {
            continue;
        }
        strong += 1;
        let hit = text
            .split_whitespace()
            .filter(|word| word.chars().count() > 1)
            .any(|word| must_avoid.contains(word));
        if hit {
            reflected += 1;
        }
    }
    ratio(reflected, strong)
}
