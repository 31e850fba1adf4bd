use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::job::ExperienceLevel;

/// Title cues mapping to one experience level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRule {
    pub level: ExperienceLevel,
    pub terms: Vec<String>,
}

/// Curated phrase lists the classifier matches against.
///
/// The built-in lists can be replaced wholesale or per field by a JSON file;
/// any field missing from the file keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermSets {
    pub remote: Vec<String>,
    pub citizenship: Vec<String>,
    pub clearance: Vec<String>,
    /// Phrases that rule out sponsorship even when sponsorship is mentioned
    pub sponsorship_blockers: Vec<String>,
    pub visa_sponsorship: Vec<String>,
    pub f1_friendly: Vec<String>,
    pub easy_apply: Vec<String>,
    /// Evaluated in order, first matching rule wins
    pub experience_rules: Vec<ExperienceRule>,
}

fn list(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

impl Default for TermSets {
    fn default() -> Self {
        Self {
            remote: list(&[
                "remote",
                "fully remote",
                "work from home",
                "wfh",
                "telecommute",
                "work from anywhere",
                "distributed team",
            ]),
            citizenship: list(&[
                "us citizen",
                "u.s. citizen",
                "united states citizen",
                "us citizenship",
                "u.s. citizenship",
                "united states citizenship",
                "must be a us citizen",
                "must be a u.s. citizen",
                "citizenship required",
                "citizens only",
                "us citizens only",
                "u.s. citizens only",
            ]),
            clearance: list(&[
                "security clearance",
                "clearance required",
                "active clearance",
                "secret clearance",
                "top secret",
                "ts/sci",
                "public trust",
                "government clearance",
                "dod clearance",
            ]),
            sponsorship_blockers: list(&[
                "no sponsorship",
                "no visa sponsorship",
                "unable to sponsor",
                "will not sponsor",
                "cannot sponsor",
                "not able to sponsor",
                "not sponsor",
                "do not sponsor",
                "does not sponsor",
                "unable to provide sponsorship",
                "not provide sponsorship",
                "sponsorship is not available",
                "sponsorship not available",
            ]),
            visa_sponsorship: list(&[
                "visa sponsorship",
                "sponsorship available",
                "will sponsor",
                "sponsor visa",
                "h1b",
                "h-1b",
                "h1b sponsorship",
                "visa support",
                "sponsor",
            ]),
            f1_friendly: list(&[
                "opt",
                "cpt",
                "stem opt",
                "f1",
                "f-1",
                "f1 visa",
                "f-1 visa",
                "optional practical training",
                "curricular practical training",
                "international students",
                "international candidates welcome",
            ]),
            easy_apply: list(&[
                "easy apply",
                "quick apply",
                "one-click apply",
                "instant apply",
                "apply instantly",
                "fast apply",
            ]),
            experience_rules: vec![
                ExperienceRule {
                    level: ExperienceLevel::Executive,
                    terms: list(&[
                        "chief",
                        "ciso",
                        "cto",
                        "vp",
                        "vice president",
                        "director",
                        "head of",
                    ]),
                },
                ExperienceRule {
                    level: ExperienceLevel::Lead,
                    terms: list(&["lead", "tech lead", "principal", "staff", "distinguished"]),
                },
                ExperienceRule {
                    level: ExperienceLevel::Senior,
                    terms: list(&["senior", "sr", "sr.", "iii", "iv"]),
                },
                ExperienceRule {
                    level: ExperienceLevel::Entry,
                    terms: list(&[
                        "intern",
                        "internship",
                        "entry level",
                        "entry-level",
                        "junior",
                        "jr",
                        "jr.",
                        "new grad",
                        "graduate",
                        "trainee",
                        "apprentice",
                    ]),
                },
                ExperienceRule {
                    level: ExperienceLevel::Mid,
                    terms: list(&["mid level", "mid-level", "intermediate", "ii"]),
                },
            ],
        }
    }
}

impl TermSets {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read term sets from {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Invalid term sets in {}: {}", path.display(), e))
    }
}

/// Case-insensitive phrase matcher.
///
/// A phrase only matches when bounded by a non-word character or the edge of
/// the text on both sides, so `citizenship` never matches `citizenshipxyz`.
/// Whitespace inside a phrase matches any run of whitespace.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    regex: Option<Regex>,
}

impl PhraseMatcher {
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = phrases
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { regex: None });
        }

        let pattern = format!(r"(?i)(?:^|\W)(?:{})(?:\W|$)", alternatives.join("|"));
        Ok(Self {
            regex: Some(Regex::new(&pattern)?),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }
}
