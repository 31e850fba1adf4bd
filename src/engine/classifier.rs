use chrono::{DateTime, Utc};

use super::dedup::job_id;
use super::job::{ExperienceLevel, Job, JobSource, RawPosting};
use super::terms::{PhraseMatcher, TermSets};

pub const TAG_REMOTE: &str = "Remote Friendly";
pub const TAG_VISA: &str = "Visa Sponsorship Available";
pub const TAG_CLEARANCE: &str = "Security Clearance Required";
pub const TAG_NO_CLEARANCE: &str = "No Security Clearance Required";
pub const TAG_CITIZENSHIP: &str = "Citizenship Required";
pub const TAG_F1: &str = "F1 Student Friendly";
pub const TAG_EASY_APPLY: &str = "Easy Apply";
pub const TAG_SPONSORED: &str = "Sponsored";

/// Derives flags and tags from a raw posting.
///
/// Output depends only on the posting, the source's own flags and the term
/// sets, so classifying the same posting twice yields the same job.
#[derive(Debug, Clone)]
pub struct Classifier {
    remote: PhraseMatcher,
    citizenship: PhraseMatcher,
    clearance: PhraseMatcher,
    sponsorship_blockers: PhraseMatcher,
    visa: PhraseMatcher,
    f1: PhraseMatcher,
    easy_apply: PhraseMatcher,
    experience: Vec<(ExperienceLevel, PhraseMatcher)>,
}

/// Boolean outcome of matching a posting's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub remote_friendly: bool,
    pub citizenship_required: bool,
    pub security_clearance_required: bool,
    pub visa_sponsorship: bool,
    pub f1_student_friendly: bool,
    pub easy_apply: bool,
    pub sponsored: bool,
}

impl From<&Job> for Flags {
    fn from(job: &Job) -> Self {
        Self {
            remote_friendly: job.remote_friendly,
            citizenship_required: job.citizenship_required,
            security_clearance_required: job.security_clearance_required,
            visa_sponsorship: job.visa_sponsorship,
            f1_student_friendly: job.f1_student_friendly,
            easy_apply: job.easy_apply,
            sponsored: job.sponsored,
        }
    }
}

impl Flags {
    pub fn tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        if self.remote_friendly {
            tags.push(TAG_REMOTE);
        }
        if self.visa_sponsorship {
            tags.push(TAG_VISA);
        }
        if self.security_clearance_required {
            tags.push(TAG_CLEARANCE);
        } else {
            tags.push(TAG_NO_CLEARANCE);
        }
        if self.citizenship_required {
            tags.push(TAG_CITIZENSHIP);
        }
        if self.f1_student_friendly {
            tags.push(TAG_F1);
        }
        if self.easy_apply {
            tags.push(TAG_EASY_APPLY);
        }
        if self.sponsored {
            tags.push(TAG_SPONSORED);
        }
        tags.into_iter().map(String::from).collect()
    }
}

impl Classifier {
    pub fn new(terms: &TermSets) -> Result<Self, regex::Error> {
        let experience = terms
            .experience_rules
            .iter()
            .map(|rule| Ok((rule.level, PhraseMatcher::new(&rule.terms)?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            remote: PhraseMatcher::new(&terms.remote)?,
            citizenship: PhraseMatcher::new(&terms.citizenship)?,
            clearance: PhraseMatcher::new(&terms.clearance)?,
            sponsorship_blockers: PhraseMatcher::new(&terms.sponsorship_blockers)?,
            visa: PhraseMatcher::new(&terms.visa_sponsorship)?,
            f1: PhraseMatcher::new(&terms.f1_friendly)?,
            easy_apply: PhraseMatcher::new(&terms.easy_apply)?,
            experience,
        })
    }

    pub fn flags(&self, posting: &RawPosting) -> Flags {
        let text = format!("{}\n{}", posting.title, posting.description);
        let remote_text = format!("{}\n{}", text, posting.location);

        let citizenship = self.citizenship.is_match(&text);
        let clearance = self.clearance.is_match(&text);
        let blocked = self.sponsorship_blockers.is_match(&text);

        let citizenship_required = citizenship || clearance || blocked;
        let visa_sponsorship = self.visa.is_match(&text) && !citizenship_required;

        Flags {
            remote_friendly: self.remote.is_match(&remote_text),
            citizenship_required,
            security_clearance_required: clearance || citizenship,
            visa_sponsorship,
            f1_student_friendly: !citizenship_required
                && (visa_sponsorship || self.f1.is_match(&text)),
            easy_apply: posting.easy_apply || self.easy_apply.is_match(&text),
            sponsored: posting.sponsored,
        }
    }

    /// First matching rule over the title wins; no match leaves the level unset.
    pub fn experience_level(&self, title: &str) -> Option<ExperienceLevel> {
        self.experience
            .iter()
            .find(|(_, matcher)| matcher.is_match(title))
            .map(|(level, _)| *level)
    }

    /// Builds the canonical job. `fallback_date` stands in for a missing
    /// posting date and `at` stamps the record.
    pub fn classify(
        &self,
        source: JobSource,
        posting: &RawPosting,
        fallback_date: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Job {
        let flags = self.flags(posting);
        let url = posting
            .url
            .as_ref()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Job {
            id: job_id(source, url.as_deref(), &posting.title, &posting.company, &posting.location),
            title: posting.title.trim().to_string(),
            company: posting.company.trim().to_string(),
            location: posting.location.trim().to_string(),
            description: posting.description.trim().to_string(),
            url,
            source,
            posted_date: posting.posted_date.unwrap_or(fallback_date),
            experience_level: self.experience_level(&posting.title),
            salary_range: posting
                .salary_range
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            classification_tags: flags.tags(),
            sponsored: flags.sponsored,
            remote_friendly: flags.remote_friendly,
            visa_sponsorship: flags.visa_sponsorship,
            security_clearance_required: flags.security_clearance_required,
            citizenship_required: flags.citizenship_required,
            f1_student_friendly: flags.f1_student_friendly,
            easy_apply: flags.easy_apply,
            also_posted_on: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }
}
