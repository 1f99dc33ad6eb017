use std::{fmt, path::Path};

use fxhash::FxHashSet;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{error::{CleanError, StoreError}, record::{JobRecord, ListingIdentity}, store};

/// How many affected listings [`MissingSummary`] names.
const SAMPLE_SIZE: usize = 5;


/// Hand-curated relevance judgments, applied only when deriving the final dataset.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ExclusionRules {
    /// `Job_Index` values of records judged irrelevant on manual review.
    #[serde(default)]
    pub(crate) excluded_indices: Vec<u32>,
    /// Regular expressions matched case-insensitively against title, tasks and skills.
    #[serde(default)]
    pub(crate) keywords: Vec<String>
}


/// How many records each cleaning stage removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CleaningReport {
    pub(crate) input: usize,
    pub(crate) missing_removed: usize,
    pub(crate) index_removed: usize,
    pub(crate) keyword_removed: usize,
    pub(crate) output: usize
}


impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kept {} of {} records ({} incomplete, {} excluded by index, {} by keyword)",
            self.output, self.input, self.missing_removed, self.index_removed, self.keyword_removed
        )
    }
}


/// Counts of records whose task or skill list could not be scraped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MissingSummary {
    pub(crate) total: usize,
    pub(crate) missing_tasks: usize,
    pub(crate) missing_skills: usize,
    pub(crate) missing_both: usize,
    /// The first few listings missing either list.
    pub(crate) samples: Vec<ListingIdentity>
}

impl MissingSummary {
    pub(crate) fn of(records: &[JobRecord]) -> Self {
        let mut summary = Self { total: records.len(), ..Default::default() };
        for record in records {
            let (tasks, skills) = (record.tasks.is_missing(), record.skills.is_missing());
            summary.missing_tasks += tasks as usize;
            summary.missing_skills += skills as usize;
            summary.missing_both += (tasks && skills) as usize;
            if (tasks || skills) && summary.samples.len() < SAMPLE_SIZE {
                summary.samples.push(record.identity());
            }
        }
        summary
    }

    /// Summarizes the dataset at `path` without changing it.
    pub(crate) fn load(path: &Path, delimiter: u8) -> Result<Self, StoreError> {
        Ok(Self::of(&store::read_records(path, delimiter)?))
    }

    fn percent(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }

    pub(crate) fn log(&self) {
        info!(
            "{} records: {} missing tasks ({:.2}%), {} missing skills ({:.2}%), {} missing both",
            self.total,
            self.missing_tasks,
            self.percent(self.missing_tasks),
            self.missing_skills,
            self.percent(self.missing_skills),
            self.missing_both
        );
        for sample in &self.samples {
            debug!("Missing tasks or skills: {sample}");
        }
    }
}


/// Output of [`Cleaner::apply`].
#[derive(Debug, Clone)]
pub(crate) struct Cleaned {
    /// Records left after dropping those with neither tasks nor skills.
    pub(crate) intermediate: Vec<JobRecord>,
    pub(crate) records: Vec<JobRecord>,
    pub(crate) report: CleaningReport
}


/// Derives the analysis-ready dataset from the master dataset.
///
/// The three stages stay separate so every removal can be traced to one kind of judgment:
/// missing data, manual review by index, or topic by keyword.
#[derive(Debug, Clone)]
pub(crate) struct Cleaner {
    excluded: FxHashSet<u32>,
    keywords: Option<Regex>
}

impl Cleaner {
    pub(crate) fn new(rules: &ExclusionRules) -> Result<Self, CleanError> {
        let keywords = if rules.keywords.is_empty() {
            None
        } else {
            let pattern = rules
                .keywords
                .iter()
                .map(|k| format!("(?:{k})"))
                .collect::<Vec<_>>()
                .join("|");
            Some(RegexBuilder::new(&pattern).case_insensitive(true).build()?)
        };
        Ok(Self { excluded: rules.excluded_indices.iter().copied().collect(), keywords })
    }

    /// Stage (a): drops records where both the task and the skill list are missing.
    pub(crate) fn drop_missing(&self, records: Vec<JobRecord>) -> (Vec<JobRecord>, usize) {
        partition(records, |r| r.tasks.is_missing() && r.skills.is_missing())
    }

    /// Stage (b): drops records whose index is on the manual exclusion list.
    pub(crate) fn drop_excluded(&self, records: Vec<JobRecord>) -> (Vec<JobRecord>, usize) {
        partition(records, |r| self.excluded.contains(&r.index))
    }

    /// Stage (c): drops records whose title, tasks or skills mention a denylisted keyword.
    pub(crate) fn drop_keywords(&self, records: Vec<JobRecord>) -> (Vec<JobRecord>, usize) {
        let Some(keywords) = &self.keywords else {
            return (records, 0);
        };
        partition(records, |r| {
            keywords.is_match(&r.title)
                || keywords.is_match(&r.tasks.to_column())
                || keywords.is_match(&r.skills.to_column())
        })
    }

    pub(crate) fn apply(&self, records: Vec<JobRecord>) -> Cleaned {
        let mut report = CleaningReport { input: records.len(), ..Default::default() };

        let (intermediate, removed) = self.drop_missing(records);
        report.missing_removed = removed;
        info!("Removed {removed} records missing both tasks and skills, {} left", intermediate.len());

        let (records, removed) = self.drop_excluded(intermediate.clone());
        report.index_removed = removed;
        info!("Removed {removed} records excluded by index, {} left", records.len());

        let (records, removed) = self.drop_keywords(records);
        report.keyword_removed = removed;
        info!("Removed {removed} records matching an exclusion keyword, {} left", records.len());

        report.output = records.len();
        Cleaned { intermediate, records, report }
    }
}

/// Keeps records for which `drop` is false, returning them with the number removed.
fn partition(records: Vec<JobRecord>, drop: impl Fn(&JobRecord) -> bool) -> (Vec<JobRecord>, usize) {
    let before = records.len();
    let kept: Vec<_> = records.into_iter().filter(|r| !drop(r)).collect();
    let removed = before - kept.len();
    (kept, removed)
}


/// Reads the master dataset, cleans it and writes the final dataset (and optionally the
/// intermediate one). The input file is only read.
pub(crate) fn run(
    input: &Path,
    output: &Path,
    intermediate: Option<&Path>,
    cleaner: &Cleaner,
    delimiter: u8
) -> Result<CleaningReport, CleanError> {
    let records = store::read_records(input, delimiter)?;
    info!("Loaded {} records from {}", records.len(), input.display());
    MissingSummary::of(&records).log();

    let cleaned = cleaner.apply(records);
    if let Some(path) = intermediate {
        store::write_records(path, &cleaned.intermediate, delimiter)?;
        info!("Intermediate dataset written to {}", path.display());
    }
    store::write_records(output, &cleaned.records, delimiter)?;
    info!("Final dataset of {} records written to {}", cleaned.records.len(), output.display());

    Ok(cleaned.report)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::record;

    fn rules(indices: &[u32], keywords: &[&str]) -> ExclusionRules {
        ExclusionRules {
            excluded_indices: indices.to_vec(),
            keywords: keywords.iter().map(|k| k.to_string()).collect()
        }
    }

    fn titles(records: &[JobRecord]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn drops_only_records_missing_both_lists() {
        let records = vec![
            record(1, "Both missing", "A", &[], &[]),
            record(2, "No skills", "A", &["t"], &[]),
            record(3, "No tasks", "A", &[], &["s"]),
            record(4, "Complete", "A", &["t"], &["s"]),
            record(5, "Also missing", "A", &[], &[])
        ];
        let (kept, removed) = Cleaner::new(&rules(&[], &[])).unwrap().drop_missing(records);
        assert_eq!(removed, 2);
        assert_eq!(titles(&kept), ["No skills", "No tasks", "Complete"]);
    }

    #[test]
    fn drops_listed_indices_regardless_of_content() {
        let records: Vec<_> = (1..=6).map(|i| record(i, &format!("Job {i}"), "A", &["t"], &["s"])).collect();
        let (kept, removed) = Cleaner::new(&rules(&[2, 5, 6], &[])).unwrap().drop_excluded(records);
        assert_eq!(removed, 3);
        assert_eq!(titles(&kept), ["Job 1", "Job 3", "Job 4"]);
    }

    #[test]
    fn keywords_match_any_column_ignoring_case() {
        let records = vec![
            record(1, "Lagerist", "A", &["t"], &["s"]),
            record(2, "Data Scientist", "A", &["Arbeit im LAGER"], &["s"]),
            record(3, "Data Scientist", "B", &["t"], &["Ph.D in physics"]),
            record(4, "Data Scientist", "C", &["Rechtliche Fragen"], &["Python"]),
            record(5, "Data Engineer", "D", &["Pipelines"], &["Recht"]),
            record(6, "PhD Student", "E", &["t"], &["s"])
        ];
        let cleaner = Cleaner::new(&rules(&[], &["lager", r"PH\.D", r"\bRecht\b"])).unwrap();
        let (kept, removed) = cleaner.drop_keywords(records);
        assert_eq!(removed, 4);
        assert_eq!(kept.iter().map(|r| r.index).collect::<Vec<_>>(), [4, 6]);
    }

    #[test]
    fn invalid_keyword_is_rejected() {
        assert!(matches!(Cleaner::new(&rules(&[], &["(unclosed"])), Err(CleanError::Pattern(_))));
    }

    #[test]
    fn stages_run_in_order_and_are_counted() {
        let records = vec![
            record(1, "Missing", "A", &[], &[]),
            record(2, "Reviewed away", "A", &["t"], &["s"]),
            record(3, "Chemie Laborant", "A", &["t"], &["s"]),
            record(4, "Data Scientist", "A", &["Build models"], &["Python"]),
            // excluded by index and keyword, counted once by the earlier stage
            record(5, "Chemie", "A", &["t"], &["s"])
        ];
        let cleaned = Cleaner::new(&rules(&[2, 5], &["chemie"])).unwrap().apply(records);
        assert_eq!(cleaned.report, CleaningReport {
            input: 5,
            missing_removed: 1,
            index_removed: 2,
            keyword_removed: 1,
            output: 1
        });
        assert_eq!(cleaned.intermediate.len(), 4);
        assert_eq!(titles(&cleaned.records), ["Data Scientist"]);
    }

    #[test]
    fn missing_summary_counts_each_list() {
        let records = vec![
            record(1, "A", "A", &[], &[]),
            record(2, "B", "A", &["t"], &[]),
            record(3, "C", "A", &["t"], &["s"]),
            record(4, "D", "A", &[], &["s"])
        ];
        assert_eq!(MissingSummary::of(&records), MissingSummary {
            total: 4,
            missing_tasks: 2,
            missing_skills: 2,
            missing_both: 1,
            samples: vec![
                ListingIdentity::new("A", "A"),
                ListingIdentity::new("B", "A"),
                ListingIdentity::new("D", "A")
            ]
        });
        assert_eq!(MissingSummary::of(&records).percent(1), 25.0);
    }

    #[test]
    fn missing_summary_samples_are_capped() {
        let records: Vec<_> = (1..=8).map(|i| record(i, &format!("Job {i}"), "A", &[], &["s"])).collect();
        let summary = MissingSummary::of(&records);
        assert_eq!(summary.missing_tasks, 8);
        assert_eq!(summary.samples.len(), SAMPLE_SIZE);
        assert_eq!(summary.samples[0].as_str(), "Job 1 | A");
    }

    #[test]
    fn run_writes_outputs_without_touching_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw").join("master.csv");
        let output = dir.path().join("processed").join("final.csv");
        let intermediate = dir.path().join("processed").join("intermediate.csv");
        store::write_records(&input, &[
            record(1, "Data Scientist", "A", &["t"], &["s"]),
            record(2, "Nothing", "A", &[], &[]),
            record(3, "Buchhaltung", "A", &["t"], &["s"])
        ], b';').unwrap();
        let before = std::fs::read(&input).unwrap();

        let cleaner = Cleaner::new(&rules(&[], &["buchhaltung"])).unwrap();
        let report = run(&input, &output, Some(&intermediate), &cleaner, b';').unwrap();

        assert_eq!((report.input, report.output), (3, 1));
        assert_eq!(std::fs::read(&input).unwrap(), before);
        assert_eq!(titles(&store::read_records(&output, b';').unwrap()), ["Data Scientist"]);
        assert_eq!(store::read_records(&intermediate, b';').unwrap().len(), 2);
    }
}
