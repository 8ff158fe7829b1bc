use hashbrown::HashSet;

use crate::models::{ConstraintReport, Domain, FitnessMode, Timetable};

#[derive(Debug, Clone)]
pub struct FitnessCalculator<'a> {
    domain: &'a Domain,
    mode: FitnessMode,
}

impl<'a> FitnessCalculator<'a> {
    pub fn new(domain: &'a Domain, mode: FitnessMode) -> Self {
        Self { domain, mode }
    }

    pub fn calculate_fitness(&self, timetable: &Timetable) -> f64 {
        match self.mode {
            FitnessMode::Binary => {
                if self.is_valid(timetable) {
                    1.0
                } else {
                    0.0
                }
            }
            FitnessMode::Weighted => {
                let report = self.constraint_report(timetable);
                1.0 / (1.0 + report.total_violations as f64)
            }
        }
    }

    /// Hard accept/reject check, returning on the first failed constraint.
    pub fn is_valid(&self, timetable: &Timetable) -> bool {
        let domain = self.domain;
        let breaks = domain.break_indices();

        for day in &timetable.schedule {
            for &index in &breaks {
                if day.slots.get(index) != Some(&domain.break_label) {
                    return false;
                }
            }
        }

        for day in &timetable.schedule {
            let mut seen = HashSet::new();
            for label in scheduled_labels(&day.slots, &domain.break_label) {
                if !seen.insert(label) {
                    return false;
                }
            }
        }

        if timetable.count_label(&domain.project_label) != domain.project_quota {
            return false;
        }

        domain
            .subjects
            .iter()
            .chain(domain.labs.iter())
            .all(|label| timetable.cells().any(|cell| cell == label))
    }

    /// Full breakdown of every violated constraint, without early exit.
    pub fn constraint_report(&self, timetable: &Timetable) -> ConstraintReport {
        let domain = self.domain;
        let mut report = ConstraintReport::default();

        for day in &timetable.schedule {
            for index in domain.break_indices() {
                if day.slots.get(index) != Some(&domain.break_label) {
                    report.break_violations.push((day.day.clone(), index));
                }
            }

            let mut seen = HashSet::new();
            for label in scheduled_labels(&day.slots, &domain.break_label) {
                if !seen.insert(label) {
                    report.duplicate_labels.push((day.day.clone(), label.clone()));
                }
            }
        }

        report.project_count = timetable.count_label(&domain.project_label);

        report.missing_labels = domain
            .subjects
            .iter()
            .chain(domain.labs.iter())
            .filter(|label| !timetable.cells().any(|cell| cell == *label))
            .cloned()
            .collect();

        report.total_violations = (report.break_violations.len()
            + report.duplicate_labels.len()
            + report.project_count.abs_diff(domain.project_quota)
            + report.missing_labels.len()) as u64;

        report
    }
}

fn scheduled_labels<'s>(slots: &'s [String], break_label: &'s str) -> impl Iterator<Item = &'s String> {
    slots
        .iter()
        .filter(move |label| !label.is_empty() && label.as_str() != break_label)
}
