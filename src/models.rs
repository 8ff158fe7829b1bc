use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

use crate::error::TimetableError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Regular,
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub label: String,
    pub kind: SlotKind,
}

impl TimeSlot {
    pub fn regular(label: &str) -> Self {
        Self { label: label.to_string(), kind: SlotKind::Regular }
    }

    pub fn pause(label: &str) -> Self {
        Self { label: label.to_string(), kind: SlotKind::Break }
    }
}

/// Static description of the week being scheduled.
///
/// Passed by reference into the generator, the evaluator and the operators so
/// that a search run never touches shared mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Domain {
    pub days: Vec<String>,
    pub time_slots: Vec<TimeSlot>,
    pub subjects: Vec<String>,
    pub labs: Vec<String>,
    pub project_label: String,
    /// Exact number of project cells a valid week holds.
    pub project_quota: usize,
    pub break_label: String,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Domain {
    fn default() -> Self {
        Self {
            days: owned(&["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]),
            time_slots: vec![
                TimeSlot::regular("9:15-10:15"),
                TimeSlot::regular("10:15-11:15"),
                TimeSlot::pause("11:15-11:30 (Break)"),
                TimeSlot::regular("11:30-12:30"),
                TimeSlot::regular("12:30-1:30"),
                TimeSlot::pause("1:30-2:15 (Break)"),
                TimeSlot::regular("2:15-3:15"),
                TimeSlot::regular("3:15-4:15"),
                TimeSlot::regular("4:15-5:15"),
            ],
            subjects: owned(&[
                "Deep Learning",
                "Big Data Analytics",
                "Neural Network and Fuzzy System",
                "Blockchain",
                "CyberSecurity",
            ]),
            labs: owned(&[
                "Deep Learning Lab",
                "Blockchain Lab",
                "Neural Network and Fuzzy System Lab",
                "Big Data Analytics Lab",
            ]),
            project_label: "Major Project".to_string(),
            project_quota: 3,
            break_label: "Break".to_string(),
        }
    }
}

impl Domain {
    pub fn slots_per_day(&self) -> usize {
        self.time_slots.len()
    }

    pub fn is_break(&self, index: usize) -> bool {
        self.time_slots
            .get(index)
            .map_or(false, |slot| slot.kind == SlotKind::Break)
    }

    pub fn break_indices(&self) -> Vec<usize> {
        (0..self.slots_per_day()).filter(|&i| self.is_break(i)).collect()
    }

    pub fn regular_indices(&self) -> Vec<usize> {
        (0..self.slots_per_day()).filter(|&i| !self.is_break(i)).collect()
    }

    /// Subjects followed by labs: the labels every valid week must cover.
    pub fn class_labels(&self) -> Vec<String> {
        self.subjects.iter().chain(self.labs.iter()).cloned().collect()
    }

    /// Everything a mutation may write into a regular slot.
    pub fn mutation_labels(&self) -> Vec<String> {
        let mut labels = self.class_labels();
        labels.push(self.project_label.clone());
        labels
    }

    /// A week with every cell unassigned, breaks included.
    pub fn empty_timetable(&self) -> Timetable {
        Timetable {
            schedule: self
                .days
                .iter()
                .map(|day| DaySchedule {
                    day: day.clone(),
                    slots: vec![String::new(); self.slots_per_day()],
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), TimetableError> {
        let invalid = |reason: &str| Err(TimetableError::InvalidDomain(reason.to_string()));

        if self.days.is_empty() {
            return invalid("at least one day is required");
        }
        if self.time_slots.is_empty() {
            return invalid("at least one time slot is required");
        }
        if self.regular_indices().is_empty() {
            return invalid("at least one regular time slot is required");
        }
        if self.subjects.is_empty() && self.labs.is_empty() {
            return invalid("at least one subject or lab is required");
        }
        if self.project_label.is_empty() {
            return invalid("project label must not be empty");
        }
        if self.break_label.is_empty() {
            return invalid("break label must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    pub day: String,
    /// One label per time slot; an empty string is an unassigned cell.
    pub slots: Vec<String>,
}

/// One candidate week. Cloning yields a fully independent copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timetable {
    pub schedule: Vec<DaySchedule>,
}

impl Timetable {
    pub fn cells(&self) -> impl Iterator<Item = &String> {
        self.schedule.iter().flat_map(|d| d.slots.iter())
    }

    pub fn count_label(&self, label: &str) -> usize {
        self.cells().filter(|cell| cell.as_str() == label).count()
    }

    pub fn cell_count(&self) -> usize {
        self.schedule.iter().map(|d| d.slots.len()).sum()
    }
}

// Serialized as `{ "Monday": [..9 labels..], ... }` in day order.
impl Serialize for Timetable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.schedule.len()))?;
        for day in &self.schedule {
            map.serialize_entry(&day.day, &day.slots)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitnessMode {
    /// 1 for a valid week, 0 otherwise.
    #[default]
    Binary,
    /// 1 / (1 + violation count); still 1 only for a valid week.
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaParameters {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub fitness_mode: FitnessMode,
}

impl Default for GaParameters {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 500,
            mutation_rate: 0.1,
            fitness_mode: FitnessMode::Binary,
        }
    }
}

impl GaParameters {
    pub fn validate(&self) -> Result<(), TimetableError> {
        if self.population_size == 0 {
            return Err(TimetableError::InvalidParameters(
                "population_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(TimetableError::InvalidParameters(
                "mutation_rate must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Body of `POST /optimize`; any field left out falls back to the server config.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct OptimizationRequest {
    pub population_size: Option<usize>,
    pub generations: Option<usize>,
    pub mutation_rate: Option<f64>,
    pub fitness_mode: Option<FitnessMode>,
}

impl OptimizationRequest {
    pub fn apply(&self, base: &GaParameters) -> GaParameters {
        GaParameters {
            population_size: self.population_size.unwrap_or(base.population_size),
            generations: self.generations.unwrap_or(base.generations),
            mutation_rate: self.mutation_rate.unwrap_or(base.mutation_rate),
            fitness_mode: self.fitness_mode.unwrap_or(base.fitness_mode),
        }
    }
}

/// Every hard-constraint violation of one candidate.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct ConstraintReport {
    /// (day, slot index) of break cells not holding the break label.
    pub break_violations: Vec<(String, usize)>,
    /// (day, label) for each repeated occurrence within a day.
    pub duplicate_labels: Vec<(String, String)>,
    pub project_count: usize,
    pub missing_labels: Vec<String>,
    pub total_violations: u64,
}

impl ConstraintReport {
    pub fn is_valid(&self) -> bool {
        self.total_violations == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    SolutionFound,
    BudgetExhausted,
    Stopped,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchStatus {
    pub run_id: u64,
    pub generation: usize,
    pub elapsed_time: Duration,
    pub best_fitness: f64,
    pub valid_count: usize,
    pub is_finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub timetable: Timetable,
    pub fitness: f64,
    pub is_valid: bool,
    /// Generations scored by the loop; 0 when the budget was 0.
    pub generations: usize,
    pub termination: Termination,
    pub elapsed_time: Duration,
    pub violations: ConstraintReport,
}
