use rand::Rng;

use crate::models::{Domain, Timetable};

/// Builds one random week.
///
/// Project cells are placed first, at most one per day and never more than
/// the weekly quota. Remaining regular cells draw subjects and labs without
/// replacement from a pool shared across the week; the pool refills once it
/// runs dry, so later days may repeat a label. Break cells are stamped last.
pub fn random_timetable<R: Rng>(domain: &Domain, rng: &mut R) -> Timetable {
    let mut timetable = domain.empty_timetable();
    let regular = domain.regular_indices();
    let mut pool = domain.class_labels();
    let mut projects_placed = 0;

    for day in &mut timetable.schedule {
        if projects_placed < domain.project_quota && !regular.is_empty() && rng.random_bool(0.5) {
            let index = regular[rng.random_range(0..regular.len())];
            day.slots[index] = domain.project_label.clone();
            projects_placed += 1;
        }

        for &index in &regular {
            if !day.slots[index].is_empty() {
                continue;
            }
            if pool.is_empty() {
                pool = domain.class_labels();
                if pool.is_empty() {
                    break;
                }
            }
            let pick = rng.random_range(0..pool.len());
            day.slots[index] = pool.swap_remove(pick);
        }
    }

    for day in &mut timetable.schedule {
        for index in domain.break_indices() {
            day.slots[index] = domain.break_label.clone();
        }
    }

    timetable
}
