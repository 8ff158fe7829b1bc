use rand::seq::IndexedRandom;
use rand::Rng;

use crate::models::{Domain, Timetable};

/// Copies `first` and swaps in `second`'s slots for one random day.
pub fn crossover<R: Rng>(first: &Timetable, second: &Timetable, rng: &mut R) -> Timetable {
    let mut child = first.clone();
    if child.schedule.is_empty() {
        return child;
    }

    let day = rng.random_range(0..child.schedule.len());
    if let Some(donor) = second.schedule.get(day) {
        child.schedule[day].slots = donor.slots.clone();
    }
    child
}

/// Rewrites one random cell with a random subject, lab or project label.
///
/// The cell is drawn over every slot of the day; landing on a break leaves
/// the week untouched.
pub fn mutate<R: Rng>(mut timetable: Timetable, domain: &Domain, rng: &mut R) -> Timetable {
    if timetable.schedule.is_empty() || domain.slots_per_day() == 0 {
        return timetable;
    }

    let day = rng.random_range(0..timetable.schedule.len());
    let index = rng.random_range(0..domain.slots_per_day());

    if !domain.is_break(index) {
        if let Some(label) = domain.mutation_labels().choose(rng) {
            timetable.schedule[day].slots[index] = label.clone();
        }
    }
    timetable
}
