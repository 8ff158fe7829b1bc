use std::time::Instant;

use log::{debug, info, warn};
use rand::seq::IndexedRandom;
use rand::Rng;
use rayon::prelude::*;
use tokio::sync::{broadcast, watch};

use super::fitness::FitnessCalculator;
use super::generator::random_timetable;
use super::operators::{crossover, mutate};
use crate::models::{Domain, GaParameters, SearchOutcome, SearchStatus, Termination, Timetable};

#[derive(Debug, Clone)]
struct Individual {
    timetable: Timetable,
    fitness: f64,
}

pub struct GeneticAlgorithm<'a> {
    domain: &'a Domain,
    parameters: GaParameters,
    fitness_calculator: FitnessCalculator<'a>,
    status_tx: Option<broadcast::Sender<SearchStatus>>,
    stop_rx: Option<watch::Receiver<bool>>,
    run_id: u64,
}

impl<'a> GeneticAlgorithm<'a> {
    pub fn new(domain: &'a Domain, parameters: GaParameters) -> Self {
        Self {
            domain,
            fitness_calculator: FitnessCalculator::new(domain, parameters.fitness_mode),
            parameters,
            status_tx: None,
            stop_rx: None,
            run_id: 0,
        }
    }

    /// Publishes a [`SearchStatus`] after every generation.
    pub fn with_status(mut self, status_tx: broadcast::Sender<SearchStatus>) -> Self {
        self.status_tx = Some(status_tx);
        self
    }

    /// Ends the search early once the receiver reads `true`.
    pub fn with_stop_signal(mut self, stop_rx: watch::Receiver<bool>) -> Self {
        self.stop_rx = Some(stop_rx);
        self
    }

    /// Tags every published [`SearchStatus`] with the given run.
    pub fn with_run_id(mut self, run_id: u64) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run(&self) -> SearchOutcome {
        self.run_with(&mut rand::rng())
    }

    /// Runs the search to completion with the given random source.
    ///
    /// Never fails: when no valid week turns up within the generation budget
    /// the best candidate of the last population is returned as-is.
    pub fn run_with<R: Rng>(&self, rng: &mut R) -> SearchOutcome {
        let population_size = self.parameters.population_size.max(1);

        info!(
            "Starting timetable search {}: population {}, generations {}, mode {:?}",
            self.run_id, population_size, self.parameters.generations, self.parameters.fitness_mode
        );

        let population: Vec<Timetable> = (0..population_size)
            .map(|_| random_timetable(self.domain, rng))
            .collect();
        self.evolve(population, rng)
    }

    /// Generation loop over an existing population.
    ///
    /// `SearchOutcome::generations` counts the generations scored by the loop,
    /// so a week found in the first generation reports 1.
    fn evolve<R: Rng>(&self, mut population: Vec<Timetable>, rng: &mut R) -> SearchOutcome {
        let start_time = Instant::now();
        let population_size = population.len().max(1);
        let survivors = (population_size / 2).max(1);

        let mut termination = Termination::BudgetExhausted;
        let mut generations_run = 0;

        for generation in 0..self.parameters.generations {
            if self.stop_requested() {
                info!("Search stopped at generation {}", generation);
                termination = Termination::Stopped;
                break;
            }

            let mut ranked = self.evaluate_population(population);
            let best_fitness = ranked[0].fitness;
            let valid_count = ranked.iter().filter(|i| i.fitness >= 1.0).count();
            debug!(
                "Generation {}: best fitness {:.4}, {} valid",
                generation, best_fitness, valid_count
            );
            self.progress(generation, &start_time, best_fitness, valid_count, false);

            if best_fitness >= 1.0 {
                info!("Valid timetable found at generation {}", generation);
                let best = ranked.swap_remove(0);
                return self.finish(best.timetable, generation + 1, Termination::SolutionFound, &start_time);
            }

            ranked.truncate(survivors);
            population = self.breed(&ranked, population_size, rng);
            generations_run = generation + 1;
        }

        let best = self.evaluate_population(population).swap_remove(0);
        if best.fitness >= 1.0 {
            info!("Valid timetable found in the final population");
            termination = Termination::SolutionFound;
        } else {
            warn!(
                "No valid timetable after {} generations, returning best candidate (fitness {:.4})",
                generations_run, best.fitness
            );
        }
        self.finish(best.timetable, generations_run, termination, &start_time)
    }

    /// Scores every candidate in parallel and sorts best first.
    fn evaluate_population(&self, population: Vec<Timetable>) -> Vec<Individual> {
        let calculator = &self.fitness_calculator;
        let mut ranked: Vec<Individual> = population
            .into_par_iter()
            .map(|timetable| {
                let fitness = calculator.calculate_fitness(&timetable);
                Individual { timetable, fitness }
            })
            .collect();
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        ranked
    }

    fn breed<R: Rng>(&self, parents: &[Individual], size: usize, rng: &mut R) -> Vec<Timetable> {
        let mut offspring = Vec::with_capacity(size);
        while offspring.len() < size {
            let (Some(first), Some(second)) = (parents.choose(rng), parents.choose(rng)) else {
                break;
            };
            let mut child = crossover(&first.timetable, &second.timetable, rng);
            if rng.random::<f64>() < self.parameters.mutation_rate {
                child = mutate(child, self.domain, rng);
            }
            offspring.push(child);
        }
        offspring
    }

    fn stop_requested(&self) -> bool {
        self.stop_rx.as_ref().map_or(false, |rx| *rx.borrow())
    }

    fn progress(
        &self,
        generation: usize,
        start_time: &Instant,
        best_fitness: f64,
        valid_count: usize,
        is_finished: bool,
    ) {
        let status = SearchStatus {
            run_id: self.run_id,
            generation,
            elapsed_time: start_time.elapsed(),
            best_fitness,
            valid_count,
            is_finished,
        };

        // No receivers is fine.
        if let Some(tx) = &self.status_tx {
            let _ = tx.send(status);
        }
    }

    fn finish(
        &self,
        timetable: Timetable,
        generations: usize,
        termination: Termination,
        start_time: &Instant,
    ) -> SearchOutcome {
        let violations = self.fitness_calculator.constraint_report(&timetable);
        let fitness = self.fitness_calculator.calculate_fitness(&timetable);
        let is_valid = violations.is_valid();

        self.progress(generations, start_time, fitness, usize::from(is_valid), true);
        info!(
            "Search finished after {} generations ({:?}): valid = {}, elapsed {:?}",
            generations,
            termination,
            is_valid,
            start_time.elapsed()
        );

        SearchOutcome {
            timetable,
            fitness,
            is_valid,
            generations,
            termination,
            elapsed_time: start_time.elapsed(),
            violations,
        }
    }
}

/// Plain entry point: evolve a week with the default domain and binary fitness.
pub fn run_search(population_size: usize, generation_budget: usize) -> Timetable {
    let domain = Domain::default();
    let parameters = GaParameters {
        population_size,
        generations: generation_budget,
        ..GaParameters::default()
    };
    GeneticAlgorithm::new(&domain, parameters).run().timetable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::fitness::tests::valid_timetable;
    use crate::models::FitnessMode;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(population_size: usize, generations: usize) -> GaParameters {
        GaParameters {
            population_size,
            generations,
            ..GaParameters::default()
        }
    }

    #[test]
    fn zero_budget_returns_initial_candidate() {
        let domain = Domain::default();
        let expected = random_timetable(&domain, &mut StdRng::seed_from_u64(17));

        let outcome = GeneticAlgorithm::new(&domain, params(1, 0))
            .run_with(&mut StdRng::seed_from_u64(17));

        assert_eq!(outcome.timetable, expected);
        assert_eq!(outcome.generations, 0);
        assert_ne!(outcome.termination, Termination::Stopped);
    }

    #[test]
    fn run_search_always_returns_full_week() {
        for (size, budget) in [(1, 0), (1, 5), (4, 10), (20, 3)] {
            let timetable = run_search(size, budget);
            assert_eq!(timetable.schedule.len(), 5);
            assert!(timetable.schedule.iter().all(|d| d.slots.len() == 9));
        }
    }

    #[test]
    fn invalid_result_is_reported_not_raised() {
        let domain = Domain::default();
        let outcome = GeneticAlgorithm::new(&domain, params(2, 1))
            .run_with(&mut StdRng::seed_from_u64(1));

        assert_eq!(outcome.is_valid, outcome.violations.is_valid());
        assert_eq!(outcome.is_valid, outcome.fitness >= 1.0);
        if !outcome.is_valid {
            assert_eq!(outcome.termination, Termination::BudgetExhausted);
            assert_eq!(outcome.generations, 1);
        }
    }

    #[test]
    fn population_is_kept_at_configured_size() {
        let domain = Domain::default();
        let ga = GeneticAlgorithm::new(&domain, params(7, 1));
        let mut rng = StdRng::seed_from_u64(2);

        let population: Vec<Timetable> = (0..7).map(|_| random_timetable(&domain, &mut rng)).collect();
        let mut ranked = ga.evaluate_population(population);
        ranked.truncate(3);
        let offspring = ga.breed(&ranked, 7, &mut rng);
        assert_eq!(offspring.len(), 7);
    }

    #[test]
    fn evaluation_ranks_valid_week_first() {
        let domain = Domain::default();
        let ga = GeneticAlgorithm::new(&domain, params(3, 1));
        let population = vec![domain.empty_timetable(), valid_timetable(), domain.empty_timetable()];

        let ranked = ga.evaluate_population(population);
        assert_eq!(ranked[0].fitness, 1.0);
        assert_eq!(ranked[0].timetable, valid_timetable());
        assert_eq!(ranked[2].fitness, 0.0);
    }

    #[test]
    fn offspring_of_a_valid_pair_is_valid_without_mutation() {
        let domain = Domain::default();
        let ga = GeneticAlgorithm::new(
            &domain,
            GaParameters { mutation_rate: 0.0, ..params(4, 1) },
        );
        let parents = ga.evaluate_population(vec![valid_timetable()]);
        let offspring = ga.breed(&parents, 4, &mut StdRng::seed_from_u64(4));

        let calculator = FitnessCalculator::new(&domain, FitnessMode::Binary);
        assert!(offspring.iter().all(|t| calculator.is_valid(t)));
    }

    #[test]
    fn stop_signal_ends_search_before_first_generation() {
        let domain = Domain::default();
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send_replace(true);

        let outcome = GeneticAlgorithm::new(&domain, params(4, 500))
            .with_stop_signal(stop_rx)
            .evolve(vec![domain.empty_timetable(); 4], &mut StdRng::seed_from_u64(9));

        assert_eq!(outcome.termination, Termination::Stopped);
        assert_eq!(outcome.generations, 0);
        assert_eq!(outcome.timetable.cell_count(), 45);
    }

    #[test]
    fn status_is_broadcast_each_generation() {
        let domain = Domain::default();
        let (status_tx, mut status_rx) = broadcast::channel(64);

        let outcome = GeneticAlgorithm::new(&domain, params(4, 3))
            .with_status(status_tx)
            .with_run_id(5)
            .run_with(&mut StdRng::seed_from_u64(6));

        let mut statuses = Vec::new();
        while let Ok(status) = status_rx.try_recv() {
            statuses.push(status);
        }
        let last = statuses.last().unwrap();
        assert!(last.is_finished);
        assert_eq!(last.generation, outcome.generations);
        assert!(statuses.iter().all(|s| s.run_id == 5));
        assert_eq!(
            statuses.iter().filter(|s| !s.is_finished).count(),
            outcome.generations
        );
    }

    #[test]
    fn week_found_in_first_generation_counts_one_generation() {
        let domain = Domain::default();
        let ga = GeneticAlgorithm::new(&domain, params(2, 10));
        let population = vec![domain.empty_timetable(), valid_timetable()];

        let outcome = ga.evolve(population, &mut StdRng::seed_from_u64(3));
        assert_eq!(outcome.termination, Termination::SolutionFound);
        assert_eq!(outcome.generations, 1);
        assert!(outcome.is_valid);
    }

    #[test]
    fn valid_final_population_reports_solution_found() {
        let domain = Domain::default();
        let ga = GeneticAlgorithm::new(&domain, params(1, 0));

        let outcome = ga.evolve(vec![valid_timetable()], &mut StdRng::seed_from_u64(3));
        assert_eq!(outcome.generations, 0);
        assert_eq!(outcome.termination, Termination::SolutionFound);
        assert!(outcome.is_valid);
    }

    #[test]
    fn termination_agrees_with_validity() {
        let domain = Domain::default();
        for seed in 0..5 {
            let outcome = GeneticAlgorithm::new(&domain, params(4, 3))
                .run_with(&mut StdRng::seed_from_u64(seed));
            assert_eq!(
                outcome.is_valid,
                outcome.termination == Termination::SolutionFound
            );
        }
    }

    #[test]
    fn weighted_outcome_fitness_matches_report() {
        let domain = Domain::default();
        let parameters = GaParameters {
            population_size: 20,
            generations: 30,
            mutation_rate: 0.1,
            fitness_mode: FitnessMode::Weighted,
        };
        let outcome = GeneticAlgorithm::new(&domain, parameters).run_with(&mut StdRng::seed_from_u64(12));

        assert!(outcome.fitness > 0.0 && outcome.fitness <= 1.0);
        assert_eq!(outcome.is_valid, outcome.fitness == 1.0);
        assert_eq!(
            outcome.fitness,
            1.0 / (1.0 + outcome.violations.total_violations as f64)
        );
    }
}
