//! Conductor Planner
//!
//! Turns a [`TripQuery`] into candidate destinations with their facts:
//!
//! 1. Seed: the named place for an opinion, otherwise the seed pool for the activity.
//! 2. Geocode seeds concurrently; drop unresolved seeds and excluded places.
//! 3. With a flight limit, estimate flight time first and drop over-limit places.
//! 4. If fewer than `min_viable` survive, relax once with the configured strategy.
//! 5. Fetch weather and points of interest for every survivor concurrently.
//!
//! Feedback Memory is read once through [`FeedbackMemory::exclusions`]; no lock
//! is held while a gateway call is in flight.

use futures::future::join_all;
use sdk::{FlightOutcome, Origin, PoiOutcome, ToolGateway, WeatherOutcome};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

use super::memory::{Exclusions, FeedbackMemory};
use super::seeds;
use super::types::{ActivityCategory, CandidateDestination, PlanningFailure, TripQuery};
use crate::config::{PlannerConfig, RelaxationStrategy};
use crate::events::{EventKind, SharedSink};
use crate::tools::normalize_place_name;

pub struct Planner {
    gateway: Arc<dyn ToolGateway>,
    config: PlannerConfig,
    sink: SharedSink,
}

impl Planner {
    pub fn new(gateway: Arc<dyn ToolGateway>, config: PlannerConfig, sink: SharedSink) -> Self {
        Self {
            gateway,
            config,
            sink,
        }
    }

    /// Gather candidates for `query`, honouring the session's exclusions.
    pub async fn plan(
        &self,
        query: &TripQuery,
        origin: &Origin,
        memory: &FeedbackMemory,
    ) -> Result<Vec<CandidateDestination>, PlanningFailure> {
        let exclusions = memory.exclusions();

        if let Some(destination) = &query.destination {
            return self
                .plan_opinion(destination, query, origin, &exclusions)
                .await;
        }

        let category = query.category();
        let seeds: Vec<&str> = seeds::primary(category)
            .iter()
            .take(self.config.max_candidates)
            .copied()
            .collect();

        self.sink.record(
            EventKind::Planning,
            json!({ "stage": "seed", "category": category, "seeds": &seeds, "excluded": exclusions.len() }),
        );

        let mut survivors = self.discover(&seeds, query, origin, &exclusions, 0).await;
        let mut relaxed = false;

        if survivors.len() < self.config.min_viable {
            relaxed = true;
            let tried: HashSet<String> = seeds.iter().map(|s| normalize_place_name(s)).collect();
            let widened: Vec<&str> = self
                .relaxation_pool(category)
                .filter(|s| !tried.contains(&normalize_place_name(s)))
                .take(self.config.max_candidates)
                .collect();

            tracing::info!(
                "Only {} viable candidates, relaxing with {:?} ({} more seeds)",
                survivors.len(),
                self.config.relaxation,
                widened.len()
            );
            self.sink.record(
                EventKind::Planning,
                json!({ "stage": "relax", "strategy": self.config.relaxation, "seeds": &widened }),
            );

            let more = self
                .discover(&widened, query, origin, &exclusions, seeds.len())
                .await;
            for candidate in more {
                if !survivors.iter().any(|c| c.place_id == candidate.place_id) {
                    survivors.push(candidate);
                }
            }
        }

        if survivors.len() < self.config.min_viable {
            self.sink.record(
                EventKind::Planning,
                json!({ "stage": "failed", "relaxed": relaxed }),
            );
            return Err(PlanningFailure::NoFeasibleDestinations { relaxed });
        }

        survivors.truncate(self.config.max_candidates);
        Ok(self.enrich(survivors, query, origin).await)
    }

    async fn plan_opinion(
        &self,
        destination: &str,
        query: &TripQuery,
        origin: &Origin,
        exclusions: &Exclusions,
    ) -> Result<Vec<CandidateDestination>, PlanningFailure> {
        self.sink.record(
            EventKind::Planning,
            json!({ "stage": "seed", "destination": destination }),
        );

        let outcome = self.gateway.geocode(destination, 1).await;
        let Some(location) = outcome.best() else {
            return Err(PlanningFailure::UnknownDestination(destination.to_string()));
        };

        if exclusions.contains(&location.place_id, &location.name)
            || exclusions.contains_name(destination)
        {
            tracing::debug!("{} was rejected earlier this session", location.name);
            return Err(PlanningFailure::NoFeasibleDestinations { relaxed: false });
        }

        let candidates = vec![CandidateDestination::from_location(location, query, 0)];
        let candidates = self.apply_flight_limit(candidates, query, origin).await;
        if candidates.is_empty() {
            return Err(PlanningFailure::NoFeasibleDestinations { relaxed: false });
        }

        Ok(self.enrich(candidates, query, origin).await)
    }

    fn relaxation_pool(&self, category: ActivityCategory) -> Box<dyn Iterator<Item = &'static str>> {
        match self.config.relaxation {
            RelaxationStrategy::WidenSeeds => Box::new(seeds::secondary(category).iter().copied()),
            RelaxationStrategy::AnyActivity => Box::new(seeds::all(ActivityCategory::General)),
        }
    }

    /// Geocode seeds and apply exclusions and the flight limit.
    async fn discover(
        &self,
        seed_names: &[&str],
        query: &TripQuery,
        origin: &Origin,
        exclusions: &Exclusions,
        first_index: usize,
    ) -> Vec<CandidateDestination> {
        let lookups = seed_names.iter().map(|name| self.gateway.geocode(name, 1));
        let outcomes = join_all(lookups).await;

        let mut candidates: Vec<CandidateDestination> = Vec::new();
        let mut unresolved = 0;
        let mut excluded = 0;

        for (offset, (name, outcome)) in seed_names.iter().zip(outcomes).enumerate() {
            let Some(location) = outcome.best() else {
                unresolved += 1;
                continue;
            };
            if exclusions.contains(&location.place_id, &location.name)
                || exclusions.contains_name(name)
            {
                excluded += 1;
                continue;
            }
            if candidates.iter().any(|c| c.place_id == location.place_id) {
                continue;
            }
            candidates.push(CandidateDestination::from_location(
                location,
                query,
                first_index + offset,
            ));
        }

        let geocoded = candidates.len();
        let candidates = self.apply_flight_limit(candidates, query, origin).await;

        tracing::debug!(
            "Discovered {} candidates from {} seeds ({} unresolved, {} excluded, {} over flight limit)",
            candidates.len(),
            seed_names.len(),
            unresolved,
            excluded,
            geocoded - candidates.len()
        );
        self.sink.record(
            EventKind::Planning,
            json!({
                "stage": "discover",
                "seeds": seed_names.len(),
                "unresolved": unresolved,
                "excluded": excluded,
                "over_limit": geocoded - candidates.len(),
                "survivors": candidates.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            }),
        );

        candidates
    }

    /// Estimate flight time and drop candidates over the limit. No-op without a limit.
    async fn apply_flight_limit(
        &self,
        candidates: Vec<CandidateDestination>,
        query: &TripQuery,
        origin: &Origin,
    ) -> Vec<CandidateDestination> {
        let Some(max_hours) = query.max_flight_hours else {
            return candidates;
        };

        let estimates = join_all(
            candidates
                .iter()
                .map(|c| self.gateway.flight_time(origin, &c.coordinates)),
        )
        .await;

        candidates
            .into_iter()
            .zip(estimates)
            .filter_map(|(mut candidate, estimate)| match estimate {
                FlightOutcome::Hours(hours) if hours > max_hours => None,
                FlightOutcome::Hours(hours) => {
                    candidate.estimated_flight_hours = Some(hours);
                    Some(candidate)
                }
                FlightOutcome::Unestimable(cause) => {
                    candidate.mark_degraded(format!("flight time unknown ({})", cause));
                    Some(candidate)
                }
            })
            .collect()
    }

    /// Weather and points of interest for every candidate, plus flight time
    /// when no limit forced it earlier.
    async fn enrich(
        &self,
        candidates: Vec<CandidateDestination>,
        query: &TripQuery,
        origin: &Origin,
    ) -> Vec<CandidateDestination> {
        let when = query.when;
        let hint = query.activity.as_deref();
        let needs_flight = query.max_flight_hours.is_none();

        let tasks = candidates.into_iter().map(|mut candidate| async move {
            let coordinates = candidate.coordinates;
            let flight = async {
                if needs_flight {
                    Some(self.gateway.flight_time(origin, &coordinates).await)
                } else {
                    None
                }
            };
            let (weather, pois, flight) = futures::join!(
                self.gateway.weather(&coordinates, when.as_ref()),
                self.gateway.points_of_interest(&coordinates, hint),
                flight
            );

            match weather {
                WeatherOutcome::Summary(summary) => candidate.weather = Some(summary),
                WeatherOutcome::Unavailable(cause) => {
                    candidate.mark_degraded(format!("weather unavailable ({})", cause))
                }
            }

            match pois {
                PoiOutcome::Found(points) => candidate.points_of_interest = points,
                PoiOutcome::Empty(cause) if cause.is_unavailable() => {
                    candidate.mark_degraded(format!("points of interest unavailable ({})", cause))
                }
                PoiOutcome::Empty(_) => {}
            }

            match flight {
                Some(FlightOutcome::Hours(hours)) => candidate.estimated_flight_hours = Some(hours),
                Some(FlightOutcome::Unestimable(cause)) => {
                    candidate.mark_degraded(format!("flight time unknown ({})", cause))
                }
                None => {}
            }

            candidate
        });

        join_all(tasks).await
    }
}
