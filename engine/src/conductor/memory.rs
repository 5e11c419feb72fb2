//! Feedback Memory
//!
//! Session-scoped store of what the user rejected and liked. Rejections are
//! keyed by place id and by normalised name; likes feed a signed weight per
//! feature tag that the scorer reads as a preference bias.
//!
//! The handle is cheap to clone and shares one `RwLock`. Writers hold the lock
//! only for the duration of a field update; nothing awaits while holding it.

use sdk::TemperatureBand;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::tools::normalize_place_name;

/// Weight added to each feature tag of a liked destination.
const LIKE_WEIGHT: f64 = 1.0;

/// Answer to the weather-preference question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "band")]
pub enum WeatherPreference {
    Band(TemperatureBand),
    NoPreference,
}

impl WeatherPreference {
    /// Parse a free-text answer: `cold`, `mild`, `warm` or a "no preference" phrase.
    ///
    /// Matching is by whole word; a band directly negated ("not cold") is ignored.
    pub fn parse(answer: &str) -> Option<Self> {
        let lowered = answer.trim().to_lowercase().replace('’', "'");
        let words: Vec<&str> = lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect();

        let indifferent = words.windows(2).any(|pair| {
            matches!(
                pair,
                ["no", "preference"] | ["don't", "care"] | ["dont", "care"] | ["any", "weather"]
            )
        }) || words.windows(3).any(|triple| triple == ["no", "particular", "preference"])
            || matches!(words.as_slice(), ["any"] | ["anything"] | ["whatever"]);
        if indifferent {
            return Some(WeatherPreference::NoPreference);
        }

        words
            .iter()
            .enumerate()
            .filter(|(_, w)| matches!(**w, "cold" | "mild" | "warm"))
            .find(|(i, _)| {
                !i.checked_sub(1)
                    .and_then(|prev| words.get(prev))
                    .is_some_and(|prev| matches!(*prev, "not" | "no" | "never"))
            })
            .and_then(|(_, band)| TemperatureBand::parse(band))
            .map(WeatherPreference::Band)
    }

    pub fn band(&self) -> Option<TemperatureBand> {
        match self {
            WeatherPreference::Band(band) => Some(*band),
            WeatherPreference::NoPreference => None,
        }
    }
}

/// A destination as it was shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShownOption {
    pub place_id: String,
    pub name: String,
    pub country_code: String,
    pub feature_tags: Vec<String>,
}

/// Exclusion set captured at the start of a planning pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exclusions {
    ids: HashSet<String>,
    names: HashSet<String>,
}

impl Exclusions {
    pub fn contains(&self, place_id: &str, name: &str) -> bool {
        self.ids.contains(place_id) || self.names.contains(&normalize_place_name(name))
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(&normalize_place_name(name))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty()
    }
}

/// Read-only view of the memory for display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub rejected: Vec<String>,
    pub liked: Vec<String>,
    pub preference_profile: BTreeMap<String, f64>,
    pub preferred_weather: Option<WeatherPreference>,
    pub last_shown: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    rejected_ids: HashSet<String>,
    rejected_names: HashSet<String>,
    liked: Vec<String>,
    profile: HashMap<String, f64>,
    preferred_weather: Option<WeatherPreference>,
    last_shown: Vec<ShownOption>,
}

impl MemoryState {
    fn name_of(&self, place_id: &str) -> Option<&str> {
        self.last_shown
            .iter()
            .find(|o| o.place_id == place_id)
            .map(|o| o.name.as_str())
    }
}

/// Session feedback store.
#[derive(Debug, Clone, Default)]
pub struct FeedbackMemory {
    state: Arc<RwLock<MemoryState>>,
}

impl FeedbackMemory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a like: the place is un-rejected and each of its tags gains weight.
    pub fn record_like(&self, place_id: &str, feature_tags: &[String]) {
        let mut state = self.write();
        state.rejected_ids.remove(place_id);
        if let Some(name) = state.name_of(place_id).map(normalize_place_name) {
            state.rejected_names.remove(&name);
        }
        if !state.liked.iter().any(|id| id == place_id) {
            state.liked.push(place_id.to_string());
        }
        for tag in feature_tags {
            *state.profile.entry(tag.clone()).or_insert(0.0) += LIKE_WEIGHT;
        }
        tracing::debug!("Recorded like for {} ({} tags)", place_id, feature_tags.len());
    }

    /// Reject every listed place. Names are resolved through the last shown ranking.
    pub fn record_reject_all(&self, shown_place_ids: &[String]) {
        let mut state = self.write();
        for place_id in shown_place_ids {
            if let Some(name) = state.name_of(place_id).map(normalize_place_name) {
                state.rejected_names.insert(name);
            }
            state.rejected_ids.insert(place_id.clone());
            state.liked.retain(|id| id != place_id);
        }
        tracing::debug!(
            "Recorded rejection of {} places ({} excluded in total)",
            shown_place_ids.len(),
            state.rejected_ids.len()
        );
    }

    pub fn is_excluded(&self, place_id: &str) -> bool {
        self.read().rejected_ids.contains(place_id)
    }

    pub fn is_excluded_name(&self, name: &str) -> bool {
        self.read()
            .rejected_names
            .contains(&normalize_place_name(name))
    }

    /// Signed weight of a feature tag; zero when never reinforced.
    ///
    /// A bare tag ("skiing") also sums every namespaced tag with that value
    /// ("activity:skiing").
    pub fn profile_bias(&self, tag: &str) -> f64 {
        let state = self.read();
        if tag.contains(':') {
            return state.profile.get(tag).copied().unwrap_or(0.0);
        }
        state
            .profile
            .iter()
            .filter(|(key, _)| {
                key.as_str() == tag || key.split_once(':').is_some_and(|(_, value)| value == tag)
            })
            .map(|(_, weight)| weight)
            .sum()
    }

    /// Sum of the weights of `tags`.
    pub fn bias_for(&self, tags: &[String]) -> f64 {
        let state = self.read();
        tags.iter()
            .map(|t| state.profile.get(t).copied().unwrap_or(0.0))
            .sum()
    }

    /// Copy of the exclusion set, so planning never holds the lock.
    pub fn exclusions(&self) -> Exclusions {
        let state = self.read();
        Exclusions {
            ids: state.rejected_ids.clone(),
            names: state.rejected_names.clone(),
        }
    }

    pub fn set_preferred_weather(&self, preference: WeatherPreference) {
        self.write().preferred_weather = Some(preference);
    }

    pub fn preferred_weather(&self) -> Option<WeatherPreference> {
        self.read().preferred_weather
    }

    /// Replace the ranking the user is currently looking at.
    pub fn record_shown(&self, shown: Vec<ShownOption>) {
        self.write().last_shown = shown;
    }

    /// The ranking shown before the current turn.
    pub fn previous_shown(&self) -> Vec<ShownOption> {
        self.read().last_shown.clone()
    }

    /// Forget everything learned this session.
    pub fn reset(&self) {
        *self.write() = MemoryState::default();
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let state = self.read();
        let mut rejected: Vec<String> = state.rejected_ids.iter().cloned().collect();
        rejected.sort();
        MemorySnapshot {
            rejected,
            liked: state.liked.clone(),
            preference_profile: state
                .profile
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            preferred_weather: state.preferred_weather,
            last_shown: state.last_shown.iter().map(|o| o.name.clone()).collect(),
        }
    }
}
