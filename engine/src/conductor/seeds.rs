//! Curated seed destinations
//!
//! Discovery requests start from a short list of well-known places per activity
//! category. The secondary pool is only consulted when relaxing a plan.

use super::types::ActivityCategory;

const SKIING_PRIMARY: &[&str] = &["Innsbruck", "Aspen", "Chamonix", "Sapporo", "Queenstown"];
const SKIING_SECONDARY: &[&str] = &["Zermatt", "Whistler", "St. Anton", "Niseko", "Bansko", "Val Thorens"];

const BEACH_PRIMARY: &[&str] = &["Phuket", "Cancun", "Nice", "Tel Aviv", "Honolulu", "Bali"];
const BEACH_SECONDARY: &[&str] = &["Malaga", "Split", "Larnaca", "Zanzibar", "Gold Coast", "Rio de Janeiro"];

const MUSEUM_PRIMARY: &[&str] = &["Paris", "Florence", "London", "Amsterdam", "Vienna", "New York"];
const MUSEUM_SECONDARY: &[&str] = &["Madrid", "Berlin", "Athens", "Rome", "Mexico City", "Washington"];

const GENERAL_PRIMARY: &[&str] = &["Lisbon", "Bangkok", "Tokyo", "Cape Town", "Vancouver", "Buenos Aires"];
const GENERAL_SECONDARY: &[&str] = &[
    "Istanbul", "Athens", "Rome", "Barcelona", "Prague", "Larnaca", "Singapore", "Reykjavik",
];

/// Primary seeds for an activity category.
pub fn primary(category: ActivityCategory) -> &'static [&'static str] {
    match category {
        ActivityCategory::Skiing => SKIING_PRIMARY,
        ActivityCategory::Beach => BEACH_PRIMARY,
        ActivityCategory::Museum => MUSEUM_PRIMARY,
        ActivityCategory::General => GENERAL_PRIMARY,
    }
}

/// Secondary seeds appended when widening the candidate set.
pub fn secondary(category: ActivityCategory) -> &'static [&'static str] {
    match category {
        ActivityCategory::Skiing => SKIING_SECONDARY,
        ActivityCategory::Beach => BEACH_SECONDARY,
        ActivityCategory::Museum => MUSEUM_SECONDARY,
        ActivityCategory::General => GENERAL_SECONDARY,
    }
}

/// Every seed of a category, primary first.
pub fn all(category: ActivityCategory) -> impl Iterator<Item = &'static str> {
    primary(category)
        .iter()
        .chain(secondary(category).iter())
        .copied()
}
