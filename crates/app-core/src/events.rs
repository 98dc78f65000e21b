//! Dance event model
//!
//! This module defines the event value type shared by the event feed and the
//! favourites list, plus the small presentation helpers used by event cards.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Currency symbol used in price labels
const CURRENCY: &str = "€";

/// Identifies one favouritable occurrence of an event
///
/// An event can run on several dates; each date variant is favourited on its
/// own, so the key pairs the event id with the date variant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    /// Event id
    pub id: u64,
    /// Date variant id
    pub date_variant_id: u64,
}

impl EventKey {
    /// Create a key from an event id and a date variant id
    pub fn new(id: u64, date_variant_id: u64) -> Self {
        Self { id, date_variant_id }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.date_variant_id)
    }
}

/// Where an event takes place
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    /// City name
    pub city: String,
    /// Country name
    pub country: String,
}

impl Location {
    /// Create a location
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self { city: city.into(), country: country.into() }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

/// A dance event as listed by the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event id, stable within a feed session
    pub id: u64,

    /// Date variant id
    #[serde(rename = "event_date_id")]
    pub date_variant_id: u64,

    /// Event title
    pub title: String,

    /// Long description
    #[serde(default)]
    pub description: String,

    /// Image reference (URL or asset name)
    #[serde(default)]
    pub image: String,

    /// Lowest ticket price
    #[serde(default, deserialize_with = "deserialize_price")]
    pub price_from: f64,

    /// Highest ticket price
    #[serde(default, deserialize_with = "deserialize_price")]
    pub price_to: f64,

    /// City and country
    #[serde(flatten)]
    pub location: Location,

    /// Category labels in display order
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Event {
    /// Create an event with the given identity and title; other fields empty
    pub fn new(id: u64, date_variant_id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            date_variant_id,
            title: title.into(),
            description: String::new(),
            image: String::new(),
            price_from: 0.0,
            price_to: 0.0,
            location: Location::default(),
            tags: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the image reference
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Set the price range
    ///
    /// Negative and non-finite prices become zero.
    pub fn with_price(mut self, from: f64, to: f64) -> Self {
        self.price_from = from;
        self.price_to = to;
        self.normalize_prices();
        self
    }

    /// Replace negative and non-finite prices with zero
    ///
    /// JSON has no representation for infinity or NaN, so an event must be
    /// normalized before it is persisted.
    pub fn normalize_prices(&mut self) {
        self.price_from = clamp_price(self.price_from);
        self.price_to = clamp_price(self.price_to);
    }

    /// Set the location
    pub fn with_location(mut self, city: impl Into<String>, country: impl Into<String>) -> Self {
        self.location = Location::new(city, country);
        self
    }

    /// Set the tags, keeping their order
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// The favourites key of this event
    pub fn key(&self) -> EventKey {
        EventKey::new(self.id, self.date_variant_id)
    }

    /// Whether the event costs nothing
    pub fn is_free(&self) -> bool {
        self.price_from == 0.0 && self.price_to == 0.0
    }

    /// Price text for event cards
    ///
    /// `"Free"` when both bounds are zero, a single price when the upper bound
    /// does not exceed the lower one, otherwise a range.
    pub fn price_label(&self) -> String {
        if self.is_free() {
            "Free".to_string()
        } else if self.price_to > self.price_from {
            format!("{CURRENCY}{} - {CURRENCY}{}", self.price_from, self.price_to)
        } else {
            format!("{CURRENCY}{}", self.price_from)
        }
    }

    /// Location text for event cards
    pub fn location_label(&self) -> String {
        self.location.to_string()
    }

    /// The first `limit` tags, in order
    pub fn display_tags(&self, limit: usize) -> &[String] {
        &self.tags[..self.tags.len().min(limit)]
    }

    /// Text used when sharing the event
    pub fn share_message(&self) -> String {
        format!("Check out this dance event: {} in {}", self.title, self.location)
    }
}

fn clamp_price(price: f64) -> f64 {
    if price.is_finite() {
        price.max(0.0)
    } else {
        0.0
    }
}

/// Reads a price, treating `null` (how serde_json writes a non-finite float) as zero
fn deserialize_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map_or(0.0, clamp_price))
}
