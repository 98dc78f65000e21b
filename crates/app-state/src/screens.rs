//! Screen state for favourites consumers
//!
//! The events list, the favourites list and the profile badge each keep their
//! own view of the favourites. [`Mounted`] ties a view to the repository's
//! watch channel so a change made on one screen reaches the others without a
//! manual reload.

use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::watch;

use app_core::events::{Event, EventKey};
use app_core::favourites::{FavouritesCollection, FavouritesRepository, Outcome};

/// Number of tags shown on an event card
pub const CARD_TAG_LIMIT: usize = 3;

/// Screen action errors
#[derive(Debug, Error)]
pub enum ScreenError {
    /// No event at the given list position
    #[error("No event at index {0}")]
    NoSuchEvent(usize),
}

/// Result type for screen actions
pub type Result<T> = std::result::Result<T, ScreenError>;

/// A consumer that renders from the favourites list
pub trait FavouritesView {
    /// Replace the view's favourites state
    fn apply(&mut self, favourites: &FavouritesCollection);
}

/// Card data for one event in the events list
#[derive(Debug, Clone, PartialEq)]
pub struct EventCard {
    /// Favourites key
    pub key: EventKey,
    /// Event title
    pub title: String,
    /// Image reference
    pub image: String,
    /// Price text
    pub price: String,
    /// Location text
    pub location: String,
    /// Tags shown on the card
    pub tags: Vec<String>,
    /// Whether the heart icon is filled
    pub is_favourite: bool,
}

/// Events list: the feed with a heart per card
#[derive(Debug, Clone, Default)]
pub struct EventListScreen {
    events: Vec<Event>,
    favourites: HashSet<EventKey>,
}

impl EventListScreen {
    /// Create the screen over events supplied by the feed
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, favourites: HashSet::new() }
    }

    /// Replace the feed's events, keeping favourites state
    pub fn set_events(&mut self, events: Vec<Event>) {
        self.events = events;
    }

    /// Events in feed order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Whether the event with this key shows a filled heart
    pub fn is_favourite(&self, key: EventKey) -> bool {
        self.favourites.contains(&key)
    }

    /// Card data for every event
    pub fn cards(&self) -> Vec<EventCard> {
        self.events
            .iter()
            .map(|event| EventCard {
                key: event.key(),
                title: event.title.clone(),
                image: event.image.clone(),
                price: event.price_label(),
                location: event.location_label(),
                tags: event.display_tags(CARD_TAG_LIMIT).to_vec(),
                is_favourite: self.is_favourite(event.key()),
            })
            .collect()
    }

    /// Toggle the heart of the event at `index`
    ///
    /// Returns whether the event is now favourited. The screen updates from
    /// the repository's result even when persisting failed.
    pub async fn toggle(
        &mut self,
        favourites: &FavouritesRepository,
        index: usize,
    ) -> Result<Outcome<bool>> {
        let event = self.events.get(index).cloned().ok_or(ScreenError::NoSuchEvent(index))?;

        let outcome = favourites.toggle(event).await;
        self.apply(&outcome.value.collection);
        Ok(outcome.map(|toggled| toggled.was_added))
    }
}

impl FavouritesView for EventListScreen {
    fn apply(&mut self, favourites: &FavouritesCollection) {
        self.favourites = favourites.keys().collect();
    }
}

/// Favourites list: the saved snapshots in insertion order
#[derive(Debug, Clone, Default)]
pub struct FavouritesScreen {
    entries: FavouritesCollection,
}

impl FavouritesScreen {
    /// Create an empty screen
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved entries in display order
    pub fn entries(&self) -> &FavouritesCollection {
        &self.entries
    }

    /// Whether the empty-state message should be shown
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unfavourite an entry from this screen
    pub async fn remove(
        &mut self,
        favourites: &FavouritesRepository,
        key: EventKey,
    ) -> Outcome<()> {
        let outcome = favourites.remove(key).await;
        self.apply(&outcome.value);
        outcome.map(|_| ())
    }
}

impl FavouritesView for FavouritesScreen {
    fn apply(&mut self, favourites: &FavouritesCollection) {
        self.entries = favourites.clone();
    }
}

/// Profile: shows how many events are favourited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileScreen {
    favourite_count: usize,
}

impl ProfileScreen {
    /// Create the screen with a zero count
    pub fn new() -> Self {
        Self::default()
    }

    /// Favourites badge count
    pub fn favourite_count(&self) -> usize {
        self.favourite_count
    }
}

impl FavouritesView for ProfileScreen {
    fn apply(&mut self, favourites: &FavouritesCollection) {
        self.favourite_count = favourites.len();
    }
}

/// A view mounted on the repository, following its changes
pub struct Mounted<V> {
    view: V,
    updates: watch::Receiver<FavouritesCollection>,
}

impl<V: FavouritesView> Mounted<V> {
    /// Load favourites into the view and start following changes
    pub async fn mount(mut view: V, favourites: &FavouritesRepository) -> Outcome<Self> {
        let mut updates = favourites.subscribe();
        let loaded = favourites.load().await;

        view.apply(&updates.borrow_and_update());
        let condition = loaded.condition;
        Outcome { value: Self { view, updates }, condition }
    }

    /// Re-read storage, as a remount would
    pub async fn refresh(&mut self, favourites: &FavouritesRepository) -> Outcome<()> {
        let loaded = favourites.load().await;
        self.view.apply(&self.updates.borrow_and_update());
        loaded.map(|_| ())
    }

    /// Apply the latest published favourites if they changed since last seen
    ///
    /// Returns whether the view was updated.
    pub fn sync(&mut self) -> bool {
        match self.updates.has_changed() {
            Ok(true) => {
                self.view.apply(&self.updates.borrow_and_update());
                true
            }
            _ => false,
        }
    }

    /// Wait for the next change and apply it
    ///
    /// Returns false once the repository has been dropped.
    pub async fn changed(&mut self) -> bool {
        if self.updates.changed().await.is_err() {
            return false;
        }
        self.view.apply(&self.updates.borrow_and_update());
        true
    }

    /// The mounted view
    pub fn view(&self) -> &V {
        &self.view
    }

    /// The mounted view, mutably (for screen actions)
    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Unmount and return the view
    pub fn into_inner(self) -> V {
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_core::favourites::{FavouritesConfig, PersistenceCondition};
    use std::sync::Arc;
    use storage::{KvError, KvStore, MockKeyValueStore};

    fn feed() -> Vec<Event> {
        vec![
            Event::new(216, 1, "Mondays Social Outdoor")
                .with_location("Berlin", "Germany")
                .with_tags(["Bachata", "Kizomba", "Salsa", "Social"]),
            Event::new(217, 2, "Berlin Bachata Congress")
                .with_price(89.0, 149.0)
                .with_location("Berlin", "Germany")
                .with_tags(["Bachata", "Congress"]),
            Event::new(218, 3, "Salsa Night at Club Havana")
                .with_price(10.0, 15.0)
                .with_location("Madrid", "Spain"),
        ]
    }

    fn repository() -> FavouritesRepository {
        let store = Arc::new(KvStore::in_memory().unwrap());
        FavouritesRepository::new(store, FavouritesConfig::default())
    }

    #[tokio::test]
    async fn test_event_cards() {
        let repo = repository();
        let mut screen = Mounted::mount(EventListScreen::new(feed()), &repo).await.value;

        let _ = screen.view_mut().toggle(&repo, 1).await.unwrap();

        let cards = screen.view().cards();
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].price, "Free");
        assert_eq!(cards[0].tags, vec!["Bachata", "Kizomba", "Salsa"]);
        assert_eq!(cards[1].price, "€89 - €149");
        assert_eq!(cards[1].location, "Berlin, Germany");
        assert!(!cards[0].is_favourite);
        assert!(cards[1].is_favourite);
    }

    #[tokio::test]
    async fn test_toggle_reports_branch() {
        let repo = repository();
        let mut screen = EventListScreen::new(feed());

        let added = screen.toggle(&repo, 0).await.unwrap();
        assert!(added.is_clean());
        assert!(added.value);
        assert!(screen.is_favourite(EventKey::new(216, 1)));

        let removed = screen.toggle(&repo, 0).await.unwrap();
        assert!(!removed.value);
        assert!(!screen.is_favourite(EventKey::new(216, 1)));
    }

    #[tokio::test]
    async fn test_toggle_out_of_range() {
        let repo = repository();
        let mut screen = EventListScreen::new(feed());

        let result = screen.toggle(&repo, 7).await;
        assert!(matches!(result, Err(ScreenError::NoSuchEvent(7))));
        assert_eq!(repo.count().await, 0);
    }

    #[tokio::test]
    async fn test_screens_follow_each_other() {
        let repo = repository();

        let mut events = Mounted::mount(EventListScreen::new(feed()), &repo).await.value;
        let mut saved = Mounted::mount(FavouritesScreen::new(), &repo).await.value;
        let mut profile = Mounted::mount(ProfileScreen::new(), &repo).await.value;

        let _ = events.view_mut().toggle(&repo, 0).await.unwrap();
        let _ = events.view_mut().toggle(&repo, 2).await.unwrap();

        assert!(saved.sync());
        assert!(profile.sync());
        assert_eq!(saved.view().entries().len(), 2);
        assert_eq!(profile.view().favourite_count(), 2);

        let _ = saved.view_mut().remove(&repo, EventKey::new(216, 1)).await;

        assert!(events.sync());
        assert!(profile.sync());
        assert!(!events.view().is_favourite(EventKey::new(216, 1)));
        assert!(events.view().is_favourite(EventKey::new(218, 3)));
        assert_eq!(profile.view().favourite_count(), 1);

        // Nothing new since the last sync
        assert!(!profile.sync());
    }

    #[tokio::test]
    async fn test_unsynced_view_stays_stale_until_refresh() {
        let repo = repository();
        let mut profile = Mounted::mount(ProfileScreen::new(), &repo).await.value;
        let mut events = EventListScreen::new(feed());

        let _ = events.toggle(&repo, 1).await.unwrap();
        assert_eq!(profile.view().favourite_count(), 0);

        let refreshed = profile.refresh(&repo).await;
        assert!(refreshed.is_clean());
        assert_eq!(profile.view().favourite_count(), 1);
    }

    #[tokio::test]
    async fn test_changed_waits_for_mutation() {
        let repo = Arc::new(repository());
        let mut profile = Mounted::mount(ProfileScreen::new(), &repo).await.value;

        let writer = repo.clone();
        let task = tokio::spawn(async move {
            let _ = writer.add(Event::new(216, 1, "Mondays Social Outdoor")).await;
        });

        assert!(profile.changed().await);
        task.await.unwrap();
        assert_eq!(profile.into_inner().favourite_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_from_favourites_screen_shows_empty_state() {
        let repo = repository();
        let _ = repo.add(feed().remove(0)).await;

        let mut saved = Mounted::mount(FavouritesScreen::new(), &repo).await.value;
        assert!(!saved.view().is_empty());

        let removed = saved.view_mut().remove(&repo, EventKey::new(216, 1)).await;
        assert!(removed.is_clean());
        assert!(saved.view().is_empty());
    }

    #[tokio::test]
    async fn test_mount_after_failed_write_keeps_favourite() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().times(1).returning(|_| Ok(None));
        store
            .expect_set()
            .returning(|_, _| Err(KvError::Unavailable("disk full".to_string())));
        let repo = FavouritesRepository::new(Arc::new(store), FavouritesConfig::default());

        let mut events = Mounted::mount(EventListScreen::new(feed()), &repo).await.value;
        let toggled = events.view_mut().toggle(&repo, 0).await.unwrap();
        assert!(toggled.value);
        assert!(matches!(toggled.condition, Some(PersistenceCondition::WriteFailed(_))));

        let saved = Mounted::mount(FavouritesScreen::new(), &repo).await;
        assert!(saved.value.view().entries().contains(EventKey::new(216, 1)));

        // The second mount must not revert the heart on the first screen
        let _ = events.sync();
        assert!(events.view().is_favourite(EventKey::new(216, 1)));
    }
}
