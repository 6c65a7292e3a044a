use std::cmp::Ordering;

use crate::models;

/// Records that a [`Feed`] can find again after they change.
pub trait Keyed {
    fn key(&self) -> i64;
}

impl Keyed for models::CleanupLog {
    fn key(&self) -> i64 { self.id }
}

impl Keyed for models::HazardReport {
    fn key(&self) -> i64 { self.id }
}

impl Keyed for models::PlantPost {
    fn key(&self) -> i64 { self.id }
}

impl Keyed for models::CommunityEvent {
    fn key(&self) -> i64 { self.id }
}

impl Keyed for models::LeaderboardEntry {
    fn key(&self) -> i64 { self.user_id }
}

/// In-memory copy of one list read from the store.
///
/// A failed refresh keeps whatever was there before. Single records can be swapped in by key
/// after a write, without re-reading the whole list.
pub struct Feed<T> {
    name: &'static str,
    items: Vec<T>,
    order: fn(&T, &T) -> Ordering,
}

impl<T: Keyed> Feed<T> {
    pub fn new(name: &'static str, order: fn(&T, &T) -> Ordering) -> Self {
        Self { name, items: Vec::new(), order }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, key: i64) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    /// Replaces the items with a fresh read, or logs the failure and keeps the stale items.
    pub fn refresh<E: std::fmt::Display>(&mut self, fetched: Result<Vec<T>, E>) -> &[T] {
        match fetched {
            Ok(items) => {
                log::debug!("[refresh] Loaded {} {}.", items.len(), self.name);
                self.items = items;
            }
            Err(err) => {
                log::error!(
                    "[refresh] Could not fetch {}: {err}. Keeping {} stale entries.",
                    self.name,
                    self.items.len()
                );
            }
        }

        &self.items
    }

    /// Inserts `item`, or replaces the item with the same key, keeping the feed ordered.
    pub fn upsert(&mut self, item: T) {
        match self.items.iter().position(|existing| existing.key() == item.key()) {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
        self.items.sort_by(self.order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        label: &'static str,
    }

    impl Keyed for Item {
        fn key(&self) -> i64 { self.id }
    }

    fn item(id: i64, label: &'static str) -> Item {
        Item { id, label }
    }

    fn newest_first(a: &Item, b: &Item) -> Ordering {
        b.id.cmp(&a.id)
    }

    #[test]
    fn failed_refresh_keeps_stale_items() {
        let mut feed = Feed::<Item>::new("items", newest_first);

        feed.refresh(Ok::<_, String>(vec![item(2, "b"), item(1, "a")]));
        feed.refresh(Err(String::from("connection reset")));

        assert_eq!(feed.items(), &[item(2, "b"), item(1, "a")]);
    }

    #[test]
    fn upsert_replaces_by_key_and_keeps_order() {
        let mut feed = Feed::<Item>::new("items", newest_first);
        feed.refresh(Ok::<_, String>(vec![item(2, "b"), item(1, "a")]));

        feed.upsert(item(3, "c"));
        feed.upsert(item(1, "a2"));

        assert_eq!(feed.items(), &[item(3, "c"), item(2, "b"), item(1, "a2")]);
        assert_eq!(feed.get(1).map(|i| i.label), Some("a2"));
        assert_eq!(feed.get(4), None);
    }
}
