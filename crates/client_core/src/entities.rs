//! Per-entity list endpoints and the record accessors the coordinator needs
//! for client-side filtering.

use std::{borrow::Cow, marker::PhantomData};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use shared::{
    domain::{Acta, Equipment, HistoryEntry, User},
    protocol::{ListRequest, ListResult},
};
use crate::{
    coordinator::{ListBackend, ListItem, SearchStrategy},
    error::ClientResult,
    InventoryClient,
};

#[derive(Debug)]
pub struct EntityKind {
    pub name: &'static str,
    pub path: &'static str,
    pub filter_keys: &'static [&'static str],
    pub search: SearchStrategy,
}

pub static EQUIPMENT: EntityKind = EntityKind {
    name: "equipment",
    path: "equipment",
    filter_keys: &["status", "type"],
    search: SearchStrategy::Remote,
};

pub static USERS: EntityKind = EntityKind {
    name: "users",
    path: "users",
    filter_keys: &["status", "area"],
    search: SearchStrategy::Remote,
};

pub static HISTORY: EntityKind = EntityKind {
    name: "history",
    path: "history",
    filter_keys: &["active", "usage_type"],
    search: SearchStrategy::Remote,
};

// Actas have no search endpoint; the term is matched against the loaded page.
pub static ACTAS: EntityKind = EntityKind {
    name: "actas",
    path: "actas",
    filter_keys: &["status"],
    search: SearchStrategy::LocalText,
};

pub struct HttpListBackend<T> {
    client: InventoryClient,
    entity: &'static EntityKind,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HttpListBackend<T> {
    pub fn new(client: InventoryClient, entity: &'static EntityKind) -> Self {
        Self {
            client,
            entity,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T> ListBackend for HttpListBackend<T>
where
    T: ListItem + DeserializeOwned,
{
    type Item = T;

    fn entity(&self) -> &str {
        self.entity.name
    }

    fn filter_keys(&self) -> &[&'static str] {
        self.entity.filter_keys
    }

    fn search_strategy(&self) -> SearchStrategy {
        self.entity.search
    }

    async fn list(&self, request: &ListRequest) -> ClientResult<ListResult<T>> {
        self.client.list_entities(self.entity, request).await
    }

    async fn search(&self, term: &str) -> ClientResult<Vec<T>> {
        debug_assert_eq!(
            self.entity.search,
            SearchStrategy::Remote,
            "{} has no search endpoint",
            self.entity.name
        );
        self.client.search_entities(self.entity, term).await
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn any_contains<'a>(fields: impl IntoIterator<Item = Option<&'a str>>, needle: &str) -> bool {
    let needle = needle.trim();
    !needle.is_empty() && fields.into_iter().flatten().any(|f| contains_ci(f, needle))
}

impl ListItem for Equipment {
    fn filter_value(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            "type" => Some(Cow::Borrowed(self.equipment_type.as_str())),
            _ => None,
        }
    }
}

impl ListItem for User {
    fn filter_value(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            "area" => Some(Cow::Borrowed(self.area.as_str())),
            _ => None,
        }
    }
}

impl ListItem for HistoryEntry {
    fn filter_value(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "active" => Some(Cow::Borrowed(if self.active { "true" } else { "false" })),
            "usage_type" => Some(Cow::Borrowed(self.usage_type.as_str())),
            _ => None,
        }
    }
}

impl ListItem for Acta {
    fn filter_value(&self, key: &str) -> Option<Cow<'_, str>> {
        match key {
            "status" => Some(Cow::Borrowed(self.status.as_str())),
            _ => None,
        }
    }

    fn matches_text(&self, needle: &str) -> bool {
        any_contains(
            [Some(self.title.as_str()), self.description.as_deref()],
            needle,
        )
    }
}

#[cfg(test)]
#[path = "tests/entities_tests.rs"]
mod tests;
