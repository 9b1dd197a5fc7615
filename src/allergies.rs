//! Allergy categories: user-titled groups of allergy names.
//!
//! Titles are unique per user without regard to case. Items are appended
//! and removed by position. Categories themselves are never deleted.

use serde_json::json;
use thiserror::Error;

use crate::auth::Identity;
use crate::models::{AllergyCategory, Collection};
use crate::store::{DocumentBackend, DocumentId, Record, RecordStore, StoreError};

/// Categories a fresh account starts with.
pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("Fruit", &["Apple", "Banana", "Strawberry"]),
    ("Vegetables", &["Spinach", "Carrot", "Broccoli"]),
    ("Grains", &["Wheat", "Oats", "Rice"]),
    ("Nuts & Seeds", &["Peanut", "Almond", "Chia Seeds"]),
    ("Animal products", &["Milk", "Cheese", "Eggs"]),
    ("Meat", &["Chicken", "Beef", "Lamb"]),
];

#[derive(Error, Debug)]
pub enum AllergyError {
    #[error("Please enter a category title")]
    BlankTitle,

    #[error("A category named \"{0}\" already exists")]
    DuplicateCategory(String),

    #[error("Please enter an allergy name")]
    BlankItem,

    #[error("Allergy category not found: {0}")]
    CategoryNotFound(DocumentId),

    #[error("No allergy at position {index} (category has {len})")]
    ItemOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AllergyBook<B> {
    store: RecordStore<B>,
}

impl<B: DocumentBackend> AllergyBook<B> {
    pub fn new(store: RecordStore<B>) -> Self {
        Self { store }
    }

    /// Every category, in display order.
    pub async fn categories(
        &self,
        identity: &Identity,
    ) -> Result<Vec<Record<AllergyCategory>>, AllergyError> {
        let mut categories: Vec<Record<AllergyCategory>> =
            self.store.list_all(identity, Collection::Allergies).await?;
        categories.sort_by(|a, b| {
            a.value
                .position
                .cmp(&b.value.position)
                .then_with(|| a.value.title.cmp(&b.value.title))
        });
        Ok(categories)
    }

    /// Create the default categories when the user has none yet.
    /// Returns whether anything was written.
    pub async fn seed_defaults(&self, identity: &Identity) -> Result<bool, AllergyError> {
        if !self.categories(identity).await?.is_empty() {
            return Ok(false);
        }
        for (position, (title, items)) in DEFAULT_CATEGORIES.iter().enumerate() {
            let category = AllergyCategory {
                title: title.to_string(),
                items: items.iter().map(|s| s.to_string()).collect(),
                position: position as u32,
            };
            self.store
                .create(identity, Collection::Allergies, &category)
                .await?;
        }
        tracing::info!(count = DEFAULT_CATEGORIES.len(), "Seeded default allergy categories");
        Ok(true)
    }

    pub async fn add_category(
        &self,
        identity: &Identity,
        title: &str,
    ) -> Result<Record<AllergyCategory>, AllergyError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AllergyError::BlankTitle);
        }
        let existing = self.categories(identity).await?;
        if existing.iter().any(|c| c.value.has_title(title)) {
            return Err(AllergyError::DuplicateCategory(title.to_string()));
        }
        let position = existing
            .iter()
            .map(|c| c.value.position.saturating_add(1))
            .max()
            .unwrap_or(0);
        let category = AllergyCategory::new(title, position);
        let id = self
            .store
            .create(identity, Collection::Allergies, &category)
            .await?;
        Ok(Record { id, value: category })
    }

    async fn load(
        &self,
        identity: &Identity,
        id: &DocumentId,
    ) -> Result<AllergyCategory, AllergyError> {
        self.store
            .get(identity, Collection::Allergies, id)
            .await?
            .ok_or_else(|| AllergyError::CategoryNotFound(id.clone()))
    }

    async fn save_items(
        &self,
        identity: &Identity,
        id: &DocumentId,
        category: &AllergyCategory,
    ) -> Result<(), AllergyError> {
        self.store
            .update(identity, Collection::Allergies, id, &json!({ "items": category.items }))
            .await?;
        Ok(())
    }

    pub async fn add_item(
        &self,
        identity: &Identity,
        id: &DocumentId,
        item: &str,
    ) -> Result<AllergyCategory, AllergyError> {
        let item = item.trim();
        if item.is_empty() {
            return Err(AllergyError::BlankItem);
        }
        let mut category = self.load(identity, id).await?;
        category.items.push(item.to_string());
        self.save_items(identity, id, &category).await?;
        tracing::debug!(category = %category.title, items = category.items.len(), "Allergy added");
        Ok(category)
    }

    pub async fn remove_item(
        &self,
        identity: &Identity,
        id: &DocumentId,
        index: usize,
    ) -> Result<AllergyCategory, AllergyError> {
        let mut category = self.load(identity, id).await?;
        if index >= category.items.len() {
            return Err(AllergyError::ItemOutOfRange {
                index,
                len: category.items.len(),
            });
        }
        category.items.remove(index);
        self.save_items(identity, id, &category).await?;
        Ok(category)
    }
}
