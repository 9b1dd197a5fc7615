use serde::{Deserialize, Serialize};

/// A user-defined group of allergies ("Fruit", "Meat", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergyCategory {
    pub title: String,
    #[serde(default)]
    pub items: Vec<String>,
    /// Display order; assigned at creation.
    #[serde(default)]
    pub position: u32,
}

impl AllergyCategory {
    pub fn new(title: impl Into<String>, position: u32) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
            position,
        }
    }

    /// Titles are unique per user without regard to case.
    pub fn has_title(&self, title: &str) -> bool {
        self.title.to_lowercase() == title.trim().to_lowercase()
    }
}
