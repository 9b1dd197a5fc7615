use async_trait::async_trait;

use crate::allergies::{AllergyBook, AllergyError};
use crate::auth::Identity;
use crate::models::AllergyCategory;
use crate::screen::{ScreenController, ScreenModel};
use crate::store::{DocumentBackend, DocumentId, Record};

pub type AllergyScreen<B> = ScreenController<AllergyScreenModel<B>>;

/// The two forms the allergy screen opens.
#[derive(Debug, Clone, PartialEq)]
pub enum AllergyDraft {
    Category { title: String },
    Item { category: DocumentId, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllergyRemoval {
    pub category: DocumentId,
    pub index: usize,
}

pub struct AllergyScreenModel<B> {
    book: AllergyBook<B>,
}

impl<B: DocumentBackend> AllergyScreenModel<B> {
    pub fn new(book: AllergyBook<B>) -> Self {
        Self { book }
    }
}

impl<B: DocumentBackend> AllergyScreen<B> {
    pub fn for_book(book: AllergyBook<B>) -> Self {
        ScreenController::new(AllergyScreenModel::new(book))
    }

    /// Open the "add allergy" form for the category at `index`.
    pub fn start_add_item(&mut self, index: usize) -> Result<(), super::ScreenStateError> {
        let category = self
            .items()
            .get(index)
            .map(|c| c.id.clone())
            .ok_or(super::ScreenStateError::NoSuchItem(index))?;
        self.start_with(AllergyDraft::Item {
            category,
            name: String::new(),
        })
    }
}

#[async_trait]
impl<B: DocumentBackend> ScreenModel for AllergyScreenModel<B> {
    type Item = Record<AllergyCategory>;
    type Draft = AllergyDraft;
    type Removal = AllergyRemoval;
    type Error = AllergyError;

    fn blank_draft(&self) -> AllergyDraft {
        AllergyDraft::Category {
            title: String::new(),
        }
    }

    // Categories are append-only.
    fn edit_draft(&self, _item: &Record<AllergyCategory>) -> Option<(DocumentId, AllergyDraft)> {
        None
    }

    /// First load of an empty account writes the default categories.
    async fn load(&self, identity: &Identity) -> Result<Vec<Record<AllergyCategory>>, AllergyError> {
        self.book.seed_defaults(identity).await?;
        self.book.categories(identity).await
    }

    async fn save(
        &self,
        identity: &Identity,
        draft: &AllergyDraft,
        _editing: Option<&DocumentId>,
    ) -> Result<(), AllergyError> {
        match draft {
            AllergyDraft::Category { title } => {
                self.book.add_category(identity, title).await?;
            }
            AllergyDraft::Item { category, name } => {
                self.book.add_item(identity, category, name).await?;
            }
        }
        Ok(())
    }

    async fn remove(&self, identity: &Identity, removal: &AllergyRemoval) -> Result<(), AllergyError> {
        self.book
            .remove_item(identity, &removal.category, removal.index)
            .await?;
        Ok(())
    }

    fn saved_message(&self, draft: &AllergyDraft, _edited: bool) -> String {
        match draft {
            AllergyDraft::Category { .. } => "Category added".into(),
            AllergyDraft::Item { .. } => "Allergy added".into(),
        }
    }

    fn removed_message(&self, _removal: &AllergyRemoval) -> String {
        "Allergy removed".into()
    }
}
