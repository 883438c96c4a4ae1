use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dao::document_store::DocumentKey,
    state::sync::{SyncContext, SyncedDocument},
};

/// Collection holding one document per feature toggle.
pub const FEATURES_COLLECTION: &str = "features";
const DONATIONS_FLAG: &str = "donations";

/// Stored shape of a single toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggle {
    #[serde(default)]
    pub active: bool,
}

/// Feature switches exposed to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Features {
    pub donations: bool,
}

/// Live view over the feature toggle documents.
pub struct FeatureFlags {
    donations: SyncedDocument<FeatureToggle>,
}

impl FeatureFlags {
    /// Open the toggles; they read as inactive until the backend says otherwise.
    pub fn open(context: &SyncContext) -> Self {
        Self {
            donations: context.open(
                DocumentKey::new(FEATURES_COLLECTION, DONATIONS_FLAG),
                FeatureToggle::default(),
            ),
        }
    }

    pub fn current(&self) -> Features {
        Features {
            donations: self.donations.get().active,
        }
    }

    pub async fn wait_loaded(&self) {
        self.donations.wait_loaded().await;
    }
}
