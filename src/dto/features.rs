use serde::Serialize;
use utoipa::ToSchema;

use crate::state::features::Features;

/// Feature switches the front-end uses to show optional sections.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeaturesResponse {
    pub donations: bool,
}

impl From<Features> for FeaturesResponse {
    fn from(value: Features) -> Self {
        Self {
            donations: value.donations,
        }
    }
}
