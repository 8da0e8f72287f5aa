use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateUserAttitudeParams {
    #[schemars(description = "Platform user id of the person this attitude is about")]
    pub user_key: String,

    #[schemars(description = "How to address this user. Omit to keep the current value.")]
    pub nickname: Option<String>,

    #[schemars(description = "New attitude toward the user, e.g. 'friendly', 'cautious', 'cold'")]
    pub attitude: Option<String>,

    #[schemars(description = "New relationship, e.g. 'friend', 'stranger', 'mentor'")]
    pub relationship: Option<String>,

    #[schemars(description = "Free-text note or reason tag for the change")]
    pub other: Option<String>,
}
