use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateGroupAttitudeParams {
    #[schemars(description = "Chat key of the group, e.g. 'onebot_v11-group_437383440'")]
    pub chat_key: String,

    #[schemars(description = "New general attitude in this group, e.g. 'relaxed', 'serious'")]
    pub attitude: Option<String>,

    #[schemars(description = "Free-text note or reason tag for the change")]
    pub other: Option<String>,
}
