use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AttitudeContextParams {
    #[schemars(description = "Chat key of the conversation to build context for")]
    pub chat_key: String,
}
