//! Prompt context for the agent's next reply.
//!
//! [`inject`] builds the text block the host prepends to the system prompt: a
//! fixed instruction block telling the agent when to update attitudes, one line
//! per recent sender with a stored record, and a line for the group itself.

use std::str::FromStr;

use crate::attitude::manage::AttitudeService;
use crate::attitude::types::{ChatKey, GroupAttitude, UserAttitude};
use crate::attitude::validate::{inspect, RecordState};
use crate::config::PromptConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptLanguage {
    #[default]
    En,
    Cn,
}

impl FromStr for PromptLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EN" => Ok(Self::En),
            "CN" => Ok(Self::Cn),
            other => Err(format!("unknown prompt language: {other} (expected EN or CN)")),
        }
    }
}

impl PromptLanguage {
    /// Parse a configured value, falling back to English.
    pub fn from_config(value: &str) -> Self {
        value.parse().unwrap_or_else(|e: String| {
            tracing::warn!(error = %e, "falling back to EN prompt language");
            Self::En
        })
    }
}

const INSTRUCTIONS_EN: &str = "\
Attitude Management: check before every reply.

[MANDATORY CHECK] Before generating any response, decide whether an attitude update is needed.
- If the attitude toward a user or this group has changed, call the matching tool first.
- If nothing changed, make an explicit no-update decision and reply.

[TOOLS]
- update_user_attitude(user_key, attitude=\"new attitude\", relationship=\"new role\", other=\"reason tag\")
- update_group_attitude(chat_key, attitude=\"new vibe\", other=\"reason tag\")

[WHEN TO UPDATE A USER]
- Consistent friendly behaviour (thanks, praise, help)
- Repeated hostile behaviour (insults, threats, malice)
- A clear change in relationship (stranger to familiar, friendly to cold)
- Special events (apology, confession, asking for help)

[WHEN TO UPDATE A GROUP]
- A sudden change of atmosphere (active to silent, friendly to hostile)
- Spam floods or malicious behaviour
- The group's topic or nature changes
- Admin attitude or group rules change

[EXAMPLES]
- User attitudes: friendly, cautious, neutral, intimate, cold, hostile
- Relationships: friend, stranger, mentor, student, partner, troublemaker
- Group attitudes: active, serious, relaxed, chaotic, harmonious, tense
";

const INSTRUCTIONS_CN: &str = "\
态度管理：每次回复前必须检查。

【强制检查】生成任何回复之前，先判断是否需要更新态度：
- 如果对某个用户或本群的态度发生变化，先调用对应工具更新
- 如果无需更新，明确做出“无需更新”的决定后再回复

【可用工具】
- update_user_attitude(user_key, attitude=\"新态度\", relationship=\"新关系\", other=\"原因标签\")
- update_group_attitude(chat_key, attitude=\"新氛围\", other=\"原因标签\")

【用户态度更新条件】
- 连续的友善行为（感谢、赞美、帮助）
- 重复的敌意行为（辱骂、威胁、恶意）
- 明显的关系变化（从陌生到熟悉、从友好到冷淡）
- 特殊事件（道歉、表白、求助）

【群组态度更新条件】
- 群体氛围突然转变（从活跃到沉默、从友好到敌对）
- 大量刷屏或恶意行为
- 群组话题或性质发生变化
- 管理员态度或群规变化

【示例】
- 用户态度：友好、警惕、中性、亲密、冷淡、敌对
- 用户关系：朋友、陌生人、导师、学生、合作伙伴、麻烦制造者
- 群组态度：活跃、严肃、轻松、混乱、和谐、紧张
";

pub fn instruction_block(language: PromptLanguage) -> &'static str {
    match language {
        PromptLanguage::En => INSTRUCTIONS_EN,
        PromptLanguage::Cn => INSTRUCTIONS_CN,
    }
}

pub fn render_user_prompt(user: &UserAttitude) -> String {
    let mut line = format!(
        "For user {} (ID: {}), your attitude should be {}. Their relationship to you is {}. Additional notes: {}.",
        user.username, user.user_id, user.attitude, user.relationship, user.other
    );
    if !user.nickname.is_empty() {
        line.push_str(&format!(" Address them as {}.", user.nickname));
    }
    line
}

pub fn render_group_prompt(group: &GroupAttitude) -> String {
    format!(
        "In the group chat '{}' (ID: {}), your general attitude should be {}. Additional notes for this group: {}.",
        group.channel_name, group.group_id, group.attitude, group.other
    )
}

/// Build the prompt block for `chat_key`.
///
/// Never fails. If the channel cannot be found or its messages cannot be read,
/// the instruction block is returned alone. Records that are missing or do not
/// decode are left out.
pub async fn inject(service: &AttitudeService, config: &PromptConfig, chat_key: &str) -> String {
    let instructions = instruction_block(PromptLanguage::from_config(&config.language));
    let mut parts = vec![instructions.to_string()];

    let channel = match service.directory().channel(chat_key).await {
        Ok(Some(channel)) => channel,
        Ok(None) => {
            tracing::warn!(chat_key = %chat_key, "chat channel not found, injecting instructions only");
            return instructions.to_string();
        }
        Err(e) => {
            tracing::error!(chat_key = %chat_key, error = %e, "channel lookup failed, injecting instructions only");
            return instructions.to_string();
        }
    };

    let now = chrono::Utc::now().timestamp();
    let since = (now - config.context_expire_seconds).max(channel.conversation_start);
    let senders = match service
        .directory()
        .recent_senders(chat_key, since, config.context_max_messages)
        .await
    {
        Ok(senders) => senders,
        Err(e) => {
            tracing::error!(chat_key = %chat_key, error = %e, "failed to read recent messages, injecting instructions only");
            return instructions.to_string();
        }
    };
    tracing::debug!(chat_key = %chat_key, senders = senders.len(), "collected recent senders");

    for sender in &senders {
        if let Some(user) = read_record::<UserAttitude>(service, sender).await {
            parts.push(render_user_prompt(&user));
        }
    }

    if let Ok(key) = ChatKey::parse(chat_key) {
        if let Some(group) = read_record::<GroupAttitude>(service, &key.channel_id).await {
            parts.push(render_group_prompt(&group));
        }
    }

    let injected = parts.join("\n");
    tracing::debug!(chat_key = %chat_key, len = injected.len(), "attitude context assembled");
    injected
}

async fn read_record<R>(service: &AttitudeService, key: &str) -> Option<R>
where
    R: crate::attitude::types::AttitudeRecord,
{
    match inspect::<R>(service.store(), key).await {
        Ok(RecordState::Valid(record)) => Some(record),
        Ok(RecordState::Missing) => None,
        Ok(RecordState::Malformed { error, .. }) => {
            tracing::error!(kind = R::KIND, key = %key, error = %error, "stored record is malformed, left out of prompt");
            None
        }
        Err(e) => {
            tracing::error!(kind = R::KIND, key = %key, error = %e, "failed to read record for prompt");
            None
        }
    }
}
