use crate::content::items::_Item;

/// A conversation message. The bridge only ever authors user text.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageItem {
    #[serde(flatten)]
    item: _Item,
    role: MessageRole,
    content: Vec<Content>,
}

impl MessageItem {
    pub fn user_text(text: &str) -> Self {
        Self {
            item: _Item::default(),
            role: MessageRole::User,
            content: vec![Content::InputText {
                text: text.to_string(),
            }],
        }
    }

    pub fn role(&self) -> &MessageRole {
        &self.role
    }

    pub fn content(&self) -> &[Content] {
        &self.content
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    InputText { text: String },
    Text { text: String },
}
