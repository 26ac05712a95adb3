use serde::{Deserialize, Serialize};

/// Content type for messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Simple text content
    Text { text: String },
    /// Multimodal content parts
    Parts { parts: Vec<ContentPart> },
}

/// Individual content part (for multimodal messages)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { source: ImageSource },
}

/// Image source for vision models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { data: String, mime_type: String },
    Url { url: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn parts(parts: Vec<ContentPart>) -> Self {
        Self::Parts { parts }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { text } => text.is_empty(),
            Self::Parts { parts } => parts.is_empty(),
        }
    }

    /// Concatenate every text part, skipping non-text parts
    pub fn to_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Parts { parts } => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_base64(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource::Base64 {
                data: data.into(),
                mime_type: mime_type.into(),
            },
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource::Url { url: url.into() },
        }
    }
}

impl ImageSource {
    /// Render as a URL usable by OpenAI-style `image_url` parts
    pub fn to_url(&self) -> String {
        match self {
            Self::Base64 { data, mime_type } => format!("data:{};base64,{}", mime_type, data),
            Self::Url { url } => url.clone(),
        }
    }
}
