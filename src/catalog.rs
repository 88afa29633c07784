//! Static model catalog served on /v1/models.
//!
//! Upstream has no models endpoint, so the gateway answers with a fixed
//! descriptor list in the OpenAI wire shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
    pub root: String,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<Model>,
}

const MODELS: &[(&str, i64, &str)] = &[
    ("gpt-4", 1687882411, "openai"),
    ("gpt-4-0314", 1687882410, "openai"),
    ("gpt-4-0613", 1686588896, "openai"),
    ("gpt-3.5-turbo", 1677610602, "openai"),
    ("gpt-3.5-turbo-0301", 1677649963, "openai"),
    ("gpt-3.5-turbo-0613", 1686587434, "openai"),
    ("gpt-3.5-turbo-1106", 1698959748, "system"),
    ("gpt-3.5-turbo-16k-0613", 1685474247, "openai"),
    ("text-embedding-ada-002", 1671217299, "openai-internal"),
    ("text-davinci-002", 1649880484, "openai"),
    ("text-davinci-edit-001", 1649809179, "openai"),
    ("code-davinci-edit-001", 1649880484, "openai"),
    ("davinci", 1649359874, "openai"),
    ("curie", 1649359874, "openai"),
    ("babbage", 1649358449, "openai"),
    ("ada", 1649357491, "openai"),
];

pub fn model_list() -> ModelList {
    ModelList {
        object: "list".to_string(),
        data: MODELS
            .iter()
            .map(|&(id, created, owned_by)| Model {
                id: id.to_string(),
                object: "model".to_string(),
                created,
                owned_by: owned_by.to_string(),
                root: id.to_string(),
                parent: None,
            })
            .collect(),
    }
}
