use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default, rename = "objectIDs")]
    pub object_ids: Option<Vec<u64>>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtObject {
    #[serde(default, rename = "objectID")]
    pub object_id: u64,
    #[serde(default)]
    pub primary_image_small: String,
    #[serde(default)]
    pub primary_image: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist_display_name: String,
}

impl ArtObject {
    /// Small rendition first, it loads faster.
    pub fn image(&self) -> Option<&str> {
        [&self.primary_image_small, &self.primary_image]
            .into_iter()
            .map(|url| url.trim())
            .find(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteResponse {
    pub content: String,
    pub author: String,
}
