//! Request and response types for the analysis endpoint

use serde::{Deserialize, Serialize};

// =============================================================================
// Analysis Types
// =============================================================================

/// Response body of `POST /analyze`
///
/// ```json
/// { "health_status": "...", "images": { "NDVI": "/static/ndvi.png" } }
/// ```
///
/// `images` keeps the order the entries appear in the response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub health_status: String,
    #[serde(with = "ordered_images")]
    pub images: Vec<ImageLink>,
}

impl AnalysisResult {
    /// Look up an image URL by name
    pub fn image(&self, name: &str) -> Option<&str> {
        self.images
            .iter()
            .find(|link| link.name == name)
            .map(|link| link.url.as_str())
    }
}

/// One named result image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLink {
    pub name: String,
    pub url: String,
}

impl ImageLink {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// (De)serializes `images` as a JSON object while preserving entry order.
mod ordered_images {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::ImageLink;

    pub fn serialize<S>(images: &[ImageLink], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(images.len()))?;
        for link in images {
            map.serialize_entry(&link.name, &link.url)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<ImageLink>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ImagesVisitor)
    }

    struct ImagesVisitor;

    impl<'de> Visitor<'de> for ImagesVisitor {
        type Value = Vec<ImageLink>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of image names to URLs")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut images: Vec<ImageLink> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, url)) = access.next_entry::<String, String>()? {
                // A repeated key keeps its first position and takes the last value
                match images.iter_mut().find(|link| link.name == name) {
                    Some(existing) => existing.url = url,
                    None => images.push(ImageLink { name, url }),
                }
            }
            Ok(images)
        }
    }
}
