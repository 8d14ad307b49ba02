use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::GoogleApi;
use crate::capabilities::ImageAnalyzer;
use crate::error::CapabilityError;
use crate::models::{DetectedObject, DominantColor, ImageAnalysis, ImageLabel, SafeSearch};

pub struct VisionClient {
    api: GoogleApi,
    base_url: String,
}

impl VisionClient {
    pub fn new(api: GoogleApi, base_url: String) -> Self {
        Self { api, base_url }
    }
}

#[async_trait]
impl ImageAnalyzer for VisionClient {
    async fn detect_labels_and_colors(&self, image_url: &str) -> Result<ImageAnalysis, CapabilityError> {
        if self.api.is_demo() {
            info!("Using demo mode - no image analysis for {}", image_url);
            return Ok(ImageAnalysis::default());
        }

        let body = json!({
            "requests": [{
                "image": { "source": { "imageUri": image_url } },
                "features": [
                    { "type": "LABEL_DETECTION", "maxResults": 10 },
                    { "type": "IMAGE_PROPERTIES", "maxResults": 5 },
                    { "type": "SAFE_SEARCH_DETECTION" },
                    { "type": "OBJECT_LOCALIZATION", "maxResults": 5 },
                    { "type": "TEXT_DETECTION" }
                ]
            }]
        });

        let url = format!("{}/images:annotate", self.base_url);
        let response: AnnotateResponse = self.api.post_json(&url, &body).await?;
        let analysis = into_analysis(response)?;
        info!("🖼️ Vision found {} labels, {} colors, {} objects", analysis.labels.len(), analysis.colors.len(), analysis.objects.len());
        Ok(analysis)
    }
}

fn into_analysis(response: AnnotateResponse) -> Result<ImageAnalysis, CapabilityError> {
    let result = response.responses.into_iter().next()
        .ok_or_else(|| CapabilityError::MalformedResponse("empty annotate response".into()))?;
    if let Some(err) = result.error {
        return Err(CapabilityError::Other(format!("vision annotate failed: {}", err.message)));
    }

    let labels = result.label_annotations.into_iter()
        .map(|l| ImageLabel { description: l.description, score: l.score })
        .collect();

    let colors = result.image_properties_annotation
        .map(|p| p.dominant_colors.colors)
        .unwrap_or_default()
        .into_iter()
        .map(|c| DominantColor {
            red: channel(c.color.red),
            green: channel(c.color.green),
            blue: channel(c.color.blue),
            score: c.score,
            pixel_fraction: c.pixel_fraction,
        })
        .collect();

    let objects = result.localized_object_annotations.into_iter()
        .map(|o| DetectedObject { name: o.name, score: o.score })
        .collect();

    let text = result.text_annotations.into_iter().next()
        .map(|t| t.description)
        .unwrap_or_default();

    Ok(ImageAnalysis { labels, colors, objects, text, safe_search: result.safe_search_annotation })
}

fn channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct AnnotateResult {
    label_annotations: Vec<Label>,
    image_properties_annotation: Option<ImageProperties>,
    safe_search_annotation: Option<SafeSearch>,
    localized_object_annotations: Vec<LocalizedObject>,
    text_annotations: Vec<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Label {
    description: String,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageProperties {
    #[serde(default)]
    dominant_colors: DominantColors,
}

#[derive(Debug, Deserialize, Default)]
struct DominantColors {
    #[serde(default)]
    colors: Vec<ColorInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColorInfo {
    #[serde(default)]
    color: Rgb,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    pixel_fraction: f32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Rgb {
    red: f32,
    green: f32,
    blue: f32,
}

#[derive(Debug, Deserialize)]
struct LocalizedObject {
    name: String,
    #[serde(default)]
    score: f32,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_annotate_response() {
        let raw = r#"{
            "responses": [{
                "labelAnnotations": [{ "description": "Pottery", "score": 0.97 }, { "description": "Earthenware", "score": 0.91 }],
                "imagePropertiesAnnotation": { "dominantColors": { "colors": [
                    { "color": { "red": 181.4, "green": 92.6 }, "score": 0.41, "pixelFraction": 0.22 }
                ]}},
                "safeSearchAnnotation": { "adult": "VERY_UNLIKELY", "violence": "UNLIKELY" },
                "localizedObjectAnnotations": [{ "name": "Vase", "score": 0.8 }],
                "textAnnotations": [{ "description": "KHURJA" }, { "description": "ignored" }]
            }]
        }"#;
        let analysis = into_analysis(serde_json::from_str(raw).unwrap()).unwrap();

        assert_eq!(analysis.labels.len(), 2);
        assert_eq!(analysis.labels[0].description, "Pottery");
        assert_eq!(analysis.colors, vec![DominantColor { red: 181, green: 93, blue: 0, score: 0.41, pixel_fraction: 0.22 }]);
        assert_eq!(analysis.objects[0].name, "Vase");
        assert_eq!(analysis.text, "KHURJA");
        assert_eq!(analysis.safe_search.unwrap().adult, "VERY_UNLIKELY");
    }

    #[test]
    fn per_image_error_is_reported() {
        let raw = r#"{ "responses": [{ "error": { "code": 7, "message": "image fetch denied" } }] }"#;
        let err = into_analysis(serde_json::from_str(raw).unwrap()).unwrap_err();
        assert!(err.to_string().contains("image fetch denied"));
    }
}
