use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;

use crate::capabilities::PerformancePredictor;
use crate::error::CapabilityError;
use crate::models::{PerformancePrediction, PlatformContent, PlatformMetrics};

const INSIGHTS: [&str; 4] = [
    "Adding personal artisan stories may increase engagement by 25%",
    "Posts with traditional crafting techniques get 3.2x more shares",
    "Your audience responds best to earthy color palettes",
    "Local cultural references improve conversion rates by 18%",
];

/// Stand-in for a trained engagement model. Numbers are random draws shaped
/// by caption length, hashtag count and category; nothing here is learned.
pub struct SimulatedPredictor {
    rng: Mutex<StdRng>,
}

impl SimulatedPredictor {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    #[cfg(test)]
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }

    fn platform_metrics(&self, platform: &str, caption_len: usize, hashtag_count: usize, category: &str) -> PlatformMetrics {
        let mut rng = self.rng.lock();

        let base: f64 = rng.gen_range(3.0..5.0);
        let engagement_rate = round1(base * category_boost(category) * hashtag_multiplier(hashtag_count) * caption_optimality(platform, caption_len));

        let estimated_reach: u32 = rng.gen_range(1000..3000);
        let click_rate = round1(rng.gen_range(1.0..6.0));
        let expected_clicks = (f64::from(estimated_reach) * click_rate / 100.0).floor() as u32;
        let change = round1(rng.gen_range(-0.5..1.5));

        let (times, day) = posting_window(platform);
        PlatformMetrics {
            engagement_rate,
            estimated_reach,
            click_rate,
            expected_clicks,
            optimal_time: times[0].to_string(),
            optimal_day: day.to_string(),
            all_optimal_times: times.iter().map(|t| t.to_string()).collect(),
            change,
        }
    }
}

impl Default for SimulatedPredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PerformancePredictor for SimulatedPredictor {
    async fn predict(&self, content: &PlatformContent, category: &str) -> Result<PerformancePrediction, CapabilityError> {
        let platforms: BTreeMap<String, PlatformMetrics> = content.platforms.iter()
            .map(|(name, post)| {
                let metrics = self.platform_metrics(name, post.caption.chars().count(), post.hashtags.len(), category);
                (name.clone(), metrics)
            })
            .collect();

        Ok(PerformancePrediction {
            platforms,
            insights: INSIGHTS.iter().map(|s| s.to_string()).collect(),
        })
    }
}

fn category_boost(category: &str) -> f64 {
    match category.trim().to_lowercase().as_str() {
        "pottery" => 1.2,
        "textile" => 1.3,
        "jewelry" => 1.4,
        _ => 1.0,
    }
}

/// More hashtags generally boost reach, but too many read as spam.
fn hashtag_multiplier(count: usize) -> f64 {
    match count {
        c if c > 15 => 0.9,
        c if c > 10 => 1.2,
        c if c > 5 => 1.5,
        _ => 1.0,
    }
}

fn caption_optimality(platform: &str, len: usize) -> f64 {
    match platform {
        "instagram" if len < 300 => 1.3,
        "facebook" if len > 200 => 1.2,
        "linkedin" if len > 150 => 1.2,
        _ => 0.9,
    }
}

fn posting_window(platform: &str) -> ([&'static str; 3], &'static str) {
    match platform {
        "instagram" => (["7:00 PM", "9:00 AM", "1:00 PM"], "Saturday"),
        "facebook" => (["3:00 PM", "9:00 AM", "7:00 PM"], "Sunday"),
        "linkedin" => (["9:00 AM", "12:00 PM", "5:00 PM"], "Tuesday"),
        _ => (["12:00 PM", "6:00 PM", "9:00 AM"], "Friday"),
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
