use std::collections::BTreeMap;

use crate::models::{PlatformContent, PlatformPost, ProductData};

/// Templated drafts used when the generator's answer cannot be read.
/// Same product data always yields the same content.
pub fn fallback_content(product: &ProductData) -> PlatformContent {
    let title = &product.title;
    let location = &product.location;
    let artisan = &product.artisan_name;
    let category_tag = format!("#{}", capitalize(product.category.trim()).replace(char::is_whitespace, ""));

    let mut platforms = BTreeMap::new();
    platforms.insert("instagram".to_string(), PlatformPost {
        caption: format!("Handcrafted with love and tradition! This beautiful {title} from {location} represents generations of artisanal expertise. Each piece tells a unique story. 🤎 #Handmade #ArtisanCraft"),
        hashtags: tags(&["#Handmade", "#ArtisanCraft", "#IndianHandicraft", "#SupportLocal", "#TraditionalArt", category_tag.as_str(), "#MadeInIndia", "#Sustainable"]),
    });
    platforms.insert("facebook".to_string(), PlatformPost {
        caption: format!("Discover the beauty of traditional craftsmanship with this exquisite {title} from {location}. {artisan} carefully creates each piece using techniques passed down through generations. Every curve, color, and pattern tells the story of our rich cultural heritage. By bringing this piece into your home, you're not just buying a product, you're preserving an ancient art form and supporting a local artisan family."),
        hashtags: tags(&["#Handmade", "#ArtisanCraft", "#CulturalHeritage", "#SupportLocal", "#IndianHandicraft"]),
    });
    platforms.insert("linkedin".to_string(), PlatformPost {
        caption: format!("Proud to showcase this exquisite {title} created by master artisan {artisan} from {location}. Supporting traditional craftspeople not only preserves cultural heritage but also provides sustainable livelihoods in rural communities. Each purchase directly impacts artisan families and helps keep ancient techniques alive for future generations."),
        hashtags: tags(&["#SustainableBusiness", "#ArtisanCraft", "#CulturalHeritage", "#RuralLivelihoods", "#SocialImpact"]),
    });

    PlatformContent { platforms }
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
