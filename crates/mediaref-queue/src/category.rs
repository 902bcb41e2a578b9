//! Category inference from placeholder text
//!
//! Narrows provider searches with a keyword table. The description is
//! checked before the surrounding context, so "a dog on a beach" inside a
//! travel page still searches animals.

use mediaref_client::Category;

const KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Animals, &["dog", "cat", "bird", "horse", "animal", "pet", "wildlife", "puppy", "kitten", "fish"]),
    (Category::Food, &["food", "meal", "dish", "restaurant", "coffee", "pizza", "bread", "fruit", "cake", "breakfast"]),
    (Category::Transportation, &["car", "bicycle", "bike", "train", "plane", "bus", "truck", "boat", "ship", "motorcycle"]),
    (Category::Buildings, &["building", "house", "architecture", "skyscraper", "office building", "interior", "bridge"]),
    (Category::Nature, &["forest", "mountain", "ocean", "sea", "river", "lake", "flower", "tree", "sunset", "landscape", "waves"]),
    (Category::People, &["person", "people", "woman", "man", "child", "team", "portrait", "family", "crowd"]),
    (Category::Business, &["business", "meeting", "startup", "finance", "workplace", "corporate"]),
    (Category::Computer, &["computer", "laptop", "code", "software", "technology", "server", "keyboard"]),
    (Category::Sports, &["sport", "football", "soccer", "tennis", "running", "gym", "fitness", "basketball"]),
    (Category::Music, &["music", "guitar", "piano", "concert", "band", "singer"]),
    (Category::Travel, &["travel", "vacation", "beach", "tourism", "holiday", "hotel"]),
    (Category::Places, &["city", "street", "town", "skyline", "village"]),
    (Category::Health, &["health", "doctor", "hospital", "medical", "wellness", "yoga"]),
    (Category::Education, &["school", "education", "student", "classroom", "book", "university"]),
    (Category::Science, &["science", "laboratory", "lab", "microscope", "space", "research"]),
    (Category::Fashion, &["fashion", "clothing", "dress", "model", "shoes", "style"]),
    (Category::Industry, &["factory", "industry", "industrial", "construction", "warehouse"]),
    (Category::Backgrounds, &["background", "texture", "pattern", "abstract", "wallpaper", "gradient"]),
    (Category::Feelings, &["happy", "sad", "love", "emotion", "joy", "smile"]),
    (Category::Religion, &["church", "temple", "religion", "prayer", "mosque"]),
];

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn best_match(text: &str) -> Option<Category> {
    let words = words(text);
    if words.is_empty() {
        return None;
    }
    let joined = format!(" {} ", words.join(" "));
    let mut best: Option<(Category, usize)> = None;
    for (category, keywords) in KEYWORDS {
        let hits = keywords
            .iter()
            .filter(|kw| joined.contains(&format!(" {kw} ")) || joined.contains(&format!(" {kw}s ")))
            .count();
        if hits > 0 && best.map_or(true, |(_, n)| hits > n) {
            best = Some((*category, hits));
        }
    }
    best.map(|(category, _)| category)
}

/// Best-guess provider category for a placeholder
///
/// Ties go to the category listed first in the keyword table.
#[must_use]
pub fn infer_category(description: &str, context: &str) -> Option<Category> {
    best_match(description).or_else(|| best_match(context))
}
