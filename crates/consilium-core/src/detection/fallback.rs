//! Deterministic keyword scoring used when the classifier cannot be trusted.

use crate::registry::RoleRegistry;

/// Keywords and weight owned by one role.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordEntry {
    pub role: String,
    pub keywords: Vec<String>,
    pub weight: f32,
}

impl KeywordEntry {
    pub fn new(role: &str, keywords: &[&str], weight: f32) -> Self {
        Self {
            role: role.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            weight,
        }
    }

    /// Sum of `weight` over every keyword occurring in `text` (already lowercase).
    fn score(&self, text: &str) -> f32 {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty() && text.contains(k.as_str()))
            .count() as f32
            * self.weight
    }
}

/// Ordered keyword table.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTable {
    entries: Vec<KeywordEntry>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            entries: vec![
                KeywordEntry::new(
                    "recherche",
                    &["information", "données", "étude", "recherche", "statistiques", "faits"],
                    1.0,
                ),
                KeywordEntry::new(
                    "conseil",
                    &["stress", "moral", "émotion", "confiance", "solitude", "soutien", "relation"],
                    1.2,
                ),
                KeywordEntry::new(
                    "organisation",
                    &["plan", "organisation", "temps", "projet", "logistique", "routine"],
                    1.0,
                ),
                KeywordEntry::new(
                    "créatif",
                    &["idée", "créatif", "innovation", "inspiration", "concept", "brainstorming"],
                    1.0,
                ),
                KeywordEntry::new(
                    "coach",
                    &["productivité", "efficacité", "procrastination", "motivation", "discipline"],
                    1.0,
                ),
                KeywordEntry::new(
                    "coachpro",
                    &["carrière", "leadership", "professionnel", "compétences", "performance"],
                    1.0,
                ),
            ],
        }
    }
}

impl KeywordTable {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The built-in table extended with keywords declared by registered roles.
    ///
    /// A role already in the table gains the extra keywords under its existing
    /// weight; an unknown role gets a new entry with its declared weight.
    pub fn for_registry(registry: &RoleRegistry) -> Self {
        let mut table = Self::default();
        for role in registry.roles().filter(|r| !r.keywords().is_empty()) {
            let keywords: Vec<&str> = role.keywords().iter().map(String::as_str).collect();
            table.extend(role.id(), &keywords, role.keyword_weight());
        }
        table
    }

    pub fn extend(&mut self, role: &str, keywords: &[&str], weight: f32) {
        match self.entries.iter_mut().find(|e| e.role == role) {
            Some(entry) => entry
                .keywords
                .extend(keywords.iter().map(|k| k.to_lowercase())),
            None => self.entries.push(KeywordEntry::new(role, keywords, weight)),
        }
    }

    /// Roles with a positive score, best first. Ties keep table order.
    pub fn rank(&self, text: &str) -> Vec<(String, f32)> {
        let text = text.to_lowercase();
        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .map(|e| (e.role.clone(), e.score(&text)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
    }
}
