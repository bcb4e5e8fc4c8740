use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Supportive,
    Opposing,
    Neutral,
    Observer,
}

/// A generated persona for one graph entity.
///
/// `user_id` is the entity's 0-based index in the ordered profile list this profile was
/// produced in; callers must preserve list order end-to-end since the external simulation
/// addresses agents by this index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub user_id: usize,
    pub user_name: String,
    pub display_name: String,
    /// <= 200 chars
    pub bio: String,
    pub persona: String,
    pub age: u32,
    pub gender: Gender,
    pub mbti: String,
    pub country: String,
    pub profession: String,
    #[serde(default)]
    pub interests: Vec<String>,
    pub source_entity_uuid: String,
    pub source_entity_type: String,
}

/// Platform-specific persisted representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditProfileRecord {
    pub user_id: usize,
    pub user_name: String,
    pub display_name: String,
    pub bio: String,
    pub persona: String,
    pub age: u32,
    pub gender: Gender,
    pub mbti: String,
    pub country: String,
    pub profession: String,
    pub interests: Vec<String>,
}

impl From<&AgentProfile> for RedditProfileRecord {
    fn from(p: &AgentProfile) -> Self {
        Self {
            user_id: p.user_id,
            user_name: p.user_name.clone(),
            display_name: p.display_name.clone(),
            bio: p.bio.clone(),
            persona: p.persona.clone(),
            age: p.age,
            gender: p.gender,
            mbti: p.mbti.clone(),
            country: p.country.clone(),
            profession: p.profession.clone(),
            interests: p.interests.clone(),
        }
    }
}

/// CSV row schema for `twitter_profiles.csv`: `user_id,name,username,user_char,description`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterProfileRecord {
    pub user_id: usize,
    pub name: String,
    pub username: String,
    pub user_char: String,
    pub description: String,
}

impl From<&AgentProfile> for TwitterProfileRecord {
    fn from(p: &AgentProfile) -> Self {
        Self {
            user_id: p.user_id,
            name: p.display_name.clone(),
            username: p.user_name.clone(),
            user_char: p.persona.clone(),
            description: p.bio.clone(),
        }
    }
}
