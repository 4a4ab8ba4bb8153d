/// One of the two dialogue lanes. Every utterance, segment and synthesis
/// producer belongs to exactly one lane.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    pub const ALL: [Speaker; 2] = [Speaker::A, Speaker::B];

    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::A => "a",
            Speaker::B => "b",
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

impl Utterance {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// A bounded chunk of one utterance. `index` is unique across the whole
/// script and its order is the script order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub index: u64,
    pub speaker: Speaker,
    pub text: String,
}
