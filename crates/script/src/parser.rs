use std::path::Path;

use regex::Regex;

use crate::{Error, Speaker, Utterance};

pub const DEFAULT_TAG_A: &str = "大牛";
pub const DEFAULT_TAG_B: &str = "一帆";

/// Extracts `(speaker, text)` utterances from a tagged dialogue script.
///
/// A tag line looks like `【大牛】text` (optionally wrapped in markdown bold,
/// `**【大牛】**text`). Untagged lines continue the current utterance; text
/// before the first tag is ignored.
pub struct ScriptParser {
    tags: [String; 2],
    pattern: Regex,
}

impl ScriptParser {
    pub fn new(tag_a: impl Into<String>, tag_b: impl Into<String>) -> crate::Result<Self> {
        let tags = [tag_a.into(), tag_b.into()];
        for tag in &tags {
            if tag.trim().is_empty() || tag.contains(['【', '】']) {
                return Err(Error::InvalidTag(tag.clone()));
            }
        }
        if tags[0] == tags[1] {
            return Err(Error::InvalidTag(tags[1].clone()));
        }

        let pattern = Regex::new(&format!(
            r"^\**【({}|{})】\**\s*(.*)$",
            regex::escape(&tags[0]),
            regex::escape(&tags[1]),
        ))
        .map_err(|_| Error::InvalidTag(format!("{}|{}", tags[0], tags[1])))?;

        Ok(Self { tags, pattern })
    }

    pub fn tag(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::A => &self.tags[0],
            Speaker::B => &self.tags[1],
        }
    }

    pub fn parse(&self, content: &str) -> Vec<Utterance> {
        let mut utterances = Vec::new();
        let mut current: Option<(Speaker, String)> = None;

        for line in content.lines() {
            let line = line.trim();

            if let Some(caps) = self.pattern.captures(line) {
                if let Some((speaker, text)) = current.take() {
                    push_utterance(&mut utterances, speaker, text);
                }

                let speaker = if &caps[1] == self.tag(Speaker::A) {
                    Speaker::A
                } else {
                    Speaker::B
                };
                let text = caps.get(2).map_or("", |m| m.as_str()).to_string();
                current = Some((speaker, text));
            } else if let Some((_, text)) = current.as_mut()
                && !line.is_empty()
            {
                text.push(' ');
                text.push_str(line);
            }
        }

        if let Some((speaker, text)) = current.take() {
            push_utterance(&mut utterances, speaker, text);
        }

        let count_a = utterances.iter().filter(|u| u.speaker == Speaker::A).count();
        tracing::info!(
            speaker_a = count_a,
            speaker_b = utterances.len() - count_a,
            "script_parsed"
        );

        utterances
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> crate::Result<Vec<Utterance>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let utterances = self.parse(&content);
        if utterances.is_empty() {
            return Err(Error::NoUtterances);
        }
        Ok(utterances)
    }
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_A, DEFAULT_TAG_B).expect("default tags are distinct and non-empty")
    }
}

fn push_utterance(utterances: &mut Vec<Utterance>, speaker: Speaker, text: String) {
    let text = text.trim();
    if !text.is_empty() {
        utterances.push(Utterance::new(speaker, text));
    }
}
