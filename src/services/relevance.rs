//! Boolean keyword relevance filter
//!
//! Term groups form a conjunctive query: every group must contribute at least
//! one matching phrase. A phrase matches when each of its whitespace-separated
//! words occurs somewhere in the lowercased `title abstract` text.

use serde::{Deserialize, Serialize};

/// Ordered term groups, AND across groups and OR within a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermGroups(pub Vec<Vec<String>>);

impl TermGroups {
    pub fn new(groups: Vec<Vec<String>>) -> Self {
        Self(groups)
    }

    /// An empty query means "no filter"; callers skip matching entirely.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.0
    }

    pub fn matches(&self, title: &str, r#abstract: &str) -> bool {
        is_relevant(title, r#abstract, &self.0)
    }
}

impl From<Vec<Vec<&str>>> for TermGroups {
    fn from(groups: Vec<Vec<&str>>) -> Self {
        Self(
            groups
                .into_iter()
                .map(|group| group.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

/// True iff every group has a phrase whose words all appear in the text.
pub fn is_relevant<S: AsRef<str>>(title: &str, r#abstract: &str, groups: &[Vec<S>]) -> bool {
    let search_space = format!("{} {}", title.to_lowercase(), r#abstract.to_lowercase());

    groups
        .iter()
        .all(|group| group.iter().any(|phrase| phrase_matches(&search_space, phrase.as_ref())))
}

fn phrase_matches(search_space: &str, phrase: &str) -> bool {
    let phrase = phrase.to_lowercase();
    let mut words = phrase.split_whitespace().peekable();

    // A blank phrase carries no words and never matches
    if words.peek().is_none() {
        return false;
    }
    words.all(|word| search_space.contains(word))
}
