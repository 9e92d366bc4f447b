use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Validated claims about the human behind one connection.
pub struct Identity {
    /// Email-like subject matched against the allow-list.
    pub subject: String,
    pub issuer: String,
    pub audience: String,
    /// Provider-stable account id (`sub`), when the provider reports one.
    pub account_id: Option<String>,
    pub expires_unix: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Static set of authorized subjects, compared by exact string match.
pub struct AllowList {
    subjects: BTreeSet<String>,
}

impl AllowList {
    pub fn new<I, S>(subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a list from a comma-separated operator value.
    pub fn from_comma_list(raw: &str) -> Self {
        Self::new(relay_core::split_comma_list(raw))
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.subjects.contains(subject)
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}
