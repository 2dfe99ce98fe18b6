//! Deletion intents accepted by the deletion pipeline.

/// A request to soft-delete several aliases on behalf of one owner.
///
/// Tasks have no identity once submitted: the pipeline decomposes them into
/// individual [`DeleteItem`]s and may spread one task over several flushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub owner_id: String,
    pub aliases: Vec<String>,
}

impl DeleteTask {
    pub fn new<I, S>(owner_id: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner_id: owner_id.into(),
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Splits the task into one item per alias, preserving alias order.
    pub fn into_items(self) -> impl Iterator<Item = DeleteItem> {
        let owner_id = self.owner_id;
        self.aliases.into_iter().map(move |alias| DeleteItem {
            owner_id: owner_id.clone(),
            alias,
        })
    }
}

/// A single (owner, alias) delete intent flowing through the pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItem {
    pub owner_id: String,
    pub alias: String,
}
