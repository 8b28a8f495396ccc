use async_trait::async_trait;
use runbar_types::{ChoiceItem, ChoiceOptions, NotifyLevel};

/// Whatever renders pick lists, notices and read-only text for the user.
#[async_trait]
pub trait PresentationSurface: Send + Sync {
    /// Presents `items` and waits for the user. Returns the indices of the
    /// chosen items, or `None` when the list was dismissed. Separators are
    /// never chosen.
    async fn show_choice(
        &self,
        items: Vec<ChoiceItem>,
        options: ChoiceOptions,
    ) -> anyhow::Result<Option<Vec<usize>>>;

    async fn notify(&self, message: &str, level: NotifyLevel);

    async fn show_read_only_text(&self, content: &str, title: &str);
}
