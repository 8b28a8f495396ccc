use async_trait::async_trait;
use runbar_core::PresentationSurface;
use runbar_types::{ChoiceItem, ChoiceOptions, NotifyLevel};
use tokio::sync::{mpsc, oneshot};

/// What the launcher asks the interactive UI to show.
pub enum UiRequest {
    Choice {
        items: Vec<ChoiceItem>,
        options: ChoiceOptions,
        reply: oneshot::Sender<Option<Vec<usize>>>,
    },
    Notify {
        message: String,
        level: NotifyLevel,
    },
    Text {
        title: String,
        content: String,
    },
}

/// Forwards presentation calls to the draw loop, which owns the terminal.
#[derive(Clone)]
pub struct TerminalSurface {
    tx: mpsc::UnboundedSender<UiRequest>,
}

impl TerminalSurface {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PresentationSurface for TerminalSurface {
    async fn show_choice(
        &self,
        items: Vec<ChoiceItem>,
        options: ChoiceOptions,
    ) -> anyhow::Result<Option<Vec<usize>>> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(UiRequest::Choice {
                items,
                options,
                reply,
            })
            .map_err(|_| anyhow::anyhow!("launcher UI is closed"))?;
        // a dropped reply means the UI went away mid-choice
        Ok(answer.await.unwrap_or(None))
    }

    async fn notify(&self, message: &str, level: NotifyLevel) {
        let _ = self.tx.send(UiRequest::Notify {
            message: message.to_string(),
            level,
        });
    }

    async fn show_read_only_text(&self, content: &str, title: &str) {
        let _ = self.tx.send(UiRequest::Text {
            title: title.to_string(),
            content: content.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn choice_waits_for_ui_reply() {
        let (surface, mut rx) = TerminalSurface::channel();
        let ui = tokio::spawn(async move {
            match rx.recv().await {
                Some(UiRequest::Choice { items, reply, .. }) => {
                    assert_eq!(items.len(), 2);
                    let _ = reply.send(Some(vec![1]));
                }
                _ => panic!("expected a choice request"),
            }
        });
        let chosen = surface
            .show_choice(
                vec![ChoiceItem::new("a"), ChoiceItem::new("b")],
                ChoiceOptions::default(),
            )
            .await
            .expect("choice");
        assert_eq!(chosen, Some(vec![1]));
        ui.await.expect("ui task");
    }

    #[tokio::test]
    async fn closed_ui_is_an_error_and_dropped_reply_dismisses() {
        let (surface, rx) = TerminalSurface::channel();
        drop(rx);
        assert!(surface
            .show_choice(Vec::new(), ChoiceOptions::default())
            .await
            .is_err());

        let (surface, mut rx) = TerminalSurface::channel();
        let ui = tokio::spawn(async move {
            let request = rx.recv().await;
            drop(request);
        });
        let chosen = surface
            .show_choice(vec![ChoiceItem::new("a")], ChoiceOptions::default())
            .await
            .expect("choice");
        assert_eq!(chosen, None);
        ui.await.expect("ui task");
    }
}
