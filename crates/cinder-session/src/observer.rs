//! 把广播的消息写入 ThreadStore
//!
//! `on_message` 只做入队，真正的写入在后台任务里按顺序完成，
//! 所以发布方永远不会等待存储。

use std::sync::Arc;

use cinder_core::broadcast::{MessageEvent, MessageObserver, ObserverError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::store::ThreadStore;

enum Command {
    Persist(MessageEvent),
    Flush(oneshot::Sender<()>),
}

pub struct PersistenceObserver {
    tx: mpsc::UnboundedSender<Command>,
}

impl PersistenceObserver {
    /// 启动后台写入任务
    ///
    /// 任务在所有 observer 句柄被释放后结束，返回成功写入的消息数。
    pub fn spawn(store: Arc<dyn ThreadStore>) -> (Arc<Self>, JoinHandle<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(store, rx));
        (Arc::new(Self { tx }), handle)
    }

    /// 等待此前入队的消息全部写完
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

impl MessageObserver for PersistenceObserver {
    fn name(&self) -> &str {
        "persistence"
    }

    fn on_message(&self, event: &MessageEvent) -> Result<(), ObserverError> {
        if !event.message.is_ready() {
            return Err(ObserverError::Rejected(format!(
                "message {} is not finalized",
                event.message.id
            )));
        }
        self.tx
            .send(Command::Persist(event.clone()))
            .map_err(|_| ObserverError::ChannelClosed)
    }
}

async fn write_loop(store: Arc<dyn ThreadStore>, mut rx: mpsc::UnboundedReceiver<Command>) -> usize {
    let mut written = 0;
    while let Some(command) = rx.recv().await {
        match command {
            Command::Persist(event) => match persist(store.as_ref(), &event).await {
                Ok(()) => written += 1,
                Err(e) => warn!(
                    thread_id = %event.thread_id,
                    message_id = %event.message.id,
                    error = %e,
                    "failed to persist message"
                ),
            },
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(written, "persistence writer stopped");
    written
}

async fn persist(store: &dyn ThreadStore, event: &MessageEvent) -> StorageResult<()> {
    store.ensure_thread(&event.thread_id).await?;
    store.append_message(&event.thread_id, &event.message).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryThreadStore;
    use cinder_core::broadcast::BroadcastSink;
    use cinder_core::types::Message;

    #[tokio::test]
    async fn test_persists_published_messages() {
        let store = Arc::new(InMemoryThreadStore::new());
        let (observer, handle) = PersistenceObserver::spawn(store.clone());

        let sink = BroadcastSink::new();
        let id = sink.subscribe(observer.clone());
        sink.publish(&MessageEvent::new("t1", Message::assistant("hi", None).finalize()));
        sink.publish(&MessageEvent::new("t1", Message::tool_result("call_1", "4").finalize()));

        observer.flush().await;
        let messages = store.load_messages("t1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text_content(), "4");

        sink.unsubscribe(id);
        drop(sink);
        drop(observer);
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejects_pending_messages() {
        let store = Arc::new(InMemoryThreadStore::new());
        let (observer, _handle) = PersistenceObserver::spawn(store.clone());

        let result = observer.on_message(&MessageEvent::new("t1", Message::assistant("partial", None)));
        assert!(matches!(result, Err(ObserverError::Rejected(_))));

        observer.flush().await;
        assert!(!store.thread_exists("t1").await.unwrap());
    }
}
