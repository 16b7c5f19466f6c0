use std::time::Duration;

use tokio::sync::mpsc;

use crate::event::directory::{ActorDirectory, PoolEnvelope};

#[tokio::test]
async fn test_unanswered_identify_means_stopped() {
    let directory = ActorDirectory::new();
    let (sender, mut receiver) = mpsc::unbounded_channel();
    directory.register("in-router-11", &sender).await.unwrap();

    // The last worker takes the identify request and exits without answering
    let worker = tokio::spawn(async move {
        if let Some(PoolEnvelope::Identify(reply)) = receiver.recv().await {
            drop(reply);
        }
    });

    assert!(directory.is_stopped("in-router-11", Duration::from_secs(5)).await);
    assert!(!directory.contains("in-router-11").await);
    worker.await.unwrap();

    // The address is free again
    directory.register("in-router-11", &sender).await.unwrap();
}

#[tokio::test]
async fn test_closed_mailbox_means_stopped() {
    let directory = ActorDirectory::new();
    let (sender, receiver) = mpsc::unbounded_channel();
    directory.register("out-router-12", &sender).await.unwrap();
    drop(receiver);

    assert!(directory.is_stopped("out-router-12", Duration::from_millis(50)).await);
    assert!(!directory.contains("out-router-12").await);
}

#[tokio::test]
async fn test_silent_pool_is_not_stopped() {
    let directory = ActorDirectory::new();
    let (sender, _receiver) = mpsc::unbounded_channel();
    directory.register("out-router-13", &sender).await.unwrap();

    assert!(!directory.is_stopped("out-router-13", Duration::from_millis(20)).await);
    assert!(directory.contains("out-router-13").await);
}
