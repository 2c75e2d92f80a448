mod support;

use std::sync::Arc;

use mailer::application::handlers::PriorityScheduler;
use mailer::domain::models::{NewQueuedMessage, Priority};
use mailer::domain::repositories::MessageQueueRepository;

use support::enqueue_ready;

#[tokio::test]
async fn drains_tiers_in_order_and_fifo_within_a_tier() {
    let queue = Arc::new(
        mailer::infrastructure::repositories::in_memory::InMemoryMessageQueueRepository::new(),
    );
    enqueue_ready(&queue, "high-1@example.com", Priority::High).await;
    enqueue_ready(&queue, "low@example.com", Priority::Low).await;
    enqueue_ready(&queue, "high-2@example.com", Priority::High).await;
    enqueue_ready(&queue, "medium@example.com", Priority::Medium).await;

    let mut scheduler = PriorityScheduler::new(queue.clone());
    let mut order = Vec::new();
    while let Some(message) = scheduler.next_message().await.unwrap() {
        order.push(message.to_address.clone());
        queue.delete(message.id).await.unwrap();
    }

    assert_eq!(
        order,
        vec![
            "high-1@example.com",
            "high-2@example.com",
            "medium@example.com",
            "low@example.com",
        ]
    );
}

#[tokio::test]
async fn deferred_messages_are_never_yielded() {
    let queue = Arc::new(
        mailer::infrastructure::repositories::in_memory::InMemoryMessageQueueRepository::new(),
    );
    let id = enqueue_ready(&queue, "deferred@example.com", Priority::Medium).await;
    queue.set_priority(id, Priority::Deferred).await.unwrap();

    let mut scheduler = PriorityScheduler::new(queue.clone());
    assert!(scheduler.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn unready_messages_are_never_yielded() {
    let queue = Arc::new(
        mailer::infrastructure::repositories::in_memory::InMemoryMessageQueueRepository::new(),
    );
    // Still being assembled: never marked ready.
    queue
        .insert(NewQueuedMessage {
            to_address: "assembling@example.com".to_string(),
            from_address: "sender@example.com".to_string(),
            subject: "Subject".to_string(),
            body: "Body".to_string(),
            html_body: None,
            priority: Priority::High,
        })
        .await
        .unwrap();

    let mut scheduler = PriorityScheduler::new(queue.clone());
    assert!(scheduler.next_message().await.unwrap().is_none());
}

#[tokio::test]
async fn high_mail_arriving_mid_pass_preempts_the_low_drain() {
    let queue = Arc::new(
        mailer::infrastructure::repositories::in_memory::InMemoryMessageQueueRepository::new(),
    );
    enqueue_ready(&queue, "low-1@example.com", Priority::Low).await;
    enqueue_ready(&queue, "low-2@example.com", Priority::Low).await;

    let mut scheduler = PriorityScheduler::new(queue.clone());

    let first = scheduler.next_message().await.unwrap().unwrap();
    assert_eq!(first.to_address, "low-1@example.com");
    queue.delete(first.id).await.unwrap();

    // New high-priority mail shows up while the low tier is draining.
    enqueue_ready(&queue, "urgent@example.com", Priority::High).await;

    let second = scheduler.next_message().await.unwrap().unwrap();
    assert_eq!(second.to_address, "urgent@example.com");
    queue.delete(second.id).await.unwrap();

    let third = scheduler.next_message().await.unwrap().unwrap();
    assert_eq!(third.to_address, "low-2@example.com");
    queue.delete(third.id).await.unwrap();

    assert!(scheduler.next_message().await.unwrap().is_none());
}
