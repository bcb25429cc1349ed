use std::sync::{Arc, Mutex};
use std::time::Duration;

use reactkit_buttons::{
    handler, ButtonError, ButtonHandler, ButtonOptions, ButtonTable, ContextState,
    ReactionButtonManager,
};
use reactkit_channels::{ChatMessage, MemoryChannel, MemoryOp, RetryPolicy, TransportError};
use reactkit_core::{ButtonsConfig, MessageId, Permission, ReactionEmoji, UserId};

const BOT: UserId = UserId(1);
const ALICE: UserId = UserId(2);
const BOB: UserId = UserId(3);

const LEFT: &str = "\u{2b05}";
const RIGHT: &str = "\u{27a1}";

type Log = Arc<Mutex<Vec<(String, UserId, bool)>>>;

fn manager() -> ReactionButtonManager {
    let _ = reactkit_core::logging::init_logging(None);
    ReactionButtonManager::new(BOT, ButtonsConfig::default()).with_retry_policy(RetryPolicy::none())
}

fn recording(log: &Log) -> ButtonHandler {
    let log = Arc::clone(log);
    handler(move |event| {
        let log = Arc::clone(&log);
        async move {
            log.lock()
                .unwrap()
                .push((event.emoji.symbol().to_string(), event.user, event.added));
            Ok(())
        }
    })
}

fn arrows(log: &Log) -> ButtonTable {
    ButtonTable::new()
        .with(LEFT, recording(log))
        .and_then(|t| t.with(RIGHT, recording(log)))
        .unwrap()
}

fn expiring(ms: u64) -> ButtonOptions {
    ButtonOptions {
        expiration: Some(Duration::from_millis(ms)),
        ..ButtonOptions::default()
    }
}

#[tokio::test]
async fn buttons_are_placed_in_table_order() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();

    let context = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();

    assert_eq!(context.state(), ContextState::Active);
    assert_eq!(
        message.calls(),
        vec![format!("add_reaction:{LEFT}"), format!("add_reaction:{RIGHT}")]
    );
    assert_eq!(message.reactors(LEFT), vec![BOT]);
}

#[tokio::test]
async fn second_registration_fails_and_keeps_the_first() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();

    let first = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();
    let err = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ButtonError::DuplicateRegistration {
            message_id: message.id()
        }
    );
    assert_eq!(manager.len(), 1);
    let current = manager.get(message.id()).unwrap();
    assert!(Arc::ptr_eq(&current, &first));
    assert_eq!(first.state(), ContextState::Active);
}

#[tokio::test]
async fn duplicate_is_rejected_while_first_is_still_initializing() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();

    let (a, b) = tokio::join!(
        manager.add(message.clone(), vec![], arrows(&log), ButtonOptions::default()),
        manager.add(message.clone(), vec![], arrows(&log), ButtonOptions::default()),
    );

    assert!(a.is_ok());
    assert!(matches!(b, Err(ButtonError::DuplicateRegistration { .. })));
    // Only the first registration placed reactions.
    assert_eq!(message.calls().len(), 2);
}

#[tokio::test]
async fn missing_permission_fails_before_any_reaction() {
    let manager = manager();
    let channel = MemoryChannel::guild(1, BOT, &[Permission::ReadMessageHistory]);
    let message = channel.post("menu");
    let log = Log::default();

    let err = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ButtonError::PermissionDenied { .. }));
    assert!(message.calls().is_empty());
    assert!(manager.is_empty());
}

#[tokio::test]
async fn failed_initialization_releases_the_registration() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    channel.fail_next(
        MemoryOp::AddReaction,
        TransportError::Forbidden("blocked".to_string()),
        1,
    );

    let err = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ButtonError::Transport(TransportError::Forbidden(_))));
    assert!(manager.is_empty());

    manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();
    assert_eq!(manager.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_reaction_failures_are_retried() {
    let manager = manager().with_retry_policy(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
    });
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    channel.fail_next(
        MemoryOp::AddReaction,
        TransportError::Network("reset".to_string()),
        2,
    );

    manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();

    assert_eq!(message.reaction_symbols().len(), 2);
    assert_eq!(message.calls().len(), 4);
}

#[tokio::test]
async fn reactions_are_routed_to_the_matching_handler() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();

    let hit = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(RIGHT), ALICE)
        .await
        .unwrap();
    let removed = manager
        .handle_reaction_remove(message.id(), ReactionEmoji::from(RIGHT), ALICE)
        .await
        .unwrap();
    let unknown = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from("\u{1f44d}"), ALICE)
        .await
        .unwrap();

    assert!(hit && removed && !unknown);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (RIGHT.to_string(), ALICE, true),
            (RIGHT.to_string(), ALICE, false)
        ]
    );
}

#[tokio::test]
async fn unknown_message_is_a_no_op() {
    let manager = manager();
    let hit = manager
        .handle_reaction_add(MessageId(999), ReactionEmoji::from(RIGHT), ALICE)
        .await
        .unwrap();
    assert!(!hit);
}

#[tokio::test]
async fn unauthorized_and_own_reactions_are_ignored() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    manager
        .add(message.clone(), vec![ALICE], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();

    let from_bob = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(LEFT), BOB)
        .await
        .unwrap();
    let from_bot = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(LEFT), BOT)
        .await
        .unwrap();
    let from_alice = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(LEFT), ALICE)
        .await
        .unwrap();

    assert!(!from_bob && !from_bot && from_alice);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn disabled_context_drops_events_until_enabled() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();

    context.disable();
    assert_eq!(context.state(), ContextState::Disabled);
    let dropped = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(LEFT), ALICE)
        .await
        .unwrap();

    context.enable();
    let handled = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(LEFT), ALICE)
        .await
        .unwrap();

    assert!(!dropped && handled);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn handler_errors_surface_to_the_dispatcher() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let table = ButtonTable::new()
        .with(
            "\u{274c}",
            handler(|_event| async { Err(ButtonError::Handler("boom".to_string())) }),
        )
        .unwrap();
    manager
        .add(message.clone(), vec![], table, ButtonOptions::default())
        .await
        .unwrap();

    let err = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from("\u{274c}"), ALICE)
        .await
        .unwrap_err();
    assert_eq!(err, ButtonError::Handler("boom".to_string()));
}

#[tokio::test]
async fn handler_can_cancel_its_own_context() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let table = ButtonTable::new()
        .with(
            "\u{23f9}",
            handler(|event| async move {
                event.context.cancel().await;
                Ok(())
            }),
        )
        .unwrap();
    manager
        .add(message.clone(), vec![], table, ButtonOptions::default())
        .await
        .unwrap();

    manager
        .handle_reaction_add(message.id(), ReactionEmoji::from("\u{23f9}"), ALICE)
        .await
        .unwrap();

    assert!(manager.is_empty());
    assert!(message.reaction_symbols().is_empty());
}

#[tokio::test(start_paused = true)]
async fn idle_context_expires_and_removes_its_buttons() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), expiring(100))
        .await
        .unwrap();

    let hit = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(RIGHT), ALICE)
        .await
        .unwrap();
    assert!(hit);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(manager.get(message.id()).is_none());
    assert_eq!(context.state(), ContextState::Cancelled);
    let calls = message.calls();
    assert!(calls.contains(&format!("remove_own_reaction:{LEFT}")));
    assert!(calls.contains(&format!("remove_own_reaction:{RIGHT}")));
    assert!(message.reaction_symbols().is_empty());

    // Reactions after expiry go nowhere.
    let late = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(RIGHT), ALICE)
        .await
        .unwrap();
    assert!(!late);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_expiry_is_a_no_op() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), expiring(100))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    let calls_after_expiry = message.calls().len();

    context.cancel().await;
    context.cancel().await;

    assert_eq!(message.calls().len(), calls_after_expiry);
    assert!(!manager.cancel(message.id()).await);
}

#[tokio::test(start_paused = true)]
async fn explicit_cancel_stops_the_expiry_timer() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    manager
        .add(message.clone(), vec![], arrows(&log), expiring(100))
        .await
        .unwrap();

    assert!(manager.cancel(message.id()).await);
    let calls_after_cancel = message.calls().len();

    // A fresh registration must not be evicted by the old timer.
    manager
        .add(message.clone(), vec![], arrows(&log), expiring(10_000))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(manager.len(), 1);
    assert!(message.calls().len() > calls_after_cancel);
}

#[tokio::test]
async fn cancel_during_initialization_leaves_no_reactions() {
    let manager = Arc::new(manager());
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();

    let adding = {
        let manager = Arc::clone(&manager);
        let message = message.clone();
        let table = arrows(&log);
        tokio::spawn(async move {
            manager
                .add(message, vec![], table, ButtonOptions::default())
                .await
        })
    };
    tokio::task::yield_now().await;
    assert!(manager.cancel(message.id()).await);

    let err = adding.await.unwrap().unwrap_err();
    assert!(matches!(err, ButtonError::Cancelled { .. }));
    assert!(manager.is_empty());
    assert!(message.reaction_symbols().is_empty());
}

#[tokio::test]
async fn cancelled_context_releases_its_timer() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), expiring(60_000))
        .await
        .unwrap();

    context.cancel().await;
    // let the aborted timer task be dropped
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }

    assert_eq!(Arc::strong_count(&context), 1);
}

#[tokio::test]
async fn cancel_all_empties_the_registry() {
    let manager = manager();
    assert_eq!(manager.bot_user(), BOT);
    let channel = MemoryChannel::direct(1, BOT);
    let first = channel.post("one");
    let second = channel.post("two");
    let log = Log::default();
    for message in [&first, &second] {
        manager
            .add((*message).clone(), vec![], arrows(&log), ButtonOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(manager.len(), 2);

    manager.cancel_all().await;

    assert!(manager.is_empty());
    assert!(first.reaction_symbols().is_empty());
    assert!(second.reaction_symbols().is_empty());
    assert!(!manager.cancel(first.id()).await);
}

#[tokio::test(start_paused = true)]
async fn buttons_stay_when_removal_on_expiry_is_off() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    let options = ButtonOptions {
        expiration: Some(Duration::from_millis(100)),
        remove_on_expiry: Some(false),
    };
    let context = manager
        .add(message.clone(), vec![], arrows(&log), options)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(manager.is_empty());
    assert!(context.symbols().is_empty());
    assert_eq!(message.reaction_symbols().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn removal_failures_on_expiry_reach_the_error_sink() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let manager = manager().with_error_sink(tx);
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    manager
        .add(message.clone(), vec![], arrows(&log), expiring(100))
        .await
        .unwrap();
    channel.fail_next(
        MemoryOp::RemoveReaction,
        TransportError::NotFound("message".to_string()),
        2,
    );

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(manager.is_empty());
    let reported = rx.try_recv().unwrap();
    assert!(matches!(
        reported,
        ButtonError::Transport(TransportError::NotFound(_))
    ));
}

#[tokio::test]
async fn add_button_rejects_existing_symbol_and_binds_new_ones() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();

    let err = context.add_button(LEFT, recording(&log)).await.unwrap_err();
    assert_eq!(
        err,
        ButtonError::ButtonExists {
            symbol: LEFT.to_string()
        }
    );

    context.add_button("\u{1f504}", recording(&log)).await.unwrap();
    assert_eq!(context.symbols(), vec![LEFT, RIGHT, "\u{1f504}"]);
    let hit = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from("\u{1f504}"), ALICE)
        .await
        .unwrap();
    assert!(hit);
}

#[tokio::test]
async fn add_button_failure_releases_the_symbol() {
    let manager = manager();
    let channel = MemoryChannel::direct(1, BOT);
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();
    channel.fail_next(
        MemoryOp::AddReaction,
        TransportError::Forbidden("blocked".to_string()),
        1,
    );

    assert!(context.add_button("\u{1f504}", recording(&log)).await.is_err());
    assert_eq!(context.symbols(), vec![LEFT, RIGHT]);
}

#[tokio::test]
async fn remove_button_clears_every_user_with_manage_permission() {
    let manager = manager();
    let channel = MemoryChannel::guild(
        1,
        BOT,
        &[
            Permission::AddReactions,
            Permission::ReadMessageHistory,
            Permission::ManageMessages,
        ],
    );
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();
    message.react_as(ALICE, LEFT);

    assert!(context.remove_button(LEFT).await.unwrap());

    assert!(message.reactors(LEFT).is_empty());
    assert!(message
        .calls()
        .contains(&format!("remove_reaction_emoji:{LEFT}")));
    assert!(!context.remove_button(LEFT).await.unwrap());
}

#[tokio::test]
async fn remove_button_without_manage_permission_only_removes_own() {
    let manager = manager();
    let channel = MemoryChannel::guild(
        1,
        BOT,
        &[Permission::AddReactions, Permission::ReadMessageHistory],
    );
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();
    message.react_as(ALICE, LEFT);

    context.remove_button(LEFT).await.unwrap();

    assert_eq!(message.reactors(LEFT), vec![ALICE]);
    let hit = manager
        .handle_reaction_add(message.id(), ReactionEmoji::from(LEFT), ALICE)
        .await
        .unwrap();
    assert!(!hit);
}

#[tokio::test]
async fn remove_all_buttons_uses_bulk_removal_with_manage_permission() {
    let manager = manager();
    let channel = MemoryChannel::guild(
        1,
        BOT,
        &[
            Permission::AddReactions,
            Permission::ReadMessageHistory,
            Permission::ManageMessages,
        ],
    );
    let message = channel.post("menu");
    let log = Log::default();
    let context = manager
        .add(message.clone(), vec![], arrows(&log), ButtonOptions::default())
        .await
        .unwrap();
    message.react_as(BOB, RIGHT);

    context.remove_all_buttons().await.unwrap();

    assert!(message.reaction_symbols().is_empty());
    assert_eq!(
        message.calls().last().map(String::as_str),
        Some("remove_all_reactions")
    );
    assert!(context.symbols().is_empty());
}
