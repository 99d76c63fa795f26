// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn state_of(ctx: &TestContext, id: &SessionId) -> SessionState {
    ctx.registry.get(id).unwrap().state
}

#[tokio::test(start_paused = true)]
async fn busy_marker_then_silence_goes_idle_on_the_timer() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"Reading files... (esc to interrupt)\r\n")
        .await;
    assert_eq!(state_of(&ctx, &info.id), SessionState::Busy);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let event = ctx
        .wait_for(|e| matches!(e, SessionEvent::StateChanged { .. }))
        .await;
    assert_eq!(
        event,
        SessionEvent::StateChanged {
            id: info.id.clone(),
            state: SessionState::Idle,
        }
    );
    assert_eq!(state_of(&ctx, &info.id), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn further_output_pushes_the_idle_timer_back() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"Thinking... esc to interrupt\r\n").await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    ctx.emit(&info.id, b"Editing src/lib.rs\r\n").await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(state_of(&ctx, &info.id), SessionState::Busy);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(state_of(&ctx, &info.id), SessionState::Idle);
    assert_eq!(state_changes(&ctx.drain()), vec![SessionState::Idle]);
}

#[tokio::test(start_paused = true)]
async fn question_moves_to_waiting_and_stays_there() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"Thinking... esc to interrupt\r\n").await;
    ctx.emit(&info.id, b"Do you want to apply this edit?\r\n")
        .await;

    // Neither the cancelled timer nor the tick may override a question
    tokio::time::sleep(Duration::from_secs(2)).await;
    ctx.clock.advance(Duration::from_secs(10));
    ctx.registry.tick();

    assert_eq!(state_of(&ctx, &info.id), SessionState::WaitingInput);
    assert_eq!(
        state_changes(&ctx.drain()),
        vec![SessionState::WaitingInput]
    );
}

#[tokio::test(start_paused = true)]
async fn data_is_published_before_the_state_change_it_causes() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.drain();

    ctx.emit(&info.id, b"Continue? (y/n)\r\n").await;

    assert_eq!(ctx.drain_names(), vec!["session:data", "session:state"]);
}

#[tokio::test(start_paused = true)]
async fn tick_forces_idle_after_the_silence_threshold() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"compiling th-core\r\n").await;

    ctx.clock.advance(Duration::from_secs(1));
    ctx.registry.tick();
    assert_eq!(state_of(&ctx, &info.id), SessionState::Busy);

    ctx.clock.advance(Duration::from_millis(2500));
    ctx.registry.tick();
    assert_eq!(state_of(&ctx, &info.id), SessionState::Idle);
    assert_eq!(state_changes(&ctx.drain()), vec![SessionState::Idle]);

    // Already idle: nothing more to report
    ctx.clock.advance(Duration::from_secs(10));
    ctx.registry.tick();
    assert!(ctx.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn output_after_idle_is_busy_again() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"done\r\n").await;
    ctx.clock.advance(Duration::from_secs(5));
    ctx.registry.tick();

    ctx.emit(&info.id, b"Reading src/main.rs\r\n").await;

    assert_eq!(
        state_changes(&ctx.drain()),
        vec![SessionState::Idle, SessionState::Busy]
    );
}

#[tokio::test(start_paused = true)]
async fn status_banner_redraws_do_not_change_state() {
    let mut ctx = setup();
    let info = ctx.create("alice").await;
    ctx.emit(&info.id, b"Proceed? [y/n]\r\n").await;
    ctx.drain();

    ctx.emit(&info.id, b"  ? for shortcuts\r\n").await;

    assert_eq!(ctx.drain_names(), vec!["session:data"]);
    assert_eq!(state_of(&ctx, &info.id), SessionState::WaitingInput);
}
