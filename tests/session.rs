//! Session controller integration tests
//!
//! Exercises the turn-taking state machine against mock adapters; no audio
//! hardware or network access required.

use std::sync::Arc;

use bloom_companion::gateway::InferenceGateway;
use bloom_companion::session::{
    EMPTY_REPLY_FALLBACK, GENERATION_FALLBACK, SessionController, SessionOptions, SessionState,
    Speaker,
};
use bloom_companion::{CaptureError, Error};

mod common;
use common::{MockCapture, MockGateway, MockSink};

fn controller(
    gateway: MockGateway,
    capture: MockCapture,
    sink: MockSink,
) -> SessionController<MockGateway, MockCapture, MockSink> {
    SessionController::new(gateway, capture, sink, SessionOptions::default())
}

#[tokio::test]
async fn submit_appends_one_user_and_one_agent_turn() {
    let gateway = MockGateway::replying("That sounds difficult. What happened?");
    let sink = MockSink::new();
    let played = Arc::clone(&sink.played);
    let mut session = controller(gateway, MockCapture::silent(), sink);

    session.submit_utterance("I feel anxious today").await.unwrap();

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].speaker, Speaker::User);
    assert_eq!(history[0].text, "I feel anxious today");
    assert_eq!(history[1].speaker, Speaker::Agent);
    assert_eq!(history[1].text, "That sounds difficult. What happened?");
    assert_eq!(session.state(), SessionState::Idle);

    // The reply was spoken exactly once, as a decodable WAV clip
    let played = played.lock().await;
    assert_eq!(played.len(), 1);
    let reader = hound::WavReader::new(std::io::Cursor::new(played[0].as_slice())).unwrap();
    assert_eq!(reader.spec().sample_rate, 24_000);
    assert_eq!(reader.spec().channels, 1);
}

#[tokio::test]
async fn blank_utterances_are_rejected_before_any_state_change() {
    let mut session = controller(
        MockGateway::replying("hello"),
        MockCapture::silent(),
        MockSink::new(),
    );

    for input in ["", "   ", "\t\n"] {
        let result = session.submit_utterance(input).await;
        assert!(matches!(result, Err(Error::EmptyUtterance)));
    }

    assert!(session.history().is_empty());
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn submission_outside_idle_is_dropped() {
    let gateway = MockGateway::replying("hello");
    let generate_calls = Arc::clone(&gateway.generate_calls);
    let mut session = controller(gateway, MockCapture::yielding("spoken words"), MockSink::new());

    session.start_capture().await.unwrap();
    assert_eq!(session.state(), SessionState::Listening);

    // Typed input while listening is dropped without touching the history
    session.submit_utterance("typed words").await.unwrap();
    assert!(session.history().is_empty());
    assert_eq!(session.state(), SessionState::Listening);
    assert!(generate_calls.lock().await.is_empty());
}

#[tokio::test]
async fn generation_failure_records_fallback_and_skips_synthesis() {
    let gateway = MockGateway::failing_generation();
    let synth_calls = Arc::clone(&gateway.synth_calls);
    let sink = MockSink::new();
    let played = Arc::clone(&sink.played);
    let mut session = controller(gateway, MockCapture::silent(), sink);

    session.submit_utterance("hello?").await.unwrap();

    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].speaker, Speaker::Agent);
    assert_eq!(history[1].text, GENERATION_FALLBACK);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(synth_calls.lock().await.is_empty());
    assert!(played.lock().await.is_empty());
}

#[tokio::test]
async fn empty_reply_records_fallback_and_skips_synthesis() {
    let gateway = MockGateway::empty_reply();
    let synth_calls = Arc::clone(&gateway.synth_calls);
    let mut session = controller(gateway, MockCapture::silent(), MockSink::new());

    session.submit_utterance("hello?").await.unwrap();

    assert_eq!(session.history()[1].text, EMPTY_REPLY_FALLBACK);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(synth_calls.lock().await.is_empty());
}

#[tokio::test]
async fn synthesis_failure_degrades_to_text_only() {
    let gateway = MockGateway::failing_synthesis("Tell me more about that.");
    let sink = MockSink::new();
    let played = Arc::clone(&sink.played);
    let mut session = controller(gateway, MockCapture::silent(), sink);

    session.submit_utterance("I slept badly").await.unwrap();

    // The generated reply survives; no audio was played
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text, "Tell me more about that.");
    assert_eq!(session.state(), SessionState::Idle);
    assert!(played.lock().await.is_empty());
}

#[tokio::test]
async fn playback_failure_still_completes_the_turn() {
    let gateway = MockGateway::replying("I'm listening.");
    let mut session = controller(gateway, MockCapture::silent(), MockSink::failing());

    session.submit_utterance("hi").await.unwrap();

    assert_eq!(session.history().len(), 2);
    assert_eq!(session.state(), SessionState::Idle);

    // The session is still usable afterwards
    session.submit_utterance("still there?").await.unwrap();
    assert_eq!(session.history().len(), 4);
}

#[tokio::test]
async fn disabled_speech_skips_synthesis_entirely() {
    let gateway = MockGateway::replying("Just text.");
    let synth_calls = Arc::clone(&gateway.synth_calls);
    let sink = MockSink::new();
    let played = Arc::clone(&sink.played);
    let options = SessionOptions {
        speech_enabled: false,
        ..SessionOptions::default()
    };
    let mut session = SessionController::new(gateway, MockCapture::silent(), sink, options);

    session.submit_utterance("hello").await.unwrap();

    assert_eq!(session.history().len(), 2);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(synth_calls.lock().await.is_empty());
    assert!(played.lock().await.is_empty());
}

#[tokio::test]
async fn stop_capture_finalizes_without_submitting() {
    let mut session = controller(
        MockGateway::replying("hello"),
        MockCapture::yielding("I had a rough week"),
        MockSink::new(),
    );

    session.start_capture().await.unwrap();
    let transcript = session.stop_capture().await;

    assert_eq!(transcript, "I had a rough week");
    assert!(session.history().is_empty());
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn stopping_with_no_speech_leaves_session_clean() {
    let mut session = controller(
        MockGateway::replying("hello"),
        MockCapture::silent(),
        MockSink::new(),
    );

    session.start_capture().await.unwrap();
    let transcript = session.stop_capture().await;

    assert_eq!(transcript, "");
    assert_eq!(session.pending_transcript(), "");
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn capture_start_failure_surfaces_and_returns_to_idle() {
    let mut session = controller(
        MockGateway::replying("hello"),
        MockCapture::failing(CaptureError::PermissionDenied),
        MockSink::new(),
    );

    let result = session.start_capture().await;
    assert!(matches!(
        result,
        Err(Error::Capture(CaptureError::PermissionDenied))
    ));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn capture_toggle_is_a_noop_outside_its_states() {
    let mut session = controller(
        MockGateway::replying("hello"),
        MockCapture::yielding("words"),
        MockSink::new(),
    );

    // Stop from idle: no-op
    assert_eq!(session.stop_capture().await, "");
    assert_eq!(session.state(), SessionState::Idle);

    // Start from listening: no-op, not an AlreadyActive error
    session.start_capture().await.unwrap();
    session.start_capture().await.unwrap();
    assert_eq!(session.state(), SessionState::Listening);
}

#[tokio::test]
async fn pending_transcript_is_visible_only_while_listening() {
    let mut session = controller(
        MockGateway::replying("hello"),
        MockCapture::yielding("partial words"),
        MockSink::new(),
    );

    assert_eq!(session.pending_transcript(), "");
    session.start_capture().await.unwrap();
    assert_eq!(session.pending_transcript(), "partial words");
    session.stop_capture().await;
    assert_eq!(session.pending_transcript(), "");
}

#[tokio::test]
async fn synthesis_uses_the_session_voice() {
    let gateway = MockGateway::replying("Hello there.");
    let synth_calls = Arc::clone(&gateway.synth_calls);
    let options = SessionOptions {
        voice: "Kore".to_string(),
        ..SessionOptions::default()
    };
    let mut session =
        SessionController::new(gateway, MockCapture::silent(), MockSink::new(), options);

    session.submit_utterance("hi").await.unwrap();

    let calls = synth_calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], ("Hello there.".to_string(), "Kore".to_string()));
}

#[tokio::test]
async fn history_stays_chronological_across_turns() {
    let gateway = MockGateway::replying("mm-hmm");
    let generate_calls = Arc::clone(&gateway.generate_calls);
    let options = SessionOptions {
        speech_enabled: false,
        ..SessionOptions::default()
    };
    let mut session =
        SessionController::new(gateway, MockCapture::silent(), MockSink::new(), options);

    session.submit_utterance("first").await.unwrap();
    session.submit_utterance("second").await.unwrap();

    let history = session.history();
    assert_eq!(history.len(), 4);
    let speakers: Vec<Speaker> = history.iter().map(|t| t.speaker).collect();
    assert_eq!(
        speakers,
        vec![Speaker::User, Speaker::Agent, Speaker::User, Speaker::Agent]
    );
    assert_eq!(history[0].text, "first");
    assert_eq!(history[2].text, "second");

    // Each generation call saw the history so far, excluding the utterance
    let calls = generate_calls.lock().await;
    assert_eq!(calls[0], (0, "first".to_string()));
    assert_eq!(calls[1], (2, "second".to_string()));
}

#[tokio::test]
async fn state_notifications_settle_on_idle() {
    let mut session = controller(
        MockGateway::replying("hello"),
        MockCapture::silent(),
        MockSink::new(),
    );
    let rx = session.subscribe();

    session.submit_utterance("hi").await.unwrap();

    // Transitions were published, and the latest observable state is idle
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow(), SessionState::Idle);
}

#[tokio::test]
async fn safety_gate_passes_clean_messages() {
    let gateway = MockGateway::replying("ok");
    let verdict = gateway
        .classify_message_safety("good morning everyone", "user-1")
        .await
        .unwrap();
    assert!(verdict.is_safe);
    assert!(verdict.reason.is_none());
}

#[tokio::test]
async fn safety_gate_blocks_flagged_messages_with_a_reason() {
    let gateway = MockGateway::flagging("harassment");
    let verdict = gateway
        .classify_message_safety("something hostile", "user-1")
        .await
        .unwrap();
    assert!(!verdict.is_safe);
    assert_eq!(verdict.reason.as_deref(), Some("harassment"));
}
