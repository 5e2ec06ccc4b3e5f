//! Conversation session controller
//!
//! Owns the session state machine and the conversation history, and
//! sequences one turn at a time: finalized utterance → reply generation →
//! speech synthesis → framing → playback → idle. Every external failure is
//! absorbed here and converted into either a fallback reply or a quiet
//! return to idle; the conversation always continues.

use std::fmt;

use tokio::sync::watch;
use uuid::Uuid;

use crate::gateway::InferenceGateway;
use crate::voice::{AudioPayload, AudioSink, SpeechCapture};
use crate::{Error, Result};

/// Reply recorded when the generation call fails
pub const GENERATION_FALLBACK: &str = "I apologize, but I'm having trouble processing your message right now. Could you please try rephrasing that?";

/// Reply recorded when the model returns empty text
pub const EMPTY_REPLY_FALLBACK: &str = "I'm here and listening. Could you tell me more?";

/// Phase of a conversation session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for input
    Idle,
    /// Capturing speech
    Listening,
    /// Waiting for reply generation
    Thinking,
    /// Playing the synthesized reply
    Speaking,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
        })
    }
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The person in the session
    User,
    /// The companion
    Agent,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Agent => "agent",
        })
    }
}

/// One recorded message in the conversation history
///
/// Turns are appended in chronological order and never mutated or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who spoke
    pub speaker: Speaker,
    /// What was said; never empty
    pub text: String,
}

impl Turn {
    /// A turn spoken by the user
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// A turn spoken by the companion
    #[must_use]
    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
        }
    }
}

/// Read-only wellness snapshot attached to generation requests
///
/// Supplied by the wellness store; the session never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct UserContext {
    /// Current mood label
    pub mood: String,
    /// Hours slept last night
    pub sleep_hours: f32,
    /// Steps taken today
    pub steps: u32,
    /// Display name, when the user has shared one
    pub name: Option<String>,
}

/// Options for a conversation session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Voice used for synthesized replies; fixed for the session
    pub voice: String,
    /// Whether replies are spoken aloud
    pub speech_enabled: bool,
    /// Wellness snapshot attached to generation requests
    pub user_context: Option<UserContext>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            voice: "Algenib".to_string(),
            speech_enabled: true,
            user_context: None,
        }
    }
}

/// The conversation session controller
///
/// Exclusive owner of the session state and history; adapters never mutate
/// either directly. At most one external call is in flight at any time:
/// generation completes before synthesis is attempted, and synthesis
/// completes before playback starts.
pub struct SessionController<G, C, P> {
    id: Uuid,
    state: SessionState,
    history: Vec<Turn>,
    options: SessionOptions,
    gateway: G,
    capture: C,
    playback: P,
    state_tx: watch::Sender<SessionState>,
}

impl<G, C, P> SessionController<G, C, P>
where
    G: InferenceGateway,
    C: SpeechCapture,
    P: AudioSink,
{
    /// Create a new session in the idle state with empty history
    pub fn new(gateway: G, capture: C, playback: P, options: SessionOptions) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, voice = %options.voice, "session created");

        Self {
            id,
            state: SessionState::Idle,
            history: Vec::new(),
            options,
            gateway,
            capture,
            playback,
            state_tx,
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current session state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Read-only snapshot of the conversation history
    #[must_use]
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Subscribe to state-change notifications
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// In-progress transcript, valid only while listening
    #[must_use]
    pub fn pending_transcript(&self) -> String {
        if self.state == SessionState::Listening {
            self.capture.partial_transcript()
        } else {
            String::new()
        }
    }

    /// Begin speech capture
    ///
    /// Meaningful only from idle; in any other state the call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`] if the capture adapter cannot start; the
    /// session is back in idle and no retry is made.
    pub async fn start_capture(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            tracing::debug!(session = %self.id, state = %self.state, "ignoring capture start");
            return Ok(());
        }

        self.set_state(SessionState::Listening);
        if let Err(e) = self.capture.start().await {
            tracing::warn!(session = %self.id, error = %e, "capture start failed");
            self.set_state(SessionState::Idle);
            return Err(Error::Capture(e));
        }

        Ok(())
    }

    /// Stop speech capture and return the finalized transcript
    ///
    /// The transcript is destined for the input field and is never
    /// auto-submitted; an empty transcript means no speech was detected.
    /// Meaningful only while listening; elsewhere a no-op yielding the
    /// empty string.
    pub async fn stop_capture(&mut self) -> String {
        if self.state != SessionState::Listening {
            tracing::debug!(session = %self.id, state = %self.state, "ignoring capture stop");
            return String::new();
        }

        let transcript = self.capture.stop().await;
        self.set_state(SessionState::Idle);

        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            tracing::debug!(session = %self.id, "no speech captured");
        } else {
            tracing::info!(session = %self.id, transcript = %transcript, "utterance captured");
        }
        transcript
    }

    /// Submit a finalized utterance (typed or captured) for a reply
    ///
    /// Runs the full turn: appends the user turn, generates a reply, and —
    /// when speech is enabled — synthesizes and plays it. A submission
    /// arriving while a turn is in flight is dropped without touching the
    /// history. Generation failure records a fallback reply; synthesis or
    /// playback failure degrades to a text-only reply. The session is back
    /// in idle when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyUtterance`] if `text` is blank; no state is
    /// changed and nothing enters the history.
    pub async fn submit_utterance(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyUtterance);
        }
        if self.state != SessionState::Idle {
            tracing::debug!(session = %self.id, state = %self.state, "dropping utterance submitted mid-turn");
            return Ok(());
        }

        self.set_state(SessionState::Thinking);
        self.history.push(Turn::user(text));

        let prior = &self.history[..self.history.len() - 1];
        let reply = self
            .gateway
            .generate_reply(prior, text, self.options.user_context.as_ref())
            .await;

        let reply_text = match reply {
            Ok(generated) => {
                let generated = generated.trim().to_string();
                if generated.is_empty() {
                    tracing::warn!(session = %self.id, "model returned an empty reply");
                    self.history.push(Turn::agent(EMPTY_REPLY_FALLBACK));
                    self.set_state(SessionState::Idle);
                    return Ok(());
                }
                generated
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "reply generation failed");
                self.history.push(Turn::agent(GENERATION_FALLBACK));
                self.set_state(SessionState::Idle);
                return Ok(());
            }
        };

        self.history.push(Turn::agent(reply_text.clone()));
        self.speak(&reply_text).await;
        Ok(())
    }

    /// Synthesize, frame, and play a reply; failures degrade to text-only
    async fn speak(&mut self, text: &str) {
        if !self.options.speech_enabled {
            self.set_state(SessionState::Idle);
            return;
        }

        let wav = match self.synthesize(text).await {
            Ok(wav) => wav,
            Err(e) => {
                // The reply turn is already recorded; text-only is an
                // accepted degraded mode, not an error state.
                tracing::warn!(session = %self.id, error = %e, "synthesis failed, replying with text only");
                self.set_state(SessionState::Idle);
                return;
            }
        };

        self.set_state(SessionState::Speaking);
        if let Err(e) = self.playback.play(&wav).await {
            tracing::warn!(session = %self.id, error = %e, "audio playback failed");
        }
        self.set_state(SessionState::Idle);
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let speech = self
            .gateway
            .synthesize_speech(text, &self.options.voice)
            .await?;

        let payload = AudioPayload::mono16(speech.pcm, speech.sample_rate_hz);
        // Malformed upstream audio is fatal to the voice path of this turn
        payload
            .frame()
            .map_err(|e| Error::Synthesis(format!("framing failed: {e}")))
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(session = %self.id, from = %self.state, to = %next, "state transition");
        self.state = next;
        let _ = self.state_tx.send_replace(next);
    }
}
