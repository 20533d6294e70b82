//! Roast song generation.
//!
//! A song job moves through an explicit state machine:
//! `Submitted -> Polling -> Complete | Failed | TimedOut | Cancelled`.
//! Time is read and advanced through [`Clock`] so tests can drive the loop
//! without real delays.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::suno_client::{MusicGenerator, SongGenerationRequest, SunoClip};
use crate::config::settings::SongConfig;
use crate::error::{AppError, AppResult};
use crate::models::song::SongResponse;

const MAX_TOPIC_CHARS: usize = 400;
const DEFAULT_SONG_TITLE: &str = "Green Roast Diss Track";

/// Style tags for the named styles the frontend offers
const STYLE_TAGS: &[(&str, &str)] = &[
    ("kendrick", "west coast hip hop, conscious rap, aggressive diss track"),
    ("drake", "toronto rap, moody trap, petty diss track"),
    ("eminem", "rapid-fire rap, horrorcore, battle rap"),
    ("country", "country, twangy guitar, heartbreak ballad"),
    ("opera", "operatic, dramatic soprano, orchestral"),
];

/// Time source for the polling loop
#[async_trait]
pub trait Clock: Send + Sync {
    /// Monotonic time since the clock was created
    fn elapsed(&self) -> Duration;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
pub struct TokioClock {
    started: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SongError {
    #[error("Song generation failed: {0}")]
    Upstream(String),
    #[error("Music service did not answer in time: {0}")]
    UpstreamTimeout(String),
    #[error("Song {clip_id} was not ready after {waited_secs} seconds")]
    TimedOut { clip_id: String, waited_secs: u64 },
    #[error("Song generation was cancelled")]
    Cancelled,
}

impl From<SongError> for AppError {
    fn from(error: SongError) -> Self {
        match error {
            SongError::Upstream(msg) => AppError::External(msg),
            SongError::UpstreamTimeout(msg) => AppError::Timeout(msg),
            e @ SongError::TimedOut { .. } => AppError::Timeout(e.to_string()),
            e @ SongError::Cancelled => AppError::ServiceUnavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SongJobState {
    Submitted { clip_id: String },
    Polling { clip_id: String, attempts: u32 },
    Complete(SunoClip),
    /// `timed_out` is set when a request to the music service itself timed out
    Failed { reason: String, timed_out: bool },
    TimedOut { clip_id: String, waited: Duration },
    Cancelled,
}

impl SongJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SongJobState::Complete(_)
                | SongJobState::Failed { .. }
                | SongJobState::TimedOut { .. }
                | SongJobState::Cancelled
        )
    }
}

/// A failed call to the music service. Timeouts keep their kind so they surface as 504.
fn request_failed(error: AppError) -> SongJobState {
    match error {
        AppError::Timeout(reason) => SongJobState::Failed {
            reason,
            timed_out: true,
        },
        other => SongJobState::Failed {
            reason: other.to_string(),
            timed_out: false,
        },
    }
}

/// Map a clip's reported status onto the job state machine
fn classify_clip(clip: SunoClip, attempts: u32) -> SongJobState {
    match clip.status.as_str() {
        "streaming" | "complete" if clip.audio_url.is_some() => SongJobState::Complete(clip),
        "complete" => SongJobState::Failed {
            reason: format!("Song {} finished without an audio URL", clip.id),
            timed_out: false,
        },
        "error" | "failed" => {
            let reason = clip
                .metadata
                .as_ref()
                .and_then(|m| m.get("error_message"))
                .and_then(|m| m.as_str())
                .unwrap_or("music service reported an error")
                .to_string();
            SongJobState::Failed {
                reason,
                timed_out: false,
            }
        }
        _ => SongJobState::Polling {
            clip_id: clip.id,
            attempts,
        },
    }
}

pub fn style_tags(style: &str) -> String {
    let style_lower = style.trim().to_lowercase();
    STYLE_TAGS
        .iter()
        .find(|(name, _)| *name == style_lower)
        .map(|(_, tags)| tags.to_string())
        .unwrap_or_else(|| style.trim().to_string())
}

/// Lyrics theme built around the roast, bounded in length
pub fn song_topic(roast: &str) -> String {
    let roast: String = roast.trim().chars().take(MAX_TOPIC_CHARS).collect();
    format!(
        "A savage diss track roasting someone for wasting energy on a bloated AI prompt. Work this roast into the hook: {}",
        roast
    )
}

pub struct SongService {
    generator: Arc<dyn MusicGenerator>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    max_wait: Duration,
    default_style: String,
}

impl SongService {
    pub fn new(
        generator: Arc<dyn MusicGenerator>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
        max_wait: Duration,
        default_style: String,
    ) -> Self {
        Self {
            generator,
            clock,
            poll_interval,
            max_wait,
            default_style,
        }
    }

    pub fn from_config(generator: Arc<dyn MusicGenerator>, config: &SongConfig) -> Self {
        Self::new(
            generator,
            Arc::new(TokioClock::new()),
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.max_wait_secs),
            config.default_style.clone(),
        )
    }

    /// Advance a non-terminal state by one step
    async fn step(&self, state: SongJobState, started: Duration, cancel: &CancellationToken) -> SongJobState {
        match state {
            SongJobState::Submitted { clip_id } => SongJobState::Polling { clip_id, attempts: 0 },
            SongJobState::Polling { clip_id, attempts } => {
                let waited = self.clock.elapsed().saturating_sub(started);
                if waited >= self.max_wait {
                    return SongJobState::TimedOut { clip_id, waited };
                }

                tokio::select! {
                    _ = cancel.cancelled() => return SongJobState::Cancelled,
                    _ = self.clock.sleep(self.poll_interval) => {}
                }

                let fetched = tokio::select! {
                    _ = cancel.cancelled() => return SongJobState::Cancelled,
                    fetched = self.generator.fetch_clip(&clip_id) => fetched,
                };

                match fetched {
                    Ok(clip) => {
                        debug!("Song {} status '{}' after {} polls", clip_id, clip.status, attempts + 1);
                        classify_clip(clip, attempts + 1)
                    }
                    Err(e) => request_failed(e),
                }
            }
            terminal => terminal,
        }
    }

    /// Submit a job and poll it until it reaches a terminal state
    pub async fn run_job(&self, request: &SongGenerationRequest, cancel: &CancellationToken) -> SongJobState {
        let started = self.clock.elapsed();

        let submitted = tokio::select! {
            _ = cancel.cancelled() => return SongJobState::Cancelled,
            submitted = self.generator.submit(request) => submitted,
        };

        let mut state = match submitted {
            Ok(clip) => match classify_clip(clip, 0) {
                SongJobState::Polling { clip_id, .. } => SongJobState::Submitted { clip_id },
                other => other,
            },
            Err(e) => request_failed(e),
        };

        while !state.is_terminal() {
            state = self.step(state, started, cancel).await;
        }
        state
    }

    /// Generate a song for a roast. Errors map to 502 (upstream), 504 (timeout).
    pub async fn generate(
        &self,
        roast: &str,
        style: Option<&str>,
        cancel: &CancellationToken,
    ) -> AppResult<SongResponse> {
        if roast.trim().is_empty() {
            return Err(AppError::BadRequest("Roast cannot be empty".to_string()));
        }

        let style = style
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_style);
        let request = SongGenerationRequest {
            topic: song_topic(roast),
            tags: style_tags(style),
        };

        info!("Starting song generation with style '{}'", style);
        match self.run_job(&request, cancel).await {
            SongJobState::Complete(clip) => {
                info!("Song {} ready", clip.id);
                Ok(SongResponse {
                    status: clip.status,
                    audio_url: clip.audio_url.unwrap_or_default(),
                    image_url: clip.image_url,
                    title: clip.title.unwrap_or_else(|| DEFAULT_SONG_TITLE.to_string()),
                    clip_id: clip.id,
                    metadata: clip.metadata.unwrap_or(serde_json::Value::Null),
                })
            }
            SongJobState::Failed { reason, timed_out } => {
                warn!("Song generation failed: {}", reason);
                if timed_out {
                    Err(SongError::UpstreamTimeout(reason).into())
                } else {
                    Err(SongError::Upstream(reason).into())
                }
            }
            SongJobState::TimedOut { clip_id, waited } => {
                warn!("Song {} timed out after {:?}", clip_id, waited);
                Err(SongError::TimedOut {
                    clip_id,
                    waited_secs: waited.as_secs(),
                }
                .into())
            }
            SongJobState::Cancelled => {
                info!("Song generation cancelled by caller");
                Err(SongError::Cancelled.into())
            }
            SongJobState::Submitted { .. } | SongJobState::Polling { .. } => Err(AppError::Internal(
                "Song job stopped in a non-terminal state".to_string(),
            )),
        }
    }
}
