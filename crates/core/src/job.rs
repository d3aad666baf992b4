//! Job type catalogue and the job status state machine.
//!
//! Status discriminants match the `status_id` SMALLINT stored in the `jobs`
//! table. Job types are stored as their kebab-case name in a TEXT column.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

// ---------------------------------------------------------------------------
// Progress milestones
// ---------------------------------------------------------------------------

/// Reported as soon as a processor has claimed the job.
pub const PROGRESS_CLAIMED: i16 = 10;
/// Payload validated and admitted past the rate limiter.
pub const PROGRESS_VALIDATED: i16 = 30;
/// Provider request issued.
pub const PROGRESS_REQUEST_SENT: i16 = 50;
/// Provider response received and being validated.
pub const PROGRESS_RESPONSE_RECEIVED: i16 = 80;
/// Terminal success.
pub const PROGRESS_DONE: i16 = 100;

/// Default number of automatic re-queues for a failed job.
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Upper bound accepted for a caller-supplied `max_retries`.
pub const MAX_RETRIES_LIMIT: i32 = 10;

// ---------------------------------------------------------------------------
// JobType
// ---------------------------------------------------------------------------

/// The closed set of generation request kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "image-generation")]
    ImageGeneration,
    #[serde(rename = "text-generation")]
    TextGeneration,
    #[serde(rename = "video-creation")]
    VideoCreation,
    #[serde(rename = "music-composition")]
    MusicComposition,
    #[serde(rename = "3d-modeling")]
    ThreeDModeling,
    #[serde(rename = "graphic-design")]
    GraphicDesign,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::ImageGeneration,
        JobType::TextGeneration,
        JobType::VideoCreation,
        JobType::MusicComposition,
        JobType::ThreeDModeling,
        JobType::GraphicDesign,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobType::ImageGeneration => "image-generation",
            JobType::TextGeneration => "text-generation",
            JobType::VideoCreation => "video-creation",
            JobType::MusicComposition => "music-composition",
            JobType::ThreeDModeling => "3d-modeling",
            JobType::GraphicDesign => "graphic-design",
        }
    }

    /// How long a validated provider result stays in the response cache.
    ///
    /// Binary artifacts are expensive and stable, text is cheap and
    /// expected to vary.
    pub fn cache_ttl(self) -> Duration {
        const HOUR: u64 = 60 * 60;
        match self {
            JobType::ImageGeneration | JobType::GraphicDesign | JobType::ThreeDModeling => {
                Duration::from_secs(24 * HOUR)
            }
            JobType::VideoCreation | JobType::MusicComposition => Duration::from_secs(12 * HOUR),
            JobType::TextGeneration => Duration::from_secs(HOUR),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job type '{s}'")))
    }
}

impl TryFrom<String> for JobType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Job execution status.
///
/// ```text
/// pending ──claim──▶ processing ──▶ completed | failed
///    │                   │
///    └──────cancel───────┴──────▶ cancelled
/// ```
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
    Cancelled = 5,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JobStatus> for StatusId {
    fn from(value: JobStatus) -> Self {
        value as StatusId
    }
}

impl TryFrom<StatusId> for JobStatus {
    type Error = CoreError;

    fn try_from(value: StatusId) -> Result<Self, Self::Error> {
        JobStatus::ALL
            .into_iter()
            .find(|s| s.id() == value)
            .ok_or_else(|| CoreError::Internal(format!("Unknown job status id {value}")))
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job status '{s}'")))
    }
}
