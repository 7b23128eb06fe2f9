use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Submission Models
// ============================================================================

/// Judge verdict attached to a submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubmissionResult {
    /// Accepted
    Ac,
    /// Wrong Answer
    Wa,
    /// Time Limit Exceeded
    Tle,
    /// Memory Limit Exceeded
    Mle,
    /// Runtime Error
    Re,
    /// Compilation Error
    Ce,
    /// Output Limit Exceeded
    Ole,
    /// Internal Error
    Ie,
    /// Waiting for Judging
    Wj,
    /// Waiting for Re-judging
    Wr,
    Other(String),
}

impl SubmissionResult {
    pub fn as_str(&self) -> &str {
        match self {
            SubmissionResult::Ac => "AC",
            SubmissionResult::Wa => "WA",
            SubmissionResult::Tle => "TLE",
            SubmissionResult::Mle => "MLE",
            SubmissionResult::Re => "RE",
            SubmissionResult::Ce => "CE",
            SubmissionResult::Ole => "OLE",
            SubmissionResult::Ie => "IE",
            SubmissionResult::Wj => "WJ",
            SubmissionResult::Wr => "WR",
            SubmissionResult::Other(code) => code,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResult::Ac)
    }
}

impl From<String> for SubmissionResult {
    fn from(code: String) -> Self {
        match code.as_str() {
            "AC" => SubmissionResult::Ac,
            "WA" => SubmissionResult::Wa,
            "TLE" => SubmissionResult::Tle,
            "MLE" => SubmissionResult::Mle,
            "RE" => SubmissionResult::Re,
            "CE" => SubmissionResult::Ce,
            "OLE" => SubmissionResult::Ole,
            "IE" => SubmissionResult::Ie,
            "WJ" => SubmissionResult::Wj,
            "WR" => SubmissionResult::Wr,
            _ => SubmissionResult::Other(code),
        }
    }
}

impl From<SubmissionResult> for String {
    fn from(result: SubmissionResult) -> Self {
        result.as_str().to_string()
    }
}

impl fmt::Display for SubmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submission as returned by the AtCoder Problems API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    pub epoch_second: i64,
    pub problem_id: String,
    pub contest_id: String,
    pub user_id: String,
    pub language: String,
    pub point: f64,
    #[serde(default)]
    pub length: u64,
    pub result: SubmissionResult,
    #[serde(default)]
    pub execution_time: Option<u64>,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        self.result.is_accepted()
    }

    /// Submission time as a UTC timestamp
    pub fn submitted_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.epoch_second, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

// ============================================================================
// Notification Models
// ============================================================================

/// A first-time acceptance of a problem by a tracked user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedNotification {
    pub submission_id: u64,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub contest_id: String,
    pub problem_id: String,
    pub language: String,
    pub point: f64,
}

impl From<&Submission> for AcceptedNotification {
    fn from(submission: &Submission) -> Self {
        Self {
            submission_id: submission.id,
            timestamp: submission.submitted_at(),
            user_id: submission.user_id.clone(),
            contest_id: submission.contest_id.clone(),
            problem_id: submission.problem_id.clone(),
            language: submission.language.clone(),
            point: submission.point,
        }
    }
}

impl AcceptedNotification {
    /// Link to the submission page on atcoder.jp
    pub fn submission_url(&self) -> String {
        format!(
            "https://atcoder.jp/contests/{}/submissions/{}",
            self.contest_id, self.submission_id
        )
    }
}
