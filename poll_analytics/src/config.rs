// ********* Input data structures ***********

use chrono::{DateTime, NaiveDate, Utc};
use std::error::Error;
use std::fmt::Display;

/// The fixed set of question types understood by the engine.
///
/// The dispatch over this set is exhaustive: a type with no chart
/// representation yields no aggregate rather than an error.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum QuestionType {
    Open,
    MultipleChoice,
    Numeric,
    Menu,
    Keypad,
    Recording,
}

/// One survey item. Immutable once answers reference it, except for the
/// display text.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Question {
    pub id: u64,
    pub text: String,
    /// Ordinal position within the poll.
    pub order: u32,
    pub question_type: QuestionType,
}

/// A single administration of a poll to a set of contacts.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Issue {
    pub id: u64,
    pub poll_id: u64,
    /// None means the issue was conducted in all regions.
    pub region_id: Option<u64>,
    pub conducted_on: DateTime<Utc>,
}

/// Completion state of a response, asserted by the upstream ingestion
/// pipeline. The engine never recomputes it from answer counts.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ResponseStatus {
    Empty,
    Partial,
    Complete,
}

/// One contact's reply bundle to one issue.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Response {
    pub id: u64,
    pub contact_id: u64,
    pub issue_id: u64,
    pub status: ResponseStatus,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// The value given for one question within one response.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Answer {
    pub response_id: u64,
    pub question_id: u64,
    /// Raw value as stored (text, or the textual form of a number).
    pub value: String,
    /// Canonical label assigned at ingestion time. It may differ from
    /// the question's current configuration; aggregation always uses
    /// the stored label.
    pub category: Option<String>,
    pub submitted_on: DateTime<Utc>,
}

/// All the records of one issue, already filtered by org, region set
/// and date window by the caller.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IssueRecords {
    pub issue: Issue,
    pub responses: Vec<Response>,
    pub answers: Vec<Answer>,
}

// ******** Output data structures *********

/// When combining word frequencies across issues, only the heaviest
/// words are kept. Single-issue aggregation is not truncated.
pub const MAX_TREND_WORDS: usize = 50;

/// Occurrences per stored category label, sorted ascending by label.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CategoryCounts {
    pub counts: Vec<(String, u64)>,
}

/// Token frequencies of open-text answers, sorted descending by count
/// with ties broken alphabetically.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct WordFrequencies {
    pub counts: Vec<(String, u64)>,
}

/// One histogram bucket, labeled `"low-high"`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RangeBucket {
    pub label: String,
    pub count: u64,
}

/// Statistics for the numeric answers of one (issue, question) pair.
#[derive(PartialEq, Debug, Clone)]
pub struct NumericSummary {
    pub sum: f64,
    /// sum / count, or 0 when there are no answers.
    pub mean: f64,
    /// Equal-width buckets covering [min, max]. Zero-count buckets are
    /// retained so the labeled axis stays contiguous.
    pub histogram: Vec<RangeBucket>,
}

/// Counts of one category label across the issue axis. `data` has one
/// entry per issue, padded with 0 where the label never occurred.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LabelSeries {
    pub name: String,
    pub data: Vec<u64>,
}

/// Category counts of several issues merged on a common label union.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CategoryTrend {
    pub dates: Vec<NaiveDate>,
    pub series: Vec<LabelSeries>,
}

/// Per-issue numeric series plus overall statistics. All vectors are
/// aligned to the same ascending `conducted_on` ordering.
#[derive(PartialEq, Debug, Clone)]
pub struct NumericTrend {
    pub dates: Vec<NaiveDate>,
    pub sums: Vec<f64>,
    /// None for issues without a single parsable numeric answer.
    pub means: Vec<Option<f64>>,
    /// Completion rates in percent, one per issue.
    pub response_rates: Vec<f64>,
    /// Mean of the per-issue means, over issues that have one.
    pub mean_of_means: f64,
    /// Population standard deviation of the per-issue means.
    pub stdev_of_means: f64,
    pub response_rate_average: f64,
}

/// Chart-agnostic aggregate for a single issue of a poll.
#[derive(PartialEq, Debug, Clone)]
pub enum IssueChart {
    WordCloud(WordFrequencies),
    Pie(CategoryCounts),
    Column(NumericSummary),
}

/// Chart-agnostic aggregate across several issues of the same poll.
#[derive(PartialEq, Debug, Clone)]
pub enum TrendChart {
    Open(WordFrequencies),
    MultipleChoice(CategoryTrend),
    Numeric(NumericTrend),
}

/// Errors that prevent aggregation from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalyticsErrors {
    /// A numeric answer whose raw value is not a finite number. This is
    /// a data-integrity fault of the upstream collaborator; corrupted
    /// survey data is never silently coerced or dropped.
    MalformedNumber {
        question_id: u64,
        response_id: u64,
        value: String,
    },
    /// An answer referencing a response absent from the snapshot.
    UnknownResponse { response_id: u64 },
    /// A response referencing an issue absent from the snapshot.
    UnknownIssue { issue_id: u64 },
    /// An answer referencing a question outside the declared set.
    UnknownQuestion { question_id: u64 },
}

impl Error for AnalyticsErrors {}

impl Display for AnalyticsErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyticsErrors::MalformedNumber {
                question_id,
                response_id,
                value,
            } => write!(
                f,
                "malformed numeric value {:?} (question {}, response {})",
                value, question_id, response_id
            ),
            AnalyticsErrors::UnknownResponse { response_id } => {
                write!(f, "answer references unknown response {}", response_id)
            }
            AnalyticsErrors::UnknownIssue { issue_id } => {
                write!(f, "response references unknown issue {}", issue_id)
            }
            AnalyticsErrors::UnknownQuestion { question_id } => {
                write!(f, "answer references unknown question {}", question_id)
            }
        }
    }
}
