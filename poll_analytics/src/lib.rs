mod config;
pub mod builder;
pub mod cache;
pub mod manual;

use log::{debug, info};

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    ops::{Add, AddAssign},
};

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct TallyCount(u64);

impl TallyCount {
    const EMPTY: TallyCount = TallyCount(0);
}

impl std::iter::Sum for TallyCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        TallyCount(iter.map(|tc| tc.0).sum())
    }
}

impl AddAssign for TallyCount {
    fn add_assign(&mut self, rhs: TallyCount) {
        self.0 += rhs.0;
    }
}

impl Add for TallyCount {
    type Output = TallyCount;
    fn add(self: TallyCount, rhs: TallyCount) -> TallyCount {
        TallyCount(self.0 + rhs.0)
    }
}

// **** Classification ****

/// Completion state of a response.
///
/// This is a pure passthrough of the stored status: the status is
/// asserted by the upstream ingestion pipeline and never inferred from
/// the number of answers.
pub fn classify_response(response: &Response) -> ResponseStatus {
    response.status
}

/// The answers of one question whose response is not empty.
///
/// Responses with status `Empty` carry no answers by invariant, but the
/// exclusion is still applied through the classifier rather than
/// assumed.
fn eligible_answers<'a>(records: &'a IssueRecords, question: &Question) -> Vec<&'a Answer> {
    let included: HashSet<u64> = records
        .responses
        .iter()
        .filter(|r| classify_response(r) != ResponseStatus::Empty)
        .map(|r| r.id)
        .collect();
    records
        .answers
        .iter()
        .filter(|a| a.question_id == question.id && included.contains(&a.response_id))
        .collect()
}

// **** Per-question aggregators ****

/// Tallies answers by their stored category label.
///
/// Answers without a category are skipped. The output is sorted
/// ascending by label, so equal counts cannot make the ordering
/// ambiguous. An empty input yields an empty list.
pub fn category_counts(answers: &[&Answer]) -> CategoryCounts {
    let tally: BTreeMap<String, TallyCount> = answers
        .iter()
        .filter_map(|a| a.category.as_deref())
        .fold(BTreeMap::new(), |mut acc, category| {
            *acc.entry(category.to_string()).or_insert(TallyCount::EMPTY) += TallyCount(1);
            acc
        });
    CategoryCounts {
        counts: tally.into_iter().map(|(c, tc)| (c, tc.0)).collect(),
    }
}

/// Tallies token frequencies over open-text answers.
///
/// Values are lower-cased, stripped of punctuation and split on
/// whitespace. The result is sorted descending by count, with ties
/// broken by ascending alphabetical order so the output is
/// deterministic. No truncation is applied at this level.
pub fn word_counts(answers: &[&Answer]) -> WordFrequencies {
    let tally: BTreeMap<String, TallyCount> =
        answers
            .iter()
            .flat_map(|a| tokenize(&a.value))
            .fold(BTreeMap::new(), |mut acc, word| {
                *acc.entry(word).or_insert(TallyCount::EMPTY) += TallyCount(1);
                acc
            });
    WordFrequencies {
        counts: sort_by_weight(tally),
    }
}

fn tokenize(value: &str) -> Vec<String> {
    value
        .to_lowercase()
        .split_whitespace()
        .map(|token| token.chars().filter(|c| c.is_alphanumeric()).collect())
        .filter(|token: &String| !token.is_empty())
        .collect()
}

// Descending by count, ascending by word on equality.
fn sort_by_weight(tally: BTreeMap<String, TallyCount>) -> Vec<(String, u64)> {
    let mut counts: Vec<(String, u64)> = tally.into_iter().map(|(w, tc)| (w, tc.0)).collect();
    counts.sort_by(|(wa, ca), (wb, cb)| cb.cmp(ca).then(wa.cmp(wb)));
    counts
}

/// Sum, mean and auto-ranged histogram of numeric answers.
///
/// A raw value that does not parse as a finite number is a
/// data-integrity fault and fails the whole aggregation.
pub fn numeric_summary(answers: &[&Answer]) -> Result<NumericSummary, AnalyticsErrors> {
    let mut values: Vec<f64> = Vec::with_capacity(answers.len());
    for a in answers.iter() {
        values.push(parse_number(a)?);
    }
    let sum: f64 = values.iter().sum();
    let mean = if values.is_empty() {
        0.0
    } else {
        sum / values.len() as f64
    };
    Ok(NumericSummary {
        sum,
        mean,
        histogram: auto_range_counts(&values),
    })
}

fn parse_number(answer: &Answer) -> Result<f64, AnalyticsErrors> {
    match answer.value.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(x),
        _ => Err(AnalyticsErrors::MalformedNumber {
            question_id: answer.question_id,
            response_id: answer.response_id,
            value: answer.value.clone(),
        }),
    }
}

/// Equal-width bucketing over [min, max].
///
/// The target bucket count is min(10, distinct values). A degenerate
/// range produces a single "v-v" bucket holding everything, which also
/// guards the division by the width. Values landing exactly on an
/// internal boundary go to the lower bucket; the maximum goes to the
/// last bucket. Empty buckets are kept.
fn auto_range_counts(values: &[f64]) -> Vec<RangeBucket> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let mut distinct = sorted.clone();
    distinct.dedup();

    if max == min {
        let label = format!("{}-{}", format_bound(min), format_bound(max));
        return vec![RangeBucket {
            label,
            count: values.len() as u64,
        }];
    }

    let target = distinct.len().min(10);
    let width = (max - min) / target as f64;
    let mut counts = vec![TallyCount::EMPTY; target];
    for &v in values.iter() {
        let pos = (v - min) / width;
        let idx = (pos.ceil() as usize).saturating_sub(1).min(target - 1);
        counts[idx] += TallyCount(1);
    }
    debug!("auto_range_counts: min {} max {} width {}", min, max, width);

    counts
        .iter()
        .enumerate()
        .map(|(i, tc)| {
            let low = min + i as f64 * width;
            let high = if i == target - 1 {
                max
            } else {
                min + (i + 1) as f64 * width
            };
            RangeBucket {
                label: format!("{}-{}", format_bound(low), format_bound(high)),
                count: tc.0,
            }
        })
        .collect()
}

// Bucket bounds print like stored values: no fractional part for whole
// numbers, at most two decimals otherwise.
fn format_bound(x: f64) -> String {
    let rounded = round2(x);
    if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

// **** Completion rates ****

/// Percentage of complete responses, rounded to two decimal places.
///
/// An issue without any response has a rate of 0 rather than an error.
pub fn completion_rate(responses: &[Response]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }
    let complete = responses
        .iter()
        .filter(|r| classify_response(r) == ResponseStatus::Complete)
        .count();
    round2(100.0 * complete as f64 / responses.len() as f64)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

// Population standard deviation.
fn stdev_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean_of(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

// **** Chart dispatch ****

/// Aggregate for a single issue of a poll.
///
/// Open-ended questions produce a word cloud, category-style questions
/// (multiple-choice, keypad, menu) a pie tally, numeric questions a
/// column histogram. Other types have no chart representation and
/// yield `None`.
pub fn single_issue_chart(
    question: &Question,
    records: &IssueRecords,
) -> Result<Option<IssueChart>, AnalyticsErrors> {
    info!(
        "single_issue_chart: issue {} question {} ({:?})",
        records.issue.id, question.id, question.question_type
    );
    let answers = eligible_answers(records, question);
    let chart = match question.question_type {
        QuestionType::Open => Some(IssueChart::WordCloud(word_counts(&answers))),
        QuestionType::MultipleChoice | QuestionType::Keypad | QuestionType::Menu => {
            Some(IssueChart::Pie(category_counts(&answers)))
        }
        QuestionType::Numeric => Some(IssueChart::Column(numeric_summary(&answers)?)),
        QuestionType::Recording => None,
    };
    Ok(chart)
}

/// Aggregate across several issues of the same poll.
///
/// Issues may be supplied in any order; the output is always sorted
/// ascending by `conducted_on` (ties by issue id), so per-issue
/// aggregation can run concurrently and merge deterministically.
pub fn multi_issue_chart(
    question: &Question,
    records: &[IssueRecords],
) -> Result<Option<TrendChart>, AnalyticsErrors> {
    info!(
        "multi_issue_chart: {} issues, question {} ({:?})",
        records.len(),
        question.id,
        question.question_type
    );
    let ordered = chronological(records);
    let chart = match question.question_type {
        QuestionType::Numeric => Some(TrendChart::Numeric(numeric_trend(question, &ordered)?)),
        QuestionType::Open => Some(TrendChart::Open(merged_word_counts(question, &ordered))),
        QuestionType::MultipleChoice => {
            Some(TrendChart::MultipleChoice(category_trend(question, &ordered)))
        }
        QuestionType::Menu | QuestionType::Keypad | QuestionType::Recording => None,
    };
    Ok(chart)
}

fn chronological(records: &[IssueRecords]) -> Vec<&IssueRecords> {
    let mut ordered: Vec<&IssueRecords> = records.iter().collect();
    ordered.sort_by_key(|r| (r.issue.conducted_on, r.issue.id));
    ordered
}

/// Merges the category counts of each issue on the union of the labels
/// seen across all of them, padding with zeros where a label is absent.
fn category_trend(question: &Question, ordered: &[&IssueRecords]) -> CategoryTrend {
    let per_issue: Vec<CategoryCounts> = ordered
        .iter()
        .map(|records| category_counts(&eligible_answers(records, question)))
        .collect();

    // Union of all the labels, in ascending label order.
    let labels: BTreeSet<String> = per_issue
        .iter()
        .flat_map(|cc| cc.counts.iter().map(|(c, _)| c.clone()))
        .collect();

    let series = labels
        .into_iter()
        .map(|label| {
            let data = per_issue
                .iter()
                .map(|cc| {
                    cc.counts
                        .iter()
                        .find(|(c, _)| *c == label)
                        .map(|(_, n)| *n)
                        .unwrap_or(0)
                })
                .collect();
            LabelSeries { name: label, data }
        })
        .collect();

    CategoryTrend {
        dates: ordered
            .iter()
            .map(|r| r.issue.conducted_on.date_naive())
            .collect(),
        series,
    }
}

/// Sums word counts across issues and keeps the heaviest
/// [`MAX_TREND_WORDS`] words. This truncation is distinct from
/// single-issue aggregation, which returns the full set.
fn merged_word_counts(question: &Question, ordered: &[&IssueRecords]) -> WordFrequencies {
    let tally: BTreeMap<String, TallyCount> = ordered
        .iter()
        .flat_map(|records| {
            word_counts(&eligible_answers(records, question))
                .counts
                .into_iter()
        })
        .fold(BTreeMap::new(), |mut acc, (word, count)| {
            *acc.entry(word).or_insert(TallyCount::EMPTY) += TallyCount(count);
            acc
        });
    let mut counts = sort_by_weight(tally);
    counts.truncate(MAX_TREND_WORDS);
    WordFrequencies { counts }
}

/// One (date, sum, mean, completion rate) point per issue, plus overall
/// statistics over the issues that produced a mean.
fn numeric_trend(
    question: &Question,
    ordered: &[&IssueRecords],
) -> Result<NumericTrend, AnalyticsErrors> {
    let mut dates = Vec::with_capacity(ordered.len());
    let mut sums = Vec::with_capacity(ordered.len());
    let mut means = Vec::with_capacity(ordered.len());
    let mut response_rates = Vec::with_capacity(ordered.len());
    // Issues with no eligible numeric answer appear as null points and
    // are left out of the overall statistics.
    let mut issue_means: Vec<f64> = Vec::new();

    for records in ordered.iter() {
        let answers = eligible_answers(records, question);
        let summary = numeric_summary(&answers)?;
        dates.push(records.issue.conducted_on.date_naive());
        response_rates.push(completion_rate(&records.responses));
        if answers.is_empty() {
            sums.push(0.0);
            means.push(None);
        } else {
            sums.push(summary.sum);
            means.push(Some(summary.mean));
            issue_means.push(summary.mean);
        }
    }

    Ok(NumericTrend {
        dates,
        sums,
        means,
        mean_of_means: round2(mean_of(&issue_means)),
        stdev_of_means: round2(stdev_of(&issue_means)),
        response_rate_average: round2(mean_of(&response_rates)),
        response_rates,
    })
}
