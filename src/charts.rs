use log::{debug, info, warn};

use poll_analytics::builder::Builder;
use poll_analytics::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::charts::snapshot_reader::*;

#[derive(Debug, Snafu)]
pub enum ChartError {
    #[snafu(display("Error opening file {path}"))]
    OpeningSnapshot {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display(""))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Unknown question type {label}"))]
    UnknownQuestionType { label: String },
    #[snafu(display("Unknown response status {label}"))]
    UnknownResponseStatus { label: String },
    #[snafu(display("No question with id {id} in the snapshot"))]
    MissingQuestion { id: u64 },
    #[snafu(display("Error writing output file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("{source}"))]
    Aggregation { source: AnalyticsErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type ChartResult<T> = Result<T, ChartError>;

pub mod snapshot_reader {
    use crate::charts::*;
    use chrono::{DateTime, Utc};

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct QuestionDto {
        pub id: u64,
        pub text: String,
        pub order: u32,
        #[serde(rename = "questionType")]
        pub question_type: String,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct IssueDto {
        pub id: u64,
        #[serde(rename = "pollId")]
        pub poll_id: u64,
        #[serde(rename = "regionId")]
        pub region_id: Option<u64>,
        #[serde(rename = "conductedOn")]
        pub conducted_on: DateTime<Utc>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ResponseDto {
        pub id: u64,
        #[serde(rename = "contactId")]
        pub contact_id: u64,
        #[serde(rename = "issueId")]
        pub issue_id: u64,
        pub status: String,
        #[serde(rename = "createdOn")]
        pub created_on: DateTime<Utc>,
        #[serde(rename = "updatedOn")]
        pub updated_on: DateTime<Utc>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct AnswerDto {
        #[serde(rename = "responseId")]
        pub response_id: u64,
        #[serde(rename = "questionId")]
        pub question_id: u64,
        pub value: String,
        pub category: Option<String>,
        #[serde(rename = "submittedOn")]
        pub submitted_on: DateTime<Utc>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct SnapshotFile {
        #[serde(rename = "pollName")]
        pub poll_name: String,
        pub questions: Vec<QuestionDto>,
        pub issues: Vec<IssueDto>,
        pub responses: Vec<ResponseDto>,
        pub answers: Vec<AnswerDto>,
    }

    pub fn read_snapshot(path: &str) -> ChartResult<SnapshotFile> {
        let contents = fs::read_to_string(path).context(OpeningSnapshotSnafu { path })?;
        let snapshot: SnapshotFile =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        debug!("read_snapshot: {:?}", snapshot);
        Ok(snapshot)
    }

    pub fn read_summary(path: String) -> ChartResult<JSValue> {
        let contents = fs::read_to_string(path.clone())
            .context(OpeningSnapshotSnafu { path })?;
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

fn validate_question(dto: &QuestionDto) -> ChartResult<Question> {
    let question_type = match dto.question_type.as_str() {
        "open" => QuestionType::Open,
        "multiple-choice" => QuestionType::MultipleChoice,
        "numeric" => QuestionType::Numeric,
        "menu" => QuestionType::Menu,
        "keypad" => QuestionType::Keypad,
        "recording" => QuestionType::Recording,
        x => {
            return UnknownQuestionTypeSnafu { label: x }.fail();
        }
    };
    Ok(Question {
        id: dto.id,
        text: dto.text.clone(),
        order: dto.order,
        question_type,
    })
}

fn validate_status(label: &str) -> ChartResult<ResponseStatus> {
    match label {
        "empty" => Ok(ResponseStatus::Empty),
        "partial" => Ok(ResponseStatus::Partial),
        "complete" => Ok(ResponseStatus::Complete),
        x => UnknownResponseStatusSnafu { label: x }.fail(),
    }
}

/// Runs the snapshot through the builder, so referential mistakes in
/// the file surface here rather than during aggregation.
fn assemble(snapshot: &SnapshotFile, questions: &[Question]) -> ChartResult<Vec<IssueRecords>> {
    debug!(
        "assemble: {} issues, {} responses, {} answers",
        snapshot.issues.len(),
        snapshot.responses.len(),
        snapshot.answers.len()
    );
    let mut builder = Builder::new()
        .context(AggregationSnafu {})?
        .questions(questions)
        .context(AggregationSnafu {})?;
    for issue in snapshot.issues.iter() {
        builder
            .add_issue(Issue {
                id: issue.id,
                poll_id: issue.poll_id,
                region_id: issue.region_id,
                conducted_on: issue.conducted_on,
            })
            .context(AggregationSnafu {})?;
    }
    for response in snapshot.responses.iter() {
        builder
            .add_response(Response {
                id: response.id,
                contact_id: response.contact_id,
                issue_id: response.issue_id,
                status: validate_status(response.status.as_str())?,
                created_on: response.created_on,
                updated_on: response.updated_on,
            })
            .context(AggregationSnafu {})?;
    }
    for answer in snapshot.answers.iter() {
        builder
            .add_answer(Answer {
                response_id: answer.response_id,
                question_id: answer.question_id,
                value: answer.value.clone(),
                category: answer.category.clone(),
                submitted_on: answer.submitted_on,
            })
            .context(AggregationSnafu {})?;
    }
    Ok(builder.build())
}

fn word_cloud_data(wf: &WordFrequencies) -> JSValue {
    JSValue::Array(
        wf.counts
            .iter()
            .map(|(word, count)| json!({"text": word, "weight": count}))
            .collect(),
    )
}

fn pie_chart_data(cc: &CategoryCounts) -> JSValue {
    JSValue::Array(
        cc.counts
            .iter()
            .map(|(category, count)| json!([category, count]))
            .collect(),
    )
}

fn column_chart_data(ns: &NumericSummary) -> JSValue {
    // The labels and values are kept separate for column charts.
    let labels: Vec<&String> = ns.histogram.iter().map(|b| &b.label).collect();
    let counts: Vec<u64> = ns.histogram.iter().map(|b| b.count).collect();
    json!({
        "labels": labels,
        "counts": counts,
        "sum": ns.sum,
        "average": ns.mean,
    })
}

fn format_date(d: &chrono::NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn single_chart_js(question: &Question, records: &IssueRecords) -> ChartResult<JSValue> {
    let chart = single_issue_chart(question, records).context(AggregationSnafu {})?;
    let (chart_type, chart_data) = match chart {
        Some(IssueChart::WordCloud(wf)) => (json!("word"), word_cloud_data(&wf)),
        Some(IssueChart::Pie(cc)) => (json!("pie"), pie_chart_data(&cc)),
        Some(IssueChart::Column(ns)) => (json!("column"), column_chart_data(&ns)),
        None => (JSValue::Null, JSValue::Null),
    };
    Ok(json!({
        "questionId": question.id,
        "questionText": question.text,
        "chartType": chart_type,
        "chartData": chart_data,
    }))
}

fn trend_chart_js(question: &Question, records: &[IssueRecords]) -> ChartResult<JSValue> {
    let chart = multi_issue_chart(question, records).context(AggregationSnafu {})?;
    let (chart_type, chart_data) = match chart {
        Some(TrendChart::Open(wf)) => (json!("open-ended"), word_cloud_data(&wf)),
        Some(TrendChart::MultipleChoice(trend)) => {
            let series: Vec<JSValue> = trend
                .series
                .iter()
                .map(|s| json!({"name": s.name, "data": s.data}))
                .collect();
            let dates: Vec<String> = trend.dates.iter().map(format_date).collect();
            (
                json!("multiple-choice"),
                json!({"dates": dates, "series": series}),
            )
        }
        Some(TrendChart::Numeric(trend)) => {
            let dates: Vec<String> = trend.dates.iter().map(format_date).collect();
            (
                json!("numeric"),
                json!({
                    "dates": dates,
                    "sum": trend.sums,
                    "average": trend.means,
                    "response-rate": trend.response_rates,
                    "answerMean": trend.mean_of_means,
                    "answerStdev": trend.stdev_of_means,
                    "responseRateAverage": trend.response_rate_average,
                }),
            )
        }
        None => (JSValue::Null, JSValue::Null),
    };
    Ok(json!({
        "questionId": question.id,
        "questionText": question.text,
        "chartType": chart_type,
        "chartData": chart_data,
    }))
}

/// Participation numbers of one issue, as shown on the issue lists.
fn participation_js(records: &IssueRecords) -> JSValue {
    let completed = records
        .responses
        .iter()
        .filter(|r| classify_response(r) == ResponseStatus::Complete)
        .count();
    json!({
        "issueId": records.issue.id,
        "date": format_date(&records.issue.conducted_on.date_naive()),
        "sentTo": records.responses.len(),
        "completed": completed,
        "completionRate": completion_rate(&records.responses),
    })
}

fn build_summary_js(
    poll_name: &str,
    questions: &[Question],
    records: &[IssueRecords],
) -> ChartResult<JSValue> {
    let mut ordered: Vec<&IssueRecords> = records.iter().collect();
    ordered.sort_by_key(|r| (r.issue.conducted_on, r.issue.id));
    let issues_js: Vec<JSValue> = ordered.iter().map(|r| participation_js(r)).collect();

    let mut sorted_questions: Vec<&Question> = questions.iter().collect();
    sorted_questions.sort_by_key(|q| (q.order, q.id));

    let mut charts_js: Vec<JSValue> = Vec::new();
    for question in sorted_questions.iter() {
        let js = match records.len() {
            0 => continue,
            1 => single_chart_js(question, &records[0])?,
            _ => trend_chart_js(question, records)?,
        };
        charts_js.push(js);
    }

    Ok(json!({
        "poll": poll_name,
        "issues": issues_js,
        "charts": charts_js,
    }))
}

pub fn run_charts(args: &Args) -> ChartResult<()> {
    let snapshot = read_snapshot(args.input.as_str())?;
    info!(
        "run_charts: poll {:?}: {} questions, {} issues, {} responses, {} answers",
        snapshot.poll_name,
        snapshot.questions.len(),
        snapshot.issues.len(),
        snapshot.responses.len(),
        snapshot.answers.len()
    );

    let mut questions: Vec<Question> = Vec::new();
    for dto in snapshot.questions.iter() {
        questions.push(validate_question(dto)?);
    }

    // Validation runs against the full question set; the selector only
    // narrows which charts get built.
    let records = assemble(&snapshot, &questions)?;
    if let Some(id) = args.question {
        questions.retain(|q| q.id == id);
        if questions.is_empty() {
            return MissingQuestionSnafu { id }.fail();
        }
    }

    let summary_js = build_summary_js(snapshot.poll_name.as_str(), &questions, &records)?;

    let pretty_js_stats = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    match args.out.as_deref() {
        Some(path) if path != "stdout" => {
            fs::write(path, &pretty_js_stats).context(WritingOutputSnafu { path })?;
        }
        _ => println!("{}", pretty_js_stats),
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = args.reference.clone() {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

fn run_snapshot_test(test_name: &str, snapshot_lpath: &str, summary_lpath: &str) {
    let test_dir = option_env!("POLLSTAT_TEST_DIR").unwrap_or("tests/data");
    info!("Running test {}", test_name);
    let args = Args {
        input: format!("{}/{}/{}", test_dir, test_name, snapshot_lpath),
        reference: Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath)),
        out: None,
        question: None,
        verbose: false,
    };
    let res = run_charts(&args);
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        panic!("test {} failed: {}", test_name, e);
    }
}

pub fn test_wrapper(test_name: &str) {
    run_snapshot_test(
        test_name,
        "snapshot.json",
        "expected_summary.json",
    )
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn two_issue_numeric() {
        test_wrapper("two_issue_numeric");
    }

    #[test]
    fn single_issue_categories() {
        test_wrapper("single_issue_categories");
    }

    #[test]
    fn rejects_unknown_question_type() {
        let dto = QuestionDto {
            id: 1,
            text: "q".to_string(),
            order: 1,
            question_type: "video".to_string(),
        };
        let res = validate_question(&dto);
        assert!(matches!(
            res,
            Err(ChartError::UnknownQuestionType { .. })
        ));
    }

    #[test]
    fn rejects_unknown_status() {
        let res = validate_status("half-done");
        assert!(matches!(
            res,
            Err(ChartError::UnknownResponseStatus { .. })
        ));
    }

    #[test]
    fn column_data_keeps_labels_and_counts_separate() {
        let ns = NumericSummary {
            sum: 15.0,
            mean: 5.0,
            histogram: vec![RangeBucket {
                label: "5-5".to_string(),
                count: 3,
            }],
        };
        let js = column_chart_data(&ns);
        assert_eq!(js["labels"], json!(["5-5"]));
        assert_eq!(js["counts"], json!([3]));
        assert_eq!(js["average"], json!(5.0));
    }
}
