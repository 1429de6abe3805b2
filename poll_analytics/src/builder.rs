pub use crate::config::*;

/// A builder for assembling a validated snapshot of records.
///
/// The engine assumes its inputs are well-formed joins; the builder is
/// the place where referential mistakes surface as errors instead.
///
/// ```
/// pub use poll_analytics::builder::Builder;
/// pub use poll_analytics::{Issue, Response, ResponseStatus};
/// # use poll_analytics::AnalyticsErrors;
///
/// let mut builder = Builder::new()?;
/// builder.add_issue(Issue {
///     id: 1,
///     poll_id: 1,
///     region_id: None,
///     conducted_on: chrono::Utc::now(),
/// })?;
/// builder.add_response(Response {
///     id: 10,
///     contact_id: 7,
///     issue_id: 1,
///     status: ResponseStatus::Complete,
///     created_on: chrono::Utc::now(),
///     updated_on: chrono::Utc::now(),
/// })?;
///
/// # Ok::<(), AnalyticsErrors>(())
/// ```
pub struct Builder {
    pub(crate) _questions: Option<Vec<Question>>,
    pub(crate) _records: Vec<IssueRecords>,
}

impl Builder {
    pub fn new() -> Result<Builder, AnalyticsErrors> {
        Ok(Builder {
            _questions: None,
            _records: Vec::new(),
        })
    }

    /// Declares the question set. When declared, answers referencing a
    /// question outside of it are rejected.
    pub fn questions(self, questions: &[Question]) -> Result<Builder, AnalyticsErrors> {
        Ok(Builder {
            _questions: Some(questions.to_vec()),
            _records: self._records,
        })
    }

    pub fn add_issue(&mut self, issue: Issue) -> Result<(), AnalyticsErrors> {
        self._records.push(IssueRecords {
            issue,
            responses: Vec::new(),
            answers: Vec::new(),
        });
        Ok(())
    }

    pub fn add_response(&mut self, response: Response) -> Result<(), AnalyticsErrors> {
        let records = self
            ._records
            .iter_mut()
            .find(|r| r.issue.id == response.issue_id)
            .ok_or(AnalyticsErrors::UnknownIssue {
                issue_id: response.issue_id,
            })?;
        records.responses.push(response);
        Ok(())
    }

    pub fn add_answer(&mut self, answer: Answer) -> Result<(), AnalyticsErrors> {
        if let Some(questions) = self._questions.as_deref() {
            if !questions.iter().any(|q| q.id == answer.question_id) {
                return Err(AnalyticsErrors::UnknownQuestion {
                    question_id: answer.question_id,
                });
            }
        }
        let records = self
            ._records
            .iter_mut()
            .find(|r| r.responses.iter().any(|resp| resp.id == answer.response_id))
            .ok_or(AnalyticsErrors::UnknownResponse {
                response_id: answer.response_id,
            })?;
        records.answers.push(answer);
        Ok(())
    }

    /// The assembled per-issue records, in insertion order.
    pub fn build(self) -> Vec<IssueRecords> {
        self._records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn issue(id: u64) -> Issue {
        Issue {
            id,
            poll_id: 1,
            region_id: None,
            conducted_on: Utc.with_ymd_and_hms(2015, 9, 1, 12, 0, 0).unwrap(),
        }
    }

    fn response(id: u64, issue_id: u64) -> Response {
        Response {
            id,
            contact_id: id,
            issue_id,
            status: ResponseStatus::Complete,
            created_on: Utc.with_ymd_and_hms(2015, 9, 1, 12, 0, 0).unwrap(),
            updated_on: Utc.with_ymd_and_hms(2015, 9, 1, 12, 0, 0).unwrap(),
        }
    }

    fn answer(response_id: u64, question_id: u64) -> Answer {
        Answer {
            response_id,
            question_id,
            value: "5".to_string(),
            category: None,
            submitted_on: Utc.with_ymd_and_hms(2015, 9, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn assembles_records_per_issue() {
        let mut builder = Builder::new().unwrap();
        builder.add_issue(issue(1)).unwrap();
        builder.add_issue(issue(2)).unwrap();
        builder.add_response(response(10, 1)).unwrap();
        builder.add_response(response(11, 2)).unwrap();
        builder.add_answer(answer(10, 1)).unwrap();
        let records = builder.build();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].responses.len(), 1);
        assert_eq!(records[0].answers.len(), 1);
        assert_eq!(records[1].answers.len(), 0);
    }

    #[test]
    fn rejects_response_for_unknown_issue() {
        let mut builder = Builder::new().unwrap();
        builder.add_issue(issue(1)).unwrap();
        let res = builder.add_response(response(10, 99));
        assert_eq!(res, Err(AnalyticsErrors::UnknownIssue { issue_id: 99 }));
    }

    #[test]
    fn rejects_answer_for_unknown_response() {
        let mut builder = Builder::new().unwrap();
        builder.add_issue(issue(1)).unwrap();
        let res = builder.add_answer(answer(42, 1));
        assert_eq!(res, Err(AnalyticsErrors::UnknownResponse { response_id: 42 }));
    }

    #[test]
    fn rejects_answer_for_undeclared_question() {
        let questions = vec![Question {
            id: 1,
            text: "q".to_string(),
            order: 1,
            question_type: QuestionType::Numeric,
        }];
        let mut builder = Builder::new().unwrap().questions(&questions).unwrap();
        builder.add_issue(issue(1)).unwrap();
        builder.add_response(response(10, 1)).unwrap();
        let res = builder.add_answer(answer(10, 99));
        assert_eq!(res, Err(AnalyticsErrors::UnknownQuestion { question_id: 99 }));
    }
}
