/*!

This is the long-form manual for `poll_analytics` and `pollstat`.

## What the engine computes

Given the records of one or more issues (administrations of a poll),
the engine produces chart-agnostic aggregates per question:

* open-ended questions: word frequencies (lower-cased, punctuation
  stripped, whitespace-tokenized), sorted by descending count with
  alphabetical tie-break;
* multiple-choice, keypad and menu questions: counts per stored
  category label, sorted by label;
* numeric questions: sum, mean and an equal-width histogram with at
  most 10 buckets;
* every issue: the completion rate, the percentage of responses whose
  stored status is `complete`.

Across several issues the aggregates are merged on a date axis sorted
ascending by `conducted_on`. Category counts are padded with zeros on
the union of the labels, word counts are summed and truncated to the
top 50, and numeric questions produce aligned sum, mean and
completion-rate series plus overall statistics.

The engine is pure: it performs no I/O, holds no state, and two runs
over the same records produce identical results regardless of the
order issues are supplied in.

## Rules worth knowing

* A response with status `empty` is excluded from every per-question
  aggregate but still counts in completion-rate denominators.
* Answers carry the category label assigned at ingestion time; the
  engine never re-derives it from the question's current choices.
* A numeric value that does not parse as a finite number fails the
  aggregation with `AnalyticsErrors::MalformedNumber`. Corrupted
  survey data is not silently dropped.
* Question types with no chart representation (e.g. recordings) yield
  no aggregate rather than an error.

## Snapshot format of the `pollstat` driver

`pollstat` reads a single JSON file of already-filtered records:

```json
{
  "pollName": "Food security",
  "questions": [
    {"id": 1, "text": "How much rice is left?", "order": 1, "questionType": "numeric"}
  ],
  "issues": [
    {"id": 10, "pollId": 1, "regionId": null, "conductedOn": "2015-09-01T12:00:00Z"}
  ],
  "responses": [
    {"id": 100, "contactId": 7, "issueId": 10, "status": "complete",
     "createdOn": "2015-09-01T13:00:00Z", "updatedOn": "2015-09-01T13:05:00Z"}
  ],
  "answers": [
    {"responseId": 100, "questionId": 1, "value": "5", "category": null,
     "submittedOn": "2015-09-01T13:05:00Z"}
  ]
}
```

`questionType` is one of `open`, `multiple-choice`, `numeric`, `menu`,
`keypad`, `recording`; `status` is one of `empty`, `partial`,
`complete`. With a single issue in the snapshot the driver emits
single-issue charts, with several it emits trend charts. The output
can be diffed against a reference summary with `--reference`.

 */
