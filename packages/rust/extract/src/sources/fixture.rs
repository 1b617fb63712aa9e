//! Scripted in-memory extractor source.
//!
//! Used by engine tests to drive the orchestration loop deterministically,
//! and by the CLI `--source demo` mode. Each scripted step yields either a
//! page of records or an injected failure.

use std::collections::VecDeque;

use async_trait::async_trait;
use expoharvest_shared::{ExpoHarvestError, RawContact, RawExhibitor, Result};

use crate::{Batch, Extractor};

/// One scripted step of fixture output.
#[derive(Debug, Clone)]
enum Step {
    Page(Vec<RawExhibitor>),
    Fail(String),
}

/// An [`Extractor`] that replays a fixed script of pages and failures.
#[derive(Debug, Default)]
pub struct FixtureExtractor {
    steps: VecDeque<Step>,
    total_pages: Option<u32>,
}

impl FixtureExtractor {
    /// Script a sequence of pages; `total_pages` reflects the page count.
    pub fn from_pages(pages: Vec<Vec<RawExhibitor>>) -> Self {
        let total = pages.len() as u32;
        Self {
            steps: pages.into_iter().map(Step::Page).collect(),
            total_pages: Some(total),
        }
    }

    /// A source that claims no size estimate.
    pub fn without_total(mut self) -> Self {
        self.total_pages = None;
        self
    }

    /// Append a step that fails with an extract error.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push_back(Step::Fail(message.into()));
        self
    }

    /// Small built-in dataset for the CLI demo mode.
    pub fn demo() -> Self {
        let contact = |name: &str, email: &str| RawContact {
            name: Some(name.into()),
            email: Some(email.into()),
            ..RawContact::default()
        };
        Self::from_pages(vec![
            vec![
                RawExhibitor {
                    company_name: Some("Acme Robotics".into()),
                    booth_no: Some("A-01".into()),
                    website: Some("https://acme-robotics.example".into()),
                    location: Some("Hall 1".into()),
                    contacts: vec![contact("Dana Reyes", "dana@acme-robotics.example")],
                    ..RawExhibitor::default()
                },
                RawExhibitor {
                    company_name: Some("Borealis Analytics".into()),
                    booth_no: Some("A-02".into()),
                    ..RawExhibitor::default()
                },
            ],
            vec![
                // Second pass over Acme fills gaps and adds a contact
                RawExhibitor {
                    company_name: Some("ACME Robotics".into()),
                    company_email: Some("info@acme-robotics.example".into()),
                    contacts: vec![
                        contact("Dana Reyes", "DANA@acme-robotics.example"),
                        contact("Kim Park", "kim@acme-robotics.example"),
                    ],
                    ..RawExhibitor::default()
                },
                RawExhibitor {
                    company_name: Some("Cirrus Materials".into()),
                    booth_no: Some("B-11".into()),
                    location: Some("Hall 2".into()),
                    ..RawExhibitor::default()
                },
            ],
        ])
    }
}

#[async_trait]
impl Extractor for FixtureExtractor {
    async fn next_batch(&mut self) -> Result<Batch> {
        match self.steps.pop_front() {
            Some(Step::Page(records)) => Ok(Batch {
                records,
                done: self.steps.is_empty(),
            }),
            Some(Step::Fail(message)) => Err(ExpoHarvestError::Extract(message)),
            None => Ok(Batch {
                records: Vec::new(),
                done: true,
            }),
        }
    }

    fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> RawExhibitor {
        RawExhibitor {
            company_name: Some(name.into()),
            ..RawExhibitor::default()
        }
    }

    #[tokio::test]
    async fn replays_pages_in_order() {
        let mut fixture =
            FixtureExtractor::from_pages(vec![vec![record("A"), record("B")], vec![record("C")]]);
        assert_eq!(fixture.total_pages(), Some(2));

        let first = fixture.next_batch().await.expect("first");
        assert_eq!(first.records.len(), 2);
        assert!(!first.done);

        let second = fixture.next_batch().await.expect("second");
        assert_eq!(second.records[0].company_name.as_deref(), Some("C"));
        assert!(second.done);
    }

    #[tokio::test]
    async fn exhausted_source_keeps_signaling_done() {
        let mut fixture = FixtureExtractor::from_pages(vec![vec![record("A")]]);
        let _ = fixture.next_batch().await.expect("page");

        let after = fixture.next_batch().await.expect("after exhaustion");
        assert!(after.records.is_empty());
        assert!(after.done);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_extract_error() {
        let mut fixture =
            FixtureExtractor::from_pages(vec![vec![record("A")]]).then_fail("source went away");

        let first = fixture.next_batch().await.expect("first page");
        assert!(!first.done);

        let err = fixture.next_batch().await.expect_err("scripted failure");
        assert!(matches!(err, ExpoHarvestError::Extract(_)));
        assert!(err.to_string().contains("source went away"));
    }

    #[tokio::test]
    async fn demo_dataset_is_well_formed() {
        let mut demo = FixtureExtractor::demo();
        let mut names = Vec::new();
        loop {
            let batch = demo.next_batch().await.expect("demo batch");
            for r in &batch.records {
                assert!(r.company_name.is_some());
            }
            names.extend(
                batch
                    .records
                    .iter()
                    .filter_map(|r| r.company_name.clone()),
            );
            if batch.done {
                break;
            }
        }
        assert!(names.len() >= 3);
    }
}
