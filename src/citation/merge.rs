/*!
 * Bibliography merge engine.
 *
 * Fetches bibliography text for a set of keys. When the reference manager
 * holds several libraries, each key is first resolved to its owning
 * library and one export is made per library, because an export call can
 * only address a single library.
 *
 * Calls are strictly sequential. Output order always follows the order in
 * which keys and libraries were first seen, never completion order.
 */

use log::{debug, info, warn};
use std::sync::Arc;

use crate::cancellation::{Cancellation, TaskOutcome};
use crate::errors::CiteError;
use crate::providers::{find_collection, BibliographyService};

use super::grammar::CiteKey;

/// Separator between texts fetched from different libraries
pub const GROUP_SEPARATOR: &str = "\n\n";

/// What a recorded failure was about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSubject {
    Key(CiteKey),
    Collection(String),
}

/// One failed lookup or export inside a merge
#[derive(Debug)]
pub struct MergeFailure {
    pub subject: FailureSubject,
    pub error: CiteError,
}

impl MergeFailure {
    pub fn is_reportable(&self) -> bool {
        self.error.is_reportable()
    }
}

/// Aggregate status of a finished merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    Succeeded,
    CompletedWithErrors,
}

/// Text produced by a merge plus every failure met along the way
#[derive(Debug, Default)]
pub struct MergeReport {
    pub text: String,
    pub failures: Vec<MergeFailure>,
}

impl MergeReport {
    fn verbatim(text: String) -> Self {
        Self {
            text,
            failures: Vec::new(),
        }
    }

    /// `CompletedWithErrors` only when a failure other than "not found" occurred
    pub fn status(&self) -> MergeStatus {
        if self.failures.iter().any(MergeFailure::is_reportable) {
            MergeStatus::CompletedWithErrors
        } else {
            MergeStatus::Succeeded
        }
    }

    /// Messages suitable for the user-facing error summary
    pub fn reportable_errors(&self) -> Vec<String> {
        self.failures
            .iter()
            .filter(|f| f.is_reportable())
            .map(|f| f.error.to_string())
            .collect()
    }
}

/// Progress notifications for the multi-library path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeProgress {
    /// Number of steps: one per key plus one per library
    Started { total: u64 },
    ResolvingKey(CiteKey),
    FetchingCollection(String),
    /// One step finished
    Advanced,
}

/// Why the multi-library path stopped early
enum Interrupt {
    Cancelled,
    Failed(CiteError),
}

impl From<CiteError> for Interrupt {
    fn from(error: CiteError) -> Self {
        Self::Failed(error)
    }
}

/// Merges bibliography text across libraries
#[derive(Debug, Clone)]
pub struct BibliographyMerger {
    service: Arc<dyn BibliographyService>,
    style: String,
}

impl BibliographyMerger {
    /// `style` is the export translator passed to every fetch
    pub fn new(service: Arc<dyn BibliographyService>, style: impl Into<String>) -> Self {
        Self {
            service,
            style: style.into(),
        }
    }

    /// Merge bibliography text for `keys`.
    ///
    /// Cancellation is checked before each key lookup and before each
    /// library export; accumulated text is dropped when it trips.
    pub async fn merge<F>(
        &self,
        keys: &[CiteKey],
        cancellation: &Cancellation,
        on_progress: F,
    ) -> TaskOutcome<MergeReport, CiteError>
    where
        F: FnMut(MergeProgress),
    {
        match self.run(keys, cancellation, on_progress).await {
            Ok(report) => TaskOutcome::Ok(report),
            Err(Interrupt::Cancelled) => {
                info!("Bibliography merge cancelled");
                TaskOutcome::Cancelled
            }
            Err(Interrupt::Failed(error)) => TaskOutcome::Err(error),
        }
    }

    async fn run<F>(
        &self,
        keys: &[CiteKey],
        cancellation: &Cancellation,
        mut on_progress: F,
    ) -> Result<MergeReport, Interrupt>
    where
        F: FnMut(MergeProgress),
    {
        let collections = self.service.list_collections().await?;

        match collections.as_slice() {
            [] => {
                return Err(CiteError::Service("No library is available in Zotero.".to_string()).into());
            }
            [only] => {
                debug!("Single library '{}', exporting {} key(s) directly", only.name, keys.len());
                let text = self.service.fetch_bibliography(keys, &self.style, only.id).await?;
                return Ok(MergeReport::verbatim(text));
            }
            _ => {}
        }

        let total = (collections.len() + keys.len()) as u64;
        on_progress(MergeProgress::Started { total });

        let mut failures = Vec::new();
        let mut groups: Vec<(String, Vec<CiteKey>)> = Vec::new();

        for key in keys {
            if cancellation.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            on_progress(MergeProgress::ResolvingKey(key.clone()));

            match self.service.resolve_key_collection(key).await {
                Ok(name) => {
                    match groups.iter_mut().find(|(group, _)| *group == name) {
                        Some((_, members)) => {
                            if !members.contains(key) {
                                members.push(key.clone());
                            }
                        }
                        None => groups.push((name, vec![key.clone()])),
                    }
                }
                Err(error) => {
                    if error.is_reportable() {
                        warn!("Failed to resolve library of '{}': {}", key, error);
                    } else {
                        debug!("{}", error);
                    }
                    failures.push(MergeFailure {
                        subject: FailureSubject::Key(key.clone()),
                        error,
                    });
                }
            }

            on_progress(MergeProgress::Advanced);
        }

        let mut texts = Vec::with_capacity(groups.len());

        for (name, members) in &groups {
            if cancellation.is_cancelled() {
                return Err(Interrupt::Cancelled);
            }
            on_progress(MergeProgress::FetchingCollection(name.clone()));

            let fetched = match find_collection(&collections, name) {
                Some(collection) => {
                    self.service.fetch_bibliography(members, &self.style, collection.id).await
                }
                None => Err(CiteError::Service(format!("Library '{}' is not known to Zotero.", name))),
            };

            match fetched {
                Ok(text) => texts.push(text),
                Err(error) => {
                    warn!("Failed to export library '{}': {}", name, error);
                    failures.push(MergeFailure {
                        subject: FailureSubject::Collection(name.clone()),
                        error,
                    });
                }
            }

            on_progress(MergeProgress::Advanced);
        }

        Ok(MergeReport {
            text: texts.join(GROUP_SEPARATOR),
            failures,
        })
    }
}
