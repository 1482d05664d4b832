use chrono::NaiveDate;
use reqwest::StatusCode;
use tracing::{error, info, warn};

use crate::{
    error::{Result, TimekeeperError},
    helpers::{calendar, rows::RowSource, timekeeper::TimekeeperClient},
    models::timekeeper::{ImportOutcome, TimesheetEntry},
};

type DateFn = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Imports timesheet rows into Timekeeper, one entry at a time.
pub struct ImportService {
    client: TimekeeperClient,
    max_retries: u32,
    default_date: DateFn,
}

/// Per-entry outcomes of one batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub date: NaiveDate,
    pub outcomes: Vec<ImportOutcome>,
}

impl BatchReport {
    /// True when no entry exhausted its retries.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.succeeded)
    }

    pub fn exhausted(&self) -> impl Iterator<Item = &ImportOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded)
    }

    pub fn failures(&self) -> Vec<TimekeeperError> {
        self.exhausted()
            .filter_map(ImportOutcome::exhaustion)
            .collect()
    }
}

impl ImportService {
    pub fn new(client: TimekeeperClient) -> Self {
        let max_retries = client.config().max_retries;
        info!("Creating new ImportService with {} retries per entry", max_retries);
        Self {
            client,
            max_retries,
            default_date: Box::new(calendar::last_friday_local),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replaces the collaborator that picks the batch date when none is given.
    pub fn with_default_date<F>(mut self, default_date: F) -> Self
    where
        F: Fn() -> NaiveDate + Send + Sync + 'static,
    {
        self.default_date = Box::new(default_date);
        self
    }

    pub fn client(&self) -> &TimekeeperClient {
        &self.client
    }

    /// Initial attempt plus retries, capped at `u32::MAX`.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Writes one entry, retrying the whole create+update sequence until the
    /// update returns 200 or `1 + max_retries` attempts have been used. Each
    /// attempt creates a new remote task; earlier ones are left as orphans.
    pub async fn import_entry(
        &self,
        entry: TimesheetEntry,
        date: NaiveDate,
        actor: &str,
    ) -> ImportOutcome {
        info!("This is one entry that will be imported: {}", entry);

        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let written = self.client.import_task(&entry, date, actor).await;
            let (task_id, status, body) = match written {
                Ok(written) => (written.task_id, Some(written.status), written.body),
                Err(e) => {
                    warn!("Attempt {} for '{}' failed: {}", attempt, entry.description, e);
                    (String::new(), None, e.to_string())
                }
            };

            if status == Some(StatusCode::OK.as_u16()) {
                info!(
                    "Imported '{}' as task {} after {} attempt(s)",
                    entry.description, task_id, attempt
                );
                return ImportOutcome {
                    entry,
                    task_id,
                    http_status: status,
                    response_body: body,
                    attempts_used: attempt,
                    succeeded: true,
                };
            }

            if attempt >= max_attempts {
                error!("{}", body);
                error!(
                    "After {} retries we still failed. Response code: {:?}",
                    self.max_retries, status
                );
                return ImportOutcome {
                    entry,
                    task_id,
                    http_status: status,
                    response_body: body,
                    attempts_used: attempt,
                    succeeded: false,
                };
            }

            warn!(
                "Failed with response code {:?}, retrying {} of {}",
                status, attempt, self.max_retries
            );
        }
    }

    /// Imports every row in order. The default date is computed once for the
    /// whole batch. A malformed row aborts the batch; rows written before it stay written.
    pub async fn import_rows<I>(
        &self,
        rows: I,
        actor: &str,
        date: Option<NaiveDate>,
    ) -> Result<BatchReport>
    where
        I: IntoIterator<Item = Result<TimesheetEntry>>,
    {
        let date = date.unwrap_or_else(|| (self.default_date)());
        info!("Importing timesheet entries for {} dated {}", actor, date);

        let mut outcomes = Vec::new();
        for row in rows {
            let entry = match row {
                Ok(entry) => entry,
                Err(e) => {
                    error!(
                        "Aborting batch after {} entries: {}",
                        outcomes.len(),
                        e
                    );
                    return Err(e);
                }
            };
            outcomes.push(self.import_entry(entry, date, actor).await);
        }

        let report = BatchReport { date, outcomes };
        info!(
            "Batch finished: {} entries, {} exhausted",
            report.outcomes.len(),
            report.exhausted().count()
        );
        Ok(report)
    }

    pub async fn import_file(
        &self,
        source: &RowSource,
        actor: &str,
        date: Option<NaiveDate>,
    ) -> Result<BatchReport> {
        info!("Importing timesheet file {}", source.path().display());
        self.import_rows(source.rows()?, actor, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::config::TimekeeperConfig;

    fn service(max_retries: u32) -> ImportService {
        let client = TimekeeperClient::new(TimekeeperConfig {
            service_url: "http://127.0.0.1:9".to_string(),
            api_key: "key".to_string(),
            shared_secret: "secret".to_string(),
            max_retries,
        })
        .unwrap();
        ImportService::new(client)
    }

    #[test]
    fn attempts_are_one_more_than_retries() {
        assert_eq!(service(5).max_attempts(), 6);
        assert_eq!(service(0).max_attempts(), 1);
        assert_eq!(service(5).with_max_retries(2).max_attempts(), 3);
    }

    #[test]
    fn huge_retry_count_does_not_overflow() {
        assert_eq!(service(u32::MAX).max_attempts(), u32::MAX);
        assert_eq!(service(0).with_max_retries(u32::MAX).max_attempts(), u32::MAX);
    }
}
