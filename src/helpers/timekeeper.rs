use chrono::NaiveDate;
use reqwest::{Client, Method, Response, StatusCode, Url, header};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{error, info, warn};

use crate::error::{Result, TimekeeperError};
use crate::helpers::{auth, calendar::DATE_FORMAT, config::TimekeeperConfig};
use crate::models::timekeeper::{
    CreateTaskRequest, CreateTaskResponse, LaborTask, LaborTaskRelationships, TASK_TIME_SUFFIX,
    TaskRecord, TimesheetEntry, UpdateTaskRequest, WriteResponse, work_order_prefix,
};

/// HTTP client for the Timekeeper service. Every request is signed with a fresh nonce.
#[derive(Clone)]
pub struct TimekeeperClient {
    http: Client,
    config: TimekeeperConfig,
}

impl TimekeeperClient {
    pub fn new(config: TimekeeperConfig) -> Result<Self> {
        info!("Initializing Timekeeper client for {}", config.service_url);

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        match Client::builder().default_headers(headers).build() {
            Ok(http) => Ok(Self { http, config }),
            Err(e) => {
                error!("Failed to build Timekeeper client: {}", e);
                Err(TimekeeperError::Client(e))
            }
        }
    }

    pub fn config(&self) -> &TimekeeperConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.service_url.trim_end_matches('/'), path)
    }

    fn url_with_query(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let base = self.url(path);
        Url::parse_with_params(&base, params)
            .map(String::from)
            .map_err(|e| TimekeeperError::InvalidUrl {
                url: base,
                message: e.to_string(),
            })
    }

    /// `{base}/tasks/{task_id}` with the id encoded as a single path segment.
    /// An empty id yields `{base}/tasks/`.
    fn task_url(&self, task_id: &str) -> Result<String> {
        let base = self.url("/tasks");
        let invalid = |message: String| TimekeeperError::InvalidUrl {
            url: base.clone(),
            message,
        };

        // dot segments would be dropped and address the collection itself
        if matches!(task_id, "." | "..") {
            return Err(invalid(format!("'{}' is not a valid task id", task_id)));
        }

        let mut url = Url::parse(&base).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("url cannot take path segments".to_string()))?
            .push(task_id);
        Ok(url.into())
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: &str,
        actor: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let authorization = auth::authorization_header(
            url,
            &method,
            actor,
            &self.config.api_key,
            &self.config.shared_secret,
            &auth::new_nonce(),
        )?;

        let mut request = self
            .http
            .request(method.clone(), url)
            .header(header::AUTHORIZATION, authorization);
        if let Some(body) = body {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => {
                info!("{} {} -> {}", method, url, response.status());
                Ok(response)
            }
            Err(e) => {
                error!("Failed to send {} request to {}: {}", method, url, e);
                Err(TimekeeperError::Transport {
                    method: method.to_string(),
                    url: url.to_string(),
                    source: e,
                })
            }
        }
    }

    async fn read_body(response: Response, method: &Method, url: &str) -> Result<String> {
        response.text().await.map_err(|e| {
            error!("Failed to read response body from {}: {}", url, e);
            TimekeeperError::Transport {
                method: method.to_string(),
                url: url.to_string(),
                source: e,
            }
        })
    }

    async fn expect_success(response: Response, method: &Method, url: &str) -> Result<String> {
        let status = response.status();
        let body = Self::read_body(response, method, url).await?;
        if !status.is_success() {
            error!("Timekeeper returned error status {}: {}", status, body);
            return Err(TimekeeperError::HttpStatus {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn decode<T: DeserializeOwned>(text: &str, url: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|source| {
            error!("Failed to parse response from {}: {}", url, source);
            error!("Raw response: {}", text);
            TimekeeperError::Decode {
                url: url.to_string(),
                source,
            }
        })
    }

    /// Resolves a labor task name to its code within the work order's prefix.
    /// Names are matched exactly, including case.
    pub async fn get_labor_task(
        &self,
        work_order: &str,
        labor_task_name: &str,
        actor: &str,
    ) -> Result<LaborTask> {
        let prefix = work_order_prefix(work_order);
        let url = self.url_with_query("/laborTaskRelationships", &[("filter", prefix)])?;
        info!("Looking up labor task '{}' for prefix {}", labor_task_name, prefix);

        let response = self.send::<()>(Method::GET, &url, actor, None).await?;
        let body = Self::expect_success(response, &Method::GET, &url).await?;
        let relationships: LaborTaskRelationships = Self::decode(&body, &url)?;

        relationships
            .get(prefix)
            .and_then(|tasks| tasks.iter().find(|task| task.task_desc == labor_task_name))
            .map(|task| LaborTask {
                name: task.task_desc.clone(),
                code: task.task_id.clone(),
            })
            .ok_or_else(|| {
                warn!("No labor task named '{}' under prefix {}", labor_task_name, prefix);
                TimekeeperError::NotFound {
                    task: labor_task_name.to_string(),
                    prefix: prefix.to_string(),
                }
            })
    }

    /// Creates a bare task. The returned id is empty when the service omits it;
    /// the create status itself is only logged.
    pub async fn create_task(
        &self,
        description: &str,
        date: NaiveDate,
        actor: &str,
    ) -> Result<String> {
        let url = self.url("/tasks");
        let body = CreateTaskRequest {
            user: actor,
            description,
            date: format!("{}{}", date.format(DATE_FORMAT), TASK_TIME_SUFFIX),
        };

        let response = self.send(Method::POST, &url, actor, Some(&body)).await?;
        let status = response.status();
        let text = Self::read_body(response, &Method::POST, &url).await?;
        if !status.is_success() {
            warn!("Task creation returned status {}: {}", status, text);
        }

        let created = serde_json::from_str::<CreateTaskResponse>(&text).unwrap_or_else(|e| {
            warn!(
                "Task creation response was not usable JSON ({}), treating id as empty",
                e
            );
            CreateTaskResponse::default()
        });
        let task_id = created.task_id();
        if task_id.is_empty() {
            warn!("Task creation response carried no id");
        } else {
            info!("Created task {}", task_id);
        }
        Ok(task_id)
    }

    /// Fills in hours, labor task and work order on a created task, always unapproved.
    pub async fn update_task(
        &self,
        task_id: &str,
        hours_worked: &str,
        work_order: &str,
        labor_task: &LaborTask,
        actor: &str,
    ) -> Result<WriteResponse> {
        let url = self.task_url(task_id)?;
        let body = UpdateTaskRequest {
            taskid: task_id,
            hours: hours_worked,
            labor_task,
            work_order,
            approved: "false",
        };

        let response = self.send(Method::PUT, &url, actor, Some(&body)).await?;
        let status = response.status().as_u16();
        let body = Self::read_body(response, &Method::PUT, &url).await?;

        Ok(WriteResponse {
            task_id: task_id.to_string(),
            status,
            body,
        })
    }

    /// One full write: create, resolve the labor task, then update.
    /// The service cannot set hours or labor task at creation time, so an
    /// entry always takes two writes and a failed update leaves the created task behind.
    pub async fn import_task(
        &self,
        entry: &TimesheetEntry,
        date: NaiveDate,
        actor: &str,
    ) -> Result<WriteResponse> {
        let task_id = self.create_task(&entry.description, date, actor).await?;
        let labor_task = self
            .get_labor_task(&entry.work_order, &entry.labor_task_name, actor)
            .await?;
        self.update_task(
            &task_id,
            &entry.hours_worked,
            &entry.work_order,
            &labor_task,
            actor,
        )
        .await
    }

    /// `None` when the service reports the task does not exist.
    pub async fn get_task(&self, task_id: &str, actor: &str) -> Result<Option<TaskRecord>> {
        let url = self.task_url(task_id)?;
        let response = self.send::<()>(Method::GET, &url, actor, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            info!("Task {} not found", task_id);
            return Ok(None);
        }

        let body = Self::expect_success(response, &Method::GET, &url).await?;
        Self::decode(&body, &url).map(Some)
    }

    pub async fn get_tasks(
        &self,
        actor: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TaskRecord>> {
        let start = start_date.format(DATE_FORMAT).to_string();
        let end = end_date.format(DATE_FORMAT).to_string();
        let url = self.url_with_query(
            "/tasks",
            &[("netid", actor), ("startDate", start.as_str()), ("endDate", end.as_str())],
        )?;

        let response = self.send::<()>(Method::GET, &url, actor, None).await?;
        let body = Self::expect_success(response, &Method::GET, &url).await?;
        let tasks: Vec<TaskRecord> = Self::decode(&body, &url)?;
        info!("Fetched {} tasks for {} from {} to {}", tasks.len(), actor, start, end);
        Ok(tasks)
    }

    /// Out-of-band cleanup. Not retried.
    pub async fn delete_task(&self, task_id: &str, actor: &str) -> Result<()> {
        let url = self.task_url(task_id)?;
        let response = self.send::<()>(Method::DELETE, &url, actor, None).await?;
        Self::expect_success(response, &Method::DELETE, &url).await?;
        info!("Deleted task {}", task_id);
        Ok(())
    }
}
