//! AWS Glue catalog backed by `aws-sdk-glue`
//!
//! Catalog namespaces are Glue databases, crawl jobs are Glue crawlers and
//! crawl output lands as Glue tables.

use async_trait::async_trait;
use aws_sdk_glue::Client;
use aws_sdk_glue::error::DisplayErrorContext;
use aws_sdk_glue::types::{
    Crawler, CrawlerState, CrawlerTargets, DatabaseInput, LastCrawlStatus, RecrawlPolicy,
    S3Target, ScheduleState, Table,
};
use aws_sdk_glue::types::{
    DeleteBehavior as GlueDeleteBehavior, RecrawlBehavior as GlueRecrawlBehavior,
    SchemaChangePolicy as GlueSchemaChangePolicy, UpdateBehavior as GlueUpdateBehavior,
};

use super::{
    CatalogError, CatalogResult, CatalogService, CreateOutcome, JobSnapshot, JobState,
    LastRunStatus, StartOutcome, TableSchema, same_location,
};
use crate::crawler::{CrawlJobSpec, DeleteBehavior, RecrawlBehavior, UpdateBehavior};

pub struct GlueCatalog {
    client: Client,
}

impl GlueCatalog {
    /// Wrap an existing Glue client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS credential chain
    pub async fn from_env(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config))
    }

    async fn list_tables(&self, namespace: &str) -> CatalogResult<Vec<Table>> {
        let mut tables = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .client
                .get_tables()
                .database_name(namespace)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| service_error(DisplayErrorContext(&e)))?;

            tables.extend(output.table_list().iter().cloned());

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(tables)
    }
}

fn service_error(e: impl std::fmt::Display) -> CatalogError {
    CatalogError::Service(e.to_string())
}

fn recrawl_policy(spec: &CrawlJobSpec) -> RecrawlPolicy {
    let behavior = match spec.recrawl_behavior() {
        RecrawlBehavior::IncrementalOnly => GlueRecrawlBehavior::CrawlNewFoldersOnly,
        RecrawlBehavior::CrawlEverything => GlueRecrawlBehavior::CrawlEverything,
    };
    RecrawlPolicy::builder().recrawl_behavior(behavior).build()
}

fn schema_change_policy(spec: &CrawlJobSpec) -> GlueSchemaChangePolicy {
    let policy = spec.schema_change_policy();
    let update = match policy.update {
        UpdateBehavior::LogOnly => GlueUpdateBehavior::Log,
        UpdateBehavior::UpdateInCatalog => GlueUpdateBehavior::UpdateInDatabase,
    };
    let delete = match policy.delete {
        DeleteBehavior::LogOnly => GlueDeleteBehavior::Log,
        DeleteBehavior::DeleteFromCatalog => GlueDeleteBehavior::DeleteFromDatabase,
        DeleteBehavior::DeprecateInCatalog => GlueDeleteBehavior::DeprecateInDatabase,
    };
    GlueSchemaChangePolicy::builder()
        .update_behavior(update)
        .delete_behavior(delete)
        .build()
}

fn targets(spec: &CrawlJobSpec) -> CatalogResult<CrawlerTargets> {
    let sample_size = i32::try_from(spec.sample_size()).map_err(|_| {
        CatalogError::InvalidRequest(format!("sample size {} out of range", spec.sample_size()))
    })?;

    let target = S3Target::builder()
        .path(spec.target_path())
        .set_exclusions(Some(spec.exclusion_patterns().to_vec()))
        .sample_size(sample_size)
        .build();

    Ok(CrawlerTargets::builder().s3_targets(target).build())
}

fn snapshot(crawler: &Crawler) -> JobSnapshot {
    let state = match crawler.state() {
        Some(CrawlerState::Ready) => JobState::Ready,
        Some(CrawlerState::Running) => JobState::Running,
        Some(CrawlerState::Stopping) => JobState::Stopping,
        _ => JobState::Unknown,
    };

    // A paused schedule counts as no schedule.
    let schedule = crawler
        .schedule()
        .filter(|s| !matches!(s.state(), Some(ScheduleState::NotScheduled)))
        .and_then(|s| s.schedule_expression())
        .map(str::to_string);

    let target_path = crawler
        .targets()
        .and_then(|t| t.s3_targets().first())
        .and_then(|t| t.path())
        .map(str::to_string);

    let last_run = crawler
        .last_crawl()
        .and_then(|l| l.status())
        .and_then(|status| match status {
            LastCrawlStatus::Succeeded => Some(LastRunStatus::Succeeded),
            LastCrawlStatus::Failed => Some(LastRunStatus::Failed),
            LastCrawlStatus::Cancelled => Some(LastRunStatus::Cancelled),
            _ => None,
        });

    JobSnapshot {
        name: crawler.name().unwrap_or_default().to_string(),
        state,
        schedule,
        target_path,
        last_run,
    }
}

fn table_schema(namespace: &str, table: &Table) -> Option<TableSchema> {
    let descriptor = table.storage_descriptor()?;
    Some(TableSchema {
        namespace: namespace.to_string(),
        name: table.name().to_string(),
        location: descriptor.location()?.to_string(),
        columns: descriptor
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        partition_columns: table
            .partition_keys()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    })
}

#[async_trait]
impl CatalogService for GlueCatalog {
    async fn namespace_exists(&self, name: &str) -> CatalogResult<bool> {
        match self.client.get_database().name(name).send().await {
            Ok(_) => Ok(true),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|s| s.is_entity_not_found_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(service_error(DisplayErrorContext(&e))),
        }
    }

    async fn create_namespace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> CatalogResult<CreateOutcome> {
        let input = DatabaseInput::builder()
            .name(name)
            .set_description(description.map(str::to_string))
            .build()
            .map_err(|e| CatalogError::InvalidRequest(e.to_string()))?;

        match self
            .client
            .create_database()
            .database_input(input)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!(namespace = name, "Created Glue database");
                Ok(CreateOutcome::Created)
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|s| s.is_already_exists_exception()) =>
            {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(service_error(DisplayErrorContext(&e))),
        }
    }

    async fn get_job(&self, name: &str) -> CatalogResult<Option<JobSnapshot>> {
        match self.client.get_crawler().name(name).send().await {
            Ok(output) => Ok(output.crawler().map(snapshot)),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|s| s.is_entity_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(service_error(DisplayErrorContext(&e))),
        }
    }

    async fn create_job(&self, spec: &CrawlJobSpec) -> CatalogResult<CreateOutcome> {
        let result = self
            .client
            .create_crawler()
            .name(spec.name())
            .set_role(spec.role().map(str::to_string))
            .database_name(spec.namespace())
            .set_description(spec.description().map(str::to_string))
            .targets(targets(spec)?)
            .set_schedule(spec.schedule().map(|s| s.to_string()))
            .recrawl_policy(recrawl_policy(spec))
            .schema_change_policy(schema_change_policy(spec))
            .configuration(spec.grouping().to_configuration_json())
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::info!(job = spec.name(), "Created Glue crawler");
                Ok(CreateOutcome::Created)
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|s| s.is_already_exists_exception()) =>
            {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(service_error(DisplayErrorContext(&e))),
        }
    }

    async fn update_job(&self, spec: &CrawlJobSpec) -> CatalogResult<()> {
        self.client
            .update_crawler()
            .name(spec.name())
            .set_role(spec.role().map(str::to_string))
            .database_name(spec.namespace())
            .set_description(spec.description().map(str::to_string))
            .targets(targets(spec)?)
            .set_schedule(spec.schedule().map(|s| s.to_string()))
            .recrawl_policy(recrawl_policy(spec))
            .schema_change_policy(schema_change_policy(spec))
            .configuration(spec.grouping().to_configuration_json())
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(|s| s.is_entity_not_found_exception())
                {
                    CatalogError::JobNotFound(spec.name().to_string())
                } else {
                    service_error(DisplayErrorContext(&e))
                }
            })?;

        // Leaving the schedule out of an update keeps the old one running.
        if spec.schedule().is_none() {
            let result = self
                .client
                .stop_crawler_schedule()
                .crawler_name(spec.name())
                .send()
                .await;
            if let Err(e) = result {
                let tolerated = e.as_service_error().is_some_and(|s| {
                    s.is_scheduler_not_running_exception() || s.is_scheduler_transitioning_exception()
                });
                if !tolerated {
                    return Err(service_error(DisplayErrorContext(&e)));
                }
            }
        }

        tracing::info!(job = spec.name(), "Updated Glue crawler");
        Ok(())
    }

    async fn start_job(&self, name: &str) -> CatalogResult<StartOutcome> {
        match self.client.start_crawler().name(name).send().await {
            Ok(_) => Ok(StartOutcome::Started),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|s| s.is_crawler_running_exception()) =>
            {
                Ok(StartOutcome::AlreadyRunning)
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|s| s.is_entity_not_found_exception()) =>
            {
                Err(CatalogError::JobNotFound(name.to_string()))
            }
            Err(e) => Err(service_error(DisplayErrorContext(&e))),
        }
    }

    async fn get_table_schema(
        &self,
        namespace: &str,
        location: &str,
    ) -> CatalogResult<Option<TableSchema>> {
        let tables = self.list_tables(namespace).await?;
        Ok(tables
            .iter()
            .filter_map(|t| table_schema(namespace, t))
            .find(|t| same_location(&t.location, location)))
    }
}
