//! The traversal: root page, then every group in listing order, then every
//! item of the group. Only a root failure or a checkpoint write failure
//! ends the run; anything below the root is logged, recorded and skipped.

use crate::accumulator::Accumulator;
use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::model::{
    GROUP_COLUMN, GroupEntry, GroupNode, GroupStatus, ItemNode, NAME_COLUMN, SkippedUnit, UnitKind,
};
use crate::site::Site;
use harvester_scanner::{
    ExtractionError, Fetcher, HttpTransport, RawRecord, Transport, extract_infobox, parse_page,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Callback for reporting harvest progress
pub type HarvestProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// What a run did. `skipped` lists every group and item that was attempted
/// and given up on, with the reason.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestSummary {
    pub resumed: bool,
    pub groups_total: usize,
    pub groups_already_done: usize,
    pub groups_completed: usize,
    pub groups_failed: usize,
    pub items_appended: usize,
    pub items_skipped: usize,
    pub rows_total: usize,
    pub skipped: Vec<SkippedUnit>,
}

pub struct Harvester<T = HttpTransport> {
    fetcher: Fetcher<T>,
    site: Site,
    progress: Option<HarvestProgressCallback>,
}

impl Harvester<HttpTransport> {
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        let fetcher = Fetcher::from_policy(&config.fetch_policy())?;
        Ok(Self::new(fetcher, config.site()?))
    }
}

fn root_failure(root_url: &str, reason: String) -> HarvestError {
    error!(url = %root_url, reason = %reason, "Could not build group list, stopping");
    HarvestError::Root(format!("{}: {}", root_url, reason))
}

impl<T: Transport> Harvester<T> {
    pub fn new(fetcher: Fetcher<T>, site: Site) -> Self {
        Self {
            fetcher,
            site,
            progress: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: HarvestProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    fn report(&self, message: String) {
        if let Some(ref callback) = self.progress {
            callback(message);
        }
    }

    /// Run (or resume) a harvest into `acc`.
    ///
    /// A fresh checkpoint gets its group list from the root page. A
    /// checkpoint that already holds one is resumed as is, and the root is
    /// not fetched again.
    pub async fn run(&self, root_url: &str, acc: &mut Accumulator) -> Result<HarvestSummary> {
        let mut summary = HarvestSummary::default();

        if acc.is_initialized() {
            summary.resumed = true;
            if let Some(stored) = acc.root_url()
                && stored != root_url
            {
                warn!(
                    stored = %stored,
                    requested = %root_url,
                    "Checkpoint was started from a different root; continuing with its group list"
                );
            }
            info!(rows = acc.dataset().len(), "Resuming from checkpoint");
        } else {
            let groups = self.discover_groups(root_url).await?;
            acc.initialize(root_url, groups)?;
        }

        let pending = acc.remaining();
        summary.groups_total = acc.groups().len();
        summary.groups_already_done = summary.groups_total - pending.len();

        for entry in &pending {
            self.harvest_group(entry, summary.groups_total, acc, &mut summary)
                .await?;
        }

        summary.rows_total = acc.dataset().len();
        info!(
            rows = summary.rows_total,
            columns = acc.schema().width(),
            groups_completed = summary.groups_completed,
            groups_failed = summary.groups_failed,
            items_skipped = summary.items_skipped,
            "Harvest complete"
        );
        self.report(format!(
            "Done: {} rows from {} groups",
            summary.rows_total, summary.groups_completed
        ));

        Ok(summary)
    }

    async fn discover_groups(&self, root_url: &str) -> Result<Vec<GroupNode>> {
        self.report(format!("Fetching root page {}", root_url));

        let body = self
            .fetcher
            .fetch(root_url)
            .await
            .into_body()
            .map_err(|reason| root_failure(root_url, reason))?;

        let groups = self
            .groups_from_page(&body, root_url)
            .map_err(|e| root_failure(root_url, e.to_string()))?;
        if groups.is_empty() {
            return Err(root_failure(root_url, "group list contains no links".to_string()));
        }

        info!(url = %root_url, groups = groups.len(), "Created group list");
        Ok(groups)
    }

    fn groups_from_page(
        &self,
        body: &[u8],
        url: &str,
    ) -> std::result::Result<Vec<GroupNode>, ExtractionError> {
        let doc = parse_page(body, url)?;
        self.site.extract_groups(&doc)
    }

    async fn harvest_group(
        &self,
        entry: &GroupEntry,
        total: usize,
        acc: &mut Accumulator,
        summary: &mut HarvestSummary,
    ) -> Result<()> {
        let group = &entry.node;
        let name = self.site.group_name(&group.label);
        self.report(format!("[{}/{}] {}", entry.position + 1, total, name));

        let items = match self.items_for_group(group).await {
            Ok(items) => items,
            Err(reason) => {
                error!(
                    group = %name,
                    url = %group.url,
                    reason = %reason,
                    "Could not parse items table, skipping group"
                );
                let failure = SkippedUnit {
                    kind: UnitKind::Group,
                    label: group.label.clone(),
                    url: group.url.clone(),
                    reason,
                };
                acc.checkpoint(
                    entry.position,
                    GroupStatus::Failed,
                    Some(failure.reason.as_str()),
                    std::slice::from_ref(&failure),
                )?;
                summary.groups_failed += 1;
                summary.skipped.push(failure);
                return Ok(());
            }
        };
        info!(group = %name, items = items.len(), "Created item list");

        let mut failures = Vec::new();
        for (index, item) in items.iter().enumerate() {
            self.report(format!(
                "[{}/{}] {} ({}/{}) {}",
                entry.position + 1,
                total,
                name,
                index + 1,
                items.len(),
                item.label
            ));

            match self.harvest_item(item, &name).await {
                Ok(raw) => {
                    let record = acc.canonicalize(&raw);
                    acc.append(record)?;
                    summary.items_appended += 1;
                    info!(label = %item.label, group = %name, "Appended data");
                }
                Err(reason) => {
                    error!(
                        label = %item.label,
                        url = %item.url,
                        reason = %reason,
                        "Could not extract info-table, skipping item"
                    );
                    failures.push(SkippedUnit {
                        kind: UnitKind::Item,
                        label: item.label.clone(),
                        url: item.url.clone(),
                        reason,
                    });
                }
            }
        }

        let appended = acc.uncommitted();
        acc.checkpoint(entry.position, GroupStatus::Completed, None, &failures)?;

        summary.groups_completed += 1;
        summary.items_skipped += failures.len();
        summary.skipped.extend(failures);

        info!(
            group = %name,
            appended,
            rows = acc.dataset().len(),
            columns = acc.schema().width(),
            "Group complete"
        );
        Ok(())
    }

    async fn items_for_group<'g>(
        &self,
        group: &'g GroupNode,
    ) -> std::result::Result<Vec<ItemNode<'g>>, String> {
        let body = self.fetcher.fetch(&group.url).await.into_body()?;
        let doc = parse_page(&body, &group.url).map_err(|e| e.to_string())?;
        self.site
            .extract_items(&doc, group)
            .map_err(|e| e.to_string())
    }

    /// Info-table of one item, with the item label and group name filled
    /// in as the Name and Group fields.
    async fn harvest_item(
        &self,
        item: &ItemNode<'_>,
        group_name: &str,
    ) -> std::result::Result<RawRecord, String> {
        let body = self.fetcher.fetch(&item.url).await.into_body()?;
        let mut raw = self.record_from_page(&body, &item.url).map_err(|e| e.to_string())?;

        raw.insert(NAME_COLUMN.to_string(), item.label.clone());
        raw.insert(GROUP_COLUMN.to_string(), group_name.to_string());
        Ok(raw)
    }

    fn record_from_page(
        &self,
        body: &[u8],
        url: &str,
    ) -> std::result::Result<RawRecord, ExtractionError> {
        let doc = parse_page(body, url)?;
        extract_infobox(&doc, self.site.infobox_selector())
    }
}
