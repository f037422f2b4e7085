//! Where things live on the target site: which list holds the groups, how a
//! group page marks its items table, and which table is the info-table.

use crate::error::{HarvestError, Result};
use crate::model::{GroupNode, ItemNode};
use harvester_scanner::infobox::DEFAULT_INFOBOX_SELECTOR;
use harvester_scanner::parser::{closest, element_text};
use harvester_scanner::{ExtractionError, ParsedDocument};
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_GROUP_LIST_SELECTOR: &str = "div.mw-category";
pub const DEFAULT_GROUP_LIST_INDEX: usize = 1;
pub const DEFAULT_GROUP_LINK_SELECTOR: &str = "a[href]";
pub const DEFAULT_GROUP_NAME_PATTERN: &str =
    r"^List of companies (?:based in|of|in|from) (?:the )?(?P<name>.+)$";
pub const DEFAULT_ITEMS_MARKER: &str = r"Notable companies\s";

/// Serializable description of the site layout, part of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub group_list_selector: String,
    pub group_list_index: usize,
    pub group_link_selector: String,
    pub group_name_pattern: String,
    pub items_marker: String,
    pub infobox_selector: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            group_list_selector: DEFAULT_GROUP_LIST_SELECTOR.to_string(),
            group_list_index: DEFAULT_GROUP_LIST_INDEX,
            group_link_selector: DEFAULT_GROUP_LINK_SELECTOR.to_string(),
            group_name_pattern: DEFAULT_GROUP_NAME_PATTERN.to_string(),
            items_marker: DEFAULT_ITEMS_MARKER.to_string(),
            infobox_selector: DEFAULT_INFOBOX_SELECTOR.to_string(),
        }
    }
}

/// A validated [`SiteProfile`] with its regexes compiled.
#[derive(Debug, Clone)]
pub struct Site {
    profile: SiteProfile,
    group_name: Regex,
    items_marker: Regex,
}

fn check_selector(field: &str, css: &str) -> Result<()> {
    Selector::parse(css)
        .map(|_| ())
        .map_err(|e| HarvestError::Config(format!("{} '{}' is not a valid selector: {}", field, css, e)))
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| HarvestError::Config(format!("{} is not a valid regex: {}", field, e)))
}

impl Site {
    pub fn from_profile(profile: SiteProfile) -> Result<Self> {
        check_selector("group_list_selector", &profile.group_list_selector)?;
        check_selector("group_link_selector", &profile.group_link_selector)?;
        check_selector("infobox_selector", &profile.infobox_selector)?;

        let group_name = compile("group_name_pattern", &profile.group_name_pattern)?;
        let items_marker = compile("items_marker", &profile.items_marker)?;

        Ok(Self {
            profile,
            group_name,
            items_marker,
        })
    }

    pub fn infobox_selector(&self) -> &str {
        &self.profile.infobox_selector
    }

    /// Group links of the root page, in listing order.
    pub fn extract_groups(&self, doc: &ParsedDocument) -> std::result::Result<Vec<GroupNode>, ExtractionError> {
        let lists = doc.select(&self.profile.group_list_selector)?;
        let list = lists.get(self.profile.group_list_index).ok_or_else(|| {
            ExtractionError::TableNotFound(format!(
                "group list #{} of '{}' (page has {})",
                self.profile.group_list_index,
                self.profile.group_list_selector,
                lists.len()
            ))
        })?;

        let link_selector = Selector::parse(&self.profile.group_link_selector).map_err(|e| {
            ExtractionError::InvalidSelector(format!("'{}': {}", self.profile.group_link_selector, e))
        })?;

        let groups = list
            .select(&link_selector)
            .filter_map(|link| {
                let label = element_text(link);
                let url = doc.resolve_link(link.value().attr("href")?)?;
                if label.is_empty() {
                    return None;
                }
                Some(GroupNode::new(label, url))
            })
            .collect();
        Ok(groups)
    }

    /// Name written to the Group column: the capture of the group name
    /// pattern, or the whole label when it does not match.
    pub fn group_name(&self, label: &str) -> String {
        self.group_name
            .captures(label)
            .and_then(|caps| caps.name("name").or_else(|| caps.get(1)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| label.trim().to_string())
    }

    /// Item links of the group's items table, header row excluded. Rows of
    /// tables nested inside it are not items. A table without linked rows
    /// yields an empty list.
    pub fn extract_items<'g>(
        &self,
        doc: &ParsedDocument,
        group: &'g GroupNode,
    ) -> std::result::Result<Vec<ItemNode<'g>>, ExtractionError> {
        let marker = doc.find_text(&self.items_marker).ok_or_else(|| {
            ExtractionError::TableNotFound(format!(
                "no text matching '{}'",
                self.profile.items_marker
            ))
        })?;
        let table = closest(marker, "table").ok_or_else(|| {
            ExtractionError::TableNotFound("items marker is not inside a table".to_string())
        })?;

        let link_selector = Selector::parse("a[href]").unwrap();
        let rows = table
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr")
            .filter(|row| closest(*row, "table").is_some_and(|t| t.id() == table.id()));

        let mut items = Vec::new();
        for (index, row) in rows.enumerate().skip(1) {
            let Some(link) = row.select(&link_selector).next() else {
                debug!(group = %group.label, row = index, "Row without item link");
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(|h| doc.resolve_link(h)) else {
                debug!(group = %group.label, row = index, "Row link does not resolve");
                continue;
            };
            let label = link
                .value()
                .attr("title")
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| element_text(link));

            items.push(ItemNode { label, url, group });
        }

        if items.is_empty() {
            debug!(group = %group.label, "Items table lists no linked entries");
        }
        Ok(items)
    }
}

impl Default for Site {
    fn default() -> Self {
        Self {
            profile: SiteProfile::default(),
            group_name: Regex::new(DEFAULT_GROUP_NAME_PATTERN).unwrap(),
            items_marker: Regex::new(DEFAULT_ITEMS_MARKER).unwrap(),
        }
    }
}
