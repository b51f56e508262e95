use crate::models::Task;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 7;

/// Body of `GET /item`, which some servers answer with the whole collection
/// and others with a paginated envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
    Items(Vec<Task>),
    Envelope(PageEnvelope),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub items: Vec<Task>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub total: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// One canonical page, whatever shape the server answered with.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Task>,
    pub offset: usize,
    pub total: Option<usize>,
    pub limit: usize,
}

impl ListResponse {
    pub fn normalize(self, limit: usize, offset: usize) -> Page {
        match self {
            ListResponse::Items(all) => {
                let total = all.len();
                let items = all.into_iter().skip(offset).take(limit).collect();
                Page {
                    items,
                    offset,
                    total: Some(total),
                    limit,
                }
            }
            ListResponse::Envelope(envelope) => Page {
                items: envelope.items,
                offset: envelope.offset.unwrap_or(offset),
                total: envelope.total,
                limit: envelope.limit.unwrap_or(limit),
            },
        }
    }
}

/// Continuation rule for a freshly observed page.
///
/// With an unknown total a page that is exactly `page_size` long is assumed to
/// have a successor, so a full final page reports `true`.
pub fn compute_has_more(offset: usize, len: usize, total: Option<usize>, page_size: usize) -> bool {
    match total {
        Some(total) => offset.saturating_add(len) < total,
        None => len == page_size,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page_size: usize,
    pub offset: usize,
    pub total: Option<usize>,
    pub has_more: bool,
}

impl PageWindow {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            offset: 0,
            total: None,
            has_more: false,
        }
    }

    pub fn next_offset(&self) -> Option<usize> {
        self.has_more.then(|| self.offset + self.page_size)
    }

    pub fn previous_offset(&self) -> Option<usize> {
        (self.offset > 0).then(|| self.offset.saturating_sub(self.page_size))
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tasks(n: usize) -> Vec<serde_json::Value> {
        (0..n)
            .map(|i| json!({"_id": format!("srv-{}", i), "text": format!("Task {}", i)}))
            .collect()
    }

    #[test]
    fn test_bare_array_is_sliced_locally() {
        let response: ListResponse = serde_json::from_value(json!(tasks(10))).unwrap();
        let page = response.normalize(3, 6);

        assert_eq!(page.total, Some(10));
        assert_eq!(page.offset, 6);
        assert_eq!(page.limit, 3);
        let ids: Vec<_> = page.items.iter().map(|t| t.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["srv-6", "srv-7", "srv-8"]);
    }

    #[test]
    fn test_bare_array_offset_past_end() {
        let response: ListResponse = serde_json::from_value(json!(tasks(2))).unwrap();
        let page = response.normalize(7, 14);
        assert!(page.items.is_empty());
        assert_eq!(page.total, Some(2));
    }

    #[test]
    fn test_envelope_is_taken_verbatim() {
        let response: ListResponse = serde_json::from_value(json!({
            "items": tasks(2),
            "total": 10,
            "limit": 2
        }))
        .unwrap();
        let page = response.normalize(7, 0);

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.offset, 0);
        assert_eq!(page.total, Some(10));
        assert_eq!(page.limit, 2);
    }

    #[test]
    fn test_has_more_with_known_total() {
        assert!(compute_has_more(0, 2, Some(10), 2));
        assert!(!compute_has_more(8, 2, Some(10), 2));
        assert!(!compute_has_more(0, 0, Some(0), 7));
        assert!(!compute_has_more(usize::MAX, 3, Some(10), 7));
    }

    #[test]
    fn test_has_more_with_unknown_total() {
        assert!(compute_has_more(0, 7, None, 7));
        assert!(!compute_has_more(7, 3, None, 7));
    }

    #[test]
    fn test_window_offsets() {
        let mut window = PageWindow::new(7);
        assert_eq!(window.next_offset(), None);
        assert_eq!(window.previous_offset(), None);

        window.has_more = true;
        window.offset = 7;
        assert_eq!(window.next_offset(), Some(14));
        assert_eq!(window.previous_offset(), Some(0));

        window.offset = 3;
        assert_eq!(window.previous_offset(), Some(0));
    }
}
