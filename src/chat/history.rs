//! Paginated history loading.
//!
//! The loader only tracks the page cursor; the conversation performs the
//! upserts so that a page merged twice never duplicates entries.

use crate::api::{ApiError, MessageEnvelope, PageRequest};

/// Result of completing a page request.
#[derive(Debug)]
pub enum PageOutcome {
    Loaded(Vec<MessageEnvelope>),
    Failed(ApiError),
    /// The request is no longer the one in flight (conversation reset or closed).
    Stale,
}

#[derive(Debug)]
pub struct HistoryLoader {
    ticket_id: String,
    page_size: u32,
    /// Next page to request once the current one succeeds.
    next_page: u32,
    has_more: bool,
    in_flight: Option<u32>,
}

impl HistoryLoader {
    pub fn new(ticket_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            page_size: page_size.max(1),
            next_page: 1,
            has_more: false,
            in_flight: None,
        }
    }

    /// Start over from page 1.
    pub fn load_first_page(&mut self) -> PageRequest {
        self.next_page = 1;
        self.has_more = false;
        self.request(1)
    }

    /// Request the next page, unless one is already loading or the history
    /// is exhausted.
    pub fn load_next_page(&mut self) -> Option<PageRequest> {
        if self.in_flight.is_some() || !self.has_more {
            return None;
        }
        Some(self.request(self.next_page))
    }

    fn request(&mut self, page: u32) -> PageRequest {
        self.in_flight = Some(page);
        PageRequest {
            ticket_id: self.ticket_id.clone(),
            page,
            limit: self.page_size,
        }
    }

    /// Record the completion of `request`.
    ///
    /// On failure the cursor stays put, so asking again re-requests the same
    /// page.
    pub fn complete(
        &mut self,
        request: &PageRequest,
        result: Result<Vec<MessageEnvelope>, ApiError>,
    ) -> PageOutcome {
        if request.ticket_id != self.ticket_id || self.in_flight != Some(request.page) {
            return PageOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(page) => {
                self.has_more = page.len() as u32 == self.page_size;
                self.next_page = request.page + 1;
                PageOutcome::Loaded(page)
            }
            Err(e) => {
                // A failed first page leaves nothing to page from; allow a retry.
                if request.page == 1 {
                    self.has_more = true;
                }
                PageOutcome::Failed(e)
            }
        }
    }

    /// Forget any in-flight request.
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, Message, MessageBody};
    use chrono::Utc;

    fn page(ids: std::ops::Range<u32>) -> Vec<MessageEnvelope> {
        ids.map(|i| MessageEnvelope {
            message: Message {
                id: format!("m{}", i),
                ticket_id: "T-1".into(),
                author: Author {
                    id: "u2".into(),
                    display_name: "Sam".into(),
                    avatar: None,
                },
                body: MessageBody::Text(format!("#{}", i)),
                created_at: Utc::now(),
            },
            seen_by: Vec::new(),
        })
        .collect()
    }

    fn network_error() -> ApiError {
        ApiError::Http {
            status: 502,
            url: "http://x".into(),
            body: String::new(),
        }
    }

    #[test]
    fn test_full_page_means_more() {
        let mut loader = HistoryLoader::new("T-1", 20);
        let req = loader.load_first_page();
        assert_eq!((req.page, req.limit), (1, 20));
        assert!(loader.load_next_page().is_none(), "first page still in flight");

        assert!(matches!(loader.complete(&req, Ok(page(0..20))), PageOutcome::Loaded(p) if p.len() == 20));
        assert!(loader.has_more());

        let next = loader.load_next_page().unwrap();
        assert_eq!(next.page, 2);
    }

    #[test]
    fn test_short_page_ends_history() {
        let mut loader = HistoryLoader::new("T-1", 20);
        let req = loader.load_first_page();
        loader.complete(&req, Ok(page(0..7)));
        assert!(!loader.has_more());
        assert!(loader.load_next_page().is_none());
    }

    #[test]
    fn test_empty_history() {
        let mut loader = HistoryLoader::new("T-1", 20);
        let req = loader.load_first_page();
        let outcome = loader.complete(&req, Ok(Vec::new()));
        assert!(matches!(outcome, PageOutcome::Loaded(p) if p.is_empty()));
        assert!(!loader.has_more());
        assert!(loader.load_next_page().is_none());
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_failure_does_not_advance_cursor() {
        let mut loader = HistoryLoader::new("T-1", 20);
        let first = loader.load_first_page();
        loader.complete(&first, Ok(page(0..20)));

        let second = loader.load_next_page().unwrap();
        assert!(matches!(
            loader.complete(&second, Err(network_error())),
            PageOutcome::Failed(_)
        ));

        let retry = loader.load_next_page().unwrap();
        assert_eq!(retry.page, 2);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut loader = HistoryLoader::new("T-1", 20);
        let req = loader.load_first_page();
        loader.cancel();
        assert!(matches!(
            loader.complete(&req, Ok(page(0..20))),
            PageOutcome::Stale
        ));
        assert!(!loader.has_more());
    }
}
