//! Page containers returned by repository pagination helpers.

use serde::Serialize;

/// Offset-based page with optional totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberedPage<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub current_page: u32,
    pub page_size: u32,
    /// Present when the total was requested.
    pub total_items: Option<i64>,
    pub total_pages: Option<i64>,
}

impl<T> NumberedPage<T> {
    pub fn has_next(&self) -> bool {
        match self.total_pages {
            Some(total) => i64::from(self.current_page) < total,
            None => self.items.len() as u32 == self.page_size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> NumberedPage<U> {
        NumberedPage {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

/// Keyset page addressed by opaque tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenPage<T> {
    pub items: Vec<T>,
    /// Token that produced this page (`None` for the first page).
    pub current_page: Option<String>,
    /// Token for the following page, `None` when this is the last one.
    pub next_page: Option<String>,
    /// Token for the page before this one, `None` on the first page.
    pub previous_page: Option<String>,
}

impl<T> TokenPage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> TokenPage<U> {
        TokenPage {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_next_with_totals() {
        let page = NumberedPage {
            items: vec![1, 2],
            current_page: 1,
            page_size: 2,
            total_items: Some(3),
            total_pages: Some(2),
        };
        assert!(page.has_next());

        let last = NumberedPage { current_page: 2, items: vec![3], ..page };
        assert!(!last.has_next());
    }

    #[test]
    fn test_has_next_without_totals_uses_fill() {
        let page = NumberedPage {
            items: vec![1, 2],
            current_page: 1,
            page_size: 2,
            total_items: None,
            total_pages: None,
        };
        assert!(page.has_next());
        assert_eq!(page.map(|i| i * 10).items, vec![10, 20]);
    }

    #[test]
    fn test_token_page_map_keeps_tokens() {
        let page = TokenPage {
            items: vec![1],
            current_page: Some("c".to_string()),
            next_page: None,
            previous_page: Some("p".to_string()),
        };
        let mapped = page.map(|i| i.to_string());
        assert_eq!(mapped.items, vec!["1".to_string()]);
        assert_eq!(mapped.current_page.as_deref(), Some("c"));
        assert_eq!(mapped.previous_page.as_deref(), Some("p"));
    }
}
