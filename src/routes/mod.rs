use serde::Serialize;

pub mod appointments;
pub mod auth;
pub mod availability;
pub mod blocked_slots;
pub mod health;
pub mod transactions;

// ============================================================================
// Shared response envelopes
// ============================================================================

/// Success / business-rejection envelope. Rejections ride an HTTP 200 with
/// `success: false`; only system faults use the error response shape.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: &str, data: T) -> Self {
        ApiResponse {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }
    }

    pub fn rejected(message: &str) -> Self {
        ApiResponse {
            success: false,
            message: message.to_string(),
            data: None,
        }
    }
}

/// `(limit, offset, page)` with the usual defaults: page 1, 10 per page.
pub fn resolve_page(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, 100);
    (limit, (page - 1) * limit, page)
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub current_page: i64,
    pub last_page: i64,
    pub per_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };
        Paginated {
            data,
            total,
            current_page: page,
            last_page,
            per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_page_defaults_and_clamps() {
        assert_eq!(resolve_page(None, None), (10, 0, 1));
        assert_eq!(resolve_page(Some(3), Some(20)), (20, 40, 3));
        assert_eq!(resolve_page(Some(0), Some(1000)), (100, 0, 1));
    }

    #[test]
    fn paginated_last_page_rounds_up() {
        let page: Paginated<i64> = Paginated::new(vec![], 21, 1, 10);
        assert_eq!(page.last_page, 3);

        let empty: Paginated<i64> = Paginated::new(vec![], 0, 1, 10);
        assert_eq!(empty.last_page, 1);
    }
}
