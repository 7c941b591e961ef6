//! HTTP request handlers

pub mod auth;
pub mod health;
pub mod todo;
pub mod user;

use serde::{Deserialize, Serialize};
use todoguard_core::{PageQuery, SortOrder};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

/// Pagination query parameters
///
/// Out-of-range values are validation errors, never clamped.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// 1-based page number
    #[serde(default = "default_page")]
    #[validate(range(
        min = 1,
        max = 4294967295_i64,
        message = "Page must be between 1 and 4294967295"
    ))]
    #[param(default = 1, example = 1)]
    pub page: i64,

    /// Page size
    #[serde(default = "default_limit")]
    #[validate(range(
        min = 1,
        max = 100,
        message = "Limit must be between 1 and 100"
    ))]
    #[param(default = 10, example = 10)]
    pub limit: i64,

    /// Case-insensitive substring filter
    pub search: Option<String>,

    /// Field to sort on (default `createdAt`)
    pub sort_field: Option<String>,

    /// `ASC` or `DESC` (default `DESC`)
    pub sort_order: Option<SortOrder>,

    /// Completed / open filter; todo listings only
    pub status: Option<bool>,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
            sort_field: None,
            sort_order: None,
            status: None,
        }
    }
}

impl PaginationQuery {
    /// Convert to the store query; call only after validation
    pub fn to_page_query(&self) -> PageQuery {
        PageQuery {
            page: u32::try_from(self.page).unwrap_or(1),
            limit: u32::try_from(self.limit).unwrap_or(10),
            search: self.search.clone(),
            sort_field: self.sort_field.clone(),
            sort_order: self.sort_order.unwrap_or_default(),
        }
    }
}
