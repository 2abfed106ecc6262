use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{Caller, Property, PropertyStatus, Role, UserId};

pub const DEFAULT_PAGE_LIMIT: u32 = 12;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Caller-supplied listing parameters, as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyFilter {
    pub status: Option<PropertyStatus>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub location: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub only_mine: bool,
    pub include_deleted: bool,
}

/// Role-scoped base predicate, applied before any caller filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    /// Anonymous callers and plain users.
    PublishedOnly,
    /// Owners browsing: everything public plus their own rows.
    PublishedOrOwnedBy(UserId),
    /// "My properties", or an owner filtering by status.
    OwnedBy(UserId),
    /// Admins. Deleted rows only on explicit request.
    Everything { include_deleted: bool },
}

impl ListingScope {
    fn admits(&self, property: &Property) -> bool {
        match *self {
            ListingScope::PublishedOnly => {
                !property.is_deleted() && property.status == PropertyStatus::Published
            }
            ListingScope::PublishedOrOwnedBy(user_id) => {
                !property.is_deleted()
                    && (property.status == PropertyStatus::Published
                        || property.owned_by(&user_id))
            }
            ListingScope::OwnedBy(user_id) => !property.is_deleted() && property.owned_by(&user_id),
            ListingScope::Everything { include_deleted } => {
                include_deleted || !property.is_deleted()
            }
        }
    }
}

/// Fully resolved listing request a store can evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub scope: ListingScope,
    pub status: Option<PropertyStatus>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Lower-cased needle for the case-insensitive location match.
    pub location: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl ListingQuery {
    /// Compose the role-scoped predicate with the caller's filters.
    pub fn for_caller(caller: Option<&Caller>, filter: &PropertyFilter) -> Self {
        // Renters and anonymous callers only ever see the public catalogue.
        let (scope, status) = match caller {
            None => (ListingScope::PublishedOnly, None),
            Some(caller) => match caller.role {
                Role::User => (ListingScope::PublishedOnly, None),
                Role::Owner | Role::Admin if filter.only_mine => {
                    (ListingScope::OwnedBy(caller.user_id), filter.status)
                }
                Role::Owner => match filter.status {
                    Some(status) => (ListingScope::OwnedBy(caller.user_id), Some(status)),
                    None => (ListingScope::PublishedOrOwnedBy(caller.user_id), None),
                },
                Role::Admin => (
                    ListingScope::Everything {
                        include_deleted: filter.include_deleted,
                    },
                    filter.status,
                ),
            },
        };

        let location = filter
            .location
            .as_deref()
            .map(str::trim)
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase);

        Self {
            scope,
            status,
            min_price: filter.min_price,
            max_price: filter.max_price,
            location,
            page: filter.page.unwrap_or(1).max(1),
            limit: filter
                .limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn matches(&self, property: &Property) -> bool {
        if !self.scope.admits(property) {
            return false;
        }
        if self.status.is_some_and(|status| property.status != status) {
            return false;
        }
        if self.min_price.is_some_and(|min| property.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| property.price > max) {
            return false;
        }
        match &self.location {
            Some(needle) => property.location.to_lowercase().contains(needle.as_str()),
            None => true,
        }
    }

    pub fn skip(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }

    pub fn take(&self) -> usize {
        self.limit as usize
    }

    /// Reference evaluation over an in-memory row set.
    pub fn evaluate<'a, I>(&self, rows: I) -> QueryPage
    where
        I: IntoIterator<Item = &'a Property>,
    {
        let mut matching: Vec<&Property> = rows.into_iter().filter(|row| self.matches(row)).collect();
        matching.sort_by(|left, right| newest_first(left, right));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(self.skip())
            .take(self.take())
            .cloned()
            .collect();

        QueryPage { items, total }
    }

    pub fn page_meta(&self, total: u64) -> PageMeta {
        PageMeta::new(self.page, self.limit, total)
    }
}

/// Newest first; ties broken by id so pages stay stable.
pub fn newest_first(left: &Property, right: &Property) -> Ordering {
    right
        .created_at
        .cmp(&left.created_at)
        .then_with(|| left.id.cmp(&right.id))
}

/// Raw store result: one page of rows plus the fully filtered count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPage {
    pub items: Vec<Property>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PageMeta {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(u64::from(limit)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
}
