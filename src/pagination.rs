// Cursor-based pagination over list endpoints

use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;
use std::future::Future;

use crate::client::AuthenticatedClient;
use crate::error::{ApiError, Result};

/// Description of a paginated list resource
#[derive(Debug, Clone)]
pub struct PageQuery {
    /// Resource URL without query string
    pub url: String,

    /// Items requested per page (`count`)
    pub page_size: usize,

    /// Field of an entity used as `startKey`; bare name lists use the name itself
    pub cursor_field: Option<String>,

    /// Key wrapping the item array, e.g. `developer` in `{"developer": [...]}`
    pub envelope: Option<String>,

    /// Send `expand=true`
    pub expand: bool,
}

impl PageQuery {
    pub fn new(url: impl Into<String>, page_size: usize) -> Self {
        Self {
            url: url.into(),
            page_size,
            cursor_field: None,
            envelope: None,
            expand: false,
        }
    }

    pub fn cursor_field(mut self, field: impl Into<String>) -> Self {
        self.cursor_field = Some(field.into());
        self
    }

    pub fn envelope(mut self, key: impl Into<String>) -> Self {
        self.envelope = Some(key.into());
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    /// URL of the page starting at `cursor`
    pub fn page_url(&self, cursor: Option<&str>) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.url)
            .map_err(|e| ApiError::ConfigError(format!("Invalid resource URL {}: {}", self.url, e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            if self.expand {
                pairs.append_pair("expand", "true");
            }
            pairs.append_pair("count", &self.page_size.to_string());
            if let Some(cursor) = cursor {
                pairs.append_pair("startKey", cursor);
            }
        }

        Ok(url.into())
    }
}

/// Fetches every page of a list resource through the authenticated client
pub struct Paginator<'a> {
    client: &'a AuthenticatedClient,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a AuthenticatedClient) -> Self {
        Self { client }
    }

    /// All items of the resource, in server order
    ///
    /// Fails as a whole if any page fails; nothing fetched so far is returned.
    pub async fn fetch_all(&self, query: &PageQuery) -> Result<Vec<Value>> {
        let client = self.client;
        collect_pages(query.page_size, query.cursor_field.as_deref(), move |cursor| async move {
            let url = query.page_url(cursor.as_deref())?;
            let body = client.get(&url).await?;
            parse_page(&body, query.envelope.as_deref())
        })
        .await
    }

    /// Like `fetch_all`, decoding each item into `T`
    pub async fn fetch_all_as<T: DeserializeOwned>(&self, query: &PageQuery) -> Result<Vec<T>> {
        self.fetch_all(query)
            .await?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ApiError::from))
            .collect()
    }
}

/// Drive `fetch_page` until a short page comes back
///
/// `fetch_page` receives the cursor for the page (`None` for the first). The
/// cursor is inclusive on the server side, so the item equal to it is dropped
/// from continuation pages.
pub async fn collect_pages<F, Fut>(
    page_size: usize,
    cursor_field: Option<&str>,
    mut fetch_page: F,
) -> Result<Vec<Value>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Vec<Value>>>,
{
    if page_size == 0 {
        return Err(ApiError::ConfigError(
            "page size must be greater than zero".to_string(),
        ));
    }

    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(cursor.clone()).await?;
        pages += 1;

        let returned = page.len();
        let next_cursor = match page.last() {
            Some(last) if returned >= page_size => Some(cursor_of(last, cursor_field).ok_or_else(|| {
                serde_json::Error::custom(format!(
                    "item has no cursor value{}",
                    cursor_field.map(|f| format!(" in field `{}`", f)).unwrap_or_default()
                ))
            })?),
            _ => None,
        };

        for item in page {
            if cursor.is_some() && cursor_of(&item, cursor_field) == cursor {
                continue;
            }
            items.push(item);
        }

        if returned < page_size {
            break;
        }

        match next_cursor {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => {
                tracing::debug!(page = pages, cursor = %next, "Fetching next page");
                cursor = Some(next);
            }
            _ => {
                // Server keeps answering with the same boundary item; the rest is unreachable
                tracing::warn!(page = pages, cursor = ?cursor, "Pagination cursor did not advance");
                return Err(serde_json::Error::custom(format!(
                    "pagination cursor did not advance past {:?} after {} page(s)",
                    cursor.unwrap_or_default(),
                    pages
                ))
                .into());
            }
        }
    }

    tracing::debug!(pages = pages, items = items.len(), "Pagination complete");
    Ok(items)
}

/// Cursor value of one item
fn cursor_of(item: &Value, cursor_field: Option<&str>) -> Option<String> {
    match item {
        Value::String(name) => Some(name.clone()),
        Value::Object(map) => match map.get(cursor_field?)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Extract the item array from a page body
///
/// Accepts a bare array or an object wrapping the array under `envelope`.
pub fn parse_page(body: &str, envelope: Option<&str>) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            let key = envelope.ok_or_else(|| {
                serde_json::Error::custom("expected a JSON array, got an object")
            })?;
            match map.remove(key) {
                Some(Value::Array(items)) => Ok(items),
                Some(_) => Err(serde_json::Error::custom(format!("field `{}` is not an array", key)).into()),
                None => Err(serde_json::Error::custom(format!("missing field `{}`", key)).into()),
            }
        }
        _ => Err(serde_json::Error::custom("expected a JSON array or object").into()),
    }
}
