//! Numbered (offset) and keyset (token) pagination.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sqlward_core::{Condition, OrderBy, QueryError, SortOrder, Statement, col};
use sqlward_types::{NumberedPage, TokenPage, Value};

use crate::entity::Entity;
use crate::error::Error;
use crate::query::Query;
use crate::repository::Repository;

/// Position of a keyset page: the ordering-column values of the row the
/// page starts after (or ends before, when `backwards`).
///
/// Serialized as URL-safe base64 JSON, so it can travel in a query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageToken {
    #[serde(rename = "b", default)]
    pub backwards: bool,
    #[serde(rename = "k")]
    pub place: Vec<Value>,
}

impl PageToken {
    pub fn encode(&self) -> Result<String, Error> {
        let json = serde_json::to_vec(self).map_err(|e| Error::InvalidPageToken(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(token: &str) -> Result<Self, Error> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::InvalidPageToken(e.to_string()))?;
        let token: Self =
            serde_json::from_slice(&bytes).map_err(|e| Error::InvalidPageToken(e.to_string()))?;
        if token.place.iter().any(Value::is_null) {
            return Err(Error::InvalidPageToken("token holds a null key".to_string()));
        }
        Ok(token)
    }
}

fn check_page_size(page_size: u32) -> Result<(), Error> {
    if page_size == 0 {
        return Err(Error::InvalidPage("page size must be at least 1".to_string()));
    }
    Ok(())
}

impl<E: Entity> Query<E> {
    /// Page `page_number` (1-based) of `page_size` rows. Totals cost one
    /// extra `COUNT(*)` query and are only computed when asked for.
    pub async fn paginate(
        self,
        page_number: u32,
        page_size: u32,
        include_total: bool,
    ) -> Result<NumberedPage<E>, Error> {
        if page_number == 0 {
            return Err(Error::InvalidPage("page numbers start at 1".to_string()));
        }
        check_page_size(page_size)?;

        let (total_items, total_pages) = if include_total {
            let total = self.clone().count().await?;
            let size = i64::from(page_size);
            (Some(total), Some((total + size - 1) / size))
        } else {
            (None, None)
        };

        let offset = u64::from(page_number - 1) * u64::from(page_size);
        let items = self
            .offset(offset)
            .limit(u64::from(page_size))
            .all()
            .await?;

        Ok(NumberedPage {
            items,
            current_page: page_number,
            page_size,
            total_items,
            total_pages,
        })
    }

    /// Keyset page following the query's ordering (its explicit `order_by`
    /// or the table default), with the primary key appended as tie-breaker.
    /// `token` is a `next_page` or `previous_page` of an earlier page, or
    /// `None` for the first page. Ordering columns must belong to `E`'s
    /// table and hold no nulls.
    pub async fn paginate_after(
        self,
        token: Option<&str>,
        page_size: u32,
    ) -> Result<TokenPage<E>, Error> {
        check_page_size(page_size)?;
        let order = self.keyset_order()?;
        let place = token.map(PageToken::decode).transpose()?;
        if let Some(place) = &place {
            if place.place.len() != order.len() {
                return Err(Error::InvalidPageToken(
                    "token does not match the query ordering".to_string(),
                ));
            }
        }
        let backwards = place.as_ref().is_some_and(|p| p.backwards);

        let mut query = self.map_select(|s| s.order.clear());
        if let Some(place) = &place {
            query = query.filter(keyset_condition(&order, &place.place, !backwards));
        }
        for o in &order {
            let direction = if backwards { o.order.reversed() } else { o.order };
            query = query.order_by(OrderBy {
                column: o.column.clone(),
                order: direction,
            });
        }

        // One extra row tells whether another page follows in this direction.
        let mut items = query.limit(u64::from(page_size) + 1).all().await?;
        let has_more = items.len() > page_size as usize;
        items.truncate(page_size as usize);
        if backwards {
            items.reverse();
        }

        let bookmark = |item: Option<&E>, backwards: bool| -> Result<Option<String>, Error> {
            let place = match (item, &place) {
                (Some(item), _) => keyset_values(&order, item),
                (None, Some(p)) => p.place.clone(),
                (None, None) => return Ok(None),
            };
            PageToken { backwards, place }.encode().map(Some)
        };
        let (next_page, previous_page) = if backwards {
            let previous = if has_more { bookmark(items.first(), true)? } else { None };
            (bookmark(items.last(), false)?, previous)
        } else {
            let next = if has_more { bookmark(items.last(), false)? } else { None };
            let previous = if place.is_some() { bookmark(items.first(), true)? } else { None };
            (next, previous)
        };

        Ok(TokenPage {
            items,
            current_page: token.map(str::to_string),
            next_page,
            previous_page,
        })
    }

    fn keyset_order(&self) -> Result<Vec<OrderBy>, Error> {
        let select = match self.statement() {
            Ok(Statement::Select(select)) => select,
            Ok(other) => {
                return Err(QueryError::Unsupported {
                    operation: "paginate_after",
                    statement: other.kind(),
                }
                .into());
            }
            Err(e) => return Err(e.clone().into()),
        };
        let table = E::TABLE;
        let mut order = select.effective_order();
        for o in &order {
            let own = o.column.table.as_deref().is_none_or(|t| t == table.name);
            if !own || !table.has_column(&o.column.name) {
                return Err(Error::InvalidPage(format!(
                    "cannot page by {}: not a column of {}",
                    o.column, table.name
                )));
            }
        }
        let pk = table.single_primary_key()?.name;
        if !order.iter().any(|o| o.column.name == pk) {
            order.push(col(pk).asc());
        }
        Ok(order)
    }

    fn map_select(self, f: impl FnOnce(&mut sqlward_core::SelectStatement)) -> Self {
        self.map_statement(|statement| match statement {
            Statement::Select(mut s) => {
                f(&mut s);
                Ok(Statement::Select(s))
            }
            other => Ok(other),
        })
    }
}

/// Rows strictly after `place` in `order` (or strictly before, when `after`
/// is false): `(a > x) OR (a = x AND b > y) OR ...`, with the comparison
/// flipped for descending columns.
fn keyset_condition(order: &[OrderBy], place: &[Value], after: bool) -> Condition {
    let branches = (0..order.len()).map(|i| {
        let mut parts: Vec<Condition> = order[..i]
            .iter()
            .zip(place)
            .map(|(o, v)| o.column.clone().eq(v.clone()))
            .collect();
        let o = &order[i];
        let value = place[i].clone();
        let ascending = o.order == SortOrder::Asc;
        parts.push(if ascending == after {
            o.column.clone().gt(value)
        } else {
            o.column.clone().lt(value)
        });
        Condition::all(parts)
    });
    Condition::any(branches)
}

fn keyset_values<E: Entity>(order: &[OrderBy], item: &E) -> Vec<Value> {
    let values = item.values();
    order
        .iter()
        .map(|o| values.get(&o.column.name).cloned().unwrap_or(Value::Null))
        .collect()
}

impl<E: Entity> Repository<E> {
    /// Numbered page over the whole table in its default order.
    pub async fn paginate(
        &self,
        page_number: u32,
        page_size: u32,
        include_total: bool,
    ) -> Result<NumberedPage<E>, Error> {
        self.select().paginate(page_number, page_size, include_total).await
    }

    /// Keyset page over the whole table.
    pub async fn paginate_after(
        &self,
        token: Option<&str>,
        page_size: u32,
    ) -> Result<TokenPage<E>, Error> {
        self.select().paginate_after(token, page_size).await
    }
}
