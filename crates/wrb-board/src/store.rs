//! Query Store.
//!
//! Authoritative mapping from query identifier to its request and response.
//! Status is never stored; [`QueryStore::status`] derives it from which
//! fields are populated.
//!
//! The store keeps an undo journal while a transaction is open so a failed
//! operation can be rolled back to the state it started from.

use std::collections::BTreeMap;

use wrb_types::{Amount, CallbackReceipt, Query, QueryId, QueryStatus, Request, Response};

use crate::{BoardError, Result};

#[derive(Debug)]
struct Journal {
    nonce: QueryId,
    /// First pre-image of every entry touched since the journal opened.
    touched: BTreeMap<QueryId, Option<Query>>,
}

/// Query records keyed by identifier.
#[derive(Debug, Default)]
pub struct QueryStore {
    queries: BTreeMap<QueryId, Query>,
    /// Last identifier issued. Zero before the first post.
    nonce: QueryId,
    journal: Option<Journal>,
}

impl QueryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the lifecycle status of `id`.
    pub fn status(&self, id: QueryId) -> QueryStatus {
        if id == 0 || id > self.nonce {
            return QueryStatus::Unknown;
        }
        let Some(query) = self.queries.get(&id) else {
            return QueryStatus::Void;
        };
        match &query.response {
            None => QueryStatus::Posted,
            Some(response) => match response.callback {
                Some(receipt) if receipt.succeeded => QueryStatus::Delivered,
                Some(_) => QueryStatus::Undeliverable,
                None => QueryStatus::Reported,
            },
        }
    }

    /// The stored query, or `None` if never posted or purged.
    pub fn get(&self, id: QueryId) -> Option<&Query> {
        self.queries.get(&id)
    }

    /// Like [`get`](Self::get), failing with [`BoardError::UnknownQuery`].
    pub fn query(&self, id: QueryId) -> Result<&Query> {
        self.queries.get(&id).ok_or(BoardError::UnknownQuery(id))
    }

    /// Identifier the next post will receive.
    pub fn next_id(&self) -> QueryId {
        self.nonce.saturating_add(1)
    }

    /// Issue a fresh identifier. Identifiers are never reused.
    pub fn allocate_id(&mut self) -> Result<QueryId> {
        let id = self.nonce.checked_add(1).ok_or(BoardError::Overflow)?;
        self.nonce = id;
        Ok(id)
    }

    /// Store a new request under a freshly allocated `id`.
    pub fn put(&mut self, id: QueryId, request: Request, posted_block: u64) -> Result<()> {
        if id == 0 || id > self.nonce || self.queries.contains_key(&id) {
            return Err(BoardError::UnknownQuery(id));
        }
        self.remember(id);
        self.queries.insert(
            id,
            Query {
                request,
                response: None,
                posted_block,
            },
        );
        Ok(())
    }

    /// Write the response of a query. A response is written at most once.
    pub fn attach_response(&mut self, id: QueryId, response: Response) -> Result<()> {
        let status = self.status(id);
        if status != QueryStatus::Posted {
            return Err(BoardError::NotPosted {
                query_id: id,
                status,
            });
        }
        self.remember(id);
        let query = self.entry_mut(id)?;
        query.response = Some(response);
        Ok(())
    }

    /// Record the outcome of the callback dispatched for a written response.
    pub fn record_callback(&mut self, id: QueryId, receipt: CallbackReceipt) -> Result<()> {
        self.remember(id);
        let query = self.entry_mut(id)?;
        match query.response.as_mut() {
            Some(response) => {
                response.callback = Some(receipt);
                Ok(())
            }
            None => Err(BoardError::NotPosted {
                query_id: id,
                status: QueryStatus::Posted,
            }),
        }
    }

    /// Add `value` to the stored reward, returning the new reward.
    pub fn add_reward(&mut self, id: QueryId, value: Amount) -> Result<Amount> {
        self.remember(id);
        let query = self.entry_mut(id)?;
        query.request.reward = query
            .request
            .reward
            .checked_add(value)
            .ok_or(BoardError::Overflow)?;
        Ok(query.request.reward)
    }

    /// Zero the stored reward, returning what it held.
    pub fn take_reward(&mut self, id: QueryId) -> Result<Amount> {
        self.remember(id);
        let query = self.entry_mut(id)?;
        Ok(std::mem::take(&mut query.request.reward))
    }

    /// Remove a query, returning it. Its identifier stays issued.
    pub fn erase(&mut self, id: QueryId) -> Result<Query> {
        self.remember(id);
        self.queries.remove(&id).ok_or(BoardError::UnknownQuery(id))
    }

    /// Sum of the rewards of every stored query.
    pub fn total_reward(&self) -> Option<Amount> {
        self.queries
            .values()
            .try_fold(0u128, |acc, query| acc.checked_add(query.request.reward))
    }

    /// Number of stored queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Start recording undo information.
    pub fn begin(&mut self) {
        self.journal = Some(Journal {
            nonce: self.nonce,
            touched: BTreeMap::new(),
        });
    }

    /// Keep every change made since [`begin`](Self::begin).
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change made since [`begin`](Self::begin).
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        self.nonce = journal.nonce;
        for (id, previous) in journal.touched {
            match previous {
                Some(query) => {
                    self.queries.insert(id, query);
                }
                None => {
                    self.queries.remove(&id);
                }
            }
        }
    }

    fn remember(&mut self, id: QueryId) {
        if let Some(journal) = self.journal.as_mut() {
            if !journal.touched.contains_key(&id) {
                journal.touched.insert(id, self.queries.get(&id).cloned());
            }
        }
    }

    fn entry_mut(&mut self, id: QueryId) -> Result<&mut Query> {
        self.queries
            .get_mut(&id)
            .ok_or(BoardError::UnknownQuery(id))
    }
}
