//! Feeds keyed by account.
//!
//! The router is what the board sees as its consumer directory: a callback
//! addressed to a feed account lands on that feed.

use std::collections::{BTreeMap, HashMap};

use wrb_board::{Consumer, ConsumerDirectory};
use wrb_types::Address;

use crate::feed::PriceFeed;
use crate::{FeedError, Result};

#[derive(Debug, Clone, Default)]
pub struct FeedRouter {
    feeds: BTreeMap<Address, PriceFeed>,
    captions: HashMap<String, Address>,
}

impl FeedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feed, returning its account.
    ///
    /// # Errors
    ///
    /// - [`FeedError::DuplicateFeed`] if the caption is taken
    pub fn add(&mut self, feed: PriceFeed) -> Result<Address> {
        if self.captions.contains_key(feed.caption()) {
            return Err(FeedError::DuplicateFeed(feed.caption().to_string()));
        }
        let address = feed.address();
        tracing::info!(caption = %feed.caption(), %address, "Feed registered");
        self.captions.insert(feed.caption().to_string(), address);
        self.feeds.insert(address, feed);
        Ok(address)
    }

    /// # Errors
    ///
    /// - [`FeedError::UnknownFeed`] if no feed has `caption`
    pub fn get(&self, caption: &str) -> Result<&PriceFeed> {
        self.captions
            .get(caption)
            .and_then(|address| self.feeds.get(address))
            .ok_or_else(|| FeedError::UnknownFeed(caption.to_string()))
    }

    /// # Errors
    ///
    /// - [`FeedError::UnknownFeed`] if no feed has `caption`
    pub fn get_mut(&mut self, caption: &str) -> Result<&mut PriceFeed> {
        let address = self
            .captions
            .get(caption)
            .ok_or_else(|| FeedError::UnknownFeed(caption.to_string()))?;
        self.feeds
            .get_mut(address)
            .ok_or_else(|| FeedError::UnknownFeed(caption.to_string()))
    }

    /// Feed receiving callbacks on `address`.
    pub fn by_address(&self, address: &Address) -> Option<&PriceFeed> {
        self.feeds.get(address)
    }

    /// All feeds, in account order.
    pub fn feeds(&self) -> impl Iterator<Item = &PriceFeed> {
        self.feeds.values()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

impl ConsumerDirectory for FeedRouter {
    fn probe(&self, address: &Address) -> bool {
        self.feeds.contains_key(address)
    }

    fn consumer_mut(&mut self, address: &Address) -> Option<&mut dyn Consumer> {
        let feed = self.feeds.get_mut(address)?;
        Some(feed)
    }
}
