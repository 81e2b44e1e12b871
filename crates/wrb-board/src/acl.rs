//! Access Control List.
//!
//! One owner and a set of reporters, both process-wide. Only the owner may
//! change the reporter set or hand over ownership, and a handover completes
//! only once the proposed owner accepts it.

use std::collections::BTreeSet;

use wrb_types::{Address, BoardEvent};

use crate::{BoardError, Result};

/// Owner and reporter set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessControl {
    owner: Address,
    pending_owner: Option<Address>,
    reporters: BTreeSet<Address>,
}

impl AccessControl {
    /// Access control with `owner` as the only authority and no reporters.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            pending_owner: None,
            reporters: BTreeSet::new(),
        }
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Proposed owner awaiting acceptance, if any.
    pub fn pending_owner(&self) -> Option<Address> {
        self.pending_owner
    }

    /// Whether `address` is the current owner.
    pub fn is_owner(&self, address: &Address) -> bool {
        self.owner == *address
    }

    /// Whether `address` may report results.
    pub fn is_reporter(&self, address: &Address) -> bool {
        self.reporters.contains(address)
    }

    /// Whether `address` may upgrade the deployment in place.
    pub fn is_upgradable_from(&self, address: &Address) -> bool {
        self.is_owner(address)
    }

    /// Authorized reporters, in address order.
    pub fn reporters(&self) -> impl Iterator<Item = &Address> {
        self.reporters.iter()
    }

    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if `caller` is not the owner
    pub fn require_owner(&self, caller: &Address) -> Result<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(BoardError::Unauthorized {
                caller: *caller,
                reason: "not the owner",
            })
        }
    }

    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if `caller` is not a reporter
    pub fn require_reporter(&self, caller: &Address) -> Result<()> {
        if self.is_reporter(caller) {
            Ok(())
        } else {
            Err(BoardError::Unauthorized {
                caller: *caller,
                reason: "not a reporter",
            })
        }
    }

    /// Add `reporters` to the reporter set.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if `caller` is not the owner
    /// - [`BoardError::ZeroAddress`] if any entry is the zero address
    pub fn set_reporters(&mut self, caller: &Address, reporters: &[Address]) -> Result<BoardEvent> {
        self.require_owner(caller)?;
        if reporters.iter().any(Address::is_zero) {
            return Err(BoardError::ZeroAddress);
        }
        self.reporters.extend(reporters.iter().copied());
        Ok(BoardEvent::ReportersSet {
            reporters: reporters.to_vec(),
        })
    }

    /// Remove `reporters` from the reporter set.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if `caller` is not the owner
    pub fn unset_reporters(
        &mut self,
        caller: &Address,
        reporters: &[Address],
    ) -> Result<BoardEvent> {
        self.require_owner(caller)?;
        for reporter in reporters {
            self.reporters.remove(reporter);
        }
        Ok(BoardEvent::ReportersUnset {
            reporters: reporters.to_vec(),
        })
    }

    /// Propose `new_owner`. Replaces any earlier proposal.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if `caller` is not the owner
    /// - [`BoardError::ZeroAddress`] if `new_owner` is the zero address
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<BoardEvent> {
        self.require_owner(caller)?;
        if new_owner.is_zero() {
            return Err(BoardError::ZeroAddress);
        }
        self.pending_owner = Some(new_owner);
        Ok(BoardEvent::OwnershipTransferStarted {
            from: self.owner,
            to: new_owner,
        })
    }

    /// Complete a handover. Only the proposed owner may accept.
    ///
    /// # Errors
    ///
    /// - [`BoardError::Unauthorized`] if `caller` is not the proposed owner
    pub fn accept_ownership(&mut self, caller: &Address) -> Result<BoardEvent> {
        if self.pending_owner != Some(*caller) {
            return Err(BoardError::Unauthorized {
                caller: *caller,
                reason: "not the pending owner",
            });
        }
        let previous = self.owner;
        self.owner = *caller;
        self.pending_owner = None;
        Ok(BoardEvent::OwnershipTransferred {
            from: Some(previous),
            to: *caller,
        })
    }
}
