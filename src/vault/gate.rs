// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Commit point shared by a waiting caller and its blocking work.
//!
//! Blocking work keeps running after the caller's deadline fires, so the
//! two sides race on one atomic: the work claims the gate right before it
//! makes anything durable, the caller abandons it when the deadline fires.
//! Whoever gets there first decides the outcome:
//!
//! - caller first: the work must not commit and cleans up after itself, and
//!   the caller reports a timeout;
//! - work first: the commit runs to completion and the caller waits for it,
//!   so a reported timeout always means nothing was committed.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::{VaultError, VaultResult};

const OPEN: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

#[derive(Debug, Clone, Default)]
pub(crate) struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `commit` unless the caller already gave up. May be entered more
    /// than once by the same work.
    pub(crate) fn commit<T>(&self, commit: impl FnOnce() -> VaultResult<T>) -> VaultResult<T> {
        match self
            .0
            .compare_exchange(OPEN, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(COMMITTING) => commit(),
            Err(_) => Err(VaultError::Cancelled),
        }
    }

    /// Give up on the work. `false` means a commit is already under way and
    /// its result must be awaited.
    pub(crate) fn abandon(&self) -> bool {
        match self
            .0
            .compare_exchange(OPEN, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) | Err(ABANDONED) => true,
            Err(_) => false,
        }
    }
}
