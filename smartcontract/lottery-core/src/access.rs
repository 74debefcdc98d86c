// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use crate::{AccountId, LotteryError, LotteryResult};

/// Guards the admin-only transitions.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    admins: BTreeSet<AccountId>,
}

impl AccessControl {
    pub fn new(admins: BTreeSet<AccountId>) -> Self {
        AccessControl { admins }
    }

    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.admins.contains(account)
    }

    pub fn ensure_admin(&self, account: &AccountId) -> LotteryResult<()> {
        if self.is_admin(account) {
            Ok(())
        } else {
            Err(LotteryError::Unauthorized)
        }
    }
}
