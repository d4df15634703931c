use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use super::world::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("profile lookup for '{account}' failed: {reason}")]
    Lookup { account: String, reason: String },
    #[error("profile service unavailable")]
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReply {
    pub ticket: RequestTicket,
    pub result: Result<u64, ProfileError>,
}

/// Asynchronous balance lookup. Requests return immediately; replies are
/// collected with `drain_replies` at the start of a later frame.
pub trait ProfileService {
    fn request_balance(&mut self, account: &AccountId, ticket: RequestTicket);
    fn drain_replies(&mut self, out: &mut Vec<BalanceReply>);
}

/// Scripted service: replies are queued on request and released by
/// `deliver_all`, so tests control which frame sees them.
#[derive(Debug, Default)]
pub struct InMemoryProfileService {
    balances: HashMap<AccountId, u64>,
    failing: bool,
    in_flight: VecDeque<(AccountId, RequestTicket)>,
    ready: Vec<BalanceReply>,
    requests: u64,
}

impl InMemoryProfileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&mut self, account: &AccountId, balance: u64) {
        self.balances.insert(account.clone(), balance);
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Resolves every outstanding request against the current script.
    pub fn deliver_all(&mut self) {
        while let Some((account, ticket)) = self.in_flight.pop_front() {
            let result = if self.failing {
                Err(ProfileError::Lookup {
                    account: account.0.clone(),
                    reason: "scripted failure".to_string(),
                })
            } else {
                self.balances
                    .get(&account)
                    .copied()
                    .ok_or(ProfileError::Lookup {
                        account: account.0.clone(),
                        reason: "unknown account".to_string(),
                    })
            };
            self.ready.push(BalanceReply { ticket, result });
        }
    }
}

impl ProfileService for InMemoryProfileService {
    fn request_balance(&mut self, account: &AccountId, ticket: RequestTicket) {
        self.requests += 1;
        self.in_flight.push_back((account.clone(), ticket));
    }

    fn drain_replies(&mut self, out: &mut Vec<BalanceReply>) {
        out.append(&mut self.ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_wait_for_delivery() {
        let account = AccountId("a".to_string());
        let mut service = InMemoryProfileService::new();
        service.set_balance(&account, 12);
        service.request_balance(&account, RequestTicket(1));

        let mut out = Vec::new();
        service.drain_replies(&mut out);
        assert!(out.is_empty());

        service.deliver_all();
        service.drain_replies(&mut out);
        assert_eq!(
            out,
            vec![BalanceReply {
                ticket: RequestTicket(1),
                result: Ok(12)
            }]
        );
    }

    #[test]
    fn failing_service_reports_lookup_error() {
        let account = AccountId("a".to_string());
        let mut service = InMemoryProfileService::new();
        service.set_failing(true);
        service.request_balance(&account, RequestTicket(4));
        service.deliver_all();
        let mut out = Vec::new();
        service.drain_replies(&mut out);
        assert!(matches!(out[0].result, Err(ProfileError::Lookup { .. })));
    }
}
