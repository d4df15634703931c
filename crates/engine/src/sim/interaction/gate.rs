use tracing::debug;

use crate::sim::profile::{BalanceReply, ProfileError, ProfileService, RequestTicket};
use crate::sim::world::{AccountId, TeleporterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutstandingLookup {
    ticket: RequestTicket,
    teleporter: TeleporterId,
}

/// Pending request slot for balance-gated teleporters.
///
/// Each lookup takes a fresh generation; a reply is accepted only if its
/// ticket matches the slot, and accepting it clears the slot.
#[derive(Debug, Default)]
pub struct BalanceGate {
    generation: u64,
    outstanding: Option<OutstandingLookup>,
}

impl BalanceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(
        &mut self,
        profile: &mut dyn ProfileService,
        account: &AccountId,
        teleporter: TeleporterId,
    ) -> RequestTicket {
        self.generation = self.generation.wrapping_add(1);
        let ticket = RequestTicket(self.generation);
        self.outstanding = Some(OutstandingLookup { ticket, teleporter });
        profile.request_balance(account, ticket);
        debug!(
            teleporter = teleporter.0,
            generation = ticket.0,
            "balance_lookup_started"
        );
        ticket
    }

    pub fn is_outstanding_for(&self, teleporter: TeleporterId) -> bool {
        self.outstanding
            .is_some_and(|lookup| lookup.teleporter == teleporter)
    }

    pub fn invalidate(&mut self) {
        self.outstanding = None;
    }

    /// Compare-and-clear. Returns the gated teleporter and the lookup result
    /// when `reply` answers the current request; stale replies yield `None`.
    pub fn resolve(
        &mut self,
        reply: BalanceReply,
    ) -> Option<(TeleporterId, Result<u64, ProfileError>)> {
        match self.outstanding {
            Some(lookup) if lookup.ticket == reply.ticket => {
                self.outstanding = None;
                Some((lookup.teleporter, reply.result))
            }
            _ => {
                debug!(generation = reply.ticket.0, "stale_balance_reply_discarded");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::profile::InMemoryProfileService;

    #[test]
    fn superseded_reply_is_discarded() {
        let account = AccountId("a".to_string());
        let mut profile = InMemoryProfileService::new();
        let mut gate = BalanceGate::new();
        let first = gate.begin(&mut profile, &account, TeleporterId(1));
        let second = gate.begin(&mut profile, &account, TeleporterId(2));
        assert_ne!(first, second);

        let stale = BalanceReply {
            ticket: first,
            result: Ok(5),
        };
        assert!(gate.resolve(stale).is_none());
        assert!(gate.is_outstanding_for(TeleporterId(2)));

        let fresh = BalanceReply {
            ticket: second,
            result: Ok(7),
        };
        assert_eq!(gate.resolve(fresh), Some((TeleporterId(2), Ok(7))));
        assert!(!gate.is_outstanding_for(TeleporterId(2)));
    }

    #[test]
    fn invalidated_slot_drops_reply() {
        let account = AccountId("a".to_string());
        let mut profile = InMemoryProfileService::new();
        let mut gate = BalanceGate::new();
        let ticket = gate.begin(&mut profile, &account, TeleporterId(1));
        gate.invalidate();
        assert!(gate
            .resolve(BalanceReply {
                ticket,
                result: Ok(1)
            })
            .is_none());
    }
}
