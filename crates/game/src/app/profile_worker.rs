use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use plaza_engine::{AccountId, BalanceReply, ProfileError, ProfileService, RequestTicket};
use tracing::{debug, info, warn};

enum WorkerCommand {
    Lookup {
        account: AccountId,
        ticket: RequestTicket,
    },
    SetBalance {
        account: AccountId,
        balance: u64,
    },
    Shutdown,
}

/// Profile store on its own thread. Lookups sleep for the configured latency
/// before replying, so replies land a few frames after the request.
pub(crate) struct ProfileWorker {
    commands: Sender<WorkerCommand>,
    replies: Receiver<BalanceReply>,
    undelivered: Vec<BalanceReply>,
    handle: Option<JoinHandle<()>>,
}

impl ProfileWorker {
    pub(crate) fn spawn(
        latency: Duration,
        balances: HashMap<AccountId, u64>,
    ) -> io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("profile-worker".to_string())
            .spawn(move || worker_loop(latency, balances, command_rx, reply_tx))?;
        info!(latency_ms = latency.as_millis() as u64, "profile_worker_started");
        Ok(Self {
            commands: command_tx,
            replies: reply_rx,
            undelivered: Vec::new(),
            handle: Some(handle),
        })
    }

    /// Persists a new balance; later lookups observe it.
    pub(crate) fn set_balance(&mut self, account: &AccountId, balance: u64) {
        let command = WorkerCommand::SetBalance {
            account: account.clone(),
            balance,
        };
        if self.commands.send(command).is_err() {
            warn!(account = %account.0, "profile_worker_gone");
        }
    }
}

impl ProfileService for ProfileWorker {
    fn request_balance(&mut self, account: &AccountId, ticket: RequestTicket) {
        let command = WorkerCommand::Lookup {
            account: account.clone(),
            ticket,
        };
        if self.commands.send(command).is_err() {
            warn!(account = %account.0, ticket = ticket.0, "profile_worker_gone");
            self.undelivered.push(BalanceReply {
                ticket,
                result: Err(ProfileError::Unavailable),
            });
        }
    }

    fn drain_replies(&mut self, out: &mut Vec<BalanceReply>) {
        out.append(&mut self.undelivered);
        while let Ok(reply) = self.replies.try_recv() {
            out.push(reply);
        }
    }
}

impl Drop for ProfileWorker {
    fn drop(&mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("profile_worker_panicked");
            }
        }
    }
}

fn worker_loop(
    latency: Duration,
    mut balances: HashMap<AccountId, u64>,
    commands: Receiver<WorkerCommand>,
    replies: Sender<BalanceReply>,
) {
    while let Ok(command) = commands.recv() {
        match command {
            WorkerCommand::Lookup { account, ticket } => {
                if !latency.is_zero() {
                    thread::sleep(latency);
                }
                let result = balances
                    .get(&account)
                    .copied()
                    .ok_or_else(|| ProfileError::Lookup {
                        account: account.0.clone(),
                        reason: "unknown account".to_string(),
                    });
                debug!(account = %account.0, ticket = ticket.0, ok = result.is_ok(), "profile_lookup");
                if replies.send(BalanceReply { ticket, result }).is_err() {
                    break;
                }
            }
            WorkerCommand::SetBalance { account, balance } => {
                balances.insert(account, balance);
            }
            WorkerCommand::Shutdown => break,
        }
    }
    debug!("profile_worker_stopped");
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn account() -> AccountId {
        AccountId("player".to_string())
    }

    fn wait_for_replies(worker: &mut ProfileWorker, count: usize) -> Vec<BalanceReply> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut replies = Vec::new();
        while replies.len() < count && Instant::now() < deadline {
            worker.drain_replies(&mut replies);
            thread::sleep(Duration::from_millis(1));
        }
        replies
    }

    #[test]
    fn lookup_replies_with_stored_balance() {
        let mut worker =
            ProfileWorker::spawn(Duration::ZERO, HashMap::from([(account(), 42)])).expect("spawn");
        worker.request_balance(&account(), RequestTicket(7));

        let replies = wait_for_replies(&mut worker, 1);
        assert_eq!(
            replies,
            vec![BalanceReply {
                ticket: RequestTicket(7),
                result: Ok(42),
            }]
        );
    }

    #[test]
    fn unknown_account_replies_with_error() {
        let mut worker = ProfileWorker::spawn(Duration::ZERO, HashMap::new()).expect("spawn");
        worker.request_balance(&account(), RequestTicket(1));

        let replies = wait_for_replies(&mut worker, 1);
        assert_eq!(replies.len(), 1);
        assert!(matches!(replies[0].result, Err(ProfileError::Lookup { .. })));
    }

    #[test]
    fn set_balance_is_seen_by_later_lookups() {
        let mut worker =
            ProfileWorker::spawn(Duration::ZERO, HashMap::from([(account(), 1)])).expect("spawn");
        worker.set_balance(&account(), 6_000_000);
        worker.request_balance(&account(), RequestTicket(2));

        let replies = wait_for_replies(&mut worker, 1);
        assert_eq!(replies[0].result, Ok(6_000_000));
    }

    #[test]
    fn replies_are_not_ready_before_latency_elapses() {
        let mut worker = ProfileWorker::spawn(
            Duration::from_millis(200),
            HashMap::from([(account(), 5)]),
        )
        .expect("spawn");
        worker.request_balance(&account(), RequestTicket(3));

        let mut early = Vec::new();
        worker.drain_replies(&mut early);
        assert!(early.is_empty());

        let replies = wait_for_replies(&mut worker, 1);
        assert_eq!(replies.len(), 1);
    }
}
