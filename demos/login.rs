//! Example: login flow with retries, a state timeout, parent fallback and a
//! terminal failure state.
//!
//! Run with `RUST_LOG=info cargo run --example login`.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_hfsm::prelude::*;
use tokio_hfsm::{ActionFailure, HistoryEntry, Unhandled};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
enum Login {
    /// Parent of every connected state; handles Cancel and HardFail.
    Session,
    Idle,
    Connecting,
    Authenticating,
    Ready,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Codes)]
#[codes(after = SmEvent)]
enum Wire {
    Credentials,
    Challenge,
}

#[derive(Debug, Clone)]
struct Credentials {
    user: String,
    password: String,
}

/// Stand-in for the mail server. Replies arrive as ordinary posts.
#[derive(Clone)]
struct Server {
    flaky_connects: u32,
}

impl Server {
    fn connect(&self, handle: MachineHandle, attempt: u32) {
        let flaky = attempt <= self.flaky_connects;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let event = if flaky {
                Event::of(SmEvent::TempFail).with_message("connection reset")
            } else {
                Event::of(Wire::Challenge)
            };
            let _ = handle.post(event);
        });
    }

    fn authenticate(&self, handle: MachineHandle, creds: &Credentials) {
        let ok = creds.password == "hunter2";
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let event = if ok {
                Event::of(SmEvent::Success)
            } else {
                Event::of(SmEvent::HardFail).with_message("bad password")
            };
            let _ = handle.post(event);
        });
    }
}

struct Account {
    server: Server,
    /// Filled in once the machine exists; server replies are posted here.
    handle: Arc<OnceLock<MachineHandle>>,
    creds: Option<Credentials>,
    attempts: u32,
    max_attempts: u32,
}

impl Account {
    fn handle(&self) -> anyhow::Result<MachineHandle> {
        self.handle
            .get()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("account not attached to a machine"))
    }

    fn connect(&mut self) -> anyhow::Result<()> {
        self.attempts += 1;
        self.server.connect(self.handle()?, self.attempts);
        Ok(())
    }
}

impl Owner for Account {
    fn on_transition(&mut self, entry: &HistoryEntry) {
        info!(event = %entry.mnemonic, from = entry.from, to = ?entry.to, "login step");
    }

    fn on_unhandled(&mut self, unhandled: &Unhandled) {
        warn!(%unhandled, "login ignored an event");
    }

    fn on_failure(&mut self, failure: &ActionFailure) {
        warn!(%failure, "login machine halted");
    }
}

fn login_nodes() -> Vec<Node<Account>> {
    vec![
        Node::<Account>::new(Login::Session)
            .goto(SmEvent::Cancel, Login::Idle)
            .goto(SmEvent::HardFail, Login::Failed),
        Node::<Account>::new(Login::Idle).on(Wire::Credentials, Login::Connecting, |scope| {
            let creds = scope
                .take_arg::<Credentials>()
                .ok_or_else(|| anyhow::anyhow!("credentials event without credentials"))?;
            let account = scope.context_mut();
            account.creds = Some(creds);
            account.attempts = 0;
            Ok(())
        }),
        Node::<Account>::new(Login::Connecting)
            .parent(Login::Session)
            .state_timeout(Duration::from_secs(2))
            .on_entry(|scope| scope.context_mut().connect())
            .goto(Wire::Challenge, Login::Authenticating)
            .on_decided(SmEvent::TempFail, |scope| {
                let account = scope.context_mut();
                if account.attempts < account.max_attempts {
                    account.connect()?;
                    scope.goto(Login::Connecting);
                } else {
                    scope.goto(Login::Failed);
                }
                Ok(())
            })
            .goto(SmEvent::Timeout, Login::Failed),
        Node::<Account>::new(Login::Authenticating)
            .parent(Login::Session)
            .on_entry(|scope| {
                let account = scope.context();
                let creds = account
                    .creds
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("authenticating without credentials"))?;
                account.server.authenticate(account.handle()?, creds);
                Ok(())
            })
            .goto(SmEvent::Success, Login::Ready),
        Node::new(Login::Ready).parent(Login::Session),
        // Late server replies land here after a failure and are dropped.
        Node::new(Login::Failed)
            .terminal()
            .goto(SmEvent::Cancel, Login::Idle),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let slot = Arc::new(OnceLock::new());
    let account = Account {
        server: Server { flaky_connects: 2 },
        handle: Arc::clone(&slot),
        creds: None,
        attempts: 0,
        max_attempts: 5,
    };
    let mut machine = StateMachine::new("login", login_nodes(), Login::Idle, account)?;
    let handle = machine.handle();
    let _ = slot.set(handle.clone());
    machine.start();

    handle.post_with(
        Wire::Credentials,
        "credentials",
        Credentials {
            user: "alice".into(),
            password: "hunter2".into(),
        },
    )?;

    tokio::time::timeout(Duration::from_secs(5), handle.wait_for_state(Login::Ready)).await??;

    let finished = machine.stop(ShutdownMode::Graceful).await?;
    let account = finished.into_result()?;
    let user = account.creds.map(|c| c.user).unwrap_or_default();
    info!(%user, attempts = account.attempts, "logged in");
    Ok(())
}
