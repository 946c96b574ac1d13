//! Heartbeat driver.
//!
//! One task per open session. It sleeps until the session's idle deadline,
//! then asks the session whether a heartbeat is due. Holding only a weak
//! reference lets a dropped session end the task on its own.

use std::sync::Weak;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use super::{Session, Tick};

pub(super) fn spawn(session: Weak<Session>, first_deadline: Instant) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut deadline = first_deadline;
        loop {
            sleep_until(deadline).await;
            let Some(session) = session.upgrade() else {
                break;
            };
            match session.heartbeat_tick().await {
                Tick::Wait(next) => deadline = next,
                Tick::Stop => break,
                Tick::Failed(err) => {
                    trace!(session_id = %session.id(), error = %err, "Heartbeat failed");
                    // Closing aborts this task, so the failure is handled elsewhere.
                    tokio::spawn(async move { session.handle_transport_error(err).await });
                    break;
                }
            }
        }
    })
}
