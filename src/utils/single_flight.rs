//! Collapse concurrent calls of an async operation into one execution.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

/// Runs at most one instance of an operation at a time.
///
/// Callers that arrive while an execution is in flight wait for it and
/// receive a clone of its result instead of starting their own. A caller
/// arriving after completion starts a fresh execution. If the executing
/// caller is dropped mid-flight, one of the waiters takes over.
#[derive(Debug)]
pub struct SingleFlight<T> {
    state: Mutex<FlightState<T>>,
    landed: Notify,
}

#[derive(Debug)]
struct FlightState<T> {
    /// Id of the execution in flight, if any
    in_flight: Option<u64>,
    /// Id handed to the most recent execution
    started: u64,
    /// Executions that ran to completion
    completed: u64,
    /// Result of the latest completed execution with its id
    last: Option<(u64, T)>,
}

/// Clears the in-flight marker even when the executing future is dropped.
struct Flight<'a, T> {
    owner: &'a SingleFlight<T>,
    id: u64,
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlightState {
                in_flight: None,
                started: 0,
                completed: 0,
                last: None,
            }),
            landed: Notify::new(),
        }
    }

    /// Run `op`, or join the execution already in flight.
    pub async fn run<F, Fut>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut joined = None;
        let flight = loop {
            // Register before inspecting the state so a landing between the
            // check and the await still wakes us.
            let notified = self.landed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock_state();
                if let (Some(wanted), Some((id, result))) = (joined, &state.last) {
                    if *id >= wanted {
                        return result.clone();
                    }
                }
                match state.in_flight {
                    Some(id) => {
                        joined.get_or_insert(id);
                    }
                    None => {
                        state.started += 1;
                        let id = state.started;
                        state.in_flight = Some(id);
                        break Flight { owner: self, id };
                    }
                }
            }

            notified.await;
        };

        let result = op().await;
        flight.land(result.clone());
        result
    }

    /// Number of executions that ran to completion.
    pub fn completed(&self) -> u64 {
        self.lock_state().completed
    }

    fn lock_state(&self) -> MutexGuard<'_, FlightState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Flight<'_, T> {
    /// Publish the result and clear the in-flight marker in one step.
    fn land(self, result: T) {
        let mut state = self.owner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.last = Some((self.id, result));
        state.completed += 1;
        state.in_flight = None;
    }
}

impl<T> Drop for Flight<'_, T> {
    fn drop(&mut self) {
        {
            let mut state = self.owner.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.in_flight == Some(self.id) {
                state.in_flight = None;
            }
        }
        self.owner.landed.notify_waiters();
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
