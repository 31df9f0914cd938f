//! Owner of the current [`TripSession`] and the upload generation counter.
//!
//! ## Design
//! - One upload may be in flight at a time; a second `begin_upload` is refused.
//! - Every upload holds an [`UploadTicket`] stamped with the generation it
//!   started in. `invalidate_pending` bumps the generation, so a response that
//!   arrives afterwards is discarded rather than clobbering newer state.
//! - Successful results replace the session wholesale; failures leave it as is.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::UploadError;
use crate::models::TripSession;

#[derive(Debug, Default)]
struct StoreState {
    session: TripSession,
    generation: u64,
    in_flight: Option<u64>,
}

/// Shared trip session state. Cheap to clone; clones share the same session.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    state: Arc<Mutex<StoreState>>,
}

/// Permission to apply one upload result.
///
/// Dropping an unfinished ticket releases the in-flight slot.
#[derive(Debug)]
pub struct UploadTicket {
    generation: u64,
    state: Arc<Mutex<StoreState>>,
}

impl UploadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for UploadTicket {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.in_flight == Some(self.generation) {
            state.in_flight = None;
        }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current session.
    pub fn snapshot(&self) -> TripSession {
        lock(&self.state).session.clone()
    }

    pub fn generation(&self) -> u64 {
        lock(&self.state).generation
    }

    pub fn is_uploading(&self) -> bool {
        lock(&self.state).in_flight.is_some()
    }

    /// Reserve the in-flight slot for a new upload.
    pub fn begin_upload(&self) -> Result<UploadTicket, UploadError> {
        let mut state = lock(&self.state);
        if state.in_flight.is_some() {
            return Err(UploadError::InFlight);
        }
        let generation = state.generation;
        state.in_flight = Some(generation);
        Ok(UploadTicket {
            generation,
            state: Arc::clone(&self.state),
        })
    }

    /// Apply the outcome of the upload that `ticket` was issued for.
    ///
    /// Returns `Superseded` when the ticket's generation is no longer current,
    /// whatever the outcome was. Errors are passed through untouched and leave
    /// the session as it was.
    pub fn finish(
        &self,
        ticket: UploadTicket,
        outcome: Result<TripSession, UploadError>,
    ) -> Result<(), UploadError> {
        // The guard must be released before `ticket` drops and relocks.
        let result = {
            let mut state = lock(&self.state);
            if state.in_flight == Some(ticket.generation) {
                state.in_flight = None;
            }
            if ticket.generation != state.generation {
                debug!(
                    ticket = ticket.generation,
                    current = state.generation,
                    "discarding stale upload response"
                );
                Err(UploadError::Superseded {
                    current: state.generation,
                })
            } else {
                outcome.map(|session| state.session = session)
            }
        };
        drop(ticket);
        result
    }

    /// Make any pending upload's response stale and free the in-flight slot.
    pub fn invalidate_pending(&self) {
        let mut state = lock(&self.state);
        state.generation = state.generation.wrapping_add(1);
        state.in_flight = None;
    }

    /// Drop the current session and invalidate any pending upload.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.generation = state.generation.wrapping_add(1);
        state.in_flight = None;
        state.session = TripSession::empty();
    }
}

fn lock(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    // The state stays consistent under poisoning: every write is a single assignment.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
