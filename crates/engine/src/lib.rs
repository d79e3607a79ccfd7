//! # Blockrun Engine
//!
//! Turns a client's "run this app" request into an authorized, consistently
//! versioned call to the execution backend, and relays the backend's live
//! output back without buffering it.
//!
//! ## Architecture
//!
//! - **`authorization`**: read-only decision for a caller against an app owner
//! - **`credentials`**: per-provider decoding of stored configs into a credential map
//! - **`snapshot`**: one-shot pinning of every dataset to its newest version
//! - **`specification`**: rendering of design documents against a snapshot
//! - **`orchestrator`**: the per-request state machine tying the above together
//! - **`relay`**: pull-based forwarding of live run output
//! - **`persist`**: best-effort recording of an app's saved run state

pub mod authorization;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod persist;
pub mod relay;
pub mod snapshot;
pub mod specification;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use authorization::Access;
pub use credentials::{AssemblyReport, CredentialAssembler, CredentialDecoder, DecodedCredentials, FieldDecoder, SkippedProvider};
pub use error::{CredentialError, RunError, SpecificationError};
pub use orchestrator::{ResolvedApp, RunOrchestrator, RunOutcome, RunPhase, SAVED_RUN, parse_run_request};
pub use persist::{PersistOutcome, RunStatePersister};
pub use relay::{RelayStats, RelayStream};
pub use snapshot::{resolve_snapshot, snapshot_from_catalog};
pub use specification::{BlockSpecificationSerializer, SpecificationSerializer};
