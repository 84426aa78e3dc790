//! Request security for vending machine controllers.
//!
//! Every state-changing request from a machine carries a signed envelope. The checks are layered:
//! payload integrity (HMAC-SHA256 over a canonical JSON form), anti-replay (timestamp window plus
//! single-use nonces), and device authorization (provisioned identity, revocation, optional
//! session binding). [`SecureRequestGate`] runs the full pipeline and fails closed: any internal
//! error is a rejection, and clients only ever see a generic error code.

mod canonical;
mod envelope;
mod gate;
mod hmac_signature;
mod replay;

pub use canonical::canonical_json;
pub use envelope::{signing_payload, EnvelopeMeta, SecureEnvelope};
pub use gate::{AuthorizedRequest, GateRejection, SecureRequestGate};
pub use hmac_signature::{sign_payload, verify_payload};
pub use replay::{ReplayConfig, ReplayError, ReplayGuard, MIN_NONCE_LEN};
