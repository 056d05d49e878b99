//! Envelopes hold budget assigned from wallets, optionally shared between users.

mod budget;
mod core;
mod endpoints;
mod participant;

pub use budget::assign_budget;
pub use core::{
    EnvelopeId, NewEnvelope, create_envelope, create_envelope_tables, get_referenced_envelope,
};
pub use endpoints::{
    add_participant_endpoint, assign_budget_endpoint, create_envelope_endpoint,
    delete_envelope_endpoint, get_envelope_endpoint, list_assignments_endpoint,
    list_envelopes_endpoint, list_participants_endpoint, remove_participant_endpoint,
    return_budget_endpoint, transfer_budget_endpoint, update_envelope_endpoint,
};

pub(crate) use core::{apply_spent_delta, check_overspent};
