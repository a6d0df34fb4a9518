//! Store-mediated signaling
//!
//! Offer/answer/candidate exchange through the room's signaling records;
//! there is no dedicated signaling server. Role determination is an atomic
//! create-if-absent on the offer record: the winner is the offerer, and a
//! loser observes the winner's offer in the same operation.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use watchparty_store::{
    CollectionPath, CollectionSubscription, CreateOutcome, DocPath, DocSubscription, DocumentStore,
};

use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::schema::{self, IceCandidateDoc, SessionDescriptionDoc};
use crate::voice::peer::SessionDescription;

/// Role in the two-party handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceRole {
    /// Proposed the session description first; writes caller candidates
    Offerer,
    /// Responded to an existing offer; writes callee candidates
    Answerer,
}

/// Outcome of attempting to claim the room's offer record
#[derive(Debug)]
pub enum OfferClaim {
    /// No offer existed; ours was persisted and this session offers
    Offerer,

    /// An offer already existed; this session answers it
    Answerer(SessionDescriptionDoc),
}

/// One room's signaling records, from one participant's point of view
pub struct SignalingChannel {
    store: Arc<dyn DocumentStore>,
    identity: UserIdentity,
    offer_doc: DocPath,
    answer_doc: DocPath,
    caller_candidates: CollectionPath,
    callee_candidates: CollectionPath,
}

impl SignalingChannel {
    /// Bind to a room's signaling records
    pub fn new(store: Arc<dyn DocumentStore>, room_id: &str, identity: UserIdentity) -> Self {
        Self {
            store,
            identity,
            offer_doc: schema::offer(room_id),
            answer_doc: schema::answer(room_id),
            caller_candidates: schema::caller_candidates(room_id),
            callee_candidates: schema::callee_candidates(room_id),
        }
    }

    /// Atomically claim the offer record, deciding this session's role
    ///
    /// At most one offer exists per voice session: the first writer keeps
    /// it, every concurrent joiner observes it and answers.
    pub async fn claim_offer(&self, offer: &SessionDescription) -> Result<OfferClaim> {
        let doc = SessionDescriptionDoc {
            kind: offer.kind,
            sdp: offer.sdp.clone(),
            user_id: self.identity.uid.clone(),
            created_at: Utc::now(),
        };

        match self
            .store
            .create_if_absent(&self.offer_doc, serde_json::to_value(&doc)?)
            .await?
        {
            CreateOutcome::Created => {
                debug!(user = %self.identity.uid, "claimed offer, acting as offerer");
                Ok(OfferClaim::Offerer)
            }
            CreateOutcome::Existing(value) => {
                let existing: SessionDescriptionDoc = serde_json::from_value(value)
                    .map_err(|err| Error::Signaling(format!("malformed offer record: {err}")))?;
                debug!(
                    user = %self.identity.uid,
                    offerer = %existing.user_id,
                    "offer exists, acting as answerer"
                );
                Ok(OfferClaim::Answerer(existing))
            }
        }
    }

    /// Publish this session's answer (one per voice session)
    pub async fn publish_answer(&self, answer: &SessionDescription) -> Result<()> {
        let doc = SessionDescriptionDoc {
            kind: answer.kind,
            sdp: answer.sdp.clone(),
            user_id: self.identity.uid.clone(),
            created_at: Utc::now(),
        };
        self.store
            .set(&self.answer_doc, serde_json::to_value(&doc)?)
            .await?;
        Ok(())
    }

    /// Append a locally gathered candidate to this role's collection
    ///
    /// Offerer candidates go to `callerCandidates`, answerer candidates to
    /// `calleeCandidates`, never the other way around.
    pub async fn push_candidate(&self, role: VoiceRole, candidate: &IceCandidateDoc) -> Result<()> {
        let target = match role {
            VoiceRole::Offerer => &self.caller_candidates,
            VoiceRole::Answerer => &self.callee_candidates,
        };
        self.store
            .add(target, serde_json::to_value(candidate)?)
            .await?;
        Ok(())
    }

    /// Subscribe to the answer record
    pub async fn watch_answer(&self) -> Result<DocSubscription> {
        Ok(self.store.watch_doc(&self.answer_doc).await?)
    }

    /// Subscribe to the *other* role's candidate collection
    pub async fn watch_remote_candidates(&self, role: VoiceRole) -> Result<CollectionSubscription> {
        let source = match role {
            VoiceRole::Offerer => &self.callee_candidates,
            VoiceRole::Answerer => &self.caller_candidates,
        };
        Ok(self.store.watch_collection(source).await?)
    }
}
