//! NATS bridge between field devices and the core.
//!
//! Outbound, every status channel delivery is republished so devices and
//! other services can follow state without the HTTP surface. Inbound, field
//! controllers, TMC dispatch consoles and pedestrian hardware submit their
//! messages over NATS; a message with a reply subject gets the operation's
//! JSON result (or an `{"error", "status"}` body) back.
//!
//! # Subject Convention
//!
//! - **Outbound:** `{prefix}.events.{kind}` where `kind` is
//!   `semaphore_status`, `emergency_vehicle`, `pedestrian_request` or
//!   `resync`
//! - **Inbound:** `{prefix}.report.status`, `{prefix}.dispatch.emergency`,
//!   `{prefix}.crossing.button`, `{prefix}.crossing.tag`

use allways_core::AllwaysCore;
use allways_events::{Delivery, EventFilter};
use allways_types::{
    CrossingSubmission, EmergencySubmission, StatusUpdateCommand, TagCrossingSubmission,
};
use futures::{Stream, StreamExt as _};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{EngineError, InboundError};

/// The inbound message types the bridge accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Controller status self-report.
    StatusReport,
    /// Emergency-vehicle dispatch.
    EmergencyDispatch,
    /// Pedestrian button press.
    CrossingButton,
    /// Pedestrian card-reader read.
    CrossingTag,
}

impl Inbound {
    /// Every inbound type.
    pub const ALL: [Self; 4] = [
        Self::StatusReport,
        Self::EmergencyDispatch,
        Self::CrossingButton,
        Self::CrossingTag,
    ];

    /// Subject suffix after the prefix.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::StatusReport => "report.status",
            Self::EmergencyDispatch => "dispatch.emergency",
            Self::CrossingButton => "crossing.button",
            Self::CrossingTag => "crossing.tag",
        }
    }

    /// Full subject for this type under `prefix`.
    pub fn subject(self, prefix: &str) -> String {
        format!("{prefix}.{}", self.suffix())
    }

    /// Identify an inbound subject.
    pub fn from_subject(prefix: &str, subject: &str) -> Option<Self> {
        let suffix = subject.strip_prefix(prefix)?.strip_prefix('.')?;
        Self::ALL.into_iter().find(|i| i.suffix() == suffix)
    }
}

/// Subject an outbound delivery is published on.
pub fn outbound_subject(prefix: &str, delivery: &Delivery) -> String {
    match delivery {
        Delivery::Event { event } => format!("{prefix}.events.{}", event.kind().as_str()),
        Delivery::Resync { .. } => format!("{prefix}.events.resync"),
    }
}

/// Decode `payload` as the message type for `inbound`, run it against the
/// core, and return the JSON reply.
///
/// # Errors
///
/// [`InboundError::Decode`] for a payload of the wrong shape, otherwise the
/// core's error.
pub async fn handle_inbound(
    core: &AllwaysCore,
    inbound: Inbound,
    payload: &[u8],
) -> Result<serde_json::Value, InboundError> {
    let reply = match inbound {
        Inbound::StatusReport => {
            let command: StatusUpdateCommand = serde_json::from_slice(payload)?;
            let changes = core.report_status(command).await?;
            serde_json::json!({ "changes": changes })
        }
        Inbound::EmergencyDispatch => {
            let submission: EmergencySubmission = serde_json::from_slice(payload)?;
            serde_json::to_value(core.handle_emergency_request(submission).await?)?
        }
        Inbound::CrossingButton => {
            let submission: CrossingSubmission = serde_json::from_slice(payload)?;
            serde_json::to_value(core.handle_crossing_request(submission).await?)?
        }
        Inbound::CrossingTag => {
            let submission: TagCrossingSubmission = serde_json::from_slice(payload)?;
            let result = core.handle_tag_crossing(submission).await?;
            serde_json::json!({
                "valid": result.attributed,
                "request": result.request,
            })
        }
    };
    Ok(reply)
}

/// JSON body sent back for a failed inbound message.
pub fn error_reply(err: &InboundError) -> serde_json::Value {
    serde_json::json!({
        "error": err.to_string(),
        "status": err.status(),
    })
}

/// A connected bridge.
pub struct NatsBridge {
    client: async_nats::Client,
    prefix: String,
    core: AllwaysCore,
}

impl NatsBridge {
    /// Connect to NATS.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if the connection fails.
    pub async fn connect(url: &str, prefix: &str, core: AllwaysCore) -> Result<Self, EngineError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| EngineError::Nats {
                message: format!("failed to connect to NATS at {url}: {e}"),
            })?;
        Ok(Self {
            client,
            prefix: prefix.to_owned(),
            core,
        })
    }

    /// Republish every status channel delivery on a background task.
    pub fn spawn_outbound(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        let prefix = self.prefix.clone();
        let mut deliveries = self.core.subscribe(EventFilter::all()).into_stream();
        tokio::spawn(async move {
            while let Some(delivery) = deliveries.next().await {
                let subject = outbound_subject(&prefix, &delivery);
                let payload = match serde_json::to_vec(&delivery) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize delivery");
                        continue;
                    }
                };
                if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                    warn!(subject, error = %e, "Failed to publish delivery");
                }
            }
            debug!("Status channel closed, outbound bridge stopped");
        })
    }

    /// Consume inbound field messages until every subscription ends.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Nats`] if a subscription cannot be created.
    pub async fn run_inbound(&self) -> Result<(), EngineError> {
        let mut subscriptions = Vec::with_capacity(Inbound::ALL.len());
        for inbound in Inbound::ALL {
            let subject = inbound.subject(&self.prefix);
            let sub = self
                .client
                .subscribe(subject.clone())
                .await
                .map_err(|e| EngineError::Nats {
                    message: format!("failed to subscribe to {subject}: {e}"),
                })?;
            info!(subject, "Subscribed to field messages");
            subscriptions.push(sub);
        }

        let client = &self.client;
        let messages = futures::stream::select_all(subscriptions).map(|msg| FieldMessage {
            subject: msg.subject.to_string(),
            reply: msg.reply.map(|reply| reply.to_string()),
            payload: msg.payload.to_vec(),
        });
        serve_inbound(&self.core, &self.prefix, messages, |subject, payload| async move {
            if let Err(e) = client.publish(subject, payload.into()).await {
                warn!(error = %e, "Failed to send reply");
            }
        })
        .await;
        Ok(())
    }
}

/// Field messages handled at once. A store waiting out its acquire timeout
/// only holds up its own message.
pub const MAX_IN_FLIGHT: usize = 64;

/// An inbound message stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMessage {
    /// Subject it arrived on.
    pub subject: String,
    /// Where the requester waits for the answer, if anywhere.
    pub reply: Option<String>,
    /// Raw JSON body.
    pub payload: Vec<u8>,
}

/// Handle field messages concurrently, up to [`MAX_IN_FLIGHT`] at a time,
/// passing each JSON reply to `send_reply`.
pub async fn serve_inbound<S, R, Fut>(core: &AllwaysCore, prefix: &str, messages: S, send_reply: R)
where
    S: Stream<Item = FieldMessage>,
    R: Fn(String, Vec<u8>) -> Fut,
    Fut: Future<Output = ()>,
{
    messages
        .for_each_concurrent(MAX_IN_FLIGHT, |msg| {
            let send_reply = &send_reply;
            async move {
                let Some(inbound) = Inbound::from_subject(prefix, &msg.subject) else {
                    debug!(subject = %msg.subject, "Ignoring message on unexpected subject");
                    return;
                };
                let reply = match handle_inbound(core, inbound, &msg.payload).await {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(subject = %msg.subject, error = %e, "Field message rejected");
                        error_reply(&e)
                    }
                };
                if let Some(reply_subject) = msg.reply {
                    let payload = serde_json::to_vec(&reply).unwrap_or_default();
                    send_reply(reply_subject, payload).await;
                }
            }
        })
        .await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use allways_db::MemoryStore;
    use allways_events::StatusChannel;
    use allways_types::{ControlBoxDraft, PedestrianSemaphoreDraft, SemaphoreId, TmcId};
    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::*;

    fn core() -> AllwaysCore {
        AllwaysCore::new(Arc::new(MemoryStore::new()), StatusChannel::new())
    }

    async fn pedestrian_semaphore(core: &AllwaysCore) -> SemaphoreId {
        let cb = core
            .registry()
            .upsert_control_box(ControlBoxDraft {
                id: None,
                name: String::from("CB"),
                location: String::new(),
                tmc_id: TmcId::new(),
                network_username: String::from("cb"),
                network_secret: None,
            })
            .await
            .unwrap()
            .id;
        core.registry()
            .upsert_pedestrian_semaphore(PedestrianSemaphoreDraft {
                id: None,
                control_box_id: cb,
                name: String::from("PS"),
                location: 1,
                gpio_red: 2,
                gpio_green: 3,
                has_card_reader: true,
                has_buzzer: false,
                has_button: false,
                gpio_button: None,
                button_threshold: None,
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn subjects_round_trip() {
        for inbound in Inbound::ALL {
            let subject = inbound.subject("allways");
            assert_eq!(Inbound::from_subject("allways", &subject), Some(inbound));
        }
        assert_eq!(Inbound::from_subject("allways", "allways.report"), None);
        assert_eq!(Inbound::from_subject("allways", "other.report.status"), None);
        assert_eq!(Inbound::from_subject("allways", "allwaysreport.status"), None);
    }

    #[test]
    fn resync_has_its_own_subject() {
        assert_eq!(
            outbound_subject("city", &Delivery::Resync { missed: 2 }),
            "city.events.resync"
        );
    }

    #[tokio::test]
    async fn tag_reply_carries_validity() {
        let core = core();
        let semaphore_id = pedestrian_semaphore(&core).await;
        let payload = serde_json::json!({
            "psem_id": semaphore_id,
            "physicaltag_id": "AA:BB",
        })
        .to_string();

        let reply = handle_inbound(&core, Inbound::CrossingTag, payload.as_bytes())
            .await
            .unwrap();
        assert_eq!(reply["valid"], serde_json::Value::Bool(false));
    }

    #[tokio::test]
    async fn slow_message_does_not_hold_up_the_next() {
        let core = core();
        let fast_sent = Arc::new(Notify::new());
        let replies = Arc::new(Mutex::new(Vec::new()));
        let messages = futures::stream::iter([
            FieldMessage {
                subject: Inbound::StatusReport.subject("allways"),
                reply: Some(String::from("reply.slow")),
                payload: b"{}".to_vec(),
            },
            FieldMessage {
                subject: Inbound::CrossingButton.subject("allways"),
                reply: Some(String::from("reply.fast")),
                payload: b"{}".to_vec(),
            },
        ]);

        let send_reply = |subject: String, _payload: Vec<u8>| {
            let fast_sent = Arc::clone(&fast_sent);
            let replies = Arc::clone(&replies);
            async move {
                if subject == "reply.slow" {
                    fast_sent.notified().await;
                } else {
                    fast_sent.notify_one();
                }
                replies.lock().unwrap().push(subject);
            }
        };
        timeout(
            Duration::from_secs(1),
            serve_inbound(&core, "allways", messages, send_reply),
        )
        .await
        .unwrap();

        assert_eq!(*replies.lock().unwrap(), vec!["reply.fast", "reply.slow"]);
    }

    #[tokio::test]
    async fn unexpected_subjects_get_no_reply() {
        let core = core();
        let replies = Arc::new(Mutex::new(Vec::new()));
        let messages = futures::stream::iter([FieldMessage {
            subject: String::from("allways.unknown"),
            reply: Some(String::from("reply")),
            payload: Vec::new(),
        }]);
        let send_reply = |subject: String, _payload: Vec<u8>| {
            let replies = Arc::clone(&replies);
            async move { replies.lock().unwrap().push(subject) }
        };
        serve_inbound(&core, "allways", messages, send_reply).await;
        assert!(replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let core = core();

        let malformed = handle_inbound(&core, Inbound::StatusReport, b"{not json").await;
        assert_eq!(malformed.as_ref().err().map(InboundError::status), Some(400));

        let bad_code = serde_json::json!({
            "entityKind": "traffic",
            "identifierField": "location",
            "identifierValue": 1,
            "newStatus": 7,
        })
        .to_string();
        let rejected = handle_inbound(&core, Inbound::StatusReport, bad_code.as_bytes()).await;
        assert_eq!(rejected.as_ref().err().map(InboundError::status), Some(422));

        let missing = serde_json::json!({ "semaphoreId": SemaphoreId::new() }).to_string();
        let not_found = handle_inbound(&core, Inbound::CrossingButton, missing.as_bytes()).await;
        let body = not_found.as_ref().err().map(error_reply);
        assert_eq!(body.map(|b| b["status"].clone()), Some(serde_json::json!(404)));
    }
}
