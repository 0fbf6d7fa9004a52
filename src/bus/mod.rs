//! MQTT adapter: connect with last-will, subscribe, route inbound
//! transcription events into the pipeline, publish translation results
//! and relay status.

use crate::config::Config;
use crate::pipeline::{Pipeline, Publisher};
use crate::types::{PublishAction, TranscriptionEvent, TranslationPayload};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Thin wrapper around `rumqttc`'s client half. The event-loop half is
/// driven separately by [`MqttBus::run`].
pub struct MqttBus {
    client: AsyncClient,
    translator_name: String,
    status_topic: String,
    online_payload: String,
    offline_payload: String,
}

impl MqttBus {
    /// Build the client and its event loop. `languages` is the set
    /// advertised in the online status payload.
    pub fn new(config: &Config, languages: &[&str]) -> (Self, EventLoop) {
        let client_id = format!("flicker-relay-{}", config.translator_name);
        let mut mqttoptions = MqttOptions::new(client_id, config.broker_host.clone(), config.broker_port);
        mqttoptions.set_keep_alive(KEEP_ALIVE);

        let status_topic = format!("translator/out/{}/status", config.translator_name);
        let offline_payload = json!({
            "name": config.translator_name,
            "languages": Vec::<&str>::new(),
            "online": false,
        })
        .to_string();
        let online_payload = json!({
            "name": config.translator_name,
            "languages": languages,
            "online": true,
        })
        .to_string();

        mqttoptions.set_last_will(LastWill::new(
            status_topic.clone(),
            offline_payload.clone().into_bytes(),
            QoS::AtLeastOnce,
            true,
        ));

        let (client, eventloop) = AsyncClient::new(mqttoptions, 64);

        (
            Self {
                client,
                translator_name: config.translator_name.clone(),
                status_topic,
                online_payload,
                offline_payload,
            },
            eventloop,
        )
    }

    /// Drive the event loop: reconnect with backoff on error, (re)subscribe
    /// and republish online status on every successful connect, route
    /// inbound publishes into the pipeline.
    pub async fn run(&self, mut eventloop: EventLoop, pipeline: Arc<Pipeline>) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.on_connected().await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.route_publish(&publish.topic, &publish.payload, &pipeline).await;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "mqtt connection lost, retrying in 3s");
                    tokio::time::sleep(RECONNECT_BACKOFF).await;
                }
            }
        }
    }

    async fn on_connected(&self) {
        tracing::info!("connected to mqtt broker");
        for topic in ["transcriber/out/+/+/final", "transcriber/out/+/+/partial"] {
            if let Err(err) = self.client.subscribe(topic, QoS::AtLeastOnce).await {
                tracing::warn!(topic, error = %err, "failed to subscribe");
            }
        }
        if let Err(err) = self
            .client
            .publish(&self.status_topic, QoS::AtLeastOnce, true, self.online_payload.clone())
            .await
        {
            tracing::warn!(error = %err, "failed to publish online status");
        }
    }

    async fn route_publish(&self, topic: &str, payload: &[u8], pipeline: &Arc<Pipeline>) {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() != 5 || parts[0] != "transcriber" || parts[1] != "out" {
            return;
        }
        let (session_id, channel_id, action) = (parts[2], parts[3], parts[4]);
        if action != "final" && action != "partial" {
            return;
        }

        let Ok(text) = std::str::from_utf8(payload) else {
            tracing::debug!(topic, "dropping non-utf8 payload");
            return;
        };
        let Ok(event) = serde_json::from_str::<TranscriptionEvent>(text) else {
            tracing::debug!(topic, "dropping malformed json payload");
            return;
        };

        if event.text.trim().is_empty() {
            return;
        }
        if event.lang.as_deref().unwrap_or("").is_empty() {
            return;
        }

        let matching_targets: Vec<String> = event
            .external_translations
            .iter()
            .filter(|t| t.translator == self.translator_name)
            .map(|t| t.target_lang.clone())
            .collect();
        if matching_targets.is_empty() {
            return;
        }

        if action == "final" {
            pipeline.handle_final(session_id, channel_id, event, &matching_targets).await;
        } else {
            pipeline.handle_partial(session_id, channel_id, event, &matching_targets).await;
        }
    }

    /// Publish the retained offline status, then disconnect. Called on
    /// graceful shutdown, after the pipeline has been stopped.
    pub async fn shutdown(&self) {
        if let Err(err) = self
            .client
            .publish(&self.status_topic, QoS::AtLeastOnce, true, self.offline_payload.clone())
            .await
        {
            tracing::warn!(error = %err, "failed to publish offline status during shutdown");
        }
        if let Err(err) = self.client.disconnect().await {
            tracing::warn!(error = %err, "error disconnecting from mqtt broker");
        }
    }
}

#[async_trait]
impl Publisher for MqttBus {
    async fn publish(&self, session_id: &str, channel_id: &str, action: PublishAction, payload: TranslationPayload) {
        let topic = format!("transcriber/out/{session_id}/{channel_id}/{}/translations", action.as_str());
        let body = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize translation payload");
                return;
            }
        };
        if let Err(err) = self.client.publish(topic, QoS::AtLeastOnce, false, body).await {
            tracing::warn!(error = %err, "failed to publish translation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::provider::EchoProvider;
    use crate::stats::Stats;
    use std::sync::Mutex as StdMutex;

    fn test_config() -> Config {
        Config {
            translator_name: "test".to_string(),
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            translation_provider: "echo".to_string(),
            translategemma_endpoint: String::new(),
            translategemma_model: String::new(),
            translategemma_max_tokens: 500,
            change_threshold: 85.0,
            min_new_chars: 10,
            partial_debounce_ms: 5,
            stability_threshold: 0.6,
            max_hold_seconds: 2.0,
            max_consecutive_holds: 2,
            log_level: "info".to_string(),
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: StdMutex<Vec<(String, String, PublishAction)>>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, session_id: &str, channel_id: &str, action: PublishAction, _payload: TranslationPayload) {
            self.published.lock().unwrap().push((session_id.to_string(), channel_id.to_string(), action));
        }
    }

    fn make_bus_and_pipeline(publisher: Arc<RecordingPublisher>) -> (MqttBus, Arc<Pipeline>) {
        let config = test_config();
        let (bus, _eventloop) = MqttBus::new(&config, &["en"]);
        let pipeline = Pipeline::new(&config, Arc::new(EchoProvider), publisher, Stats::new());
        (bus, pipeline)
    }

    fn valid_payload(text: &str, lang: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "segmentId": 1,
            "text": text,
            "lang": lang,
            "externalTranslations": [{"targetLang": "en", "translator": "test"}],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn valid_final_routes_to_pipeline_and_publishes() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        bus.route_publish("transcriber/out/s1/c1/final", &valid_payload("Bonjour", "fr"), &pipeline).await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0], ("s1".to_string(), "c1".to_string(), PublishAction::Final));
    }

    #[tokio::test]
    async fn valid_partial_routes_after_debounce() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        bus.route_publish("transcriber/out/s1/c1/partial", &valid_payload("Bonjour le monde", "fr"), &pipeline).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0], ("s1".to_string(), "c1".to_string(), PublishAction::Partial));
    }

    #[tokio::test]
    async fn wrong_segment_count_is_dropped() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        bus.route_publish("transcriber/out/s1/final", &valid_payload("Bonjour", "fr"), &pipeline).await;

        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_action_is_dropped() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        bus.route_publish("transcriber/out/s1/c1/unknown", &valid_payload("Bonjour", "fr"), &pipeline).await;

        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_dropped() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        bus.route_publish("transcriber/out/s1/c1/final", b"not json", &pipeline).await;

        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_text_is_dropped() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        bus.route_publish("transcriber/out/s1/c1/final", &valid_payload("   ", "fr"), &pipeline).await;

        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_lang_is_dropped() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        bus.route_publish("transcriber/out/s1/c1/final", &valid_payload("Bonjour", ""), &pipeline).await;

        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_matching_translator_is_dropped() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (bus, pipeline) = make_bus_and_pipeline(publisher.clone());

        let payload = serde_json::to_vec(&json!({
            "segmentId": 1,
            "text": "Bonjour",
            "lang": "fr",
            "externalTranslations": [{"targetLang": "en", "translator": "someone-else"}],
        }))
        .unwrap();

        bus.route_publish("transcriber/out/s1/c1/final", &payload, &pipeline).await;

        assert!(publisher.published.lock().unwrap().is_empty());
    }
}
