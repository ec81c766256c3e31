pub mod memory_stream;

#[cfg(test)]
mod tests {
    use crate::adapters::stream::memory_stream::{MemoryBroker, Outcome, Settlement};
    use crate::config::ConnectionOption;
    use crate::core::domain::alert::AlertEvent;
    use crate::core::ports::event_stream::{EventStreamPort, NackCode, TopicInfo};
    use crate::utils::error::RelayError;

    fn credentials() -> Vec<ConnectionOption> {
        vec![
            ConnectionOption::Credentials {
                client_id: "client".into(),
                client_secret: "secret".into(),
            },
            ConnectionOption::Endpoint("localhost:5356".into()),
        ]
    }

    fn alert(headline: &str) -> AlertEvent {
        AlertEvent::new(format!(r#"{{"properties":{{"headline":"{headline}"}}}}"#).into_bytes())
    }

    #[test]
    fn test_connect_requires_credentials() {
        let broker = MemoryBroker::default();
        let options = vec![ConnectionOption::Credentials {
            client_id: "client".into(),
            client_secret: String::new(),
        }];
        assert!(matches!(
            broker.connect(&options),
            Err(RelayError::StreamError(_))
        ));
        assert!(broker.connect(&[]).is_err());
        assert!(broker.connect(&credentials()).is_ok());
    }

    #[tokio::test]
    async fn test_topics_are_shared_between_connections() {
        let broker = MemoryBroker::default();
        let first = broker.connect(&credentials()).unwrap();
        let second = broker.connect(&credentials()).unwrap();

        assert!(!first.topic_exists("noaa-alerts").await.unwrap());
        let id = first.create_topic("noaa-alerts").await.unwrap();

        assert!(second.topic_exists("noaa-alerts").await.unwrap());
        assert_eq!(second.topic_id("noaa-alerts").await.unwrap(), id);
        assert!(second.create_topic("noaa-alerts").await.is_err());
        assert!(matches!(
            second.topic_id("other").await,
            Err(RelayError::TopicNotFound(name)) if name == "other"
        ));
    }

    #[tokio::test]
    async fn test_publish_fans_out_and_records_settlements() {
        let broker = MemoryBroker::default();
        let publisher = broker.connect(&credentials()).unwrap();
        let subscriber = broker.connect(&credentials()).unwrap();
        let id = publisher.create_topic("noaa-alerts").await.unwrap();

        let mut first = subscriber.subscribe(&id).await.unwrap();
        let mut second = subscriber.subscribe(&id).await.unwrap();

        publisher.publish(&id, alert("one").to_event()).await.unwrap();
        publisher.publish(&id, alert("two").to_event()).await.unwrap();
        assert_eq!(broker.published("noaa-alerts").await, Some(2));

        let a = first.recv().await.unwrap();
        assert_eq!(AlertEvent::from_event(a.event()).headline().unwrap(), "one");
        a.ack().await.unwrap();
        first.recv().await.unwrap().nack(NackCode::Unprocessed).await.unwrap();

        let b = second.recv().await.unwrap();
        assert_eq!(AlertEvent::from_event(b.event()).headline().unwrap(), "one");
        drop(b);

        assert_eq!(
            broker.settlements().await,
            vec![
                Settlement {
                    topic_id: id.clone(),
                    sequence: 1,
                    outcome: Outcome::Acked
                },
                Settlement {
                    topic_id: id.clone(),
                    sequence: 2,
                    outcome: Outcome::Nacked(NackCode::Unprocessed)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_topic_id_is_rejected() {
        let broker = MemoryBroker::default();
        let conn = broker.connect(&credentials()).unwrap();
        assert!(conn.publish("missing", alert("x").to_event()).await.is_err());
        assert!(conn.subscribe("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions_and_rejects_calls() {
        let broker = MemoryBroker::default();
        let publisher = broker.connect(&credentials()).unwrap();
        let subscriber = broker.connect(&credentials()).unwrap();
        let id = publisher.create_topic("noaa-alerts").await.unwrap();
        let mut inbound = subscriber.subscribe(&id).await.unwrap();

        subscriber.close().await.unwrap();
        assert!(inbound.recv().await.is_none());
        assert!(subscriber.topic_exists("noaa-alerts").await.is_err());
        assert!(subscriber.close().await.is_err());

        // The publisher's connection is unaffected; with no subscriber the event goes nowhere.
        publisher.publish(&id, alert("late").to_event()).await.unwrap();
        assert!(broker.settlements().await.is_empty());
    }

    #[tokio::test]
    async fn test_query_reads_retained_events_in_window() {
        let broker = MemoryBroker::default();
        let conn = broker.connect(&credentials()).unwrap();
        let id = conn.create_topic("noaa-alerts").await.unwrap();
        for headline in ["one", "two", "three", "four"] {
            conn.publish(&id, alert(headline).to_event()).await.unwrap();
        }

        // Events published before any subscription are still queryable.
        let mut cursor = conn.query(&id, 1, 2).await.unwrap();
        let mut headlines = Vec::new();
        while let Some(event) = cursor.fetch_one().await.unwrap() {
            headlines.push(AlertEvent::from_event(&event).headline().unwrap());
        }
        assert_eq!(headlines, vec!["two", "three"]);

        cursor.close().await.unwrap();
        assert!(cursor.fetch_one().await.is_err());
        assert!(cursor.close().await.is_err());

        let mut past_end = conn.query(&id, 10, 5).await.unwrap();
        assert!(past_end.fetch_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_snapshot_ignores_later_events() {
        let broker = MemoryBroker::default();
        let conn = broker.connect(&credentials()).unwrap();
        let id = conn.create_topic("noaa-alerts").await.unwrap();
        conn.publish(&id, alert("before").to_event()).await.unwrap();

        let mut cursor = conn.query(&id, 0, 10).await.unwrap();
        conn.publish(&id, alert("after").to_event()).await.unwrap();

        assert!(cursor.fetch_one().await.unwrap().is_some());
        assert!(cursor.fetch_one().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_rejects_unknown_topic_and_closed_connection() {
        let broker = MemoryBroker::default();
        let conn = broker.connect(&credentials()).unwrap();
        let id = conn.create_topic("noaa-alerts").await.unwrap();

        assert!(conn.query("missing", 0, 10).await.is_err());
        conn.close().await.unwrap();
        assert!(conn.query(&id, 0, 10).await.is_err());
        assert!(conn.info().await.is_err());
    }

    #[tokio::test]
    async fn test_info_counts_topics_and_events() {
        let broker = MemoryBroker::default();
        let conn = broker.connect(&credentials()).unwrap();
        let alerts = conn.create_topic("noaa-alerts").await.unwrap();
        let forecasts = conn.create_topic("forecasts").await.unwrap();
        conn.publish(&alerts, alert("one").to_event()).await.unwrap();
        conn.publish(&alerts, alert("two").to_event()).await.unwrap();
        conn.publish(&forecasts, alert("three").to_event())
            .await
            .unwrap();

        let info = conn.info().await.unwrap();

        assert_eq!(info.num_topics, 2);
        assert_eq!(info.events, 3);
        assert_eq!(
            info.topics,
            vec![
                TopicInfo {
                    topic_id: forecasts,
                    name: "forecasts".into(),
                    events: 1,
                },
                TopicInfo {
                    topic_id: alerts,
                    name: "noaa-alerts".into(),
                    events: 2,
                },
            ]
        );
    }
}
