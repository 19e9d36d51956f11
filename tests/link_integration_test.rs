/*!
 * Integration tests for the pipeline link
 *
 * These drive the public `Link` API end to end against the in-memory
 * `MockPipeline`: bring-up, job submission, message streaming and the queue.
 */

use dp2::config::LinkConfig;
use dp2::error::LinkError;
use dp2::link::Link;
use dp2::system::MockPipeline;
use dp2::JobDescription;
use dp2_core_interface::{
    Alive, Job, JobStatus, Message, MessageLevel, Priority, QueueEntry, Script, Slot,
};
use futures::StreamExt;
use std::sync::Arc;
use url::Url;

fn fast_config() -> LinkConfig {
    LinkConfig {
        message_poll_millis: 5,
        ..Default::default()
    }
}

fn service(version: &str, local_mode: bool, authentication: bool) -> MockPipeline {
    let mock = MockPipeline::new();
    mock.set_alive(Alive {
        version: version.to_string(),
        local_mode,
        authentication,
    });
    mock
}

fn zedai_script() -> Script {
    Script {
        id: "dtbook-to-zedai".to_string(),
        href: "http://localhost:8181/ws/scripts/dtbook-to-zedai".to_string(),
        nicename: "DTBook to ZedAI".to_string(),
        description: "Transforms DTBook XML into ZedAI XML".to_string(),
        homepage: String::new(),
        inputs: vec![Slot::sequence("source")],
        options: vec![Slot::single("lang"), Slot::sequence("css")],
    }
}

fn msg(sequence: u64) -> Message {
    Message::new(sequence, MessageLevel::Info, format!("Message {}", sequence))
}

/// Bring-up against a live service without authentication
#[tokio::test]
async fn test_bring_up_records_session() {
    for local in [true, false] {
        let mock = service("2.0", local, false);
        let link = Link::connect(Arc::new(mock.clone()), fast_config())
            .await
            .unwrap();

        assert_eq!(link.version(), "2.0");
        assert!(!link.authentication());
        assert_eq!(link.is_local(), local);
        // No credential check or handshake happened
        assert_eq!(mock.calls(), vec!["alive"]);
        assert_eq!(mock.credentials(), None);
    }
}

/// Credentials are only looked at when the service asks for them
#[tokio::test]
async fn test_credentials_ignored_without_authentication() {
    let mock = service("2.0", false, false);
    let config = LinkConfig {
        client_key: "key".to_string(),
        ..fast_config()
    };

    Link::connect(Arc::new(mock.clone()), config).await.unwrap();
    assert_eq!(mock.credentials(), None);
}

#[tokio::test]
async fn test_credential_pairs_with_authentication() {
    for (key, secret, ok) in [
        ("", "", true),
        ("key", "shh", true),
        ("key", "", false),
        ("", "shh", false),
    ] {
        let mock = service("2.0", false, true);
        let config = LinkConfig {
            client_key: key.to_string(),
            client_secret: secret.to_string(),
            ..fast_config()
        };

        let result = Link::connect(Arc::new(mock), config).await;
        assert_eq!(result.is_ok(), ok, "key={:?} secret={:?}", key, secret);
        if let Err(e) = result {
            assert!(matches!(e, LinkError::Authentication(_)));
        }
    }
}

/// One input with two locators and one single-valued option
#[tokio::test]
async fn test_submit_translates_job() {
    let mock = service("2.0", true, false);
    mock.add_script(zedai_script());
    let link = Link::connect(Arc::new(mock.clone()), fast_config())
        .await
        .unwrap();

    let description = JobDescription::new("dtbook-to-zedai")
        .with_nicename("two books")
        .with_priority(Priority::High)
        .with_input(
            "source",
            [
                Url::parse("file:///data/book1.xml").unwrap(),
                Url::parse("file:///data/book2.xml").unwrap(),
            ],
        )
        .with_option("lang", ["en"]);

    let job = link.submit(&description).await.unwrap();
    assert_eq!(job.priority, Priority::High);

    let submitted = mock.submitted();
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];

    assert_eq!(request.script.href, zedai_script().href);
    assert_eq!(request.inputs.len(), 1);
    let items: Vec<_> = request.inputs[0]
        .items
        .iter()
        .map(|i| i.value.as_str())
        .collect();
    assert_eq!(items, vec!["file:///data/book1.xml", "file:///data/book2.xml"]);

    assert_eq!(request.options.len(), 1);
    assert_eq!(request.options[0].name, "lang");
    assert_eq!(request.options[0].scalar_value(), Some("en"));
    assert!(request.options[0].item_list().is_empty());
}

#[tokio::test]
async fn test_submit_unknown_slot_never_reaches_service() {
    let mock = service("2.0", true, false);
    mock.add_script(zedai_script());
    let link = Link::connect(Arc::new(mock.clone()), fast_config())
        .await
        .unwrap();

    let description = JobDescription::new("dtbook-to-zedai")
        .with_input("cover", [Url::parse("file:///data/cover.png").unwrap()]);

    assert!(matches!(
        link.submit(&description).await,
        Err(LinkError::Validation(_))
    ));
    assert_eq!(mock.call_count("submit_job"), 0);
}

/// Messages 1,2 at the first poll, 1..4 and DONE at the second
#[tokio::test]
async fn test_stream_delivers_growing_log() {
    let mock = service("2.0", true, false);
    mock.add_job_timeline(
        "job1",
        vec![
            Job::new("job1", JobStatus::Running).with_messages(vec![msg(1), msg(2)]),
            Job::new("job1", JobStatus::Done).with_messages(vec![msg(1), msg(2), msg(3), msg(4)]),
        ],
    );
    let link = Link::connect(Arc::new(mock.clone()), fast_config())
        .await
        .unwrap();

    let stream = link.stream_messages("job1").unwrap();
    let contents: Vec<String> = stream.map(|m| m.unwrap().content).collect().await;

    assert_eq!(
        contents,
        vec!["Message 1", "Message 2", "Message 3", "Message 4"]
    );
}

#[tokio::test]
async fn test_stream_error_after_service_loss() {
    let mock = service("2.0", true, false);
    let link = Link::connect(Arc::new(mock.clone()), fast_config())
        .await
        .unwrap();

    mock.set_broken(true);
    let mut stream = link.stream_messages("job1").unwrap();

    match stream.recv().await {
        Some(Err(LinkError::Connectivity(_))) => {}
        other => panic!("unexpected {:?}", other),
    }
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn test_concurrent_streams_are_independent() {
    let mock = service("2.0", true, false);
    mock.add_job_timeline(
        "a",
        vec![Job::new("a", JobStatus::Done).with_messages(vec![msg(1), msg(2)])],
    );
    mock.add_job_timeline(
        "b",
        vec![
            Job::new("b", JobStatus::Running).with_messages(vec![msg(1)]),
            Job::new("b", JobStatus::Error).with_messages(vec![msg(1), msg(2), msg(3)]),
        ],
    );
    let link = Link::connect(Arc::new(mock), fast_config()).await.unwrap();

    let a = link.stream_messages("a").unwrap();
    let b = link.stream_messages("b").unwrap();
    let (a, b): (Vec<_>, Vec<_>) = tokio::join!(
        a.map(|m| m.unwrap().sequence).collect(),
        b.map(|m| m.unwrap().sequence).collect()
    );

    assert_eq!(a, vec![1, 2]);
    assert_eq!(b, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_queue_reordering() {
    let mock = service("2.0", true, false);
    let entry = |id: &str, p: f64| QueueEntry {
        id: id.to_string(),
        computed_priority: p,
        job_priority: Priority::Medium,
        client_priority: Priority::Medium,
        relative_time: 0.0,
        timestamp: 1_700_000_000_000,
    };
    mock.set_queue(vec![entry("j1", 0.3), entry("j2", 0.7), entry("j3", 0.1)]);
    let link = Link::connect(Arc::new(mock), fast_config()).await.unwrap();

    let ids = |q: Vec<QueueEntry>| q.into_iter().map(|e| e.id).collect::<Vec<_>>();

    assert_eq!(ids(link.queue().await.unwrap()), vec!["j1", "j2", "j3"]);
    assert_eq!(ids(link.move_up("j3").await.unwrap()), vec!["j1", "j3", "j2"]);
    assert_eq!(ids(link.move_down("j1").await.unwrap()), vec!["j3", "j1", "j2"]);
}

#[tokio::test]
async fn test_unreachable_service_without_starting() {
    let err = Link::connect(Arc::new(MockPipeline::unreachable()), fast_config())
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Connectivity(_)));
    assert_eq!(err.exit_code(), dp2::error::EXIT_FATAL);
}

#[tokio::test]
async fn test_bad_start_is_fatal() {
    let config = LinkConfig {
        starting: true,
        exec_line_nix: "nonexistingprogram".to_string(),
        exec_line_win: "nonexistingprogram.exe".to_string(),
        ..fast_config()
    };
    let err = Link::connect(Arc::new(MockPipeline::unreachable()), config)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Startup(_)));
}
