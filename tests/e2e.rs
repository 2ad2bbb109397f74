use std::time::{Duration, Instant};

use serde_json::json;
use vc_flow::{
    core::{
        host::{MessageEvent, WindowId},
        request::FlowRequest,
        schema::Validate,
    },
    FlowError, FlowEvent, FlowState, Outcome, ReentryPolicy, Status, VcFlow,
};


use mock_host::*;

#[tokio::test]
async fn readiness_is_answered_with_one_request() {
    let host = MockHost::default();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));

    let flow = orchestrator.start_flow().await.unwrap();
    assert_eq!(
        host.opened(),
        vec!["https://identity.ic0.app/vc-flow/".parse::<url::Url>().unwrap()]
    );
    assert_eq!(orchestrator.state(), FlowState::AwaitingReady);

    let event = orchestrator.handle_message(&ready(WindowId(1))).await;
    assert!(matches!(event, FlowEvent::RequestSent { flow: id, .. } if id == flow));
    assert_eq!(orchestrator.state(), FlowState::AwaitingResponse);

    let posted = host.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].window, WindowId(1));
    assert_eq!(posted[0].target_origin, IDENTITY_PROVIDER_ORIGIN);
    assert_eq!(posted[0].message["method"], "request_credential");
    assert_eq!(posted[0].message["params"]["credentialSubject"], SUBJECT);
    assert_eq!(
        posted[0].message["params"]["credentialSpec"],
        json!({ "credentialType": "GitcoinPassportScore", "arguments": { "minScore": 5 } })
    );

    // What goes on the wire is accepted by the request schema.
    let request = FlowRequest::parse(&posted[0].message).unwrap();
    assert_eq!(request.params.credential_subject.as_str(), SUBJECT);
}

#[tokio::test]
async fn presentation_publishes_credentials_in_order() {
    let host = MockHost::default();
    let context = context(&host, ReentryPolicy::Shadow);

    context.start_flow().await.unwrap();
    context.handle_message(&ready(WindowId(1))).await.unwrap();
    assert_eq!(context.status().await, Some(Status::AwaitingResponse));

    let token = presentation(&[
        passport_credential("first", 12.5),
        passport_credential("second", 30.0),
    ]);
    context
        .handle_message(&message(
            json!({ "protocolVersion": "2.0", "result": { "verifiablePresentation": token } }),
            Some(WindowId(1)),
        ))
        .await
        .unwrap();

    let credentials = context.credentials().await.unwrap();
    assert_eq!(
        credentials.iter().map(|vc| vc.jti.as_str()).collect::<Vec<_>>(),
        ["first", "second"]
    );
    assert_eq!(
        context.status().await,
        Some(Status::Complete(Outcome::Success {
            info: serde_json::Value::Null
        }))
    );
    assert_eq!(host.closed(), vec![WindowId(1)]);
}

#[tokio::test]
async fn unrelated_messages_change_nothing() {
    let host = MockHost::default();
    let context = context(&host, ReentryPolicy::Shadow);

    context.start_flow().await.unwrap();
    context.handle_message(&ready(WindowId(1))).await.unwrap();

    for data in [
        json!({ "type": "webpackOk" }),
        json!("hello"),
        json!({ "result": { "verifiablePresentation": 3 } }),
        json!({ "jsonrpc": "2.0", "method": "vc-flow-ready" }),
    ] {
        context
            .handle_message(&message(data, Some(WindowId(1))))
            .await
            .unwrap();
    }

    assert_eq!(context.status().await, Some(Status::AwaitingResponse));
    assert!(context.credentials().await.is_none());
    assert_eq!(host.posted().len(), 1);
}

#[tokio::test]
async fn protocol_error_is_terminal() {
    let host = MockHost::default();
    let context = context(&host, ReentryPolicy::Shadow);

    context.start_flow().await.unwrap();
    context.handle_message(&ready(WindowId(1))).await.unwrap();

    let err = context
        .handle_message(&message(
            json!({ "result": { "error": { "version": "1", "code": "UNKNOWN" } } }),
            Some(WindowId(1)),
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::ProtocolErrorResult { ref code, ref version } if code == "UNKNOWN" && version == "1"
    ));
    assert!(context.credentials().await.is_none());
    assert_eq!(host.closed(), vec![WindowId(1)]);

    // The completion handler is gone: even a well-formed presentation is ignored now.
    let token = presentation(&[passport_credential("late", 10.0)]);
    context
        .handle_message(&message(
            json!({ "result": { "verifiablePresentation": token } }),
            Some(WindowId(1)),
        ))
        .await
        .unwrap();
    assert!(context.credentials().await.is_none());
    assert_eq!(
        context.status().await,
        Some(Status::Complete(Outcome::Error {
            cause: String::new()
        }))
    );
}

#[tokio::test]
async fn concurrent_flows_send_equal_requests() {
    let host = MockHost::default();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));

    let first = orchestrator.start_flow().await.unwrap();
    let second = orchestrator.start_flow().await.unwrap();
    assert_ne!(first, second);
    assert_eq!(orchestrator.in_flight(), 2);

    orchestrator.handle_message(&ready(WindowId(1))).await;
    orchestrator.handle_message(&ready(WindowId(2))).await;

    let posted = host.posted();
    assert_eq!(posted.len(), 2);
    assert_eq!(posted[0].message, posted[1].message);
    assert_eq!(
        (posted[0].window, posted[1].window),
        (WindowId(1), WindowId(2))
    );
}

#[tokio::test]
async fn unattributed_response_goes_to_latest_flow() {
    let host = MockHost::default();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));

    let first = orchestrator.start_flow().await.unwrap();
    let second = orchestrator.start_flow().await.unwrap();
    orchestrator.handle_message(&ready(WindowId(1))).await;
    orchestrator.handle_message(&ready(WindowId(2))).await;

    let token = presentation(&[passport_credential("only", 8.0)]);
    let event = orchestrator
        .handle_message(&message(
            json!({ "result": { "verifiablePresentation": token } }),
            None,
        ))
        .await;

    assert!(matches!(event, FlowEvent::Completed { flow, .. } if flow == second));
    assert_eq!(orchestrator.flow_state(first), FlowState::AwaitingResponse);
    assert_eq!(orchestrator.flow_state(second), FlowState::Idle);
    // Without a source there is no window to close.
    assert!(host.closed().is_empty());
}

#[tokio::test]
async fn reject_policy_refuses_second_flow() {
    let host = MockHost::default();
    let context = context(&host, ReentryPolicy::Reject);

    context.start_flow().await.unwrap();
    let err = context.start_flow().await.unwrap_err();

    assert!(matches!(err, FlowError::FlowInProgress));
    assert_eq!(host.opened().len(), 1);
}

#[tokio::test]
async fn start_fails_fast_without_opening_a_window() {
    let host = MockHost::default();

    let err = orchestrator(&host, None).start_flow().await.unwrap_err();
    assert!(matches!(err, FlowError::MissingIdentity));

    let err = orchestrator(&host, Some("not a principal"))
        .start_flow()
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::InvalidSpec(_)));

    assert!(host.opened().is_empty());
}

#[tokio::test]
async fn readiness_must_come_from_the_flow_window() {
    let host = MockHost::default();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));
    orchestrator.start_flow().await.unwrap();

    let stranger = orchestrator.handle_message(&ready(WindowId(7))).await;
    let anonymous = orchestrator
        .handle_message(&message(json!({ "method": "vc-flow-ready" }), None))
        .await;

    assert!(matches!(stranger, FlowEvent::Ignored));
    assert!(matches!(anonymous, FlowEvent::Ignored));
    assert!(host.posted().is_empty());
    assert_eq!(orchestrator.state(), FlowState::AwaitingReady);
}

#[tokio::test]
async fn requests_are_never_sent_to_unpinnable_origins() {
    let host = MockHost::default();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));
    orchestrator.start_flow().await.unwrap();

    for origin in ["*", "null", ""] {
        let event = orchestrator
            .handle_message(&MessageEvent {
                origin: origin.to_owned(),
                ..ready(WindowId(1))
            })
            .await;
        assert!(matches!(event, FlowEvent::Ignored));
    }

    assert!(host.posted().is_empty());
    assert_eq!(orchestrator.state(), FlowState::AwaitingReady);
}

#[tokio::test]
async fn undecodable_presentation_is_ignored() {
    let host = MockHost::default();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));
    orchestrator.start_flow().await.unwrap();
    orchestrator.handle_message(&ready(WindowId(1))).await;

    let bad_credential = credential("bad", json!({ "VerifiedAdult": {} }));
    for token in [
        "not-a-token".to_owned(),
        presentation(&[passport_credential("good", 1.0), bad_credential]),
    ] {
        let event = orchestrator
            .handle_message(&message(
                json!({ "result": { "verifiablePresentation": token } }),
                Some(WindowId(1)),
            ))
            .await;
        assert!(matches!(event, FlowEvent::Ignored));
    }
    assert_eq!(orchestrator.state(), FlowState::AwaitingResponse);
    assert!(host.closed().is_empty());

    let token = presentation(&[passport_credential("good", 1.0)]);
    let event = orchestrator
        .handle_message(&message(
            json!({ "result": { "verifiablePresentation": token } }),
            Some(WindowId(1)),
        ))
        .await;
    assert!(matches!(event, FlowEvent::Completed { ref credentials, .. } if credentials.len() == 1));
}

#[tokio::test]
async fn unclosable_window_is_left_open() {
    let host = MockHost::unclosable();
    let context = context(&host, ReentryPolicy::Shadow);

    context.start_flow().await.unwrap();
    context.handle_message(&ready(WindowId(1))).await.unwrap();
    let token = presentation(&[passport_credential("only", 8.0)]);
    context
        .handle_message(&message(
            json!({ "result": { "verifiablePresentation": token } }),
            Some(WindowId(1)),
        ))
        .await
        .unwrap();

    assert!(context.credentials().await.is_some());
    assert!(host.closed().is_empty());
}

#[tokio::test]
async fn failed_post_tears_the_flow_down() {
    let host = MockHost::failing_posts();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));
    orchestrator.start_flow().await.unwrap();

    let event = orchestrator.handle_message(&ready(WindowId(1))).await;

    assert!(matches!(
        event,
        FlowEvent::Failed {
            error: FlowError::Host(_),
            ..
        }
    ));
    assert_eq!(orchestrator.state(), FlowState::Idle);
    assert_eq!(host.closed(), vec![WindowId(1)]);
}

#[tokio::test]
async fn stale_flows_expire() {
    let host = MockHost::default();
    let mut orchestrator = orchestrator(&host, Some(SUBJECT));
    let flow = orchestrator.start_flow().await.unwrap();

    assert!(orchestrator.expire_stale(Instant::now()).await.is_empty());

    let events = orchestrator
        .expire_stale(Instant::now() + Duration::from_secs(31))
        .await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].flow(), Some(flow));
    assert!(matches!(events[0], FlowEvent::Abandoned { .. }));
    assert_eq!(orchestrator.state(), FlowState::Idle);
    assert_eq!(host.closed(), vec![WindowId(1)]);
}

#[tokio::test]
async fn closed_window_abandons_its_flow() {
    let host = MockHost::default();
    let context = context(&host, ReentryPolicy::Reject);

    context.start_flow().await.unwrap();
    context.window_closed(WindowId(1)).await;

    assert_eq!(
        context.status().await,
        Some(Status::Complete(Outcome::Failure {
            reason: String::new()
        }))
    );
    // The flow is gone, so the reject policy lets a new one start.
    context.start_flow().await.unwrap();
    assert_eq!(host.opened().len(), 2);
}

#[tokio::test]
async fn unmount_cancels_flows() {
    let host = MockHost::default();
    let context = context(&host, ReentryPolicy::Shadow);

    context.start_flow().await.unwrap();
    context.handle_message(&ready(WindowId(1))).await.unwrap();
    context.unmount().await;

    assert!(!context.is_mounted().await);
    assert_eq!(host.closed(), vec![WindowId(1)]);
    assert!(matches!(
        context.start_flow().await.unwrap_err(),
        FlowError::Unmounted
    ));

    let token = presentation(&[passport_credential("late", 8.0)]);
    context
        .handle_message(&message(
            json!({ "result": { "verifiablePresentation": token } }),
            Some(WindowId(1)),
        ))
        .await
        .unwrap();
    assert!(context.credentials().await.is_none());
}

#[tokio::test]
async fn readiness_version_does_not_matter() {
    for data in [
        json!({ "protocolVersion": 2, "method": "vc-flow-ready" }),
        json!({ "jsonrpc": "1.0", "method": "vc-flow-ready" }),
        json!({ "jsonrpc": "2.0", "protocolVersion": "2.0", "method": "vc-flow-ready" }),
    ] {
        let host = MockHost::default();
        let mut orchestrator = orchestrator(&host, Some(SUBJECT));
        orchestrator.start_flow().await.unwrap();

        let event = orchestrator
            .handle_message(&message(data, Some(WindowId(1))))
            .await;

        assert!(matches!(event, FlowEvent::RequestSent { .. }));
        assert_eq!(orchestrator.state(), FlowState::AwaitingResponse);
        assert_eq!(host.posted().len(), 1);
    }
}

#[tokio::test]
async fn responses_complete_whatever_their_envelope() {
    for envelope in [
        json!({ "id": 1, "jsonrpc": "2.0", "protocolVersion": "2.0" }),
        json!({ "id": 1.5, "jsonrpc": "2.0" }),
        json!({ "id": 1.0 }),
        json!({ "id": "request-1", "protocolVersion": "2.0" }),
    ] {
        let host = MockHost::default();
        let mut orchestrator = orchestrator(&host, Some(SUBJECT));
        orchestrator.start_flow().await.unwrap();
        orchestrator.handle_message(&ready(WindowId(1))).await;

        let mut data = envelope;
        data["result"] = json!({
            "verifiablePresentation": presentation(&[passport_credential("only", 8.0)])
        });
        let event = orchestrator
            .handle_message(&message(data, Some(WindowId(1))))
            .await;

        assert!(matches!(event, FlowEvent::Completed { .. }));
        assert_eq!(orchestrator.state(), FlowState::Idle);
    }
}

#[tokio::test]
async fn shadowed_flow_does_not_overwrite_status() {
    let host = MockHost::default();
    let context = context(&host, ReentryPolicy::Shadow);

    context.start_flow().await.unwrap();
    context.start_flow().await.unwrap();
    context.handle_message(&ready(WindowId(2))).await.unwrap();

    // The first, shadowed flow goes away.
    context.window_closed(WindowId(1)).await;
    assert_eq!(context.status().await, Some(Status::AwaitingResponse));

    // Its late readiness is ignored too.
    context.handle_message(&ready(WindowId(1))).await.unwrap();
    assert_eq!(context.status().await, Some(Status::AwaitingResponse));

    let token = presentation(&[passport_credential("latest", 8.0)]);
    context
        .handle_message(&message(
            json!({ "result": { "verifiablePresentation": token } }),
            Some(WindowId(2)),
        ))
        .await
        .unwrap();
    assert_eq!(
        context.status().await,
        Some(Status::Complete(Outcome::Success {
            info: serde_json::Value::Null
        }))
    );
}
