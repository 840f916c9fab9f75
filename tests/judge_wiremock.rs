use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use elo_arena::judge::{ChatJudge, JudgeConfig, JudgeError};
use elo_arena::{GroupKey, GroupPhase, RankError, RankingConfig, Tournament};

/// Reads both items out of the user prompt and prefers the
/// lexicographically greater text.
#[derive(Clone, Copy)]
struct LexicographicJudge;

fn extract_between<'a>(s: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let start_idx = s.find(start)? + start.len();
    let rest = &s[start_idx..];
    let end_idx = rest.find(end)?;
    Some(&rest[..end_idx])
}

impl Respond for LexicographicJudge {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let parsed: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let messages = parsed
            .get("messages")
            .and_then(|m| m.as_array())
            .cloned()
            .unwrap_or_default();

        let user_content = messages
            .iter()
            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
            .and_then(|m| m.get("content").and_then(|c| c.as_str()))
            .unwrap_or("");

        let one = extract_between(user_content, "<item_one>", "</item_one>")
            .unwrap_or("")
            .trim();
        let two = extract_between(user_content, "<item_two>", "</item_two>")
            .unwrap_or("")
            .trim();

        let verdict = if one >= two { "One" } else { "Two" };
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": verdict },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 1 }
        }))
    }
}

/// Serves `first` once, then `second` for every later call.
#[derive(Clone)]
struct FlipResponder {
    calls: Arc<AtomicUsize>,
    first: ResponseTemplate,
    second: ResponseTemplate,
}

impl Respond for FlipResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            self.first.clone()
        } else {
            self.second.clone()
        }
    }
}

fn judge_config(server: &MockServer) -> JudgeConfig {
    JudgeConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
        model: "test/model".to_string(),
        ..JudgeConfig::default()
    }
}

fn fast_config(max_retries: u32) -> RankingConfig {
    let mut config = RankingConfig::default();
    config.max_retries = max_retries;
    config.retry_base_delay = Duration::from_millis(1);
    config.retry_delay_increment = Duration::ZERO;
    config
}

#[tokio::test]
async fn tournament_ranks_items_end_to_end_against_wiremock() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(LexicographicJudge)
        .mount(&server)
        .await;

    let judge = ChatJudge::with_config(judge_config(&server)).unwrap();

    let items: Vec<String> = ["q-09", "q-03", "q-07", "q-01"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut tournament = Tournament::new(fast_config(0)).unwrap();
    tournament
        .setup_group(GroupKey::Ungrouped, items, Some(6))
        .unwrap();
    tournament
        .run_group(GroupKey::Ungrouped, &judge)
        .await
        .unwrap();

    assert_eq!(
        tournament.group_phase(GroupKey::Ungrouped).unwrap(),
        GroupPhase::Completed
    );
    let ordered: Vec<&str> = tournament
        .ordered_items(GroupKey::Ungrouped)
        .unwrap()
        .into_iter()
        .map(String::as_str)
        .collect();
    assert_eq!(ordered, ["q-09", "q-07", "q-03", "q-01"]);

    let stats = tournament.group_stats(GroupKey::Ungrouped).unwrap();
    assert_eq!(stats.judged, 6);
    assert_eq!(stats.decided, 6);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 6);
}

#[tokio::test]
async fn judge_requests_carry_model_and_prompt_contract() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(LexicographicJudge)
        .mount(&server)
        .await;

    let judge = ChatJudge::with_config(judge_config(&server)).unwrap();
    let verdict = judge.complete_verdict("alpha text", "beta text").await.unwrap();
    assert_eq!(verdict, "Two");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();

    assert_eq!(body["model"], "test/model");
    assert_eq!(body["temperature"], 0.0);
    assert_eq!(body["max_tokens"], 16);

    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"]
        .as_str()
        .unwrap()
        .contains("Neither"));
    assert_eq!(messages[1]["role"], "user");
    let user = messages[1]["content"].as_str().unwrap();
    assert!(user.contains("<item_one>"));
    assert!(user.contains("alpha text"));
    assert!(user.contains("beta text"));
}

#[tokio::test]
async fn http_failures_exhaust_retries_and_fail_the_group() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let judge = ChatJudge::with_config(judge_config(&server)).unwrap();
    let mut tournament = Tournament::new(fast_config(1)).unwrap();
    tournament
        .setup_group(
            GroupKey::Ungrouped,
            vec!["a".to_string(), "b".to_string()],
            Some(1),
        )
        .unwrap();

    let error = tournament
        .run_group(GroupKey::Ungrouped, &judge)
        .await
        .unwrap_err();
    match error {
        RankError::ComparatorExhausted {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 2);
            assert!(
                source.to_string().contains("500"),
                "unexpected source: {source}"
            );
        }
        other => panic!("expected ComparatorExhausted, got {other:?}"),
    }
    assert_eq!(
        tournament.group_phase(GroupKey::Ungrouped).unwrap(),
        GroupPhase::Failed
    );

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
}

#[tokio::test]
async fn transient_http_failure_recovers_on_retry() {
    let server = MockServer::start().await;
    let first = ResponseTemplate::new(500).set_body_string("transient");
    let second = ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": { "content": "One" },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 1, "completion_tokens": 1 }
    }));
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(FlipResponder {
            calls: Arc::new(AtomicUsize::new(0)),
            first,
            second,
        })
        .mount(&server)
        .await;

    let judge = ChatJudge::with_config(judge_config(&server)).unwrap();
    let mut tournament = Tournament::new(fast_config(1)).unwrap();
    tournament
        .setup_group(
            GroupKey::Ungrouped,
            vec!["a".to_string(), "b".to_string()],
            Some(1),
        )
        .unwrap();
    tournament
        .run_group(GroupKey::Ungrouped, &judge)
        .await
        .unwrap();

    assert_eq!(
        tournament.group_phase(GroupKey::Ungrouped).unwrap(),
        GroupPhase::Completed
    );
    assert_eq!(tournament.group_stats(GroupKey::Ungrouped).unwrap().decided, 1);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
}

#[tokio::test]
async fn empty_completions_are_judge_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let judge = ChatJudge::with_config(judge_config(&server)).unwrap();
    let error = judge.complete_verdict("a", "b").await.unwrap_err();
    assert!(matches!(error, JudgeError::EmptyCompletion { .. }));
}
