//! End-to-end checks: transcripts on disk, capped history, redaction, and
//! resuming from a saved engine state.

use serde_json::json;
use std::io::Write;
use waymark_rs::agent::Transcript;
use waymark_rs::prelude::*;

fn step(n: u32) -> serde_json::Value {
    json!({
        "state": {"url": format!("https://shop.example/p/{n}"), "title": format!("Page {n}")},
        "decision": {
            "evaluation_previous_goal": "Success",
            "memory": format!("visited page {n}"),
            "next_goal": format!("open page {}", n + 1)
        },
        "results": [{"long_term_memory": format!("Opened page {n}")}]
    })
}

fn write_transcript(value: &serde_json::Value) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(value.to_string().as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn long_transcript_from_disk_keeps_seed_and_tail() {
    let steps: Vec<_> = (1..=10).map(step).collect();
    let file = write_transcript(&json!({
        "task": "Browse the catalogue",
        "config": {"max_history_items": 6},
        "max_steps": 20,
        "steps": steps
    }));

    let transcript = Transcript::load(file.path()).unwrap();
    let turns = transcript.replay().unwrap();
    assert_eq!(turns.len(), 10);

    // Seed + 10 recorded steps (step_0..step_9) = 11 entries; cap 6 hides 5.
    let last = turns[9][1].text();
    assert!(last.contains("<step_0>\nAgent initialized\n</step_0>\n<sys>[... 5 previous steps omitted...]</sys>\n<step_5>"));
    for n in 6..=10 {
        assert!(last.contains(&format!("Opened page {n}")), "page {n} should be visible");
    }
    for n in 1..=5 {
        assert!(!last.contains(&format!("Opened page {n}\n")), "page {n} should be hidden");
    }
}

#[test]
fn transcript_secrets_never_reach_the_model() {
    let file = write_transcript(&json!({
        "task": "Sign in with hunter2",
        "config": {"sensitive_data": {"password": "hunter2"}},
        "steps": [
            {
                "state": {
                    "url": "https://login.example",
                    "title": "Login",
                    "elements": {"3": {"tag_name": "input", "attributes": {"value": "hunter2"}}}
                },
                "context": ["Last attempt used hunter2 and failed"]
            }
        ]
    }));

    let turns = Transcript::load(file.path()).unwrap().replay().unwrap();
    for msg in &turns[0][1..] {
        assert!(!msg.text().contains("hunter2"), "leaked in {:?}", msg.role);
    }
    let state = turns[0][1].text();
    assert!(state.contains("<sensitive_data>\nHere are placeholders for sensitive data:\n['password']"));
    assert!(state.contains("Sign in with <secret>password</secret>"));
}

#[test]
fn saved_state_resumes_where_it_left_off() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");

    let config = EngineConfig::default().with_max_history_items(Some(8));
    let mut engine =
        ContextEngine::new("Compare kettles", SystemPrompt::new().build(), config.clone()).unwrap();
    let page = EnvironmentState::new("https://shop.example", "Shop");
    for n in 1..=3 {
        let decision = AgentDecision {
            evaluation_previous_goal: "ok".into(),
            memory: format!("step {n}"),
            next_goal: "continue".into(),
            ..Default::default()
        };
        engine.build_step_messages(
            StepInput::new(&page)
                .with_decision(&decision)
                .with_step(StepInfo::new(n, 10)),
        );
    }
    engine.add_followup_task("only under 40 EUR");
    std::fs::write(&path, serde_json::to_string(&engine.snapshot()).unwrap()).unwrap();

    let saved: EngineState =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let mut resumed = ContextEngine::with_state(saved, config);
    assert_eq!(resumed.ledger().len(), 5);
    assert_eq!(resumed.task(), engine.task());

    let msgs = resumed.build_step_messages(StepInput::new(&page).with_step(StepInfo::new(4, 10)));
    let state = msgs[1].text();
    assert!(state.contains("<step_unknown>\n<follow_up_user_request> only under 40 EUR </follow_up_user_request>\n</step_unknown>"));
    assert!(state.contains("<step_4>\nAgent failed to output in the right format.\n</step_4>"));
    assert_eq!(resumed.ledger().len(), 6);
}

#[test]
fn invalid_transcript_json_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{\"steps\": []}").unwrap();
    let err = Transcript::load(file.path()).unwrap_err();
    assert!(matches!(err, ContextError::Json(_)));
}
