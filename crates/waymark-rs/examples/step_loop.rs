//! Drive the context engine through a scripted three-step session.
//!
//! Stands in for the browser and the model: each step feeds a canned page
//! snapshot and a canned model reply, then prints what the next model call
//! would receive.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=waymark_rs=debug cargo run --example step_loop
//! ```

use waymark_rs::logging::LoggingConfig;
use waymark_rs::prelude::*;

fn main() -> Result<(), ContextError> {
    LoggingConfig::default()
        .with_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()))
        .init()?;

    // 1. Configure the engine with a history cap and one scoped secret.
    let secrets = SensitiveData::new().with_scoped_secret("*.shop.example", "password", "tea4two");
    let config = EngineConfig::default()
        .with_max_history_items(Some(10))
        .with_sensitive_data(secrets);
    let system = SystemPrompt::new().with_max_actions(3).build();
    let mut engine = ContextEngine::new("Log in and order a kettle", system, config)?;

    // 2. Canned model replies; the second one is malformed.
    let replies = [
        r#"{"evaluation_previous_goal": "Start", "memory": "", "next_goal": "Open login", "action": []}"#,
        "Sure! I will click the login button now.",
        r#"{"evaluation_previous_goal": "Logged in", "memory": "Typed tea4two", "next_goal": "Search kettles", "action": []}"#,
    ];

    let mut decision: Option<AgentDecision> = None;
    let mut results: Vec<ActionResult> = Vec::new();

    for (step, reply) in (0u32..).zip(replies) {
        // 3. Observe the page and build the messages for this step.
        let page = EnvironmentState::new(format!("https://www.shop.example/step/{step}"), "Shop")
            .with_element(1, InteractiveElement::new("input").with_attribute("value", "tea4two"));
        let messages = engine.build_step_messages(
            StepInput::new(&page)
                .with_decision(decision.as_ref())
                .with_results(&results)
                .with_step(StepInfo::new(step, 3)),
        );
        println!("=== step {step}: {} messages ===", messages.len());
        if let Some(state) = messages.get(1) {
            println!("{}", state.text());
        }

        // 4. Parse the reply; a rejected reply becomes a notice for the model.
        decision = match AgentDecision::parse(reply) {
            Ok(d) => Some(d),
            Err(e) => {
                engine.add_context_message(Message::user(format!("Invalid output: {e}")));
                None
            }
        };
        results = vec![ActionResult::extracted(format!("Finished step {step}"))];
    }

    println!("Ledger holds {} entries", engine.ledger().len());
    Ok(())
}
