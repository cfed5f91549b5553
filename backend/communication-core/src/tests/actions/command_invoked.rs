use crate::PROTOCOL_VERSION;
use crate::actions::CommandInvokedProcessAction;
use crate::commands::{
    CommandMapper, CommandParameterDefinition, LocalCommandCollection, command_delegate,
};
use crate::config::ExchangeConfig;
use crate::error::{CommandError, CoreError};
use crate::interaction::{CommunicationDescriptionStorage, InteractionSubjectGroupStorage};
use crate::protocol::MessageProcessAction;
use crate::tests::support::{
    CALCULATOR, CalculatorCommands, RecordingSender, approved_endpoints,
};

use models::{
    CommandId, CommandInvocationData, CommandParameterValue, CommunicationMessage, EndpointId,
    ErrorLocation, Payload,
};

use std::panic::Location;
use std::sync::Arc;

use serde_json::{Value, json};

enum ResetBehaviour {
    Succeed,
    Fail,
    Panic,
}

fn command_action(reset: ResetBehaviour) -> (CommandInvokedProcessAction, Arc<RecordingSender>) {
    let descriptions = Arc::new(CommunicationDescriptionStorage::new(
        PROTOCOL_VERSION,
        Arc::new(InteractionSubjectGroupStorage::new()),
    ));
    let commands = Arc::new(LocalCommandCollection::new(descriptions));

    let reset_delegate = match reset {
        ResetBehaviour::Succeed => command_delegate(|_| async { Ok(None) }),
        ResetBehaviour::Fail => command_delegate(|_| async {
            Err(CommandError::InvocationFailed {
                message: "calculator is locked".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
        }),
        ResetBehaviour::Panic => command_delegate(|_| async { panic!("calculator exploded") }),
    };

    let mut mapper = CommandMapper::<CalculatorCommands>::new().unwrap();
    mapper
        .map(
            "add",
            vec![
                CommandParameterDefinition::from_command::<i64>("left"),
                CommandParameterDefinition::from_command::<i64>("right"),
            ],
            command_delegate(|arguments| async move {
                let left: i64 = arguments.value(0)?;
                let right: i64 = arguments.value(1)?;
                Ok(Some(json!(left + right)))
            }),
        )
        .unwrap()
        .map("reset", Vec::new(), reset_delegate)
        .unwrap();
    commands.register(mapper.to_map().unwrap()).unwrap();

    let sender = RecordingSender::new("local");
    let action = CommandInvokedProcessAction::new(
        approved_endpoints(&["remote"]),
        commands,
        sender.clone(),
        ExchangeConfig::default(),
    );
    (action, sender)
}

fn invocation(command: &str, parameters: Vec<(&str, Value)>) -> CommunicationMessage {
    invocation_from("remote", command, parameters)
}

fn invocation_from(
    sender: &str,
    command: &str,
    parameters: Vec<(&str, Value)>,
) -> CommunicationMessage {
    CommunicationMessage::new(
        EndpointId::new(sender),
        Payload::CommandInvoked(CommandInvocationData {
            command: CommandId::new(command),
            parameters: parameters
                .into_iter()
                .map(|(name, value)| CommandParameterValue {
                    name: name.to_string(),
                    value,
                })
                .collect(),
        }),
    )
}

/// Invoke the action and return the single response it sent.
async fn answer_to(
    action: &CommandInvokedProcessAction,
    sender: &RecordingSender,
    message: CommunicationMessage,
) -> CommunicationMessage {
    let original = message.id;
    action.invoke(message).await.unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 1, "exactly one response per invocation");
    let (endpoint, response) = sent.into_iter().next().unwrap();
    assert_eq!(endpoint, EndpointId::new("remote"));
    assert_eq!(response.in_response_to, Some(original));
    response
}

/// **VALUE**: Verifies the response for a command with a return value.
#[tokio::test]
async fn given_command_with_result_when_invoked_then_answers_with_result() {
    let (action, sender) = command_action(ResetBehaviour::Succeed);

    let response = answer_to(
        &action,
        &sender,
        invocation(
            &format!("{CALCULATOR}#add"),
            vec![("left", json!(20)), ("right", json!(22))],
        ),
    )
    .await;

    assert_eq!(
        response.payload,
        Payload::CommandInvokedResponse { result: json!(42) }
    );
}

/// **VALUE**: Verifies the response for a command without a return value.
#[tokio::test]
async fn given_command_without_result_when_invoked_then_answers_success() {
    let (action, sender) = command_action(ResetBehaviour::Succeed);

    let response = answer_to(
        &action,
        &sender,
        invocation(&format!("{CALCULATOR}#reset"), Vec::new()),
    )
    .await;

    assert_eq!(response.payload, Payload::Success);
}

/// **VALUE**: Verifies that every failure mode still produces exactly one `Failure`.
///
/// **WHY THIS MATTERS**: The invoker waits for an answer. A command that fails without one
/// leaves the caller hanging until its timeout, with no hint of what went wrong.
///
/// **BUG THIS CATCHES**: Would catch a panic in a delegate unwinding through the message
/// loop, or an unknown command being ignored.
#[tokio::test]
async fn given_failing_unknown_or_panicking_command_when_invoked_then_answers_failure() {
    let cases = [
        (ResetBehaviour::Fail, format!("{CALCULATOR}#reset"), "calculator is locked"),
        (ResetBehaviour::Panic, format!("{CALCULATOR}#reset"), "panicked"),
        (ResetBehaviour::Succeed, "tests.Unknown#run".to_string(), "tests.Unknown#run"),
    ];

    for (behaviour, command, expected) in cases {
        let (action, sender) = command_action(behaviour);

        let response = answer_to(&action, &sender, invocation(&command, Vec::new())).await;

        match response.payload {
            Payload::Failure { error } => assert!(
                error.contains(expected),
                "'{error}' does not mention '{expected}'"
            ),
            other => panic!("Expected Failure for {command}, got {other:?}"),
        }
    }
}

/// **VALUE**: Verifies that a message of another kind is rejected without answering.
#[tokio::test]
async fn given_other_payload_when_invoked_then_returns_error() {
    let (action, sender) = command_action(ResetBehaviour::Succeed);

    let result = action
        .invoke(CommunicationMessage::new(
            EndpointId::new("remote"),
            Payload::Success,
        ))
        .await;

    assert!(matches!(result, Err(CoreError::Communication(_))));
    assert!(sender.sent().is_empty());
}

/// **VALUE**: Verifies that commands from endpoints that are not connected are refused.
///
/// **WHY THIS MATTERS**: Only endpoints that completed the connection may run local code.
///
/// **BUG THIS CATCHES**: Would catch any sender being able to invoke commands by id.
#[tokio::test]
async fn given_unknown_sender_when_invoking_then_answers_failure_without_running() {
    // GIVEN
    let (action, sender) = command_action(ResetBehaviour::Panic);

    // WHEN
    action
        .invoke(invocation_from(
            "stranger",
            &format!("{CALCULATOR}#reset"),
            Vec::new(),
        ))
        .await
        .unwrap();

    // THEN: Refused before the panicking delegate could run
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, EndpointId::new("stranger"));
    match &sent[0].1.payload {
        Payload::Failure { error } => assert!(error.contains("not connected"), "{error}"),
        other => panic!("Expected Failure, got {other:?}"),
    }
}
