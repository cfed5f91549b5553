use crate::commands::{
    CommandDefinition, CommandParameterDefinition, CommandParameterOrigin, command_delegate,
};
use crate::error::CommandError;

use models::{CommandId, CommandParameterValue, EndpointId, MessageId};

use serde_json::{Value, json};

fn value(name: &str, value: Value) -> CommandParameterValue {
    CommandParameterValue {
        name: name.to_string(),
        value,
    }
}

/// **VALUE**: Verifies that arguments are assembled by origin, in declaration order.
///
/// **WHY THIS MATTERS**: Delegates rely on positions. Sent values are matched by name, so the
/// order on the wire must not matter.
///
/// **BUG THIS CATCHES**: Would catch positional matching of sent values, or injected ids
/// landing in the wrong slot.
#[tokio::test]
async fn given_mixed_origins_when_invoking_then_delegate_receives_arguments_in_order() {
    // GIVEN: (caller, amount, message)
    let definition = CommandDefinition::new(
        CommandId::new("bank#deposit"),
        vec![
            CommandParameterDefinition::invoking_endpoint("caller"),
            CommandParameterDefinition::from_command::<i64>("amount"),
            CommandParameterDefinition::invoking_message("message"),
        ],
        true,
        command_delegate(|arguments| async move {
            let caller = arguments.endpoint(0)?.clone();
            let amount: i64 = arguments.value(1)?;
            let message = arguments.message(2)?;
            Ok(Some(json!({
                "caller": caller,
                "amount": amount,
                "message": message,
            })))
        }),
    );
    let message = MessageId::new();

    // WHEN: Values sent out of order with an extra one
    let result = definition
        .invoke(
            &EndpointId::new("remote"),
            message,
            &[value("unused", json!(true)), value("amount", json!(42))],
        )
        .await
        .unwrap();

    // THEN
    assert_eq!(
        result,
        Some(json!({
            "caller": "remote",
            "amount": 42,
            "message": message,
        }))
    );
}

/// **VALUE**: Verifies that a command parameter missing from the invocation is reported.
#[tokio::test]
async fn given_missing_value_when_invoking_then_returns_missing_parameter() {
    let definition = CommandDefinition::new(
        CommandId::new("bank#deposit"),
        vec![CommandParameterDefinition::from_command::<i64>("amount")],
        false,
        command_delegate(|_| async { Ok(None) }),
    );

    let result = definition
        .invoke(&EndpointId::new("remote"), MessageId::new(), &[])
        .await;

    assert!(matches!(result, Err(CommandError::MissingParameter { .. })));
}

/// **VALUE**: Verifies that an unknown origin fails before the delegate runs.
///
/// **BUG THIS CATCHES**: Would catch a delegate running with a made-up value for a parameter
/// nobody can supply.
#[tokio::test]
async fn given_unknown_origin_when_invoking_then_fails_without_calling_delegate() {
    let definition = CommandDefinition::new(
        CommandId::new("bank#deposit"),
        vec![
            CommandParameterDefinition::from_command::<i64>("amount"),
            CommandParameterDefinition::new("u8", "mystery", CommandParameterOrigin::Unknown),
        ],
        false,
        command_delegate(|_| async { panic!("delegate must not run") }),
    );

    let result = definition
        .invoke(
            &EndpointId::new("remote"),
            MessageId::new(),
            &[value("amount", json!(1))],
        )
        .await;

    assert!(matches!(
        result,
        Err(CommandError::InvalidParameterOrigin { .. })
    ));
}

/// **VALUE**: Verifies the result shape for commands with and without a return value.
///
/// **WHY THIS MATTERS**: The response kind (`CommandInvokedResponse` vs `Success`) is
/// chosen from this result.
#[tokio::test]
async fn given_return_value_flag_when_invoking_then_result_shape_follows_it() {
    let returning = CommandDefinition::new(
        CommandId::new("set#get"),
        Vec::new(),
        true,
        command_delegate(|_| async { Ok(None) }),
    );
    let silent = CommandDefinition::new(
        CommandId::new("set#run"),
        Vec::new(),
        false,
        command_delegate(|_| async { Ok(Some(json!(5))) }),
    );

    let endpoint = EndpointId::new("remote");
    assert_eq!(
        returning
            .invoke(&endpoint, MessageId::new(), &[])
            .await
            .unwrap(),
        Some(Value::Null)
    );
    assert_eq!(
        silent.invoke(&endpoint, MessageId::new(), &[]).await.unwrap(),
        None
    );
}
