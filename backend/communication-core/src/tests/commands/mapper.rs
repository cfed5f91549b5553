use crate::PROTOCOL_VERSION;
use crate::commands::{
    CommandMapper, CommandParameterDefinition, LocalCommandCollection, command_delegate,
};
use crate::error::CommandError;
use crate::interaction::{CommunicationDescriptionStorage, InteractionSubjectGroupStorage};
use crate::tests::support::{CALCULATOR, CalculatorCommands};

use models::{CommandId, CommandParameterValue, EndpointId, MessageId, TypeIdentity};

use std::sync::Arc;

use serde_json::json;

fn add_parameters() -> Vec<CommandParameterDefinition> {
    vec![
        CommandParameterDefinition::from_command::<i64>("left"),
        CommandParameterDefinition::from_command::<i64>("right"),
    ]
}

fn full_mapper() -> CommandMapper<CalculatorCommands> {
    let mut mapper = CommandMapper::<CalculatorCommands>::new().unwrap();
    mapper
        .map(
            "add",
            add_parameters(),
            command_delegate(|arguments| async move {
                let left: i64 = arguments.value(0)?;
                let right: i64 = arguments.value(1)?;
                Ok(Some(json!(left + right)))
            }),
        )
        .unwrap()
        .map(
            "reset",
            vec![CommandParameterDefinition::invoking_endpoint("caller")],
            command_delegate(|_| async { Ok(None) }),
        )
        .unwrap();
    mapper
}

/// **VALUE**: Verifies that delegates must line up with the signature they implement.
///
/// **WHY THIS MATTERS**: A mismatched delegate only fails when a remote endpoint calls it,
/// far away from the code that mapped it.
///
/// **BUG THIS CATCHES**: Would catch swapped parameters, wrong types or a missing
/// parameter slipping through mapping.
#[test]
fn given_delegate_not_matching_signature_when_mapping_then_returns_argument_mismatch() {
    let noop = || command_delegate(|_| async { Ok(None) });
    let mut mapper = CommandMapper::<CalculatorCommands>::new().unwrap();

    let swapped = mapper.map(
        "add",
        vec![
            CommandParameterDefinition::from_command::<i64>("right"),
            CommandParameterDefinition::from_command::<i64>("left"),
        ],
        noop(),
    );
    assert!(matches!(swapped, Err(CommandError::ArgumentMismatch { .. })));

    let wrong_type = mapper.map(
        "add",
        vec![
            CommandParameterDefinition::from_command::<i64>("left"),
            CommandParameterDefinition::from_command::<String>("right"),
        ],
        noop(),
    );
    assert!(matches!(wrong_type, Err(CommandError::ArgumentMismatch { .. })));

    let missing = mapper.map(
        "add",
        vec![CommandParameterDefinition::from_command::<i64>("left")],
        noop(),
    );
    assert!(matches!(missing, Err(CommandError::ArgumentMismatch { .. })));

    let unknown = mapper.map("divide", Vec::new(), noop());
    assert!(matches!(unknown, Err(CommandError::UnknownMethod { .. })));
}

/// **VALUE**: Verifies that injected parameters may sit anywhere around the sent ones.
#[test]
fn given_injected_parameters_when_mapping_then_mapping_succeeds() {
    let mut mapper = CommandMapper::<CalculatorCommands>::new().unwrap();

    let result = mapper.map(
        "add",
        vec![
            CommandParameterDefinition::invoking_message("message"),
            CommandParameterDefinition::from_command::<i64>("left"),
            CommandParameterDefinition::invoking_endpoint("caller"),
            CommandParameterDefinition::from_command::<i64>("right"),
        ],
        command_delegate(|_| async { Ok(None) }),
    );

    assert!(result.is_ok());
}

/// **VALUE**: Verifies that a command set cannot be half mapped or mapped twice.
///
/// **BUG THIS CATCHES**: Would catch a provider advertising a command set while one of its
/// commands has no delegate.
#[test]
fn given_incomplete_or_repeated_mapping_when_finishing_then_fails() {
    // GIVEN: Only "add" mapped
    let mut mapper = CommandMapper::<CalculatorCommands>::new().unwrap();
    mapper
        .map("add", add_parameters(), command_delegate(|_| async { Ok(None) }))
        .unwrap();

    // WHEN: Mapping "add" again
    let duplicate = mapper.map("add", add_parameters(), command_delegate(|_| async { Ok(None) }));

    // THEN
    assert!(matches!(duplicate, Err(CommandError::DuplicateCommand { .. })));
    match mapper.to_map() {
        Err(CommandError::CommandMethodNotMapped { message, .. }) => {
            assert!(message.contains("reset"));
        }
        other => panic!("Expected CommandMethodNotMapped, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a registered map is reachable by command id and advertised.
///
/// **WHY THIS MATTERS**: The description sent on connect is how remote endpoints learn
/// which command sets they may build proxies for.
///
/// **BUG THIS CATCHES**: Would catch a second registration of the same set half replacing
/// the first.
#[tokio::test]
async fn given_complete_map_when_registering_then_commands_are_invocable_and_advertised() {
    // GIVEN
    let descriptions = Arc::new(CommunicationDescriptionStorage::new(
        PROTOCOL_VERSION,
        Arc::new(InteractionSubjectGroupStorage::new()),
    ));
    let collection = LocalCommandCollection::new(Arc::clone(&descriptions));

    // WHEN
    collection.register(full_mapper().to_map().unwrap()).unwrap();
    let second = collection.register(full_mapper().to_map().unwrap());

    // THEN
    assert!(matches!(second, Err(CommandError::DuplicateCommand { .. })));
    assert_eq!(
        descriptions.to_description().command_sets,
        vec![TypeIdentity::new(CALCULATOR)]
    );

    let add = collection
        .command_for(&CommandId::new(format!("{CALCULATOR}#add")))
        .unwrap();
    let result = add
        .invoke(
            &EndpointId::new("remote"),
            MessageId::new(),
            &[
                CommandParameterValue {
                    name: "left".to_string(),
                    value: json!(2),
                },
                CommandParameterValue {
                    name: "right".to_string(),
                    value: json!(3),
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(result, Some(json!(5)));
}

/// **VALUE**: Verifies that mapping errors point at the code doing the mapping.
///
/// **WHY THIS MATTERS**: Mapping mistakes are configuration errors in the host. The
/// location is how the host finds the faulty mapping.
///
/// **BUG THIS CATCHES**: Would catch locations pointing into the mapper itself.
#[test]
fn given_unknown_method_when_mapping_then_error_location_is_the_caller() {
    let mut mapper = CommandMapper::<CalculatorCommands>::new().unwrap();

    let Err(error) = mapper.map("missing", Vec::new(), command_delegate(|_| async { Ok(None) }))
    else {
        panic!("Mapping an unknown method succeeded");
    };

    match error {
        CommandError::UnknownMethod { location, .. } => {
            let file = location.file.replace('\\', "/");
            assert!(file.ends_with("tests/commands/mapper.rs"), "located in {file}");
        }
        other => panic!("Expected UnknownMethod, got {other}"),
    }
}
