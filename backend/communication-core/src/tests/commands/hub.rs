use crate::commands::{
    CommandProxyBuilder, KnownCommandSets, RemoteCommandHub, StoreRemoteCommandProxies,
};
use crate::config::ExchangeConfig;
use crate::tests::support::{CALCULATOR, CalculatorCommands, RecordingSender, connection};

use models::{CommunicationDescription, EndpointId, TypeIdentity};

use std::sync::Arc;

fn hub() -> RemoteCommandHub {
    let known = Arc::new(KnownCommandSets::new());
    known.register::<CalculatorCommands>().unwrap();
    RemoteCommandHub::new(
        known,
        CommandProxyBuilder::new(RecordingSender::new("local"), ExchangeConfig::default()),
    )
}

/// **VALUE**: Verifies the lifecycle of proxies for one remote endpoint.
///
/// **WHY THIS MATTERS**: Typed clients are only available between handshake acceptance
/// and sign off. Clients handed out earlier must stop working once the endpoint leaves.
///
/// **BUG THIS CATCHES**: Would catch proxies surviving sign off, or sets unknown to this
/// endpoint producing proxies.
#[test]
fn given_negotiated_sets_when_endpoint_signs_in_and_off_then_proxies_follow() {
    // GIVEN
    let hub = hub();
    let remote = EndpointId::new("remote");
    assert!(hub.commands_for::<CalculatorCommands>(&remote).is_none());

    // WHEN: Negotiated sets include one this side never heard of
    hub.on_receipt_of_endpoint_commands(
        &remote,
        &[TypeIdentity::new(CALCULATOR), TypeIdentity::new("tests.Unknown")],
    )
    .unwrap();

    // THEN
    let calculator = hub.commands_for::<CalculatorCommands>(&remote).unwrap();
    assert!(hub.has_commands_for(&remote));
    assert!(hub.has_command_for(&remote, &TypeIdentity::new(CALCULATOR)));
    assert_eq!(
        hub.available_command_sets(&remote),
        vec![TypeIdentity::new(CALCULATOR)]
    );

    // WHEN
    hub.on_endpoint_signed_off(&remote);

    // THEN
    assert!(calculator.proxy().is_signed_off());
    assert!(!hub.has_commands_for(&remote));
    assert!(hub.commands_for::<CalculatorCommands>(&remote).is_none());
}

/// **VALUE**: Verifies that a description advertised on connect also yields proxies.
#[test]
fn given_description_when_endpoint_signs_in_then_advertised_sets_are_available() {
    let hub = hub();
    let mut description = CommunicationDescription::new(crate::PROTOCOL_VERSION);
    description.command_sets.push(TypeIdentity::new(CALCULATOR));

    hub.on_endpoint_signed_in(&connection("remote"), &description);

    assert!(
        hub.commands_for::<CalculatorCommands>(&EndpointId::new("remote"))
            .is_some()
    );
}

/// **VALUE**: Verifies that a repeated store keeps handed out clients working and that a
/// removal signs them off.
///
/// **BUG THIS CATCHES**: Would catch a second store replacing live proxies, or a removal
/// without a disconnect event leaving usable clients behind.
#[test]
fn given_stored_proxies_when_stored_again_and_removed_then_same_client_is_signed_off() {
    // GIVEN
    let hub = hub();
    let remote = EndpointId::new("remote");
    let sets = [TypeIdentity::new(CALCULATOR)];
    hub.on_receipt_of_endpoint_commands(&remote, &sets).unwrap();
    let calculator = hub.commands_for::<CalculatorCommands>(&remote).unwrap();

    // WHEN
    hub.on_receipt_of_endpoint_commands(&remote, &sets).unwrap();
    hub.on_removal_of_endpoint(&remote);

    // THEN: The first client was the stored one all along
    assert!(calculator.proxy().is_signed_off());
    assert!(hub.commands_for::<CalculatorCommands>(&remote).is_none());
}
