pub mod collection;
pub mod definition;
pub mod descriptor;
pub mod hub;
pub mod mapper;
pub mod proxy;

pub use collection::LocalCommandCollection;
pub use definition::{
    CommandDefinition, CommandDelegate, CommandParameterDefinition, CommandParameterOrigin,
    InvocationArgument, InvocationArguments, command_delegate,
};
pub use descriptor::{
    CommandSet, CommandSetDescriptor, CommandSignature, KnownCommandSets, ParameterSignature,
    verify_that_type_is_a_correct_command_set,
};
pub use hub::{RemoteCommandHub, StoreRemoteCommandProxies};
pub use mapper::{CommandMap, CommandMapper};
pub use proxy::{CommandProxy, CommandProxyBuilder, to_argument};
