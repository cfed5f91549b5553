pub mod collection;
pub mod definition;
pub mod descriptor;
pub mod hub;
pub mod proxy;

pub use collection::LocalNotificationCollection;
pub use definition::{NotificationDefinition, NotificationForwarder, NotificationMap};
pub use descriptor::{
    KnownNotificationSets, NotificationSet, NotificationSetDescriptor, NotificationSignature,
    verify_that_type_is_a_correct_notification_set,
};
pub use hub::{RemoteNotificationHub, StoreRemoteNotificationProxies};
pub use proxy::{
    NotificationEvent, NotificationListener, NotificationProxy, NotificationProxyBuilder,
    NotificationSubscription,
};
